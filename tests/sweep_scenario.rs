//! End-to-end sweeps against a real SQLite-backed store.

use std::io::Write as _;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pingsweep::cancel::CancellationToken;
use pingsweep::checkpoint;
use pingsweep::import;
use pingsweep::probe::{Probe, ProbeOutcome};
use pingsweep::scanner::{RunConfig, SweepError, Sweeper};
use pingsweep::store::{SqliteStore, Store, StoreError};

struct TimeoutProber;

#[async_trait]
impl Probe for TimeoutProber {
    async fn probe(&self, _addr: Ipv4Addr) -> ProbeOutcome {
        ProbeOutcome::Timeout
    }
}

fn config(start: u32, end: u32, batch_size: u32) -> RunConfig {
    RunConfig {
        start,
        end,
        batch_size,
        pool_size: 5,
        over_feed: 5,
        probe_timeout: Duration::from_millis(1),
    }
}

async fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
    SqliteStore::open(&dir.path().join("probes.db"))
        .await
        .unwrap()
}

fn sweeper(run: RunConfig, store: &SqliteStore) -> Sweeper {
    Sweeper::new(
        run,
        Arc::new(TimeoutProber),
        Arc::new(store.clone()),
        CancellationToken::new(),
        None,
    )
}

#[tokio::test]
async fn sweep_commits_every_address_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let summary = sweeper(config(0, 3999, 2000), &store).run().await.unwrap();

    assert_eq!(summary.probed, 4000);
    assert_eq!(summary.committed_batches, 2);
    assert!(!summary.cancelled);
    assert_eq!(store.count().await.unwrap(), 4000);
    assert_eq!(store.max_ip().await.unwrap(), Some(3999));
    let record = store.fetch(1234).await.unwrap().unwrap();
    assert_eq!(record.outcome, ProbeOutcome::Timeout);
}

#[tokio::test]
async fn second_run_resumes_from_the_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    sweeper(config(0, 1999, 500), &store).run().await.unwrap();
    let resume = checkpoint::next_unprobed(&store).await.unwrap().unwrap();
    assert_eq!(resume, 2000);

    // Resuming never attempts an address at or below the watermark, so the
    // unique key stays quiet.
    sweeper(config(resume, 3999, 500), &store)
        .run()
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 4000);
}

#[tokio::test]
async fn overlapping_runs_fail_on_the_unique_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    sweeper(config(0, 999, 500), &store).run().await.unwrap();
    let err = sweeper(config(500, 1499, 500), &store)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SweepError::Store(StoreError::Duplicate { .. })
    ));
}

#[tokio::test]
async fn imported_history_feeds_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let csv_path: PathBuf = dir.path().join("history.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "ip,error,timeout,unknown_host,response_time").unwrap();
    for ip in 0u32..10 {
        writeln!(file, "{},,True,False,", Ipv4Addr::from(ip)).unwrap();
    }
    drop(file);

    let summary = import::import_files(&store, &[csv_path]).await.unwrap();
    assert_eq!(summary.imported, 10);

    let resume = checkpoint::next_unprobed(&store).await.unwrap().unwrap();
    assert_eq!(resume, 10);

    sweeper(config(resume, 29, 10), &store).run().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 30);
}
