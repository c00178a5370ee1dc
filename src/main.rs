//! Entry point: argument handling, store setup, signal wiring and the
//! progress display.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use once_cell::sync::Lazy;
use tokio::sync::mpsc;

use pingsweep::address;
use pingsweep::cancel::{spawn_signal_listener, CancellationToken};
use pingsweep::checkpoint;
use pingsweep::import;
use pingsweep::input::{self, Command, Config, Opts};
use pingsweep::probe::IcmpProber;
use pingsweep::scanner::{RunConfig, Sweeper};
use pingsweep::store::SqliteStore;

static PROGRESS_STYLE: Lazy<ProgressStyle> = Lazy::new(|| {
    ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {human_pos}/{human_len} ({per_sec})",
    )
    .expect("progress template is valid")
});

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts = Opts::read();
    let config = Config::read(opts.config_path.clone());
    opts.merge(&config);
    debug!("Main() `opts` arguments are {opts:?}");

    let collection = opts
        .collection
        .clone()
        .unwrap_or_else(input::default_collection_path);
    let store = SqliteStore::open(&collection)
        .await
        .with_context(|| format!("could not open probe store at {}", collection.display()))?;

    match opts.command.clone() {
        Some(Command::Import { files }) => run_import(&store, &files).await,
        None => run_sweep(&opts, store).await,
    }
}

async fn run_import(store: &SqliteStore, files: &[PathBuf]) -> anyhow::Result<()> {
    let summary = import::import_files(store, files).await?;
    println!(
        "Imported {} records ({} rows skipped)",
        summary.imported, summary.skipped
    );
    Ok(())
}

async fn run_sweep(opts: &Opts, store: SqliteStore) -> anyhow::Result<()> {
    let end = opts.end.map_or(address::SPACE_END, u32::from);
    let start = match opts.start {
        Some(start) => Some(u32::from(start)),
        None => checkpoint::next_unprobed(&store)
            .await
            .context("could not resolve the resume point")?,
    };
    let Some(start) = start.filter(|&start| start <= end) else {
        println!("Nothing left to probe; the collection already covers the requested range.");
        return Ok(());
    };

    let run = RunConfig {
        start,
        end,
        batch_size: opts.batch_size,
        pool_size: opts.pool_size,
        over_feed: opts.over_feed,
        probe_timeout: Duration::from_millis(u64::from(opts.timeout)),
    };
    let prober = IcmpProber::new(run.probe_timeout)
        .context("could not open the raw ICMP socket (root or CAP_NET_RAW required)")?;

    let cancel = CancellationToken::new();
    let listener = spawn_signal_listener(cancel.clone(), opts.accessible);

    // Progress is observational only; the engine streams per-batch address
    // counts and the bar renders them.
    let mut bar = None;
    let mut progress_tx = None;
    let mut pump = None;
    if !opts.greppable {
        let pb = ProgressBar::new(u64::from(end - start) + 1);
        pb.set_style(PROGRESS_STYLE.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pump_bar = pb.clone();
        pump = Some(tokio::spawn(async move {
            while let Some(count) = rx.recv().await {
                pump_bar.inc(count);
            }
        }));
        progress_tx = Some(tx);
        bar = Some(pb);
    }

    let sweeper = Sweeper::new(
        run,
        Arc::new(prober),
        Arc::new(store),
        cancel.clone(),
        progress_tx,
    );
    let result = sweeper.run().await;

    // Dropping the sweeper closes the progress channel so the pump drains.
    drop(sweeper);
    if let Some(pump) = pump {
        let _ = pump.await;
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    listener.abort();

    let summary = result?;
    if summary.cancelled {
        println!(
            "Stopped after {} addresses ({} batches committed, {} abandoned)",
            summary.probed, summary.committed_batches, summary.aborted_batches
        );
    } else {
        println!(
            "Probed {} addresses across {} batches",
            summary.probed, summary.committed_batches
        );
    }
    Ok(())
}
