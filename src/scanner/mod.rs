//! Core functionality for actual sweeping behaviour.

use std::net::Ipv4Addr;
use std::num::NonZero;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, error};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::address::{Batch, BatchIter};
use crate::cancel::CancellationToken;
use crate::probe::Probe;
use crate::store::{ProbeRecord, Store, StoreError};

/// Execution parameters for one sweep, immutable for the lifetime of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    /// First address to probe.
    pub start: u32,
    /// Last address to probe, inclusive.
    pub end: u32,
    /// Maximum addresses per batch.
    pub batch_size: u32,
    /// Number of concurrently executing batch workers.
    pub pool_size: usize,
    /// Extra batches kept queued beyond the worker count, so a freed slot
    /// never waits on the partitioner.
    pub over_feed: usize,
    /// Hard per-probe deadline.
    pub probe_timeout: Duration,
}

/// Tallies reported after a run finishes or drains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Addresses probed and durably committed.
    pub probed: u64,
    /// Batches written to the store.
    pub committed_batches: u64,
    /// Batches abandoned by cancellation, never written.
    pub aborted_batches: u64,
    /// Whether the run ended through cancellation rather than exhaustion.
    pub cancelled: bool,
}

/// A sweep that did not run to a clean end.
#[derive(Debug, Error)]
pub enum SweepError {
    /// A bulk insert failed. The run stops loudly instead of skipping the
    /// batch, since a silent skip would leave an undetectable gap in the
    /// address space.
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("worker task failed: {0}")]
    Worker(String),
}

#[derive(Debug, Default)]
struct WorkerStats {
    probed: u64,
    committed: u64,
    aborted: u64,
}

enum BatchStatus {
    Committed(u64),
    Aborted,
}

/// Per-worker execution state, shared by every slot in the pool.
struct BatchRunner {
    prober: Arc<dyn Probe>,
    store: Arc<dyn Store>,
    cancel: CancellationToken,
    progress: Option<mpsc::UnboundedSender<u64>>,
}

impl BatchRunner {
    /// Pull batches off the shared queue until it closes or the run is
    /// cancelled. The queue has a single consumer side; workers take turns
    /// holding it while they wait for the next batch.
    async fn work(&self, queue: Arc<Mutex<mpsc::Receiver<Batch>>>) -> Result<WorkerStats, StoreError> {
        let mut stats = WorkerStats::default();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let batch = { queue.lock().await.recv().await };
            let Some(batch) = batch else { break };

            match self.run_batch(batch).await {
                Ok(BatchStatus::Committed(probed)) => {
                    stats.probed += probed;
                    stats.committed += 1;
                }
                Ok(BatchStatus::Aborted) => stats.aborted += 1,
                Err(err) => {
                    error!("bulk insert failed for batch {batch}: {err}");
                    self.cancel.cancel();
                    return Err(err);
                }
            }
        }
        Ok(stats)
    }

    /// Probe every address of the batch in increasing order, then commit
    /// the whole batch with a single bulk insert.
    ///
    /// Cancellation is checked before each probe. An interrupted batch is
    /// discarded wholesale, never partially committed: the watermark stays
    /// below it, so the next run re-probes the same range.
    async fn run_batch(&self, batch: Batch) -> Result<BatchStatus, StoreError> {
        let mut records = Vec::with_capacity(usize::try_from(batch.len()).unwrap_or_default());
        for ip in batch.addresses() {
            if self.cancel.is_cancelled() {
                debug!("batch {batch} abandoned after {} probes", records.len());
                return Ok(BatchStatus::Aborted);
            }
            let outcome = self.prober.probe(Ipv4Addr::from(ip)).await;
            records.push(ProbeRecord { ip, outcome });
        }

        let probed = records.len() as u64;
        self.store.bulk_insert(&records).await?;
        if let Some(progress) = &self.progress {
            let _ = progress.send(probed);
        }
        Ok(BatchStatus::Committed(probed))
    }
}

/// Drives a whole run: partitions the range, keeps `pool_size` workers fed
/// from a queue of `over_feed` prefetched batches, and drains cooperatively
/// on cancellation.
pub struct Sweeper {
    config: RunConfig,
    cancel: CancellationToken,
    runner: Arc<BatchRunner>,
}

impl Sweeper {
    pub fn new(
        config: RunConfig,
        prober: Arc<dyn Probe>,
        store: Arc<dyn Store>,
        cancel: CancellationToken,
        progress: Option<mpsc::UnboundedSender<u64>>,
    ) -> Self {
        Self {
            config,
            cancel: cancel.clone(),
            runner: Arc::new(BatchRunner {
                prober,
                store,
                cancel,
                progress,
            }),
        }
    }

    /// Run to completion, to cooperative shutdown, or to the first
    /// persistence fault, whichever comes first.
    ///
    /// Batches are dispatched in non-decreasing address order but may
    /// complete out of order; that is safe because batches never overlap
    /// and the store is keyed per address.
    pub async fn run(&self) -> Result<SweepSummary, SweepError> {
        let pool_size = self.config.pool_size.max(1);
        let batch_size = NonZero::new(self.config.batch_size).unwrap_or(NonZero::<u32>::MIN);

        debug!(
            "Start sweeping. \nRange {}-{}\nBatch size {}\nPool size {}\nOver-feed {}",
            Ipv4Addr::from(self.config.start),
            Ipv4Addr::from(self.config.end),
            batch_size,
            pool_size,
            self.config.over_feed,
        );

        let (batch_tx, batch_rx) = mpsc::channel(self.config.over_feed.max(1));
        let batch_rx = Arc::new(Mutex::new(batch_rx));

        // Feeder fills the prefetch queue; the bounded channel provides the
        // backpressure that caps in-flight work at pool_size + over_feed.
        let feeder = {
            let cancel = self.cancel.clone();
            let batches = BatchIter::new(self.config.start, self.config.end, batch_size);
            tokio::spawn(async move {
                for batch in batches {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if batch_tx.send(batch).await.is_err() {
                        break;
                    }
                }
            })
        };

        let mut workers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let runner = Arc::clone(&self.runner);
            let queue = Arc::clone(&batch_rx);
            workers.push(tokio::spawn(async move { runner.work(queue).await }));
        }
        // Workers hold the only queue handles now, so the feeder stops as
        // soon as the last worker exits.
        drop(batch_rx);

        let mut summary = SweepSummary::default();
        let mut failure = None;
        for joined in join_all(workers).await {
            match joined {
                Ok(Ok(stats)) => {
                    summary.probed += stats.probed;
                    summary.committed_batches += stats.committed;
                    summary.aborted_batches += stats.aborted;
                }
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(err) => {
                    self.cancel.cancel();
                    return Err(SweepError::Worker(err.to_string()));
                }
            }
        }
        if let Err(err) = feeder.await {
            return Err(SweepError::Worker(err.to_string()));
        }

        if let Some(err) = failure {
            return Err(err.into());
        }

        summary.cancelled = self.cancel.is_cancelled();
        debug!("Sweep finished: {summary:?}");
        Ok(summary)
    }
}
