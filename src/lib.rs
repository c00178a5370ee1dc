//! This crate exposes the internal functionality of the
//! pingsweep reachability survey tool.
//!
//! pingsweep probes every address of the IPv4 space (or any sub-range)
//! exactly once, classifies each probe into a fixed outcome taxonomy, and
//! commits results batch-by-batch into a uniquely-keyed SQLite collection.
//! Runs are designed to last for days: an interrupted sweep resumes from
//! the highest recorded address without re-probing anything already stored.
//!
//! ## Architecture Overview
//!
//! The engine is driven by [`Sweeper`](crate::scanner::Sweeper):
//!
//! 1. **Checkpoint**: [`checkpoint::next_unprobed`] turns the store's
//!    high-water mark into the effective start address.
//! 2. **Partitioning**: [`address::BatchIter`] lazily splits the range into
//!    ordered, non-overlapping batches.
//! 3. **Worker pool**: a fixed number of workers pull batches from a
//!    bounded prefetch queue that is deliberately over-fed, so slots stay
//!    busy even though batch latency is highly skewed.
//! 4. **Probing**: each worker probes its batch sequentially through a
//!    [`Probe`](crate::probe::Probe) implementation and commits all results
//!    with a single bulk insert.
//! 5. **Cancellation**: SIGINT/SIGTERM flip a shared token; workers finish
//!    or abandon their current batch and the process exits cleanly.
//!
//! ## Example
//!
//! Partitioning a range into batches:
//!
//! ```rust
//! use std::num::NonZero;
//! use pingsweep::address::BatchIter;
//!
//! let batches: Vec<_> = BatchIter::new(0, 3999, NonZero::new(2000).unwrap()).collect();
//! assert_eq!(batches.len(), 2);
//! assert_eq!(batches[0].start, 0);
//! assert_eq!(batches[1].end, 3999);
//! ```

pub mod address;

pub mod cancel;

pub mod checkpoint;

pub mod ignore;

pub mod import;

pub mod input;

pub mod probe;

pub mod scanner;

pub mod store;
