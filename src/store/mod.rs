//! Persistent, uniquely-keyed storage for probe results.

mod sqlite;

pub use sqlite::SqliteStore;

use std::net::Ipv4Addr;

use async_trait::async_trait;
use thiserror::Error;

use crate::probe::ProbeOutcome;

/// One address paired with what its probe observed. Written once as part of
/// a batch's bulk insert and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRecord {
    pub ip: u32,
    pub outcome: ProbeOutcome,
}

/// Failures raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The unique key on `ip` rejected an insert. Duplicates are never
    /// overwritten; hitting this means two runs covered the same range.
    #[error("address {} is already recorded (overlapping run?)", Ipv4Addr::from(*.ip))]
    Duplicate { ip: u32 },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),
}

/// A persistent collection of [`ProbeRecord`]s keyed uniquely by address.
///
/// Implementations must tolerate concurrent `bulk_insert` calls from many
/// workers; the uniqueness constraint on `ip` is the only duplicate guard in
/// the system.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a whole batch of records in one call. Partial application on
    /// failure is acceptable, but the failure itself must surface.
    async fn bulk_insert(&self, records: &[ProbeRecord]) -> Result<(), StoreError>;

    /// The highest recorded address, or `None` for an empty store. Serves
    /// as the resume watermark.
    async fn max_ip(&self) -> Result<Option<u32>, StoreError>;
}
