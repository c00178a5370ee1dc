//! Bulk-imports historical CSV scan exports into the probe store.
//!
//! Earlier survey tooling wrote one CSV per batch with the columns
//! `ip,error,timeout,unknown_host,response_time`. This module replays those
//! files into the uniquely-keyed store, buffering rows between bulk inserts.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn};
use serde_derive::Deserialize;
use thiserror::Error;

use crate::probe::ProbeOutcome;
use crate::store::{ProbeRecord, Store, StoreError};

/// Rows buffered between bulk inserts.
const BUFFER_SIZE: usize = 10_000;

/// An import that could not run to completion. Unreadable files and failed
/// inserts abort the import; individual malformed rows only get skipped.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Totals reported after an import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows turned into records and persisted.
    pub imported: u64,
    /// Rows dropped because they could not be parsed.
    pub skipped: u64,
}

/// One CSV row as written by the historical export format. Booleans are the
/// strings `True`/`False`; absent values are empty strings.
#[derive(Debug, Deserialize)]
struct CsvRow {
    ip: String,
    error: String,
    timeout: String,
    unknown_host: String,
    response_time: String,
}

/// Import every file in order, flushing buffered records whenever
/// [`BUFFER_SIZE`] is reached and once more at the end.
pub async fn import_files<S: Store + ?Sized>(
    store: &S,
    files: &[PathBuf],
) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();
    let mut buffer: Vec<ProbeRecord> = Vec::with_capacity(BUFFER_SIZE);

    for path in files {
        import_file(store, path, &mut buffer, &mut summary).await?;
        info!("imported {}", path.display());
    }

    if !buffer.is_empty() {
        store.bulk_insert(&buffer).await?;
    }
    Ok(summary)
}

async fn import_file<S: Store + ?Sized>(
    store: &S,
    path: &Path,
    buffer: &mut Vec<ProbeRecord>,
    summary: &mut ImportSummary,
) -> Result<(), ImportError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| ImportError::Csv {
        path: path.to_owned(),
        source,
    })?;

    for row in reader.deserialize::<CsvRow>() {
        match row {
            Ok(row) => match record_from_row(&row) {
                Some(record) => {
                    buffer.push(record);
                    summary.imported += 1;
                    if buffer.len() >= BUFFER_SIZE {
                        store.bulk_insert(buffer).await?;
                        buffer.clear();
                    }
                }
                None => {
                    warn!("{}: skipping unparseable row for {:?}", path.display(), row.ip);
                    summary.skipped += 1;
                }
            },
            Err(err) => {
                warn!("{}: skipping malformed row: {err}", path.display());
                summary.skipped += 1;
            }
        }
    }
    Ok(())
}

fn record_from_row(row: &CsvRow) -> Option<ProbeRecord> {
    let ip = u32::from(Ipv4Addr::from_str(row.ip.trim()).ok()?);
    let outcome = if !row.error.is_empty() {
        ProbeOutcome::Failed {
            message: row.error.clone(),
        }
    } else if row.timeout == "True" {
        ProbeOutcome::Timeout
    } else if row.unknown_host == "True" {
        ProbeOutcome::Unreachable
    } else {
        ProbeOutcome::Reply {
            latency_ms: f64::from_str(row.response_time.trim()).ok()?,
        }
    };
    Some(ProbeRecord { ip, outcome })
}
