//! SQLite-backed [`Store`] implementation.

use std::path::Path;

use async_trait::async_trait;
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::{ProbeRecord, Store, StoreError};
use crate::probe::ProbeOutcome;

/// Flat schema matching the historical survey exports: one nullable column
/// per outcome field, with the primary key on `ip` enforcing uniqueness.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS probes (
    ip INTEGER PRIMARY KEY,
    latency_ms REAL,
    timed_out INTEGER NOT NULL DEFAULT 0,
    unreachable INTEGER NOT NULL DEFAULT 0,
    error TEXT
)";

/// Probe result store on a local SQLite database.
///
/// The connection pool hands each bulk insert its own connection, so workers
/// never contend on a shared client-side buffer.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;

        debug!("probe store opened at {}", path.display());
        Ok(Self { pool })
    }

    /// Total number of recorded addresses.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM probes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Look up the record for one address.
    pub async fn fetch(&self, ip: u32) -> Result<Option<ProbeRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT latency_ms, timed_out, unreachable, error FROM probes WHERE ip = ?1",
        )
        .bind(i64::from(ip))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ProbeRecord {
            ip,
            outcome: outcome_from_columns(
                row.get("latency_ms"),
                row.get::<i64, _>("timed_out") != 0,
                row.get::<i64, _>("unreachable") != 0,
                row.get("error"),
            ),
        }))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn bulk_insert(&self, records: &[ProbeRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            let (latency_ms, timed_out, unreachable, error) = outcome_columns(&record.outcome);
            sqlx::query(
                "INSERT INTO probes (ip, latency_ms, timed_out, unreachable, error) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(i64::from(record.ip))
            .bind(latency_ms)
            .bind(i64::from(timed_out))
            .bind(i64::from(unreachable))
            .bind(error)
            .execute(&mut *tx)
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::Duplicate { ip: record.ip }
                }
                _ => StoreError::Database(err),
            })?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn max_ip(&self) -> Result<Option<u32>, StoreError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(ip) FROM probes")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.map(|ip| ip as u32))
    }
}

fn outcome_columns(outcome: &ProbeOutcome) -> (Option<f64>, bool, bool, Option<&str>) {
    match outcome {
        ProbeOutcome::Reply { latency_ms } => (Some(*latency_ms), false, false, None),
        ProbeOutcome::Timeout => (None, true, false, None),
        ProbeOutcome::Unreachable => (None, false, true, None),
        ProbeOutcome::Failed { message } => (None, false, false, Some(message)),
    }
}

fn outcome_from_columns(
    latency_ms: Option<f64>,
    timed_out: bool,
    unreachable: bool,
    error: Option<String>,
) -> ProbeOutcome {
    if let Some(message) = error {
        ProbeOutcome::Failed { message }
    } else if timed_out {
        ProbeOutcome::Timeout
    } else if unreachable {
        ProbeOutcome::Unreachable
    } else if let Some(latency_ms) = latency_ms {
        ProbeOutcome::Reply { latency_ms }
    } else {
        // Only reachable via rows written outside this crate.
        ProbeOutcome::Failed {
            message: "record carries no outcome".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("probes.db")).await.unwrap();
        (dir, store)
    }

    fn sample_records() -> Vec<ProbeRecord> {
        vec![
            ProbeRecord {
                ip: 1,
                outcome: ProbeOutcome::Reply { latency_ms: 12.5 },
            },
            ProbeRecord {
                ip: 2,
                outcome: ProbeOutcome::Timeout,
            },
            ProbeRecord {
                ip: 3,
                outcome: ProbeOutcome::Unreachable,
            },
            ProbeRecord {
                ip: 4,
                outcome: ProbeOutcome::Failed {
                    message: "sendto: operation not permitted".to_owned(),
                },
            },
        ]
    }

    #[tokio::test]
    async fn empty_store_has_no_watermark() {
        let (_dir, store) = open_temp().await;
        assert_eq!(store.max_ip().await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn outcomes_round_trip_through_columns() {
        let (_dir, store) = open_temp().await;
        let records = sample_records();
        store.bulk_insert(&records).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 4);
        assert_eq!(store.max_ip().await.unwrap(), Some(4));
        for record in &records {
            assert_eq!(store.fetch(record.ip).await.unwrap().as_ref(), Some(record));
        }
        assert_eq!(store.fetch(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected_not_overwritten() {
        let (_dir, store) = open_temp().await;
        store
            .bulk_insert(&[ProbeRecord {
                ip: 7,
                outcome: ProbeOutcome::Timeout,
            }])
            .await
            .unwrap();

        let err = store
            .bulk_insert(&[ProbeRecord {
                ip: 7,
                outcome: ProbeOutcome::Reply { latency_ms: 1.0 },
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ip: 7 }));

        // Original record intact.
        let kept = store.fetch(7).await.unwrap().unwrap();
        assert_eq!(kept.outcome, ProbeOutcome::Timeout);
    }

    #[tokio::test]
    async fn max_ip_tracks_highest_key_across_inserts() {
        let (_dir, store) = open_temp().await;
        store
            .bulk_insert(&[ProbeRecord {
                ip: 500,
                outcome: ProbeOutcome::Timeout,
            }])
            .await
            .unwrap();
        store
            .bulk_insert(&[ProbeRecord {
                ip: 20,
                outcome: ProbeOutcome::Timeout,
            }])
            .await
            .unwrap();
        assert_eq!(store.max_ip().await.unwrap(), Some(500));
    }
}
