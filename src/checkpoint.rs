//! Resume-point resolution from the store's high-water mark.

use crate::store::{Store, StoreError};

/// Next address with no recorded outcome, per the store's watermark.
///
/// Returns `None` when the watermark sits at the very end of the space,
/// meaning an earlier run already finished: that is normal completion, not
/// an error. The watermark is trustworthy only because batches are always
/// dispatched in non-decreasing order and the store rejects duplicate keys;
/// a duplicate-key failure later in a run means two runs overlapped.
pub async fn next_unprobed<S: Store + ?Sized>(store: &S) -> Result<Option<u32>, StoreError> {
    match store.max_ip().await? {
        None => Ok(Some(crate::address::SPACE_START)),
        Some(max) => Ok(max.checked_add(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use crate::store::testing::MemoryStore;
    use crate::store::ProbeRecord;

    fn timeouts(ips: impl IntoIterator<Item = u32>) -> Vec<ProbeRecord> {
        ips.into_iter()
            .map(|ip| ProbeRecord {
                ip,
                outcome: ProbeOutcome::Timeout,
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_store_starts_at_space_start() {
        let store = MemoryStore::default();
        assert_eq!(next_unprobed(&store).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn resumes_one_past_the_watermark() {
        let store = MemoryStore::with_records(timeouts(0..=99));
        assert_eq!(next_unprobed(&store).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn exhausted_space_reports_already_complete() {
        let store = MemoryStore::with_records(timeouts([u32::MAX - 1, u32::MAX]));
        assert_eq!(next_unprobed(&store).await.unwrap(), None);
    }
}
