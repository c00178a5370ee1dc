//! Address-space arithmetic: contiguous batches over the IPv4 range.

use std::fmt;
use std::net::Ipv4Addr;
use std::num::NonZero;
use std::ops::RangeInclusive;

/// First address of the IPv4 space, as an integer.
pub const SPACE_START: u32 = u32::MIN;

/// Last address of the IPv4 space, as an integer.
pub const SPACE_END: u32 = u32::MAX;

/// A contiguous, inclusive sub-range of the address space, assigned to a
/// worker as one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub start: u32,
    pub end: u32,
}

impl Batch {
    /// Number of addresses covered by this batch.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        u64::from(self.end) - u64::from(self.start) + 1
    }

    /// Addresses of the batch in increasing order.
    pub fn addresses(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            Ipv4Addr::from(self.start),
            Ipv4Addr::from(self.end)
        )
    }
}

/// Lazily partitions `[start, end]` into ordered, adjacent, non-overlapping
/// batches of at most `batch_size` addresses, the last one capped at `end`.
///
/// The iterator can be constructed at any mid-space `start`, which is how a
/// resumed run picks up where the previous one stopped without walking the
/// already-covered prefix.
#[derive(Debug)]
pub struct BatchIter {
    next_start: u32,
    end: u32,
    batch_size: NonZero<u32>,
    done: bool,
}

impl BatchIter {
    /// Batches covering `[start, end]`. An inverted range (`start > end`)
    /// yields nothing.
    pub fn new(start: u32, end: u32, batch_size: NonZero<u32>) -> Self {
        Self {
            next_start: start,
            end,
            batch_size,
            done: start > end,
        }
    }
}

impl Iterator for BatchIter {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = self.next_start;
        // Widen to u64 so the last batch near u32::MAX cannot overflow.
        let last = u64::from(start) + u64::from(self.batch_size.get() - 1);
        let end = if last >= u64::from(self.end) {
            self.done = true;
            self.end
        } else {
            last as u32
        };

        if !self.done {
            self.next_start = end + 1;
        }

        Some(Batch { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batches(start: u32, end: u32, batch_size: u32) -> Vec<Batch> {
        BatchIter::new(start, end, NonZero::new(batch_size).unwrap()).collect()
    }

    // Batches must concatenate to exactly [start, end]: adjacent, ordered,
    // no gaps, no overlaps, last batch capped at end.
    fn assert_partitions(start: u32, end: u32, batch_size: u32) {
        let batches = batches(start, end, batch_size);
        assert!(!batches.is_empty());
        assert_eq!(batches.first().unwrap().start, start);
        assert_eq!(batches.last().unwrap().end, end);
        for batch in &batches {
            assert!(batch.start <= batch.end);
            assert!(batch.len() <= u64::from(batch_size));
        }
        for pair in batches.windows(2) {
            assert_eq!(u64::from(pair[0].end) + 1, u64::from(pair[1].start));
        }
    }

    #[test]
    fn partitions_exact_multiple() {
        let batches = batches(0, 3999, 2000);
        assert_eq!(
            batches,
            vec![Batch { start: 0, end: 1999 }, Batch { start: 2000, end: 3999 }]
        );
    }

    #[test]
    fn partitions_with_short_final_batch() {
        let batches = batches(0, 4500, 2000);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2], Batch { start: 4000, end: 4500 });
    }

    #[test]
    fn partition_coverage_holds_across_shapes() {
        assert_partitions(0, 0, 1);
        assert_partitions(0, 9, 3);
        assert_partitions(5, 5, 500);
        assert_partitions(1000, 1001, 1);
        assert_partitions(0, 65_535, 500);
        assert_partitions(123, 99_999, 1024);
    }

    #[test]
    fn supports_mid_space_start() {
        let batches = batches(3_000_000_000, 3_000_000_999, 400);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].start, 3_000_000_000);
        assert_eq!(batches[2].end, 3_000_000_999);
    }

    #[test]
    fn no_overflow_at_end_of_space() {
        let batches = batches(u32::MAX - 2, u32::MAX, 2);
        assert_eq!(
            batches,
            vec![
                Batch { start: u32::MAX - 2, end: u32::MAX - 1 },
                Batch { start: u32::MAX, end: u32::MAX },
            ]
        );
    }

    #[test]
    fn inverted_range_yields_nothing() {
        assert!(batches(10, 9, 100).is_empty());
    }

    #[test]
    fn batch_display_is_dotted_quad() {
        let batch = Batch { start: 0, end: 255 };
        assert_eq!(batch.to_string(), "0.0.0.0-0.0.0.255");
    }
}
