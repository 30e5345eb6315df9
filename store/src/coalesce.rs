//! Timestamp-range coalescing.
//!
//! An observation "file F at location L (arch A) at timestamp T" never
//! splits an existing range. Depending on the ranges adjacent to T among
//! the archive's ingested timestamps it either extends one, merges two, is
//! already covered, or starts a new singleton.

use crate::models::TimestampRange;

/// The action the store must apply for one new observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoalescePlan {
    /// An existing range already contains the timestamp.
    AlreadyCovered,
    /// No adjacent range: insert `[t, t]`.
    Insert,
    /// The range beginning at `begin` ends at the archive timestamp just
    /// before `t`: move its end forward to `t`.
    ExtendLeft {
        /// Begin of the range to update.
        begin: String,
    },
    /// A range begins at the archive timestamp just after `t`: move its
    /// begin back to `t`.
    ExtendRight {
        /// Current begin of the range to update.
        old_begin: String,
    },
    /// Ranges exist on both sides: replace them with one merged interval.
    Merge {
        /// Begin of the left range (kept).
        left_begin: String,
        /// Begin of the right range (removed).
        right_begin: String,
        /// End of the right range (new end of the merged range).
        right_end: String,
    },
}

/// Decide how a new observation at `t` combines with the existing ranges.
///
/// `t_prev`/`t_next` are the archive timestamps immediately adjacent to `t`
/// among all ingested timestamps of the archive, independent of this
/// observation. `ranges` are the current ranges for the
/// `(file, location, arch)` triple, in any order.
pub fn plan(
    t: &str,
    t_prev: Option<&str>,
    t_next: Option<&str>,
    ranges: &[TimestampRange],
) -> CoalescePlan {
    if ranges
        .iter()
        .any(|r| r.begin.as_str() <= t && t <= r.end.as_str())
    {
        return CoalescePlan::AlreadyCovered;
    }

    let left = t_prev.and_then(|p| ranges.iter().find(|r| r.end == p));
    let right = t_next.and_then(|n| ranges.iter().find(|r| r.begin == n));

    match (left, right) {
        (Some(l), Some(r)) => CoalescePlan::Merge {
            left_begin: l.begin.clone(),
            right_begin: r.begin.clone(),
            right_end: r.end.clone(),
        },
        (Some(l), None) => CoalescePlan::ExtendLeft {
            begin: l.begin.clone(),
        },
        (None, Some(r)) => CoalescePlan::ExtendRight {
            old_begin: r.begin.clone(),
        },
        (None, None) => CoalescePlan::Insert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(begin: &str, end: &str) -> TimestampRange {
        TimestampRange {
            begin: begin.to_string(),
            end: end.to_string(),
        }
    }

    const T1: &str = "20210221T150011Z";
    const T2: &str = "20210222T150011Z";
    const T3: &str = "20210223T150011Z";
    const T4: &str = "20210224T150011Z";

    #[test]
    fn test_first_observation() {
        assert_eq!(plan(T1, None, None, &[]), CoalescePlan::Insert);
    }

    #[test]
    fn test_extend_left() {
        let ranges = [range(T1, T1)];
        assert_eq!(
            plan(T2, Some(T1), None, &ranges),
            CoalescePlan::ExtendLeft {
                begin: T1.to_string()
            }
        );
    }

    #[test]
    fn test_extend_right() {
        let ranges = [range(T2, T3)];
        assert_eq!(
            plan(T1, None, Some(T2), &ranges),
            CoalescePlan::ExtendRight {
                old_begin: T2.to_string()
            }
        );
    }

    #[test]
    fn test_merge() {
        let ranges = [range(T1, T1), range(T3, T4)];
        assert_eq!(
            plan(T2, Some(T1), Some(T3), &ranges),
            CoalescePlan::Merge {
                left_begin: T1.to_string(),
                right_begin: T3.to_string(),
                right_end: T4.to_string(),
            }
        );
    }

    #[test]
    fn test_idempotent() {
        let ranges = [range(T1, T3)];
        assert_eq!(plan(T2, Some(T1), Some(T3), &ranges), CoalescePlan::AlreadyCovered);
        assert_eq!(plan(T1, None, Some(T2), &ranges), CoalescePlan::AlreadyCovered);
        assert_eq!(plan(T3, Some(T2), None, &ranges), CoalescePlan::AlreadyCovered);
    }

    #[test]
    fn test_gap_timestamp_between_ranges_stays_separate() {
        // T2 was ingested for the archive but the file was absent then, so
        // an observation at T4 must not merge across the T2 gap.
        let ranges = [range(T1, T1)];
        assert_eq!(plan(T4, Some(T3), None, &ranges), CoalescePlan::Insert);
    }

    #[test]
    fn test_adjacent_only_through_archive_neighbors() {
        // The neighbor of T3 is T2; the existing range ends at T1, so the
        // observation starts a new range even though T1 < T3.
        let ranges = [range(T1, T1)];
        assert_eq!(plan(T3, Some(T2), None, &ranges), CoalescePlan::Insert);
    }

    #[test]
    fn test_sentinel_archive_is_singleton() {
        assert_eq!(
            plan(crate::SENTINEL_TIMESTAMP, None, None, &[]),
            CoalescePlan::Insert
        );
        let ranges = [range(crate::SENTINEL_TIMESTAMP, crate::SENTINEL_TIMESTAMP)];
        assert_eq!(
            plan(crate::SENTINEL_TIMESTAMP, None, None, &ranges),
            CoalescePlan::AlreadyCovered
        );
    }
}
