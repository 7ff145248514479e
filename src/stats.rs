//! # Status counts for the metrics surface.
//!
//! [`EventStats`] is the aggregate the dashboard/metrics collaborator
//! reads: how many records the store currently holds in each status. It
//! is derived from a snapshot, never maintained incrementally, so it can
//! not drift from the records.

use serde::Serialize;

use crate::event::{EventRecord, EventStatus};

/// Counts of event records by status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    /// Total records currently retained.
    pub total: usize,
    /// Records waiting for selection.
    pub pending: usize,
    /// Records owned by an execution unit right now.
    pub processing: usize,
    /// Records that completed successfully.
    pub completed: usize,
    /// Records that exhausted their attempts (or failed fatally).
    pub failed: usize,
}

impl EventStats {
    /// Tallies a snapshot of records.
    pub fn from_records(records: &[EventRecord]) -> Self {
        let mut stats = EventStats {
            total: records.len(),
            ..EventStats::default()
        };
        for record in records {
            match record.status {
                EventStatus::Pending => stats.pending += 1,
                EventStatus::Processing => stats.processing += 1,
                EventStatus::Completed => stats.completed += 1,
                EventStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventId, Priority};
    use crate::policies::RetryPolicy;
    use serde_json::json;
    use tokio::time::Instant;

    fn record(status: EventStatus) -> EventRecord {
        EventRecord {
            id: EventId::generate(),
            event_type: "t".into(),
            payload: json!({}),
            created_at: Instant::now(),
            priority: Priority::Medium,
            status,
            attempts: 0,
            max_attempts: 3,
            next_eligible_at: None,
            last_error: None,
            idempotency_key: None,
            finished_at: None,
            retry: RetryPolicy::default(),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_counts_by_status() {
        let records = vec![
            record(EventStatus::Pending),
            record(EventStatus::Pending),
            record(EventStatus::Processing),
            record(EventStatus::Completed),
            record(EventStatus::Failed),
        ];
        let stats = EventStats::from_records(&records);
        assert_eq!(
            stats,
            EventStats {
                total: 5,
                pending: 2,
                processing: 1,
                completed: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(EventStats::from_records(&[]), EventStats::default());
    }
}
