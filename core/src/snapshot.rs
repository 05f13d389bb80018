//! Builds a chart for a request and stores it as an immutable graph.

use chrono::{FixedOffset, Local, NaiveDate};

use crate::charts::{DateRange, build_chart};
use crate::models::{ChartSnapshot, ConsumptionRecord, Granularity, NewChartSnapshot};
use crate::store::SnapshotSink;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    InvalidRange(anyhow::Error),
    #[error("User {0} not found")]
    UnknownUser(i64),
    #[error("failed to fetch consumption records")]
    Fetch(#[source] anyhow::Error),
    #[error("failed to encode chart data")]
    Encode(#[from] serde_json::Error),
    #[error("failed to store graph")]
    Write(#[source] anyhow::Error),
}

/// One chart-build request: whose records, at what granularity, over which
/// calendar days.
#[derive(Debug, Clone, Copy)]
pub struct ChartRequest {
    pub user_id: i64,
    pub granularity: Granularity,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub offset: FixedOffset,
}

impl ChartRequest {
    #[must_use]
    pub fn range(&self) -> DateRange {
        DateRange::normalize(self.start, self.end, self.offset)
    }
}

/// Aggregate `records` for `request` and hand the result to `sink`.
///
/// Nothing is returned on a failed write, so a caller never sees chart data
/// that was not persisted.
pub fn write_snapshot(
    sink: &dyn SnapshotSink,
    records: &[ConsumptionRecord],
    request: &ChartRequest,
) -> Result<ChartSnapshot, SnapshotError> {
    let data_points = build_chart(
        request.granularity,
        records,
        request.user_id,
        &request.range(),
    );
    let encoded = serde_json::to_string(&data_points)?;

    let new_snapshot = NewChartSnapshot {
        user_id: request.user_id,
        granularity: request.granularity,
        start_date: request.start,
        end_date: request.end,
        data_points: encoded,
        created_at: Local::now().to_rfc3339(),
    };
    let id = sink
        .insert_snapshot(&new_snapshot)
        .map_err(SnapshotError::Write)?;

    tracing::debug!(
        id,
        user_id = request.user_id,
        granularity = %request.granularity,
        buckets = data_points.len(),
        "stored graph"
    );

    Ok(ChartSnapshot {
        id,
        user_id: new_snapshot.user_id,
        granularity: new_snapshot.granularity,
        graph_type: new_snapshot.granularity.label().to_string(),
        start_date: new_snapshot.start_date,
        end_date: new_snapshot.end_date,
        data_points,
        created_at: new_snapshot.created_at,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use anyhow::{Result, bail};
    use chrono::DateTime;

    use super::*;
    use crate::models::{ChartData, MonthlyPoint};

    #[derive(Default)]
    struct MemorySink {
        stored: RefCell<Vec<NewChartSnapshot>>,
    }

    impl SnapshotSink for MemorySink {
        fn insert_snapshot(&self, snapshot: &NewChartSnapshot) -> Result<i64> {
            let mut stored = self.stored.borrow_mut();
            stored.push(snapshot.clone());
            Ok(stored.len() as i64)
        }
    }

    struct FailingSink;

    impl SnapshotSink for FailingSink {
        fn insert_snapshot(&self, _snapshot: &NewChartSnapshot) -> Result<i64> {
            bail!("disk full")
        }
    }

    fn record(at: &str, sugar: f64) -> ConsumptionRecord {
        ConsumptionRecord {
            id: 0,
            user_id: 7,
            date_time: DateTime::parse_from_rfc3339(at).unwrap(),
            category: "soda".to_string(),
            amount: None,
            sugar_grams: Some(sugar),
            context: String::new(),
            created_at: String::new(),
        }
    }

    fn request(granularity: Granularity) -> ChartRequest {
        ChartRequest {
            user_id: 7,
            granularity,
            start: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    fn records() -> Vec<ConsumptionRecord> {
        vec![
            record("2025-03-01T08:00:00Z", 10.0),
            record("2025-03-01T19:30:00Z", 20.0),
            record("2025-03-03T12:00:00Z", 5.0),
        ]
    }

    #[test]
    fn test_write_snapshot_persists_and_returns_chart() {
        let sink = MemorySink::default();
        let snapshot = write_snapshot(&sink, &records(), &request(Granularity::Monthly)).unwrap();

        assert_eq!(snapshot.id, 1);
        assert_eq!(snapshot.graph_type, "Monthly Summary");
        assert_eq!(
            snapshot.data_points,
            ChartData::Monthly(vec![MonthlyPoint {
                month: "2025-03".to_string(),
                total_sugar: 35.0,
                avg_per_day: 35.0 / 31.0,
            }])
        );

        let stored = sink.stored.borrow();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].granularity, Granularity::Monthly);
        let decoded = ChartData::from_json(Granularity::Monthly, &stored[0].data_points).unwrap();
        assert_eq!(decoded, snapshot.data_points);
    }

    #[test]
    fn test_each_request_creates_new_snapshot() {
        let sink = MemorySink::default();
        let a = write_snapshot(&sink, &records(), &request(Granularity::Daily)).unwrap();
        let b = write_snapshot(&sink, &records(), &request(Granularity::Daily)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.data_points, b.data_points);
        assert_eq!(sink.stored.borrow().len(), 2);
    }

    #[test]
    fn test_write_failure_returns_no_data() {
        let err = write_snapshot(&FailingSink, &records(), &request(Granularity::Weekly)).unwrap_err();
        assert!(matches!(err, SnapshotError::Write(_)));
        assert_eq!(err.to_string(), "failed to store graph");
    }

    #[test]
    fn test_empty_records_still_stored() {
        let sink = MemorySink::default();
        let snapshot = write_snapshot(&sink, &[], &request(Granularity::Daily)).unwrap();
        assert_eq!(snapshot.data_points.len(), 3);
        assert_eq!(snapshot.data_points.total_sugar(), 0.0);
    }
}
