//! Collaborator seams between the engines and persistence.
//!
//! The chart and statistics engines only see plain record slices; these
//! traits are how the service fetches those slices and stores snapshots, so
//! a test can swap the database for an in-memory fake.

use anyhow::Result;
use chrono::{DateTime, FixedOffset};

use crate::db::Database;
use crate::models::{BloodSugarMetric, ConsumptionRecord, NewChartSnapshot};

pub trait ConsumptionSource {
    /// A user's consumption records with `start <= date_time <= end`,
    /// oldest first.
    fn consumptions_in_range(
        &self,
        user_id: i64,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<ConsumptionRecord>>;
}

pub trait MetricSource {
    fn metrics_in_range(
        &self,
        user_id: i64,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<BloodSugarMetric>>;
}

pub trait SnapshotSink {
    /// Persist a snapshot and return its new id.
    fn insert_snapshot(&self, snapshot: &NewChartSnapshot) -> Result<i64>;
}

impl ConsumptionSource for Database {
    fn consumptions_in_range(
        &self,
        user_id: i64,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<ConsumptionRecord>> {
        self.list_consumptions(user_id, Some((start, end)))
    }
}

impl MetricSource for Database {
    fn metrics_in_range(
        &self,
        user_id: i64,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<BloodSugarMetric>> {
        self.list_blood_sugar(user_id, Some((start, end)))
    }
}

impl SnapshotSink for Database {
    fn insert_snapshot(&self, snapshot: &NewChartSnapshot) -> Result<i64> {
        self.insert_graph(snapshot)
    }
}
