use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use crate::charts::DateRange;
use crate::db::{Database, InstantRange};
use crate::models::{
    self, BloodSugarMetric, BloodSugarVariability, ChartSnapshot, ConsumptionRecord, Granularity,
    NewBloodSugarMetric, NewConsumption, NewUser, SugarSummary, User,
};
use crate::snapshot::{self, ChartRequest, SnapshotError};
use crate::stats::{self, MONTH_WINDOW_DAYS, Thresholds};
use crate::store::{ConsumptionSource, MetricSource};

const SPIKE_FACTOR_KEY: &str = "spike_factor";

/// Entry point for callers: owns the database and the UTC offset used to
/// turn calendar dates into instant ranges.
pub struct SugarService {
    db: Database,
    offset: FixedOffset,
}

/// Fields for a new consumption entry before validation.
#[derive(Debug, Clone)]
pub struct ConsumptionInput {
    pub date_time: DateTime<FixedOffset>,
    pub category: String,
    pub amount: Option<f64>,
    pub sugar_grams: Option<f64>,
    pub context: String,
}

impl SugarService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self {
            db,
            offset: Utc.fix(),
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db,
            offset: Utc.fix(),
        })
    }

    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    #[must_use]
    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange::normalize(start, end, self.offset)
    }

    // --- Users ---

    pub fn register_user(&self, email: &str, full_name: Option<String>) -> Result<User> {
        let email = models::validate_email(email)?;
        if self.db.get_user_by_email(&email)?.is_some() {
            bail!("A user with email {email} already exists");
        }
        let full_name = full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.db.insert_user(&NewUser { email, full_name })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.db.get_user(id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.db.get_user_by_email(&email.trim().to_lowercase())
    }

    fn require_user(&self, id: i64) -> Result<User> {
        self.db
            .get_user(id)?
            .with_context(|| format!("User {id} not found"))
    }

    // --- Consumption ---

    pub fn log_consumption(&self, user_id: i64, input: ConsumptionInput) -> Result<ConsumptionRecord> {
        models::validate_sugar_grams(input.sugar_grams)?;
        models::validate_amount(input.amount)?;
        let category = input.category.trim().to_string();
        if category.is_empty() {
            bail!("Consumption type must not be empty");
        }
        self.require_user(user_id)?;
        self.db.insert_consumption(&NewConsumption {
            user_id,
            date_time: input.date_time,
            category,
            amount: input.amount,
            sugar_grams: input.sugar_grams,
            context: input.context.trim().to_string(),
        })
    }

    pub fn get_consumption(&self, id: i64) -> Result<Option<ConsumptionRecord>> {
        self.db.get_consumption(id)
    }

    /// A user's entries, optionally limited to whole calendar days.
    pub fn list_consumptions(
        &self,
        user_id: i64,
        days: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<ConsumptionRecord>> {
        let range = self.instant_range(days)?;
        self.db.list_consumptions(user_id, range)
    }

    // --- Blood sugar ---

    pub fn log_blood_sugar(
        &self,
        user_id: i64,
        measure_date: NaiveDate,
        measure_time: Option<NaiveTime>,
        value: f64,
        context: &str,
    ) -> Result<BloodSugarMetric> {
        models::validate_blood_sugar(value)?;
        self.require_user(user_id)?;
        self.db.insert_blood_sugar(&NewBloodSugarMetric {
            user_id,
            measure_date,
            measure_time,
            offset: self.offset,
            value,
            context: context.trim().to_string(),
        })
    }

    pub fn list_blood_sugar(
        &self,
        user_id: i64,
        days: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<BloodSugarMetric>> {
        let range = self.instant_range(days)?;
        self.db.list_blood_sugar(user_id, range)
    }

    fn instant_range(
        &self,
        days: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Option<InstantRange>> {
        let Some((start, end)) = days else {
            return Ok(None);
        };
        models::validate_date_range(start, end)?;
        let range = self.range(start, end);
        Ok(Some((range.start, range.end)))
    }

    // --- Charts ---

    /// Aggregate a user's records and store the chart as a new graph.
    pub fn build_chart(
        &self,
        user_id: i64,
        granularity: Granularity,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ChartSnapshot, SnapshotError> {
        models::validate_date_range(start, end).map_err(SnapshotError::InvalidRange)?;
        if self
            .db
            .get_user(user_id)
            .map_err(SnapshotError::Fetch)?
            .is_none()
        {
            return Err(SnapshotError::UnknownUser(user_id));
        }
        let request = ChartRequest {
            user_id,
            granularity,
            start,
            end,
            offset: self.offset,
        };
        let range = request.range();
        let records = self
            .db
            .consumptions_in_range(user_id, range.start, range.end)
            .map_err(SnapshotError::Fetch)?;
        snapshot::write_snapshot(&self.db, &records, &request)
    }

    pub fn get_graph(&self, id: i64) -> Result<Option<ChartSnapshot>> {
        self.db.get_graph(id)
    }

    pub fn list_graphs(&self, user_id: i64) -> Result<Vec<ChartSnapshot>> {
        self.db.list_graphs(user_id)
    }

    // --- Thresholds ---

    pub fn spike_factor(&self) -> Result<Option<f64>> {
        match self.db.get_setting(SPIKE_FACTOR_KEY)? {
            Some(v) => Ok(Some(
                v.parse()
                    .with_context(|| format!("Invalid stored spike factor '{v}'"))?,
            )),
            None => Ok(None),
        }
    }

    pub fn set_spike_factor(&self, factor: f64) -> Result<()> {
        models::validate_spike_factor(factor)?;
        self.db.set_setting(SPIKE_FACTOR_KEY, &factor.to_string())
    }

    pub fn clear_spike_factor(&self) -> Result<bool> {
        self.db.delete_setting(SPIKE_FACTOR_KEY)
    }

    /// Default thresholds with the stored spike factor applied.
    pub fn thresholds(&self) -> Result<Thresholds> {
        let mut thresholds = Thresholds::default();
        if let Some(factor) = self.spike_factor()? {
            thresholds.spike_factor = factor;
        }
        Ok(thresholds)
    }

    // --- Statistics ---

    pub fn sugar_summary(&self, user_id: i64, date: NaiveDate) -> Result<SugarSummary> {
        models::validate_calendar_date(date)?;
        self.require_user(user_id)?;
        let window = DateRange::trailing(date, MONTH_WINDOW_DAYS, self.offset);
        let records = self
            .db
            .consumptions_in_range(user_id, window.start, window.end)?;
        Ok(stats::sugar_summary(
            &records,
            user_id,
            date,
            self.offset,
            &self.thresholds()?,
        ))
    }

    pub fn blood_sugar_variability(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BloodSugarVariability> {
        models::validate_date_range(start, end)?;
        self.require_user(user_id)?;
        let range = self.range(start, end);
        let metrics = self.db.metrics_in_range(user_id, range.start, range.end)?;
        Ok(stats::blood_sugar_variability(
            &metrics,
            user_id,
            &range,
            &self.thresholds()?,
        ))
    }
}
