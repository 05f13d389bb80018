use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
}

/// One logged food or drink. Never updated after it is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub id: i64,
    pub user_id: i64,
    pub date_time: DateTime<FixedOffset>,
    #[serde(rename = "type")]
    pub category: String,
    pub amount: Option<f64>,
    pub sugar_grams: Option<f64>,
    pub context: String,
    pub created_at: String,
}

impl ConsumptionRecord {
    /// Sugar grams for aggregation; an entry without sugar data counts as zero.
    #[must_use]
    pub fn sugar(&self) -> f64 {
        self.sugar_grams.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct NewConsumption {
    pub user_id: i64,
    pub date_time: DateTime<FixedOffset>,
    pub category: String,
    pub amount: Option<f64>,
    pub sugar_grams: Option<f64>,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodSugarMetric {
    pub id: i64,
    pub user_id: i64,
    pub measure_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure_time: Option<NaiveTime>,
    pub date_time: DateTime<FixedOffset>,
    #[serde(rename = "blood_sugar")]
    pub value: f64,
    pub context: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewBloodSugarMetric {
    pub user_id: i64,
    pub measure_date: NaiveDate,
    pub measure_time: Option<NaiveTime>,
    pub offset: FixedOffset,
    pub value: f64,
    pub context: String,
}

impl NewBloodSugarMetric {
    #[must_use]
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        measurement_timestamp(self.measure_date, self.measure_time, self.offset)
    }
}

/// Interpret a wall-clock datetime at a fixed UTC offset.
#[must_use]
pub fn at_offset(local: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

/// Combine a measurement date and optional time-of-day into one instant.
///
/// A missing time (or midnight) yields the date itself at 00:00 in `offset`.
#[must_use]
pub fn measurement_timestamp(
    date: NaiveDate,
    time: Option<NaiveTime>,
    offset: FixedOffset,
) -> DateTime<FixedOffset> {
    let time = time.unwrap_or(NaiveTime::MIN);
    at_offset(date.and_time(time), offset)
}

// --- Charts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

pub const GRANULARITIES: &[Granularity] = &[
    Granularity::Daily,
    Granularity::Weekly,
    Granularity::Monthly,
];

impl Granularity {
    /// Human label stored with each snapshot as its graph type.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Daily => "Daily Intake",
            Self::Weekly => "Weekly Trend",
            Self::Monthly => "Monthly Summary",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid granularity '{0}'. Must be one of: daily, weekly, monthly")]
pub struct ParseGranularityError(String);

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            _ => Err(ParseGranularityError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub day: String,
    pub sugar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPoint {
    pub week: String,
    pub total_sugar: f64,
    pub avg_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub total_sugar: f64,
    pub avg_per_day: f64,
}

/// Ordered buckets of one chart. Serializes as a bare JSON array; the
/// granularity travels alongside it on the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartData {
    Daily(Vec<DailyPoint>),
    Weekly(Vec<WeeklyPoint>),
    Monthly(Vec<MonthlyPoint>),
}

impl ChartData {
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        match self {
            Self::Daily(_) => Granularity::Daily,
            Self::Weekly(_) => Granularity::Weekly,
            Self::Monthly(_) => Granularity::Monthly,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Daily(points) => points.len(),
            Self::Weekly(points) => points.len(),
            Self::Monthly(points) => points.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn total_sugar(&self) -> f64 {
        match self {
            Self::Daily(points) => points.iter().map(|p| p.sugar).sum(),
            Self::Weekly(points) => points.iter().map(|p| p.total_sugar).sum(),
            Self::Monthly(points) => points.iter().map(|p| p.total_sugar).sum(),
        }
    }

    /// Decode a stored bucket array for the given granularity.
    pub fn from_json(granularity: Granularity, json: &str) -> serde_json::Result<Self> {
        Ok(match granularity {
            Granularity::Daily => Self::Daily(serde_json::from_str(json)?),
            Granularity::Weekly => Self::Weekly(serde_json::from_str(json)?),
            Granularity::Monthly => Self::Monthly(serde_json::from_str(json)?),
        })
    }
}

/// A persisted chart ("graph"), captured once and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub granularity: Granularity,
    pub graph_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_points: ChartData,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewChartSnapshot {
    pub user_id: i64,
    pub granularity: Granularity,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_points: String,
    pub created_at: String,
}

// --- Statistics ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        })
    }
}

/// Rolling sugar totals around one anchor date.
#[derive(Debug, Clone, Serialize)]
pub struct SugarSummary {
    pub user_id: i64,
    pub date: String,
    pub daily_total_g: f64,
    pub weekly_total_g: f64,
    pub monthly_total_g: f64,
    pub weekly_average_g: f64,
    pub sugar_calories: f64,
    pub max_expected_spike: f64,
    pub high_sugar_entries: usize,
    pub daily_goal_g: f64,
    pub daily_upper_limit_g: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct BloodSugarVariability {
    pub user_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub readings: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub unstable: bool,
}

// --- Validation ---

pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        bail!("Email must not be empty");
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => bail!("Invalid email '{email}'"),
    }
}

pub fn validate_sugar_grams(sugar_grams: Option<f64>) -> Result<()> {
    if sugar_grams.is_some_and(|g| !g.is_finite() || g < 0.0) {
        bail!("sugar_grams must be a non-negative number");
    }
    Ok(())
}

pub fn validate_amount(amount: Option<f64>) -> Result<()> {
    if amount.is_some_and(|a| !a.is_finite() || a <= 0.0) {
        bail!("amount must be greater than 0");
    }
    Ok(())
}

pub fn validate_blood_sugar(value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        bail!("blood_sugar must be greater than 0");
    }
    Ok(())
}

pub fn validate_spike_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor < 0.0 {
        bail!("Spike factor must be a non-negative number");
    }
    Ok(())
}

/// Calendar years accepted from callers. Chart arithmetic steps past the
/// end of a range, so dates near chrono's limits are rejected up front.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

pub fn validate_calendar_date(date: NaiveDate) -> Result<()> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        bail!("Date {date} is out of range. Years must be between {MIN_YEAR} and {MAX_YEAR}");
    }
    Ok(())
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    validate_calendar_date(start)?;
    validate_calendar_date(end)?;
    if end < start {
        bail!("End date {end} is before start date {start}");
    }
    Ok(())
}
