//! Non-bucketed sugar and blood-sugar statistics.
//!
//! Rolling totals here use trailing windows ending on an anchor date, unlike
//! the calendar-aligned buckets in [`crate::charts`].

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::charts::DateRange;
use crate::models::{
    BloodSugarMetric, BloodSugarVariability, ConsumptionRecord, RiskLevel, SugarSummary,
};

pub const KCAL_PER_GRAM_SUGAR: f64 = 4.0;
pub const WEEK_WINDOW_DAYS: i64 = 7;
pub const MONTH_WINDOW_DAYS: i64 = 30;

/// Intake and glycemic thresholds used by the summary classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Recommended free-sugar limit per day (grams).
    pub daily_goal_g: f64,
    pub daily_upper_limit_g: f64,
    /// A single entry at or above this many grams is "high sugar".
    pub high_entry_g: f64,
    /// Expected mg/dL rise per gram of sugar.
    pub spike_factor: f64,
    pub high_spike_mg_dl: f64,
    pub unstable_sd_mg_dl: f64,
    pub sugar_kcal_warning: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            daily_goal_g: 25.0,
            daily_upper_limit_g: 50.0,
            high_entry_g: 15.0,
            spike_factor: 0.5,
            high_spike_mg_dl: 20.0,
            unstable_sd_mg_dl: 20.0,
            sugar_kcal_warning: 120.0,
        }
    }
}

impl Thresholds {
    #[must_use]
    pub fn classify_daily_intake(&self, total_g: f64) -> RiskLevel {
        if total_g <= self.daily_goal_g {
            RiskLevel::Low
        } else if total_g <= self.daily_upper_limit_g {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }

    #[must_use]
    pub fn is_high_sugar_entry(&self, grams: f64) -> bool {
        grams >= self.high_entry_g
    }

    #[must_use]
    pub fn is_high_spike(&self, spike_mg_dl: f64) -> bool {
        spike_mg_dl >= self.high_spike_mg_dl
    }

    #[must_use]
    pub fn is_unstable(&self, std_dev: f64) -> bool {
        std_dev >= self.unstable_sd_mg_dl
    }

    #[must_use]
    pub fn exceeds_calorie_warning(&self, kcal: f64) -> bool {
        kcal >= self.sugar_kcal_warning
    }
}

/// Records belonging to `user_id` whose timestamp lies inside `range`.
#[must_use]
pub fn filter_records<'a>(
    records: &'a [ConsumptionRecord],
    user_id: i64,
    range: &DateRange,
) -> Vec<&'a ConsumptionRecord> {
    records
        .iter()
        .filter(|r| r.user_id == user_id && range.contains(&r.date_time))
        .collect()
}

#[must_use]
pub fn sum_sugar<'a>(records: impl IntoIterator<Item = &'a ConsumptionRecord>) -> f64 {
    records.into_iter().map(ConsumptionRecord::sugar).sum()
}

#[must_use]
pub fn total_in_range(records: &[ConsumptionRecord], user_id: i64, range: &DateRange) -> f64 {
    sum_sugar(filter_records(records, user_id, range))
}

#[must_use]
pub fn daily_total(
    records: &[ConsumptionRecord],
    user_id: i64,
    date: NaiveDate,
    offset: FixedOffset,
) -> f64 {
    total_in_range(records, user_id, &DateRange::normalize(date, date, offset))
}

/// Sugar over the 7 days ending with `anchor`.
#[must_use]
pub fn weekly_total(
    records: &[ConsumptionRecord],
    user_id: i64,
    anchor: NaiveDate,
    offset: FixedOffset,
) -> f64 {
    let range = DateRange::trailing(anchor, WEEK_WINDOW_DAYS, offset);
    total_in_range(records, user_id, &range)
}

/// Sugar over the 30 days ending with `anchor`.
#[must_use]
pub fn monthly_total(
    records: &[ConsumptionRecord],
    user_id: i64,
    anchor: NaiveDate,
    offset: FixedOffset,
) -> f64 {
    let range = DateRange::trailing(anchor, MONTH_WINDOW_DAYS, offset);
    total_in_range(records, user_id, &range)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weekly_average(
    records: &[ConsumptionRecord],
    user_id: i64,
    anchor: NaiveDate,
    offset: FixedOffset,
) -> f64 {
    weekly_total(records, user_id, anchor, offset) / WEEK_WINDOW_DAYS as f64
}

fn blood_sugar_values(metrics: &[BloodSugarMetric], user_id: i64, range: &DateRange) -> Vec<f64> {
    metrics
        .iter()
        .filter(|m| m.user_id == user_id && range.contains(&m.date_time))
        .map(|m| m.value)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by N); 0 for no readings.
#[allow(clippy::cast_precision_loss)]
fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

#[must_use]
pub fn std_dev_blood_sugar(metrics: &[BloodSugarMetric], user_id: i64, range: &DateRange) -> f64 {
    population_std_dev(&blood_sugar_values(metrics, user_id, range))
}

#[must_use]
pub fn expected_spike(sugar_grams: f64, spike_factor: f64) -> f64 {
    sugar_grams * spike_factor
}

/// Largest single-entry expected spike in range, or 0 with no entries.
#[must_use]
pub fn max_expected_spike(
    records: &[ConsumptionRecord],
    user_id: i64,
    range: &DateRange,
    spike_factor: f64,
) -> f64 {
    filter_records(records, user_id, range)
        .into_iter()
        .map(|r| expected_spike(r.sugar(), spike_factor))
        .fold(0.0, f64::max)
}

#[must_use]
pub fn sugar_calories(grams: f64) -> f64 {
    grams * KCAL_PER_GRAM_SUGAR
}

#[must_use]
pub fn sugar_summary(
    records: &[ConsumptionRecord],
    user_id: i64,
    date: NaiveDate,
    offset: FixedOffset,
    thresholds: &Thresholds,
) -> SugarSummary {
    let day = DateRange::normalize(date, date, offset);
    let daily_total_g = total_in_range(records, user_id, &day);
    let high_sugar_entries = filter_records(records, user_id, &day)
        .into_iter()
        .filter(|r| thresholds.is_high_sugar_entry(r.sugar()))
        .count();

    SugarSummary {
        user_id,
        date: date.format("%Y-%m-%d").to_string(),
        daily_total_g,
        weekly_total_g: weekly_total(records, user_id, date, offset),
        monthly_total_g: monthly_total(records, user_id, date, offset),
        weekly_average_g: weekly_average(records, user_id, date, offset),
        sugar_calories: sugar_calories(daily_total_g),
        max_expected_spike: max_expected_spike(records, user_id, &day, thresholds.spike_factor),
        high_sugar_entries,
        daily_goal_g: thresholds.daily_goal_g,
        daily_upper_limit_g: thresholds.daily_upper_limit_g,
        risk_level: thresholds.classify_daily_intake(daily_total_g),
    }
}

#[must_use]
pub fn blood_sugar_variability(
    metrics: &[BloodSugarMetric],
    user_id: i64,
    range: &DateRange,
    thresholds: &Thresholds,
) -> BloodSugarVariability {
    let values = blood_sugar_values(metrics, user_id, range);
    let std_dev = population_std_dev(&values);
    BloodSugarVariability {
        user_id,
        start_date: range.first_day().format("%Y-%m-%d").to_string(),
        end_date: range.last_day().format("%Y-%m-%d").to_string(),
        readings: values.len(),
        mean: mean(&values),
        std_dev,
        unstable: thresholds.is_unstable(std_dev),
    }
}
