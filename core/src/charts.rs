//! Calendar-aligned sugar charts.
//!
//! Every builder filters records to one user and an inclusive instant range,
//! pre-creates a zero bucket for each calendar unit the range touches, then
//! adds each record's sugar grams to the bucket of its local date. Buckets
//! live in a `BTreeMap`, so output order is calendar order by construction.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime};

use crate::models::{
    ChartData, ConsumptionRecord, DailyPoint, Granularity, MonthlyPoint, WeeklyPoint, at_offset,
};
use crate::stats::filter_records;

const DAYS_PER_WEEK: f64 = 7.0;

/// Inclusive instant range covering whole calendar days at one UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl DateRange {
    /// `start` at 00:00:00.000000000 through `end` at 23:59:59.999999999.
    #[must_use]
    pub fn normalize(start: NaiveDate, end: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            start: start_of_day(start, offset),
            end: end_of_day(end, offset),
        }
    }

    /// The `days` calendar days ending with `anchor`, inclusive.
    #[must_use]
    pub fn trailing(anchor: NaiveDate, days: i64, offset: FixedOffset) -> Self {
        Self::normalize(anchor - Duration::days(days - 1), anchor, offset)
    }

    #[must_use]
    pub fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        *instant >= self.start && *instant <= self.end
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        *self.start.offset()
    }

    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// Calendar date of `instant` as seen at this range's offset.
    #[must_use]
    pub fn local_day(&self, instant: &DateTime<FixedOffset>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }
}

#[must_use]
pub fn start_of_day(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    at_offset(date.and_time(NaiveTime::MIN), offset)
}

#[must_use]
pub fn end_of_day(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    start_of_day(date, offset) + Duration::days(1) - Duration::nanoseconds(1)
}

#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[must_use]
pub fn week_key(iso_year: i32, week: u32) -> String {
    format!("{iso_year:04}-W{week:02}")
}

#[must_use]
pub fn month_key(first: NaiveDate) -> String {
    first.format("%Y-%m").to_string()
}

/// ISO (year, week) of a date. The ISO year differs from the calendar year
/// for a few days around New Year.
#[must_use]
pub fn iso_week_of(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// Monday on or before `date`; Sunday counts as day 7 and steps back six days.
#[must_use]
pub fn monday_on_or_before(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().number_from_monday()) - 1)
}

#[must_use]
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// First day of the month after the one containing `date`.
#[must_use]
pub fn next_month(date: NaiveDate) -> NaiveDate {
    // 31 days past the 1st always lands in the following month.
    first_of_month(first_of_month(date) + Duration::days(31))
}

/// Number of calendar days in the month containing `date`.
#[must_use]
pub fn days_in_month(date: NaiveDate) -> i64 {
    let first = first_of_month(date);
    (next_month(first) - first).num_days()
}

/// Sugar per calendar day, one `{day, sugar}` entry for every day in range.
#[must_use]
pub fn build_daily_chart(
    records: &[ConsumptionRecord],
    user_id: i64,
    range: &DateRange,
) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, f64> = range
        .first_day()
        .iter_days()
        .take_while(|day| *day <= range.last_day())
        .map(|day| (day, 0.0))
        .collect();

    for record in filter_records(records, user_id, range) {
        *days.entry(range.local_day(&record.date_time)).or_insert(0.0) += record.sugar();
    }

    days.into_iter()
        .map(|(day, sugar)| DailyPoint {
            day: day_key(day),
            sugar,
        })
        .collect()
}

/// Sugar per ISO week for every week intersecting the range.
///
/// `avg_per_day` always divides by 7, even when the range clips the week.
#[must_use]
pub fn build_weekly_chart(
    records: &[ConsumptionRecord],
    user_id: i64,
    range: &DateRange,
) -> Vec<WeeklyPoint> {
    let mut weeks: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    let mut monday = monday_on_or_before(range.first_day());
    while monday <= range.last_day() {
        weeks.entry(iso_week_of(monday)).or_insert(0.0);
        monday += Duration::days(7);
    }

    for record in filter_records(records, user_id, range) {
        let week = iso_week_of(range.local_day(&record.date_time));
        *weeks.entry(week).or_insert(0.0) += record.sugar();
    }

    weeks
        .into_iter()
        .map(|((iso_year, week), total)| WeeklyPoint {
            week: week_key(iso_year, week),
            total_sugar: total,
            avg_per_day: total / DAYS_PER_WEEK,
        })
        .collect()
}

/// Sugar per calendar month; `avg_per_day` uses that month's real length.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn build_monthly_chart(
    records: &[ConsumptionRecord],
    user_id: i64,
    range: &DateRange,
) -> Vec<MonthlyPoint> {
    let mut months: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    let last = first_of_month(range.last_day());
    let mut month = first_of_month(range.first_day());
    while month <= last {
        months.insert(month, 0.0);
        month = next_month(month);
    }

    for record in filter_records(records, user_id, range) {
        let first = first_of_month(range.local_day(&record.date_time));
        *months.entry(first).or_insert(0.0) += record.sugar();
    }

    months
        .into_iter()
        .map(|(first, total)| MonthlyPoint {
            month: month_key(first),
            total_sugar: total,
            avg_per_day: total / days_in_month(first) as f64,
        })
        .collect()
}

#[must_use]
pub fn build_chart(
    granularity: Granularity,
    records: &[ConsumptionRecord],
    user_id: i64,
    range: &DateRange,
) -> ChartData {
    match granularity {
        Granularity::Daily => ChartData::Daily(build_daily_chart(records, user_id, range)),
        Granularity::Weekly => ChartData::Weekly(build_weekly_chart(records, user_id, range)),
        Granularity::Monthly => ChartData::Monthly(build_monthly_chart(records, user_id, range)),
    }
}
