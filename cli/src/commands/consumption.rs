use anyhow::Result;
use chrono::FixedOffset;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use sugarlog_core::models::ConsumptionRecord;
use sugarlog_core::service::{ConsumptionInput, SugarService};
use sugarlog_core::stats::sum_sugar;

use super::helpers::{format_grams, no_neg_zero, parse_day_range, parse_timestamp, truncate};

/// A consumption entry as typed on the command line, before parsing.
pub(crate) struct LogEntry {
    pub(crate) sugar_g: Option<f64>,
    pub(crate) category: String,
    pub(crate) amount: Option<f64>,
    pub(crate) context: Option<String>,
    pub(crate) at: Option<String>,
}

impl LogEntry {
    fn into_input(self, offset: FixedOffset) -> Result<ConsumptionInput> {
        Ok(ConsumptionInput {
            date_time: parse_timestamp(self.at, offset)?,
            category: self.category,
            amount: self.amount,
            sugar_grams: self.sugar_g,
            context: self.context.unwrap_or_default(),
        })
    }
}

pub(crate) fn cmd_log(svc: &SugarService, user_id: i64, entry: LogEntry, json: bool) -> Result<()> {
    let entry = svc.log_consumption(user_id, entry.into_input(svc.offset())?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    let id = entry.id;
    let category = &entry.category;
    let at = entry.date_time.format("%Y-%m-%d %H:%M %:z");
    let Some(sugar) = entry.sugar_grams else {
        println!("[{id}] Logged {category} at {at} (no sugar data)");
        return Ok(());
    };
    println!("[{id}] Logged {sugar:.1}g sugar ({category}) at {at}");

    let thresholds = svc.thresholds()?;
    if thresholds.is_high_sugar_entry(sugar) {
        let spike = sugar * thresholds.spike_factor;
        eprintln!(
            "  High-sugar entry: expected spike ~{spike:.0} mg/dL (limit {:.0}g/day)",
            thresholds.daily_goal_g
        );
    }
    Ok(())
}

pub(crate) fn cmd_history(
    svc: &SugarService,
    user_id: i64,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let days = parse_day_range(start, end, svc.offset())?;
    let records = svc.list_consumptions(user_id, days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        eprintln!("No consumption entries for user {user_id}");
        process::exit(2);
    }

    print_consumption_table(&records);
    let total = no_neg_zero(sum_sugar(&records));
    println!("  TOTAL: {total:.1}g sugar across {} entries", records.len());
    Ok(())
}

fn print_consumption_table(records: &[ConsumptionRecord]) {
    #[derive(Tabled)]
    struct ConsumptionRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Type")]
        category: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Sugar (g)")]
        sugar: String,
        #[tabled(rename = "Context")]
        context: String,
    }

    let rows: Vec<ConsumptionRow> = records
        .iter()
        .map(|r| ConsumptionRow {
            id: r.id,
            when: r.date_time.format("%Y-%m-%d %H:%M %:z").to_string(),
            category: truncate(&r.category, 25),
            amount: format_grams(r.amount),
            sugar: format_grams(r.sugar_grams),
            context: truncate(&r.context, 20),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sugar_g: Option<f64>) -> LogEntry {
        LogEntry {
            sugar_g,
            category: "iced tea".to_string(),
            amount: Some(330.0),
            context: None,
            at: Some("2025-03-01 08:15".to_string()),
        }
    }

    #[test]
    fn test_log_entry_into_input() {
        let plus7 = FixedOffset::east_opt(7 * 3600).unwrap();
        let input = entry(Some(12.5)).into_input(plus7).unwrap();
        assert_eq!(input.date_time.to_rfc3339(), "2025-03-01T08:15:00+07:00");
        assert_eq!(input.sugar_grams, Some(12.5));
        assert_eq!(input.amount, Some(330.0));
        assert_eq!(input.context, "");
    }

    #[test]
    fn test_log_without_sugar_keeps_none() {
        let svc = SugarService::new_in_memory().unwrap();
        let user = svc.register_user("ana@example.com", None).unwrap();

        cmd_log(&svc, user.id, entry(None), true).unwrap();

        let records = svc.list_consumptions(user.id, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sugar_grams, None);
        assert!(records[0].sugar().abs() < f64::EPSILON);
    }

    #[test]
    fn test_log_rejects_bad_timestamp() {
        let svc = SugarService::new_in_memory().unwrap();
        let user = svc.register_user("ana@example.com", None).unwrap();
        let mut bad = entry(Some(5.0));
        bad.at = Some("yesterday noon".to_string());
        assert!(cmd_log(&svc, user.id, bad, true).is_err());
        assert!(svc.list_consumptions(user.id, None).unwrap().is_empty());
    }
}
