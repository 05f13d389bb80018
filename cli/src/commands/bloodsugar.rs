use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use sugarlog_core::service::SugarService;

use super::helpers::{parse_date, parse_day_range, parse_time};

pub(crate) fn cmd_bg_log(
    svc: &SugarService,
    user_id: i64,
    value: f64,
    date: Option<String>,
    time: Option<&str>,
    context: Option<&str>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date, svc.offset())?;
    let time = time.map(parse_time).transpose()?;
    let metric = svc.log_blood_sugar(user_id, date, time, value, context.unwrap_or_default())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metric)?);
    } else {
        let id = metric.id;
        let at = metric.date_time.format("%Y-%m-%d %H:%M %:z");
        println!("[{id}] Logged blood sugar {:.0} mg/dL at {at}", metric.value);
    }
    Ok(())
}

pub(crate) fn cmd_bg_list(
    svc: &SugarService,
    user_id: i64,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let days = parse_day_range(start, end, svc.offset())?;
    let metrics = svc.list_blood_sugar(user_id, days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    if metrics.is_empty() {
        eprintln!("No blood sugar readings for user {user_id}");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct MetricRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "mg/dL")]
        value: String,
        #[tabled(rename = "Context")]
        context: String,
    }

    let rows: Vec<MetricRow> = metrics
        .iter()
        .map(|m| MetricRow {
            id: m.id,
            date: m.measure_date.format("%Y-%m-%d").to_string(),
            time: m
                .measure_time
                .map_or("-".into(), |t| t.format("%H:%M").to_string()),
            value: format!("{:.0}", m.value),
            context: m.context.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
