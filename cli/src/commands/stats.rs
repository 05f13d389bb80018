use anyhow::Result;

use sugarlog_core::models::RiskLevel;
use sugarlog_core::service::SugarService;

use super::helpers::{no_neg_zero, parse_date};

pub(crate) fn cmd_stats(
    svc: &SugarService,
    user_id: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date, svc.offset())?;
    let summary = svc.sugar_summary(user_id, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let thresholds = svc.thresholds()?;
    let day = no_neg_zero(summary.daily_total_g);
    let goal = summary.daily_goal_g;
    let limit = summary.daily_upper_limit_g;
    println!("=== {} (user {user_id}) ===\n", summary.date);
    println!("  TODAY:     {day:.1}g sugar (goal {goal:.0}g, limit {limit:.0}g)");
    println!(
        "  7 DAYS:    {:.1}g ({:.1}g/day)",
        no_neg_zero(summary.weekly_total_g),
        no_neg_zero(summary.weekly_average_g)
    );
    println!("  30 DAYS:   {:.1}g", no_neg_zero(summary.monthly_total_g));
    println!(
        "  CALORIES:  {:.0} kcal from sugar",
        no_neg_zero(summary.sugar_calories)
    );
    println!(
        "  MAX SPIKE: ~{:.0} mg/dL",
        no_neg_zero(summary.max_expected_spike)
    );
    println!("  HIGH-SUGAR ENTRIES: {}", summary.high_sugar_entries);
    println!("  RISK: {}", summary.risk_level);

    if summary.risk_level == RiskLevel::High {
        let over = day - limit;
        eprintln!("\n  {over:.1}g over the daily upper limit");
    }
    if thresholds.exceeds_calorie_warning(summary.sugar_calories) {
        eprintln!("  Sugar calories above {:.0} kcal", thresholds.sugar_kcal_warning);
    }
    if thresholds.is_high_spike(summary.max_expected_spike) {
        eprintln!("  At least one entry may cause a high glucose spike");
    }
    Ok(())
}

pub(crate) fn cmd_variability(
    svc: &SugarService,
    user_id: i64,
    start: &str,
    end: &str,
    json: bool,
) -> Result<()> {
    let start = parse_date(Some(start.to_string()), svc.offset())?;
    let end = parse_date(Some(end.to_string()), svc.offset())?;
    let v = svc.blood_sugar_variability(user_id, start, end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&v)?);
        return Ok(());
    }

    println!("=== {} to {} (user {user_id}) ===\n", v.start_date, v.end_date);
    println!("  READINGS: {}", v.readings);
    println!("  MEAN:     {:.1} mg/dL", no_neg_zero(v.mean));
    println!("  STD DEV:  {:.1} mg/dL", no_neg_zero(v.std_dev));
    if v.unstable {
        println!("  Blood sugar is unstable over this period");
    }
    Ok(())
}
