use anyhow::{Result, bail};

use sugarlog_core::service::SugarService;
use sugarlog_core::stats::Thresholds;

pub(crate) fn cmd_spike_factor(
    svc: &SugarService,
    value: Option<f64>,
    reset: bool,
    json: bool,
) -> Result<()> {
    match (value, reset) {
        (Some(_), true) => bail!("Pass either a value or --reset, not both"),
        (Some(factor), false) => svc.set_spike_factor(factor)?,
        (None, true) => {
            if !svc.clear_spike_factor()? && !json {
                eprintln!("No custom spike factor was set");
            }
        }
        (None, false) => {}
    }

    let stored = svc.spike_factor()?;
    let effective = stored.unwrap_or(Thresholds::default().spike_factor);

    if json {
        println!(
            "{}",
            serde_json::json!({ "spike_factor": effective, "custom": stored.is_some() })
        );
    } else if stored.is_some() {
        println!("Spike factor: {effective} mg/dL per gram");
    } else {
        println!("Spike factor: {effective} mg/dL per gram (default)");
    }
    Ok(())
}
