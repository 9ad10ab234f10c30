use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bob_core::models::{CalibrationResult, CalibrationStatus};
use bob_core::service::BobService;

fn print_result(user: &str, result: &CalibrationResult, dry_run: bool) {
    match result.status {
        CalibrationStatus::InsufficientData => {
            println!("{user}: not enough data to calibrate ({})", result.reason);
        }
        CalibrationStatus::NoAdjustmentNeeded => {
            println!("{user}: no adjustment needed ({})", result.reason);
        }
        CalibrationStatus::Calibrated => {
            let old = result.old_target.unwrap_or_default();
            let new = result.new_target.unwrap_or_default();
            let adj = result.adjustment.unwrap_or_default();
            let verb = if dry_run { "would change" } else { "changed" };
            println!("{user}: target {verb} {old} -> {new} kcal/day ({adj:+})");
            println!("  Reason: {}", result.reason);
            if let Some(confidence) = result.confidence {
                println!("  Confidence: {}", confidence.as_str());
            }
        }
    }

    if let Some(ref m) = result.metrics {
        println!(
            "  Window: {} logged days, avg {:.0} kcal/day, {:.2} kg lost (expected {:.2} kg)",
            m.logged_days, m.avg_daily_calories, m.actual_weight_change, m.expected_weight_change
        );
    }
}

pub(crate) fn cmd_calibrate(
    svc: &BobService,
    user: &str,
    window: i64,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let result = svc.calibrate(user, window, dry_run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if dry_run {
            println!("Dry run — no changes made.");
        }
        print_result(user, &result, dry_run);
    }

    Ok(())
}

pub(crate) fn cmd_calibrate_all(
    svc: &BobService,
    window: i64,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let outcomes = svc.calibrate_all(window, dry_run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(());
    }

    if dry_run {
        println!("Dry run — no changes made.");
    }
    if outcomes.is_empty() {
        eprintln!("No profiles to calibrate.");
        return Ok(());
    }

    for outcome in &outcomes {
        match (&outcome.result, &outcome.error) {
            (Some(result), _) => print_result(&outcome.user, result, dry_run),
            (None, Some(err)) => eprintln!("{}: failed ({err})", outcome.user),
            (None, None) => {}
        }
    }

    Ok(())
}

pub(crate) fn cmd_calibration_history(svc: &BobService, user: &str, json: bool) -> Result<()> {
    let records = svc.calibration_history(user)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        eprintln!("No calibrations recorded for '{user}' yet.");
    } else {
        #[derive(Tabled)]
        struct RecordRow {
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Old")]
            old: i64,
            #[tabled(rename = "New")]
            new: i64,
            #[tabled(rename = "Change")]
            change: String,
            #[tabled(rename = "Confidence")]
            confidence: String,
            #[tabled(rename = "Reason")]
            reason: String,
        }

        let rows: Vec<RecordRow> = records
            .iter()
            .map(|r| RecordRow {
                date: r.date.format("%Y-%m-%d").to_string(),
                old: r.old_target,
                new: r.new_target,
                change: format!("{:+}", r.new_target - r.old_target),
                confidence: r.confidence.as_str().to_string(),
                reason: r.reason.clone(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}
