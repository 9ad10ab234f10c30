use std::path::Path;

use anyhow::{Context, Result};

use bob_core::service::BobService;

pub(crate) fn cmd_import_logs(
    svc: &BobService,
    user: &str,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = svc.import_logs(user, &data, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "No rows found in CSV file" })
            );
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "rows_parsed": summary.rows_parsed,
                "food_logged": summary.food_logged,
                "weights_logged": summary.weights_logged,
                "dates_spanned": summary.dates_spanned,
            })
        );
    } else if dry_run {
        println!("Dry run — no changes made.\n");
        println!("  Rows parsed:    {}", summary.rows_parsed);
        println!("  Meals to log:   {}", summary.food_logged);
        println!("  Weights to log: {}", summary.weights_logged);
        println!("  Dates spanned:  {}", summary.dates_spanned);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:    {}", summary.rows_parsed);
        println!("  Meals logged:   {}", summary.food_logged);
        println!("  Weights logged: {}", summary.weights_logged);
        println!("  Dates spanned:  {}", summary.dates_spanned);
    }

    Ok(())
}
