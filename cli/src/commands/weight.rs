use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bob_core::models::{NewWeightEntry, WeightUnit};
use bob_core::service::BobService;

use super::helpers::{no_neg_zero, parse_date};

pub(crate) fn cmd_weight_log(
    svc: &BobService,
    user: &str,
    value: f64,
    unit: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let unit = WeightUnit::parse(unit)?;
    let date = parse_date(date)?;

    let entry = svc.log_weight(
        user,
        &NewWeightEntry {
            date,
            weight: value,
            unit,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let kg = no_neg_zero(entry.unit.to_kg(entry.weight));
        println!(
            "Logged {:.1} {} ({kg:.2} kg) for {} on {}",
            entry.weight,
            entry.unit.as_str(),
            user,
            entry.date.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub(crate) fn cmd_weight_history(
    svc: &BobService,
    user: &str,
    days: Option<u32>,
    json: bool,
) -> Result<()> {
    let entries = svc.weight_history(user, days.map(i64::from))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No weight entries found. Use `bob weight log` to record your weight.");
    } else {
        #[derive(Tabled)]
        struct WeightRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight")]
            weight: String,
            #[tabled(rename = "Unit")]
            unit: String,
            #[tabled(rename = "kg")]
            kg: String,
        }

        let rows: Vec<WeightRow> = entries
            .iter()
            .map(|e| WeightRow {
                id: e.id,
                date: e.date.format("%Y-%m-%d").to_string(),
                weight: format!("{:.1}", e.weight),
                kg: format!("{:.2}", e.unit.to_kg(e.weight)),
                unit: e.unit.as_str().to_string(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_weight_delete(svc: &BobService, id: i64, json: bool) -> Result<()> {
    svc.delete_weight(id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted weight entry {id}");
    }

    Ok(())
}
