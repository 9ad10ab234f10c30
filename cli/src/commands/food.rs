use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bob_core::models::NewFoodEntry;
use bob_core::service::BobService;

use super::helpers::{parse_date, truncate};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_food_log(
    svc: &BobService,
    user: &str,
    meal: &str,
    items: &[String],
    calories: f64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;

    let entry = svc.log_food(
        user,
        &NewFoodEntry {
            date,
            meal_label: meal.to_string(),
            items: items.to_vec(),
            total_calories: calories,
            total_protein: protein,
            total_carbs: carbs,
            total_fat: fat,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged {} for {} on {}: {:.0} kcal",
            entry.meal_label,
            user,
            entry.date.format("%Y-%m-%d"),
            entry.total_calories
        );
        if !entry.items.is_empty() {
            println!("  Items: {}", entry.items.join(", "));
        }
    }

    Ok(())
}

pub(crate) fn cmd_food_summary(
    svc: &BobService,
    user: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let summary = svc.day_summary(user, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Summary for {} on {}", user, date.format("%Y-%m-%d"));

    if summary.entries.is_empty() {
        eprintln!("Nothing logged yet. Use `bob food log` to record a meal.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Items")]
        items: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "P (g)")]
        protein: String,
        #[tabled(rename = "C (g)")]
        carbs: String,
        #[tabled(rename = "F (g)")]
        fat: String,
    }

    let fmt_opt = |v: Option<f64>| v.map_or("-".into(), |v| format!("{v:.1}"));

    let rows: Vec<EntryRow> = summary
        .entries
        .iter()
        .map(|e| EntryRow {
            id: e.id,
            meal: e.meal_label.clone(),
            items: truncate(&e.items.join(", "), 40),
            calories: format!("{:.0}", e.total_calories),
            protein: fmt_opt(e.total_protein),
            carbs: fmt_opt(e.total_carbs),
            fat: fmt_opt(e.total_fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    println!(
        "Total: {:.0} kcal  (P {:.1}g / C {:.1}g / F {:.1}g)",
        summary.total_calories, summary.total_protein, summary.total_carbs, summary.total_fat
    );
    if let Some(target) = summary.target {
        #[allow(clippy::cast_precision_loss)]
        let remaining = target as f64 - summary.total_calories;
        if remaining >= 0.0 {
            println!("Target: {target} kcal — {remaining:.0} remaining");
        } else {
            println!("Target: {target} kcal — {:.0} over", -remaining);
        }
    }

    Ok(())
}

pub(crate) fn cmd_food_history(
    svc: &BobService,
    user: &str,
    days: Option<u32>,
    json: bool,
) -> Result<()> {
    let entries = svc.food_history(user, days.map(i64::from))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No food entries found.");
    } else {
        #[derive(Tabled)]
        struct HistoryRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Meal")]
            meal: String,
            #[tabled(rename = "Calories")]
            calories: String,
        }

        let rows: Vec<HistoryRow> = entries
            .iter()
            .map(|e| HistoryRow {
                id: e.id,
                date: e.date.format("%Y-%m-%d").to_string(),
                meal: e.meal_label.clone(),
                calories: format!("{:.0}", e.total_calories),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_food_delete(svc: &BobService, id: i64, json: bool) -> Result<()> {
    svc.delete_food(id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted food entry {id}");
    }

    Ok(())
}
