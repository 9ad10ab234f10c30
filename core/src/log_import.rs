use std::collections::HashSet;
use std::io::Read;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use crate::db::Database;
use crate::models::{NewFoodEntry, NewWeightEntry, WeightUnit};

/// Which kind of log a CSV file contains, decided by its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Food,
    Weight,
}

/// A single row parsed from a food-log CSV export.
#[derive(Debug, Clone)]
pub struct FoodRow {
    pub date: String,
    pub meal: String,
    pub items: Vec<String>,
    pub calories: f64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

/// A single row parsed from a weight-log CSV export.
#[derive(Debug, Clone)]
pub struct WeightRow {
    pub date: String,
    pub weight: f64,
    pub unit: String,
}

/// Summary of what a log import would do / did.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub rows_parsed: usize,
    pub food_logged: usize,
    pub weights_logged: usize,
    pub dates_spanned: usize,
}

/// Decide whether a CSV export holds food or weight rows from its header.
///
/// Food exports carry a `Calories` column, weight exports a `Weight` column.
pub fn detect_log_kind(headers: &csv::StringRecord) -> Result<LogKind> {
    let has = |name: &str| headers.iter().any(|h| h.eq_ignore_ascii_case(name));
    if has("Calories") {
        Ok(LogKind::Food)
    } else if has("Weight") {
        Ok(LogKind::Weight)
    } else {
        bail!("Unrecognized CSV: expected a 'Calories' or 'Weight' column")
    }
}

/// Rows from a CSV export, typed by what the header announced.
#[derive(Debug, Clone)]
pub enum ParsedLog {
    Food(Vec<FoodRow>),
    Weight(Vec<WeightRow>),
}

/// Parse a CSV export, deciding from the header whether it holds food or
/// weight rows.
pub fn parse_log_csv(data: &[u8]) -> Result<ParsedLog> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);
    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    match detect_log_kind(&headers)? {
        LogKind::Food => Ok(ParsedLog::Food(parse_food_csv(data)?)),
        LogKind::Weight => Ok(ParsedLog::Weight(parse_weight_csv(data)?)),
    }
}

/// Parse a food-log CSV export from any reader.
///
/// Expected header:
/// `Date,Meal,Items,Calories,Protein (g),Carbs (g),Fat (g)`
///
/// `Items` is a semicolon-separated list; columns after `Calories` are optional.
pub fn parse_food_csv<R: Read>(reader: R) -> Result<Vec<FoodRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_date = col("Date").context("Missing 'Date' column")?;
    let idx_meal = col("Meal").context("Missing 'Meal' column")?;
    let idx_cal = col("Calories").context("Missing 'Calories' column")?;
    let idx_items = col("Items");
    let idx_protein = col("Protein (g)");
    let idx_carbs = col("Carbs (g)");
    let idx_fat = col("Fat (g)");

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        let date = record.get(idx_date).unwrap_or("").trim().to_string();
        if date.is_empty() {
            continue; // skip blank rows
        }

        let meal = record.get(idx_meal).unwrap_or("").trim().to_string();

        let items = idx_items
            .and_then(|i| record.get(i))
            .map(|v| {
                v.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let parse_opt_f64 = |idx: Option<usize>| -> Option<f64> {
            idx.and_then(|i| record.get(i))
                .and_then(|v| v.trim().parse::<f64>().ok())
        };

        let calories = parse_opt_f64(Some(idx_cal)).unwrap_or(0.0);

        rows.push(FoodRow {
            date,
            meal,
            items,
            calories,
            protein: parse_opt_f64(idx_protein),
            carbs: parse_opt_f64(idx_carbs),
            fat: parse_opt_f64(idx_fat),
        });
    }

    Ok(rows)
}

/// Parse a weight-log CSV export from any reader.
///
/// Expected header: `Date,Weight,Unit`. `Unit` is optional and defaults to kg.
pub fn parse_weight_csv<R: Read>(reader: R) -> Result<Vec<WeightRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_date = col("Date").context("Missing 'Date' column")?;
    let idx_weight = col("Weight").context("Missing 'Weight' column")?;
    let idx_unit = col("Unit");

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        let date = record.get(idx_date).unwrap_or("").trim().to_string();
        if date.is_empty() {
            continue;
        }

        let weight_raw = record.get(idx_weight).unwrap_or("").trim();
        let weight = weight_raw
            .parse::<f64>()
            .with_context(|| format!("Invalid weight '{weight_raw}' on CSV row {}", line_num + 2))?;

        let unit = idx_unit
            .and_then(|i| record.get(i))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "kg".to_string());

        rows.push(WeightRow { date, weight, unit });
    }

    Ok(rows)
}

/// Normalize an exported meal name to one of bob's valid meal labels.
#[must_use]
pub fn normalize_meal_label(meal: &str) -> &'static str {
    match meal.to_lowercase().as_str() {
        "breakfast" => "breakfast",
        "lunch" => "lunch",
        "dinner" => "dinner",
        _ => "snack",
    }
}

/// Normalize an exported date to a `NaiveDate`.
///
/// Accepts `YYYY-MM-DD`, `M/D/YYYY`, and `D/M/YYYY`.
fn normalize_date(raw: &str) -> Result<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Ok(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Ok(d);
    }
    bail!("Cannot parse date: '{raw}'")
}

/// Import parsed food rows for one user.
///
/// Returns an `ImportSummary`. When `dry_run` is true, no data is written.
pub fn import_food_rows(
    db: &Database,
    user_id: i64,
    rows: &[FoodRow],
    dry_run: bool,
) -> Result<ImportSummary> {
    let mut food_logged: usize = 0;
    let mut dates: HashSet<NaiveDate> = HashSet::new();

    for row in rows {
        let date = normalize_date(&row.date)?;
        dates.insert(date);

        if !dry_run {
            db.insert_food(
                user_id,
                &NewFoodEntry {
                    date,
                    meal_label: normalize_meal_label(&row.meal).to_string(),
                    items: row.items.clone(),
                    total_calories: row.calories,
                    total_protein: row.protein,
                    total_carbs: row.carbs,
                    total_fat: row.fat,
                },
            )?;
        }
        food_logged += 1;
    }

    Ok(ImportSummary {
        rows_parsed: rows.len(),
        food_logged,
        weights_logged: 0,
        dates_spanned: dates.len(),
    })
}

/// Import parsed weight rows for one user.
pub fn import_weight_rows(
    db: &Database,
    user_id: i64,
    rows: &[WeightRow],
    dry_run: bool,
) -> Result<ImportSummary> {
    let mut weights_logged: usize = 0;
    let mut dates: HashSet<NaiveDate> = HashSet::new();

    for row in rows {
        let date = normalize_date(&row.date)?;
        let unit = WeightUnit::parse(&row.unit)?;
        crate::models::validate_weight(row.weight)?;
        dates.insert(date);

        if !dry_run {
            db.insert_weight(
                user_id,
                &NewWeightEntry {
                    date,
                    weight: row.weight,
                    unit,
                },
            )?;
        }
        weights_logged += 1;
    }

    Ok(ImportSummary {
        rows_parsed: rows.len(),
        food_logged: 0,
        weights_logged,
        dates_spanned: dates.len(),
    })
}
