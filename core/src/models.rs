use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A coached user. The daily calorie target is the single mutable field the
/// calibrator touches; every other change comes from explicit user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    pub goal: String,
    pub daily_calorie_target: i64,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub goal: String,
    pub daily_calorie_target: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Kg,
    Lbs,
}

impl WeightUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Lbs => "lbs",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kg" => Ok(Self::Kg),
            "lbs" | "lb" => Ok(Self::Lbs),
            _ => bail!("Invalid unit '{s}'. Use 'kg' or 'lbs'"),
        }
    }

    /// Convert a value in this unit to kilograms (1 lb = 0.453592 kg).
    #[must_use]
    pub fn to_kg(self, value: f64) -> f64 {
        match self {
            Self::Kg => value,
            Self::Lbs => value * crate::calibration::KG_PER_LB,
        }
    }
}

/// A logged body weight. Entries are immutable once created: they can be
/// deleted but never edited, and mixed units across a series are allowed.
#[derive(Debug, Clone, Serialize)]
pub struct WeightEntry {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub date: NaiveDate,
    pub weight: f64,
    pub unit: WeightUnit,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewWeightEntry {
    pub date: NaiveDate,
    pub weight: f64,
    pub unit: WeightUnit,
}

/// A logged meal with its nutrition totals. Immutable; superseded by
/// deletion, never merged.
#[derive(Debug, Clone, Serialize)]
pub struct FoodEntry {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub date: NaiveDate,
    pub meal_label: String,
    pub items: Vec<String>,
    pub total_calories: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_protein: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_carbs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_fat: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFoodEntry {
    pub date: NaiveDate,
    pub meal_label: String,
    pub items: Vec<String>,
    pub total_calories: f64,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fat: Option<f64>,
}

/// One day of food logging, grouped for display.
#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub entries: Vec<FoodEntry>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<i64>,
}

/// Append-only audit row; one per calibration run that applies an adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationRecord {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub date: NaiveDate,
    pub old_target: i64,
    pub new_target: i64,
    pub reason: String,
    pub data_points_analyzed: i64,
    pub confidence: Confidence,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    InsufficientData,
    Calibrated,
    NoAdjustmentNeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => bail!("Invalid confidence '{s}'"),
        }
    }
}

/// Window measurements behind a calibration decision.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationMetrics {
    pub avg_daily_calories: f64,
    pub actual_weight_change: f64,
    pub expected_weight_change: f64,
    pub logged_days: i64,
}

/// The structured outcome of a calibration run, returned to the CLI caller
/// and used verbatim as the API response body.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationResult {
    pub status: CalibrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_target: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_target: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<i64>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CalibrationMetrics>,
}

impl CalibrationResult {
    #[must_use]
    pub fn insufficient_data(reason: String) -> Self {
        Self {
            status: CalibrationStatus::InsufficientData,
            old_target: None,
            new_target: None,
            adjustment: None,
            reason,
            confidence: None,
            metrics: None,
        }
    }
}

pub const GOALS: &[&str] = &["lose", "maintain", "gain"];

pub const MEAL_LABELS: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

pub fn validate_goal(goal: &str) -> Result<String> {
    let lower = goal.to_lowercase();
    if GOALS.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!("Invalid goal '{goal}'. Must be one of: {}", GOALS.join(", "))
    }
}

pub fn validate_meal_label(label: &str) -> Result<String> {
    let lower = label.to_lowercase();
    if MEAL_LABELS.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!(
            "Invalid meal label '{label}'. Must be one of: {}",
            MEAL_LABELS.join(", ")
        )
    }
}

/// Validate a new profile: non-empty name, known goal, positive target.
pub fn validate_new_profile(profile: &NewProfile) -> Result<()> {
    if profile.name.trim().is_empty() {
        bail!("Profile name must not be empty");
    }
    validate_goal(&profile.goal)?;
    if profile.daily_calorie_target <= 0 {
        bail!("Daily calorie target must be greater than 0");
    }
    Ok(())
}

pub fn validate_weight(weight: f64) -> Result<()> {
    if weight <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    Ok(())
}

/// Validate a new food entry: known meal label, non-negative totals.
pub fn validate_new_food_entry(entry: &NewFoodEntry) -> Result<()> {
    validate_meal_label(&entry.meal_label)?;
    if entry.total_calories < 0.0 {
        bail!("total_calories must not be negative");
    }
    if entry.total_protein.is_some_and(|v| v < 0.0) {
        bail!("total_protein must not be negative");
    }
    if entry.total_carbs.is_some_and(|v| v < 0.0) {
        bail!("total_carbs must not be negative");
    }
    if entry.total_fat.is_some_and(|v| v < 0.0) {
        bail!("total_fat must not be negative");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_unit_parse() {
        assert_eq!(WeightUnit::parse("kg").unwrap(), WeightUnit::Kg);
        assert_eq!(WeightUnit::parse("KG").unwrap(), WeightUnit::Kg);
        assert_eq!(WeightUnit::parse("lbs").unwrap(), WeightUnit::Lbs);
        assert_eq!(WeightUnit::parse("lb").unwrap(), WeightUnit::Lbs);
        assert!(WeightUnit::parse("stone").is_err());
        assert!(WeightUnit::parse("").is_err());
    }

    #[test]
    fn test_weight_unit_to_kg() {
        assert!((WeightUnit::Kg.to_kg(80.0) - 80.0).abs() < f64::EPSILON);
        assert!((WeightUnit::Lbs.to_kg(1.0) - 0.453_592).abs() < 1e-9);
        assert!((WeightUnit::Lbs.to_kg(176.37) - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_goal() {
        assert_eq!(validate_goal("lose").unwrap(), "lose");
        assert_eq!(validate_goal("Maintain").unwrap(), "maintain");
        assert_eq!(validate_goal("GAIN").unwrap(), "gain");
        assert!(validate_goal("bulk").is_err());
        assert!(validate_goal("").is_err());
    }

    #[test]
    fn test_validate_meal_label() {
        assert_eq!(validate_meal_label("breakfast").unwrap(), "breakfast");
        assert_eq!(validate_meal_label("Lunch").unwrap(), "lunch");
        assert!(validate_meal_label("brunch").is_err());
    }

    #[test]
    fn test_validate_new_profile() {
        let good = NewProfile {
            name: "alice".to_string(),
            goal: "lose".to_string(),
            daily_calorie_target: 2000,
        };
        assert!(validate_new_profile(&good).is_ok());

        let empty_name = NewProfile {
            name: "  ".to_string(),
            ..good.clone()
        };
        assert!(validate_new_profile(&empty_name).is_err());

        let bad_goal = NewProfile {
            goal: "shred".to_string(),
            ..good.clone()
        };
        assert!(validate_new_profile(&bad_goal).is_err());

        let zero_target = NewProfile {
            daily_calorie_target: 0,
            ..good
        };
        assert!(validate_new_profile(&zero_target).is_err());
    }

    #[test]
    fn test_validate_weight() {
        assert!(validate_weight(75.0).is_ok());
        assert!(validate_weight(0.0).is_err());
        assert!(validate_weight(-5.0).is_err());
    }

    #[test]
    fn test_validate_new_food_entry() {
        let entry = NewFoodEntry {
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            meal_label: "lunch".to_string(),
            items: vec!["chicken wrap".to_string()],
            total_calories: 520.0,
            total_protein: Some(35.0),
            total_carbs: Some(40.0),
            total_fat: Some(22.0),
        };
        assert!(validate_new_food_entry(&entry).is_ok());

        let bad_label = NewFoodEntry {
            meal_label: "elevenses".to_string(),
            ..entry.clone()
        };
        assert!(validate_new_food_entry(&bad_label).is_err());

        let negative_cal = NewFoodEntry {
            total_calories: -100.0,
            ..entry.clone()
        };
        assert!(validate_new_food_entry(&negative_cal).is_err());

        let negative_protein = NewFoodEntry {
            total_protein: Some(-1.0),
            ..entry
        };
        assert!(validate_new_food_entry(&negative_protein).is_err());
    }

    #[test]
    fn test_calibration_result_serializes_snake_case() {
        let result = CalibrationResult::insufficient_data(
            "Need at least 3 weight entries (found 1)".to_string(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        // Optional fields are omitted entirely, not null
        assert!(json.get("old_target").is_none());
        assert!(json.get("metrics").is_none());
    }

    #[test]
    fn test_confidence_roundtrip() {
        for c in [Confidence::High, Confidence::Medium, Confidence::Low] {
            assert_eq!(Confidence::parse(c.as_str()).unwrap(), c);
        }
        assert!(Confidence::parse("certain").is_err());
    }
}
