//! Energy-balance calibration: compares observed weight change against the
//! change predicted by the user's calorie target and nudges the target in
//! the direction that would have produced the observed outcome.
//!
//! Everything here is pure arithmetic over an aggregated logging window;
//! reading the logs and writing the adjusted target live in `db`/`service`.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{Confidence, WeightEntry};

/// Energy density of body-mass change. Some sources use 7716 kcal/kg;
/// this matches the more common 7700 figure.
pub const KCAL_PER_KG: f64 = 7700.0;

pub const KG_PER_LB: f64 = 0.453_592;

/// Minimum weight entries in the window before any adjustment is considered.
pub const MIN_WEIGHT_ENTRIES: usize = 3;

/// Minimum distinct food-logged days in the window.
pub const MIN_LOGGED_DAYS: usize = 7;

/// Observed-vs-expected differences below this are treated as noise.
pub const DEAD_BAND_KG: f64 = 0.2;

/// Differences above this are reported with high confidence.
pub const HIGH_CONFIDENCE_KG: f64 = 0.5;

/// Per-run caps on the adjustment, asymmetric to dampen oscillation.
pub const MAX_DECREASE_KCAL: i64 = 200;
pub const MAX_INCREASE_KCAL: i64 = 150;

pub const DEFAULT_WINDOW_DAYS: i64 = 14;

/// The aggregated logging window for one user: a chronologically sorted
/// weight series (normalized to kilograms) and day-keyed calorie totals.
#[derive(Debug, Clone)]
pub struct WindowData {
    pub weights_kg: Vec<(NaiveDate, f64)>,
    pub daily_calories: BTreeMap<NaiveDate, f64>,
}

impl WindowData {
    /// Build from raw log rows. Unit normalization happens here, at the
    /// aggregation boundary; the estimator only ever sees kilograms.
    #[must_use]
    pub fn from_logs(weights: &[WeightEntry], day_totals: &[(NaiveDate, f64)]) -> Self {
        let mut weights_kg: Vec<(NaiveDate, f64)> = weights
            .iter()
            .map(|w| (w.date, w.unit.to_kg(w.weight)))
            .collect();
        weights_kg.sort_by_key(|(date, _)| *date);
        let daily_calories = day_totals.iter().copied().collect();
        Self {
            weights_kg,
            daily_calories,
        }
    }

    #[must_use]
    pub fn logged_days(&self) -> usize {
        self.daily_calories.len()
    }

    /// Weight entries plus logged days, reported in the audit record.
    #[must_use]
    pub fn data_points(&self) -> usize {
        self.weights_kg.len() + self.daily_calories.len()
    }

    /// Returns a human-readable reason when the window is too thin to
    /// calibrate from, `None` when it passes the thresholds.
    #[must_use]
    pub fn check_sufficiency(&self) -> Option<String> {
        if self.weights_kg.len() < MIN_WEIGHT_ENTRIES {
            return Some(format!(
                "Need at least {MIN_WEIGHT_ENTRIES} weight entries in the window (found {})",
                self.weights_kg.len()
            ));
        }
        if self.logged_days() < MIN_LOGGED_DAYS {
            return Some(format!(
                "Need at least {MIN_LOGGED_DAYS} food-logged days in the window (found {})",
                self.logged_days()
            ));
        }
        None
    }

    /// Net weight lost over the window in kilograms (first minus last).
    /// Positive means the user lost weight; a gain comes out negative.
    #[must_use]
    pub fn net_loss_kg(&self) -> f64 {
        match (self.weights_kg.first(), self.weights_kg.last()) {
            (Some((_, first)), Some((_, last))) => first - last,
            _ => 0.0,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_daily_calories(&self) -> f64 {
        if self.daily_calories.is_empty() {
            return 0.0;
        }
        self.daily_calories.values().sum::<f64>() / self.daily_calories.len() as f64
    }
}

/// The estimator's proposal. `adjustment` is the signed kcal/day change
/// (zero when the observation matches the prediction within the dead band).
#[derive(Debug, Clone, Copy)]
pub struct Estimate {
    pub adjustment: i64,
    pub expected_loss_kg: f64,
    pub delta_kg: f64,
    pub confidence: Confidence,
}

impl Estimate {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        if self.adjustment == 0 {
            "matches expectation"
        } else if self.delta_kg > 0.0 {
            "lost more weight than expected"
        } else {
            "lost less weight than expected"
        }
    }
}

/// Negative-feedback control policy over one logging window.
///
/// `expected = (target − avg_intake) × days / 7700` is the predicted loss;
/// `delta = actual − expected`. Within the dead band nothing changes.
/// Otherwise the target moves by `|delta| × 7700 / days` kcal/day, capped at
/// −200/+150 so a single noisy window cannot swing the target far.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate(
    daily_target: i64,
    avg_intake: f64,
    logged_days: usize,
    actual_loss_kg: f64,
) -> Estimate {
    let days = logged_days as f64;
    let expected_loss_kg = (daily_target as f64 - avg_intake) * days / KCAL_PER_KG;
    let delta_kg = actual_loss_kg - expected_loss_kg;

    let confidence = if delta_kg.abs() > HIGH_CONFIDENCE_KG {
        Confidence::High
    } else {
        Confidence::Medium
    };

    let adjustment = if delta_kg.abs() < DEAD_BAND_KG {
        0
    } else {
        let magnitude = (delta_kg.abs() * KCAL_PER_KG / days).round() as i64;
        if delta_kg > 0.0 {
            // Lost more than predicted: the target was too conservative.
            -magnitude.min(MAX_DECREASE_KCAL)
        } else {
            magnitude.min(MAX_INCREASE_KCAL)
        }
    };

    Estimate {
        adjustment,
        expected_loss_kg,
        delta_kg,
        confidence,
    }
}

/// Convenience wrapper running the estimator against an aggregated window.
#[must_use]
pub fn evaluate(daily_target: i64, window: &WindowData) -> Estimate {
    estimate(
        daily_target,
        window.avg_daily_calories(),
        window.logged_days(),
        window.net_loss_kg(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeightUnit;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn weight_entry(day: u32, weight: f64, unit: WeightUnit) -> WeightEntry {
        WeightEntry {
            id: i64::from(day),
            uuid: String::new(),
            user_id: 1,
            date: date(day),
            weight,
            unit,
            created_at: String::new(),
        }
    }

    fn totals(days: u32, calories: f64) -> Vec<(NaiveDate, f64)> {
        (1..=days).map(|d| (date(d), calories)).collect()
    }

    // 2000 target, 1800 average over 14 days, 0.3 kg lost. Expected loss
    // is about 0.364 kg, delta about -0.064 kg.
    #[test]
    fn test_estimate_within_dead_band_no_adjustment() {
        let e = estimate(2000, 1800.0, 14, 0.3);
        assert_eq!(e.adjustment, 0);
        assert_eq!(e.reason(), "matches expectation");
        assert!((e.expected_loss_kg - 0.363_636).abs() < 1e-4);
        assert!((e.delta_kg - (-0.063_636)).abs() < 1e-4);
    }

    // Same intake but only 0.1 kg lost: delta is about -0.264 kg, so the
    // target rises by round(0.264 * 7700 / 14) = 145 kcal/day, medium
    // confidence.
    #[test]
    fn test_estimate_lost_less_than_expected_increases_target() {
        let e = estimate(2000, 1800.0, 14, 0.1);
        assert_eq!(e.adjustment, 145);
        assert_eq!(e.reason(), "lost less weight than expected");
        assert_eq!(e.confidence, Confidence::Medium);
    }

    #[test]
    fn test_estimate_lost_more_than_expected_decreases_target() {
        // Lost a full kilo against an expected 0.364: delta ≈ +0.636.
        let e = estimate(2000, 1800.0, 14, 1.0);
        assert!(e.adjustment < 0);
        assert_eq!(e.reason(), "lost more weight than expected");
        assert_eq!(e.confidence, Confidence::High);
    }

    #[test]
    fn test_estimate_decrease_capped_at_200() {
        // Massive unexplained loss; uncapped this would be thousands.
        let e = estimate(2000, 2000.0, 7, 5.0);
        assert_eq!(e.adjustment, -MAX_DECREASE_KCAL);
    }

    #[test]
    fn test_estimate_increase_capped_at_150() {
        // Large gain while eating at target.
        let e = estimate(2000, 2000.0, 7, -5.0);
        assert_eq!(e.adjustment, MAX_INCREASE_KCAL);
    }

    #[test]
    fn test_estimate_dead_band_boundary() {
        // Intake equals target so expected loss is zero and delta is the
        // actual change itself. 0.19 is inside the band, 0.21 is not.
        assert_eq!(estimate(2000, 2000.0, 14, 0.19).adjustment, 0);
        assert_ne!(estimate(2000, 2000.0, 14, 0.21).adjustment, 0);
    }

    #[test]
    fn test_estimate_confidence_thresholds() {
        assert_eq!(estimate(2000, 2000.0, 14, 0.4).confidence, Confidence::Medium);
        assert_eq!(estimate(2000, 2000.0, 14, 0.6).confidence, Confidence::High);
        assert_eq!(estimate(2000, 2000.0, 14, -0.6).confidence, Confidence::High);
    }

    #[test]
    fn test_window_net_loss() {
        let weights = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(8, 79.8, WeightUnit::Kg),
            weight_entry(14, 79.7, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(14, 1800.0));
        assert!((window.net_loss_kg() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_window_net_loss_negative_for_gain() {
        let weights = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(7, 80.4, WeightUnit::Kg),
            weight_entry(14, 80.5, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(14, 2500.0));
        assert!((window.net_loss_kg() - (-0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_window_sorts_unordered_weights() {
        let weights = vec![
            weight_entry(14, 79.7, WeightUnit::Kg),
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(8, 79.8, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(14, 1800.0));
        assert!((window.net_loss_kg() - 0.3).abs() < 1e-9);
    }

    // A series logged entirely in lbs must produce the same net change in
    // kilograms as the identical series logged in kg.
    #[test]
    fn test_window_unit_conversion_consistency() {
        let kg_series = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(8, 79.5, WeightUnit::Kg),
            weight_entry(14, 79.0, WeightUnit::Kg),
        ];
        let lbs_series = vec![
            weight_entry(1, 80.0 / KG_PER_LB, WeightUnit::Lbs),
            weight_entry(8, 79.5 / KG_PER_LB, WeightUnit::Lbs),
            weight_entry(14, 79.0 / KG_PER_LB, WeightUnit::Lbs),
        ];
        let kg_window = WindowData::from_logs(&kg_series, &totals(14, 1800.0));
        let lbs_window = WindowData::from_logs(&lbs_series, &totals(14, 1800.0));
        assert!((kg_window.net_loss_kg() - lbs_window.net_loss_kg()).abs() < 1e-9);
    }

    #[test]
    fn test_window_mixed_units() {
        let weights = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(8, 176.0, WeightUnit::Lbs),
            weight_entry(14, 79.0, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(14, 1800.0));
        assert!((window.net_loss_kg() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_avg_daily_calories() {
        let mut day_totals = totals(10, 1800.0);
        day_totals.push((date(11), 2300.0));
        let window = WindowData::from_logs(&[], &day_totals);
        let expected = (1800.0 * 10.0 + 2300.0) / 11.0;
        assert!((window.avg_daily_calories() - expected).abs() < 1e-9);
        assert_eq!(window.logged_days(), 11);
    }

    #[test]
    fn test_window_empty_is_safe() {
        let window = WindowData::from_logs(&[], &[]);
        assert!((window.net_loss_kg()).abs() < f64::EPSILON);
        assert!((window.avg_daily_calories()).abs() < f64::EPSILON);
        assert_eq!(window.data_points(), 0);
    }

    #[test]
    fn test_sufficiency_requires_three_weights() {
        let weights = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(14, 79.7, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(14, 1800.0));
        let reason = window.check_sufficiency().unwrap();
        assert!(reason.contains("weight entries"));
        assert!(reason.contains("found 2"));
    }

    #[test]
    fn test_sufficiency_requires_seven_logged_days() {
        let weights = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(8, 79.8, WeightUnit::Kg),
            weight_entry(14, 79.7, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(6, 1800.0));
        let reason = window.check_sufficiency().unwrap();
        assert!(reason.contains("food-logged days"));
        assert!(reason.contains("found 6"));
    }

    #[test]
    fn test_sufficiency_passes_at_thresholds() {
        let weights = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(8, 79.8, WeightUnit::Kg),
            weight_entry(14, 79.7, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(7, 1800.0));
        assert!(window.check_sufficiency().is_none());
    }

    #[test]
    fn test_evaluate_matches_manual_estimate() {
        let weights = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(8, 79.95, WeightUnit::Kg),
            weight_entry(14, 79.9, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(14, 1800.0));
        let e = evaluate(2000, &window);
        let manual = estimate(2000, 1800.0, 14, 0.1);
        assert_eq!(e.adjustment, manual.adjustment);
        assert_eq!(e.adjustment, 145);
    }

    #[test]
    fn test_data_points_counts_both_series() {
        let weights = vec![
            weight_entry(1, 80.0, WeightUnit::Kg),
            weight_entry(8, 79.8, WeightUnit::Kg),
            weight_entry(14, 79.7, WeightUnit::Kg),
        ];
        let window = WindowData::from_logs(&weights, &totals(10, 1800.0));
        assert_eq!(window.data_points(), 13);
    }
}
