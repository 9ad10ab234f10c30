use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use crate::calibration::{self, DEFAULT_WINDOW_DAYS, WindowData};
use crate::db::Database;
use crate::log_import::{self, FoodRow, ImportSummary, ParsedLog, WeightRow};
use crate::models::{
    CalibrationMetrics, CalibrationRecord, CalibrationResult, CalibrationStatus, DaySummary,
    FoodEntry, NewFoodEntry, NewProfile, NewWeightEntry, Profile, WeightEntry,
    validate_new_food_entry, validate_new_profile, validate_weight,
};

const DEFAULT_USER_KEY: &str = "default_user";

/// Outcome of one user's run inside a batch calibration.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CalibrationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Facade over the database plus the calibration pipeline. The CLI and the
/// API server both go through this so calibration has a single code path.
pub struct BobService {
    db: Database,
}

impl BobService {
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    // --- Profiles ---

    pub fn create_profile(&self, profile: &NewProfile) -> Result<Profile> {
        validate_new_profile(profile)?;
        let normalized = NewProfile {
            name: profile.name.trim().to_string(),
            goal: crate::models::validate_goal(&profile.goal)?,
            daily_calorie_target: profile.daily_calorie_target,
        };
        self.db.create_profile(&normalized)
    }

    pub fn get_profile(&self, name: &str) -> Result<Profile> {
        self.db.get_profile_by_name(name)
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.db.list_profiles()
    }

    /// Manual target edit; not recorded in the calibration audit table.
    pub fn set_target(&self, name: &str, calories: i64) -> Result<Profile> {
        if calories <= 0 {
            anyhow::bail!("Daily calorie target must be greater than 0");
        }
        let profile = self.db.get_profile_by_name(name)?;
        self.db.set_profile_target(profile.id, calories)
    }

    pub fn delete_profile(&self, name: &str) -> Result<bool> {
        let profile = self.db.get_profile_by_name(name)?;
        let deleted = self.db.delete_profile(profile.id)?;
        // Don't leave a dangling default pointing at a deleted profile
        if deleted && self.default_user()?.as_deref() == Some(name) {
            self.db.delete_setting(DEFAULT_USER_KEY)?;
        }
        Ok(deleted)
    }

    pub fn set_default_user(&self, name: &str) -> Result<()> {
        self.db.get_profile_by_name(name)?;
        self.db.set_setting(DEFAULT_USER_KEY, name)
    }

    pub fn default_user(&self) -> Result<Option<String>> {
        self.db.get_setting(DEFAULT_USER_KEY)
    }

    // --- Weight log ---

    pub fn log_weight(&self, name: &str, entry: &NewWeightEntry) -> Result<WeightEntry> {
        validate_weight(entry.weight)?;
        let profile = self.db.get_profile_by_name(name)?;
        self.db.insert_weight(profile.id, entry)
    }

    /// History over the last `days` calendar days ending today, inclusive;
    /// `None` returns everything.
    pub fn weight_history(&self, name: &str, days: Option<i64>) -> Result<Vec<WeightEntry>> {
        let profile = self.db.get_profile_by_name(name)?;
        self.db.weight_history(profile.id, Self::history_cutoff(days))
    }

    pub fn delete_weight(&self, id: i64) -> Result<()> {
        self.db.delete_weight(id)
    }

    fn history_cutoff(days: Option<i64>) -> Option<NaiveDate> {
        days.map(|n| chrono::Local::now().date_naive() - chrono::Duration::days(n - 1))
    }

    // --- Food log ---

    pub fn log_food(&self, name: &str, entry: &NewFoodEntry) -> Result<FoodEntry> {
        validate_new_food_entry(entry)?;
        let profile = self.db.get_profile_by_name(name)?;
        let normalized = NewFoodEntry {
            meal_label: crate::models::validate_meal_label(&entry.meal_label)?,
            ..entry.clone()
        };
        self.db.insert_food(profile.id, &normalized)
    }

    pub fn day_summary(&self, name: &str, date: NaiveDate) -> Result<DaySummary> {
        let profile = self.db.get_profile_by_name(name)?;
        self.db.build_day_summary(profile.id, date)
    }

    /// History over the last `days` calendar days ending today, inclusive.
    /// Days with several meals return all of them; the limit is on days,
    /// never on entry count.
    pub fn food_history(&self, name: &str, days: Option<i64>) -> Result<Vec<FoodEntry>> {
        let profile = self.db.get_profile_by_name(name)?;
        self.db.food_history(profile.id, Self::history_cutoff(days))
    }

    pub fn delete_food(&self, id: i64) -> Result<()> {
        self.db.delete_food(id)
    }

    // --- Log import ---

    /// Import a CSV export, auto-detecting food vs weight rows.
    pub fn import_logs(&self, name: &str, data: &[u8], dry_run: bool) -> Result<ImportSummary> {
        let profile = self.db.get_profile_by_name(name)?;
        match log_import::parse_log_csv(data)? {
            ParsedLog::Food(rows) => {
                log_import::import_food_rows(&self.db, profile.id, &rows, dry_run)
            }
            ParsedLog::Weight(rows) => {
                log_import::import_weight_rows(&self.db, profile.id, &rows, dry_run)
            }
        }
    }

    pub fn import_food_logs(
        &self,
        name: &str,
        rows: &[FoodRow],
        dry_run: bool,
    ) -> Result<ImportSummary> {
        let profile = self.db.get_profile_by_name(name)?;
        log_import::import_food_rows(&self.db, profile.id, rows, dry_run)
    }

    pub fn import_weight_logs(
        &self,
        name: &str,
        rows: &[WeightRow],
        dry_run: bool,
    ) -> Result<ImportSummary> {
        let profile = self.db.get_profile_by_name(name)?;
        log_import::import_weight_rows(&self.db, profile.id, rows, dry_run)
    }

    // --- Calibration ---

    pub fn calibration_history(&self, name: &str) -> Result<Vec<CalibrationRecord>> {
        let profile = self.db.get_profile_by_name(name)?;
        self.db.calibration_history(profile.id)
    }

    /// Run calibration for one user as of today.
    pub fn calibrate(
        &self,
        name: &str,
        window_days: i64,
        dry_run: bool,
    ) -> Result<CalibrationResult> {
        let today = chrono::Local::now().date_naive();
        self.calibrate_on(name, today, window_days, dry_run)
    }

    /// Run calibration for one user over the window ending at `as_of`.
    ///
    /// Aggregates the window, checks data sufficiency, runs the estimator,
    /// and applies any non-zero adjustment together with its audit row in a
    /// single transaction. A run with nothing to adjust performs no writes.
    pub fn calibrate_on(
        &self,
        name: &str,
        as_of: NaiveDate,
        window_days: i64,
        dry_run: bool,
    ) -> Result<CalibrationResult> {
        let profile = self.db.get_profile_by_name(name)?;
        let start = as_of - chrono::Duration::days(window_days - 1);

        let weights = self.db.weights_in_window(profile.id, start, as_of)?;
        let totals = self.db.daily_calorie_totals(profile.id, start, as_of)?;
        let window = WindowData::from_logs(&weights, &totals);

        if let Some(reason) = window.check_sufficiency() {
            return Ok(CalibrationResult::insufficient_data(reason));
        }

        let estimate = calibration::evaluate(profile.daily_calorie_target, &window);
        #[allow(clippy::cast_possible_wrap)]
        let metrics = CalibrationMetrics {
            avg_daily_calories: window.avg_daily_calories(),
            actual_weight_change: window.net_loss_kg(),
            expected_weight_change: estimate.expected_loss_kg,
            logged_days: window.logged_days() as i64,
        };

        // Re-running without new logs must not stack a second adjustment on
        // top of the first: the previous run already consumed this window.
        if let (Some(cal_at), Some(log_at)) = (
            self.db.latest_calibration_at(profile.id)?,
            self.db.latest_log_at(profile.id)?,
        ) {
            if cal_at >= log_at {
                return Ok(CalibrationResult {
                    status: CalibrationStatus::NoAdjustmentNeeded,
                    old_target: None,
                    new_target: None,
                    adjustment: None,
                    reason: "no new data since last calibration".to_string(),
                    confidence: None,
                    metrics: Some(metrics),
                });
            }
        }

        if estimate.adjustment == 0 {
            return Ok(CalibrationResult {
                status: CalibrationStatus::NoAdjustmentNeeded,
                old_target: None,
                new_target: None,
                adjustment: None,
                reason: estimate.reason().to_string(),
                confidence: Some(estimate.confidence),
                metrics: Some(metrics),
            });
        }

        let old_target = profile.daily_calorie_target;
        let new_target = old_target + estimate.adjustment;

        if !dry_run {
            #[allow(clippy::cast_possible_wrap)]
            self.db.apply_calibration(
                profile.id,
                as_of,
                old_target,
                new_target,
                estimate.reason(),
                window.data_points() as i64,
                estimate.confidence,
            )?;
        }

        Ok(CalibrationResult {
            status: CalibrationStatus::Calibrated,
            old_target: Some(old_target),
            new_target: Some(new_target),
            adjustment: Some(estimate.adjustment),
            reason: estimate.reason().to_string(),
            confidence: Some(estimate.confidence),
            metrics: Some(metrics),
        })
    }

    /// Calibrate every profile. One user's failure is captured in its
    /// outcome and never aborts the rest of the batch.
    pub fn calibrate_all(&self, window_days: i64, dry_run: bool) -> Result<Vec<BatchOutcome>> {
        let today = chrono::Local::now().date_naive();
        self.calibrate_all_on(today, window_days, dry_run)
    }

    pub fn calibrate_all_on(
        &self,
        as_of: NaiveDate,
        window_days: i64,
        dry_run: bool,
    ) -> Result<Vec<BatchOutcome>> {
        let profiles = self.db.list_profiles()?;
        let mut outcomes = Vec::with_capacity(profiles.len());
        for profile in profiles {
            match self.calibrate_on(&profile.name, as_of, window_days, dry_run) {
                Ok(result) => outcomes.push(BatchOutcome {
                    user: profile.name,
                    result: Some(result),
                    error: None,
                }),
                Err(e) => outcomes.push(BatchOutcome {
                    user: profile.name,
                    result: None,
                    error: Some(format!("{e:#}")),
                }),
            }
        }
        Ok(outcomes)
    }

    pub fn default_window_days() -> i64 {
        DEFAULT_WINDOW_DAYS
    }
}
