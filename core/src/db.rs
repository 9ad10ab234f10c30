use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::models::{
    CalibrationRecord, Confidence, DaySummary, FoodEntry, NewFoodEntry, NewProfile, NewWeightEntry,
    Profile, WeightEntry, WeightUnit,
};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    name TEXT NOT NULL UNIQUE,
                    goal TEXT NOT NULL,
                    daily_calorie_target INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS weight_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    date TEXT NOT NULL,
                    weight REAL NOT NULL,
                    unit TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    date TEXT NOT NULL,
                    meal_label TEXT NOT NULL,
                    items TEXT NOT NULL DEFAULT '[]',
                    total_calories REAL NOT NULL,
                    total_protein REAL,
                    total_carbs REAL,
                    total_fat REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS calibration_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    date TEXT NOT NULL,
                    old_target INTEGER NOT NULL,
                    new_target INTEGER NOT NULL,
                    reason TEXT NOT NULL,
                    data_points_analyzed INTEGER NOT NULL,
                    confidence TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_weight_entries_user_date ON weight_entries(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_food_entries_user_date ON food_entries(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_calibration_records_user ON calibration_records(user_id, created_at);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            goal: row.get(3)?,
            daily_calorie_target: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    // A date column that fails to parse means the row is corrupt; surface
    // that instead of feeding a made-up date into the calibration window.
    fn parse_date_col(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn weight_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
        let date_str: String = row.get(3)?;
        let unit_str: String = row.get(5)?;
        let unit = if unit_str == "lbs" {
            WeightUnit::Lbs
        } else {
            WeightUnit::Kg
        };
        Ok(WeightEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            date: Self::parse_date_col(3, &date_str)?,
            weight: row.get(4)?,
            unit,
            created_at: row.get(6)?,
        })
    }

    fn food_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodEntry> {
        let date_str: String = row.get(3)?;
        let items_json: String = row.get(5)?;
        let items: Vec<String> = serde_json::from_str(&items_json).unwrap_or_default();
        Ok(FoodEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            date: Self::parse_date_col(3, &date_str)?,
            meal_label: row.get(4)?,
            items,
            total_calories: row.get(6)?,
            total_protein: row.get(7)?,
            total_carbs: row.get(8)?,
            total_fat: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn calibration_record_from_row(row: &rusqlite::Row) -> rusqlite::Result<CalibrationRecord> {
        let date_str: String = row.get(3)?;
        let confidence_str: String = row.get(8)?;
        let confidence = Confidence::parse(&confidence_str).unwrap_or(Confidence::Low);
        Ok(CalibrationRecord {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            date: Self::parse_date_col(3, &date_str)?,
            old_target: row.get(4)?,
            new_target: row.get(5)?,
            reason: row.get(6)?,
            data_points_analyzed: row.get(7)?,
            confidence,
            created_at: row.get(9)?,
        })
    }

    // --- Profiles ---

    pub fn create_profile(&self, profile: &NewProfile) -> Result<Profile> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO users (uuid, name, goal, daily_calorie_target, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    uuid,
                    profile.name,
                    profile.goal,
                    profile.daily_calorie_target,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("Failed to create profile '{}'", profile.name))?;
        let id = self.conn.last_insert_rowid();
        self.get_profile_by_id(id)
    }

    pub fn get_profile_by_id(&self, id: i64) -> Result<Profile> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, goal, daily_calorie_target, created_at, updated_at
                 FROM users WHERE id = ?1",
                params![id],
                Self::profile_from_row,
            )
            .context("Profile not found")
    }

    pub fn get_profile_by_name(&self, name: &str) -> Result<Profile> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, goal, daily_calorie_target, created_at, updated_at
                 FROM users WHERE name = ?1",
                params![name],
                Self::profile_from_row,
            )
            .with_context(|| format!("Profile not found: '{name}'"))
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, goal, daily_calorie_target, created_at, updated_at
             FROM users ORDER BY name",
        )?;
        let profiles = stmt
            .query_map([], Self::profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    /// Manual target edit. Bypasses the calibration audit table; automated
    /// adjustments go through [`Database::apply_calibration`] instead.
    pub fn set_profile_target(&self, user_id: i64, calories: i64) -> Result<Profile> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE users SET daily_calorie_target = ?1, updated_at = ?2 WHERE id = ?3",
            params![calories, now, user_id],
        )?;
        if rows == 0 {
            anyhow::bail!("Profile not found");
        }
        self.get_profile_by_id(user_id)
    }

    /// Delete a profile and all of its logs and audit rows.
    pub fn delete_profile(&self, user_id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM weight_entries WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute(
            "DELETE FROM food_entries WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute(
            "DELETE FROM calibration_records WHERE user_id = ?1",
            params![user_id],
        )?;
        let rows = tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // --- Weight entries ---

    pub fn insert_weight(&self, user_id: i64, entry: &NewWeightEntry) -> Result<WeightEntry> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        self.conn.execute(
            "INSERT INTO weight_entries (uuid, user_id, date, weight, unit, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid,
                user_id,
                date_str,
                entry.weight,
                entry.unit.as_str(),
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, uuid, user_id, date, weight, unit, created_at
                 FROM weight_entries WHERE id = ?1",
                params![id],
                Self::weight_entry_from_row,
            )
            .context("Weight entry not found after insert")
    }

    /// Weight entries newest first, optionally restricted to dates on or
    /// after `since`. The cutoff is a calendar date, not an entry count.
    pub fn weight_history(
        &self,
        user_id: i64,
        since: Option<NaiveDate>,
    ) -> Result<Vec<WeightEntry>> {
        let since_str = since.unwrap_or(NaiveDate::MIN).format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, user_id, date, weight, unit, created_at
             FROM weight_entries WHERE user_id = ?1 AND date >= ?2
             ORDER BY date DESC, created_at DESC",
        )?;
        let entries = stmt
            .query_map(params![user_id, since_str], Self::weight_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Weight entries inside `[start, end]`, oldest first. Feeds the
    /// calibration aggregator, which needs chronological order.
    pub fn weights_in_window(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeightEntry>> {
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, user_id, date, weight, unit, created_at
             FROM weight_entries
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC, created_at ASC",
        )?;
        let entries = stmt
            .query_map(
                params![user_id, start_str, end_str],
                Self::weight_entry_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn delete_weight(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM weight_entries WHERE id = ?1", params![id])?;
        if rows == 0 {
            anyhow::bail!("Weight entry not found");
        }
        Ok(())
    }

    // --- Food entries ---

    pub fn insert_food(&self, user_id: i64, entry: &NewFoodEntry) -> Result<FoodEntry> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        let items_json = serde_json::to_string(&entry.items)?;
        self.conn.execute(
            "INSERT INTO food_entries (uuid, user_id, date, meal_label, items, total_calories,
                                       total_protein, total_carbs, total_fat, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                uuid,
                user_id,
                date_str,
                entry.meal_label,
                items_json,
                entry.total_calories,
                entry.total_protein,
                entry.total_carbs,
                entry.total_fat,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_food_entry(id)
    }

    pub fn get_food_entry(&self, id: i64) -> Result<FoodEntry> {
        self.conn
            .query_row(
                "SELECT id, uuid, user_id, date, meal_label, items, total_calories,
                        total_protein, total_carbs, total_fat, created_at
                 FROM food_entries WHERE id = ?1",
                params![id],
                Self::food_entry_from_row,
            )
            .context("Food entry not found")
    }

    pub fn food_for_date(&self, user_id: i64, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, user_id, date, meal_label, items, total_calories,
                    total_protein, total_carbs, total_fat, created_at
             FROM food_entries WHERE user_id = ?1 AND date = ?2
             ORDER BY created_at ASC",
        )?;
        let entries = stmt
            .query_map(params![user_id, date_str], Self::food_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Food entries newest first, optionally restricted to dates on or
    /// after `since`. A day with several meals contributes all of them.
    pub fn food_history(&self, user_id: i64, since: Option<NaiveDate>) -> Result<Vec<FoodEntry>> {
        let since_str = since.unwrap_or(NaiveDate::MIN).format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, user_id, date, meal_label, items, total_calories,
                    total_protein, total_carbs, total_fat, created_at
             FROM food_entries WHERE user_id = ?1 AND date >= ?2
             ORDER BY date DESC, created_at DESC",
        )?;
        let entries = stmt
            .query_map(params![user_id, since_str], Self::food_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Total logged calories per day inside `[start, end]`, one row per
    /// distinct date with at least one food entry.
    pub fn daily_calorie_totals(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT date, SUM(total_calories)
             FROM food_entries
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY date ORDER BY date ASC",
        )?;
        let totals = stmt
            .query_map(params![user_id, start_str, end_str], |row| {
                let date_str: String = row.get(0)?;
                let total: f64 = row.get(1)?;
                Ok((Self::parse_date_col(0, &date_str)?, total))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(totals)
    }

    pub fn delete_food(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM food_entries WHERE id = ?1", params![id])?;
        if rows == 0 {
            anyhow::bail!("Food entry not found");
        }
        Ok(())
    }

    pub fn build_day_summary(&self, user_id: i64, date: NaiveDate) -> Result<DaySummary> {
        let entries = self.food_for_date(user_id, date)?;
        let total_calories: f64 = entries.iter().map(|e| e.total_calories).sum();
        let total_protein: f64 = entries.iter().filter_map(|e| e.total_protein).sum();
        let total_carbs: f64 = entries.iter().filter_map(|e| e.total_carbs).sum();
        let total_fat: f64 = entries.iter().filter_map(|e| e.total_fat).sum();
        let target = self.get_profile_by_id(user_id).ok().map(|p| p.daily_calorie_target);
        Ok(DaySummary {
            date,
            entries,
            total_calories,
            total_protein,
            total_carbs,
            total_fat,
            target,
        })
    }

    // --- Calibration audit ---

    /// Apply a calibration decision: patch the profile target and append the
    /// audit row in one transaction, so the two can never diverge.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_calibration(
        &self,
        user_id: i64,
        date: NaiveDate,
        old_target: i64,
        new_target: i64,
        reason: &str,
        data_points_analyzed: i64,
        confidence: Confidence,
    ) -> Result<CalibrationRecord> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = date.format("%Y-%m-%d").to_string();

        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE users SET daily_calorie_target = ?1, updated_at = ?2 WHERE id = ?3",
            params![new_target, now, user_id],
        )?;
        if rows == 0 {
            anyhow::bail!("Profile not found");
        }
        tx.execute(
            "INSERT INTO calibration_records (uuid, user_id, date, old_target, new_target,
                                              reason, data_points_analyzed, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                uuid,
                user_id,
                date_str,
                old_target,
                new_target,
                reason,
                data_points_analyzed,
                confidence.as_str(),
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        self.conn
            .query_row(
                "SELECT id, uuid, user_id, date, old_target, new_target, reason,
                        data_points_analyzed, confidence, created_at
                 FROM calibration_records WHERE id = ?1",
                params![id],
                Self::calibration_record_from_row,
            )
            .context("Calibration record not found after insert")
    }

    pub fn calibration_history(&self, user_id: i64) -> Result<Vec<CalibrationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, user_id, date, old_target, new_target, reason,
                    data_points_analyzed, confidence, created_at
             FROM calibration_records WHERE user_id = ?1
             ORDER BY created_at DESC",
        )?;
        let records = stmt
            .query_map(params![user_id], Self::calibration_record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Timestamp of the most recent calibration for a user, if any.
    pub fn latest_calibration_at(&self, user_id: i64) -> Result<Option<String>> {
        let result: Option<String> = self.conn.query_row(
            "SELECT MAX(created_at) FROM calibration_records WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(result)
    }

    /// Timestamp of the most recently created log row (weight or food) for a
    /// user. Used to skip re-calibrating when nothing new has been logged.
    pub fn latest_log_at(&self, user_id: i64) -> Result<Option<String>> {
        let result: Option<String> = self.conn.query_row(
            "SELECT MAX(ts) FROM (
                SELECT MAX(created_at) AS ts FROM weight_entries WHERE user_id = ?1
                UNION ALL
                SELECT MAX(created_at) AS ts FROM food_entries WHERE user_id = ?1
            )",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(result)
    }

    // --- Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM user_settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewFoodEntry, NewProfile, NewWeightEntry};

    fn sample_profile() -> NewProfile {
        NewProfile {
            name: "alice".to_string(),
            goal: "lose".to_string(),
            daily_calorie_target: 2000,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn sample_food(day: u32, calories: f64) -> NewFoodEntry {
        NewFoodEntry {
            date: date(day),
            meal_label: "lunch".to_string(),
            items: vec!["salad".to_string(), "bread".to_string()],
            total_calories: calories,
            total_protein: Some(30.0),
            total_carbs: Some(45.0),
            total_fat: Some(15.0),
        }
    }

    #[test]
    fn test_create_and_get_profile() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        assert_eq!(profile.name, "alice");
        assert_eq!(profile.goal, "lose");
        assert_eq!(profile.daily_calorie_target, 2000);
        assert!(!profile.uuid.is_empty());

        let by_name = db.get_profile_by_name("alice").unwrap();
        assert_eq!(by_name.id, profile.id);
        let by_id = db.get_profile_by_id(profile.id).unwrap();
        assert_eq!(by_id.name, "alice");
    }

    #[test]
    fn test_profile_name_unique() {
        let db = Database::open_in_memory().unwrap();
        db.create_profile(&sample_profile()).unwrap();
        assert!(db.create_profile(&sample_profile()).is_err());
    }

    #[test]
    fn test_get_profile_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.get_profile_by_name("nobody").unwrap_err();
        assert!(err.to_string().contains("Profile not found"));
    }

    #[test]
    fn test_list_profiles_sorted_by_name() {
        let db = Database::open_in_memory().unwrap();
        db.create_profile(&NewProfile {
            name: "zoe".to_string(),
            goal: "gain".to_string(),
            daily_calorie_target: 2600,
        })
        .unwrap();
        db.create_profile(&sample_profile()).unwrap();

        let profiles = db.list_profiles().unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name, "alice");
        assert_eq!(profiles[1].name, "zoe");
    }

    #[test]
    fn test_set_profile_target() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        let updated = db.set_profile_target(profile.id, 1850).unwrap();
        assert_eq!(updated.daily_calorie_target, 1850);
        assert!(db.set_profile_target(999, 1850).is_err());
    }

    #[test]
    fn test_delete_profile_cascades() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();
        db.insert_weight(
            profile.id,
            &NewWeightEntry {
                date: date(1),
                weight: 80.0,
                unit: WeightUnit::Kg,
            },
        )
        .unwrap();
        db.insert_food(profile.id, &sample_food(1, 600.0)).unwrap();

        assert!(db.delete_profile(profile.id).unwrap());
        assert!(db.get_profile_by_name("alice").is_err());
        assert!(db.weight_history(profile.id, None).unwrap().is_empty());
        assert!(db.food_history(profile.id, None).unwrap().is_empty());

        // Deleting again reports nothing deleted
        assert!(!db.delete_profile(profile.id).unwrap());
    }

    #[test]
    fn test_insert_and_list_weight() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        let entry = db
            .insert_weight(
                profile.id,
                &NewWeightEntry {
                    date: date(1),
                    weight: 176.0,
                    unit: WeightUnit::Lbs,
                },
            )
            .unwrap();
        assert_eq!(entry.unit, WeightUnit::Lbs);
        assert!((entry.weight - 176.0).abs() < f64::EPSILON);

        let history = db.weight_history(profile.id, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, entry.id);
    }

    #[test]
    fn test_weight_history_scoped_to_user() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_profile(&sample_profile()).unwrap();
        let bob = db
            .create_profile(&NewProfile {
                name: "bob".to_string(),
                goal: "maintain".to_string(),
                daily_calorie_target: 2400,
            })
            .unwrap();

        db.insert_weight(
            alice.id,
            &NewWeightEntry {
                date: date(1),
                weight: 70.0,
                unit: WeightUnit::Kg,
            },
        )
        .unwrap();

        assert_eq!(db.weight_history(alice.id, None).unwrap().len(), 1);
        assert!(db.weight_history(bob.id, None).unwrap().is_empty());
    }

    #[test]
    fn test_weight_history_since_is_a_date_cutoff() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        for day in [1, 5, 10] {
            db.insert_weight(
                profile.id,
                &NewWeightEntry {
                    date: date(day),
                    weight: 80.0,
                    unit: WeightUnit::Kg,
                },
            )
            .unwrap();
        }

        let recent = db.weight_history(profile.id, Some(date(5))).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].date, date(10));
        assert_eq!(recent[1].date, date(5));
    }

    #[test]
    fn test_weight_history_corrupt_date_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        db.conn
            .execute(
                "INSERT INTO weight_entries (uuid, user_id, date, weight, unit, created_at)
                 VALUES ('u', ?1, 'not-a-date', 80.0, 'kg', 'now')",
                params![profile.id],
            )
            .unwrap();

        assert!(db.weight_history(profile.id, None).is_err());
    }

    #[test]
    fn test_weights_in_window_chronological() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        for (day, weight) in [(14, 79.7), (1, 80.0), (8, 79.8)] {
            db.insert_weight(
                profile.id,
                &NewWeightEntry {
                    date: date(day),
                    weight,
                    unit: WeightUnit::Kg,
                },
            )
            .unwrap();
        }

        let window = db.weights_in_window(profile.id, date(1), date(14)).unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].date, date(1));
        assert_eq!(window[2].date, date(14));

        // Window bounds are inclusive; out-of-window entries are excluded
        let partial = db.weights_in_window(profile.id, date(2), date(13)).unwrap();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial[0].date, date(8));
    }

    #[test]
    fn test_delete_weight() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();
        let entry = db
            .insert_weight(
                profile.id,
                &NewWeightEntry {
                    date: date(1),
                    weight: 80.0,
                    unit: WeightUnit::Kg,
                },
            )
            .unwrap();

        db.delete_weight(entry.id).unwrap();
        assert!(db.weight_history(profile.id, None).unwrap().is_empty());
        assert!(db.delete_weight(entry.id).is_err());
    }

    #[test]
    fn test_insert_food_round_trips_items() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        let entry = db.insert_food(profile.id, &sample_food(1, 600.0)).unwrap();
        assert_eq!(entry.items, vec!["salad", "bread"]);
        assert!((entry.total_calories - 600.0).abs() < f64::EPSILON);

        let fetched = db.get_food_entry(entry.id).unwrap();
        assert_eq!(fetched.items, entry.items);
        assert_eq!(fetched.meal_label, "lunch");
    }

    // Several meals on one day must not eat into the date window: the
    // cutoff filters by date, so every meal on an included day comes back.
    #[test]
    fn test_food_history_since_keeps_all_meals_per_day() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        db.insert_food(profile.id, &sample_food(10, 400.0)).unwrap();
        db.insert_food(profile.id, &sample_food(10, 600.0)).unwrap();
        db.insert_food(profile.id, &sample_food(9, 500.0)).unwrap();
        db.insert_food(profile.id, &sample_food(1, 700.0)).unwrap();

        let recent = db.food_history(profile.id, Some(date(9))).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent.iter().all(|e| e.date >= date(9)));
    }

    #[test]
    fn test_daily_calorie_totals_groups_by_date() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        db.insert_food(profile.id, &sample_food(1, 600.0)).unwrap();
        db.insert_food(profile.id, &sample_food(1, 400.0)).unwrap();
        db.insert_food(profile.id, &sample_food(2, 1800.0)).unwrap();
        db.insert_food(profile.id, &sample_food(20, 999.0)).unwrap();

        let totals = db.daily_calorie_totals(profile.id, date(1), date(14)).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].0, date(1));
        assert!((totals[0].1 - 1000.0).abs() < f64::EPSILON);
        assert!((totals[1].1 - 1800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_build_day_summary() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();
        db.insert_food(profile.id, &sample_food(1, 600.0)).unwrap();
        db.insert_food(profile.id, &sample_food(1, 400.0)).unwrap();

        let summary = db.build_day_summary(profile.id, date(1)).unwrap();
        assert_eq!(summary.entries.len(), 2);
        assert!((summary.total_calories - 1000.0).abs() < f64::EPSILON);
        assert!((summary.total_protein - 60.0).abs() < f64::EPSILON);
        assert_eq!(summary.target, Some(2000));
    }

    #[test]
    fn test_build_day_summary_empty_day() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();
        let summary = db.build_day_summary(profile.id, date(5)).unwrap();
        assert!(summary.entries.is_empty());
        assert!((summary.total_calories).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_calibration_updates_target_and_appends_record() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        let record = db
            .apply_calibration(
                profile.id,
                date(15),
                2000,
                2145,
                "lost less weight than expected",
                17,
                Confidence::Medium,
            )
            .unwrap();

        assert_eq!(record.old_target, 2000);
        assert_eq!(record.new_target, 2145);
        assert_eq!(record.data_points_analyzed, 17);
        assert_eq!(record.confidence, Confidence::Medium);

        let updated = db.get_profile_by_id(profile.id).unwrap();
        assert_eq!(updated.daily_calorie_target, 2145);

        let history = db.calibration_history(profile.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, record.id);
    }

    #[test]
    fn test_apply_calibration_missing_profile_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        let err = db
            .apply_calibration(999, date(15), 2000, 2145, "x", 10, Confidence::Medium)
            .unwrap_err();
        assert!(err.to_string().contains("Profile not found"));

        // The aborted transaction must not have left an audit row behind
        assert!(db.calibration_history(999).unwrap().is_empty());
        assert!(db.calibration_history(profile.id).unwrap().is_empty());
    }

    #[test]
    fn test_latest_calibration_and_log_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile(&sample_profile()).unwrap();

        assert!(db.latest_calibration_at(profile.id).unwrap().is_none());
        assert!(db.latest_log_at(profile.id).unwrap().is_none());

        db.insert_weight(
            profile.id,
            &NewWeightEntry {
                date: date(1),
                weight: 80.0,
                unit: WeightUnit::Kg,
            },
        )
        .unwrap();
        let log_at = db.latest_log_at(profile.id).unwrap().unwrap();
        assert!(!log_at.is_empty());

        db.apply_calibration(profile.id, date(15), 2000, 2100, "x", 10, Confidence::High)
            .unwrap();
        let cal_at = db.latest_calibration_at(profile.id).unwrap().unwrap();
        // Both are RFC 3339 from the same clock; the calibration came second
        assert!(cal_at >= log_at);
    }

    #[test]
    fn test_settings_set_get_delete() {
        let db = Database::open_in_memory().unwrap();

        assert!(db.get_setting("default_user").unwrap().is_none());
        db.set_setting("default_user", "alice").unwrap();
        assert_eq!(db.get_setting("default_user").unwrap().unwrap(), "alice");

        db.set_setting("default_user", "bob").unwrap();
        assert_eq!(db.get_setting("default_user").unwrap().unwrap(), "bob");

        assert!(db.delete_setting("default_user").unwrap());
        assert!(!db.delete_setting("default_user").unwrap());
    }
}
