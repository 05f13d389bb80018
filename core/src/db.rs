use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{
    BloodSugarMetric, ChartData, ChartSnapshot, ConsumptionRecord, Granularity,
    NewBloodSugarMetric, NewChartSnapshot, NewConsumption, NewUser, User,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Inclusive instant bounds for a range query.
pub type InstantRange = (DateTime<FixedOffset>, DateTime<FixedOffset>);

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
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    full_name TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS consumptions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    date_time TEXT NOT NULL,
                    ts_epoch INTEGER NOT NULL,
                    type TEXT NOT NULL,
                    amount REAL,
                    sugar_grams REAL,
                    context TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS blood_sugar_metrics (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    measure_date TEXT NOT NULL,
                    measure_time TEXT,
                    date_time TEXT NOT NULL,
                    ts_epoch INTEGER NOT NULL,
                    value REAL NOT NULL,
                    context TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_consumptions_user_ts ON consumptions(user_id, ts_epoch);
                CREATE INDEX IF NOT EXISTS idx_blood_sugar_user_ts ON blood_sugar_metrics(user_id, ts_epoch);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS graphs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    granularity TEXT NOT NULL,
                    graph_type TEXT NOT NULL,
                    start_date TEXT NOT NULL,
                    end_date TEXT NOT NULL,
                    data_points TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_graphs_user ON graphs(user_id);

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    #[cfg(test)]
    fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    // --- Row mapping helpers ---

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    // Expects columns:
    // 0: id, 1: user_id, 2: date_time, 3: type, 4: amount, 5: sugar_grams,
    // 6: context, 7: created_at
    fn consumption_from_row(row: &rusqlite::Row) -> rusqlite::Result<ConsumptionRecord> {
        let date_time: String = row.get(2)?;
        Ok(ConsumptionRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date_time: text_column(2, DateTime::parse_from_rfc3339(&date_time))?,
            category: row.get(3)?,
            amount: row.get(4)?,
            sugar_grams: row.get(5)?,
            context: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    // Expects columns:
    // 0: id, 1: user_id, 2: measure_date, 3: measure_time, 4: date_time,
    // 5: value, 6: context, 7: created_at
    fn blood_sugar_from_row(row: &rusqlite::Row) -> rusqlite::Result<BloodSugarMetric> {
        let measure_date: String = row.get(2)?;
        let measure_time: Option<String> = row.get(3)?;
        let date_time: String = row.get(4)?;
        Ok(BloodSugarMetric {
            id: row.get(0)?,
            user_id: row.get(1)?,
            measure_date: text_column(2, NaiveDate::parse_from_str(&measure_date, DATE_FORMAT))?,
            measure_time: measure_time
                .map(|t| text_column(3, NaiveTime::parse_from_str(&t, TIME_FORMAT)))
                .transpose()?,
            date_time: text_column(4, DateTime::parse_from_rfc3339(&date_time))?,
            value: row.get(5)?,
            context: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    // Expects columns:
    // 0: id, 1: user_id, 2: granularity, 3: graph_type, 4: start_date,
    // 5: end_date, 6: data_points, 7: created_at
    fn graph_from_row(row: &rusqlite::Row) -> rusqlite::Result<ChartSnapshot> {
        let granularity: String = row.get(2)?;
        let granularity: Granularity = text_column(2, granularity.parse())?;
        let start_date: String = row.get(4)?;
        let end_date: String = row.get(5)?;
        let data_points: String = row.get(6)?;
        Ok(ChartSnapshot {
            id: row.get(0)?,
            user_id: row.get(1)?,
            granularity,
            graph_type: row.get(3)?,
            start_date: text_column(4, NaiveDate::parse_from_str(&start_date, DATE_FORMAT))?,
            end_date: text_column(5, NaiveDate::parse_from_str(&end_date, DATE_FORMAT))?,
            data_points: text_column(6, ChartData::from_json(granularity, &data_points))?,
            created_at: row.get(7)?,
        })
    }

    // --- Users ---

    pub fn insert_user(&self, user: &NewUser) -> Result<User> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO users (email, full_name, created_at) VALUES (?1, ?2, ?3)",
                params![user.email, user.full_name, now],
            )
            .with_context(|| format!("Failed to insert user {}", user.email))?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.context("User not found after insert")
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, email, full_name, created_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, email, full_name, created_at FROM users WHERE email = ?1",
                params![email],
                Self::user_from_row,
            )
            .optional()?)
    }

    // --- Consumption ---

    pub fn insert_consumption(&self, entry: &NewConsumption) -> Result<ConsumptionRecord> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO consumptions
                    (user_id, date_time, ts_epoch, type, amount, sugar_grams, context, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.user_id,
                    entry.date_time.to_rfc3339(),
                    entry.date_time.timestamp(),
                    entry.category,
                    entry.amount,
                    entry.sugar_grams,
                    entry.context,
                    now
                ],
            )
            .context("Failed to insert consumption")?;
        let id = self.conn.last_insert_rowid();
        self.get_consumption(id)?
            .context("Consumption not found after insert")
    }

    pub fn get_consumption(&self, id: i64) -> Result<Option<ConsumptionRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, date_time, type, amount, sugar_grams, context, created_at
                 FROM consumptions WHERE id = ?1",
                params![id],
                Self::consumption_from_row,
            )
            .optional()?)
    }

    /// A user's consumption records, oldest first, optionally limited to an
    /// inclusive instant range.
    pub fn list_consumptions(
        &self,
        user_id: i64,
        range: Option<InstantRange>,
    ) -> Result<Vec<ConsumptionRecord>> {
        let (lo, hi) = epoch_bounds(range.as_ref());
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, date_time, type, amount, sugar_grams, context, created_at
             FROM consumptions
             WHERE user_id = ?1 AND ts_epoch BETWEEN ?2 AND ?3
             ORDER BY ts_epoch, id",
        )?;
        let records = stmt
            .query_map(params![user_id, lo, hi], Self::consumption_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(retain_in_range(records, range.as_ref(), |r| r.date_time))
    }

    // --- Blood sugar ---

    pub fn insert_blood_sugar(&self, metric: &NewBloodSugarMetric) -> Result<BloodSugarMetric> {
        let now = Local::now().to_rfc3339();
        let date_time = metric.timestamp();
        self.conn
            .execute(
                "INSERT INTO blood_sugar_metrics
                    (user_id, measure_date, measure_time, date_time, ts_epoch, value, context, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    metric.user_id,
                    metric.measure_date.format(DATE_FORMAT).to_string(),
                    metric
                        .measure_time
                        .map(|t| t.format(TIME_FORMAT).to_string()),
                    date_time.to_rfc3339(),
                    date_time.timestamp(),
                    metric.value,
                    metric.context,
                    now
                ],
            )
            .context("Failed to insert blood sugar reading")?;
        let id = self.conn.last_insert_rowid();
        self.get_blood_sugar(id)?
            .context("Blood sugar reading not found after insert")
    }

    pub fn get_blood_sugar(&self, id: i64) -> Result<Option<BloodSugarMetric>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, measure_date, measure_time, date_time, value, context, created_at
                 FROM blood_sugar_metrics WHERE id = ?1",
                params![id],
                Self::blood_sugar_from_row,
            )
            .optional()?)
    }

    pub fn list_blood_sugar(
        &self,
        user_id: i64,
        range: Option<InstantRange>,
    ) -> Result<Vec<BloodSugarMetric>> {
        let (lo, hi) = epoch_bounds(range.as_ref());
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, measure_date, measure_time, date_time, value, context, created_at
             FROM blood_sugar_metrics
             WHERE user_id = ?1 AND ts_epoch BETWEEN ?2 AND ?3
             ORDER BY ts_epoch, id",
        )?;
        let metrics = stmt
            .query_map(params![user_id, lo, hi], Self::blood_sugar_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(retain_in_range(metrics, range.as_ref(), |m| m.date_time))
    }

    // --- Graphs ---

    pub fn insert_graph(&self, graph: &NewChartSnapshot) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO graphs
                    (user_id, granularity, graph_type, start_date, end_date, data_points, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    graph.user_id,
                    graph.granularity.as_str(),
                    graph.granularity.label(),
                    graph.start_date.format(DATE_FORMAT).to_string(),
                    graph.end_date.format(DATE_FORMAT).to_string(),
                    graph.data_points,
                    graph.created_at
                ],
            )
            .context("Failed to insert graph")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_graph(&self, id: i64) -> Result<Option<ChartSnapshot>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, granularity, graph_type, start_date, end_date, data_points, created_at
                 FROM graphs WHERE id = ?1",
                params![id],
                Self::graph_from_row,
            )
            .optional()?)
    }

    /// All graphs for a user, newest first.
    pub fn list_graphs(&self, user_id: i64) -> Result<Vec<ChartSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, granularity, graph_type, start_date, end_date, data_points, created_at
             FROM graphs WHERE user_id = ?1 ORDER BY id DESC",
        )?;
        let graphs = stmt
            .query_map(params![user_id], Self::graph_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(graphs)
    }

    // --- User Settings ---

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
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM user_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}

fn text_column<T, E>(idx: usize, parsed: std::result::Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    parsed.map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// The epoch column only narrows the scan to whole seconds; the exact
// sub-second bounds are applied by `retain_in_range`.
fn epoch_bounds(range: Option<&InstantRange>) -> (i64, i64) {
    range.map_or((i64::MIN, i64::MAX), |(start, end)| {
        (start.timestamp(), end.timestamp())
    })
}

fn retain_in_range<T>(
    mut rows: Vec<T>,
    range: Option<&InstantRange>,
    instant: impl Fn(&T) -> DateTime<FixedOffset>,
) -> Vec<T> {
    if let Some((start, end)) = range {
        rows.retain(|row| {
            let at = instant(row);
            at >= *start && at <= *end
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::DateRange;
    use crate::models::DailyPoint;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_user(db: &Database) -> User {
        db.insert_user(&NewUser {
            email: "ana@example.com".to_string(),
            full_name: Some("Ana".to_string()),
        })
        .unwrap()
    }

    fn log(db: &Database, user_id: i64, at: &str, sugar: Option<f64>) -> ConsumptionRecord {
        db.insert_consumption(&NewConsumption {
            user_id,
            date_time: DateTime::parse_from_rfc3339(at).unwrap(),
            category: "juice".to_string(),
            amount: Some(250.0),
            sugar_grams: sugar,
            context: "breakfast".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_migrate_sets_version() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 2);
        // Re-running is a no-op
        db.migrate().unwrap();
        assert_eq!(db.schema_version().unwrap(), 2);
    }

    #[test]
    fn test_insert_and_get_user() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.full_name.as_deref(), Some("Ana"));

        let fetched = db.get_user(user.id).unwrap().unwrap();
        assert_eq!(fetched.id, user.id);
        let by_email = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(db.get_user(999).unwrap().is_none());
        assert!(db.get_user_by_email("bob@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        sample_user(&db);
        let dup = db.insert_user(&NewUser {
            email: "ana@example.com".to_string(),
            full_name: None,
        });
        assert!(dup.is_err());
    }

    #[test]
    fn test_ids_are_sequential() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        let a = log(&db, user.id, "2025-03-01T08:00:00Z", Some(1.0));
        let b = log(&db, user.id, "2025-03-01T09:00:00Z", Some(2.0));
        assert_eq!(b.id, a.id + 1);
    }

    #[test]
    fn test_consumption_roundtrip_keeps_offset() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        let entry = log(&db, user.id, "2025-03-01T07:30:00+07:00", None);
        assert_eq!(entry.date_time.to_rfc3339(), "2025-03-01T07:30:00+07:00");
        assert!(entry.sugar_grams.is_none());
        assert_eq!(entry.amount, Some(250.0));
        assert_eq!(entry.category, "juice");

        let fetched = db.get_consumption(entry.id).unwrap().unwrap();
        assert_eq!(fetched.date_time, entry.date_time);
        assert!(db.get_consumption(entry.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_insert_consumption_unknown_user_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = db.insert_consumption(&NewConsumption {
            user_id: 42,
            date_time: DateTime::parse_from_rfc3339("2025-03-01T08:00:00Z").unwrap(),
            category: "tea".to_string(),
            amount: None,
            sugar_grams: Some(3.0),
            context: String::new(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_list_consumptions_range_is_inclusive() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        let other = db
            .insert_user(&NewUser {
                email: "bob@example.com".to_string(),
                full_name: None,
            })
            .unwrap();

        log(&db, user.id, "2025-02-28T23:59:59.999Z", Some(50.0));
        log(&db, user.id, "2025-03-01T00:00:00Z", Some(1.0));
        log(&db, user.id, "2025-03-03T23:59:59.500Z", Some(2.0));
        log(&db, user.id, "2025-03-04T00:00:00Z", Some(50.0));
        log(&db, other.id, "2025-03-02T12:00:00Z", Some(50.0));

        let range = DateRange::normalize(date(2025, 3, 1), date(2025, 3, 3), utc());
        let records = db
            .list_consumptions(user.id, Some((range.start, range.end)))
            .unwrap();
        let sugars: Vec<f64> = records.iter().map(ConsumptionRecord::sugar).collect();
        assert_eq!(sugars, vec![1.0, 2.0]);

        let all = db.list_consumptions(user.id, None).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_list_consumptions_across_offsets() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        // 2025-03-01T20:00-05:00 is 2025-03-02T01:00Z
        log(&db, user.id, "2025-03-01T20:00:00-05:00", Some(9.0));

        let day1 = DateRange::normalize(date(2025, 3, 1), date(2025, 3, 1), utc());
        let day2 = DateRange::normalize(date(2025, 3, 2), date(2025, 3, 2), utc());
        assert!(
            db.list_consumptions(user.id, Some((day1.start, day1.end)))
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            db.list_consumptions(user.id, Some((day2.start, day2.end)))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_blood_sugar_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        let metric = db
            .insert_blood_sugar(&NewBloodSugarMetric {
                user_id: user.id,
                measure_date: date(2025, 3, 1),
                measure_time: NaiveTime::from_hms_opt(7, 45, 0),
                offset: utc(),
                value: 105.0,
                context: "fasting".to_string(),
            })
            .unwrap();
        assert_eq!(metric.date_time.to_rfc3339(), "2025-03-01T07:45:00+00:00");
        assert_eq!(metric.measure_time, NaiveTime::from_hms_opt(7, 45, 0));

        let untimed = db
            .insert_blood_sugar(&NewBloodSugarMetric {
                user_id: user.id,
                measure_date: date(2025, 3, 2),
                measure_time: None,
                offset: utc(),
                value: 130.0,
                context: String::new(),
            })
            .unwrap();
        assert!(untimed.measure_time.is_none());
        assert_eq!(untimed.date_time.to_rfc3339(), "2025-03-02T00:00:00+00:00");

        let range = DateRange::normalize(date(2025, 3, 1), date(2025, 3, 1), utc());
        let listed = db
            .list_blood_sugar(user.id, Some((range.start, range.end)))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, metric.id);
        assert_eq!(db.list_blood_sugar(user.id, None).unwrap().len(), 2);
    }

    #[test]
    fn test_graph_insert_get_list() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        let points = vec![DailyPoint {
            day: "2025-03-01".to_string(),
            sugar: 30.0,
        }];
        let new_graph = NewChartSnapshot {
            user_id: user.id,
            granularity: Granularity::Daily,
            start_date: date(2025, 3, 1),
            end_date: date(2025, 3, 1),
            data_points: serde_json::to_string(&points).unwrap(),
            created_at: "2025-03-02T10:00:00+00:00".to_string(),
        };
        let first = db.insert_graph(&new_graph).unwrap();
        let second = db.insert_graph(&new_graph).unwrap();
        assert_ne!(first, second);

        let graph = db.get_graph(first).unwrap().unwrap();
        assert_eq!(graph.graph_type, "Daily Intake");
        assert_eq!(graph.granularity, Granularity::Daily);
        assert_eq!(graph.data_points, ChartData::Daily(points));
        assert_eq!(graph.start_date, date(2025, 3, 1));

        let listed = db.list_graphs(user.id).unwrap();
        let ids: Vec<i64> = listed.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert!(db.list_graphs(user.id + 1).unwrap().is_empty());
        assert!(db.get_graph(second + 1).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_graph_row_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        let id = db
            .insert_graph(&NewChartSnapshot {
                user_id: user.id,
                granularity: Granularity::Weekly,
                start_date: date(2025, 3, 1),
                end_date: date(2025, 3, 7),
                data_points: "not json".to_string(),
                created_at: String::new(),
            })
            .unwrap();
        assert!(db.get_graph(id).is_err());
    }

    #[test]
    fn test_settings_set_get_delete() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_setting("spike_factor").unwrap().is_none());
        db.set_setting("spike_factor", "0.8").unwrap();
        assert_eq!(db.get_setting("spike_factor").unwrap().as_deref(), Some("0.8"));
        db.set_setting("spike_factor", "0.6").unwrap();
        assert_eq!(db.get_setting("spike_factor").unwrap().as_deref(), Some("0.6"));
        assert!(db.delete_setting("spike_factor").unwrap());
        assert!(!db.delete_setting("spike_factor").unwrap());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sugarlog.db");
        let user_id = {
            let db = Database::open(&path).unwrap();
            let user = sample_user(&db);
            log(&db, user.id, "2025-03-01T08:00:00Z", Some(12.0));
            user.id
        };
        let db = Database::open(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), 2);
        let records = db.list_consumptions(user_id, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sugar_grams, Some(12.0));
    }
}
