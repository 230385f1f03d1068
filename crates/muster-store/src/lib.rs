//! # Muster Store
//! SQLite persistence for MusterBot. One connection behind a mutex; every
//! write that has a natural key uses `INSERT OR REPLACE` so callers get
//! upsert semantics without read-modify-write races.
//!
//! Tables: `responses`, `leave`, `tdy`, `holidays`, `config`, `admins`,
//! `messages`.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use muster_core::error::{MusterError, Result};
use muster_core::types::{AbsenceKind, AbsenceRecord, Holiday, Response};

const DATE_FMT: &str = "%Y-%m-%d";

fn store_err(e: impl std::fmt::Display) -> MusterError {
    MusterError::Store(e.to_string())
}

/// The MusterBot database.
pub struct MusterStore {
    conn: Mutex<Connection>,
}

impl MusterStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        tracing::info!("Database ready at {}", path.display());
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS responses (
                user_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                response_date TEXT NOT NULL,
                response_text TEXT NOT NULL,
                details TEXT,
                PRIMARY KEY (user_id, response_date)
            );

            CREATE TABLE IF NOT EXISTS leave (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tdy (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                description TEXT
            );

            CREATE TABLE IF NOT EXISTS holidays (
                holiday_date TEXT PRIMARY KEY,
                description TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS admins (
                user_id TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                sender_id TEXT NOT NULL,
                sender_name TEXT NOT NULL,
                destination_id TEXT NOT NULL,
                sent_timestamp TEXT NOT NULL,
                message TEXT NOT NULL
            );",
        )
        .map_err(store_err)?;

        // Seed schedule defaults on first run.
        for (key, value) in [
            ("checkin_time", "08:00"),
            ("reminder_time", "10:00"),
            ("summary_time", "11:00"),
        ] {
            conn.execute(
                "INSERT OR IGNORE INTO config (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value],
            )
            .map_err(store_err)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(store_err)
    }

    /// Drop a table out from under the store. Exists only so failure-path
    /// tests in dependent crates can make writes fail on demand.
    #[cfg(any(test, feature = "test-util"))]
    pub fn break_table(&self, table: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!("DROP TABLE {table}"))
            .map_err(store_err)
    }

    // ─── Responses ──────────────────────────────────────

    /// Insert or replace the response for (user, date).
    pub fn upsert_response(&self, response: &Response) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO responses
             (user_id, user_name, response_date, response_text, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                response.user_id,
                response.user_name,
                fmt_date(response.date),
                response.status,
                response.detail,
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// The response a user recorded for a date, if any.
    pub fn response_for(&self, user_id: &str, date: NaiveDate) -> Result<Option<Response>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, user_name, response_date, response_text, details
                 FROM responses WHERE user_id = ?1 AND response_date = ?2",
            )
            .map_err(store_err)?;
        stmt.query_row(rusqlite::params![user_id, fmt_date(date)], row_to_response)
            .optional()
            .map_err(store_err)
    }

    /// All responses recorded for a date.
    pub fn responses_for_date(&self, date: NaiveDate) -> Result<Vec<Response>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, user_name, response_date, response_text, details
                 FROM responses WHERE response_date = ?1",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(rusqlite::params![fmt_date(date)], row_to_response)
            .map_err(store_err)?;
        let mut responses = Vec::new();
        for row in rows {
            responses.push(row.map_err(store_err)?);
        }
        Ok(responses)
    }

    // ─── Absences ──────────────────────────────────────

    pub fn add_leave(
        &self,
        user_id: &str,
        user_name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO leave (user_id, user_name, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user_id, user_name, fmt_date(start), fmt_date(end)],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Remove leave entries for a user that start on the given date.
    /// Returns how many rows were removed.
    pub fn remove_leave(&self, user_id: &str, start: NaiveDate) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM leave WHERE user_id = ?1 AND start_date = ?2",
            rusqlite::params![user_id, fmt_date(start)],
        )
        .map_err(store_err)
    }

    pub fn add_tdy(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        description: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tdy (user_id, start_date, end_date, description)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user_id, fmt_date(start), fmt_date(end), description],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Remove TDY entries for a user that start on the given date.
    pub fn remove_tdy(&self, user_id: &str, start: NaiveDate) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM tdy WHERE user_id = ?1 AND start_date = ?2",
            rusqlite::params![user_id, fmt_date(start)],
        )
        .map_err(store_err)
    }

    /// The absence record covering (user, date), if any.
    /// TDY is checked first: an administrative TDY assignment outranks leave.
    pub fn absence_covering(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AbsenceRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT start_date, end_date, description FROM tdy WHERE user_id = ?1")
            .map_err(store_err)?;
        let tdy_rows = stmt
            .query_map(rusqlite::params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(store_err)?;
        for row in tdy_rows.filter_map(|r| r.ok()) {
            let (start, end, description) = row;
            let record = AbsenceRecord {
                user_id: user_id.to_string(),
                start: parse_date(&start)?,
                end: parse_date(&end)?,
                kind: AbsenceKind::TemporaryDuty,
                description,
            };
            if record.covers(date) {
                return Ok(Some(record));
            }
        }

        let mut stmt = conn
            .prepare("SELECT start_date, end_date FROM leave WHERE user_id = ?1")
            .map_err(store_err)?;
        let leave_rows = stmt
            .query_map(rusqlite::params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(store_err)?;
        for row in leave_rows.filter_map(|r| r.ok()) {
            let (start, end) = row;
            let record = AbsenceRecord {
                user_id: user_id.to_string(),
                start: parse_date(&start)?,
                end: parse_date(&end)?,
                kind: AbsenceKind::Leave,
                description: None,
            };
            if record.covers(date) {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    // ─── Holidays ──────────────────────────────────────

    pub fn add_holiday(&self, date: NaiveDate, description: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO holidays (holiday_date, description) VALUES (?1, ?2)",
            rusqlite::params![fmt_date(date), description],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn remove_holiday(&self, date: NaiveDate) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM holidays WHERE holiday_date = ?1",
            rusqlite::params![fmt_date(date)],
        )
        .map_err(store_err)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM holidays WHERE holiday_date = ?1",
                rusqlite::params![fmt_date(date)],
                |row| row.get(0),
            )
            .ok();
        Ok(found.is_some())
    }

    pub fn list_holidays(&self) -> Result<Vec<Holiday>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT holiday_date, description FROM holidays ORDER BY holiday_date")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(store_err)?;
        let mut holidays = Vec::new();
        for row in rows.filter_map(|r| r.ok()) {
            holidays.push(Holiday {
                date: parse_date(&row.0)?,
                description: row.1,
            });
        }
        Ok(holidays)
    }

    // ─── Config ──────────────────────────────────────

    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .ok();
        Ok(value)
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn config_all(&self) -> Result<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM config ORDER BY key")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(store_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ─── Admins ──────────────────────────────────────

    pub fn add_admin(&self, user_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO admins (user_id) VALUES (?1)",
            rusqlite::params![user_id],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn is_admin(&self, user_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM admins WHERE user_id = ?1",
                rusqlite::params![user_id],
                |row| row.get(0),
            )
            .ok();
        Ok(found.is_some())
    }

    // ─── Message log ──────────────────────────────────────

    /// Append to the raw message log. Every inbound text is recorded here
    /// whether or not anything else consumed it.
    pub fn log_message(
        &self,
        sender_id: &str,
        sender_name: &str,
        destination_id: &str,
        sent_timestamp: i64,
        message: &str,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (sender_id, sender_name, destination_id, sent_timestamp, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                sender_id,
                sender_name,
                destination_id,
                sent_timestamp.to_string(),
                message
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|e| MusterError::Store(format!("Bad date '{s}' in database: {e}")))
}

fn row_to_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<Response> {
    let date_str: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Response {
        user_id: row.get(0)?,
        user_name: row.get(1)?,
        date,
        status: row.get(3)?,
        detail: row.get(4)?,
    })
}
