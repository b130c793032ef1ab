//! SQLite adapter: Implementation of the storage ports.
//!
//! Provides local persistence for the cached app configuration, the device
//! time flags, downloaded key packages, the latest detection summary and the
//! latest risk.
//!
//! Structured values (configuration, summary, risk) are stored as JSON,
//! dates as RFC 3339 text.
//!
//! # Mutex Behavior
//!
//! Database connection is protected by `Mutex`. A poisoned mutex (from panic
//! in another thread) is reported as `StorageError::LockPoisoned`.
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{ApplicationConfiguration, ExposureDetectionSummary, KeyPackage, RegionId, Risk};
use crate::ports::{AppConfigCaching, PackageStore, SummaryStore};

const APP_CONFIG_KEY: &str = "app_config";
const DEVICE_TIME_IS_CORRECT_KEY: &str = "device_time_is_correct";
const DEVICE_TIME_ERROR_WAS_SHOWN_KEY: &str = "device_time_error_was_shown";

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// SQLite storage adapter.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store with the given database path.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS key_packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                region TEXT NOT NULL,
                day TEXT NOT NULL,
                hour INTEGER,
                bin BLOB NOT NULL,
                signature BLOB NOT NULL,
                fingerprint TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_key_packages_region
                ON key_packages(region, day, hour);

            CREATE TABLE IF NOT EXISTS exposure_summary (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                summary TEXT NOT NULL,
                detected_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS risk (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                risk TEXT NOT NULL,
                calculated_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    fn setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, StorageError> {
        Ok(self.setting(key)?.map_or(default, |value| value == "1"))
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.set_setting(key, if value { "1" } else { "0" })
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("Invalid date '{value}': {e}")))
}

fn to_count(count: i64) -> Result<usize, StorageError> {
    usize::try_from(count)
        .map_err(|_| StorageError::Serialization(format!("Invalid row count: {count}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, StorageError> {
    serde_json::from_str(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl AppConfigCaching for SqliteStore {
    type Error = StorageError;

    fn app_config(&self) -> Result<Option<ApplicationConfiguration>, Self::Error> {
        self.setting(APP_CONFIG_KEY)?
            .map(|json| from_json(&json))
            .transpose()
    }

    fn set_app_config(&self, config: &ApplicationConfiguration) -> Result<(), Self::Error> {
        self.set_setting(APP_CONFIG_KEY, &to_json(config)?)?;
        tracing::info!(
            "Cached app configuration with {} risk score classes",
            config.risk_score_classes.len()
        );
        Ok(())
    }

    fn device_time_is_correct(&self) -> Result<bool, Self::Error> {
        self.flag(DEVICE_TIME_IS_CORRECT_KEY, true)
    }

    fn set_device_time_is_correct(&self, value: bool) -> Result<(), Self::Error> {
        self.set_flag(DEVICE_TIME_IS_CORRECT_KEY, value)
    }

    fn device_time_error_was_shown(&self) -> Result<bool, Self::Error> {
        self.flag(DEVICE_TIME_ERROR_WAS_SHOWN_KEY, false)
    }

    fn set_device_time_error_was_shown(&self, value: bool) -> Result<(), Self::Error> {
        self.set_flag(DEVICE_TIME_ERROR_WAS_SHOWN_KEY, value)
    }
}

impl PackageStore for SqliteStore {
    type Error = StorageError;

    fn add_package(&self, package: &KeyPackage) -> Result<(), Self::Error> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let day = package.day.to_string();

        tx.execute(
            "DELETE FROM key_packages WHERE region = ?1 AND day = ?2 AND hour IS ?3",
            params![package.region.as_str(), day, package.hour],
        )?;
        tx.execute(
            r"
            INSERT INTO key_packages (region, day, hour, bin, signature, fingerprint)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                package.region.as_str(),
                day,
                package.hour,
                package.bin,
                package.signature,
                package.fingerprint(),
            ],
        )?;
        tx.commit()?;

        tracing::debug!("Stored key package {} {} {:?}", package.region, package.day, package.hour);
        Ok(())
    }

    fn packages(&self, region: &RegionId) -> Result<Vec<KeyPackage>, Self::Error> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r"
            SELECT day, hour, bin, signature
            FROM key_packages
            WHERE region = ?1
            ORDER BY day ASC, hour ASC
            ",
        )?;

        let rows = stmt
            .query_map(params![region.as_str()], |row| {
                let day: String = row.get(0)?;
                let hour: Option<u8> = row.get(1)?;
                let bin: Vec<u8> = row.get(2)?;
                let signature: Vec<u8> = row.get(3)?;
                Ok((day, hour, bin, signature))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(day, hour, bin, signature)| {
                let day = day
                    .parse::<NaiveDate>()
                    .map_err(|e| StorageError::Serialization(format!("Invalid day '{day}': {e}")))?;
                Ok(KeyPackage {
                    region: region.clone(),
                    day,
                    hour,
                    bin,
                    signature,
                })
            })
            .collect()
    }

    fn count_packages(&self, region: &RegionId) -> Result<usize, Self::Error> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM key_packages WHERE region = ?1",
            params![region.as_str()],
            |row| row.get(0),
        )?;

        to_count(count)
    }

    fn delete_packages(&self, region: &RegionId) -> Result<(), Self::Error> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM key_packages WHERE region = ?1",
            params![region.as_str()],
        )?;
        tracing::info!("Deleted {} key packages of region {}", deleted, region);
        Ok(())
    }
}

impl SummaryStore for SqliteStore {
    type Error = StorageError;

    fn save_summary(
        &self,
        summary: &ExposureDetectionSummary,
        detected_at: DateTime<Utc>,
    ) -> Result<(), Self::Error> {
        let json = to_json(summary)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO exposure_summary (id, summary, detected_at) VALUES (1, ?1, ?2)",
            params![json, detected_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn latest_summary(&self) -> Result<Option<(ExposureDetectionSummary, DateTime<Utc>)>, Self::Error> {
        let row: Option<(String, String)> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT summary, detected_at FROM exposure_summary WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        row.map(|(summary, detected_at)| Ok((from_json(&summary)?, parse_date(&detected_at)?)))
            .transpose()
    }

    fn save_risk(&self, risk: &Risk) -> Result<(), Self::Error> {
        let json = to_json(risk)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO risk (id, risk, calculated_at) VALUES (1, ?1, ?2)",
            params![json, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!("Saved risk {}", risk.level);
        Ok(())
    }

    fn latest_risk(&self) -> Result<Option<Risk>, Self::Error> {
        let json: Option<String> = {
            let conn = self.conn()?;
            conn.query_row("SELECT risk FROM risk WHERE id = 1", [], |row| row.get(0))
                .optional()?
        };

        json.map(|json| from_json(&json)).transpose()
    }
}
