//! Storage ports: Traits for persistent state.
//!
//! These traits abstract the storage backend (SQLite) from the application
//! logic. All data is stored locally on the device.

use chrono::{DateTime, Utc};

use crate::domain::{ApplicationConfiguration, ExposureDetectionSummary, KeyPackage, RegionId, Risk};

/// Cached application configuration and device time flags.
pub trait AppConfigCaching: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the cached application configuration.
    ///
    /// # Returns
    /// `None` if no configuration has been cached yet.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn app_config(&self) -> Result<Option<ApplicationConfiguration>, Self::Error>;

    /// Replace the cached application configuration.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn set_app_config(&self, config: &ApplicationConfiguration) -> Result<(), Self::Error>;

    /// Whether the device clock was last found to be correct. Defaults to true.
    fn device_time_is_correct(&self) -> Result<bool, Self::Error>;

    fn set_device_time_is_correct(&self, value: bool) -> Result<(), Self::Error>;

    /// Whether the user has already been told about a wrong device clock.
    fn device_time_error_was_shown(&self) -> Result<bool, Self::Error>;

    fn set_device_time_error_was_shown(&self, value: bool) -> Result<(), Self::Error>;
}

/// Downloaded key packages, per region.
pub trait PackageStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store a package, replacing one for the same region, day and hour.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn add_package(&self, package: &KeyPackage) -> Result<(), Self::Error>;

    /// All packages of a region, oldest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn packages(&self, region: &RegionId) -> Result<Vec<KeyPackage>, Self::Error>;

    /// Number of packages stored for a region.
    fn count_packages(&self, region: &RegionId) -> Result<usize, Self::Error>;

    /// Delete all packages of a region.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn delete_packages(&self, region: &RegionId) -> Result<(), Self::Error>;
}

/// Latest detection summary and the risk computed from it.
pub trait SummaryStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist the summary of a successful detection.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn save_summary(
        &self,
        summary: &ExposureDetectionSummary,
        detected_at: DateTime<Utc>,
    ) -> Result<(), Self::Error>;

    /// The latest summary together with its detection date.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn latest_summary(&self) -> Result<Option<(ExposureDetectionSummary, DateTime<Utc>)>, Self::Error>;

    /// Persist a computed risk.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn save_risk(&self, risk: &Risk) -> Result<(), Self::Error>;

    /// The most recently persisted risk.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn latest_risk(&self) -> Result<Option<Risk>, Self::Error>;
}
