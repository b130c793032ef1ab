//! Detection ports: Traits for the collaborators of an exposure detection.
//!
//! Downloading key packages, writing them to disk, fetching the platform
//! configuration and running the matching itself all live outside the core.
//! `ExposureDetection` only talks to these traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{
    ExposureConfiguration, ExposureDetectionSummary, Region, RegionId, WrittenPackages,
};

/// Error reported by platform matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchingError {
    #[error("Exposure detection was cancelled")]
    Cancelled,

    #[error("Platform matching failed (code {code}): {message}")]
    Platform { code: i64, message: String },
}

/// Error fetching the list of supported regions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to fetch supported regions: {0}")]
pub struct RegionsError(pub String);

/// Why a detection ended without a summary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DidEndPrematurelyReason {
    #[error("No supported countries available")]
    NoSupportedCountries,

    #[error("No key package days and hours available")]
    NoDaysAndHours,

    #[error("No exposure configuration available")]
    NoExposureConfiguration,

    #[error("Unable to write diagnosis keys")]
    UnableToWriteDiagnosisKeys,

    #[error("No exposure detection summary: {0}")]
    NoSummary(#[source] MatchingError),
}

/// Cancellation handle shared by a detection attempt and platform matching.
#[derive(Debug, Clone)]
pub struct Progress {
    cancelled: Arc<watch::Sender<bool>>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            cancelled: Arc::new(tx),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once `cancel()` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // Sender lives as long as self, so this cannot happen
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Source of the regions the backend publishes key packages for.
#[async_trait]
pub trait SupportedRegionsProvider: Send + Sync {
    /// Fetch the supported regions, in backend order.
    ///
    /// # Errors
    /// Returns `RegionsError` if the list cannot be obtained.
    async fn supported_regions(&self) -> Result<Vec<Region>, RegionsError>;
}

/// Downloads and stores the key packages of one region.
///
/// Invoked once per region per attempt, concurrently across regions.
#[async_trait]
pub trait KeyPackageDownloader: Send + Sync {
    /// # Errors
    /// Returns the reason the detection has to end.
    async fn download_key_packages(&self, region: &RegionId) -> Result<(), DidEndPrematurelyReason>;
}

/// Materializes downloaded key packages into transient files.
pub trait PackageWriter: Send + Sync {
    /// Write the packages of `region`.
    ///
    /// # Returns
    /// `None` if the packages could not be written.
    fn write_downloaded_packages(&self, region: &RegionId) -> Option<WrittenPackages>;
}

/// Source of the platform detection configuration.
#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
    async fn latest_exposure_configuration(&self) -> Option<ExposureConfiguration>;
}

/// Platform key matching.
#[async_trait]
pub trait PlatformMatcher: Send + Sync {
    /// Match the written packages against the keys observed on this device.
    ///
    /// Implementations should stop early once `progress` is cancelled.
    ///
    /// # Errors
    /// Returns `MatchingError` if the platform fails or the run is cancelled.
    async fn detect_summary(
        &self,
        configuration: &ExposureConfiguration,
        packages: &WrittenPackages,
        progress: Progress,
    ) -> Result<ExposureDetectionSummary, MatchingError>;
}

/// Everything a detection needs besides the per-region downloader.
pub trait ExposureDetectionDelegate:
    SupportedRegionsProvider + PackageWriter + ConfigurationProvider + PlatformMatcher
{
}

impl<T> ExposureDetectionDelegate for T where
    T: SupportedRegionsProvider + PackageWriter + ConfigurationProvider + PlatformMatcher
{
}
