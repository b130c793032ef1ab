//! Exposure detection: Orchestrates one attempt at obtaining a summary.
//!
//! An attempt runs through:
//! - Region resolution
//! - Concurrent per-region key package download
//! - Writing packages to transient files
//! - Platform matching
//!
//! and ends with either a summary or a `DidEndPrematurelyReason`. Each
//! `ExposureDetection` is single-use: `start` consumes it.
//!
//! # Cancellation
//!
//! `DetectionHandle::cancel` flips the activity state to idle, forwards to
//! the `Progress` handed to platform matching and drops the in-flight
//! pipeline. A cancelled attempt never invokes its completion. Written
//! package files are removed on every exit path.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{
    EuTracingSettings, ExposureDetectionSummary, RegionId, WrittenPackages, DEFAULT_REGION,
};
use crate::ports::{DidEndPrematurelyReason, ExposureDetectionDelegate, KeyPackageDownloader, Progress};

/// Outcome delivered to the completion of an attempt.
pub type DetectionResult = Result<ExposureDetectionSummary, DidEndPrematurelyReason>;

/// What an attempt is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Idle,
    Downloading,
    Detecting,
}

/// How the regions of an attempt are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionMode {
    /// Only the default region; supported regions are not queried
    Single,
    /// Supported regions filtered by the user's EU tracing settings
    #[default]
    Multi,
}

impl std::str::FromStr for RegionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "multi" => Ok(Self::Multi),
            other => Err(format!("Unknown region mode: {other}")),
        }
    }
}

/// Settings for exposure detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionSettings {
    pub region_mode: RegionMode,
    pub default_region: RegionId,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            region_mode: RegionMode::default(),
            default_region: RegionId::new(DEFAULT_REGION),
        }
    }
}

impl DetectionSettings {
    /// Load settings overrides from environment (best-effort).
    ///
    /// Supported:
    /// - EXPOSURE_RISK_REGION_MODE="single" | "multi"
    /// - EXPOSURE_RISK_DEFAULT_REGION="DE"
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(v) = var("EXPOSURE_RISK_REGION_MODE") {
            match v.parse() {
                Ok(mode) => settings.region_mode = mode,
                Err(e) => warn!("Ignoring EXPOSURE_RISK_REGION_MODE: {}", e),
            }
        }

        if let Some(v) = var("EXPOSURE_RISK_DEFAULT_REGION") {
            if !v.trim().is_empty() {
                settings.default_region = RegionId::new(v);
            }
        }

        settings
    }
}

/// Holds the completion of an attempt until it fires.
///
/// Firing twice is a programmer error and panics.
pub struct CompletionSlot<F> {
    completion: Option<F>,
}

impl<F> CompletionSlot<F> {
    pub fn new(completion: F) -> Self {
        Self {
            completion: Some(completion),
        }
    }

    /// Invoke the completion with `value`.
    ///
    /// # Panics
    /// If the completion was already fired or discarded.
    pub fn fire<T>(&mut self, value: T)
    where
        F: FnOnce(T),
    {
        match self.completion.take() {
            Some(completion) => completion(value),
            None => panic!("Exposure detection completion fired more than once"),
        }
    }

    /// Drop the completion without invoking it.
    pub fn discard(&mut self) {
        self.completion = None;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.completion.is_some()
    }
}

/// Cancels an attempt and observes its activity from outside.
#[derive(Debug, Clone)]
pub struct DetectionHandle {
    progress: Progress,
    activity: Arc<watch::Sender<ActivityState>>,
}

impl DetectionHandle {
    /// Cancel the attempt. Its completion will not be invoked.
    pub fn cancel(&self) {
        info!("Cancelling exposure detection");
        self.progress.cancel();
        self.activity.send_replace(ActivityState::Idle);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.progress.is_cancelled()
    }

    #[must_use]
    pub fn subscribe_activity(&self) -> watch::Receiver<ActivityState> {
        self.activity.subscribe()
    }
}

/// One exposure detection attempt.
pub struct ExposureDetection<D, K>
where
    D: ExposureDetectionDelegate,
    K: KeyPackageDownloader,
{
    delegate: Arc<D>,
    downloader: Arc<K>,
    settings: DetectionSettings,
    eu_settings: EuTracingSettings,
    progress: Progress,
    activity: Arc<watch::Sender<ActivityState>>,
}

impl<D, K> ExposureDetection<D, K>
where
    D: ExposureDetectionDelegate,
    K: KeyPackageDownloader,
{
    /// Create a new attempt.
    pub fn new(
        delegate: Arc<D>,
        downloader: Arc<K>,
        settings: DetectionSettings,
        eu_settings: EuTracingSettings,
    ) -> Self {
        let (activity, _rx) = watch::channel(ActivityState::Idle);
        Self {
            delegate,
            downloader,
            settings,
            eu_settings,
            progress: Progress::new(),
            activity: Arc::new(activity),
        }
    }

    /// Handle for cancelling the attempt once it has been started.
    #[must_use]
    pub fn handle(&self) -> DetectionHandle {
        DetectionHandle {
            progress: self.progress.clone(),
            activity: Arc::clone(&self.activity),
        }
    }

    #[must_use]
    pub fn subscribe_activity(&self) -> watch::Receiver<ActivityState> {
        self.activity.subscribe()
    }

    /// Run the attempt and deliver its outcome to `completion`.
    ///
    /// The completion runs on the task awaiting this future, exactly once,
    /// unless the attempt is cancelled.
    pub async fn start<F>(self, completion: F)
    where
        F: FnOnce(DetectionResult) + Send,
    {
        let mut completion = CompletionSlot::new(completion);

        info!("Starting exposure detection ({:?} region mode)", self.settings.region_mode);
        self.set_activity(ActivityState::Downloading);

        let outcome = tokio::select! {
            biased;
            () = self.progress.cancelled() => None,
            result = self.run() => Some(result),
        };

        self.activity.send_replace(ActivityState::Idle);

        match outcome {
            Some(result) if !self.progress.is_cancelled() => {
                match &result {
                    Ok(summary) => info!(
                        "Exposure detection finished: {} matched keys, max risk score {}",
                        summary.matched_key_count, summary.maximum_risk_score
                    ),
                    Err(reason) => warn!("Exposure detection ended prematurely: {}", reason),
                }
                completion.fire(result);
            }
            _ => {
                info!("Exposure detection cancelled, dropping completion");
                completion.discard();
            }
        }
    }

    async fn run(&self) -> DetectionResult {
        let regions = self.regions_to_detect().await?;
        self.download_key_packages(&regions).await?;
        let mut written = self.write_key_packages(&regions)?;

        self.set_activity(ActivityState::Detecting);

        let Some(configuration) = self.delegate.latest_exposure_configuration().await else {
            return Err(DidEndPrematurelyReason::NoExposureConfiguration);
        };

        debug!("Matching {} written package files", written.len());
        let result = self
            .delegate
            .detect_summary(&configuration, &written, self.progress.clone())
            .await;
        written.clean_up();

        result.map_err(DidEndPrematurelyReason::NoSummary)
    }

    async fn regions_to_detect(&self) -> Result<Vec<RegionId>, DidEndPrematurelyReason> {
        let default_region = &self.settings.default_region;

        let regions = match self.settings.region_mode {
            RegionMode::Single => vec![default_region.clone()],
            RegionMode::Multi => {
                let supported = self.delegate.supported_regions().await.map_err(|e| {
                    warn!("{}", e);
                    DidEndPrematurelyReason::NoSupportedCountries
                })?;
                self.eu_settings.regions_to_detect(&supported, default_region)
            }
        };

        debug!("Detecting exposures for regions {:?}", regions);
        Ok(regions)
    }

    /// Download all regions concurrently and wait for every one of them.
    ///
    /// On failure the reason of the first failing region in `regions` order
    /// is returned, independent of which download finished first.
    async fn download_key_packages(&self, regions: &[RegionId]) -> Result<(), DidEndPrematurelyReason> {
        let results = join_all(
            regions
                .iter()
                .map(|region| self.downloader.download_key_packages(region)),
        )
        .await;

        let mut first_failure = None;
        for (region, result) in regions.iter().zip(results) {
            if let Err(reason) = result {
                warn!("Key package download for {} failed: {}", region, reason);
                first_failure.get_or_insert(reason);
            }
        }

        match first_failure {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    fn write_key_packages(&self, regions: &[RegionId]) -> Result<WrittenPackages, DidEndPrematurelyReason> {
        let mut combined = WrittenPackages::default();

        for region in regions {
            let Some(written) = self.delegate.write_downloaded_packages(region) else {
                warn!("Writing key packages for {} failed", region);
                return Err(DidEndPrematurelyReason::UnableToWriteDiagnosisKeys);
            };
            combined.absorb(written);
        }

        Ok(combined)
    }

    fn set_activity(&self, state: ActivityState) {
        let progress = &self.progress;
        self.activity.send_if_modified(|current| {
            if progress.is_cancelled() || *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}
