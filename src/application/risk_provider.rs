//! Risk provider: Keeps the displayed risk in sync with stored detections.
//!
//! This service coordinates:
//! - Persisting summaries of successful detections
//! - Running the risk calculation against the cached app configuration
//! - Persisting the resulting risk
//! - Falling back to the previous risk when a calculation fails

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::adapters::StorageError;
use crate::application::exposure_detection::DetectionResult;
use crate::application::risk_calculation::{risk_at, RiskCalculationInput};
use crate::domain::{ExposureManagerState, Risk};
use crate::ports::{AppConfigCaching, SummaryStore};
use crate::ExposureRiskError;

/// Service providing the current risk.
pub struct RiskProvider<S>
where
    S: SummaryStore + AppConfigCaching,
{
    store: Arc<S>,
}

impl<S> RiskProvider<S>
where
    S: SummaryStore + AppConfigCaching,
    <S as SummaryStore>::Error: Into<StorageError>,
    <S as AppConfigCaching>::Error: Into<StorageError>,
{
    /// Create a new risk provider.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist the outcome of an exposure detection.
    ///
    /// A failed detection keeps the previous summary.
    ///
    /// # Errors
    /// Returns error if the summary cannot be stored.
    pub fn record_detection(
        &self,
        result: &DetectionResult,
        detected_at: DateTime<Utc>,
    ) -> Result<(), ExposureRiskError> {
        match result {
            Ok(summary) => {
                self.store
                    .save_summary(summary, detected_at)
                    .map_err(|e| ExposureRiskError::Storage(e.into()))?;
                tracing::info!("Stored exposure detection summary from {}", detected_at);
            }
            Err(reason) => {
                tracing::warn!("Keeping previous summary, detection failed: {}", reason);
            }
        }
        Ok(())
    }

    /// Calculate the risk as of `now` from the stored summary.
    ///
    /// # Errors
    /// Returns `MissingConfiguration` if no app configuration is cached, a
    /// storage error, or the calculation error if there is no previous risk
    /// to fall back to.
    pub fn evaluate(
        &self,
        preconditions: ExposureManagerState,
        number_of_tracing_active_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Risk, ExposureRiskError> {
        let configuration = AppConfigCaching::app_config(self.store.as_ref())
            .map_err(|e| ExposureRiskError::Storage(e.into()))?
            .ok_or(ExposureRiskError::MissingConfiguration)?;

        let (summary, date_last_exposure_detection) = match self
            .store
            .latest_summary()
            .map_err(|e| ExposureRiskError::Storage(e.into()))?
        {
            Some((summary, detected_at)) => (Some(summary), Some(detected_at)),
            None => (None, None),
        };

        let input = RiskCalculationInput {
            summary,
            configuration,
            date_last_exposure_detection,
            number_of_tracing_active_days,
            preconditions,
        };

        match risk_at(&input, now) {
            Ok(risk) => {
                self.store
                    .save_risk(&risk)
                    .map_err(|e| ExposureRiskError::Storage(e.into()))?;
                tracing::info!("Risk calculated: {}", risk.level);
                Ok(risk)
            }
            Err(e) => {
                tracing::warn!("Risk calculation failed: {}", e);
                match self.latest_risk()? {
                    Some(previous) => {
                        tracing::info!("Keeping previous risk: {}", previous.level);
                        Ok(previous)
                    }
                    None => Err(e.into()),
                }
            }
        }
    }

    /// The most recently calculated risk.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn latest_risk(&self) -> Result<Option<Risk>, ExposureRiskError> {
        self.store
            .latest_risk()
            .map_err(|e| ExposureRiskError::Storage(e.into()))
    }
}
