//! Application and platform configuration snapshots.
//!
//! `ApplicationConfiguration` carries the numeric tuning parameters of the
//! risk calculation and is fetched from the backend by an external provider.
//! `ExposureConfiguration` is handed through to platform matching untouched.

use serde::{Deserialize, Serialize};

/// Label of the risk score class treated as the LOW band.
pub const LOW_RISK_CLASS_LABEL: &str = "LOW";

/// Label of the risk score class treated as the HIGH band.
pub const HIGH_RISK_CLASS_LABEL: &str = "HIGH";

/// App feature that switches the device time check off when set to 1.
pub const DISABLE_DEVICE_TIME_CHECK_FEATURE: &str = "disable-device-time-check";

/// Per-bucket multipliers for attenuation durations (in minutes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttenuationDurationWeights {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl Default for AttenuationDurationWeights {
    fn default() -> Self {
        Self {
            low: 1.0,
            mid: 0.5,
            high: 0.0,
        }
    }
}

/// Attenuation duration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttenuationDuration {
    pub weights: AttenuationDurationWeights,
    pub default_bucket_offset: i32,
    pub risk_score_normalization_divisor: i32,
}

impl Default for AttenuationDuration {
    fn default() -> Self {
        Self {
            weights: AttenuationDurationWeights::default(),
            default_bucket_offset: 0,
            risk_score_normalization_divisor: 25,
        }
    }
}

/// A named range raw risk scores are classified against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScoreClass {
    pub label: String,
    pub min: i32,
    pub max: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RiskScoreClass {
    #[must_use]
    pub fn new(label: impl Into<String>, min: i32, max: i32) -> Self {
        Self {
            label: label.into(),
            min,
            max,
            url: None,
        }
    }
}

/// Remote feature flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppFeature {
    pub label: String,
    pub value: i32,
}

/// Numeric tuning parameters for the risk calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationConfiguration {
    pub attenuation_duration: AttenuationDuration,
    pub risk_score_classes: Vec<RiskScoreClass>,
    pub app_features: Vec<AppFeature>,
}

impl ApplicationConfiguration {
    fn class_labelled(&self, label: &str) -> Option<&RiskScoreClass> {
        self.risk_score_classes.iter().find(|c| c.label == label)
    }

    /// First risk score class labelled "LOW".
    #[must_use]
    pub fn low_class(&self) -> Option<&RiskScoreClass> {
        self.class_labelled(LOW_RISK_CLASS_LABEL)
    }

    /// First risk score class labelled "HIGH".
    #[must_use]
    pub fn high_class(&self) -> Option<&RiskScoreClass> {
        self.class_labelled(HIGH_RISK_CLASS_LABEL)
    }

    /// Look up a feature flag by label.
    #[must_use]
    pub fn feature(&self, label: &str) -> Option<&AppFeature> {
        self.app_features.iter().find(|f| f.label == label)
    }

    /// Whether the device time check has been switched off remotely.
    #[must_use]
    pub fn device_time_check_disabled(&self) -> bool {
        self.feature(DISABLE_DEVICE_TIME_CHECK_FEATURE)
            .is_some_and(|f| f.value == 1)
    }
}

/// Configuration passed to platform matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExposureConfiguration {
    pub minimum_risk_score: u8,
    pub attenuation_level_values: [u8; 8],
    pub days_since_last_exposure_level_values: [u8; 8],
    pub duration_level_values: [u8; 8],
    pub transmission_risk_level_values: [u8; 8],
    /// dB thresholds splitting the low/mid/high attenuation buckets
    pub attenuation_duration_thresholds: [u8; 2],
}

impl Default for ExposureConfiguration {
    fn default() -> Self {
        Self {
            minimum_risk_score: 11,
            attenuation_level_values: [1, 2, 3, 4, 5, 6, 7, 8],
            days_since_last_exposure_level_values: [1, 2, 3, 4, 5, 6, 7, 8],
            duration_level_values: [1, 2, 3, 4, 5, 6, 7, 8],
            transmission_risk_level_values: [1, 2, 3, 4, 5, 6, 7, 8],
            attenuation_duration_thresholds: [50, 70],
        }
    }
}
