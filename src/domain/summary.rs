//! Exposure detection summary produced by platform matching.

use serde::{Deserialize, Serialize};

/// Result of one platform matching run.
///
/// Attenuation durations are in seconds and ordered `[low, mid, high]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureDetectionSummary {
    pub days_since_last_exposure: u32,
    pub matched_key_count: u64,
    pub maximum_risk_score: u8,
    pub configured_attenuation_durations: [f64; 3],
}

impl ExposureDetectionSummary {
    #[must_use]
    pub fn new(maximum_risk_score: u8, configured_attenuation_durations: [f64; 3]) -> Self {
        Self {
            days_since_last_exposure: 0,
            matched_key_count: 0,
            maximum_risk_score,
            configured_attenuation_durations,
        }
    }

    /// Attenuation durations converted to minutes.
    #[must_use]
    pub fn attenuation_durations_in_minutes(&self) -> [f64; 3] {
        self.configured_attenuation_durations.map(|seconds| seconds / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_in_minutes() {
        let summary = ExposureDetectionSummary::new(10, [60.0, 30.0, 0.0]);
        assert_eq!(summary.attenuation_durations_in_minutes(), [1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "daysSinceLastExposure": 2,
            "matchedKeyCount": 4,
            "maximumRiskScore": 80,
            "configuredAttenuationDurations": [10.0, 10.0, 10.0]
        }"#;
        let summary: ExposureDetectionSummary = serde_json::from_str(json).expect("Should parse");
        assert_eq!(summary.matched_key_count, 4);
        assert_eq!(summary.maximum_risk_score, 80);
    }
}
