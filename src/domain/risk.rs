//! Risk result types.
//!
//! Represents the output of the exposure risk calculation.

use serde::{Deserialize, Serialize};

/// Risk level classification for an exposure check.
///
/// Variants are declared in precedence order: during a calculation a level is
/// only ever replaced by a higher one. `Inactive` sits on top and is also
/// returned immediately when exposure notifications are switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskLevel {
    /// Exposures were checked and the score is in the LOW band
    Low,
    /// The last successful exposure detection is more than a day old
    UnknownOutdated,
    /// Tracing has not been active for a full day, or no summary exists yet
    UnknownInitial,
    /// The score is in the HIGH band
    Increased,
    /// Exposure notifications are not active on the device
    Inactive,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::UnknownOutdated => write!(f, "UNKNOWN_OUTDATED"),
            Self::UnknownInitial => write!(f, "UNKNOWN_INITIAL"),
            Self::Increased => write!(f, "INCREASED"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Self::Low),
            "UNKNOWN_OUTDATED" => Ok(Self::UnknownOutdated),
            "UNKNOWN_INITIAL" => Ok(Self::UnknownInitial),
            "INCREASED" => Ok(Self::Increased),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(format!("Unknown risk level: {other}")),
        }
    }
}

/// Details attached to a computed risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDetails {
    /// Matched keys of the summary the risk was computed from
    pub number_of_exposures: Option<u64>,

    /// Days tracing has been active
    pub number_of_days_with_active_tracing: u32,

    /// When the underlying exposure detection ran
    pub exposure_detection_date: chrono::DateTime<chrono::Utc>,
}

/// Complete risk record produced by one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub level: RiskLevel,
    pub details: RiskDetails,
}
