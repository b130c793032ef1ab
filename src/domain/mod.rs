//! Domain layer: Core value types.
//!
//! Plain Rust types shared by the calculation and the detection pipeline.
//! Everything here is serializable; nothing here performs I/O except the
//! cleanup of `WrittenPackages`.

mod configuration;
mod exposure_state;
mod packages;
mod region;
mod risk;
mod summary;

pub use configuration::{
    AppFeature, ApplicationConfiguration, AttenuationDuration, AttenuationDurationWeights,
    ExposureConfiguration, RiskScoreClass, DISABLE_DEVICE_TIME_CHECK_FEATURE,
    HIGH_RISK_CLASS_LABEL, LOW_RISK_CLASS_LABEL,
};
pub use exposure_state::{ExposureManagerState, ExposureNotificationStatus};
pub use packages::{KeyPackage, WrittenPackages};
pub use region::{EuTracingSettings, Region, RegionId, DEFAULT_REGION};
pub use risk::{Risk, RiskDetails, RiskLevel};
pub use summary::ExposureDetectionSummary;
