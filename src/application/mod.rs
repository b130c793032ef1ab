//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases: risk calculation, exposure detection, the device time
//! check and the risk provider tying them to storage.

mod device_time_check;
pub mod exposure_detection;
pub mod risk_calculation;
mod risk_provider;

pub use device_time_check::DeviceTimeCheck;
pub use exposure_detection::{
    ActivityState, CompletionSlot, DetectionHandle, DetectionResult, DetectionSettings,
    ExposureDetection, RegionMode,
};
pub use risk_calculation::{RiskCalculationInput, RiskLevelCalculationError};
pub use risk_provider::RiskProvider;
