//! # Exposure Risk
//!
//! Risk level calculation and exposure detection orchestration for an
//! exposure notification app.
//!
//! This crate provides:
//! - The risk calculation turning a detection summary into a `RiskLevel`
//! - The exposure detection pipeline (download, write, match) across regions
//! - Device time checking against the server clock
//! - Local persistence of configuration, key packages, summaries and risk
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core value types (Risk, Summary, Configuration, Regions)
//! - `ports`: Trait definitions for platform and storage operations
//! - `adapters`: Concrete implementations (SQLite, temp files, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub use application::{RiskCalculationInput, RiskLevelCalculationError};
pub use domain::{ExposureDetectionSummary, Risk, RiskLevel};

/// Result type for exposure risk operations
pub type Result<T> = std::result::Result<T, ExposureRiskError>;

/// Main error type for exposure risk operations
#[derive(Debug, thiserror::Error)]
pub enum ExposureRiskError {
    #[error("Risk calculation failed: {0}")]
    RiskCalculation(#[from] application::RiskLevelCalculationError),

    #[error("Exposure detection ended prematurely: {0}")]
    Detection(#[from] ports::DidEndPrematurelyReason),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("No application configuration cached")]
    MissingConfiguration,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
