//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the core and external systems (platform matching, backend
//! downloads, local storage).

mod detection;
mod storage;

pub use detection::{
    ConfigurationProvider, DidEndPrematurelyReason, ExposureDetectionDelegate,
    KeyPackageDownloader, MatchingError, PackageWriter, PlatformMatcher, Progress, RegionsError,
    SupportedRegionsProvider,
};
pub use storage::{AppConfigCaching, PackageStore, SummaryStore};
