//! Regions key packages are published for.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Region the app falls back to when nothing else is selected.
pub const DEFAULT_REGION: &str = "DE";

/// ISO 3166 country code identifying a region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    /// Create a region ID, normalizing to upper case.
    #[must_use]
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RegionId {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A region supported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
}

impl Region {
    #[must_use]
    pub fn new(code: impl AsRef<str>) -> Self {
        Self {
            id: RegionId::new(code),
        }
    }
}

/// The user's choice of regions to check against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EuTracingSettings {
    pub all_regions_enabled: bool,
    pub enabled_regions: Vec<RegionId>,
}

impl EuTracingSettings {
    /// Regions a multi-region detection covers.
    ///
    /// Every supported region when all are enabled, otherwise the user's list,
    /// without duplicates and in first-seen order. The default region is
    /// always appended if not already present, so the result is never empty.
    #[must_use]
    pub fn regions_to_detect(&self, supported: &[Region], default_region: &RegionId) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = if self.all_regions_enabled {
            supported.iter().map(|r| r.id.clone()).collect()
        } else {
            self.enabled_regions.clone()
        };

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));

        if !ids.contains(default_region) {
            ids.push(default_region.clone());
        }
        ids
    }
}
