//! Key packages and their transient on-disk form.
//!
//! # Cleanup
//!
//! `WrittenPackages` owns the files it lists. They are removed by
//! `clean_up()` or, if that never happened, when the handle is dropped.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::RegionId;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A signed bundle of diagnosis keys for one day (or hour) of one region.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPackage {
    pub region: RegionId,
    pub day: NaiveDate,
    /// Set for hourly packages
    pub hour: Option<u8>,
    pub bin: Vec<u8>,
    pub signature: Vec<u8>,
}

impl KeyPackage {
    #[must_use]
    pub fn daily(region: RegionId, day: NaiveDate, bin: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            region,
            day,
            hour: None,
            bin,
            signature,
        }
    }

    #[must_use]
    pub fn hourly(region: RegionId, day: NaiveDate, hour: u8, bin: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            region,
            day,
            hour: Some(hour),
            bin,
            signature,
        }
    }

    /// SHA-256 of the key export, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        to_hex(&Sha256::digest(&self.bin))
    }
}

// Key exports are not logged byte for byte.
impl std::fmt::Debug for KeyPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPackage")
            .field("region", &self.region)
            .field("day", &self.day)
            .field("hour", &self.hour)
            .field("bin_len", &self.bin.len())
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// Files a detection attempt handed to platform matching.
#[derive(Debug, Default)]
pub struct WrittenPackages {
    paths: Vec<PathBuf>,
    cleaned: bool,
}

impl WrittenPackages {
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cleaned: false,
        }
    }

    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Take over the files of another handle. `other` is left empty.
    pub fn absorb(&mut self, mut other: WrittenPackages) {
        self.paths.append(&mut other.paths);
        other.cleaned = true;
    }

    /// Delete all files. Only the first call has an effect.
    pub fn clean_up(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        let mut removed = 0usize;
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove written package {}: {}", path.display(), e),
            }
        }
        tracing::debug!("Cleaned up {} written package files", removed);
    }

    #[must_use]
    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned
    }
}

impl Drop for WrittenPackages {
    fn drop(&mut self) {
        self.clean_up();
    }
}
