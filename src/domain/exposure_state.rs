//! Device-side exposure notification state.

use serde::{Deserialize, Serialize};

/// Platform status of the exposure notification framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExposureNotificationStatus {
    Active,
    Disabled,
    BluetoothOff,
    Restricted,
    Paused,
    Unknown,
}

/// Preconditions for a risk calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureManagerState {
    pub authorized: bool,
    pub enabled: bool,
    pub status: ExposureNotificationStatus,
}

impl ExposureManagerState {
    #[must_use]
    pub fn new(authorized: bool, enabled: bool, status: ExposureNotificationStatus) -> Self {
        Self {
            authorized,
            enabled,
            status,
        }
    }

    /// Authorized, enabled and actively scanning.
    #[must_use]
    pub fn is_good(&self) -> bool {
        self.authorized && self.enabled && self.status == ExposureNotificationStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_authorized_enabled_is_good() {
        assert!(ExposureManagerState::new(true, true, ExposureNotificationStatus::Active).is_good());
        assert!(!ExposureManagerState::new(false, true, ExposureNotificationStatus::Active).is_good());
        assert!(!ExposureManagerState::new(true, false, ExposureNotificationStatus::Active).is_good());
        assert!(
            !ExposureManagerState::new(true, true, ExposureNotificationStatus::BluetoothOff).is_good()
        );
    }
}
