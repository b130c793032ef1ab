//! Device time check: Flags a device clock that disagrees with the server.
//!
//! Risk results depend on the device clock, so the app warns the user when it
//! is off by more than two hours. The check can be switched off through the
//! `disable-device-time-check` app feature.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::ports::AppConfigCaching;

/// Maximum tolerated distance between device and server time, in hours.
const DEVICE_TIME_TOLERANCE_HOURS: i64 = 2;

/// Service checking and persisting the device time flags.
pub struct DeviceTimeCheck<S>
where
    S: AppConfigCaching,
{
    store: Arc<S>,
}

impl<S> DeviceTimeCheck<S>
where
    S: AppConfigCaching,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Compare `device_time` against `server_time` and persist the result.
    ///
    /// # Errors
    /// Returns error if the store cannot be read or written.
    pub fn check_and_persist_device_time_flags(
        &self,
        server_time: DateTime<Utc>,
        device_time: DateTime<Utc>,
    ) -> Result<(), S::Error> {
        let kill_switch_active = self
            .store
            .app_config()?
            .is_some_and(|config| config.device_time_check_disabled());
        let correct = is_device_time_correct(server_time, device_time);

        if !correct {
            tracing::warn!(
                "Device time deviates from server time by {} minutes{}",
                (device_time - server_time).num_minutes(),
                if kill_switch_active { " (check disabled)" } else { "" }
            );
        }

        let stored = kill_switch_active || correct;
        self.store.set_device_time_is_correct(stored)?;
        if stored {
            self.store.set_device_time_error_was_shown(false)?;
        }
        Ok(())
    }

    /// Back to "correct, nothing shown".
    ///
    /// # Errors
    /// Returns error if the store cannot be written.
    pub fn reset_device_time_flags(&self) -> Result<(), S::Error> {
        self.store.set_device_time_is_correct(true)?;
        self.store.set_device_time_error_was_shown(false)
    }
}

fn is_device_time_correct(server_time: DateTime<Utc>, device_time: DateTime<Utc>) -> bool {
    let tolerance = Duration::hours(DEVICE_TIME_TOLERANCE_HOURS);
    (server_time - tolerance..=server_time + tolerance).contains(&device_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStore;
    use crate::domain::{AppFeature, ApplicationConfiguration, DISABLE_DEVICE_TIME_CHECK_FEATURE};
    use chrono::TimeZone;

    fn server_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 12, 1, 9, 0, 0).unwrap()
    }

    fn create_check() -> (DeviceTimeCheck<SqliteStore>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
        (DeviceTimeCheck::new(Arc::clone(&store)), store)
    }

    fn kill_switch(value: i32) -> ApplicationConfiguration {
        ApplicationConfiguration {
            app_features: vec![AppFeature {
                label: DISABLE_DEVICE_TIME_CHECK_FEATURE.to_string(),
                value,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_tolerance_bounds_are_inclusive() {
        let two_hours = Duration::hours(2);
        assert!(is_device_time_correct(server_time(), server_time() + two_hours));
        assert!(is_device_time_correct(server_time(), server_time() - two_hours));
        assert!(!is_device_time_correct(
            server_time(),
            server_time() + two_hours + Duration::seconds(1)
        ));
    }

    #[test]
    fn test_correct_time_resets_error_shown() {
        let (check, store) = create_check();
        store.set_device_time_error_was_shown(true).expect("Should write");

        check
            .check_and_persist_device_time_flags(server_time(), server_time() + Duration::minutes(30))
            .expect("Should check");

        assert!(store.device_time_is_correct().expect("Should read"));
        assert!(!store.device_time_error_was_shown().expect("Should read"));
    }

    #[test]
    fn test_wrong_time_is_flagged() {
        let (check, store) = create_check();
        store.set_device_time_error_was_shown(true).expect("Should write");

        check
            .check_and_persist_device_time_flags(server_time(), server_time() - Duration::hours(3))
            .expect("Should check");

        assert!(!store.device_time_is_correct().expect("Should read"));
        // Not touched while the time is wrong
        assert!(store.device_time_error_was_shown().expect("Should read"));
    }

    #[test]
    fn test_kill_switch_forces_correct() {
        let (check, store) = create_check();
        store.set_app_config(&kill_switch(1)).expect("Should write");

        check
            .check_and_persist_device_time_flags(server_time(), server_time() + Duration::days(1))
            .expect("Should check");
        assert!(store.device_time_is_correct().expect("Should read"));

        store.set_app_config(&kill_switch(0)).expect("Should write");
        check
            .check_and_persist_device_time_flags(server_time(), server_time() + Duration::days(1))
            .expect("Should check");
        assert!(!store.device_time_is_correct().expect("Should read"));
    }

    #[test]
    fn test_reset() {
        let (check, store) = create_check();
        store.set_device_time_is_correct(false).expect("Should write");
        store.set_device_time_error_was_shown(true).expect("Should write");

        check.reset_device_time_flags().expect("Should reset");

        assert!(store.device_time_is_correct().expect("Should read"));
        assert!(!store.device_time_error_was_shown().expect("Should read"));
    }
}
