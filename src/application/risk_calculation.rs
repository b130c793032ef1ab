//! Risk calculation: Derives a risk level from a detection summary.
//!
//! Everything needed is passed in; no I/O and no async work.
//!
//! The level is determined by a precedence chain:
//! 1. Exposure notifications not active: `Inactive`, nothing else is checked
//! 2. Tracing active for less than one day: at least `UnknownInitial`
//! 3. No summary available: at least `UnknownInitial`
//! 4. Last exposure detection not within one day: at least `UnknownOutdated`
//! 5. Raw score in the LOW band: at least `Low`; in the HIGH band: at least `Increased`
//!
//! Steps 2-5 only ever raise the level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ApplicationConfiguration, ExposureDetectionSummary, ExposureManagerState, Risk, RiskDetails,
    RiskLevel, HIGH_RISK_CLASS_LABEL, LOW_RISK_CLASS_LABEL,
};

/// Errors that can occur while classifying a summary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskLevelCalculationError {
    #[error("Risk score {score} is outside of the configured risk ranges")]
    RiskOutsideRange { score: f64 },

    #[error("Risk score class {label} is not configured")]
    UndefinedRiskRange { label: &'static str },

    #[error("Invalid risk configuration: {0}")]
    InvalidConfiguration(String),
}

/// Everything a risk calculation consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCalculationInput {
    /// Latest summary, `None` if no detection has succeeded yet
    pub summary: Option<ExposureDetectionSummary>,
    pub configuration: ApplicationConfiguration,
    pub date_last_exposure_detection: Option<DateTime<Utc>>,
    pub number_of_tracing_active_days: u32,
    pub preconditions: ExposureManagerState,
}

/// Compute the raw risk score of a summary, rounded to two decimal places.
///
/// `normalized max risk score * (weighted attenuation minutes + bucket offset)`
///
/// # Errors
/// Returns `InvalidConfiguration` if the normalization divisor is not positive.
pub fn calculate_raw_risk(
    summary: &ExposureDetectionSummary,
    configuration: &ApplicationConfiguration,
) -> Result<f64, RiskLevelCalculationError> {
    let attenuation = &configuration.attenuation_duration;
    if attenuation.risk_score_normalization_divisor <= 0 {
        return Err(RiskLevelCalculationError::InvalidConfiguration(format!(
            "risk score normalization divisor must be positive, got {}",
            attenuation.risk_score_normalization_divisor
        )));
    }

    let [low, mid, high] = summary.attenuation_durations_in_minutes();
    let weights = &attenuation.weights;

    let norm_risk_score =
        f64::from(summary.maximum_risk_score) / f64::from(attenuation.risk_score_normalization_divisor);
    let weight = low * weights.low
        + mid * weights.mid
        + high * weights.high
        + f64::from(attenuation.default_bucket_offset);

    Ok(round_to_two_places(norm_risk_score * weight))
}

// Half away from zero, like f64::round.
fn round_to_two_places(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether `last_detection` is recent enough for the result to count.
///
/// Fewer than one whole day must have elapsed between the two dates. A
/// detection date in the future counts as recent.
#[must_use]
pub fn is_within_exposure_detection_valid_interval(
    last_detection: DateTime<Utc>,
    current_date: DateTime<Utc>,
) -> bool {
    (current_date - last_detection).num_days() < 1
}

fn risk_level(
    input: &RiskCalculationInput,
    current_date: DateTime<Utc>,
) -> Result<RiskLevel, RiskLevelCalculationError> {
    if !input.preconditions.is_good() {
        return Ok(RiskLevel::Inactive);
    }

    let mut level = RiskLevel::Low;

    if input.number_of_tracing_active_days < 1 {
        level = level.max(RiskLevel::UnknownInitial);
    }

    if input.summary.is_none() {
        level = level.max(RiskLevel::UnknownInitial);
    }

    if let Some(last_detection) = input.date_last_exposure_detection {
        if !is_within_exposure_detection_valid_interval(last_detection, current_date) {
            level = level.max(RiskLevel::UnknownOutdated);
        }
    }

    let Some(summary) = &input.summary else {
        return Ok(level);
    };

    let configuration = &input.configuration;
    let low_class = configuration
        .low_class()
        .ok_or(RiskLevelCalculationError::UndefinedRiskRange {
            label: LOW_RISK_CLASS_LABEL,
        })?;
    let high_class = configuration
        .high_class()
        .ok_or(RiskLevelCalculationError::UndefinedRiskRange {
            label: HIGH_RISK_CLASS_LABEL,
        })?;

    let low_range = f64::from(low_class.min)..=f64::from(low_class.max);
    let high_range = f64::from(high_class.min)..f64::from(high_class.max);

    let score = calculate_raw_risk(summary, configuration)?;

    let calculated = if low_range.contains(&score) {
        RiskLevel::Low
    } else if high_range.contains(&score) {
        RiskLevel::Increased
    } else {
        return Err(RiskLevelCalculationError::RiskOutsideRange { score });
    };

    tracing::debug!("Raw risk score {} classified as {}", score, calculated);
    Ok(level.max(calculated))
}

/// Calculate the risk as of `current_date`.
///
/// # Errors
/// Returns `RiskLevelCalculationError` if the summary cannot be classified.
pub fn risk_at(
    input: &RiskCalculationInput,
    current_date: DateTime<Utc>,
) -> Result<Risk, RiskLevelCalculationError> {
    let level = risk_level(input, current_date)?;

    Ok(Risk {
        level,
        details: RiskDetails {
            number_of_exposures: input.summary.as_ref().map(|s| s.matched_key_count),
            number_of_days_with_active_tracing: input.number_of_tracing_active_days,
            exposure_detection_date: input.date_last_exposure_detection.unwrap_or(current_date),
        },
    })
}

/// Calculate the risk as of now.
///
/// # Errors
/// Returns `RiskLevelCalculationError` if the summary cannot be classified.
pub fn risk(input: &RiskCalculationInput) -> Result<Risk, RiskLevelCalculationError> {
    risk_at(input, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AttenuationDuration, AttenuationDurationWeights, ExposureNotificationStatus, RiskScoreClass,
    };
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn app_config() -> ApplicationConfiguration {
        ApplicationConfiguration {
            attenuation_duration: AttenuationDuration {
                weights: AttenuationDurationWeights {
                    low: 1.0,
                    mid: 0.5,
                    high: 0.5,
                },
                default_bucket_offset: 0,
                risk_score_normalization_divisor: 25,
            },
            // The gap between 5 and 6 is deliberate
            risk_score_classes: vec![
                RiskScoreClass::new("LOW", 1, 5),
                RiskScoreClass::new("HIGH", 6, 11),
            ],
            app_features: Vec::new(),
        }
    }

    fn summary(max_risk_score: u8, duration: f64) -> ExposureDetectionSummary {
        ExposureDetectionSummary::new(max_risk_score, [duration, duration, duration])
    }

    fn summary_low() -> ExposureDetectionSummary {
        summary(80, 10.0)
    }

    fn summary_high() -> ExposureDetectionSummary {
        summary(255, 30.0)
    }

    fn valid() -> ExposureManagerState {
        ExposureManagerState::new(true, true, ExposureNotificationStatus::Active)
    }

    fn invalid() -> ExposureManagerState {
        ExposureManagerState::new(true, false, ExposureNotificationStatus::Disabled)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 10, 20, 12, 0, 0).unwrap()
    }

    fn input(
        summary: Option<ExposureDetectionSummary>,
        last_detection: Option<DateTime<Utc>>,
        days: u32,
        preconditions: ExposureManagerState,
    ) -> RiskCalculationInput {
        RiskCalculationInput {
            summary,
            configuration: app_config(),
            date_last_exposure_detection: last_detection,
            number_of_tracing_active_days: days,
            preconditions,
        }
    }

    fn level_of(input: &RiskCalculationInput) -> RiskLevel {
        risk_at(input, now()).expect("Should calculate").level
    }

    // Raw risk score

    #[test]
    fn test_raw_risk_zero() {
        let score = calculate_raw_risk(&summary(0, 10.0), &app_config()).expect("Should compute");
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_raw_risk_low() {
        assert_eq!(calculate_raw_risk(&summary_low(), &app_config()), Ok(1.07));
    }

    #[test]
    fn test_raw_risk_med() {
        assert_eq!(calculate_raw_risk(&summary(128, 15.0), &app_config()), Ok(2.56));
    }

    #[test]
    fn test_raw_risk_high() {
        assert_eq!(calculate_raw_risk(&summary_high(), &app_config()), Ok(10.2));
    }

    #[test]
    fn test_raw_risk_bucket_offset() {
        let mut config = app_config();
        config.attenuation_duration.default_bucket_offset = 1;
        // 10.2 * (1.0 + 1)
        assert_eq!(calculate_raw_risk(&summary_high(), &config), Ok(20.4));
    }

    #[test]
    fn test_raw_risk_rejects_zero_divisor() {
        let mut config = app_config();
        config.attenuation_duration.risk_score_normalization_divisor = 0;
        assert!(matches!(
            calculate_raw_risk(&summary_low(), &config),
            Err(RiskLevelCalculationError::InvalidConfiguration(_))
        ));
    }

    // Risk levels

    #[test]
    fn test_inactive() {
        let input = input(Some(summary_high()), Some(now()), 2, invalid());
        assert_eq!(level_of(&input), RiskLevel::Inactive);
    }

    #[test]
    fn test_unknown_initial_tracing_too_short() {
        let input = input(Some(summary_low()), Some(now()), 0, valid());
        assert_eq!(level_of(&input), RiskLevel::UnknownInitial);
    }

    #[test]
    fn test_unknown_initial_no_summary() {
        let input = input(None, Some(now()), 15, valid());
        assert_eq!(level_of(&input), RiskLevel::UnknownInitial);
    }

    #[test]
    fn test_unknown_outdated() {
        let input = input(Some(summary_low()), Some(now() - Duration::days(1)), 15, valid());
        assert_eq!(level_of(&input), RiskLevel::UnknownOutdated);
    }

    #[test]
    fn test_low() {
        let input = input(Some(summary_low()), Some(now() - Duration::hours(1)), 15, valid());
        assert_eq!(level_of(&input), RiskLevel::Low);
    }

    #[test]
    fn test_increased() {
        let input = input(Some(summary_high()), Some(now() - Duration::hours(1)), 15, valid());
        assert_eq!(level_of(&input), RiskLevel::Increased);
    }

    #[test]
    fn test_no_previous_detection_is_not_outdated() {
        let input = input(Some(summary_low()), None, 15, valid());
        let risk = risk_at(&input, now()).expect("Should calculate");
        assert_eq!(risk.level, RiskLevel::Low);
        assert_eq!(risk.details.exposure_detection_date, now());
    }

    // Errors

    #[test]
    fn test_outside_range_in_gap() {
        // 5.12, between LOW max and HIGH min
        let input = input(Some(summary(128, 30.0)), Some(now() - Duration::hours(1)), 15, valid());
        assert_eq!(
            risk_at(&input, now()),
            Err(RiskLevelCalculationError::RiskOutsideRange { score: 5.12 })
        );
    }

    #[test]
    fn test_outside_range_above_high() {
        // 13.6 is not clamped to the HIGH band
        let input = input(Some(summary(255, 40.0)), Some(now() - Duration::hours(1)), 15, valid());
        assert_eq!(
            risk_at(&input, now()),
            Err(RiskLevelCalculationError::RiskOutsideRange { score: 13.6 })
        );
    }

    #[test]
    fn test_outside_range_below_low() {
        // 0.85
        let input = input(Some(summary(64, 10.0)), Some(now() - Duration::hours(1)), 15, valid());
        assert!(matches!(
            risk_at(&input, now()),
            Err(RiskLevelCalculationError::RiskOutsideRange { .. })
        ));
    }

    #[test]
    fn test_low_band_upper_bound_is_inclusive() {
        // 5.0
        let input = input(Some(summary(125, 30.0)), Some(now()), 15, valid());
        assert_eq!(level_of(&input), RiskLevel::Low);
    }

    #[test]
    fn test_high_band_upper_bound_is_exclusive() {
        let mut input = input(Some(summary(125, 30.0)), Some(now()), 15, valid());
        input.configuration.risk_score_classes = vec![
            RiskScoreClass::new("LOW", 0, 3),
            RiskScoreClass::new("HIGH", 4, 5),
        ];
        assert_eq!(
            risk_at(&input, now()),
            Err(RiskLevelCalculationError::RiskOutsideRange { score: 5.0 })
        );
    }

    #[test]
    fn test_undefined_risk_range() {
        let mut input = input(Some(summary_low()), Some(now()), 15, valid());
        input.configuration.risk_score_classes.retain(|c| c.label != "HIGH");
        assert_eq!(
            risk_at(&input, now()),
            Err(RiskLevelCalculationError::UndefinedRiskRange { label: "HIGH" })
        );

        input.configuration.risk_score_classes.clear();
        assert_eq!(
            risk_at(&input, now()),
            Err(RiskLevelCalculationError::UndefinedRiskRange { label: "LOW" })
        );
    }

    #[test]
    fn test_missing_ranges_ignored_without_summary() {
        let mut input = input(None, Some(now()), 15, valid());
        input.configuration.risk_score_classes.clear();
        assert_eq!(level_of(&input), RiskLevel::UnknownInitial);
    }

    // Hierarchy

    #[test]
    fn test_increased_overrides_unknown_outdated() {
        let input = input(Some(summary_high()), Some(now() - Duration::days(2)), 15, valid());
        assert_eq!(level_of(&input), RiskLevel::Increased);
    }

    #[test]
    fn test_unknown_initial_overrides_unknown_outdated() {
        let input = input(None, Some(now() - Duration::days(2)), 15, valid());
        assert_eq!(level_of(&input), RiskLevel::UnknownInitial);
    }

    // Details

    #[test]
    fn test_details() {
        let mut s = summary_low();
        s.matched_key_count = 3;
        let last = now() - Duration::hours(2);
        let risk = risk_at(&input(Some(s), Some(last), 7, valid()), now()).expect("Should calculate");

        assert_eq!(risk.details.number_of_exposures, Some(3));
        assert_eq!(risk.details.number_of_days_with_active_tracing, 7);
        assert_eq!(risk.details.exposure_detection_date, last);

        let risk = risk_at(&input(None, None, 7, valid()), now()).expect("Should calculate");
        assert_eq!(risk.details.number_of_exposures, None);
    }

    #[test]
    fn test_valid_interval() {
        assert!(is_within_exposure_detection_valid_interval(now(), now()));
        assert!(is_within_exposure_detection_valid_interval(
            now() - Duration::hours(23),
            now()
        ));
        assert!(!is_within_exposure_detection_valid_interval(
            now() - Duration::hours(24),
            now()
        ));
        assert!(is_within_exposure_detection_valid_interval(
            now() + Duration::days(3),
            now()
        ));
    }

    fn arb_summary() -> impl Strategy<Value = Option<ExposureDetectionSummary>> {
        prop::option::of(
            (any::<u8>(), 0.0f64..3600.0).prop_map(|(score, duration)| summary(score, duration)),
        )
    }

    fn arb_last_detection() -> impl Strategy<Value = Option<DateTime<Utc>>> {
        prop::option::of((0i64..10 * 24).prop_map(|hours| now() - Duration::hours(hours)))
    }

    proptest! {
        #[test]
        fn inactive_always_wins(
            summary in arb_summary(),
            last in arb_last_detection(),
            days in 0u32..30,
            authorized in any::<bool>(),
        ) {
            let preconditions = ExposureManagerState::new(
                authorized,
                false,
                ExposureNotificationStatus::Disabled,
            );
            let risk = risk_at(&input(summary, last, days, preconditions), now());
            prop_assert_eq!(risk.map(|r| r.level), Ok(RiskLevel::Inactive));
        }

        #[test]
        fn short_tracing_is_at_least_unknown_initial(
            summary in arb_summary(),
            last in arb_last_detection(),
        ) {
            if let Ok(risk) = risk_at(&input(summary, last, 0, valid()), now()) {
                prop_assert!(risk.level >= RiskLevel::UnknownInitial);
            }
        }

        #[test]
        fn missing_summary_is_unknown_initial(
            last in arb_last_detection(),
            days in 1u32..30,
        ) {
            let risk = risk_at(&input(None, last, days, valid()), now());
            prop_assert_eq!(risk.map(|r| r.level), Ok(RiskLevel::UnknownInitial));
        }

        #[test]
        fn stale_detection_is_at_least_unknown_outdated(
            hours in 48i64..24 * 30,
            use_high in any::<bool>(),
        ) {
            let s = if use_high { summary_high() } else { summary_low() };
            let last = now() - Duration::hours(hours);
            let level = level_of(&input(Some(s), Some(last), 15, valid()));
            let expected = if use_high { RiskLevel::Increased } else { RiskLevel::UnknownOutdated };
            prop_assert_eq!(level, expected);
        }
    }
}
