use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const MAX_DAY_OFFSET_MINUTES: i64 = 14 * 60;
const MAX_EXAM_DURATION_SECS: i64 = 24 * 60 * 60;
const MAX_BREAK_SECS: i64 = 24 * 60 * 60;
const MAX_REDEEM_WINDOW_HOURS: i64 = 366 * 24;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("smartWeakPointsProbability must be between 0 and 1, got {0}")]
    Probability(f64),
}

/// Tunable constants of the engine. Every field has a default, so a config file only needs the keys
/// it changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Swipes a free learner may make per calendar day.
    pub free_daily_swipe_cap: u32,
    /// Chance that a smart session reviews weak points when no category has errors yet.
    pub smart_weak_points_probability: f64,
    pub marathon_size: usize,
    pub exam_duration_secs: i64,
    /// Break between mock exam chapters.
    pub break_secs: i64,
    pub redeem_cost: u32,
    pub redeem_window_hours: i64,
    /// Offset of the learner's local day boundary from UTC midnight.
    pub day_offset_minutes: i64,
    /// Options per multiple-choice question, the correct one included.
    pub max_options: usize,
    pub xp_known: u32,
    pub xp_missed: u32,
    pub xp_exam_correct: u32,
    pub xp_exam_wrong: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            free_daily_swipe_cap: 10,
            smart_weak_points_probability: 0.4,
            marathon_size: 20,
            exam_duration_secs: 20 * 60,
            break_secs: 60,
            redeem_cost: 10,
            redeem_window_hours: 24,
            day_offset_minutes: 0,
            max_options: 4,
            xp_known: 10,
            xp_missed: 2,
            xp_exam_correct: 15,
            xp_exam_wrong: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            (
                "dayOffsetMinutes",
                self.day_offset_minutes,
                -MAX_DAY_OFFSET_MINUTES,
                MAX_DAY_OFFSET_MINUTES,
            ),
            ("examDurationSecs", self.exam_duration_secs, 1, MAX_EXAM_DURATION_SECS),
            ("breakSecs", self.break_secs, 0, MAX_BREAK_SECS),
            ("redeemWindowHours", self.redeem_window_hours, 1, MAX_REDEEM_WINDOW_HOURS),
        ];
        for (field, value, min, max) in ranges {
            if !(min..=max).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.smart_weak_points_probability) {
            return Err(ConfigError::Probability(self.smart_weak_points_probability));
        }
        Ok(())
    }

    /// The learner's calendar day at `now`.
    pub fn calendar_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.checked_add_signed(self.day_offset())
            .unwrap_or(now)
            .date_naive()
    }

    // Getters clamp to the validated ranges.

    pub fn day_offset(&self) -> Duration {
        Duration::minutes(
            self.day_offset_minutes
                .clamp(-MAX_DAY_OFFSET_MINUTES, MAX_DAY_OFFSET_MINUTES),
        )
    }

    pub fn exam_duration(&self) -> Duration {
        Duration::seconds(self.exam_duration_secs.clamp(0, MAX_EXAM_DURATION_SECS))
    }

    pub fn break_duration(&self) -> Duration {
        Duration::seconds(self.break_secs.clamp(0, MAX_BREAK_SECS))
    }

    pub fn redeem_window(&self) -> Duration {
        Duration::hours(self.redeem_window_hours.clamp(0, MAX_REDEEM_WINDOW_HOURS))
    }
}

/// `now + duration`, stopping at the last representable instant.
pub(crate) fn saturating_add(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    now.checked_add_signed(duration)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
