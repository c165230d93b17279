//! Schedule engine: cadence alignment and window layout.

use crate::cadence::parse_duration;
use chrono::Duration;
use epochgate_core::{ConfigError, ScheduleSettings, Time};
use serde::{Deserialize, Serialize};

/// Immutable competition schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    start: Time,
    end: Time,
    cadence: Duration,
    train_span: Duration,
    validation_span: Duration,
    test_span: Duration,
}

impl ScheduleConfig {
    /// Create a validated schedule.
    pub fn new(
        start: Time,
        end: Time,
        cadence: Duration,
        train_span: Duration,
        validation_span: Duration,
        test_span: Duration,
    ) -> Result<Self, ConfigError> {
        if cadence <= Duration::zero() {
            return Err(ConfigError::NonPositiveCadence);
        }
        if end <= start {
            return Err(ConfigError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        for span in [train_span, validation_span, test_span] {
            if span < Duration::zero() {
                return Err(ConfigError::Invalid("window spans must not be negative".to_string()));
            }
        }
        let total_span = train_span
            .checked_add(&validation_span)
            .and_then(|d| d.checked_add(&test_span))
            .ok_or_else(|| ConfigError::Invalid("window spans are out of range".to_string()))?;
        if total_span <= Duration::zero() {
            return Err(ConfigError::EmptySpan);
        }
        // Window layout walks back from start at most the total span, and the
        // next boundary is at most one cadence past end.
        if start.checked_sub_signed(total_span).is_none() {
            return Err(ConfigError::Invalid("window spans reach before the representable time range".to_string()));
        }
        if end.checked_add_signed(cadence).is_none() {
            return Err(ConfigError::Invalid("cadence reaches past the representable time range".to_string()));
        }
        Ok(Self {
            start,
            end,
            cadence,
            train_span,
            validation_span,
            test_span,
        })
    }

    /// Build from the configuration file section.
    pub fn from_settings(settings: &ScheduleSettings) -> Result<Self, ConfigError> {
        let cadence = parse_duration(&settings.cadence)?;
        let config = Self::new(
            settings.start,
            settings.end,
            cadence,
            hours(settings.train_span_hours)?,
            hours(settings.validation_span_hours)?,
            hours(settings.test_span_hours)?,
        )?;
        tracing::debug!(
            "Schedule configured: {} to {} every {}s",
            config.start,
            config.end,
            config.cadence.num_seconds()
        );
        Ok(config)
    }

    /// First instant of the schedule.
    pub fn start(&self) -> Time {
        self.start
    }

    /// Last instant of the schedule.
    pub fn end(&self) -> Time {
        self.end
    }

    /// Alignment cadence.
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Whether `now` falls inside `[start, end]`.
    pub fn contains(&self, now: Time) -> bool {
        now >= self.start && now <= self.end
    }

    /// Snap `now` to the latest cadence boundary at or before it, clamped to
    /// `[start, end]`. Boundaries are `start + k * cadence`.
    pub fn align(&self, now: Time) -> Time {
        if now <= self.start {
            return self.start;
        }
        if now >= self.end {
            return self.end;
        }
        let elapsed = (now - self.start).num_milliseconds();
        let step = self.cadence.num_milliseconds().max(1);
        let aligned = self.start + Duration::milliseconds((elapsed / step) * step);
        aligned.min(self.end)
    }

    /// First cadence boundary strictly after `now`, or `None` once past `end`.
    pub fn next_boundary(&self, now: Time) -> Option<Time> {
        if now < self.start {
            return Some(self.start);
        }
        let next = self.align(now) + self.cadence;
        (next <= self.end).then_some(next)
    }

    /// Lay out the windows for `now`.
    ///
    /// The test window always ends at the aligned instant, so nothing looks
    /// past "now". Each window takes its configured span walking backwards;
    /// near the schedule start the shortfall is taken from the train window
    /// first, then validation, then test. No boundary precedes `start`.
    pub fn windows(&self, now: Time) -> WindowSet {
        let latest = self.align(now).min(self.end);
        let clamp = |t: Time| t.max(self.start);

        let test_end = latest;
        let test_start = clamp(test_end - self.test_span);
        let validation_end = test_start;
        let validation_start = clamp(validation_end - self.validation_span);
        let train_end = validation_start;
        let train_start = clamp(train_end - self.train_span);

        WindowSet {
            train_start,
            train_end,
            validation_start,
            validation_end,
            test_start,
            test_end,
            inference_time: test_end,
        }
    }
}

fn hours(h: u64) -> Result<Duration, ConfigError> {
    i64::try_from(h)
        .ok()
        .and_then(Duration::try_hours)
        .ok_or_else(|| ConfigError::Invalid(format!("span of {} hours is out of range", h)))
}

/// Aligned window boundaries for one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSet {
    /// Train window start
    pub train_start: Time,
    /// Train window end
    pub train_end: Time,
    /// Validation window start
    pub validation_start: Time,
    /// Validation window end
    pub validation_end: Time,
    /// Test window start
    pub test_start: Time,
    /// Test window end
    pub test_end: Time,
    /// Instant the prediction is made for
    pub inference_time: Time,
}

/// Free-function form of [`ScheduleConfig::align`].
pub fn align(config: &ScheduleConfig, now: Time) -> Time {
    config.align(now)
}

/// Free-function form of [`ScheduleConfig::windows`].
pub fn windows(config: &ScheduleConfig, now: Time) -> WindowSet {
    config.windows(now)
}
