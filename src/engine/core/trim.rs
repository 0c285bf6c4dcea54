//! Trim window parsing and validation.
//!
//! Times are written as `[[HH:]MM:]SS[.mmm]`. Hours are capped at 99, minutes and
//! seconds at 59, and the fraction may carry one to three digits (`.5` is 500 ms).

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Slack allowed when deciding a trim covers the whole source
pub const FULL_RANGE_TOLERANCE_S: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrimError {
    #[error("empty time value")]
    Empty,
    #[error("expected 1 to 3 ':'-separated segments, got {0}")]
    SegmentCount(usize),
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("hours must be 0-99, got {0}")]
    Hours(u64),
    #[error("minutes must be 0-59, got {0}")]
    Minutes(u64),
    #[error("seconds must be 0-59, got {0}")]
    Seconds(u64),
    #[error("milliseconds must be 0-999, got '{0}'")]
    Milliseconds(String),
}

/// A position inside the source, millisecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TrimTime {
    millis: u64,
}

const MAX_MILLIS: u64 = ((99 * 60 + 59) * 60 + 59) * 1000 + 999;

impl TrimTime {
    pub const ZERO: TrimTime = TrimTime { millis: 0 };

    pub fn from_millis(millis: u64) -> Self {
        Self {
            millis: millis.min(MAX_MILLIS),
        }
    }

    /// Rounds to the nearest millisecond; negative and NaN inputs become zero
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self::from_millis((secs * 1000.0).round() as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.millis as f64 / 1000.0
    }
}

fn parse_number(text: &str) -> Result<u64, TrimError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TrimError::NotANumber(text.to_string()));
    }
    text.parse::<u64>()
        .map_err(|_| TrimError::NotANumber(text.to_string()))
}

impl FromStr for TrimTime {
    type Err = TrimError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(TrimError::Empty);
        }

        let parts: Vec<&str> = value.split(':').collect();
        let (hours, minutes, seconds_part) = match parts.as_slice() {
            [s] => (0, 0, *s),
            [m, s] => (0, parse_number(m)?, *s),
            [h, m, s] => (parse_number(h)?, parse_number(m)?, *s),
            _ => return Err(TrimError::SegmentCount(parts.len())),
        };

        if hours > 99 {
            return Err(TrimError::Hours(hours));
        }
        if minutes > 59 {
            return Err(TrimError::Minutes(minutes));
        }

        let (secs_text, frac_text) = match seconds_part.split_once('.') {
            Some((s, f)) => (s, Some(f)),
            None => (seconds_part, None),
        };

        let seconds = parse_number(secs_text)?;
        if seconds > 59 {
            return Err(TrimError::Seconds(seconds));
        }

        let millis = match frac_text {
            None => 0,
            Some(f) if f.is_empty() || f.len() > 3 || f.contains('.') => {
                return Err(TrimError::Milliseconds(f.to_string()));
            }
            Some(f) => {
                let raw = parse_number(f).map_err(|_| TrimError::Milliseconds(f.to_string()))?;
                // ".5" means half a second, not 5 ms
                raw * 10u64.pow(3 - f.len() as u32)
            }
        };

        Ok(Self {
            millis: ((hours * 60 + minutes) * 60 + seconds) * 1000 + millis,
        })
    }
}

impl fmt::Display for TrimTime {
    /// `HH:MM:SS`, with `.mmm` appended only when the fraction is non-zero
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.millis / 1000;
        let ms = self.millis % 1000;
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        write!(f, "{:02}:{:02}:{:02}", hours, minutes, seconds)?;
        if ms > 0 {
            write!(f, ".{:03}", ms)?;
        }
        Ok(())
    }
}

pub fn parse_trim_time(value: &str) -> Result<TrimTime, TrimError> {
    value.parse()
}

pub fn format_trim_time(time: TrimTime) -> String {
    time.to_string()
}

/// Why a trim window was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrimRangeError {
    #[error("invalid start time: {0}")]
    Start(TrimError),
    #[error("invalid end time: {0}")]
    End(TrimError),
    #[error("time exceeds duration")]
    ExceedsDuration,
    #[error("start must be before end")]
    StartNotBeforeEnd,
}

/// Check a trim window. A disabled trim is always valid.
///
/// `duration_s` is only used as an upper bound when it is known and positive.
pub fn check_trim(
    enabled: bool,
    start: &str,
    end: &str,
    duration_s: Option<f64>,
) -> Result<Option<(TrimTime, TrimTime)>, TrimRangeError> {
    if !enabled {
        return Ok(None);
    }

    let start = parse_trim_time(start).map_err(TrimRangeError::Start)?;
    let end = parse_trim_time(end).map_err(TrimRangeError::End)?;

    if let Some(duration) = duration_s.filter(|d| *d > 0.0) {
        let limit = TrimTime::from_secs_f64(duration);
        if start > limit || end > limit {
            return Err(TrimRangeError::ExceedsDuration);
        }
    }

    if start >= end {
        return Err(TrimRangeError::StartNotBeforeEnd);
    }

    Ok(Some((start, end)))
}

/// True when the window spans the whole source, within [`FULL_RANGE_TOLERANCE_S`]
pub fn is_full_range(start: TrimTime, end: TrimTime, duration_s: Option<f64>) -> bool {
    match duration_s {
        Some(duration) if duration > 0.0 => {
            start == TrimTime::ZERO && (end.as_secs_f64() - duration).abs() <= FULL_RANGE_TOLERANCE_S
        }
        _ => false,
    }
}
