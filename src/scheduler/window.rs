// file: src/scheduler/window.rs
// description: time-of-day release window with midnight wrap-around
// reference: https://docs.rs/chrono

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Local, NaiveTime, Timelike, Utc};
use std::fmt;

/// Inclusive `[start, end]` window at minute granularity. `end < start`
/// means the window spans midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: u32,
    end: u32,
}

impl TimeWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: parse_minutes(start)?,
            end: parse_minutes(end)?,
        })
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let minutes = time.hour() * 60 + time.minute();
        if self.crosses_midnight() {
            minutes >= self.start || minutes <= self.end
        } else {
            minutes >= self.start && minutes <= self.end
        }
    }

    /// Checks `now` against the window in the local timezone.
    pub fn contains_at(&self, now: DateTime<Utc>) -> bool {
        self.contains(now.with_timezone(&Local).time())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

fn parse_minutes(value: &str) -> Result<u32> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| PipelineError::InvalidTimeOfDay(value.to_string()))?;
    Ok(time.hour() * 60 + time.minute())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_window_crossing_midnight() {
        let window = TimeWindow::parse("22:00", "02:00").unwrap();
        assert!(window.crosses_midnight());
        assert!(window.contains(t(23, 30)));
        assert!(window.contains(t(1, 0)));
        assert!(!window.contains(t(3, 0)));
        assert!(!window.contains(t(12, 0)));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let window = TimeWindow::parse("08:00", "22:00").unwrap();
        assert!(window.contains(t(8, 0)));
        assert!(window.contains(NaiveTime::from_hms_opt(22, 0, 59).unwrap()));
        assert!(!window.contains(t(22, 1)));
        assert!(!window.contains(t(7, 59)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            TimeWindow::parse("25:99", "02:00"),
            Err(PipelineError::InvalidTimeOfDay(_))
        ));
        assert!(TimeWindow::parse("08:00", "noon").is_err());
        assert_eq!(
            TimeWindow::parse(" 9:05", "21:30").unwrap().to_string(),
            "09:05-21:30"
        );
    }
}
