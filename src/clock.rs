use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which part of the wall clock goes on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Microseconds within the current second. Wraps at second boundaries.
    #[default]
    Subsec,
    /// Microseconds since the Unix epoch.
    Epoch,
}

impl ClockMode {
    pub fn now(self) -> i64 {
        self.at(Utc::now())
    }

    pub fn at(self, instant: DateTime<Utc>) -> i64 {
        match self {
            ClockMode::Subsec => i64::from(instant.timestamp_subsec_micros()),
            ClockMode::Epoch => instant.timestamp_micros(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn subsec_drops_whole_seconds() {
        let instant = Utc.timestamp_opt(1_700_000_123, 456_789_000).unwrap();
        assert_eq!(ClockMode::Subsec.at(instant), 456_789);
        assert_eq!(ClockMode::Epoch.at(instant), 1_700_000_123_456_789);
    }

    #[test]
    fn subsec_stays_below_one_second() {
        let now = ClockMode::Subsec.now();
        assert!((0..1_000_000).contains(&now));
    }
}
