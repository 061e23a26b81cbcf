use chrono::{DateTime, NaiveTime, TimeDelta, Utc};

/// Lines stamped with the same synthetic second.
pub const LINES_PER_SECOND: u32 = 10;

/// Compressed clock for unthrottled bulk generation.
///
/// Starts at midnight UTC of the current day and advances by one second every
/// [`LINES_PER_SECOND`] lines, independent of wall time.
#[derive(Debug, Clone)]
pub struct SyntheticClock {
    current: DateTime<Utc>,
    lines: u32,
}

impl SyntheticClock {
    pub fn starting_today() -> Self {
        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        Self::starting_at(midnight)
    }

    pub const fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            current: start,
            lines: 0,
        }
    }

    /// Returns the timestamp of the next line.
    pub fn tick(&mut self) -> DateTime<Utc> {
        self.lines += 1;
        if self.lines > LINES_PER_SECOND {
            self.current += TimeDelta::seconds(1);
            self.lines = 1;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn starts_at_midnight() {
        let mut clock = SyntheticClock::starting_today();
        let first = clock.tick();
        assert_eq!(first.num_seconds_from_midnight(), 0);
        assert_eq!(first.date_naive(), Utc::now().date_naive());
    }

    #[test]
    fn advances_one_second_every_ten_lines() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut clock = SyntheticClock::starting_at(start);
        let stamps: Vec<_> = (0..25).map(|_| clock.tick()).collect();

        assert!(stamps[..10].iter().all(|t| *t == start));
        assert!(
            stamps[10..20]
                .iter()
                .all(|t| *t == start + TimeDelta::seconds(1))
        );
        assert_eq!(stamps[20], start + TimeDelta::seconds(2));
    }
}
