//! Wall-clock abstraction and schedule time-zone resolution.
//!
//! Schedules are always stored as absolute UTC instants. A [`ScheduleTimezone`]
//! decides how a wall-clock time typed by a user maps onto that instant.

use chrono::{DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The host's real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// How user-entered schedule times are interpreted.
///
/// Parsed from `"utc"`, `"local"`, or a `±HH:MM` offset such as `"+05:30"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScheduleTimezone {
    #[default]
    Utc,
    /// The zone of the machine running the simulator.
    Local,
    /// A fixed offset east of UTC, in seconds.
    Fixed(i32),
}

impl ScheduleTimezone {
    /// Maps a wall-clock time to a UTC instant. Returns `None` when the time
    /// does not exist in the zone (a DST gap). Ambiguous times resolve to the
    /// earlier instant.
    pub fn resolve(&self, wall_clock: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            ScheduleTimezone::Utc => Some(Utc.from_utc_datetime(&wall_clock)),
            ScheduleTimezone::Local => pick(Local.from_local_datetime(&wall_clock)),
            ScheduleTimezone::Fixed(secs) => {
                let offset = FixedOffset::east_opt(*secs)?;
                pick(offset.from_local_datetime(&wall_clock))
            }
        }
    }
}

fn pick<Tz: TimeZone>(result: LocalResult<DateTime<Tz>>) -> Option<DateTime<Utc>> {
    match result {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

impl TryFrom<String> for ScheduleTimezone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "utc" | "z" => return Ok(ScheduleTimezone::Utc),
            "local" => return Ok(ScheduleTimezone::Local),
            _ => {}
        }

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(format!("unrecognised schedule timezone '{}'", value)),
        };
        let (hours, minutes) = rest
            .split_once(':')
            .ok_or_else(|| format!("offset '{}' must look like +HH:MM", value))?;
        let hours: i32 = hours
            .parse()
            .map_err(|_| format!("bad hour in offset '{}'", value))?;
        let minutes: i32 = minutes
            .parse()
            .map_err(|_| format!("bad minute in offset '{}'", value))?;
        if hours > 23 || minutes > 59 {
            return Err(format!("offset '{}' out of range", value));
        }
        Ok(ScheduleTimezone::Fixed(sign * (hours * 3600 + minutes * 60)))
    }
}

impl From<ScheduleTimezone> for String {
    fn from(tz: ScheduleTimezone) -> Self {
        match tz {
            ScheduleTimezone::Utc => "utc".to_string(),
            ScheduleTimezone::Local => "local".to_string(),
            ScheduleTimezone::Fixed(secs) => {
                let sign = if secs < 0 { '-' } else { '+' };
                let abs = secs.abs();
                format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
            }
        }
    }
}
