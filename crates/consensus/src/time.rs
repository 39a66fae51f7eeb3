//! Wall-clock helpers: epoch inference and tick time validation

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use lrv_wire::TickTime;
use parking_lot::RwLock;

/// Days from the proleptic origin of the date formula to the first epoch
const EPOCH_ORIGIN_DAYS: i64 = 738_570;

/// Source of the current UTC time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Epoch the network should be in at `now`.
///
/// Epochs are week long and roll over on Wednesdays at 12:00 UTC.
pub fn infer_epoch(now: DateTime<Utc>) -> u16 {
    let month = (i64::from(now.month()) + 9) % 12;
    let year = i64::from(now.year()) - month / 10;
    let days = year * 365 + year / 4 - year / 100 + year / 400 + (month * 306 + 5) / 10
        + i64::from(now.day())
        - 1
        - EPOCH_ORIGIN_DAYS;
    if days < 0 {
        return 0;
    }
    let epoch = days / 7 + if days % 7 == 0 && now.hour() < 12 { 0 } else { 1 };
    u16::try_from(epoch).unwrap_or(u16::MAX)
}

/// Whether the time fields form a real calendar instant
pub fn is_valid_tick_time(time: &TickTime) -> bool {
    NaiveDate::from_ymd_opt(2000 + i32::from(time.year), u32::from(time.month), u32::from(time.day))
        .is_some()
        && time.hour <= 23
        && time.minute <= 59
        && time.second <= 59
        && time.millisecond <= 999
}

/// `MM-DD-YYThh:mm:ss.mmm` rendering used in tick events
pub fn format_tick_time(time: &TickTime) -> String {
    format!(
        "{:02}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
        time.month, time.day, time.year, time.hour, time.minute, time.second, time.millisecond
    )
}
