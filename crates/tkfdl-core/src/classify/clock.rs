//! Time source for the timestamped fallback filename.

use chrono::{DateTime, Local, TimeZone};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock frozen at one instant, for deterministic names in tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl FixedClock {
    /// Local wall-clock time `y-m-d h:mi:s`. Falls back to the epoch for
    /// ambiguous or invalid local times.
    pub fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
        let t = Local
            .with_ymd_and_hms(y, m, d, h, mi, s)
            .earliest()
            .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().unwrap_or_default());
        FixedClock(t)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// `download_YYYYMMDD_HHMMSS` in local time.
pub fn timestamp_file_name(clock: &dyn Clock) -> String {
    format!("download_{}", clock.now().format("%Y%m%d_%H%M%S"))
}

/// `IMG_YYYYMMDD_HHMMSS` in local time, for images without a usable name.
pub fn timestamp_image_name(clock: &dyn Clock) -> String {
    format!("IMG_{}", clock.now().format("%Y%m%d_%H%M%S"))
}
