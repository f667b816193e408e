//! Timestamp handling for ZIP entries.
//!
//! ZIP headers carry the last-modified time as a packed MS-DOS date/time
//! pair ([`DosDateTime`], 2-second resolution, years 1980-2107). Extra
//! fields can add precise times: the NTFS record stores Windows FILETIME
//! values ([`Timestamp`], 100 ns resolution) and the extended-timestamp
//! record stores Unix seconds.
//!
//! DOS values are interpreted as UTC; the format has no zone field.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Difference between the FILETIME epoch (1601-01-01) and the Unix epoch,
/// in 100-nanosecond intervals.
const FILETIME_UNIX_DIFF: u64 = 116444736000000000;

/// Number of 100-nanosecond intervals in one second.
const INTERVALS_PER_SECOND: u64 = 10_000_000;

/// A packed MS-DOS date and time as stored in ZIP headers.
///
/// ```rust
/// use zipspan::timestamp::DosDateTime;
///
/// let t = DosDateTime::new(2024, 2, 29, 13, 45, 58).unwrap();
/// assert_eq!(t.year(), 2024);
/// assert_eq!(t.second(), 58);
/// assert_eq!(DosDateTime::from_u32(t.to_u32()), t);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    /// Packed date: bits 9-15 year since 1980, 5-8 month, 0-4 day.
    pub date: u16,
    /// Packed time: bits 11-15 hour, 5-10 minute, 0-4 second / 2.
    pub time: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable value.
    pub const MIN: DosDateTime = DosDateTime {
        date: (1 << 5) | 1,
        time: 0,
    };

    /// Builds a value from calendar fields. Odd seconds round down.
    ///
    /// Returns `None` if any field is out of range.
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        if !(1980..=2107).contains(&year)
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        Some(Self {
            date: ((year - 1980) << 9) | ((month as u16) << 5) | day as u16,
            time: ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 / 2),
        })
    }

    /// Unpacks the `date << 16 | time` dword used by the PKWARE check byte.
    pub fn from_u32(value: u32) -> Self {
        Self {
            date: (value >> 16) as u16,
            time: value as u16,
        }
    }

    /// Packs into the `date << 16 | time` dword.
    pub fn to_u32(self) -> u32 {
        ((self.date as u32) << 16) | self.time as u32
    }

    /// Converts a system time, clamping to the representable range.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(_) => return Self::MIN,
        };
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        if year < 1980 {
            return Self::MIN;
        }
        if year > 2107 {
            return Self {
                date: (127 << 9) | (12 << 5) | 31,
                time: (23 << 11) | (59 << 5) | 29,
            };
        }
        Self::new(
            year as u16,
            month as u8,
            day as u8,
            (rem / 3600) as u8,
            ((rem % 3600) / 60) as u8,
            (rem % 60) as u8,
        )
        .unwrap_or(Self::MIN)
    }

    /// Returns the current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Converts back to a system time.
    pub fn to_system_time(self) -> SystemTime {
        let month = self.month().clamp(1, 12);
        let day = self.day().max(1);
        let days = days_from_civil(self.year() as i64, month as i64, day as i64);
        let secs = days * 86_400
            + self.hour() as i64 * 3600
            + self.minute() as i64 * 60
            + self.second() as i64;
        UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
    }

    /// Calendar year.
    pub fn year(self) -> u16 {
        1980 + (self.date >> 9)
    }

    /// Month, 1-12.
    pub fn month(self) -> u8 {
        ((self.date >> 5) & 0x0F) as u8
    }

    /// Day of month, 1-31.
    pub fn day(self) -> u8 {
        (self.date & 0x1F) as u8
    }

    /// Hour, 0-23.
    pub fn hour(self) -> u8 {
        (self.time >> 11) as u8
    }

    /// Minute, 0-59.
    pub fn minute(self) -> u8 {
        ((self.time >> 5) & 0x3F) as u8
    }

    /// Second, always even.
    pub fn second(self) -> u8 {
        ((self.time & 0x1F) * 2) as u8
    }
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::MIN
    }
}

impl From<SystemTime> for DosDateTime {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

// Howard Hinnant's days_from_civil / civil_from_days.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// A Windows FILETIME: 100-nanosecond intervals since 1601-01-01 UTC.
///
/// Used by the NTFS extra field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    filetime: u64,
}

impl Timestamp {
    /// Creates a timestamp from a raw FILETIME value.
    pub const fn from_filetime(filetime: u64) -> Self {
        Self { filetime }
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Returns `None` if the value falls before 1601.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        let intervals = (secs as i128) * INTERVALS_PER_SECOND as i128 + FILETIME_UNIX_DIFF as i128;
        u64::try_from(intervals).ok().map(Self::from_filetime)
    }

    /// Creates a timestamp from a system time.
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => {
                let intervals = d.as_secs() * INTERVALS_PER_SECOND + d.subsec_nanos() as u64 / 100;
                intervals.checked_add(FILETIME_UNIX_DIFF).map(Self::from_filetime)
            }
            Err(e) => {
                let d = e.duration();
                let intervals = d.as_secs() * INTERVALS_PER_SECOND + d.subsec_nanos() as u64 / 100;
                FILETIME_UNIX_DIFF.checked_sub(intervals).map(Self::from_filetime)
            }
        }
    }

    /// Returns the raw FILETIME value.
    pub const fn as_filetime(&self) -> u64 {
        self.filetime
    }

    /// Returns whole Unix seconds, rounding toward negative infinity.
    pub fn as_unix_secs(&self) -> i64 {
        let diff = self.filetime as i128 - FILETIME_UNIX_DIFF as i128;
        diff.div_euclid(INTERVALS_PER_SECOND as i128) as i64
    }

    /// Converts to a system time.
    pub fn as_system_time(&self) -> SystemTime {
        if self.filetime >= FILETIME_UNIX_DIFF {
            let d = self.filetime - FILETIME_UNIX_DIFF;
            UNIX_EPOCH
                + Duration::new(
                    d / INTERVALS_PER_SECOND,
                    ((d % INTERVALS_PER_SECOND) * 100) as u32,
                )
        } else {
            let d = FILETIME_UNIX_DIFF - self.filetime;
            UNIX_EPOCH
                - Duration::new(
                    d / INTERVALS_PER_SECOND,
                    ((d % INTERVALS_PER_SECOND) * 100) as u32,
                )
        }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        ts.as_system_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dos_packing() {
        let t = DosDateTime::new(1980, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(t, DosDateTime::MIN);
        assert_eq!(t.to_u32(), 0x0021_0000);

        let t = DosDateTime::new(2107, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(t.second(), 58);
        assert_eq!(t.year(), 2107);
    }

    #[test]
    fn test_dos_rejects_out_of_range() {
        assert!(DosDateTime::new(1979, 12, 31, 0, 0, 0).is_none());
        assert!(DosDateTime::new(2000, 13, 1, 0, 0, 0).is_none());
        assert!(DosDateTime::new(2000, 1, 1, 24, 0, 0).is_none());
    }

    #[test]
    fn test_dos_system_time_roundtrip() {
        // 2021-06-15 10:20:30 UTC
        let time = UNIX_EPOCH + Duration::from_secs(1_623_752_430);
        let dos = DosDateTime::from_system_time(time);
        assert_eq!(
            (dos.year(), dos.month(), dos.day()),
            (2021, 6, 15)
        );
        assert_eq!((dos.hour(), dos.minute(), dos.second()), (10, 20, 30));
        assert_eq!(dos.to_system_time(), time);
    }

    #[test]
    fn test_dos_clamps_before_1980() {
        assert_eq!(DosDateTime::from_system_time(UNIX_EPOCH), DosDateTime::MIN);
    }

    #[test]
    fn test_civil_roundtrip_leap_day() {
        let days = days_from_civil(2000, 2, 29);
        assert_eq!(civil_from_days(days), (2000, 2, 29));
        assert_eq!(days_from_civil(1970, 1, 1), 0);
    }

    #[test]
    fn test_filetime_unix_epoch() {
        let ts = Timestamp::from_unix_secs(0).unwrap();
        assert_eq!(ts.as_filetime(), FILETIME_UNIX_DIFF);
        assert_eq!(ts.as_unix_secs(), 0);
        assert_eq!(ts.as_system_time(), UNIX_EPOCH);
    }

    #[test]
    fn test_filetime_sub_second_precision() {
        let time = UNIX_EPOCH + Duration::new(1_000, 123_456_700);
        let ts = Timestamp::from_system_time(time).unwrap();
        assert_eq!(ts.as_system_time(), time);
    }
}
