//! ISO-8601 UTC timestamps with a cached calendar date.
//!
//! Working out year, month and day is the expensive part of formatting a
//! timestamp, and it stays the same for a whole day. The date text is
//! therefore computed once per UTC day (via `chrono`) and shared by all
//! threads as an immutable snapshot. The time of day is plain arithmetic on
//! the milliseconds left over, since a UTC day always has exactly
//! 86 400 000 of them.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

const MILLIS_PER_SECOND: i64 = 1000;
const MILLIS_PER_MINUTE: i64 = MILLIS_PER_SECOND * 60;
const MILLIS_PER_HOUR: i64 = MILLIS_PER_MINUTE * 60;
const MILLIS_PER_DAY: i64 = MILLIS_PER_HOUR * 24;

/// Number of characters written for timestamps in years 0000 through 9999.
pub const TIMESTAMP_LEN: usize = 24;

static TIMESTAMPS: LazyLock<TimestampSerializer> = LazyLock::new(TimestampSerializer::new);

/// Appends `epoch_millis` as `YYYY-MM-DDTHH:mm:ss.sssZ` using the
/// process-wide date cache.
#[inline]
pub fn serialize_timestamp(buf: &mut String, epoch_millis: i64) {
    TIMESTAMPS.serialize(buf, epoch_millis);
}

/// One UTC calendar day and its formatted date.
#[derive(Debug)]
struct CachedDate {
    date: String,
    /// Days since 1970-01-01, floored so instants before 1970 land on the
    /// right day.
    day: i64,
}

impl CachedDate {
    fn new(epoch_millis: i64) -> Self {
        let day = epoch_millis.div_euclid(MILLIS_PER_DAY);
        let date = match day
            .checked_mul(MILLIS_PER_DAY)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
        {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => civil_date(day),
        };

        CachedDate { date, day }
    }

    #[inline]
    fn covers(&self, epoch_millis: i64) -> bool {
        epoch_millis.div_euclid(MILLIS_PER_DAY) == self.day
    }
}

/// Timestamp formatter holding the cached date snapshot.
///
/// The snapshot is replaced wholesale on a miss and never mutated. Two
/// threads racing on a day change may both recompute the date, which costs
/// a little time but never produces wrong output.
pub struct TimestampSerializer {
    cached: ArcSwap<CachedDate>,
}

impl TimestampSerializer {
    pub fn new() -> Self {
        TimestampSerializer {
            cached: ArcSwap::from_pointee(CachedDate::new(Utc::now().timestamp_millis())),
        }
    }

    /// Appends the ISO-8601 form of `epoch_millis` to `buf`.
    pub fn serialize(&self, buf: &mut String, epoch_millis: i64) {
        let cached = self.cached.load();
        if cached.covers(epoch_millis) {
            buf.push_str(&cached.date);
        } else {
            let fresh = Arc::new(CachedDate::new(epoch_millis));
            buf.push_str(&fresh.date);
            self.cached.store(fresh);
        }

        buf.push('T');

        let mut remainder = epoch_millis.rem_euclid(MILLIS_PER_DAY);
        push_padded(buf, remainder / MILLIS_PER_HOUR, 2);
        buf.push(':');

        remainder %= MILLIS_PER_HOUR;
        push_padded(buf, remainder / MILLIS_PER_MINUTE, 2);
        buf.push(':');

        remainder %= MILLIS_PER_MINUTE;
        push_padded(buf, remainder / MILLIS_PER_SECOND, 2);
        buf.push('.');

        remainder %= MILLIS_PER_SECOND;
        push_padded(buf, remainder, 3);

        buf.push('Z');
    }
}

impl Default for TimestampSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends a non-negative `value` left-padded with zeros to `width` digits.
#[inline]
fn push_padded(buf: &mut String, value: i64, width: u32) {
    let mut bound = 10i64.pow(width - 1);
    while bound > 1 && value < bound {
        buf.push('0');
        bound /= 10;
    }
    if value == 0 {
        // The loop above stops one digit short for zero.
        buf.push('0');
    } else {
        buf.push_str(itoa::Buffer::new().format(value));
    }
}

/// Date text for days `chrono` cannot represent, using the
/// proleptic Gregorian calendar with an expanded, signed year.
fn civil_date(days_since_epoch: i64) -> String {
    let z = days_since_epoch as i128 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    format!("{year:+05}-{month:02}-{day:02}")
}
