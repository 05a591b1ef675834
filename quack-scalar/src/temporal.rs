//! Date and time values in the engine's storage representation.
//!
//! The engine's ranges are wider than what most calendar libraries accept (dates extend to several
//! million years and both dates and timestamps have infinity sentinels), so formatting works on the
//! raw counts directly and conversion to [`jiff`] types is fallible.

use std::fmt::{Display, Formatter};

use quack_error::{QuackResult, quack_bail, quack_err};

/// Microseconds in one second.
pub const MICROS_PER_SECOND: i64 = 1_000_000;
/// Microseconds in one day.
pub const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;
/// Nanoseconds in one day.
pub const NANOS_PER_DAY: i64 = 86_400 * 1_000_000_000;

// Days from 0000-03-01 to 1970-01-01 in the proleptic Gregorian calendar.
const EPOCH_SHIFT: i64 = 719_468;
const DAYS_PER_ERA: i64 = 146_097;

/// Days since the epoch for a proleptic Gregorian date. `year` is astronomical (0 is 1 BC).
pub fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let (month, day) = (i64::from(month), i64::from(day));
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let day_of_year = (153 * ((month + 9) % 12) + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * DAYS_PER_ERA + day_of_era - EPOCH_SHIFT
}

/// The proleptic Gregorian `(year, month, day)` of a day count since the epoch.
#[allow(clippy::cast_possible_truncation)]
pub fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let shifted = days + EPOCH_SHIFT;
    let era = shifted.div_euclid(DAYS_PER_ERA);
    let day_of_era = shifted - era * DAYS_PER_ERA;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    // month is in 1..=12 and day in 1..=31
    (year, month as u8, day as u8)
}

fn write_civil(f: &mut Formatter<'_>, days: i64) -> std::fmt::Result {
    let (year, month, day) = civil_from_days(days);
    if year > 0 {
        write!(f, "{year:04}-{month:02}-{day:02}")
    } else {
        write!(f, "{:04}-{month:02}-{day:02} (BC)", 1 - year)
    }
}

fn write_time_of_day(f: &mut Formatter<'_>, micros: u64) -> std::fmt::Result {
    let fraction = micros % 1_000_000;
    let seconds = micros / 1_000_000;
    write!(
        f,
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )?;
    write_fraction(f, fraction, 6)
}

fn write_fraction(f: &mut Formatter<'_>, fraction: u64, digits: usize) -> std::fmt::Result {
    if fraction == 0 {
        return Ok(());
    }
    let padded = format!("{fraction:0>digits$}");
    write!(f, ".{}", padded.trim_end_matches('0'))
}

/// `DATE`: days since 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Date {
    days: i32,
}

impl Date {
    /// The `infinity` date.
    pub const POSITIVE_INFINITY: Date = Date { days: i32::MAX };
    /// The `-infinity` date.
    pub const NEGATIVE_INFINITY: Date = Date { days: -i32::MAX };

    /// Wrap a raw day count.
    pub const fn from_days(days: i32) -> Self {
        Self { days }
    }

    /// Build from a calendar date. `year` is astronomical (0 is 1 BC).
    pub fn from_ymd(year: i32, month: u8, day: u8) -> QuackResult<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            quack_bail!("invalid date {}-{}-{}", year, month, day);
        }
        let days = days_from_civil(i64::from(year), month, day);
        let days = i32::try_from(days)?;
        // reject e.g. February 30th, which the arithmetic silently rolls over
        if civil_from_days(i64::from(days)) != (i64::from(year), month, day) {
            quack_bail!("invalid date {}-{}-{}", year, month, day);
        }
        Ok(Self { days })
    }

    /// Raw day count.
    pub fn days(&self) -> i32 {
        self.days
    }

    /// Whether the date is neither of the infinity sentinels.
    pub fn is_finite(&self) -> bool {
        self.days.abs() != i32::MAX
    }

    /// Astronomical `(year, month, day)`.
    pub fn to_ymd(&self) -> (i64, u8, u8) {
        civil_from_days(i64::from(self.days))
    }

    /// Convert to a [`jiff::civil::Date`], which only covers years -9999 to 9999.
    pub fn to_jiff(&self) -> QuackResult<jiff::civil::Date> {
        let (year, month, day) = self.to_ymd();
        let year = i16::try_from(year)?;
        jiff::civil::Date::new(year, i8::try_from(month)?, i8::try_from(day)?)
            .map_err(|e| quack_err!(InvalidArgument: "{} is out of range: {}", self, e))
    }

    /// Convert from a [`jiff::civil::Date`].
    pub fn from_jiff(date: jiff::civil::Date) -> QuackResult<Self> {
        Self::from_ymd(
            i32::from(date.year()),
            u8::try_from(date.month())?,
            u8::try_from(date.day())?,
        )
    }
}

impl Display for Date {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Date::POSITIVE_INFINITY => f.write_str("infinity"),
            Date::NEGATIVE_INFINITY => f.write_str("-infinity"),
            _ => write_civil(f, i64::from(self.days)),
        }
    }
}

/// `TIME`: microseconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Time {
    micros: i64,
}

impl Time {
    /// Wrap a raw microsecond count.
    pub const fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Build from hours, minutes, seconds and microseconds.
    pub fn from_hms_micro(hour: u8, minute: u8, second: u8, micros: u32) -> QuackResult<Self> {
        if hour > 24 || minute > 59 || second > 59 || micros > 999_999 {
            quack_bail!(
                "invalid time {}:{}:{}.{}",
                hour,
                minute,
                second,
                micros
            );
        }
        let total = ((i64::from(hour) * 60 + i64::from(minute)) * 60 + i64::from(second))
            * MICROS_PER_SECOND
            + i64::from(micros);
        if total > MICROS_PER_DAY {
            quack_bail!("time {} is past the end of the day", total);
        }
        Ok(Self { micros: total })
    }

    /// Raw microsecond count.
    pub fn micros(&self) -> i64 {
        self.micros
    }

    /// Convert to a [`jiff::civil::Time`]. `24:00:00` has no counterpart there.
    pub fn to_jiff(&self) -> QuackResult<jiff::civil::Time> {
        let nanos = self
            .micros
            .checked_mul(1000)
            .ok_or_else(|| quack_err!("time {} overflows", self.micros))?;
        jiff::civil::Time::midnight()
            .checked_add(jiff::SignedDuration::from_nanos(nanos))
            .map_err(|e| quack_err!(InvalidArgument: "{} is out of range: {}", self, e))
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let micros = if self.micros < 0 {
            self.micros.rem_euclid(MICROS_PER_DAY)
        } else {
            self.micros
        };
        write_time_of_day(f, micros.unsigned_abs())
    }
}

/// `TIME WITH TIME ZONE`: a time of day plus a UTC offset in seconds.
///
/// Stored as 64 bits: the upper 40 hold the microseconds, the lower 24 the offset, inverted and
/// shifted so that values sort by instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeTz {
    micros: u64,
    offset: i32,
}

impl TimeTz {
    /// Largest absolute offset, 15:59:59.
    pub const MAX_OFFSET: i32 = 16 * 60 * 60 - 1;
    const OFFSET_BITS: u32 = 24;
    const TIME_MASK: u64 = (1 << 40) - 1;
    const OFFSET_MASK: u64 = (1 << Self::OFFSET_BITS) - 1;

    /// Build from microseconds since midnight and an offset in seconds east of UTC.
    pub fn try_new(micros: u64, offset: i32) -> QuackResult<Self> {
        if micros > MICROS_PER_DAY.unsigned_abs() {
            quack_bail!("time {} is past the end of the day", micros);
        }
        if offset.abs() > Self::MAX_OFFSET {
            quack_bail!("offset {} exceeds {} seconds", offset, Self::MAX_OFFSET);
        }
        Ok(Self { micros, offset })
    }

    /// Decode the storage representation.
    pub fn from_bits(bits: u64) -> Self {
        let micros = (bits >> Self::OFFSET_BITS) & Self::TIME_MASK;
        let encoded = i64::try_from(bits & Self::OFFSET_MASK).unwrap_or_default();
        // encoded is below 2^24 so the difference always fits
        let offset = i32::try_from(i64::from(Self::MAX_OFFSET) - encoded).unwrap_or_default();
        Self { micros, offset }
    }

    /// Encode to the storage representation.
    pub fn to_bits(&self) -> u64 {
        let encoded = u64::try_from(i64::from(Self::MAX_OFFSET) - i64::from(self.offset))
            .unwrap_or_default();
        ((self.micros & Self::TIME_MASK) << Self::OFFSET_BITS) | (encoded & Self::OFFSET_MASK)
    }

    /// Microseconds since midnight.
    pub fn micros(&self) -> u64 {
        self.micros
    }

    /// Offset in seconds east of UTC.
    pub fn offset(&self) -> i32 {
        self.offset
    }
}

impl Display for TimeTz {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_time_of_day(f, self.micros)?;
        let sign = if self.offset < 0 { '-' } else { '+' };
        let abs = self.offset.unsigned_abs();
        write!(f, "{sign}{:02}", abs / 3600)?;
        let (minutes, seconds) = ((abs / 60) % 60, abs % 60);
        if minutes != 0 || seconds != 0 {
            write!(f, ":{minutes:02}")?;
        }
        if seconds != 0 {
            write!(f, ":{seconds:02}")?;
        }
        Ok(())
    }
}

/// Granularity of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// `TIMESTAMP_S`
    Seconds,
    /// `TIMESTAMP_MS`
    Milliseconds,
    /// `TIMESTAMP` and `TIMESTAMP WITH TIME ZONE`
    Microseconds,
    /// `TIMESTAMP_NS`
    Nanoseconds,
}

impl TimeUnit {
    fn per_day(self) -> i64 {
        match self {
            TimeUnit::Seconds => 86_400,
            TimeUnit::Milliseconds => 86_400_000,
            TimeUnit::Microseconds => MICROS_PER_DAY,
            TimeUnit::Nanoseconds => NANOS_PER_DAY,
        }
    }

    fn fraction_digits(self) -> usize {
        match self {
            TimeUnit::Seconds => 0,
            TimeUnit::Milliseconds => 3,
            TimeUnit::Microseconds => 6,
            TimeUnit::Nanoseconds => 9,
        }
    }
}

/// A timestamp counted in `unit`s since 1970-01-01 00:00:00 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    value: i64,
    unit: TimeUnit,
}

impl Timestamp {
    /// Sentinel for `infinity`, only meaningful at microsecond granularity.
    pub const POSITIVE_INFINITY: i64 = i64::MAX;
    /// Sentinel for `-infinity`, only meaningful at microsecond granularity.
    pub const NEGATIVE_INFINITY: i64 = -i64::MAX;

    /// Wrap a raw count.
    pub const fn new(value: i64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    /// Microsecond timestamp, the unit of `TIMESTAMP`.
    pub const fn from_micros(value: i64) -> Self {
        Self::new(value, TimeUnit::Microseconds)
    }

    /// Raw count.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Granularity.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Whether this is one of the infinity sentinels.
    pub fn is_infinite(&self) -> bool {
        self.unit == TimeUnit::Microseconds
            && (self.value == Self::POSITIVE_INFINITY || self.value == Self::NEGATIVE_INFINITY)
    }

    /// Convert to a [`jiff::Timestamp`].
    pub fn to_jiff(&self) -> QuackResult<jiff::Timestamp> {
        if self.is_infinite() {
            quack_bail!("infinite timestamps have no jiff representation");
        }
        let ts = match self.unit {
            TimeUnit::Seconds => jiff::Timestamp::from_second(self.value),
            TimeUnit::Milliseconds => jiff::Timestamp::from_millisecond(self.value),
            TimeUnit::Microseconds => jiff::Timestamp::from_microsecond(self.value),
            TimeUnit::Nanoseconds => jiff::Timestamp::from_nanosecond(i128::from(self.value)),
        };
        ts.map_err(|e| quack_err!(InvalidArgument: "timestamp {} is out of range: {}", self.value, e))
    }

    /// Convert from a [`jiff::Timestamp`] at the given granularity, truncating finer digits.
    pub fn from_jiff(ts: jiff::Timestamp, unit: TimeUnit) -> QuackResult<Self> {
        let value = match unit {
            TimeUnit::Seconds => ts.as_second(),
            TimeUnit::Milliseconds => ts.as_millisecond(),
            TimeUnit::Microseconds => ts.as_microsecond(),
            TimeUnit::Nanoseconds => i64::try_from(ts.as_nanosecond())?,
        };
        Ok(Self::new(value, unit))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_infinite() {
            return f.write_str(if self.value > 0 {
                "infinity"
            } else {
                "-infinity"
            });
        }
        let per_day = self.unit.per_day();
        let days = self.value.div_euclid(per_day);
        let in_day = self.value.rem_euclid(per_day).unsigned_abs();
        write_civil(f, days)?;
        let digits = self.unit.fraction_digits();
        let per_second = 10u64.pow(u32::try_from(digits).unwrap_or_default());
        let seconds = in_day / per_second;
        write!(
            f,
            " {:02}:{:02}:{:02}",
            seconds / 3600,
            (seconds / 60) % 60,
            seconds % 60
        )?;
        write_fraction(f, in_day % per_second, digits)
    }
}

/// `INTERVAL`: months, days and microseconds, each kept separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interval {
    /// Whole months.
    pub months: i32,
    /// Whole days.
    pub days: i32,
    /// Microseconds.
    pub micros: i64,
}

impl Interval {
    /// Create an interval.
    pub const fn new(months: i32, days: i32, micros: i64) -> Self {
        Self {
            months,
            days,
            micros,
        }
    }
}

fn plural(f: &mut Formatter<'_>, first: &mut bool, value: i64, unit: &str) -> std::fmt::Result {
    if !*first {
        f.write_str(" ")?;
    }
    *first = false;
    let suffix = if value.abs() != 1 { "s" } else { "" };
    write!(f, "{value} {unit}{suffix}")
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        let years = self.months / 12;
        let months = self.months % 12;
        if years != 0 {
            plural(f, &mut first, i64::from(years), "year")?;
        }
        if months != 0 {
            plural(f, &mut first, i64::from(months), "month")?;
        }
        if self.days != 0 {
            plural(f, &mut first, i64::from(self.days), "day")?;
        }
        if self.micros != 0 {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if self.micros < 0 {
                f.write_str("-")?;
            }
            write_time_of_day(f, self.micros.unsigned_abs())?;
        }
        if first {
            f.write_str("00:00:00")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, "1970-01-01")]
    #[case(19_000, "2022-01-08")]
    #[case(-1, "1969-12-31")]
    #[case(-719_163, "0001-12-31 (BC)")]
    #[case(-719_528, "0001-01-01 (BC)")]
    #[case(-719_162, "0001-01-01")]
    #[case(i32::MAX, "infinity")]
    #[case(-i32::MAX, "-infinity")]
    fn date_display(#[case] days: i32, #[case] expected: &str) {
        assert_eq!(Date::from_days(days).to_string(), expected);
    }

    #[test]
    fn civil_round_trip() {
        for days in [-1_000_000i64, -719_468, -1, 0, 1, 59, 60, 365, 11_016, 2_932_896] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
        assert!(Date::from_ymd(2023, 2, 29).is_err());
        assert_eq!(Date::from_ymd(2024, 2, 29).unwrap().to_string(), "2024-02-29");
    }

    #[test]
    fn date_jiff() {
        let date = Date::from_ymd(2000, 3, 1).unwrap();
        let jiff = date.to_jiff().unwrap();
        assert_eq!(jiff, jiff::civil::date(2000, 3, 1));
        assert_eq!(Date::from_jiff(jiff).unwrap(), date);
        assert!(Date::POSITIVE_INFINITY.to_jiff().is_err());
    }

    #[rstest]
    #[case(0, "00:00:00")]
    #[case(45_296_000_000, "12:34:56")]
    #[case(45_296_789_000, "12:34:56.789")]
    #[case(45_296_000_001, "12:34:56.000001")]
    #[case(MICROS_PER_DAY, "24:00:00")]
    fn time_display(#[case] micros: i64, #[case] expected: &str) {
        assert_eq!(Time::from_micros(micros).to_string(), expected);
    }

    #[test]
    fn time_tz_bits() {
        let value = TimeTz::try_new(45_296_000_000, 5 * 3600 + 30 * 60).unwrap();
        let decoded = TimeTz::from_bits(value.to_bits());
        assert_eq!(decoded, value);
        assert_eq!(decoded.to_string(), "12:34:56+05:30");

        // offset +15:59:59 encodes to zero
        let max = TimeTz::try_new(0, TimeTz::MAX_OFFSET).unwrap();
        assert_eq!(max.to_bits(), 0);
        let min = TimeTz::try_new(0, -TimeTz::MAX_OFFSET).unwrap();
        assert_eq!(min.to_bits(), 115_198);
        assert_eq!(TimeTz::from_bits(115_198).offset(), -TimeTz::MAX_OFFSET);
        assert_eq!(TimeTz::try_new(1, -3600).unwrap().to_string(), "00:00:00.000001-01");

        assert!(TimeTz::try_new(0, TimeTz::MAX_OFFSET + 1).is_err());
    }

    #[rstest]
    #[case(Timestamp::from_micros(0), "1970-01-01 00:00:00")]
    #[case(Timestamp::from_micros(-1), "1969-12-31 23:59:59.999999")]
    #[case(Timestamp::new(1_700_000_000, TimeUnit::Seconds), "2023-11-14 22:13:20")]
    #[case(Timestamp::new(1_700_000_000_123, TimeUnit::Milliseconds), "2023-11-14 22:13:20.123")]
    #[case(Timestamp::new(1_700_000_000_000_000_001, TimeUnit::Nanoseconds), "2023-11-14 22:13:20.000000001")]
    #[case(Timestamp::from_micros(i64::MAX), "infinity")]
    #[case(Timestamp::from_micros(-i64::MAX), "-infinity")]
    fn timestamp_display(#[case] ts: Timestamp, #[case] expected: &str) {
        assert_eq!(ts.to_string(), expected);
    }

    #[test]
    fn timestamp_jiff() {
        let ts = Timestamp::from_micros(1_700_000_000_123_456);
        let jiff = ts.to_jiff().unwrap();
        assert_eq!(jiff.as_microsecond(), 1_700_000_000_123_456);
        let seconds = Timestamp::from_jiff(jiff, TimeUnit::Seconds).unwrap();
        assert_eq!(seconds.value(), 1_700_000_000);
    }

    #[rstest]
    #[case(Interval::new(0, 0, 0), "00:00:00")]
    #[case(Interval::new(14, 3, 0), "1 year 2 months 3 days")]
    #[case(Interval::new(1, 1, 3_600_000_000), "1 month 1 day 01:00:00")]
    #[case(Interval::new(-24, 0, -1_500_000), "-2 years -00:00:01.5")]
    fn interval_display(#[case] interval: Interval, #[case] expected: &str) {
        assert_eq!(interval.to_string(), expected);
    }
}
