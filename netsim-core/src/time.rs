//! Virtual time for the simulation kernel.
//!
//! [`Time`] is an opaque signed timestamp counted in femtoseconds and stored
//! as an `i128`, which covers every unit the kernel recognizes without
//! losing precision and without overflowing for any realistic run length
//! (the range is roughly 5·10^21 years).
//!
//! Nothing in this module knows about "now": the current simulated time is
//! owned by the scheduler and only ever advanced by its run loop.
//!
//! ## Units
//!
//! | Unit | Suffix | Femtoseconds |
//! |------|--------|--------------|
//! | [`TimeUnit::Days`] | `d` | 8.64·10^19 |
//! | [`TimeUnit::Hours`] | `h` | 3.6·10^18 |
//! | [`TimeUnit::Minutes`] | `min` | 6·10^16 |
//! | [`TimeUnit::Seconds`] | `s` | 10^15 |
//! | [`TimeUnit::Millis`] | `ms` | 10^12 |
//! | [`TimeUnit::Micros`] | `us` | 10^9 |
//! | [`TimeUnit::Nanos`] | `ns` | 10^6 |
//! | [`TimeUnit::Picos`] | `ps` | 10^3 |
//! | [`TimeUnit::Femtos`] | `fs` | 1 |
//!
//! Raw ticks are expressed relative to a run-wide [`Resolution`].

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing or converting a [`Time`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The input string was empty.
    #[error("empty time string")]
    Empty,

    /// The numeric part could not be parsed.
    #[error("invalid number in time string {input:?}")]
    InvalidNumber {
        /// The offending input.
        input: String,
    },

    /// No unit suffix was given.
    #[error("missing unit in time string {input:?} (expected d, h, min, s, ms, us, ns, ps or fs)")]
    MissingUnit {
        /// The offending input.
        input: String,
    },

    /// The unit suffix is not recognized.
    #[error("unknown time unit {unit:?}")]
    UnknownUnit {
        /// The unrecognized suffix.
        unit: String,
    },

    /// The value has more fractional digits than femtosecond precision allows.
    #[error("time string {input:?} is more precise than one femtosecond")]
    TooPrecise {
        /// The offending input.
        input: String,
    },

    /// The value does not fit in the time range.
    #[error("time value {input:?} is out of range")]
    Overflow {
        /// The offending input.
        input: String,
    },

    /// A negative time cannot be converted to a [`Duration`].
    #[error("negative time {time} cannot be represented as a Duration")]
    Negative {
        /// The negative time.
        time: Time,
    },
}

/// Units a [`Time`] can be built from or converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeUnit {
    /// 86 400 seconds.
    #[serde(rename = "d")]
    Days,
    /// 3 600 seconds.
    #[serde(rename = "h")]
    Hours,
    /// 60 seconds.
    #[serde(rename = "min")]
    Minutes,
    /// Seconds.
    #[serde(rename = "s")]
    Seconds,
    /// Milliseconds.
    #[serde(rename = "ms")]
    Millis,
    /// Microseconds.
    #[serde(rename = "us")]
    Micros,
    /// Nanoseconds.
    #[serde(rename = "ns")]
    Nanos,
    /// Picoseconds.
    #[serde(rename = "ps")]
    Picos,
    /// Femtoseconds, the finest granularity.
    #[serde(rename = "fs")]
    Femtos,
}

impl TimeUnit {
    /// All units, coarsest first.
    pub const ALL: [TimeUnit; 9] = [
        TimeUnit::Days,
        TimeUnit::Hours,
        TimeUnit::Minutes,
        TimeUnit::Seconds,
        TimeUnit::Millis,
        TimeUnit::Micros,
        TimeUnit::Nanos,
        TimeUnit::Picos,
        TimeUnit::Femtos,
    ];

    /// Number of femtoseconds in one unit.
    pub const fn femtos(self) -> i128 {
        match self {
            TimeUnit::Days => 86_400 * 1_000_000_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000_000_000,
            TimeUnit::Seconds => 1_000_000_000_000_000,
            TimeUnit::Millis => 1_000_000_000_000,
            TimeUnit::Micros => 1_000_000_000,
            TimeUnit::Nanos => 1_000_000,
            TimeUnit::Picos => 1_000,
            TimeUnit::Femtos => 1,
        }
    }

    /// The suffix used when parsing and displaying times.
    pub const fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Days => "d",
            TimeUnit::Hours => "h",
            TimeUnit::Minutes => "min",
            TimeUnit::Seconds => "s",
            TimeUnit::Millis => "ms",
            TimeUnit::Micros => "us",
            TimeUnit::Nanos => "ns",
            TimeUnit::Picos => "ps",
            TimeUnit::Femtos => "fs",
        }
    }

    /// Look up a unit by its suffix.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        TimeUnit::ALL.into_iter().find(|unit| unit.suffix() == suffix)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A point in, or span of, simulated time.
///
/// `Time` is used both for absolute timestamps (the value of `now`) and for
/// delays; the two are distinguished by context only, as in most
/// discrete-event simulators.
///
/// # Examples
///
/// ```
/// use netsim_core::{Time, TimeUnit};
///
/// let rto = Time::from_millis(200);
/// assert_eq!(rto.as_unit(TimeUnit::Micros), 200_000);
/// assert_eq!("0.2s".parse::<Time>().unwrap(), rto);
/// assert_eq!(rto.to_string(), "200ms");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Time(i128);

impl Time {
    /// Time zero, the start of every simulation.
    pub const ZERO: Time = Time(0);

    /// The largest representable time.
    pub const MAX: Time = Time(i128::MAX);

    /// The smallest (most negative) representable time.
    pub const MIN: Time = Time(i128::MIN);

    /// Build a time from a value and a unit.
    pub const fn new(value: i64, unit: TimeUnit) -> Self {
        Time(value as i128 * unit.femtos())
    }

    /// Build a time from a raw femtosecond count.
    pub const fn from_femtos(femtos: i128) -> Self {
        Time(femtos)
    }

    /// Seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Time::new(secs, TimeUnit::Seconds)
    }

    /// Milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Time::new(millis, TimeUnit::Millis)
    }

    /// Microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        Time::new(micros, TimeUnit::Micros)
    }

    /// Nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        Time::new(nanos, TimeUnit::Nanos)
    }

    /// Picoseconds.
    pub const fn from_picos(picos: i64) -> Self {
        Time::new(picos, TimeUnit::Picos)
    }

    /// Build a time from fractional seconds, rounded to the nearest femtosecond.
    ///
    /// Non-finite inputs saturate: NaN maps to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        let femtos = secs * TimeUnit::Seconds.femtos() as f64;
        if femtos.is_nan() {
            Time::ZERO
        } else {
            // `as` saturates at the i128 bounds
            Time(femtos.round() as i128)
        }
    }

    /// Raw femtosecond count.
    pub const fn as_femtos(self) -> i128 {
        self.0
    }

    /// Whole number of `unit` in this time, truncated toward zero.
    pub const fn as_unit(self, unit: TimeUnit) -> i128 {
        self.0 / unit.femtos()
    }

    /// This time in (fractional) seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / TimeUnit::Seconds.femtos() as f64
    }

    /// Returns `true` for time zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the time is strictly negative.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Returns `true` if the time is strictly positive.
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Absolute value.
    pub const fn abs(self) -> Self {
        Time(self.0.abs())
    }

    /// Addition returning `None` on overflow.
    pub const fn checked_add(self, rhs: Time) -> Option<Time> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Time(v)),
            None => None,
        }
    }

    /// Subtraction returning `None` on overflow.
    pub const fn checked_sub(self, rhs: Time) -> Option<Time> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Time(v)),
            None => None,
        }
    }

    /// Multiplication by an integer returning `None` on overflow.
    pub const fn checked_mul(self, rhs: i64) -> Option<Time> {
        match self.0.checked_mul(rhs as i128) {
            Some(v) => Some(Time(v)),
            None => None,
        }
    }

    /// Scale by a floating point factor, rounded to the nearest femtosecond.
    pub fn mul_f64(self, factor: f64) -> Time {
        Time((self.0 as f64 * factor).round() as i128)
    }

    /// Truncate toward zero to a whole multiple of `unit`.
    pub const fn truncate_to(self, unit: TimeUnit) -> Time {
        let step = unit.femtos();
        Time(self.0 / step * step)
    }

    /// The coarsest unit that represents this time exactly.
    pub fn natural_unit(self) -> TimeUnit {
        TimeUnit::ALL
            .into_iter()
            .find(|unit| self.0 % unit.femtos() == 0)
            .unwrap_or(TimeUnit::Femtos)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({})", self)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("0s");
        }
        let unit = self.natural_unit();
        write!(f, "{}{}", self.0 / unit.femtos(), unit.suffix())
    }
}

impl FromStr for Time {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(TimeError::Empty);
        }

        let (negative, body) = match input.as_bytes()[0] {
            b'-' => (true, &input[1..]),
            b'+' => (false, &input[1..]),
            _ => (false, input),
        };

        let split = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| TimeError::MissingUnit {
                input: input.to_string(),
            })?;
        let (number, suffix) = body.split_at(split);
        let unit = TimeUnit::from_suffix(suffix.trim()).ok_or_else(|| TimeError::UnknownUnit {
            unit: suffix.trim().to_string(),
        })?;

        let (whole, fraction) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(TimeError::InvalidNumber {
                input: input.to_string(),
            });
        }

        let overflow = || TimeError::Overflow {
            input: input.to_string(),
        };
        let invalid = || TimeError::InvalidNumber {
            input: input.to_string(),
        };

        let whole: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut femtos = whole.checked_mul(unit.femtos()).ok_or_else(overflow)?;

        if !fraction.is_empty() {
            if !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let digits = fraction.trim_end_matches('0');
            if !digits.is_empty() {
                let scale = 10i128
                    .checked_pow(digits.len() as u32)
                    .ok_or_else(|| TimeError::TooPrecise {
                        input: input.to_string(),
                    })?;
                let numerator: i128 = digits.parse().map_err(|_| invalid())?;
                let scaled = numerator.checked_mul(unit.femtos()).ok_or_else(overflow)?;
                if scaled % scale != 0 {
                    return Err(TimeError::TooPrecise {
                        input: input.to_string(),
                    });
                }
                femtos = femtos.checked_add(scaled / scale).ok_or_else(overflow)?;
            }
        }

        Ok(Time(if negative { -femtos } else { femtos }))
    }
}

impl TryFrom<String> for Time {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Time> for String {
    fn from(time: Time) -> Self {
        time.to_string()
    }
}

impl From<Duration> for Time {
    fn from(duration: Duration) -> Self {
        Time(duration.as_nanos() as i128 * TimeUnit::Nanos.femtos())
    }
}

impl TryFrom<Time> for Duration {
    type Error = TimeError;

    /// Sub-nanosecond precision is truncated.
    fn try_from(time: Time) -> Result<Self, Self::Error> {
        if time.is_negative() {
            return Err(TimeError::Negative { time });
        }
        let nanos = time.as_unit(TimeUnit::Nanos);
        let secs = (nanos / 1_000_000_000) as u64;
        let subsec = (nanos % 1_000_000_000) as u32;
        Ok(Duration::new(secs, subsec))
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        self.0 += rhs.0;
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        Time(self.0 - rhs.0)
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        self.0 -= rhs.0;
    }
}

impl Neg for Time {
    type Output = Time;

    fn neg(self) -> Time {
        Time(-self.0)
    }
}

impl Mul<i64> for Time {
    type Output = Time;

    fn mul(self, rhs: i64) -> Time {
        Time(self.0 * rhs as i128)
    }
}

impl Mul<Time> for i64 {
    type Output = Time;

    fn mul(self, rhs: Time) -> Time {
        rhs * self
    }
}

impl Div<i64> for Time {
    type Output = Time;

    fn div(self, rhs: i64) -> Time {
        Time(self.0 / rhs as i128)
    }
}

/// Ratio of two times, truncated toward zero.
impl Div<Time> for Time {
    type Output = i128;

    fn div(self, rhs: Time) -> i128 {
        self.0 / rhs.0
    }
}

impl Sum for Time {
    fn sum<I: Iterator<Item = Time>>(iter: I) -> Time {
        iter.fold(Time::ZERO, Add::add)
    }
}

/// The granularity of one raw tick for a simulation run.
///
/// Every timestamp the scheduler stores is a whole number of ticks; delays
/// finer than the resolution are truncated when an event is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolution(TimeUnit);

impl Resolution {
    /// A resolution of one `unit` per tick.
    pub const fn new(unit: TimeUnit) -> Self {
        Resolution(unit)
    }

    /// The unit of one tick.
    pub const fn unit(self) -> TimeUnit {
        self.0
    }

    /// The time spanned by `ticks` ticks.
    pub const fn from_ticks(self, ticks: i64) -> Time {
        Time::new(ticks, self.0)
    }

    /// Whole number of ticks in `time`, truncated toward zero.
    pub const fn to_ticks(self, time: Time) -> i128 {
        time.as_unit(self.0)
    }

    /// Truncate `time` to a whole number of ticks.
    pub const fn quantize(self, time: Time) -> Time {
        time.truncate_to(self.0)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution(TimeUnit::Nanos)
    }
}
