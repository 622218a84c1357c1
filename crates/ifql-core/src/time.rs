//! Time model: nanosecond ticks, signed durations, half-open bounds.
//!
//! Query-level times (`OpTime`) may be relative to the query's `now`; they
//! resolve to absolute `Time` at plan time.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// An instant, in nanoseconds. Arithmetic saturates rather than wrapping.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Time(pub i64);

impl Time {
    pub const MIN: Time = Time(i64::MIN);
    pub const MAX: Time = Time(i64::MAX);

    pub fn nanoseconds(self) -> i64 {
        self.0
    }
}

impl Add<Duration> for Time {
    type Output = Time;
    fn add(self, d: Duration) -> Time {
        Time(self.0.saturating_add(d.0))
    }
}

impl Sub<Duration> for Time {
    type Output = Time;
    fn sub(self, d: Duration) -> Time {
        Time(self.0.saturating_sub(d.0))
    }
}

impl Sub<Time> for Time {
    type Output = Duration;
    fn sub(self, other: Time) -> Duration {
        Duration(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A span of time, in nanoseconds. May be negative.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Duration(pub i64);

impl Duration {
    pub const fn nanoseconds(ns: i64) -> Duration {
        Duration(ns)
    }

    pub const fn seconds(s: i64) -> Duration {
        Duration(s * 1_000_000_000)
    }

    pub const fn minutes(m: i64) -> Duration {
        Duration(m * 60 * 1_000_000_000)
    }

    pub const fn hours(h: i64) -> Duration {
        Duration(h * 3_600 * 1_000_000_000)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Half-open interval `[start, stop)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Bounds {
    pub start: Time,
    pub stop: Time,
}

impl Bounds {
    /// Sentinel for "no bounds collected yet". Union with anything yields
    /// the other operand.
    pub const EMPTY: Bounds = Bounds {
        start: Time::MAX,
        stop: Time::MIN,
    };

    pub fn new(start: Time, stop: Time) -> Bounds {
        Bounds { start, stop }
    }

    pub fn contains(&self, t: Time) -> bool {
        t >= self.start && t < self.stop
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.stop
    }

    pub fn duration(&self) -> Duration {
        self.stop - self.start
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    /// Spanning interval of the two bounds.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    pub fn intersect(&self, other: &Bounds) -> Bounds {
        Bounds {
            start: self.start.max(other.start),
            stop: self.stop.min(other.stop),
        }
    }

    /// True when this interval lies entirely within `outer`.
    pub fn within(&self, outer: &Bounds) -> bool {
        self.start >= outer.start && self.stop <= outer.stop
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// A query-level time: either absolute, or relative to the query's `now`.
/// `OpTime::default()` is "now itself" when marked relative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpTime {
    #[serde(default)]
    pub absolute: Time,
    #[serde(default)]
    pub relative: Duration,
    #[serde(default)]
    pub is_relative: bool,
}

impl OpTime {
    pub fn absolute(t: Time) -> OpTime {
        OpTime {
            absolute: t,
            ..OpTime::default()
        }
    }

    pub fn relative(d: Duration) -> OpTime {
        OpTime {
            relative: d,
            is_relative: true,
            ..OpTime::default()
        }
    }

    /// Relative offset zero, i.e. `now`.
    pub fn now() -> OpTime {
        OpTime::relative(Duration(0))
    }

    pub fn resolve(&self, now: Time) -> Time {
        if self.is_relative {
            now + self.relative
        } else {
            self.absolute
        }
    }
}

/// Declared bounds on a procedure, resolved against `now` at plan time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsSpec {
    pub start: OpTime,
    pub stop: OpTime,
}

impl BoundsSpec {
    pub fn resolve(&self, now: Time) -> Bounds {
        Bounds {
            start: self.start.resolve(now),
            stop: self.stop.resolve(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optime_resolution() {
        let now = Time(1_000);
        assert_eq!(OpTime::now().resolve(now), now);
        assert_eq!(OpTime::relative(Duration(-100)).resolve(now), Time(900));
        assert_eq!(OpTime::absolute(Time(42)).resolve(now), Time(42));
    }

    #[test]
    fn bounds_union_spans() {
        let a = Bounds::new(Time(0), Time(10));
        let b = Bounds::new(Time(5), Time(20));
        assert_eq!(a.union(&b), Bounds::new(Time(0), Time(20)));
        assert_eq!(Bounds::EMPTY.union(&a), a);
    }

    #[test]
    fn bounds_contains_is_half_open() {
        let b = Bounds::new(Time(0), Time(10));
        assert!(b.contains(Time(0)));
        assert!(b.contains(Time(9)));
        assert!(!b.contains(Time(10)));
    }
}
