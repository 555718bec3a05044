/// A monotonic timestamp on the producers' clock, in whatever unit the
/// instrumentation pipeline emits (milliseconds, unless configured otherwise).
///
/// Events are typically, but not strictly, monotonically increasing across
/// insertions; the store never assumes arrival order and timestamp order
/// agree.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct TimeInt(i64);

impl TimeInt {
    /// The beginning of time.
    pub const MIN: Self = Self(i64::MIN);

    /// The end of time.
    pub const MAX: Self = Self(i64::MAX);

    #[inline]
    pub const fn new(t: i64) -> Self {
        Self(t)
    }

    #[inline]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Steps back `amount` time units, saturating at [`Self::MIN`].
    ///
    /// Used to derive age-prune cutoffs (`now − max_age`).
    #[inline]
    pub const fn saturating_sub(self, amount: i64) -> Self {
        Self(self.0.saturating_sub(amount))
    }
}

impl From<i64> for TimeInt {
    #[inline]
    fn from(t: i64) -> Self {
        Self(t)
    }
}

impl From<i32> for TimeInt {
    #[inline]
    fn from(t: i32) -> Self {
        Self(t as i64)
    }
}

impl From<TimeInt> for i64 {
    #[inline]
    fn from(t: TimeInt) -> Self {
        t.0
    }
}

impl std::fmt::Display for TimeInt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ---

/// A time range, inclusive on both ends.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Deserialize, serde::Serialize,
)]
pub struct TimeRange {
    pub min: TimeInt,
    pub max: TimeInt,
}

impl TimeRange {
    /// The range covering everything ever recorded.
    pub const EVERYTHING: Self = Self {
        min: TimeInt::MIN,
        max: TimeInt::MAX,
    };

    #[inline]
    pub fn new(min: impl Into<TimeInt>, max: impl Into<TimeInt>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    #[inline]
    pub fn contains(&self, time: TimeInt) -> bool {
        self.min <= time && time <= self.max
    }

    /// An empty range can never match any event.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max < self.min
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_are_inclusive() {
        let range = TimeRange::new(100, 200);
        assert!(range.contains(TimeInt::new(100)));
        assert!(range.contains(TimeInt::new(200)));
        assert!(!range.contains(TimeInt::new(99)));
        assert!(!range.contains(TimeInt::new(201)));
        assert!(!range.is_empty());

        assert!(TimeRange::new(200, 100).is_empty());
        assert!(TimeRange::EVERYTHING.contains(TimeInt::MIN));
        assert!(TimeRange::EVERYTHING.contains(TimeInt::MAX));
    }

    #[test]
    fn cutoff_arithmetic_saturates() {
        assert_eq!(TimeInt::new(1_000).saturating_sub(300), TimeInt::new(700));
        assert_eq!(TimeInt::MIN.saturating_sub(1), TimeInt::MIN);
    }
}
