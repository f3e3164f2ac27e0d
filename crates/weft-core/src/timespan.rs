use crate::Fraction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open span of cycle time, `[begin, end)`.
///
/// Invariant: `begin <= end`. A span with `begin == end` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub begin: Fraction,
    pub end: Fraction,
}

impl TimeSpan {
    pub fn new(begin: Fraction, end: Fraction) -> Self {
        TimeSpan { begin, end }
    }

    pub fn from_ints(begin: i64, end: i64) -> Self {
        TimeSpan {
            begin: Fraction::from_int(begin),
            end: Fraction::from_int(end),
        }
    }

    /// The whole of cycle `n`, `[n, n+1)`.
    pub fn cycle(n: i64) -> Self {
        TimeSpan::from_ints(n, n + 1)
    }

    pub fn duration(&self) -> Fraction {
        self.end - self.begin
    }

    /// Whether a time point falls inside the span (half-open).
    pub fn contains(&self, time: Fraction) -> bool {
        time >= self.begin && time < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Whether two spans overlap on a non-empty interval.
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// The non-empty intersection of two spans, if any.
    pub fn intersection(&self, other: &TimeSpan) -> Option<TimeSpan> {
        if !self.overlaps(other) {
            return None;
        }
        Some(TimeSpan::new(
            self.begin.max(other.begin),
            self.end.min(other.end),
        ))
    }

    /// Intersection that also admits the empty touching case, used where a
    /// zero-width event must survive clipping.
    pub fn sect(&self, other: &TimeSpan) -> Option<TimeSpan> {
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end);
        if begin > end {
            None
        } else {
            Some(TimeSpan::new(begin, end))
        }
    }

    /// Split the span at every integer cycle boundary it crosses.
    ///
    /// Cycle-indexed combinators recurse over these pieces; this is what
    /// makes `query(a, c)` agree with `query(a, b) ++ query(b, c)`.
    pub fn span_cycles(&self) -> Vec<TimeSpan> {
        let mut spans = Vec::new();
        if self.is_empty() {
            return spans;
        }
        let mut begin = self.begin;
        loop {
            let next = begin.floor() + Fraction::from_int(1);
            if next >= self.end {
                spans.push(TimeSpan::new(begin, self.end));
                return spans;
            }
            spans.push(TimeSpan::new(begin, next));
            begin = next;
        }
    }

    /// Apply an affine time map to both endpoints.
    pub fn with_time<F>(&self, func: F) -> TimeSpan
    where
        F: Fn(Fraction) -> Fraction,
    {
        TimeSpan::new(func(self.begin), func(self.end))
    }

    pub fn shift(&self, offset: Fraction) -> TimeSpan {
        TimeSpan::new(self.begin + offset, self.end + offset)
    }

    pub fn scale(&self, factor: Fraction) -> TimeSpan {
        TimeSpan::new(self.begin * factor, self.end * factor)
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.begin, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection() {
        let a = TimeSpan::from_ints(0, 2);
        let b = TimeSpan::from_ints(1, 3);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i, TimeSpan::from_ints(1, 2));

        let c = TimeSpan::from_ints(3, 4);
        assert!(a.intersection(&c).is_none());
        // Touching spans do not overlap: [0,2) and [2,4)
        let d = TimeSpan::from_ints(2, 4);
        assert!(a.intersection(&d).is_none());
    }

    #[test]
    fn span_cycles_cuts_at_integers() {
        let s = TimeSpan::new(Fraction::new(1, 2), Fraction::new(5, 2));
        let pieces = s.span_cycles();
        assert_eq!(
            pieces,
            vec![
                TimeSpan::new(Fraction::new(1, 2), Fraction::from_int(1)),
                TimeSpan::from_ints(1, 2),
                TimeSpan::new(Fraction::from_int(2), Fraction::new(5, 2)),
            ]
        );
    }

    #[test]
    fn span_cycles_within_one_cycle() {
        let s = TimeSpan::new(Fraction::new(1, 4), Fraction::new(3, 4));
        assert_eq!(s.span_cycles(), vec![s]);
        assert!(TimeSpan::from_ints(1, 1).span_cycles().is_empty());
    }

    #[test]
    fn contains_is_half_open() {
        let s = TimeSpan::from_ints(0, 1);
        assert!(s.contains(Fraction::from_int(0)));
        assert!(s.contains(Fraction::new(1, 2)));
        assert!(!s.contains(Fraction::from_int(1)));
    }
}
