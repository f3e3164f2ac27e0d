use crate::{Fraction, TimeSpan};
use serde::{Deserialize, Serialize};

/// A Hap (happening) is a value active during a span of time.
///
/// `part` is the fragment visible to the query that produced it and never
/// extends outside the query arc. `whole`, when present, is the event's
/// canonical span; `part` never extends outside it. Continuous values have
/// no `whole`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hap<T> {
    pub whole: Option<TimeSpan>,
    pub part: TimeSpan,
    pub value: T,
}

impl<T> Hap<T> {
    pub fn new(whole: Option<TimeSpan>, part: TimeSpan, value: T) -> Self {
        Hap { whole, part, value }
    }

    /// The canonical span, falling back to the visible fragment.
    pub fn whole_or_part(&self) -> TimeSpan {
        self.whole.unwrap_or(self.part)
    }

    /// Whether this fragment carries the event's onset: the moment it fires.
    pub fn has_onset(&self) -> bool {
        match self.whole {
            Some(w) => !w.is_empty() && w.begin == self.part.begin,
            None => false,
        }
    }

    pub fn duration(&self) -> Fraction {
        self.whole_or_part().duration()
    }

    pub fn with_value<U, F>(self, func: F) -> Hap<U>
    where
        F: FnOnce(T) -> U,
    {
        Hap {
            whole: self.whole,
            part: self.part,
            value: func(self.value),
        }
    }

    /// Apply a time map to both `part` and `whole`.
    pub fn with_span<F>(self, func: F) -> Hap<T>
    where
        F: Fn(&TimeSpan) -> TimeSpan,
    {
        Hap {
            whole: self.whole.map(|w| func(&w)),
            part: func(&self.part),
            value: self.value,
        }
    }

    pub fn with_whole<F>(self, func: F) -> Hap<T>
    where
        F: FnOnce(Option<TimeSpan>) -> Option<TimeSpan>,
    {
        Hap {
            whole: func(self.whole),
            part: self.part,
            value: self.value,
        }
    }

    pub fn with_part(self, part: TimeSpan) -> Hap<T> {
        Hap {
            whole: self.whole,
            part,
            value: self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fraction;

    fn span(b: (i64, i64), e: (i64, i64)) -> TimeSpan {
        TimeSpan::new(Fraction::new(b.0, b.1), Fraction::new(e.0, e.1))
    }

    #[test]
    fn onset_requires_aligned_begin() {
        let whole = span((0, 1), (1, 1));
        let aligned = Hap::new(Some(whole), span((0, 1), (1, 2)), "x");
        assert!(aligned.has_onset());

        let fragment = Hap::new(Some(whole), span((1, 4), (1, 2)), "x");
        assert!(!fragment.has_onset());

        let continuous = Hap::new(None, span((0, 1), (1, 1)), "x");
        assert!(!continuous.has_onset());
    }

    #[test]
    fn with_span_maps_both_arcs() {
        let h = Hap::new(Some(span((0, 1), (1, 1))), span((0, 1), (1, 2)), 1);
        let shifted = h.with_span(|s| s.shift(Fraction::from_int(1)));
        assert_eq!(shifted.whole.unwrap(), span((1, 1), (2, 1)));
        assert_eq!(shifted.part, span((1, 1), (3, 2)));
    }
}
