use crate::{Fraction, Hap, State, TimeSpan};
use std::sync::Arc;

/// A pattern is a pure function of time: queried with a span, it returns
/// the events active in that span.
///
/// Patterns are built once and never mutated; every operator wraps the
/// query function of its argument in a new closure. Cloning is cheap (the
/// query function is shared behind an `Arc`), and querying the same
/// pattern from several threads is safe by construction.
pub struct Pattern<T> {
    query: Arc<dyn Fn(&State) -> Vec<Hap<T>> + Send + Sync>,

    /// Declared step count per cycle, consumed by polymeter alignment and
    /// `pace`. `None` for patterns with no meaningful step grid.
    steps: Option<Fraction>,
}

impl<T> Clone for Pattern<T> {
    fn clone(&self) -> Self {
        Pattern {
            query: self.query.clone(),
            steps: self.steps,
        }
    }
}

impl<T> std::fmt::Debug for Pattern<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("query", &"<fn>")
            .field("steps", &self.steps)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    pub fn new<F>(query: F) -> Self
    where
        F: Fn(&State) -> Vec<Hap<T>> + Send + Sync + 'static,
    {
        Pattern {
            query: Arc::new(query),
            steps: None,
        }
    }

    pub fn with_steps<F>(query: F, steps: Option<Fraction>) -> Self
    where
        F: Fn(&State) -> Vec<Hap<T>> + Send + Sync + 'static,
    {
        Pattern {
            query: Arc::new(query),
            steps,
        }
    }

    /// Query the events active in the given state.
    pub fn query(&self, state: &State) -> Vec<Hap<T>> {
        (self.query)(state)
    }

    /// Query a span with the default seed.
    pub fn query_span(&self, span: TimeSpan) -> Vec<Hap<T>> {
        self.query(&State::new(span))
    }

    /// The float-facing query surface. Floats are converted to exact
    /// fractions here and nowhere deeper.
    pub fn query_arc(&self, begin: f64, end: f64) -> Vec<Hap<T>> {
        self.query_span(TimeSpan::new(
            Fraction::approximate(begin),
            Fraction::approximate(end),
        ))
    }

    /// Events of the first cycle, sorted by part begin. Mostly a test and
    /// CLI convenience; combinator output order is otherwise unspecified.
    pub fn first_cycle(&self) -> Vec<Hap<T>> {
        let mut haps = self.query_span(TimeSpan::from_ints(0, 1));
        haps.sort_by(|a, b| a.part.begin.cmp(&b.part.begin));
        haps
    }

    pub fn get_steps(&self) -> Option<Fraction> {
        self.steps
    }

    pub fn set_steps(mut self, steps: Option<Fraction>) -> Self {
        self.steps = steps;
        self
    }

    /// Pin the ambient random seed for this pattern and everything below.
    pub fn seed(self, seed: u64) -> Pattern<T> {
        let query = self.query.clone();
        Pattern {
            query: Arc::new(move |state: &State| query(&state.set_seed(seed))),
            steps: self.steps,
        }
    }

    // ----- uniform transformers -----

    /// Map a time function over the query span, before delegation.
    pub fn with_query_time<F>(self, func: F) -> Pattern<T>
    where
        F: Fn(Fraction) -> Fraction + Send + Sync + 'static,
    {
        let query = self.query.clone();
        Pattern {
            query: Arc::new(move |state: &State| {
                let span = TimeSpan::new(func(state.span.begin), func(state.span.end));
                query(&state.set_span(span))
            }),
            steps: self.steps,
        }
    }

    /// Map a time function over every returned hap's part and whole.
    pub fn with_hap_time<F>(self, func: F) -> Pattern<T>
    where
        F: Fn(Fraction) -> Fraction + Send + Sync + 'static,
    {
        let query = self.query.clone();
        Pattern {
            query: Arc::new(move |state: &State| {
                query(state)
                    .into_iter()
                    .map(|hap| hap.with_span(|ts| TimeSpan::new(func(ts.begin), func(ts.end))))
                    .collect()
            }),
            steps: self.steps,
        }
    }

    /// Map a span function over the query span.
    pub fn with_query_span<F>(self, func: F) -> Pattern<T>
    where
        F: Fn(&TimeSpan) -> TimeSpan + Send + Sync + 'static,
    {
        let query = self.query.clone();
        Pattern {
            query: Arc::new(move |state: &State| query(&state.with_span(&func))),
            steps: self.steps,
        }
    }

    /// Map a span function over every returned hap.
    pub fn with_hap_span<F>(self, func: F) -> Pattern<T>
    where
        F: Fn(&TimeSpan) -> TimeSpan + Send + Sync + 'static,
    {
        let query = self.query.clone();
        Pattern {
            query: Arc::new(move |state: &State| {
                query(state)
                    .into_iter()
                    .map(|hap| hap.with_span(&func))
                    .collect()
            }),
            steps: self.steps,
        }
    }

    /// The functor map: transform every value.
    pub fn fmap<U, F>(self, func: F) -> Pattern<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let query = self.query.clone();
        Pattern {
            query: Arc::new(move |state: &State| {
                query(state)
                    .into_iter()
                    .map(|hap| hap.with_value(&func))
                    .collect()
            }),
            steps: self.steps,
        }
    }

    /// Alias for `fmap`, matching the receiver style of the other
    /// transformers.
    pub fn with_value<U, F>(self, func: F) -> Pattern<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.fmap(func)
    }

    /// Transform the whole hap list of each query.
    pub fn with_haps<F>(self, func: F) -> Pattern<T>
    where
        F: Fn(Vec<Hap<T>>) -> Vec<Hap<T>> + Send + Sync + 'static,
    {
        let query = self.query.clone();
        Pattern {
            query: Arc::new(move |state: &State| func(query(state))),
            steps: self.steps,
        }
    }

    /// Keep only haps passing the predicate.
    pub fn filter_haps<F>(self, pred: F) -> Pattern<T>
    where
        F: Fn(&Hap<T>) -> bool + Send + Sync + 'static,
    {
        self.with_haps(move |haps| haps.into_iter().filter(|h| pred(h)).collect())
    }

    /// Keep only haps whose value passes the predicate.
    pub fn filter_values<F>(self, pred: F) -> Pattern<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter_haps(move |hap| pred(&hap.value))
    }

    /// Keep only haps whose part begins at a time satisfying the
    /// predicate. This is the time-gate used by `chunk` and friends.
    pub fn filter_when<F>(self, pred: F) -> Pattern<T>
    where
        F: Fn(Fraction) -> bool + Send + Sync + 'static,
    {
        self.filter_haps(move |hap| pred(hap.part.begin))
    }

    /// Keep only fragments that carry their event's onset.
    pub fn onsets_only(self) -> Pattern<T> {
        self.filter_haps(|hap| hap.has_onset())
    }

    /// Split incoming queries at integer cycle boundaries and concatenate
    /// the per-cycle results.
    ///
    /// Every cycle-indexed combinator is wrapped in this; it is the
    /// invariant that makes a query over `[a, c)` agree with the union of
    /// `[a, b)` and `[b, c)`.
    pub fn split_queries(self) -> Pattern<T> {
        let query = self.query.clone();
        Pattern {
            query: Arc::new(move |state: &State| {
                state
                    .span
                    .span_cycles()
                    .into_iter()
                    .flat_map(|span| query(&state.set_span(span)))
                    .collect()
            }),
            steps: self.steps,
        }
    }
}

/// The pattern that returns no events for any query.
pub fn silence<T: Clone + Send + Sync + 'static>() -> Pattern<T> {
    Pattern::new(|_| Vec::new())
}

/// One event per cycle carrying `value`, whole span `[k, k+1)`.
pub fn pure<T: Clone + Send + Sync + 'static>(value: T) -> Pattern<T> {
    Pattern::with_steps(
        move |state: &State| {
            state
                .span
                .span_cycles()
                .into_iter()
                .map(|part| {
                    let whole = TimeSpan::cycle(part.begin.floor_int());
                    Hap::new(Some(whole), part, value.clone())
                })
                .collect()
        },
        Some(Fraction::from_int(1)),
    )
}

/// A constant continuous value: like `pure` but with no onset.
pub fn steady<T: Clone + Send + Sync + 'static>(value: T) -> Pattern<T> {
    Pattern::new(move |state: &State| {
        state
            .span
            .span_cycles()
            .into_iter()
            .map(|part| Hap::new(None, part, value.clone()))
            .collect()
    })
}

/// A continuous pattern sampled from a function of time.
///
/// Each cycle-split query piece yields one hap whose value is the function
/// sampled at the piece's begin; discretisers (`segment`) refine the grid.
pub fn signal<T, F>(func: F) -> Pattern<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Fraction) -> T + Send + Sync + 'static,
{
    Pattern::new(move |state: &State| {
        state
            .span
            .span_cycles()
            .into_iter()
            .map(|part| Hap::new(None, part, func(part.begin)))
            .collect()
    })
}

impl From<f64> for Pattern<f64> {
    fn from(v: f64) -> Self {
        pure(v)
    }
}

impl From<i64> for Pattern<f64> {
    fn from(v: i64) -> Self {
        pure(v as f64)
    }
}

impl From<crate::Value> for Pattern<crate::Value> {
    fn from(v: crate::Value) -> Self {
        pure(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fraction;

    #[test]
    fn silence_is_empty() {
        let p: Pattern<i64> = silence();
        assert!(p.query_span(TimeSpan::from_ints(0, 4)).is_empty());
    }

    #[test]
    fn pure_emits_one_hap_per_cycle() {
        let p = pure(42);
        let haps = p.query_span(TimeSpan::from_ints(0, 3));
        assert_eq!(haps.len(), 3);
        for (k, hap) in haps.iter().enumerate() {
            assert_eq!(hap.whole.unwrap(), TimeSpan::cycle(k as i64));
            assert_eq!(hap.part, TimeSpan::cycle(k as i64));
            assert!(hap.has_onset());
            assert_eq!(hap.value, 42);
        }
    }

    #[test]
    fn pure_clips_part_to_query() {
        let p = pure("x");
        let haps = p.query_span(TimeSpan::new(Fraction::new(1, 4), Fraction::new(1, 2)));
        assert_eq!(haps.len(), 1);
        assert_eq!(haps[0].whole.unwrap(), TimeSpan::from_ints(0, 1));
        assert_eq!(
            haps[0].part,
            TimeSpan::new(Fraction::new(1, 4), Fraction::new(1, 2))
        );
        assert!(!haps[0].has_onset());
    }

    #[test]
    fn steady_has_no_onset() {
        let p = steady(1.0);
        let haps = p.query_span(TimeSpan::from_ints(0, 2));
        assert_eq!(haps.len(), 2);
        assert!(haps.iter().all(|h| h.whole.is_none()));
    }

    #[test]
    fn fmap_transforms_values() {
        let p = pure(10).fmap(|n| n + 5);
        let haps = p.first_cycle();
        assert_eq!(haps[0].value, 15);
    }

    #[test]
    fn filter_when_gates_on_part_begin() {
        let p = pure(1).split_queries().filter_when(|t| t.fract().is_zero());
        let haps = p.query_span(TimeSpan::new(Fraction::new(1, 2), Fraction::new(5, 2)));
        // Fragments beginning mid-cycle are dropped; cycle starts survive.
        assert_eq!(haps.len(), 2);
    }

    #[test]
    fn query_arc_converts_floats_exactly() {
        let p = pure("a");
        let haps = p.query_arc(0.0, 0.5);
        assert_eq!(
            haps[0].part,
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 2))
        );
    }

    #[test]
    fn locality_of_pure() {
        let p = pure(7);
        let full = p.query_span(TimeSpan::from_ints(0, 2));
        let mut split = p.query_span(TimeSpan::new(Fraction::from_int(0), Fraction::new(3, 2)));
        split.extend(p.query_span(TimeSpan::new(Fraction::new(3, 2), Fraction::from_int(2))));
        // Same wholes; parts re-fragment at the split point.
        let wholes: Vec<_> = full.iter().map(|h| h.whole).collect();
        let split_wholes: Vec<_> = split.iter().map(|h| h.whole).collect();
        assert!(split_wholes.iter().all(|w| wholes.contains(w)));
        assert_eq!(split.len(), 3);
    }
}
