use crate::pattern::{silence, Pattern};
use crate::{stack, Fraction, Hap, State, TimeSpan};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Sampling-site tags keep independent random decisions uncorrelated even
// when they land on the same time point.
const TAG_RAND: u64 = 0x9e37_79b9_7f4a_7c15;
const TAG_RAND_CYCLE: u64 = 0xbf58_476d_1ce4_e5b9;
const TAG_DEGRADE: u64 = 0x94d0_49bb_1331_11eb;
const TAG_SOMETIMES: u64 = 0x2545_f491_4f6c_dd1d;
const TAG_SOME_CYCLES: u64 = 0xd6e8_feb8_6659_fd93;
const TAG_CHOICE: u64 = 0xa076_1d64_78bd_642f;

fn mix(mut h: u64, v: u64) -> u64 {
    h ^= v.wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(h << 6)
        .wrapping_add(h >> 2);
    h
}

/// The one random primitive: a uniform sample in `[0, 1)` fully determined
/// by `(seed, time, tag)`. No host entropy anywhere.
pub(crate) fn sample(seed: u64, time: Fraction, tag: u64) -> f64 {
    let key = mix(
        mix(mix(seed, time.numerator() as u64), time.denominator() as u64),
        tag,
    );
    StdRng::seed_from_u64(key).gen::<f64>()
}

/// A continuous stream of uniform noise, one sample per query segment.
/// Refine the grid with `segment(n)`.
pub fn rand() -> Pattern<f64> {
    Pattern::new(|state: &State| {
        state
            .span
            .span_cycles()
            .into_iter()
            .map(|part| {
                let value = sample(state.seed, part.begin, TAG_RAND);
                Hap::new(None, part, value)
            })
            .collect()
    })
}

/// One uniform sample per integer cycle, constant across the cycle.
pub fn rand_cycle() -> Pattern<f64> {
    Pattern::new(|state: &State| {
        state
            .span
            .span_cycles()
            .into_iter()
            .map(|part| {
                let cycle = part.begin.floor();
                let value = sample(state.seed, cycle, TAG_RAND_CYCLE);
                Hap::new(Some(TimeSpan::cycle(cycle.floor_int())), part, value)
            })
            .collect()
    })
}

/// Noise thresholded at one half: a coin per sample point.
pub fn brand() -> Pattern<bool> {
    rand().fmap(|r| r >= 0.5)
}

/// Pick a value per sample point, uniformly.
pub fn choose<T: Clone + Send + Sync + 'static>(values: Vec<T>) -> Pattern<T> {
    if values.is_empty() {
        return silence();
    }
    let n = values.len();
    rand().fmap(move |r| values[((r * n as f64) as usize).min(n - 1)].clone())
}

/// Pick a whole pattern per cycle, uniformly. The `site` distinguishes
/// independent choice points sharing a seed.
pub fn choose_cycles_site<T: Clone + Send + Sync + 'static>(
    patterns: Vec<Pattern<T>>,
    site: u64,
) -> Pattern<T> {
    if patterns.is_empty() {
        return silence();
    }
    let n = patterns.len();
    Pattern::new(move |state: &State| {
        let cycle = state.span.begin.floor();
        let r = sample(state.seed, cycle, TAG_CHOICE ^ site);
        let index = ((r * n as f64) as usize).min(n - 1);
        patterns[index].query(state)
    })
    .split_queries()
}

pub fn choose_cycles<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    choose_cycles_site(patterns, 0)
}

/// Index into `values` with a pattern of numbers, wrapping modulo the
/// length.
pub fn choose_with<T: Clone + Send + Sync + 'static>(
    index: Pattern<f64>,
    values: Vec<T>,
) -> Pattern<T> {
    if values.is_empty() {
        return silence();
    }
    let n = values.len() as i64;
    index.fmap(move |i| values[(i.floor() as i64).rem_euclid(n) as usize].clone())
}

/// Weighted pick per sample point: cumulative weights, sample scaled by
/// the total.
pub fn wchoose<T: Clone + Send + Sync + 'static>(pairs: Vec<(T, f64)>) -> Pattern<T> {
    let pairs: Vec<(T, f64)> = pairs.into_iter().filter(|(_, w)| *w > 0.0).collect();
    if pairs.is_empty() {
        return silence();
    }
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    rand().fmap(move |r| {
        let target = r * total;
        let mut acc = 0.0;
        for (value, weight) in &pairs {
            acc += weight;
            if target < acc {
                return value.clone();
            }
        }
        pairs[pairs.len() - 1].0.clone()
    })
}

/// Weighted pick of whole patterns, once per cycle.
pub fn wchoose_cycles_site<T: Clone + Send + Sync + 'static>(
    pairs: Vec<(Pattern<T>, f64)>,
    site: u64,
) -> Pattern<T> {
    let pairs: Vec<(Pattern<T>, f64)> = pairs.into_iter().filter(|(_, w)| *w > 0.0).collect();
    if pairs.is_empty() {
        return silence();
    }
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    Pattern::new(move |state: &State| {
        let cycle = state.span.begin.floor();
        let target = sample(state.seed, cycle, TAG_CHOICE ^ site) * total;
        let mut acc = 0.0;
        for (pat, weight) in &pairs {
            acc += weight;
            if target < acc {
                return pat.query(state);
            }
        }
        pairs[pairs.len() - 1].0.query(state)
    })
    .split_queries()
}

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    fn keep_sampled(self, amount: f64, site: u64, below: bool) -> Pattern<T> {
        let pat = self;
        Pattern::new(move |state: &State| {
            pat.query(state)
                .into_iter()
                .filter(|h| {
                    let r = sample(state.seed, h.whole_or_part().begin, TAG_DEGRADE ^ site);
                    if below {
                        r < amount
                    } else {
                        r >= amount
                    }
                })
                .collect()
        })
    }

    /// Randomly drop events: each event whose sample falls below `amount`
    /// disappears.
    pub fn degrade_by(self, amount: f64) -> Pattern<T> {
        self.keep_sampled(amount, 0, false)
    }

    /// `degrade_by` with an explicit sampling site, for notation-level
    /// `?` marks that must not correlate.
    pub fn degrade_site(self, amount: f64, site: u64) -> Pattern<T> {
        self.keep_sampled(amount, site, false)
    }

    /// The complement of `degrade_by` at the same sampling site: together
    /// they partition the pattern exactly.
    pub fn undegrade_by(self, amount: f64) -> Pattern<T> {
        self.keep_sampled(amount, 0, true)
    }

    /// Drop half the events.
    pub fn degrade(self) -> Pattern<T> {
        self.degrade_by(0.5)
    }

    /// Gate each event by a value pattern: events are dropped while the
    /// source reads below `amount` at their onset. With a per-cycle
    /// source every event in a cycle shares the one decision.
    pub fn degrade_by_with(self, source: Pattern<f64>, amount: f64) -> Pattern<T> {
        let pat = self;
        Pattern::new(move |state: &State| {
            pat.query(state)
                .into_iter()
                .filter(|h| {
                    let span = h.whole_or_part();
                    let r = source
                        .query(&state.set_span(span))
                        .first()
                        .map(|s| s.value)
                        .unwrap_or(1.0);
                    r >= amount
                })
                .collect()
        })
    }

    /// Apply `func` to a random `amount` share of events, leaving the rest
    /// untouched. The two sides share one sampling site, so every event
    /// goes exactly one way.
    pub fn sometimes_by<F>(self, amount: f64, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        let chosen = func(self.clone().keep_sampled(amount, TAG_SOMETIMES, true));
        let rest = self.keep_sampled(amount, TAG_SOMETIMES, false);
        stack(vec![rest, chosen])
    }

    /// As `sometimes_by`, but the decision is taken once per cycle: a
    /// cycle is either entirely transformed or entirely plain.
    pub fn some_cycles_by<F>(self, amount: f64, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        let transformed = func(self.clone());
        let plain = self;
        Pattern::new(move |state: &State| {
            let cycle = state.span.begin.floor();
            let r = sample(state.seed, cycle, TAG_SOME_CYCLES);
            if r < amount {
                transformed.query(state)
            } else {
                plain.query(state)
            }
        })
        .split_queries()
    }

    pub fn sometimes<F>(self, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        self.sometimes_by(0.5, func)
    }

    pub fn often<F>(self, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        self.sometimes_by(0.75, func)
    }

    pub fn rarely<F>(self, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        self.sometimes_by(0.25, func)
    }

    pub fn almost_always<F>(self, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        self.sometimes_by(0.9, func)
    }

    pub fn almost_never<F>(self, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        self.sometimes_by(0.1, func)
    }

    pub fn always<F>(self, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        func(self)
    }

    pub fn never<F>(self, _func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        self
    }

    pub fn some_cycles<F>(self, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        self.some_cycles_by(0.5, func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::pure;
    use crate::{fastcat, Value};

    fn eight() -> Pattern<Value> {
        pure(Value::from("x")).fast(8).unwrap()
    }

    #[test]
    fn rand_is_deterministic_per_seed() {
        let p = rand().segment(8).unwrap().seed(42);
        let a: Vec<f64> = p.first_cycle().into_iter().map(|h| h.value).collect();
        let b: Vec<f64> = p.first_cycle().into_iter().map(|h| h.value).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));

        let other: Vec<f64> = rand()
            .segment(8)
            .unwrap()
            .seed(43)
            .first_cycle()
            .into_iter()
            .map(|h| h.value)
            .collect();
        assert_ne!(a, other);
    }

    #[test]
    fn rand_cycle_is_constant_within_a_cycle() {
        let p = rand_cycle().segment(4).unwrap();
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 4);
        let first = haps[0].value;
        assert!(haps.iter().all(|h| h.value == first));

        let next = p.query_span(TimeSpan::from_ints(1, 2));
        assert_ne!(next[0].value, first);
    }

    #[test]
    fn degrade_partitions_with_undegrade() {
        let p = pure(Value::from("x")).fast(32).unwrap().seed(7);
        let kept = p.clone().degrade_by(0.5).first_cycle().len();
        let dropped = p.clone().undegrade_by(0.5).first_cycle().len();
        assert_eq!(kept + dropped, 32);
        assert!(kept > 0 && kept < 32, "both halves should be non-empty");
    }

    #[test]
    fn degrade_zero_and_one_are_total() {
        let p = eight();
        assert_eq!(p.clone().degrade_by(0.0).first_cycle().len(), 8);
        assert_eq!(p.clone().degrade_by(1.0).first_cycle().len(), 0);
    }

    #[test]
    fn degrade_by_with_cycle_source_is_all_or_nothing() {
        let base = fastcat(vec![
            pure(Value::from("a")),
            pure(Value::from("b")),
            pure(Value::from("c")),
            pure(Value::from("d")),
        ]);
        let p = base.degrade_by_with(rand_cycle(), 0.5).seed(3);
        let mut saw_full = false;
        let mut saw_empty = false;
        for k in 0..32 {
            let n = p.query_span(TimeSpan::from_ints(k, k + 1)).len();
            assert!(n == 0 || n == 4, "cycle {k} had {n} events");
            saw_full |= n == 4;
            saw_empty |= n == 0;
        }
        assert!(saw_full && saw_empty);
    }

    #[test]
    fn sometimes_by_preserves_event_count() {
        let p = pure(Value::from("x"))
            .fast(32)
            .unwrap()
            .seed(11)
            .sometimes_by(0.5, |p| p.fmap(|_| Value::from("X")));
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 32);
        let transformed = haps
            .iter()
            .filter(|h| h.value == Value::from("X"))
            .count();
        assert!(transformed > 0 && transformed < 32);
    }

    #[test]
    fn some_cycles_by_never_mixes_within_a_cycle() {
        let p = eight()
            .seed(5)
            .some_cycles_by(0.5, |p| p.fmap(|_| Value::from("X")));
        for k in 0..16 {
            let haps = p.query_span(TimeSpan::from_ints(k, k + 1));
            let transformed = haps
                .iter()
                .filter(|h| h.value == Value::from("X"))
                .count();
            assert!(
                transformed == 0 || transformed == haps.len(),
                "cycle {k} mixed plain and transformed"
            );
        }
    }

    #[test]
    fn choose_with_wraps_indices() {
        let idx = fastcat(vec![pure(0.0), pure(1.0), pure(2.0)]);
        let p = choose_with(idx, vec![Value::from("a"), Value::from("b")]);
        let values: Vec<String> = p.first_cycle().iter().map(|h| h.value.to_string()).collect();
        assert_eq!(values, vec!["a", "b", "a"]);
    }

    #[test]
    fn choose_cycles_picks_whole_patterns() {
        let p = choose_cycles(vec![
            pure(Value::from("a")),
            pure(Value::from("b")),
            pure(Value::from("c")),
        ])
        .seed(9);
        for k in 0..8 {
            let haps = p.query_span(TimeSpan::from_ints(k, k + 1));
            assert_eq!(haps.len(), 1);
        }
        // Same seed, same picks.
        let again = p.query_span(TimeSpan::from_ints(0, 8));
        let first = p.query_span(TimeSpan::from_ints(0, 8));
        assert_eq!(
            again.iter().map(|h| h.value.clone()).collect::<Vec<_>>(),
            first.iter().map(|h| h.value.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn wchoose_honours_zero_weight() {
        let p = wchoose(vec![(Value::from("a"), 1.0), (Value::from("b"), 0.0)])
            .segment(16)
            .unwrap();
        let haps = p.first_cycle();
        assert!(haps.iter().all(|h| h.value == Value::from("a")));
    }

    #[test]
    fn brand_is_boolean_noise() {
        let p = brand().segment(32).unwrap().seed(1);
        let haps = p.first_cycle();
        let trues = haps.iter().filter(|h| h.value).count();
        assert!(trues > 0 && trues < 32);
    }
}
