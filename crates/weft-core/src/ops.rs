use crate::error::{PatternError, Result};
use crate::pattern::Pattern;
use crate::{stack, Fraction, Hap, State, TimeSpan, Value};
use std::sync::Arc;

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Speed up by a factor: the query is stretched onto the pattern's
    /// time, events are mapped back. Steps scale with the factor.
    pub fn fast(self, factor: impl Into<Fraction>) -> Result<Pattern<T>> {
        let factor = factor.into();
        if factor <= Fraction::from_int(0) {
            return Err(PatternError::argument(
                "fast",
                format!("factor must be positive, got {factor}"),
            ));
        }
        Ok(self.fast_unchecked(factor))
    }

    /// Slow down by a factor; `slow(r)` is `fast(1/r)`.
    pub fn slow(self, factor: impl Into<Fraction>) -> Result<Pattern<T>> {
        let factor = factor.into();
        if factor <= Fraction::from_int(0) {
            return Err(PatternError::argument(
                "slow",
                format!("factor must be positive, got {factor}"),
            ));
        }
        Ok(self.fast_unchecked(factor.reciprocal()))
    }

    /// `fast` for callers that already hold a positive factor.
    pub(crate) fn fast_unchecked(self, factor: Fraction) -> Pattern<T> {
        let steps = self.get_steps().map(|s| s * factor);
        self.with_query_time(move |t| t * factor)
            .with_hap_time(move |t| t / factor)
            .set_steps(steps)
    }

    /// Speed factor taken from a pattern, sampled per outer event.
    pub fn fast_with(self, factor: Pattern<f64>) -> Pattern<T> {
        let pat = self;
        factor
            .fmap(move |r| {
                pat.clone()
                    .fast(Fraction::approximate(r))
                    .unwrap_or_else(|_| crate::silence())
            })
            .inner_join()
    }

    pub fn slow_with(self, factor: Pattern<f64>) -> Pattern<T> {
        self.fast_with(factor.fmap(|r| if r == 0.0 { 0.0 } else { 1.0 / r }))
    }

    /// Shift earlier in time by `amount` cycles.
    pub fn early(self, amount: impl Into<Fraction>) -> Pattern<T> {
        let amount = amount.into();
        self.with_query_time(move |t| t + amount)
            .with_hap_time(move |t| t - amount)
    }

    /// Shift later in time by `amount` cycles.
    pub fn late(self, amount: impl Into<Fraction>) -> Pattern<T> {
        let amount = amount.into();
        self.early(-amount)
    }

    /// Reverse each cycle in place: time runs backwards between cycle
    /// boundaries, endpoints swapping to preserve half-open spans.
    pub fn rev(self) -> Pattern<T> {
        let pat = self.clone();
        Pattern::with_steps(
            move |state: &State| {
                let mut out = Vec::new();
                for piece in state.span.span_cycles() {
                    let mirror = Fraction::from_int(2 * piece.begin.floor_int() + 1);
                    let reflect =
                        move |ts: &TimeSpan| TimeSpan::new(mirror - ts.end, mirror - ts.begin);
                    let inner = state.set_span(reflect(&piece));
                    out.extend(
                        pat.query(&inner)
                            .into_iter()
                            .map(|hap| hap.with_span(reflect)),
                    );
                }
                out
            },
            self.get_steps(),
        )
    }

    /// Treat the window `[begin, end)` of the pattern as one full cycle.
    pub fn zoom(
        self,
        begin: impl Into<Fraction>,
        end: impl Into<Fraction>,
    ) -> Result<Pattern<T>> {
        let begin = begin.into();
        let end = end.into();
        if begin >= end {
            return Err(PatternError::argument(
                "zoom",
                format!("window [{begin}, {end}) is empty or inverted"),
            ));
        }
        let width = end - begin;
        Ok(self
            .with_query_time(move |t| begin + t * width)
            .with_hap_time(move |t| (t - begin) / width))
    }

    /// Stack the pattern with a transformed copy of itself shifted by
    /// `amount` cycles.
    pub fn off<F>(self, amount: impl Into<Fraction>, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        let amount = amount.into();
        let shifted = func(self.clone()).late(amount);
        stack(vec![self, shifted])
    }

    /// Loop the segment of `cycles` cycles starting at `offset`, forever.
    pub fn ribbon(self, offset: impl Into<Fraction>, cycles: i64) -> Result<Pattern<T>> {
        if cycles <= 0 {
            return Err(PatternError::argument(
                "ribbon",
                "loop length must be at least one cycle",
            ));
        }
        let offset = offset.into();
        let pat = self;
        let looped = Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for piece in state.span.span_cycles() {
                let cycle = piece.begin.floor_int();
                let local = cycle.rem_euclid(cycles);
                let delta = offset + Fraction::from_int(local - cycle);
                let inner = state.set_span(piece.shift(delta));
                out.extend(
                    pat.query(&inner)
                        .into_iter()
                        .map(|hap| hap.with_span(|ts| ts.shift(-delta))),
                );
            }
            out
        });
        Ok(looped.split_queries())
    }

    /// Apply `func` only to events whose onset falls inside the cycle
    /// window `[begin, end)`, leaving the rest untouched.
    pub fn within<F>(
        self,
        begin: Fraction,
        end: Fraction,
        func: F,
    ) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        let inside = move |h: &Hap<T>| {
            let pos = h.whole_or_part().begin.fract();
            pos >= begin && pos < end
        };
        let outside = inside.clone();
        let transformed = func(self.clone()).filter_haps(inside);
        let untouched = self.filter_haps(move |h| !outside(h));
        stack(vec![transformed, untouched])
    }

    /// Transform one of `n` equal slices per cycle, a different slice each
    /// cycle: slice 0 first, then wrapping backwards through the slices.
    pub fn chunk<F>(self, n: usize, func: F) -> Result<Pattern<T>>
    where
        F: Fn(Pattern<T>) -> Pattern<T>,
    {
        if n == 0 {
            return Err(PatternError::argument("chunk", "slice count must be positive"));
        }
        let variants: Vec<Pattern<T>> = (0..n)
            .map(|i| {
                let begin = Fraction::new(i as i64, n as i64);
                let end = Fraction::new(i as i64 + 1, n as i64);
                self.clone().within(begin, end, &func)
            })
            .collect();
        let variants = Arc::new(variants);
        let n = n as i64;
        Ok(Pattern::new(move |state: &State| {
            let cycle = state.span.begin.floor_int();
            let index = (n - cycle.rem_euclid(n)) % n;
            variants[index as usize].query(state)
        })
        .split_queries())
    }

    /// Alias for `chunk`.
    pub fn slowchunk<F>(self, n: usize, func: F) -> Result<Pattern<T>>
    where
        F: Fn(Pattern<T>) -> Pattern<T>,
    {
        self.chunk(n, func)
    }

    /// Apply `func` at a finer time scale: speed up by `n`, transform,
    /// slow back down.
    pub fn inside<F>(self, n: impl Into<Fraction>, func: F) -> Result<Pattern<T>>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        let n = n.into();
        if n <= Fraction::from_int(0) {
            return Err(PatternError::argument("inside", "scale must be positive"));
        }
        Ok(func(self.fast_unchecked(n)).fast_unchecked(n.reciprocal()))
    }

    /// The mirror of `inside`: slow down, transform, speed back up.
    pub fn outside<F>(self, n: impl Into<Fraction>, func: F) -> Result<Pattern<T>>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        let n = n.into();
        if n <= Fraction::from_int(0) {
            return Err(PatternError::argument("outside", "scale must be positive"));
        }
        Ok(func(self.fast_unchecked(n.reciprocal())).fast_unchecked(n))
    }

    /// Apply `func` on the last cycle of every group of `n`: cycles where
    /// `cycle mod n == n - 1`.
    pub fn every<F>(self, n: i64, func: F) -> Result<Pattern<T>>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        if n <= 0 {
            return Err(PatternError::argument("every", "period must be positive"));
        }
        let transformed = func(self.clone());
        let plain = self;
        Ok(Pattern::new(move |state: &State| {
            let cycle = state.span.begin.floor_int();
            if cycle.rem_euclid(n) == n - 1 {
                transformed.query(state)
            } else {
                plain.query(state)
            }
        })
        .split_queries())
    }

    /// Rotate the pattern forwards by `1/n` cycle per cycle.
    pub fn iter(self, n: i64) -> Result<Pattern<T>> {
        self.iter_dir(n, false)
    }

    /// Rotate backwards instead.
    pub fn iter_back(self, n: i64) -> Result<Pattern<T>> {
        self.iter_dir(n, true)
    }

    fn iter_dir(self, n: i64, back: bool) -> Result<Pattern<T>> {
        if n <= 0 {
            return Err(PatternError::argument("iter", "step count must be positive"));
        }
        let pat = self;
        Ok(Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for piece in state.span.span_cycles() {
                let cycle = piece.begin.floor_int();
                let mut shift = Fraction::new(cycle.rem_euclid(n), n);
                if back {
                    shift = -shift;
                }
                let inner = state.set_span(piece.shift(shift));
                out.extend(
                    pat.query(&inner)
                        .into_iter()
                        .map(|hap| hap.with_span(|ts| ts.shift(-shift))),
                );
            }
            out
        })
        .split_queries())
    }

    /// Stack the pattern with a transformed copy of itself.
    pub fn superimpose<F>(self, func: F) -> Pattern<T>
    where
        F: FnOnce(Pattern<T>) -> Pattern<T>,
    {
        let transformed = func(self.clone());
        stack(vec![self, transformed])
    }

    /// Stack one transformed copy per function.
    pub fn layer(self, funcs: Vec<Box<dyn Fn(Pattern<T>) -> Pattern<T> + Send + Sync>>) -> Pattern<T> {
        let layers: Vec<Pattern<T>> = funcs.iter().map(|f| f(self.clone())).collect();
        stack(layers)
    }

    /// Rescale so the declared step count becomes `n`.
    pub fn pace(self, n: impl Into<Fraction>) -> Result<Pattern<T>> {
        let n = n.into();
        if n <= Fraction::from_int(0) {
            return Err(PatternError::argument("pace", "step count must be positive"));
        }
        let own = self
            .get_steps()
            .filter(|s| !s.is_zero())
            .unwrap_or(Fraction::from_int(1));
        Ok(self.fast_unchecked(n / own).set_steps(Some(n)))
    }

    /// Discretise into `n` equal onset steps per cycle, sampling the
    /// pattern's value at each step's begin.
    pub fn segment(self, n: i64) -> Result<Pattern<T>> {
        if n <= 0 {
            return Err(PatternError::argument("segment", "step count must be positive"));
        }
        let pat = self;
        Ok(Pattern::with_steps(
            move |state: &State| {
                let mut out = Vec::new();
                for piece in state.span.span_cycles() {
                    let sam = piece.begin.floor();
                    for i in 0..n {
                        let step = TimeSpan::new(
                            sam + Fraction::new(i, n),
                            sam + Fraction::new(i + 1, n),
                        );
                        let Some(visible) = piece.intersection(&step) else {
                            continue;
                        };
                        // Sample over the full step so clipped queries see
                        // the same value as unclipped ones.
                        let sampled = pat.query(&state.set_span(step));
                        if let Some(hap) = sampled.into_iter().next() {
                            out.push(Hap::new(Some(step), visible, hap.value));
                        }
                    }
                }
                out
            },
            Some(Fraction::from_int(n)),
        ))
    }

}

impl Pattern<f64> {
    /// Rescale values from `[0, 1]` to `[min, max]`.
    pub fn range(self, min: f64, max: f64) -> Pattern<f64> {
        self.fmap(move |v| min + v * (max - min))
    }
}

impl Pattern<Value> {
    fn numeric_map<F>(self, op: &'static str, func: F) -> Pattern<Value>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.with_haps(move |haps| {
            haps.into_iter()
                .filter_map(|hap| match hap.value.to_f64() {
                    Ok(v) => Some(Hap::new(hap.whole, hap.part, Value::Number(func(v)))),
                    Err(err) => {
                        tracing::warn!(%err, operator = op, "dropping non-numeric event");
                        None
                    }
                })
                .collect()
        })
    }

    pub fn add(self, amount: f64) -> Pattern<Value> {
        self.numeric_map("add", move |v| v + amount)
    }

    pub fn sub(self, amount: f64) -> Pattern<Value> {
        self.numeric_map("sub", move |v| v - amount)
    }

    pub fn mul(self, amount: f64) -> Pattern<Value> {
        self.numeric_map("mul", move |v| v * amount)
    }

    pub fn div(self, amount: f64) -> Pattern<Value> {
        self.numeric_map("div", move |v| v / amount)
    }

    /// Coerce to a float pattern, dropping (and reporting) events whose
    /// values cannot be read as numbers.
    pub fn numbers(self) -> Pattern<f64> {
        self.with_haps(|haps| {
            haps.into_iter()
                .filter_map(|hap| match hap.value.to_f64() {
                    Ok(v) => Some(Hap::new(hap.whole, hap.part, Value::Number(v))),
                    Err(err) => {
                        tracing::warn!(%err, "dropping non-numeric event");
                        None
                    }
                })
                .collect()
        })
        .fmap(|v| v.as_number().unwrap_or_default())
    }
}

// ----- standalone-function forms -----
//
// The receiver methods above are the implementation path; these adapters
// give the equivalent free-function spelling.

pub fn fast<T: Clone + Send + Sync + 'static>(
    factor: impl Into<Fraction>,
    pattern: Pattern<T>,
) -> Result<Pattern<T>> {
    pattern.fast(factor)
}

pub fn slow<T: Clone + Send + Sync + 'static>(
    factor: impl Into<Fraction>,
    pattern: Pattern<T>,
) -> Result<Pattern<T>> {
    pattern.slow(factor)
}

pub fn rev<T: Clone + Send + Sync + 'static>(pattern: Pattern<T>) -> Pattern<T> {
    pattern.rev()
}

pub fn zoom<T: Clone + Send + Sync + 'static>(
    begin: impl Into<Fraction>,
    end: impl Into<Fraction>,
    pattern: Pattern<T>,
) -> Result<Pattern<T>> {
    pattern.zoom(begin, end)
}

pub fn every<T: Clone + Send + Sync + 'static, F>(
    n: i64,
    func: F,
    pattern: Pattern<T>,
) -> Result<Pattern<T>>
where
    F: FnOnce(Pattern<T>) -> Pattern<T>,
{
    pattern.every(n, func)
}

pub fn iter<T: Clone + Send + Sync + 'static>(n: i64, pattern: Pattern<T>) -> Result<Pattern<T>> {
    pattern.iter(n)
}

pub fn superimpose<T: Clone + Send + Sync + 'static, F>(func: F, pattern: Pattern<T>) -> Pattern<T>
where
    F: FnOnce(Pattern<T>) -> Pattern<T>,
{
    pattern.superimpose(func)
}
