use crate::error::{PatternError, Result};
use crate::pattern::{silence, Pattern};
use crate::{Fraction, State, TimeSpan};
use std::sync::Arc;

fn lcm_fraction(a: Fraction, b: Fraction) -> Fraction {
    Fraction::new(
        Fraction::lcm(a.numerator(), b.numerator()),
        Fraction::gcd(a.denominator(), b.denominator()),
    )
}

fn combined_steps<T: Clone + Send + Sync + 'static>(patterns: &[Pattern<T>]) -> Option<Fraction> {
    patterns
        .iter()
        .filter_map(|p| p.get_steps())
        .filter(|s| !s.is_zero())
        .reduce(lcm_fraction)
}

/// Concatenate patterns, one per cycle: cycle `k` plays `patterns[k mod n]`.
///
/// Each pattern keeps its own notion of progress: the query is shifted so
/// that pattern `i` sees its local cycle `floor(k / n)`, which keeps nested
/// alternations honest.
pub fn slowcat<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    if patterns.is_empty() {
        return silence();
    }
    if patterns.len() == 1 {
        return patterns.into_iter().next().unwrap();
    }

    let n = patterns.len() as i64;
    let patterns = Arc::new(patterns);
    let steps = combined_steps(&patterns);

    Pattern::with_steps(
        move |state: &State| {
            let cycle = state.span.begin.floor_int();
            let index = cycle.rem_euclid(n) as usize;
            let pat = &patterns[index];

            // Local time for the chosen pattern: global cycle k maps to
            // its cycle floor(k / n).
            let offset = Fraction::from_int(cycle - cycle.div_euclid(n));
            let shifted = state.set_span(state.span.shift(-offset));
            pat.query(&shifted)
                .into_iter()
                .map(|hap| hap.with_span(|ts| ts.shift(offset)))
                .collect()
        },
        steps,
    )
    .split_queries()
}

/// Alias for `slowcat`.
pub fn cat<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    slowcat(patterns)
}

/// Concatenate patterns, cramming all of them into a single cycle.
pub fn fastcat<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    if patterns.is_empty() {
        return silence();
    }
    let n = patterns.len() as i64;
    let factor = Fraction::from_int(n);
    slowcat(patterns)
        .with_query_time(move |t| t * factor)
        .with_hap_time(move |t| t / factor)
        .set_steps(Some(Fraction::from_int(n)))
}

/// Alias for `fastcat`.
pub fn sequence<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    fastcat(patterns)
}

/// Squeeze a pattern's cycle into the window `[begin, end)` of every
/// cycle, silent elsewhere. The workhorse behind weighted steps and
/// duration-aligned stacking.
pub fn compress<T: Clone + Send + Sync + 'static>(
    begin: Fraction,
    end: Fraction,
    pattern: Pattern<T>,
) -> Result<Pattern<T>> {
    if begin < Fraction::from_int(0)
        || end > Fraction::from_int(1)
        || begin >= end
    {
        return Err(PatternError::argument(
            "compress",
            format!("window [{begin}, {end}) must lie inside one cycle"),
        ));
    }
    let width = end - begin;
    Ok(Pattern::new(move |state: &State| {
        let mut out = Vec::new();
        for piece in state.span.span_cycles() {
            let sam = piece.begin.floor();
            let window = TimeSpan::new(sam + begin, sam + end);
            let Some(visible) = piece.intersection(&window) else {
                continue;
            };
            // Stretch the window onto the pattern's full cycle.
            let to_inner = |t: Fraction| sam + (t - window.begin) / width;
            let to_outer = |t: Fraction| window.begin + (t - sam) * width;
            let inner_span = visible.with_time(to_inner);
            let inner_state = state.set_span(inner_span);
            out.extend(
                pattern
                    .query(&inner_state)
                    .into_iter()
                    .map(|hap| hap.with_span(|ts| ts.with_time(to_outer))),
            );
        }
        out
    }))
}

/// Weighted concatenation: each pattern occupies a share of the cycle
/// proportional to its weight. `fastcat` is the all-weights-equal case.
pub fn timecat<T: Clone + Send + Sync + 'static>(
    weighted: Vec<(Fraction, Pattern<T>)>,
) -> Pattern<T> {
    let weighted: Vec<(Fraction, Pattern<T>)> = weighted
        .into_iter()
        .filter(|(w, _)| *w > Fraction::from_int(0))
        .collect();
    let total: Fraction = weighted
        .iter()
        .map(|(w, _)| *w)
        .fold(Fraction::from_int(0), |acc, w| acc + w);
    if weighted.is_empty() {
        return silence();
    }
    let mut slices = Vec::with_capacity(weighted.len());
    let mut acc = Fraction::from_int(0);
    for (weight, pat) in weighted {
        let begin = acc / total;
        acc = acc + weight;
        let end = acc / total;
        // Window bounds are in [0, 1] by construction.
        if let Ok(slice) = compress(begin, end, pat) {
            slices.push(slice);
        }
    }
    stack(slices).set_steps(Some(total))
}

/// Layer patterns: all play at once, events concatenated per query.
pub fn stack<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    if patterns.is_empty() {
        return silence();
    }
    if patterns.len() == 1 {
        return patterns.into_iter().next().unwrap();
    }
    let steps = combined_steps(&patterns);
    let patterns = Arc::new(patterns);
    Pattern::with_steps(
        move |state: &State| patterns.iter().flat_map(|p| p.query(state)).collect(),
        steps,
    )
}

/// Stack of exactly two, receiver style.
pub fn overlay<T: Clone + Send + Sync + 'static>(a: Pattern<T>, b: Pattern<T>) -> Pattern<T> {
    stack(vec![a, b])
}

/// All patterns occupy the full cycle regardless of declared steps.
pub fn polyrhythm<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    stack(patterns)
}

/// Align patterns by the least common multiple of their declared step
/// counts: a pattern with `s` steps is sped up by `lcm / s`, so all step
/// grids meet at the cycle boundary.
pub fn polymeter<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    if patterns.is_empty() {
        return silence();
    }
    let steps: Vec<Fraction> = patterns
        .iter()
        .map(|p| {
            p.get_steps()
                .filter(|s| !s.is_zero())
                .unwrap_or(Fraction::from_int(1))
        })
        .collect();
    let total = steps
        .iter()
        .copied()
        .reduce(lcm_fraction)
        .unwrap_or(Fraction::from_int(1));

    let adjusted: Vec<Pattern<T>> = patterns
        .into_iter()
        .zip(steps)
        .map(|(pat, s)| pat.fast_unchecked(total / s))
        .collect();
    stack(adjusted).set_steps(Some(total))
}

/// Play a pattern as though it had `steps` steps per cycle.
pub fn polymeter_steps<T: Clone + Send + Sync + 'static>(
    steps: Fraction,
    pattern: Pattern<T>,
) -> Result<Pattern<T>> {
    if steps <= Fraction::from_int(0) {
        return Err(PatternError::argument(
            "polymeter_steps",
            "step count must be positive",
        ));
    }
    let own = pattern
        .get_steps()
        .filter(|s| !s.is_zero())
        .unwrap_or(Fraction::from_int(1));
    Ok(pattern.fast_unchecked(steps / own).set_steps(Some(steps)))
}

/// Play each pattern for its given number of cycles, in order, looping
/// the whole arrangement.
pub fn arrange<T: Clone + Send + Sync + 'static>(
    sections: Vec<(i64, Pattern<T>)>,
) -> Pattern<T> {
    let sections: Vec<(i64, Pattern<T>)> =
        sections.into_iter().filter(|(n, _)| *n > 0).collect();
    let total: i64 = sections.iter().map(|(n, _)| n).sum();
    if total == 0 {
        return silence();
    }
    let sections = Arc::new(sections);
    Pattern::new(move |state: &State| {
        let cycle = state.span.begin.floor_int();
        let slot = cycle.rem_euclid(total);
        let mut start = 0i64;
        for (len, pat) in sections.iter() {
            if slot < start + len {
                let local = slot - start;
                // The section progresses through its own cycles while
                // active: global cycle maps to local cycle `local`.
                let offset = Fraction::from_int(cycle - local);
                let shifted = state.set_span(state.span.shift(-offset));
                return pat
                    .query(&shifted)
                    .into_iter()
                    .map(|hap| hap.with_span(|ts| ts.shift(offset)))
                    .collect();
            }
            start += len;
        }
        Vec::new()
    })
    .split_queries()
}

/// Stack patterns of different declared lengths, aligning the shorter
/// ones inside the longest according to `bias`: 0 flush left, 1 flush
/// right, 1/2 centred.
pub fn stack_by<T: Clone + Send + Sync + 'static>(
    bias: Fraction,
    patterns: Vec<Pattern<T>>,
) -> Pattern<T> {
    if patterns.is_empty() {
        return silence();
    }
    let lengths: Vec<Fraction> = patterns
        .iter()
        .map(|p| {
            p.get_steps()
                .filter(|s| !s.is_zero())
                .unwrap_or(Fraction::from_int(1))
        })
        .collect();
    let longest = lengths
        .iter()
        .copied()
        .reduce(Fraction::max)
        .unwrap_or(Fraction::from_int(1));

    let aligned: Vec<Pattern<T>> = patterns
        .into_iter()
        .zip(lengths)
        .map(|(pat, len)| {
            let share = len / longest;
            if share == Fraction::from_int(1) {
                return pat;
            }
            let begin = bias * (Fraction::from_int(1) - share);
            let end = begin + share;
            compress(begin, end, pat).unwrap_or_else(|_| silence())
        })
        .collect();
    stack(aligned).set_steps(Some(longest))
}

pub fn stack_left<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    stack_by(Fraction::from_int(0), patterns)
}

pub fn stack_centre<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    stack_by(Fraction::new(1, 2), patterns)
}

pub fn stack_right<T: Clone + Send + Sync + 'static>(patterns: Vec<Pattern<T>>) -> Pattern<T> {
    stack_by(Fraction::from_int(1), patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::pure;
    use crate::{Hap, Value};

    fn strings(haps: &[Hap<Value>]) -> Vec<String> {
        haps.iter().map(|h| h.value.to_string()).collect()
    }

    #[test]
    fn fastcat_divides_the_cycle() {
        let p = fastcat(vec![
            pure(Value::from("a")),
            pure(Value::from("b")),
            pure(Value::from("c")),
        ]);
        let haps = p.first_cycle();
        assert_eq!(strings(&haps), vec!["a", "b", "c"]);
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 3))
        );
        assert_eq!(
            haps[1].whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 3), Fraction::new(2, 3))
        );
        assert_eq!(
            haps[2].whole.unwrap(),
            TimeSpan::new(Fraction::new(2, 3), Fraction::from_int(1))
        );
        assert!(haps.iter().all(|h| h.has_onset()));
    }

    #[test]
    fn slowcat_alternates_per_cycle() {
        let p = slowcat(vec![pure(Value::from("a")), pure(Value::from("b"))]);
        assert_eq!(strings(&p.query_span(TimeSpan::from_ints(0, 1))), vec!["a"]);
        assert_eq!(strings(&p.query_span(TimeSpan::from_ints(1, 2))), vec!["b"]);
        assert_eq!(strings(&p.query_span(TimeSpan::from_ints(2, 3))), vec!["a"]);
        // Negative cycles wrap the same way.
        assert_eq!(
            strings(&p.query_span(TimeSpan::from_ints(-1, 0))),
            vec!["b"]
        );
    }

    #[test]
    fn slowcat_keeps_local_progress() {
        // Inner slowcat advances once per outer appearance, not once per
        // global cycle: a b a b over <a b> alone, but nested it interleaves.
        let inner = slowcat(vec![pure(Value::from("x")), pure(Value::from("y"))]);
        let p = slowcat(vec![inner, pure(Value::from("z"))]);
        let values: Vec<String> = (0..6)
            .flat_map(|k| strings(&p.query_span(TimeSpan::from_ints(k, k + 1))))
            .collect();
        assert_eq!(values, vec!["x", "z", "y", "z", "x", "z"]);
    }

    #[test]
    fn stack_plays_everything() {
        let p = stack(vec![pure(Value::from("a")), pure(Value::from("b"))]);
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 2);
        assert!(haps.iter().all(|h| h.whole.unwrap() == TimeSpan::from_ints(0, 1)));
    }

    #[test]
    fn stack_with_silence_is_identity() {
        let p = stack(vec![
            fastcat(vec![pure(Value::from("a")), pure(Value::from("b"))]),
            silence(),
        ]);
        assert_eq!(strings(&p.first_cycle()), vec!["a", "b"]);
    }

    #[test]
    fn timecat_respects_weights() {
        // Weights 3 and 1: first pattern gets three quarters of the cycle.
        let p = timecat(vec![
            (Fraction::from_int(3), pure(Value::from("a"))),
            (Fraction::from_int(1), pure(Value::from("b"))),
        ]);
        let haps = p.first_cycle();
        assert_eq!(strings(&haps), vec!["a", "b"]);
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::from_int(0), Fraction::new(3, 4))
        );
        assert_eq!(
            haps[1].whole.unwrap(),
            TimeSpan::new(Fraction::new(3, 4), Fraction::from_int(1))
        );
    }

    #[test]
    fn polymeter_aligns_by_lcm() {
        let p2 = fastcat(vec![pure(Value::from("a")), pure(Value::from("b"))]);
        let p3 = fastcat(vec![
            pure(Value::from("c")),
            pure(Value::from("d")),
            pure(Value::from("e")),
        ]);
        let p = polymeter(vec![p2, p3]);
        let haps = p.first_cycle();
        // lcm(2, 3) = 6: the two-step pattern plays three times, the
        // three-step pattern twice.
        assert_eq!(haps.len(), 12);
        assert_eq!(p.get_steps(), Some(Fraction::from_int(6)));
    }

    #[test]
    fn arrange_sections_loop() {
        let p = arrange(vec![
            (2, pure(Value::from("a"))),
            (1, pure(Value::from("b"))),
        ]);
        let values: Vec<String> = (0..6)
            .flat_map(|k| strings(&p.query_span(TimeSpan::from_ints(k, k + 1))))
            .collect();
        assert_eq!(values, vec!["a", "a", "b", "a", "a", "b"]);
    }

    #[test]
    fn arrange_sections_progress_internally() {
        let ab = slowcat(vec![pure(Value::from("a")), pure(Value::from("b"))]);
        let p = arrange(vec![(2, ab), (1, pure(Value::from("z")))]);
        let values: Vec<String> = (0..3)
            .flat_map(|k| strings(&p.query_span(TimeSpan::from_ints(k, k + 1))))
            .collect();
        assert_eq!(values, vec!["a", "b", "z"]);
    }

    #[test]
    fn stack_by_aligns_shorter_patterns() {
        let two = fastcat(vec![pure(Value::from("a")), pure(Value::from("b"))]);
        let four = fastcat(vec![
            pure(Value::from("w")),
            pure(Value::from("x")),
            pure(Value::from("y")),
            pure(Value::from("z")),
        ]);

        let left = stack_left(vec![two.clone(), four.clone()]);
        let haps = left.first_cycle();
        let a = haps.iter().find(|h| h.value == Value::from("a")).unwrap();
        assert_eq!(
            a.whole.unwrap(),
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 4))
        );

        let right = stack_right(vec![two.clone(), four.clone()]);
        let haps = right.first_cycle();
        let a = haps.iter().find(|h| h.value == Value::from("a")).unwrap();
        assert_eq!(
            a.whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 2), Fraction::new(3, 4))
        );

        let centre = stack_centre(vec![two, four]);
        let haps = centre.first_cycle();
        let a = haps.iter().find(|h| h.value == Value::from("a")).unwrap();
        assert_eq!(
            a.whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 4), Fraction::new(1, 2))
        );
    }

    #[test]
    fn compress_confines_events_to_window() {
        let p = compress(
            Fraction::new(1, 4),
            Fraction::new(3, 4),
            fastcat(vec![pure(Value::from("a")), pure(Value::from("b"))]),
        )
        .unwrap();
        let haps = p.first_cycle();
        assert_eq!(strings(&haps), vec!["a", "b"]);
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 4), Fraction::new(1, 2))
        );
        assert_eq!(
            haps[1].whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 2), Fraction::new(3, 4))
        );
    }

    #[test]
    fn compress_rejects_bad_window() {
        let r = compress(
            Fraction::new(1, 2),
            Fraction::new(1, 4),
            pure(Value::from("a")),
        );
        assert!(matches!(r, Err(PatternError::Argument { .. })));
    }
}
