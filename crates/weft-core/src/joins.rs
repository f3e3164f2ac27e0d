use crate::pattern::{silence, Pattern};
use crate::{Hap, State, Value};

/// How a pattern of patterns collapses back into a flat pattern.
///
/// The variants differ only in how an outer event's `whole`/`part` combine
/// with those of the inner events found inside it.
impl<T: Clone + Send + Sync + 'static> Pattern<Pattern<T>> {
    /// Structure from the inner patterns: each outer event opens a window
    /// in which its inner pattern is queried, and inner events are clipped
    /// to that window.
    pub fn inner_join(self) -> Pattern<T> {
        let outer = self;
        Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for o in outer.query(state) {
                let inner_state = state.set_span(o.part);
                for i in o.value.query(&inner_state) {
                    let Some(part) = i.part.intersection(&o.part) else {
                        continue;
                    };
                    let whole = i.whole.and_then(|w| w.sect(&o.part));
                    out.push(Hap::new(whole, part, i.value));
                }
            }
            out
        })
    }

    /// Structure from the outer pattern: each outer event emits exactly
    /// one event, keeping the outer's part and whole verbatim and taking
    /// its value from whatever the inner pattern holds at the outer
    /// onset.
    pub fn outer_join(self) -> Pattern<T> {
        let outer = self;
        Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for o in outer.query(state) {
                let onset = o.whole_or_part().begin;
                let window = o.whole_or_part();
                let chosen = o
                    .value
                    .query(&state.set_span(window))
                    .into_iter()
                    .find(|i| i.part.contains(onset) || i.part.begin == onset);
                let Some(inner) = chosen else {
                    continue;
                };
                out.push(Hap::new(o.whole, o.part, inner.value));
            }
            out
        })
    }
}

/// The mixing join: outer events carry their own payload alongside the
/// inner pattern, and both sides keep a say. Parts and wholes intersect,
/// and the emitted value combines the outer payload with each inner one.
impl<T: Clone + Send + Sync + 'static> Pattern<(T, Pattern<T>)> {
    pub fn mix_join<F>(self, merge: F) -> Pattern<T>
    where
        F: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        let outer = self;
        Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for o in outer.query(state) {
                let (outer_value, inner_pattern) = &o.value;
                let inner_state = state.set_span(o.part);
                for i in inner_pattern.query(&inner_state) {
                    let Some(part) = i.part.intersection(&o.part) else {
                        continue;
                    };
                    let whole = match (o.whole, i.whole) {
                        (Some(a), Some(b)) => a.sect(&b),
                        _ => None,
                    };
                    out.push(Hap::new(whole, part, merge(outer_value, &i.value)));
                }
            }
            out
        })
    }
}

fn pick<T: Clone + Send + Sync + 'static>(
    selector: Pattern<Value>,
    choices: Vec<Pattern<T>>,
) -> Pattern<Pattern<T>> {
    let n = choices.len() as i64;
    Pattern::new(move |state: &State| {
        selector
            .query(state)
            .into_iter()
            .filter_map(|hap| match hap.value.to_int() {
                Ok(i) => {
                    let index = i.rem_euclid(n) as usize;
                    Some(Hap::new(hap.whole, hap.part, choices[index].clone()))
                }
                Err(err) => {
                    tracing::warn!(%err, "dropping non-numeric selector event");
                    None
                }
            })
            .collect()
    })
}

/// Select among `choices` by the selector's value modulo the number of
/// choices, with inner-join structure.
pub fn pickmod<T: Clone + Send + Sync + 'static>(
    selector: Pattern<Value>,
    choices: Vec<Pattern<T>>,
) -> Pattern<T> {
    if choices.is_empty() {
        return silence();
    }
    pick(selector, choices).inner_join()
}

/// As `pickmod`, but the selector drives the structure: one onset per
/// selector step.
pub fn pickmod_out<T: Clone + Send + Sync + 'static>(
    selector: Pattern<Value>,
    choices: Vec<Pattern<T>>,
) -> Pattern<T> {
    if choices.is_empty() {
        return silence();
    }
    pick(selector, choices).outer_join()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::pure;
    use crate::{fastcat, Fraction, TimeSpan};

    fn pair(a: &str, b: &str) -> Pattern<Value> {
        fastcat(vec![pure(Value::from(a)), pure(Value::from(b))])
    }

    fn selector(vals: &[i64]) -> Pattern<Value> {
        fastcat(vals.iter().map(|&v| pure(Value::from(v))).collect())
    }

    #[test]
    fn inner_join_takes_structure_from_inside() {
        let outer = pure(pair("a", "b"));
        let joined = outer.inner_join();
        let haps = joined.first_cycle();
        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].value, Value::from("a"));
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 2))
        );
        assert_eq!(haps[1].value, Value::from("b"));
    }

    #[test]
    fn pickmod_wraps_the_index() {
        let p = pickmod(
            selector(&[0, 1, 2]),
            vec![pair("a", "b"), pair("c", "d")],
        );
        let haps = p.first_cycle();
        // Selector step 2 wraps to choice 0.
        let values: Vec<String> = haps.iter().map(|h| h.value.to_string()).collect();
        assert!(values.contains(&"a".to_string()));
    }

    #[test]
    fn pickmod_out_emits_one_onset_per_selector_step() {
        let p = pickmod_out(
            selector(&[0, 1, 2]),
            vec![pair("bd", "hh"), pair("sd", "oh")],
        );
        let mut haps = p.first_cycle();
        haps.retain(|h| h.has_onset());
        assert_eq!(haps.len(), 3);

        assert_eq!(haps[0].value, Value::from("bd"));
        assert_eq!(
            haps[0].part,
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 3))
        );
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 3))
        );

        assert_eq!(haps[1].value, Value::from("sd"));
        assert_eq!(
            haps[1].part,
            TimeSpan::new(Fraction::new(1, 3), Fraction::new(2, 3))
        );
        assert_eq!(
            haps[1].whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 3), Fraction::new(2, 3))
        );

        assert_eq!(haps[2].value, Value::from("hh"));
        assert_eq!(
            haps[2].part,
            TimeSpan::new(Fraction::new(2, 3), Fraction::from_int(1))
        );
        assert_eq!(
            haps[2].whole.unwrap(),
            TimeSpan::new(Fraction::new(2, 3), Fraction::from_int(1))
        );
    }

    #[test]
    fn outer_join_keeps_the_outer_part_and_whole() {
        let outer = pure(pair("x", "y"));
        let joined = outer.outer_join();
        let haps = joined.first_cycle();
        assert_eq!(haps.len(), 1);
        // The value is read at the outer onset; the timing is the
        // outer event's, untouched.
        assert_eq!(haps[0].value, Value::from("x"));
        assert_eq!(haps[0].whole.unwrap(), TimeSpan::from_ints(0, 1));
        assert_eq!(haps[0].part, TimeSpan::from_ints(0, 1));
    }

    #[test]
    fn mix_join_merges_outer_and_inner_values() {
        // Each outer half-cycle window carries its own tag plus a
        // whole-cycle inner event; the joined whole is the intersection
        // and the value combines both sides.
        let outer = fastcat(vec![
            pure((Value::from("L"), pure(Value::from("a")))),
            pure((Value::from("R"), pure(Value::from("b")))),
        ]);
        let haps = outer
            .mix_join(|o, i| Value::String(format!("{o}{i}")))
            .first_cycle();
        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].value, Value::from("La"));
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 2))
        );
        assert_eq!(haps[1].value, Value::from("Rb"));
        assert_eq!(
            haps[1].whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 2), Fraction::from_int(1))
        );
    }
}
