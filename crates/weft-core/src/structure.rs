use crate::error::{PatternError, Result};
use crate::euclid::pulse_positions;
use crate::pattern::{pure, silence, Pattern};
use crate::{fastcat, Fraction, Hap, State, TimeSpan};

/// A one-cycle boolean step grid, the raw material of `struct` and the
/// Euclidean operators.
pub fn boolean_steps(bits: Vec<bool>) -> Pattern<bool> {
    fastcat(bits.into_iter().map(pure).collect())
}

/// Pick the hap carrying the value active at `time`, preferring the one
/// that fired most recently.
fn value_at<T: Clone>(haps: Vec<Hap<T>>, time: Fraction) -> Option<T> {
    haps.into_iter()
        .filter(|h| h.part.contains(time) || h.part.begin == time)
        .max_by(|a, b| a.whole_or_part().begin.cmp(&b.whole_or_part().begin))
        .map(|h| h.value)
}

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Give the pattern the rhythm of `mask`: each truthy mask event
    /// becomes an event carrying the value this pattern holds at the mask
    /// event's onset.
    pub fn struct_with(self, mask: Pattern<bool>) -> Pattern<T> {
        let pat = self;
        Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for m in mask.query(state) {
                if !m.value {
                    continue;
                }
                let Some(whole) = m.whole else {
                    continue;
                };
                let sampled = pat.query(&state.set_span(m.whole_or_part()));
                if let Some(value) = value_at(sampled, whole.begin) {
                    out.push(Hap::new(m.whole, m.part, value));
                }
            }
            out
        })
    }

    /// Like `struct_with`, but keep every source event inside each mask
    /// window, clipped to the window's boundaries.
    pub fn struct_all(self, mask: Pattern<bool>) -> Pattern<T> {
        let pat = self;
        Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for m in mask.query(state) {
                if !m.value {
                    continue;
                }
                let window = m.whole_or_part();
                for h in pat.query(&state.set_span(window)) {
                    let Some(part) = h.part.intersection(&m.part) else {
                        continue;
                    };
                    let whole = match h.whole {
                        Some(w) => w.sect(&window),
                        None => None,
                    };
                    out.push(Hap::new(whole, part, h.value));
                }
            }
            out
        })
    }

    /// Keep events whose span contains an onset of a truthy event in the
    /// gate pattern.
    pub fn mask(self, gate: Pattern<bool>) -> Pattern<T> {
        let pat = self;
        Pattern::new(move |state: &State| {
            pat.query(state)
                .into_iter()
                .filter(|h| {
                    let span = h.whole_or_part();
                    gate.query(&state.set_span(span)).into_iter().any(|g| {
                        g.value
                            && g.whole
                                .map(|w| span.contains(w.begin))
                                .unwrap_or(false)
                    })
                })
                .collect()
        })
    }

    /// Keep events whose span intersects any truthy event in the gate
    /// pattern, onset or not.
    pub fn mask_all(self, gate: Pattern<bool>) -> Pattern<T> {
        let pat = self;
        Pattern::new(move |state: &State| {
            pat.query(state)
                .into_iter()
                .filter(|h| {
                    let span = h.whole_or_part();
                    gate.query(&state.set_span(span))
                        .into_iter()
                        .any(|g| g.value && g.part.overlaps(&span))
                })
                .collect()
        })
    }

    /// Euclidean rhythm: `pulse` onsets distributed over `step` slots.
    pub fn euclid(self, pulse: i64, step: i64) -> Result<Pattern<T>> {
        self.euclid_rot(pulse, step, 0)
    }

    /// Alias for `euclid`.
    pub fn bjork(self, pulse: i64, step: i64) -> Result<Pattern<T>> {
        self.euclid_rot(pulse, step, 0)
    }

    /// Euclidean rhythm rotated left by `rotation` slots.
    pub fn euclid_rot(self, pulse: i64, step: i64, rotation: i64) -> Result<Pattern<T>> {
        let (pulse, step, rotation) = check_euclid("euclid", pulse, step, rotation)?;
        if pulse == 0 {
            return Ok(silence());
        }
        let bits = crate::euclid::bjorklund(pulse, step, rotation);
        Ok(self.struct_with(boolean_steps(bits)))
    }

    /// Euclidean rhythm where every pulse sustains until the next one.
    pub fn euclid_legato(self, pulse: i64, step: i64) -> Result<Pattern<T>> {
        self.euclid_legato_rot(pulse, step, 0)
    }

    /// `euclid_legato` with rotation. A sustained tail that crosses the
    /// cycle boundary wraps, appearing as an onset-less fragment at the
    /// start of the next cycle.
    pub fn euclid_legato_rot(self, pulse: i64, step: i64, rotation: i64) -> Result<Pattern<T>> {
        let (pulse, step, rotation) = check_euclid("euclid_legato", pulse, step, rotation)?;
        if pulse == 0 {
            return Ok(silence());
        }
        let positions: Vec<Fraction> = pulse_positions(pulse, step, rotation)
            .into_iter()
            .map(|i| Fraction::new(i as i64, step as i64))
            .collect();
        let pat = self;
        Ok(Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for piece in state.span.span_cycles() {
                let sam = piece.begin.floor();
                let count = positions.len();
                for (i, pos) in positions.iter().enumerate() {
                    let begin = sam + *pos;
                    let end = if i + 1 < count {
                        sam + positions[i + 1]
                    } else {
                        sam + Fraction::from_int(1) + positions[0]
                    };
                    let whole = TimeSpan::new(begin, end);
                    push_sustained(&pat, state, &piece, whole, &mut out);
                }
                // Tail of the previous cycle's last pulse, if it wraps.
                if positions[0] > Fraction::from_int(0) {
                    let last = positions[count - 1];
                    let begin = sam - Fraction::from_int(1) + last;
                    let end = sam + positions[0];
                    let whole = TimeSpan::new(begin, end);
                    push_sustained(&pat, state, &piece, whole, &mut out);
                }
            }
            out
        })
        .split_queries())
    }

    /// Interpolate between the Euclidean distribution (`bend = 0`) and
    /// `pulse` evenly spaced onsets (`bend = 1`). The bend amount is
    /// itself a pattern, sampled once per cycle.
    pub fn euclidish(self, pulse: i64, step: i64, bend: Pattern<f64>) -> Result<Pattern<T>> {
        let (pulse, step, _) = check_euclid("euclidish", pulse, step, 0)?;
        if pulse == 0 {
            return Ok(silence());
        }
        let grid: Vec<Fraction> = pulse_positions(pulse, step, 0)
            .into_iter()
            .map(|i| Fraction::new(i as i64, step as i64))
            .collect();
        let pat = self;
        Ok(Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for piece in state.span.span_cycles() {
                let sam = piece.begin.floor();
                let cycle_span = TimeSpan::new(sam, sam + Fraction::from_int(1));
                let sampled = bend.query(&state.set_span(cycle_span));
                let amount = sampled
                    .first()
                    .map(|h| h.value.clamp(0.0, 1.0))
                    .unwrap_or(0.0);
                let g = Fraction::approximate(amount);
                let one = Fraction::from_int(1);
                let width = (one - g) / Fraction::from_int(step as i64)
                    + g / Fraction::from_int(pulse as i64);
                for (i, b) in grid.iter().enumerate() {
                    let even = Fraction::new(i as i64, pulse as i64);
                    let begin = sam + (one - g) * *b + g * even;
                    let whole = TimeSpan::new(begin, begin + width);
                    push_sustained(&pat, state, &piece, whole, &mut out);
                }
            }
            out
        })
        .split_queries())
    }
}

/// Emit the fragment of a synthetic event visible in `piece`, carrying the
/// source pattern's value at the event's onset.
fn push_sustained<T: Clone + Send + Sync + 'static>(
    pat: &Pattern<T>,
    state: &State,
    piece: &TimeSpan,
    whole: TimeSpan,
    out: &mut Vec<Hap<T>>,
) {
    let Some(part) = whole.intersection(piece) else {
        return;
    };
    let sampled = pat.query(&state.set_span(whole));
    if let Some(value) = value_at(sampled, whole.begin) {
        out.push(Hap::new(Some(whole), part, value));
    }
}

fn check_euclid(
    operator: &'static str,
    pulse: i64,
    step: i64,
    rotation: i64,
) -> Result<(usize, usize, usize)> {
    if step <= 0 {
        return Err(PatternError::argument(operator, "step count must be positive"));
    }
    let pulse = pulse.clamp(0, step);
    let rotation = rotation.rem_euclid(step);
    Ok((pulse as usize, step as usize, rotation as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn note_a() -> Pattern<Value> {
        pure(Value::from("a"))
    }

    #[test]
    fn euclid_three_five() {
        let p = note_a().euclid(3, 5).unwrap();
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 3);
        let expected = [
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 5)),
            TimeSpan::new(Fraction::new(2, 5), Fraction::new(3, 5)),
            TimeSpan::new(Fraction::new(4, 5), Fraction::from_int(1)),
        ];
        for (hap, want) in haps.iter().zip(expected) {
            assert_eq!(hap.part, want);
            assert_eq!(hap.whole.unwrap(), want);
            assert!(hap.has_onset());
            assert_eq!(hap.value, Value::from("a"));
        }
    }

    #[test]
    fn euclid_clamps_and_silences() {
        let p = note_a().euclid(9, 4).unwrap();
        assert_eq!(p.first_cycle().len(), 4);

        let p = note_a().euclid(0, 4).unwrap();
        assert!(p.first_cycle().is_empty());
        let p = note_a().euclid(-2, 4).unwrap();
        assert!(p.first_cycle().is_empty());
    }

    #[test]
    fn euclid_rejects_bad_step_count() {
        assert!(matches!(
            note_a().euclid(3, 0),
            Err(PatternError::Argument { .. })
        ));
    }

    #[test]
    fn struct_takes_values_from_the_source() {
        let values = fastcat(vec![pure(Value::from("a")), pure(Value::from("b"))]);
        let mask = boolean_steps(vec![true, false, true, true]);
        let p = values.struct_with(mask);
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 3);
        assert_eq!(haps[0].value, Value::from("a"));
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::from_int(0), Fraction::new(1, 4))
        );
        assert_eq!(haps[1].value, Value::from("b"));
        assert_eq!(haps[2].value, Value::from("b"));
    }

    #[test]
    fn struct_all_keeps_clipped_source_events() {
        let values = fastcat(vec![
            pure(Value::from("a")),
            pure(Value::from("b")),
            pure(Value::from("c")),
            pure(Value::from("d")),
        ]);
        // One truthy window covering the middle half.
        let mask = fastcat(vec![pure(false), pure(true), pure(false)]);
        let p = values.struct_all(mask);
        let haps = p.first_cycle();
        // Window [1/3, 2/3) catches "b" (clipped) and "c" (clipped).
        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].value, Value::from("b"));
        assert_eq!(haps[0].part.begin, Fraction::new(1, 3));
        assert_eq!(haps[1].value, Value::from("c"));
        assert_eq!(haps[1].part.end, Fraction::new(2, 3));
    }

    #[test]
    fn mask_keeps_events_over_gate_onsets() {
        let values = fastcat(vec![
            pure(Value::from("a")),
            pure(Value::from("b")),
            pure(Value::from("c")),
            pure(Value::from("d")),
        ]);
        let gate = boolean_steps(vec![true, false]);
        let p = values.mask(gate);
        let haps = p.first_cycle();
        // Gate onset at 0 falls inside "a" only; "b" spans [1/4, 1/2)
        // which contains no gate onset.
        assert_eq!(haps.len(), 1);
        assert_eq!(haps[0].value, Value::from("a"));
    }

    #[test]
    fn mask_all_keeps_any_overlap() {
        let values = fastcat(vec![
            pure(Value::from("a")),
            pure(Value::from("b")),
            pure(Value::from("c")),
            pure(Value::from("d")),
        ]);
        let gate = boolean_steps(vec![true, false]);
        let p = values.mask_all(gate);
        let haps = p.first_cycle();
        // The truthy half [0, 1/2) overlaps "a" and "b".
        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].value, Value::from("a"));
        assert_eq!(haps[1].value, Value::from("b"));
    }

    #[test]
    fn euclid_legato_sustains_between_pulses() {
        let p = note_a().euclid_legato(3, 8).unwrap();
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 3);
        // Pulses at 0, 3, 6 of 8: sustains 3/8, 3/8, 2/8.
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::from_int(0), Fraction::new(3, 8))
        );
        assert_eq!(
            haps[1].whole.unwrap(),
            TimeSpan::new(Fraction::new(3, 8), Fraction::new(6, 8))
        );
        assert_eq!(
            haps[2].whole.unwrap(),
            TimeSpan::new(Fraction::new(6, 8), Fraction::from_int(1))
        );
        assert!(haps.iter().all(|h| h.has_onset()));
    }

    #[test]
    fn euclid_legato_rot_wraps_the_tail() {
        let p = note_a().euclid_legato_rot(3, 8, 1).unwrap();
        let haps = p.first_cycle();
        // Pulses at 2, 5, 7 of 8; the pulse at 7/8 sustains into the next
        // cycle, and the previous cycle's tail shows up at the start.
        assert_eq!(haps.len(), 4);
        let head = &haps[0];
        assert_eq!(head.part, TimeSpan::new(Fraction::from_int(0), Fraction::new(2, 8)));
        assert_eq!(
            head.whole.unwrap(),
            TimeSpan::new(Fraction::new(-1, 8), Fraction::new(2, 8))
        );
        assert!(!head.has_onset());

        let last = &haps[3];
        assert_eq!(last.part, TimeSpan::new(Fraction::new(7, 8), Fraction::from_int(1)));
        assert_eq!(
            last.whole.unwrap(),
            TimeSpan::new(Fraction::new(7, 8), Fraction::new(10, 8))
        );
        assert!(last.has_onset());
    }

    #[test]
    fn euclidish_interpolates_towards_even_spacing() {
        // bend = 0 is plain euclid.
        let even0 = note_a().euclidish(3, 8, crate::pattern::pure(0.0)).unwrap();
        let haps = even0.first_cycle();
        let begins: Vec<Fraction> = haps.iter().map(|h| h.whole.unwrap().begin).collect();
        assert_eq!(
            begins,
            vec![
                Fraction::from_int(0),
                Fraction::new(3, 8),
                Fraction::new(6, 8)
            ]
        );

        // bend = 1 is even spacing at thirds.
        let even1 = note_a().euclidish(3, 8, crate::pattern::pure(1.0)).unwrap();
        let haps = even1.first_cycle();
        let begins: Vec<Fraction> = haps.iter().map(|h| h.whole.unwrap().begin).collect();
        assert_eq!(
            begins,
            vec![
                Fraction::from_int(0),
                Fraction::new(1, 3),
                Fraction::new(2, 3)
            ]
        );

        // Halfway sits between the two grids.
        let half = note_a().euclidish(3, 8, crate::pattern::pure(0.5)).unwrap();
        let haps = half.first_cycle();
        let second = haps[1].whole.unwrap().begin;
        assert_eq!(second, Fraction::new(17, 48));
    }
}
