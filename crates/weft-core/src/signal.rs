//! Continuous unipolar signals, all ranging over `[0, 1]`.
//!
//! A signal has no onsets of its own; it is sampled at each query
//! segment's begin and discretised downstream with `segment(n)` or by a
//! control application.

use crate::pattern::{signal, Pattern};
use crate::Fraction;
use std::f64::consts::TAU;

/// A sine wave, one period per cycle.
pub fn sine() -> Pattern<f64> {
    signal(|t: Fraction| 0.5 + 0.5 * (TAU * t.to_float()).sin())
}

/// A rising sawtooth, resetting at each cycle boundary.
pub fn saw() -> Pattern<f64> {
    signal(|t: Fraction| t.fract().to_float())
}

/// A triangle: up over the first half cycle, down over the second.
pub fn tri() -> Pattern<f64> {
    signal(|t: Fraction| {
        let pos = t.fract().to_float();
        if pos < 0.5 {
            pos * 2.0
        } else {
            2.0 - pos * 2.0
        }
    })
}

/// A square wave: low for the first half cycle, high for the second.
pub fn square() -> Pattern<f64> {
    signal(|t: Fraction| if t.fract() < Fraction::new(1, 2) { 0.0 } else { 1.0 })
}

/// An inverted sawtooth.
pub fn isaw() -> Pattern<f64> {
    signal(|t: Fraction| 1.0 - t.fract().to_float())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled(p: Pattern<f64>, n: i64) -> Vec<f64> {
        p.segment(n)
            .unwrap()
            .first_cycle()
            .into_iter()
            .map(|h| h.value)
            .collect()
    }

    #[test]
    fn sine_starts_at_the_midpoint() {
        let vals = sampled(sine(), 4);
        assert!((vals[0] - 0.5).abs() < 1e-9);
        assert!((vals[1] - 1.0).abs() < 1e-9);
        assert!((vals[2] - 0.5).abs() < 1e-9);
        assert!(vals[3].abs() < 1e-9);
    }

    #[test]
    fn saw_ramps_up() {
        assert_eq!(sampled(saw(), 4), vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn tri_folds_at_the_half_cycle() {
        assert_eq!(sampled(tri(), 4), vec![0.0, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn square_flips_at_the_half_cycle() {
        assert_eq!(sampled(square(), 4), vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn signals_have_no_onsets_until_segmented() {
        let raw = sine().first_cycle();
        assert!(raw.iter().all(|h| !h.has_onset()));
        let cut = sine().segment(4).unwrap().first_cycle();
        assert!(cut.iter().all(|h| h.has_onset()));
    }

    #[test]
    fn range_rescales() {
        let vals: Vec<f64> = saw()
            .range(10.0, 20.0)
            .segment(2)
            .unwrap()
            .first_cycle()
            .into_iter()
            .map(|h| h.value)
            .collect();
        assert_eq!(vals, vec![10.0, 15.0]);
    }
}
