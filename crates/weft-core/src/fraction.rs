use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Rational number representation for precise cycle timing.
///
/// Cycle positions like 1/3 or 2/5 fall out of Euclidean rhythms and joins
/// and must compare exactly, so all interior arithmetic stays rational.
/// Floats only enter and leave at the query boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    numerator: i64,
    denominator: i64,
}

impl Fraction {
    /// Create a new fraction and normalise it.
    ///
    /// # Panics
    /// Panics if `denominator` is zero; fraction construction with a zero
    /// denominator is a programming error, not a runtime condition.
    pub fn new(numerator: i64, denominator: i64) -> Self {
        assert!(denominator != 0, "fraction denominator cannot be zero");
        Self::reduce(numerator as i128, denominator as i128)
    }

    /// Create a fraction from a whole number.
    pub const fn from_int(n: i64) -> Self {
        Fraction {
            numerator: n,
            denominator: 1,
        }
    }

    /// Normalise a widened numerator/denominator pair back to `i64`.
    ///
    /// All arithmetic widens to `i128` before reducing, so intermediate
    /// products never wrap. Values that still exceed `i64` after gcd
    /// reduction do not arise from musically meaningful queries.
    fn reduce(numerator: i128, denominator: i128) -> Self {
        let g = Self::gcd_i128(numerator.unsigned_abs(), denominator.unsigned_abs());
        let mut n = numerator / g as i128;
        let mut d = denominator / g as i128;
        if d < 0 {
            n = -n;
            d = -d;
        }
        debug_assert!(n >= i64::MIN as i128 && n <= i64::MAX as i128);
        debug_assert!(d <= i64::MAX as i128);
        Fraction {
            numerator: n as i64,
            denominator: d as i64,
        }
    }

    fn gcd_i128(mut a: u128, mut b: u128) -> u128 {
        if a == 0 {
            return b.max(1);
        }
        while b != 0 {
            let t = b;
            b = a % b;
            a = t;
        }
        a
    }

    /// Greatest common divisor of two `i64`s.
    pub fn gcd(mut a: i64, mut b: i64) -> i64 {
        while b != 0 {
            let t = b;
            b = a % b;
            a = t;
        }
        a.abs().max(1)
    }

    /// Least common multiple of two `i64`s.
    pub fn lcm(a: i64, b: i64) -> i64 {
        if a == 0 || b == 0 {
            return 0;
        }
        (a / Self::gcd(a, b) * b).abs()
    }

    /// Approximate a float as a fraction via bounded continued fractions.
    ///
    /// Used only where an `f64` crosses the API boundary (`query_arc`,
    /// scalar convenience arguments). Denominators are capped at 10^6,
    /// which round-trips every step grid a notation string can produce.
    pub fn approximate(value: f64) -> Self {
        const MAX_DENOMINATOR: i64 = 1_000_000;
        if !value.is_finite() {
            return Fraction::from_int(0);
        }
        let negative = value < 0.0;
        let mut x = value.abs();
        let (mut h0, mut h1) = (0i64, 1i64);
        let (mut k0, mut k1) = (1i64, 0i64);
        for _ in 0..40 {
            let a = x.floor();
            if a > i64::MAX as f64 {
                break;
            }
            let a = a as i64;
            let h2 = match a.checked_mul(h1).and_then(|v| v.checked_add(h0)) {
                Some(v) => v,
                None => break,
            };
            let k2 = match a.checked_mul(k1).and_then(|v| v.checked_add(k0)) {
                Some(v) => v,
                None => break,
            };
            if k2 > MAX_DENOMINATOR {
                break;
            }
            h0 = h1;
            h1 = h2;
            k0 = k1;
            k1 = k2;
            let frac = x - a as f64;
            if frac.abs() < 1e-12 {
                break;
            }
            x = 1.0 / frac;
        }
        if k1 == 0 {
            return Fraction::from_int(0);
        }
        let n = if negative { -h1 } else { h1 };
        Fraction::new(n, k1)
    }

    /// Convert to a float, for the query boundary only.
    pub fn to_float(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    /// The reciprocal. Panics on zero, like division.
    pub fn reciprocal(self) -> Self {
        assert!(self.numerator != 0, "reciprocal of zero");
        Self::reduce(self.denominator as i128, self.numerator as i128)
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    pub fn is_negative(&self) -> bool {
        self.numerator < 0
    }

    pub fn abs(self) -> Self {
        Fraction {
            numerator: self.numerator.abs(),
            denominator: self.denominator,
        }
    }

    /// Round down to the nearest integer (towards negative infinity).
    pub fn floor(self) -> Self {
        Fraction::from_int(self.floor_int())
    }

    /// Floor as a plain integer; this is the cycle index of a time point.
    pub fn floor_int(self) -> i64 {
        self.numerator.div_euclid(self.denominator)
    }

    /// Round up to the nearest integer (towards positive infinity).
    pub fn ceil(self) -> Self {
        Fraction::from_int(self.ceil_int())
    }

    pub fn ceil_int(self) -> i64 {
        -(-self.numerator).div_euclid(self.denominator)
    }

    /// Fractional part, always in `[0, 1)`. This is the cycle position.
    pub fn fract(self) -> Self {
        self - self.floor()
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

impl From<i64> for Fraction {
    fn from(n: i64) -> Self {
        Fraction::from_int(n)
    }
}

impl From<i32> for Fraction {
    fn from(n: i32) -> Self {
        Fraction::from_int(n as i64)
    }
}

impl From<usize> for Fraction {
    fn from(n: usize) -> Self {
        Fraction::from_int(n as i64)
    }
}

impl From<f64> for Fraction {
    fn from(f: f64) -> Self {
        Fraction::approximate(f)
    }
}

impl From<(i64, i64)> for Fraction {
    fn from((num, den): (i64, i64)) -> Self {
        Fraction::new(num, den)
    }
}

impl Add for Fraction {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::reduce(
            self.numerator as i128 * other.denominator as i128
                + other.numerator as i128 * self.denominator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }
}

impl Sub for Fraction {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::reduce(
            self.numerator as i128 * other.denominator as i128
                - other.numerator as i128 * self.denominator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }
}

impl Mul for Fraction {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Self::reduce(
            self.numerator as i128 * other.numerator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }
}

impl Div for Fraction {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        assert!(other.numerator != 0, "division by zero fraction");
        Self::reduce(
            self.numerator as i128 * other.denominator as i128,
            self.denominator as i128 * other.numerator as i128,
        )
    }
}

impl Neg for Fraction {
    type Output = Self;

    fn neg(self) -> Self {
        Fraction {
            numerator: -self.numerator,
            denominator: self.denominator,
        }
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.numerator as i128 * other.denominator as i128;
        let rhs = other.numerator as i128 * self.denominator as i128;
        lhs.cmp(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_normalises() {
        let f = Fraction::new(4, 8);
        assert_eq!(f.numerator(), 1);
        assert_eq!(f.denominator(), 2);

        let g = Fraction::new(3, -9);
        assert_eq!(g.numerator(), -1);
        assert_eq!(g.denominator(), 3);
    }

    #[test]
    fn arithmetic() {
        assert_eq!(
            Fraction::new(1, 2) + Fraction::new(1, 3),
            Fraction::new(5, 6)
        );
        assert_eq!(
            Fraction::new(1, 2) - Fraction::new(1, 3),
            Fraction::new(1, 6)
        );
        assert_eq!(
            Fraction::new(2, 3) * Fraction::new(3, 4),
            Fraction::new(1, 2)
        );
        assert_eq!(
            Fraction::new(1, 2) / Fraction::new(1, 4),
            Fraction::from_int(2)
        );
    }

    #[test]
    fn widening_does_not_wrap() {
        let a = Fraction::new(1, 999_983);
        let b = Fraction::new(1, 999_979);
        let sum = a + b;
        assert!(sum > Fraction::from_int(0));
        assert!(sum < Fraction::new(1, 400_000));
    }

    #[test]
    fn floor_and_fract_handle_negatives() {
        assert_eq!(Fraction::new(-1, 2).floor_int(), -1);
        assert_eq!(Fraction::new(-1, 2).fract(), Fraction::new(1, 2));
        assert_eq!(Fraction::new(7, 2).floor_int(), 3);
        assert_eq!(Fraction::new(7, 2).ceil_int(), 4);
        assert_eq!(Fraction::from_int(3).ceil_int(), 3);
    }

    #[test]
    fn approximate_recovers_simple_ratios() {
        assert_eq!(Fraction::approximate(0.5), Fraction::new(1, 2));
        assert_eq!(Fraction::approximate(0.25), Fraction::new(1, 4));
        assert_eq!(Fraction::approximate(1.0 / 3.0), Fraction::new(1, 3));
        assert_eq!(Fraction::approximate(-0.75), Fraction::new(-3, 4));
        assert_eq!(Fraction::approximate(2.0), Fraction::from_int(2));
    }

    #[test]
    fn ordering() {
        assert!(Fraction::new(1, 3) < Fraction::new(2, 5));
        assert!(Fraction::new(-1, 2) < Fraction::from_int(0));
        assert_eq!(
            Fraction::new(2, 6).cmp(&Fraction::new(1, 3)),
            Ordering::Equal
        );
    }

    proptest::proptest! {
        #[test]
        fn add_sub_round_trips(
            an in -1000i64..1000, ad in 1i64..1000,
            bn in -1000i64..1000, bd in 1i64..1000,
        ) {
            let a = Fraction::new(an, ad);
            let b = Fraction::new(bn, bd);
            proptest::prop_assert_eq!(a + b - b, a);
        }

        #[test]
        fn approximate_recovers_small_fractions(n in -999i64..1000, d in 1i64..1000) {
            let f = Fraction::new(n, d);
            proptest::prop_assert_eq!(Fraction::approximate(f.to_float()), f);
        }

        #[test]
        fn floor_fract_decompose(n in -1000i64..1000, d in 1i64..1000) {
            let f = Fraction::new(n, d);
            proptest::prop_assert_eq!(f.floor() + f.fract(), f);
            proptest::prop_assert!(f.fract() >= Fraction::from_int(0));
            proptest::prop_assert!(f.fract() < Fraction::from_int(1));
        }
    }
}
