//! Exact decimal arithmetic on JSON numbers.
//!
//! Numbers are compared through their shortest decimal representation, so
//! `0.3` is a multiple of `0.01` even though neither is exact in binary.
//! Comparison of values whose decimal forms cannot be aligned within 128
//! bits falls back to `f64`; `multipleOf` stays exact at any exponent.

use std::cmp::Ordering;

use serde_json::Number;

/// `mantissa * 10^exponent`, sign kept separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decimal {
    negative: bool,
    mantissa: u128,
    exponent: i32,
}

impl Decimal {
    fn parse(text: &str) -> Option<Self> {
        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (digits, exp) = match rest.find(['e', 'E']) {
            Some(pos) => (&rest[..pos], rest[pos + 1..].parse::<i32>().ok()?),
            None => (rest, 0),
        };
        let (int_part, frac_part) = match digits.find('.') {
            Some(pos) => (&digits[..pos], &digits[pos + 1..]),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let mut mantissa: u128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            if !b.is_ascii_digit() {
                return None;
            }
            mantissa = mantissa.checked_mul(10)?.checked_add(u128::from(b - b'0'))?;
        }
        let exponent = exp.checked_sub(i32::try_from(frac_part.len()).ok()?)?;
        Some(Self {
            negative,
            mantissa,
            exponent,
        }
        .normalized())
    }

    fn from_number(n: &Number) -> Option<Self> {
        Self::parse(&n.to_string())
    }

    fn normalized(mut self) -> Self {
        if self.mantissa == 0 {
            return Self {
                negative: false,
                mantissa: 0,
                exponent: 0,
            };
        }
        while self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.exponent += 1;
        }
        self
    }

    /// Both mantissas scaled to the smaller exponent.
    fn align(&self, other: &Self) -> Option<(u128, u128)> {
        let exponent = self.exponent.min(other.exponent);
        let scale = |d: &Decimal| -> Option<u128> {
            let shift = u32::try_from(d.exponent - exponent).ok()?;
            d.mantissa.checked_mul(10u128.checked_pow(shift)?)
        };
        Some((scale(self)?, scale(other)?))
    }
}

/// Total order of two JSON numbers.
pub fn compare(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (as_i128(a), as_i128(b)) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (Decimal::from_number(a), Decimal::from_number(b)) {
        if let Some(ordering) = compare_decimals(&x, &y) {
            return ordering;
        }
    }
    let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

fn compare_decimals(x: &Decimal, y: &Decimal) -> Option<Ordering> {
    match (x.negative, y.negative) {
        (false, true) => Some(Ordering::Greater),
        (true, false) => Some(Ordering::Less),
        (negative, _) => {
            let (mx, my) = x.align(y)?;
            let magnitude = mx.cmp(&my);
            Some(if negative { magnitude.reverse() } else { magnitude })
        }
    }
}

pub fn equals(a: &Number, b: &Number) -> bool {
    compare(a, b) == Ordering::Equal
}

/// Whether `value` is an integer multiple of `divisor`.
///
/// A zero divisor never divides anything.
pub fn is_multiple_of(value: &Number, divisor: &Number) -> bool {
    if let (Some(x), Some(y)) = (as_i128(value), as_i128(divisor)) {
        return y != 0 && x % y == 0;
    }
    if let (Some(x), Some(y)) = (Decimal::from_number(value), Decimal::from_number(divisor)) {
        return y.mantissa != 0 && decimal_multiple(&x, &y);
    }
    match (value.as_f64(), divisor.as_f64()) {
        (Some(x), Some(y)) if y != 0.0 => (x / y).fract() == 0.0,
        _ => false,
    }
}

/// `x / y` is an integer, i.e. `my` divides `mx * 10^(ex - ey)`.
fn decimal_multiple(x: &Decimal, y: &Decimal) -> bool {
    if x.mantissa == 0 {
        return true;
    }
    let shift = i64::from(x.exponent) - i64::from(y.exponent);
    match u64::try_from(shift) {
        Ok(shift) => {
            let scale = pow_mod(10, shift, y.mantissa);
            mul_mod(x.mantissa % y.mantissa, scale, y.mantissa) == 0
        }
        // x has more fraction digits than y: my * 10^-shift must divide mx
        Err(_) => u32::try_from(-shift)
            .ok()
            .and_then(|shift| 10u128.checked_pow(shift))
            .and_then(|scale| scale.checked_mul(y.mantissa))
            .is_some_and(|d| x.mantissa % d == 0),
    }
}

/// `(a + b) % m` for `a, b < m` without overflow.
fn add_mod(a: u128, b: u128, m: u128) -> u128 {
    if a >= m - b {
        a - (m - b)
    } else {
        a + b
    }
}

fn mul_mod(mut a: u128, mut b: u128, m: u128) -> u128 {
    let mut result = 0;
    a %= m;
    while b > 0 {
        if b & 1 == 1 {
            result = add_mod(result, a, m);
        }
        a = add_mod(a, a, m);
        b >>= 1;
    }
    result
}

fn pow_mod(base: u128, mut exponent: u64, m: u128) -> u128 {
    let mut result = 1 % m;
    let mut base = base % m;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exponent >>= 1;
    }
    result
}

fn as_i128(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn num(v: serde_json::Value) -> Number {
        match v {
            serde_json::Value::Number(n) => n,
            other => panic!("not a number: {}", other),
        }
    }

    #[test]
    fn multiple_of_decimal_fraction() {
        assert!(is_multiple_of(&num(json!(0.3)), &num(json!(0.01))));
        assert!(is_multiple_of(&num(json!(0.3)), &num(json!(0.1))));
        assert!(is_multiple_of(&num(json!(4.5)), &num(json!(1.5))));
        assert!(!is_multiple_of(&num(json!(0.35)), &num(json!(0.1))));
        assert!(!is_multiple_of(&num(json!(0.0075)), &num(json!(0.01))));
    }

    #[test]
    fn multiple_of_integers() {
        assert!(is_multiple_of(&num(json!(10)), &num(json!(5))));
        assert!(!is_multiple_of(&num(json!(7)), &num(json!(2))));
        assert!(is_multiple_of(&num(json!(-12)), &num(json!(4))));
        assert!(!is_multiple_of(&num(json!(3)), &num(json!(0))));
    }

    #[test]
    fn multiple_of_mixed() {
        assert!(is_multiple_of(&num(json!(10)), &num(json!(2.5))));
        assert!(is_multiple_of(&num(json!(10.0)), &num(json!(2))));
        assert!(!is_multiple_of(&num(json!(10.1)), &num(json!(2))));
    }

    #[test]
    fn multiple_of_extreme_exponents() {
        assert!(is_multiple_of(&num(json!(1e308)), &num(json!(0.1))));
        assert!(is_multiple_of(&num(json!(3e300)), &num(json!(3))));
        assert!(!is_multiple_of(&num(json!(1e300)), &num(json!(3))));
        assert!(!is_multiple_of(&num(json!(1e20)), &num(json!(7))));
        assert!(!is_multiple_of(&num(json!(1e-300)), &num(json!(0.1))));
        assert!(is_multiple_of(&num(json!(0.0)), &num(json!(1e-300))));
    }

    #[test]
    fn compare_orders_numbers() {
        assert_eq!(compare(&num(json!(1)), &num(json!(1.0))), Ordering::Equal);
        assert_eq!(compare(&num(json!(-1)), &num(json!(0))), Ordering::Less);
        assert_eq!(compare(&num(json!(0.1)), &num(json!(0.01))), Ordering::Greater);
        assert_eq!(compare(&num(json!(-0.5)), &num(json!(-0.25))), Ordering::Less);
        assert_eq!(
            compare(&num(json!(u64::MAX)), &num(json!(i64::MIN))),
            Ordering::Greater
        );
    }

    #[test]
    fn exponent_forms_parse() {
        let d = Decimal::parse("1.5e-7").unwrap();
        assert_eq!((d.mantissa, d.exponent), (15, -8));
        let d = Decimal::parse("2E3").unwrap();
        assert_eq!((d.mantissa, d.exponent), (2, 3));
        assert!(Decimal::parse("abc").is_none());
        assert!(Decimal::parse("-").is_none());
    }

    #[test]
    fn huge_exponent_gap_falls_back() {
        assert_eq!(
            compare(&num(json!(1e300)), &num(json!(1e-300))),
            Ordering::Greater
        );
    }
}
