//! Literal conversion for tokens that are not in the dictionary.

use crate::cell::Cell;

/// Parses an integer in `base`.
///
/// Accepts an optional leading `-`, then an optional `$` that switches to
/// base 16 for this token. Digits are `0-9` then `A-Z`, with lowercase
/// letters folded. Any digit out of range fails the whole token, as does
/// empty input. A bare `-` or `$` converts to 0. Overflow wraps.
pub fn convert(text: &[u8], base: Cell) -> Option<Cell> {
    if text.is_empty() {
        return None;
    }
    let mut rest = text;
    let mut base = base;
    let negate = if let [b'-', tail @ ..] = rest {
        rest = tail;
        true
    } else {
        false
    };
    if let [b'$', tail @ ..] = rest {
        rest = tail;
        base = 16;
    }

    let mut ret: Cell = 0;
    for &ch in rest {
        let d = digit(ch)?;
        if d >= base {
            return None;
        }
        ret = ret.wrapping_mul(base).wrapping_add(d);
    }
    Some(if negate { ret.wrapping_neg() } else { ret })
}

fn digit(ch: u8) -> Option<Cell> {
    match ch.to_ascii_uppercase() {
        c @ b'0'..=b'9' => Some((c - b'0') as Cell),
        c @ b'A'..=b'Z' => Some((c - b'A') as Cell + 10),
        _ => None,
    }
}

/// Smallest and largest decimal exponent a float literal may carry.
const EXPONENT_RANGE: core::ops::RangeInclusive<Cell> = -128..=128;

/// Parses a float literal.
///
/// The form is an optional `-`, decimal digits with at most one `.`, then a
/// mandatory `e` or `E` and an optional base-10 exponent (empty means zero).
/// A plain decimal such as `1.5` is not a float literal. The exponent must
/// lie in `-128..=128`. The mantissa may be empty, so `e` alone is 0.0.
pub fn fconvert(text: &[u8]) -> Option<f32> {
    let (negate, rest) = match text {
        [b'-', tail @ ..] => (true, tail),
        _ => (false, text),
    };
    let marker = rest.iter().position(|c| matches!(c, b'e' | b'E'))?;
    let (mantissa, exponent) = (&rest[..marker], &rest[marker + 1..]);

    let mut ret = 0.0f32;
    let mut shift = 1.0f32;
    let mut has_dot = false;
    for &ch in mantissa {
        match ch {
            b'0'..=b'9' => {
                let d = (ch - b'0') as f32;
                if has_dot {
                    shift *= 0.1;
                    ret += d * shift;
                } else {
                    ret = ret * 10.0 + d;
                }
            }
            b'.' if !has_dot => has_dot = true,
            _ => return None,
        }
    }
    let exp = if exponent.is_empty() {
        0
    } else {
        convert(exponent, 10)?
    };
    if !EXPONENT_RANGE.contains(&exp) {
        return None;
    }
    for _ in exp..0 {
        ret *= 0.1;
    }
    for _ in 0..exp {
        ret *= 10.0;
    }
    Some(if negate { -ret } else { ret })
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(convert(b"$FF", 10), Some(255));
        assert_eq!(convert(b"$ff", 2), Some(255));
        assert_eq!(convert(b"-12", 10), Some(-12));
        assert_eq!(convert(b"-$10", 10), Some(-16));
        assert_eq!(convert(b"zz", 36), Some(35 * 36 + 35));
        assert_eq!(convert(b"101", 2), Some(5));
    }

    #[test]
    fn integer_rejections() {
        assert_eq!(convert(b"", 10), None);
        assert_eq!(convert(b"12a", 10), None);
        assert_eq!(convert(b"2", 2), None);
        // ':' through '@' sit between the digit ranges
        assert_eq!(convert(b"1:", 16), None);
        assert_eq!(convert(b"$-1", 10), None);
    }

    #[test]
    fn integers_render_back() {
        for n in [0 as Cell, 7, -7, 1234567, -987654321, Cell::MAX, Cell::MIN + 1] {
            let text = format!("{n}");
            assert_eq!(convert(text.as_bytes(), 10), Some(n));
        }
        for n in [0 as Cell, 255, 4096, -4096] {
            let text = if n < 0 {
                format!("-{:x}", -n)
            } else {
                format!("{n:x}")
            };
            assert_eq!(convert(text.as_bytes(), 16), Some(n));
        }
    }

    #[test]
    fn floats() {
        assert_eq!(fconvert(b"1.5e2"), Some(150.0));
        assert_eq!(fconvert(b"-2E0"), Some(-2.0));
        assert_eq!(fconvert(b"3e"), Some(3.0));
        assert_eq!(fconvert(b"25e-1"), Some(25.0 * 0.1));
        assert_eq!(fconvert(b".5e1"), Some(5.0));
        // the exponent bounds are inclusive, even where f32 saturates
        assert_eq!(fconvert(b"1e128"), Some(f32::INFINITY));
        assert!(fconvert(b"1e-128").is_some());
        assert!(fconvert(b"-1e128").is_some());
    }

    #[test]
    fn tokens_without_digits() {
        assert_eq!(convert(b"-", 10), Some(0));
        assert_eq!(convert(b"$", 10), Some(0));
        assert_eq!(convert(b"-$", 10), Some(0));
        assert_eq!(fconvert(b"e"), Some(0.0));
        assert_eq!(fconvert(b"-e"), Some(-0.0));
        assert_eq!(fconvert(b"-.e"), Some(-0.0));
        assert_eq!(fconvert(b".E"), Some(0.0));
    }

    #[test]
    fn float_rejections() {
        assert_eq!(fconvert(b"1.5"), None);
        assert_eq!(fconvert(b"15"), None);
        assert_eq!(fconvert(b"1..5e1"), None);
        assert_eq!(fconvert(b"1x5e1"), None);
        assert_eq!(fconvert(b"1e129"), None);
        assert_eq!(fconvert(b"1e-129"), None);
        assert_eq!(fconvert(b"1ex"), None);
    }
}
