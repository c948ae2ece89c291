use crate::ast::{Node, SMALL_INT_LITERAL_MAX, SMALL_INT_LITERAL_MIN};
use crate::bigint::BigInt;

const WACK: &str = "wack number literal";

/// Largest exponent an integer literal may scale by.
const MAX_EXPONENT: i64 = 10_000;

struct Pieces<'a> {
    negative: bool,
    head: &'a str,
    radix_digits: Option<&'a str>,
    fraction: Option<&'a str>,
    exponent: Option<&'a str>,
}

fn take_while(s: &str, f: impl Fn(u8) -> bool) -> (&str, &str) {
    let n = s.bytes().take_while(|c| f(*c)).count();
    s.split_at(n)
}

fn is_radix_digit(c: u8) -> bool {
    c.is_ascii_digit() || c.is_ascii_uppercase()
}

// -?[0-9]+(r[0-9A-Z]+)?(\.[0-9A-Z]+)?(e[+-]?[0-9]+)?, anchored at both ends
fn split(text: &str) -> Option<Pieces<'_>> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (head, mut rest) = take_while(rest, |c| c.is_ascii_digit());
    if head.is_empty() {
        return None;
    }
    let mut radix_digits = None;
    if let Some(r) = rest.strip_prefix('r') {
        let (digits, r) = take_while(r, is_radix_digit);
        if digits.is_empty() {
            return None;
        }
        radix_digits = Some(digits);
        rest = r;
    }
    let mut fraction = None;
    if let Some(r) = rest.strip_prefix('.') {
        let (digits, r) = take_while(r, is_radix_digit);
        if digits.is_empty() {
            return None;
        }
        fraction = Some(digits);
        rest = r;
    }
    let mut exponent = None;
    if let Some(r) = rest.strip_prefix('e') {
        let sign = usize::from(r.starts_with(['+', '-']));
        let (digits, r) = take_while(&r[sign..], |c| c.is_ascii_digit());
        if digits.is_empty() {
            return None;
        }
        exponent = Some(&rest[1..1 + sign + digits.len()]);
        rest = r;
    }
    if !rest.is_empty() {
        return None;
    }
    Some(Pieces {
        negative,
        head,
        radix_digits,
        fraction,
        exponent,
    })
}

/// Converts the text of a number literal, including an optional leading
/// minus, into an `Integer`, `LargeInteger` or `Float` node.
pub fn parse_number(text: &str) -> Result<Node, String> {
    let pieces = split(text).ok_or_else(|| WACK.to_string())?;
    let exponent: i64 = match pieces.exponent {
        Some(e) => e.trim_start_matches('+').parse().map_err(|_| WACK.to_string())?,
        None => 0,
    };

    if pieces.fraction.is_some() || exponent < 0 {
        if pieces.radix_digits.is_some() {
            return Err(
                "not supported: decimal points or scientific notation in non-decimal number literals"
                    .to_string(),
            );
        }
        return text
            .parse::<f64>()
            .map(Node::Float)
            .map_err(|_| WACK.to_string());
    }

    let (base, digits) = match pieces.radix_digits {
        Some(digits) => {
            let base: u32 = pieces.head.parse().map_err(|_| WACK.to_string())?;
            if !(2..=36).contains(&base) {
                return Err(format!("radix {} out of range", base));
            }
            (base, digits)
        }
        None => (10, pieces.head),
    };
    if exponent > MAX_EXPONENT {
        return Err(format!("exponent {} too large in {}", exponent, text));
    }
    let mut magnitude = BigInt::from_digits(digits, base)
        .ok_or_else(|| format!("digit out of range for radix {} in {}", base, text))?;
    for _ in 0..exponent {
        magnitude.mul_small(base);
    }

    let value = if pieces.negative { magnitude.neg() } else { magnitude };
    match value.to_i64() {
        Some(n) if SMALL_INT_LITERAL_MIN < n && n <= SMALL_INT_LITERAL_MAX => Ok(Node::Integer(n)),
        _ => {
            let sign = if value.is_negative() { "-" } else { "" };
            Ok(Node::LargeInteger(format!("{}{}", sign, value.abs().to_hex())))
        }
    }
}
