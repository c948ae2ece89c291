use std::time::{SystemTime, UNIX_EPOCH};

use crate::bigint::BigInt;
use crate::runtime::Runtime;
use crate::runtime::object::Value;
use crate::runtime::primitives::{PrimitiveContext, PrimitiveMessage, PrimitiveResult};

/// Seconds from 1901-01-01 to the Unix epoch.
const SQUEAK_EPOCH_OFFSET: u64 = 2_177_452_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Add,
    Sub,
    Mul,
    /// `/`
    Divide,
    /// `//`, rounding toward negative infinity.
    FloorDiv,
    /// `\\`, with the sign of the divisor.
    FloorMod,
    Quo,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl Compare {
    pub fn test<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Compare::Lt => a < b,
            Compare::Gt => a > b,
            Compare::Le => a <= b,
            Compare::Ge => a >= b,
            Compare::Eq => a == b,
            Compare::Ne => a != b,
        }
    }
}

fn floor_div(x: i64, y: i64) -> i64 {
    let q = x / y;
    if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q }
}

/// Integer arithmetic on SmallIntegers and large integers. `None` for
/// non-integers, division by zero and inexact `/`.
pub fn integer_arith(rt: &mut Runtime, op: Arith, a: Value, b: Value) -> Option<Value> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        let result = match op {
            Arith::Add => x + y,
            Arith::Sub => x - y,
            Arith::Mul => x.checked_mul(y)?,
            _ if y == 0 => return None,
            Arith::Divide if x % y != 0 => return None,
            Arith::Divide | Arith::Quo => x / y,
            Arith::Rem => x % y,
            Arith::FloorDiv => floor_div(x, y),
            Arith::FloorMod => x - floor_div(x, y) * y,
        };
        return Some(rt.integer(result));
    }
    let x = rt.to_bigint(a)?;
    let y = rt.to_bigint(b)?;
    let result = match op {
        Arith::Add => x.add(&y),
        Arith::Sub => x.sub(&y),
        Arith::Mul => x.mul(&y),
        Arith::Divide => {
            let (q, r) = x.quo_rem(&y)?;
            if !r.is_zero() {
                return None;
            }
            q
        }
        Arith::Quo => x.quo_rem(&y)?.0,
        Arith::Rem => x.quo_rem(&y)?.1,
        Arith::FloorDiv => x.div_mod(&y)?.0,
        Arith::FloorMod => x.div_mod(&y)?.1,
    };
    Some(rt.big_integer(&result))
}

/// The integer nearest zero from an integral float.
pub fn float_to_integer(rt: &mut Runtime, x: f64) -> Option<Value> {
    if !x.is_finite() {
        return None;
    }
    let x = x.trunc();
    if x.abs() < (1u64 << 62) as f64 {
        return Some(rt.integer(x as i64));
    }
    let magnitude = BigInt::from_digits(&format!("{:.0}", x.abs()), 10)?;
    let n = if x < 0.0 { magnitude.neg() } else { magnitude };
    Some(rt.big_integer(&n))
}

fn float_arith(rt: &mut Runtime, op: Arith, x: f64, y: f64) -> Option<Value> {
    let value = match op {
        Arith::Add => x + y,
        Arith::Sub => x - y,
        Arith::Mul => x * y,
        _ if y == 0.0 => return None,
        Arith::Divide => x / y,
        Arith::FloorDiv => return float_to_integer(rt, (x / y).floor()),
        Arith::Quo => return float_to_integer(rt, (x / y).trunc()),
        Arith::FloorMod => x - (x / y).floor() * y,
        Arith::Rem => x - (x / y).trunc() * y,
    };
    Some(Value::Float(value))
}

/// Arithmetic across SmallInteger, large integers and Float. An inexact
/// integer `/` answers a Float.
pub fn arith(rt: &mut Runtime, op: Arith, a: Value, b: Value) -> Option<Value> {
    if matches!(a, Value::Float(_)) || matches!(b, Value::Float(_)) {
        let x = rt.to_float(a)?;
        let y = rt.to_float(b)?;
        return float_arith(rt, op, x, y);
    }
    if let Some(result) = integer_arith(rt, op, a, b) {
        return Some(result);
    }
    if op == Arith::Divide {
        let x = rt.to_float(a)?;
        let y = rt.to_float(b)?;
        if y != 0.0 {
            return Some(Value::Float(x / y));
        }
    }
    None
}

pub fn compare(rt: &Runtime, op: Compare, a: Value, b: Value) -> Option<bool> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(op.test(x, y)),
        (Value::Float(_), _) | (_, Value::Float(_)) => Some(op.test(rt.to_float(a)?, rt.to_float(b)?)),
        _ => Some(op.test(rt.to_bigint(a)?, rt.to_bigint(b)?)),
    }
}

fn small_pair(ctx: &PrimitiveContext) -> Option<(Value, Value)> {
    match (ctx.receiver, ctx.arg(0)?) {
        (a @ Value::Int(_), b @ Value::Int(_)) => Some((a, b)),
        _ => None,
    }
}

fn small_arith(ctx: &mut PrimitiveContext, op: Arith) -> PrimitiveResult {
    let Some((a, b)) = small_pair(ctx) else { return Ok(None) };
    Ok(integer_arith(ctx.runtime, op, a, b))
}

fn small_compare(ctx: &mut PrimitiveContext, op: Compare) -> PrimitiveResult {
    let Some((a, b)) = small_pair(ctx) else { return Ok(None) };
    Ok(compare(ctx.runtime, op, a, b).map(|r| ctx.runtime.boolean(r)))
}

fn small_bits(ctx: &mut PrimitiveContext, f: fn(i64, i64) -> i64) -> PrimitiveResult {
    match small_pair(ctx) {
        Some((Value::Int(a), Value::Int(b))) => Ok(Some(ctx.runtime.integer(f(a, b)))),
        _ => Ok(None),
    }
}

fn large_arith(ctx: &mut PrimitiveContext, op: Arith) -> PrimitiveResult {
    let Some(arg) = ctx.arg(0) else { return Ok(None) };
    Ok(integer_arith(ctx.runtime, op, ctx.receiver, arg))
}

fn large_compare(ctx: &mut PrimitiveContext, op: Compare) -> PrimitiveResult {
    let Some(arg) = ctx.arg(0) else { return Ok(None) };
    let (Some(a), Some(b)) = (ctx.runtime.to_bigint(ctx.receiver), ctx.runtime.to_bigint(arg)) else {
        return Ok(None);
    };
    Ok(Some(ctx.runtime.boolean(op.test(a, b))))
}

fn float_pair(ctx: &PrimitiveContext) -> Option<(f64, f64)> {
    let Value::Float(x) = ctx.receiver else { return None };
    Some((x, ctx.runtime.to_float(ctx.arg(0)?)?))
}

fn float_binary(ctx: &mut PrimitiveContext, op: Arith) -> PrimitiveResult {
    let Some((x, y)) = float_pair(ctx) else { return Ok(None) };
    Ok(float_arith(ctx.runtime, op, x, y))
}

fn float_compare(ctx: &mut PrimitiveContext, op: Compare) -> PrimitiveResult {
    let Some((x, y)) = float_pair(ctx) else { return Ok(None) };
    Ok(Some(ctx.runtime.boolean(op.test(x, y))))
}

fn float_unary(ctx: &mut PrimitiveContext, f: fn(f64) -> f64) -> PrimitiveResult {
    match ctx.receiver {
        Value::Float(x) => Ok(Some(Value::Float(f(x)))),
        _ => Ok(None),
    }
}

macro_rules! primitive_fns {
    ($($name:ident => $helper:ident($arg:expr);)*) => {
        $(
            fn $name(ctx: &mut PrimitiveContext) -> PrimitiveResult {
                $helper(ctx, $arg)
            }
        )*
    };
}

primitive_fns! {
    small_add => small_arith(Arith::Add);
    small_sub => small_arith(Arith::Sub);
    small_lt => small_compare(Compare::Lt);
    small_gt => small_compare(Compare::Gt);
    small_le => small_compare(Compare::Le);
    small_ge => small_compare(Compare::Ge);
    small_eq => small_compare(Compare::Eq);
    small_ne => small_compare(Compare::Ne);
    small_mul => small_arith(Arith::Mul);
    small_divide => small_arith(Arith::Divide);
    small_mod => small_arith(Arith::FloorMod);
    small_div => small_arith(Arith::FloorDiv);
    small_quo => small_arith(Arith::Quo);
    small_bit_and => small_bits(|a, b| a & b);
    small_bit_or => small_bits(|a, b| a | b);
    small_bit_xor => small_bits(|a, b| a ^ b);

    large_add => large_arith(Arith::Add);
    large_sub => large_arith(Arith::Sub);
    large_lt => large_compare(Compare::Lt);
    large_gt => large_compare(Compare::Gt);
    large_le => large_compare(Compare::Le);
    large_ge => large_compare(Compare::Ge);
    large_eq => large_compare(Compare::Eq);
    large_ne => large_compare(Compare::Ne);
    large_mul => large_arith(Arith::Mul);
    large_divide => large_arith(Arith::Divide);
    large_mod => large_arith(Arith::FloorMod);

    float_add => float_binary(Arith::Add);
    float_sub => float_binary(Arith::Sub);
    float_lt => float_compare(Compare::Lt);
    float_gt => float_compare(Compare::Gt);
    float_le => float_compare(Compare::Le);
    float_ge => float_compare(Compare::Ge);
    float_eq => float_compare(Compare::Eq);
    float_ne => float_compare(Compare::Ne);
    float_mul => float_binary(Arith::Mul);
    float_divide => float_binary(Arith::Divide);
    float_sqrt => float_unary(f64::sqrt);
    float_sin => float_unary(f64::sin);
    float_arc_tan => float_unary(f64::atan);
    float_ln => float_unary(f64::ln);
    float_exp => float_unary(f64::exp);
}

fn small_bit_shift(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Some((Value::Int(x), Value::Int(n))) = small_pair(ctx) else { return Ok(None) };
    let shifted = match n {
        0..32 => x << n,
        32.. => return Ok(None),
        _ => x >> (-n).min(63),
    };
    Ok(Some(ctx.runtime.integer(shifted)))
}

fn small_as_float(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    match ctx.receiver {
        Value::Int(n) => Ok(Some(Value::Float(n as f64))),
        _ => Ok(None),
    }
}

fn float_truncated(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    match ctx.receiver {
        Value::Float(x) => Ok(float_to_integer(ctx.runtime, x)),
        _ => Ok(None),
    }
}

/// The binary exponent, as in `frexp` minus one.
fn float_exponent(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Value::Float(x) = ctx.receiver else { return Ok(None) };
    if x == 0.0 || !x.is_finite() {
        return Ok(Some(Value::Int(0)));
    }
    Ok(Some(Value::Int(x.abs().log2().floor() as i64)))
}

fn float_times_two_power(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    match (ctx.receiver, ctx.int_arg(0)) {
        (Value::Float(x), Some(n)) => Ok(Some(Value::Float(x * 2f64.powi(n.clamp(-2000, 2000) as i32)))),
        _ => Ok(None),
    }
}

fn seconds_clock(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let seconds = (unix + SQUEAK_EPOCH_OFFSET) as i64;
    Ok(Some(ctx.runtime.integer(seconds)))
}

pub static PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("1", 1, small_add),
    PrimitiveMessage::new("2", 1, small_sub),
    PrimitiveMessage::new("3", 1, small_lt),
    PrimitiveMessage::new("4", 1, small_gt),
    PrimitiveMessage::new("5", 1, small_le),
    PrimitiveMessage::new("6", 1, small_ge),
    PrimitiveMessage::new("7", 1, small_eq),
    PrimitiveMessage::new("8", 1, small_ne),
    PrimitiveMessage::new("9", 1, small_mul),
    PrimitiveMessage::new("10", 1, small_divide),
    PrimitiveMessage::new("11", 1, small_mod),
    PrimitiveMessage::new("12", 1, small_div),
    PrimitiveMessage::new("13", 1, small_quo),
    PrimitiveMessage::new("14", 1, small_bit_and),
    PrimitiveMessage::new("15", 1, small_bit_or),
    PrimitiveMessage::new("16", 1, small_bit_xor),
    PrimitiveMessage::new("17", 1, small_bit_shift),
    PrimitiveMessage::new("21", 1, large_add),
    PrimitiveMessage::new("22", 1, large_sub),
    PrimitiveMessage::new("23", 1, large_lt),
    PrimitiveMessage::new("24", 1, large_gt),
    PrimitiveMessage::new("25", 1, large_le),
    PrimitiveMessage::new("26", 1, large_ge),
    PrimitiveMessage::new("27", 1, large_eq),
    PrimitiveMessage::new("28", 1, large_ne),
    PrimitiveMessage::new("29", 1, large_mul),
    PrimitiveMessage::new("30", 1, large_divide),
    PrimitiveMessage::new("31", 1, large_mod),
    PrimitiveMessage::new("40", 0, small_as_float),
    PrimitiveMessage::new("41", 1, float_add),
    PrimitiveMessage::new("42", 1, float_sub),
    PrimitiveMessage::new("43", 1, float_lt),
    PrimitiveMessage::new("44", 1, float_gt),
    PrimitiveMessage::new("45", 1, float_le),
    PrimitiveMessage::new("46", 1, float_ge),
    PrimitiveMessage::new("47", 1, float_eq),
    PrimitiveMessage::new("48", 1, float_ne),
    PrimitiveMessage::new("49", 1, float_mul),
    PrimitiveMessage::new("50", 1, float_divide),
    PrimitiveMessage::new("51", 0, float_truncated),
    PrimitiveMessage::new("53", 0, float_exponent),
    PrimitiveMessage::new("54", 1, float_times_two_power),
    PrimitiveMessage::new("55", 0, float_sqrt),
    PrimitiveMessage::new("56", 0, float_sin),
    PrimitiveMessage::new("57", 0, float_arc_tan),
    PrimitiveMessage::new("58", 0, float_ln),
    PrimitiveMessage::new("59", 0, float_exp),
    PrimitiveMessage::new("137", 0, seconds_clock),
];
