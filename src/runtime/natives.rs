//! Methods the runtime implements itself. The compiler skips source
//! methods with the same class, side and selector.

use crate::runtime::object::{MethodImpl, NativeFunction, NativeMethod, ObjId, Value};
use crate::runtime::primitives::collections::{basic_at, basic_at_put, basic_size};
use crate::runtime::primitives::numbers::{self, Arith, Compare};
use crate::runtime::primitives::objects::{inst_var_at, inst_var_at_put, perform};
use crate::runtime::{Outcome, Runtime, RuntimeError, Unwind, fail};

type NativeTable = &'static [(&'static str, usize, NativeFunction)];

/// (class, class side, methods)
const TABLES: &[(&str, bool, NativeTable)] = &[
    ("Object", false, OBJECT),
    ("Behavior", false, BEHAVIOR),
    ("UndefinedObject", false, UNDEFINED_OBJECT),
    ("Boolean", false, BOOLEAN),
    ("BlockContext", false, BLOCK_CONTEXT),
    ("Number", false, NUMBER),
    ("Integer", false, INTEGER),
    ("SmallInteger", false, SMALL_INTEGER),
    ("Float", false, FLOAT),
    ("Character", false, CHARACTER),
    ("Character", true, CHARACTER_CLASS),
    ("SequenceableCollection", false, SEQUENCEABLE_COLLECTION),
    ("ArrayedCollection", false, ARRAYED_COLLECTION),
    ("String", false, STRING),
    ("Symbol", false, SYMBOL),
];

pub fn install(rt: &mut Runtime) {
    for (name, class_side, table) in TABLES {
        let Some(mut class) = rt.class_named(name) else {
            log::warn!("no class {} for native methods", name);
            continue;
        };
        if *class_side {
            class = rt.object(class).class;
        }
        for (selector, arity, function) in table.iter() {
            rt.add_method(
                class,
                selector,
                MethodImpl::Native(NativeMethod {
                    arity: *arity,
                    function: *function,
                }),
            );
        }
    }
}

// --- helpers

fn truth(rt: &Runtime, v: Value) -> Result<bool, Unwind> {
    if rt.is_true(v) {
        Ok(true)
    } else if rt.is_false(v) {
        Ok(false)
    } else {
        fail(format!("{} is not a boolean", rt.describe(v)))
    }
}

fn block_arity(rt: &Runtime, block: Value) -> Option<usize> {
    rt.closure(block).map(|c| c.block.params.len())
}

fn call(rt: &mut Runtime, block: Value, args: &[Value]) -> Outcome {
    match rt.closure(block) {
        Some(closure) => rt.call_block(&closure, args),
        None => fail(format!("{} is not a block", rt.describe(block))),
    }
}

fn class_arg(rt: &Runtime, v: Value) -> Result<ObjId, Unwind> {
    match v.as_obj().filter(|id| rt.behavior(*id).is_some()) {
        Some(id) => Ok(id),
        None => fail(format!("{} is not a class", rt.describe(v))),
    }
}

fn text_arg(rt: &Runtime, v: Value) -> Result<String, Unwind> {
    match rt.string_value(v) {
        Some(s) => Ok(s),
        None => fail(format!("{} is not a string", rt.describe(v))),
    }
}

fn out_of_bounds<T>(rt: &Runtime, receiver: Value, index: Value) -> Result<T, Unwind> {
    fail(format!(
        "index {} out of bounds for {}",
        rt.describe(index),
        rt.describe(receiver)
    ))
}

// --- Object

fn identical(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    Ok(rt.boolean(receiver.identical(args[0])))
}

fn not_identical(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    Ok(rt.boolean(!receiver.identical(args[0])))
}

fn not_equal(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let equal = rt.send(receiver, "=", args)?;
    Ok(rt.boolean(!truth(rt, equal)?))
}

fn class(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    Ok(Value::Obj(rt.class_of(receiver)))
}

fn identity_hash(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    Ok(Value::Int(rt.identity_hash(receiver)))
}

fn shallow_copy(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    Ok(rt.shallow_copy(receiver))
}

fn copy(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    rt.send(receiver, "shallowCopy", &[])
}

fn yourself(_: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    Ok(receiver)
}

fn answer_false(rt: &mut Runtime, _: Value, _: &[Value]) -> Outcome {
    Ok(rt.boolean(false))
}

fn answer_true(rt: &mut Runtime, _: Value, _: &[Value]) -> Outcome {
    Ok(rt.boolean(true))
}

fn answer_nil(rt: &mut Runtime, _: Value, _: &[Value]) -> Outcome {
    Ok(rt.nil())
}

fn if_not_nil(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    match block_arity(rt, args[0]) {
        Some(1) => call(rt, args[0], &[receiver]),
        _ => call(rt, args[0], &[]),
    }
}

fn perform_selector(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    perform(rt, receiver, args[0], &args[1..], None)
}

fn array_arg(rt: &Runtime, v: Value) -> Result<Vec<Value>, Unwind> {
    match rt.array_items(v) {
        Some(items) => Ok(items),
        None => fail(format!("{} is not an Array", rt.describe(v))),
    }
}

fn perform_with_arguments(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let arguments = array_arg(rt, args[1])?;
    perform(rt, receiver, args[0], &arguments, None)
}

fn perform_in_superclass(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let arguments = array_arg(rt, args[1])?;
    let start = class_arg(rt, args[2])?;
    perform(rt, receiver, args[0], &arguments, Some(start))
}

fn error(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let message = rt.string_value(args[0]).unwrap_or_else(|| rt.describe(args[0]));
    Err(Unwind::Error(RuntimeError::Failed {
        message,
        receiver: Some(rt.describe(receiver)),
    }))
}

fn halt(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    Err(Unwind::Error(RuntimeError::Failed {
        message: "halt".to_string(),
        receiver: Some(rt.describe(receiver)),
    }))
}

fn print_string(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    let text = rt.describe(receiver);
    Ok(rt.string(&text))
}

fn at(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    match basic_at(rt, receiver, args[0]) {
        Some(value) => Ok(value),
        None => out_of_bounds(rt, receiver, args[0]),
    }
}

fn at_put(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    match basic_at_put(rt, receiver, args[0], args[1]) {
        Some(value) => Ok(value),
        None => fail(format!(
            "cannot store {} at {} in {}",
            rt.describe(args[1]),
            rt.describe(args[0]),
            rt.describe(receiver)
        )),
    }
}

fn size(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    Ok(Value::Int(basic_size(rt, receiver)))
}

fn object_inst_var_at(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let Value::Int(index) = args[0] else {
        return out_of_bounds(rt, receiver, args[0]);
    };
    match inst_var_at(rt, receiver, index) {
        Some(value) => Ok(value),
        None => out_of_bounds(rt, receiver, args[0]),
    }
}

fn object_inst_var_at_put(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let Value::Int(index) = args[0] else {
        return out_of_bounds(rt, receiver, args[0]);
    };
    match inst_var_at_put(rt, receiver, index, args[1]) {
        Some(value) => Ok(value),
        None => out_of_bounds(rt, receiver, args[0]),
    }
}

fn responds_to(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let found = rt
        .string_value(args[0])
        .is_some_and(|selector| rt.lookup(rt.class_of(receiver), &selector).is_some());
    Ok(rt.boolean(found))
}

fn is_kind_of(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let class = class_arg(rt, args[0])?;
    Ok(rt.boolean(rt.is_kind_of(receiver, class)))
}

fn is_member_of(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let class = class_arg(rt, args[0])?;
    Ok(rt.boolean(rt.class_of(receiver) == class))
}

const OBJECT: NativeTable = &[
    ("==", 1, identical),
    ("~~", 1, not_identical),
    ("=", 1, identical),
    ("~=", 1, not_equal),
    ("class", 0, class),
    ("identityHash", 0, identity_hash),
    ("hash", 0, identity_hash),
    ("shallowCopy", 0, shallow_copy),
    ("clone", 0, shallow_copy),
    ("copy", 0, copy),
    ("yourself", 0, yourself),
    ("isNil", 0, answer_false),
    ("notNil", 0, answer_true),
    ("ifNil:", 1, yourself),
    ("ifNotNil:", 1, if_not_nil),
    ("perform:", 1, perform_selector),
    ("perform:with:", 2, perform_selector),
    ("perform:with:with:", 3, perform_selector),
    ("perform:with:with:with:", 4, perform_selector),
    ("perform:withArguments:", 2, perform_with_arguments),
    ("perform:withArguments:inSuperclass:", 3, perform_in_superclass),
    ("error:", 1, error),
    ("halt:", 1, error),
    ("halt", 0, halt),
    ("printString", 0, print_string),
    ("at:", 1, at),
    ("at:put:", 2, at_put),
    ("basicAt:", 1, at),
    ("basicAt:put:", 2, at_put),
    ("basicSize", 0, size),
    ("size", 0, size),
    ("instVarAt:", 1, object_inst_var_at),
    ("instVarAt:put:", 2, object_inst_var_at_put),
    ("respondsTo:", 1, responds_to),
    ("isKindOf:", 1, is_kind_of),
    ("isMemberOf:", 1, is_member_of),
];

// --- Behavior

fn basic_new(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    let class = class_arg(rt, receiver)?;
    Ok(rt.instantiate(class, 0)?)
}

fn basic_new_sized(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let class = class_arg(rt, receiver)?;
    match args[0] {
        Value::Int(size) if size >= 0 => Ok(rt.instantiate(class, size as usize)?),
        other => fail(format!("{} is not a valid size", rt.describe(other))),
    }
}

fn name(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    let class = class_arg(rt, receiver)?;
    let name = rt.class_name(class);
    Ok(rt.string(&name))
}

fn superclass(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    let class = class_arg(rt, receiver)?;
    Ok(match rt.behavior(class).and_then(|b| b.superclass) {
        Some(superclass) => Value::Obj(superclass),
        None => rt.nil(),
    })
}

fn inherits_from(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let class = class_arg(rt, receiver)?;
    let ancestor = class_arg(rt, args[0])?;
    Ok(rt.boolean(class != ancestor && rt.inherits_from(class, ancestor)))
}

fn includes_selector(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let class = class_arg(rt, receiver)?;
    let selector = text_arg(rt, args[0])?;
    let found = rt.behavior(class).is_some_and(|b| b.methods.contains_key(&selector));
    Ok(rt.boolean(found))
}

const BEHAVIOR: NativeTable = &[
    ("basicNew", 0, basic_new),
    ("basicNew:", 1, basic_new_sized),
    ("new", 0, basic_new),
    ("new:", 1, basic_new_sized),
    ("name", 0, name),
    ("superclass", 0, superclass),
    ("inheritsFrom:", 1, inherits_from),
    ("includesSelector:", 1, includes_selector),
];

// --- UndefinedObject

fn if_nil(rt: &mut Runtime, _: Value, args: &[Value]) -> Outcome {
    call(rt, args[0], &[])
}

const UNDEFINED_OBJECT: NativeTable = &[
    ("isNil", 0, answer_true),
    ("notNil", 0, answer_false),
    ("ifNil:", 1, if_nil),
    ("ifNotNil:", 1, answer_nil),
];

// --- Boolean

fn and(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    Ok(if rt.is_true(receiver) { args[0] } else { receiver })
}

fn or(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    Ok(if rt.is_true(receiver) { receiver } else { args[0] })
}

fn not(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    Ok(rt.boolean(!rt.is_true(receiver)))
}

fn and_block(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    if rt.is_true(receiver) { call(rt, args[0], &[]) } else { Ok(receiver) }
}

fn or_block(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    if rt.is_true(receiver) { Ok(receiver) } else { call(rt, args[0], &[]) }
}

fn if_true(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    if rt.is_true(receiver) { call(rt, args[0], &[]) } else { Ok(rt.nil()) }
}

fn if_false(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    if rt.is_true(receiver) { Ok(rt.nil()) } else { call(rt, args[0], &[]) }
}

fn if_true_if_false(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let branch = if rt.is_true(receiver) { args[0] } else { args[1] };
    call(rt, branch, &[])
}

fn if_false_if_true(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let branch = if rt.is_true(receiver) { args[1] } else { args[0] };
    call(rt, branch, &[])
}

const BOOLEAN: NativeTable = &[
    ("&", 1, and),
    ("|", 1, or),
    ("not", 0, not),
    ("and:", 1, and_block),
    ("or:", 1, or_block),
    ("ifTrue:", 1, if_true),
    ("ifFalse:", 1, if_false),
    ("ifTrue:ifFalse:", 2, if_true_if_false),
    ("ifFalse:ifTrue:", 2, if_false_if_true),
];

// --- BlockContext

fn value(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    call(rt, receiver, args)
}

fn value_with_arguments(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let arguments = array_arg(rt, args[0])?;
    call(rt, receiver, &arguments)
}

fn num_args(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    match block_arity(rt, receiver) {
        Some(n) => Ok(Value::Int(n as i64)),
        None => fail("not a block"),
    }
}

fn loop_while(rt: &mut Runtime, test: Value, body: Option<Value>, expect: bool) -> Outcome {
    loop {
        let result = call(rt, test, &[])?;
        if truth(rt, result)? != expect {
            return Ok(rt.nil());
        }
        if let Some(body) = body {
            call(rt, body, &[])?;
        }
    }
}

fn while_true(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    loop_while(rt, receiver, args.first().copied(), true)
}

fn while_false(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    loop_while(rt, receiver, args.first().copied(), false)
}

fn repeat(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    loop {
        call(rt, receiver, &[])?;
    }
}

/// Runs the receiver; on an error, answers the handler's value. The
/// handler may take the error text and the receiver's description.
fn if_error(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let error = match call(rt, receiver, &[]) {
        Err(Unwind::Error(error)) => error,
        other => return other,
    };
    log::debug!("ifError: caught {}", error);
    let (message, culprit) = match &error {
        RuntimeError::Failed { message, receiver } => (message.clone(), receiver.clone()),
        other => (other.to_string(), None),
    };
    let handler = args[0];
    match block_arity(rt, handler) {
        Some(0) => call(rt, handler, &[]),
        Some(1) => {
            let message = rt.string(&message);
            call(rt, handler, &[message])
        }
        _ => {
            let message = rt.string(&message);
            let culprit = match culprit {
                Some(text) => rt.string(&text),
                None => rt.nil(),
            };
            call(rt, handler, &[message, culprit])
        }
    }
}

const BLOCK_CONTEXT: NativeTable = &[
    ("value", 0, value),
    ("value:", 1, value),
    ("value:value:", 2, value),
    ("value:value:value:", 3, value),
    ("value:value:value:value:", 4, value),
    ("valueWithArguments:", 1, value_with_arguments),
    ("numArgs", 0, num_args),
    ("whileTrue:", 1, while_true),
    ("whileFalse:", 1, while_false),
    ("whileTrue", 0, while_true),
    ("whileFalse", 0, while_false),
    ("repeat", 0, repeat),
    ("ifError:", 1, if_error),
];

// --- numbers

fn arith(rt: &mut Runtime, op: Arith, a: Value, b: Value) -> Outcome {
    if let Some(result) = numbers::arith(rt, op, a, b) {
        return Ok(result);
    }
    let divides = !matches!(op, Arith::Add | Arith::Sub | Arith::Mul);
    if divides && rt.to_float(b) == Some(0.0) {
        return Err(Unwind::Error(RuntimeError::Failed {
            message: "division by zero".to_string(),
            receiver: Some(rt.describe(a)),
        }));
    }
    fail(format!("{} is not a number", rt.describe(b)))
}

fn compare(rt: &mut Runtime, op: Compare, a: Value, b: Value) -> Outcome {
    match numbers::compare(rt, op, a, b) {
        Some(result) => Ok(rt.boolean(result)),
        None if op == Compare::Eq => Ok(rt.boolean(false)),
        None if op == Compare::Ne => Ok(rt.boolean(true)),
        None => fail(format!("{} is not a number", rt.describe(b))),
    }
}

macro_rules! binary_natives {
    ($($name:ident => $helper:ident($op:expr);)*) => {
        $(
            fn $name(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
                $helper(rt, $op, receiver, args[0])
            }
        )*
    };
}

binary_natives! {
    add => arith(Arith::Add);
    sub => arith(Arith::Sub);
    mul => arith(Arith::Mul);
    divide => arith(Arith::Divide);
    floor_div => arith(Arith::FloorDiv);
    floor_mod => arith(Arith::FloorMod);
    quo => arith(Arith::Quo);
    rem => arith(Arith::Rem);
    less => compare(Compare::Lt);
    greater => compare(Compare::Gt);
    less_equal => compare(Compare::Le);
    greater_equal => compare(Compare::Ge);
    equal => compare(Compare::Eq);
    unequal => compare(Compare::Ne);
}

fn negated(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    arith(rt, Arith::Sub, Value::Int(0), receiver)
}

fn abs(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let negative = compare(rt, Compare::Lt, receiver, Value::Int(0))?;
    if rt.is_true(negative) { negated(rt, receiver, args) } else { Ok(receiver) }
}

fn max(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let greater = compare(rt, Compare::Gt, receiver, args[0])?;
    Ok(if rt.is_true(greater) { receiver } else { args[0] })
}

fn min(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let less = compare(rt, Compare::Lt, receiver, args[0])?;
    Ok(if rt.is_true(less) { receiver } else { args[0] })
}

fn is_zero(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    compare(rt, Compare::Eq, receiver, Value::Int(0))
}

fn as_float(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    match rt.to_float(receiver) {
        Some(x) => Ok(Value::Float(x)),
        None => fail("not a number"),
    }
}

fn rounding(rt: &mut Runtime, receiver: Value, round: fn(f64) -> f64) -> Outcome {
    let Value::Float(x) = receiver else {
        return Ok(receiver);
    };
    match numbers::float_to_integer(rt, round(x)) {
        Some(n) => Ok(n),
        None => fail(format!("{} has no integer value", rt.describe(receiver))),
    }
}

fn truncated(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    rounding(rt, receiver, f64::trunc)
}

fn rounded(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    rounding(rt, receiver, f64::round)
}

fn to_do(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let (stop, body) = (args[0], args[1]);
    let mut i = receiver;
    loop {
        let past = compare(rt, Compare::Gt, i, stop)?;
        if rt.is_true(past) {
            return Ok(receiver);
        }
        call(rt, body, &[i])?;
        i = arith(rt, Arith::Add, i, Value::Int(1))?;
    }
}

fn to_by_do(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let (stop, step, body) = (args[0], args[1], args[2]);
    let up = compare(rt, Compare::Gt, step, Value::Int(0))?;
    let down = compare(rt, Compare::Lt, step, Value::Int(0))?;
    let direction = if rt.is_true(up) {
        Compare::Gt
    } else if rt.is_true(down) {
        Compare::Lt
    } else {
        return fail("step must not be zero");
    };
    let mut i = receiver;
    loop {
        let past = compare(rt, direction, i, stop)?;
        if rt.is_true(past) {
            return Ok(receiver);
        }
        call(rt, body, &[i])?;
        i = arith(rt, Arith::Add, i, step)?;
    }
}

const NUMBER: NativeTable = &[
    ("+", 1, add),
    ("-", 1, sub),
    ("*", 1, mul),
    ("/", 1, divide),
    ("//", 1, floor_div),
    ("\\\\", 1, floor_mod),
    ("quo:", 1, quo),
    ("rem:", 1, rem),
    ("<", 1, less),
    (">", 1, greater),
    ("<=", 1, less_equal),
    (">=", 1, greater_equal),
    ("=", 1, equal),
    ("~=", 1, unequal),
    ("negated", 0, negated),
    ("abs", 0, abs),
    ("max:", 1, max),
    ("min:", 1, min),
    ("isZero", 0, is_zero),
    ("asFloat", 0, as_float),
    ("truncated", 0, truncated),
    ("rounded", 0, rounded),
    ("asInteger", 0, truncated),
    ("to:do:", 2, to_do),
    ("to:by:do:", 3, to_by_do),
];

fn times_repeat(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let mut i = Value::Int(1);
    loop {
        let past = compare(rt, Compare::Gt, i, receiver)?;
        if rt.is_true(past) {
            return Ok(receiver);
        }
        call(rt, args[0], &[])?;
        i = arith(rt, Arith::Add, i, Value::Int(1))?;
    }
}

fn as_character(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    match receiver {
        Value::Int(code) => match u32::try_from(code).ok().and_then(char::from_u32) {
            Some(c) => Ok(rt.character(c)),
            None => fail(format!("{} is not a character code", code)),
        },
        other => fail(format!("{} is not a character code", rt.describe(other))),
    }
}

fn bits(rt: &mut Runtime, receiver: Value, arg: Value, f: fn(i64, i64) -> i64) -> Outcome {
    match (receiver, arg) {
        (Value::Int(a), Value::Int(b)) => Ok(rt.integer(f(a, b))),
        _ => fail("bit operations need SmallIntegers"),
    }
}

fn bit_and(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    bits(rt, receiver, args[0], |a, b| a & b)
}

fn bit_or(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    bits(rt, receiver, args[0], |a, b| a | b)
}

fn bit_xor(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    bits(rt, receiver, args[0], |a, b| a ^ b)
}

const INTEGER: NativeTable = &[
    ("timesRepeat:", 1, times_repeat),
    ("asCharacter", 0, as_character),
    ("bitAnd:", 1, bit_and),
    ("bitOr:", 1, bit_or),
    ("bitXor:", 1, bit_xor),
];

const SMALL_INTEGER: NativeTable = &[("*", 1, mul), ("/", 1, divide), ("//", 1, floor_div)];

fn float_function(rt: &mut Runtime, receiver: Value, f: fn(f64) -> f64) -> Outcome {
    match rt.to_float(receiver) {
        Some(x) => Ok(Value::Float(f(x))),
        None => fail("not a number"),
    }
}

fn arc_tan(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    float_function(rt, receiver, f64::atan)
}

fn exp(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    float_function(rt, receiver, f64::exp)
}

fn ln(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    float_function(rt, receiver, f64::ln)
}

fn sin(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    float_function(rt, receiver, f64::sin)
}

fn sqrt(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    float_function(rt, receiver, f64::sqrt)
}

const FLOAT: NativeTable = &[
    ("*", 1, mul),
    ("+", 1, add),
    ("-", 1, sub),
    ("/", 1, divide),
    ("<", 1, less),
    ("<=", 1, less_equal),
    ("=", 1, equal),
    (">", 1, greater),
    (">=", 1, greater_equal),
    ("~=", 1, unequal),
    ("arcTan", 0, arc_tan),
    ("exp", 0, exp),
    ("ln", 0, ln),
    ("sin", 0, sin),
    ("sqrt", 0, sqrt),
];

// --- Character

fn char_value(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    match rt.char_value(receiver) {
        Some(c) => Ok(Value::Int(c as i64)),
        None => fail("not a character"),
    }
}

fn character_value(rt: &mut Runtime, _: Value, args: &[Value]) -> Outcome {
    as_character(rt, args[0], &[])
}

const CHARACTER: NativeTable = &[
    ("=", 1, identical),
    ("value", 0, char_value),
    ("asInteger", 0, char_value),
    ("asCharacter", 0, yourself),
];

const CHARACTER_CLASS: NativeTable = &[("value:", 1, character_value)];

// --- collections

fn do_each(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let count = rt.send(receiver, "size", &[])?;
    let Value::Int(count) = count else {
        return fail(format!("{} is not a size", rt.describe(count)));
    };
    for i in 1..=count {
        let element = rt.send(receiver, "at:", &[Value::Int(i)])?;
        call(rt, args[0], &[element])?;
    }
    Ok(receiver)
}

const SEQUENCEABLE_COLLECTION: NativeTable = &[("do:", 1, do_each)];

const ARRAYED_COLLECTION: NativeTable = &[("size", 0, size)];

fn string_at(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    match basic_at(rt, receiver, args[0]) {
        Some(Value::Int(byte)) => Ok(rt.character(byte as u8 as char)),
        _ => out_of_bounds(rt, receiver, args[0]),
    }
}

fn string_at_put(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let Some(byte) = rt.char_value(args[1]).and_then(|c| u8::try_from(c as u32).ok()) else {
        return fail(format!("{} cannot be stored in a string", rt.describe(args[1])));
    };
    match basic_at_put(rt, receiver, args[0], Value::Int(byte as i64)) {
        Some(_) => Ok(args[1]),
        None => out_of_bounds(rt, receiver, args[0]),
    }
}

fn string_equal(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let other = args[0];
    if rt.is_symbol(receiver) && rt.is_symbol(other) {
        return Ok(rt.boolean(receiver.identical(other)));
    }
    let equal = match (rt.string_value(receiver), rt.string_value(other)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    Ok(rt.boolean(equal))
}

fn concatenate(rt: &mut Runtime, receiver: Value, args: &[Value]) -> Outcome {
    let head = text_arg(rt, receiver)?;
    let tail = text_arg(rt, args[0])?;
    Ok(rt.string(&(head + &tail)))
}

fn as_symbol(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    let text = text_arg(rt, receiver)?;
    Ok(rt.symbol(&text))
}

fn as_string(rt: &mut Runtime, receiver: Value, _: &[Value]) -> Outcome {
    let text = text_arg(rt, receiver)?;
    Ok(rt.string(&text))
}

const STRING: NativeTable = &[
    ("at:", 1, string_at),
    ("at:put:", 2, string_at_put),
    ("=", 1, string_equal),
    (",", 1, concatenate),
    ("asSymbol", 0, as_symbol),
    ("asString", 0, as_string),
];

const SYMBOL: NativeTable = &[
    ("=", 1, identical),
    ("asString", 0, as_string),
    ("asSymbol", 0, yourself),
];
