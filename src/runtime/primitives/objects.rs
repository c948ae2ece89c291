use crate::runtime::object::{ObjId, Value};
use crate::runtime::primitives::collections::{basic_at, basic_at_put};
use crate::runtime::primitives::{PrimitiveContext, PrimitiveMessage, PrimitiveResult};
use crate::runtime::{Outcome, Runtime, RuntimeError, Unwind, fail};

/// Arguments a selector takes: colons for keywords, one for binaries.
pub fn selector_arity(selector: &str) -> usize {
    match selector.chars().next() {
        Some(c) if c.is_alphabetic() || c == '_' => selector.matches(':').count(),
        Some(_) => 1,
        None => 0,
    }
}

/// Sends the message named by `selector` (a Symbol). With `start`, lookup
/// begins there, which must be in the receiver's class chain.
pub fn perform(rt: &mut Runtime, receiver: Value, selector: Value, args: &[Value], start: Option<ObjId>) -> Outcome {
    let name = match rt.string_value(selector) {
        Some(name) if rt.is_symbol(selector) => name,
        _ => return fail(format!("{} is not a selector", rt.describe(selector))),
    };
    let class = rt.class_of(receiver);
    let start = match start {
        Some(start) if !rt.inherits_from(class, start) => {
            return fail(format!(
                "{} is not a superclass of {}",
                rt.class_name(start),
                rt.class_name(class)
            ));
        }
        Some(start) => start,
        None => class,
    };
    let Some(method) = rt.lookup(start, &name) else {
        return Err(Unwind::Error(RuntimeError::Failed {
            message: format!("no such method #{}", name),
            receiver: Some(rt.describe(receiver)),
        }));
    };
    rt.invoke(&method, receiver, &name, args)
}

/// Slot `index` counting named instance variables first, then indexed slots.
pub fn inst_var_at(rt: &mut Runtime, receiver: Value, index: i64) -> Option<Value> {
    let id = receiver.as_obj()?;
    let named = rt.object(id).inst_vars.len() as i64;
    match index {
        1.. if index <= named => rt.object(id).inst_vars.get(index as usize - 1).copied(),
        1.. => basic_at(rt, receiver, Value::Int(index - named)),
        _ => None,
    }
}

pub fn inst_var_at_put(rt: &mut Runtime, receiver: Value, index: i64, value: Value) -> Option<Value> {
    let id = receiver.as_obj()?;
    let named = rt.object(id).inst_vars.len() as i64;
    match index {
        1.. if index <= named => {
            rt.object_mut(id).inst_vars[index as usize - 1] = value;
            Some(value)
        }
        1.. => basic_at_put(rt, receiver, Value::Int(index - named), value),
        _ => None,
    }
}

fn basic_new(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Some(class) = ctx.receiver_obj() else { return Ok(None) };
    Ok(ctx.runtime.instantiate(class, 0).ok())
}

fn basic_new_sized(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let (Some(class), Some(size)) = (ctx.receiver_obj(), ctx.int_arg(0)) else { return Ok(None) };
    let Ok(size) = usize::try_from(size) else { return Ok(None) };
    let indexable = ctx.runtime.behavior(class).is_some_and(|b| b.kind.is_indexable());
    if !indexable {
        return Ok(None);
    }
    Ok(ctx.runtime.instantiate(class, size).ok())
}

fn prim_inst_var_at(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Some(index) = ctx.int_arg(0) else { return Ok(None) };
    Ok(inst_var_at(ctx.runtime, ctx.receiver, index))
}

fn prim_inst_var_at_put(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let (Some(index), Some(value)) = (ctx.int_arg(0), ctx.arg(1)) else { return Ok(None) };
    Ok(inst_var_at_put(ctx.runtime, ctx.receiver, index, value))
}

fn identity_hash(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let hash = ctx.runtime.identity_hash(ctx.receiver);
    Ok(Some(Value::Int(hash)))
}

fn selector_takes(rt: &Runtime, selector: Value, count: usize) -> bool {
    rt.is_symbol(selector)
        && rt
            .string_value(selector)
            .is_some_and(|name| selector_arity(&name) == count)
}

/// `perform:` and `perform:with:`... the selector is the first argument.
fn perform_with(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Some((&selector, args)) = ctx.arguments.split_first() else { return Ok(None) };
    if !selector_takes(ctx.runtime, selector, args.len()) {
        return Ok(None);
    }
    perform(ctx.runtime, ctx.receiver, selector, args, None).map(Some)
}

fn perform_with_arguments(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let (Some(selector), Some(array)) = (ctx.arg(0), ctx.arg(1)) else { return Ok(None) };
    let Some(args) = ctx.runtime.array_items(array) else { return Ok(None) };
    if !selector_takes(ctx.runtime, selector, args.len()) {
        return Ok(None);
    }
    perform(ctx.runtime, ctx.receiver, selector, &args, None).map(Some)
}

fn perform_in_superclass(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let (Some(selector), Some(array), Some(Value::Obj(start))) = (ctx.arg(0), ctx.arg(1), ctx.arg(2)) else {
        return Ok(None);
    };
    let Some(args) = ctx.runtime.array_items(array) else { return Ok(None) };
    let class = ctx.runtime.class_of(ctx.receiver);
    if !selector_takes(ctx.runtime, selector, args.len()) || !ctx.runtime.inherits_from(class, start) {
        return Ok(None);
    }
    perform(ctx.runtime, ctx.receiver, selector, &args, Some(start)).map(Some)
}

fn identical(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Some(other) = ctx.arg(0) else { return Ok(None) };
    Ok(Some(ctx.runtime.boolean(ctx.receiver.identical(other))))
}

fn class(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    Ok(Some(Value::Obj(ctx.runtime.class_of(ctx.receiver))))
}

fn shallow_copy(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    Ok(Some(ctx.runtime.shallow_copy(ctx.receiver)))
}

pub static PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("70", 0, basic_new),
    PrimitiveMessage::new("71", 1, basic_new_sized),
    PrimitiveMessage::new("73", 1, prim_inst_var_at),
    PrimitiveMessage::new("74", 2, prim_inst_var_at_put),
    PrimitiveMessage::new("75", 0, identity_hash),
    PrimitiveMessage::variadic("83", perform_with),
    PrimitiveMessage::new("84", 2, perform_with_arguments),
    PrimitiveMessage::new("100", 3, perform_in_superclass),
    PrimitiveMessage::new("110", 1, identical),
    PrimitiveMessage::new("111", 0, class),
    PrimitiveMessage::new("148", 0, shallow_copy),
];
