use crate::runtime::Runtime;
use crate::runtime::object::{Body, ObjId, Value};
use crate::runtime::primitives::{PrimitiveContext, PrimitiveMessage, PrimitiveResult};

/// Zero-based slot for a one-based Smalltalk index, if in bounds.
fn slot(rt: &Runtime, id: ObjId, index: Option<i64>) -> Option<usize> {
    let index = usize::try_from(index?).ok()?.checked_sub(1)?;
    (index < rt.object(id).body.len()).then_some(index)
}

/// Element `index` (one-based) of an indexable object.
pub fn basic_at(rt: &mut Runtime, receiver: Value, index: Value) -> Option<Value> {
    let id = receiver.as_obj()?;
    let Value::Int(index) = index else { return None };
    let i = slot(rt, id, Some(index))?;
    match &rt.object(id).body {
        Body::Pointers(items) => Some(items[i]),
        Body::Bytes(bytes) => Some(Value::Int(bytes[i] as i64)),
        Body::Words(words) => {
            let word = words[i] as i64;
            Some(rt.integer(word))
        }
        Body::Empty | Body::Block(_) => None,
    }
}

pub fn basic_at_put(rt: &mut Runtime, receiver: Value, index: Value, value: Value) -> Option<Value> {
    let id = receiver.as_obj()?;
    let Value::Int(index) = index else { return None };
    let i = slot(rt, id, Some(index))?;
    let word = match &rt.object(id).body {
        Body::Words(_) => rt.to_bigint(value)?.to_i64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    };
    match &mut rt.object_mut(id).body {
        Body::Pointers(items) => items[i] = value,
        Body::Bytes(bytes) => match value {
            Value::Int(n) => bytes[i] = u8::try_from(n).ok()?,
            _ => return None,
        },
        Body::Words(words) => words[i] = word?,
        Body::Empty | Body::Block(_) => return None,
    }
    Some(value)
}

pub fn basic_size(rt: &Runtime, receiver: Value) -> i64 {
    receiver.as_obj().map_or(0, |id| rt.object(id).body.len() as i64)
}

fn prim_at(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Some(index) = ctx.arg(0) else { return Ok(None) };
    Ok(basic_at(ctx.runtime, ctx.receiver, index))
}

fn prim_at_put(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let (Some(index), Some(value)) = (ctx.arg(0), ctx.arg(1)) else { return Ok(None) };
    Ok(basic_at_put(ctx.runtime, ctx.receiver, index, value))
}

fn prim_size(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    Ok(Some(Value::Int(basic_size(ctx.runtime, ctx.receiver))))
}

fn string_at(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Some(id) = ctx.receiver_obj() else { return Ok(None) };
    let Some(i) = slot(ctx.runtime, id, ctx.int_arg(0)) else { return Ok(None) };
    let byte = match &ctx.runtime.object(id).body {
        Body::Bytes(bytes) => bytes[i],
        _ => return Ok(None),
    };
    Ok(Some(ctx.runtime.character(byte as char)))
}

fn string_at_put(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let Some(id) = ctx.receiver_obj() else { return Ok(None) };
    let Some(i) = slot(ctx.runtime, id, ctx.int_arg(0)) else { return Ok(None) };
    let Some(value) = ctx.arg(1) else { return Ok(None) };
    let Some(byte) = ctx.runtime.char_value(value).and_then(|c| u8::try_from(c as u32).ok()) else {
        return Ok(None);
    };
    match &mut ctx.runtime.object_mut(id).body {
        Body::Bytes(bytes) => bytes[i] = byte,
        _ => return Ok(None),
    }
    Ok(Some(value))
}

/// `replaceFrom: start to: stop with: replacement startingAt: repStart`
/// between objects of the same shape.
fn replace_from_to(ctx: &mut PrimitiveContext) -> PrimitiveResult {
    let (Some(start), Some(stop), Some(replacement), Some(rep_start)) =
        (ctx.int_arg(0), ctx.int_arg(1), ctx.arg(2), ctx.int_arg(3))
    else {
        return Ok(None);
    };
    let (Some(target), Some(source)) = (ctx.receiver_obj(), replacement.as_obj()) else {
        return Ok(None);
    };
    let count = stop - start + 1;
    if count < 0 || start < 1 || rep_start < 1 {
        return Ok(None);
    }
    let (start, rep_start, count) = ((start - 1) as usize, (rep_start - 1) as usize, count as usize);
    let rt = &mut *ctx.runtime;
    if start + count > rt.object(target).body.len() || rep_start + count > rt.object(source).body.len() {
        return Ok(None);
    }
    let copied = match &rt.object(source).body {
        Body::Pointers(items) => Body::Pointers(items[rep_start..rep_start + count].to_vec()),
        Body::Bytes(bytes) => Body::Bytes(bytes[rep_start..rep_start + count].to_vec()),
        Body::Words(words) => Body::Words(words[rep_start..rep_start + count].to_vec()),
        Body::Empty | Body::Block(_) => return Ok(Some(ctx.receiver)),
    };
    match (&mut rt.object_mut(target).body, copied) {
        (Body::Pointers(to), Body::Pointers(from)) => to[start..start + count].copy_from_slice(&from),
        (Body::Bytes(to), Body::Bytes(from)) => to[start..start + count].copy_from_slice(&from),
        (Body::Words(to), Body::Words(from)) => to[start..start + count].copy_from_slice(&from),
        _ => return Ok(None),
    }
    Ok(Some(ctx.receiver))
}

pub static PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("60", 1, prim_at),
    PrimitiveMessage::new("61", 2, prim_at_put),
    PrimitiveMessage::new("62", 0, prim_size),
    PrimitiveMessage::new("63", 1, string_at),
    PrimitiveMessage::new("64", 2, string_at_put),
    PrimitiveMessage::new("105", 4, replace_from_to),
];
