use std::collections::HashMap;

use crate::ast::PrimitiveId;
use crate::runtime::object::{ObjId, Value};
use crate::runtime::{Runtime, Unwind};

pub mod collections;
pub mod numbers;
pub mod objects;

/// What a primitive sees: the runtime, the receiver and its arguments.
pub struct PrimitiveContext<'rt, 'arg> {
    pub runtime: &'rt mut Runtime,
    pub receiver: Value,
    pub arguments: &'arg [Value],
}

/// `Ok(None)` is a primitive failure: the method's own statements run instead.
pub type PrimitiveResult = Result<Option<Value>, Unwind>;

pub type PrimitiveFunction = fn(&mut PrimitiveContext) -> PrimitiveResult;

#[derive(Clone, Copy)]
pub struct PrimitiveMessage {
    pub module: Option<&'static str>,
    pub name: &'static str,
    /// Argument count, receiver excluded; `None` takes the method's arguments.
    pub inputs: Option<usize>,
    pub ptr: PrimitiveFunction,
}

impl PrimitiveMessage {
    pub const fn new(name: &'static str, inputs: usize, ptr: PrimitiveFunction) -> Self {
        Self {
            module: None,
            name,
            inputs: Some(inputs),
            ptr,
        }
    }

    pub const fn variadic(name: &'static str, ptr: PrimitiveFunction) -> Self {
        Self {
            module: None,
            name,
            inputs: None,
            ptr,
        }
    }

    pub fn key(&self) -> String {
        match self.module {
            Some(module) => format!("{}_{}", module, self.name),
            None => self.name.to_string(),
        }
    }
}

/// `"N"` for numbered primitives, `"module_name"` for named ones.
pub fn key(module: Option<&str>, id: &PrimitiveId) -> String {
    let name = match id {
        PrimitiveId::Number(n) => n.to_string(),
        PrimitiveId::Named(name) => name.clone(),
    };
    match module {
        Some(module) => format!("{}_{}", module, name),
        None => name,
    }
}

pub fn table() -> HashMap<String, &'static PrimitiveMessage> {
    numbers::PRIMITIVES
        .iter()
        .chain(collections::PRIMITIVES)
        .chain(objects::PRIMITIVES)
        .map(|p| (p.key(), p))
        .collect()
}

impl PrimitiveContext<'_, '_> {
    pub fn arg(&self, n: usize) -> Option<Value> {
        self.arguments.get(n).copied()
    }

    pub fn int_arg(&self, n: usize) -> Option<i64> {
        match self.arg(n)? {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn receiver_obj(&self) -> Option<ObjId> {
        self.receiver.as_obj()
    }
}
