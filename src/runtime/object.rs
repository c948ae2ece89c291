use indexmap::IndexMap;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::SubclassKind;
use crate::ir::{self, ConstId};
use crate::runtime::{Runtime, Unwind};

/// Index of an object in the runtime's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub(crate) u32);

impl ObjId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Small integers and floats are immediate; everything else lives in the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Obj(ObjId),
}

impl Value {
    /// `==`: the same object, or equal immediates.
    pub fn identical(self, other: Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Obj(a), Value::Obj(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_obj(self) -> Option<ObjId> {
        match self {
            Value::Obj(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Pointers(Vec<Value>),
    Bytes(Vec<u8>),
    Words(Vec<u32>),
    Block(Rc<Closure>),
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Body::Empty | Body::Block(_) => 0,
            Body::Pointers(v) => v.len(),
            Body::Bytes(b) => b.len(),
            Body::Words(w) => w.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub class: ObjId,
    pub inst_vars: Vec<Value>,
    pub body: Body,
    pub hash: Option<i64>,
    /// Present on classes and metaclasses.
    pub behavior: Option<Box<Behavior>>,
}

pub type NativeFunction = fn(&mut Runtime, Value, &[Value]) -> Result<Value, Unwind>;

#[derive(Clone, Copy)]
pub struct NativeMethod {
    pub arity: usize,
    pub function: NativeFunction,
}

impl std::fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native/{}>", self.arity)
    }
}

/// Constants and pools of one loaded program, shared by its methods.
#[derive(Debug, Default)]
pub struct Unit {
    pub constants: Vec<Value>,
    pub pools: HashMap<ConstId, IndexMap<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct CompiledMethod {
    pub method: Rc<ir::Method>,
    pub unit: Rc<Unit>,
}

#[derive(Debug, Clone)]
pub enum MethodImpl {
    Native(NativeMethod),
    Compiled(CompiledMethod),
}

#[derive(Debug, Clone)]
pub struct Behavior {
    pub name: String,
    pub superclass: Option<ObjId>,
    pub methods: IndexMap<String, MethodImpl>,
    /// Own instance variables; inherited ones come first in instances.
    pub inst_vars: Vec<String>,
    pub kind: SubclassKind,
    pub class_vars: IndexMap<String, Value>,
    /// For a metaclass, its sole instance.
    pub this_class: Option<ObjId>,
}

impl Behavior {
    pub fn new(name: impl Into<String>, superclass: Option<ObjId>, kind: SubclassKind) -> Self {
        Behavior {
            name: name.into(),
            superclass,
            methods: IndexMap::new(),
            inst_vars: vec![],
            kind,
            class_vars: IndexMap::new(),
            this_class: None,
        }
    }
}

/// One method activation. Blocks keep their home activation so `^` can
/// find it; `live` turns false once the method has returned.
#[derive(Debug)]
pub struct Activation {
    pub receiver: Value,
    pub token: u64,
    pub live: Cell<bool>,
    pub label: String,
}

/// Variables of one function activation, chained to the lexically
/// enclosing one.
#[derive(Debug)]
pub struct Scope {
    vars: RefCell<Vec<(String, Value)>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new(parent: Option<Rc<Scope>>, vars: Vec<(String, Value)>) -> Rc<Self> {
        Rc::new(Scope {
            vars: RefCell::new(vars),
            parent,
        })
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let found = self
            .vars
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v);
        match found {
            Some(v) => Some(v),
            None => self.parent.as_ref()?.get(name),
        }
    }

    pub fn set(&self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.vars.borrow_mut().iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.set(name, value),
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct Closure {
    pub block: Rc<ir::Block>,
    pub scope: Rc<Scope>,
    pub home: Rc<Activation>,
    pub unit: Rc<Unit>,
}
