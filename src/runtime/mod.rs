pub mod bootstrap;
pub mod eval;
pub mod natives;
pub mod object;
pub mod primitives;

#[cfg(test)]
pub mod test;

use indexmap::IndexMap;
use thiserror::Error;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::{PrimitiveId, SubclassKind};
use crate::bigint::BigInt;
use crate::compile::Host;
use crate::ir::{self, Constant, Expr, HeapPayload, HeapRecord, HeapValue, Stmt};

pub use object::{Behavior, Body, MethodImpl, NativeMethod, ObjId, Object, Value};
use object::{CompiledMethod, Unit};
use primitives::PrimitiveMessage;

/// Smallest SmallInteger.
pub const SMALL_MIN: i64 = -0x4000_0000;
/// Largest SmallInteger.
pub const SMALL_MAX: i64 = 0x3fff_ffff;

const MAX_DEPTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{receiver} does not understand #{selector}")]
    DoesNotUnderstand { receiver: String, selector: String },

    #[error("{message}{}", .receiver.as_ref().map(|r| format!(" (receiver: {})", r)).unwrap_or_default())]
    Failed {
        message: String,
        receiver: Option<String>,
    },

    #[error("block cannot return: {0} has already returned")]
    CannotReturn(String),

    #[error("#{selector} takes {expected} arguments, got {got}")]
    WrongArgumentCount {
        selector: String,
        expected: usize,
        got: usize,
    },

    #[error("undefined global {0}")]
    UndefinedGlobal(String),

    #[error("no class named {0}")]
    NoSuchClass(String),

    #[error("defClass cannot change the superclass of an existing class ({0})")]
    SuperclassChanged(String),

    #[error("stack overflow")]
    StackOverflow,
}

impl RuntimeError {
    pub fn failed(message: impl Into<String>) -> Self {
        RuntimeError::Failed {
            message: message.into(),
            receiver: None,
        }
    }
}

/// Control leaving a function other than by falling off its end: an answer
/// travelling to its home activation, or an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Unwind {
    Answer { token: u64, value: Value },
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

pub type Outcome = Result<Value, Unwind>;

pub(crate) fn fail<T>(message: impl Into<String>) -> Result<T, Unwind> {
    Err(Unwind::Error(RuntimeError::failed(message)))
}

/// Classes the runtime itself needs to name.
#[derive(Debug, Clone, Copy)]
pub struct CoreClasses {
    pub object: ObjId,
    pub behavior: ObjId,
    pub metaclass: ObjId,
    pub class: ObjId,
    pub undefined_object: ObjId,
    pub small_integer: ObjId,
    pub large_positive: ObjId,
    pub large_negative: ObjId,
    pub float: ObjId,
    pub true_class: ObjId,
    pub false_class: ObjId,
    pub character: ObjId,
    pub array: ObjId,
    pub string: ObjId,
    pub symbol: ObjId,
    pub block_context: ObjId,
}

/// The live object space the compiled program runs in.
pub struct Runtime {
    objects: Vec<Object>,
    pub(crate) nil: ObjId,
    pub(crate) true_obj: ObjId,
    pub(crate) false_obj: ObjId,
    pub(crate) core: CoreClasses,
    globals: IndexMap<String, Value>,
    symbols: HashMap<String, ObjId>,
    chars: Vec<ObjId>,
    primitives: HashMap<String, &'static PrimitiveMessage>,
    /// Every selector some class has a method for.
    selectors: HashSet<String>,
    next_hash: i64,
    next_token: u64,
    depth: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

impl Runtime {
    pub(crate) fn alloc(&mut self, class: ObjId, inst_vars: Vec<Value>, body: Body) -> ObjId {
        self.objects.push(Object {
            class,
            inst_vars,
            body,
            hash: None,
            behavior: None,
        });
        ObjId((self.objects.len() - 1) as u32)
    }

    pub fn object(&self, id: ObjId) -> &Object {
        &self.objects[id.index()]
    }

    pub(crate) fn object_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.index()]
    }

    pub(crate) fn behavior(&self, class: ObjId) -> Option<&Behavior> {
        self.objects.get(class.index())?.behavior.as_deref()
    }

    pub(crate) fn behavior_mut(&mut self, class: ObjId) -> Option<&mut Behavior> {
        self.objects.get_mut(class.index())?.behavior.as_deref_mut()
    }

    pub fn nil(&self) -> Value {
        Value::Obj(self.nil)
    }

    pub fn boolean(&self, b: bool) -> Value {
        Value::Obj(if b { self.true_obj } else { self.false_obj })
    }

    pub fn is_nil(&self, v: Value) -> bool {
        v.identical(self.nil())
    }

    pub fn is_true(&self, v: Value) -> bool {
        v.identical(Value::Obj(self.true_obj))
    }

    pub fn is_false(&self, v: Value) -> bool {
        v.identical(Value::Obj(self.false_obj))
    }

    pub fn class_of(&self, v: Value) -> ObjId {
        match v {
            Value::Int(_) => self.core.small_integer,
            Value::Float(_) => self.core.float,
            Value::Obj(id) => self.object(id).class,
        }
    }

    pub fn class_name(&self, class: ObjId) -> String {
        self.behavior(class).map_or_else(|| "?".to_string(), |b| b.name.clone())
    }

    /// The superclass chain of `class`, starting with `class` itself.
    pub fn chain(&self, class: ObjId) -> Vec<ObjId> {
        let mut chain = vec![];
        let mut next = Some(class);
        while let Some(c) = next {
            chain.push(c);
            next = self.behavior(c).and_then(|b| b.superclass);
        }
        chain
    }

    pub fn inherits_from(&self, class: ObjId, ancestor: ObjId) -> bool {
        self.chain(class).contains(&ancestor)
    }

    pub fn is_kind_of(&self, v: Value, class: ObjId) -> bool {
        self.inherits_from(self.class_of(v), class)
    }

    /// Instance variables of `class`'s instances, inherited ones first.
    pub fn all_inst_vars(&self, class: ObjId) -> Vec<String> {
        let mut names = vec![];
        for c in self.chain(class).into_iter().rev() {
            if let Some(b) = self.behavior(c) {
                names.extend(b.inst_vars.iter().cloned());
            }
        }
        names
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).copied()
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// The class object bound to global `name`.
    pub fn class_named(&self, name: &str) -> Option<ObjId> {
        let id = self.global(name)?.as_obj()?;
        self.behavior(id)?;
        Some(id)
    }

    pub fn lookup(&self, class: ObjId, selector: &str) -> Option<MethodImpl> {
        self.chain(class)
            .into_iter()
            .find_map(|c| self.behavior(c)?.methods.get(selector).cloned())
    }

    pub(crate) fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    // --- numbers

    pub fn integer(&mut self, n: i64) -> Value {
        if (SMALL_MIN..=SMALL_MAX).contains(&n) {
            Value::Int(n)
        } else {
            self.big_integer(&BigInt::from_i64(n))
        }
    }

    /// A SmallInteger when it fits, otherwise a LargePositiveInteger or
    /// LargeNegativeInteger holding the magnitude as little-endian bytes.
    pub fn big_integer(&mut self, n: &BigInt) -> Value {
        if let Some(small) = n.to_i64().filter(|v| (SMALL_MIN..=SMALL_MAX).contains(v)) {
            return Value::Int(small);
        }
        let class = if n.is_negative() {
            self.core.large_negative
        } else {
            self.core.large_positive
        };
        Value::Obj(self.alloc(class, vec![], Body::Bytes(n.abs().to_le_bytes())))
    }

    pub fn to_bigint(&self, v: Value) -> Option<BigInt> {
        match v {
            Value::Int(n) => Some(BigInt::from_i64(n)),
            Value::Obj(id) => {
                let object = self.object(id);
                let negative = if object.class == self.core.large_positive {
                    false
                } else if object.class == self.core.large_negative {
                    true
                } else {
                    return None;
                };
                match &object.body {
                    Body::Bytes(bytes) => Some(BigInt::from_le_bytes(bytes, negative)),
                    _ => None,
                }
            }
            Value::Float(_) => None,
        }
    }

    pub fn to_float(&self, v: Value) -> Option<f64> {
        match v {
            Value::Float(x) => Some(x),
            Value::Int(n) => Some(n as f64),
            other => self.to_bigint(other).map(|b| b.to_f64()),
        }
    }

    // --- characters, strings and symbols

    pub fn character(&mut self, c: char) -> Value {
        match self.chars.get(c as usize) {
            Some(id) => Value::Obj(*id),
            None => {
                let class = self.core.character;
                Value::Obj(self.alloc(class, vec![Value::Int(c as i64)], Body::Empty))
            }
        }
    }

    pub fn char_value(&self, v: Value) -> Option<char> {
        let id = v.as_obj()?;
        let object = self.object(id);
        if object.class != self.core.character {
            return None;
        }
        match object.inst_vars.first() {
            Some(Value::Int(code)) => char::from_u32(*code as u32),
            _ => None,
        }
    }

    fn latin1(s: &str) -> Vec<u8> {
        s.chars().map(|c| u8::try_from(c as u32).unwrap_or(b'?')).collect()
    }

    pub fn string(&mut self, s: &str) -> Value {
        let class = self.core.string;
        Value::Obj(self.alloc(class, vec![], Body::Bytes(Self::latin1(s))))
    }

    /// The one Symbol with text `s`.
    pub fn symbol(&mut self, s: &str) -> Value {
        if let Some(id) = self.symbols.get(s) {
            return Value::Obj(*id);
        }
        let class = self.core.symbol;
        let id = self.alloc(class, vec![], Body::Bytes(Self::latin1(s)));
        self.symbols.insert(s.to_string(), id);
        Value::Obj(id)
    }

    /// Text of a String or Symbol.
    pub fn string_value(&self, v: Value) -> Option<String> {
        let id = v.as_obj()?;
        let object = self.object(id);
        if !self.inherits_from(object.class, self.core.string) {
            return None;
        }
        match &object.body {
            Body::Bytes(bytes) => Some(bytes.iter().map(|b| *b as char).collect()),
            _ => None,
        }
    }

    pub fn is_symbol(&self, v: Value) -> bool {
        v.as_obj().is_some_and(|id| self.object(id).class == self.core.symbol)
    }

    // --- arrays and blocks

    pub fn array(&mut self, items: Vec<Value>) -> Value {
        let class = self.core.array;
        Value::Obj(self.alloc(class, vec![], Body::Pointers(items)))
    }

    pub fn array_items(&self, v: Value) -> Option<Vec<Value>> {
        match &self.object(v.as_obj()?).body {
            Body::Pointers(items) => Some(items.clone()),
            _ => None,
        }
    }

    pub(crate) fn closure(&self, v: Value) -> Option<Rc<object::Closure>> {
        match &self.object(v.as_obj()?).body {
            Body::Block(closure) => Some(closure.clone()),
            _ => None,
        }
    }

    // --- instance creation and identity

    /// A new instance with nil instance variables and `size` indexed slots.
    pub fn instantiate(&mut self, class: ObjId, size: usize) -> Result<Value, RuntimeError> {
        let Some(kind) = self.behavior(class).map(|b| b.kind) else {
            return Err(RuntimeError::failed("instantiating a non-class"));
        };
        let body = match kind {
            SubclassKind::Fixed if size > 0 => {
                return Err(RuntimeError::failed(format!(
                    "{} cannot have variable sized instances",
                    self.class_name(class)
                )));
            }
            SubclassKind::Fixed => Body::Empty,
            SubclassKind::Variable | SubclassKind::Weak => Body::Pointers(vec![self.nil(); size]),
            SubclassKind::Word => Body::Words(vec![0; size]),
            SubclassKind::Byte => Body::Bytes(vec![0; size]),
        };
        let inst_vars = vec![self.nil(); self.all_inst_vars(class).len()];
        Ok(Value::Obj(self.alloc(class, inst_vars, body)))
    }

    /// Assigned on first request and remembered.
    pub fn identity_hash(&mut self, v: Value) -> i64 {
        match v {
            Value::Int(n) => n,
            Value::Float(x) => (x.to_bits() as i64) & SMALL_MAX,
            Value::Obj(id) => {
                if let Some(hash) = self.object(id).hash {
                    return hash;
                }
                let hash = self.next_hash;
                self.next_hash += 1;
                self.object_mut(id).hash = Some(hash);
                hash
            }
        }
    }

    /// Copies instance variables and indexed slots; referenced objects are shared.
    /// Unique objects (nil, booleans, symbols, characters) answer themselves.
    pub fn shallow_copy(&mut self, v: Value) -> Value {
        match v {
            Value::Obj(id) if !self.is_unique(id) => {
                let mut copy = self.object(id).clone();
                copy.hash = None;
                self.objects.push(copy);
                Value::Obj(ObjId((self.objects.len() - 1) as u32))
            }
            other => other,
        }
    }

    fn is_unique(&self, id: ObjId) -> bool {
        let class = self.object(id).class;
        id == self.nil
            || id == self.true_obj
            || id == self.false_obj
            || class == self.core.symbol
            || class == self.core.character
    }

    fn inst_var_index(&self, receiver: ObjId, name: &str) -> Option<usize> {
        let class = self.object(receiver).class;
        self.all_inst_vars(class).iter().position(|n| n == name)
    }

    pub fn inst_var(&self, receiver: Value, name: &str) -> Result<Value, RuntimeError> {
        let id = receiver
            .as_obj()
            .ok_or_else(|| RuntimeError::failed(format!("{} has no instance variable {}", self.describe(receiver), name)))?;
        let index = self
            .inst_var_index(id, name)
            .ok_or_else(|| RuntimeError::failed(format!("no instance variable {}", name)))?;
        Ok(self.object(id).inst_vars.get(index).copied().unwrap_or(self.nil()))
    }

    pub fn set_inst_var(&mut self, receiver: Value, name: &str, value: Value) -> Result<(), RuntimeError> {
        let id = receiver
            .as_obj()
            .ok_or_else(|| RuntimeError::failed(format!("{} has no instance variable {}", self.describe(receiver), name)))?;
        let index = self
            .inst_var_index(id, name)
            .ok_or_else(|| RuntimeError::failed(format!("no instance variable {}", name)))?;
        let nil = self.nil();
        let slots = &mut self.object_mut(id).inst_vars;
        if slots.len() <= index {
            slots.resize(index + 1, nil);
        }
        slots[index] = value;
        Ok(())
    }

    pub fn class_var(&self, class: &str, name: &str) -> Result<Value, RuntimeError> {
        let id = self
            .class_named(class)
            .ok_or_else(|| RuntimeError::NoSuchClass(class.to_string()))?;
        self.behavior(id)
            .and_then(|b| b.class_vars.get(name).copied())
            .ok_or_else(|| RuntimeError::failed(format!("{} has no class variable {}", class, name)))
    }

    pub fn set_class_var(&mut self, class: &str, name: &str, value: Value) -> Result<(), RuntimeError> {
        let id = self
            .class_named(class)
            .ok_or_else(|| RuntimeError::NoSuchClass(class.to_string()))?;
        if let Some(behavior) = self.behavior_mut(id) {
            behavior.class_vars.insert(name.to_string(), value);
        }
        Ok(())
    }

    // --- printing

    /// A printString-like rendering, used for results and error messages.
    pub fn describe(&self, v: Value) -> String {
        self.describe_depth(v, 0)
    }

    fn describe_depth(&self, v: Value, depth: usize) -> String {
        match v {
            Value::Int(n) => n.to_string(),
            Value::Float(x) => {
                if x.is_finite() && x == x.trunc() && x.abs() < 1e16 {
                    format!("{:.1}", x)
                } else {
                    format!("{}", x)
                }
            }
            Value::Obj(id) => {
                if id == self.nil {
                    return "nil".to_string();
                }
                if id == self.true_obj {
                    return "true".to_string();
                }
                if id == self.false_obj {
                    return "false".to_string();
                }
                let object = self.object(id);
                if let Some(behavior) = &object.behavior {
                    return behavior.name.clone();
                }
                if let Some(n) = self.to_bigint(v) {
                    return n.to_string();
                }
                if let Some(c) = self.char_value(v) {
                    return format!("${}", c);
                }
                if let Some(s) = self.string_value(v) {
                    return if object.class == self.core.symbol {
                        format!("#{}", s)
                    } else {
                        format!("'{}'", s.replace('\'', "''"))
                    };
                }
                if object.class == self.core.array {
                    if depth > 3 {
                        return "#(...)".to_string();
                    }
                    let items = match &object.body {
                        Body::Pointers(items) => items
                            .iter()
                            .map(|i| self.describe_depth(*i, depth + 1))
                            .collect::<Vec<_>>(),
                        _ => vec![],
                    };
                    return format!("#({})", items.join(" "));
                }
                let name = self.class_name(object.class);
                let article = if name.starts_with(['A', 'E', 'I', 'O', 'U']) { "an" } else { "a" };
                format!("{} {}", article, name)
            }
        }
    }

    // --- sending

    /// Sends `selector` to `receiver` from outside any method.
    pub fn send_message(&mut self, receiver: Value, selector: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        match self.send(receiver, selector, args) {
            Ok(v) => Ok(v),
            Err(Unwind::Error(e)) => Err(e),
            Err(Unwind::Answer { .. }) => Err(RuntimeError::CannotReturn("a block".to_string())),
        }
    }

    /// Sends unary `selector` to the class named `class`.
    pub fn run(&mut self, class: &str, selector: &str) -> Result<Value, RuntimeError> {
        let receiver = self
            .class_named(class)
            .ok_or_else(|| RuntimeError::NoSuchClass(class.to_string()))?;
        self.send_message(Value::Obj(receiver), selector, &[])
    }

    pub(crate) fn send(&mut self, receiver: Value, selector: &str, args: &[Value]) -> Outcome {
        let class = self.class_of(receiver);
        self.send_from(class, receiver, selector, args)
    }

    /// Dispatch with lookup starting at `class`.
    pub(crate) fn send_from(&mut self, class: ObjId, receiver: Value, selector: &str, args: &[Value]) -> Outcome {
        match self.lookup(class, selector) {
            Some(method) => self.invoke(&method, receiver, selector, args),
            None => Err(Unwind::Error(RuntimeError::DoesNotUnderstand {
                receiver: self.describe(receiver),
                selector: selector.to_string(),
            })),
        }
    }

    pub(crate) fn invoke(&mut self, method: &MethodImpl, receiver: Value, selector: &str, args: &[Value]) -> Outcome {
        let expected = match method {
            MethodImpl::Native(native) => native.arity,
            MethodImpl::Compiled(compiled) => compiled.method.params.len(),
        };
        if expected != args.len() {
            return Err(Unwind::Error(RuntimeError::WrongArgumentCount {
                selector: selector.to_string(),
                expected,
                got: args.len(),
            }));
        }
        if self.depth >= MAX_DEPTH {
            return Err(Unwind::Error(RuntimeError::StackOverflow));
        }
        self.depth += 1;
        let result = match method {
            MethodImpl::Native(native) => (native.function)(self, receiver, args),
            MethodImpl::Compiled(compiled) => self.call_method(compiled, receiver, args),
        };
        self.depth -= 1;
        result
    }

    // --- loading

    fn realize(&mut self, constant: &Constant, done: &[Value]) -> Value {
        match constant {
            Constant::Nil | Constant::Pool(_) => self.nil(),
            Constant::True => self.boolean(true),
            Constant::False => self.boolean(false),
            Constant::Character(c) => self.character(*c),
            Constant::Symbol(s) => self.symbol(s),
            Constant::String(s) => self.string(s),
            Constant::SmallInteger(n) => self.integer(*n),
            Constant::LargeInteger { negative, hex } => match BigInt::from_hex(hex, *negative) {
                Some(n) => self.big_integer(&n),
                None => self.nil(),
            },
            Constant::Float(x) => Value::Float(*x),
            Constant::Array(ids) => {
                let nil = self.nil();
                let items = ids.iter().map(|k| done.get(*k).copied().unwrap_or(nil)).collect();
                self.array(items)
            }
        }
    }

    fn unit(&mut self, program: &ir::Program) -> Unit {
        let mut unit = Unit::default();
        for (id, constant) in program.constants.iter().enumerate() {
            let value = self.realize(constant, &unit.constants);
            unit.constants.push(value);
            if let Constant::Pool(entries) = constant {
                let nil = self.nil();
                let pool = entries
                    .iter()
                    .map(|(key, k)| (key.clone(), unit.constants.get(*k).copied().unwrap_or(nil)))
                    .collect();
                unit.pools.insert(id, pool);
            }
        }
        unit
    }

    fn heap_value(&self, unit: &Unit, records: &[Value], value: &HeapValue) -> Result<Value, RuntimeError> {
        match value {
            HeapValue::Const(k) => unit
                .constants
                .get(*k)
                .copied()
                .ok_or_else(|| RuntimeError::failed(format!("no constant {}", k))),
            HeapValue::Ref(i) => records
                .get(*i)
                .copied()
                .ok_or_else(|| RuntimeError::failed(format!("no heap record {}", i + 1))),
        }
    }

    fn load_heap(&mut self, unit: &Unit, heap: &ir::HeapInit) -> Result<(), RuntimeError> {
        let mut records = Vec::with_capacity(heap.records.len());
        for record in &heap.records {
            let value = match record {
                HeapRecord::Class(name) => Value::Obj(
                    self.class_named(name)
                        .ok_or_else(|| RuntimeError::NoSuchClass(name.clone()))?,
                ),
                HeapRecord::Object { class, .. } => {
                    let class = self
                        .class_named(class)
                        .ok_or_else(|| RuntimeError::NoSuchClass(class.clone()))?;
                    let inst_vars = vec![self.nil(); self.all_inst_vars(class).len()];
                    Value::Obj(self.alloc(class, inst_vars, Body::Empty))
                }
            };
            records.push(value);
        }

        // every record exists now, so references may point anywhere
        for (record, target) in heap.records.iter().zip(&records) {
            let HeapRecord::Object {
                inst_vars, payload, ..
            } = record
            else {
                continue;
            };
            let Some(id) = target.as_obj() else { continue };
            let values = inst_vars
                .iter()
                .map(|v| self.heap_value(unit, &records, v))
                .collect::<Result<Vec<_>, _>>()?;
            let body = match payload {
                HeapPayload::None => Body::Empty,
                HeapPayload::Values(items) => Body::Pointers(
                    items
                        .iter()
                        .map(|v| self.heap_value(unit, &records, v))
                        .collect::<Result<_, _>>()?,
                ),
                HeapPayload::Bytes(bytes) => Body::Bytes(bytes.clone()),
                HeapPayload::Words(words) => Body::Words(words.clone()),
            };
            let object = self.object_mut(id);
            for (slot, value) in object.inst_vars.iter_mut().zip(values) {
                *slot = value;
            }
            object.body = body;
        }

        for (name, value) in &heap.globals {
            let value = self.heap_value(unit, &records, value)?;
            self.set_global(name.clone(), value);
        }
        for (class, name, value) in &heap.class_vars {
            let value = self.heap_value(unit, &records, value)?;
            self.set_class_var(class, name, value)?;
        }
        Ok(())
    }

    /// Defines the program's classes, builds its object graph and runs its
    /// class initialisers.
    pub fn load(&mut self, program: &ir::Program) -> Result<(), RuntimeError> {
        let unit = Rc::new(self.unit(program));

        for decl in &program.classes {
            let superclass = match &decl.superclass {
                Some(name) => Some(
                    self.class_named(name)
                        .ok_or_else(|| RuntimeError::NoSuchClass(name.clone()))?,
                ),
                None => None,
            };
            let class = self.def_class(&decl.name, superclass, decl.kind, &decl.inst_vars, &decl.class_vars)?;
            self.add_class_inst_vars(class, &decl.class_inst_vars);
            let metaclass = self.object(class).class;
            for (target, methods) in [(class, &decl.instance_methods), (metaclass, &decl.class_methods)] {
                for method in methods {
                    self.add_method(
                        target,
                        &method.selector,
                        MethodImpl::Compiled(CompiledMethod {
                            method: method.clone(),
                            unit: unit.clone(),
                        }),
                    );
                }
            }
        }

        if let Some(heap) = &program.heap {
            self.load_heap(&unit, heap)?;
        }

        for name in &program.initializers {
            self.run(name, "initialize")?;
        }
        log::info!("loaded {} classes", program.classes.len());
        Ok(())
    }
}

impl Host for Runtime {
    fn has_native_method(&self, class: &str, class_side: bool, selector: &str) -> bool {
        let Some(mut id) = self.class_named(class) else {
            return false;
        };
        if class_side {
            id = self.object(id).class;
        }
        self.behavior(id)
            .is_some_and(|b| matches!(b.methods.get(selector), Some(MethodImpl::Native(_))))
    }

    fn implements(&self, selector: &str) -> bool {
        self.selectors.contains(selector)
    }

    fn class_format(&self, class: &str) -> Option<SubclassKind> {
        self.class_named(class).and_then(|id| self.behavior(id)).map(|b| b.kind)
    }

    fn primitive_template(&self, module: Option<&str>, id: &PrimitiveId, arity: usize) -> Option<Vec<Stmt>> {
        let key = primitives::key(module, id);
        let primitive = self.primitives.get(&key)?;
        let inputs = primitive.inputs.unwrap_or(arity);
        let mut args = vec![Expr::This];
        args.extend((0..inputs).map(Expr::Placeholder));
        Some(vec![Stmt::TryPrimitive { key, args }])
    }
}
