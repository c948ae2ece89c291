pub mod heap;
pub mod inline;
pub mod method;

#[cfg(test)]
pub mod test;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{self, ClassDef, Node, PrimitiveId, SubclassKind};
use crate::bind::{ClassInfo, bind_names};
use crate::heap::{HeapError, HeapValue, ObjectGraph};
use crate::ir::{self, ClassDecl, ConstId, Constant, FALSE, NIL, TRUE};

use method::MethodTranslator;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("cascade head must be a message send, got {0}")]
    CascadeHead(String),

    #[error("cannot cascade messages to super")]
    SuperCascade,

    #[error("super used in {0}, which has no superclass")]
    SuperInRoot(String),

    #[error("No such class '{0}'")]
    NoSuchClass(String),

    #[error("class hierarchy has a cycle through {0}")]
    HierarchyCycle(String),

    #[error("unexpected <primitive:> in {0}")]
    MisplacedPrimitive(String),

    #[error("primitive {primitive} in {method} needs argument {index}")]
    PrimitiveArity {
        method: String,
        primitive: String,
        index: usize,
    },

    #[error("cannot assign to {0}")]
    BadAssignment(String),

    #[error("{0} is not a literal")]
    NotLiteral(String),

    #[error("identifier {0} was never bound")]
    Unbound(String),

    #[error("no pool named {0}")]
    NoSuchPool(String),

    #[error(transparent)]
    Heap(#[from] HeapError),
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Send `initialize` to every class that defines it on the class side,
    /// after the classes and the object graph are in place.
    pub initialize_classes: bool,
}

/// What the execution host already provides. The compiler asks before
/// compiling a method the host defines natively, to learn the layout of
/// classes the program does not define, and for primitive templates.
pub trait Host {
    fn has_native_method(&self, class: &str, class_side: bool, selector: &str) -> bool;

    /// True when some class in the host implements `selector` natively.
    fn implements(&self, selector: &str) -> bool;

    fn class_format(&self, class: &str) -> Option<SubclassKind>;

    /// Statements standing for primitive `id` of `module` in a method taking
    /// `arity` arguments. Argument `n` appears as `Expr::Placeholder(n)`.
    fn primitive_template(&self, module: Option<&str>, id: &PrimitiveId, arity: usize) -> Option<Vec<ir::Stmt>>;
}

/// The emitted program plus the global names nothing defined.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub program: ir::Program,
    pub unknown_globals: Vec<String>,
}

/// Whole-program compilation state. Every literal goes through one of the
/// per-kind caches, so identical literals anywhere share one constant.
pub struct Compilation<'a> {
    pub(crate) program: &'a ast::Program,
    pub(crate) host: &'a dyn Host,
    pub(crate) graph: Option<&'a ObjectGraph>,
    constants: Vec<Constant>,
    chars: HashMap<char, ConstId>,
    symbols: HashMap<String, ConstId>,
    strings: HashMap<String, ConstId>,
    integers: HashMap<i64, ConstId>,
    large_integers: HashMap<String, ConstId>,
    floats: HashMap<u64, ConstId>,
    arrays: HashMap<Vec<ConstId>, ConstId>,
    pools: HashMap<String, ConstId>,
    /// Selector to the literal its only implementation answers.
    pub(crate) inlinable: HashMap<String, Node>,
    known_globals: IndexSet<String>,
    unknown_globals: IndexSet<String>,
    next_symbol: usize,
}

impl<'a> Compilation<'a> {
    pub fn new(program: &'a ast::Program, graph: Option<&'a ObjectGraph>, host: &'a dyn Host) -> Self {
        let mut known_globals = IndexSet::new();
        if let Some(graph) = graph {
            for binding in &graph.bindings {
                if let crate::heap::Binding::Global { name, .. } = binding {
                    known_globals.insert(name.clone());
                }
            }
        }
        // globals the program assigns somewhere are defined by it
        for class in program.classes.values() {
            for entry in class.methods.values().chain(class.class_methods.values()) {
                for node in &entry.method.body {
                    node.walk(&mut |n| {
                        if let Node::Assign { target, .. } = n {
                            if let Node::Global(name) = target.as_ref() {
                                known_globals.insert(name.clone());
                            }
                        }
                    });
                }
            }
        }
        Compilation {
            program,
            host,
            graph,
            constants: vec![Constant::Nil, Constant::True, Constant::False],
            chars: HashMap::new(),
            symbols: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            large_integers: HashMap::new(),
            floats: HashMap::new(),
            arrays: HashMap::new(),
            pools: HashMap::new(),
            inlinable: inline::inlinable_selectors(program, host),
            known_globals,
            unknown_globals: IndexSet::new(),
            next_symbol: 0,
        }
    }

    /// A fresh synthetic name, `$1`, `$2`, ...
    pub fn gensym(&mut self) -> String {
        self.next_symbol += 1;
        format!("${}", self.next_symbol)
    }

    fn push(&mut self, constant: Constant) -> ConstId {
        self.constants.push(constant);
        self.constants.len() - 1
    }

    fn cached<K: std::hash::Hash + Eq>(
        constants: &mut Vec<Constant>,
        cache: &mut HashMap<K, ConstId>,
        key: K,
        make: impl FnOnce() -> Constant,
    ) -> ConstId {
        *cache.entry(key).or_insert_with(|| {
            constants.push(make());
            constants.len() - 1
        })
    }

    pub fn symbol(&mut self, name: &str) -> ConstId {
        Self::cached(&mut self.constants, &mut self.symbols, name.to_string(), || {
            Constant::Symbol(name.to_string())
        })
    }

    /// Pools a literal node and answers its constant id.
    pub fn constant(&mut self, node: &Node) -> Result<ConstId> {
        Ok(match node {
            Node::Nil => NIL,
            Node::True => TRUE,
            Node::False => FALSE,
            Node::Character(c) => {
                Self::cached(&mut self.constants, &mut self.chars, *c, || Constant::Character(*c))
            }
            Node::Symbol(s) => self.symbol(s),
            Node::String(s) => Self::cached(&mut self.constants, &mut self.strings, s.clone(), || {
                Constant::String(s.clone())
            }),
            Node::Integer(n) => {
                Self::cached(&mut self.constants, &mut self.integers, *n, || Constant::SmallInteger(*n))
            }
            Node::LargeInteger(text) => {
                let (negative, hex) = match text.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, text.as_str()),
                };
                Self::cached(&mut self.constants, &mut self.large_integers, text.clone(), || {
                    Constant::LargeInteger {
                        negative,
                        hex: hex.to_string(),
                    }
                })
            }
            Node::Float(x) => {
                Self::cached(&mut self.constants, &mut self.floats, x.to_bits(), || Constant::Float(*x))
            }
            Node::ConstantArray(elements) => {
                let ids = elements
                    .iter()
                    .map(|e| self.constant(e))
                    .collect::<Result<Vec<_>>>()?;
                match self.arrays.get(&ids) {
                    Some(id) => *id,
                    None => {
                        let id = self.push(Constant::Array(ids.clone()));
                        self.arrays.insert(ids, id);
                        id
                    }
                }
            }
            other => return Err(CompileError::NotLiteral(format!("{:?}", other))),
        })
    }

    /// The constant for pool dictionary `name`, built from the object graph.
    /// Only entries with identifier keys and literal values make it in.
    pub fn pool(&mut self, name: &str) -> Result<ConstId> {
        if let Some(id) = self.pools.get(name) {
            return Ok(*id);
        }
        let Some(graph) = self.graph else {
            return Err(CompileError::NoSuchPool(name.to_string()));
        };
        let pools = graph.pools();
        let Some(entries) = pools.get(name) else {
            return Err(CompileError::NoSuchPool(name.to_string()));
        };
        let mut kept = vec![];
        for (key, value) in entries {
            match value {
                HeapValue::Literal(node) if is_identifier(key) => {
                    kept.push((key.to_string(), self.constant(node)?));
                }
                _ => log::debug!("pool {}: skipping entry {:?}", name, key),
            }
        }
        let id = self.push(Constant::Pool(kept));
        self.pools.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn class_def(&self, name: &str) -> Option<&'a ClassDef> {
        self.program.class(name)
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.program.class(name).is_some() || self.host.class_format(name).is_some()
    }

    pub fn class_kind(&self, name: &str) -> Option<SubclassKind> {
        match self.program.class(name) {
            Some(class) => Some(class.kind),
            None => self.host.class_format(name),
        }
    }

    /// Compile-time meaning of global `name`: a class reference when some
    /// class has that name, otherwise a run-time lookup.
    pub fn global(&mut self, name: &str) -> ir::Expr {
        if self.is_class(name) {
            return ir::Expr::ClassRef(name.to_string());
        }
        if !self.known_globals.contains(name) && self.unknown_globals.insert(name.to_string()) {
            log::warn!("unrecognized global: {}", name);
        }
        ir::Expr::Global(self.symbol(name))
    }

    /// Program classes, every superclass before its subclasses.
    pub fn class_order(&self) -> Result<Vec<&'a ClassDef>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            comp: &Compilation<'a>,
            class: &'a ClassDef,
            marks: &mut IndexMap<&'a str, Mark>,
            order: &mut Vec<&'a ClassDef>,
        ) -> Result<()> {
            match marks.get(class.name.as_str()) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(CompileError::HierarchyCycle(class.name.clone())),
                None => {}
            }
            marks.insert(&class.name, Mark::Visiting);
            if let Some(superclass) = &class.superclass {
                match comp.program.class(superclass) {
                    Some(parent) => visit(comp, parent, marks, order)?,
                    None if comp.host.class_format(superclass).is_some() => {}
                    None => return Err(CompileError::NoSuchClass(superclass.clone())),
                }
            }
            marks.insert(&class.name, Mark::Done);
            order.push(class);
            Ok(())
        }

        let mut marks = IndexMap::new();
        let mut order = vec![];
        for class in self.program.classes.values() {
            visit(self, class, &mut marks, &mut order)?;
        }
        Ok(order)
    }

    fn class_decl(&mut self, class: &'a ClassDef) -> Result<ClassDecl> {
        let mut decl = ClassDecl {
            name: class.name.clone(),
            superclass: class.superclass.clone(),
            kind: class.kind,
            inst_vars: class.inst_vars.clone(),
            class_vars: class.class_vars.clone(),
            class_inst_vars: class.class_inst_vars.clone(),
            instance_methods: vec![],
            class_methods: vec![],
            notes: class.weirdness.iter().map(|w| w.to_string()).collect(),
        };
        for class_side in [false, true] {
            for (selector, entry) in class.methods_of(class_side) {
                if self.host.has_native_method(&class.name, class_side, selector) {
                    log::debug!("{}>>{} is native, not compiled", class.name, selector);
                    continue;
                }
                let method = MethodTranslator::new(self, class, class_side).method(&entry.method)?;
                let methods = if class_side {
                    &mut decl.class_methods
                } else {
                    &mut decl.instance_methods
                };
                methods.push(Rc::new(method));
            }
        }
        Ok(decl)
    }

    pub fn finish(self, classes: Vec<ClassDecl>, heap: Option<ir::HeapInit>, initializers: Vec<String>) -> Compiled {
        Compiled {
            program: ir::Program {
                constants: self.constants,
                classes,
                heap,
                initializers,
            },
            unknown_globals: self.unknown_globals.into_iter().collect(),
        }
    }
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Binds names, then lowers every class of `program` (plus the object
/// graph, when given) into one host program.
pub fn compile_program(
    program: &ast::Program,
    graph: Option<&ObjectGraph>,
    host: &dyn Host,
    options: &CompileOptions,
) -> Result<Compiled> {
    let mut info = ClassInfo::new(program);
    if let Some(graph) = graph {
        for (pool, keys) in graph.pool_keys() {
            info = info.with_pool(pool, keys);
        }
    }
    let mut bound = program.clone();
    bind_names(&mut bound, &info);

    let mut comp = Compilation::new(&bound, graph, host);
    let order = comp.class_order()?;
    let mut classes = Vec::with_capacity(order.len());
    for class in &order {
        classes.push(comp.class_decl(class)?);
    }

    let heap = match graph {
        Some(graph) if !graph.is_empty() => Some(comp.heap_init(graph)?),
        _ => None,
    };

    let initializers = if options.initialize_classes {
        order
            .iter()
            .filter(|c| c.class_methods.contains_key("initialize"))
            .map(|c| c.name.clone())
            .collect()
    } else {
        vec![]
    };

    let compiled = comp.finish(classes, heap, initializers);
    log::info!(
        "compiled {} classes, {} constants",
        compiled.program.classes.len(),
        compiled.program.constants.len()
    );
    Ok(compiled)
}
