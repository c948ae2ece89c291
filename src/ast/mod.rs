use indexmap::IndexMap;

use std::fmt;

#[cfg(test)]
pub mod test;

/// Smallest small-integer literal, exclusive.
pub const SMALL_INT_LITERAL_MIN: i64 = -0x4000_0000;
/// Largest small-integer literal, inclusive.
pub const SMALL_INT_LITERAL_MAX: i64 = 0x3fff_ffff;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    // pseudo-variables
    Nil,
    True,
    False,
    SelfRef,
    Super,
    ThisContext,

    // literals
    Character(char),
    String(String),
    Symbol(String),
    Integer(i64),
    /// Sign and upper-case hex digits, e.g. `-FC000000`.
    LargeInteger(String),
    Float(f64),
    ConstantArray(Vec<Node>),
    ArrayExpr(Vec<Node>),

    // variables
    Identifier(String),
    Local(String),
    InstVar(String),
    ClassVar { class: String, name: String },
    PoolVar { pool: String, name: String },
    Global(String),

    MessageExpr {
        receiver: Box<Node>,
        message: Message,
    },
    Cascade {
        head: Box<Node>,
        messages: Vec<Message>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    Primitive(Primitive),
    Answer(Box<Node>),
    Block(Block),
    ExprSeq(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub selector: String,
    pub args: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub params: Vec<String>,
    pub locals: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveId {
    Number(u32),
    Named(String),
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveId::Number(n) => write!(f, "{}", n),
            PrimitiveId::Named(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub id: PrimitiveId,
    pub module: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub selector: String,
    pub args: Vec<String>,
    pub locals: Vec<String>,
    pub body: Vec<Node>,
}

/// Storage layout of a class's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubclassKind {
    Fixed,
    Variable,
    Weak,
    Word,
    Byte,
}

impl SubclassKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "subclass" => SubclassKind::Fixed,
            "variableSubclass" => SubclassKind::Variable,
            "weakSubclass" => SubclassKind::Weak,
            "variableWordSubclass" => SubclassKind::Word,
            "variableByteSubclass" => SubclassKind::Byte,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SubclassKind::Fixed => "subclass",
            SubclassKind::Variable => "variableSubclass",
            SubclassKind::Weak => "weakSubclass",
            SubclassKind::Word => "variableWordSubclass",
            SubclassKind::Byte => "variableByteSubclass",
        }
    }

    pub fn flags(self) -> u8 {
        match self {
            SubclassKind::Fixed => 0,
            SubclassKind::Variable => 1,
            SubclassKind::Weak => 2,
            SubclassKind::Word => 3,
            SubclassKind::Byte => 4,
        }
    }

    pub fn is_indexable(self) -> bool {
        self != SubclassKind::Fixed
    }
}

/// Unusual directives kept for diagnostic output.
#[derive(Debug, Clone, PartialEq)]
pub enum Weirdness {
    InstanceVariableNames(Vec<String>),
}

impl fmt::Display for Weirdness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weirdness::InstanceVariableNames(names) => {
                write!(f, "class instanceVariableNames: '{}'", names.join(" "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodEntry {
    pub category: String,
    /// Byte offset of the defining directive in the source file.
    pub offset: usize,
    pub method: MethodDef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub superclass: Option<String>,
    pub kind: SubclassKind,
    pub inst_vars: Vec<String>,
    pub class_vars: Vec<String>,
    pub pools: Vec<String>,
    pub category: String,
    pub methods: IndexMap<String, MethodEntry>,
    pub class_methods: IndexMap<String, MethodEntry>,
    /// Instance variables of the metaclass, from `Foo class instanceVariableNames:`.
    pub class_inst_vars: Vec<String>,
    pub weirdness: Vec<Weirdness>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, superclass: Option<String>, kind: SubclassKind) -> Self {
        ClassDef {
            name: name.into(),
            superclass,
            kind,
            inst_vars: vec![],
            class_vars: vec![],
            pools: vec![],
            category: String::new(),
            methods: IndexMap::new(),
            class_methods: IndexMap::new(),
            class_inst_vars: vec![],
            weirdness: vec![],
        }
    }

    pub fn methods_of(&self, class_side: bool) -> &IndexMap<String, MethodEntry> {
        if class_side {
            &self.class_methods
        } else {
            &self.methods
        }
    }
}

/// A whole parsed source file: classes in definition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub classes: IndexMap<String, ClassDef>,
}

impl Program {
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn method_count(&self) -> usize {
        self.classes
            .values()
            .map(|c| c.methods.len() + c.class_methods.len())
            .sum()
    }
}

/// Splits a space-separated variable-name list, as found in class definitions.
pub fn variable_names(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

impl Node {
    pub fn message(receiver: Node, selector: impl Into<String>, args: Vec<Node>) -> Node {
        Node::MessageExpr {
            receiver: Box::new(receiver),
            message: Message {
                selector: selector.into(),
                args,
            },
        }
    }

    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::ConstantArray(elements) | Node::ArrayExpr(elements) | Node::ExprSeq(elements) => {
                elements.iter().collect()
            }
            Node::MessageExpr { receiver, message } => std::iter::once(receiver.as_ref())
                .chain(message.args.iter())
                .collect(),
            Node::Cascade { head, messages } => std::iter::once(head.as_ref())
                .chain(messages.iter().flat_map(|m| m.args.iter()))
                .collect(),
            Node::Assign { target, value } => vec![target.as_ref(), value.as_ref()],
            Node::Answer(expr) => vec![expr.as_ref()],
            Node::Block(block) => block.body.iter().collect(),
            _ => vec![],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Node> {
        match self {
            Node::ConstantArray(elements) | Node::ArrayExpr(elements) | Node::ExprSeq(elements) => {
                elements.iter_mut().collect()
            }
            Node::MessageExpr { receiver, message } => std::iter::once(receiver.as_mut())
                .chain(message.args.iter_mut())
                .collect(),
            Node::Cascade { head, messages } => std::iter::once(head.as_mut())
                .chain(messages.iter_mut().flat_map(|m| m.args.iter_mut()))
                .collect(),
            Node::Assign { target, value } => vec![target.as_mut(), value.as_mut()],
            Node::Answer(expr) => vec![expr.as_mut()],
            Node::Block(block) => block.body.iter_mut().collect(),
            _ => vec![],
        }
    }

    /// Depth-first rewrite: children are rewritten first, then `f` is applied
    /// to the node itself. Subtrees `f` leaves alone are kept in place, so no
    /// allocation happens off the path of a change.
    pub fn transform<F: FnMut(Node) -> Node>(&mut self, f: &mut F) {
        for child in self.children_mut() {
            child.transform(f);
        }
        let node = std::mem::replace(self, Node::Nil);
        *self = f(node);
    }

    /// Pre-order walk over the node and all its descendants.
    pub fn walk<F: FnMut(&Node)>(&self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(
            self,
            Node::Nil | Node::True | Node::False | Node::SelfRef | Node::Super | Node::ThisContext
        )
    }

    /// Literal-like values a method may answer and still be inlined.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Node::Nil
                | Node::True
                | Node::False
                | Node::Character(_)
                | Node::String(_)
                | Node::Symbol(_)
                | Node::Float(_)
                | Node::Integer(_)
                | Node::LargeInteger(_)
                | Node::ConstantArray(_)
                | Node::Block(_)
        )
    }

    pub fn is_variable(&self) -> bool {
        matches!(
            self,
            Node::Identifier(_)
                | Node::Local(_)
                | Node::InstVar(_)
                | Node::ClassVar { .. }
                | Node::PoolVar { .. }
                | Node::Global(_)
        )
    }

    /// Conservative: literals, variable reads, pseudo-variables, and arrays
    /// or sequences made only of those. Never a message send.
    pub fn is_effect_free(&self) -> bool {
        match self {
            Node::ArrayExpr(elements) | Node::ExprSeq(elements) => {
                elements.iter().all(Node::is_effect_free)
            }
            Node::Super => false,
            n => n.is_pseudo() || n.is_literal() || n.is_variable(),
        }
    }
}
