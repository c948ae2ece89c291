use std::fmt::{self, Display, Formatter, Write};
use std::rc::Rc;

use crate::ast::SubclassKind;

/// Index into [`Program::constants`].
pub type ConstId = usize;

pub const NIL: ConstId = 0;
pub const TRUE: ConstId = 1;
pub const FALSE: ConstId = 2;

/// One emittable program unit: pooled constants, class definitions in
/// superclass-first order, object-graph initialisation, then class
/// initialisers.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub constants: Vec<Constant>,
    pub classes: Vec<ClassDecl>,
    pub heap: Option<HeapInit>,
    /// Classes whose class-side `initialize` runs after everything is loaded.
    pub initializers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Nil,
    True,
    False,
    Character(char),
    Symbol(String),
    String(String),
    SmallInteger(i64),
    /// Magnitude as upper-case hex digits.
    LargeInteger { negative: bool, hex: String },
    Float(f64),
    Array(Vec<ConstId>),
    /// A pool dictionary: identifier keys to constant values.
    Pool(Vec<(String, ConstId)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub kind: SubclassKind,
    pub inst_vars: Vec<String>,
    pub class_vars: Vec<String>,
    pub class_inst_vars: Vec<String>,
    pub instance_methods: Vec<Rc<Method>>,
    pub class_methods: Vec<Rc<Method>>,
    /// Diagnostic lines carried into the output as comments.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub class_name: String,
    pub class_side: bool,
    pub selector: String,
    pub params: Vec<String>,
    /// Declared temporaries plus locals hoisted out of inlined blocks and
    /// cascade temporaries.
    pub locals: Vec<String>,
    pub body: Vec<Stmt>,
    /// Set when some closure in the body answers from this method, so each
    /// activation must catch its own answer signal.
    pub catches_answer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub params: Vec<String>,
    pub locals: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    If {
        test: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    /// Loops while `test` evaluates to `true` (or to `false` when `expect`
    /// is false).
    While {
        test: Expr,
        expect: bool,
        body: Vec<Stmt>,
    },
    /// Leaves the innermost function: the method, or a block's own body.
    Return(Expr),
    /// Non-local return from a closure to its home method.
    Answer(Expr),
    /// Runs primitive `key` on `args` (receiver first) and returns its
    /// result, or falls through when the primitive fails.
    TryPrimitive { key: String, args: Vec<Expr> },
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(ConstId),
    This,
    ThisContext,
    Local(String),
    InstVar(String),
    ClassVar { class: String, name: String },
    PoolVar { pool: ConstId, key: String },
    /// A class known when compiling, by the program or the host.
    ClassRef(String),
    /// A name looked up at run time; the id is its symbol constant.
    Global(ConstId),
    Assign { target: Box<Expr>, value: Box<Expr> },
    SetGlobal { name: ConstId, value: Box<Expr> },
    Send {
        receiver: Box<Expr>,
        selector: String,
        args: Vec<Expr>,
    },
    /// Send whose lookup starts at `superclass` (its metaclass on the class
    /// side), fixed when compiling, with `self` as the receiver.
    SuperSend {
        superclass: String,
        class_side: bool,
        selector: String,
        args: Vec<Expr>,
    },
    Cascade {
        temp: String,
        receiver: Box<Expr>,
        sends: Vec<(String, Vec<Expr>)>,
    },
    Block(Rc<Block>),
    Cond {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Evaluates each expression, answering the last; empty is nil.
    Seq(Vec<Expr>),
    /// `^expr` inside an inlined block used as a value.
    Answer(Box<Expr>),
    NewArray(Vec<Expr>),
    /// Positional argument slot inside a primitive template.
    Placeholder(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeapValue {
    Const(ConstId),
    Ref(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeapPayload {
    None,
    Values(Vec<HeapValue>),
    Bytes(Vec<u8>),
    Words(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeapRecord {
    Class(String),
    Object {
        class: String,
        inst_vars: Vec<HeapValue>,
        payload: HeapPayload,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeapInit {
    pub records: Vec<HeapRecord>,
    pub globals: Vec<(String, HeapValue)>,
    /// (class, variable, value)
    pub class_vars: Vec<(String, String, HeapValue)>,
}

impl Program {
    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|c| c.name == name)
    }
}

impl ClassDecl {
    pub fn method(&self, selector: &str, class_side: bool) -> Option<&Rc<Method>> {
        let methods = if class_side {
            &self.class_methods
        } else {
            &self.instance_methods
        };
        methods.iter().find(|m| m.selector == selector)
    }
}

impl Expr {
    pub fn send(receiver: Expr, selector: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Send {
            receiver: Box::new(receiver),
            selector: selector.into(),
            args,
        }
    }

    /// Applies `f` to every expression in the tree, children first.
    pub fn rewrite(self, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
        let node = match self {
            Expr::Assign { target, value } => Expr::Assign {
                target: Box::new(target.rewrite(f)),
                value: Box::new(value.rewrite(f)),
            },
            Expr::SetGlobal { name, value } => Expr::SetGlobal {
                name,
                value: Box::new(value.rewrite(f)),
            },
            Expr::Send {
                receiver,
                selector,
                args,
            } => Expr::Send {
                receiver: Box::new(receiver.rewrite(f)),
                selector,
                args: args.into_iter().map(|a| a.rewrite(f)).collect(),
            },
            Expr::SuperSend {
                superclass,
                class_side,
                selector,
                args,
            } => Expr::SuperSend {
                superclass,
                class_side,
                selector,
                args: args.into_iter().map(|a| a.rewrite(f)).collect(),
            },
            Expr::Cond {
                test,
                if_true,
                if_false,
            } => Expr::Cond {
                test: Box::new(test.rewrite(f)),
                if_true: Box::new(if_true.rewrite(f)),
                if_false: Box::new(if_false.rewrite(f)),
            },
            Expr::Seq(items) => Expr::Seq(items.into_iter().map(|e| e.rewrite(f)).collect()),
            Expr::NewArray(items) => Expr::NewArray(items.into_iter().map(|e| e.rewrite(f)).collect()),
            Expr::Answer(value) => Expr::Answer(Box::new(value.rewrite(f))),
            other => other,
        };
        f(node)
    }
}

impl Stmt {
    /// Applies `f` to every expression directly held by this statement or
    /// its nested branches.
    pub fn rewrite(self, f: &mut impl FnMut(Expr) -> Expr) -> Stmt {
        match self {
            Stmt::Expr(e) => Stmt::Expr(e.rewrite(f)),
            Stmt::If {
                test,
                then_branch,
                else_branch,
            } => Stmt::If {
                test: test.rewrite(f),
                then_branch: then_branch.into_iter().map(|s| s.rewrite(f)).collect(),
                else_branch: else_branch.into_iter().map(|s| s.rewrite(f)).collect(),
            },
            Stmt::While { test, expect, body } => Stmt::While {
                test: test.rewrite(f),
                expect,
                body: body.into_iter().map(|s| s.rewrite(f)).collect(),
            },
            Stmt::Return(e) => Stmt::Return(e.rewrite(f)),
            Stmt::Answer(e) => Stmt::Answer(e.rewrite(f)),
            Stmt::TryPrimitive { key, args } => Stmt::TryPrimitive {
                key,
                args: args.into_iter().map(|a| a.rewrite(f)).collect(),
            },
            Stmt::Comment(text) => Stmt::Comment(text),
        }
    }
}

// --- rendering

const RESERVED: &[&str] = &[
    "arguments", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally", "for",
    "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "null", "package", "private", "protected", "public", "return", "static", "super", "switch",
    "this", "throw", "true", "try", "typeof", "var", "void", "while", "with",
];

fn js_name(id: &str) -> String {
    if RESERVED.contains(&id) {
        format!("{}_", id)
    } else {
        id.to_string()
    }
}

fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_word_selector(selector: &str) -> bool {
    selector.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn message_name(selector: &str) -> String {
    if is_word_selector(selector) {
        format!(".{}", selector.replace(':', "_"))
    } else {
        format!("[{}]", js_string(selector))
    }
}

fn property_tag(selector: &str) -> String {
    if is_word_selector(selector) {
        selector.replace(':', "_")
    } else {
        js_string(selector)
    }
}

fn operator_name(c: char) -> &'static str {
    match c {
        '+' => "plus",
        '-' => "minus",
        '*' => "star",
        '/' => "slash",
        '\\' => "backslash",
        '<' => "lt",
        '>' => "gt",
        '=' => "eq",
        '@' => "at",
        ',' => "comma",
        '~' => "tilde",
        '&' => "amp",
        '|' => "bar",
        '%' => "pct",
        '`' => "tick",
        '?' => "qmark",
        _ => "op",
    }
}

fn function_name(class: &str, selector: &str) -> String {
    if is_word_selector(selector) {
        format!("{}${}", class, selector.replace(':', "_"))
    } else {
        let mut s = String::from("_");
        for c in selector.chars() {
            s.push('_');
            s.push_str(operator_name(c));
        }
        format!("{}${}", class, s)
    }
}

fn constant_name(id: ConstId) -> String {
    format!("_k{}", id)
}

fn float_literal(x: f64) -> String {
    if x.is_nan() {
        "0/0".to_string()
    } else if x == f64::INFINITY {
        "1/0".to_string()
    } else if x == f64::NEG_INFINITY {
        "-1/0".to_string()
    } else if x == 0.0 && x.is_sign_negative() {
        "-0".to_string()
    } else {
        format!("{:?}", x)
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Nil => write!(f, "__smalltalk.nil"),
            Constant::True => write!(f, "__smalltalk.true"),
            Constant::False => write!(f, "__smalltalk.false"),
            Constant::Character(c) => write!(f, "__smalltalk.chars[{}]", *c as u32),
            Constant::Symbol(s) => write!(f, "__smalltalk.Symbol({})", js_string(s)),
            Constant::String(s) => write!(f, "__smalltalk.String({})", js_string(s)),
            Constant::SmallInteger(n) => write!(f, "__smalltalk.SmallInteger({})", n),
            Constant::LargeInteger { negative, hex } => write!(
                f,
                "__smalltalk.LargeInteger(\"{}{}\")",
                if *negative { "-" } else { "" },
                hex
            ),
            Constant::Float(x) => write!(f, "__smalltalk.Float({})", float_literal(*x)),
            Constant::Array(items) => {
                let items: Vec<String> = items.iter().map(|k| constant_name(*k)).collect();
                write!(f, "__smalltalk.Array([{}])", items.join(", "))
            }
            Constant::Pool(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(key, k)| format!("{}: {}", key, constant_name(*k)))
                    .collect();
                write!(f, "__smalltalk.Pool({{{}}})", entries.join(", "))
            }
        }
    }
}

/// Rendering state: current indentation and whether `self` must be reached
/// through the `_self` alias because we are inside a block function.
#[derive(Clone, Copy)]
struct Printer {
    depth: usize,
    in_block: bool,
}

impl Printer {
    fn indent(self) -> String {
        "    ".repeat(self.depth)
    }

    fn deeper(self) -> Printer {
        Printer {
            depth: self.depth + 1,
            ..self
        }
    }

    fn this(self) -> &'static str {
        if self.in_block { "_self" } else { "this" }
    }

    fn args(self, args: &[Expr]) -> String {
        args.iter().map(|a| self.expr(a)).collect::<Vec<_>>().join(", ")
    }

    fn expr(self, e: &Expr) -> String {
        match e {
            Expr::Const(k) => constant_name(*k),
            Expr::This => self.this().to_string(),
            Expr::ThisContext => "__smalltalk.getThisContext()".to_string(),
            Expr::Local(name) => js_name(name),
            Expr::InstVar(name) => format!("{}._{}", self.this(), name),
            Expr::ClassVar { class, name } => format!("_{}._{}", class, name),
            Expr::PoolVar { pool, key } => format!("{}.{}", constant_name(*pool), key),
            Expr::ClassRef(name) => format!("_{}", name),
            Expr::Global(k) => format!("__smalltalk.getGlobal({})", constant_name(*k)),
            Expr::Assign { target, value } => {
                format!("({} = {})", self.expr(target), self.expr(value))
            }
            Expr::SetGlobal { name, value } => format!(
                "__smalltalk.setGlobal({}, {})",
                constant_name(*name),
                self.expr(value)
            ),
            Expr::Send {
                receiver,
                selector,
                args,
            } => format!(
                "{}{}({})",
                self.expr(receiver),
                message_name(selector),
                self.args(args)
            ),
            Expr::SuperSend {
                superclass,
                class_side,
                selector,
                args,
            } => {
                let mut all = vec![self.this().to_string()];
                all.extend(args.iter().map(|a| self.expr(a)));
                format!(
                    "_{}{}{}.call({})",
                    superclass,
                    if *class_side { "" } else { ".__im" },
                    message_name(selector),
                    all.join(", ")
                )
            }
            Expr::Cascade {
                temp,
                receiver,
                sends,
            } => {
                let mut parts = vec![format!("{} = {}", temp, self.expr(receiver))];
                for (selector, args) in sends {
                    parts.push(format!("{}{}({})", temp, message_name(selector), self.args(args)));
                }
                format!("({})", parts.join(", "))
            }
            Expr::Block(block) => self.block(block),
            Expr::Cond {
                test,
                if_true,
                if_false,
            } => format!(
                "({} === {} ? {} : {})",
                self.expr(test),
                constant_name(TRUE),
                self.expr(if_true),
                self.expr(if_false)
            ),
            Expr::Seq(items) => match items.as_slice() {
                [] => constant_name(NIL),
                [single] => self.expr(single),
                _ => format!("({})", self.args(items)),
            },
            Expr::Answer(value) => format!("__smalltalk.answer($a, {})", self.expr(value)),
            Expr::NewArray(items) => format!("__smalltalk.Array([{}])", self.args(items)),
            Expr::Placeholder(n) => format!("{{{}}}", n),
        }
    }

    fn block(self, block: &Block) -> String {
        let inner = Printer {
            depth: self.depth + 1,
            in_block: true,
        };
        let params: Vec<String> = block.params.iter().map(|p| js_name(p)).collect();
        let mut out = format!("$B(function ({}) {{\n", params.join(", "));
        out.push_str(&inner.locals(&block.locals));
        for stmt in &block.body {
            out.push_str(&inner.stmt(stmt));
        }
        out.push_str(&self.indent());
        out.push_str("})");
        out
    }

    fn locals(self, names: &[String]) -> String {
        if names.is_empty() {
            return String::new();
        }
        let names: Vec<String> = names.iter().map(|n| js_name(n)).collect();
        format!("{}var {};\n", self.indent(), names.join(", "))
    }

    fn stmts(self, stmts: &[Stmt]) -> String {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(self, s: &Stmt) -> String {
        let indent = self.indent();
        match s {
            Stmt::Expr(e) => format!("{}{};\n", indent, self.expr(e)),
            Stmt::If {
                test,
                then_branch,
                else_branch,
            } => {
                let mut out = format!(
                    "{}if ({} === {}) {{\n{}",
                    indent,
                    self.expr(test),
                    constant_name(TRUE),
                    self.deeper().stmts(then_branch)
                );
                if !else_branch.is_empty() {
                    out.push_str(&format!("{}}} else {{\n{}", indent, self.deeper().stmts(else_branch)));
                }
                out.push_str(&format!("{}}}\n", indent));
                out
            }
            Stmt::While { test, expect, body } => format!(
                "{}while ({} {} {}) {{\n{}{}}}\n",
                indent,
                self.expr(test),
                if *expect { "===" } else { "!==" },
                constant_name(TRUE),
                self.deeper().stmts(body),
                indent
            ),
            Stmt::Return(e) => format!("{}return {};\n", indent, self.expr(e)),
            Stmt::Answer(e) => format!("{}$a[0] = {};\n{}throw $a;\n", indent, self.expr(e), indent),
            Stmt::TryPrimitive { key, args } => format!(
                "{}var $p = __smalltalk.primitive({})({});\n{}if ($p !== undefined) return $p;\n",
                indent,
                js_string(key),
                self.args(args),
                indent
            ),
            Stmt::Comment(text) => format!("{}// {}\n", indent, text),
        }
    }

    fn method(self, m: &Method) -> String {
        let body = self.deeper();
        let params: Vec<String> = m.params.iter().map(|p| js_name(p)).collect();
        let mut out = format!(
            "{}{}: function {}({}) {{\n",
            self.indent(),
            property_tag(&m.selector),
            function_name(&m.class_name, &m.selector),
            params.join(", ")
        );
        out.push_str(&format!("{}var _self = this;\n", body.indent()));
        out.push_str(&body.locals(&m.locals));
        if m.catches_answer {
            out.push_str(&format!("{}var $a = [];\n{}try {{\n", body.indent(), body.indent()));
            out.push_str(&body.deeper().stmts(&m.body));
            out.push_str(&format!(
                "{i}}} catch (exc) {{\n{i}    if (exc !== $a) throw exc;\n{i}    return $a[0];\n{i}}}\n",
                i = body.indent()
            ));
        } else {
            out.push_str(&body.stmts(&m.body));
        }
        out.push_str(&format!("{}}}", self.indent()));
        out
    }

    fn heap_value(v: &HeapValue) -> String {
        match v {
            HeapValue::Const(k) => constant_name(*k),
            HeapValue::Ref(i) => format!("__U[{}]", i),
        }
    }
}

fn var_names(names: &[String]) -> String {
    let names: Vec<String> = names.iter().map(|n| format!("'_{}'", n)).collect();
    format!("[{}]", names.join(", "))
}

impl Display for ClassDecl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let p = Printer {
            depth: 2,
            in_block: false,
        };
        writeln!(f, "    // {}", self.name)?;
        for note in &self.notes {
            writeln!(f, "    // {}", note)?;
        }
        let superclass = match &self.superclass {
            Some(s) => format!("_{}", s),
            None => "null".to_string(),
        };
        writeln!(
            f,
            "    var _{} = __smalltalk.defClass('{}', {}, {{",
            self.name, self.name, superclass
        )?;
        let methods: Vec<String> = self.instance_methods.iter().map(|m| p.method(m)).collect();
        writeln!(f, "{}", methods.join(",\n"))?;
        writeln!(f, "    }}, {{")?;
        let methods: Vec<String> = self.class_methods.iter().map(|m| p.method(m)).collect();
        writeln!(f, "{}", methods.join(",\n"))?;
        writeln!(
            f,
            "    }}, {}, {}, {});",
            var_names(&self.inst_vars),
            var_names(&self.class_vars),
            self.kind.flags()
        )?;
        if !self.class_inst_vars.is_empty() {
            writeln!(
                f,
                "    __smalltalk.addClassInstVars(_{}, {});",
                self.name,
                var_names(&self.class_inst_vars)
            )?;
        }
        writeln!(f)
    }
}

impl Display for HeapInit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "    var __U = [];")?;
        for (i, record) in self.records.iter().enumerate() {
            match record {
                HeapRecord::Class(name) => writeln!(f, "    __U[{}] = _{};", i, name)?,
                HeapRecord::Object { class, payload, .. } => {
                    let size = match payload {
                        HeapPayload::None => 0,
                        HeapPayload::Values(v) => v.len(),
                        HeapPayload::Bytes(b) => b.len(),
                        HeapPayload::Words(w) => w.len(),
                    };
                    writeln!(f, "    __U[{}] = __smalltalk.allocate(_{}, {});", i, class, size)?
                }
            }
        }
        for (i, record) in self.records.iter().enumerate() {
            let HeapRecord::Object {
                inst_vars, payload, ..
            } = record
            else {
                continue;
            };
            let ivs: Vec<String> = inst_vars.iter().map(Printer::heap_value).collect();
            let payload = match payload {
                HeapPayload::None => "null".to_string(),
                HeapPayload::Values(v) => {
                    let v: Vec<String> = v.iter().map(Printer::heap_value).collect();
                    format!("[{}]", v.join(", "))
                }
                HeapPayload::Bytes(b) => format!(
                    "new Uint8Array([{}])",
                    b.iter().map(u8::to_string).collect::<Vec<_>>().join(", ")
                ),
                HeapPayload::Words(w) => format!(
                    "new Uint32Array([{}])",
                    w.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
                ),
            };
            writeln!(f, "    __smalltalk.fill(__U[{}], [{}], {});", i, ivs.join(", "), payload)?;
        }
        for (name, value) in &self.globals {
            writeln!(
                f,
                "    __smalltalk.setGlobal(__smalltalk.Symbol({}), {});",
                js_string(name),
                Printer::heap_value(value)
            )?;
        }
        for (class, name, value) in &self.class_vars {
            writeln!(f, "    _{}._{} = {};", class, name, Printer::heap_value(value))?;
        }
        Ok(())
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "(function (__smalltalk) {{")?;
        writeln!(f, "    var $B = __smalltalk.Block;")?;
        if !self.constants.is_empty() {
            let decls: Vec<String> = self
                .constants
                .iter()
                .enumerate()
                .map(|(i, c)| format!("        {} = {}", constant_name(i), c))
                .collect();
            writeln!(f, "    var\n{};", decls.join(",\n"))?;
        }
        for class in &self.classes {
            write!(f, "{}", class)?;
        }
        if let Some(heap) = &self.heap {
            write!(f, "{}", heap)?;
        }
        for name in &self.initializers {
            writeln!(f, "    _{}.initialize();", name)?;
        }
        writeln!(f, "}});")
    }
}

/// Renders a single method, as it would appear inside its class definition.
pub fn render_method(method: &Method) -> String {
    Printer {
        depth: 0,
        in_block: false,
    }
    .method(method)
}
