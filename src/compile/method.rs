use std::rc::Rc;

use crate::ast::{Block, ClassDef, Message, MethodDef, Node, Primitive, PrimitiveId};
use crate::compile::{Compilation, CompileError, Result};
use crate::ir::{self, Expr, Method, NIL, Stmt};

/// A literal block that can be spliced into the surrounding code.
fn inlinable_block(node: &Node) -> Option<&Block> {
    match node {
        Node::Block(block) if block.params.is_empty() => Some(block),
        _ => None,
    }
}

/// `(then, else)` blocks of an inlinable conditional.
fn branches(message: &Message) -> Option<(Option<&Block>, Option<&Block>)> {
    let blocks = message
        .args
        .iter()
        .map(inlinable_block)
        .collect::<Option<Vec<_>>>()?;
    match (message.selector.as_str(), blocks.as_slice()) {
        ("ifTrue:", [t]) => Some((Some(*t), None)),
        ("ifFalse:", [f]) => Some((None, Some(*f))),
        ("ifTrue:ifFalse:", [t, f]) => Some((Some(*t), Some(*f))),
        ("ifFalse:ifTrue:", [f, t]) => Some((Some(*t), Some(*f))),
        _ => None,
    }
}

/// `(test, expect, body)` of an inlinable loop.
fn loop_parts<'n>(receiver: &'n Node, message: &'n Message) -> Option<(&'n Block, bool, Option<&'n Block>)> {
    let test = inlinable_block(receiver)?;
    match (message.selector.as_str(), message.args.as_slice()) {
        ("whileTrue:", [body]) => Some((test, true, Some(inlinable_block(body)?))),
        ("whileFalse:", [body]) => Some((test, false, Some(inlinable_block(body)?))),
        ("whileTrue", []) => Some((test, true, None)),
        ("whileFalse", []) => Some((test, false, None)),
        _ => None,
    }
}

fn describe_primitive(primitive: &Primitive) -> String {
    let id = match &primitive.id {
        PrimitiveId::Number(n) => n.to_string(),
        PrimitiveId::Named(name) => format!("'{}'", name),
    };
    match &primitive.module {
        Some(module) => format!("<primitive: {} module: '{}'>", id, module),
        None => format!("<primitive: {}>", id),
    }
}

/// Lowers one method. Blocks that are not inlined become functions of their
/// own; `closures` counts how many of those enclose the current node.
pub struct MethodTranslator<'c, 'a> {
    comp: &'c mut Compilation<'a>,
    class: &'a ClassDef,
    class_side: bool,
    selector: String,
    /// Locals introduced while translating each enclosing function, innermost last.
    hoisted: Vec<Vec<String>>,
    closures: usize,
    catches_answer: bool,
}

impl<'c, 'a> MethodTranslator<'c, 'a> {
    pub fn new(comp: &'c mut Compilation<'a>, class: &'a ClassDef, class_side: bool) -> Self {
        MethodTranslator {
            comp,
            class,
            class_side,
            selector: String::new(),
            hoisted: vec![],
            closures: 0,
            catches_answer: false,
        }
    }

    fn location(&self) -> String {
        format!(
            "{}{}>>{}",
            self.class.name,
            if self.class_side { " class" } else { "" },
            self.selector
        )
    }

    fn declare(&mut self, name: &str) {
        if let Some(locals) = self.hoisted.last_mut() {
            if !locals.iter().any(|l| l == name) {
                locals.push(name.to_string());
            }
        }
    }

    pub fn method(mut self, def: &MethodDef) -> Result<Method> {
        self.selector = def.selector.clone();
        self.hoisted.push(vec![]);

        let mut body = vec![];
        let mut rest = def.body.as_slice();
        if let [Node::Primitive(primitive), tail @ ..] = rest {
            self.primitive(primitive, &def.args, &mut body)?;
            rest = tail;
        }
        for node in rest {
            self.stmt(node, &mut body)?;
        }
        if !matches!(def.body.last(), Some(Node::Answer(_))) {
            body.push(Stmt::Return(Expr::This));
        }

        let mut locals = def.locals.clone();
        locals.extend(self.hoisted.pop().unwrap_or_default());
        Ok(Method {
            class_name: self.class.name.clone(),
            class_side: self.class_side,
            selector: def.selector.clone(),
            params: def.args.clone(),
            locals,
            body,
            catches_answer: self.catches_answer,
        })
    }

    fn primitive(&mut self, primitive: &Primitive, args: &[String], out: &mut Vec<Stmt>) -> Result<()> {
        out.push(Stmt::Comment(describe_primitive(primitive)));
        let Some(template) = self
            .comp
            .host
            .primitive_template(primitive.module.as_deref(), &primitive.id, args.len())
        else {
            log::warn!("{}: no such primitive {}", self.location(), primitive.id);
            out.push(Stmt::Comment("No such primitive.".to_string()));
            return Ok(());
        };

        let mut missing = None;
        for stmt in template {
            out.push(stmt.rewrite(&mut |e| match e {
                Expr::Placeholder(n) => match args.get(n) {
                    Some(name) => Expr::Local(name.clone()),
                    None => {
                        missing = Some(n);
                        Expr::Const(NIL)
                    }
                },
                other => other,
            }));
        }
        match missing {
            Some(index) => Err(CompileError::PrimitiveArity {
                method: self.location(),
                primitive: primitive.id.to_string(),
                index,
            }),
            None => Ok(()),
        }
    }

    fn stmt(&mut self, node: &Node, out: &mut Vec<Stmt>) -> Result<()> {
        match node {
            Node::Answer(value) => {
                let value = self.expr(value)?;
                if self.closures > 0 {
                    self.catches_answer = true;
                    out.push(Stmt::Answer(value));
                } else {
                    out.push(Stmt::Return(value));
                }
            }
            Node::Primitive(_) => return Err(CompileError::MisplacedPrimitive(self.location())),
            n if n.is_effect_free() => {
                log::warn!("{}: useless statement elided", self.location());
            }
            Node::MessageExpr { receiver, message } => {
                if let Some((test, expect, body)) = loop_parts(receiver, message) {
                    let test = self.inline_value(test)?;
                    let body = match body {
                        Some(body) => self.inline_stmts(body)?,
                        None => vec![],
                    };
                    out.push(Stmt::While { test, expect, body });
                } else if let Some((if_true, if_false)) = branches(message) {
                    let test = self.expr(receiver)?;
                    let then_branch = self.inline_stmts_opt(if_true)?;
                    let else_branch = self.inline_stmts_opt(if_false)?;
                    out.push(Stmt::If {
                        test,
                        then_branch,
                        else_branch,
                    });
                } else if message.args.is_empty()
                    && receiver.is_effect_free()
                    && self.comp.inlinable.contains_key(&message.selector)
                {
                    log::warn!(
                        "{}: useless statement elided: inlined #{}",
                        self.location(),
                        message.selector
                    );
                } else {
                    out.push(Stmt::Expr(self.expr(node)?));
                }
            }
            other => out.push(Stmt::Expr(self.expr(other)?)),
        }
        Ok(())
    }

    /// Assignments resetting an inlined block's locals, which move to the
    /// enclosing function.
    fn hoist(&mut self, block: &Block) -> Vec<Expr> {
        block
            .locals
            .iter()
            .map(|name| {
                self.declare(name);
                Expr::Assign {
                    target: Box::new(Expr::Local(name.clone())),
                    value: Box::new(Expr::Const(NIL)),
                }
            })
            .collect()
    }

    fn inline_stmts(&mut self, block: &Block) -> Result<Vec<Stmt>> {
        let mut out: Vec<Stmt> = self.hoist(block).into_iter().map(Stmt::Expr).collect();
        for node in &block.body {
            self.stmt(node, &mut out)?;
        }
        Ok(out)
    }

    fn inline_stmts_opt(&mut self, block: Option<&Block>) -> Result<Vec<Stmt>> {
        match block {
            Some(block) => self.inline_stmts(block),
            None => Ok(vec![]),
        }
    }

    fn inline_value(&mut self, block: &Block) -> Result<Expr> {
        let mut items = self.hoist(block);
        for node in &block.body {
            items.push(self.expr(node)?);
        }
        if block.body.is_empty() {
            items.push(Expr::Const(NIL));
        }
        Ok(Expr::Seq(items))
    }

    fn inline_value_opt(&mut self, block: Option<&Block>) -> Result<Expr> {
        match block {
            Some(block) => self.inline_value(block),
            None => Ok(Expr::Const(NIL)),
        }
    }

    fn exprs(&mut self, nodes: &[Node]) -> Result<Vec<Expr>> {
        nodes.iter().map(|n| self.expr(n)).collect()
    }

    pub fn expr(&mut self, node: &Node) -> Result<Expr> {
        Ok(match node {
            Node::Nil
            | Node::True
            | Node::False
            | Node::Character(_)
            | Node::String(_)
            | Node::Symbol(_)
            | Node::Integer(_)
            | Node::LargeInteger(_)
            | Node::Float(_)
            | Node::ConstantArray(_) => Expr::Const(self.comp.constant(node)?),
            Node::SelfRef | Node::Super => Expr::This,
            Node::ThisContext => Expr::ThisContext,
            Node::ArrayExpr(items) => Expr::NewArray(self.exprs(items)?),
            Node::Identifier(name) => return Err(CompileError::Unbound(name.clone())),
            Node::Local(name) => Expr::Local(name.clone()),
            Node::InstVar(name) => Expr::InstVar(name.clone()),
            Node::ClassVar { class, name } => Expr::ClassVar {
                class: class.clone(),
                name: name.clone(),
            },
            Node::PoolVar { pool, name } => Expr::PoolVar {
                pool: self.comp.pool(pool)?,
                key: name.clone(),
            },
            Node::Global(name) => self.comp.global(name),
            Node::Assign { target, value } => self.assign(target, value)?,
            Node::MessageExpr { receiver, message } => self.send(receiver, message)?,
            Node::Cascade { head, messages } => self.cascade(head, messages)?,
            Node::Answer(value) => {
                let value = self.expr(value)?;
                self.catches_answer = true;
                Expr::Answer(Box::new(value))
            }
            Node::Block(block) => Expr::Block(Rc::new(self.block(block)?)),
            Node::ExprSeq(items) => Expr::Seq(self.exprs(items)?),
            Node::Primitive(_) => return Err(CompileError::MisplacedPrimitive(self.location())),
        })
    }

    fn assign(&mut self, target: &Node, value: &Node) -> Result<Expr> {
        let value = Box::new(self.expr(value)?);
        Ok(match target {
            Node::Local(_) | Node::InstVar(_) | Node::ClassVar { .. } | Node::PoolVar { .. } => {
                Expr::Assign {
                    target: Box::new(self.expr(target)?),
                    value,
                }
            }
            Node::Global(name) => Expr::SetGlobal {
                name: self.comp.symbol(name),
                value,
            },
            other => return Err(CompileError::BadAssignment(format!("{:?}", other))),
        })
    }

    fn superclass(&self) -> Result<String> {
        self.class
            .superclass
            .clone()
            .ok_or_else(|| CompileError::SuperInRoot(self.location()))
    }

    fn send(&mut self, receiver: &Node, message: &Message) -> Result<Expr> {
        if let Some((if_true, if_false)) = branches(message) {
            let test = self.expr(receiver)?;
            let if_true = self.inline_value_opt(if_true)?;
            let if_false = self.inline_value_opt(if_false)?;
            return Ok(Expr::Cond {
                test: Box::new(test),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            });
        }

        if matches!(receiver, Node::Super) {
            return Ok(Expr::SuperSend {
                superclass: self.superclass()?,
                class_side: self.class_side,
                selector: message.selector.clone(),
                args: self.exprs(&message.args)?,
            });
        }

        if message.args.is_empty() && receiver.is_effect_free() {
            if let Some(literal) = self.comp.inlinable.get(&message.selector).cloned() {
                log::debug!("{}: inlined #{}", self.location(), message.selector);
                return self.expr(&literal);
            }
        }

        let receiver = self.expr(receiver)?;
        Ok(Expr::send(receiver, message.selector.clone(), self.exprs(&message.args)?))
    }

    fn cascade(&mut self, head: &Node, messages: &[Message]) -> Result<Expr> {
        let Node::MessageExpr { receiver, message } = head else {
            return Err(CompileError::CascadeHead(format!("{:?}", head)));
        };
        if matches!(receiver.as_ref(), Node::Super) {
            return Err(CompileError::SuperCascade);
        }
        let temp = self.comp.gensym();
        self.declare(&temp);
        let receiver = self.expr(receiver)?;
        let mut sends = vec![];
        for message in std::iter::once(message).chain(messages) {
            sends.push((message.selector.clone(), self.exprs(&message.args)?));
        }
        Ok(Expr::Cascade {
            temp,
            receiver: Box::new(receiver),
            sends,
        })
    }

    fn block(&mut self, block: &Block) -> Result<ir::Block> {
        self.closures += 1;
        self.hoisted.push(vec![]);
        let body = self.block_body(&block.body);
        let extra = self.hoisted.pop().unwrap_or_default();
        self.closures -= 1;

        let mut locals = block.locals.clone();
        locals.extend(extra);
        Ok(ir::Block {
            params: block.params.clone(),
            locals,
            body: body?,
        })
    }

    /// A block answers its last statement's value; `^` in last place still
    /// returns from the home method.
    fn block_body(&mut self, body: &[Node]) -> Result<Vec<Stmt>> {
        let Some((last, init)) = body.split_last() else {
            return Ok(vec![Stmt::Return(Expr::Const(NIL))]);
        };
        let mut out = vec![];
        for node in init {
            self.stmt(node, &mut out)?;
        }
        match last {
            Node::Answer(_) => self.stmt(last, &mut out)?,
            other => {
                let value = self.expr(other)?;
                out.push(Stmt::Return(value));
            }
        }
        Ok(out)
    }
}
