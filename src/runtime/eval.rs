use std::cell::Cell;
use std::rc::Rc;

use crate::ir::{Block, ConstId, Expr, Stmt};
use crate::runtime::object::{Activation, Body, Closure, CompiledMethod, Scope, Unit, Value};
use crate::runtime::primitives::PrimitiveContext;
use crate::runtime::{Outcome, Runtime, RuntimeError, Unwind, fail};

/// Where one function body runs: its variables, the method activation it
/// belongs to, and the constants of the program it came from.
struct Frame {
    scope: Rc<Scope>,
    home: Rc<Activation>,
    unit: Rc<Unit>,
}

impl Frame {
    fn receiver(&self) -> Value {
        self.home.receiver
    }
}

enum Flow {
    Next,
    Return(Value),
}

/// `value`, `value:`, `value:value:`...
pub(crate) fn value_selector(arity: usize) -> String {
    if arity == 0 {
        "value".to_string()
    } else {
        "value:".repeat(arity)
    }
}

impl Runtime {
    fn variables(&self, params: &[String], args: &[Value], locals: &[String]) -> Vec<(String, Value)> {
        let nil = self.nil();
        params
            .iter()
            .cloned()
            .zip(args.iter().copied())
            .chain(locals.iter().map(|l| (l.clone(), nil)))
            .collect()
    }

    pub(crate) fn call_method(&mut self, compiled: &CompiledMethod, receiver: Value, args: &[Value]) -> Outcome {
        let method = &compiled.method;
        let token = self.next_token();
        let label = format!(
            "{}{}>>{}",
            method.class_name,
            if method.class_side { " class" } else { "" },
            method.selector
        );
        let home = Rc::new(Activation {
            receiver,
            token,
            live: Cell::new(true),
            label,
        });
        let frame = Frame {
            scope: Scope::new(None, self.variables(&method.params, args, &method.locals)),
            home: home.clone(),
            unit: compiled.unit.clone(),
        };

        let result = self.exec_all(&frame, &method.body);
        home.live.set(false);
        match result {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(Flow::Next) => Ok(receiver),
            Err(Unwind::Answer { token: t, value }) if t == token => Ok(value),
            Err(unwind) => Err(unwind),
        }
    }

    /// Runs a block with `args`; answers the value of its last statement.
    pub fn call_block(&mut self, closure: &Rc<Closure>, args: &[Value]) -> Outcome {
        let block = &closure.block;
        if block.params.len() != args.len() {
            return Err(Unwind::Error(RuntimeError::WrongArgumentCount {
                selector: value_selector(block.params.len()),
                expected: block.params.len(),
                got: args.len(),
            }));
        }
        let frame = Frame {
            scope: Scope::new(
                Some(closure.scope.clone()),
                self.variables(&block.params, args, &block.locals),
            ),
            home: closure.home.clone(),
            unit: closure.unit.clone(),
        };
        match self.exec_all(&frame, &block.body)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(self.nil()),
        }
    }

    /// Sends a block value (a BlockContext) `args`.
    pub fn value_block(&mut self, block: Value, args: &[Value]) -> Outcome {
        match self.closure(block) {
            Some(closure) => self.call_block(&closure, args),
            None => self.send(block, &value_selector(args.len()), args),
        }
    }

    fn exec_all(&mut self, frame: &Frame, body: &[Stmt]) -> Result<Flow, Unwind> {
        for stmt in body {
            if let Flow::Return(value) = self.exec(frame, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, frame: &Frame, stmt: &Stmt) -> Result<Flow, Unwind> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(frame, expr)?;
                Ok(Flow::Next)
            }
            Stmt::If {
                test,
                then_branch,
                else_branch,
            } => {
                let test = self.eval(frame, test)?;
                if self.is_true(test) {
                    self.exec_all(frame, then_branch)
                } else {
                    self.exec_all(frame, else_branch)
                }
            }
            Stmt::While { test, expect, body } => loop {
                let value = self.eval(frame, test)?;
                if self.is_true(value) != *expect {
                    return Ok(Flow::Next);
                }
                if let Flow::Return(value) = self.exec_all(frame, body)? {
                    return Ok(Flow::Return(value));
                }
            },
            Stmt::Return(expr) => Ok(Flow::Return(self.eval(frame, expr)?)),
            Stmt::Answer(expr) => {
                let value = self.eval(frame, expr)?;
                Err(self.answer(frame, value))
            }
            Stmt::TryPrimitive { key, args } => {
                let values = args
                    .iter()
                    .map(|a| self.eval(frame, a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match self.try_primitive(key, &values)? {
                    Some(value) => Flow::Return(value),
                    None => Flow::Next,
                })
            }
            Stmt::Comment(_) => Ok(Flow::Next),
        }
    }

    fn answer(&self, frame: &Frame, value: Value) -> Unwind {
        if !frame.home.live.get() {
            return Unwind::Error(RuntimeError::CannotReturn(frame.home.label.clone()));
        }
        Unwind::Answer {
            token: frame.home.token,
            value,
        }
    }

    /// `None` when there is no such primitive or it fails.
    fn try_primitive(&mut self, key: &str, values: &[Value]) -> Result<Option<Value>, Unwind> {
        let Some(primitive) = self.primitives.get(key).copied() else {
            log::debug!("primitive {} is not available", key);
            return Ok(None);
        };
        let Some((receiver, arguments)) = values.split_first() else {
            return Ok(None);
        };
        if primitive.inputs.is_some_and(|n| n != arguments.len()) {
            return Ok(None);
        }
        let mut context = PrimitiveContext {
            runtime: self,
            receiver: *receiver,
            arguments,
        };
        (primitive.ptr)(&mut context)
    }

    fn constant(&self, frame: &Frame, id: ConstId) -> Outcome {
        match frame.unit.constants.get(id) {
            Some(value) => Ok(*value),
            None => fail(format!("no constant {}", id)),
        }
    }

    fn pool_var(&self, frame: &Frame, pool: ConstId, key: &str) -> Outcome {
        match frame.unit.pools.get(&pool).and_then(|p| p.get(key)) {
            Some(value) => Ok(*value),
            None => fail(format!("no pool variable {}", key)),
        }
    }

    fn global_name(&self, frame: &Frame, id: ConstId) -> Result<String, Unwind> {
        let symbol = self.constant(frame, id)?;
        match self.string_value(symbol) {
            Some(name) => Ok(name),
            None => fail("global name is not a symbol"),
        }
    }

    fn make_block(&mut self, frame: &Frame, block: &Rc<Block>) -> Value {
        let closure = Closure {
            block: block.clone(),
            scope: frame.scope.clone(),
            home: frame.home.clone(),
            unit: frame.unit.clone(),
        };
        let class = self.core.block_context;
        let mut inst_vars = vec![self.nil(); self.all_inst_vars(class).len()];
        if let Some(position) = self.all_inst_vars(class).iter().position(|n| n == "nargs") {
            inst_vars[position] = Value::Int(block.params.len() as i64);
        }
        Value::Obj(self.alloc(class, inst_vars, Body::Block(Rc::new(closure))))
    }

    fn eval_args(&mut self, frame: &Frame, args: &[Expr]) -> Result<Vec<Value>, Unwind> {
        args.iter().map(|a| self.eval(frame, a)).collect()
    }

    fn eval(&mut self, frame: &Frame, expr: &Expr) -> Outcome {
        match expr {
            Expr::Const(id) => self.constant(frame, *id),
            Expr::This => Ok(frame.receiver()),
            Expr::ThisContext => Ok(self.nil()),
            Expr::Local(name) => match frame.scope.get(name) {
                Some(value) => Ok(value),
                None => fail(format!("undefined variable {}", name)),
            },
            Expr::InstVar(name) => Ok(self.inst_var(frame.receiver(), name)?),
            Expr::ClassVar { class, name } => Ok(self.class_var(class, name)?),
            Expr::PoolVar { pool, key } => self.pool_var(frame, *pool, key),
            Expr::ClassRef(name) => match self.class_named(name) {
                Some(class) => Ok(Value::Obj(class)),
                None => Err(RuntimeError::NoSuchClass(name.clone()).into()),
            },
            Expr::Global(id) => {
                let name = self.global_name(frame, *id)?;
                match self.global(&name) {
                    Some(value) => Ok(value),
                    None => Err(RuntimeError::UndefinedGlobal(name).into()),
                }
            }
            Expr::Assign { target, value } => {
                let value = self.eval(frame, value)?;
                self.assign(frame, target, value)?;
                Ok(value)
            }
            Expr::SetGlobal { name, value } => {
                let name = self.global_name(frame, *name)?;
                let value = self.eval(frame, value)?;
                self.set_global(name, value);
                Ok(value)
            }
            Expr::Send {
                receiver,
                selector,
                args,
            } => {
                let receiver = self.eval(frame, receiver)?;
                let args = self.eval_args(frame, args)?;
                self.send(receiver, selector, &args)
            }
            Expr::SuperSend {
                superclass,
                class_side,
                selector,
                args,
            } => {
                let args = self.eval_args(frame, args)?;
                let Some(mut class) = self.class_named(superclass) else {
                    return Err(RuntimeError::NoSuchClass(superclass.clone()).into());
                };
                if *class_side {
                    class = self.object(class).class;
                }
                self.send_from(class, frame.receiver(), selector, &args)
            }
            Expr::Cascade {
                temp,
                receiver,
                sends,
            } => {
                let receiver = self.eval(frame, receiver)?;
                frame.scope.set(temp, receiver);
                let mut result = receiver;
                for (selector, args) in sends {
                    let args = self.eval_args(frame, args)?;
                    result = self.send(receiver, selector, &args)?;
                }
                Ok(result)
            }
            Expr::Block(block) => Ok(self.make_block(frame, block)),
            Expr::Cond {
                test,
                if_true,
                if_false,
            } => {
                let test = self.eval(frame, test)?;
                if self.is_true(test) {
                    self.eval(frame, if_true)
                } else {
                    self.eval(frame, if_false)
                }
            }
            Expr::Seq(items) => {
                let mut result = self.nil();
                for item in items {
                    result = self.eval(frame, item)?;
                }
                Ok(result)
            }
            Expr::Answer(value) => {
                let value = self.eval(frame, value)?;
                Err(self.answer(frame, value))
            }
            Expr::NewArray(items) => {
                let items = self.eval_args(frame, items)?;
                Ok(self.array(items))
            }
            Expr::Placeholder(n) => fail(format!("unfilled primitive argument {}", n)),
        }
    }

    fn assign(&mut self, frame: &Frame, target: &Expr, value: Value) -> Result<(), Unwind> {
        match target {
            Expr::Local(name) => {
                if frame.scope.set(name, value) {
                    Ok(())
                } else {
                    fail(format!("undefined variable {}", name))
                }
            }
            Expr::InstVar(name) => Ok(self.set_inst_var(frame.receiver(), name, value)?),
            Expr::ClassVar { class, name } => Ok(self.set_class_var(class, name, value)?),
            Expr::PoolVar { key, .. } => fail(format!("cannot assign to pool variable {}", key)),
            Expr::Global(id) => {
                let name = self.global_name(frame, *id)?;
                self.set_global(name, value);
                Ok(())
            }
            _ => fail("invalid assignment target"),
        }
    }
}
