use std::collections::HashMap;

use crate::ast::{MethodDef, Node, Program};

#[cfg(test)]
pub mod test;

#[derive(Debug, Clone, Default)]
struct ClassShape {
    superclass: Option<String>,
    inst_vars: Vec<String>,
    class_inst_vars: Vec<String>,
    class_vars: Vec<String>,
    pools: Vec<String>,
}

/// The namespaces identifiers can resolve to: per-class variables along the
/// superclass chain, plus the keys of every known pool dictionary.
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    classes: HashMap<String, ClassShape>,
    pools: HashMap<String, Vec<String>>,
}

impl ClassInfo {
    pub fn new(program: &Program) -> Self {
        let classes = program
            .classes
            .values()
            .map(|c| {
                (
                    c.name.clone(),
                    ClassShape {
                        superclass: c.superclass.clone(),
                        inst_vars: c.inst_vars.clone(),
                        class_inst_vars: c.class_inst_vars.clone(),
                        class_vars: c.class_vars.clone(),
                        pools: c.pools.clone(),
                    },
                )
            })
            .collect();
        ClassInfo {
            classes,
            pools: HashMap::new(),
        }
    }

    pub fn with_pool(mut self, name: impl Into<String>, keys: Vec<String>) -> Self {
        self.pools.insert(name.into(), keys);
        self
    }

    pub fn superclass(&self, class: &str) -> Option<&str> {
        self.classes.get(class)?.superclass.as_deref()
    }

    fn chain<'a>(&'a self, class: &'a str) -> impl Iterator<Item = (&'a str, &'a ClassShape)> + 'a {
        let mut next = Some(class);
        std::iter::from_fn(move || {
            let name = next?;
            let shape = self.classes.get(name)?;
            next = shape.superclass.as_deref();
            Some((name, shape))
        })
    }

    /// What `name` means inside a method of `class`. At each level of the
    /// superclass chain instance variables are checked before class
    /// variables; pools come after the whole chain, globals last.
    pub fn resolve(&self, class: &str, class_side: bool, name: &str) -> Node {
        for (owner, shape) in self.chain(class) {
            let inst_vars = if class_side {
                &shape.class_inst_vars
            } else {
                &shape.inst_vars
            };
            if inst_vars.iter().any(|v| v == name) {
                return Node::InstVar(name.to_string());
            }
            if shape.class_vars.iter().any(|v| v == name) {
                return Node::ClassVar {
                    class: owner.to_string(),
                    name: name.to_string(),
                };
            }
        }
        for (_, shape) in self.chain(class) {
            for pool in &shape.pools {
                if self.pools.get(pool).is_some_and(|keys| keys.iter().any(|k| k == name)) {
                    return Node::PoolVar {
                        pool: pool.clone(),
                        name: name.to_string(),
                    };
                }
            }
        }
        Node::Global(name.to_string())
    }
}

pub fn bind_names_in_method(info: &ClassInfo, class: &str, class_side: bool, method: &mut MethodDef) {
    let mut bind = |node: Node| match node {
        Node::Identifier(name) => info.resolve(class, class_side, &name),
        other => other,
    };
    for statement in &mut method.body {
        statement.transform(&mut bind);
    }
}

/// Resolves every `Identifier` left by the parser in every method.
pub fn bind_names(program: &mut Program, info: &ClassInfo) {
    for class in program.classes.values_mut() {
        let name = class.name.clone();
        for entry in class.methods.values_mut() {
            bind_names_in_method(info, &name, false, &mut entry.method);
        }
        for entry in class.class_methods.values_mut() {
            bind_names_in_method(info, &name, true, &mut entry.method);
        }
    }
    log::debug!("bound names in {} methods", program.method_count());
}
