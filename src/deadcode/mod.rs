use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;

use crate::ast::{Message, Node, PrimitiveId, Program};

#[cfg(test)]
pub mod test;

/// Selector to the set of selectors its implementations may send.
pub type CallGraph = IndexMap<String, BTreeSet<String>>;

struct GraphBuilder<'g> {
    graph: &'g mut CallGraph,
    caller: String,
}

impl GraphBuilder<'_> {
    fn edge(&mut self, callee: &str) {
        self.graph
            .entry(self.caller.clone())
            .or_default()
            .insert(callee.to_string());
    }

    fn message(&mut self, message: &Message) {
        self.edge(&message.selector);
        // menu items name the selector they will perform
        if message.selector == "add:action:" {
            if let Some(Node::Symbol(action)) = message.args.get(1) {
                self.edge(action);
            }
        }
        for arg in &message.args {
            self.visit(arg);
        }
    }

    fn visit(&mut self, node: &Node) {
        match node {
            Node::MessageExpr { receiver, message } => {
                self.visit(receiver);
                self.message(message);
            }
            Node::Cascade { head, messages } => {
                self.visit(head);
                for message in messages {
                    self.message(message);
                }
            }
            Node::Primitive(primitive) => {
                if let PrimitiveId::Named(name) = &primitive.id {
                    self.edge(name);
                }
            }
            other => {
                for child in other.children() {
                    self.visit(child);
                }
            }
        }
    }
}

/// Builds the selector-level call graph of every method in the program.
/// Every defined selector is a vertex, even one that sends nothing.
pub fn call_graph(program: &Program) -> CallGraph {
    let mut graph = CallGraph::new();
    for class in program.classes.values() {
        for entry in class.methods.values().chain(class.class_methods.values()) {
            let selector = &entry.method.selector;
            graph.entry(selector.clone()).or_default();
            let mut builder = GraphBuilder {
                graph: &mut graph,
                caller: selector.clone(),
            };
            for statement in &entry.method.body {
                builder.visit(statement);
            }
        }
    }
    graph
}

/// Marks every selector reachable from `roots` and deletes the methods whose
/// selectors were never reached. Answers the removed methods as sorted
/// `Class>>selector` / `Class class>>selector` names.
pub fn dead_methods(program: &mut Program, roots: &[String]) -> Vec<String> {
    let graph = call_graph(program);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: Vec<&str> = vec![];
    for root in roots {
        if graph.contains_key(root.as_str()) && seen.insert(root) {
            queue.push(root);
        }
    }
    while let Some(selector) = queue.pop() {
        let Some(callees) = graph.get(selector) else {
            continue;
        };
        for callee in callees {
            if graph.contains_key(callee.as_str()) && seen.insert(callee) {
                queue.push(callee);
            }
        }
    }

    let mut total = 0;
    let mut dead = vec![];
    for class in program.classes.values_mut() {
        total += class.methods.len() + class.class_methods.len();
        let name = class.name.clone();
        class.methods.retain(|selector, _| {
            let live = seen.contains(selector.as_str());
            if !live {
                dead.push(format!("{}>>{}", name, selector));
            }
            live
        });
        class.class_methods.retain(|selector, _| {
            let live = seen.contains(selector.as_str());
            if !live {
                dead.push(format!("{} class>>{}", name, selector));
            }
            live
        });
    }
    log::info!("{} dead methods found (of {} methods)", dead.len(), total);
    dead.sort();
    dead
}
