use std::collections::HashMap;

use crate::ast::{Node, Program};
use crate::compile::Host;

/// True when `node` reads no variable outside the blocks it sits in.
/// `bound` holds the parameters and temporaries of those blocks.
fn uses_only_bound<'a>(node: &'a Node, bound: &mut Vec<&'a str>) -> bool {
    match node {
        Node::Local(name) => bound.contains(&name.as_str()),
        Node::Block(block) => {
            let depth = bound.len();
            bound.extend(block.params.iter().chain(&block.locals).map(String::as_str));
            let closed = block.body.iter().all(|n| uses_only_bound(n, bound));
            bound.truncate(depth);
            closed
        }
        other => other.children().into_iter().all(|n| uses_only_bound(n, bound)),
    }
}

/// True when a block literal can be evaluated anywhere: it touches no
/// receiver state, never answers from its method, and reads none of its
/// method's arguments or temporaries.
fn is_closed_block(node: &Node) -> bool {
    let mut closed = true;
    node.walk(&mut |n| {
        if matches!(
            n,
            Node::SelfRef | Node::Super | Node::ThisContext | Node::InstVar(_) | Node::Answer(_)
        ) {
            closed = false;
        }
    });
    closed && uses_only_bound(node, &mut vec![])
}

fn answered_literal(body: &[Node]) -> Option<&Node> {
    match body {
        [Node::Answer(value)] if value.is_literal() => match value.as_ref() {
            Node::Block(_) if !is_closed_block(value) => None,
            literal => Some(literal),
        },
        _ => None,
    }
}

/// Selectors implemented by exactly one method in the whole program (and by
/// nothing in the host), where that method takes no arguments and only
/// answers a literal. Maps each to the literal.
pub fn inlinable_selectors(program: &Program, host: &dyn Host) -> HashMap<String, Node> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut candidates: HashMap<&str, &Node> = HashMap::new();
    for class in program.classes.values() {
        for class_side in [false, true] {
            for (selector, entry) in class.methods_of(class_side) {
                *counts.entry(selector.as_str()).or_default() += 1;
                let method = &entry.method;
                if !method.args.is_empty() {
                    continue;
                }
                if let Some(literal) = answered_literal(&method.body) {
                    candidates.insert(selector.as_str(), literal);
                }
            }
        }
    }
    let inlinable: HashMap<String, Node> = candidates
        .into_iter()
        .filter(|(selector, _)| counts.get(selector) == Some(&1) && !host.implements(selector))
        .map(|(selector, literal)| (selector.to_string(), literal.clone()))
        .collect();
    log::debug!("{} inlinable selectors", inlinable.len());
    inlinable
}
