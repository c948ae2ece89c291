use super::*;
use crate::parser::{parse_expr, parse_method};
use pretty_assertions::assert_eq;

fn rename_locals(node: Node) -> Node {
    match node {
        Node::Local(name) => Node::Local(format!("_{}", name)),
        other => other,
    }
}

#[test]
fn test_transform_rewrites_bottom_up() {
    let mut method = parse_method("foo: a ^[:b | a + b] value: a").expect("parse");
    let mut count = 0;
    for node in &mut method.body {
        node.transform(&mut |n| {
            count += 1;
            rename_locals(n)
        });
    }
    let mut locals = vec![];
    for node in &method.body {
        node.walk(&mut |n| {
            if let Node::Local(name) = n {
                locals.push(name.clone());
            }
        });
    }
    assert_eq!(locals, vec!["_a", "_b", "_a"]);
    // answer, send, block, block's send, three locals
    assert_eq!(count, 7);
}

#[test]
fn test_transform_leaves_singletons() {
    let mut node = parse_expr("{nil. true. self}").expect("parse");
    let before = node.clone();
    node.transform(&mut rename_locals);
    assert_eq!(node, before);
}

#[test]
fn test_effect_free() {
    let free = ["3", "x", "{1. x. #(a b)}", "[^3]", "self", "'s'"];
    for text in free {
        assert!(parse_expr(text).expect("parse").is_effect_free(), "{}", text);
    }
    let not_free = ["x foo", "{1. x foo}", "x := 3", "super"];
    for text in not_free {
        assert!(!parse_expr(text).expect("parse").is_effect_free(), "{}", text);
    }
}

#[test]
fn test_subclass_kinds() {
    for kind in [
        SubclassKind::Fixed,
        SubclassKind::Variable,
        SubclassKind::Weak,
        SubclassKind::Word,
        SubclassKind::Byte,
    ] {
        assert_eq!(SubclassKind::from_keyword(kind.keyword()), Some(kind));
    }
    assert_eq!(SubclassKind::from_keyword("subclassOf"), None);
    assert!(!SubclassKind::Fixed.is_indexable());
    assert!(SubclassKind::Word.is_indexable());
}

#[test]
fn test_variable_names() {
    assert_eq!(variable_names("x y  z "), vec!["x", "y", "z"]);
    assert!(variable_names("").is_empty());
    assert_eq!(
        Weirdness::InstanceVariableNames(vec!["a".to_string(), "b".to_string()]).to_string(),
        "class instanceVariableNames: 'a b'"
    );
}

#[test]
fn test_method_count() {
    let mut program = Program::default();
    let mut class = ClassDef::new("A", None, SubclassKind::Fixed);
    let method = parse_method("foo ^1").expect("parse");
    class.methods.insert(
        "foo".to_string(),
        MethodEntry {
            category: "x".to_string(),
            offset: 0,
            method: method.clone(),
        },
    );
    class.class_methods.insert(
        "foo".to_string(),
        MethodEntry {
            category: "x".to_string(),
            offset: 0,
            method,
        },
    );
    program.classes.insert("A".to_string(), class);
    assert_eq!(program.method_count(), 2);
    assert_eq!(program.class("A").map(|c| c.methods_of(true).len()), Some(1));
}
