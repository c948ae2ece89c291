use super::*;
use crate::ast::{Block, Message, Primitive, PrimitiveId, SubclassKind, Weirdness};
use pretty_assertions::assert_eq;

fn expr(input: &str) -> Node {
    parse_expr(input).unwrap_or_else(|e| panic!("{}: {}", input, e))
}

fn method(input: &str) -> MethodDef {
    parse_method(input).unwrap_or_else(|e| panic!("{}: {}", input, e))
}

fn send(receiver: Node, selector: &str, args: Vec<Node>) -> Node {
    Node::message(receiver, selector, args)
}

#[test]
fn test_characters() {
    for c in (0u32..=255).filter_map(char::from_u32) {
        assert_eq!(expr(&format!("${}", c)), Node::Character(c), "byte {}", c as u32);
    }
}

#[test]
fn test_symbols() {
    for s in ["a", "a:", "a:b:", "x:y:", "foo:bar:baz:"] {
        assert_eq!(expr(&format!("#{}", s)), Node::Symbol(s.to_string()));
    }
    for s in [":", ":x", ":x:", ":x:y", ":x:y:"] {
        assert_eq!(expr(&format!("#{}", s)), Node::Symbol(s.to_string()));
    }
}

#[test]
fn test_redundant_hash_prefixes() {
    let a = Node::Symbol("a".to_string());
    for input in ["#a", "#\n'a'", "####a", "# # # # a", "# \"comment\" a", "##'a'"] {
        assert_eq!(expr(input), a, "{:?}", input);
    }
    let colon_a = Node::Symbol(":a:".to_string());
    for input in ["#:a:", "#':a:'", "#\r    :a:"] {
        assert_eq!(expr(input), colon_a, "{:?}", input);
    }
    assert_eq!(expr("#+"), Node::Symbol("+".to_string()));
    assert_eq!(expr("#'hello world'"), Node::Symbol("hello world".to_string()));
}

#[test]
fn test_floats() {
    for (input, value) in [
        ("-1.0e6", -1.0e6),
        ("1.0e300", 1.0e300),
        ("1e-300", 1e-300),
        ("-1e-300", -1e-300),
        ("1.0e6", 1.0e6),
        ("3.25", 3.25),
    ] {
        assert_eq!(expr(input), Node::Float(value), "{}", input);
    }
}

#[test]
fn test_integers() {
    assert_eq!(expr("1e6"), Node::Integer(1_000_000));
    assert_eq!(expr("1e-0"), Node::Integer(1));
    assert_eq!(expr("2r11e28"), Node::Integer(805_306_368));
    assert_eq!(expr("16r1F"), Node::Integer(31));
    assert_eq!(expr("-42"), Node::Integer(-42));
    assert_eq!(expr("1073741823"), Node::Integer(0x3fff_ffff));
    assert_eq!(expr("-1073741823"), Node::Integer(-0x3fff_ffff));
}

#[test]
fn test_large_integers() {
    assert_eq!(expr("2r1111e27"), Node::LargeInteger("78000000".to_string()));
    assert_eq!(expr("2r111111e26"), Node::LargeInteger("FC000000".to_string()));
    assert_eq!(expr("1073741824"), Node::LargeInteger("40000000".to_string()));
    assert_eq!(expr("-1073741824"), Node::LargeInteger("-40000000".to_string()));
    assert_eq!(
        expr("100000000000000000000"),
        Node::LargeInteger("56BC75E2D63100000".to_string())
    );
}

#[test]
fn test_bad_numbers() {
    assert!(parse_expr("2r1.1").is_err());
    assert!(parse_expr("2r12").is_err());
    assert!(parse_expr("40r1").is_err());
    assert!(parse_expr("1e999999999").is_err());
    assert!(parse_expr("1e99999999999999999999").is_err());
    assert!(parse_expr("1e10000").is_ok());
}

#[test]
fn test_keyword_whitespace() {
    let expected = MethodDef {
        selector: "foo:".to_string(),
        args: vec!["bar".to_string()],
        locals: vec![],
        body: vec![Node::Nil],
    };
    assert_eq!(method("foo: bar nil."), expected);
    assert_eq!(method("foo:bar nil."), expected);
}

#[test]
fn test_block_params_are_locals() {
    assert_eq!(
        expr("[:i|i]"),
        Node::Block(Block {
            params: vec!["i".to_string()],
            locals: vec![],
            body: vec![Node::Local("i".to_string())],
        })
    );
    assert_eq!(
        expr("[:i | | t | t := i. j]"),
        Node::Block(Block {
            params: vec!["i".to_string()],
            locals: vec!["t".to_string()],
            body: vec![
                Node::Assign {
                    target: Box::new(Node::Local("t".to_string())),
                    value: Box::new(Node::Local("i".to_string())),
                },
                Node::Identifier("j".to_string()),
            ],
        })
    );
}

#[test]
fn test_cascade_head_is_whole_message() {
    let node = expr("2 + 2 factorial; + 2");
    assert_eq!(
        node,
        Node::Cascade {
            head: Box::new(send(
                Node::Integer(2),
                "+",
                vec![send(Node::Integer(2), "factorial", vec![])]
            )),
            messages: vec![Message {
                selector: "+".to_string(),
                args: vec![Node::Integer(2)],
            }],
        }
    );
}

#[test]
fn test_precedence() {
    let node = expr("a foo: b + c bar baz: d");
    assert_eq!(
        node,
        send(
            Node::Identifier("a".to_string()),
            "foo:baz:",
            vec![
                send(
                    Node::Identifier("b".to_string()),
                    "+",
                    vec![send(Node::Identifier("c".to_string()), "bar", vec![])]
                ),
                Node::Identifier("d".to_string()),
            ]
        )
    );
}

#[test]
fn test_assignment() {
    let node = expr("x := y _ 3");
    let Node::Assign { target, value } = node else {
        panic!("expected assignment");
    };
    assert_eq!(*target, Node::Identifier("x".to_string()));
    assert!(matches!(*value, Node::Assign { .. }));
    assert!(parse_expr("self := 3").is_err());
}

#[test]
fn test_constant_arrays() {
    assert_eq!(
        expr("#(1 $a 'b' #c d e: f:g: (1 2) #(3) nil true -4 + )"),
        Node::ConstantArray(vec![
            Node::Integer(1),
            Node::Character('a'),
            Node::String("b".to_string()),
            Node::Symbol("c".to_string()),
            Node::Symbol("d".to_string()),
            Node::Symbol("e:".to_string()),
            Node::Symbol("f:g:".to_string()),
            Node::ConstantArray(vec![Node::Integer(1), Node::Integer(2)]),
            Node::ConstantArray(vec![Node::Integer(3)]),
            Node::Nil,
            Node::True,
            Node::Integer(-4),
            Node::Symbol("+".to_string()),
        ])
    );
    assert!(parse_expr("#(1 2").is_err());
}

#[test]
fn test_brace_arrays() {
    assert_eq!(
        expr("{1. 2 + 3. x}"),
        Node::ArrayExpr(vec![
            Node::Integer(1),
            send(Node::Integer(2), "+", vec![Node::Integer(3)]),
            Node::Identifier("x".to_string()),
        ])
    );
    assert_eq!(expr("{}"), Node::ArrayExpr(vec![]));
}

#[test]
fn test_method_bodies() {
    let m = method("at: i put: v | old | old := i. ^old");
    assert_eq!(m.selector, "at:put:");
    assert_eq!(m.args, vec!["i", "v"]);
    assert_eq!(m.locals, vec!["old"]);
    assert_eq!(m.body.len(), 2);
    assert_eq!(
        m.body[1],
        Node::Answer(Box::new(Node::Local("old".to_string())))
    );

    let m = method("+ other ^other");
    assert_eq!(m.selector, "+");
    assert_eq!(m.args, vec!["other"]);

    // stray periods are empty statements
    let m = method("foo . . 1. . 2");
    assert_eq!(m.body, vec![Node::Integer(1), Node::Integer(2)]);
}

#[test]
fn test_primitives() {
    let m = method("+ arg <primitive: 1> ^super + arg");
    assert_eq!(
        m.body[0],
        Node::Primitive(Primitive {
            id: PrimitiveId::Number(1),
            module: None,
        })
    );
    let m = method("foo <primitive: 'primFoo' module: 'FooPlugin'> ^nil");
    assert_eq!(
        m.body[0],
        Node::Primitive(Primitive {
            id: PrimitiveId::Named("primFoo".to_string()),
            module: Some("FooPlugin".to_string()),
        })
    );
}

#[test]
fn test_duplicate_names() {
    assert!(parse_method("foo: a bar: a ^a").is_err());
    assert!(parse_method("foo: a | a | ^a").is_err());
    assert!(parse_method("foo | x x | ^1").is_err());
    assert!(parse_expr("[:x :x | x]").is_err());
    assert!(parse_method("foo: self ^1").is_err());
}

#[test]
fn test_answer_must_be_last() {
    assert!(parse_method_no_args("^0. ^0.").is_err());
    assert!(parse_method_no_args("^0. +").is_err());
    assert!(parse_method_no_args("| a | a := 1. ^a").is_ok());
}

#[test]
fn test_parse_modes() {
    assert_eq!(parse("3", ParseMode::Expr), Ok(Parsed::Expr(Node::Integer(3))));
    let Ok(Parsed::Method(m)) = parse("yourself ^self", ParseMode::Method) else {
        panic!("expected method");
    };
    assert_eq!(m.body, vec![Node::Answer(Box::new(Node::SelfRef))]);
    assert!(parse("3 4", ParseMode::Expr).is_err());
}

const SOURCE: &str = "'From Squeak 2.8 of 13 June 2000 on 1 January 2001'!\r\
Object subclass: #Point\r\
\tinstanceVariableNames: 'x y '\r\
\tclassVariableNames: 'Origin'\r\
\tpoolDictionaries: ''\r\
\tcategory: 'Graphics-Primitives'!\r\
!Point commentStamp: '<historical>' prior: 0!\r\
I represent an x-y pair of numbers!!\r\
!\r\
\r\
!Point methodsFor: 'accessing' stamp: 'jm 1/1/2001'!\r\
x\r\
\t^x! !\r\
\r\
!Point methodsFor: 'arithmetic'!\r\
+ arg\r\
\t\"Answer a new point. Bangs!! are escaped.\"\r\
\t^x + arg!\r\
- arg\r\
\t^x - arg! !\r\
\r\
!Point class methodsFor: 'instance creation'!\r\
x: ax y: ay\r\
\t^self basicNew setX: ax setY: ay! !\r\
\r\
Point class instanceVariableNames: 'cache'!\r\
\"-----------------------------------\"!\r\
\r\
\x0cSmalltalk at: #Foo put: 3!\r\
TextConstants at: #Bar put: (this is not smalltalk)!\r\
";

#[test]
fn test_chunk_format() {
    let program = parse_squeak_source(SOURCE).unwrap_or_else(|e| panic!("{}", e));
    assert_eq!(program.classes.len(), 1);
    let point = program.class("Point").expect("Point");
    assert_eq!(point.superclass.as_deref(), Some("Object"));
    assert_eq!(point.kind, SubclassKind::Fixed);
    assert_eq!(point.inst_vars, vec!["x", "y"]);
    assert_eq!(point.class_vars, vec!["Origin"]);
    assert_eq!(point.category, "Graphics-Primitives");
    assert_eq!(
        point.methods.keys().collect::<Vec<_>>(),
        vec!["x", "+", "-"]
    );
    assert_eq!(point.methods["x"].category, "accessing");
    assert_eq!(
        point.class_methods.keys().collect::<Vec<_>>(),
        vec!["x:y:"]
    );
    assert_eq!(point.class_inst_vars, vec!["cache"]);
    assert_eq!(
        point.weirdness,
        vec![Weirdness::InstanceVariableNames(vec!["cache".to_string()])]
    );
}

#[test]
fn test_chunk_variable_kinds() {
    let source = "nil subclass: #Object instanceVariableNames: '' classVariableNames: '' poolDictionaries: '' category: 'Kernel'!\n\
Object variableByteSubclass: #Bytes instanceVariableNames: '' classVariableNames: '' poolDictionaries: '' category: 'Kernel'!\n\
Object variableWordSubclass: #Words instanceVariableNames: '' classVariableNames: '' poolDictionaries: '' category: 'Kernel'!\n";
    let program = parse_squeak_source(source).unwrap_or_else(|e| panic!("{}", e));
    assert_eq!(program.class("Object").map(|c| c.superclass.clone()), Some(None));
    assert_eq!(program.class("Bytes").map(|c| c.kind), Some(SubclassKind::Byte));
    assert_eq!(program.class("Words").map(|c| c.kind), Some(SubclassKind::Word));
}

#[test]
fn test_chunk_errors() {
    let err = parse_squeak_source("Object subclass: #A instanceVariableNames: '' classVariableNames: '' poolDictionaries: '' category: 'A'!\n\n$$$").unwrap_err();
    assert_eq!(err.line, 3);
    assert!(err.message.contains("unrecognized source element"));

    let err = parse_squeak_source("!Missing methodsFor: 'x'!\nfoo ^1! !\n").unwrap_err();
    assert!(err.message.contains("unrecognized class name"));

    // an error inside a method is reported against the whole file
    let err = parse_squeak_source(
        "Object subclass: #A instanceVariableNames: '' classVariableNames: '' poolDictionaries: '' category: 'A'!\n\
!A methodsFor: 'x'!\nfoo\n  ^ ) ! !\n",
    )
    .unwrap_err();
    assert_eq!(err.line, 4);
}

#[test]
fn test_error_columns_count_escaped_bangs() {
    let err = parse_squeak_source(
        "Object subclass: #A instanceVariableNames: '' classVariableNames: '' poolDictionaries: '' category: 'A'!\n\
!A methodsFor: 'x'!\nfoo\n  ^'x!!y!!' , ) ! !\n",
    )
    .unwrap_err();
    assert_eq!((err.line, err.column), (4, 15));
    assert!(err.message.contains("expected expression, got: )"));

    let err = parse_squeak_source("Object subclass: #A instanceVariableNames: 'a!!b' classVariableNames: '' poolDictionaries: '' category: 'A' ) !\n")
        .unwrap_err();
    assert_eq!((err.line, err.column), (1, 109));
}

#[test]
fn test_duplicate_methods_keep_the_last() {
    let source = "Object subclass: #A instanceVariableNames: '' classVariableNames: '' poolDictionaries: '' category: 'A'!\n\
!A methodsFor: 'x'!\nfoo ^1! !\n\
!A methodsFor: 'x'!\nfoo ^2! !\n";
    let program = parse_squeak_source(source).unwrap_or_else(|e| panic!("{}", e));
    let foo = &program.class("A").expect("A").methods["foo"];
    assert_eq!(foo.method.body, vec![Node::Answer(Box::new(Node::Integer(2)))]);
}
