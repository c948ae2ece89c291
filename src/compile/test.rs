use super::*;
use crate::heap::parse_object_graph;
use crate::ir::{Expr, HeapRecord, Stmt};
use crate::parser::parse_squeak_source;
use pretty_assertions::assert_eq;

/// A host with an Object class, a couple of natives and two primitives.
#[derive(Default)]
struct TestHost {
    natives: Vec<(&'static str, bool, &'static str)>,
}

impl Host for TestHost {
    fn has_native_method(&self, class: &str, class_side: bool, selector: &str) -> bool {
        self.natives.contains(&(class, class_side, selector))
    }

    fn implements(&self, selector: &str) -> bool {
        self.natives.iter().any(|(_, _, s)| *s == selector)
    }

    fn class_format(&self, class: &str) -> Option<SubclassKind> {
        (class == "Object").then_some(SubclassKind::Fixed)
    }

    fn primitive_template(&self, _: Option<&str>, id: &PrimitiveId, _: usize) -> Option<Vec<ir::Stmt>> {
        let inputs = match id {
            PrimitiveId::Number(60) => 1,
            PrimitiveId::Number(61) => 2,
            _ => return None,
        };
        let mut args = vec![Expr::This];
        args.extend((0..inputs).map(Expr::Placeholder));
        Some(vec![Stmt::TryPrimitive {
            key: id.to_string(),
            args,
        }])
    }
}

fn class(name: &str, superclass: &str, inst_vars: &str) -> String {
    format!(
        "{} subclass: #{} instanceVariableNames: '{}' classVariableNames: '' poolDictionaries: '' category: 'Test'!\n",
        superclass, name, inst_vars
    )
}

fn methods(class: &str, body: &str) -> String {
    format!("!{} methodsFor: 'test'!\n{}! !\n", class, body)
}

fn compile_with(source: &str, host: &TestHost) -> Result<Compiled> {
    let program = parse_squeak_source(source).unwrap_or_else(|e| panic!("{}", e));
    compile_program(&program, None, host, &CompileOptions::default())
}

fn compile(source: &str) -> Compiled {
    compile_with(source, &TestHost::default()).unwrap_or_else(|e| panic!("{}", e))
}

fn body(compiled: &Compiled, class: &str, selector: &str) -> Vec<Stmt> {
    let decl = compiled.program.class(class).expect("class");
    decl.method(selector, false).expect("method").body.clone()
}

fn constant_id(compiled: &Compiled, constant: &Constant) -> ConstId {
    compiled
        .program
        .constants
        .iter()
        .position(|c| c == constant)
        .expect("constant")
}

#[test]
fn test_identical_literals_share_constants() {
    let source = class("A", "Object", "")
        + &methods("A", "a\n\t^'x'!\nb\n\t^'x'!\nc\n\t^#(1 $a)!\nd\n\t^#(1 $a)!\ne\n\t^#x");
    let compiled = compile(&source);
    let constants = &compiled.program.constants;
    assert_eq!(&constants[..3], &[Constant::Nil, Constant::True, Constant::False]);
    let count = |wanted: &dyn Fn(&Constant) -> bool| constants.iter().filter(|c| wanted(c)).count();
    assert_eq!(count(&|c| *c == Constant::String("x".to_string())), 1);
    assert_eq!(count(&|c| matches!(c, Constant::Array(_))), 1);
    // a symbol never merges with the equal string
    assert_eq!(count(&|c| *c == Constant::Symbol("x".to_string())), 1);
    assert_eq!(body(&compiled, "A", "a"), body(&compiled, "A", "b"));
}

#[test]
fn test_single_literal_implementation_is_inlined() {
    let source = class("A", "Object", "")
        + &class("B", "Object", "")
        + &methods("A", "isFoo\n\t^true")
        + &methods("B", "useFoo\n\t^3 isFoo");
    let compiled = compile(&source);
    assert_eq!(body(&compiled, "B", "useFoo"), vec![Stmt::Return(Expr::Const(ir::TRUE))]);

    // a second implementation makes it an ordinary send
    let source = source + &methods("B", "isFoo\n\t^false");
    let compiled = compile(&source);
    assert_eq!(
        body(&compiled, "B", "useFoo"),
        vec![Stmt::Return(Expr::send(
            Expr::Const(constant_id(&compiled, &Constant::SmallInteger(3))),
            "isFoo",
            vec![]
        ))]
    );
}

#[test]
fn test_blocks_reading_method_temporaries_are_not_inlined() {
    let source = class("A", "Object", "")
        + &class("B", "Object", "")
        + &methods("A", "blk\n\t| t |\n\t^[t]!\nident\n\t^[:x | | y | y := x. [y] value]")
        + &methods("B", "useBlk\n\t| t |\n\tt := 5.\n\t^(3 blk) value!\nuseIdent\n\t^3 ident");
    let compiled = compile(&source);

    let use_blk = body(&compiled, "B", "useBlk");
    let Some(Stmt::Return(Expr::Send { receiver, selector, .. })) = use_blk.last() else {
        panic!("unexpected body {:?}", use_blk);
    };
    assert_eq!(selector, "value");
    assert_eq!(
        receiver.as_ref(),
        &Expr::send(
            Expr::Const(constant_id(&compiled, &Constant::SmallInteger(3))),
            "blk",
            vec![]
        )
    );

    // a block that only reads its own variables is still a literal
    assert!(matches!(
        body(&compiled, "B", "useIdent").as_slice(),
        [Stmt::Return(Expr::Block(_))]
    ));
}

#[test]
fn test_host_selectors_are_not_inlined() {
    let source = class("A", "Object", "")
        + &methods("A", "isFoo\n\t^true")
        + &methods("A", "useFoo\n\t^self isFoo");
    let host = TestHost {
        natives: vec![("Object", false, "isFoo")],
    };
    let compiled = compile_with(&source, &host).expect("compile");
    assert_eq!(
        body(&compiled, "A", "useFoo"),
        vec![Stmt::Return(Expr::send(Expr::This, "isFoo", vec![]))]
    );
}

#[test]
fn test_native_methods_are_skipped() {
    let source = class("A", "Object", "") + &methods("A", "yourself\n\t^self!\nfoo\n\t^1");
    let host = TestHost {
        natives: vec![("A", false, "yourself")],
    };
    let compiled = compile_with(&source, &host).expect("compile");
    let decl = compiled.program.class("A").expect("A");
    let selectors: Vec<&str> = decl.instance_methods.iter().map(|m| m.selector.as_str()).collect();
    assert_eq!(selectors, vec!["foo"]);
}

#[test]
fn test_superclasses_come_first() {
    let source = class("C", "B", "") + &class("B", "A", "") + &class("A", "Object", "");
    let compiled = compile(&source);
    let names: Vec<&str> = compiled.program.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    let err = compile_with(&class("A", "Missing", ""), &TestHost::default()).unwrap_err();
    assert_eq!(err, CompileError::NoSuchClass("Missing".to_string()));
    assert_eq!(err.to_string(), "No such class 'Missing'");
}

#[test]
fn test_super_errors() {
    let source = class("A", "Object", "") + &methods("A", "foo\n\tsuper bar; baz");
    let err = compile_with(&source, &TestHost::default()).unwrap_err();
    assert_eq!(err, CompileError::SuperCascade);

    let source = class("Root", "nil", "") + &methods("Root", "foo\n\t^super foo");
    let err = compile_with(&source, &TestHost::default()).unwrap_err();
    assert_eq!(err, CompileError::SuperInRoot("Root>>foo".to_string()));
}

#[test]
fn test_super_send_names_the_superclass() {
    let source = class("A", "Object", "") + &class("B", "A", "") + &methods("B", "foo\n\t^super foo + 1");
    let compiled = compile(&source);
    let one = constant_id(&compiled, &Constant::SmallInteger(1));
    assert_eq!(
        body(&compiled, "B", "foo"),
        vec![Stmt::Return(Expr::send(
            Expr::SuperSend {
                superclass: "A".to_string(),
                class_side: false,
                selector: "foo".to_string(),
                args: vec![],
            },
            "+",
            vec![Expr::Const(one)]
        ))]
    );
}

#[test]
fn test_primitive_templates_are_spliced() {
    let source = class("A", "Object", "") + &methods("A", "at: i\n\t<primitive: 60>\n\t^nil");
    let compiled = compile(&source);
    assert_eq!(
        body(&compiled, "A", "at:"),
        vec![
            Stmt::Comment("<primitive: 60>".to_string()),
            Stmt::TryPrimitive {
                key: "60".to_string(),
                args: vec![Expr::This, Expr::Local("i".to_string())],
            },
            Stmt::Return(Expr::Const(ir::NIL)),
        ]
    );
}

#[test]
fn test_primitive_errors() {
    let source = class("A", "Object", "") + &methods("A", "at: i\n\t<primitive: 61>\n\t^nil");
    let err = compile_with(&source, &TestHost::default()).unwrap_err();
    assert_eq!(
        err,
        CompileError::PrimitiveArity {
            method: "A>>at:".to_string(),
            primitive: "61".to_string(),
            index: 1,
        }
    );

    let source = class("A", "Object", "") + &methods("A", "frob\n\t<primitive: 4242>\n\t^nil");
    let compiled = compile(&source);
    assert_eq!(
        body(&compiled, "A", "frob")[..2],
        [
            Stmt::Comment("<primitive: 4242>".to_string()),
            Stmt::Comment("No such primitive.".to_string()),
        ]
    );
}

#[test]
fn test_conditionals_and_loops_are_inlined() {
    let source = class("A", "Object", "n")
        + &methods(
            "A",
            "max: x\n\tself > x ifTrue: [^self].\n\t^x!\ncount\n\t[n < 10] whileTrue: [n := n + 1]",
        );
    let compiled = compile(&source);
    assert_eq!(
        body(&compiled, "A", "max:"),
        vec![
            Stmt::If {
                test: Expr::send(Expr::This, ">", vec![Expr::Local("x".to_string())]),
                then_branch: vec![Stmt::Return(Expr::This)],
                else_branch: vec![],
            },
            Stmt::Return(Expr::Local("x".to_string())),
        ]
    );
    let count = body(&compiled, "A", "count");
    assert!(matches!(
        count.as_slice(),
        [Stmt::While { expect: true, .. }, Stmt::Return(Expr::This)]
    ));
}

#[test]
fn test_answer_from_block_catches() {
    let source = class("A", "Object", "") + &methods("A", "find\n\t#(1 2) do: [:e | ^e].\n\t^nil!\nplain\n\t^1");
    let compiled = compile(&source);
    let decl = compiled.program.class("A").expect("A");
    assert!(decl.method("find", false).expect("find").catches_answer);
    assert!(!decl.method("plain", false).expect("plain").catches_answer);
}

#[test]
fn test_cascade_temporary_is_declared() {
    let source = class("A", "Object", "") + &methods("A", "foo\n\t^self bar; baz");
    let compiled = compile(&source);
    let method = compiled.program.class("A").expect("A").method("foo", false).expect("foo").clone();
    assert_eq!(method.locals, vec!["$1".to_string()]);
    assert_eq!(
        method.body,
        vec![Stmt::Return(Expr::Cascade {
            temp: "$1".to_string(),
            receiver: Box::new(Expr::This),
            sends: vec![("bar".to_string(), vec![]), ("baz".to_string(), vec![])],
        })]
    );
}

#[test]
fn test_unknown_globals_are_reported_once() {
    let source = class("A", "Object", "") + &methods("A", "a\n\t^Transcript!\nb\n\t^Transcript!\nc\n\tKnown := 3");
    let compiled = compile(&source);
    assert_eq!(compiled.unknown_globals, vec!["Transcript".to_string()]);
}

const GRAPH: &str = "
X := {
    {#global. #Origin. U at: 2}.
    {#classVar. #Point. #Zero. U at: 2}.
}.
U := {
    {#class. #Point}.
    {#Point. {1. U at: 1}}.
}";

#[test]
fn test_heap_initialisation() {
    let source = class("Point", "Object", "x y");
    let program = parse_squeak_source(&source).expect("parse");
    let graph = parse_object_graph(GRAPH).expect("graph");
    let compiled =
        compile_program(&program, Some(&graph), &TestHost::default(), &CompileOptions::default()).expect("compile");
    let heap = compiled.program.heap.clone().expect("heap");
    let one = constant_id(&compiled, &Constant::SmallInteger(1));
    assert_eq!(
        heap.records,
        vec![
            HeapRecord::Class("Point".to_string()),
            HeapRecord::Object {
                class: "Point".to_string(),
                inst_vars: vec![ir::HeapValue::Const(one), ir::HeapValue::Ref(0)],
                payload: ir::HeapPayload::None,
            },
        ]
    );
    assert_eq!(heap.globals, vec![("Origin".to_string(), ir::HeapValue::Ref(1))]);
    assert_eq!(
        heap.class_vars,
        vec![("Point".to_string(), "Zero".to_string(), ir::HeapValue::Ref(1))]
    );
}

#[test]
fn test_packed_data_needs_a_byte_class() {
    let source = class("Point", "Object", "x y");
    let program = parse_squeak_source(&source).expect("parse");
    let graph = parse_object_graph("U := {{#Point. {}. '0102'}}").expect("graph");
    let err = compile_program(&program, Some(&graph), &TestHost::default(), &CompileOptions::default())
        .unwrap_err();
    assert!(matches!(err, CompileError::Heap(HeapError::Malformed(_))), "{:?}", err);
}

#[test]
fn test_initializers_follow_class_order() {
    let source = class("B", "A", "")
        + &class("A", "Object", "")
        + "!A class methodsFor: 'init'!\ninitialize\n\t^self! !\n"
        + "!B class methodsFor: 'init'!\ninitialize\n\t^self! !\n";
    let program = parse_squeak_source(&source).expect("parse");
    let options = CompileOptions {
        initialize_classes: true,
    };
    let compiled = compile_program(&program, None, &TestHost::default(), &options).expect("compile");
    assert_eq!(compiled.program.initializers, vec!["A".to_string(), "B".to_string()]);

    let compiled = compile_program(&program, None, &TestHost::default(), &CompileOptions::default()).expect("compile");
    assert!(compiled.program.initializers.is_empty());
}

#[test]
fn test_rendering() {
    let source = class("A", "Object", "n")
        + &methods("A", "n\n\t^n!\nfind\n\t#(1) do: [:e | ^e].\n\t^nil");
    let text = compile(&source).program.to_string();
    assert!(text.starts_with("(function (__smalltalk) {\n"), "{}", text);
    assert!(text.contains("var _A = __smalltalk.defClass('A', _Object, {"), "{}", text);
    assert!(text.contains("n: function A$n() {"), "{}", text);
    assert!(text.contains("return this._n;"), "{}", text);
    assert!(text.contains("throw $a;"), "{}", text);
    assert!(text.contains("}, ['_n'], [], 0);"), "{}", text);
    assert!(text.trim_end().ends_with("});"), "{}", text);
}
