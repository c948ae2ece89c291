use super::*;
use crate::compile::{CompileOptions, compile_program};
use crate::heap::parse_object_graph;
use crate::parser::parse_squeak_source;
use pretty_assertions::assert_eq;

fn class(name: &str, superclass: &str, inst_vars: &str, class_vars: &str) -> String {
    format!(
        "{} subclass: #{} instanceVariableNames: '{}' classVariableNames: '{}' poolDictionaries: '' category: 'Test'!\n",
        superclass, name, inst_vars, class_vars
    )
}

fn methods(class: &str, body: &str) -> String {
    format!("!{} methodsFor: 'test'!\n{}! !\n", class, body)
}

fn class_methods(class: &str, body: &str) -> String {
    format!("!{} class methodsFor: 'test'!\n{}! !\n", class, body)
}

fn load_with(source: &str, heap: Option<&str>, options: &CompileOptions) -> Runtime {
    let program = parse_squeak_source(source).unwrap_or_else(|e| panic!("{}", e));
    let graph = heap.map(|text| parse_object_graph(text).unwrap_or_else(|e| panic!("{}", e)));
    let mut rt = Runtime::new();
    let compiled = compile_program(&program, graph.as_ref(), &rt, options).unwrap_or_else(|e| panic!("{}", e));
    rt.load(&compiled.program).unwrap_or_else(|e| panic!("{}", e));
    rt
}

fn load(source: &str) -> Runtime {
    load_with(source, None, &CompileOptions::default())
}

/// Compiles `body` as class-side method `run` of a fresh class and runs it.
fn run(body: &str) -> String {
    let source = class("T", "Object", "", "") + &class_methods("T", &format!("run\n{}", body));
    let mut rt = load(&source);
    let result = rt.run("T", "run").unwrap_or_else(|e| panic!("{}", e));
    rt.describe(result)
}

fn run_err(body: &str) -> RuntimeError {
    let source = class("T", "Object", "", "") + &class_methods("T", &format!("run\n{}", body));
    let mut rt = load(&source);
    match rt.run("T", "run") {
        Ok(v) => panic!("expected an error, got {}", rt.describe(v)),
        Err(e) => e,
    }
}

#[test]
fn test_bootstrap_metaclass_loop() {
    let rt = Runtime::new();
    let object = rt.class_named("Object").expect("Object");
    let metaclass = rt.class_named("Metaclass").expect("Metaclass");
    let class = rt.class_named("Class").expect("Class");

    let object_class = rt.class_of(Value::Obj(object));
    assert_eq!(rt.class_of(Value::Obj(object_class)), metaclass);
    assert_eq!(rt.class_of(Value::Obj(rt.class_of(Value::Obj(metaclass)))), metaclass);
    assert_eq!(rt.behavior(object_class).and_then(|b| b.superclass), Some(class));
    assert_eq!(rt.class_name(rt.class_of(rt.nil())), "UndefinedObject");
}

#[test]
fn test_single_character_symbols_are_interned() {
    let mut rt = Runtime::new();
    let before = rt.symbol("+");
    let again = rt.symbol("+");
    assert!(before.identical(again));
    let a = rt.symbol("at:put:");
    let b = rt.symbol("at:put:");
    assert!(a.identical(b));
    assert!(!a.identical(rt.string("at:put:")));
}

#[test]
fn test_arithmetic_and_comparison() {
    assert_eq!(run("\t^3 + 4 * 2"), "14");
    assert_eq!(run("\t^7 // 2"), "3");
    assert_eq!(run("\t^-7 // 2"), "-4");
    assert_eq!(run("\t^-7 \\\\ 2"), "1");
    assert_eq!(run("\t^-7 rem: 2"), "-1");
    assert_eq!(run("\t^6 / 3"), "2");
    assert_eq!(run("\t^1 / 2"), "0.5");
    assert_eq!(run("\t^1.5 + 1"), "2.5");
    assert_eq!(run("\t^3 < 4"), "true");
    assert_eq!(run("\t^3 = 'three'"), "false");
}

#[test]
fn test_small_integer_overflow() {
    assert_eq!(run("\t^1073741823 + 1"), "1073741824");
    assert_eq!(run("\t^(1073741823 + 1) class name"), "'LargePositiveInteger'");
    assert_eq!(run("\t^-1073741824 - 1"), "-1073741825");
    assert_eq!(run("\t^(1073741823 + 1 - 1) class name"), "'SmallInteger'");
}

#[test]
fn test_recursion_into_large_integers() {
    let source = class("M", "Object", "", "")
        + &class_methods("M", "fact: n\n\t^n <= 1 ifTrue: [1] ifFalse: [n * (self fact: n - 1)]");
    let mut rt = load(&source);
    let m = Value::Obj(rt.class_named("M").expect("M"));
    let result = rt.send_message(m, "fact:", &[Value::Int(25)]).expect("fact: 25");
    assert_eq!(rt.describe(result), "15511210043330985984000000");
}

#[test]
fn test_cascade_answers_last_message() {
    assert_eq!(run("\t^3 + 4; * 10"), "30");
    assert_eq!(run("\t^2 + 2 negated; + 2"), "4");
}

#[test]
fn test_non_local_return_from_block() {
    assert_eq!(run("\t#(1 2 3) do: [:x | x = 2 ifTrue: [^x]].\n\t^0"), "2");
}

#[test]
fn test_return_to_finished_home() {
    let source = class("T", "Object", "", "")
        + &class_methods("T", "maker\n\t^[:x | ^x]!\nrun\n\t^self maker value: 3");
    let mut rt = load(&source);
    assert!(matches!(rt.run("T", "run"), Err(RuntimeError::CannotReturn(_))));
}

#[test]
fn test_blocks_capture_variables() {
    let body = "\t| count inc |\n\tcount := 0.\n\tinc := [:by | count := count + by].\n\tinc value: 2.\n\tinc value: 3.\n\t^count";
    assert_eq!(run(body), "5");
    assert_eq!(run("\t^[:a :b | a - b] valueWithArguments: #(10 4)"), "6");
    assert_eq!(run("\t^[:a :b | a] numArgs"), "2");
}

#[test]
fn test_block_argument_count() {
    assert_eq!(
        run_err("\t^[:a | a] value"),
        RuntimeError::WrongArgumentCount {
            selector: "value:".to_string(),
            expected: 1,
            got: 0,
        }
    );
}

#[test]
fn test_loops() {
    let inlined = "\t| i sum |\n\ti := 0. sum := 0.\n\t[i < 5] whileTrue: [i := i + 1. sum := sum + i].\n\t^sum";
    assert_eq!(run(inlined), "15");
    let dynamic = "\t| b i |\n\ti := 0.\n\tb := [i < 3].\n\tb whileTrue: [i := i + 1].\n\t^i";
    assert_eq!(run(dynamic), "3");
    let counted = "\t| sum |\n\tsum := 0.\n\t1 to: 10 by: 3 do: [:k | sum := sum + k].\n\t^sum";
    assert_eq!(run(counted), "22");
    let repeated = "\t| n |\n\tn := 0.\n\t4 timesRepeat: [n := n + 2].\n\t^n";
    assert_eq!(run(repeated), "8");
}

#[test]
fn test_instance_variables_and_super() {
    let source = class("Animal", "Object", "name", "")
        + &class("Dog", "Animal", "", "")
        + &methods("Animal", "name: aString\n\tname := aString!\nname\n\t^name!\ngreeting\n\t^'...'")
        + &methods("Dog", "greeting\n\t^super greeting , 'woof'")
        + &class_methods("Dog", "named: aString\n\t^self new name: aString; yourself");
    let mut rt = load(&source);
    let dog = Value::Obj(rt.class_named("Dog").expect("Dog"));
    let rex = rt.string("Rex");
    let rex = rt.send_message(dog, "named:", &[rex]).expect("named:");
    assert_eq!(rt.describe(rex), "a Dog");
    let name = rt.send_message(rex, "name", &[]).expect("name");
    assert_eq!(rt.describe(name), "'Rex'");
    let greeting = rt.send_message(rex, "greeting", &[]).expect("greeting");
    assert_eq!(rt.describe(greeting), "'...woof'");
}

#[test]
fn test_does_not_understand() {
    assert_eq!(
        run_err("\t^3 frobnicate"),
        RuntimeError::DoesNotUnderstand {
            receiver: "3".to_string(),
            selector: "frobnicate".to_string(),
        }
    );
}

#[test]
fn test_perform() {
    assert_eq!(run("\t^3 perform: #+ with: 4"), "7");
    assert_eq!(run("\t^3 perform: #max: withArguments: #(5)"), "5");
    assert_eq!(
        run_err("\t^3 perform: #+ with: 1 with: 2"),
        RuntimeError::WrongArgumentCount {
            selector: "+".to_string(),
            expected: 1,
            got: 2,
        }
    );
    assert_eq!(
        run_err("\t^3 perform: #frob"),
        RuntimeError::Failed {
            message: "no such method #frob".to_string(),
            receiver: Some("3".to_string()),
        }
    );
}

#[test]
fn test_perform_in_superclass() {
    let source = class("A", "Object", "", "")
        + &class("B", "A", "", "")
        + &methods("A", "who\n\t^#a")
        + &methods("B", "who\n\t^#b")
        + &class_methods("B", "run\n\t^self new perform: #who withArguments: #() inSuperclass: A");
    let mut rt = load(&source);
    let result = rt.run("B", "run").expect("run");
    assert_eq!(rt.describe(result), "#a");
}

#[test]
fn test_primitive_falls_back_to_statements() {
    let source = class("A", "Object", "", "")
        + &methods("A", "at: i\n\t<primitive: 60>\n\t^#failed")
        + &class_methods("A", "run\n\t^self new at: 1");
    let mut rt = load(&source);
    let result = rt.run("A", "run").expect("run");
    assert_eq!(rt.describe(result), "#failed");
}

#[test]
fn test_primitive_success_skips_statements() {
    let source = "Object variableSubclass: #Slots instanceVariableNames: '' classVariableNames: '' poolDictionaries: '' category: 'Test'!\n".to_string()
        + &methods("Slots", "slotAt: i\n\t<primitive: 60>\n\t^#failed")
        + &class_methods("Slots", "run\n\t| s |\n\ts := self new: 2.\n\ts at: 2 put: 42.\n\t^s slotAt: 2");
    let mut rt = load(&source);
    let result = rt.run("Slots", "run").expect("run");
    assert_eq!(rt.describe(result), "42");
}

#[test]
fn test_if_error() {
    assert_eq!(run("\t^[nil foo] ifError: [#caught]"), "#caught");
    assert_eq!(run("\t^[nil foo] ifError: [:m | m]"), "'nil does not understand #foo'");
    assert_eq!(run("\t^[1 / 0] ifError: [:m :r | m , ' ' , r]"), "'division by zero 1'");
    assert_eq!(run("\t^[#(1 2) at: 3] ifError: [:m | #bounds]"), "#bounds");
    assert_eq!(run("\t^[7] ifError: [0]"), "7");
}

#[test]
fn test_error_carries_receiver() {
    assert_eq!(
        run_err("\t^self error: 'boom'"),
        RuntimeError::Failed {
            message: "boom".to_string(),
            receiver: Some("T".to_string()),
        }
    );
}

#[test]
fn test_identity_hash_is_stable_and_increasing() {
    let mut rt = Runtime::new();
    let a = rt.array(vec![]);
    let b = rt.array(vec![]);
    let first = rt.identity_hash(a);
    assert_eq!(rt.identity_hash(a), first);
    assert!(rt.identity_hash(b) > first);
}

#[test]
fn test_shallow_copy_shares_elements() {
    let mut rt = Runtime::new();
    let inner = rt.string("x");
    let array = rt.array(vec![inner, Value::Int(1)]);
    let copy = rt.shallow_copy(array);
    assert!(!copy.identical(array));
    let items = rt.array_items(copy).expect("items");
    assert!(items[0].identical(inner));
    assert_eq!(rt.describe(copy), "#('x' 1)");
}

#[test]
fn test_copies_keep_symbols_and_characters_unique() {
    assert_eq!(run("\t^#foo copy == #foo"), "true");
    assert_eq!(run("\t^#foo shallowCopy identityHash = #foo identityHash"), "true");
    assert_eq!(run("\t^$a copy == $a"), "true");
    assert_eq!(run("\t^'foo' copy == 'foo'"), "false");

    let mut rt = Runtime::new();
    let symbol = rt.symbol("at:put:");
    assert!(rt.shallow_copy(symbol).identical(symbol));
}

#[test]
fn test_implemented_selectors_track_loaded_methods() {
    let rt = Runtime::new();
    assert!(rt.implements("value"));
    assert!(rt.implements("printString"));
    assert!(!rt.implements("frobnicate:with:"));

    let source = class("A", "Object", "", "") + &methods("A", "frobnicate: x with: y\n\t^x");
    let rt = load(&source);
    assert!(rt.implements("frobnicate:with:"));
    assert!(!rt.implements("frobnicate:"));
}

#[test]
fn test_def_class_is_idempotent() {
    let mut rt = Runtime::new();
    let object = rt.class_named("Object");
    let first = rt
        .def_class("Foo", object, SubclassKind::Fixed, &["a".to_string()], &[])
        .expect("first");
    let second = rt
        .def_class("Foo", object, SubclassKind::Fixed, &["a".to_string(), "b".to_string()], &["K".to_string()])
        .expect("second");
    assert_eq!(first, second);
    assert_eq!(rt.all_inst_vars(first), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(rt.class_var("Foo", "K"), Ok(rt.nil()));

    let array = rt.class_named("Array");
    assert_eq!(
        rt.def_class("Foo", array, SubclassKind::Fixed, &[], &[]),
        Err(RuntimeError::SuperclassChanged("Foo".to_string()))
    );
}

#[test]
fn test_methods_added_incrementally() {
    let first = class("A", "Object", "", "") + &methods("A", "one\n\t^1");
    let second = class("A", "Object", "", "") + &methods("A", "two\n\t^2");
    let mut rt = load(&first);
    let program = parse_squeak_source(&second).expect("parse");
    let compiled = compile_program(&program, None, &rt, &CompileOptions::default()).expect("compile");
    rt.load(&compiled.program).expect("load");

    let a = Value::Obj(rt.class_named("A").expect("A"));
    let instance = rt.send_message(a, "new", &[]).expect("new");
    assert_eq!(rt.send_message(instance, "one", &[]), Ok(Value::Int(1)));
    assert_eq!(rt.send_message(instance, "two", &[]), Ok(Value::Int(2)));
}

#[test]
fn test_heap_globals_and_class_variables() {
    let source = class("Point", "Object", "x y", "Zero")
        + &methods("Point", "x\n\t^x!\ny\n\t^y")
        + &class_methods("Point", "zero\n\t^Zero!\norigin\n\t^Origin");
    let heap = "X := {{#global. #Origin. U at: 1}. {#classVar. #Point. #Zero. U at: 1}}.\nU := {{#Point. {3. 4}}}";
    let mut rt = load_with(&source, Some(heap), &CompileOptions::default());

    let origin = rt.run("Point", "origin").expect("origin");
    let zero = rt.run("Point", "zero").expect("zero");
    assert!(origin.identical(zero));
    assert_eq!(rt.describe(origin), "a Point");
    assert_eq!(rt.send_message(origin, "y", &[]), Ok(Value::Int(4)));
}

#[test]
fn test_class_initializers_run_when_requested() {
    let source = class("Config", "Object", "", "Level")
        + &class_methods("Config", "initialize\n\tLevel := 3!\nlevel\n\t^Level");
    let options = CompileOptions {
        initialize_classes: true,
    };
    let mut rt = load_with(&source, None, &options);
    assert_eq!(rt.run("Config", "level"), Ok(Value::Int(3)));

    let mut rt = load(&source);
    let level = rt.run("Config", "level").expect("level");
    assert!(rt.is_nil(level));
}

#[test]
fn test_undefined_global() {
    assert_eq!(run_err("\t^Nowhere"), RuntimeError::UndefinedGlobal("Nowhere".to_string()));
}

#[test]
fn test_describe() {
    let mut rt = Runtime::new();
    assert_eq!(rt.describe(Value::Float(2.0)), "2.0");
    assert_eq!(rt.describe(Value::Float(0.25)), "0.25");
    let s = rt.string("it's");
    assert_eq!(rt.describe(s), "'it''s'");
    let sym = rt.symbol("foo:");
    assert_eq!(rt.describe(sym), "#foo:");
    let c = rt.character('a');
    let nil = rt.nil();
    let array = rt.array(vec![Value::Int(1), c, nil]);
    assert_eq!(rt.describe(array), "#(1 $a nil)");
    let object = rt.class_named("Object").expect("Object");
    let instance = rt.instantiate(object, 0).expect("instance");
    assert_eq!(rt.describe(instance), "an Object");
    assert_eq!(rt.describe(Value::Obj(object)), "Object");
}

#[test]
fn test_deep_recursion_overflows() {
    let worker = std::thread::Builder::new()
        .stack_size(256 << 20)
        .spawn(|| {
            let source = class("T", "Object", "", "") + &class_methods("T", "run\n\t^self run");
            let mut rt = load(&source);
            rt.run("T", "run")
        })
        .expect("spawn");
    assert_eq!(worker.join().expect("join"), Err(RuntimeError::StackOverflow));
}
