use super::*;
use pretty_assertions::assert_eq;

const SOURCE: &str = "Object subclass: #Calc instanceVariableNames: '' classVariableNames: 'Base' poolDictionaries: '' category: 'Demo'!\n\
!Calc class methodsFor: 'running'!\n\
answer\n\t^Base + self unused!\n\
unused\n\t^0!\n\
orphan\n\t^self orphan! !\n";

#[test]
fn test_compile_and_run() {
    let heap = "X := {{#classVar. #Calc. #Base. 42}}";
    let build = Build {
        heap: Some(heap),
        ..Build::default()
    };
    let (mut runtime, compiled) = load_source(SOURCE, &build).unwrap_or_else(|e| panic!("{}", e));
    assert!(compiled.unknown_globals.is_empty());
    let result = runtime.run("Calc", "answer").unwrap_or_else(|e| panic!("{}", e));
    assert_eq!(runtime.describe(result), "42");
}

#[test]
fn test_roots_remove_unreachable_methods() {
    let build = Build {
        roots: vec!["answer".to_string()],
        ..Build::default()
    };
    let compiled = compile_source(SOURCE, &build, &Runtime::new()).unwrap_or_else(|e| panic!("{}", e));
    let calc = compiled.program.class("Calc").expect("Calc");
    assert!(calc.method("answer", true).is_some());
    assert!(calc.method("orphan", true).is_none());
}

#[test]
fn test_errors_are_wrapped() {
    let runtime = Runtime::new();
    let bad = compile_source("!Nope methodsFor: 'x'!\nfoo ^1! !\n", &Build::default(), &runtime);
    assert!(matches!(bad, Err(Error::Parse(_))));

    let build = Build {
        heap: Some("X := 3"),
        ..Build::default()
    };
    assert!(matches!(compile_source(SOURCE, &build, &runtime), Err(Error::Heap(_))));
}
