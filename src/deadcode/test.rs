use super::*;
use crate::parser::parse_squeak_source;
use pretty_assertions::assert_eq;

const SOURCE: &str = "Object subclass: #Menu
\tinstanceVariableNames: ''
\tclassVariableNames: ''
\tpoolDictionaries: ''
\tcategory: 'Test'!

!Menu methodsFor: 'test'!
run
\tself build; show!
build
\tself add: 'About' action: #about!
about
\t^self helper!
helper
\t^3!
show
\t^self!
ping
\t^self pong!
pong
\t^self ping!
plugin
\t<primitive: 'primLoad' module: 'Plugin'>
\t^nil!
primLoad
\t^nil! !

!Menu class methodsFor: 'test'!
new
\t^self basicNew run! !
";

fn program() -> Program {
    parse_squeak_source(SOURCE).expect("parse")
}

#[test]
fn test_call_graph_edges() {
    let graph = call_graph(&program());
    let run: Vec<&str> = graph["run"].iter().map(String::as_str).collect();
    assert_eq!(run, vec!["build", "show"]);
    assert!(graph["build"].contains("about"));
    assert!(graph["build"].contains("add:action:"));
    assert!(graph["plugin"].contains("primLoad"));
    assert!(graph["helper"].is_empty());
}

#[test]
fn test_sweep_removes_unreachable_cycle() {
    let mut program = program();
    let dead = dead_methods(&mut program, &["new".to_string()]);
    assert_eq!(
        dead,
        vec![
            "Menu>>ping".to_string(),
            "Menu>>plugin".to_string(),
            "Menu>>pong".to_string(),
            "Menu>>primLoad".to_string(),
        ]
    );
    let menu = program.class("Menu").expect("Menu");
    assert_eq!(
        menu.methods.keys().collect::<Vec<_>>(),
        vec!["run", "build", "about", "helper", "show"]
    );
    assert!(menu.class_methods.contains_key("new"));
}

#[test]
fn test_undefined_roots_are_ignored() {
    let mut program = program();
    let dead = dead_methods(&mut program, &["noSuchSelector".to_string(), "plugin".to_string()]);
    assert!(dead.contains(&"Menu class>>new".to_string()));
    assert!(!dead.contains(&"Menu>>primLoad".to_string()));
    assert_eq!(program.method_count(), 2);
}
