use super::*;
use crate::parser::parse_squeak_source;
use pretty_assertions::assert_eq;

const SOURCE: &str = "Object subclass: #Shape
\tinstanceVariableNames: 'origin name '
\tclassVariableNames: 'Registry Count '
\tpoolDictionaries: 'Colors '
\tcategory: 'Test'!
Shape subclass: #Circle
\tinstanceVariableNames: 'radius '
\tclassVariableNames: 'Count '
\tpoolDictionaries: ''
\tcategory: 'Test'!
Shape class instanceVariableNames: 'cache'!

!Circle methodsFor: 'test'!
area: scale
\t| r |
\tr := radius.
\t^{r. scale. origin. Registry. Count. Red. Transcript}! !

!Circle class methodsFor: 'test'!
lookup
\t^{cache. radius. Registry}! !
";

fn bound() -> Program {
    let mut program = parse_squeak_source(SOURCE).expect("parse");
    let info = ClassInfo::new(&program).with_pool("Colors", vec!["Red".to_string()]);
    bind_names(&mut program, &info);
    program
}

fn answered(program: &Program, class_side: bool, selector: &str) -> Vec<Node> {
    let class = program.class("Circle").expect("Circle");
    let method = &class.methods_of(class_side)[selector].method;
    match method.body.last() {
        Some(Node::Answer(value)) => match value.as_ref() {
            Node::ArrayExpr(elements) => elements.clone(),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_instance_side_resolution() {
    let program = bound();
    assert_eq!(
        answered(&program, false, "area:"),
        vec![
            Node::Local("r".to_string()),
            Node::Local("scale".to_string()),
            Node::InstVar("origin".to_string()),
            Node::ClassVar {
                class: "Shape".to_string(),
                name: "Registry".to_string()
            },
            // the nearest declaration wins
            Node::ClassVar {
                class: "Circle".to_string(),
                name: "Count".to_string()
            },
            Node::PoolVar {
                pool: "Colors".to_string(),
                name: "Red".to_string()
            },
            Node::Global("Transcript".to_string()),
        ]
    );
    let class = program.class("Circle").expect("Circle");
    assert_eq!(
        class.methods["area:"].method.body[0],
        Node::Assign {
            target: Box::new(Node::Local("r".to_string())),
            value: Box::new(Node::InstVar("radius".to_string())),
        }
    );
}

#[test]
fn test_class_side_resolution() {
    let program = bound();
    assert_eq!(
        answered(&program, true, "lookup"),
        vec![
            Node::InstVar("cache".to_string()),
            Node::Global("radius".to_string()),
            Node::ClassVar {
                class: "Shape".to_string(),
                name: "Registry".to_string()
            },
        ]
    );
}

#[test]
fn test_inst_var_checked_before_class_var_at_each_level() {
    let source = "Object subclass: #A
\tinstanceVariableNames: ''
\tclassVariableNames: 'X '
\tpoolDictionaries: ''
\tcategory: 'Test'!
A subclass: #B
\tinstanceVariableNames: 'X '
\tclassVariableNames: ''
\tpoolDictionaries: ''
\tcategory: 'Test'!
";
    let program = parse_squeak_source(source).expect("parse");
    let info = ClassInfo::new(&program);
    assert_eq!(info.resolve("B", false, "X"), Node::InstVar("X".to_string()));
    assert_eq!(
        info.resolve("A", false, "X"),
        Node::ClassVar {
            class: "A".to_string(),
            name: "X".to_string()
        }
    );
    assert_eq!(info.superclass("B"), Some("A"));
    assert_eq!(info.superclass("Object"), None);
}
