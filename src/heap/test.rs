use super::*;
use pretty_assertions::assert_eq;

const DUMP: &str = "
X := {
    {#global. #Origin. U at: 2}.
    {#classVar. #Point. #Zero. U at: 2}.
    {#pool. #Colors. #Red. 16rFF0000}.
    {#pool. #Colors. 'not an identifier'. 3}.
}.
U := {
    {#class. #Point}.
    {#Point. {0. U at: 3}}.
    {#Array. {}. {U at: 2. nil. $a. #(1 2)}}.
    {#ByteArray. {}. '0102FF'}.
}";

#[test]
fn test_parse_records() {
    let graph = parse_object_graph(DUMP).expect("parse");
    assert_eq!(graph.records.len(), 4);
    assert_eq!(graph.records[0], Record::Class("Point".to_string()));
    assert_eq!(
        graph.records[1],
        Record::Object {
            class: "Point".to_string(),
            inst_vars: vec![HeapValue::Literal(Node::Integer(0)), HeapValue::Ref(2)],
            payload: Payload::None,
        }
    );
    let Record::Object { payload, .. } = &graph.records[2] else {
        panic!("expected object");
    };
    assert_eq!(
        payload,
        &Payload::Values(vec![
            HeapValue::Ref(1),
            HeapValue::Literal(Node::Nil),
            HeapValue::Literal(Node::Character('a')),
            HeapValue::Literal(Node::ConstantArray(vec![Node::Integer(1), Node::Integer(2)])),
        ])
    );
    let Record::Object { payload, .. } = &graph.records[3] else {
        panic!("expected object");
    };
    assert_eq!(payload, &Payload::Hex("0102FF".to_string()));
}

#[test]
fn test_parse_bindings() {
    let graph = parse_object_graph(DUMP).expect("parse");
    assert_eq!(
        graph.bindings[0],
        Binding::Global {
            name: "Origin".to_string(),
            value: HeapValue::Ref(1),
        }
    );
    assert_eq!(
        graph.bindings[1],
        Binding::ClassVar {
            class: "Point".to_string(),
            name: "Zero".to_string(),
            value: HeapValue::Ref(1),
        }
    );
    assert_eq!(
        graph.pool_keys(),
        vec![(
            "Colors".to_string(),
            vec!["Red".to_string(), "not an identifier".to_string()]
        )]
    );
}

#[test]
fn test_bad_references() {
    assert_eq!(
        parse_object_graph("U := {{#Point. {U at: 5}}}"),
        Err(HeapError::BadReference { index: 5, len: 1 })
    );
    assert!(matches!(
        parse_object_graph("U := {{#Point}}"),
        Err(HeapError::Malformed(_))
    ));
    assert!(matches!(parse_object_graph("U := {"), Err(HeapError::Parse(_))));
    assert!(matches!(parse_object_graph("Y := {}"), Err(HeapError::Malformed(_))));
}

#[test]
fn test_decode_payloads() {
    assert_eq!(decode_bytes(0, "0102FF"), Ok(vec![1, 2, 255]));
    assert_eq!(decode_words(0, "0000000180000000"), Ok(vec![1, 0x8000_0000]));
    assert!(decode_bytes(0, "012").is_err());
    assert!(decode_words(0, "0102").is_err());
    assert!(decode_bytes(0, "zz").is_err());
}

#[test]
fn test_empty_dump() {
    let graph = parse_object_graph("").expect("parse");
    assert!(graph.is_empty());
}
