use indexmap::IndexMap;
use thiserror::Error;

use crate::ast::Node;
use crate::error::ParseError;
use crate::parser::parse_method_no_args;

#[cfg(test)]
pub mod test;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HeapError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("malformed object graph: {0}")]
    Malformed(String),

    #[error("object graph reference U at: {index} is out of range (1..={len})")]
    BadReference { index: i64, len: usize },

    #[error("bad hex payload for record {record}: {text:?}")]
    BadHex { record: usize, text: String },
}

fn malformed<T>(what: impl Into<String>) -> Result<T, HeapError> {
    Err(HeapError::Malformed(what.into()))
}

/// A slot value in the dump: a literal, or a 0-based record index.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapValue {
    Literal(Node),
    Ref(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Values(Vec<HeapValue>),
    /// Packed bytes or words, still as hex text; decoded once the owning
    /// class's layout is known.
    Hex(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A class object that the program itself defines.
    Class(String),
    Object {
        class: String,
        inst_vars: Vec<HeapValue>,
        payload: Payload,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Global {
        name: String,
        value: HeapValue,
    },
    ClassVar {
        class: String,
        name: String,
        value: HeapValue,
    },
    Pool {
        pool: String,
        key: String,
        value: HeapValue,
    },
}

/// The simplified dump: a flat record table plus the bindings that hang
/// values on globals, class variables and pools. Records may refer to each
/// other in any order, cycles included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectGraph {
    pub records: Vec<Record>,
    pub bindings: Vec<Binding>,
}

impl ObjectGraph {
    /// Pool name to its entries, in dump order.
    pub fn pools(&self) -> IndexMap<&str, Vec<(&str, &HeapValue)>> {
        let mut pools: IndexMap<&str, Vec<(&str, &HeapValue)>> = IndexMap::new();
        for binding in &self.bindings {
            if let Binding::Pool { pool, key, value } = binding {
                pools.entry(pool.as_str()).or_default().push((key.as_str(), value));
            }
        }
        pools
    }

    /// Pool name to key names, as the binder wants them.
    pub fn pool_keys(&self) -> Vec<(String, Vec<String>)> {
        self.pools()
            .into_iter()
            .map(|(pool, entries)| {
                (
                    pool.to_string(),
                    entries.into_iter().map(|(k, _)| k.to_string()).collect(),
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.bindings.is_empty()
    }
}

fn elements(node: &Node, what: &str) -> Result<Vec<Node>, HeapError> {
    match node {
        Node::ArrayExpr(elements) | Node::ConstantArray(elements) => Ok(elements.clone()),
        other => malformed(format!("expected {} to be an array, got {:?}", what, other)),
    }
}

fn name(node: &Node, what: &str) -> Result<String, HeapError> {
    match node {
        Node::Symbol(s) | Node::String(s) => Ok(s.clone()),
        other => malformed(format!("expected {} to be a symbol, got {:?}", what, other)),
    }
}

struct GraphReader {
    len: usize,
}

impl GraphReader {
    fn value(&self, node: &Node) -> Result<HeapValue, HeapError> {
        match node {
            Node::MessageExpr { receiver, message }
                if message.selector == "at:" && matches!(receiver.as_ref(), Node::Identifier(u) if u == "U") =>
            {
                let Some(Node::Integer(index)) = message.args.first() else {
                    return malformed("U at: needs an integer index");
                };
                if *index < 1 || *index as usize > self.len {
                    return Err(HeapError::BadReference {
                        index: *index,
                        len: self.len,
                    });
                }
                Ok(HeapValue::Ref(*index as usize - 1))
            }
            Node::Nil
            | Node::True
            | Node::False
            | Node::Character(_)
            | Node::String(_)
            | Node::Symbol(_)
            | Node::Integer(_)
            | Node::LargeInteger(_)
            | Node::Float(_)
            | Node::ConstantArray(_) => Ok(HeapValue::Literal(node.clone())),
            other => malformed(format!("unsupported value {:?}", other)),
        }
    }

    fn values(&self, node: &Node, what: &str) -> Result<Vec<HeapValue>, HeapError> {
        elements(node, what)?.iter().map(|n| self.value(n)).collect()
    }

    fn record(&self, node: &Node) -> Result<Record, HeapError> {
        let parts = elements(node, "a record")?;
        match parts.as_slice() {
            [Node::Symbol(tag), class] if tag == "class" => Ok(Record::Class(name(class, "a class name")?)),
            [class, ivs] => Ok(Record::Object {
                class: name(class, "a class name")?,
                inst_vars: self.values(ivs, "instance variables")?,
                payload: Payload::None,
            }),
            [class, ivs, Node::String(hex)] => Ok(Record::Object {
                class: name(class, "a class name")?,
                inst_vars: self.values(ivs, "instance variables")?,
                payload: Payload::Hex(hex.clone()),
            }),
            [class, ivs, items] => Ok(Record::Object {
                class: name(class, "a class name")?,
                inst_vars: self.values(ivs, "instance variables")?,
                payload: Payload::Values(self.values(items, "indexed elements")?),
            }),
            _ => malformed(format!("record with {} parts", parts.len())),
        }
    }

    fn binding(&self, node: &Node) -> Result<Binding, HeapError> {
        let parts = elements(node, "a binding")?;
        match parts.as_slice() {
            [Node::Symbol(tag), global, value] if tag == "global" => Ok(Binding::Global {
                name: name(global, "a global name")?,
                value: self.value(value)?,
            }),
            [Node::Symbol(tag), class, var, value] if tag == "classVar" => Ok(Binding::ClassVar {
                class: name(class, "a class name")?,
                name: name(var, "a class variable name")?,
                value: self.value(value)?,
            }),
            [Node::Symbol(tag), pool, key, value] if tag == "pool" => Ok(Binding::Pool {
                pool: name(pool, "a pool name")?,
                key: name(key, "a pool key")?,
                value: self.value(value)?,
            }),
            _ => malformed(format!("unrecognized binding {:?}", parts.first())),
        }
    }
}

/// Reads the dump, a two-statement body `X := {...}. U := {...}` (either
/// order), into an [`ObjectGraph`].
pub fn parse_object_graph(text: &str) -> Result<ObjectGraph, HeapError> {
    let method = parse_method_no_args(text)?;
    let mut bindings = None;
    let mut records = None;
    for statement in &method.body {
        let Node::Assign { target, value } = statement else {
            return malformed("expected assignments to X and U");
        };
        match target.as_ref() {
            Node::Identifier(x) if x == "X" => bindings = Some(elements(value, "X")?),
            Node::Identifier(u) if u == "U" => records = Some(elements(value, "U")?),
            other => return malformed(format!("unexpected assignment to {:?}", other)),
        }
    }
    let records = records.unwrap_or_default();
    let reader = GraphReader { len: records.len() };
    let graph = ObjectGraph {
        records: records.iter().map(|r| reader.record(r)).collect::<Result<_, _>>()?,
        bindings: bindings
            .unwrap_or_default()
            .iter()
            .map(|b| reader.binding(b))
            .collect::<Result<_, _>>()?,
    };
    log::info!(
        "object graph: {} records, {} bindings",
        graph.records.len(),
        graph.bindings.len()
    );
    Ok(graph)
}

/// Two hex digits per byte.
pub fn decode_bytes(record: usize, hex: &str) -> Result<Vec<u8>, HeapError> {
    let bad = || HeapError::BadHex {
        record,
        text: hex.to_string(),
    };
    if hex.len() % 2 != 0 {
        return Err(bad());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(bad)
        })
        .collect()
}

/// Eight hex digits per word, most significant first.
pub fn decode_words(record: usize, hex: &str) -> Result<Vec<u32>, HeapError> {
    let bytes = decode_bytes(record, hex)?;
    if bytes.len() % 4 != 0 {
        return Err(HeapError::BadHex {
            record,
            text: hex.to_string(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}
