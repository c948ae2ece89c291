use crate::ast::SubclassKind;
use crate::compile::{Compilation, CompileError, Result};
use crate::heap::{self, Binding, HeapError, ObjectGraph, Payload, Record};
use crate::ir::{HeapInit, HeapPayload, HeapRecord, HeapValue};

impl Compilation<'_> {
    fn heap_value(&mut self, value: &heap::HeapValue) -> Result<HeapValue> {
        Ok(match value {
            heap::HeapValue::Literal(node) => HeapValue::Const(self.constant(node)?),
            heap::HeapValue::Ref(index) => HeapValue::Ref(*index),
        })
    }

    fn heap_values(&mut self, values: &[heap::HeapValue]) -> Result<Vec<HeapValue>> {
        values.iter().map(|v| self.heap_value(v)).collect()
    }

    fn known_class(&self, name: &str) -> Result<()> {
        if self.is_class(name) {
            Ok(())
        } else {
            Err(CompileError::NoSuchClass(name.to_string()))
        }
    }

    fn payload(&mut self, index: usize, class: &str, payload: &Payload) -> Result<HeapPayload> {
        let kind = self
            .class_kind(class)
            .ok_or_else(|| CompileError::NoSuchClass(class.to_string()))?;
        Ok(match (payload, kind) {
            (Payload::None, _) => HeapPayload::None,
            (Payload::Hex(hex), SubclassKind::Byte) => HeapPayload::Bytes(heap::decode_bytes(index, hex)?),
            (Payload::Hex(hex), SubclassKind::Word) => HeapPayload::Words(heap::decode_words(index, hex)?),
            (Payload::Hex(_), _) => {
                return Err(HeapError::Malformed(format!(
                    "record {} has packed data but {} is not a byte or word class",
                    index + 1,
                    class
                ))
                .into());
            }
            (Payload::Values(values), _) => HeapPayload::Values(self.heap_values(values)?),
        })
    }

    /// Lowers the dump into allocation and binding steps. Literal slots go
    /// through the constant pool like any other literal.
    pub fn heap_init(&mut self, graph: &ObjectGraph) -> Result<HeapInit> {
        let mut init = HeapInit::default();
        for (index, record) in graph.records.iter().enumerate() {
            let record = match record {
                Record::Class(name) => {
                    self.known_class(name)?;
                    HeapRecord::Class(name.clone())
                }
                Record::Object {
                    class,
                    inst_vars,
                    payload,
                } => {
                    self.known_class(class)?;
                    HeapRecord::Object {
                        class: class.clone(),
                        inst_vars: self.heap_values(inst_vars)?,
                        payload: self.payload(index, class, payload)?,
                    }
                }
            };
            init.records.push(record);
        }

        for binding in &graph.bindings {
            match binding {
                Binding::Global { name, value } => {
                    let value = self.heap_value(value)?;
                    init.globals.push((name.clone(), value));
                }
                Binding::ClassVar { class, name, value } => {
                    self.known_class(class)?;
                    let value = self.heap_value(value)?;
                    init.class_vars.push((class.clone(), name.clone(), value));
                }
                // pools become constants where they are used
                Binding::Pool { .. } => {}
            }
        }
        log::debug!(
            "heap: {} records, {} globals, {} class variables",
            init.records.len(),
            init.globals.len(),
            init.class_vars.len()
        );
        Ok(init)
    }
}
