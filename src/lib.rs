pub mod ast;
pub mod bigint;
pub mod bind;
pub mod compile;
pub mod deadcode;
pub mod error;
pub mod heap;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod runtime;

#[cfg(test)]
pub mod test;

pub use compile::{CompileOptions, Compiled, Host, compile_program};
pub use error::{Error, ParseError, Result};
pub use runtime::{Runtime, RuntimeError, Value};

/// Everything a whole-program build needs besides the source text.
#[derive(Debug, Clone, Default)]
pub struct Build<'a> {
    /// Text of an object-graph dump.
    pub heap: Option<&'a str>,
    /// Selectors assumed reachable from outside; empty skips dead-code removal.
    pub roots: Vec<String>,
    pub options: CompileOptions,
}

/// Parses chunk-format `source`, drops unreachable methods when roots are
/// given, and compiles it against `host`.
pub fn compile_source(source: &str, build: &Build, host: &dyn Host) -> Result<Compiled> {
    let mut program = parser::parse_squeak_source(source)?;
    if !build.roots.is_empty() {
        let removed = deadcode::dead_methods(&mut program, &build.roots);
        log::info!("removed {} unreachable methods", removed.len());
    }
    let graph = build.heap.map(heap::parse_object_graph).transpose()?;
    Ok(compile_program(&program, graph.as_ref(), host, &build.options)?)
}

/// Compiles `source` for a fresh runtime and loads the result into it.
pub fn load_source(source: &str, build: &Build) -> Result<(Runtime, Compiled)> {
    let mut runtime = Runtime::new();
    let compiled = compile_source(source, build, &runtime)?;
    runtime.load(&compiled.program)?;
    Ok((runtime, compiled))
}
