use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use std::ops::Range;

use crate::compile::CompileError;
use crate::heap::HeapError;
use crate::runtime::RuntimeError;

/// Lexical, syntactic or chunk-structure error, positioned in the text that
/// was being parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub span: Range<usize>,
    pub line: usize,
    pub column: usize,
}

/// 1-based line and column of byte `offset`. `\r\n`, `\r` and `\n` all end a line.
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let mut line = 1;
    let mut line_start = 0;
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < offset {
        match bytes[i] {
            b'\r' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                    i += 1;
                }
                line += 1;
                line_start = i + 1;
            }
            b'\n' => {
                line += 1;
                line_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    let column = source
        .get(line_start.min(offset)..offset)
        .map_or(0, |s| s.chars().count())
        + 1;
    (line, column)
}

impl ParseError {
    pub fn new(source: &str, span: Range<usize>, message: impl Into<String>) -> Self {
        let (line, column) = line_column(source, span.start);
        ParseError {
            message: message.into(),
            span,
            line,
            column,
        }
    }

    pub fn report(&self, file: &str, source: &str) {
        let span = self.span.start.min(source.len())..self.span.end.min(source.len());
        let report = Report::build(ReportKind::Error, (file.to_string(), span.clone()))
            .with_code("Syntax Error")
            .with_message(&self.message)
            .with_label(
                Label::new((file.to_string(), span))
                    .with_message(format!("line {}, column {}", self.line, self.column))
                    .with_color(Color::Red),
            )
            .finish();
        if report
            .eprint((file.to_string(), Source::from(source.to_string())))
            .is_err()
        {
            eprintln!("{}", self);
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
