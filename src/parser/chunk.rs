use crate::ast::{ClassDef, MethodEntry, Node, Program, SubclassKind, Weirdness, variable_names};
use crate::error::ParseError;
use crate::parser::{parse_expr, parse_method};

const CLASS_DEFINITION_TAIL: &str = "instanceVariableNames:classVariableNames:poolDictionaries:category:";

/// One top-level element of a chunk-format file. Texts are still escaped
/// (`!!` for `!`) and carry their byte offset in the file.
#[derive(Debug, Clone, PartialEq)]
enum Directive<'s> {
    Header,
    Definition(&'s str, usize),
    ClassComment,
    Methods {
        preamble: (&'s str, usize),
        bodies: Vec<(&'s str, usize)>,
    },
    Filler,
    Expression(&'s str, usize),
}

struct Scanner<'s> {
    source: &'s str,
    bytes: &'s [u8],
}

impl<'s> Scanner<'s> {
    fn new(source: &'s str) -> Self {
        Scanner {
            source,
            bytes: source.as_bytes(),
        }
    }

    fn starts_with(&self, at: usize, text: &str) -> bool {
        self.bytes
            .get(at..)
            .is_some_and(|rest| rest.starts_with(text.as_bytes()))
    }

    /// Length of the line break at `at`: `\r\n`, `\r` or `\n`.
    fn line_break(&self, at: usize) -> Option<usize> {
        match self.bytes.get(at) {
            Some(b'\r') if self.bytes.get(at + 1) == Some(&b'\n') => Some(2),
            Some(b'\r' | b'\n') => Some(1),
            _ => None,
        }
    }

    /// Position of the `!` ending the chunk that starts at `at`, skipping `!!`.
    fn chunk_end(&self, at: usize) -> Option<usize> {
        let mut i = at;
        loop {
            match self.bytes.get(i)? {
                b'!' if self.bytes.get(i + 1) == Some(&b'!') => i += 2,
                b'!' => return Some(i),
                _ => i += 1,
            }
        }
    }

    /// `!` followed by a line break; answers the position after both.
    fn bang_line(&self, at: usize) -> Option<usize> {
        if self.bytes.get(at) != Some(&b'!') {
            return None;
        }
        Some(at + 1 + self.line_break(at + 1)?)
    }

    fn identifier_end(&self, at: usize) -> Option<usize> {
        if !self.bytes.get(at)?.is_ascii_alphabetic() {
            return None;
        }
        let mut i = at + 1;
        while self.bytes.get(i).is_some_and(u8::is_ascii_alphanumeric) {
            i += 1;
        }
        Some(i)
    }

    fn header(&self, at: usize) -> Option<usize> {
        if self.bytes.get(at) != Some(&b'\'') {
            return None;
        }
        self.bang_line(self.chunk_end(at)?)
    }

    fn definition(&self, at: usize) -> Option<(Directive<'s>, usize)> {
        let name_end = self.identifier_end(at)?;
        if self.bytes.get(name_end) != Some(&b' ') {
            return None;
        }
        let rest = name_end + 1;
        let recognised = [
            "subclass: ",
            "variableSubclass: ",
            "variableByteSubclass: ",
            "variableWordSubclass: ",
            "weakSubclass: ",
        ]
        .iter()
        .any(|k| self.starts_with(rest, k))
            || (self.starts_with(rest, "class")
                && !self
                    .bytes
                    .get(rest + 5)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_'));
        if !recognised {
            return None;
        }
        let end = self.chunk_end(rest)?;
        let next = self.bang_line(end)?;
        Some((Directive::Definition(&self.source[at..end], at), next))
    }

    fn class_comment(&self, at: usize) -> Option<usize> {
        if self.bytes.get(at) != Some(&b'!') {
            return None;
        }
        let name_end = self.identifier_end(at + 1)?;
        if !self.starts_with(name_end, " commentStamp: ") {
            return None;
        }
        let mut i = self.bang_line(self.chunk_end(name_end)?)?;
        i = self.bang_line(self.chunk_end(i)?)?;
        if self.starts_with(i, "]style[") {
            i = self.bang_line(self.chunk_end(i)?)?;
        }
        i += self.line_break(i)?;
        Some(i + self.line_break(i).unwrap_or(0))
    }

    fn method_group(&self, at: usize) -> Option<(Directive<'s>, usize)> {
        let mut i = at + self.line_break(at).unwrap_or(0);
        if self.bytes.get(i) != Some(&b'!') {
            return None;
        }
        i += 1;
        let preamble_start = i;
        let mut rest = self.identifier_end(i)?;
        if self.bytes.get(rest) != Some(&b' ') {
            return None;
        }
        rest += 1;
        if self.starts_with(rest, "class ") {
            rest += "class ".len();
        }
        if !self.starts_with(rest, "methodsFor: ") {
            return None;
        }
        let end = self.chunk_end(rest)?;
        let preamble = (&self.source[preamble_start..end], preamble_start);
        i = self.bang_line(end)?;

        let mut bodies = vec![];
        loop {
            let end = self.chunk_end(i)?;
            let body = &self.source[i..end];
            if body.trim().is_empty() {
                return None;
            }
            bodies.push((body, i));
            i = end + 1;
            if self.starts_with(i, " !") {
                i = i + 2 + self.line_break(i + 2)?;
                break;
            }
            if let Some(n) = self.line_break(i).filter(|n| self.starts_with(i + n, "]style[")) {
                let end = self.chunk_end(i + n)?;
                if !self.starts_with(end, "! !") {
                    return None;
                }
                i = end + 3 + self.line_break(end + 3)?;
                break;
            }
        }
        Some((Directive::Methods { preamble, bodies }, i))
    }

    // `"-----"!` followed by two line breaks
    fn separator(&self, at: usize) -> Option<usize> {
        if self.bytes.get(at) != Some(&b'"') {
            return None;
        }
        let mut i = at + 1;
        let start = i;
        while matches!(self.bytes.get(i), Some(b'-' | b' ')) {
            i += 1;
        }
        if i == start || !self.starts_with(i, "\"!") {
            return None;
        }
        i += 2;
        i += self.line_break(i)?;
        i += self.line_break(i)?;
        Some(i)
    }

    fn expression(&self, at: usize) -> Option<(Directive<'s>, usize)> {
        if !self.bytes.get(at)?.is_ascii_alphabetic() {
            return None;
        }
        let end = self.chunk_end(at)?;
        Some((Directive::Expression(&self.source[at..end], at), end + 1))
    }

    /// The directive starting exactly at `at`, tried in priority order.
    fn directive(&self, at: usize) -> Option<(Directive<'s>, usize)> {
        if let Some(next) = self.header(at) {
            return Some((Directive::Header, next));
        }
        if let Some(found) = self.definition(at) {
            return Some(found);
        }
        if let Some(next) = self.class_comment(at) {
            return Some((Directive::ClassComment, next));
        }
        if let Some(found) = self.method_group(at) {
            return Some(found);
        }
        if let Some(next) = self.separator(at) {
            return Some((Directive::Filler, next));
        }
        if let Some(n) = self.line_break(at) {
            return Some((Directive::Filler, at + n));
        }
        if self.bytes.get(at) == Some(&b'\x0c') {
            return Some((Directive::Filler, at + 1));
        }
        self.expression(at)
    }
}

fn unescape(text: &str) -> String {
    text.replace("!!", "!")
}

/// Byte offset in escaped `raw` of byte `unescaped` of `unescape(raw)`.
fn escaped_offset(raw: &str, unescaped: usize) -> usize {
    let bytes = raw.as_bytes();
    let (mut i, mut n) = (0, 0);
    while n < unescaped && i < bytes.len() {
        i += if bytes[i] == b'!' && bytes.get(i + 1) == Some(&b'!') { 2 } else { 1 };
        n += 1;
    }
    i
}

struct Loader<'s> {
    source: &'s str,
    program: Program,
}

impl<'s> Loader<'s> {
    fn check(&self, condition: bool, at: usize, message: impl Into<String>) -> Result<(), ParseError> {
        if condition {
            Ok(())
        } else {
            Err(ParseError::new(self.source, at..at, message))
        }
    }

    /// Runs `parse` over the unescaped chunk `text` found at byte `at`;
    /// error positions point back into the escaped source.
    fn parse_escaped<T>(
        &self,
        text: &str,
        at: usize,
        parse: fn(&str) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        parse(&unescape(text)).map_err(|e| {
            let span = (at + escaped_offset(text, e.span.start))..(at + escaped_offset(text, e.span.end));
            ParseError::new(self.source, span, e.message)
        })
    }

    fn parse_chunk_expr(&self, text: &str, at: usize) -> Result<Node, ParseError> {
        self.parse_escaped(text, at, parse_expr)
    }

    fn definition(&mut self, text: &str, at: usize) -> Result<(), ParseError> {
        let Node::MessageExpr { receiver, message } = self.parse_chunk_expr(text, at)? else {
            return Err(ParseError::new(self.source, at..at, "expected a message expression"));
        };

        if message.selector == "instanceVariableNames:" {
            // `Monster class instanceVariableNames: 'blah '`
            let class_name = match *receiver {
                Node::MessageExpr { receiver, message } if message.selector == "class" => match *receiver {
                    Node::Identifier(name) => name,
                    _ => return Err(ParseError::new(self.source, at..at, "expected a class name")),
                },
                _ => return Err(ParseError::new(self.source, at..at, "expected `Name class`")),
            };
            let Some(Node::String(names)) = message.args.first() else {
                return Err(ParseError::new(self.source, at..at, "expected a string of names"));
            };
            let names = variable_names(names);
            let Some(class) = self.program.classes.get_mut(&class_name) else {
                return Err(ParseError::new(
                    self.source,
                    at..at,
                    format!("class not found: {}", class_name),
                ));
            };
            class.class_inst_vars.extend(names.iter().cloned());
            class.weirdness.push(Weirdness::InstanceVariableNames(names));
            return Ok(());
        }

        let (keyword, tail) = message.selector.split_once(':').unwrap_or((message.selector.as_str(), ""));
        let kind = SubclassKind::from_keyword(keyword).filter(|_| tail == CLASS_DEFINITION_TAIL);
        let Some(kind) = kind else {
            return Err(ParseError::new(
                self.source,
                at..at,
                format!("unrecognized expression: {}", message.selector),
            ));
        };
        let superclass = match *receiver {
            Node::Nil => None,
            Node::Identifier(name) => Some(name),
            _ => return Err(ParseError::new(self.source, at..at, "expected a superclass name")),
        };
        let [Node::Symbol(name), Node::String(ivars), Node::String(cvars), Node::String(pools), Node::String(category)] =
            message.args.as_slice()
        else {
            return Err(ParseError::new(
                self.source,
                at..at,
                "class definition arguments must be a symbol and four strings",
            ));
        };

        let mut class = ClassDef::new(name.clone(), superclass, kind);
        class.inst_vars = variable_names(ivars);
        class.class_vars = variable_names(cvars);
        class.pools = variable_names(pools);
        class.category = category.clone();
        if self.program.classes.contains_key(name) {
            log::warn!("class {} defined more than once", name);
        }
        self.program.classes.insert(name.clone(), class);
        Ok(())
    }

    fn methods(&mut self, preamble: (&str, usize), bodies: &[(&str, usize)]) -> Result<(), ParseError> {
        let at = preamble.1;
        let Node::MessageExpr { receiver, message } = self.parse_chunk_expr(preamble.0, at)? else {
            return Err(ParseError::new(self.source, at..at, "expected `Name methodsFor: ...`"));
        };
        let (class_name, class_side) = match *receiver {
            Node::Identifier(name) => (name, false),
            Node::MessageExpr { receiver, message } if message.selector == "class" => match *receiver {
                Node::Identifier(name) => (name, true),
                _ => return Err(ParseError::new(self.source, at..at, "expected a class name")),
            },
            _ => return Err(ParseError::new(self.source, at..at, "expected a class name")),
        };
        self.check(
            message.selector == "methodsFor:" || message.selector == "methodsFor:stamp:",
            at,
            format!("expected methodsFor:, got {}", message.selector),
        )?;
        let Some(Node::String(category)) = message.args.first() else {
            return Err(ParseError::new(self.source, at..at, "expected a category string"));
        };
        let methods = bodies
            .iter()
            .map(|(text, offset)| self.parse_escaped(text, *offset, parse_method))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(class) = self.program.classes.get_mut(&class_name) else {
            return Err(ParseError::new(
                self.source,
                at..at,
                format!("method has unrecognized class name: {}", class_name),
            ));
        };
        let table = if class_side {
            &mut class.class_methods
        } else {
            &mut class.methods
        };

        for method in methods {
            if table.contains_key(&method.selector) {
                log::warn!(
                    "method defined more than once: {}{}#{}",
                    class_name,
                    if class_side { " class" } else { "" },
                    method.selector
                );
            }
            table.insert(
                method.selector.clone(),
                MethodEntry {
                    category: category.clone(),
                    offset: at,
                    method,
                },
            );
        }
        Ok(())
    }

    fn expression(&mut self, text: &str, at: usize) -> Result<(), ParseError> {
        if text.starts_with("TextConstants at: ") || text.starts_with("ZipConstants at: ") {
            log::debug!("skipping constant table directive at byte {}", at);
            return Ok(());
        }
        let expr = self.parse_chunk_expr(text, at)?;
        log::debug!("ignoring top-level expression {:?}", expr);
        Ok(())
    }
}

/// Parses a whole chunk-format file into its class table.
pub fn parse_squeak_source(source: &str) -> Result<Program, ParseError> {
    let scanner = Scanner::new(source);
    let mut loader = Loader {
        source,
        program: Program::default(),
    };
    let mut at = 0;
    while at < source.len() {
        let Some((directive, next)) = scanner.directive(at) else {
            return Err(ParseError::new(source, at..at, "unrecognized source element"));
        };
        match directive {
            Directive::Header | Directive::ClassComment | Directive::Filler => {}
            Directive::Definition(text, offset) => loader.definition(text, offset)?,
            Directive::Methods { preamble, bodies } => loader.methods(preamble, &bodies)?,
            Directive::Expression(text, offset) => loader.expression(text, offset)?,
        }
        at = next;
    }
    log::info!(
        "parsed {} classes, {} methods",
        loader.program.classes.len(),
        loader.program.method_count()
    );
    Ok(loader.program)
}
