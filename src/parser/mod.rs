pub mod chunk;
pub mod expression;
pub mod method;
pub mod number;

#[cfg(test)]
pub mod test;

use crate::ast::{MethodDef, Node};
use crate::error::ParseError;
use crate::lexer::{Lexeme, tokenize};

pub use chunk::parse_squeak_source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// A single expression.
    Expr,
    /// A method definition: signature, locals, statements.
    Method,
    /// Locals and statements with no signature, as in a workspace do-it.
    MethodNoArgs,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Expr(Node),
    Method(MethodDef),
}

pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Lexeme<'src>>,
    pos: usize,
    scopes: Vec<Vec<String>>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Result<Self, ParseError> {
        Ok(Parser {
            source,
            tokens: tokenize(source)?,
            pos: 0,
            scopes: vec![],
        })
    }

    pub fn parse(&mut self, mode: ParseMode) -> Result<Parsed, ParseError> {
        let parsed = match mode {
            ParseMode::Expr => Parsed::Expr(self.parse_expression()?),
            ParseMode::Method => Parsed::Method(self.parse_method_definition()?),
            ParseMode::MethodNoArgs => Parsed::Method(self.parse_method_no_args()?),
        };
        self.finish()?;
        Ok(parsed)
    }

    /// Fails unless every token has been consumed.
    pub fn finish(&self) -> Result<(), ParseError> {
        if self.pos != self.tokens.len() {
            return self.fail(format!(
                "expected end of input, got `{}`",
                self.context(self.pos, self.pos + 20)
            ));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Lexeme<'src>> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Lexeme<'src>> {
        self.tokens.get(self.pos + offset)
    }

    fn peek_is(&self, text: &str) -> bool {
        self.peek().is_some_and(|t| t.is(text))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<Lexeme<'src>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn next_or_fail(&mut self, what: &str) -> Result<Lexeme<'src>, ParseError> {
        match self.advance() {
            Some(token) => Ok(token),
            None => self.fail(format!("unexpected end of input, expected {}", what)),
        }
    }

    fn context(&self, from: usize, to: usize) -> String {
        let to = to.min(self.tokens.len());
        let from = from.min(to);
        self.tokens[from..to]
            .iter()
            .map(|t| t.text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn current_span(&self) -> std::ops::Range<usize> {
        match self.tokens.get(self.pos) {
            Some(t) => t.span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    fn fail<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        let message = format!(
            "{} near `{}`",
            message.into(),
            self.context(self.pos.saturating_sub(10), self.pos + 10)
        );
        Err(ParseError::new(self.source, self.current_span(), message))
    }

    fn check(&self, condition: bool, message: impl Into<String>) -> Result<(), ParseError> {
        if condition { Ok(()) } else { self.fail(message) }
    }

    fn expect(&mut self, text: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if t.is(text) => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => {
                let got = t.text.to_string();
                self.fail(format!("expected '{}', not '{}'", text, got))
            }
            None => self.fail(format!("expected '{}', not end of input", text)),
        }
    }

    fn with_scope<T>(
        &mut self,
        names: Vec<String>,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.scopes.push(names);
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn have_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.iter().any(|n| n == name))
    }
}

pub fn parse(source: &str, mode: ParseMode) -> Result<Parsed, ParseError> {
    Parser::new(source)?.parse(mode)
}

pub fn parse_expr(source: &str) -> Result<Node, ParseError> {
    let mut parser = Parser::new(source)?;
    let node = parser.parse_expression()?;
    parser.finish()?;
    Ok(node)
}

pub fn parse_method(source: &str) -> Result<MethodDef, ParseError> {
    let mut parser = Parser::new(source)?;
    let method = parser.parse_method_definition()?;
    parser.finish()?;
    Ok(method)
}

pub fn parse_method_no_args(source: &str) -> Result<MethodDef, ParseError> {
    let mut parser = Parser::new(source)?;
    let method = parser.parse_method_no_args()?;
    parser.finish()?;
    Ok(method)
}
