use logos::{Lexer, Logos};

use crate::error::ParseError;

use std::ops::Range;

#[cfg(test)]
pub mod test;

/// What followed a `#` in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashForm {
    /// A lone `#`, e.g. before `(` or an operator.
    Bare,
    /// `#foo`, `#foo:bar:`, `# :a:`.
    Symbol,
    /// `#'hello world'`.
    Quoted,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r#""([^"]|"")*""#)] // comments
pub enum Token {
    #[regex(r"[A-Za-z][0-9A-Za-z]*")]
    Identifier,

    #[regex(r"[A-Za-z][0-9A-Za-z]*:")]
    Keyword,

    #[regex(r"[0-9]+", number_tail)]
    Number,

    #[regex(r"\$(.|\n)")]
    Character,

    #[regex(r"'([^']|'')*'")]
    String,

    #[token("#", hash_tail)]
    Hash(HashForm),

    #[token(":=")]
    Assign,

    #[regex(r"[-+`/*\\~<=>@%|&?!,]+")]
    Operator,

    #[token("_")]
    Underscore,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(".")]
    Period,

    #[token(":")]
    Colon,

    #[token(";")]
    Semicolon,

    #[token("^")]
    Caret,
}

fn is_radix_digit(c: u8) -> bool {
    c.is_ascii_digit() || c.is_ascii_uppercase()
}

// The rest of `[0-9]+r?[0-9A-Z]*(\.[0-9A-Z]+)?(e[+-]?[0-9]+)?`. The fraction
// and exponent are only taken when complete, so `3.` ending a statement
// leaves the period alone.
fn number_tail(lex: &mut Lexer<Token>) {
    let rest = lex.remainder().as_bytes();
    let mut n = 0;
    if rest.first() == Some(&b'r') {
        n += 1;
    }
    while rest.get(n).is_some_and(|c| is_radix_digit(*c)) {
        n += 1;
    }
    if rest.get(n) == Some(&b'.') && rest.get(n + 1).is_some_and(|c| is_radix_digit(*c)) {
        n += 1;
        while rest.get(n).is_some_and(|c| is_radix_digit(*c)) {
            n += 1;
        }
    }
    if rest.get(n) == Some(&b'e') {
        let mut m = n + 1;
        if matches!(rest.get(m), Some(b'+' | b'-')) {
            m += 1;
        }
        if rest.get(m).is_some_and(u8::is_ascii_digit) {
            while rest.get(m).is_some_and(u8::is_ascii_digit) {
                m += 1;
            }
            n = m;
        }
    }
    lex.bump(n);
}

fn hash_tail(lex: &mut Lexer<Token>) -> HashForm {
    let rest = lex.remainder().as_bytes();
    let mut n = 0;
    while matches!(rest.get(n), Some(b' ' | b'\r' | b'\n' | b'\t')) {
        n += 1;
    }
    match rest.get(n) {
        Some(b'\'') => {
            let mut m = n + 1;
            loop {
                match rest.get(m) {
                    Some(b'\'') if rest.get(m + 1) == Some(&b'\'') => m += 2,
                    Some(b'\'') => {
                        lex.bump(m + 1);
                        return HashForm::Quoted;
                    }
                    Some(_) => m += 1,
                    None => return HashForm::Bare,
                }
            }
        }
        Some(c) if *c == b':' || c.is_ascii_alphabetic() => {
            // :?[A-Za-z]([0-9A-Za-z]|:[A-Za-z])*:?
            let mut m = n;
            if rest[m] == b':' {
                m += 1;
            }
            if !rest.get(m).is_some_and(u8::is_ascii_alphabetic) {
                return HashForm::Bare;
            }
            m += 1;
            loop {
                match rest.get(m) {
                    Some(c) if c.is_ascii_alphanumeric() => m += 1,
                    Some(b':') if rest.get(m + 1).is_some_and(u8::is_ascii_alphabetic) => m += 2,
                    _ => break,
                }
            }
            if rest.get(m) == Some(&b':') {
                m += 1;
            }
            lex.bump(m);
            HashForm::Symbol
        }
        _ => HashForm::Bare,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme<'src> {
    pub token: Token,
    pub text: &'src str,
    pub span: Range<usize>,
}

impl Lexeme<'_> {
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }

    pub fn is_identifier(&self) -> bool {
        self.token == Token::Identifier
    }

    pub fn is_keyword(&self) -> bool {
        self.token == Token::Keyword
    }

    pub fn is_operator(&self) -> bool {
        self.token == Token::Operator
    }

    pub fn is_punctuation(&self) -> bool {
        matches!(
            self.token,
            Token::Underscore
                | Token::LBracket
                | Token::RBracket
                | Token::LBrace
                | Token::RBrace
                | Token::Period
                | Token::Colon
        )
    }
}

pub fn is_pseudo_variable(name: &str) -> bool {
    matches!(
        name,
        "nil" | "true" | "false" | "self" | "super" | "thisContext"
    )
}

/// Splits `source` into lexemes, dropping whitespace and comments.
pub fn tokenize(source: &str) -> Result<Vec<Lexeme<'_>>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = vec![];
    while let Some(token) = lexer.next() {
        let span = lexer.span();
        match token {
            Ok(token) => tokens.push(Lexeme {
                token,
                text: lexer.slice(),
                span,
            }),
            Err(()) => {
                let rest = source[span.start..]
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                return Err(ParseError::new(
                    source,
                    span,
                    format!("syntax error: unexpected input {:?}", rest),
                ));
            }
        }
    }
    Ok(tokens)
}
