use crate::ast::{Message, Node};
use crate::error::ParseError;
use crate::lexer::{HashForm, Lexeme, Token, is_pseudo_variable};
use crate::parser::Parser;
use crate::parser::number::parse_number;

/// Body of a `'...'` string token with doubled quotes collapsed.
pub fn parse_string(text: &str) -> String {
    let inner = text
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(text);
    inner.replace("''", "'")
}

/// Drops the leading `#` and any whitespace after it.
fn strip_octothorpe(text: &str) -> &str {
    text.strip_prefix('#')
        .map(|s| s.trim_start_matches([' ', '\r', '\n', '\t']))
        .unwrap_or(text)
}

fn character_value(text: &str) -> Option<char> {
    text.strip_prefix('$').and_then(|s| s.chars().next())
}

impl<'src> Parser<'src> {
    /// expr ::= identifier (":=" | "_") expr | cascadeExpr
    pub fn parse_expression(&mut self) -> Result<Node, ParseError> {
        if let (Some(a), Some(b)) = (self.peek(), self.peek_at(1)) {
            if a.is_identifier() && matches!(b.token, Token::Assign | Token::Underscore) {
                let name = a.text;
                self.check(!is_pseudo_variable(name), format!("cannot assign to {}", name))?;
                self.pos += 2;
                let target = self.id_expr(name);
                let value = self.parse_expression()?;
                return Ok(Node::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                });
            }
        }
        self.parse_cascade()
    }

    // cascadeExpr ::= keywordExpr (";" message)*
    fn parse_cascade(&mut self) -> Result<Node, ParseError> {
        let head = self.parse_keyword_expr()?;
        if !self.peek_is(";") {
            return Ok(head);
        }
        let mut messages = vec![];
        while self.peek_is(";") {
            self.pos += 1;
            messages.push(self.parse_message()?);
        }
        Ok(Node::Cascade {
            head: Box::new(head),
            messages,
        })
    }

    // keywordExpr ::= binaryExpr (keyword binaryExpr)*
    fn parse_keyword_expr(&mut self) -> Result<Node, ParseError> {
        let receiver = self.parse_binary_expr()?;
        if self.peek().is_some_and(Lexeme::is_keyword) {
            let message = self.parse_message()?;
            return Ok(Node::MessageExpr {
                receiver: Box::new(receiver),
                message,
            });
        }
        Ok(receiver)
    }

    // binaryExpr ::= unaryExpr (operator unaryExpr)*
    fn parse_binary_expr(&mut self) -> Result<Node, ParseError> {
        let mut receiver = self.parse_unary_expr()?;
        while self.peek().is_some_and(Lexeme::is_operator) {
            let message = self.parse_message()?;
            receiver = Node::MessageExpr {
                receiver: Box::new(receiver),
                message,
            };
        }
        Ok(receiver)
    }

    // unaryExpr ::= atomExpr identifier*
    fn parse_unary_expr(&mut self) -> Result<Node, ParseError> {
        let mut receiver = self.parse_atom()?;
        while self.peek().is_some_and(Lexeme::is_identifier) {
            let message = self.parse_message()?;
            receiver = Node::MessageExpr {
                receiver: Box::new(receiver),
                message,
            };
        }
        Ok(receiver)
    }

    // message ::= identifier | operator unaryExpr | (keyword binaryExpr)+
    fn parse_message(&mut self) -> Result<Message, ParseError> {
        let Some(token) = self.peek().cloned() else {
            return self.fail("expected message, got end of input");
        };
        match token.token {
            Token::Operator => {
                self.pos += 1;
                let arg = self.parse_unary_expr()?;
                Ok(Message {
                    selector: token.text.to_string(),
                    args: vec![arg],
                })
            }
            Token::Identifier => {
                self.pos += 1;
                Ok(Message {
                    selector: token.text.to_string(),
                    args: vec![],
                })
            }
            Token::Keyword => {
                let mut selector = String::new();
                let mut args = vec![];
                while let Some(keyword) = self.peek().filter(|t| t.is_keyword()) {
                    selector.push_str(keyword.text);
                    self.pos += 1;
                    args.push(self.parse_binary_expr()?);
                }
                Ok(Message { selector, args })
            }
            _ => self.fail(format!("expected message after ';', got: {}", token.text)),
        }
    }

    pub(crate) fn id_expr(&self, name: &str) -> Node {
        match name {
            "nil" => Node::Nil,
            "true" => Node::True,
            "false" => Node::False,
            "self" => Node::SelfRef,
            "super" => Node::Super,
            "thisContext" => Node::ThisContext,
            _ if self.have_local(name) => Node::Local(name.to_string()),
            _ => Node::Identifier(name.to_string()),
        }
    }

    fn number(&self, text: &str) -> Result<Node, ParseError> {
        match parse_number(text) {
            Ok(node) => Ok(node),
            Err(message) => self.fail(message),
        }
    }

    // atomExpr ::= literal | identifier | constantArray | arrayExpr | block | "(" expr ")"
    fn parse_atom(&mut self) -> Result<Node, ParseError> {
        let token = self.next_or_fail("an expression")?;
        match token.token {
            Token::LParen => {
                let expr = self.parse_expression()?;
                self.expect(")")?;
                Ok(expr)
            }
            Token::LBracket => {
                self.pos -= 1;
                self.parse_block()
            }
            Token::LBrace => {
                self.pos -= 1;
                self.parse_array_expr()
            }
            Token::Character => match character_value(token.text) {
                Some(c) => Ok(Node::Character(c)),
                None => self.fail(format!("bad character literal {}", token.text)),
            },
            Token::String => Ok(Node::String(parse_string(token.text))),
            Token::Hash(form) => self.parse_hash(form, token.text),
            Token::Identifier => Ok(self.id_expr(token.text)),
            Token::Number => self.number(token.text),
            Token::Operator if token.is("-") => {
                let next = self.next_or_fail("a number after '-'")?;
                if next.token != Token::Number {
                    self.pos -= 1;
                    return self.fail(format!("expected expression, got: -{}", next.text));
                }
                self.number(&format!("-{}", next.text))
            }
            _ => {
                self.pos -= 1;
                self.fail(format!("expected expression, got: {}", token.text))
            }
        }
    }

    // Everything that can follow a `#` outside a literal array. Repeated
    // `#` prefixes collapse.
    fn parse_hash(&mut self, form: HashForm, text: &'src str) -> Result<Node, ParseError> {
        match form {
            HashForm::Symbol => Ok(Node::Symbol(strip_octothorpe(text).to_string())),
            HashForm::Quoted => Ok(Node::Symbol(parse_string(strip_octothorpe(text)))),
            HashForm::Bare => {
                while self.peek().is_some_and(|t| t.token == Token::Hash(HashForm::Bare)) {
                    self.pos += 1;
                }
                let token = self.next_or_fail("a symbol or '(' after #")?;
                match token.token {
                    Token::Hash(form) => self.parse_hash(form, token.text),
                    Token::LParen => {
                        self.pos -= 1;
                        self.parse_constant_array()
                    }
                    Token::String => Ok(Node::Symbol(parse_string(token.text))),
                    Token::Identifier | Token::Keyword | Token::Colon | Token::Operator | Token::RParen => {
                        Ok(Node::Symbol(token.text.to_string()))
                    }
                    _ if token.is_punctuation() => Ok(Node::Symbol(token.text.to_string())),
                    _ => {
                        self.pos -= 1;
                        self.fail(format!(
                            "expected identifier, string, operator, or ( after #; got: {}",
                            token.text
                        ))
                    }
                }
            }
        }
    }

    // constantArray ::= "(" constant* ")"
    pub(crate) fn parse_constant_array(&mut self) -> Result<Node, ParseError> {
        self.expect("(")?;
        let mut elements = vec![];
        while !self.peek_is(")") {
            self.check(!self.at_end(), "unexpected end of input in constant array")?;
            elements.push(self.parse_constant()?);
        }
        self.expect(")")?;
        Ok(Node::ConstantArray(elements))
    }

    fn parse_constant(&mut self) -> Result<Node, ParseError> {
        while self.peek().is_some_and(|t| t.token == Token::Hash(HashForm::Bare)) {
            self.pos += 1;
        }
        let token = self.next_or_fail("a constant")?;
        match token.token {
            Token::Hash(HashForm::Symbol) => Ok(Node::Symbol(strip_octothorpe(token.text).to_string())),
            Token::Hash(_) => Ok(Node::Symbol(parse_string(strip_octothorpe(token.text)))),
            Token::LParen => {
                self.pos -= 1;
                self.parse_constant_array()
            }
            Token::Character => match character_value(token.text) {
                Some(c) => Ok(Node::Character(c)),
                None => self.fail(format!("bad character literal {}", token.text)),
            },
            Token::String => Ok(Node::String(parse_string(token.text))),
            Token::Identifier => Ok(match token.text {
                "nil" => Node::Nil,
                "true" => Node::True,
                "false" => Node::False,
                other => Node::Symbol(other.to_string()),
            }),
            Token::Keyword => {
                // `at:put:` lexes as two adjacent keywords
                let mut selector = token.text.to_string();
                let mut end = token.span.end;
                while let Some(next) = self.peek().filter(|t| t.is_keyword() && t.span.start == end) {
                    selector.push_str(next.text);
                    end = next.span.end;
                    self.pos += 1;
                }
                Ok(Node::Symbol(selector))
            }
            Token::Number => self.number(token.text),
            Token::Operator => {
                if let Some(next) = self.peek().filter(|t| {
                    token.is("-") && t.token == Token::Number && t.span.start == token.span.end
                }) {
                    let text = format!("-{}", next.text);
                    self.pos += 1;
                    return self.number(&text);
                }
                Ok(Node::Symbol(token.text.to_string()))
            }
            _ if token.is_punctuation() => Ok(Node::Symbol(token.text.to_string())),
            _ => {
                self.pos -= 1;
                self.fail(format!("expected constant expression, got: {}", token.text))
            }
        }
    }

    // arrayExpr ::= "{" (expr ".")* expr "."? "}"
    fn parse_array_expr(&mut self) -> Result<Node, ParseError> {
        self.expect("{")?;
        let mut elements = vec![];
        while !self.peek_is("}") {
            self.check(!self.at_end(), "unexpected end of input in array expression")?;
            elements.push(self.parse_expression()?);
            if !self.peek_is("}") {
                self.expect(".")?;
            }
        }
        self.expect("}")?;
        Ok(Node::ArrayExpr(elements))
    }
}
