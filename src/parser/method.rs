use crate::ast::{Block, MethodDef, Node, Primitive, PrimitiveId};
use crate::error::ParseError;
use crate::lexer::{Token, is_pseudo_variable};
use crate::parser::Parser;
use crate::parser::expression::parse_string;

impl<'src> Parser<'src> {
    /// Statements up to `delimiter` (or the end of input for a method body).
    /// Stray periods are skipped and an answer must come last.
    fn parse_expr_seq(&mut self, delimiter: Option<&str>) -> Result<Vec<Node>, ParseError> {
        let mut seq = vec![];
        if delimiter.is_none()
            && self.peek_is("<")
            && self.peek_at(1).is_some_and(|t| t.is("primitive:"))
        {
            seq.push(self.parse_primitive()?);
        }

        let at_delimiter = |p: &Self| match delimiter {
            Some(d) => p.peek_is(d),
            None => false,
        };
        while !self.at_end() && !self.peek_is("^") && !at_delimiter(self) {
            if self.peek_is(".") {
                self.pos += 1;
                continue;
            }
            seq.push(self.parse_expression()?);
            if self.peek_is(".") {
                self.pos += 1;
            } else {
                break;
            }
        }

        if self.peek_is("^") {
            self.pos += 1;
            let value = self.parse_expression()?;
            seq.push(Node::Answer(Box::new(value)));
            if self.peek_is(".") {
                self.pos += 1;
            }
        }
        Ok(seq)
    }

    // primitive ::= "<" "primitive:" (number | string ("module:" string)?) ">"
    fn parse_primitive(&mut self) -> Result<Node, ParseError> {
        self.pos += 2;
        let token = self.next_or_fail("a primitive number or name")?;
        let id = match token.token {
            Token::Number => match token.text.parse::<u32>() {
                Ok(n) => PrimitiveId::Number(n),
                Err(_) => {
                    self.pos -= 1;
                    return self.fail(format!("bad primitive number {}", token.text));
                }
            },
            Token::String => PrimitiveId::Named(parse_string(token.text)),
            _ => {
                self.pos -= 1;
                return self.fail(format!("expected primitive number or name, got: {}", token.text));
            }
        };
        let mut module = None;
        if self.peek_is("module:") {
            self.pos += 1;
            let token = self.next_or_fail("a module name")?;
            if token.token != Token::String {
                self.pos -= 1;
                return self.fail(format!("expected module name string, got: {}", token.text));
            }
            module = Some(parse_string(token.text));
        }
        self.expect(">")?;
        Ok(Node::Primitive(Primitive { id, module }))
    }

    fn declare(&self, names: &[String], name: &str) -> Result<(), ParseError> {
        self.check(
            !is_pseudo_variable(name),
            format!("cannot use {} as a variable name", name),
        )?;
        self.check(
            !names.iter().any(|n| n == name),
            format!("variable name {} already used", name),
        )?;
        self.check(
            !self.have_local(name),
            format!("variable name {} already used in this method", name),
        )
    }

    fn parse_local_names(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = vec![];
        while let Some(name) = self.peek().filter(|t| t.is_identifier()).map(|t| t.text) {
            self.declare(&names, name)?;
            names.push(name.to_string());
            self.pos += 1;
        }
        self.expect("|")?;
        Ok(names)
    }

    // locals ::= ("|" identifier* "|")?
    fn parse_locals(&mut self) -> Result<Vec<String>, ParseError> {
        if self.peek_is("||") {
            self.pos += 1;
            return Ok(vec![]);
        }
        if !self.peek_is("|") {
            return Ok(vec![]);
        }
        self.pos += 1;
        self.parse_local_names()
    }

    // block ::= "[" (":" identifier)* ("|" | "||" locals)? locals exprSeq "]"
    pub(crate) fn parse_block(&mut self) -> Result<Node, ParseError> {
        self.expect("[")?;
        let mut params: Vec<String> = vec![];
        while self.peek_is(":") {
            self.pos += 1;
            let token = self.next_or_fail("a block parameter name")?;
            if !token.is_identifier() {
                self.pos -= 1;
                return self.fail(format!("expected block parameter name, got: {}", token.text));
            }
            self.declare(&params, token.text)?;
            params.push(token.text.to_string());
        }

        let locals = if params.is_empty() || self.peek_is("]") {
            self.parse_locals()?
        } else if self.peek_is("||") {
            // `[:x || t | ...]`: the parameter bar and the locals bar run together
            self.pos += 1;
            self.with_scope(params.clone(), |p| p.parse_local_names())?
        } else {
            self.expect("|")?;
            self.with_scope(params.clone(), |p| p.parse_locals())?
        };

        let mut scope = params.clone();
        scope.extend(locals.iter().cloned());
        let body = self.with_scope(scope, |p| p.parse_expr_seq(Some("]")))?;
        self.expect("]")?;
        Ok(Node::Block(Block { params, locals, body }))
    }

    fn parse_argument_name(&mut self, args: &[String]) -> Result<String, ParseError> {
        match self.peek().filter(|t| t.is_identifier()).map(|t| t.text) {
            Some(name) => {
                self.declare(args, name)?;
                self.pos += 1;
                Ok(name.to_string())
            }
            None => self.fail("expected argument name"),
        }
    }

    // messageSignature ::= identifier | operator identifier | (keyword identifier)+
    fn parse_message_signature(&mut self) -> Result<(String, Vec<String>), ParseError> {
        let Some(token) = self.peek().cloned() else {
            return self.fail("expected message definition, got end of input");
        };
        let mut args: Vec<String> = vec![];
        match token.token {
            Token::Identifier => {
                self.check(
                    !is_pseudo_variable(token.text),
                    format!("cannot define a method named {}", token.text),
                )?;
                self.pos += 1;
                Ok((token.text.to_string(), args))
            }
            Token::Operator => {
                self.pos += 1;
                let arg = self.parse_argument_name(&args)?;
                args.push(arg);
                Ok((token.text.to_string(), args))
            }
            Token::Keyword => {
                let mut selector = String::new();
                while let Some(keyword) = self.peek().filter(|t| t.is_keyword()).map(|t| t.text) {
                    self.pos += 1;
                    selector.push_str(keyword);
                    let arg = self.parse_argument_name(&args)?;
                    args.push(arg);
                }
                Ok((selector, args))
            }
            _ => self.fail(format!("expected message definition, got: {}", token.text)),
        }
    }

    /// methodDefinition ::= messageSignature locals exprSeq
    pub fn parse_method_definition(&mut self) -> Result<MethodDef, ParseError> {
        let (selector, args) = self.parse_message_signature()?;
        let (locals, body) = self.with_scope(args.clone(), |p| {
            let locals = p.parse_locals()?;
            let body = p.with_scope(locals.clone(), |p| p.parse_expr_seq(None))?;
            Ok((locals, body))
        })?;
        Ok(MethodDef {
            selector,
            args,
            locals,
            body,
        })
    }

    /// A body with no signature, as sent to `evaluate:`.
    pub fn parse_method_no_args(&mut self) -> Result<MethodDef, ParseError> {
        let locals = self.parse_locals()?;
        let body = self.with_scope(locals.clone(), |p| p.parse_expr_seq(None))?;
        Ok(MethodDef {
            selector: String::new(),
            args: vec![],
            locals,
            body,
        })
    }
}
