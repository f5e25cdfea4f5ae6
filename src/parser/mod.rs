use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Program, Span};
use crate::lexer::Token;
use crate::vm::{Op, Quotation, Value};

/// Macro bodies by name. Shared across calls so a REPL session remembers
/// earlier `define`s.
pub type Macros = HashMap<String, Rc<[Value]>>;

#[derive(Debug, thiserror::Error)]
#[error("Parse error at token {position}: {message}")]
pub struct ParseError {
    pub code: &'static str,
    pub position: usize,
    pub span: Span,
    pub message: String,
}

type Result<T> = std::result::Result<T, ParseError>;

/// What closes the sequence currently being parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Close {
    Eof,
    Brace,
    Bracket,
    End,
}

impl Close {
    fn describe(self) -> &'static str {
        match self {
            Close::Eof => "end of input",
            Close::Brace => "'}'",
            Close::Bracket => "']'",
            Close::End => "'end'",
        }
    }
}

pub struct Parser<'m> {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    macros: &'m mut Macros,
}

/// Parse a token stream with a fresh macro table.
pub fn parse(tokens: Vec<(Token, Span)>) -> Result<Program> {
    let mut macros = Macros::new();
    parse_with_macros(tokens, &mut macros)
}

/// Parse a token stream, reading and extending `macros`.
pub fn parse_with_macros(tokens: Vec<(Token, Span)>, macros: &mut Macros) -> Result<Program> {
    let mut parser = Parser::new(tokens, macros);
    let program = parser.parse_program()?;
    tracing::debug!(items = program.len(), macros = parser.macros.len(), "parsed");
    Ok(program)
}

impl<'m> Parser<'m> {
    pub fn new(tokens: Vec<(Token, Span)>, macros: &'m mut Macros) -> Self {
        Parser { tokens, pos: 0, macros }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .or_else(|| self.tokens.last().map(|(_, s)| Span::new(s.end, s.end)))
            .unwrap_or(Span::UNKNOWN)
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, code: &'static str, message: String) -> ParseError {
        ParseError {
            code,
            position: self.pos,
            span: self.peek_span(),
            message,
        }
    }

    pub fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program::default();
        self.parse_sequence(Close::Eof, Span::UNKNOWN, &mut program)?;
        Ok(program)
    }

    /// Parse items into `out` until `close` is consumed and return the closer's
    /// span. `opened` is the span of the opening token, reported when the
    /// sequence is never closed.
    fn parse_sequence(&mut self, close: Close, opened: Span, out: &mut Program) -> Result<Span> {
        loop {
            let found = match self.peek() {
                None => Close::Eof,
                Some(Token::RBrace) => Close::Brace,
                Some(Token::RBracket) => Close::Bracket,
                Some(Token::End) => Close::End,
                Some(_) => {
                    self.parse_item(out)?;
                    continue;
                }
            };

            if found == close {
                return Ok(self.advance().map_or(opened, |(_, span)| span));
            }
            return Err(match (close, found) {
                (Close::Eof, _) => self.error(
                    "HSK-P001",
                    format!("unexpected {} with nothing to close", found.describe()),
                ),
                (_, Close::Eof) => ParseError {
                    code: "HSK-P002",
                    position: self.pos,
                    span: opened,
                    message: format!("unterminated sequence, expected {}", close.describe()),
                },
                _ => self.error(
                    "HSK-P003",
                    format!("expected {}, found {}", close.describe(), found.describe()),
                ),
            });
        }
    }

    /// Parse one item. A macro use may append several values, a `define` none.
    fn parse_item(&mut self, out: &mut Program) -> Result<()> {
        let Some((token, span)) = self.advance() else {
            return Err(self.error("HSK-P004", "expected an item, got EOF".into()));
        };
        match token {
            Token::Int(n) => out.push(Value::Int(n), span),
            Token::Char(c) => out.push(Value::Char(c), span),
            Token::True => out.push(Value::Bool(true), span),
            Token::False => out.push(Value::Bool(false), span),
            Token::LBrace => {
                let mut body = Program::default();
                let closed = self.parse_sequence(Close::Brace, span, &mut body)?;
                let quote = Value::Quotation(Quotation::Seq(body.items.into()));
                out.push(quote, span.merge(closed));
            }
            Token::LBracket => {
                let mut body = Program::default();
                let closed = self.parse_sequence(Close::Bracket, span, &mut body)?;
                // A body of plain values is already the block it would build.
                let item = if body.items.iter().any(runs_when_reached) {
                    Value::Quotation(Quotation::List(body.items.into()))
                } else {
                    Value::Block(body.items.into())
                };
                out.push(item, span.merge(closed));
            }
            Token::Word(word) => self.parse_word(&word, span, out)?,
            Token::Define => self.parse_define(span)?,
            Token::RBrace | Token::RBracket | Token::End => {
                self.pos -= 1;
                return Err(self.error("HSK-P001", format!("unexpected {token:?}")));
            }
        }
        Ok(())
    }

    fn parse_word(&mut self, word: &str, span: Span, out: &mut Program) -> Result<()> {
        if let Some(op) = Op::from_word(word) {
            out.push(Value::op(op), span);
            return Ok(());
        }
        if let Some(body) = self.macros.get(word) {
            tracing::trace!(name = word, items = body.len(), "expanding macro");
            for item in body.iter() {
                out.push(item.clone(), span);
            }
            return Ok(());
        }
        Err(ParseError {
            code: "HSK-P006",
            position: self.pos - 1,
            span,
            message: format!("unknown word: '{word}'"),
        })
    }

    /// `define NAME body... end`
    fn parse_define(&mut self, define_span: Span) -> Result<()> {
        let name = match self.advance() {
            Some((Token::Word(name), name_span)) => {
                if Op::from_word(&name).is_some() {
                    return Err(ParseError {
                        code: "HSK-P007",
                        position: self.pos - 1,
                        span: name_span,
                        message: format!("cannot redefine built-in word '{name}'"),
                    });
                }
                name
            }
            Some((token, name_span)) => {
                return Err(ParseError {
                    code: "HSK-P008",
                    position: self.pos - 1,
                    span: name_span,
                    message: format!("expected a macro name after 'define', got {token:?}"),
                });
            }
            None => {
                return Err(self.error(
                    "HSK-P008",
                    "expected a macro name after 'define', got EOF".into(),
                ));
            }
        };

        let mut body = Program::default();
        self.parse_sequence(Close::End, define_span, &mut body)?;
        tracing::trace!(name = %name, items = body.len(), "defined macro");
        self.macros.insert(name, body.items.into());
        Ok(())
    }
}

fn runs_when_reached(value: &Value) -> bool {
    matches!(value, Value::Quotation(Quotation::Op(_) | Quotation::List(_)))
}
