//! Recursive-descent parser for fspec source text (SPEC_FULL.md §6.2).

use super::ast::{Count, FilterArgExpr, FilterCall, MemberDecl, SpecFile, StructDecl, VisualKind, Width};
use super::error::{ErrorKind, ParseError, Span};
use super::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<SpecFile, ParseError> {
        let mut structs = Vec::new();
        while !self.at_eof() {
            structs.push(self.parse_struct()?);
        }
        Ok(SpecFile { structs })
    }

    fn parse_struct(&mut self) -> Result<StructDecl, ParseError> {
        let start = self.current().span.start;
        self.expect_ident("struct")?;
        let name = self.expect_any_ident()?;
        self.expect(&TokenKind::LBrace)?;

        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            members.push(self.parse_member()?);
        }
        self.expect(&TokenKind::RBrace)?;
        let end = self.previous().span.end;

        Ok(StructDecl {
            name,
            members,
            span: Span { start, end },
        })
    }

    fn parse_member(&mut self) -> Result<MemberDecl, ParseError> {
        let start = self.current().span.start;
        let width_name = self.expect_any_ident()?;
        let width = Width::from_name(&width_name).ok_or_else(|| {
            ParseError::new(
                ErrorKind::UnknownWidth(width_name.clone()),
                self.previous().span,
                format!("unknown field width '{width_name}'"),
            )
        })?;

        let name = self.expect_any_ident()?;

        let count = if self.eat(&TokenKind::LBracket) {
            let c = match &self.current().kind {
                TokenKind::Integer(n) => {
                    let n = *n;
                    self.advance();
                    Count::Literal(n)
                }
                TokenKind::Star => {
                    self.advance();
                    Count::Eof
                }
                TokenKind::Ident(name) => {
                    let name = name.clone();
                    self.advance();
                    Count::Ident(name)
                }
                _ => {
                    return Err(self.unexpected("an integer, identifier, or '*'"));
                }
            };
            self.expect(&TokenKind::RBracket)?;
            Some(c)
        } else {
            None
        };

        let visual = if self.eat(&TokenKind::At) {
            let name = self.expect_any_ident()?;
            Some(VisualKind::from_name(&name).ok_or_else(|| {
                ParseError::new(
                    ErrorKind::UnknownVisual(name.clone()),
                    self.previous().span,
                    format!("unknown visual '@{name}'"),
                )
            })?)
        } else {
            None
        };

        let filter = if self.eat(&TokenKind::Pipe) {
            let name = self.expect_any_ident()?;
            self.expect(&TokenKind::LParen)?;
            let mut args = Vec::new();
            if !self.check(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_filter_arg()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RParen)?;
            Some(FilterCall { name, args })
        } else {
            None
        };

        self.expect(&TokenKind::Semicolon)?;
        let end = self.previous().span.end;

        Ok(MemberDecl {
            name,
            width,
            count,
            visual,
            filter,
            span: Span { start, end },
        })
    }

    fn parse_filter_arg(&mut self) -> Result<FilterArgExpr, ParseError> {
        match &self.current().kind {
            TokenKind::StringLit(s) => {
                let s = s.clone();
                self.advance();
                Ok(FilterArgExpr::Str(s))
            }
            TokenKind::Integer(n) => {
                let n = *n;
                self.advance();
                Ok(FilterArgExpr::Int(n))
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(FilterArgExpr::Ident(name))
            }
            _ => Err(self.unexpected("a string literal, integer, or identifier")),
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn at_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.at_eof() {
            self.pos += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<&Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{kind:?}")))
        }
    }

    fn expect_ident(&mut self, text: &str) -> Result<(), ParseError> {
        match &self.current().kind {
            TokenKind::Ident(s) if s == text => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected(text)),
        }
    }

    fn expect_any_ident(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = format!("{:?}", self.current().kind);
        ParseError::new(
            ErrorKind::UnexpectedToken {
                found: found.clone(),
                expected: expected.to_string(),
            },
            self.current().span,
            format!("expected {expected}, found {found}"),
        )
    }
}
