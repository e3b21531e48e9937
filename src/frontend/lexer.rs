//! Tokenizes fspec source text into a flat token stream (SPEC_FULL.md §6.2).

use super::error::{ErrorKind, ParseError, Position, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Integer(u64),
    StringLit(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Semicolon,
    Comma,
    Pipe,
    At,
    Star,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.position();

            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::point(start),
                });
                break;
            };

            let kind = match c {
                b'{' => {
                    self.advance();
                    TokenKind::LBrace
                }
                b'}' => {
                    self.advance();
                    TokenKind::RBrace
                }
                b'[' => {
                    self.advance();
                    TokenKind::LBracket
                }
                b']' => {
                    self.advance();
                    TokenKind::RBracket
                }
                b'(' => {
                    self.advance();
                    TokenKind::LParen
                }
                b')' => {
                    self.advance();
                    TokenKind::RParen
                }
                b';' => {
                    self.advance();
                    TokenKind::Semicolon
                }
                b',' => {
                    self.advance();
                    TokenKind::Comma
                }
                b'|' => {
                    self.advance();
                    TokenKind::Pipe
                }
                b'@' => {
                    self.advance();
                    TokenKind::At
                }
                b'*' => {
                    self.advance();
                    TokenKind::Star
                }
                b'"' => self.lex_string(start)?,
                b'0'..=b'9' => self.lex_integer(),
                c if is_ident_start(c) => self.lex_ident(),
                other => {
                    return Err(ParseError::new(
                        ErrorKind::UnexpectedChar(other as char),
                        Span {
                            start,
                            end: self.position(),
                        },
                        format!("unexpected character '{}'", other as char),
                    ));
                }
            };

            let end = self.position();
            tokens.push(Token {
                kind,
                span: Span { start, end },
            });
        }

        Ok(tokens)
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(ParseError::new(
                        ErrorKind::UnterminatedString,
                        Span {
                            start,
                            end: self.position(),
                        },
                        "unterminated string literal",
                    ));
                }
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => value.push('\n'),
                    Some(b't') => value.push('\t'),
                    Some(b'"') => value.push('"'),
                    Some(b'\\') => value.push('\\'),
                    Some(other) => value.push(other as char),
                    None => {
                        return Err(ParseError::new(
                            ErrorKind::UnterminatedString,
                            Span {
                                start,
                                end: self.position(),
                            },
                            "unterminated string literal",
                        ));
                    }
                },
                Some(c) => value.push(c as char),
            }
        }
        Ok(TokenKind::StringLit(value))
    }

    fn lex_integer(&mut self) -> TokenKind {
        let start_pos = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.src[start_pos..self.pos]).unwrap();
        TokenKind::Integer(text.parse().unwrap_or(0))
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start_pos = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.src[start_pos..self.pos]).unwrap();
        TokenKind::Ident(text.to_string())
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_struct_skeleton() {
        let tokens = kinds("struct foo { }");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("struct".to_string()),
                TokenKind::Ident("foo".to_string()),
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_member_with_count_visual_and_filter() {
        let tokens = kinds(r#"u8 data[n] @hex | encoding("UTF-8");"#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("u8".to_string()),
                TokenKind::Ident("data".to_string()),
                TokenKind::LBracket,
                TokenKind::Ident("n".to_string()),
                TokenKind::RBracket,
                TokenKind::At,
                TokenKind::Ident("hex".to_string()),
                TokenKind::Pipe,
                TokenKind::Ident("encoding".to_string()),
                TokenKind::LParen,
                TokenKind::StringLit("UTF-8".to_string()),
                TokenKind::RParen,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        let tokens = kinds("// a comment\nstruct s {}");
        assert_eq!(tokens[0], TokenKind::Ident("struct".to_string()));
    }

    #[test]
    fn star_count_tokenizes_as_star() {
        let tokens = kinds("u8 rest[*];");
        assert!(tokens.contains(&TokenKind::Star));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedString);
    }
}
