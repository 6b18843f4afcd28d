// Hand-written tokenizer for Lua source
// Produces the token stream consumed by the parser; tracks line numbers
// so every tree node can carry a source span

use std::rc::Rc;

use smol_str::SmolStr;

use super::token::{Token, TokenKind};
use crate::lua_vm::{LuaError, LuaResult};

pub struct Lexer<'a> {
    source: &'a str,
    chunk_name: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, chunk_name: &'a str) -> Self {
        Lexer {
            source,
            chunk_name,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    pub fn tokenize(mut self) -> LuaResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn error(&self, message: impl Into<String>) -> LuaError {
        LuaError::syntax(
            format!("{}:{}: {}", self.chunk_name, self.line, message.into()),
            self.line,
        )
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> LuaResult<Token> {
        self.skip_trivia()?;
        let line = self.line;
        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(ch) => match ch {
                b'0'..=b'9' => self.lex_number()?,
                b'"' | b'\'' => self.lex_string(ch)?,
                b'[' if matches!(self.peek_at(1), Some(b'[') | Some(b'=')) => {
                    match self.try_long_bracket()? {
                        Some(text) => TokenKind::Str(text),
                        None => {
                            self.bump();
                            TokenKind::LeftBracket
                        }
                    }
                }
                _ if ch == b'_' || ch.is_ascii_alphabetic() => self.lex_name(),
                _ => self.lex_symbol()?,
            },
        };
        Ok(Token { kind, line })
    }

    fn skip_trivia(&mut self) -> LuaResult<()> {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    self.pos += 2;
                    // long comment --[[ ... ]] (with optional = padding)
                    if self.peek() == Some(b'[') {
                        if self.try_long_bracket()?.is_some() {
                            continue;
                        }
                    }
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_name(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == b'_' || ch.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Name(SmolStr::new(text)))
    }

    fn lex_number(&mut self) -> LuaResult<TokenKind> {
        let start = self.pos;
        if self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X'))
        {
            self.pos += 2;
            let digits = self.pos;
            while let Some(ch) = self.peek() {
                if ch.is_ascii_hexdigit() {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if self.pos == digits {
                return Err(self.error("malformed number near '0x'"));
            }
            let value = i64::from_str_radix(&self.source[digits..self.pos], 16)
                .map_err(|_| self.error("malformed number"))?;
            return Ok(TokenKind::Number(value as f64));
        }

        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.eat(b'.') {
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            let exp = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            if self.pos == exp {
                return Err(self.error("malformed number"));
            }
        }
        let text = &self.source[start..self.pos];
        let value: f64 = text
            .parse()
            .map_err(|_| self.error(format!("malformed number near '{}'", text)))?;
        Ok(TokenKind::Number(value))
    }

    fn lex_string(&mut self, quote: u8) -> LuaResult<TokenKind> {
        self.bump();
        // bytes, not chars: escapes may produce arbitrary byte values
        let mut out: Vec<u8> = Vec::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(self.error("unfinished string"));
            };
            match ch {
                b'\n' => return Err(self.error("unfinished string")),
                b'\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(self.error("unfinished string"));
                    };
                    match esc {
                        b'n' => out.push(b'\n'),
                        b't' => out.push(b'\t'),
                        b'r' => out.push(b'\r'),
                        b'a' => out.push(0x07),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'v' => out.push(0x0b),
                        b'\\' => out.push(b'\\'),
                        b'"' => out.push(b'"'),
                        b'\'' => out.push(b'\''),
                        b'\n' => out.push(b'\n'),
                        b'x' => {
                            let mut code = 0u32;
                            for _ in 0..2 {
                                let Some(d) = self.peek().and_then(hex_digit) else {
                                    return Err(self.error(
                                        "hexadecimal digit expected in escape sequence",
                                    ));
                                };
                                code = code * 16 + d;
                                self.pos += 1;
                            }
                            out.push(code as u8);
                        }
                        b'0'..=b'9' => {
                            let mut code = (esc - b'0') as u32;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'9') => {
                                        code = code * 10 + (d - b'0') as u32;
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            if code > 255 {
                                return Err(self.error("decimal escape too large"));
                            }
                            out.push(code as u8);
                        }
                        other => {
                            return Err(self.error(format!(
                                "invalid escape sequence '\\{}'",
                                other as char
                            )));
                        }
                    }
                }
                _ if ch == quote => break,
                _ => out.push(ch),
            }
        }
        let text = String::from_utf8_lossy(&out);
        Ok(TokenKind::Str(Rc::from(text.as_ref())))
    }

    /// Attempt to read a `[=*[ ... ]=*]` long bracket at the current `[`.
    /// Returns `None` (without consuming) when the bracket level does not
    /// open a long string after all.
    fn try_long_bracket(&mut self) -> LuaResult<Option<Rc<str>>> {
        let saved = self.pos;
        debug_assert_eq!(self.peek(), Some(b'['));
        self.pos += 1;
        let mut level = 0usize;
        while self.peek() == Some(b'=') {
            level += 1;
            self.pos += 1;
        }
        if self.peek() != Some(b'[') {
            self.pos = saved;
            return Ok(None);
        }
        self.pos += 1;
        // a newline immediately after the opening bracket is skipped
        if self.peek() == Some(b'\r') {
            self.bump();
            if self.peek() == Some(b'\n') {
                self.pos += 1;
            }
        } else if self.peek() == Some(b'\n') {
            self.bump();
        }
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("unfinished long string")),
                Some(b']') => {
                    let end = self.pos;
                    self.pos += 1;
                    let mut close = 0usize;
                    while self.peek() == Some(b'=') {
                        close += 1;
                        self.pos += 1;
                    }
                    if close == level && self.peek() == Some(b']') {
                        self.pos += 1;
                        return Ok(Some(Rc::from(&self.source[start..end])));
                    }
                    self.pos = end + 1;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn lex_symbol(&mut self) -> LuaResult<TokenKind> {
        let ch = self.bump().unwrap_or(0);
        let kind = match ch {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'^' => TokenKind::Caret,
            b'#' => TokenKind::Hash,
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b'[' => TokenKind::LeftBracket,
            b']' => TokenKind::RightBracket,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'=' => {
                if self.eat(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            b'~' => {
                if self.eat(b'=') {
                    TokenKind::NotEq
                } else {
                    return Err(self.error("unexpected symbol near '~'"));
                }
            }
            b'<' => {
                if self.eat(b'=') {
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            b'>' => {
                if self.eat(b'=') {
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            b':' => {
                if self.eat(b':') {
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            b'.' => {
                if self.eat(b'.') {
                    if self.eat(b'.') {
                        TokenKind::Ellipsis
                    } else {
                        TokenKind::DotDot
                    }
                } else if matches!(self.peek(), Some(b'0'..=b'9')) {
                    // .5 style numeral
                    self.pos -= 1;
                    let start = self.pos;
                    self.pos += 1;
                    while matches!(self.peek(), Some(b'0'..=b'9')) {
                        self.pos += 1;
                    }
                    let value: f64 = self.source[start..self.pos]
                        .parse()
                        .map_err(|_| self.error("malformed number"))?;
                    TokenKind::Number(value)
                } else {
                    TokenKind::Dot
                }
            }
            other => {
                return Err(self.error(format!(
                    "unexpected symbol near '{}'",
                    other as char
                )));
            }
        };
        Ok(kind)
    }
}

fn hex_digit(ch: u8) -> Option<u32> {
    (ch as char).to_digit(16)
}
