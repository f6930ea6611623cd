//! Tokenizer for Cedar policy source.
//!
//! Comments and whitespace are skipped. Characters that start no known token
//! become [`TokenKind::Unknown`] so the parser can report them in context.
//! A single [`TokenKind::Eof`] token always terminates the stream.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;
use utoipa::ToSchema;

use crate::error::LexError;

/// Location of a token in the source: byte offset plus 1-based line and column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum TokenKind {
    Eof,
    Ident,
    Int,
    Reserved,
    String,
    Operator,
    Unknown,
}

/// A lexed token. `text` is the raw source slice, so string tokens keep
/// their quotes and escapes; the parser unescapes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }

    pub fn is_int(&self) -> bool {
        self.kind == TokenKind::Int
    }

    pub fn is_string(&self) -> bool {
        self.kind == TokenKind::String
    }

    /// Describe the token for "expected X, got Y" messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("`{}`", self.text),
        }
    }
}

pub const RESERVED: &[&str] = &["true", "false", "if", "then", "else", "in", "like", "has", "is"];

/// Two-character operators; checked before the single-character set.
const OPERATORS_2: &[&str] = &["::", "!=", "<=", ">=", "==", "||", "&&"];
const OPERATORS_1: &[char] = &[
    '@', '.', ',', ';', '(', ')', '{', '}', '[', ']', '+', '-', '*', ':', '!', '<', '>',
];

pub fn is_reserved(ident: &str) -> bool {
    RESERVED.contains(&ident)
}

/// Tokenize raw policy bytes.
///
/// Fails on invalid UTF-8, embedded NUL bytes, unterminated strings or block
/// comments, and malformed escape sequences. Lexing stops at the first error.
pub fn tokenize(src: &[u8]) -> Result<Vec<Token>, LexError> {
    let text = match std::str::from_utf8(src) {
        Ok(text) => text,
        Err(e) => {
            let valid = std::str::from_utf8(&src[..e.valid_up_to()]).unwrap_or_default();
            let mut scanner = Scanner::new(valid);
            scanner.skip_to_end();
            return Err(LexError::new(scanner.position(), "invalid UTF-8"));
        }
    };
    Scanner::new(text).run()
}

struct Scanner<'a> {
    src: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Scanner {
            src,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_to_end(&mut self) {
        while self.bump().is_some() {}
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.position();
            let Some(ch) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    position: start,
                });
                return Ok(tokens);
            };

            let kind = match ch {
                '\0' => return Err(LexError::new(start, "invalid character NUL")),
                c if c.is_ascii_alphabetic() || c == '_' => {
                    while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                        self.bump();
                    }
                    if is_reserved(&self.src[start.offset..self.offset]) {
                        TokenKind::Reserved
                    } else {
                        TokenKind::Ident
                    }
                }
                c if c.is_ascii_digit() => {
                    while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                        self.bump();
                    }
                    TokenKind::Int
                }
                '"' => {
                    self.scan_string(start)?;
                    TokenKind::String
                }
                _ => self.scan_operator(),
            };

            tokens.push(Token {
                kind,
                text: self.src[start.offset..self.offset].to_string(),
                position: start,
            });
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        if self.peek() == Some('\0') {
                            return Err(LexError::new(self.position(), "invalid character NUL"));
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(LexError::new(start, "comment not terminated"));
                            }
                            Some('\0') => {
                                return Err(LexError::new(
                                    self.position(),
                                    "invalid character NUL",
                                ));
                            }
                            Some('*') if self.peek_second() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_operator(&mut self) -> TokenKind {
        let rest = self.rest();
        if OPERATORS_2.iter().any(|op| rest.starts_with(op)) {
            self.bump();
            self.bump();
            return TokenKind::Operator;
        }
        match self.bump() {
            Some(c) if OPERATORS_1.contains(&c) => TokenKind::Operator,
            _ => TokenKind::Unknown,
        }
    }

    fn scan_string(&mut self, start: Position) -> Result<(), LexError> {
        self.bump();
        loop {
            match self.bump() {
                None => return Err(LexError::new(start, "string literal not terminated")),
                Some('"') => return Ok(()),
                Some('\0') => {
                    return Err(LexError::new(start, "invalid character NUL in string"));
                }
                Some('\\') => {
                    let escape_at = self.position();
                    validate_escape(self.rest()).map_err(|m| LexError::new(escape_at, m))?;
                    let ch = self.bump();
                    if ch == Some('x') {
                        self.bump();
                        self.bump();
                    } else if ch == Some('u') {
                        while let Some(c) = self.bump() {
                            if c == '}' {
                                break;
                            }
                        }
                    }
                }
                Some(_) => {}
            }
        }
    }
}

/// Check the escape sequence at the start of `rest` (just after a
/// backslash). `\*` is accepted here and only meaningful inside `like`
/// patterns.
fn validate_escape(rest: &str) -> Result<(), String> {
    let mut chars = rest.chars();
    match chars.next() {
        Some('n' | 'r' | 't' | '\\' | '0' | '\'' | '"' | '*') => Ok(()),
        Some('x') => {
            let hex: String = chars.take(2).collect();
            match u8::from_str_radix(&hex, 16) {
                Ok(v) if hex.len() == 2 && v <= 0x7f => Ok(()),
                Ok(_) if hex.len() == 2 => Err(format!("\\x{hex} is out of range (max \\x7f)")),
                _ => Err(format!("invalid escape \\x{hex}")),
            }
        }
        Some('u') => {
            if chars.next() != Some('{') {
                return Err("invalid escape \\u: expected `{`".to_string());
            }
            let digits: String = chars.by_ref().take_while(|c| *c != '}').collect();
            if digits.is_empty()
                || digits.len() > 6
                || !digits.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(format!("invalid escape \\u{{{digits}}}"));
            }
            let code = u32::from_str_radix(&digits, 16).map_err(|e| e.to_string())?;
            char::from_u32(code)
                .map(|_| ())
                .ok_or_else(|| format!("\\u{{{digits}}} is not a valid unicode scalar value"))
        }
        Some(c) => Err(format!("invalid escape \\{c}")),
        None => Err("string literal not terminated".to_string()),
    }
}

/// Decode the contents of a string token (without its quotes).
///
/// When `star` is true, `\*` decodes to a literal `*` that is flagged as
/// escaped; otherwise it is an error. Returns the decoded chars paired with
/// whether each was produced by `\*`.
pub(crate) fn unescape(raw: &str, star: bool) -> Result<Vec<(char, bool)>, String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push((c, false));
            continue;
        }
        let decoded = match chars.next() {
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('\\') => '\\',
            Some('0') => '\0',
            Some('\'') => '\'',
            Some('"') => '"',
            Some('*') if star => {
                out.push(('*', true));
                continue;
            }
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(v) if hex.len() == 2 && v <= 0x7f => char::from(v),
                    _ => return Err(format!("invalid escape \\x{hex}")),
                }
            }
            Some('u') => {
                if chars.next() != Some('{') {
                    return Err("invalid escape \\u".to_string());
                }
                let digits: String = chars.by_ref().take_while(|c| *c != '}').collect();
                u32::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|_| !digits.is_empty() && digits.len() <= 6)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid escape \\u{{{digits}}}"))?
            }
            Some(other) => return Err(format!("invalid escape \\{other}")),
            None => return Err("dangling backslash".to_string()),
        };
        out.push((decoded, false));
    }
    Ok(out)
}

/// Render `s` as a double-quoted Cedar string literal. With `star` set, a
/// literal `*` is escaped so it survives as a `like` pattern character.
pub(crate) fn quote(s: &str, star: bool) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    escape_into(&mut out, s, star);
    out.push('"');
    out
}

pub(crate) fn escape_into(out: &mut String, s: &str, star: bool) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '*' if star => out.push_str("\\*"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
}

/// Strip the quotes from a string token and decode its escapes.
pub(crate) fn string_contents(token: &Token) -> Result<String, String> {
    let raw = &token.text[1..token.text.len() - 1];
    Ok(unescape(raw, false)?.into_iter().map(|(c, _)| c).collect())
}
