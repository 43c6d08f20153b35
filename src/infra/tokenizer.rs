//! Identifier tokenizer
//!
//! Line-oriented lexer for the reference language and the `Tokenizer`
//! collaborator that turns a cursor offset into a `SymbolCandidate`.
//! Conditional regions (`#if NAME` / `#else` / `#endif`) are evaluated against
//! the active defines; inactive lines produce no tokens.

use crate::models::symbol::{CandidateKind, LookupKind, SymbolCandidate};
use crate::models::text::{LineIndex, TextSpan};

pub const KEYWORDS: &[&str] = &[
    "do", "else", "false", "fun", "if", "in", "internal", "let", "match", "module", "mutable",
    "not", "open", "private", "rec", "then", "true", "type", "with",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    /// Double-backtick quoted identifier, backticks included in the span
    QuotedIdent,
    Keyword,
    Number,
    Str,
    Comment,
    Dot,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Absolute byte span in the source text
    pub span: TextSpan,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end()]
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::QuotedIdent)
    }

    pub fn is_punct(&self, source: &str, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(source) == punct
    }

    pub fn end_column(&self) -> u32 {
        self.column + self.span.length as u32
    }

    /// Identifier text with double backticks stripped
    pub fn name<'a>(&self, source: &'a str) -> &'a str {
        unquote(self.text(source))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexDiagnostic {
    pub line: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<LexDiagnostic>,
}

struct Region {
    parent_active: bool,
    condition: bool,
}

enum Directive<'a> {
    If(&'a str),
    Else,
    EndIf,
}

impl<'a> Directive<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("#if")
            && rest.starts_with(char::is_whitespace)
        {
            return Some(Self::If(rest.trim()));
        }
        match trimmed {
            "#else" => Some(Self::Else),
            "#endif" => Some(Self::EndIf),
            _ => None,
        }
    }
}

fn is_active(regions: &[Region]) -> bool {
    regions
        .last()
        .is_none_or(|r| r.parent_active && r.condition)
}

/// Evaluate `A`, `!A`, `A && B`, `A || B` against the defines
fn evaluate(expr: &str, defines: &[String]) -> bool {
    let defined = |name: &str| defines.iter().any(|d| d == name);
    expr.split("||").any(|alternative| {
        alternative.split("&&").all(|term| {
            let term = term.trim().trim_matches(|c| c == '(' || c == ')').trim();
            match term.strip_prefix('!') {
                Some(name) => !defined(name.trim()),
                None => defined(term),
            }
        })
    })
}

pub fn lex(text: &str, defines: &[String]) -> Lexed {
    let mut lexed = Lexed::default();
    let mut regions: Vec<Region> = Vec::new();
    let mut base = 0;
    let mut last_line = 0;

    for (idx, raw) in text.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let line_no = idx as u32;
        let start = base;
        base += raw.len() + 1;
        last_line = line_no;

        if let Some(directive) = Directive::parse(line) {
            match directive {
                Directive::If(expr) => regions.push(Region {
                    parent_active: is_active(&regions),
                    condition: evaluate(expr, defines),
                }),
                Directive::Else => match regions.last_mut() {
                    Some(region) => region.condition = !region.condition,
                    None => lexed.diagnostics.push(LexDiagnostic {
                        line: line_no,
                        message: "#else without matching #if".to_string(),
                    }),
                },
                Directive::EndIf => {
                    if regions.pop().is_none() {
                        lexed.diagnostics.push(LexDiagnostic {
                            line: line_no,
                            message: "#endif without matching #if".to_string(),
                        });
                    }
                }
            }
            continue;
        }

        if is_active(&regions) {
            lex_line(line, line_no, start, &mut lexed);
        }
    }

    if !regions.is_empty() {
        lexed.diagnostics.push(LexDiagnostic {
            line: last_line,
            message: "unterminated #if".to_string(),
        });
    }

    lexed
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'\''
}

fn lex_line(line: &str, line_no: u32, base: usize, lexed: &mut Lexed) {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        let start = i;

        let kind = if b.is_ascii_whitespace() {
            i += 1;
            continue;
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            i = len;
            TokenKind::Comment
        } else if b == b'"' {
            i += 1;
            let mut closed = false;
            while i < len {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'"' => {
                        i += 1;
                        closed = true;
                        break;
                    }
                    _ => i += 1,
                }
            }
            i = i.min(len);
            if !closed {
                lexed.diagnostics.push(LexDiagnostic {
                    line: line_no,
                    message: "unterminated string literal".to_string(),
                });
            }
            TokenKind::Str
        } else if b == b'`' && bytes.get(i + 1) == Some(&b'`') {
            match line[i + 2..].find("``") {
                Some(rel) => {
                    i += 2 + rel + 2;
                    TokenKind::QuotedIdent
                }
                None => {
                    i += 2;
                    TokenKind::Punct
                }
            }
        } else if is_ident_start(b) {
            i += 1;
            while i < len && is_ident_char(bytes[i]) {
                i += 1;
            }
            if is_keyword(&line[start..i]) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            }
        } else if b.is_ascii_digit() {
            i += 1;
            while i < len
                && (bytes[i].is_ascii_alphanumeric()
                    || bytes[i] == b'_'
                    || (bytes[i] == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)))
            {
                i += 1;
            }
            TokenKind::Number
        } else if b == b'.' {
            i += 1;
            TokenKind::Dot
        } else {
            i += line[i..].chars().next().map_or(1, char::len_utf8);
            TokenKind::Punct
        };

        lexed.tokens.push(Token {
            kind,
            span: TextSpan::from_bounds(base + start, base + i),
            line: line_no,
            column: start as u32,
        });
    }
}

/// Identifier text without surrounding double backticks
pub fn unquote(name: &str) -> &str {
    name.strip_prefix("``")
        .and_then(|s| s.strip_suffix("``"))
        .filter(|s| !s.is_empty())
        .unwrap_or(name)
}

/// Whether `name` can replace an identifier
pub fn is_valid_identifier(name: &str) -> bool {
    if let Some(inner) = name.strip_prefix("``").and_then(|s| s.strip_suffix("``")) {
        return !inner.is_empty() && !inner.contains("``") && !inner.contains(['\n', '\r', '\t']);
    }
    let bytes = name.as_bytes();
    match bytes.split_first() {
        Some((&first, rest)) => {
            is_ident_start(first) && rest.iter().all(|&b| is_ident_char(b)) && !is_keyword(name)
        }
        None => false,
    }
}

/// Token-level access to source text
pub trait Tokenizer: Send + Sync {
    /// Identifier at `offset`, `None` in whitespace, punctuation, comments,
    /// literals and inactive regions
    fn symbol_at_position(
        &self,
        text: &str,
        offset: usize,
        defines: &[String],
        lookup: LookupKind,
    ) -> Option<SymbolCandidate>;

    /// Adjust a possibly stale span so it can be replaced in `text`
    fn fixup_span(&self, text: &str, span: TextSpan) -> TextSpan;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierTokenizer;

impl IdentifierTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for IdentifierTokenizer {
    fn symbol_at_position(
        &self,
        text: &str,
        offset: usize,
        defines: &[String],
        lookup: LookupKind,
    ) -> Option<SymbolCandidate> {
        let lines = LineIndex::new(text);
        let line = lines.line_of(offset)?;
        let line_span = lines.line_span(line)?;
        let lexed = lex(text, defines);

        let tokens: Vec<&Token> = lexed.tokens.iter().filter(|t| t.line == line).collect();
        let is_candidate = |t: &&Token| t.is_identifier() || t.kind == TokenKind::Keyword;

        let idx = tokens
            .iter()
            .position(|t| is_candidate(t) && t.span.contains(offset))
            .or_else(|| match lookup {
                LookupKind::Greedy => tokens
                    .iter()
                    .position(|t| is_candidate(t) && t.span.end() == offset),
                LookupKind::Precise => None,
            })?;
        let token = tokens[idx];

        // Walk back over `Qualifier.` pairs written without whitespace
        let mut island = vec![token.name(text).to_string()];
        let mut k = idx;
        while k >= 2
            && tokens[k - 1].kind == TokenKind::Dot
            && tokens[k - 2].is_identifier()
            && tokens[k - 1].span.start == tokens[k - 2].span.end()
            && tokens[k].span.start == tokens[k - 1].span.end()
        {
            island.insert(0, tokens[k - 2].name(text).to_string());
            k -= 2;
        }

        let kind = if token.kind == TokenKind::Keyword {
            CandidateKind::Keyword
        } else {
            CandidateKind::Identifier
        };

        Some(SymbolCandidate {
            span: token.span,
            kind,
            line,
            left_column: token.column,
            right_column: token.end_column(),
            line_text: line_span.slice(text).unwrap_or_default().to_string(),
            island,
        })
    }

    fn fixup_span(&self, text: &str, span: TextSpan) -> TextSpan {
        let mut end = span.end().min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let mut start = span.start.min(end);
        while !text.is_char_boundary(start) {
            start -= 1;
        }

        if let Some(dot) = last_qualifying_dot(&text[start..end]) {
            start += dot + 1;
        }
        TextSpan::from_bounds(start, end)
    }
}

/// Last `.` outside double-backtick quotes
fn last_qualifying_dot(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut quoted = false;
    let mut last = None;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'`' && bytes.get(i + 1) == Some(&b'`') {
            quoted = !quoted;
            i += 2;
            continue;
        }
        if bytes[i] == b'.' && !quoted {
            last = Some(i);
        }
        i += 1;
    }
    last
}
