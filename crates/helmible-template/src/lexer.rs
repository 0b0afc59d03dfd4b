//! Scanner for the Helm template dialect.
//!
//! Text alternates with delimited actions. Delimiters default to `{{`/`}}`
//! but are caller-selectable, which the tasks-file generator relies on to
//! sidestep Ansible's own `{{ }}`. The scanner is destructive around
//! whitespace-trim markers: `{{- ` drops the marker *and* the whitespace it
//! would have trimmed, which is why the driver strips markers textually
//! before parsing when trimming must be suppressed.

use crate::token::{keyword_kind, Token, TokenKind};
use thiserror::Error;

pub const DEFAULT_LEFT_DELIM: &str = "{{";
pub const DEFAULT_RIGHT_DELIM: &str = "}}";

const LEFT_COMMENT: &str = "/*";
const RIGHT_COMMENT: &str = "*/";
const TRIM_MARKER: char = '-';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated action at byte {0}")]
    UnterminatedAction(usize),

    #[error("unterminated quoted string at byte {0}")]
    UnterminatedString(usize),

    #[error("unterminated raw quoted string at byte {0}")]
    UnterminatedRawString(usize),

    #[error("unterminated character constant at byte {0}")]
    UnterminatedChar(usize),

    #[error("unclosed comment at byte {0}")]
    UnclosedComment(usize),

    #[error("unrecognized character in action: {0:?} at byte {1}")]
    UnknownCharacter(char, usize),

    #[error("bad number syntax: {0:?} at byte {1}")]
    MalformedNumber(String, usize),
}

enum State {
    Text,
    Action,
}

/// The scanner. Yields tokens through [`Iterator`] until EOF or the first
/// error, after which it fuses.
pub struct Lexer<'a> {
    input: &'a str,
    left_delim: String,
    right_delim: String,
    pos: usize,
    state: State,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_delims(input, DEFAULT_LEFT_DELIM, DEFAULT_RIGHT_DELIM)
    }

    pub fn with_delims(input: &'a str, left_delim: &str, right_delim: &str) -> Self {
        Self {
            input,
            left_delim: left_delim.to_string(),
            right_delim: right_delim.to_string(),
            pos: 0,
            state: State::Text,
            failed: false,
        }
    }

    /// Runs the scanner to completion.
    pub fn tokenize(self) -> Result<Vec<Token<'a>>, LexError> {
        self.collect()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn fail(&mut self, err: LexError) -> Option<Result<Token<'a>, LexError>> {
        self.failed = true;
        Some(Err(err))
    }

    /// A `-` trim marker must be followed by whitespace to count.
    fn has_left_trim_marker(s: &str) -> bool {
        let mut chars = s.chars();
        chars.next() == Some(TRIM_MARKER) && chars.next().is_some_and(|c| c.is_ascii_whitespace())
    }

    fn next_text(&mut self) -> Option<Result<Token<'a>, LexError>> {
        if self.rest().is_empty() {
            return None;
        }
        match self.rest().find(&self.left_delim) {
            Some(0) => {
                let delim_pos = self.pos;
                self.pos += self.left_delim.len();
                if Self::has_left_trim_marker(self.rest()) {
                    // Drop the marker; the preceding text token was already
                    // trimmed when it was emitted.
                    self.pos += 1;
                    self.skip_whitespace();
                }
                if self.rest().starts_with(LEFT_COMMENT) {
                    if let Some(err) = self.skip_comment() {
                        return self.fail(err);
                    }
                    return self.next_text();
                }
                self.state = State::Action;
                Some(Ok(Token::new(
                    TokenKind::LeftDelim,
                    &self.input[delim_pos..delim_pos + self.left_delim.len()],
                    delim_pos,
                )))
            }
            Some(offset) => {
                let start = self.pos;
                let mut text = &self.input[start..start + offset];
                let after_delim = &self.input[start + offset + self.left_delim.len()..];
                if Self::has_left_trim_marker(after_delim) {
                    text = text.trim_end();
                }
                self.pos += offset;
                Some(Ok(Token::new(TokenKind::Text, text, start)))
            }
            None => {
                let start = self.pos;
                let text = self.rest();
                self.pos = self.input.len();
                Some(Ok(Token::new(TokenKind::Text, text, start)))
            }
        }
    }

    /// Skips `/* ... */` up to and including the closing delimiter.
    fn skip_comment(&mut self) -> Option<LexError> {
        let comment_pos = self.pos;
        let end = match self.rest().find(RIGHT_COMMENT) {
            Some(end) => end,
            None => return Some(LexError::UnclosedComment(comment_pos)),
        };
        self.pos += end + RIGHT_COMMENT.len();
        self.skip_whitespace();
        let trimmed = if self.rest().starts_with(TRIM_MARKER) {
            self.pos += 1;
            true
        } else {
            false
        };
        if !self.rest().starts_with(&self.right_delim) {
            return Some(LexError::UnclosedComment(comment_pos));
        }
        self.pos += self.right_delim.len();
        if trimmed {
            self.skip_whitespace();
        }
        None
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn next_in_action(&mut self) -> Option<Result<Token<'a>, LexError>> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_ascii_whitespace() => self.pos += c.len_utf8(),
                _ => break,
            }
        }

        let start = self.pos;
        let rest = self.rest();

        if rest.is_empty() {
            return self.fail(LexError::UnterminatedAction(start));
        }

        // Closing delimiter, with or without a trim marker.
        if rest.starts_with(TRIM_MARKER) && rest[1..].starts_with(&self.right_delim) {
            self.pos += 1 + self.right_delim.len();
            self.state = State::Text;
            self.skip_whitespace();
            return Some(Ok(Token::new(
                TokenKind::RightDelim,
                &self.input[start + 1..start + 1 + self.right_delim.len()],
                start,
            )));
        }
        if rest.starts_with(&self.right_delim) {
            self.pos += self.right_delim.len();
            self.state = State::Text;
            return Some(Ok(Token::new(
                TokenKind::RightDelim,
                &self.input[start..self.pos],
                start,
            )));
        }

        if rest.starts_with(":=") {
            self.pos += 2;
            return Some(Ok(Token::new(TokenKind::ColonEq, ":=", start)));
        }

        let c = rest.chars().next().unwrap_or_default();
        match c {
            '|' | ',' | '(' | ')' => {
                self.pos += 1;
                let kind = match c {
                    '|' => TokenKind::Pipe,
                    ',' => TokenKind::Comma,
                    '(' => TokenKind::LeftParen,
                    _ => TokenKind::RightParen,
                };
                Some(Ok(Token::new(kind, &self.input[start..self.pos], start)))
            }
            '"' => self.lex_quoted(start, '"', LexError::UnterminatedString(start), TokenKind::Str),
            '`' => self.lex_raw_string(start),
            '\'' => self.lex_quoted(
                start,
                '\'',
                LexError::UnterminatedChar(start),
                TokenKind::CharConstant,
            ),
            '.' => {
                let next = rest.chars().nth(1);
                match next {
                    Some(n) if n.is_ascii_digit() => self.lex_number(start),
                    Some(n) if n.is_ascii_alphanumeric() || n == '_' => self.lex_field(start),
                    _ => {
                        self.pos += 1;
                        Some(Ok(Token::new(TokenKind::Dot, ".", start)))
                    }
                }
            }
            '$' => self.lex_variable(start),
            '+' | '-' => self.lex_number(start),
            c if c.is_ascii_digit() => self.lex_number(start),
            c if c.is_ascii_alphabetic() || c == '_' => self.lex_identifier(start),
            other => self.fail(LexError::UnknownCharacter(other, start)),
        }
    }

    fn lex_quoted(
        &mut self,
        start: usize,
        quote: char,
        err: LexError,
        kind: TokenKind,
    ) -> Option<Result<Token<'a>, LexError>> {
        self.pos += 1;
        let mut escaped = false;
        loop {
            match self.peek_char() {
                None | Some('\n') => return self.fail(err),
                Some('\\') if !escaped => {
                    escaped = true;
                    self.pos += 1;
                }
                Some(c) if c == quote && !escaped => {
                    self.pos += 1;
                    return Some(Ok(Token::new(kind, &self.input[start..self.pos], start)));
                }
                Some(c) => {
                    escaped = false;
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn lex_raw_string(&mut self, start: usize) -> Option<Result<Token<'a>, LexError>> {
        self.pos += 1;
        match self.rest().find('`') {
            Some(end) => {
                self.pos += end + 1;
                Some(Ok(Token::new(
                    TokenKind::RawStr,
                    &self.input[start..self.pos],
                    start,
                )))
            }
            None => self.fail(LexError::UnterminatedRawString(start)),
        }
    }

    fn lex_field(&mut self, start: usize) -> Option<Result<Token<'a>, LexError>> {
        // A field chain: `.name` segments, dots included in the token.
        while self.rest().starts_with('.') {
            let segment: usize = self.rest()[1..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .map(char::len_utf8)
                .sum();
            if segment == 0 {
                break;
            }
            self.pos += 1 + segment;
        }
        self.terminated_token(TokenKind::Field, start)
    }

    fn lex_variable(&mut self, start: usize) -> Option<Result<Token<'a>, LexError>> {
        self.pos += 1;
        let name: usize = self
            .rest()
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum();
        self.pos += name;
        // Chained field accesses belong to the variable token: `$v.name`.
        while self.rest().starts_with('.') {
            let segment: usize = self.rest()[1..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .map(char::len_utf8)
                .sum();
            if segment == 0 {
                break;
            }
            self.pos += 1 + segment;
        }
        self.terminated_token(TokenKind::Variable, start)
    }

    fn lex_identifier(&mut self, start: usize) -> Option<Result<Token<'a>, LexError>> {
        let len: usize = self
            .rest()
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum();
        self.pos += len;
        let text = &self.input[start..self.pos];
        let kind = keyword_kind(text).unwrap_or(TokenKind::Identifier);
        self.terminated_token(kind, start)
    }

    /// Scans one numeric literal; a `+`/`-` immediately after it introduces
    /// the contiguous complex form `1+2i`.
    fn lex_number(&mut self, start: usize) -> Option<Result<Token<'a>, LexError>> {
        if !self.scan_number() {
            let end = self.pos.max(start + 1).min(self.input.len());
            return self.fail(LexError::MalformedNumber(
                self.input[start..end].to_string(),
                start,
            ));
        }
        if matches!(self.peek_char(), Some('+') | Some('-')) {
            self.pos += 1;
            if !self.scan_number() || !self.input[..self.pos].ends_with('i') {
                return self.fail(LexError::MalformedNumber(
                    self.input[start..self.pos.min(self.input.len())].to_string(),
                    start,
                ));
            }
            return self.terminated_token(TokenKind::Complex, start);
        }
        self.terminated_token(TokenKind::Number, start)
    }

    fn scan_number(&mut self) -> bool {
        if matches!(self.peek_char(), Some('+') | Some('-')) {
            self.pos += 1;
        }
        let rest = self.rest();
        let (digits, decimal): (&str, bool) = if rest.starts_with("0x") || rest.starts_with("0X") {
            self.pos += 2;
            ("0123456789abcdefABCDEF_", false)
        } else if rest.starts_with("0o") || rest.starts_with("0O") {
            self.pos += 2;
            ("01234567_", false)
        } else if rest.starts_with("0b") || rest.starts_with("0B") {
            self.pos += 2;
            ("01_", false)
        } else {
            ("0123456789_", true)
        };
        let mut seen = false;
        while self.peek_char().is_some_and(|c| digits.contains(c)) {
            self.pos += 1;
            seen = true;
        }
        if decimal && self.peek_char() == Some('.') {
            self.pos += 1;
            while self.peek_char().is_some_and(|c| digits.contains(c)) {
                self.pos += 1;
                seen = true;
            }
        }
        if !seen {
            return false;
        }
        if matches!(self.peek_char(), Some('e') | Some('E') | Some('p') | Some('P')) {
            self.pos += 1;
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            let mut exp_digits = false;
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
                exp_digits = true;
            }
            if !exp_digits {
                return false;
            }
        }
        if self.peek_char() == Some('i') {
            self.pos += 1;
        }
        true
    }

    /// Emits a token iff the character that follows can legally end it.
    fn terminated_token(
        &mut self,
        kind: TokenKind,
        start: usize,
    ) -> Option<Result<Token<'a>, LexError>> {
        if !self.at_terminator() {
            let bad = self.peek_char().unwrap_or_default();
            return self.fail(LexError::UnknownCharacter(bad, self.pos));
        }
        Some(Ok(Token::new(kind, &self.input[start..self.pos], start)))
    }

    fn at_terminator(&self) -> bool {
        match self.peek_char() {
            None => true,
            Some(c) if c.is_ascii_whitespace() => true,
            Some('.') | Some(',') | Some('|') | Some(':') | Some(')') | Some('(') => true,
            Some(c) => {
                c == TRIM_MARKER
                    || self
                        .right_delim
                        .chars()
                        .next()
                        .is_some_and(|first| first == c)
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.state {
            State::Text => self.next_text(),
            State::Action => self.next_in_action(),
        }
    }
}
