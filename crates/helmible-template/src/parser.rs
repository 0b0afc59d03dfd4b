//! Recursive-descent parser over the token stream.
//!
//! The top-level loop alternates text runs with delimited actions; keyword
//! actions open blocks that must be balanced with `end` and may carry at
//! most one `else`. Non-keyword actions become `Action` nodes wrapping a
//! pipeline.

use crate::ast::*;
use crate::lexer::{LexError, Lexer};
use crate::token::{Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("unexpected {found} in {context} at byte {pos}")]
    Unexpected {
        found: String,
        context: &'static str,
        pos: usize,
    },

    #[error("unexpected end action at byte {pos}")]
    UnbalancedEnd { pos: usize },

    #[error("duplicate else in {block} block at byte {pos}")]
    DuplicateElse { block: &'static str, pos: usize },

    #[error("unclosed {block} block started at byte {pos}")]
    MissingEnd { block: &'static str, pos: usize },

    #[error("malformed number {text:?} at byte {pos}")]
    MalformedNumber { text: String, pos: usize },
}

/// Parses a template with the default `{{`/`}}` delimiters.
pub fn parse(name: &str, text: &str) -> Result<Tree, ParseError> {
    parse_with_delims(name, text, crate::lexer::DEFAULT_LEFT_DELIM, crate::lexer::DEFAULT_RIGHT_DELIM)
}

/// Parses a template with caller-selected delimiters.
pub fn parse_with_delims(
    name: &str,
    text: &str,
    left_delim: &str,
    right_delim: &str,
) -> Result<Tree, ParseError> {
    let tokens = Lexer::with_delims(text, left_delim, right_delim).tokenize()?;
    Parser {
        tokens,
        index: 0,
    }
    .run(name)
}

/// What ended a node list.
enum Terminator {
    Eof,
    End,
    Else { pos: usize },
    /// An `else if` action; the `if` keyword has been consumed.
    ElseIf { pos: usize },
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    index: usize,
}

impl<'a> Parser<'a> {
    fn run(mut self, name: &str) -> Result<Tree, ParseError> {
        let (root, terminator) = self.parse_list()?;
        match terminator {
            Terminator::Eof => Ok(Tree {
                name: name.to_string(),
                root,
            }),
            Terminator::End => Err(ParseError::UnbalancedEnd {
                pos: self.previous_pos(),
            }),
            Terminator::Else { pos } | Terminator::ElseIf { pos } => Err(ParseError::Unexpected {
                found: "else".to_string(),
                context: "template body",
                pos,
            }),
        }
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.index)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn previous_pos(&self) -> usize {
        self.tokens
            .get(self.index.saturating_sub(1))
            .map_or(0, |t| t.pos)
    }

    fn current_pos(&self) -> usize {
        self.peek().map_or_else(|| self.previous_pos(), |t| t.pos)
    }

    fn expect(&mut self, kind: TokenKind, context: &'static str) -> Result<Token<'a>, ParseError> {
        match self.next_token() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(ParseError::Unexpected {
                found: format!("{token}"),
                context,
                pos: token.pos,
            }),
            None => Err(ParseError::Unexpected {
                found: "end of input".to_string(),
                context,
                pos: self.previous_pos(),
            }),
        }
    }

    /// Parses nodes until `end`, `else` or EOF.
    fn parse_list(&mut self) -> Result<(ListNode, Terminator), ParseError> {
        let mut list = ListNode::new(self.current_pos());
        loop {
            let Some(token) = self.next_token() else {
                return Ok((list, Terminator::Eof));
            };
            match token.kind {
                TokenKind::Text => {
                    if !token.text.is_empty() {
                        list.nodes.push(Node::Text(TextNode {
                            pos: token.pos,
                            text: token.text.to_string(),
                        }));
                    }
                }
                TokenKind::LeftDelim => match self.peek_kind() {
                    Some(TokenKind::End) => {
                        self.next_token();
                        self.expect(TokenKind::RightDelim, "end action")?;
                        return Ok((list, Terminator::End));
                    }
                    Some(TokenKind::Else) => {
                        let else_pos = self.next_token().map_or(0, |t| t.pos);
                        if self.peek_kind() == Some(TokenKind::If) {
                            let if_pos = self.next_token().map_or(else_pos, |t| t.pos);
                            return Ok((list, Terminator::ElseIf { pos: if_pos }));
                        }
                        self.expect(TokenKind::RightDelim, "else action")?;
                        return Ok((list, Terminator::Else { pos: else_pos }));
                    }
                    _ => {
                        let node = self.parse_action(token.pos)?;
                        list.nodes.push(node);
                    }
                },
                _ => {
                    return Err(ParseError::Unexpected {
                        found: format!("{token}"),
                        context: "template body",
                        pos: token.pos,
                    })
                }
            }
        }
    }

    /// Parses the interior of one action; the opening delimiter has been
    /// consumed.
    fn parse_action(&mut self, pos: usize) -> Result<Node, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::If) => {
                self.next_token();
                self.parse_if(pos).map(Node::If)
            }
            Some(TokenKind::Range) => {
                self.next_token();
                self.parse_range(pos).map(Node::Range)
            }
            Some(TokenKind::With) => {
                self.next_token();
                self.parse_with(pos).map(Node::With)
            }
            Some(TokenKind::Template) => {
                self.next_token();
                self.parse_template(pos).map(Node::Template)
            }
            Some(kind @ (TokenKind::Define | TokenKind::Block)) => {
                let found = if kind == TokenKind::Define { "define" } else { "block" };
                Err(ParseError::Unexpected {
                    found: found.to_string(),
                    context: "action",
                    pos: self.current_pos(),
                })
            }
            _ => {
                let pipe = self.parse_pipe("command", false)?;
                self.expect(TokenKind::RightDelim, "action")?;
                Ok(Node::Action(ActionNode { pos, pipe }))
            }
        }
    }

    fn parse_if(&mut self, pos: usize) -> Result<IfNode, ParseError> {
        let pipe = self.parse_pipe("if", false)?;
        self.expect(TokenKind::RightDelim, "if")?;
        let (then_list, terminator) = self.parse_list()?;
        let else_list = self.parse_else("if", pos, terminator)?;
        Ok(IfNode {
            pos,
            pipe,
            then_list,
            else_list,
        })
    }

    /// Handles the shared tail of a block: nothing, a plain `else` list, or
    /// an `else if` chain nested as an If node inside the else list.
    fn parse_else(
        &mut self,
        block: &'static str,
        block_pos: usize,
        terminator: Terminator,
    ) -> Result<Option<ListNode>, ParseError> {
        match terminator {
            Terminator::End => Ok(None),
            Terminator::Eof => Err(ParseError::MissingEnd {
                block,
                pos: block_pos,
            }),
            Terminator::ElseIf { pos } => {
                if block != "if" {
                    return Err(ParseError::Unexpected {
                        found: "else if".to_string(),
                        context: block,
                        pos,
                    });
                }
                // {{else if}} nests: the inner if consumes the shared end.
                let inner = self.parse_if(pos)?;
                Ok(Some(ListNode {
                    pos,
                    nodes: vec![Node::If(inner)],
                }))
            }
            Terminator::Else { .. } => {
                let (else_list, next) = self.parse_list()?;
                match next {
                    Terminator::End => Ok(Some(else_list)),
                    Terminator::Else { pos } | Terminator::ElseIf { pos } => {
                        Err(ParseError::DuplicateElse { block, pos })
                    }
                    Terminator::Eof => Err(ParseError::MissingEnd {
                        block,
                        pos: block_pos,
                    }),
                }
            }
        }
    }

    fn parse_range(&mut self, pos: usize) -> Result<RangeNode, ParseError> {
        let pipe = self.parse_pipe("range", false)?;
        self.expect(TokenKind::RightDelim, "range")?;
        let use_case = RangeUseCase::classify(&pipe);
        let (body, terminator) = self.parse_list()?;
        let else_list = self.parse_else("range", pos, terminator)?;
        Ok(RangeNode {
            pos,
            pipe,
            body,
            else_list,
            use_case,
        })
    }

    fn parse_with(&mut self, pos: usize) -> Result<WithNode, ParseError> {
        let pipe = self.parse_pipe("with", false)?;
        self.expect(TokenKind::RightDelim, "with")?;
        let (body, terminator) = self.parse_list()?;
        let else_list = self.parse_else("with", pos, terminator)?;
        Ok(WithNode {
            pos,
            pipe,
            body,
            else_list,
        })
    }

    fn parse_template(&mut self, pos: usize) -> Result<TemplateNode, ParseError> {
        let token = self.next_token().ok_or(ParseError::Unexpected {
            found: "end of input".to_string(),
            context: "template invocation",
            pos,
        })?;
        let name = match token.kind {
            TokenKind::Str => unquote(token.text),
            TokenKind::RawStr => token.text.trim_matches('`').to_string(),
            _ => {
                return Err(ParseError::Unexpected {
                    found: format!("{token}"),
                    context: "template invocation",
                    pos: token.pos,
                })
            }
        };
        let pipe = if self.peek_kind() == Some(TokenKind::RightDelim) {
            None
        } else {
            Some(self.parse_pipe("template invocation", false)?)
        };
        self.expect(TokenKind::RightDelim, "template invocation")?;
        Ok(TemplateNode { pos, name, pipe })
    }

    /// Parses a pipeline: optional `$v[, $v] :=` declarations, then commands
    /// joined by `|`. Stops before the closing delimiter (or the closing
    /// parenthesis when `in_parens`).
    fn parse_pipe(&mut self, context: &'static str, in_parens: bool) -> Result<PipeNode, ParseError> {
        let pos = self.current_pos();
        let mut decls = Vec::new();

        // Declarations require the lookahead: a variable followed by `,`
        // or `:=` belongs to the declaration list.
        while self.peek_kind() == Some(TokenKind::Variable) {
            let next = self.tokens.get(self.index + 1).map(|t| t.kind);
            if !matches!(next, Some(TokenKind::ColonEq) | Some(TokenKind::Comma)) {
                break;
            }
            let token = self.next_token().expect("peeked variable");
            decls.push(VariableNode {
                pos: token.pos,
                idents: token.text.split('.').map(str::to_string).collect(),
            });
            match self.next_token().map(|t| t.kind) {
                Some(TokenKind::Comma) => continue,
                Some(TokenKind::ColonEq) => break,
                _ => unreachable!("lookahead guaranteed , or :="),
            }
        }

        let stop = if in_parens {
            TokenKind::RightParen
        } else {
            TokenKind::RightDelim
        };

        let mut cmds = Vec::new();
        loop {
            let cmd = self.parse_command(context, stop)?;
            if cmd.args.is_empty() {
                return Err(ParseError::Unexpected {
                    found: "missing command".to_string(),
                    context,
                    pos: self.current_pos(),
                });
            }
            cmds.push(cmd);
            match self.peek_kind() {
                Some(kind) if kind == stop => {
                    if in_parens {
                        self.next_token();
                    }
                    return Ok(PipeNode { pos, decls, cmds });
                }
                Some(TokenKind::Pipe) => {
                    self.next_token();
                }
                _ => {
                    return Err(ParseError::Unexpected {
                        found: "end of input".to_string(),
                        context,
                        pos: self.previous_pos(),
                    })
                }
            }
        }
    }

    /// Parses one command: operands juxtaposed until `|` or the stop token.
    fn parse_command(
        &mut self,
        context: &'static str,
        stop: TokenKind,
    ) -> Result<CommandNode, ParseError> {
        let pos = self.current_pos();
        let mut args = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::Pipe) | None => break,
                Some(kind) if kind == stop => break,
                Some(_) => args.push(self.parse_operand(context)?),
            }
        }
        Ok(CommandNode { pos, args })
    }

    fn parse_operand(&mut self, context: &'static str) -> Result<Arg, ParseError> {
        let token = self.next_token().ok_or(ParseError::Unexpected {
            found: "end of input".to_string(),
            context,
            pos: 0,
        })?;
        let term = match token.kind {
            TokenKind::Identifier => Arg::Identifier {
                pos: token.pos,
                name: token.text.to_string(),
            },
            TokenKind::Field => Arg::Field {
                pos: token.pos,
                idents: token.text[1..].split('.').map(str::to_string).collect(),
            },
            TokenKind::Variable => Arg::Variable(VariableNode {
                pos: token.pos,
                idents: token.text.split('.').map(str::to_string).collect(),
            }),
            TokenKind::Dot => Arg::Dot { pos: token.pos },
            TokenKind::Nil => Arg::Nil { pos: token.pos },
            TokenKind::Bool => Arg::Bool {
                pos: token.pos,
                value: token.text == "true",
            },
            TokenKind::Number | TokenKind::CharConstant | TokenKind::Complex => {
                Arg::Number(number_node(token.kind, token.text, token.pos)?)
            }
            TokenKind::Str => Arg::Str {
                pos: token.pos,
                quoted: token.text.to_string(),
                text: unquote(token.text),
            },
            TokenKind::RawStr => Arg::Str {
                pos: token.pos,
                quoted: token.text.to_string(),
                text: token.text.trim_matches('`').to_string(),
            },
            TokenKind::LeftParen => {
                let pipe = self.parse_pipe(context, true)?;
                Arg::Pipe(pipe)
            }
            _ => {
                return Err(ParseError::Unexpected {
                    found: format!("{token}"),
                    context,
                    pos: token.pos,
                })
            }
        };

        // A field token touching the end of a term extends it into a chain:
        // `(pipe).a` or `fn.a`. A field separated by whitespace is the next
        // operand, not a chain link.
        if self.field_adjoins_previous() {
            let pos = term.pos();
            let mut fields = Vec::new();
            while self.field_adjoins_previous() {
                let field = self.next_token().expect("peeked field");
                fields.extend(field.text[1..].split('.').map(str::to_string));
            }
            return Ok(Arg::Chain {
                pos,
                head: Box::new(term),
                fields,
            });
        }
        Ok(term)
    }

    /// Whether the upcoming token is a field access starting at the byte
    /// where the previously consumed token ended.
    fn field_adjoins_previous(&self) -> bool {
        let Some(prev) = self.tokens.get(self.index.wrapping_sub(1)) else {
            return false;
        };
        match self.peek() {
            Some(next) if next.kind == TokenKind::Field => next.pos == prev.pos + prev.text.len(),
            _ => false,
        }
    }
}

/// Strips quotes and processes the common escape sequences. Lenient by
/// construction: unknown escapes pass through verbatim.
pub fn unquote(quoted: &str) -> String {
    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            quoted
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(quoted);

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('0') => result.push('\0'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

/// Builds a number node carrying every representation that fits, mirroring
/// the promotion rules of the source dialect: integers promote to floats,
/// floats that happen to be integral back-fill the integer forms, imaginary
/// literals are complex, and complex values with a zero imaginary part
/// simplify back down.
fn number_node(kind: TokenKind, text: &str, pos: usize) -> Result<NumberNode, ParseError> {
    let mut n = NumberNode {
        pos,
        text: text.to_string(),
        is_int: false,
        is_uint: false,
        is_float: false,
        is_complex: false,
        as_int: 0,
        as_uint: 0,
        as_float: 0.0,
        as_complex: (0.0, 0.0),
    };
    let malformed = || ParseError::MalformedNumber {
        text: text.to_string(),
        pos,
    };

    match kind {
        TokenKind::CharConstant => {
            let value = unquote(text).chars().next().ok_or_else(malformed)? as i64;
            n.as_int = value;
            n.is_int = true;
            n.as_uint = value as u64;
            n.is_uint = true;
            n.as_float = value as f64;
            n.is_float = true;
            return Ok(n);
        }
        TokenKind::Complex => {
            let body = text.strip_suffix('i').ok_or_else(malformed)?;
            let split = body[1..]
                .rfind(['+', '-'])
                .map(|i| i + 1)
                .ok_or_else(malformed)?;
            let real: f64 = body[..split].parse().map_err(|_| malformed())?;
            let imag: f64 = body[split..].parse().map_err(|_| malformed())?;
            n.as_complex = (real, imag);
            n.is_complex = true;
            simplify_complex(&mut n);
            return Ok(n);
        }
        _ => {}
    }

    // Imaginary constants can only be complex unless they are zero.
    if let Some(body) = text.strip_suffix('i') {
        if let Ok(imag) = body.replace('_', "").parse::<f64>() {
            n.as_complex = (0.0, imag);
            n.is_complex = true;
            simplify_complex(&mut n);
            return Ok(n);
        }
    }

    if let Some(value) = parse_uint_auto(text) {
        n.as_uint = value;
        n.is_uint = true;
    }
    if let Some(value) = parse_int_auto(text) {
        n.as_int = value;
        n.is_int = true;
        if value == 0 {
            n.is_uint = true;
        }
    }

    if n.is_int {
        n.is_float = true;
        n.as_float = n.as_int as f64;
    } else if n.is_uint {
        n.is_float = true;
        n.as_float = n.as_uint as f64;
    } else if let Ok(value) = text.replace('_', "").parse::<f64>() {
        // A float spelling with no fractional or exponent markers is an
        // integer too large for the integer forms; reject it.
        if !text.contains(['.', 'e', 'E', 'p', 'P']) {
            return Err(malformed());
        }
        n.is_float = true;
        n.as_float = value;
        if value == (value as i64) as f64 {
            n.is_int = true;
            n.as_int = value as i64;
        }
        if value >= 0.0 && value == (value as u64) as f64 {
            n.is_uint = true;
            n.as_uint = value as u64;
        }
    }

    if !n.is_int && !n.is_uint && !n.is_float {
        return Err(malformed());
    }
    Ok(n)
}

fn simplify_complex(n: &mut NumberNode) {
    if n.as_complex.1 == 0.0 {
        n.is_float = true;
        n.as_float = n.as_complex.0;
        if n.as_float == (n.as_float as i64) as f64 {
            n.is_int = true;
            n.as_int = n.as_float as i64;
        }
        if n.as_float >= 0.0 && n.as_float == (n.as_float as u64) as f64 {
            n.is_uint = true;
            n.as_uint = n.as_float as u64;
        }
    }
}

fn split_radix(digits: &str) -> (u32, &str) {
    if let Some(rest) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        (8, rest)
    } else if let Some(rest) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, rest)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    }
}

fn parse_uint_auto(text: &str) -> Option<u64> {
    let cleaned = text.replace('_', "");
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if digits.starts_with('-') {
        return None;
    }
    let (radix, digits) = split_radix(digits);
    u64::from_str_radix(digits, radix).ok()
}

fn parse_int_auto(text: &str) -> Option<i64> {
    let cleaned = text.replace('_', "");
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let (radix, digits) = split_radix(digits);
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
