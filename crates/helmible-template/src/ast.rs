//! Typed AST for the Helm template dialect.
//!
//! One enum variant per node kind, matched exhaustively by the emitter;
//! adding a kind is a compile-time event in every unpatched `match`. Each
//! node carries the byte position of its start in the original input.
//!
//! `Display` implementations render nodes back in Go-template surface form.
//! The emitter relies on these for the textual checks it performs while
//! rewriting (`.Values.` detection, range leaf extraction), so they must
//! stay faithful to the input spelling.

use std::fmt;

/// A parsed template: the source file name and the top-level node list.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub name: String,
    pub root: ListNode,
}

/// An ordered sequence of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ListNode {
    pub pos: usize,
    pub nodes: Vec<Node>,
}

impl ListNode {
    pub fn new(pos: usize) -> Self {
        Self { pos, nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    Action(ActionNode),
    If(IfNode),
    Range(RangeNode),
    With(WithNode),
    Template(TemplateNode),
}

impl Node {
    pub fn pos(&self) -> usize {
        match self {
            Node::Text(n) => n.pos,
            Node::Action(n) => n.pos,
            Node::If(n) => n.pos,
            Node::Range(n) => n.pos,
            Node::With(n) => n.pos,
            Node::Template(n) => n.pos,
        }
    }
}

/// Plain text between actions.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub pos: usize,
    pub text: String,
}

/// A non-control action: `{{ pipeline }}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
    pub pos: usize,
    pub pipe: PipeNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub pos: usize,
    pub pipe: PipeNode,
    pub then_list: ListNode,
    pub else_list: Option<ListNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeNode {
    pub pos: usize,
    pub pipe: PipeNode,
    pub body: ListNode,
    pub else_list: Option<ListNode>,
    /// Derived at parse time; selects the emission strategy.
    pub use_case: RangeUseCase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithNode {
    pub pos: usize,
    pub pipe: PipeNode,
    pub body: ListNode,
    pub else_list: Option<ListNode>,
}

/// A sub-template invocation: `{{ template "name" pipeline }}`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub pos: usize,
    pub name: String,
    pub pipe: Option<PipeNode>,
}

/// Classification of a `range` header by its declaration and argument shape.
///
/// | decls | cmds[0].args  | example                          |
/// |-------|---------------|----------------------------------|
/// | 0     | 1             | `range .Values.ingress.secrets`  |
/// | 2     | 1             | `range $k, $v := .annotations`   |
/// | 1     | 1             | `range $host := .hosts`          |
/// | 0     | n, `tuple`    | `range tuple "a" "b"`            |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeUseCase {
    Default,
    NoVariables,
    KeyValue,
    SingleValue,
    Tuple,
}

impl RangeUseCase {
    pub fn classify(pipe: &PipeNode) -> Self {
        let first_args = pipe.cmds.first().map_or(0, |c| c.args.len());
        let first_is_tuple = pipe
            .cmds
            .first()
            .and_then(|c| c.args.first())
            .is_some_and(|a| matches!(a, Arg::Identifier { name, .. } if name == "tuple"));

        if pipe.decls.is_empty() && pipe.cmds.len() == 1 && first_args == 1 {
            RangeUseCase::NoVariables
        } else if pipe.decls.len() == 2 {
            RangeUseCase::KeyValue
        } else if pipe.decls.len() == 1 && first_args == 1 {
            RangeUseCase::SingleValue
        } else if pipe.decls.is_empty() && pipe.cmds.len() == 1 && first_is_tuple {
            RangeUseCase::Tuple
        } else {
            RangeUseCase::Default
        }
    }
}

/// A pipeline: optional variable declarations and one or more commands
/// joined by `|`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeNode {
    pub pos: usize,
    pub decls: Vec<VariableNode>,
    pub cmds: Vec<CommandNode>,
}

/// A `$`-variable, possibly with chained field accesses. The sigil is part
/// of the first identifier, mirroring the source spelling.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub pos: usize,
    pub idents: Vec<String>,
}

impl VariableNode {
    /// The declaration as written, minus the `$` sigil; used for Jinja2
    /// `for`-headers where the sigil has no meaning.
    pub fn display_without_sigil(&self) -> String {
        let joined = self.idents.join(".");
        joined.strip_prefix('$').unwrap_or(&joined).to_string()
    }
}

/// One command of a pipeline: juxtaposed arguments, the first of which may
/// be a function name.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandNode {
    pub pos: usize,
    pub args: Vec<Arg>,
}

/// Argument leaves and the two composite argument forms (chains and
/// parenthesised pipelines).
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Identifier { pos: usize, name: String },
    /// `.a.b.c`; the leading periods are dropped from each ident.
    Field { pos: usize, idents: Vec<String> },
    Variable(VariableNode),
    Dot { pos: usize },
    Nil { pos: usize },
    Bool { pos: usize, value: bool },
    Number(NumberNode),
    Str { pos: usize, quoted: String, text: String },
    /// A head term followed by field accesses: `(pipe).a.b`, `fn.a`.
    Chain { pos: usize, head: Box<Arg>, fields: Vec<String> },
    /// A parenthesised pipeline.
    Pipe(PipeNode),
}

impl Arg {
    pub fn pos(&self) -> usize {
        match self {
            Arg::Identifier { pos, .. }
            | Arg::Field { pos, .. }
            | Arg::Dot { pos }
            | Arg::Nil { pos }
            | Arg::Bool { pos, .. }
            | Arg::Str { pos, .. }
            | Arg::Chain { pos, .. } => *pos,
            Arg::Variable(v) => v.pos,
            Arg::Number(n) => n.pos,
            Arg::Pipe(p) => p.pos,
        }
    }
}

/// A numeric constant carrying every representation that fits without loss,
/// alongside the original spelling, which is what gets re-emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberNode {
    pub pos: usize,
    pub text: String,
    pub is_int: bool,
    pub is_uint: bool,
    pub is_float: bool,
    pub is_complex: bool,
    pub as_int: i64,
    pub as_uint: u64,
    pub as_float: f64,
    pub as_complex: (f64, f64),
}

// ---------------------------------------------------------------------------
// Source-form rendering
// ---------------------------------------------------------------------------

impl fmt::Display for VariableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ident) in self.idents.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(ident)?;
        }
        Ok(())
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Identifier { name, .. } => f.write_str(name),
            Arg::Field { idents, .. } => {
                for ident in idents {
                    write!(f, ".{ident}")?;
                }
                Ok(())
            }
            Arg::Variable(v) => write!(f, "{v}"),
            Arg::Dot { .. } => f.write_str("."),
            Arg::Nil { .. } => f.write_str("nil"),
            Arg::Bool { value, .. } => f.write_str(if *value { "true" } else { "false" }),
            Arg::Number(n) => f.write_str(&n.text),
            Arg::Str { quoted, .. } => f.write_str(quoted),
            Arg::Chain { head, fields, .. } => {
                write!(f, "{head}")?;
                for field in fields {
                    write!(f, ".{field}")?;
                }
                Ok(())
            }
            Arg::Pipe(p) => write!(f, "({p})"),
        }
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{arg}")?;
        }
        Ok(())
    }
}

impl fmt::Display for PipeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.decls.is_empty() {
            for (i, decl) in self.decls.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{decl}")?;
            }
            f.write_str(" := ")?;
        }
        for (i, cmd) in self.cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{cmd}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Arg {
        Arg::Identifier { pos: 0, name: name.to_string() }
    }

    fn field(path: &[&str]) -> Arg {
        Arg::Field { pos: 0, idents: path.iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn field_renders_with_leading_dots() {
        assert_eq!(field(&["Values", "image", "tag"]).to_string(), ".Values.image.tag");
    }

    #[test]
    fn variable_keeps_sigil() {
        let v = VariableNode { pos: 0, idents: vec!["$host".into(), "name".into()] };
        assert_eq!(v.to_string(), "$host.name");
        assert_eq!(v.display_without_sigil(), "host.name");
    }

    #[test]
    fn command_joins_args_with_spaces() {
        let cmd = CommandNode { pos: 0, args: vec![ident("and"), field(&["Values", "a"]), field(&["Values", "b"])] };
        assert_eq!(cmd.to_string(), "and .Values.a .Values.b");
    }

    #[test]
    fn pipe_renders_decls_and_stages() {
        let pipe = PipeNode {
            pos: 0,
            decls: vec![
                VariableNode { pos: 0, idents: vec!["$k".into()] },
                VariableNode { pos: 0, idents: vec!["$v".into()] },
            ],
            cmds: vec![
                CommandNode { pos: 0, args: vec![field(&["Values", "annotations"])] },
                CommandNode { pos: 0, args: vec![ident("quote")] },
            ],
        };
        assert_eq!(pipe.to_string(), "$k, $v := .Values.annotations | quote");
    }

    #[test]
    fn classify_no_variables() {
        let pipe = PipeNode {
            pos: 0,
            decls: vec![],
            cmds: vec![CommandNode { pos: 0, args: vec![field(&["Values", "ingress", "secrets"])] }],
        };
        assert_eq!(RangeUseCase::classify(&pipe), RangeUseCase::NoVariables);
    }

    #[test]
    fn classify_tuple() {
        let pipe = PipeNode {
            pos: 0,
            decls: vec![],
            cmds: vec![CommandNode {
                pos: 0,
                args: vec![
                    ident("tuple"),
                    Arg::Str { pos: 0, quoted: "\"a\"".into(), text: "a".into() },
                    Arg::Str { pos: 0, quoted: "\"b\"".into(), text: "b".into() },
                ],
            }],
        };
        assert_eq!(RangeUseCase::classify(&pipe), RangeUseCase::Tuple);
    }
}
