//! Helmible Template - Helm template dialect transpiler
//!
//! A lexer, parser and Jinja2 emitter for the Go-style `{{ … }}`
//! mini-language used by Helm charts. Parsing produces a typed [`Tree`]
//! with distinct node kinds for `if`, `range`, `with`, actions, pipelines
//! and literals; the [`Emitter`] walks it and reconstructs an equivalent
//! `{% … %}` / `{{ … }}` Jinja2 program, consulting a values
//! [`Inspector`](helmible_core::Inspector) to resolve the conditionals the
//! two dialects disagree about.
//!
//! ```
//! use helmible_core::Inspector;
//! use helmible_template::{parse, Emitter};
//!
//! let values = serde_yaml::from_str("metrics:\n  enabled: true\n").unwrap();
//! let tree = parse("demo.yaml", "{{ if .Values.metrics.enabled }}on{{ end }}").unwrap();
//! let mut emitter = Emitter::new(Inspector::new(&values));
//! assert_eq!(emitter.emit(&tree), "{% if metrics.enabled %}on{% endif %}");
//! ```

pub mod ast;
pub mod emit;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Node, RangeUseCase, Tree};
pub use emit::{EmitWarning, Emitter, WarnLevel};
pub use lexer::{LexError, Lexer};
pub use parser::{parse, parse_with_delims, ParseError};
pub use token::{Token, TokenKind};
