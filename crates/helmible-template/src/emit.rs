//! AST-directed Jinja2 emitter.
//!
//! The Go-template dialect reuses one command shape for concepts Jinja2
//! keeps apart, so serialization cannot be a plain pretty-print. Three
//! rewrites happen on the way out:
//!
//! 1. *Boolean composition*: prefix `and X Y` becomes infix `X and Y`. The
//!    swap is a display-order projection; the AST itself is never touched,
//!    so emitting the same tree twice gives the same output.
//! 2. *If-ambiguity*: `if .Values.x` means "is true" when the values
//!    document binds `x` to a boolean, and "is defined" otherwise. The
//!    inspector decides; lookup failures fall back to `is defined`.
//! 3. *Direct calls*: `fn a b` becomes `a | fn(b)` because Jinja2 filters
//!    are applied by piping, and `fn(a, b)` when the call is already a pipe
//!    stage.
//!
//! The walk is parameterised by a small context pushed by value into child
//! calls; a child never writes to a parent's context. The emitter itself
//! never fails; translation problems are recorded as warnings and the
//! output is a best effort.

use crate::ast::*;
use helmible_core::Inspector;
use indexmap::IndexSet;
use regex::Regex;

/// Severity of an emitter observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnLevel {
    /// A conversion was applied automatically; review optional.
    Info,
    /// Output needs manual attention.
    Warning,
}

/// A structured note produced while emitting, surfaced by the driver.
#[derive(Debug, Clone)]
pub struct EmitWarning {
    pub level: WarnLevel,
    /// Byte position in the source template.
    pub pos: usize,
    /// The construct that triggered the note.
    pub pattern: String,
    pub message: String,
}

/// Emission context threaded through the AST walk.
#[derive(Debug, Clone, Copy, Default)]
struct J2Context {
    /// Inside an `if` pipeline.
    is_conditional: bool,
    /// Inside a functional pipeline stage; commands render as calls.
    is_func: bool,
    /// Stage index within the enclosing pipeline; 0 is the head command.
    pipe_depth: usize,
}

/// Walks a [`Tree`] and produces Jinja2 text.
pub struct Emitter<'a> {
    inspector: Inspector<'a>,
    warnings: Vec<EmitWarning>,
}

impl<'a> Emitter<'a> {
    pub fn new(inspector: Inspector<'a>) -> Self {
        Self {
            inspector,
            warnings: Vec::new(),
        }
    }

    /// Serializes the tree. Infallible: problems become warnings.
    pub fn emit(&mut self, tree: &Tree) -> String {
        let mut out = String::new();
        self.emit_list(&tree.root, J2Context::default(), &mut out);
        out
    }

    pub fn warnings(&self) -> &[EmitWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<EmitWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn warn(&mut self, level: WarnLevel, pos: usize, pattern: &str, message: String) {
        self.warnings.push(EmitWarning {
            level,
            pos,
            pattern: pattern.to_string(),
            message,
        });
    }

    fn emit_list(&mut self, list: &ListNode, ctx: J2Context, out: &mut String) {
        for node in &list.nodes {
            self.emit_node(node, ctx, out);
        }
    }

    fn emit_node(&mut self, node: &Node, ctx: J2Context, out: &mut String) {
        match node {
            Node::Text(text) => out.push_str(&text.text),
            Node::Action(action) => {
                out.push_str("{{ ");
                self.emit_pipe(&action.pipe, ctx, out);
                out.push_str(" }}");
            }
            Node::If(node) => self.emit_if(node, out),
            Node::Range(node) => self.emit_range(node, out),
            Node::With(node) => self.emit_with(node, out),
            Node::Template(node) => self.emit_template(node, ctx, out),
        }
    }

    fn emit_if(&mut self, node: &IfNode, out: &mut String) {
        out.push_str("{% if ");
        let ctx = J2Context {
            is_conditional: true,
            ..J2Context::default()
        };
        self.emit_pipe(&node.pipe, ctx, out);
        out.push_str(" %}");
        self.emit_list(&node.then_list, J2Context::default(), out);
        if let Some(else_list) = &node.else_list {
            out.push_str("{% else %}");
            self.emit_list(else_list, J2Context::default(), out);
        }
        out.push_str("{% endif %}");
    }

    /// `with` has no Jinja2 counterpart under Ansible; the block passes
    /// through unchanged apart from the delimiters, and the user is told.
    fn emit_with(&mut self, node: &WithNode, out: &mut String) {
        self.warn(
            WarnLevel::Warning,
            node.pos,
            "with",
            "\"with\" block emitted as-is; manual conversion required".to_string(),
        );
        out.push_str("{% with ");
        self.emit_pipe(&node.pipe, J2Context::default(), out);
        out.push_str(" %}");
        self.emit_list(&node.body, J2Context::default(), out);
        if let Some(else_list) = &node.else_list {
            out.push_str("{% else %}");
            self.emit_list(else_list, J2Context::default(), out);
        }
        out.push_str("{% endwith %}");
    }

    fn emit_template(&mut self, node: &TemplateNode, ctx: J2Context, out: &mut String) {
        out.push_str("{{ template ");
        out.push('"');
        out.push_str(&node.name);
        out.push('"');
        if let Some(pipe) = &node.pipe {
            out.push(' ');
            self.emit_pipe(pipe, ctx, out);
        }
        out.push_str(" }}");
    }

    fn emit_pipe(&mut self, pipe: &PipeNode, ctx: J2Context, out: &mut String) {
        if !pipe.decls.is_empty() {
            for (i, decl) in pipe.decls.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&decl.to_string());
            }
            out.push_str(" := ");
        }
        for (i, cmd) in pipe.cmds.iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            // Conditional-ness persists across stages; everything else is
            // derived per stage.
            let stage = J2Context {
                is_conditional: ctx.is_conditional,
                is_func: !ctx.is_conditional,
                pipe_depth: i,
            };
            self.emit_command(cmd, stage, out);
        }
    }

    /// Pipeline body for a `for`-header: declarations join with `in`
    /// instead of `:=`, and commands render plainly.
    fn emit_for_header(&mut self, pipe: &PipeNode, strip_sigil: bool, out: &mut String) {
        if !pipe.decls.is_empty() {
            for (i, decl) in pipe.decls.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if strip_sigil {
                    out.push_str(&decl.display_without_sigil());
                } else {
                    out.push_str(&decl.to_string());
                }
            }
            out.push_str(" in ");
        }
        for (i, cmd) in pipe.cmds.iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            self.emit_command(cmd, J2Context::default(), out);
        }
    }

    fn emit_command(&mut self, cmd: &CommandNode, ctx: J2Context, out: &mut String) {
        let (args, reordered) = display_order(&cmd.args);
        if reordered {
            self.warn(
                WarnLevel::Info,
                cmd.pos,
                "boolean composition",
                format!("reordered prefix boolean operator to infix: {cmd}"),
            );
        }

        // Direct function invocation must become a pipe: Jinja2 applies
        // filters by piping, not by juxtaposition.
        if ctx.pipe_depth == 0 && ctx.is_func {
            if let Some(Arg::Identifier { name, .. }) = args.first() {
                if args.len() >= 2 {
                    out.push_str(&args[1].to_string());
                    out.push_str(" | ");
                    out.push_str(name);
                    if args.len() > 2 {
                        out.push('(');
                        for (i, arg) in args[2..].iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            out.push_str(&arg.to_string());
                        }
                        out.push(')');
                    }
                } else {
                    out.push_str("'' | ");
                    out.push_str(name);
                }
                self.warn(
                    WarnLevel::Info,
                    cmd.pos,
                    "direct call",
                    format!("converted direct function invocation to a pipe: {cmd}"),
                );
                return;
            }
        }

        // A stage of a functional pipeline renders as a filter call:
        // `fn(a1, ..., an)` rather than juxtaposed arguments.
        if ctx.is_func {
            out.push_str(&args[0].to_string());
            if args.len() > 1 {
                out.push('(');
                for (i, arg) in args[1..].iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&arg.to_string());
                }
                out.push(')');
            }
            return;
        }

        // Conditional (or plain `for`-header) context: juxtaposed output,
        // with `.Values.` arguments disambiguated against the inspector.
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            match arg {
                Arg::Pipe(pipe) => {
                    out.push('(');
                    self.emit_pipe(pipe, ctx, out);
                    out.push(')');
                }
                other => {
                    let textual = other.to_string();
                    if ctx.is_conditional && textual.starts_with(".Values.") {
                        self.emit_values_conditional(other, &textual, out);
                    } else {
                        out.push_str(&textual);
                    }
                }
            }
        }
    }

    /// If-ambiguity resolution: boolean-typed values keep the bare
    /// identifier, everything else (including failed lookups) becomes a
    /// definedness check.
    fn emit_values_conditional(&mut self, arg: &Arg, textual: &str, out: &mut String) {
        let unqualified = textual.replace(".Values.", "");
        match self.inspector.is_bool_path(&unqualified) {
            Ok(true) => out.push_str(&unqualified),
            Ok(false) => {
                out.push_str(&unqualified);
                out.push_str(" is defined");
            }
            Err(err) => {
                self.warn(
                    WarnLevel::Warning,
                    arg.pos(),
                    textual,
                    format!(
                        "{textual} was not found in the chart's values: {err}; defaulting to a definedness check"
                    ),
                );
                out.push_str(&unqualified);
                out.push_str(" is defined");
            }
        }
    }

    fn emit_range(&mut self, node: &RangeNode, out: &mut String) {
        out.push_str("{% for ");
        let mut body = String::new();
        match node.use_case {
            RangeUseCase::NoVariables => {
                let source = node.pipe.cmds[0].args[0].to_string();
                let leaf = source.rsplit('.').next().unwrap_or(&source);
                let item = format!("item_{leaf}");
                out.push_str(&item);
                out.push_str(" in ");
                self.emit_for_header(&node.pipe, false, out);
                out.push_str(" %}");

                self.emit_list(&node.body, J2Context::default(), &mut body);
                let mut members = match self.inspector.enumerate(&values_path(&source)) {
                    Ok(members) => members,
                    Err(err) => {
                        self.warn(
                            WarnLevel::Warning,
                            node.pos,
                            &source,
                            format!(
                                "{source} was not found in the chart's values: {err}; only bare dot references get the loop variable"
                            ),
                        );
                        IndexSet::new()
                    }
                };
                members.insert(".".to_string());
                body = prefix_iterator_refs(&body, &item, &members);
            }
            RangeUseCase::KeyValue | RangeUseCase::SingleValue => {
                self.emit_for_header(&node.pipe, true, out);
                out.push_str(" %}");
                self.emit_list(&node.body, J2Context::default(), &mut body);
                body = strip_dollar_sigils(&body);
            }
            RangeUseCase::Tuple | RangeUseCase::Default => {
                self.emit_for_header(&node.pipe, false, out);
                out.push_str(" %}");
                self.emit_list(&node.body, J2Context::default(), &mut body);
            }
        }
        out.push_str(&body);
        if let Some(else_list) = &node.else_list {
            out.push_str("{% else %}");
            self.emit_list(else_list, J2Context::default(), out);
        }
        out.push_str("{% endfor %}");
    }
}

/// Arguments in display order: prefix `and`/`or`/`eq` with three or more
/// arguments swap their first two. Purely a projection: callers hold
/// borrowed arguments and the AST stays untouched.
fn display_order(args: &[Arg]) -> (Vec<&Arg>, bool) {
    let mut ordered: Vec<&Arg> = args.iter().collect();
    let swap = args.len() > 2
        && matches!(
            args.first(),
            Some(Arg::Identifier { name, .. }) if matches!(name.as_str(), "and" | "or" | "eq")
        );
    if swap {
        ordered.swap(0, 1);
    }
    (ordered, swap)
}

/// Strips the values prefix from a dotted source reference so it can be
/// looked up in the values document.
fn values_path(source: &str) -> String {
    source
        .strip_prefix(".Values.")
        .unwrap_or_else(|| source.trim_start_matches('.'))
        .to_string()
}

/// Iterator prefixing for `range` bodies without loop variables: member
/// references like ` .name ` become ` item_x.name `, and a whitespace-bound
/// bare dot becomes the loop variable itself. Lines invoking sub-templates
/// are left alone so their arguments are not corrupted.
fn prefix_iterator_refs(body: &str, item: &str, members: &IndexSet<String>) -> String {
    let bare_dot = Regex::new(r"\s\.\s").expect("valid regex");
    let mut lines: Vec<String> = body.split('\n').map(str::to_string).collect();
    for line in &mut lines {
        for member in members {
            if member == "." {
                if line.contains("template") || line.contains("include") {
                    continue;
                }
                if bare_dot.is_match(line) {
                    *line = bare_dot
                        .replace_all(line, format!(" {item} "))
                        .into_owned();
                }
            } else {
                let pattern = format!(r"\s\.{}\s", regex::escape(member));
                if let Ok(re) = Regex::new(&pattern) {
                    if re.is_match(line) {
                        *line = re
                            .replace_all(line, format!(" {item}.{member} "))
                            .into_owned();
                    }
                }
            }
        }
    }
    lines.join("\n")
}

/// Removes the `$` sigil from variable references in a serialized body.
fn strip_dollar_sigils(body: &str) -> String {
    let re = Regex::new(r"\$\b").expect("valid regex");
    re.replace_all(body, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_yaml::Value;

    fn values() -> Value {
        serde_yaml::from_str(
            r#"
metrics:
  enabled: true
image:
  pullPolicy: IfNotPresent
a: true
b: false
ingress:
  secrets:
    - name: secret-1
      certificate: cert
  hosts:
    - a.example.com
annotations:
  helm.sh/hook: test
someVar: data
x: value
"#,
        )
        .unwrap()
    }

    fn transpile(input: &str) -> String {
        let values = values();
        let tree = parse("test", input).unwrap();
        let mut emitter = Emitter::new(Inspector::new(&values));
        emitter.emit(&tree)
    }

    fn transpile_with_warnings(input: &str) -> (String, Vec<EmitWarning>) {
        let values = values();
        let tree = parse("test", input).unwrap();
        let mut emitter = Emitter::new(Inspector::new(&values));
        let out = emitter.emit(&tree);
        (out, emitter.take_warnings())
    }

    // -- if-conditionals ----------------------------------------------------

    #[test]
    fn bool_conditional_stays_bare() {
        assert_eq!(
            transpile("{{ if .Values.metrics.enabled }}A{{ end }}"),
            "{% if metrics.enabled %}A{% endif %}"
        );
    }

    #[test]
    fn non_bool_conditional_gets_is_defined() {
        assert_eq!(
            transpile("{{ if .Values.image.pullPolicy }}B{{ end }}"),
            "{% if image.pullPolicy is defined %}B{% endif %}"
        );
    }

    #[test]
    fn missing_value_falls_back_to_is_defined_with_warning() {
        let (out, warnings) = transpile_with_warnings("{{ if .Values.nope }}C{{ end }}");
        assert_eq!(out, "{% if nope is defined %}C{% endif %}");
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Warning));
    }

    #[test]
    fn boolean_composition_becomes_infix() {
        assert_eq!(
            transpile("{{ if and .Values.a .Values.b }}C{{ end }}"),
            "{% if a and b %}C{% endif %}"
        );
    }

    #[test]
    fn eq_keeps_extra_arguments_in_place() {
        assert_eq!(
            transpile("{{ if eq .Values.a .Values.b .Values.a }}x{{ end }}"),
            "{% if a eq b a %}x{% endif %}"
        );
    }

    #[test]
    fn two_argument_operator_is_not_reordered() {
        // Reordering needs three or more arguments.
        assert_eq!(transpile("{{ if and .Values.a }}x{{ end }}"), "{% if and a %}x{% endif %}");
    }

    #[test]
    fn nested_parenthesised_conditional() {
        assert_eq!(
            transpile("{{ if and (eq .Values.a .Values.b) .Values.b }}x{{ end }}"),
            "{% if (a eq b) and b %}x{% endif %}"
        );
    }

    #[test]
    fn if_else_branches() {
        assert_eq!(
            transpile("{{ if .Values.a }}x{{ else }}y{{ end }}"),
            "{% if a %}x{% else %}y{% endif %}"
        );
    }

    #[test]
    fn else_if_chain() {
        assert_eq!(
            transpile("{{ if .Values.a }}x{{ else if .Values.b }}y{{ end }}"),
            "{% if a %}x{% else %}{% if b %}y{% endif %}{% endif %}"
        );
    }

    // -- direct calls -------------------------------------------------------

    #[test]
    fn direct_call_becomes_pipe() {
        assert_eq!(transpile("{{ toYaml .Values.someVar }}"), "{{ .Values.someVar | toYaml }}");
    }

    #[test]
    fn direct_call_arguments_become_filter_arguments() {
        assert_eq!(
            transpile("{{ toYaml .Values.x \"sep\" }}"),
            "{{ .Values.x | toYaml(\"sep\") }}"
        );
    }

    #[test]
    fn bare_call_pipes_the_empty_string() {
        assert_eq!(transpile("{{ now }}"), "{{ '' | now }}");
    }

    #[test]
    fn pipe_stage_renders_as_filter_call() {
        assert_eq!(
            transpile("{{ .Values.text | indent 4 }}"),
            "{{ .Values.text | indent(4) }}"
        );
    }

    #[test]
    fn chained_filters() {
        assert_eq!(
            transpile("{{ .Values.x | toYaml | nindent 4 }}"),
            "{{ .Values.x | toYaml | nindent(4) }}"
        );
    }

    // -- range --------------------------------------------------------------

    #[test]
    fn range_no_variables_prefixes_members() {
        assert_eq!(
            transpile("{{ range .Values.ingress.secrets }}{{ .name }}{{ end }}"),
            "{% for item_secrets in .Values.ingress.secrets %}{{ item_secrets.name }}{% endfor %}"
        );
    }

    #[test]
    fn range_no_variables_rewrites_bare_dot() {
        assert_eq!(
            transpile("{{ range .Values.ingress.hosts }}{{ . }}{{ end }}"),
            "{% for item_hosts in .Values.ingress.hosts %}{{ item_hosts }}{% endfor %}"
        );
    }

    #[test]
    fn range_body_template_lines_are_not_rewritten() {
        let out = transpile(
            "{{ range .Values.ingress.hosts }}{{ template \"host\" . }}\n{{ . }}{{ end }}",
        );
        assert!(out.contains("{{ template \"host\" . }}"));
        assert!(out.contains("{{ item_hosts }}"));
    }

    #[test]
    fn range_key_value_loses_sigils() {
        assert_eq!(
            transpile("{{ range $k, $v := .Values.annotations }}{{ $k }}={{ $v }}{{ end }}"),
            "{% for k, v in .Values.annotations %}{{ k }}={{ v }}{% endfor %}"
        );
    }

    #[test]
    fn range_single_value() {
        assert_eq!(
            transpile("{{ range $host := .Values.ingress.hosts }}{{ $host }}{{ end }}"),
            "{% for host in .Values.ingress.hosts %}{{ host }}{% endfor %}"
        );
    }

    #[test]
    fn range_tuple_passes_through() {
        assert_eq!(
            transpile("{{ range tuple \"a\" \"b\" }}x{{ end }}"),
            "{% for tuple \"a\" \"b\" %}x{% endfor %}"
        );
    }

    #[test]
    fn range_else() {
        assert_eq!(
            transpile("{{ range .Values.ingress.hosts }}{{ . }}{{ else }}none{{ end }}"),
            "{% for item_hosts in .Values.ingress.hosts %}{{ item_hosts }}{% else %}none{% endfor %}"
        );
    }

    // -- with ---------------------------------------------------------------

    #[test]
    fn with_passes_through_and_warns() {
        let (out, warnings) = transpile_with_warnings("{{ with .Values.x }}y{{ end }}");
        assert_eq!(out, "{% with .Values.x %}y{% endwith %}");
        assert!(warnings
            .iter()
            .any(|w| w.pattern == "with" && w.level == WarnLevel::Warning));
    }

    // -- passthrough and idempotence ----------------------------------------

    #[test]
    fn text_and_plain_actions_round_trip() {
        let input = "kind: Pod\nname: {{ .foo.bar }}\n{{ template \"x\" . }}\n";
        assert_eq!(transpile(input), input);
    }

    #[test]
    fn declaration_passes_through() {
        assert_eq!(transpile("{{ $x := .Values.x }}"), "{{ $x := .Values.x }}");
    }

    #[test]
    fn reordering_is_idempotent_across_reparse() {
        let once = transpile("{{ if and .Values.a .Values.b }}C{{ end }}");
        // A second parse-emit round must not swap again: `a` now heads the
        // command, so the projection leaves it alone.
        let values = values();
        let tree = parse("again", &once).unwrap();
        let mut emitter = Emitter::new(Inspector::new(&values));
        let twice = emitter.emit(&tree);
        assert_eq!(once, twice);
    }

    #[test]
    fn emitting_the_same_tree_twice_is_stable() {
        let values = values();
        let tree = parse("test", "{{ if or .Values.a .Values.b }}x{{ end }}").unwrap();
        let mut emitter = Emitter::new(Inspector::new(&values));
        let first = emitter.emit(&tree);
        let second = emitter.emit(&tree);
        assert_eq!(first, second);
        assert_eq!(first, "{% if a or b %}x{% endif %}");
    }
}
