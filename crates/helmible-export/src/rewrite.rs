//! Textual rewrite passes applied around the template transpilation.
//!
//! All passes are line-oriented string surgery, deliberately so: they run
//! before or after parsing, on content the parser never needs to see again.

use indexmap::IndexMap;

const VALUES_PREFIX: &str = ".Values.";
const SELF_REFERENCE_HINT: &str =
    "# TODO: Replace \".Values.\" reference with a literal, as Ansible Playbook doesn't allow self-reference";

/// Replaces the whitespace-trim markers `{{-` / `-}}` with plain
/// delimiters. The lexer is destructive of whitespace adjacent to the
/// markers, so trimming is suppressed up front to keep the original
/// spacing in the exported template.
pub fn suppress_trim_markers(content: &str) -> String {
    content.replace("{{-", "{{").replace("-}}", "}}")
}

/// Erases `.Values.` references in a template. Ansible resolves role
/// defaults without a prefix, so `{{ .Values.image.tag }}` becomes
/// `{{ image.tag }}`.
pub fn remove_values_references(content: &str) -> String {
    content.replace(VALUES_PREFIX, "")
}

/// Lines of a defaults document that self-reference through `.Values.`
/// cannot work in Ansible; each gets commented out below a hint header.
/// Returns the rewritten text and the affected line numbers.
pub fn comment_self_references(content: &str) -> (String, Vec<usize>) {
    let mut flagged = Vec::new();
    let lines: Vec<String> = content
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            if line.contains(VALUES_PREFIX) {
                flagged.push(i);
                format!("{SELF_REFERENCE_HINT}\n# {line}")
            } else {
                line.to_string()
            }
        })
        .collect();
    (lines.join("\n"), flagged)
}

/// Applies snake_case renames to a defaults document. Substitution is
/// anchored to `<key>:` so values and prose mentioning the key are left
/// alone.
pub fn snake_case_defaults(content: &str, renames: &IndexMap<String, String>) -> String {
    let mut result = content.to_string();
    for (key, snake) in renames {
        result = result.replace(&format!("{key}:"), &format!("{snake}:"));
    }
    result
}

/// Applies snake_case renames to a template. Templates reference keys in
/// expressions rather than as `key:` pairs, so the substitution is plain.
pub fn snake_case_template(content: &str, renames: &IndexMap<String, String>) -> String {
    let mut result = content.to_string();
    for (key, snake) in renames {
        result = result.replace(key.as_str(), snake.as_str());
    }
    result
}
