//! Generation of the role's `tasks/main.yml`.
//!
//! The generated task list renders every exported template. Its own
//! template is written with `{{{`/`}}}` delimiters so that literal Ansible
//! `{{ }}` expressions can appear in the output without colliding with the
//! generator; the same lexer and parser handle both, only configured
//! differently.

use crate::error::Result;
use helmible_template::ast::{Arg, ListNode, Node, Tree};
use helmible_template::parse_with_delims;

const TASKS_LEFT_DELIM: &str = "{{{";
const TASKS_RIGHT_DELIM: &str = "}}}";

const TASKS_TEMPLATE: &str = r#"---
# Renders the templates exported from the Helm chart. Override
# helmible_manifest_dir to control where the rendered manifests land.
{{{ range . }}}
- name: Render {{{ . }}}
  ansible.builtin.template:
    src: "{{{ . }}}"
    dest: "{{ helmible_manifest_dir | default('/tmp') }}/{{{ . }}}"
{{{ end }}}
"#;

/// Renders the tasks file for the given template file names.
pub fn render_tasks(template_files: &[String]) -> Result<String> {
    let tree = parse_with_delims(
        "tasks/main.yml",
        TASKS_TEMPLATE,
        TASKS_LEFT_DELIM,
        TASKS_RIGHT_DELIM,
    )?;
    Ok(execute(&tree, template_files))
}

/// A minimal evaluator for the generator template: text, `range` over the
/// file list, and dot interpolation are all it needs.
fn execute(tree: &Tree, files: &[String]) -> String {
    let mut out = String::new();
    execute_list(&tree.root, files, None, &mut out);
    out
}

fn execute_list(list: &ListNode, files: &[String], dot: Option<&str>, out: &mut String) {
    for node in &list.nodes {
        match node {
            Node::Text(text) => out.push_str(&text.text),
            Node::Action(action) => {
                let is_dot = action
                    .pipe
                    .cmds
                    .first()
                    .and_then(|c| c.args.first())
                    .is_some_and(|a| matches!(a, Arg::Dot { .. }));
                if is_dot {
                    if let Some(value) = dot {
                        out.push_str(value);
                    }
                }
            }
            Node::Range(range) => {
                for file in files {
                    execute_list(&range.body, files, Some(file), out);
                }
            }
            // The generator template uses no other constructs.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_task_per_template() {
        let files = vec!["deployment.yaml.j2".to_string(), "service.yaml.j2".to_string()];
        let tasks = render_tasks(&files).unwrap();
        assert!(tasks.starts_with("---\n"));
        assert!(tasks.contains("- name: Render deployment.yaml.j2"));
        assert!(tasks.contains("src: \"service.yaml.j2\""));
        assert_eq!(tasks.matches("ansible.builtin.template:").count(), 2);
    }

    #[test]
    fn ansible_expressions_survive_generation() {
        let files = vec!["cm.yaml.j2".to_string()];
        let tasks = render_tasks(&files).unwrap();
        // The inner {{ }} is Ansible's, not the generator's.
        assert!(tasks.contains("{{ helmible_manifest_dir | default('/tmp') }}/cm.yaml.j2"));
    }

    #[test]
    fn no_templates_renders_an_empty_task_list() {
        let tasks = render_tasks(&[]).unwrap();
        assert!(tasks.starts_with("---\n"));
        assert!(!tasks.contains("- name:"));
    }
}
