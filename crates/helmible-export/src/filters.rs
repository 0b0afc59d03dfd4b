//! Sprig filter-plugin scaffolding.
//!
//! Helm templates lean on the Sprig function library; Ansible knows none of
//! it. When asked, the exporter drops a Python filter plugin into the role
//! that stubs every known Sprig function, so that rendering fails with a
//! clear NotImplementedError instead of an undefined-filter error, and so
//! users have an obvious place to fill in the implementations they need.

use phf::phf_set;

/// The Sprig function inventory the stub module covers.
pub static SPRIG_FILTERS: phf::Set<&'static str> = phf_set! {
    "abbrev", "add", "add1", "b64dec", "b64enc", "camelcase", "coalesce",
    "compact", "contains", "date", "default", "dict", "dir", "div", "empty",
    "first", "float64", "has", "hasKey", "hasPrefix", "hasSuffix", "indent",
    "initial", "int", "int64", "join", "kebabcase", "keys", "last", "list",
    "lower", "max", "merge", "min", "mod", "mul", "nindent", "now", "pick",
    "pluck", "printf", "quote", "randAlpha", "randAlphaNum", "regexMatch",
    "regexReplaceAll", "repeat", "replace", "rest", "reverse", "sha256sum",
    "shuffle", "snakecase", "sortAlpha", "splitList", "squote", "sub",
    "ternary", "title", "toJson", "toString", "toYaml", "trim", "trimAll",
    "trimPrefix", "trimSuffix", "trunc", "tuple", "uniq", "until",
    "untilStep", "upper", "values",
};

const MODULE_FILE_NAME: &str = "sprig_filters.py";

/// The file name the plugin is written under in `filter_plugins/`.
pub fn module_file_name() -> &'static str {
    MODULE_FILE_NAME
}

/// Generates the stub module source.
pub fn generate_module() -> String {
    let mut names: Vec<&str> = SPRIG_FILTERS.iter().copied().collect();
    names.sort_unstable();

    let mut module = String::from(
        r#"#!/usr/bin/python

"""
Stubs for the Sprig template functions referenced by exported Helm charts.

Every method named "sprig_<name>" is published as the Ansible filter
"<name>"; all of them raise NotImplementedError until an implementation is
supplied. Do not add unrelated methods with the "sprig_" prefix.
"""

import inspect


class FilterModule(object):
    """Exposes the Sprig stubs as Ansible filters."""

    PREFIX = "sprig_"

    def filters(self):
        members = inspect.getmembers(self, predicate=inspect.ismethod)
        return {
            name[len(self.PREFIX):]: func
            for name, func in members
            if name.startswith(self.PREFIX)
        }
"#,
    );

    for name in names {
        module.push_str(&format!(
            "\n    def sprig_{name}(self, *args, **kwargs):\n        raise NotImplementedError(\"Sprig filter '{name}' is not implemented\")\n"
        ));
    }
    module
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_defines_every_filter() {
        let module = generate_module();
        for name in SPRIG_FILTERS.iter() {
            assert!(
                module.contains(&format!("def sprig_{name}(")),
                "missing stub for {name}"
            );
        }
    }

    #[test]
    fn module_has_the_plugin_entry_point() {
        let module = generate_module();
        assert!(module.contains("class FilterModule(object):"));
        assert!(module.contains("def filters(self):"));
    }

    #[test]
    fn known_helm_staples_are_covered() {
        for name in ["toYaml", "quote", "nindent", "b64enc", "default"] {
            assert!(SPRIG_FILTERS.contains(name), "missing {name}");
        }
    }
}
