//! Helmible Export - turns a Helm chart into an Ansible role
//!
//! The driver behind `helmible export`: scaffolds the role through
//! `ansible-galaxy`, copies the chart templates, transpiles them to Jinja2
//! with [`helmible_template`], installs the chart values as role defaults,
//! and generates the tasks file that renders everything. Conversion
//! problems that don't poison the whole export surface as structured
//! warnings on the [`ExportReport`].

pub mod error;
pub mod exporter;
pub mod filters;
pub mod galaxy;
pub mod rewrite;
pub mod tasks;

pub use error::{ExportError, ExportWarning, Result, WarningSeverity};
pub use exporter::{ExportOptions, ExportReport, Exporter};
