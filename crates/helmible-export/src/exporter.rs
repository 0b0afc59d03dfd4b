//! The export driver.
//!
//! Orchestrates one chart-to-role conversion: scaffold the role with
//! ansible-galaxy, copy the chart templates as `.j2` files, install the
//! chart values as role defaults, transpile every template, run the textual
//! rewriters, and generate the tasks file. Chart loading, role
//! initialization and the defaults file are fail-fast; everything
//! per-template is best-effort and lands on the report as warnings.

use crate::error::{ExportError, ExportWarning, Result};
use crate::rewrite;
use crate::{filters, galaxy, tasks};
use helmible_core::{snake_case_renames, HelmChart, Inspector};
use helmible_template::{parse, Emitter, WarnLevel};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const DEFAULTS_BANNER: &str =
    "\n\n# Everything below this line was inserted by the helmible exporter\n\n";
const J2_EXTENSION: &str = "j2";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub chart_path: PathBuf,
    pub workspace: PathBuf,
    pub role_name: String,
    /// Scaffold Sprig filter stubs into `filter_plugins/`.
    pub generate_filters: bool,
    /// Harmonise values keys to snake_case across defaults and templates.
    pub snake_case_keys: bool,
}

/// What the export produced.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub role_dir: PathBuf,
    pub converted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub warnings: Vec<ExportWarning>,
}

impl ExportReport {
    pub fn has_errors(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w.severity == crate::error::WarningSeverity::Error)
    }
}

pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Runs the full export pipeline.
    pub fn run(&self) -> Result<ExportReport> {
        let chart = HelmChart::load(&self.options.chart_path)?;
        galaxy::init_role(&self.options.role_name, &self.options.workspace)?;

        let role_dir = self.options.workspace.join(&self.options.role_name);
        let mut report = ExportReport {
            role_dir: role_dir.clone(),
            ..ExportReport::default()
        };

        self.copy_templates(&chart, &role_dir, &mut report)?;
        self.install_defaults(&chart, &role_dir, &mut report)?;
        self.transpile_templates(&chart, &role_dir, &mut report)?;
        if self.options.snake_case_keys {
            self.apply_snake_case(&chart, &role_dir, &mut report)?;
        }
        self.install_tasks(&role_dir, &mut report)?;
        if self.options.generate_filters {
            self.install_filters(&role_dir, &mut report);
        }
        Ok(report)
    }

    /// Copies the chart's YAML templates into the role, post-fixing each
    /// with a `.j2` extension. Unreadable files are skipped with a warning.
    fn copy_templates(
        &self,
        chart: &HelmChart,
        role_dir: &Path,
        report: &mut ExportReport,
    ) -> Result<()> {
        let templates_dir = role_dir.join("templates");
        fs::create_dir_all(&templates_dir)?;

        for source in chart.template_files()? {
            let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let dest = templates_dir.join(format!("{name}.{J2_EXTENSION}"));
            match fs::read(&source) {
                Ok(contents) => {
                    if let Err(err) = fs::write(&dest, contents) {
                        report.warnings.push(ExportWarning::error(
                            dest.clone(),
                            "copy",
                            format!("write failure, skipping copy: {err}"),
                        ));
                        report.skipped.push(source);
                    }
                }
                Err(err) => {
                    report.warnings.push(ExportWarning::error(
                        source.clone(),
                        "copy",
                        format!("read failure, skipping copy: {err}"),
                    ));
                    report.skipped.push(source);
                }
            }
        }
        Ok(())
    }

    /// Appends the chart values below a banner in `defaults/main.yml`, then
    /// comments out self-referencing lines. Failures here are fatal: a role
    /// without defaults is useless.
    fn install_defaults(
        &self,
        chart: &HelmChart,
        role_dir: &Path,
        report: &mut ExportReport,
    ) -> Result<()> {
        let defaults_dir = role_dir.join("defaults");
        fs::create_dir_all(&defaults_dir)?;
        let defaults_file = defaults_dir.join("main.yml");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&defaults_file)
            .map_err(|source| ExportError::Defaults {
                path: defaults_file.clone(),
                source,
            })?;
        file.write_all(DEFAULTS_BANNER.as_bytes())
            .and_then(|_| file.write_all(chart.raw_values.as_bytes()))
            .map_err(|source| ExportError::Defaults {
                path: defaults_file.clone(),
                source,
            })?;
        drop(file);

        let contents =
            fs::read_to_string(&defaults_file).map_err(|source| ExportError::Defaults {
                path: defaults_file.clone(),
                source,
            })?;
        let (rewritten, flagged) = rewrite::comment_self_references(&contents);
        for line in flagged {
            report.warnings.push(ExportWarning::warning(
                defaults_file.clone(),
                ".Values.",
                format!("self-reference on line {line} requires a manual fix after export"),
            ));
        }
        fs::write(&defaults_file, rewritten).map_err(|source| ExportError::Defaults {
            path: defaults_file,
            source,
        })?;
        Ok(())
    }

    /// Per template: suppress trim markers, parse, emit Jinja2, erase the
    /// `.Values.` prefix, write back. A parse error aborts that file only.
    fn transpile_templates(
        &self,
        chart: &HelmChart,
        role_dir: &Path,
        report: &mut ExportReport,
    ) -> Result<()> {
        let inspector = Inspector::new(&chart.values);
        for path in role_template_files(role_dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    report.warnings.push(ExportWarning::error(
                        path.clone(),
                        "read",
                        format!("skipping conversion, couldn't read file: {err}"),
                    ));
                    report.skipped.push(path);
                    continue;
                }
            };

            let stripped = rewrite::suppress_trim_markers(&contents);
            let tree = match parse(&name, &stripped) {
                Ok(tree) => tree,
                Err(err) => {
                    report.warnings.push(ExportWarning::error(
                        path.clone(),
                        "parse",
                        format!("template could not be parsed: {err}"),
                    ));
                    report.skipped.push(path);
                    continue;
                }
            };

            let mut emitter = Emitter::new(inspector);
            let emitted = emitter.emit(&tree);
            for warning in emitter.take_warnings() {
                let severity_warning = match warning.level {
                    WarnLevel::Info => ExportWarning::info(
                        path.clone(),
                        &warning.pattern,
                        format!("{} (byte {})", warning.message, warning.pos),
                    ),
                    WarnLevel::Warning => ExportWarning::warning(
                        path.clone(),
                        &warning.pattern,
                        format!("{} (byte {})", warning.message, warning.pos),
                    ),
                };
                report.warnings.push(severity_warning);
            }

            let final_text = rewrite::remove_values_references(&emitted);
            match fs::write(&path, final_text) {
                Ok(()) => report.converted.push(path),
                Err(err) => {
                    report.warnings.push(ExportWarning::error(
                        path.clone(),
                        "write",
                        format!("skipping conversion, couldn't write file: {err}"),
                    ));
                    report.skipped.push(path);
                }
            }
        }
        Ok(())
    }

    /// Applies the snake_case key rewrite to the defaults document and
    /// every exported template. Best-effort per file.
    fn apply_snake_case(
        &self,
        chart: &HelmChart,
        role_dir: &Path,
        report: &mut ExportReport,
    ) -> Result<()> {
        let renames = snake_case_renames(&chart.values);
        if renames.is_empty() {
            return Ok(());
        }
        for (key, snake) in &renames {
            report.warnings.push(ExportWarning::info(
                role_dir.join("defaults").join("main.yml"),
                "snake_case",
                format!("{key} -> {snake}"),
            ));
        }

        let defaults_file = role_dir.join("defaults").join("main.yml");
        match fs::read_to_string(&defaults_file) {
            Ok(contents) => {
                let rewritten = rewrite::snake_case_defaults(&contents, &renames);
                if let Err(err) = fs::write(&defaults_file, rewritten) {
                    report.warnings.push(ExportWarning::warning(
                        defaults_file,
                        "snake_case",
                        format!("skipping defaults substitution, couldn't write file: {err}"),
                    ));
                }
            }
            Err(err) => {
                report.warnings.push(ExportWarning::warning(
                    defaults_file,
                    "snake_case",
                    format!("skipping defaults substitution, couldn't read file: {err}"),
                ));
            }
        }

        for path in role_template_files(role_dir)? {
            match fs::read_to_string(&path) {
                Ok(contents) => {
                    let rewritten = rewrite::snake_case_template(&contents, &renames);
                    if let Err(err) = fs::write(&path, rewritten) {
                        report.warnings.push(ExportWarning::warning(
                            path,
                            "snake_case",
                            format!("skipping template substitution, couldn't write file: {err}"),
                        ));
                    }
                }
                Err(err) => {
                    report.warnings.push(ExportWarning::warning(
                        path,
                        "snake_case",
                        format!("skipping template substitution, couldn't read file: {err}"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Generates `tasks/main.yml`, one render task per exported template.
    fn install_tasks(&self, role_dir: &Path, report: &mut ExportReport) -> Result<()> {
        let names: Vec<String> = role_template_files(role_dir)?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        let rendered = tasks::render_tasks(&names)?;

        let tasks_dir = role_dir.join("tasks");
        if let Err(err) = fs::create_dir_all(&tasks_dir) {
            report.warnings.push(ExportWarning::warning(
                tasks_dir,
                "tasks",
                format!("skipping tasks installation: {err}"),
            ));
            return Ok(());
        }
        let tasks_file = tasks_dir.join("main.yml");
        if let Err(err) = fs::write(&tasks_file, rendered) {
            report.warnings.push(ExportWarning::warning(
                tasks_file,
                "tasks",
                format!("skipping tasks installation, couldn't write file: {err}"),
            ));
        }
        Ok(())
    }

    /// Writes the Sprig stub filter plugin into `filter_plugins/`.
    fn install_filters(&self, role_dir: &Path, report: &mut ExportReport) {
        let plugins_dir = role_dir.join("filter_plugins");
        if let Err(err) = fs::create_dir_all(&plugins_dir) {
            report.warnings.push(ExportWarning::warning(
                plugins_dir,
                "filters",
                format!("skipping filter installation: {err}"),
            ));
            return;
        }
        let dest = plugins_dir.join(filters::module_file_name());
        if let Err(err) = fs::write(&dest, filters::generate_module()) {
            report.warnings.push(ExportWarning::warning(
                dest,
                "filters",
                format!("skipping filter installation, couldn't write file: {err}"),
            ));
        }
    }
}

/// The `.j2` files of a role's templates directory, sorted by name.
fn role_template_files(role_dir: &Path) -> Result<Vec<PathBuf>> {
    let templates_dir = role_dir.join("templates");
    let mut files = Vec::new();
    for entry in fs::read_dir(&templates_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_j2 = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == J2_EXTENSION);
        if path.is_file() && is_j2 {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_chart(dir: &Path) {
        fs::create_dir_all(dir.join("templates")).unwrap();
        fs::write(
            dir.join("Chart.yaml"),
            "apiVersion: v2\nname: test-app\nversion: 1.0.0\n",
        )
        .unwrap();
        fs::write(
            dir.join("values.yaml"),
            concat!(
                "replicaCount: 1\n",
                "metrics:\n",
                "  enabled: true\n",
                "image:\n",
                "  pullPolicy: IfNotPresent\n",
                "  tag: \"{{ .Values.appVersion }}\"\n",
            ),
        )
        .unwrap();
        fs::write(
            dir.join("templates/deployment.yaml"),
            concat!(
                "kind: Deployment\n",
                "replicas: {{ .Values.replicaCount }}\n",
                "{{- if .Values.metrics.enabled }}\n",
                "metrics: on\n",
                "{{- end }}\n",
                "policy: {{ .Values.image.pullPolicy }}\n",
            ),
        )
        .unwrap();
    }

    /// Runs every pipeline stage except the external role-init call.
    fn export_without_galaxy(chart_dir: &Path, role_dir: &Path, options: &ExportOptions) -> ExportReport {
        let chart = HelmChart::load(chart_dir).unwrap();
        let exporter = Exporter::new(options.clone());
        let mut report = ExportReport {
            role_dir: role_dir.to_path_buf(),
            ..ExportReport::default()
        };
        exporter.copy_templates(&chart, role_dir, &mut report).unwrap();
        exporter.install_defaults(&chart, role_dir, &mut report).unwrap();
        exporter
            .transpile_templates(&chart, role_dir, &mut report)
            .unwrap();
        if options.snake_case_keys {
            exporter.apply_snake_case(&chart, role_dir, &mut report).unwrap();
        }
        exporter.install_tasks(role_dir, &mut report).unwrap();
        if options.generate_filters {
            exporter.install_filters(role_dir, &mut report);
        }
        report
    }

    fn options(chart_dir: &Path, workspace: &Path) -> ExportOptions {
        ExportOptions {
            chart_path: chart_dir.to_path_buf(),
            workspace: workspace.to_path_buf(),
            role_name: "demo".to_string(),
            generate_filters: false,
            snake_case_keys: false,
        }
    }

    #[test]
    fn exports_templates_as_jinja() {
        let chart_dir = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_chart(chart_dir.path());
        let role_dir = workspace.path().join("demo");

        let report = export_without_galaxy(
            chart_dir.path(),
            &role_dir,
            &options(chart_dir.path(), workspace.path()),
        );

        assert_eq!(report.converted.len(), 1);
        let converted =
            fs::read_to_string(role_dir.join("templates/deployment.yaml.j2")).unwrap();
        assert!(converted.contains("replicas: {{ replicaCount }}"));
        assert!(converted.contains("{% if metrics.enabled %}"));
        assert!(converted.contains("policy: {{ image.pullPolicy }}"));
        assert!(!converted.contains(".Values."));
        assert!(!converted.contains("{{-"));
    }

    #[test]
    fn defaults_carry_banner_and_self_reference_hints() {
        let chart_dir = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_chart(chart_dir.path());
        let role_dir = workspace.path().join("demo");

        let report = export_without_galaxy(
            chart_dir.path(),
            &role_dir,
            &options(chart_dir.path(), workspace.path()),
        );

        let defaults = fs::read_to_string(role_dir.join("defaults/main.yml")).unwrap();
        assert!(defaults.contains("inserted by the helmible exporter"));
        assert!(defaults.contains("# TODO: Replace \".Values.\""));
        assert!(defaults.contains("#   tag: \"{{ .Values.appVersion }}\""));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.pattern == ".Values." && w.message.contains("manual fix")));
    }

    #[test]
    fn snake_case_applies_to_defaults_and_templates() {
        let chart_dir = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_chart(chart_dir.path());
        let role_dir = workspace.path().join("demo");
        let mut opts = options(chart_dir.path(), workspace.path());
        opts.snake_case_keys = true;

        export_without_galaxy(chart_dir.path(), &role_dir, &opts);

        let defaults = fs::read_to_string(role_dir.join("defaults/main.yml")).unwrap();
        assert!(defaults.contains("replica_count: 1"));
        assert!(defaults.contains("pull_policy: IfNotPresent"));

        let converted =
            fs::read_to_string(role_dir.join("templates/deployment.yaml.j2")).unwrap();
        assert!(converted.contains("{{ replica_count }}"));
        assert!(converted.contains("{{ image.pull_policy }}"));
    }

    #[test]
    fn tasks_file_lists_every_template() {
        let chart_dir = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_chart(chart_dir.path());
        fs::write(
            chart_dir.path().join("templates/service.yaml"),
            "kind: Service\n",
        )
        .unwrap();
        let role_dir = workspace.path().join("demo");

        export_without_galaxy(
            chart_dir.path(),
            &role_dir,
            &options(chart_dir.path(), workspace.path()),
        );

        let tasks = fs::read_to_string(role_dir.join("tasks/main.yml")).unwrap();
        assert!(tasks.contains("Render deployment.yaml.j2"));
        assert!(tasks.contains("Render service.yaml.j2"));
    }

    #[test]
    fn filter_stubs_are_installed_on_request() {
        let chart_dir = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_chart(chart_dir.path());
        let role_dir = workspace.path().join("demo");
        let mut opts = options(chart_dir.path(), workspace.path());
        opts.generate_filters = true;

        export_without_galaxy(chart_dir.path(), &role_dir, &opts);

        let module =
            fs::read_to_string(role_dir.join("filter_plugins/sprig_filters.py")).unwrap();
        assert!(module.contains("def sprig_toYaml("));
    }

    #[test]
    fn unparsable_template_is_skipped_with_error() {
        let chart_dir = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_chart(chart_dir.path());
        fs::write(
            chart_dir.path().join("templates/broken.yaml"),
            "{{ if .Values.a }}never closed\n",
        )
        .unwrap();
        let role_dir = workspace.path().join("demo");

        let report = export_without_galaxy(
            chart_dir.path(),
            &role_dir,
            &options(chart_dir.path(), workspace.path()),
        );

        assert!(report.skipped.iter().any(|p| p.ends_with("broken.yaml.j2")));
        assert!(report.has_errors());
        // The good template still converted.
        assert!(report
            .converted
            .iter()
            .any(|p| p.ends_with("deployment.yaml.j2")));
    }
}
