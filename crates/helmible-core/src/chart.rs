//! Helm chart loading
//!
//! A chart, for export purposes, is a directory with a `Chart.yaml`, a
//! `values.yaml` (or `values.yml`) and a flat `templates/` directory of YAML
//! templates. Subcharts and packaged archives are out of scope.

use serde::Deserialize;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CHART_YAML: &str = "Chart.yaml";
const TEMPLATES_DIR: &str = "templates";
const VALUES_PREFIX: &str = "values";

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {file}: {source}")]
    Yaml {
        file: String,
        source: serde_yaml::Error,
    },

    #[error("not a Helm chart: missing {0}")]
    NotAChart(String),

    #[error("missing required field in Chart.yaml: {0}")]
    MissingField(String),

    #[error("cannot resolve values.yml or values.yaml in {0}")]
    ValuesNotFound(PathBuf),

    #[error("chart has no {0} directory")]
    TemplatesNotFound(PathBuf),
}

/// `Chart.yaml` metadata, limited to the fields the exporter cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default)]
    pub api_version: Option<String>,

    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub app_version: Option<String>,
}

/// A loaded Helm chart: metadata, the raw and parsed values document, and
/// the chart root for locating templates.
#[derive(Debug, Clone)]
pub struct HelmChart {
    pub root: PathBuf,
    pub metadata: ChartMetadata,
    /// Verbatim contents of the values file, preserved for the defaults copy.
    pub raw_values: String,
    /// Parsed values tree consulted by the inspector.
    pub values: Value,
}

impl HelmChart {
    /// Loads a chart from a directory.
    ///
    /// Fails when `Chart.yaml` is absent or unparsable, or when no values
    /// file can be resolved. An empty values file parses to a null document,
    /// which the inspector treats as having no keys.
    pub fn load(root: &Path) -> Result<Self, ChartError> {
        let chart_yaml = root.join(CHART_YAML);
        if !chart_yaml.exists() {
            return Err(ChartError::NotAChart(CHART_YAML.to_string()));
        }

        let metadata_text = fs::read_to_string(&chart_yaml)?;
        let metadata: ChartMetadata =
            serde_yaml::from_str(&metadata_text).map_err(|source| ChartError::Yaml {
                file: CHART_YAML.to_string(),
                source,
            })?;
        if metadata.name.is_empty() {
            return Err(ChartError::MissingField("name".to_string()));
        }

        let values_file = find_values_file(root)?;
        let raw_values = fs::read_to_string(&values_file)?;
        let values: Value = if raw_values.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(&raw_values).map_err(|source| ChartError::Yaml {
                file: values_file.display().to_string(),
                source,
            })?
        };

        Ok(Self {
            root: root.to_path_buf(),
            metadata,
            raw_values,
            values,
        })
    }

    /// The chart's `templates/` directory.
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    /// YAML template files in `templates/`, sorted by file name.
    ///
    /// `_helpers.tpl` and other non-YAML files are skipped; they have no
    /// Ansible counterpart.
    pub fn template_files(&self) -> Result<Vec<PathBuf>, ChartError> {
        let dir = self.templates_dir();
        if !dir.is_dir() {
            return Err(ChartError::TemplatesNotFound(dir));
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && is_yaml_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Whether the file name looks like a YAML document.
pub fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn find_values_file(root: &Path) -> Result<PathBuf, ChartError> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && is_yaml_file(p)
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(VALUES_PREFIX))
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ChartError::ValuesNotFound(root.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_chart(dir: &Path) {
        fs::create_dir_all(dir.join("templates")).unwrap();
        fs::write(
            dir.join("Chart.yaml"),
            "apiVersion: v2\nname: test-app\nversion: 1.0.0\ndescription: A test application\n",
        )
        .unwrap();
        fs::write(
            dir.join("values.yaml"),
            "replicaCount: 1\nimage:\n  repository: nginx\n  tag: latest\n",
        )
        .unwrap();
        fs::write(
            dir.join("templates/deployment.yaml"),
            "kind: Deployment\nreplicas: {{ .Values.replicaCount }}\n",
        )
        .unwrap();
        fs::write(dir.join("templates/_helpers.tpl"), "{{ define \"x\" }}{{ end }}").unwrap();
    }

    #[test]
    fn load_simple_chart() {
        let dir = TempDir::new().unwrap();
        write_chart(dir.path());

        let chart = HelmChart::load(dir.path()).unwrap();
        assert_eq!(chart.metadata.name, "test-app");
        assert_eq!(chart.metadata.version.as_deref(), Some("1.0.0"));
        assert!(chart.raw_values.contains("replicaCount"));
        assert!(chart.values.get("image").is_some());
    }

    #[test]
    fn template_files_skip_helpers() {
        let dir = TempDir::new().unwrap();
        write_chart(dir.path());

        let chart = HelmChart::load(dir.path()).unwrap();
        let files = chart.template_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("deployment.yaml"));
    }

    #[test]
    fn missing_chart_yaml() {
        let dir = TempDir::new().unwrap();
        let err = HelmChart::load(dir.path()).unwrap_err();
        assert!(matches!(err, ChartError::NotAChart(_)));
    }

    #[test]
    fn missing_values_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Chart.yaml"), "name: x\n").unwrap();
        let err = HelmChart::load(dir.path()).unwrap_err();
        assert!(matches!(err, ChartError::ValuesNotFound(_)));
    }

    #[test]
    fn values_yml_spelling_is_accepted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Chart.yaml"), "name: x\n").unwrap();
        fs::write(dir.path().join("values.yml"), "a: 1\n").unwrap();
        let chart = HelmChart::load(dir.path()).unwrap();
        assert!(chart.values.get("a").is_some());
    }
}
