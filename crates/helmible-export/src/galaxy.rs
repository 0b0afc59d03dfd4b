//! Wrapper around the external `ansible-galaxy` tool.

use crate::error::{ExportError, Result};
use std::path::Path;
use std::process::Command;

const GALAXY_COMMAND: &str = "ansible-galaxy";

/// Scaffolds an Ansible role with `ansible-galaxy role init`.
///
/// Combined stdout/stderr is captured and surfaced only on failure. A
/// missing binary on `$PATH` is reported distinctly from a non-zero exit.
pub fn init_role(role_name: &str, workspace: &Path) -> Result<()> {
    let init_path = format!("--init-path={}", workspace.display());
    let output = Command::new(GALAXY_COMMAND)
        .args(["role", "init", &init_path, role_name])
        .output()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ExportError::GalaxyNotFound
            } else {
                ExportError::Io(err)
            }
        })?;

    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(ExportError::GalaxyInit { output: combined });
    }
    Ok(())
}
