//! Export command - convert a Helm chart into an Ansible role.

use console::style;
use helmible_export::{ExportOptions, ExportReport, Exporter, WarningSeverity};
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use std::path::Path;

#[allow(clippy::fn_params_excessive_bools)]
pub fn run(
    role_name: Option<&str>,
    helm_chart: Option<&Path>,
    workspace: &Path,
    generate_filters: bool,
    emit_keys_snake_case: bool,
    verbose: bool,
) -> Result<()> {
    let role_name = match role_name {
        Some(name) if !name.is_empty() => name,
        _ => return Err(miette!("please specify role name")),
    };
    let helm_chart = helm_chart.ok_or_else(|| miette!("please specify helm chart path"))?;
    if helm_chart.to_string_lossy().contains(char::is_whitespace) {
        return Err(miette!("helm chart path must not contain spaces"));
    }
    if !helm_chart.exists() {
        return Err(miette!("helm chart path doesn't exists"));
    }

    print_header(role_name, helm_chart, workspace);

    let options = ExportOptions {
        chart_path: helm_chart.to_path_buf(),
        workspace: workspace.to_path_buf(),
        role_name: role_name.to_string(),
        generate_filters,
        snake_case_keys: emit_keys_snake_case,
    };
    let report = Exporter::new(options)
        .run()
        .into_diagnostic()
        .wrap_err("export failed")?;

    print_files(&report);
    print_warnings(&report, verbose);
    print_summary(&report);

    Ok(())
}

fn print_header(role_name: &str, chart: &Path, workspace: &Path) {
    println!();
    println!(
        "  {} {} {}",
        style("Helmible Export").bold().cyan(),
        style("─").dim(),
        style("Helm chart → Ansible role").dim()
    );
    println!();
    println!(
        "  {} {}",
        style("Chart:").dim(),
        style(chart.display()).cyan()
    );
    println!(
        "  {} {}",
        style("Role:").dim(),
        style(workspace.join(role_name).display()).green()
    );
    println!();
}

fn print_files(report: &ExportReport) {
    println!("  {}", style("Converted Templates").bold());
    println!("  {}", style("───────────────────").dim());
    for file in &report.converted {
        let rel = file.strip_prefix(&report.role_dir).unwrap_or(file);
        println!("  {} {}", style("✓").green().bold(), rel.display());
    }

    if !report.skipped.is_empty() {
        println!();
        println!("  {}", style("Skipped Files").bold().yellow());
        println!("  {}", style("─────────────").dim());
        for file in &report.skipped {
            let rel = file.strip_prefix(&report.role_dir).unwrap_or(file);
            println!("  {} {}", style("○").yellow(), rel.display());
        }
    }
    println!();
}

fn print_warnings(report: &ExportReport, verbose: bool) {
    let significant: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| verbose || w.severity != WarningSeverity::Info)
        .collect();

    if significant.is_empty() {
        let info_count = report.warnings.len();
        if info_count > 0 {
            println!(
                "  {} {} {} {}",
                style("ℹ").cyan(),
                info_count,
                style("conversions applied").dim(),
                style("(use --verbose to see details)").dim()
            );
            println!();
        }
        return;
    }

    println!("  {}", style("Conversion Notes").bold());
    println!("  {}", style("────────────────").dim());
    for warning in significant {
        let icon = match warning.severity {
            WarningSeverity::Info => style("ℹ").cyan(),
            WarningSeverity::Warning => style("⚠").yellow(),
            WarningSeverity::Error => style("✗").red().bold(),
        };
        let rel = warning
            .file
            .strip_prefix(&report.role_dir)
            .unwrap_or(&warning.file);
        println!(
            "    {} {} {}",
            icon,
            style(&warning.pattern).bold(),
            style(format!("in {}", rel.display())).dim()
        );
        println!("      {}", style(&warning.message).dim());
    }
    println!();
}

fn print_summary(report: &ExportReport) {
    let warning_count = report
        .warnings
        .iter()
        .filter(|w| w.severity == WarningSeverity::Warning)
        .count();
    let error_count = report
        .warnings
        .iter()
        .filter(|w| w.severity == WarningSeverity::Error)
        .count();

    println!("  {}", style("Summary").bold());
    println!("  {}", style("───────").dim());
    println!(
        "  {} {} converted to Jinja2",
        style(format!("{:>3}", report.converted.len())).green().bold(),
        style("templates").dim()
    );
    if !report.skipped.is_empty() {
        println!(
            "  {} {} skipped",
            style(format!("{:>3}", report.skipped.len())).yellow().bold(),
            style("files").dim()
        );
    }
    if warning_count > 0 {
        println!(
            "  {} {} {}",
            style(format!("{:>3}", warning_count)).yellow().bold(),
            style("warnings").dim(),
            style("(review recommended)").dim()
        );
    }
    if error_count > 0 {
        println!(
            "  {} {}",
            style(format!("{:>3}", error_count)).red().bold(),
            style("conversion errors").dim()
        );
    }
    println!();
}
