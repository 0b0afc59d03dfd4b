//! Helmible CLI - export Helm charts to Ansible roles

use clap::{ArgAction, Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;

mod commands;
mod exit_codes;

#[derive(Parser)]
#[command(name = "helmible")]
#[command(author = "Helmible Contributors")]
#[command(version)]
#[command(about = "Export Helm charts to Ansible roles", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a Helm chart as an Ansible role
    Export {
        /// Name of the Ansible role to generate
        role_name: Option<String>,

        /// Path to a downloaded Helm chart directory
        #[arg(long = "helm-chart")]
        helm_chart: Option<PathBuf>,

        /// Directory under which the role is created
        #[arg(long, default_value = "workspace")]
        workspace: PathBuf,

        /// Install Ansible filter scaffolding for Sprig functions
        #[arg(long = "generateFilters")]
        generate_filters: bool,

        /// Convert values keys to snake_case across defaults and templates
        #[arg(
            long = "emitKeysSnakeCase",
            default_value_t = true,
            action = ArgAction::Set,
            num_args = 0..=1,
            default_missing_value = "true"
        )]
        emit_keys_snake_case: bool,

        /// Show every conversion note, info-level included
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    miette::set_panic_hook();

    let cli = Cli::parse();
    match cli.command {
        Commands::Export {
            role_name,
            helm_chart,
            workspace,
            generate_filters,
            emit_keys_snake_case,
            verbose,
        } => commands::export::run(
            role_name.as_deref(),
            helm_chart.as_deref(),
            &workspace,
            generate_filters,
            emit_keys_snake_case,
            verbose,
        ),
    }
}
