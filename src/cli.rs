use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "infra-auditor")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Audit DNS zones and Supabase projects against a declared spec, and fix the drift",
    long_about = None
)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "\
Examples:
  infra-auditor --audit-only                                   Read-only audit
  infra-auditor                                                Audit and show the fix plan
  infra-auditor --confirm-apply                                Apply safe (additive) fixes
  infra-auditor --confirm-apply --confirm-destructive          Also apply updates and deletes
  infra-auditor --config my_infra_spec.yaml --json report.json")]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Run
// ============================================================================

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Infrastructure spec (.yaml, .yml, .toml or .json); discovered when omitted
    #[arg(long, env = "INFRA_AUDITOR_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Audit only; do not build a fix plan
    #[arg(long, conflicts_with = "confirm_apply")]
    pub audit_only: bool,

    /// Execute the fix plan (default: show it only)
    #[arg(long)]
    pub confirm_apply: bool,

    /// Also execute updates and deletes
    #[arg(long)]
    pub confirm_destructive: bool,

    /// Markdown report path (default: settings.report_path)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Also write the full run report as JSON
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Timeout for each remote call in seconds (default: settings.timeout_secs)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}
