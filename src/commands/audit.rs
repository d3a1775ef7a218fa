//! The audit/reconcile command
//!
//! Runs Discover → Audit → Plan → AwaitConfirmation → Execute → Verify →
//! Report and writes the final report. Only a missing or unreadable
//! configuration aborts the run; that still leaves a partial report behind.

use anyhow::{Context as _, Result};
use colored::Colorize;
use declarative::{Driver, Gates, ObservabilitySink, RunOptions, RunReport, Stage};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::Context;
use crate::adapters;
use crate::cli::RunArgs;
use crate::config::{self, InfraSpec};
use crate::discover::{self, RepoContext};
use crate::report;
use crate::sink::LogSink;
use crate::ui;

pub fn run(ctx: &Context, args: &RunArgs) -> Result<ExitCode> {
    warn_gates(args);

    let root = env::current_dir().context("Failed to determine current directory")?;
    let sink = LogSink::new(ctx.quiet);
    let report = reconcile(ctx, args, &root, &sink)?;

    if !ctx.quiet {
        print_summary(&report);
    }
    Ok(ExitCode::from(report.exit_status().exit_code()))
}

fn warn_gates(args: &RunArgs) {
    if args.confirm_apply {
        ui::warn(&format!(
            "{} remote changes will be made",
            "--confirm-apply:".yellow().bold()
        ));
        if args.confirm_destructive {
            ui::warn(&format!(
                "{} existing records, migrations and functions may be overwritten or removed",
                "--confirm-destructive:".red().bold()
            ));
        }
    } else if args.confirm_destructive {
        ui::warn("--confirm-destructive has no effect without --confirm-apply");
    }
}

/// Run every stage against the configuration found from `root`
fn reconcile(
    ctx: &Context,
    args: &RunArgs,
    root: &Path,
    sink: &dyn ObservabilitySink,
) -> Result<RunReport> {
    sink.record_stage(Stage::Discover);
    let repo = discover::discover(root);
    if ctx.verbose > 0 {
        show_context(&repo);
    }

    let spec = match load_spec(args, root) {
        Ok(spec) => spec,
        Err(e) => {
            let partial = RunReport {
                stages: vec![Stage::Discover],
                ..RunReport::default()
            };
            let path = args
                .report
                .clone()
                .unwrap_or_else(|| config::expand_path(&config::default_report_path()));
            match report::write_markdown(&path, &partial, Some(&e)) {
                Ok(()) => log::info!("Partial report saved to {}", path.display()),
                Err(write_err) => log::warn!("Could not write partial report: {write_err:#}"),
            }
            return Err(e);
        }
    };

    let timeout = Duration::from_secs(args.timeout.unwrap_or(spec.settings.timeout_secs));
    let adapters = adapters::build(&spec, timeout);
    if adapters.is_empty() {
        ui::warn("No DNS domains or Supabase project configured; nothing to audit");
    }

    let opts = RunOptions {
        audit_only: args.audit_only,
        gates: Gates::new(args.confirm_apply, args.confirm_destructive),
    };
    let mut report = Driver::new(&adapters, sink).run(&opts);
    report.stages.insert(0, Stage::Discover);

    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| spec.expanded_report_path());
    report::write_markdown(&report_path, &report, None)?;
    if !ctx.quiet {
        ui::success(&format!("Report saved to {}", report_path.display()));
    }

    if let Some(json_path) = &args.json {
        report::write_json(json_path, &report)?;
        if !ctx.quiet {
            ui::success(&format!("JSON report saved to {}", json_path.display()));
        }
    }

    Ok(report)
}

fn load_spec(args: &RunArgs, root: &Path) -> Result<InfraSpec> {
    let path: PathBuf = config::resolve_config(args.config.as_deref(), root)?;
    log::info!("Using configuration {}", path.display());
    InfraSpec::load(&path)
}

fn show_context(repo: &RepoContext) {
    ui::kv("Root", &repo.root.display().to_string());
    if repo.is_empty() {
        ui::dim("No infrastructure directories or DNS files found");
        return;
    }
    for (label, paths) in [
        ("Infrastructure dirs", &repo.infra_dirs),
        ("Supabase dirs", &repo.supabase_dirs),
        ("DNS files", &repo.dns_files),
    ] {
        let joined = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        ui::kv(label, if joined.is_empty() { "-" } else { &joined });
    }
}

fn print_summary(report: &RunReport) {
    ui::section("Summary");
    ui::kv("Status", report::status_line(report.exit_status()));
    ui::kv("Issues", &report.audit.issues().to_string());
    if let Some(plan) = &report.plan {
        ui::kv(
            "Planned",
            &format!("{} safe, {} risky", plan.safe_count(), plan.risky_count()),
        );
    }
    if let Some(summary) = report.execution.summary() {
        ui::kv(
            "Executed",
            &format!(
                "{} succeeded, {} failed, {} skipped",
                summary.succeeded, summary.failed, summary.skipped
            ),
        );
    }

    let steps: Vec<&str> = report.audit.manual_steps().collect();
    if !steps.is_empty() {
        ui::section("Pending manual steps");
        for step in steps {
            ui::dim(step);
        }
    }
}
