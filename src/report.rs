//! Final run report
//!
//! The markdown report keeps "could not observe", "risky action skipped" and
//! "action failed" in separate sections; each needs a different operator
//! response.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use declarative::{
    Attributes, DiffEntry, DomainAudit, DomainStatus, ExecuteSummary, ExecutionState, Outcome,
    RunReport, RunStatus, format_attributes,
};
use std::fs;
use std::path::Path;

/// Domain prefixes and the report section each one belongs to
const SECTIONS: &[(&str, &str)] = &[("dns:", "DNS (DigitalOcean)"), ("supabase:", "Supabase")];

/// One line per issue: `+ key (attrs)`, `~ key: old -> new`, `- key [id]`
pub fn issue_line(entry: &DiffEntry) -> String {
    match entry {
        DiffEntry::Add(desired) => {
            if desired.attributes.is_empty() {
                format!("+ {}", desired.key)
            } else {
                format!(
                    "+ {} ({})",
                    desired.key,
                    format_attributes(&desired.attributes)
                )
            }
        }
        DiffEntry::Update { observed, desired } => {
            let mut before = Attributes::new();
            let mut after = Attributes::new();
            for (name, value) in &desired.attributes {
                let current = observed.attribute(name);
                if current != Some(value) {
                    before.insert(
                        name.clone(),
                        current.cloned().unwrap_or(serde_json::Value::Null),
                    );
                    after.insert(name.clone(), value.clone());
                }
            }
            format!(
                "~ {}: {} -> {}",
                observed.key,
                format_attributes(&before),
                format_attributes(&after)
            )
        }
        DiffEntry::Delete(observed) => format!("- {} [{}]", observed.key, observed.remote_id),
        DiffEntry::Unchanged(observed) => format!("= {}", observed.key),
    }
}

/// Describe the run status in one phrase
pub fn status_line(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Clean => "clean",
        RunStatus::ActionFailures => "one or more actions failed",
        RunStatus::Unobservable => "one or more domains could not be observed",
    }
}

fn execution_line(execution: &ExecutionState) -> String {
    match execution {
        ExecutionState::NotRequested => "not requested".to_string(),
        ExecutionState::AuditOnly => "audit only; no plan built".to_string(),
        ExecutionState::NothingToDo => "nothing to do".to_string(),
        ExecutionState::Skipped { reason } => format!("skipped ({reason})"),
        ExecutionState::Executed { summary, .. } => format!(
            "executed {} ({} succeeded, {} failed), {} skipped",
            summary.executed(),
            summary.succeeded,
            summary.failed,
            summary.skipped
        ),
    }
}

/// Render the markdown report
///
/// `failure` is the structural error that aborted the run, if any; whatever
/// completed before it is still rendered.
pub fn render_markdown(
    report: &RunReport,
    failure: Option<&anyhow::Error>,
    generated_at: DateTime<Local>,
) -> String {
    let mut out = Vec::new();

    out.push("# InfraAuditor - Final Report".to_string());
    out.push(String::new());
    out.push(format!(
        "Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S %Z")
    ));
    out.push(String::new());

    out.push("## Summary".to_string());
    let status = if failure.is_some() {
        "aborted"
    } else {
        status_line(report.exit_status())
    };
    out.push(format!("- Status: {status}"));
    out.push(format!(
        "- Stages: {}",
        report
            .stages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" → ")
    ));
    out.push(format!("- Domains Audited: {}", report.audit.domains.len()));
    out.push(format!(
        "- Issues Found: {} ({} risky)",
        report.audit.issues(),
        report.audit.risky_issues()
    ));
    if let Some(plan) = &report.plan {
        out.push(format!(
            "- Actions Planned: {} ({} safe, {} risky)",
            plan.len(),
            plan.safe_count(),
            plan.risky_count()
        ));
    }
    out.push(format!("- Execution: {}", execution_line(&report.execution)));
    out.push(String::new());

    let mut rendered = vec![false; report.audit.domains.len()];
    for (prefix, title) in SECTIONS {
        let domains: Vec<(usize, &DomainAudit)> = report
            .audit
            .domains
            .iter()
            .enumerate()
            .filter(|(_, d)| d.domain.starts_with(prefix))
            .collect();
        if domains.is_empty() {
            continue;
        }
        out.push(format!("## {title}"));
        for (index, domain) in domains {
            rendered[index] = true;
            render_domain(&mut out, report, domain, prefix);
        }
    }
    let others: Vec<&DomainAudit> = report
        .audit
        .domains
        .iter()
        .zip(&rendered)
        .filter(|(_, done)| !**done)
        .map(|(d, _)| d)
        .collect();
    if !others.is_empty() {
        out.push("## Other".to_string());
        for domain in others {
            render_domain(&mut out, report, domain, "");
        }
    }

    if let Some(verification) = &report.verification {
        out.push("## Verification".to_string());
        out.push(format!("- Verified: {}", verification.verified));
        out.push(format!(
            "- Discrepancies: {}",
            verification.discrepancies.len()
        ));
        for d in &verification.discrepancies {
            out.push(format!("  - {} {}: {}", d.domain, d.key, d.detail));
        }
        out.push(String::new());
    }

    let failed: Vec<_> = report
        .execution
        .records()
        .iter()
        .filter_map(|r| match &r.outcome {
            Outcome::Failed { detail } => Some((r, detail)),
            _ => None,
        })
        .collect();
    if !failed.is_empty() {
        out.push("## Failed Actions".to_string());
        for (record, detail) in failed {
            out.push(format!(
                "- {}: {} - {}",
                record.action.domain, record.action.summary, detail
            ));
        }
        out.push(String::new());
    }

    let skipped: Vec<_> = report.skipped_risky().collect();
    if !skipped.is_empty() {
        out.push("## Skipped Risky Actions".to_string());
        out.push("Re-run with --confirm-apply --confirm-destructive to apply these.".to_string());
        for record in skipped {
            out.push(format!(
                "- {}: {}",
                record.action.domain, record.action.summary
            ));
        }
        out.push(String::new());
    }

    out.push("## Pending Manual Steps".to_string());
    push_list(&mut out, report.audit.manual_steps());
    out.push(String::new());

    out.push("## Unresolved Risks".to_string());
    push_list(&mut out, report.audit.risks());

    if let Some(error) = failure {
        out.push(String::new());
        out.push("## Run Aborted".to_string());
        out.push(format!("- {error:#}"));
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn render_domain(out: &mut Vec<String>, report: &RunReport, domain: &DomainAudit, prefix: &str) {
    let name = domain.domain.strip_prefix(prefix).unwrap_or(&domain.domain);
    out.push(String::new());
    out.push(format!("### {name}"));

    match &domain.status {
        DomainStatus::Observed => {
            let summary = domain.summary();
            out.push("- Status: observed".to_string());
            out.push(format!(
                "- Issues Found: {} ({} add, {} update, {} delete)",
                summary.changes(),
                summary.additions,
                summary.updates,
                summary.deletions
            ));
            for entry in domain.issues() {
                out.push(format!("  - `{}`", issue_line(entry)));
            }
        }
        DomainStatus::Unobservable { class, error } => {
            out.push(format!("- Status: could not be observed ({class})"));
            out.push(format!("- Error: {error}"));
        }
    }

    if let Some(plan) = &report.plan {
        let (safe, risky) = plan
            .for_domain(&domain.domain)
            .fold((0, 0), |(safe, risky), a| {
                if a.risk().is_risky() {
                    (safe, risky + 1)
                } else {
                    (safe + 1, risky)
                }
            });
        out.push(format!("- Actions Planned: {safe} safe, {risky} risky"));
    }

    if let ExecutionState::Executed { records, .. } = &report.execution {
        let mut summary = ExecuteSummary::default();
        for record in records.iter().filter(|r| r.action.domain == domain.domain) {
            summary.add(&record.outcome);
        }
        out.push(format!("- Actions Executed: {}", summary.executed()));
        out.push(format!("- Success: {}", summary.succeeded));
        out.push(format!("- Failed: {}", summary.failed));
        out.push(format!("- Skipped: {}", summary.skipped));
    }
    out.push(String::new());
}

fn push_list<'a>(out: &mut Vec<String>, items: impl Iterator<Item = &'a str>) {
    let before = out.len();
    out.extend(items.map(|item| format!("- {item}")));
    if out.len() == before {
        out.push("- None".to_string());
    }
}

/// Render and write the markdown report, creating parent directories
pub fn write_markdown(path: &Path, report: &RunReport, failure: Option<&anyhow::Error>) -> Result<()> {
    let text = render_markdown(report, failure, Local::now());
    write_file(path, &text)
}

/// Write the full run report as pretty-printed JSON
pub fn write_json(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    write_file(path, &json)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}
