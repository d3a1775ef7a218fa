//! Terminal and log output for reconciliation events

use colored::Colorize;
use declarative::{
    AuditError, DiffEntry, DiffKind, ExecutionRecord, FixPlan, ObservabilitySink, Outcome,
    RiskTier, Stage, Verification,
};

use crate::report::issue_line;
use crate::ui;

/// Longest issue line shown on the terminal; the report keeps the full text
const MAX_LINE_CHARS: usize = 160;

/// Sink that prints events for the operator and mirrors them to `log`
///
/// With `quiet`, only warnings and failures reach the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink {
    quiet: bool,
}

impl LogSink {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

/// Colored `[safe]` / `[risky]` tag
fn risk_tag(risk: RiskTier) -> String {
    let tag = format!("[{risk}]");
    if risk.is_risky() {
        tag.yellow().bold().to_string()
    } else {
        tag.green().to_string()
    }
}

/// Plain-text line for one action outcome
pub fn outcome_line(record: &ExecutionRecord) -> String {
    let action = &record.action;
    match &record.outcome {
        Outcome::Succeeded => format!("{}: {}", action.domain, action.summary),
        Outcome::Failed { detail } => {
            format!("{}: {} failed: {detail}", action.domain, action.summary)
        }
        Outcome::Skipped { reason } => {
            format!("{}: {} skipped ({reason})", action.domain, action.summary)
        }
    }
}

impl ObservabilitySink for LogSink {
    fn record_stage(&self, stage: Stage) {
        log::info!("Stage: {stage}");
        if !self.quiet {
            ui::header(stage.title());
        }
    }

    fn record_issue(&self, domain: &str, entry: &DiffEntry) {
        let line = issue_line(entry);
        log::info!("{domain}: {line}");
        if self.quiet {
            return;
        }

        let shown = ui::truncate(&line, MAX_LINE_CHARS);
        let colored = match entry.kind() {
            DiffKind::Add => shown.green(),
            DiffKind::Update => shown.yellow(),
            DiffKind::Delete => shown.red(),
            DiffKind::Unchanged => shown.dimmed(),
        };
        println!("  {} {colored}", format!("{domain}:").dimmed());
    }

    fn record_unobservable(&self, domain: &str, error: &AuditError) {
        log::info!("{domain}: unobservable ({}): {error}", error.class());
        ui::warn(&format!("{domain}: could not be observed ({error})"));
    }

    fn record_risk(&self, domain: &str, risk: &str) {
        log::info!("{domain}: risk: {risk}");
        if !self.quiet {
            ui::dim(&format!("risk ({domain}): {risk}"));
        }
    }

    fn record_plan(&self, plan: &FixPlan) {
        for line in plan.preview() {
            log::debug!("Plan: {line}");
        }
        if self.quiet {
            return;
        }

        if plan.is_empty() {
            ui::success("Nothing to do");
            return;
        }
        ui::info(&format!(
            "{}: {} safe, {} risky",
            ui::count(plan.len(), "action"),
            plan.safe_count(),
            plan.risky_count()
        ));
        for action in &plan.actions {
            println!(
                "  {} {}: {}",
                risk_tag(action.risk()),
                action.domain.dimmed(),
                action.summary
            );
        }
    }

    fn record_action(&self, record: &ExecutionRecord) {
        let line = outcome_line(record);
        log::info!("Action: {line}");
        match &record.outcome {
            Outcome::Succeeded => {
                if !self.quiet {
                    ui::success(&line);
                }
            }
            Outcome::Failed { .. } => ui::error(&line),
            Outcome::Skipped { .. } => {
                if !self.quiet {
                    ui::warn(&line);
                }
            }
        }
    }

    fn record_verification(&self, verification: &Verification) {
        log::info!(
            "Verification: {} verified, {} discrepancies",
            verification.verified,
            verification.discrepancies.len()
        );
        if verification.is_converged() {
            if !self.quiet {
                ui::success(&format!(
                    "Converged: {} verified",
                    ui::count(verification.verified, "action")
                ));
            }
            return;
        }

        for d in &verification.discrepancies {
            ui::warn(&format!("{} {}: {}", d.domain, d.key, d.detail));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Action, Attributes, NaturalKey, Operation};

    fn record(outcome: Outcome) -> ExecutionRecord {
        ExecutionRecord {
            action: Action::new(
                "dns:example.com",
                NaturalKey::new("dns", "A", "www"),
                Operation::Create {
                    payload: Attributes::new(),
                },
            )
            .with_summary("create A www -> 1.2.3.4 (ttl 3600)"),
            outcome,
        }
    }

    #[test]
    fn test_outcome_lines() {
        assert_eq!(
            outcome_line(&record(Outcome::Succeeded)),
            "dns:example.com: create A www -> 1.2.3.4 (ttl 3600)"
        );
        assert_eq!(
            outcome_line(&record(Outcome::Failed {
                detail: "rate limited".into()
            })),
            "dns:example.com: create A www -> 1.2.3.4 (ttl 3600) failed: rate limited"
        );
        assert_eq!(
            outcome_line(&record(Outcome::Skipped {
                reason: "no apply".into()
            })),
            "dns:example.com: create A www -> 1.2.3.4 (ttl 3600) skipped (no apply)"
        );
    }

    #[test]
    fn test_risk_tag_names_tier() {
        colored::control::set_override(false);
        assert_eq!(risk_tag(RiskTier::Safe), "[safe]");
        assert_eq!(risk_tag(RiskTier::Risky), "[risky]");
    }

    #[test]
    fn test_quiet_sink_accepts_all_events() {
        let sink = LogSink::new(true);
        sink.record_stage(Stage::Audit);
        sink.record_plan(&FixPlan::default());
        sink.record_action(&record(Outcome::Succeeded));
        sink.record_verification(&Verification::default());
    }
}
