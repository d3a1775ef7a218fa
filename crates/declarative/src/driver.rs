//! Orchestration driver - sequences a reconciliation run
//!
//! A run walks `Audit → Plan → AwaitConfirmation → Execute → Verify → Report`
//! exactly once. Stages after `Audit` are cut short by audit-only mode, an
//! empty plan or a missing apply confirmation; the report always reflects
//! whatever completed.

use crate::context::ObservabilitySink;
use crate::diff::{DiffSummary, DomainDiff};
use crate::error::{AuditError, FailureClass};
use crate::executor::{AdapterSet, execute};
use crate::planner::{FixPlan, build_plan_with, render_action};
use crate::resource::ResourceAdapter;
use crate::types::{
    DiffEntry, DiffKind, ExecuteSummary, ExecutionRecord, Gates, NaturalKey, Outcome, Stage,
};
use rayon::prelude::*;
use serde::Serialize;

/// Reason recorded when the run stops at the confirmation gate
pub const NOT_CONFIRMED_REASON: &str = "apply confirmation not given; no remote changes made";

/// Caller choices for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after the audit
    pub audit_only: bool,
    pub gates: Gates,
}

/// Whether a domain could be audited
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DomainStatus {
    Observed,
    Unobservable { class: FailureClass, error: AuditError },
}

/// Audit result for one resource domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainAudit {
    pub domain: String,
    pub status: DomainStatus,
    pub entries: Vec<DiffEntry>,
    pub risks: Vec<String>,
    pub manual_steps: Vec<String>,
}

impl DomainAudit {
    fn observed(domain: &str, entries: Vec<DiffEntry>, risks: Vec<String>) -> Self {
        Self {
            domain: domain.to_string(),
            status: DomainStatus::Observed,
            entries,
            risks,
            manual_steps: Vec::new(),
        }
    }

    fn unobservable(adapter: &dyn ResourceAdapter, error: &AuditError) -> Self {
        let advisory = adapter.advise(error);
        Self {
            domain: adapter.domain().to_string(),
            status: DomainStatus::Unobservable {
                class: error.class(),
                error: error.clone(),
            },
            entries: Vec::new(),
            risks: advisory.risks,
            manual_steps: advisory.manual_steps,
        }
    }

    pub fn is_observed(&self) -> bool {
        matches!(self.status, DomainStatus::Observed)
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_entries(&self.entries)
    }

    /// Entries that call for a change
    pub fn issues(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter().filter(|e| e.is_change())
    }
}

/// Aggregate audit over every domain, in adapter order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub domains: Vec<DomainAudit>,
}

impl AuditReport {
    pub fn domain(&self, name: &str) -> Option<&DomainAudit> {
        self.domains.iter().find(|d| d.domain == name)
    }

    /// Number of entries calling for a change
    pub fn issues(&self) -> usize {
        self.domains.iter().map(|d| d.summary().changes()).sum()
    }

    /// Number of change entries that would overwrite or remove remote state
    pub fn risky_issues(&self) -> usize {
        self.domains.iter().map(|d| d.summary().risky()).sum()
    }

    pub fn unobservable(&self) -> impl Iterator<Item = &DomainAudit> {
        self.domains.iter().filter(|d| !d.is_observed())
    }

    pub fn risks(&self) -> impl Iterator<Item = &str> {
        self.domains
            .iter()
            .flat_map(|d| d.risks.iter().map(String::as_str))
    }

    pub fn manual_steps(&self) -> impl Iterator<Item = &str> {
        self.domains
            .iter()
            .flat_map(|d| d.manual_steps.iter().map(String::as_str))
    }

    /// Diffs of the domains that could be observed
    pub fn diffs(&self) -> Vec<DomainDiff> {
        self.domains
            .iter()
            .filter(|d| d.is_observed())
            .map(|d| DomainDiff {
                domain: d.domain.clone(),
                entries: d.entries.clone(),
            })
            .collect()
    }
}

/// What happened at and after the confirmation gate
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    /// The run never reached planning
    #[default]
    NotRequested,
    /// The caller asked for an audit only
    AuditOnly,
    /// The plan was empty
    NothingToDo,
    /// The plan was not executed
    Skipped { reason: String },
    Executed {
        records: Vec<ExecutionRecord>,
        summary: ExecuteSummary,
    },
}

impl ExecutionState {
    pub fn summary(&self) -> Option<ExecuteSummary> {
        match self {
            Self::Executed { summary, .. } => Some(*summary),
            _ => None,
        }
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        match self {
            Self::Executed { records, .. } => records,
            _ => &[],
        }
    }
}

/// An executed action whose effect the verification pass could not confirm
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub domain: String,
    pub key: NaturalKey,
    pub detail: String,
}

/// Outcome of re-auditing after execution
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Verification {
    /// Succeeded actions whose key is now unchanged
    pub verified: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl Verification {
    pub fn is_converged(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Overall status of a run, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Everything observed; no action failed (skips allowed)
    Clean,
    /// At least one action ended in failure
    ActionFailures,
    /// At least one domain could not be configured or observed
    Unobservable,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::ActionFailures => 1,
            Self::Unobservable => 2,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Stages entered, in order
    pub stages: Vec<Stage>,
    pub audit: AuditReport,
    pub plan: Option<FixPlan>,
    pub execution: ExecutionState,
    pub verification: Option<Verification>,
}

impl RunReport {
    /// Unobservable domains outrank action failures
    pub fn exit_status(&self) -> RunStatus {
        if self.audit.unobservable().next().is_some() {
            RunStatus::Unobservable
        } else if self.execution.summary().is_some_and(|s| s.failed > 0) {
            RunStatus::ActionFailures
        } else {
            RunStatus::Clean
        }
    }

    /// Risky actions left unapplied for lack of destructive confirmation
    pub fn skipped_risky(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.execution
            .records()
            .iter()
            .filter(|r| r.action.risk().is_risky() && r.outcome.is_skipped())
    }
}

/// Drives a run over a fixed set of adapters
pub struct Driver<'a> {
    adapters: &'a [Box<dyn ResourceAdapter>],
    sink: &'a dyn ObservabilitySink,
}

impl<'a> Driver<'a> {
    pub fn new(adapters: &'a [Box<dyn ResourceAdapter>], sink: &'a dyn ObservabilitySink) -> Self {
        Self { adapters, sink }
    }

    /// Run every stage the options allow
    pub fn run(&self, opts: &RunOptions) -> RunReport {
        let mut report = RunReport::default();

        self.enter(&mut report, Stage::Audit);
        report.audit = self.audit();

        if opts.audit_only {
            report.execution = ExecutionState::AuditOnly;
            self.enter(&mut report, Stage::Report);
            return report;
        }

        self.enter(&mut report, Stage::Plan);
        let plan = self.plan(&report.audit);

        if plan.is_empty() {
            report.plan = Some(plan);
            report.execution = ExecutionState::NothingToDo;
            self.enter(&mut report, Stage::Report);
            return report;
        }

        self.enter(&mut report, Stage::AwaitConfirmation);
        if !opts.gates.confirm_apply {
            report.plan = Some(plan);
            report.execution = ExecutionState::Skipped {
                reason: NOT_CONFIRMED_REASON.to_string(),
            };
            self.enter(&mut report, Stage::Report);
            return report;
        }

        self.enter(&mut report, Stage::Execute);
        let records = execute(&plan, opts.gates, &AdapterSet::new(self.adapters), self.sink);
        let summary = ExecuteSummary::from_records(&records);
        report.plan = Some(plan);

        self.enter(&mut report, Stage::Verify);
        let verification = self.verify(&records);
        self.sink.record_verification(&verification);
        report.verification = Some(verification);
        report.execution = ExecutionState::Executed { records, summary };

        self.enter(&mut report, Stage::Report);
        report
    }

    /// Audit every adapter
    ///
    /// Fetches run concurrently; results and sink events keep adapter order.
    pub fn audit(&self) -> AuditReport {
        let domains: Vec<DomainAudit> = self
            .adapters
            .par_iter()
            .map(|adapter| audit_one(adapter.as_ref()))
            .collect();

        for domain in &domains {
            match &domain.status {
                DomainStatus::Observed => {
                    for entry in domain.issues() {
                        self.sink.record_issue(&domain.domain, entry);
                    }
                }
                DomainStatus::Unobservable { error, .. } => {
                    self.sink.record_unobservable(&domain.domain, error);
                }
            }
            for risk in &domain.risks {
                self.sink.record_risk(&domain.domain, risk);
            }
        }

        AuditReport { domains }
    }

    /// Build the multi-domain plan, letting each adapter render its own entries
    pub fn plan(&self, audit: &AuditReport) -> FixPlan {
        let set = AdapterSet::new(self.adapters);
        build_plan_with(
            &audit.diffs(),
            |domain, entry| match set.find(domain) {
                Some(adapter) => adapter.render_action(entry),
                None => render_action(domain, entry),
            },
            self.sink,
        )
    }

    /// Re-audit and check that every succeeded action's key is now unchanged
    ///
    /// Discrepancies are reported; nothing is re-executed.
    pub fn verify(&self, records: &[ExecutionRecord]) -> Verification {
        let audit = self.audit();
        let mut verification = Verification::default();

        for record in records.iter().filter(|r| r.outcome == Outcome::Succeeded) {
            let domain = &record.action.domain;
            let key = &record.action.key;

            let detail = match audit.domain(domain) {
                None => Some("domain missing from verification audit".to_string()),
                Some(current) => match &current.status {
                    DomainStatus::Unobservable { error, .. } => {
                        Some(format!("could not re-observe: {error}"))
                    }
                    DomainStatus::Observed => current
                        .issues()
                        .find(|e| e.key() == key)
                        .map(|e| still_differs(e.kind())),
                },
            };

            match detail {
                Some(detail) => verification.discrepancies.push(Discrepancy {
                    domain: domain.clone(),
                    key: key.clone(),
                    detail,
                }),
                None => verification.verified += 1,
            }
        }

        verification
    }

    fn enter(&self, report: &mut RunReport, stage: Stage) {
        self.sink.record_stage(stage);
        report.stages.push(stage);
    }
}

fn audit_one(adapter: &dyn ResourceAdapter) -> DomainAudit {
    let result = adapter.desired().and_then(|desired| {
        let observed = adapter.fetch_observed()?;
        adapter.diff(&observed, &desired, adapter.delete_policy())
    });

    match result {
        Ok(entries) => {
            let risks = adapter.issue_risks(&entries);
            DomainAudit::observed(adapter.domain(), entries, risks)
        }
        Err(error) => DomainAudit::unobservable(adapter, &error),
    }
}

fn still_differs(kind: DiffKind) -> String {
    match kind {
        DiffKind::Add => "still missing remotely".to_string(),
        DiffKind::Update => "remote attributes still differ".to_string(),
        DiffKind::Delete => "still present remotely".to_string(),
        DiffKind::Unchanged => "unchanged".to_string(),
    }
}
