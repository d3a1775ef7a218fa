//! Observability sink
//!
//! The core reports what it finds and does through this trait instead of
//! writing to a global logger, so it can be driven and inspected in tests.

use crate::driver::Verification;
use crate::error::AuditError;
use crate::planner::FixPlan;
use crate::types::{DiffEntry, ExecutionRecord, Stage};

/// Receiver for reconciliation events
///
/// Audits of different domains may run on different threads, so
/// implementations must be `Sync`.
pub trait ObservabilitySink: Send + Sync {
    /// Called when a stage starts
    fn record_stage(&self, stage: Stage);

    /// Called for every diff entry that calls for a change
    fn record_issue(&self, domain: &str, entry: &DiffEntry);

    /// Called when a domain could not be audited
    fn record_unobservable(&self, domain: &str, error: &AuditError);

    /// Called for every advisory risk
    fn record_risk(&self, domain: &str, risk: &str);

    /// Called once the fix plan is built; this is the operator's preview
    fn record_plan(&self, plan: &FixPlan);

    /// Called after each action has an outcome
    fn record_action(&self, record: &ExecutionRecord);

    /// Called after the verification pass
    fn record_verification(&self, verification: &Verification);
}

/// Sink that discards everything
pub struct NoopSink;

impl ObservabilitySink for NoopSink {
    fn record_stage(&self, _stage: Stage) {}
    fn record_issue(&self, _domain: &str, _entry: &DiffEntry) {}
    fn record_unobservable(&self, _domain: &str, _error: &AuditError) {}
    fn record_risk(&self, _domain: &str, _risk: &str) {}
    fn record_plan(&self, _plan: &FixPlan) {}
    fn record_action(&self, _record: &ExecutionRecord) {}
    fn record_verification(&self, _verification: &Verification) {}
}
