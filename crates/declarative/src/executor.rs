//! Gated executor - applies a fix plan behind confirmation gates

use crate::context::ObservabilitySink;
use crate::planner::FixPlan;
use crate::resource::ResourceAdapter;
use crate::types::{
    Action, ExecutionRecord, Gates, Outcome, SKIP_APPLY_REASON, SKIP_DESTRUCTIVE_REASON,
};
use anyhow::{Result, anyhow};

/// Something that can perform one planned action against a remote system
pub trait ActionApplier: Send + Sync {
    fn apply(&self, action: &Action) -> Result<()>;
}

/// Routes each action to the adapter that owns its domain
pub struct AdapterSet<'a> {
    adapters: &'a [Box<dyn ResourceAdapter>],
}

impl<'a> AdapterSet<'a> {
    pub fn new(adapters: &'a [Box<dyn ResourceAdapter>]) -> Self {
        Self { adapters }
    }

    pub fn find(&self, domain: &str) -> Option<&'a dyn ResourceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.domain() == domain)
            .map(|a| &**a)
    }
}

impl ActionApplier for AdapterSet<'_> {
    fn apply(&self, action: &Action) -> Result<()> {
        let adapter = self
            .find(&action.domain)
            .ok_or_else(|| anyhow!("no adapter for domain {}", action.domain))?;
        adapter.apply(action)
    }
}

/// Execute a plan, producing exactly one record per action
///
/// Without `confirm_apply` nothing is applied and every action is skipped.
/// Risky actions are skipped unless `confirm_destructive` is set. A failing
/// action is recorded and execution continues with the next one; the applier
/// is called at most once per action.
pub fn execute(
    plan: &FixPlan,
    gates: Gates,
    applier: &dyn ActionApplier,
    sink: &dyn ObservabilitySink,
) -> Vec<ExecutionRecord> {
    let mut records = Vec::with_capacity(plan.len());

    for action in &plan.actions {
        let outcome = if !gates.confirm_apply {
            Outcome::Skipped {
                reason: SKIP_APPLY_REASON.to_string(),
            }
        } else if action.risk().is_risky() && !gates.confirm_destructive {
            Outcome::Skipped {
                reason: SKIP_DESTRUCTIVE_REASON.to_string(),
            }
        } else {
            match applier.apply(action) {
                Ok(()) => Outcome::Succeeded,
                Err(e) => Outcome::Failed {
                    detail: format!("{e:#}"),
                },
            }
        };

        let record = ExecutionRecord {
            action: action.clone(),
            outcome,
        };
        sink.record_action(&record);
        records.push(record);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoopSink;
    use crate::diff::{DomainDiff, compute_diff};
    use crate::planner::build_plan;
    use crate::types::{
        DeletePolicy, DesiredResource, ExecuteSummary, NaturalKey, ObservedResource,
    };
    use anyhow::bail;
    use std::sync::Mutex;

    /// Applier that records every call and fails for configured names
    #[derive(Default)]
    struct RecordingApplier {
        calls: Mutex<Vec<String>>,
        failing: Vec<String>,
    }

    impl RecordingApplier {
        fn failing(names: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing: names.iter().map(ToString::to_string).collect(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ActionApplier for RecordingApplier {
        fn apply(&self, action: &Action) -> Result<()> {
            self.calls.lock().unwrap().push(action.key.name.clone());
            if self.failing.contains(&action.key.name) {
                bail!("remote rejected {}", action.key.name);
            }
            Ok(())
        }
    }

    fn desired(name: &str, data: &str) -> DesiredResource {
        DesiredResource::new(NaturalKey::new("dns", "A", name))
            .with_attribute("data", data)
            .with_attribute("ttl", 3600)
    }

    fn observed(name: &str, data: &str, id: &str) -> ObservedResource {
        ObservedResource::new(NaturalKey::new("dns", "A", name), id)
            .with_attribute("data", data)
            .with_attribute("ttl", 3600)
    }

    fn plan_for(observed: &[ObservedResource], desired: &[DesiredResource]) -> FixPlan {
        let entries = compute_diff(observed, desired, DeletePolicy::DeleteUnmanaged, |o, d| {
            o.attributes == d.attributes
        })
        .unwrap();
        build_plan(
            &[DomainDiff {
                domain: "dns:example.com".into(),
                entries,
            }],
            &NoopSink,
        )
    }

    #[test]
    fn test_add_executes_with_apply_confirmation() {
        let plan = plan_for(&[], &[desired("api", "1.2.3.4")]);
        assert_eq!(plan.safe_count(), 1);

        let applier = RecordingApplier::default();
        let records = execute(&plan, Gates::new(true, false), &applier, &NoopSink);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Succeeded);
        assert_eq!(applier.calls(), vec!["api".to_string()]);
    }

    #[test]
    fn test_update_skipped_without_destructive_confirmation() {
        let plan = plan_for(&[observed("api", "5.6.7.8", "r1")], &[desired("api", "1.2.3.4")]);
        assert_eq!(plan.risky_count(), 1);

        let applier = RecordingApplier::default();
        let records = execute(&plan, Gates::new(true, false), &applier, &NoopSink);

        assert_eq!(
            records[0].outcome,
            Outcome::Skipped {
                reason: SKIP_DESTRUCTIVE_REASON.to_string()
            }
        );
        assert!(applier.calls().is_empty());
    }

    #[test]
    fn test_update_executes_with_destructive_confirmation() {
        let plan = plan_for(&[observed("api", "5.6.7.8", "r1")], &[desired("api", "1.2.3.4")]);

        let ok = RecordingApplier::default();
        let records = execute(&plan, Gates::new(true, true), &ok, &NoopSink);
        assert_eq!(records[0].outcome, Outcome::Succeeded);

        let rejecting = RecordingApplier::failing(&["api"]);
        let records = execute(&plan, Gates::new(true, true), &rejecting, &NoopSink);
        assert!(records[0].outcome.is_failure());
    }

    #[test]
    fn test_destructive_gate_skips_every_risky_action() {
        let plan = plan_for(
            &[
                observed("api", "5.6.7.8", "r1"),
                observed("stale", "9.9.9.9", "r2"),
            ],
            &[desired("api", "1.2.3.4"), desired("web", "1.1.1.1")],
        );

        let applier = RecordingApplier::default();
        let records = execute(&plan, Gates::new(true, false), &applier, &NoopSink);

        assert_eq!(records.len(), plan.len());
        for record in &records {
            if record.action.risk().is_risky() {
                assert!(record.outcome.is_skipped());
            }
        }
        assert_eq!(applier.calls(), vec!["web".to_string()]);
    }

    #[test]
    fn test_partial_failure_does_not_abort_plan() {
        let plan = plan_for(
            &[],
            &[
                desired("a", "1.1.1.1"),
                desired("b", "2.2.2.2"),
                desired("c", "3.3.3.3"),
            ],
        );

        let applier = RecordingApplier::failing(&["b"]);
        let records = execute(&plan, Gates::new(true, true), &applier, &NoopSink);
        let summary = ExecuteSummary::from_records(&records);

        assert_eq!(records.len(), plan.len());
        assert_eq!(applier.calls(), vec!["a", "b", "c"]);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), records.len());
        assert_eq!(
            records[1].outcome,
            Outcome::Failed {
                detail: "remote rejected b".into()
            }
        );
    }

    #[test]
    fn test_no_apply_confirmation_skips_everything() {
        let plan = plan_for(&[], &[desired("api", "1.2.3.4")]);
        let applier = RecordingApplier::default();
        let records = execute(&plan, Gates::default(), &applier, &NoopSink);

        assert_eq!(
            records[0].outcome,
            Outcome::Skipped {
                reason: SKIP_APPLY_REASON.to_string()
            }
        );
        assert!(applier.calls().is_empty());
    }

    #[test]
    fn test_adapter_set_unknown_domain_fails_action() {
        let adapters: Vec<Box<dyn ResourceAdapter>> = Vec::new();
        let set = AdapterSet::new(&adapters);
        let plan = plan_for(&[], &[desired("api", "1.2.3.4")]);

        let records = execute(&plan, Gates::new(true, true), &set, &NoopSink);
        match &records[0].outcome {
            Outcome::Failed { detail } => assert!(detail.contains("no adapter")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
