//! Fix-plan builder - turns diffs into an ordered list of actions

use crate::context::ObservabilitySink;
use crate::diff::DomainDiff;
use crate::types::{Action, DiffEntry, Operation};
use serde::Serialize;

/// Ordered actions for one run, safe actions first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixPlan {
    pub actions: Vec<Action>,
}

impl FixPlan {
    /// Build a plan from already rendered actions
    ///
    /// The sort is stable, so within a tier actions keep the order in which
    /// they were rendered.
    pub fn new(mut actions: Vec<Action>) -> Self {
        actions.sort_by_key(Action::risk);
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn safe_count(&self) -> usize {
        self.actions.iter().filter(|a| !a.risk().is_risky()).count()
    }

    pub fn risky_count(&self) -> usize {
        self.actions.iter().filter(|a| a.risk().is_risky()).count()
    }

    /// Actions that belong to one domain, in plan order
    pub fn for_domain<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a Action> + 'a {
        self.actions.iter().filter(move |a| a.domain == domain)
    }

    /// Operator preview: a header line with counts, then one line per action
    pub fn preview(&self) -> Vec<String> {
        if self.is_empty() {
            return vec!["Nothing to do".to_string()];
        }

        let mut lines = Vec::with_capacity(self.len() + 1);
        lines.push(format!(
            "{} action(s): {} safe, {} risky",
            self.len(),
            self.safe_count(),
            self.risky_count()
        ));
        lines.extend(
            self.actions
                .iter()
                .map(|a| format!("[{}] {}: {}", a.risk(), a.domain, a.summary)),
        );
        lines
    }
}

/// Render a diff entry into an action
///
/// `Add` becomes a create, `Update` and `Delete` carry the observed remote id.
/// `Unchanged` needs no action.
pub fn render_action(domain: &str, entry: &DiffEntry) -> Option<Action> {
    let operation = match entry {
        DiffEntry::Add(desired) => Operation::Create {
            payload: desired.attributes.clone(),
        },
        DiffEntry::Update { observed, desired } => Operation::Update {
            remote_id: observed.remote_id.clone(),
            payload: desired.attributes.clone(),
        },
        DiffEntry::Delete(observed) => Operation::Delete {
            remote_id: observed.remote_id.clone(),
        },
        DiffEntry::Unchanged(_) => return None,
    };
    Some(Action::new(domain, entry.key().clone(), operation))
}

/// Build the run's plan using the default renderer
pub fn build_plan(diffs: &[DomainDiff], sink: &dyn ObservabilitySink) -> FixPlan {
    build_plan_with(diffs, render_action, sink)
}

/// Build the run's plan, rendering each entry with `render`
///
/// Entries are flattened across domains in the order given; `Unchanged`
/// entries are dropped. The preview is handed to the sink before returning.
pub fn build_plan_with<R>(diffs: &[DomainDiff], render: R, sink: &dyn ObservabilitySink) -> FixPlan
where
    R: Fn(&str, &DiffEntry) -> Option<Action>,
{
    let actions = diffs
        .iter()
        .flat_map(|diff| {
            diff.entries
                .iter()
                .filter_map(|entry| render(&diff.domain, entry))
                .collect::<Vec<_>>()
        })
        .collect();

    let plan = FixPlan::new(actions);
    sink.record_plan(&plan);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoopSink;
    use crate::types::{DesiredResource, NaturalKey, ObservedResource, RiskTier};

    fn add(name: &str) -> DiffEntry {
        DiffEntry::Add(
            DesiredResource::new(NaturalKey::new("dns", "A", name)).with_attribute("data", "1.1.1.1"),
        )
    }

    fn delete(name: &str) -> DiffEntry {
        DiffEntry::Delete(ObservedResource::new(
            NaturalKey::new("dns", "A", name),
            format!("id-{name}"),
        ))
    }

    fn unchanged(name: &str) -> DiffEntry {
        DiffEntry::Unchanged(ObservedResource::new(NaturalKey::new("dns", "A", name), "x"))
    }

    #[test]
    fn test_render_update_carries_remote_id() {
        let entry = DiffEntry::Update {
            observed: ObservedResource::new(NaturalKey::new("dns", "A", "api"), "r1")
                .with_attribute("data", "5.6.7.8"),
            desired: DesiredResource::new(NaturalKey::new("dns", "A", "api"))
                .with_attribute("data", "1.2.3.4"),
        };
        let action = render_action("dns:example.com", &entry).unwrap();

        assert_eq!(action.operation.remote_id(), Some("r1"));
        assert_eq!(
            action.operation.payload().and_then(|p| p.get("data")),
            Some(&"1.2.3.4".into())
        );
        assert_eq!(action.risk(), RiskTier::Risky);
    }

    #[test]
    fn test_plan_orders_safe_before_risky_across_domains() {
        let diffs = vec![
            DomainDiff {
                domain: "dns:a.com".into(),
                entries: vec![delete("old"), add("web"), unchanged("same")],
            },
            DomainDiff {
                domain: "dns:b.com".into(),
                entries: vec![add("api"), delete("legacy")],
            },
        ];

        let plan = build_plan(&diffs, &NoopSink);
        let order: Vec<(&str, &str)> = plan
            .actions
            .iter()
            .map(|a| (a.domain.as_str(), a.key.name.as_str()))
            .collect();

        assert_eq!(
            order,
            vec![
                ("dns:a.com", "web"),
                ("dns:b.com", "api"),
                ("dns:a.com", "old"),
                ("dns:b.com", "legacy"),
            ]
        );
        assert_eq!(plan.safe_count(), 2);
        assert_eq!(plan.risky_count(), 2);
    }

    #[test]
    fn test_empty_plan_is_representable() {
        let diffs = vec![DomainDiff {
            domain: "dns:a.com".into(),
            entries: vec![unchanged("www")],
        }];
        let plan = build_plan(&diffs, &NoopSink);

        assert!(plan.is_empty());
        assert_eq!(plan.preview(), vec!["Nothing to do".to_string()]);
    }

    #[test]
    fn test_preview_lines() {
        let plan = FixPlan::new(vec![
            render_action("dns:a.com", &delete("old")).unwrap(),
            render_action("dns:a.com", &add("web")).unwrap(),
        ]);
        let preview = plan.preview();

        assert_eq!(preview[0], "2 action(s): 1 safe, 1 risky");
        assert!(preview[1].starts_with("[safe] dns:a.com: create dns:A/web"));
        assert!(preview[2].starts_with("[risky] dns:a.com: delete dns:A/old [id id-old]"));
    }

    #[test]
    fn test_custom_renderer() {
        let diffs = vec![DomainDiff {
            domain: "dns:a.com".into(),
            entries: vec![add("web")],
        }];
        let plan = build_plan_with(
            &diffs,
            |domain, entry| render_action(domain, entry).map(|a| a.with_summary("custom")),
            &NoopSink,
        );
        assert_eq!(plan.actions[0].summary, "custom");
        assert_eq!(plan.for_domain("dns:a.com").count(), 1);
        assert_eq!(plan.for_domain("dns:b.com").count(), 0);
    }
}
