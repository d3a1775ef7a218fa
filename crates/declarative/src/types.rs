//! Core types for declarative reconciliation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::risk::classify;

/// Reason recorded for risky actions executed without destructive confirmation
pub const SKIP_DESTRUCTIVE_REASON: &str =
    "destructive operation requires explicit destructive confirmation";

/// Reason recorded when the executor is invoked without apply confirmation
pub const SKIP_APPLY_REASON: &str = "execution requires explicit apply confirmation";

/// Attribute payload of a resource (record data, ttl, flags, ...)
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Identity of "the same resource" across desired and observed sets
///
/// Within one audit pass at most one desired and at most one observed
/// resource may share a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    /// Resource kind, e.g. "dns" or "supabase"
    pub kind: String,
    /// Type or category within the kind, e.g. "A" or "migration"
    pub category: String,
    /// Name within the scope, e.g. "api" or "20240101000000"
    pub name: String,
}

impl NaturalKey {
    pub fn new(
        kind: impl Into<String>,
        category: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            category: category.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.category, self.name)
    }
}

/// A declared target resource, sourced from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredResource {
    pub key: NaturalKey,
    #[serde(default)]
    pub attributes: Attributes,
}

impl DesiredResource {
    pub fn new(key: NaturalKey) -> Self {
        Self {
            key,
            attributes: Attributes::new(),
        }
    }

    /// Set an attribute, builder style
    pub fn with_attribute(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }
}

/// A resource as currently reported by the remote system
///
/// Carries the opaque remote identifier needed by update and delete calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedResource {
    pub key: NaturalKey,
    pub remote_id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ObservedResource {
    pub fn new(key: NaturalKey, remote_id: impl Into<String>) -> Self {
        Self {
            key,
            remote_id: remote_id.into(),
            attributes: Attributes::new(),
        }
    }

    /// Set an attribute, builder style
    pub fn with_attribute(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }
}

/// What to do with observed resources that are absent from the desired set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Leave unmanaged remote resources alone
    #[default]
    Retain,
    /// Emit a delete for every observed-only resource
    DeleteUnmanaged,
}

impl DeletePolicy {
    pub fn from_flag(delete_unmanaged: bool) -> Self {
        if delete_unmanaged {
            Self::DeleteUnmanaged
        } else {
            Self::Retain
        }
    }

    pub fn deletes_unmanaged(&self) -> bool {
        matches!(self, Self::DeleteUnmanaged)
    }
}

/// Outcome of comparing one natural key across desired and observed sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffEntry {
    /// Declared but not present remotely
    Add(DesiredResource),
    /// Present remotely with different attributes
    Update {
        observed: ObservedResource,
        desired: DesiredResource,
    },
    /// Present remotely, not declared, and the delete policy allows removal
    Delete(ObservedResource),
    /// Present remotely and matching the declaration
    Unchanged(ObservedResource),
}

impl DiffEntry {
    pub fn kind(&self) -> DiffKind {
        match self {
            Self::Add(_) => DiffKind::Add,
            Self::Update { .. } => DiffKind::Update,
            Self::Delete(_) => DiffKind::Delete,
            Self::Unchanged(_) => DiffKind::Unchanged,
        }
    }

    pub fn key(&self) -> &NaturalKey {
        match self {
            Self::Add(desired) => &desired.key,
            Self::Update { observed, .. } => &observed.key,
            Self::Delete(observed) | Self::Unchanged(observed) => &observed.key,
        }
    }

    /// Whether this entry calls for a remote change
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

/// Discriminant of a [`DiffEntry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Add,
    Update,
    Delete,
    Unchanged,
}

impl DiffKind {
    /// Single-character marker used in previews
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Update => "~",
            Self::Delete => "-",
            Self::Unchanged => "=",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Unchanged => "unchanged",
        };
        f.write_str(label)
    }
}

/// Imperative operation against the remote control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Create { payload: Attributes },
    Update { remote_id: String, payload: Attributes },
    Delete { remote_id: String },
}

impl Operation {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn payload(&self) -> Option<&Attributes> {
        match self {
            Self::Create { payload } | Self::Update { payload, .. } => Some(payload),
            Self::Delete { .. } => None,
        }
    }

    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::Create { .. } => None,
            Self::Update { remote_id, .. } | Self::Delete { remote_id } => Some(remote_id),
        }
    }
}

/// Risk label of an action
///
/// Ordered so that sorting puts safe actions first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Purely additive
    Safe,
    /// Overwrites or removes existing remote state
    Risky,
}

impl RiskTier {
    pub fn is_risky(&self) -> bool {
        matches!(self, Self::Risky)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => f.write_str("safe"),
            Self::Risky => f.write_str("risky"),
        }
    }
}

/// A single planned operation with its risk tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    /// Resource domain that owns the action (adapter scope)
    pub domain: String,
    pub key: NaturalKey,
    pub operation: Operation,
    /// Human-readable line used in previews and reports
    pub summary: String,
    risk: RiskTier,
}

impl Action {
    /// Build an action; the risk tier is derived from the operation here and nowhere else
    pub fn new(domain: impl Into<String>, key: NaturalKey, operation: Operation) -> Self {
        let risk = classify(&operation);
        let summary = default_summary(&key, &operation);
        Self {
            domain: domain.into(),
            key,
            operation,
            summary,
            risk,
        }
    }

    /// Replace the preview line
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn risk(&self) -> RiskTier {
        self.risk
    }
}

fn default_summary(key: &NaturalKey, operation: &Operation) -> String {
    let mut line = format!("{} {}", operation.verb(), key);
    if let Some(id) = operation.remote_id() {
        line.push_str(&format!(" [id {id}]"));
    }
    if let Some(payload) = operation.payload()
        && !payload.is_empty()
    {
        line.push_str(&format!(" ({})", format_attributes(payload)));
    }
    line
}

/// Render attributes as `name=value` pairs, strings unquoted
pub fn format_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(name, value)| match value {
            serde_json::Value::String(s) => format!("{name}={s}"),
            other => format!("{name}={other}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of one action in the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The remote call was made and reported success
    #[serde(rename = "executed_success")]
    Succeeded,
    /// The remote call was made and failed
    #[serde(rename = "executed_failure")]
    Failed { detail: String },
    /// The remote call was not made
    Skipped { reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Per-action execution outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub action: Action,
    pub outcome: Outcome,
}

/// Counts of execution outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ExecuteSummary {
    pub fn from_records(records: &[ExecutionRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.add(&record.outcome);
        }
        summary
    }

    /// Add an outcome to the summary
    pub fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Actions for which a remote call was made
    pub fn executed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// No action failed (skips are not failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Operator confirmations supplied for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gates {
    /// Allow any remote mutation
    pub confirm_apply: bool,
    /// Additionally allow risky (overwriting/removing) mutations
    pub confirm_destructive: bool,
}

impl Gates {
    pub fn new(confirm_apply: bool, confirm_destructive: bool) -> Self {
        Self {
            confirm_apply,
            confirm_destructive,
        }
    }
}

/// Stages of a reconciliation run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Audit,
    Plan,
    AwaitConfirmation,
    Execute,
    Verify,
    Report,
}

impl Stage {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Discover => "Discovering context",
            Self::Audit => "Auditing",
            Self::Plan => "Fix plan",
            Self::AwaitConfirmation => "Confirmation",
            Self::Execute => "Execution",
            Self::Verify => "Post-execution verification",
            Self::Report => "Final report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> NaturalKey {
        NaturalKey::new("dns", "A", "api")
    }

    #[test]
    fn test_natural_key_display() {
        assert_eq!(key().to_string(), "dns:A/api");
    }

    #[test]
    fn test_action_risk_fixed_at_construction() {
        let create = Action::new(
            "dns:example.com",
            key(),
            Operation::Create {
                payload: Attributes::new(),
            },
        );
        assert_eq!(create.risk(), RiskTier::Safe);

        let delete = Action::new(
            "dns:example.com",
            key(),
            Operation::Delete {
                remote_id: "r1".into(),
            },
        )
        .with_summary("remove api");
        assert_eq!(delete.risk(), RiskTier::Risky);
        assert_eq!(delete.summary, "remove api");
    }

    #[test]
    fn test_default_summary_includes_id_and_payload() {
        let mut payload = Attributes::new();
        payload.insert("data".into(), "1.2.3.4".into());
        payload.insert("ttl".into(), 3600.into());
        let action = Action::new(
            "dns:example.com",
            key(),
            Operation::Update {
                remote_id: "r1".into(),
                payload,
            },
        );
        assert_eq!(action.summary, "update dns:A/api [id r1] (data=1.2.3.4 ttl=3600)");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add(&Outcome::Succeeded);
        summary.add(&Outcome::Failed {
            detail: "boom".into(),
        });
        summary.add(&Outcome::Skipped {
            reason: SKIP_DESTRUCTIVE_REASON.into(),
        });

        assert_eq!(summary.executed(), 2);
        assert_eq!(summary.total(), 3);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_outcome_serialization_tags() {
        let json = serde_json::to_value(Outcome::Succeeded).unwrap();
        assert_eq!(json["status"], "executed_success");

        let json = serde_json::to_value(Outcome::Failed {
            detail: "x".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "executed_failure");
    }

    #[test]
    fn test_delete_policy_default_retains() {
        assert_eq!(DeletePolicy::default(), DeletePolicy::Retain);
        assert!(DeletePolicy::from_flag(true).deletes_unmanaged());
    }
}
