//! Resource adapter trait
//!
//! An adapter is one resource kind in one scope: the records of a DNS zone,
//! the migrations of a database, the edge functions of a project. The
//! reconciliation algorithm is written once against this trait.

use crate::diff::{attributes_match, compute_diff};
use crate::error::{Advisory, AuditError};
use crate::planner;
use crate::types::{Action, DeletePolicy, DesiredResource, DiffEntry, ObservedResource};
use anyhow::Result;
use std::fmt;

/// Core trait for reconcilable resource kinds
///
/// Implementors provide:
/// - Identity of the scope ([`domain`](Self::domain))
/// - Desired state, usually derived from configuration
/// - Observed state, fetched from the remote control plane without mutating it
/// - Application of a single planned action
///
/// Diffing and action rendering have default implementations; override
/// [`compared_attributes`](Self::compared_attributes) or
/// [`matches`](Self::matches) to decide which attributes make two resources
/// "the same".
///
/// # Example
///
/// ```ignore
/// use declarative::{Action, AuditError, DesiredResource, ObservedResource, ResourceAdapter};
///
/// #[derive(Debug)]
/// struct Buckets;
///
/// impl ResourceAdapter for Buckets {
///     fn domain(&self) -> &str { "storage:buckets" }
///     fn desired(&self) -> Result<Vec<DesiredResource>, AuditError> { Ok(Vec::new()) }
///     fn fetch_observed(&self) -> Result<Vec<ObservedResource>, AuditError> { Ok(Vec::new()) }
///     fn apply(&self, _action: &Action) -> anyhow::Result<()> { Ok(()) }
/// }
/// ```
pub trait ResourceAdapter: Send + Sync + fmt::Debug {
    /// Name of the scope this adapter reconciles, e.g. "dns:example.com"
    ///
    /// Must be unique among the adapters of a run; actions are routed by it.
    fn domain(&self) -> &str;

    /// Declared target state
    fn desired(&self) -> Result<Vec<DesiredResource>, AuditError>;

    /// Fetch the current remote state
    ///
    /// Must not mutate remote state. An unreachable or unauthenticated remote
    /// is an error, never an empty list.
    fn fetch_observed(&self) -> Result<Vec<ObservedResource>, AuditError>;

    /// Policy for observed resources missing from the desired set
    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::Retain
    }

    /// Attributes that participate in equality
    fn compared_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether an observed resource already satisfies its declaration
    fn matches(&self, observed: &ObservedResource, desired: &DesiredResource) -> bool {
        attributes_match(observed, desired, self.compared_attributes())
    }

    /// Compare observed against desired state
    fn diff(
        &self,
        observed: &[ObservedResource],
        desired: &[DesiredResource],
        policy: DeletePolicy,
    ) -> Result<Vec<DiffEntry>, AuditError> {
        compute_diff(observed, desired, policy, |o, d| self.matches(o, d))
    }

    /// Turn a diff entry into an action; `Unchanged` yields nothing
    fn render_action(&self, entry: &DiffEntry) -> Option<Action> {
        planner::render_action(self.domain(), entry)
    }

    /// Apply one action against the remote control plane
    ///
    /// Called at most once per action; no retries are expected here.
    fn apply(&self, action: &Action) -> Result<()>;

    /// Risks and manual steps for a domain that could not be audited
    fn advise(&self, error: &AuditError) -> Advisory {
        Advisory::for_error(self.domain(), error)
    }

    /// Advisory risks raised by a successful audit
    fn issue_risks(&self, entries: &[DiffEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(|entry| match entry {
                DiffEntry::Delete(observed) => {
                    Some(format!("Deleting {} in {}", observed.key, self.domain()))
                }
                _ => None,
            })
            .collect()
    }
}

/// A boxed adapter for type-erased storage
pub type BoxedAdapter = Box<dyn ResourceAdapter>;
