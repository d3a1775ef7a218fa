//! # Declarative
//!
//! A framework for declarative reconciliation of externally managed resources.
//!
//! This crate compares an operator-declared desired state against the state
//! observed on a remote control plane, turns the differences into a plan of
//! risk-classified actions, and executes that plan behind explicit
//! confirmation gates.
//!
//! ## Core Concepts
//!
//! - **ResourceAdapter**: One resource kind in one scope (a DNS zone, a set of migrations)
//! - **DiffEntry**: Add / Update / Delete / Unchanged, keyed by [`NaturalKey`]
//! - **Action**: A create/update/delete operation, classified `safe` or `risky` when built
//! - **FixPlan**: All actions of a run, safe actions first
//! - **Driver**: Audit → Plan → AwaitConfirmation → Execute → Verify → Report
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     AuditError, Action, DesiredResource, Driver, Gates, NaturalKey, NoopSink,
//!     ObservedResource, ResourceAdapter, RunOptions,
//! };
//!
//! #[derive(Debug)]
//! struct Zone;
//!
//! impl ResourceAdapter for Zone {
//!     fn domain(&self) -> &str { "dns:example.com" }
//!
//!     fn desired(&self) -> Result<Vec<DesiredResource>, AuditError> {
//!         Ok(vec![DesiredResource::new(NaturalKey::new("dns", "A", "api"))
//!             .with_attribute("data", "1.2.3.4")])
//!     }
//!
//!     fn fetch_observed(&self) -> Result<Vec<ObservedResource>, AuditError> {
//!         Ok(Vec::new())
//!     }
//!
//!     fn compared_attributes(&self) -> &'static [&'static str] { &["data"] }
//!
//!     fn apply(&self, action: &Action) -> anyhow::Result<()> {
//!         println!("would apply {}", action.summary);
//!         Ok(())
//!     }
//! }
//!
//! let adapters: Vec<Box<dyn ResourceAdapter>> = vec![Box::new(Zone)];
//! let report = Driver::new(&adapters, &NoopSink).run(&RunOptions {
//!     audit_only: false,
//!     gates: Gates::new(true, false),
//! });
//! assert!(report.execution.summary().is_some_and(|s| s.succeeded == 1));
//! ```
//!
//! ## Provider Traits
//!
//! - [`ResourceAdapter`]: fetches observed state and applies actions for one resource kind
//! - [`ActionApplier`]: routes plan actions to whoever can apply them
//! - [`ObservabilitySink`]: receives issues, plan previews and outcomes
//!
//! The core never configures global logging or talks to a terminal; all of
//! that is injected through the sink.

pub mod context;
pub mod diff;
pub mod driver;
pub mod error;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod risk;
pub mod types;

// Re-export main types at crate root
pub use context::{NoopSink, ObservabilitySink};
pub use diff::{DiffSummary, DomainDiff, attributes_match, compute_diff};
pub use driver::{
    AuditReport, Discrepancy, DomainAudit, DomainStatus, Driver, ExecutionState,
    NOT_CONFIRMED_REASON, RunOptions, RunReport, RunStatus, Verification,
};
pub use error::{Advisory, AuditError, FailureClass, StateSide};
pub use executor::{ActionApplier, AdapterSet, execute};
pub use planner::{FixPlan, build_plan, build_plan_with, render_action};
pub use resource::{BoxedAdapter, ResourceAdapter};
pub use risk::classify;
pub use types::{
    Action, Attributes, DeletePolicy, DesiredResource, DiffEntry, DiffKind, ExecuteSummary,
    ExecutionRecord, Gates, NaturalKey, ObservedResource, Operation, Outcome, RiskTier,
    SKIP_APPLY_REASON, SKIP_DESTRUCTIVE_REASON, Stage, format_attributes,
};
