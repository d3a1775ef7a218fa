//! Error taxonomy for audits
//!
//! Errors are scoped to one resource domain. The driver turns them into
//! advisory risks and manual steps instead of aborting sibling domains.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::types::NaturalKey;

/// Which side of the comparison an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSide {
    Desired,
    Observed,
}

impl fmt::Display for StateSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desired => f.write_str("desired"),
            Self::Observed => f.write_str("observed"),
        }
    }
}

/// Coarse classification used for propagation and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Could not ask the remote system (unreachable, unauthenticated, timed out, scope missing)
    RemoteUnavailable,
    /// Asked, but could not understand the answer
    MalformedRemoteResponse,
    /// The desired-state document for the domain is missing or invalid
    ConfigurationError,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteUnavailable => f.write_str("remote unavailable"),
            Self::MalformedRemoteResponse => f.write_str("malformed remote response"),
            Self::ConfigurationError => f.write_str("configuration error"),
        }
    }
}

/// Failure to observe or declare the state of one resource domain
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum AuditError {
    /// Remote control plane unreachable or the client tool is missing
    #[error("remote control plane unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    /// Credentials missing, expired or rejected
    #[error("not authenticated: {reason}")]
    Unauthenticated { reason: String },

    /// The scope itself (zone, project) does not exist remotely
    #[error("{scope} not found on the remote control plane")]
    ScopeNotFound { scope: String },

    /// A remote call exceeded its deadline
    #[error("remote call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The remote answer could not be parsed
    #[error("malformed remote response: {detail}")]
    MalformedRemoteResponse { detail: String },

    /// Two resources on the same side share a natural key
    #[error("duplicate natural key {key} in {side} state")]
    DuplicateKey { key: NaturalKey, side: StateSide },

    /// Desired state for the domain is missing or invalid
    #[error("configuration error: {detail}")]
    Configuration { detail: String },
}

impl AuditError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::RemoteUnavailable { .. }
            | Self::Unauthenticated { .. }
            | Self::ScopeNotFound { .. }
            | Self::Timeout { .. } => FailureClass::RemoteUnavailable,
            Self::MalformedRemoteResponse { .. } => FailureClass::MalformedRemoteResponse,
            Self::DuplicateKey {
                side: StateSide::Observed,
                ..
            } => FailureClass::MalformedRemoteResponse,
            Self::DuplicateKey {
                side: StateSide::Desired,
                ..
            }
            | Self::Configuration { .. } => FailureClass::ConfigurationError,
        }
    }

    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration {
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedRemoteResponse {
            detail: detail.into(),
        }
    }
}

/// Advisory strings for conditions the engine cannot correct on its own
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub risks: Vec<String>,
    pub manual_steps: Vec<String>,
}

impl Advisory {
    /// Generic advice for a domain that could not be audited
    pub fn for_error(domain: &str, error: &AuditError) -> Self {
        let (risk, step) = match error {
            AuditError::Unauthenticated { .. } => (
                format!("Cannot access {domain} - check authentication ({error})"),
                format!("Re-authenticate the client used for {domain}"),
            ),
            AuditError::ScopeNotFound { scope } => (
                format!("{scope} not found ({domain})"),
                format!("Create {scope} on the remote control plane"),
            ),
            AuditError::RemoteUnavailable { .. } | AuditError::Timeout { .. } => (
                format!("Cannot observe {domain}: {error}"),
                format!("Restore connectivity for {domain} and re-run the audit"),
            ),
            AuditError::MalformedRemoteResponse { .. }
            | AuditError::DuplicateKey {
                side: StateSide::Observed,
                ..
            } => (
                format!("Unreadable remote state for {domain}: {error}"),
                format!("Inspect the remote state of {domain} manually"),
            ),
            AuditError::DuplicateKey {
                side: StateSide::Desired,
                ..
            }
            | AuditError::Configuration { .. } => (
                format!("Desired state for {domain} is invalid: {error}"),
                format!("Fix the {domain} section of the configuration"),
            ),
        };

        Self {
            risks: vec![risk],
            manual_steps: vec![step],
        }
    }

    pub fn with_manual_step(mut self, step: impl Into<String>) -> Self {
        self.manual_steps.push(step.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_class() {
        assert_eq!(
            AuditError::Timeout { seconds: 5 }.class(),
            FailureClass::RemoteUnavailable
        );
        assert_eq!(
            AuditError::malformed("not json").class(),
            FailureClass::MalformedRemoteResponse
        );
        assert_eq!(
            AuditError::configuration("missing records").class(),
            FailureClass::ConfigurationError
        );
    }

    #[test]
    fn test_duplicate_key_class_depends_on_side() {
        let key = NaturalKey::new("dns", "A", "www");
        let observed = AuditError::DuplicateKey {
            key: key.clone(),
            side: StateSide::Observed,
        };
        let desired = AuditError::DuplicateKey {
            key,
            side: StateSide::Desired,
        };
        assert_eq!(observed.class(), FailureClass::MalformedRemoteResponse);
        assert_eq!(desired.class(), FailureClass::ConfigurationError);
        assert_eq!(
            desired.to_string(),
            "duplicate natural key dns:A/www in desired state"
        );
    }

    #[test]
    fn test_advisory_for_missing_scope() {
        let advisory = Advisory::for_error(
            "dns:example.com",
            &AuditError::ScopeNotFound {
                scope: "domain 'example.com'".into(),
            },
        );
        assert_eq!(advisory.risks.len(), 1);
        assert_eq!(
            advisory.manual_steps,
            vec!["Create domain 'example.com' on the remote control plane".to_string()]
        );
    }
}
