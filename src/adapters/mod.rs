//! Concrete resource adapters
//!
//! Each adapter wraps one control-plane backend and one section of the
//! infrastructure spec:
//! - `dns` - records of one DigitalOcean zone
//! - `migrations` - the Supabase migration history
//! - `edge_functions` - deployed Supabase edge functions

mod dns;
mod edge_functions;
mod migrations;

pub use dns::DnsZoneAdapter;
pub use edge_functions::EdgeFunctionAdapter;
pub use migrations::MigrationAdapter;

use anyhow::{Context, Result};
use controlplane::dns::DnsBackend;
use controlplane::supabase::SupabaseBackend;
use controlplane::{DoctlBackend, ErrorCategory, RetryConfig, SupabaseCli, SupabaseSettings};
use declarative::{Advisory, Attributes, AuditError, BoxedAdapter};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DATABASE_URL_ENV, InfraSpec, SupabaseSpec};

/// Manual steps for a Supabase project that cannot be reached
const SUPABASE_ACCESS_STEPS: &[&str] = &[
    "Run: supabase login",
    "Set project_ref in config or DATABASE_URL env var",
];

/// Build one adapter per configured domain, backed by the real CLIs
pub fn build(spec: &InfraSpec, timeout: Duration) -> Vec<BoxedAdapter> {
    let retry = RetryConfig {
        max_attempts: spec.settings.retry_attempts.max(1),
        ..RetryConfig::default()
    };
    let mut adapters: Vec<BoxedAdapter> = Vec::new();

    if !spec.dns.domains.is_empty() {
        let backend: Arc<dyn DnsBackend> =
            Arc::new(DoctlBackend::new(timeout).with_retry(retry.clone()));
        for zone in &spec.dns.domains {
            adapters.push(Box::new(DnsZoneAdapter::new(
                zone,
                &spec.dns,
                Arc::clone(&backend),
            )));
        }
    }

    if let Some(supabase) = &spec.supabase {
        let settings = supabase_settings(supabase, std::env::var(DATABASE_URL_ENV).ok());
        let backend: Arc<dyn SupabaseBackend> =
            Arc::new(SupabaseCli::new(settings, timeout).with_retry(retry));
        adapters.push(Box::new(MigrationAdapter::new(supabase, Arc::clone(&backend))));
        adapters.push(Box::new(EdgeFunctionAdapter::new(supabase, backend)));
    }

    adapters
}

/// CLI settings for a project, with `env_database_url` as the URL fallback
///
/// A functions directory the CLI cannot deploy from leaves the workdir unset;
/// the edge function adapter reports that layout as a configuration error.
fn supabase_settings(spec: &SupabaseSpec, env_database_url: Option<String>) -> SupabaseSettings {
    SupabaseSettings {
        project_ref: spec.project_ref.clone(),
        database_url: spec.database_url_or(env_database_url),
        workdir: spec.project_workdir().ok().flatten(),
    }
}

/// Map a control-plane failure onto the audit taxonomy
///
/// `scope` names what was being read, for not-found errors.
pub(crate) fn audit_error(error: &controlplane::Error, scope: &str) -> AuditError {
    match error {
        controlplane::Error::Timeout { seconds, .. } => AuditError::Timeout { seconds: *seconds },
        _ => match error.category() {
            ErrorCategory::Unauthenticated => AuditError::Unauthenticated {
                reason: error.to_string(),
            },
            ErrorCategory::NotFound => AuditError::ScopeNotFound {
                scope: scope.to_string(),
            },
            ErrorCategory::Parse => AuditError::malformed(error.to_string()),
            ErrorCategory::Misconfigured => AuditError::configuration(error.to_string()),
            _ => AuditError::RemoteUnavailable {
                reason: error.to_string(),
            },
        },
    }
}

/// Check that the supabase CLI runs and can see the configured project
///
/// Without a `project_ref` only the executable is checked: migrations may
/// still be reachable through `DATABASE_URL` without a CLI login.
pub(crate) fn check_supabase_access(
    backend: &dyn SupabaseBackend,
    project_ref: Option<&str>,
) -> Result<(), AuditError> {
    const SCOPE: &str = "Supabase project";

    if let Err(e) = backend.check_available() {
        log::warn!("Install the supabase CLI: https://supabase.com/docs/guides/cli");
        return Err(audit_error(&e, SCOPE));
    }
    let Some(project_ref) = project_ref else {
        return Ok(());
    };

    let projects = backend.list_projects().map_err(|e| audit_error(&e, SCOPE))?;
    let project = projects
        .iter()
        .find(|p| p.project_ref() == Some(project_ref))
        .ok_or_else(|| AuditError::ScopeNotFound {
            scope: format!("{SCOPE} '{project_ref}'"),
        })?;
    log::debug!(
        "Supabase project: {} ({project_ref})",
        project.name.as_deref().unwrap_or("unnamed")
    );
    Ok(())
}

/// Advice for a Supabase domain that could not be audited
///
/// With a valid local declaration, a configuration error can only come from
/// the project connection settings, so it gets the same advice as an
/// authentication failure.
pub(crate) fn supabase_advisory(domain: &str, error: &AuditError, declaration_ok: bool) -> Advisory {
    let access = match error {
        AuditError::Unauthenticated { .. }
        | AuditError::RemoteUnavailable { .. }
        | AuditError::ScopeNotFound { .. } => true,
        AuditError::Configuration { .. } => declaration_ok,
        _ => false,
    };
    if !access {
        return Advisory::for_error(domain, error);
    }

    Advisory {
        risks: vec![format!(
            "Cannot access Supabase project - check authentication ({error})"
        )],
        manual_steps: SUPABASE_ACCESS_STEPS.iter().map(ToString::to_string).collect(),
    }
}

/// String attribute of an action payload
pub(crate) fn payload_str<'a>(payload: &'a Attributes, name: &str) -> Result<&'a str> {
    payload
        .get(name)
        .and_then(serde_json::Value::as_str)
        .with_context(|| format!("action payload is missing '{name}'"))
}

/// Optional unsigned attribute of an action payload
pub(crate) fn payload_u64(payload: &Attributes, name: &str) -> Option<u64> {
    payload.get(name).and_then(serde_json::Value::as_u64)
}

/// Optional boolean attribute of an action payload
pub(crate) fn payload_bool(payload: &Attributes, name: &str) -> Option<bool> {
    payload.get(name).and_then(serde_json::Value::as_bool)
}
