//! Supabase migration adapter
//!
//! Desired state is the set of `<version>_<name>.sql` files in the local
//! migrations directory; observed state is the remote migration history.
//! Migrations are never updated in place: a missing one is applied, and an
//! unknown remote one is only marked reverted under `delete_unmanaged`.

use anyhow::{Context, Result, bail};
use controlplane::supabase::{LocalMigration, SupabaseBackend};
use declarative::{
    Action, Advisory, AuditError, DeletePolicy, DesiredResource, DiffEntry, NaturalKey,
    ObservedResource, Operation, ResourceAdapter, render_action,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::{audit_error, check_supabase_access, payload_str, supabase_advisory};
use crate::config::SupabaseSpec;

const DOMAIN: &str = "supabase:migrations";

/// Migration history of one project
pub struct MigrationAdapter {
    migrations_dir: PathBuf,
    project_ref: Option<String>,
    policy: DeletePolicy,
    backend: Arc<dyn SupabaseBackend>,
}

impl MigrationAdapter {
    pub fn new(spec: &SupabaseSpec, backend: Arc<dyn SupabaseBackend>) -> Self {
        Self {
            migrations_dir: spec.expanded_migrations_dir(),
            project_ref: spec.project_ref.clone(),
            policy: DeletePolicy::from_flag(spec.delete_unmanaged),
            backend,
        }
    }
}

impl fmt::Debug for MigrationAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationAdapter")
            .field("migrations_dir", &self.migrations_dir)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn migration_key(version: &str) -> NaturalKey {
    NaturalKey::new("supabase", "migration", version)
}

impl ResourceAdapter for MigrationAdapter {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn desired(&self) -> Result<Vec<DesiredResource>, AuditError> {
        if !self.migrations_dir.is_dir() {
            return Err(AuditError::configuration(format!(
                "migrations directory {} does not exist",
                self.migrations_dir.display()
            )));
        }

        let migrations = LocalMigration::scan(&self.migrations_dir).map_err(|e| {
            AuditError::configuration(format!(
                "could not read {}: {e}",
                self.migrations_dir.display()
            ))
        })?;

        Ok(migrations
            .into_iter()
            .map(|m| {
                DesiredResource::new(migration_key(&m.version))
                    .with_attribute("name", m.name)
                    .with_attribute("path", m.path.display().to_string())
            })
            .collect())
    }

    fn fetch_observed(&self) -> Result<Vec<ObservedResource>, AuditError> {
        check_supabase_access(self.backend.as_ref(), self.project_ref.as_deref())?;

        let remote = self
            .backend
            .list_migrations()
            .map_err(|e| audit_error(&e, "Supabase project"))?;

        Ok(remote
            .into_iter()
            .map(|m| ObservedResource::new(migration_key(&m.version), m.version))
            .collect())
    }

    fn delete_policy(&self) -> DeletePolicy {
        self.policy
    }

    fn render_action(&self, entry: &DiffEntry) -> Option<Action> {
        let action = render_action(DOMAIN, entry)?;
        let version = action.key.name.clone();
        let summary = match &action.operation {
            Operation::Create { payload } => match payload_str(payload, "name") {
                Ok(name) if !name.is_empty() => format!("apply migration {version}_{name}"),
                _ => format!("apply migration {version}"),
            },
            Operation::Update { .. } => format!("re-apply migration {version}"),
            Operation::Delete { .. } => format!("mark migration {version} reverted"),
        };
        Some(action.with_summary(summary))
    }

    fn apply(&self, action: &Action) -> Result<()> {
        let version = &action.key.name;
        match &action.operation {
            Operation::Create { payload } => {
                let migration = LocalMigration {
                    version: version.clone(),
                    name: payload_str(payload, "name").unwrap_or_default().to_string(),
                    path: PathBuf::from(payload_str(payload, "path")?),
                };
                self.backend
                    .apply_migration(&migration)
                    .with_context(|| format!("Failed to apply migration {version}"))
            }
            Operation::Update { .. } => {
                bail!("migration {version} cannot be updated in place")
            }
            Operation::Delete { remote_id } => self
                .backend
                .revert_migration(remote_id)
                .with_context(|| format!("Failed to mark migration {version} reverted")),
        }
    }

    fn advise(&self, error: &AuditError) -> Advisory {
        supabase_advisory(DOMAIN, error, self.desired().is_ok())
    }

    fn issue_risks(&self, entries: &[DiffEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(|entry| match entry {
                DiffEntry::Delete(observed) => Some(format!(
                    "Reverting migration {} in the remote history (schema changes are not rolled back)",
                    observed.key.name
                )),
                _ => None,
            })
            .collect()
    }
}
