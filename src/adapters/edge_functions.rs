//! Supabase edge function adapter
//!
//! Every sub-directory of the functions directory is a function that should
//! be deployed. Declared `verify_jwt` settings participate in equality; a
//! function that declares nothing matches as soon as it is deployed.

use anyhow::{Context, Result};
use controlplane::supabase::{SupabaseBackend, scan_function_dirs};
use declarative::{
    Action, Advisory, AuditError, DeletePolicy, DesiredResource, DiffEntry, NaturalKey,
    ObservedResource, Operation, ResourceAdapter, render_action,
};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::{audit_error, check_supabase_access, payload_bool, supabase_advisory};
use crate::config::SupabaseSpec;

const DOMAIN: &str = "supabase:edge_functions";

/// Deployed edge functions of one project
pub struct EdgeFunctionAdapter {
    functions_dir: PathBuf,
    spec: SupabaseSpec,
    policy: DeletePolicy,
    backend: Arc<dyn SupabaseBackend>,
}

impl EdgeFunctionAdapter {
    pub fn new(spec: &SupabaseSpec, backend: Arc<dyn SupabaseBackend>) -> Self {
        Self {
            functions_dir: spec.expanded_functions_dir(),
            spec: spec.clone(),
            policy: DeletePolicy::from_flag(spec.delete_unmanaged),
            backend,
        }
    }
}

impl fmt::Debug for EdgeFunctionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeFunctionAdapter")
            .field("functions_dir", &self.functions_dir)
            .field("declared", &self.spec.edge_functions.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn function_key(slug: &str) -> NaturalKey {
    NaturalKey::new("supabase", "edge_function", slug)
}

impl ResourceAdapter for EdgeFunctionAdapter {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn desired(&self) -> Result<Vec<DesiredResource>, AuditError> {
        self.spec
            .validate_functions()
            .and_then(|()| self.spec.project_workdir().map(drop))
            .map_err(|e| AuditError::configuration(format!("{e:#}")))?;

        // A missing directory only means "no functions" when nothing depends on it
        if !self.functions_dir.is_dir()
            && (self.policy.deletes_unmanaged() || !self.spec.edge_functions.is_empty())
        {
            return Err(AuditError::configuration(format!(
                "functions directory {} does not exist",
                self.functions_dir.display()
            )));
        }

        let slugs = scan_function_dirs(&self.functions_dir).map_err(|e| {
            AuditError::configuration(format!(
                "could not read {}: {e}",
                self.functions_dir.display()
            ))
        })?;

        let declared: BTreeMap<&str, Option<bool>> = self
            .spec
            .edge_functions
            .iter()
            .map(|f| (f.name.as_str(), f.verify_jwt))
            .collect();

        if let Some(orphan) = declared
            .keys()
            .find(|name| !slugs.iter().any(|s| s.as_str() == **name))
        {
            return Err(AuditError::configuration(format!(
                "edge function '{orphan}' has no source directory in {}",
                self.functions_dir.display()
            )));
        }

        Ok(slugs
            .iter()
            .map(|slug| {
                let desired = DesiredResource::new(function_key(slug));
                match declared.get(slug.as_str()).copied().flatten() {
                    Some(verify_jwt) => desired.with_attribute("verify_jwt", verify_jwt),
                    None => desired,
                }
            })
            .collect())
    }

    fn fetch_observed(&self) -> Result<Vec<ObservedResource>, AuditError> {
        check_supabase_access(self.backend.as_ref(), self.spec.project_ref.as_deref())?;

        let functions = self
            .backend
            .list_functions()
            .map_err(|e| audit_error(&e, "Supabase project"))?;

        Ok(functions
            .into_iter()
            .map(|f| {
                let remote_id = f.id.clone().unwrap_or_else(|| f.slug.clone());
                let mut observed = ObservedResource::new(function_key(&f.slug), remote_id);
                if let Some(verify_jwt) = f.verify_jwt {
                    observed = observed.with_attribute("verify_jwt", verify_jwt);
                }
                if let Some(status) = f.status {
                    observed = observed.with_attribute("status", status);
                }
                if let Some(version) = f.version {
                    observed = observed.with_attribute("version", version);
                }
                observed
            })
            .collect())
    }

    fn delete_policy(&self) -> DeletePolicy {
        self.policy
    }

    fn compared_attributes(&self) -> &'static [&'static str] {
        &["verify_jwt"]
    }

    fn render_action(&self, entry: &DiffEntry) -> Option<Action> {
        let action = render_action(DOMAIN, entry)?;
        let slug = action.key.name.clone();
        let summary = match &action.operation {
            Operation::Create { payload } => {
                format!("deploy edge function {slug}{}", jwt_suffix(payload))
            }
            Operation::Update { payload, .. } => {
                format!("redeploy edge function {slug}{}", jwt_suffix(payload))
            }
            Operation::Delete { .. } => format!("delete edge function {slug}"),
        };
        Some(action.with_summary(summary))
    }

    fn apply(&self, action: &Action) -> Result<()> {
        let slug = &action.key.name;
        match &action.operation {
            Operation::Create { payload } | Operation::Update { payload, .. } => self
                .backend
                .deploy_function(slug, payload_bool(payload, "verify_jwt"))
                .with_context(|| format!("Failed to deploy edge function {slug}")),
            Operation::Delete { .. } => self
                .backend
                .delete_function(slug)
                .with_context(|| format!("Failed to delete edge function {slug}")),
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
                    "Deleting edge function {} from the project",
                    observed.key.name
                )),
                _ => None,
            })
            .collect()
    }
}

fn jwt_suffix(payload: &declarative::Attributes) -> &'static str {
    match payload_bool(payload, "verify_jwt") {
        Some(false) => " (no JWT verification)",
        Some(true) => " (JWT verification)",
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EdgeFunctionDecl;
    use controlplane::supabase::{EdgeFunction, LocalMigration, ProjectInfo, RemoteMigration};
    use declarative::{Driver, Gates, NoopSink, RiskTier, RunOptions};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Deployed functions held in memory
    #[derive(Default)]
    struct FakeFunctions {
        deployed: Mutex<Vec<EdgeFunction>>,
        calls: Mutex<Vec<String>>,
        projects: Vec<ProjectInfo>,
        offline: bool,
        missing_cli: bool,
    }

    fn deployed(slug: &str, verify_jwt: Option<bool>) -> EdgeFunction {
        EdgeFunction {
            id: Some(format!("id-{slug}")),
            slug: slug.to_string(),
            name: Some(slug.to_string()),
            status: Some("ACTIVE".to_string()),
            version: Some(1),
            verify_jwt,
        }
    }

    fn project(reference: &str) -> ProjectInfo {
        ProjectInfo {
            id: Some(reference.to_string()),
            reference: None,
            name: Some("app".to_string()),
            region: Some("eu-central-1".to_string()),
        }
    }

    impl SupabaseBackend for FakeFunctions {
        fn check_available(&self) -> controlplane::Result<()> {
            if self.missing_cli {
                return Err(controlplane::Error::ToolNotFound {
                    tool: "supabase".into(),
                });
            }
            Ok(())
        }

        fn list_projects(&self) -> controlplane::Result<Vec<ProjectInfo>> {
            self.calls.lock().unwrap().push("projects".to_string());
            Ok(self.projects.clone())
        }

        fn list_migrations(&self) -> controlplane::Result<Vec<RemoteMigration>> {
            Ok(Vec::new())
        }

        fn apply_migration(&self, _migration: &LocalMigration) -> controlplane::Result<()> {
            Ok(())
        }

        fn revert_migration(&self, _version: &str) -> controlplane::Result<()> {
            Ok(())
        }

        fn list_functions(&self) -> controlplane::Result<Vec<EdgeFunction>> {
            if self.offline {
                return Err(controlplane::Error::Unavailable {
                    tool: "supabase".into(),
                    message: "connection refused".into(),
                });
            }
            Ok(self.deployed.lock().unwrap().clone())
        }

        fn deploy_function(&self, slug: &str, verify_jwt: Option<bool>) -> controlplane::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("deploy {slug} {verify_jwt:?}"));
            let mut functions = self.deployed.lock().unwrap();
            functions.retain(|f| f.slug != slug);
            functions.push(deployed(slug, Some(verify_jwt.unwrap_or(true))));
            Ok(())
        }

        fn delete_function(&self, slug: &str) -> controlplane::Result<()> {
            self.calls.lock().unwrap().push(format!("delete {slug}"));
            self.deployed.lock().unwrap().retain(|f| f.slug != slug);
            Ok(())
        }
    }

    /// Project root with `supabase/functions/<slug>/index.ts` per slug
    fn functions_dir(slugs: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let functions = source_dir(&dir);
        for slug in slugs {
            fs::create_dir_all(functions.join(slug)).unwrap();
            fs::write(functions.join(slug).join("index.ts"), "").unwrap();
        }
        fs::create_dir_all(functions.join("_shared")).unwrap();
        dir
    }

    fn source_dir(dir: &TempDir) -> PathBuf {
        dir.path().join("supabase").join("functions")
    }

    fn adapter(
        dir: &TempDir,
        declared: Vec<EdgeFunctionDecl>,
        delete_unmanaged: bool,
        backend: &Arc<FakeFunctions>,
    ) -> EdgeFunctionAdapter {
        let spec = SupabaseSpec {
            functions_dir: source_dir(dir).display().to_string(),
            edge_functions: declared,
            delete_unmanaged,
            ..Default::default()
        };
        let backend: Arc<dyn SupabaseBackend> = backend.clone();
        EdgeFunctionAdapter::new(&spec, backend)
    }

    fn entries(adapter: &EdgeFunctionAdapter) -> Vec<DiffEntry> {
        adapter
            .diff(
                &adapter.fetch_observed().unwrap(),
                &adapter.desired().unwrap(),
                adapter.delete_policy(),
            )
            .unwrap()
    }

    #[test]
    fn test_undeployed_function_is_safe_deploy() {
        let dir = functions_dir(&["billing", "hello"]);
        let backend = Arc::new(FakeFunctions {
            deployed: Mutex::new(vec![deployed("hello", Some(true))]),
            ..Default::default()
        });
        let adapter = adapter(&dir, Vec::new(), false, &backend);

        let entries = entries(&adapter);
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], DiffEntry::Add(_)));
        assert!(matches!(entries[1], DiffEntry::Unchanged(_)));

        let action = adapter.render_action(&entries[0]).unwrap();
        assert_eq!(action.risk(), RiskTier::Safe);
        assert_eq!(action.summary, "deploy edge function billing");
    }

    #[test]
    fn test_declared_verify_jwt_mismatch_is_risky_redeploy() {
        let dir = functions_dir(&["hello"]);
        let backend = Arc::new(FakeFunctions {
            deployed: Mutex::new(vec![deployed("hello", Some(true))]),
            ..Default::default()
        });
        let declared = vec![EdgeFunctionDecl {
            name: "hello".into(),
            verify_jwt: Some(false),
        }];
        let adapter = adapter(&dir, declared, false, &backend);

        let entries = entries(&adapter);
        let action = adapter.render_action(&entries[0]).unwrap();
        assert_eq!(action.risk(), RiskTier::Risky);
        assert_eq!(
            action.summary,
            "redeploy edge function hello (no JWT verification)"
        );

        adapter.apply(&action).unwrap();
        assert_eq!(*backend.calls.lock().unwrap(), vec!["deploy hello Some(false)"]);
    }

    #[test]
    fn test_declared_function_without_source_is_configuration_error() {
        let dir = functions_dir(&["hello"]);
        let declared = vec![EdgeFunctionDecl {
            name: "ghost".into(),
            verify_jwt: None,
        }];
        let adapter = adapter(&dir, declared, false, &Arc::new(FakeFunctions::default()));

        let err = adapter.desired().unwrap_err();
        assert!(err.to_string().contains("edge function 'ghost' has no source directory"));
        assert!(adapter.advise(&err).manual_steps[0].starts_with("Fix the"));
    }

    #[test]
    fn test_missing_directory_without_declarations_is_empty() {
        let dir = TempDir::new().unwrap();
        let spec = SupabaseSpec {
            functions_dir: source_dir(&dir).display().to_string(),
            ..Default::default()
        };
        let backend: Arc<dyn SupabaseBackend> = Arc::new(FakeFunctions::default());
        let adapter = EdgeFunctionAdapter::new(&spec, backend);
        assert!(adapter.desired().unwrap().is_empty());

        let spec = SupabaseSpec {
            delete_unmanaged: true,
            ..spec
        };
        let backend: Arc<dyn SupabaseBackend> = Arc::new(FakeFunctions::default());
        let adapter = EdgeFunctionAdapter::new(&spec, backend);
        assert!(matches!(
            adapter.desired(),
            Err(AuditError::Configuration { .. })
        ));
    }

    #[test]
    fn test_unreachable_project_advises_login() {
        let dir = functions_dir(&["hello"]);
        let backend = Arc::new(FakeFunctions {
            offline: true,
            ..Default::default()
        });
        let adapter = adapter(&dir, Vec::new(), false, &backend);

        let err = adapter.fetch_observed().unwrap_err();
        assert!(matches!(err, AuditError::RemoteUnavailable { .. }));
        assert_eq!(adapter.advise(&err).manual_steps[0], "Run: supabase login");
    }

    #[test]
    fn test_functions_outside_supabase_layout_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("edge").join("hello")).unwrap();
        let spec = SupabaseSpec {
            functions_dir: dir.path().join("edge").display().to_string(),
            ..Default::default()
        };
        let backend: Arc<dyn SupabaseBackend> = Arc::new(FakeFunctions::default());
        let adapter = EdgeFunctionAdapter::new(&spec, backend);

        let err = adapter.desired().unwrap_err();
        assert!(matches!(err, AuditError::Configuration { .. }));
        assert!(err.to_string().contains("must end in supabase/functions"));
    }

    #[test]
    fn test_configured_project_must_be_visible() {
        let dir = functions_dir(&["hello"]);
        let spec = SupabaseSpec {
            project_ref: Some("abcdefghijklmnop".into()),
            functions_dir: source_dir(&dir).display().to_string(),
            ..Default::default()
        };

        let visible = Arc::new(FakeFunctions {
            projects: vec![project("zzzz"), project("abcdefghijklmnop")],
            ..Default::default()
        });
        let backend: Arc<dyn SupabaseBackend> = visible.clone();
        assert!(EdgeFunctionAdapter::new(&spec, backend).fetch_observed().is_ok());
        assert_eq!(*visible.calls.lock().unwrap(), vec!["projects"]);

        let backend: Arc<dyn SupabaseBackend> = Arc::new(FakeFunctions {
            projects: vec![project("zzzz")],
            deployed: Mutex::new(vec![deployed("hello", None)]),
            ..Default::default()
        });
        let adapter = EdgeFunctionAdapter::new(&spec, backend);
        let err = adapter.fetch_observed().unwrap_err();
        assert_eq!(
            err,
            AuditError::ScopeNotFound {
                scope: "Supabase project 'abcdefghijklmnop'".into()
            }
        );

        let advice = adapter.advise(&err);
        assert!(advice.risks[0].starts_with("Cannot access Supabase project - check authentication"));
        assert_eq!(advice.manual_steps[0], "Run: supabase login");
    }

    #[test]
    fn test_missing_cli_reported_before_any_fetch() {
        let dir = functions_dir(&["hello"]);
        let backend = Arc::new(FakeFunctions {
            missing_cli: true,
            offline: true,
            ..Default::default()
        });
        let adapter = adapter(&dir, Vec::new(), false, &backend);

        let err = adapter.fetch_observed().unwrap_err();
        assert!(matches!(err, AuditError::RemoteUnavailable { .. }));
        assert!(err.to_string().contains("supabase not found in PATH"));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unmanaged_function_deleted_with_confirmation() {
        let dir = functions_dir(&["hello"]);
        let backend = Arc::new(FakeFunctions {
            deployed: Mutex::new(vec![deployed("hello", None), deployed("legacy", None)]),
            ..Default::default()
        });
        let adapters: Vec<declarative::BoxedAdapter> =
            vec![Box::new(adapter(&dir, Vec::new(), true, &backend))];

        let report = Driver::new(&adapters, &NoopSink).run(&RunOptions {
            audit_only: false,
            gates: Gates::new(true, true),
        });

        assert_eq!(*backend.calls.lock().unwrap(), vec!["delete legacy"]);
        assert_eq!(
            report.audit.risks().collect::<Vec<_>>(),
            vec!["Deleting edge function legacy from the project"]
        );
        assert!(report.verification.as_ref().unwrap().is_converged());
    }
}
