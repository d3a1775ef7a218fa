//! Supabase backend using the `supabase` CLI and `psql`.

use crate::error::{Error, Result};
use crate::process::{require_tool, run_checked};
use crate::retry::{LogCallback, RetryConfig, with_retry};
use crate::supabase::SupabaseBackend;
use crate::supabase::types::{EdgeFunction, LocalMigration, ProjectInfo, RemoteMigration};
use std::path::PathBuf;
use std::time::Duration;

/// Connection settings for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupabaseSettings {
    /// Project ref used by function commands
    pub project_ref: Option<String>,
    /// Postgres connection string used by migration commands
    pub database_url: Option<String>,
    /// Directory containing the project's `supabase/` folder
    pub workdir: Option<PathBuf>,
}

/// Backend that executes real `supabase` and `psql` commands.
pub struct SupabaseCli {
    program: String,
    psql: String,
    settings: SupabaseSettings,
    timeout: Duration,
    retry: RetryConfig,
}

impl SupabaseCli {
    pub fn new(settings: SupabaseSettings, timeout: Duration) -> Self {
        Self {
            program: "supabase".to_string(),
            psql: "psql".to_string(),
            settings,
            timeout,
            retry: RetryConfig::default(),
        }
    }

    /// Retry policy for read calls.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Use different executables (path or name).
    pub fn with_programs(mut self, supabase: impl Into<String>, psql: impl Into<String>) -> Self {
        self.program = supabase.into();
        self.psql = psql.into();
        self
    }

    fn project_ref(&self) -> Result<&str> {
        self.settings
            .project_ref
            .as_deref()
            .ok_or_else(|| Error::MissingSetting {
                setting: "project_ref".to_string(),
            })
    }

    fn database_url(&self) -> Result<&str> {
        self.settings
            .database_url
            .as_deref()
            .ok_or_else(|| Error::MissingSetting {
                setting: "database_url".to_string(),
            })
    }

    /// `--db-url <url>` when a database URL is set, `--linked` otherwise
    fn migration_target(&self) -> Vec<String> {
        match &self.settings.database_url {
            Some(url) => vec!["--db-url".to_string(), url.clone()],
            None => vec!["--linked".to_string()],
        }
    }

    fn supabase(&self, mut args: Vec<String>, subject: Option<&str>) -> Result<String> {
        if let Some(dir) = &self.settings.workdir {
            args.push("--workdir".to_string());
            args.push(dir.display().to_string());
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_checked(&self.program, &args, self.timeout, subject)
    }

    /// Run a read-only supabase command, retrying transient failures.
    fn supabase_read(&self, args: Vec<String>, subject: Option<&str>) -> Result<String> {
        with_retry(&self.retry, Some(&LogCallback), || {
            self.supabase(args.clone(), subject)
        })
    }
}

impl SupabaseBackend for SupabaseCli {
    fn check_available(&self) -> Result<()> {
        let path = require_tool(&self.program)?;
        log::debug!("Using supabase at {}", path.display());
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<ProjectInfo>> {
        let stdout = self.supabase_read(strings(&["projects", "list", "--output", "json"]), None)?;
        let projects: Option<Vec<ProjectInfo>> =
            serde_json::from_str(&stdout).map_err(|e| Error::parse("supabase projects list", e))?;
        Ok(projects.unwrap_or_default())
    }

    fn list_migrations(&self) -> Result<Vec<RemoteMigration>> {
        let mut args = strings(&["migration", "list"]);
        args.extend(self.migration_target());
        let stdout = self.supabase_read(args, Some("migration history"))?;

        Ok(parse_migration_list(&stdout)?
            .into_iter()
            .filter_map(|row| row.remote)
            .map(|version| RemoteMigration { version })
            .collect())
    }

    fn apply_migration(&self, migration: &LocalMigration) -> Result<()> {
        let url = self.database_url()?;
        let path = migration.path.display().to_string();

        run_checked(
            &self.psql,
            &[url, "-v", "ON_ERROR_STOP=1", "-f", &path],
            self.timeout,
            Some(&migration.version),
        )?;

        let mut args = strings(&["migration", "repair", "--status", "applied"]);
        args.push(migration.version.clone());
        args.extend(self.migration_target());
        self.supabase(args, Some(&migration.version))?;
        Ok(())
    }

    fn revert_migration(&self, version: &str) -> Result<()> {
        let mut args = strings(&["migration", "repair", "--status", "reverted", version]);
        args.extend(self.migration_target());
        self.supabase(args, Some(version))?;
        Ok(())
    }

    fn list_functions(&self) -> Result<Vec<EdgeFunction>> {
        let project_ref = self.project_ref()?;
        let stdout = self.supabase_read(
            strings(&["functions", "list", "--project-ref", project_ref, "--output", "json"]),
            Some(project_ref),
        )?;
        let functions: Option<Vec<EdgeFunction>> =
            serde_json::from_str(&stdout).map_err(|e| Error::parse("supabase functions list", e))?;
        Ok(functions.unwrap_or_default())
    }

    fn deploy_function(&self, slug: &str, verify_jwt: Option<bool>) -> Result<()> {
        let project_ref = self.project_ref()?;
        self.supabase(deploy_args(slug, project_ref, verify_jwt), Some(slug))?;
        Ok(())
    }

    fn delete_function(&self, slug: &str) -> Result<()> {
        let project_ref = self.project_ref()?;
        self.supabase(
            strings(&["functions", "delete", slug, "--project-ref", project_ref]),
            Some(slug),
        )?;
        Ok(())
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

fn deploy_args(slug: &str, project_ref: &str, verify_jwt: Option<bool>) -> Vec<String> {
    let mut args = strings(&["functions", "deploy", slug, "--project-ref", project_ref]);
    if verify_jwt == Some(false) {
        args.push("--no-verify-jwt".to_string());
    }
    args
}

/// One row of `supabase migration list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationRow {
    /// Version present in the local migrations directory
    pub local: Option<String>,
    /// Version present in the remote migration history
    pub remote: Option<String>,
}

/// Parse the table printed by `supabase migration list`.
///
/// Current CLIs print `Local | Remote | Time (UTC)` columns; older ones print
/// a migration name and an `Applied`/`Not applied` status. Both `|` and `│`
/// separators are accepted. Rule lines and chatter around the table are
/// skipped.
///
/// Output with no recognisable header or row is an error, not an empty
/// history: an unknown format must not read as "nothing applied".
pub fn parse_migration_list(output: &str) -> Result<Vec<MigrationRow>> {
    let mut rows = Vec::new();
    let mut header_seen = false;

    for line in output.lines() {
        let separator = if line.contains('│') {
            '│'
        } else if line.contains('|') {
            '|'
        } else {
            continue;
        };

        // A bordered table has a separator in the first column; an empty
        // leading cell padded with spaces is a real (blank) column.
        let inner = line.trim_end();
        let inner = inner.strip_prefix(separator).unwrap_or(inner);
        let inner = inner.strip_suffix(separator).unwrap_or(inner);
        let cells: Vec<&str> = inner.split(separator).map(str::trim).collect();
        if cells.len() < 2 {
            continue;
        }

        if is_header(&cells) {
            header_seen = true;
            continue;
        }

        let status = cells[1].to_lowercase();
        let row = if status.contains("applied") || status.contains("pending") {
            let Some(version) = version_of(cells[0]) else {
                continue;
            };
            let applied = !status.contains("not applied") && !status.contains("pending");
            MigrationRow {
                local: Some(version.clone()),
                remote: applied.then_some(version),
            }
        } else {
            let local = version_of(cells[0]);
            let remote = version_of(cells[1]);
            if local.is_none() && remote.is_none() {
                continue;
            }
            MigrationRow { local, remote }
        };
        rows.push(row);
    }

    if rows.is_empty() && !header_seen && !output.trim().is_empty() {
        let first = output.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
        return Err(Error::parse(
            "supabase migration list",
            format!("no migration table in output (starts with {:?})", first.trim()),
        ));
    }

    Ok(rows)
}

/// `Local | Remote | ...` or `Name | Status`
fn is_header(cells: &[&str]) -> bool {
    let first = cells[0].to_lowercase();
    let second = cells[1].to_lowercase();
    (first == "local" && second == "remote") || (first == "name" && second == "status")
}

/// Leading digits of a cell such as `20240101000000` or `20240101000000_init`
fn version_of(cell: &str) -> Option<String> {
    let version: String = cell.chars().take_while(char::is_ascii_digit).collect();
    (!version.is_empty()).then_some(version)
}
