//! Wire and filesystem types for Supabase projects.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A project visible to the authenticated CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl ProjectInfo {
    /// Project ref, whichever field the CLI version reports it in
    pub fn project_ref(&self) -> Option<&str> {
        self.reference.as_deref().or(self.id.as_deref())
    }
}

/// A migration recorded in the remote migration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteMigration {
    pub version: String,
}

/// A migration file under the local migrations directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalMigration {
    pub version: String,
    pub name: String,
    pub path: PathBuf,
}

impl LocalMigration {
    /// Parse `<version>_<name>.sql`; the version must be all digits.
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let (version, name) = match stem.split_once('_') {
            Some((version, name)) => (version, name),
            None => (stem, ""),
        };
        if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            version: version.to_string(),
            name: name.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Every migration file in `dir`, ordered by version.
    ///
    /// Files that do not follow the naming scheme are ignored. A missing
    /// directory yields no migrations.
    pub fn scan(dir: &Path) -> Result<Vec<Self>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut migrations = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file()
                && let Some(migration) = Self::from_path(&path)
            {
                migrations.push(migration);
            }
        }
        migrations.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(migrations)
    }
}

/// A deployed edge function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EdgeFunction {
    #[serde(default)]
    pub id: Option<String>,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub verify_jwt: Option<bool>,
}

/// Edge function source directories under `dir`.
///
/// Directories whose name starts with `_` (shared code) or `.` are skipped.
pub fn scan_function_dirs(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut slugs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }
        slugs.push(name);
    }
    slugs.sort();
    Ok(slugs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_migration_from_path() {
        let m = LocalMigration::from_path(Path::new("m/20240101000000_create_users.sql")).unwrap();
        assert_eq!(m.version, "20240101000000");
        assert_eq!(m.name, "create_users");

        assert!(LocalMigration::from_path(Path::new("m/README.md")).is_none());
        assert!(LocalMigration::from_path(Path::new("m/seed_data.sql")).is_none());
        assert_eq!(
            LocalMigration::from_path(Path::new("m/20240101.sql"))
                .unwrap()
                .name,
            ""
        );
    }

    #[test]
    fn test_scan_migrations_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20240201000000_second.sql"), "select 2;").unwrap();
        fs::write(dir.path().join("20240101000000_first.sql"), "select 1;").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let migrations = LocalMigration::scan(dir.path()).unwrap();
        let versions: Vec<&str> = migrations.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, vec!["20240101000000", "20240201000000"]);
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(LocalMigration::scan(&dir.path().join("nope")).unwrap().is_empty());
        assert!(scan_function_dirs(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_scan_function_dirs_skips_shared() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("hello")).unwrap();
        fs::create_dir(dir.path().join("_shared")).unwrap();
        fs::create_dir(dir.path().join(".temp")).unwrap();
        fs::create_dir(dir.path().join("billing")).unwrap();
        fs::write(dir.path().join("import_map.json"), "{}").unwrap();

        assert_eq!(scan_function_dirs(dir.path()).unwrap(), vec!["billing", "hello"]);
    }

    #[test]
    fn test_project_ref_prefers_ref_field() {
        let project: ProjectInfo =
            serde_json::from_str(r#"{"id": "abc", "ref": "xyz", "name": "demo"}"#).unwrap();
        assert_eq!(project.project_ref(), Some("xyz"));

        let legacy: ProjectInfo = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(legacy.project_ref(), Some("abc"));
    }
}
