//! Best-effort repository context discovery
//!
//! Nothing found here is required for a run; it only tells the operator what
//! infrastructure material lives next to the configuration.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// How deep below the root to look
const MAX_DEPTH: usize = 4;

/// Directory names never descended into
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Directory names that mark infrastructure code
const INFRA_DIR_NAMES: &[&str] = &["infra", "infrastructure", "terraform", "pulumi"];

/// Context found around the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoContext {
    pub root: PathBuf,
    pub infra_dirs: Vec<PathBuf>,
    pub supabase_dirs: Vec<PathBuf>,
    pub dns_files: Vec<PathBuf>,
}

impl RepoContext {
    pub fn is_empty(&self) -> bool {
        self.infra_dirs.is_empty() && self.supabase_dirs.is_empty() && self.dns_files.is_empty()
    }
}

/// Scan `root` for infrastructure directories, Supabase projects and DNS files
///
/// Unreadable entries are skipped.
pub fn discover(root: &Path) -> RepoContext {
    let mut context = RepoContext {
        root: root.to_path_buf(),
        ..RepoContext::default()
    };

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping unreadable path during discovery: {e}");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            if INFRA_DIR_NAMES.contains(&name.as_ref()) {
                context.infra_dirs.push(entry.path().to_path_buf());
            }
            if name == "supabase" {
                context.supabase_dirs.push(entry.path().to_path_buf());
            }
        } else if entry.file_type().is_file() && is_dns_file(entry.path()) {
            context.dns_files.push(entry.path().to_path_buf());
        }
    }

    log::debug!(
        "Discovered {} infra dir(s), {} supabase dir(s), {} DNS file(s) under {}",
        context.infra_dirs.len(),
        context.supabase_dirs.len(),
        context.dns_files.len(),
        root.display()
    );
    context
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

/// YAML files directly under a `dns/` or `infra/do/` directory
fn is_dns_file(path: &Path) -> bool {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yaml" || e == "yml");
    if !is_yaml {
        return false;
    }

    let Some(parent) = path.parent() else {
        return false;
    };
    let parent_name = parent.file_name().and_then(|n| n.to_str());
    match parent_name {
        Some("dns") => true,
        Some("do") => parent
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            == Some("infra"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discover_repo_layout() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "infra/do/zone.yaml");
        touch(root, "infra/auditor/config/infra_spec.yaml");
        touch(root, "ops/dns/records.yml");
        touch(root, "ops/dns/notes.txt");
        touch(root, "supabase/migrations/20240101000000_init.sql");
        fs::create_dir_all(root.join("terraform")).unwrap();

        let context = discover(root);

        assert_eq!(
            context.infra_dirs,
            vec![root.join("infra"), root.join("terraform")]
        );
        assert_eq!(context.supabase_dirs, vec![root.join("supabase")]);
        assert_eq!(
            context.dns_files,
            vec![root.join("infra/do/zone.yaml"), root.join("ops/dns/records.yml")]
        );
        assert!(!context.is_empty());
    }

    #[test]
    fn test_discover_skips_vendored_trees() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "node_modules/pkg/supabase/config.toml");
        touch(root, "target/debug/dns/x.yaml");
        touch(root, ".git/infra/HEAD");

        assert!(discover(root).is_empty());
    }

    #[test]
    fn test_discover_respects_depth() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c/d/supabase")).unwrap();

        assert!(discover(root).supabase_dirs.is_empty());
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = TempDir::new().unwrap();
        let context = discover(&dir.path().join("missing"));
        assert!(context.is_empty());
    }

    #[test]
    fn test_is_dns_file() {
        assert!(is_dns_file(Path::new("repo/dns/a.yaml")));
        assert!(is_dns_file(Path::new("repo/infra/do/a.yml")));
        assert!(!is_dns_file(Path::new("repo/other/do/a.yml")));
        assert!(!is_dns_file(Path::new("repo/dns/a.json")));
    }
}
