//! Infrastructure spec loading and discovery
//!
//! The desired state lives in one document, YAML by default, with TOML and
//! JSON accepted by extension. Sections are validated lazily by the adapter
//! that owns them so a broken DNS zone does not hide the Supabase audit.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no config path is given
const DISCOVERY_STEMS: &[&str] = &[
    "infra/auditor/config/infra_spec",
    "infra/config/infra_spec",
    ".infra_spec",
];

/// Extensions tried for each discovery stem
const DISCOVERY_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Environment variable consulted when `supabase.database_url` is unset
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

// ============================================================================
// Format
// ============================================================================

/// Serialization format of a spec document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Spec Schema
// ============================================================================

/// Desired state of every managed resource domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraSpec {
    #[serde(default)]
    pub dns: DnsSpec,

    /// Absent when no Supabase project is managed
    #[serde(default)]
    pub supabase: Option<SupabaseSpec>,

    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsSpec {
    /// Delete records that exist remotely but are not declared
    #[serde(default)]
    pub delete_unmanaged: bool,

    /// Record types never audited (provider-managed)
    #[serde(default = "default_ignore_types")]
    pub ignore_types: Vec<String>,

    #[serde(default)]
    pub domains: Vec<DomainSpec>,
}

impl Default for DnsSpec {
    fn default() -> Self {
        Self {
            delete_unmanaged: false,
            ignore_types: default_ignore_types(),
            domains: Vec::new(),
        }
    }
}

fn default_ignore_types() -> Vec<String> {
    vec!["NS".to_string(), "SOA".to_string()]
}

/// One DNS zone and its declared records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub name: String,

    /// Overrides `dns.delete_unmanaged` for this zone
    #[serde(default)]
    pub delete_unmanaged: Option<bool>,

    #[serde(default)]
    pub records: Vec<RecordDecl>,
}

impl DomainSpec {
    /// Zone-level delete flag, falling back to the DNS-wide one
    pub fn deletes_unmanaged(&self, dns: &DnsSpec) -> bool {
        self.delete_unmanaged.unwrap_or(dns.delete_unmanaged)
    }

    /// Validate the zone declaration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Domain name cannot be empty");
        }

        for (index, record) in self.records.iter().enumerate() {
            record
                .validate()
                .with_context(|| format!("Invalid record #{} in '{}'", index + 1, self.name))?;
        }

        Ok(())
    }
}

/// A declared DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDecl {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub data: String,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub priority: Option<u64>,
}

impl RecordDecl {
    pub fn validate(&self) -> Result<()> {
        if self.record_type.trim().is_empty() {
            bail!("Record type cannot be empty");
        }
        if self.name.trim().is_empty() {
            bail!("Record name cannot be empty (use '@' for the zone apex)");
        }
        if self.data.trim().is_empty() {
            bail!("Record data cannot be empty for {} {}", self.record_type, self.name);
        }
        if self.ttl == Some(0) {
            bail!("Record TTL must be positive for {} {}", self.record_type, self.name);
        }
        Ok(())
    }
}

/// A Supabase project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupabaseSpec {
    #[serde(default)]
    pub project_ref: Option<String>,

    /// Informational; shown in the report
    #[serde(default)]
    pub project_url: Option<String>,

    /// Falls back to the `DATABASE_URL` environment variable
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,

    #[serde(default = "default_functions_dir")]
    pub functions_dir: String,

    /// Revert remote migrations and delete functions that are not declared locally
    #[serde(default)]
    pub delete_unmanaged: bool,

    /// Per-function settings; every function directory is managed regardless
    #[serde(default)]
    pub edge_functions: Vec<EdgeFunctionDecl>,
}

impl Default for SupabaseSpec {
    fn default() -> Self {
        Self {
            project_ref: None,
            project_url: None,
            database_url: None,
            migrations_dir: default_migrations_dir(),
            functions_dir: default_functions_dir(),
            delete_unmanaged: false,
            edge_functions: Vec::new(),
        }
    }
}

fn default_migrations_dir() -> String {
    "supabase/migrations".to_string()
}

fn default_functions_dir() -> String {
    "supabase/functions".to_string()
}

impl SupabaseSpec {
    pub fn expanded_migrations_dir(&self) -> PathBuf {
        expand_path(&self.migrations_dir)
    }

    pub fn expanded_functions_dir(&self) -> PathBuf {
        expand_path(&self.functions_dir)
    }

    /// Directory the supabase CLI runs from to deploy `functions_dir`
    ///
    /// The CLI deploys `<workdir>/supabase/functions/<slug>`, so any other
    /// layout is rejected. `None` means the current directory.
    pub fn project_workdir(&self) -> Result<Option<PathBuf>> {
        let functions = self.expanded_functions_dir();
        let supabase = functions
            .parent()
            .filter(|_| functions.file_name() == Some(OsStr::new("functions")))
            .filter(|dir| dir.file_name() == Some(OsStr::new("supabase")));

        let Some(supabase) = supabase else {
            bail!(
                "functions_dir {} must end in supabase/functions; the supabase CLI only deploys from there",
                functions.display()
            );
        };
        Ok(supabase
            .parent()
            .filter(|root| !root.as_os_str().is_empty())
            .map(Path::to_path_buf))
    }

    /// Database URL from the document, else from the environment value given
    pub fn database_url_or(&self, env: Option<String>) -> Option<String> {
        self.database_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or(env.filter(|url| !url.trim().is_empty()))
    }

    /// Validate the edge function declarations
    pub fn validate_functions(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for function in &self.edge_functions {
            if function.name.trim().is_empty() {
                bail!("Edge function name cannot be empty");
            }
            if !seen.insert(function.name.as_str()) {
                bail!("Edge function '{}' is declared twice", function.name);
            }
        }
        Ok(())
    }
}

/// Settings for one declared edge function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeFunctionDecl {
    pub name: String,
    #[serde(default)]
    pub verify_jwt: Option<bool>,
}

/// Run settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Deadline for every remote call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_report_path")]
    pub report_path: String,

    /// Attempts for read calls that fail transiently
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            report_path: default_report_path(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl Settings {
    /// Validate run settings
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("settings.timeout_secs must be at least 1");
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    60
}

/// Report file written when neither the CLI nor the infrastructure spec names one
pub fn default_report_path() -> String {
    "infra_auditor_report.md".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

// ============================================================================
// Loading
// ============================================================================

impl InfraSpec {
    /// Load a spec document, picking the parser from the file extension
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).with_context(|| {
            format!(
                "Unsupported config format: {} (expected .yaml, .yml, .toml or .json)",
                path.display()
            )
        })?;

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        Self::parse(&content, format)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse a spec document
    ///
    /// An empty YAML document is an empty spec.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let spec: Self = match format {
            ConfigFormat::Yaml => {
                if content.trim().is_empty() {
                    return Ok(Self::default());
                }
                serde_yaml::from_str(content).context("Invalid YAML format")?
            }
            ConfigFormat::Toml => toml::from_str(content).context("Invalid TOML format")?,
            ConfigFormat::Json => serde_json::from_str(content).context("Invalid JSON format")?,
        };
        spec.settings.validate()?;
        Ok(spec)
    }

    pub fn expanded_report_path(&self) -> PathBuf {
        expand_path(&self.settings.report_path)
    }
}

/// First spec document found under `root` in discovery order
pub fn discover_config(root: &Path) -> Option<PathBuf> {
    DISCOVERY_STEMS.iter().find_map(|stem| {
        DISCOVERY_EXTENSIONS
            .iter()
            .map(|ext| root.join(format!("{stem}.{ext}")))
            .find(|candidate| candidate.is_file())
    })
}

/// Resolve the infrastructure spec path from the CLI value or discovery
///
/// An explicit path must exist. Finding nothing is an error: without a spec
/// there is nothing to reconcile.
pub fn resolve_config(explicit: Option<&Path>, root: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let expanded = expand_path(&path.to_string_lossy());
        if !expanded.is_file() {
            bail!("Config file not found: {}", expanded.display());
        }
        return Ok(expanded);
    }

    discover_config(root).with_context(|| {
        format!(
            "No infrastructure spec found under {} (looked for infra_spec.yaml in infra/auditor/config, infra/config and .infra_spec.yaml)",
            root.display()
        )
    })
}

/// Tilde-expand a path from the infrastructure spec or the command line
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// ============================================================================
// Tests
// ============================================================================
