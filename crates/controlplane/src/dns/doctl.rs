//! DigitalOcean DNS backend using `doctl` commands.

use crate::dns::DnsBackend;
use crate::dns::types::{AccountInfo, DnsRecord, DomainInfo, RecordSpec};
use crate::error::{Error, Result};
use crate::process::{require_tool, run_checked};
use crate::retry::{LogCallback, RetryConfig, with_retry};
use std::time::Duration;

/// Backend that executes real `doctl` commands.
pub struct DoctlBackend {
    program: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl DoctlBackend {
    /// Create a backend whose every call is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "doctl".to_string(),
            timeout,
            retry: RetryConfig::default(),
        }
    }

    /// Retry policy for read calls.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Use a different executable (path or name).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, args: &[&str], subject: Option<&str>) -> Result<String> {
        run_checked(&self.program, args, self.timeout, subject)
    }

    /// Run a read-only command, retrying transient failures.
    fn read(&self, args: &[&str], subject: Option<&str>) -> Result<String> {
        with_retry(&self.retry, Some(&LogCallback), || self.run(args, subject))
    }
}

impl DnsBackend for DoctlBackend {
    fn check_available(&self) -> Result<()> {
        let path = require_tool(&self.program)?;
        log::debug!("Using doctl at {}", path.display());
        Ok(())
    }

    fn account(&self) -> Result<AccountInfo> {
        let stdout = self.read(&["account", "get", "--output", "json"], None)?;
        serde_json::from_str(&stdout).map_err(|e| Error::parse("doctl account", e))
    }

    fn list_domains(&self) -> Result<Vec<String>> {
        let stdout = self.read(&["compute", "domain", "list", "--output", "json"], None)?;
        parse_domains(&stdout)
    }

    fn list_records(&self, domain: &str) -> Result<Vec<DnsRecord>> {
        let subject = format!("domain {domain}");
        let stdout = self.read(
            &["compute", "domain", "records", "list", domain, "--output", "json"],
            Some(&subject),
        )?;
        parse_records(&stdout)
    }

    fn create_record(&self, domain: &str, record: &RecordSpec) -> Result<()> {
        let mut args = vec!["compute", "domain", "records", "create", domain];
        let fields = record_args(record);
        args.extend(fields.iter().map(String::as_str));
        self.run(&args, Some(&record.name))?;
        Ok(())
    }

    fn update_record(&self, domain: &str, id: &str, record: &RecordSpec) -> Result<()> {
        let mut args = vec!["compute", "domain", "records", "update", domain, "--record-id", id];
        let fields = record_args(record);
        args.extend(fields.iter().map(String::as_str));
        self.run(&args, Some(&record.name))?;
        Ok(())
    }

    fn delete_record(&self, domain: &str, id: &str) -> Result<()> {
        self.run(
            &["compute", "domain", "records", "delete", domain, id, "--force"],
            Some(id),
        )?;
        Ok(())
    }
}

fn record_args(record: &RecordSpec) -> Vec<String> {
    let mut args = vec![
        "--record-type".to_string(),
        record.record_type.clone(),
        "--record-name".to_string(),
        record.name.clone(),
        "--record-data".to_string(),
        record.data.clone(),
        "--record-ttl".to_string(),
        record.ttl.to_string(),
    ];
    if let Some(priority) = record.priority {
        args.push("--record-priority".to_string());
        args.push(priority.to_string());
    }
    args
}

/// Parse `doctl compute domain list --output json`.
pub fn parse_domains(json: &str) -> Result<Vec<String>> {
    let domains: Vec<DomainInfo> =
        serde_json::from_str(json).map_err(|e| Error::parse("doctl domain list", e))?;
    Ok(domains.into_iter().map(|d| d.name).collect())
}

/// Parse `doctl compute domain records list --output json`.
///
/// `doctl` prints `null` rather than `[]` for an empty zone.
pub fn parse_records(json: &str) -> Result<Vec<DnsRecord>> {
    let records: Option<Vec<DnsRecord>> =
        serde_json::from_str(json).map_err(|e| Error::parse("doctl record list", e))?;
    Ok(records.unwrap_or_default())
}
