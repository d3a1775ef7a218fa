//! DNS zone adapter
//!
//! Reconciles the records of one DigitalOcean zone. Records are keyed by
//! `(dns, TYPE, name)`; `data` and `ttl` decide whether a record matches,
//! plus `priority` where one is declared.

use anyhow::{Context, Result, bail};
use controlplane::dns::{DEFAULT_TTL, DnsBackend, DnsRecord, RecordSpec};
use declarative::{
    Action, Advisory, AuditError, DeletePolicy, DesiredResource, DiffEntry, NaturalKey,
    ObservedResource, Operation, ResourceAdapter, render_action,
};
use std::fmt;
use std::sync::Arc;

use super::{audit_error, payload_str, payload_u64};
use crate::config::{DnsSpec, DomainSpec, RecordDecl};

const KIND: &str = "dns";

const DOCTL_INSTALL_URL: &str = "https://docs.digitalocean.com/reference/doctl/how-to/install/";

/// Records of one zone
pub struct DnsZoneAdapter {
    domain: String,
    zone: DomainSpec,
    ignore_types: Vec<String>,
    policy: DeletePolicy,
    backend: Arc<dyn DnsBackend>,
}

impl DnsZoneAdapter {
    pub fn new(zone: &DomainSpec, dns: &DnsSpec, backend: Arc<dyn DnsBackend>) -> Self {
        Self {
            domain: format!("{KIND}:{}", zone.name),
            zone: zone.clone(),
            ignore_types: dns
                .ignore_types
                .iter()
                .map(|t| t.to_ascii_uppercase())
                .collect(),
            policy: DeletePolicy::from_flag(zone.deletes_unmanaged(dns)),
            backend,
        }
    }

    fn zone_name(&self) -> &str {
        &self.zone.name
    }

    fn is_ignored(&self, record_type: &str) -> bool {
        self.ignore_types
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(record_type))
    }

    fn record_spec(key: &NaturalKey, payload: &declarative::Attributes) -> Result<RecordSpec> {
        let data = payload_str(payload, "data")?;
        Ok(RecordSpec::new(&key.category, &key.name, data)
            .with_ttl(payload_u64(payload, "ttl").unwrap_or(DEFAULT_TTL))
            .with_priority(payload_u64(payload, "priority")))
    }
}

impl fmt::Debug for DnsZoneAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsZoneAdapter")
            .field("domain", &self.domain)
            .field("records", &self.zone.records.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn desired_record(record: &RecordDecl) -> DesiredResource {
    let key = NaturalKey::new(KIND, record.record_type.to_ascii_uppercase(), &record.name);
    let mut desired = DesiredResource::new(key)
        .with_attribute("data", record.data.as_str())
        .with_attribute("ttl", record.ttl.unwrap_or(DEFAULT_TTL));
    if let Some(priority) = record.priority {
        desired = desired.with_attribute("priority", priority);
    }
    desired
}

fn observed_record(record: &DnsRecord) -> ObservedResource {
    let key = NaturalKey::new(KIND, record.record_type.to_ascii_uppercase(), &record.name);
    let mut observed =
        ObservedResource::new(key, record.id.to_string()).with_attribute("data", record.data.as_str());
    if let Some(ttl) = record.ttl {
        observed = observed.with_attribute("ttl", ttl);
    }
    if let Some(priority) = record.priority {
        observed = observed.with_attribute("priority", priority);
    }
    observed
}

/// `A api -> 1.2.3.4 (ttl 3600)`
fn describe(key: &NaturalKey, payload: &declarative::Attributes) -> String {
    let data = payload
        .get("data")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("N/A");
    let mut line = format!("{} {} -> {data}", key.category, key.name);
    if let Some(ttl) = payload_u64(payload, "ttl") {
        line.push_str(&format!(" (ttl {ttl})"));
    }
    if let Some(priority) = payload_u64(payload, "priority") {
        line.push_str(&format!(" (priority {priority})"));
    }
    line
}

impl ResourceAdapter for DnsZoneAdapter {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn desired(&self) -> Result<Vec<DesiredResource>, AuditError> {
        self.zone
            .validate()
            .map_err(|e| AuditError::configuration(format!("{e:#}")))?;

        Ok(self
            .zone
            .records
            .iter()
            .filter(|record| !self.is_ignored(&record.record_type))
            .map(desired_record)
            .collect())
    }

    fn fetch_observed(&self) -> Result<Vec<ObservedResource>, AuditError> {
        let scope = format!("Domain '{}'", self.zone_name());

        if let Err(e) = self.backend.check_available() {
            log::warn!("Install doctl: {DOCTL_INSTALL_URL}");
            return Err(audit_error(&e, &scope));
        }
        let account = self.backend.account().map_err(|e| audit_error(&e, &scope))?;
        log::debug!(
            "DigitalOcean account: {}",
            account.email.as_deref().unwrap_or("unknown")
        );

        let zones = self
            .backend
            .list_domains()
            .map_err(|e| audit_error(&e, &scope))?;
        if !zones.iter().any(|z| z == self.zone_name()) {
            return Err(AuditError::ScopeNotFound { scope });
        }

        let records = self
            .backend
            .list_records(self.zone_name())
            .map_err(|e| audit_error(&e, &scope))?;
        log::debug!("{}: {} record(s) reported", self.domain, records.len());

        Ok(records
            .iter()
            .filter(|record| !self.is_ignored(&record.record_type))
            .map(observed_record)
            .collect())
    }

    fn delete_policy(&self) -> DeletePolicy {
        self.policy
    }

    fn compared_attributes(&self) -> &'static [&'static str] {
        &["data", "ttl", "priority"]
    }

    fn render_action(&self, entry: &DiffEntry) -> Option<Action> {
        let action = render_action(&self.domain, entry)?;
        let summary = match &action.operation {
            Operation::Create { payload } => format!("create {}", describe(&action.key, payload)),
            Operation::Update { remote_id, payload } => format!(
                "update {} [id {remote_id}]",
                describe(&action.key, payload)
            ),
            Operation::Delete { remote_id } => format!(
                "delete {} {} [id {remote_id}]",
                action.key.category, action.key.name
            ),
        };
        Some(action.with_summary(summary))
    }

    fn apply(&self, action: &Action) -> Result<()> {
        let zone = self.zone_name();
        match &action.operation {
            Operation::Create { payload } => {
                let record = Self::record_spec(&action.key, payload)?;
                self.backend
                    .create_record(zone, &record)
                    .with_context(|| format!("Failed to create {} in {zone}", action.key))
            }
            Operation::Update { remote_id, payload } => {
                let record = Self::record_spec(&action.key, payload)?;
                self.backend
                    .update_record(zone, remote_id, &record)
                    .with_context(|| format!("Failed to update {} in {zone}", action.key))
            }
            Operation::Delete { remote_id } => {
                if remote_id.is_empty() {
                    bail!("cannot delete {} without a record id", action.key);
                }
                self.backend
                    .delete_record(zone, remote_id)
                    .with_context(|| format!("Failed to delete {} in {zone}", action.key))
            }
        }
    }

    fn advise(&self, error: &AuditError) -> Advisory {
        let zone = self.zone_name();
        match error {
            AuditError::ScopeNotFound { .. } => Advisory {
                risks: vec![format!("Domain '{zone}' not found in DigitalOcean account")],
                manual_steps: vec![format!("Create domain '{zone}' in DigitalOcean")],
            },
            AuditError::Unauthenticated { .. } | AuditError::RemoteUnavailable { .. } => Advisory {
                risks: vec![format!(
                    "Cannot access DigitalOcean account - check doctl auth ({error})"
                )],
                manual_steps: vec!["Run: doctl auth init".to_string()],
            },
            _ => Advisory::for_error(&self.domain, error),
        }
    }

    fn issue_risks(&self, entries: &[DiffEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(|entry| match entry {
                DiffEntry::Delete(observed) => Some(format!(
                    "Deleting {} {} in {}",
                    observed.key.category,
                    observed.key.name,
                    self.zone_name()
                )),
                _ => None,
            })
            .collect()
    }
}
