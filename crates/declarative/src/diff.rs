//! Diff computation between desired and observed state

use crate::error::{AuditError, StateSide};
use crate::types::{DeletePolicy, DesiredResource, DiffEntry, DiffKind, NaturalKey, ObservedResource};
use serde::Serialize;
use std::collections::HashMap;

/// Diff entries for one resource domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainDiff {
    pub domain: String,
    pub entries: Vec<DiffEntry>,
}

/// Compare observed against desired state
///
/// Desired keys are visited in declaration order, followed by observed-only
/// keys in the order the remote reported them, so unchanged input always
/// produces an identical diff. Observed-only keys become `Delete` entries only
/// when `policy` allows it. Duplicate keys on either side are an error.
pub fn compute_diff<F>(
    observed: &[ObservedResource],
    desired: &[DesiredResource],
    policy: DeletePolicy,
    matches: F,
) -> Result<Vec<DiffEntry>, AuditError>
where
    F: Fn(&ObservedResource, &DesiredResource) -> bool,
{
    let observed_by_key = index_by_key(observed, |o| &o.key, StateSide::Observed)?;
    let desired_by_key = index_by_key(desired, |d| &d.key, StateSide::Desired)?;

    let mut entries = Vec::with_capacity(desired.len());

    for wanted in desired {
        let entry = match observed_by_key.get(&wanted.key).copied() {
            None => DiffEntry::Add(wanted.clone()),
            Some(current) if matches(current, wanted) => DiffEntry::Unchanged(current.clone()),
            Some(current) => DiffEntry::Update {
                observed: current.clone(),
                desired: wanted.clone(),
            },
        };
        entries.push(entry);
    }

    if policy.deletes_unmanaged() {
        entries.extend(
            observed
                .iter()
                .filter(|o| !desired_by_key.contains_key(&o.key))
                .map(|o| DiffEntry::Delete(o.clone())),
        );
    }

    Ok(entries)
}

fn index_by_key<'a, T>(
    items: &'a [T],
    key_of: impl Fn(&T) -> &NaturalKey,
    side: StateSide,
) -> Result<HashMap<&'a NaturalKey, &'a T>, AuditError> {
    let mut index = HashMap::with_capacity(items.len());
    for item in items {
        let key = key_of(item);
        if index.insert(key, item).is_some() {
            return Err(AuditError::DuplicateKey {
                key: key.clone(),
                side,
            });
        }
    }
    Ok(index)
}

/// Attribute-wise equality over the named attributes
///
/// The remote id never participates. An attribute the desired resource does
/// not declare is not managed and therefore not compared.
pub fn attributes_match(
    observed: &ObservedResource,
    desired: &DesiredResource,
    compared: &[&str],
) -> bool {
    compared.iter().all(|name| match desired.attribute(name) {
        None => true,
        Some(wanted) => observed.attribute(name) == Some(wanted),
    })
}

/// Diff summary statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub additions: usize,
    pub updates: usize,
    pub deletions: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn from_entries(entries: &[DiffEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.kind() {
                DiffKind::Add => summary.additions += 1,
                DiffKind::Update => summary.updates += 1,
                DiffKind::Delete => summary.deletions += 1,
                DiffKind::Unchanged => summary.unchanged += 1,
            }
        }
        summary
    }

    /// Entries that call for a remote change
    pub fn changes(&self) -> usize {
        self.additions + self.updates + self.deletions
    }

    /// Changes that would overwrite or remove remote state
    pub fn risky(&self) -> usize {
        self.updates + self.deletions
    }

    pub fn has_changes(&self) -> bool {
        self.changes() > 0
    }
}
