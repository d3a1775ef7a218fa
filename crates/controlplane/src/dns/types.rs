//! Wire types for DNS zones and records.

use serde::{Deserialize, Serialize};

/// Default TTL applied when a record does not declare one
pub const DEFAULT_TTL: u64 = 3600;

/// Account the DNS client is authenticated as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A zone hosted by the DNS provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomainInfo {
    pub name: String,
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// A record as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub priority: Option<u64>,
}

/// Payload for creating or updating a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSpec {
    pub record_type: String,
    pub name: String,
    pub data: String,
    pub ttl: u64,
    pub priority: Option<u64>,
}

impl RecordSpec {
    pub fn new(record_type: impl Into<String>, name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            name: name.into(),
            data: data.into(),
            ttl: DEFAULT_TTL,
            priority: None,
        }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_priority(mut self, priority: Option<u64>) -> Self {
        self.priority = priority;
        self
    }
}
