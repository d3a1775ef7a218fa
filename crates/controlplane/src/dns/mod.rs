//! DNS provider abstraction.
//!
//! The [`DnsBackend`] trait is the boundary between the reconciliation
//! adapters and the provider, allowing the real `doctl` client to be
//! replaced by an in-memory fake in tests.

pub mod doctl;
pub mod types;

pub use doctl::DoctlBackend;
pub use types::{AccountInfo, DEFAULT_TTL, DnsRecord, DomainInfo, RecordSpec};

use crate::error::Result;

/// Backend trait for DNS operations.
///
/// Read calls must not mutate provider state. Mutating calls are made once;
/// callers decide what a failure means.
pub trait DnsBackend: Send + Sync {
    /// Fail with `ToolNotFound` when the client cannot run at all.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Account the client is authenticated as.
    fn account(&self) -> Result<AccountInfo>;

    /// Names of every zone in the account.
    fn list_domains(&self) -> Result<Vec<String>>;

    /// Every record in `domain`.
    fn list_records(&self, domain: &str) -> Result<Vec<DnsRecord>>;

    /// Create a record in `domain`.
    fn create_record(&self, domain: &str, record: &RecordSpec) -> Result<()>;

    /// Overwrite the record `id` in `domain`.
    fn update_record(&self, domain: &str, id: &str, record: &RecordSpec) -> Result<()>;

    /// Delete the record `id` from `domain`.
    fn delete_record(&self, domain: &str, id: &str) -> Result<()>;
}
