//! # controlplane
//!
//! Clients for the remote systems that infrastructure is reconciled against.
//!
//! This crate provides functionality for:
//! - Reading and mutating DigitalOcean DNS zones through `doctl`
//! - Reading a Supabase project's migration history and edge functions
//! - Applying migration files with `psql`
//! - Running CLI tools with a bounded timeout and classifying their failures
//!
//! ## Example
//!
//! ```no_run
//! use controlplane::{DnsBackend, DoctlBackend};
//! use std::time::Duration;
//!
//! let doctl = DoctlBackend::new(Duration::from_secs(60));
//! for record in doctl.list_records("example.com").expect("list failed") {
//!     println!("{} {} -> {}", record.record_type, record.name, record.data);
//! }
//! ```
//!
//! ## Retry Logic
//!
//! Read calls that fail with a transient error (network, timeout) are retried
//! with exponential backoff. Mutating calls run exactly once. Configure the
//! read policy with [`RetryConfig`].

#![warn(clippy::all)]

pub mod dns;
pub mod error;
pub mod process;
pub mod retry;
pub mod supabase;

pub use dns::{DnsBackend, DoctlBackend};
pub use error::{Error, ErrorCategory, Result};
pub use retry::RetryConfig;
pub use supabase::{SupabaseBackend, SupabaseCli, SupabaseSettings};
