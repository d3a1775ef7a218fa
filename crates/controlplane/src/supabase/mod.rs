//! Supabase project abstraction.
//!
//! The [`SupabaseBackend`] trait covers the two reconcilable parts of a
//! project, the migration history and the deployed edge functions.

pub mod cli;
pub mod types;

pub use cli::{SupabaseCli, SupabaseSettings};
pub use types::{
    EdgeFunction, LocalMigration, ProjectInfo, RemoteMigration, scan_function_dirs,
};

use crate::error::Result;

/// Backend trait for Supabase operations.
pub trait SupabaseBackend: Send + Sync {
    /// Fail with `ToolNotFound` when the client cannot run at all.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Projects visible to the authenticated CLI.
    fn list_projects(&self) -> Result<Vec<ProjectInfo>>;

    /// Migrations present in the remote migration history.
    fn list_migrations(&self) -> Result<Vec<RemoteMigration>>;

    /// Run a local migration file against the database and record it as applied.
    fn apply_migration(&self, migration: &LocalMigration) -> Result<()>;

    /// Mark a remote migration as reverted in the migration history.
    fn revert_migration(&self, version: &str) -> Result<()>;

    /// Deployed edge functions.
    fn list_functions(&self) -> Result<Vec<EdgeFunction>>;

    /// Deploy the function in `slug`'s source directory.
    fn deploy_function(&self, slug: &str, verify_jwt: Option<bool>) -> Result<()>;

    /// Delete a deployed function.
    fn delete_function(&self, slug: &str) -> Result<()>;
}
