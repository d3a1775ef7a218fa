// Audit and reconcile
pub mod audit;
