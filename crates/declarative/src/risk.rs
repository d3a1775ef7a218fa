//! Risk classification of operations
//!
//! Exactly two tiers. Creates are additive; updates and deletes overwrite or
//! remove state a human did not re-confirm in this run. The executor's gate
//! depends on this split, so there is no intermediate tier.

use crate::types::{Operation, RiskTier};

/// Classify an operation by its variant
pub fn classify(operation: &Operation) -> RiskTier {
    match operation {
        Operation::Create { .. } => RiskTier::Safe,
        Operation::Update { .. } | Operation::Delete { .. } => RiskTier::Risky,
    }
}
