//! Command infrastructure.

use crate::aggregate::Aggregate;
use crate::dish::DishError;

/// Trait for commands handled by the domain services.
///
/// Commands represent an intention to perform an action. `validate` checks
/// what can be decided from the command alone, before any store access.
pub trait Command: std::fmt::Debug + Send + Sync {
    /// Rejects malformed input.
    fn validate(&self) -> Result<(), DishError> {
        Ok(())
    }
}

/// Result of a command that created or changed an aggregate.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after the command.
    pub aggregate: A,

    /// The events that were recorded in the outbox.
    pub events: Vec<A::Event>,
}
