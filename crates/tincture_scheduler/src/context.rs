//! Identifiers for where a callable is allowed to run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an entity (typically a connected player).
///
/// Wraps a UUID so entity ids cannot be confused with other ids in the
/// system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Creates a new random entity id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The worker a callable must run on.
///
/// Chosen once per call site; an entity-scoped context is resolved to the
/// entity's current owner only when the callable is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    /// The global context (main thread, or the global region).
    Global,
    /// Whichever context owns the entity at execution time.
    EntityScoped(EntityId),
}

impl ExecutionContext {
    /// The entity this context is bound to, if any.
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            ExecutionContext::Global => None,
            ExecutionContext::EntityScoped(id) => Some(*id),
        }
    }
}

impl From<EntityId> for ExecutionContext {
    fn from(id: EntityId) -> Self {
        ExecutionContext::EntityScoped(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_round_trips_through_display() {
        let id = EntityId::new();
        let parsed: EntityId = id.to_string().parse().expect("valid uuid");
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_execution_context_entity() {
        let id = EntityId::new();
        assert_eq!(ExecutionContext::Global.entity(), None);
        assert_eq!(ExecutionContext::from(id).entity(), Some(id));
    }
}
