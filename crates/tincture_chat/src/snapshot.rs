use std::collections::HashSet;
use tincture_scheduler::EntityId;

/// Recipients captured when the chat event arrived.
///
/// Keeps first-seen order and drops duplicates. Never changes afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSnapshot {
    recipients: Vec<EntityId>,
}

impl RecipientSnapshot {
    /// Recipients in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.recipients.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    /// Whether `id` was in the audience when the message arrived.
    pub fn contains(&self, id: EntityId) -> bool {
        self.recipients.contains(&id)
    }
}

impl FromIterator<EntityId> for RecipientSnapshot {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let recipients = iter.into_iter().filter(|id| seen.insert(*id)).collect();
        Self { recipients }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_insertion_order_without_duplicates() {
        let (a, b, c) = (EntityId::new(), EntityId::new(), EntityId::new());
        let snapshot: RecipientSnapshot = [b, a, b, c, a].into_iter().collect();
        assert_eq!(snapshot.iter().collect::<Vec<_>>(), vec![b, a, c]);
        assert!(snapshot.contains(c));
        assert_eq!(snapshot.len(), 3);
    }
}
