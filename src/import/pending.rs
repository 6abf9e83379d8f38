use super::parse::ParsedRelationship;
use crate::storage::ItemId;

/// A relationship whose target was not yet imported when its source was
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelationship {
    pub from: ItemId,
    /// Wire fields before remapping, `to` still a slug
    pub relationship: ParsedRelationship,
}

/// Deferred relationships in the order they were queued
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Vec<PendingRelationship>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, from: ItemId, relationship: ParsedRelationship) {
        self.entries.push(PendingRelationship { from, relationship });
    }

    /// Deferred relationships of one source item
    pub fn for_item(&self, from: ItemId) -> impl Iterator<Item = &PendingRelationship> {
        self.entries.iter().filter(move |p| p.from == from)
    }

    /// Remove and return everything queued; the queue is empty afterwards
    pub fn take_all(&mut self) -> Vec<PendingRelationship> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ColumnValue;

    fn relationship(to: &str) -> ParsedRelationship {
        let mut parsed = ParsedRelationship::default();
        parsed.fields.insert("to", ColumnValue::Text(to.to_string()));
        parsed
    }

    #[test]
    fn test_queue_keeps_insertion_order() {
        let mut queue = PendingQueue::new();
        queue.push(ItemId(2), relationship("b"));
        queue.push(ItemId(1), relationship("a"));
        queue.push(ItemId(2), relationship("c"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.for_item(ItemId(2)).count(), 2);

        let drained: Vec<_> = queue
            .take_all()
            .into_iter()
            .map(|p| p.relationship.text("to").unwrap().to_string())
            .collect();
        assert_eq!(drained, vec!["b", "a", "c"]);
        assert!(queue.is_empty());
        assert!(queue.take_all().is_empty());
    }
}
