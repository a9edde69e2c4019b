//! Outreach queue — the ordered set of contacts still to be dialed.
//!
//! Mutated only by the scheduling loop; everything else reads the pending
//! count through a status snapshot. FIFO in whatever order the table
//! backend returned the rows.

use dialops_core::ContactRow;

/// Ordered, in-memory queue of contacts awaiting dispatch.
#[derive(Debug, Default)]
pub struct OutreachQueue {
    rows: Vec<ContactRow>,
}

impl OutreachQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue wholesale with a fresh contact set.
    pub fn initialize(&mut self, contacts: Vec<ContactRow>) {
        self.rows = contacts;
    }

    /// Remove and return the first `n` rows (or fewer if the queue is
    /// shorter). The remainder becomes the new queue.
    pub fn take_batch(&mut self, n: usize) -> Vec<ContactRow> {
        let n = n.min(self.rows.len());
        self.rows.drain(..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pending contact count, shown on the status surface.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str) -> ContactRow {
        ContactRow::from_pairs([("encounter_id", id)])
    }

    #[test]
    fn test_take_batch_fifo() {
        let mut queue = OutreachQueue::new();
        queue.initialize(vec![contact("1"), contact("2"), contact("3")]);

        let batch = queue.take_batch(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].value("encounter_id"), "1");
        assert_eq!(batch[1].value("encounter_id"), "2");
        assert_eq!(queue.len(), 1);

        let rest = queue.take_batch(2);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].value("encounter_id"), "3");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_batch_from_empty() {
        let mut queue = OutreachQueue::new();
        assert!(queue.take_batch(5).is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_initialize_replaces() {
        let mut queue = OutreachQueue::new();
        queue.initialize(vec![contact("1")]);
        queue.initialize(vec![contact("2"), contact("3")]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take_batch(1)[0].value("encounter_id"), "2");
    }
}
