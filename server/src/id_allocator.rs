//! Client identifier allocation
//!
//! Identifiers travel in the 16-bit id field of every frame, so the allocator
//! hands out values in `1..=u16::MAX` and recycles released ones before minting
//! new ones. Reuse is smallest-first, which keeps identifiers small on
//! long-running servers and makes the order deterministic.

use std::collections::BTreeSet;

#[derive(Debug)]
pub struct IdAllocator {
    /// Next never-issued identifier, `None` once the space is used up
    next_id: Option<u16>,
    /// Identifiers freed by earlier disconnects, ready for reuse
    reclaimable: BTreeSet<u16>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_id: Some(1),
            reclaimable: BTreeSet::new(),
        }
    }

    /// Returns an identifier no live connection holds, or `None` when all
    /// 65535 identifiers are in use
    pub fn allocate(&mut self) -> Option<u16> {
        if let Some(id) = self.reclaimable.pop_first() {
            return Some(id);
        }

        let id = self.next_id?;
        self.next_id = id.checked_add(1);
        Some(id)
    }

    /// Returns an identifier to the pool
    ///
    /// Identifiers that were never issued or are already reclaimable are
    /// ignored, so a double release cannot lead to a duplicate allocation.
    pub fn release(&mut self, id: u16) {
        let issued = match self.next_id {
            Some(next) => id != 0 && id < next,
            None => id != 0,
        };

        if issued {
            self.reclaimable.insert(id);
        }
    }

    /// Number of identifiers waiting to be reused
    pub fn reclaimable_len(&self) -> usize {
        self.reclaimable.len()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocation_starts_at_one() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate(), Some(1));
        assert_eq!(ids.allocate(), Some(2));
        assert_eq!(ids.allocate(), Some(3));
    }

    #[test]
    fn test_released_ids_are_reused_smallest_first() {
        let mut ids = IdAllocator::new();
        for _ in 0..5 {
            ids.allocate();
        }

        ids.release(4);
        ids.release(2);
        assert_eq!(ids.reclaimable_len(), 2);

        assert_eq!(ids.allocate(), Some(2));
        assert_eq!(ids.allocate(), Some(4));
        assert_eq!(ids.allocate(), Some(6));
        assert_eq!(ids.reclaimable_len(), 0);
    }

    #[test]
    fn test_release_of_unissued_id_is_ignored() {
        let mut ids = IdAllocator::new();
        ids.allocate();

        ids.release(0);
        ids.release(10);
        assert_eq!(ids.reclaimable_len(), 0);
        assert_eq!(ids.allocate(), Some(2));
    }

    #[test]
    fn test_double_release_does_not_duplicate() {
        let mut ids = IdAllocator::new();
        ids.allocate();
        ids.allocate();

        ids.release(1);
        ids.release(1);

        assert_eq!(ids.allocate(), Some(1));
        assert_eq!(ids.allocate(), Some(3));
    }

    #[test]
    fn test_live_ids_are_unique() {
        let mut ids = IdAllocator::new();
        let mut live = HashSet::new();

        for round in 0..200u16 {
            let id = ids.allocate().unwrap();
            assert!(live.insert(id), "id {} issued twice", id);

            if round % 3 == 0 {
                let victim = *live.iter().next().unwrap();
                live.remove(&victim);
                ids.release(victim);
            }
        }
    }

    #[test]
    fn test_exhaustion() {
        let mut ids = IdAllocator::new();
        for expected in 1..=u16::MAX {
            assert_eq!(ids.allocate(), Some(expected));
        }

        assert_eq!(ids.allocate(), None);

        ids.release(500);
        assert_eq!(ids.allocate(), Some(500));
        assert_eq!(ids.allocate(), None);
    }
}
