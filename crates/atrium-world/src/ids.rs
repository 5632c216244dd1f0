//! Peer id allocation within one world.

use std::collections::HashSet;

use atrium_protocol::PeerId;
use rand::Rng;

/// Size of the id space: ids live in `[0, 255]` and fit one byte.
const ID_SPACE: usize = 256;

/// Allocates room-local peer ids.
///
/// Ids are picked uniformly at random from the free portion of `[0, 255]`
/// rather than from a counter: they are exposed to untrusted peers and
/// reused across churn, and random assignment leaks nothing about join
/// order while staying inside the one-byte wire representation.
///
/// Private to the world actor; mutated only on the serialized join/leave
/// path.
pub(crate) struct IdAllocator {
    assigned: HashSet<u8>,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self {
            assigned: HashSet::new(),
        }
    }

    /// Picks a free id, or `None` when all 256 are taken.
    ///
    /// Repeated sampling with a tried-set: at most [`ID_SPACE`] distinct
    /// candidates are examined, so the loop terminates even in the
    /// pathological all-but-one-assigned case.
    pub(crate) fn allocate(&mut self) -> Option<PeerId> {
        if self.assigned.len() >= ID_SPACE {
            return None;
        }

        let mut rng = rand::rng();
        let mut tried = [false; ID_SPACE];
        let mut tried_count = 0;

        while tried_count < ID_SPACE {
            let candidate = rng.random::<u8>();
            if tried[candidate as usize] {
                continue;
            }
            tried[candidate as usize] = true;
            tried_count += 1;

            if !self.assigned.contains(&candidate) {
                self.assigned.insert(candidate);
                return Some(PeerId(candidate));
            }
        }

        None
    }

    /// Frees an id, making it immediately eligible for reuse.
    pub(crate) fn release(&mut self, id: PeerId) {
        if !self.assigned.remove(&id.0) {
            // Releasing an id we never handed out is a logic error in the
            // caller, not an environmental condition — be loud about it.
            tracing::error!(%id, "released an id that was not assigned");
        }
    }

    /// Number of currently assigned ids.
    pub(crate) fn len(&self) -> usize {
        self.assigned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_fills_entire_space_with_distinct_ids() {
        let mut ids = IdAllocator::new();
        let mut seen = HashSet::new();

        for _ in 0..ID_SPACE {
            let id = ids.allocate().expect("space should not be exhausted yet");
            assert!(seen.insert(id), "id {id} was handed out twice");
        }

        assert_eq!(seen.len(), ID_SPACE);
        assert_eq!(ids.len(), ID_SPACE);
    }

    #[test]
    fn test_allocate_exhausted_returns_none() {
        let mut ids = IdAllocator::new();
        for _ in 0..ID_SPACE {
            ids.allocate().unwrap();
        }

        assert!(ids.allocate().is_none());
        // Failure must not mutate the assigned set.
        assert_eq!(ids.len(), ID_SPACE);
    }

    #[test]
    fn test_release_makes_id_reusable() {
        let mut ids = IdAllocator::new();
        for _ in 0..ID_SPACE {
            ids.allocate().unwrap();
        }

        // With exactly one id free, allocation must find it.
        ids.release(PeerId(0x42));
        assert_eq!(ids.allocate(), Some(PeerId(0x42)));
    }

    #[test]
    fn test_release_then_allocate_many_times_never_collides() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate().unwrap();
        let b = ids.allocate().unwrap();
        assert_ne!(a, b);

        for _ in 0..1000 {
            ids.release(a);
            let again = ids.allocate().unwrap();
            assert_ne!(again, b, "freed-and-reassigned id collided with a live one");
            ids.release(again);
            let _ = ids.allocate().unwrap();
        }
    }

    #[test]
    fn test_allocation_is_not_sequential() {
        // Statistical, not absolute: 32 allocations coming out as
        // 0, 1, 2, … would mean the allocator leaks join order. The odds
        // of that happening by chance are (1/256)^31.
        let mut ids = IdAllocator::new();
        let sequence: Vec<u8> = (0..32).map(|_| ids.allocate().unwrap().0).collect();
        let sequential: Vec<u8> = (0..32).collect();
        assert_ne!(sequence, sequential);
    }
}
