//! Identifier minting.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of fresh identifiers.
pub trait IdMinter: Send + Sync {
    fn new_id(&self) -> Uuid;
}

/// Random version 4 UUIDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIdMinter;

impl IdMinter for RandomIdMinter {
    fn new_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic identifiers `1, 2, 3, …` encoded as UUIDs. Intended for tests and replays.
#[derive(Debug)]
pub struct SequentialIdMinter {
    next: AtomicU64,
}

impl SequentialIdMinter {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIdMinter {
    fn default() -> Self {
        Self::new()
    }
}

impl IdMinter for SequentialIdMinter {
    fn new_id(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Uuid::from_u128(u128::from(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_minter_generates_unique_v4_ids() {
        let minter = RandomIdMinter;
        let ids: HashSet<Uuid> = (0..100).map(|_| minter.new_id()).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| id.get_version_num() == 4));
    }

    #[test]
    fn sequential_minter_counts_up() {
        let minter = SequentialIdMinter::starting_at(41);
        assert_eq!(minter.new_id(), Uuid::from_u128(41));
        assert_eq!(minter.new_id(), Uuid::from_u128(42));
    }
}
