//! In-memory child→parents multimap, built when the game cannot supply
//! parents analytically.
//!
//! Every position of every child tier (and of the solving tier itself) gets
//! a dense slot holding the bag of its parents within the solving tier.
//! Bags are filled during the tier scan, popped exactly once during
//! frontier propagation, and the whole structure is dropped at the end of
//! the solve.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{Position, Tier, TierPosition};

pub struct ReverseGraph {
    /// Base offset of each tier's slot range.
    offsets: HashMap<Tier, i64>,
    /// One parent bag per position across all mapped tiers.
    parents_of: Vec<Mutex<Vec<Position>>>,
}

impl ReverseGraph {
    /// Lays out slot ranges for `child_tiers` (which must not contain
    /// `this_tier`) followed by `this_tier` itself, covering children of the
    /// solving tier that land back in it.
    pub fn new(
        child_tiers: &[Tier],
        this_tier: Tier,
        tier_size: impl Fn(Tier) -> i64,
    ) -> Self {
        let mut offsets = HashMap::with_capacity(child_tiers.len() + 1);
        let mut total: i64 = 0;
        for &tier in child_tiers {
            offsets.insert(tier, total);
            total += tier_size(tier);
        }
        offsets.insert(this_tier, total);
        total += tier_size(this_tier);

        let parents_of = (0..total).map(|_| Mutex::new(Vec::new())).collect();
        Self {
            offsets,
            parents_of,
        }
    }

    fn index_of(&self, tier_position: TierPosition) -> usize {
        let offset = self.offsets[&tier_position.tier];
        (offset + tier_position.position) as usize
    }

    /// Registers `parent` (a position of the solving tier) as a parent of
    /// `child`. Thread-safe; called from the parallel tier scan.
    pub fn add(&self, child: TierPosition, parent: Position) {
        self.parents_of[self.index_of(child)]
            .lock()
            .expect("reverse graph lock poisoned")
            .push(parent);
    }

    /// Moves out the parent bag of `child`. Each bag is popped at most once;
    /// later pops return an empty bag.
    pub fn pop_parents(&self, child: TierPosition) -> Vec<Position> {
        std::mem::take(
            &mut *self.parents_of[self.index_of(child)]
                .lock()
                .expect("reverse graph lock poisoned"),
        )
    }
}
