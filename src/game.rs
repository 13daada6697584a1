//! The game API consumed by the solver.
//!
//! A game supplies move generation and hashing; the solver supplies
//! everything else. Required methods must be implemented by every game.
//! Optional methods default to the documented fallbacks; each override
//! unlocks an optimization:
//!
//! | Method | If left defaulted |
//! |---|---|
//! | [`Game::canonical_position`] | Position-symmetry folding disabled |
//! | [`Game::num_canonical_child_positions`] | Children enumerated and counted |
//! | [`Game::canonical_child_positions`] | Derived from moves + [`Game::do_move`] |
//! | [`Game::canonical_parent_positions`] | Solver builds a reverse graph |
//! | [`Game::position_in_symmetric_tier`] | Tier-symmetry folding disabled |
//! | [`Game::canonical_tier`] | All tiers treated as canonical |
//! | [`Game::tier_type`] | Every tier treated as loopy |
//! | [`Game::tier_name`] | Database files named by numeric tier |

use std::collections::HashSet;

use crate::types::{Move, Position, Tier, TierPosition, TierType, Value};

/// Game-specific move generation, hashing and tier structure.
///
/// Implementations are shared immutably across worker threads, hence the
/// `Sync` bound. All methods assume their inputs are valid (legal positions
/// within reachable tiers); passing garbage is not detected.
pub trait Game: Sync {
    /// The tier containing the initial position.
    fn initial_tier(&self) -> Tier;

    /// The initial position within [`Game::initial_tier`].
    fn initial_position(&self) -> Position;

    /// Number of positions in `tier`, i.e. the exclusive upper bound of its
    /// hash space. Unused hashes are fine as long as
    /// [`Game::is_legal_position`] rejects them.
    fn tier_size(&self, tier: Tier) -> i64;

    /// All moves available at `tier_position`.
    fn generate_moves(&self, tier_position: TierPosition) -> Vec<Move>;

    /// The intrinsic value of `tier_position` if it is terminal, from the
    /// perspective of the player to move; `Value::Undecided` otherwise.
    fn primitive(&self, tier_position: TierPosition) -> Value;

    /// The state reached by performing `mv` at `tier_position`.
    fn do_move(&self, tier_position: TierPosition, mv: Move) -> TierPosition;

    /// False if `tier_position` is definitely unreachable. May report
    /// unreachable positions as legal; the converse would corrupt the solve.
    fn is_legal_position(&self, tier_position: TierPosition) -> bool;

    /// Tiers that contain at least one child of a position in `tier`.
    fn child_tiers(&self, tier: Tier) -> Vec<Tier>;

    /// The canonical representative of `tier_position`'s in-tier symmetry
    /// class; by convention the one with the smallest hash.
    fn canonical_position(&self, tier_position: TierPosition) -> Position {
        tier_position.position
    }

    /// Number of unique canonical children of `tier_position`.
    fn num_canonical_child_positions(&self, tier_position: TierPosition) -> usize {
        self.canonical_child_positions(tier_position).len()
    }

    /// Unique canonical children of `tier_position`. Distinct moves that
    /// collapse to the same canonical child are reported once.
    fn canonical_child_positions(&self, tier_position: TierPosition) -> Vec<TierPosition> {
        let mut seen: HashSet<TierPosition> = HashSet::new();
        let mut children = Vec::new();
        for mv in self.generate_moves(tier_position) {
            let mut child = self.do_move(tier_position, mv);
            child.position = self.canonical_position(child);
            if seen.insert(child) {
                children.push(child);
            }
        }
        children
    }

    /// Whether [`Game::canonical_parent_positions`] is implemented. When
    /// false the solver enumerates children of the solving tier to build a
    /// reverse graph in memory instead.
    fn provides_parent_positions(&self) -> bool {
        false
    }

    /// Unique canonical parents of `child` restricted to `parent_tier`.
    /// Only called when [`Game::provides_parent_positions`] returns true.
    fn canonical_parent_positions(&self, child: TierPosition, parent_tier: Tier) -> Vec<Position> {
        let _ = (child, parent_tier);
        Vec::new()
    }

    /// The position symmetric to `tier_position` within `symmetric`, which
    /// must share a canonical tier with `tier_position.tier`.
    fn position_in_symmetric_tier(&self, tier_position: TierPosition, symmetric: Tier) -> Position {
        let _ = symmetric;
        tier_position.position
    }

    /// The canonical representative among tiers symmetric to `tier`.
    fn canonical_tier(&self, tier: Tier) -> Tier {
        tier
    }

    /// Structural classification of `tier`, used to pick the solving
    /// algorithm.
    fn tier_type(&self, tier: Tier) -> TierType {
        let _ = tier;
        TierType::Loopy
    }

    /// Human-readable name of `tier`, used as its database file stem.
    fn tier_name(&self, tier: Tier) -> String {
        tier.to_string()
    }
}
