//! Black-box verification of a game's API implementation.
//!
//! Solving garbage-in produces garbage-out silently, so before committing
//! hours of solver time a game is spot-checked tier by tier: sampled
//! positions must have self-consistent tier symmetries, legal children, and
//! (when the game supplies parents analytically) reciprocal child/parent
//! relations.

use rand_mt::Mt64;

use crate::error::TestError;
use crate::game::Game;
use crate::types::{Position, Tier, TierPosition, Value};

/// Most positions sampled from one tier.
const TEST_SIZE_MAX: i64 = 1000;

/// Spot-checks `tier` against up to [`TEST_SIZE_MAX`] positions, drawn from
/// a Mersenne Twister stream seeded with `seed` (or exhaustively, for small
/// tiers). `parent_tiers` must list every tier that has `tier` as a child.
/// Returns the first failure found.
pub fn test_tier<G: Game>(
    game: &G,
    tier: Tier,
    parent_tiers: &[Tier],
    seed: u64,
) -> Result<(), TestError> {
    let mut rng = Mt64::new(seed);
    let tier_size = game.tier_size(tier);
    let random_test = tier_size > TEST_SIZE_MAX;
    let test_size = if random_test { TEST_SIZE_MAX } else { tier_size };
    let canonical_tier = game.canonical_tier(tier);

    for i in 0..test_size {
        let position = if random_test {
            ((rng.next_u64() >> 1) as i64) % tier_size
        } else {
            i
        };
        let tp = TierPosition::new(tier, position);
        if !game.is_legal_position(tp) || game.primitive(tp) != Value::Undecided {
            continue;
        }

        check_tier_symmetry(game, tp, canonical_tier)?;
        check_child_positions(game, tp)?;

        if game.provides_parent_positions() {
            check_child_to_parent(game, tp)?;
            check_parent_to_child(game, tp, parent_tiers)?;
        }
    }

    Ok(())
}

/// Applying the symmetry into a position's own tier must be the identity,
/// and applying it there and back must return the original position. Both
/// are checked for the position and for its image in the canonical tier.
fn check_tier_symmetry<G: Game>(
    game: &G,
    tp: TierPosition,
    canonical_tier: Tier,
) -> Result<(), TestError> {
    let symm = TierPosition::new(canonical_tier, game.position_in_symmetric_tier(tp, canonical_tier));

    if game.position_in_symmetric_tier(tp, tp.tier) != tp.position {
        return Err(TestError::TierSymmetrySelfMapping(tp));
    }
    if game.position_in_symmetric_tier(symm, symm.tier) != symm.position {
        return Err(TestError::TierSymmetrySelfMapping(symm));
    }

    if tp.tier == canonical_tier {
        return Ok(());
    }

    let there = TierPosition::new(symm.tier, game.position_in_symmetric_tier(tp, symm.tier));
    if game.position_in_symmetric_tier(there, tp.tier) != tp.position {
        return Err(TestError::TierSymmetryInconsistent(tp));
    }
    let back = TierPosition::new(tp.tier, game.position_in_symmetric_tier(symm, tp.tier));
    if game.position_in_symmetric_tier(back, symm.tier) != symm.position {
        return Err(TestError::TierSymmetryInconsistent(symm));
    }

    Ok(())
}

/// Every generated child must be in range and legal.
fn check_child_positions<G: Game>(game: &G, tp: TierPosition) -> Result<(), TestError> {
    for child in game.canonical_child_positions(tp) {
        if child.position < 0
            || child.position >= game.tier_size(child.tier)
            || !game.is_legal_position(child)
        {
            return Err(TestError::IllegalChild {
                parent: tp,
                child,
            });
        }
    }
    Ok(())
}

/// Every child must list the canonical form of `tp` among its parents in
/// `tp`'s tier.
fn check_child_to_parent<G: Game>(game: &G, tp: TierPosition) -> Result<(), TestError> {
    let canonical: Position = game.canonical_position(tp);
    for child in game.canonical_child_positions(tp) {
        let parents = game.canonical_parent_positions(child, tp.tier);
        if !parents.contains(&canonical) {
            return Err(TestError::ChildParentMismatch {
                parent: tp,
                child,
            });
        }
    }
    Ok(())
}

/// Every legal non-primitive parent of the canonical form of `tp` must list
/// that canonical form among its children.
fn check_parent_to_child<G: Game>(
    game: &G,
    tp: TierPosition,
    parent_tiers: &[Tier],
) -> Result<(), TestError> {
    let canonical_child = TierPosition::new(tp.tier, game.canonical_position(tp));
    for &parent_tier in parent_tiers {
        for parent_position in game.canonical_parent_positions(canonical_child, parent_tier) {
            let parent = TierPosition::new(parent_tier, parent_position);
            // Illegal and primitive parents are skipped in solving too.
            if !game.is_legal_position(parent) || game.primitive(parent) != Value::Undecided {
                continue;
            }
            if !game.canonical_child_positions(parent).contains(&canonical_child) {
                return Err(TestError::ParentChildMismatch {
                    parent,
                    child: canonical_child,
                });
            }
        }
    }
    Ok(())
}
