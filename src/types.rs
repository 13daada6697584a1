//! Core value types shared by every solver component.
//!
//! A game state is globally identified by a [`TierPosition`]: an opaque
//! 64-bit tier id plus a position hash that is only meaningful within that
//! tier. Solved records pair a [`Value`] with a [`Remoteness`].

use serde::{Deserialize, Serialize};

/// Opaque identifier of one layer of the game graph.
pub type Tier = u64;

/// Position hash within a tier, in `[0, tier_size)`.
pub type Position = i64;

/// Game-specific move encoding, opaque to the solver.
pub type Move = i64;

/// Plies to the nearest terminal under optimal play.
pub type Remoteness = i32;

/// Largest representable remoteness. A tier whose solve would produce a
/// larger remoteness fails with [`crate::SolveError::RemotenessOverflow`].
pub const REMOTENESS_MAX: Remoteness = 1023;

/// Largest number of canonical children any position may have. Chosen so a
/// child counter fits in one byte with 255 reserved as the illegal marker.
pub const MAX_CHILD_COUNT: usize = 254;

/// A position qualified by its tier: the global identity of a game state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierPosition {
    pub tier: Tier,
    pub position: Position,
}

impl TierPosition {
    pub fn new(tier: Tier, position: Position) -> Self {
        Self { tier, position }
    }
}

impl std::fmt::Display for TierPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tier, self.position)
    }
}

/// Game-theoretic value of a position.
///
/// `Undecided` is transient: it only appears before a position has been
/// solved, or as a primitive result meaning "not terminal". `Draw` means the
/// mover can neither force a win nor be forced to lose, and play may
/// continue forever; draws carry no meaningful remoteness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Value {
    Undecided = 0,
    Win = 1,
    Lose = 2,
    Tie = 3,
    Draw = 4,
}

impl Value {
    /// Inverse of `as u8`. Out-of-range bit patterns map to `Undecided` so a
    /// zeroed or garbage record never reads as a solved value.
    pub fn from_u8(bits: u8) -> Self {
        match bits {
            1 => Value::Win,
            2 => Value::Lose,
            3 => Value::Tie,
            4 => Value::Draw,
            _ => Value::Undecided,
        }
    }
}

/// Structural classification of a tier, used to pick the solving algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierType {
    /// Every child of every position lies in another tier. Implies loop-free.
    ImmediateTransition,
    /// The in-tier position graph has no cycles.
    LoopFree,
    /// The tier is loopy, or its loopiness is unknown. The backward-induction
    /// algorithm handles this case and is the default.
    Loopy,
}

impl TierType {
    /// Whether the value-iteration algorithm may be used on this tier.
    pub fn is_loop_free(self) -> bool {
        !matches!(self, TierType::Loopy)
    }
}
