//! Error types surfaced by the solver core.
//!
//! Any error during a tier solve is fatal for that tier and is returned to
//! the caller; partial state is released by the cleanup paths in the worker
//! modules. Errors are never silently converted to `Draw`.

use thiserror::Error;

use crate::types::{Position, Remoteness, Tier, TierPosition, REMOTENESS_MAX};

/// Database-layer failure.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The tier has no database file.
    #[error("tier {0} is missing from the database")]
    Missing(Tier),

    /// A file exists but its header or size does not match expectations.
    #[error("tier {tier} database is corrupted: {reason}")]
    Corrupt { tier: Tier, reason: String },

    /// The operation is not implemented by this database.
    #[error("database operation unsupported: {0}")]
    Unsupported(&'static str),
}

/// Fatal failure of a single tier solve.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Db(#[from] DbError),

    /// A legal non-primitive position reported zero children. This is a game
    /// API bug: a childless position must be primitive.
    #[error("game API bug: non-primitive position {0} has no children")]
    ChildlessNonPrimitive(TierPosition),

    /// More canonical children than the dense counter can hold.
    #[error("position {tier_position} has {count} children (max {max})", max = crate::types::MAX_CHILD_COUNT)]
    TooManyChildren {
        tier_position: TierPosition,
        count: usize,
    },

    /// A probe reported a negative or otherwise nonsensical remoteness.
    #[error("invalid remoteness {remoteness} probed at {tier_position}")]
    InvalidRemoteness {
        tier_position: TierPosition,
        remoteness: Remoteness,
    },

    /// A propagation step produced a remoteness beyond [`REMOTENESS_MAX`].
    #[error("remoteness {0} exceeds the supported maximum {REMOTENESS_MAX}")]
    RemotenessOverflow(Remoteness),

    /// Compare mode found a record that disagrees with the reference
    /// database. Reports the first divergence only.
    #[error("solved records diverge from reference at tier {tier} position {position} ({field})")]
    Mismatch {
        tier: Tier,
        position: Position,
        field: &'static str,
    },
}

/// First failure found by [`crate::tester::test_tier`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TestError {
    /// Mapping a position into its own tier did not return the position.
    #[error("tier symmetry does not self-map at {0}")]
    TierSymmetrySelfMapping(TierPosition),

    /// Applying the tier symmetry there and back changed the position.
    #[error("tier symmetry is not an involution at {0}")]
    TierSymmetryInconsistent(TierPosition),

    /// A generated child is out of range or illegal.
    #[error("illegal child {child} generated from {parent}")]
    IllegalChild {
        parent: TierPosition,
        child: TierPosition,
    },

    /// A child does not list its generating position among its parents.
    #[error("child {child} of {parent} does not list it as a parent")]
    ChildParentMismatch {
        parent: TierPosition,
        child: TierPosition,
    },

    /// A claimed parent does not list the position among its children.
    #[error("parent {parent} of {child} does not list it as a child")]
    ParentChildMismatch {
        parent: TierPosition,
        child: TierPosition,
    },
}

/// Transport failure in the distributed worker loop.
#[derive(Debug, Error)]
#[error("manager link error: {0}")]
pub struct LinkError(pub String);
