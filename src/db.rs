//! The database API consumed by the solver.
//!
//! The solver treats persistence as an oracle: it writes the solving tier's
//! records through this trait, streams already-solved child tiers back, and
//! never sees the on-disk layout. [`crate::array_db::ArrayDb`] is the
//! bundled implementation.

use crate::error::DbError;
use crate::types::{Position, Remoteness, Tier, TierPosition, Value};

/// On-disk state of one tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierStatus {
    /// Records exist and are readable and value-exact.
    Solved,
    /// A file exists but failed validation.
    Corrupted,
    /// No records exist for this tier.
    Missing,
    /// The status itself could not be determined (e.g. I/O failure).
    CheckError,
}

/// A per-thread read handle over solved tiers.
///
/// Probes may cache aggressively; the solver creates one per worker chunk
/// and probes positions in roughly linear order.
pub trait DbProbe {
    /// The solved value of `tier_position`.
    fn value(&mut self, tier_position: TierPosition) -> Result<Value, DbError>;

    /// The solved remoteness of `tier_position`.
    fn remoteness(&mut self, tier_position: TierPosition) -> Result<Remoteness, DbError>;
}

/// Tier-granular persistence for solved records.
///
/// # Concurrency contract
///
/// `set_value` and `set_remoteness` are called concurrently from worker
/// threads, but never on the same position (the solver's counter protocol
/// writes each position at most once). Implementations must make disjoint
/// concurrent writes safe; they need not order them.
///
/// `free_solving_tier` must be safe to call in any phase, including when no
/// solving tier exists: the solver uses it as its unified cleanup path.
pub trait Database: Sync {
    type Probe: DbProbe + Send;

    /// A read handle over tiers already flushed to the database.
    fn probe(&self) -> Result<Self::Probe, DbError>;

    /// A read handle over the reference database, for compare mode.
    fn reference_probe(&self) -> Result<Self::Probe, DbError> {
        Err(DbError::Unsupported("reference database"))
    }

    fn tier_status(&self, tier: Tier) -> TierStatus;

    /// Allocates the in-memory record table for `tier` (`size` positions,
    /// all `Undecided`).
    fn create_solving_tier(&self, tier: Tier, size: i64) -> Result<(), DbError>;

    /// Sets the value of `position` in the solving tier.
    fn set_value(&self, position: Position, value: Value);

    /// Sets the remoteness of `position` in the solving tier.
    fn set_remoteness(&self, position: Position, remoteness: Remoteness);

    /// Reads back a value from the solving tier.
    fn value(&self, position: Position) -> Value;

    /// Reads back a remoteness from the solving tier.
    fn remoteness(&self, position: Position) -> Remoteness;

    /// Materializes the solving tier on disk.
    fn flush_solving_tier(&self) -> Result<(), DbError>;

    /// Releases the in-memory solving tier, if any.
    fn free_solving_tier(&self);

    /// Loads a solved tier into RAM for random access.
    fn load_tier(&self, tier: Tier, size: i64) -> Result<(), DbError>;

    fn is_tier_loaded(&self, tier: Tier) -> bool;

    fn unload_tier(&self, tier: Tier);

    /// Value of `position` in a tier previously loaded with
    /// [`Database::load_tier`].
    fn loaded_value(&self, tier: Tier, position: Position) -> Value;

    /// Remoteness of `position` in a tier previously loaded with
    /// [`Database::load_tier`].
    fn loaded_remoteness(&self, tier: Tier, position: Position) -> Remoteness;
}
