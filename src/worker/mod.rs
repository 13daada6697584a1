//! Single-tier solving: algorithm selection, idempotence, and the optional
//! cross-check against a reference database.
//!
//! [`TierWorker::solve`] runs one tier to completion. Loopy tiers go through
//! the backward-induction algorithm ([`bi`]); tiers declared loop-free go
//! through value iteration ([`vi`]), which trades memory (child tiers held
//! in RAM) for skipping the frontier and reverse-graph machinery.

mod bi;
mod vi;

use std::ops::Range;
use std::time::Instant;

use log::{error, info};

use crate::config::SolverConfig;
use crate::db::{Database, DbProbe, TierStatus};
use crate::error::SolveError;
use crate::game::Game;
use crate::types::{Tier, TierPosition, TierType, Value};

/// Per-call solve options.
#[derive(Clone, Copy, Debug, Default)]
pub struct SolveOptions {
    /// Re-solve even if the database already has this tier.
    pub force: bool,
    /// After solving, cross-check every record against the reference
    /// database and fail on the first divergence.
    pub compare: bool,
}

/// What a successful [`TierWorker::solve`] call actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveOutcome {
    /// The tier was solved and flushed by this call.
    Solved,
    /// The tier was already solved; nothing was mutated.
    Loaded,
}

/// Solves individual tiers of `game` into `db`. Which tier to solve next is
/// the caller's (scheduler's) concern.
pub struct TierWorker<'a, G, D> {
    game: &'a G,
    db: &'a D,
    config: SolverConfig,
}

impl<'a, G: Game, D: Database> TierWorker<'a, G, D> {
    pub fn new(game: &'a G, db: &'a D) -> Self {
        Self::with_config(game, db, SolverConfig::default())
    }

    pub fn with_config(game: &'a G, db: &'a D, config: SolverConfig) -> Self {
        Self { game, db, config }
    }

    /// Solves `tier`, assuming all of its child tiers are already solved in
    /// the database. Any failure aborts the tier; partial in-memory state is
    /// released before returning.
    pub fn solve(&self, tier: Tier, options: SolveOptions) -> Result<SolveOutcome, SolveError> {
        if !options.force && self.db.tier_status(tier) == TierStatus::Solved {
            return Ok(SolveOutcome::Loaded);
        }

        let start = Instant::now();
        match self.game.tier_type(tier) {
            TierType::Loopy => bi::solve(self.game, self.db, tier, &self.config)?,
            TierType::LoopFree | TierType::ImmediateTransition => {
                vi::solve(self.game, self.db, tier)?
            }
        }
        info!(
            "tier {} ({} positions) solved in {:.2?}",
            self.game.tier_name(tier),
            self.game.tier_size(tier),
            start.elapsed()
        );

        if options.compare {
            compare_with_reference(self.db, tier, self.game.tier_size(tier))?;
        }
        Ok(SolveOutcome::Solved)
    }
}

/// Cross-checks the freshly solved `tier` against the reference database,
/// reporting the first inconsistent position.
fn compare_with_reference<D: Database>(db: &D, tier: Tier, size: i64) -> Result<(), SolveError> {
    let mut probe = db.probe()?;
    let mut reference = db.reference_probe()?;

    for position in 0..size {
        let tp = TierPosition::new(tier, position);
        let ref_value = reference.value(tp)?;
        if ref_value == Value::Undecided {
            continue;
        }

        let value = probe.value(tp)?;
        if value != ref_value {
            error!("tier {tier} position {position}: value {value:?}, reference {ref_value:?}");
            return Err(SolveError::Mismatch {
                tier,
                position,
                field: "value",
            });
        }

        let remoteness = probe.remoteness(tp)?;
        let ref_remoteness = reference.remoteness(tp)?;
        if remoteness != ref_remoteness {
            error!(
                "tier {tier} position {position}: remoteness {remoteness}, reference {ref_remoteness}"
            );
            return Err(SolveError::Mismatch {
                tier,
                position,
                field: "remoteness",
            });
        }
    }

    info!("tier {tier}: reference check passed");
    Ok(())
}

/// Splits `[0, total)` into work units of at most `chunk` positions, to be
/// consumed by a rayon parallel iterator with dynamic load balancing.
pub(crate) fn chunk_ranges(total: i64, chunk: i64) -> Vec<Range<i64>> {
    debug_assert!(chunk > 0);
    let mut ranges = Vec::with_capacity((total.max(0) as usize).div_ceil(chunk.max(1) as usize));
    let mut start = 0;
    while start < total {
        let end = (start + chunk).min(total);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ranges_cover_without_overlap() {
        let ranges = chunk_ranges(10, 3);
        assert_eq!(ranges, vec![0..3, 3..6, 6..9, 9..10]);
        assert!(chunk_ranges(0, 16).is_empty());
        assert_eq!(chunk_ranges(16, 16), vec![0..16]);
    }
}
