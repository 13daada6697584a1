//! Value iteration over one loop-free tier.
//!
//! With no in-tier cycles, a layered fixed point replaces the frontier
//! machinery: child tiers are loaded into RAM, then win/lose remotenesses
//! are relaxed upward one level per sweep, then tie remotenesses, and
//! whatever stays undecided is a draw. Costs more memory than backward
//! induction but needs neither reverse graph nor frontier bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::debug;
use rayon::prelude::*;

use crate::db::Database;
use crate::error::SolveError;
use crate::game::Game;
use crate::types::{Remoteness, Tier, TierPosition, Value};
use crate::worker::chunk_ranges;

/// Chunk sizes tuned for the memory-bound sweeps of this algorithm.
const LOAD_SCAN_CHUNK: i64 = 16;
const SCAN_CHUNK: i64 = 256;
const WIN_LOSE_CHUNK: i64 = 128;
const TIE_CHUNK: i64 = 256;

pub(crate) fn solve<G: Game, D: Database>(game: &G, db: &D, tier: Tier) -> Result<(), SolveError> {
    let child_tiers = game.child_tiers(tier);
    let result = run(game, db, tier, &child_tiers);
    // Unified cleanup, safe in any phase.
    for &child in &child_tiers {
        if db.is_tier_loaded(child) {
            db.unload_tier(child);
        }
    }
    db.free_solving_tier();
    result
}

fn run<G: Game, D: Database>(
    game: &G,
    db: &D,
    tier: Tier,
    child_tiers: &[Tier],
) -> Result<(), SolveError> {
    let this_tier_size = game.tier_size(tier);

    // Load child tiers, scanning for the largest remotenesses they contain;
    // those bound the number of sweeps below.
    let t = Instant::now();
    let mut largest_win_lose: Remoteness = 0;
    let mut largest_tie: Remoteness = 0;
    for &child in child_tiers {
        let size = game.tier_size(child);
        db.load_tier(child, size)?;

        let (win_lose, tie) = chunk_ranges(size, LOAD_SCAN_CHUNK)
            .into_par_iter()
            .map(|range| {
                let mut win_lose: Remoteness = 0;
                let mut tie: Remoteness = 0;
                for position in range {
                    match db.loaded_value(child, position) {
                        Value::Win | Value::Lose => {
                            win_lose = win_lose.max(db.loaded_remoteness(child, position));
                        }
                        Value::Tie => {
                            tie = tie.max(db.loaded_remoteness(child, position));
                        }
                        _ => {}
                    }
                }
                (win_lose, tie)
            })
            .reduce(|| (0, 0), |a, b| (a.0.max(b.0), a.1.max(b.1)));
        largest_win_lose = largest_win_lose.max(win_lose);
        largest_tie = largest_tie.max(tie);
    }
    debug!(
        "tier {tier}: {} child tiers loaded in {:.2?} (max win/lose remoteness {largest_win_lose}, max tie remoteness {largest_tie})",
        child_tiers.len(),
        t.elapsed()
    );

    db.create_solving_tier(tier, this_tier_size)?;

    // Scan: primitives get their value at remoteness 0. Illegal and
    // non-canonical positions are transiently marked as drawing so the
    // sweeps skip them; the marking is inverted at the end.
    chunk_ranges(this_tier_size, SCAN_CHUNK)
        .into_par_iter()
        .for_each(|range| {
            for position in range {
                let tp = TierPosition::new(tier, position);
                if !game.is_legal_position(tp) || game.canonical_position(tp) != position {
                    db.set_value(position, Value::Draw);
                    continue;
                }
                let value = game.primitive(tp);
                if value != Value::Undecided {
                    db.set_value(position, value);
                    db.set_remoteness(position, 0);
                }
            }
        });

    let t = Instant::now();
    iterate_win_lose(game, db, tier, this_tier_size, largest_win_lose);
    iterate_tie(game, db, tier, this_tier_size, largest_tie);
    debug!("tier {tier}: fixed point reached in {:.2?}", t.elapsed());

    for &child in child_tiers {
        db.unload_tier(child);
    }

    // Undecided survivors are draws; transient draw marks revert to
    // undecided.
    chunk_ranges(this_tier_size, SCAN_CHUNK)
        .into_par_iter()
        .for_each(|range| {
            for position in range {
                match db.value(position) {
                    Value::Undecided => db.set_value(position, Value::Draw),
                    Value::Draw => db.set_value(position, Value::Undecided),
                    _ => {}
                }
            }
        });

    db.flush_solving_tier()?;
    Ok(())
}

fn child_record<D: Database>(db: &D, tier: Tier, child: TierPosition) -> (Value, Remoteness) {
    if child.tier == tier {
        (db.value(child.position), db.remoteness(child.position))
    } else {
        (
            db.loaded_value(child.tier, child.position),
            db.loaded_remoteness(child.tier, child.position),
        )
    }
}

/// Sweeps until a pass produces no update and the iteration count exceeds
/// the largest child win/lose remoteness. Sweep `i` decides positions whose
/// win/lose remoteness is exactly `i`: a lose child at `i - 1` makes a win,
/// and all-winning children whose largest remoteness is `i - 1` make a
/// lose.
fn iterate_win_lose<G: Game, D: Database>(
    game: &G,
    db: &D,
    tier: Tier,
    this_tier_size: i64,
    largest_win_lose: Remoteness,
) {
    let mut iteration: Remoteness = 1;
    loop {
        let updated = AtomicBool::new(false);
        chunk_ranges(this_tier_size, WIN_LOSE_CHUNK)
            .into_par_iter()
            .for_each(|range| {
                for position in range {
                    if db.value(position) != Value::Undecided {
                        continue;
                    }
                    let tp = TierPosition::new(tier, position);
                    let mut all_children_winning = true;
                    let mut largest_win: Remoteness = -1;
                    let mut decided = false;
                    for child in game.canonical_child_positions(tp) {
                        let (child_value, child_remoteness) = child_record(db, tier, child);
                        match child_value {
                            Value::Lose => {
                                all_children_winning = false;
                                if child_remoteness == iteration - 1 {
                                    db.set_value(position, Value::Win);
                                    db.set_remoteness(position, iteration);
                                    updated.store(true, Ordering::Relaxed);
                                    decided = true;
                                    break;
                                }
                            }
                            Value::Win => largest_win = largest_win.max(child_remoteness),
                            _ => all_children_winning = false,
                        }
                    }
                    if !decided && all_children_winning && largest_win + 1 == iteration {
                        db.set_value(position, Value::Lose);
                        db.set_remoteness(position, iteration);
                        updated.store(true, Ordering::Relaxed);
                    }
                }
            });

        if !updated.load(Ordering::Relaxed) && iteration > largest_win_lose {
            break;
        }
        iteration += 1;
    }
}

/// Tie analog of [`iterate_win_lose`]: a tie child at `i - 1` makes a tie
/// at `i`.
fn iterate_tie<G: Game, D: Database>(
    game: &G,
    db: &D,
    tier: Tier,
    this_tier_size: i64,
    largest_tie: Remoteness,
) {
    let mut iteration: Remoteness = 1;
    loop {
        let updated = AtomicBool::new(false);
        chunk_ranges(this_tier_size, TIE_CHUNK)
            .into_par_iter()
            .for_each(|range| {
                for position in range {
                    if db.value(position) != Value::Undecided {
                        continue;
                    }
                    let tp = TierPosition::new(tier, position);
                    for child in game.canonical_child_positions(tp) {
                        let (child_value, child_remoteness) = child_record(db, tier, child);
                        if child_value == Value::Tie && child_remoteness == iteration - 1 {
                            db.set_value(position, Value::Tie);
                            db.set_remoteness(position, iteration);
                            updated.store(true, Ordering::Relaxed);
                            break;
                        }
                    }
                }
            });

        if !updated.load(Ordering::Relaxed) && iteration > largest_tie {
            break;
        }
        iteration += 1;
    }
}
