//! Backward induction over one loopy tier.
//!
//! The algorithm works a frontier of solved positions upward through the
//! parent relation, one remoteness level at a time:
//!
//! 1. Stream every non-draw record of every child tier into per-thread
//!    frontiers, bucketed by remoteness and tagged with the child's index.
//! 2. Scan the tier: emit primitives into the frontier at remoteness 0 and
//!    count each legal canonical position's children into a dense atomic
//!    byte array (building the reverse graph along the way if the game
//!    cannot supply parents).
//! 3. For each remoteness level, push the lose frontier, then the win
//!    frontier, into the tier: a lose child makes its parents win; a win
//!    child decrements its parents' counters and the thread that observes
//!    the 1→0 transition marks the parent lose. After all win/lose levels,
//!    push the tie frontiers the same way.
//! 4. Positions whose counter never reached zero are draws.
//!
//! A parent zeroed through the lose path ignores later win children, and a
//! parent decremented to zero ignores later lose children at higher
//! remoteness only because none exist at a lower one: levels are processed
//! strictly in ascending order, which is what makes the single byte per
//! position sufficient.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use log::debug;
use rayon::prelude::*;

use crate::config::SolverConfig;
use crate::db::{Database, DbProbe};
use crate::error::SolveError;
use crate::frontier::Frontier;
use crate::game::Game;
use crate::reverse_graph::ReverseGraph;
use crate::types::{
    Position, Remoteness, Tier, TierPosition, Value, MAX_CHILD_COUNT, REMOTENESS_MAX,
};
use crate::worker::chunk_ranges;

/// Counter value marking illegal and non-canonical positions.
const ILLEGAL_NUM_CHILDREN: u8 = u8::MAX;

/// Number of remoteness buckets in each frontier.
const FRONTIER_LEVELS: usize = REMOTENESS_MAX as usize + 1;

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrontierKind {
    Win,
    Lose,
    Tie,
}

/// One worker thread's win/lose/tie frontier triple. Threads only ever
/// touch their own triple, so the enclosing mutex is uncontended; it exists
/// to make the sharing sound.
struct ThreadFrontiers {
    win: Frontier,
    lose: Frontier,
    tie: Frontier,
}

impl ThreadFrontiers {
    fn new(dividers_width: usize) -> Self {
        Self {
            win: Frontier::new(FRONTIER_LEVELS, dividers_width),
            lose: Frontier::new(FRONTIER_LEVELS, dividers_width),
            tie: Frontier::new(FRONTIER_LEVELS, dividers_width),
        }
    }

    fn get_mut(&mut self, kind: FrontierKind) -> &mut Frontier {
        match kind {
            FrontierKind::Win => &mut self.win,
            FrontierKind::Lose => &mut self.lose,
            FrontierKind::Tie => &mut self.tie,
        }
    }

    /// Routes a solved record into the frontier matching its value.
    /// Undecided and drawing records are not frontier material.
    fn push_record(
        &mut self,
        child_index: usize,
        position: Position,
        value: Value,
        remoteness: Remoteness,
    ) -> Result<(), SolveError> {
        match value {
            Value::Undecided | Value::Draw => Ok(()),
            Value::Win => self.win.add(position, remoteness, child_index),
            Value::Lose => self.lose.add(position, remoteness, child_index),
            Value::Tie => self.tie.add(position, remoteness, child_index),
        }
    }

    fn accumulate_dividers(&mut self) {
        self.win.accumulate_dividers();
        self.lose.accumulate_dividers();
        self.tie.accumulate_dividers();
    }
}

/// Atomically decrements `cell` unless it is zero, returning the value
/// observed before the decrement. The CAS loop guarantees that when several
/// threads race on the same cell, exactly one of them observes each
/// pre-decrement value, in particular the final 1.
fn decrement_if_nonzero(cell: &AtomicU8) -> u8 {
    let mut current = cell.load(Ordering::Relaxed);
    while current != 0 {
        match cell.compare_exchange_weak(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(previous) => return previous,
            Err(observed) => current = observed,
        }
    }
    0
}

pub(crate) fn solve<G: Game, D: Database>(
    game: &G,
    db: &D,
    tier: Tier,
    config: &SolverConfig,
) -> Result<(), SolveError> {
    let mut solver = Solver::new(game, db, tier, config);
    let result = solver.run();
    // Unified cleanup: safe whichever phase failed. Frontiers, counters and
    // the reverse graph are dropped with the solver itself.
    db.free_solving_tier();
    result
}

struct Solver<'a, G, D> {
    game: &'a G,
    db: &'a D,
    this_tier: Tier,
    this_tier_size: i64,
    /// Child tiers of `this_tier`, with `this_tier` appended last so that
    /// the final child index denotes in-tier records.
    child_tiers: Vec<Tier>,
    /// One frontier triple per worker thread.
    frontiers: Vec<Mutex<ThreadFrontiers>>,
    /// Per position: number of children not yet known to this solver.
    undecided_children: Vec<AtomicU8>,
    /// Substitute parent relation, built iff the game lacks
    /// `canonical_parent_positions`.
    reverse_graph: Option<ReverseGraph>,
    config: SolverConfig,
}

impl<'a, G: Game, D: Database> Solver<'a, G, D> {
    fn new(game: &'a G, db: &'a D, tier: Tier, config: &SolverConfig) -> Self {
        let mut child_tiers = game.child_tiers(tier);

        // The reverse graph is laid out before this tier is appended: its
        // trailing range, added by `ReverseGraph::new` itself, covers
        // children that stay within the solving tier.
        let reverse_graph = (!game.provides_parent_positions())
            .then(|| ReverseGraph::new(&child_tiers, tier, |t| game.tier_size(t)));

        child_tiers.push(tier);

        let num_threads = rayon::current_num_threads().max(1);
        let frontiers = (0..num_threads)
            .map(|_| Mutex::new(ThreadFrontiers::new(child_tiers.len())))
            .collect();

        Self {
            game,
            db,
            this_tier: tier,
            this_tier_size: game.tier_size(tier),
            child_tiers,
            frontiers,
            undecided_children: Vec::new(),
            reverse_graph,
            config: *config,
        }
    }

    fn run(&mut self) -> Result<(), SolveError> {
        let t = Instant::now();
        self.load_children()?;
        debug!("tier {}: child frontiers loaded in {:.2?}", self.this_tier, t.elapsed());

        self.db
            .create_solving_tier(self.this_tier, self.this_tier_size)?;
        self.undecided_children = (0..self.this_tier_size).map(|_| AtomicU8::new(0)).collect();

        let t = Instant::now();
        self.scan_tier()?;
        debug!("tier {}: scanned in {:.2?}", self.this_tier, t.elapsed());

        let t = Instant::now();
        self.push_frontiers_up()?;
        debug!("tier {}: frontier propagation in {:.2?}", self.this_tier, t.elapsed());

        self.mark_draws();
        self.db.flush_solving_tier()?;
        Ok(())
    }

    fn this_tier_index(&self) -> usize {
        self.child_tiers.len() - 1
    }

    fn own_frontiers(&self) -> std::sync::MutexGuard<'_, ThreadFrontiers> {
        let tid = rayon::current_thread_index().unwrap_or(0);
        self.frontiers[tid].lock().expect("frontier lock poisoned")
    }

    fn parents_of(&self, child: TierPosition) -> Vec<Position> {
        match &self.reverse_graph {
            Some(graph) => graph.pop_parents(child),
            None => self.game.canonical_parent_positions(child, self.this_tier),
        }
    }

    /// Streams every non-drawing record of every child tier into the
    /// frontiers. Child tiers are processed sequentially so that, within
    /// each frontier bucket, records stay grouped by child index.
    fn load_children(&self) -> Result<(), SolveError> {
        let num_child_tiers = self.child_tiers.len() - 1;
        for child_index in 0..num_child_tiers {
            let child_tier = self.child_tiers[child_index];
            let canonical = self.game.canonical_tier(child_tier);
            if canonical == child_tier {
                self.load_canonical_child(child_index)?;
            } else {
                self.load_symmetric_child(child_index, canonical)?;
            }
        }
        Ok(())
    }

    fn load_canonical_child(&self, child_index: usize) -> Result<(), SolveError> {
        let child_tier = self.child_tiers[child_index];
        let size = self.game.tier_size(child_tier);

        chunk_ranges(size, self.config.db_chunk_size)
            .into_par_iter()
            .try_for_each(|range| {
                let mut probe = self.db.probe()?;
                let mut frontiers = self.own_frontiers();
                for position in range {
                    let tp = TierPosition::new(child_tier, position);
                    let value = probe.value(tp)?;
                    if matches!(value, Value::Undecided | Value::Draw) {
                        continue;
                    }
                    let remoteness = probe.remoteness(tp)?;
                    if remoteness < 0 {
                        return Err(SolveError::InvalidRemoteness {
                            tier_position: tp,
                            remoteness,
                        });
                    }
                    frontiers.push_record(child_index, position, value, remoteness)?;
                }
                Ok(())
            })
    }

    /// Loads a non-canonical child tier by probing its canonical image and
    /// translating winning and losing positions back. Ties and draws are
    /// not translated: they are already covered through the canonical tier.
    fn load_symmetric_child(&self, child_index: usize, canonical: Tier) -> Result<(), SolveError> {
        let child_tier = self.child_tiers[child_index];
        let size = self.game.tier_size(canonical);

        chunk_ranges(size, self.config.db_chunk_size)
            .into_par_iter()
            .try_for_each(|range| {
                let mut probe = self.db.probe()?;
                let mut frontiers = self.own_frontiers();
                for position in range {
                    let tp = TierPosition::new(canonical, position);
                    let value = probe.value(tp)?;
                    if !matches!(value, Value::Win | Value::Lose) {
                        continue;
                    }
                    let remoteness = probe.remoteness(tp)?;
                    if remoteness < 0 {
                        return Err(SolveError::InvalidRemoteness {
                            tier_position: tp,
                            remoteness,
                        });
                    }
                    let local = self.game.position_in_symmetric_tier(tp, child_tier);
                    frontiers.push_record(child_index, local, value, remoteness)?;
                }
                Ok(())
            })
    }

    /// Counts children of every legal canonical position and emits
    /// primitives into the frontier at remoteness 0.
    fn scan_tier(&self) -> Result<(), SolveError> {
        let this_tier_index = self.this_tier_index();

        chunk_ranges(self.this_tier_size, self.config.scan_chunk_size)
            .into_par_iter()
            .try_for_each(|range| {
                let mut frontiers = self.own_frontiers();
                for position in range {
                    let tp = TierPosition::new(self.this_tier, position);
                    if !self.game.is_legal_position(tp)
                        || self.game.canonical_position(tp) != position
                    {
                        self.undecided_children[position as usize]
                            .store(ILLEGAL_NUM_CHILDREN, Ordering::Relaxed);
                        continue;
                    }

                    let value = self.game.primitive(tp);
                    if value != Value::Undecided {
                        self.db.set_value(position, value);
                        self.db.set_remoteness(position, 0);
                        frontiers.push_record(this_tier_index, position, value, 0)?;
                        continue;
                    }

                    let num_children = match &self.reverse_graph {
                        Some(graph) => {
                            let children = self.game.canonical_child_positions(tp);
                            for &child in &children {
                                graph.add(child, position);
                            }
                            children.len()
                        }
                        None => self.game.num_canonical_child_positions(tp),
                    };
                    if num_children == 0 {
                        return Err(SolveError::ChildlessNonPrimitive(tp));
                    }
                    if num_children > MAX_CHILD_COUNT {
                        return Err(SolveError::TooManyChildren {
                            tier_position: tp,
                            count: num_children,
                        });
                    }
                    self.undecided_children[position as usize]
                        .store(num_children as u8, Ordering::Relaxed);
                }
                Ok(())
            })?;

        for frontiers in &self.frontiers {
            frontiers
                .lock()
                .expect("frontier lock poisoned")
                .accumulate_dividers();
        }
        Ok(())
    }

    fn push_frontiers_up(&self) -> Result<(), SolveError> {
        // Win/lose levels first, strictly ascending; lose before win within
        // a level so that same-level win records see up-to-date counters.
        for remoteness in 0..=REMOTENESS_MAX {
            self.push_level(FrontierKind::Lose, remoteness)?;
            self.push_level(FrontierKind::Win, remoteness)?;
        }
        for remoteness in 0..=REMOTENESS_MAX {
            self.push_level(FrontierKind::Tie, remoteness)?;
        }
        Ok(())
    }

    /// Processes every record at `remoteness` across all threads' `kind`
    /// frontiers, then releases that level's storage.
    fn push_level(&self, kind: FrontierKind, remoteness: Remoteness) -> Result<(), SolveError> {
        // Move the level out of every frontier. The parallel walk below
        // reads these snapshots while threads push records at
        // `remoteness + 1` into the live frontiers.
        let levels: Vec<(Vec<Position>, Vec<i64>)> = self
            .frontiers
            .iter()
            .map(|f| {
                f.lock()
                    .expect("frontier lock poisoned")
                    .get_mut(kind)
                    .take_remoteness(remoteness)
            })
            .collect();

        let mut offsets: Vec<i64> = Vec::with_capacity(levels.len() + 1);
        offsets.push(0);
        for (bucket, _) in &levels {
            offsets.push(offsets.last().unwrap() + bucket.len() as i64);
        }
        let total = *offsets.last().unwrap();
        if total == 0 {
            return Ok(());
        }

        chunk_ranges(total, self.config.propagate_chunk_size)
            .into_par_iter()
            .try_for_each(|range| {
                // Records are walked in linear order, so the source frontier
                // and child index only ever advance; both start from the
                // chunk's first record and amortize to O(1) per record.
                let mut frontier_id = offsets.partition_point(|&o| o <= range.start) - 1;
                let mut child_index = 0;
                for i in range {
                    while i >= offsets[frontier_id + 1] {
                        frontier_id += 1;
                        child_index = 0;
                    }
                    let (bucket, dividers) = &levels[frontier_id];
                    let index_in_bucket = (i - offsets[frontier_id]) as usize;
                    while index_in_bucket as i64 >= dividers[child_index] {
                        child_index += 1;
                    }
                    let child = TierPosition::new(
                        self.child_tiers[child_index],
                        bucket[index_in_bucket],
                    );
                    self.process_record(kind, remoteness, child)?;
                }
                Ok(())
            })
    }

    fn process_record(
        &self,
        kind: FrontierKind,
        remoteness: Remoteness,
        child: TierPosition,
    ) -> Result<(), SolveError> {
        let parents = self.parents_of(child);
        if parents.is_empty() {
            return Ok(());
        }
        let this_tier_index = self.this_tier_index();
        let mut frontiers = self.own_frontiers();

        match kind {
            // A lose (tie) child makes every still-undecided parent a win
            // (tie) at remoteness + 1. The counter is swapped to zero rather
            // than decremented: once any lose child is seen the parent's
            // value is final, and a parent of a tie child can never become
            // lose, so remaining win children must not resurrect it.
            FrontierKind::Lose | FrontierKind::Tie => {
                let (value, target) = match kind {
                    FrontierKind::Lose => (Value::Win, FrontierKind::Win),
                    _ => (Value::Tie, FrontierKind::Tie),
                };
                for &parent in &parents {
                    let remaining =
                        self.undecided_children[parent as usize].swap(0, Ordering::Relaxed);
                    if remaining == 0 {
                        continue; // Parent already solved.
                    }
                    self.db.set_value(parent, value);
                    self.db.set_remoteness(parent, remoteness + 1);
                    frontiers
                        .get_mut(target)
                        .add(parent, remoteness + 1, this_tier_index)?;
                }
            }

            // A win child only decides a parent once it is the parent's last
            // undecided child: the unique thread that observes the 1→0
            // transition marks the parent lose at remoteness + 1.
            FrontierKind::Win => {
                for &parent in &parents {
                    let remaining =
                        decrement_if_nonzero(&self.undecided_children[parent as usize]);
                    if remaining == 1 {
                        self.db.set_value(parent, Value::Lose);
                        self.db.set_remoteness(parent, remoteness + 1);
                        frontiers
                            .get_mut(FrontierKind::Lose)
                            .add(parent, remoteness + 1, this_tier_index)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Positions with undecided children left after propagation can never
    /// be forced to a terminal: they are draws.
    fn mark_draws(&self) {
        chunk_ranges(self.this_tier_size, self.config.scan_chunk_size)
            .into_par_iter()
            .for_each(|range| {
                for position in range {
                    let remaining = self.undecided_children[position as usize].load(Ordering::Relaxed);
                    if remaining == ILLEGAL_NUM_CHILDREN {
                        continue;
                    }
                    if remaining > 0 {
                        self.db.set_value(position, Value::Draw);
                        continue;
                    }
                    debug_assert!(
                        self.db.value(position) != Value::Undecided,
                        "position {position} has zero undecided children but no value"
                    );
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_if_nonzero_bottoms_out_at_zero() {
        let cell = AtomicU8::new(2);
        assert_eq!(decrement_if_nonzero(&cell), 2);
        assert_eq!(decrement_if_nonzero(&cell), 1);
        assert_eq!(decrement_if_nonzero(&cell), 0);
        assert_eq!(cell.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn decrement_observations_are_unique_across_threads() {
        use std::sync::atomic::AtomicUsize;

        let cell = AtomicU8::new(100);
        let saw_one = AtomicUsize::new(0);
        rayon::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|_| {
                    for _ in 0..50 {
                        if decrement_if_nonzero(&cell) == 1 {
                            saw_one.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        // 400 attempted decrements on an initial count of 100: exactly one
        // thread may observe the 1→0 transition.
        assert_eq!(cell.load(Ordering::Relaxed), 0);
        assert_eq!(saw_one.load(Ordering::Relaxed), 1);
    }
}
