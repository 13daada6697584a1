//! # tiersolve: retrograde tier solver
//!
//! Exhaustively solves finite two-player perfect-information games: for
//! every reachable position, its game-theoretic value (win / lose / tie /
//! draw) and its *remoteness*, the number of plies to the nearest terminal
//! under optimal play.
//!
//! The position graph is decomposed by the game into acyclic layers
//! ("tiers"). Tiers are solved bottom-up, one [`worker::TierWorker::solve`]
//! call per tier; which tier to solve next is the scheduler's concern and
//! lives outside this crate.
//!
//! ## Algorithm overview
//!
//! | Phase | Module | Description |
//! |-------|--------|-------------|
//! | Load children | [`worker`] | Stream solved child-tier records into per-thread [`frontier::Frontier`]s bucketed by remoteness |
//! | Scan tier | [`worker`] | Emit primitives, count children into a dense atomic counter array, optionally build the [`reverse_graph::ReverseGraph`] |
//! | Propagate | [`worker`] | Push frontiers up through the parent relation, one remoteness level at a time |
//! | Mark draws | [`worker`] | Whatever keeps an undecided child is a draw |
//! | Flush | [`db`] | Hand the solved table to the database |
//!
//! Tiers declared loop-free skip the frontier machinery for a layered
//! value-iteration fixed point instead.
//!
//! ## Collaborators
//!
//! The solver consumes a [`game::Game`] (move generation, hashing, tier
//! structure) and a [`db::Database`] (record persistence) and nothing else.
//! [`array_db::ArrayDb`] is a bundled directory-backed database;
//! [`tester::test_tier`] spot-checks a game implementation before burning
//! solver time on it; [`remote::serve`] turns this process into a worker
//! node of a distributed deployment.

pub mod array_db;
pub mod config;
pub mod db;
pub mod error;
pub mod frontier;
pub mod game;
pub mod remote;
pub mod reverse_graph;
pub mod tester;
pub mod types;
pub mod worker;

pub use array_db::ArrayDb;
pub use config::{init_rayon_threads, SolverConfig};
pub use db::{Database, DbProbe, TierStatus};
pub use error::{DbError, LinkError, SolveError, TestError};
pub use game::Game;
pub use tester::test_tier;
pub use types::{
    Move, Position, Remoteness, Tier, TierPosition, TierType, Value, MAX_CHILD_COUNT,
    REMOTENESS_MAX,
};
pub use worker::{SolveOptions, SolveOutcome, TierWorker};
