//! Worker side of a multi-node deployment.
//!
//! A dispatcher process owns the tier schedule; workers run [`serve`],
//! which announces readiness and then executes whatever the dispatcher
//! hands back. The transport is abstracted behind [`ManagerLink`] so the
//! same loop runs over MPI-style byte channels, sockets, or the bundled
//! in-process [`ChannelLink`].

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::LinkError;
use crate::game::Game;
use crate::types::Tier;
use crate::worker::{SolveOptions, SolveOutcome, TierWorker};

/// Dispatcher → worker commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// No tier is ready; check back in a moment.
    Sleep,
    /// Shut down cleanly.
    Terminate,
    /// Solve this tier if not already solved.
    Solve(Tier),
    /// Re-solve this tier unconditionally.
    ForceSolve(Tier),
}

/// Worker → dispatcher replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Report {
    /// Ready for work.
    Check,
    /// The commanded tier was solved by this worker.
    Solved,
    /// The commanded tier was already solved; nothing was done.
    Loaded,
    /// The solve failed.
    Error(String),
}

/// Transport between one worker and the dispatcher.
pub trait ManagerLink {
    fn send(&mut self, report: Report) -> Result<(), LinkError>;
    fn recv(&mut self) -> Result<Command, LinkError>;
}

/// How long a worker naps after a `Sleep` command before checking in again.
const SLEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Runs the worker loop until the dispatcher sends `Terminate` or the link
/// breaks. Solve failures are reported to the dispatcher, not returned: a
/// worker outlives the tiers it fails.
pub fn serve<G, D, L>(worker: &TierWorker<'_, G, D>, link: &mut L) -> Result<(), LinkError>
where
    G: Game,
    D: Database,
    L: ManagerLink,
{
    link.send(Report::Check)?;
    loop {
        match link.recv()? {
            Command::Sleep => {
                std::thread::sleep(SLEEP_INTERVAL);
                link.send(Report::Check)?;
            }
            Command::Terminate => return Ok(()),
            Command::Solve(tier) => solve_and_report(worker, link, tier, false)?,
            Command::ForceSolve(tier) => solve_and_report(worker, link, tier, true)?,
        }
    }
}

fn solve_and_report<G, D, L>(
    worker: &TierWorker<'_, G, D>,
    link: &mut L,
    tier: Tier,
    force: bool,
) -> Result<(), LinkError>
where
    G: Game,
    D: Database,
    L: ManagerLink,
{
    let options = SolveOptions {
        force,
        compare: false,
    };
    let report = match worker.solve(tier, options) {
        Ok(SolveOutcome::Solved) => Report::Solved,
        Ok(SolveOutcome::Loaded) => Report::Loaded,
        Err(e) => {
            warn!("tier {tier}: solve failed: {e}");
            Report::Error(e.to_string())
        }
    };
    link.send(report)
}

/// In-process [`ManagerLink`] over crossbeam channels, for tests and
/// single-machine deployments.
pub struct ChannelLink {
    reports: Sender<Report>,
    commands: Receiver<Command>,
}

/// Dispatcher-side handle paired with a [`ChannelLink`].
pub struct ManagerChannel {
    pub commands: Sender<Command>,
    pub reports: Receiver<Report>,
}

impl ChannelLink {
    /// An unbounded worker/dispatcher channel pair.
    pub fn pair() -> (ChannelLink, ManagerChannel) {
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        (
            ChannelLink {
                reports: report_tx,
                commands: command_rx,
            },
            ManagerChannel {
                commands: command_tx,
                reports: report_rx,
            },
        )
    }
}

impl ManagerLink for ChannelLink {
    fn send(&mut self, report: Report) -> Result<(), LinkError> {
        self.reports
            .send(report)
            .map_err(|e| LinkError(e.to_string()))
    }

    fn recv(&mut self) -> Result<Command, LinkError> {
        self.commands.recv().map_err(|e| LinkError(e.to_string()))
    }
}
