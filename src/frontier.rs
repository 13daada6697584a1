//! Append-only store of solved-but-unpropagated positions, bucketed by
//! remoteness.
//!
//! Within a bucket, records are grouped by the index of the child tier they
//! came from, and a dividers row records the cumulative record count per
//! child index. This lets the propagation loop recover a record's
//! originating tier in O(1) amortized time instead of tagging every record.
//!
//! The grouping is a property of the caller, not of this type: all records
//! for child index `i` must be added before any record for child index
//! `i + 1` within the same bucket. The solver's phase structure guarantees
//! this, because child tiers load sequentially and every record pushed
//! after [`Frontier::accumulate_dividers`] carries the final (solving-tier)
//! index.

use crate::error::SolveError;
use crate::types::{Position, Remoteness};

pub struct Frontier {
    /// One bucket per remoteness level.
    buckets: Vec<Vec<Position>>,
    /// Per bucket: record counts per child index; prefix sums after
    /// [`Frontier::accumulate_dividers`].
    dividers: Vec<Vec<i64>>,
}

impl Frontier {
    /// `levels` remoteness buckets, each with a `dividers_width`-wide
    /// dividers row.
    pub fn new(levels: usize, dividers_width: usize) -> Self {
        Self {
            buckets: (0..levels).map(|_| Vec::new()).collect(),
            dividers: (0..levels).map(|_| vec![0; dividers_width]).collect(),
        }
    }

    /// Appends `position` to the bucket for `remoteness`, attributing it to
    /// the child tier at `child_index`.
    pub fn add(
        &mut self,
        position: Position,
        remoteness: Remoteness,
        child_index: usize,
    ) -> Result<(), SolveError> {
        debug_assert!(remoteness >= 0);
        let level = remoteness as usize;
        if level >= self.buckets.len() {
            return Err(SolveError::RemotenessOverflow(remoteness));
        }
        self.buckets[level].push(position);
        self.dividers[level][child_index] += 1;
        Ok(())
    }

    /// Converts every dividers row from per-child counts to prefix sums, so
    /// `dividers[r][i]` becomes the number of records in bucket `r` with
    /// child index `<= i`. Call exactly once, after the load and scan phases.
    pub fn accumulate_dividers(&mut self) {
        for row in &mut self.dividers {
            for i in 1..row.len() {
                row[i] += row[i - 1];
            }
        }
    }

    /// Number of records in the bucket for `remoteness`.
    pub fn len_at(&self, remoteness: Remoteness) -> usize {
        self.buckets[remoteness as usize].len()
    }

    /// Moves out the bucket and dividers row for `remoteness`, releasing
    /// their storage here. Each level is taken exactly once, after which the
    /// frontier only receives pushes at higher remotenesses.
    pub fn take_remoteness(&mut self, remoteness: Remoteness) -> (Vec<Position>, Vec<i64>) {
        let level = remoteness as usize;
        (
            std::mem::take(&mut self.buckets[level]),
            std::mem::take(&mut self.dividers[level]),
        )
    }
}
