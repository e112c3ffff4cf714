//! Deterministic step generation for the algorithm theatre.
//!
//! A [`Run`] is a lazy, forward-only iterator of [`Step`]s. Every run owns its
//! own seeded generator, so two runs with the same request and seed produce the
//! same sequence regardless of what else is running.

mod pathfinding;
mod sorting;

use futures::stream::{self, Stream};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::types::{AlgorithmFamily, PathfindingVariant, SortingVariant, StepRecord};

pub use pathfinding::{GridPoint, GOAL, GRID_SIZE, START};
pub use sorting::ARRAY_LEN;

use pathfinding::Pathfinder;
use sorting::Sorter;

/// One emitted frame of an algorithm run
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub index: u32,
    pub visual_state: Value,
    pub cost: f64,
    pub heuristic: f64,
}

impl Step {
    /// Encode for the wire. The visual state travels as a JSON string.
    pub fn to_record(&self) -> StepRecord {
        StepRecord {
            step_index: self.index,
            state_snapshot: self.visual_state.to_string(),
            cost: self.cost,
            heuristic: self.heuristic,
        }
    }
}

/// Frame produced by an algorithm before the run assigns it an index
#[derive(Debug, Clone)]
struct Frame {
    visual_state: Value,
    cost: f64,
    heuristic: f64,
}

/// The algorithm a run executes, resolved from the client's selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmRequest {
    Pathfinding(PathfindingVariant),
    Sorting(SortingVariant),
    /// Nothing to animate (graph traversal, or a family without a variant)
    Idle,
}

impl AlgorithmRequest {
    /// Pick the variant matching the family; the other selection is ignored.
    pub fn resolve(
        family: AlgorithmFamily,
        pathfinding: Option<PathfindingVariant>,
        sorting: Option<SortingVariant>,
    ) -> Self {
        match (family, pathfinding, sorting) {
            (AlgorithmFamily::Pathfinding, Some(variant), _) => Self::Pathfinding(variant),
            (AlgorithmFamily::Sorting, _, Some(variant)) => Self::Sorting(variant),
            _ => Self::Idle,
        }
    }
}

enum Algorithm {
    Pathfinding(Pathfinder),
    Sorting(Sorter),
    Idle,
}

/// A single execution of the step engine for one consumer
pub struct Run {
    algorithm: Algorithm,
    next_index: u32,
    cancel: Option<CancellationToken>,
    finished: bool,
}

impl Run {
    pub fn new(request: AlgorithmRequest, seed: i32) -> Self {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let algorithm = match request {
            AlgorithmRequest::Pathfinding(variant) => {
                Algorithm::Pathfinding(Pathfinder::new(variant, rng))
            }
            AlgorithmRequest::Sorting(variant) => {
                Algorithm::Sorting(Sorter::new(variant, &mut rng))
            }
            AlgorithmRequest::Idle => Algorithm::Idle,
        };

        Self {
            algorithm,
            next_index: 0,
            cancel: None,
            finished: false,
        }
    }

    /// Stop yielding steps as soon as `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

impl Iterator for Run {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.finished {
            return None;
        }

        // Cancellation ends the run silently, with no partial step
        if self.is_cancelled() {
            self.finished = true;
            return None;
        }

        let frame = match &mut self.algorithm {
            Algorithm::Pathfinding(p) => p.next_frame(),
            Algorithm::Sorting(s) => s.next_frame(),
            Algorithm::Idle => None,
        };

        let Some(frame) = frame else {
            self.finished = true;
            return None;
        };

        let step = Step {
            index: self.next_index,
            visual_state: frame.visual_state,
            cost: frame.cost,
            heuristic: frame.heuristic,
        };
        self.next_index += 1;
        Some(step)
    }
}

/// Presentation throttle between successive steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    pub pathfinding: Duration,
    pub sorting: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            pathfinding: Duration::from_millis(18),
            sorting: Duration::from_millis(12),
        }
    }
}

impl Pacing {
    /// No delay at all (tests, benchmarks)
    pub fn none() -> Self {
        Self {
            pathfinding: Duration::ZERO,
            sorting: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, request: AlgorithmRequest) -> Duration {
        match request {
            AlgorithmRequest::Pathfinding(_) => self.pathfinding,
            AlgorithmRequest::Sorting(_) | AlgorithmRequest::Idle => self.sorting,
        }
    }
}

/// Drive a run as an async stream, sleeping `delay` between steps.
///
/// The delay races the cancellation token, so a cancelled consumer never waits
/// out a full pacing interval and no further steps are produced.
pub fn step_stream(
    run: Run,
    delay: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = Step> {
    let run = run.with_cancellation(cancel.clone());

    stream::unfold(
        (run, cancel, false),
        move |(mut run, cancel, started)| async move {
            if started && !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let step = run.next()?;
            Some((step, (run, cancel, true)))
        },
    )
}
