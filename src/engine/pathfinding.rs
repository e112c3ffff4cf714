use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashSet};

use super::Frame;
use crate::types::PathfindingVariant;

pub const GRID_SIZE: i32 = 12;
pub const START: GridPoint = GridPoint { x: 0, y: 0 };
pub const GOAL: GridPoint = GridPoint {
    x: GRID_SIZE - 1,
    y: GRID_SIZE - 1,
};

const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub fn manhattan(&self, other: &GridPoint) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    fn in_bounds(&self) -> bool {
        (0..GRID_SIZE).contains(&self.x) && (0..GRID_SIZE).contains(&self.y)
    }

    fn neighbors(self) -> impl Iterator<Item = GridPoint> {
        NEIGHBOR_OFFSETS
            .into_iter()
            .map(move |(dx, dy)| GridPoint {
                x: self.x + dx,
                y: self.y + dy,
            })
            .filter(GridPoint::in_bounds)
    }
}

/// Grid search over a randomly walled board.
///
/// The frontier is a plain ordered list; the variant only decides which
/// member is extracted next. Closed points are kept both as a set for
/// membership and in insertion order for rendering.
pub(super) struct Pathfinder {
    variant: PathfindingVariant,
    rng: StdRng,
    walls: BTreeSet<GridPoint>,
    frontier: Vec<GridPoint>,
    closed: HashSet<GridPoint>,
    closed_order: Vec<GridPoint>,
    cost: f64,
    reached_goal: bool,
}

impl Pathfinder {
    pub(super) fn new(variant: PathfindingVariant, mut rng: StdRng) -> Self {
        let walls = generate_walls(&mut rng);
        Self {
            variant,
            rng,
            walls,
            frontier: vec![START],
            closed: HashSet::new(),
            closed_order: Vec::new(),
            cost: 0.0,
            reached_goal: false,
        }
    }

    fn extract(&mut self) -> GridPoint {
        let position = match self.variant {
            PathfindingVariant::Dijkstra => 0,
            // Ties go to the earliest frontier entry
            PathfindingVariant::AStar => self
                .frontier
                .iter()
                .enumerate()
                .min_by_key(|(_, p)| p.manhattan(&GOAL))
                .map(|(i, _)| i)
                .unwrap_or(0),
        };
        self.frontier.remove(position)
    }

    pub(super) fn next_frame(&mut self) -> Option<Frame> {
        if self.reached_goal {
            return None;
        }

        while !self.frontier.is_empty() {
            let current = self.extract();
            if !self.closed.insert(current) {
                continue;
            }
            self.closed_order.push(current);

            let heuristic = match self.variant {
                PathfindingVariant::AStar => current.manhattan(&GOAL) as f64,
                PathfindingVariant::Dijkstra => self.cost,
            };

            let frame = Frame {
                visual_state: json!({
                    "gridSize": GRID_SIZE,
                    "current": current,
                    "goal": GOAL,
                    "walls": self.walls,
                    "open": self.frontier,
                    "closed": self.closed_order,
                }),
                cost: self.cost,
                heuristic,
            };

            if current == GOAL {
                self.reached_goal = true;
                return Some(frame);
            }

            for neighbor in current.neighbors() {
                if self.walls.contains(&neighbor) || self.closed.contains(&neighbor) {
                    continue;
                }
                if !self.frontier.contains(&neighbor) {
                    self.frontier.push(neighbor);
                }
            }

            self.cost += self.rng.random::<f64>() + 0.1;
            return Some(frame);
        }

        // Frontier exhausted: the goal is unreachable and the run just ends
        None
    }
}

fn generate_walls(rng: &mut StdRng) -> BTreeSet<GridPoint> {
    let mut walls = BTreeSet::new();
    for _ in 0..GRID_SIZE * 2 {
        let wall = GridPoint {
            x: rng.random_range(0..GRID_SIZE),
            y: rng.random_range(0..GRID_SIZE),
        };
        if wall == START || wall == GOAL {
            continue;
        }
        walls.insert(wall);
    }
    walls
}
