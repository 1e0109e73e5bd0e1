//! Mover trait — the abstraction over the motion subsystem.
//!
//! A Mover accepts one goal at a time and works towards it on its own,
//! reporting progress through asynchronous notifications. Installing a new
//! goal implicitly supersedes the previous one; installing `None` clears it.
//!
//! Implementations: a game-bot pathfinder bridge, the in-memory simulator.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::MoverError;
use crate::geometry::Coordinate3;
use crate::goal::{EntityRef, PursuitGoal};

/// Result of a path computation reported by the mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    /// A complete path was found
    Success,
    /// A partial path was found; the search continues
    Partial,
    /// The target is provably unreachable
    NoPath,
    /// The search ran out of its own time budget
    Timeout,
}

/// Asynchronous notifications emitted by the mover.
///
/// Each fires at most once per relevant event per goal lifetime, except
/// `PathStatus` which repeats whenever the mover replans.
#[derive(Debug, Clone, PartialEq)]
pub enum MoverEvent {
    /// The current goal was reached.
    Arrived,

    /// A path computation finished.
    PathStatus {
        status: PathStatus,
        path: Vec<Coordinate3>,
    },

    /// The current path was abandoned (obstruction, goal cleared externally).
    PathInterrupted,
}

/// The core Mover trait.
///
/// Goal installation is synchronous so that a goal can be cleared from a
/// `Drop` implementation on every exit path.
pub trait Mover: Send + Sync {
    /// A short name for logs (e.g. "mineflayer", "sim").
    fn name(&self) -> &str;

    /// Install (`Some`) or clear (`None`) the pursuit goal.
    fn set_goal(&self, goal: Option<PursuitGoal>, dynamic: bool) -> Result<(), MoverError>;

    /// Subscribe to notifications. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<MoverEvent>;

    /// Current agent position.
    fn position(&self) -> Coordinate3;

    /// Current position of an entity, if it is still known.
    fn locate(&self, entity: &EntityRef) -> Option<Coordinate3>;

    /// Release any manual control state (sprint, jump, ...).
    fn clear_controls(&self) {}

    /// Straight-line distance from the agent to `target`.
    fn distance_to(&self, target: &Coordinate3) -> f64 {
        self.position().distance_to(target)
    }

    /// Where the goal currently points, resolving entities to positions.
    fn goal_target(&self, goal: &PursuitGoal) -> Option<Coordinate3> {
        match goal {
            PursuitGoal::Point { target } | PursuitGoal::Proximity { target, .. } => Some(*target),
            PursuitGoal::Follow { entity, .. } => self.locate(entity),
        }
    }
}
