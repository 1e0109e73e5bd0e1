//! Pursuit goals and their terminal outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TaskError;
use crate::geometry::Coordinate3;

/// A reference to a (possibly moving) entity in the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Stable entity id assigned by the world
    pub id: u64,

    /// Entity type or player name (e.g. "horse", "Steve")
    pub name: String,
}

impl EntityRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// The goal a pursuit installs on the mover.
///
/// Immutable once created. A pursuit holds exactly one goal, installed at
/// start and cleared at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PursuitGoal {
    /// Occupy the block containing `target`.
    Point { target: Coordinate3 },

    /// Be within `radius` of `target`.
    Proximity { target: Coordinate3, radius: f64 },

    /// Stay within `radius` of a moving entity.
    Follow { entity: EntityRef, radius: f64 },
}

impl PursuitGoal {
    pub fn point(target: Coordinate3) -> Self {
        Self::Point { target }
    }

    pub fn proximity(target: Coordinate3, radius: f64) -> Self {
        Self::Proximity { target, radius }
    }

    pub fn follow(entity: EntityRef, radius: f64) -> Self {
        Self::Follow { entity, radius }
    }

    /// Dynamic goals track a target that may move while the pursuit runs.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Follow { .. })
    }

    /// The fixed target position, if the goal has one.
    pub fn fixed_target(&self) -> Option<Coordinate3> {
        match self {
            Self::Point { target } | Self::Proximity { target, .. } => Some(*target),
            Self::Follow { .. } => None,
        }
    }

    /// Whether an agent at `agent` satisfies this goal given the target's
    /// current position. Point goals compare block cells exactly.
    pub fn is_reached(&self, agent: &Coordinate3, target: &Coordinate3) -> bool {
        match self {
            Self::Point { .. } => agent.block() == target.block(),
            Self::Proximity { radius, .. } | Self::Follow { radius, .. } => {
                agent.distance_to(target) <= *radius
            }
        }
    }
}

impl fmt::Display for PursuitGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point { target } => write!(f, "{target}"),
            Self::Proximity { target, radius } => write!(f, "within {radius} of {target}"),
            Self::Follow { entity, radius } => {
                write!(f, "within {radius} of {} #{}", entity.name, entity.id)
            }
        }
    }
}

/// The single terminal result of a pursuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PursuitOutcome {
    /// The mover reported the goal reached (or the goal is satisfied).
    Arrived { distance: f64 },

    /// Not at the goal, but within the arrival epsilon.
    NearEnough { distance: f64 },

    /// The mover's search proved the target unreachable.
    NoPath,

    /// The deadline (or the mover's own search budget) ran out.
    Timeout { elapsed_ms: u64, distance: f64 },

    /// Position sampling detected no progress.
    Stuck { distance: f64, elapsed_ms: u64 },

    /// An enclosing caller cancelled the pursuit.
    Cancelled { distance: f64, elapsed_ms: u64 },
}

impl PursuitOutcome {
    /// `Arrived` and `NearEnough` count as success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Arrived { .. } | Self::NearEnough { .. })
    }

    /// Stable snake_case label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Arrived { .. } => "arrived",
            Self::NearEnough { .. } => "near_enough",
            Self::NoPath => "no_path",
            Self::Timeout { .. } => "timeout",
            Self::Stuck { .. } => "stuck",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Remaining distance to the target, when it was measured.
    pub fn distance(&self) -> Option<f64> {
        match self {
            Self::Arrived { distance }
            | Self::NearEnough { distance }
            | Self::Timeout { distance, .. }
            | Self::Stuck { distance, .. }
            | Self::Cancelled { distance, .. } => Some(*distance),
            Self::NoPath => None,
        }
    }

    /// Convert a failed outcome into the matching task error.
    /// Returns `None` for success outcomes.
    pub fn into_error(self, target: impl Into<String>) -> Option<TaskError> {
        let target = target.into();
        match self {
            Self::Arrived { .. } | Self::NearEnough { .. } => None,
            Self::NoPath => Some(TaskError::NoPath { target }),
            Self::Timeout {
                elapsed_ms,
                distance,
            } => Some(TaskError::Timeout {
                target,
                elapsed_ms,
                distance,
            }),
            Self::Stuck {
                distance,
                elapsed_ms,
            } => Some(TaskError::Stuck {
                target,
                distance,
                elapsed_ms,
            }),
            Self::Cancelled { .. } => Some(TaskError::Cancelled),
        }
    }
}

impl fmt::Display for PursuitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrived { distance } => write!(f, "arrived (distance {distance:.1})"),
            Self::NearEnough { distance } => write!(f, "near enough (distance {distance:.1})"),
            Self::NoPath => write!(f, "no path"),
            Self::Timeout {
                elapsed_ms,
                distance,
            } => write!(f, "timeout after {elapsed_ms}ms (distance {distance:.1})"),
            Self::Stuck {
                distance,
                elapsed_ms,
            } => write!(f, "stuck after {elapsed_ms}ms (distance {distance:.1})"),
            Self::Cancelled {
                distance,
                elapsed_ms,
            } => write!(f, "cancelled after {elapsed_ms}ms (distance {distance:.1})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_goal_compares_block_cells() {
        let goal = PursuitGoal::point(Coordinate3::new(100.0, 64.0, 100.0));
        let target = Coordinate3::new(100.0, 64.0, 100.0);
        assert!(goal.is_reached(&Coordinate3::new(100.7, 64.2, 100.1), &target));
        assert!(!goal.is_reached(&Coordinate3::new(99.9, 64.0, 100.0), &target));
    }

    #[test]
    fn proximity_goal_uses_radius() {
        let target = Coordinate3::new(10.0, 0.0, 0.0);
        let goal = PursuitGoal::proximity(target, 3.0);
        assert!(goal.is_reached(&Coordinate3::new(7.5, 0.0, 0.0), &target));
        assert!(!goal.is_reached(&Coordinate3::new(6.0, 0.0, 0.0), &target));
    }

    #[test]
    fn only_follow_is_dynamic() {
        assert!(PursuitGoal::follow(EntityRef::new(1, "Steve"), 2.0).is_dynamic());
        assert!(!PursuitGoal::point(Coordinate3::ORIGIN).is_dynamic());
    }

    #[test]
    fn success_outcomes_have_no_error() {
        assert!(PursuitOutcome::Arrived { distance: 0.0 }.into_error("x").is_none());
        assert!(PursuitOutcome::NearEnough { distance: 1.5 }.into_error("x").is_none());
        let err = PursuitOutcome::NoPath.into_error("(1, 2, 3)").unwrap();
        assert_eq!(err.kind(), "no_path");
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_string(&PursuitOutcome::Stuck {
            distance: 12.0,
            elapsed_ms: 10_000,
        })
        .unwrap();
        assert!(json.contains(r#""outcome":"stuck""#));
        assert!(json.contains("10000"));
    }
}
