//! Scripted path behaviors and the task that plays them out.

use std::sync::Arc;
use std::time::Duration;

use wayfarer_core::{Coordinate3, MoverEvent, PathStatus, PursuitGoal};

use crate::Shared;

/// How often a walking agent advances.
pub const TICK: Duration = Duration::from_millis(250);

/// What the simulated mover does with the next goal it receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    /// Report a straight path, then walk towards the target at `speed`
    /// units per second and report arrival once the goal is satisfied.
    Walk { speed: f64 },

    /// Teleport to the target after a delay and report arrival.
    ArriveAfter(Duration),

    /// Report `PathStatus::NoPath` after a delay.
    NoPathAfter(Duration),

    /// Report `PathStatus::Timeout` after a delay.
    PathTimeoutAfter(Duration),

    /// Report a successful path computation without moving.
    PathFound { path: Vec<Coordinate3>, after: Duration },

    /// Report `PathInterrupted` after a delay, optionally relocating first.
    InterruptAfter {
        after: Duration,
        teleport: Option<Coordinate3>,
    },

    /// Never report anything and never move.
    Idle,
}

impl Default for Behavior {
    fn default() -> Self {
        Self::Walk { speed: 4.3 }
    }
}

/// Waypoints on the straight line from `from` to `to`, one per unit.
pub fn straight_path(from: Coordinate3, to: Coordinate3) -> Vec<Coordinate3> {
    let steps = from.distance_to(&to).ceil().max(1.0) as usize;
    let mut path = Vec::with_capacity(steps);
    let mut cursor = from;
    for _ in 0..steps {
        cursor = cursor.step_towards(&to, 1.0);
        path.push(cursor);
    }
    path
}

/// Play `behavior` for the goal installed at `generation`. Exits silently
/// as soon as a newer goal (or a clear) supersedes it.
pub(crate) async fn drive(
    shared: Arc<Shared>,
    generation: u64,
    goal: PursuitGoal,
    behavior: Behavior,
) {
    match behavior {
        Behavior::Walk { speed } => walk(shared, generation, goal, speed).await,
        Behavior::ArriveAfter(after) => {
            tokio::time::sleep(after).await;
            let mut state = shared.lock();
            if state.generation != generation {
                return;
            }
            if let Some(target) = state.goal_target(&goal) {
                state.position = target;
            }
            let _ = shared.events.send(MoverEvent::Arrived);
        }
        Behavior::NoPathAfter(after) => {
            tokio::time::sleep(after).await;
            shared.emit_if_current(
                generation,
                MoverEvent::PathStatus {
                    status: PathStatus::NoPath,
                    path: Vec::new(),
                },
            );
        }
        Behavior::PathTimeoutAfter(after) => {
            tokio::time::sleep(after).await;
            shared.emit_if_current(
                generation,
                MoverEvent::PathStatus {
                    status: PathStatus::Timeout,
                    path: Vec::new(),
                },
            );
        }
        Behavior::PathFound { path, after } => {
            tokio::time::sleep(after).await;
            shared.emit_if_current(
                generation,
                MoverEvent::PathStatus {
                    status: PathStatus::Success,
                    path,
                },
            );
        }
        Behavior::InterruptAfter { after, teleport } => {
            tokio::time::sleep(after).await;
            let mut state = shared.lock();
            if state.generation != generation {
                return;
            }
            if let Some(position) = teleport {
                state.position = position;
            }
            let _ = shared.events.send(MoverEvent::PathInterrupted);
        }
        Behavior::Idle => {}
    }
}

async fn walk(shared: Arc<Shared>, generation: u64, goal: PursuitGoal, speed: f64) {
    {
        let state = shared.lock();
        if state.generation != generation {
            return;
        }
        let Some(target) = state.goal_target(&goal) else {
            return;
        };
        let path = straight_path(state.position, target);
        let _ = shared.events.send(MoverEvent::PathStatus {
            status: PathStatus::Success,
            path,
        });
    }

    let step = speed * TICK.as_secs_f64();
    loop {
        tokio::time::sleep(TICK).await;
        let mut state = shared.lock();
        if state.generation != generation {
            return;
        }
        let Some(target) = state.goal_target(&goal) else {
            // Followed entity is gone; the mover just stops.
            return;
        };
        state.position = state.position.step_towards(&target, step);
        if goal.is_reached(&state.position, &target) {
            tracing::debug!(position = %state.position, "sim walker reached goal");
            let _ = shared.events.send(MoverEvent::Arrived);
            return;
        }
    }
}
