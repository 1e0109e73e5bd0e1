//! Goal pursuit — one supervised attempt to reach a goal.
//!
//! A pursuit installs its goal on the mover exactly once, then races the
//! mover's notifications against a [`ProgressMonitor`], a hard deadline and
//! the caller's cancellation token. The first of these to produce a terminal
//! outcome wins. Whatever wins, the subscription is dropped and the goal is
//! cleared exactly once before the outcome is returned.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wayfarer_config::StallConfig;
use wayfarer_core::{
    Coordinate3, DomainEvent, EventBus, Mover, MoverError, MoverEvent, PathStatus, PursuitGoal,
    PursuitOutcome,
};

use crate::monitor::ProgressMonitor;
use crate::session::SessionContext;

/// Exclusive hold on the mover's goal for the lifetime of one pursuit.
///
/// The goal is cleared by [`GoalLease::release`] or, if the pursuit is
/// dropped mid-flight, by `Drop`. Never both.
struct GoalLease<'a> {
    mover: &'a dyn Mover,
    held: bool,
}

impl<'a> GoalLease<'a> {
    fn acquire(mover: &'a dyn Mover, goal: PursuitGoal) -> Result<Self, MoverError> {
        let dynamic = goal.is_dynamic();
        mover.set_goal(Some(goal), dynamic)?;
        Ok(Self { mover, held: true })
    }

    fn release(mut self) -> Result<(), MoverError> {
        self.held = false;
        let cleared = self.mover.set_goal(None, false);
        self.mover.clear_controls();
        cleared
    }
}

impl Drop for GoalLease<'_> {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.mover.set_goal(None, false) {
                warn!(error = %e, "Failed to clear goal of abandoned pursuit");
            }
            self.mover.clear_controls();
        }
    }
}

/// Single-resolution guard: the first settle wins, later ones are ignored.
struct Resolution<T> {
    tx: Option<oneshot::Sender<T>>,
}

impl<T> Resolution<T> {
    fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    fn settle(&mut self, value: T) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    fn is_settled(&self) -> bool {
        self.tx.is_none()
    }
}

/// Result of a read-only path probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The mover finished a path computation.
    Path {
        status: PathStatus,
        path: Vec<Coordinate3>,
    },
    /// The mover reported the goal already satisfied.
    Arrived,
    /// No path computation finished before the probe deadline.
    Expired,
    Cancelled,
}

/// Drives single pursuits against the session's mover.
pub struct GoalPursuitController {
    session_id: String,
    mover: Arc<dyn Mover>,
    stall: StallConfig,
    events: Arc<EventBus>,
}

impl GoalPursuitController {
    pub fn new(ctx: &SessionContext) -> Self {
        Self {
            session_id: ctx.session_id.clone(),
            mover: ctx.mover.clone(),
            stall: ctx.config.stall.clone(),
            events: ctx.events.clone(),
        }
    }

    /// Pursue `goal` until it resolves.
    ///
    /// Routine failures (no path, timeout, stuck, cancelled) are outcomes.
    /// Only a failing mover is an error.
    pub async fn pursue(
        &self,
        goal: PursuitGoal,
        deadline: Duration,
        arrival_epsilon: f64,
        cancel: &CancellationToken,
    ) -> Result<PursuitOutcome, MoverError> {
        let mover = self.mover.as_ref();
        let started = Instant::now();

        // Subscribe first so nothing emitted right after set_goal is missed.
        let mut notifications = mover.subscribe();
        let lease = GoalLease::acquire(mover, goal.clone())?;

        info!(
            %goal,
            deadline_ms = deadline.as_millis() as u64,
            "Pursuit started"
        );
        self.events.publish(DomainEvent::PursuitStarted {
            session_id: self.session_id.clone(),
            goal: goal.clone(),
            deadline_ms: deadline.as_millis() as u64,
            timestamp: Utc::now(),
        });

        let (mut resolution, settled) = Resolution::new();
        let failure = {
            let monitor = ProgressMonitor::new(&self.stall, mover.position()).run(mover);
            let expiry = tokio::time::sleep(deadline);
            tokio::pin!(monitor, expiry);

            let mut failure = None;
            while !resolution.is_settled() && failure.is_none() {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        let distance = self.remaining(&goal);
                        resolution.settle(PursuitOutcome::Cancelled {
                            distance,
                            elapsed_ms: elapsed_ms(started),
                        });
                    }

                    received = notifications.recv() => match received {
                        Ok(event) => {
                            if let Some(outcome) = self.on_event(&goal, event, arrival_epsilon, started) {
                                resolution.settle(outcome);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Pursuit lagged behind mover notifications");
                        }
                        Err(RecvError::Closed) => failure = Some(MoverError::Disconnected),
                    },

                    samples = &mut monitor => {
                        let distance = self.remaining(&goal);
                        debug!(samples, distance, "Stall signal");
                        resolution.settle(if distance <= arrival_epsilon {
                            PursuitOutcome::NearEnough { distance }
                        } else {
                            PursuitOutcome::Stuck {
                                distance,
                                elapsed_ms: elapsed_ms(started),
                            }
                        });
                    }

                    _ = &mut expiry => {
                        resolution.settle(self.on_deadline(&goal, arrival_epsilon, started));
                    }
                }
            }
            failure
        };

        // Unsubscribe before giving the goal back.
        drop(notifications);

        if let Some(e) = failure {
            drop(lease);
            warn!(%goal, error = %e, "Pursuit aborted by mover failure");
            return Err(e);
        }
        lease.release()?;

        let outcome = settled
            .await
            .map_err(|_| MoverError::Internal("pursuit finished without an outcome".into()))?;
        let elapsed = elapsed_ms(started);

        if outcome.is_success() {
            info!(%goal, %outcome, elapsed_ms = elapsed, "Pursuit resolved");
        } else {
            warn!(%goal, %outcome, elapsed_ms = elapsed, "Pursuit failed");
        }
        self.events.publish(DomainEvent::PursuitResolved {
            session_id: self.session_id.clone(),
            outcome: outcome.clone(),
            elapsed_ms: elapsed,
            timestamp: Utc::now(),
        });

        Ok(outcome)
    }

    /// Install `goal` only long enough to learn whether a path exists.
    ///
    /// Resolves on the first finished path computation (or arrival), the
    /// deadline, or cancellation. The goal is always cleared before
    /// returning, so the agent never keeps walking.
    pub async fn probe(
        &self,
        goal: PursuitGoal,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, MoverError> {
        let mover = self.mover.as_ref();
        let mut notifications = mover.subscribe();
        let lease = GoalLease::acquire(mover, goal.clone())?;
        debug!(%goal, deadline_ms = deadline.as_millis() as u64, "Probe started");

        let expiry = tokio::time::sleep(deadline);
        tokio::pin!(expiry);

        let result = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break Ok(ProbeOutcome::Cancelled),

                received = notifications.recv() => match received {
                    Ok(MoverEvent::PathStatus { status, path }) => {
                        break Ok(ProbeOutcome::Path { status, path });
                    }
                    Ok(MoverEvent::Arrived) => break Ok(ProbeOutcome::Arrived),
                    Ok(MoverEvent::PathInterrupted) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Probe lagged behind mover notifications");
                    }
                    Err(RecvError::Closed) => break Err(MoverError::Disconnected),
                },

                _ = &mut expiry => break Ok(ProbeOutcome::Expired),
            }
        };

        drop(notifications);
        match result {
            Ok(outcome) => {
                lease.release()?;
                debug!(%goal, ?outcome, "Probe finished");
                Ok(outcome)
            }
            Err(e) => {
                drop(lease);
                Err(e)
            }
        }
    }

    fn on_event(
        &self,
        goal: &PursuitGoal,
        event: MoverEvent,
        arrival_epsilon: f64,
        started: Instant,
    ) -> Option<PursuitOutcome> {
        match event {
            MoverEvent::Arrived => Some(PursuitOutcome::Arrived {
                distance: self.remaining(goal),
            }),
            MoverEvent::PathStatus { status, path } => match status {
                PathStatus::NoPath => Some(PursuitOutcome::NoPath),
                PathStatus::Timeout => Some(PursuitOutcome::Timeout {
                    elapsed_ms: elapsed_ms(started),
                    distance: self.remaining(goal),
                }),
                PathStatus::Success | PathStatus::Partial => {
                    debug!(?status, waypoints = path.len(), "Path computed");
                    None
                }
            },
            MoverEvent::PathInterrupted => {
                let distance = self.remaining(goal);
                if distance <= arrival_epsilon {
                    Some(PursuitOutcome::NearEnough { distance })
                } else {
                    // May be transient; keep waiting.
                    debug!(distance, "Path interrupted away from goal");
                    None
                }
            }
        }
    }

    fn on_deadline(
        &self,
        goal: &PursuitGoal,
        arrival_epsilon: f64,
        started: Instant,
    ) -> PursuitOutcome {
        let position = self.mover.position();
        let Some(target) = self.mover.goal_target(goal) else {
            return PursuitOutcome::Timeout {
                elapsed_ms: elapsed_ms(started),
                distance: f64::INFINITY,
            };
        };
        let distance = position.distance_to(&target);
        if goal.is_reached(&position, &target) {
            PursuitOutcome::Arrived { distance }
        } else if distance <= arrival_epsilon {
            PursuitOutcome::NearEnough { distance }
        } else {
            PursuitOutcome::Timeout {
                elapsed_ms: elapsed_ms(started),
                distance,
            }
        }
    }

    /// Distance to where the goal points now. Infinite if a followed
    /// entity is gone.
    fn remaining(&self, goal: &PursuitGoal) -> f64 {
        self.mover
            .goal_target(goal)
            .map(|target| self.mover.distance_to(&target))
            .unwrap_or(f64::INFINITY)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
