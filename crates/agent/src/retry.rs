//! Retry orchestrator — bounded pursuit over ranked candidates.
//!
//! Used by compound tasks that must succeed against one of several
//! candidates (mine a block of a type, mount an entity of a type). Each
//! attempt approaches one candidate, re-checks it, then interacts with it.
//! Any failure along the way abandons the attempt and moves to the next
//! candidate, up to the attempt cap.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wayfarer_core::{
    Candidate, DomainEvent, Error, InteractionError, PursuitGoal, PursuitOutcome, TaskError,
};

use crate::pursuit::GoalPursuitController;
use crate::selector::CandidateSelector;
use crate::session::SessionContext;

/// The post-arrival half of an attempt.
#[async_trait]
pub trait AttemptHandler: Send + Sync {
    type Output: Send;

    /// Interaction name for diagnostics (e.g. "dig").
    fn action(&self) -> &str;

    /// Whether the candidate still exists and still matches after arrival.
    async fn still_valid(&self, candidate: &Candidate) -> bool;

    async fn interact(&self, candidate: &Candidate) -> Result<Self::Output, InteractionError>;
}

/// A successful attempt.
#[derive(Debug, Clone)]
pub struct AttemptSuccess<T> {
    pub candidate: Candidate,
    pub outcome: PursuitOutcome,
    pub output: T,
    /// 1-based number of the attempt that succeeded
    pub attempts: usize,
}

pub struct RetryOrchestrator {
    ctx: SessionContext,
    pursuit: GoalPursuitController,
    selector: CandidateSelector,
    interaction_range: f64,
    interaction_timeout: Duration,
    approach_radius: f64,
    approach_deadline: Duration,
}

impl RetryOrchestrator {
    pub fn new(ctx: &SessionContext) -> Self {
        let retry = &ctx.config.retry;
        let navigation = &ctx.config.navigation;
        Self {
            ctx: ctx.clone(),
            pursuit: GoalPursuitController::new(ctx),
            selector: CandidateSelector::from_config(retry),
            interaction_range: retry.interaction_range,
            interaction_timeout: retry.interaction_timeout(),
            approach_radius: navigation.approach_radius,
            approach_deadline: navigation.approach_deadline(),
        }
    }

    /// Try ranked candidates until one attempt succeeds or `max_attempts`
    /// attempts have failed.
    ///
    /// Mover failures and cancellation end the loop at once. Otherwise the
    /// error is `TaskError::Exhausted` carrying the last attempt's error.
    pub async fn pursue_any<H: AttemptHandler>(
        &self,
        candidates: Vec<Candidate>,
        max_attempts: usize,
        handler: &H,
        cancel: &CancellationToken,
    ) -> Result<AttemptSuccess<H::Output>, Error> {
        if candidates.is_empty() {
            return Err(TaskError::NotFound("no candidates to try".into()).into());
        }

        let agent = self.ctx.mover.position();
        let ranked = self.selector.rank(candidates, agent);
        let total = ranked.len().min(max_attempts);
        let mut last_error = None;
        let mut attempts = 0;

        for candidate in ranked.into_iter().take(max_attempts) {
            if cancel.is_cancelled() {
                return Err(TaskError::Cancelled.into());
            }
            attempts += 1;
            info!(
                attempt = attempts,
                total,
                candidate = %candidate,
                score = candidate.score,
                "Trying candidate"
            );

            match self.attempt(&candidate, handler, cancel).await? {
                Ok((outcome, output)) => {
                    return Ok(AttemptSuccess {
                        candidate,
                        outcome,
                        output,
                        attempts,
                    });
                }
                Err(TaskError::Cancelled) => return Err(TaskError::Cancelled.into()),
                Err(e) => {
                    warn!(attempt = attempts, candidate = %candidate, error = %e, "Attempt abandoned");
                    self.ctx.publish(DomainEvent::AttemptAbandoned {
                        session_id: self.ctx.session_id.clone(),
                        attempt: attempts,
                        candidate: candidate.to_string(),
                        reason: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| TaskError::NotFound("no candidates to try".into()));
        Err(TaskError::Exhausted {
            attempts,
            last: Box::new(last),
        }
        .into())
    }

    /// One attempt. The outer error is a hard mover failure; the inner one
    /// is a routine reason to move on.
    async fn attempt<H: AttemptHandler>(
        &self,
        candidate: &Candidate,
        handler: &H,
        cancel: &CancellationToken,
    ) -> Result<Result<(PursuitOutcome, H::Output), TaskError>, Error> {
        let distance = self.ctx.mover.distance_to(&candidate.position);
        let outcome = if distance <= self.interaction_range {
            PursuitOutcome::Arrived { distance }
        } else {
            let goal = PursuitGoal::proximity(candidate.position, self.approach_radius);
            self.pursuit
                .pursue(goal, self.approach_deadline, self.interaction_range, cancel)
                .await?
        };

        if let Some(err) = outcome.clone().into_error(candidate.to_string()) {
            return Ok(Err(err));
        }

        if !handler.still_valid(candidate).await {
            return Ok(Err(TaskError::TargetVanished(format!(
                "{candidate} no longer exists at that position"
            ))));
        }

        let interaction = tokio::select! {
            _ = cancel.cancelled() => return Ok(Err(TaskError::Cancelled)),
            result = tokio::time::timeout(self.interaction_timeout, handler.interact(candidate)) => result,
        };

        Ok(match interaction {
            Ok(Ok(output)) => Ok((outcome, output)),
            Ok(Err(e)) => Err(TaskError::InteractionFailed(e)),
            Err(_) => Err(TaskError::InteractionFailed(InteractionError::Timeout {
                action: handler.action().to_string(),
                timeout_ms: self.interaction_timeout.as_millis() as u64,
            })),
        })
    }
}
