//! The goal-pursuit engine — the heart of Wayfarer.
//!
//! Every intent follows the same shape:
//!
//! 1. **Take the agent** through its [`AgentSession`] (queue or reject)
//! 2. **Pursue** one goal with a [`GoalPursuitController`], racing mover
//!    notifications against stall detection and a deadline
//! 3. **Retry** against ranked candidates with the [`RetryOrchestrator`]
//!    when any one of several targets will do
//! 4. **Sequence** multi-stage work with the [`TaskSequencer`], closing any
//!    opened container on the way out
//!
//! Each pursuit produces exactly one [`PursuitOutcome`](wayfarer_core::PursuitOutcome)
//! and leaves the mover without a goal.

pub mod intents;
pub mod monitor;
pub mod pursuit;
pub mod retry;
pub mod selector;
pub mod sequencer;
pub mod session;

pub use monitor::{ProgressMonitor, StallState};
pub use pursuit::{GoalPursuitController, ProbeOutcome};
pub use retry::{AttemptHandler, AttemptSuccess, RetryOrchestrator};
pub use selector::CandidateSelector;
pub use sequencer::{SequenceFailure, SequenceReport, StepResult, TaskSequencer, TaskStep};
pub use session::{AgentSession, ContainerSlot, SessionContext};
