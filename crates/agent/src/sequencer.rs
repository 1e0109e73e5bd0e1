//! Task sequencer — ordered multi-stage tasks with guaranteed cleanup.
//!
//! Steps run strictly one after another and the first failure aborts the
//! rest. Whatever happens, a container opened during the run is closed
//! before the sequence returns.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wayfarer_core::{
    BlockPos, ContainerHandle, ContainerKind, Coordinate3, DomainEvent, Error, ItemStack,
    PursuitGoal, PursuitOutcome, Recipe, TaskError,
};

use crate::pursuit::GoalPursuitController;
use crate::session::SessionContext;

/// One stage of a sequence.
#[derive(Debug, Clone)]
pub enum TaskStep {
    /// Get within reach of a fixed world object.
    Approach { target: Coordinate3, label: String },
    OpenContainer { pos: BlockPos, kind: ContainerKind },
    Deposit { item: String, count: u32 },
    Withdraw { item: String, count: u32 },
    PutFuel { item: String, count: u32 },
    PutInput { item: String, count: u32 },
    TakeOutput,
    Craft {
        recipe: Recipe,
        crafts: u32,
        table: Option<BlockPos>,
    },
    /// Passive wait, ended early only by cancellation.
    Wait(Duration),
    CloseContainer,
}

impl TaskStep {
    pub fn approach(pos: BlockPos, label: impl Into<String>) -> Self {
        Self::Approach {
            target: pos.as_coordinate(),
            label: label.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Approach { .. } => "approach",
            Self::OpenContainer { .. } => "open_container",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::PutFuel { .. } => "put_fuel",
            Self::PutInput { .. } => "put_input",
            Self::TakeOutput => "take_output",
            Self::Craft { .. } => "craft",
            Self::Wait(_) => "wait",
            Self::CloseContainer => "close_container",
        }
    }
}

impl fmt::Display for TaskStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approach { label, .. } => write!(f, "approach {label}"),
            Self::OpenContainer { pos, kind } => write!(f, "open {} at {pos}", kind.block_name()),
            Self::Deposit { item, count } => write!(f, "deposit {item} x{count}"),
            Self::Withdraw { item, count } => write!(f, "withdraw {item} x{count}"),
            Self::PutFuel { item, count } => write!(f, "load fuel {item} x{count}"),
            Self::PutInput { item, count } => write!(f, "load input {item} x{count}"),
            Self::TakeOutput => write!(f, "take output"),
            Self::Craft { recipe, crafts, .. } => write!(f, "craft {} x{crafts}", recipe.item),
            Self::Wait(duration) => write!(f, "wait {}ms", duration.as_millis()),
            Self::CloseContainer => write!(f, "close container"),
        }
    }
}

/// What a successful step produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepResult {
    Approached { outcome: PursuitOutcome },
    Opened { handle: ContainerHandle },
    Moved { item: String, count: u32 },
    Loaded { item: String, count: u32 },
    Collected { output: Option<ItemStack> },
    Crafted { item: String, count: u32 },
    Waited { ms: u64 },
    Closed,
}

/// Every step succeeded.
#[derive(Debug, Clone, Default)]
pub struct SequenceReport {
    pub results: Vec<StepResult>,
}

/// The first failing step and what completed before it.
#[derive(Debug)]
pub struct SequenceFailure {
    pub index: usize,
    pub step: String,
    pub error: Error,
    pub completed: Vec<StepResult>,
}

impl fmt::Display for SequenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({}) failed: {}", self.index + 1, self.step, self.error)
    }
}

pub struct TaskSequencer {
    ctx: SessionContext,
    pursuit: GoalPursuitController,
}

impl TaskSequencer {
    pub fn new(ctx: &SessionContext) -> Self {
        Self {
            ctx: ctx.clone(),
            pursuit: GoalPursuitController::new(ctx),
        }
    }

    pub async fn run(
        &self,
        steps: Vec<TaskStep>,
        cancel: &CancellationToken,
    ) -> Result<SequenceReport, SequenceFailure> {
        let total = steps.len();
        let mut results = Vec::with_capacity(total);
        let mut failure = None;

        for (index, step) in steps.into_iter().enumerate() {
            debug!(index, total, step = %step, "Running step");
            let outcome = if cancel.is_cancelled() {
                Err(Error::from(TaskError::Cancelled))
            } else {
                self.run_step(&step, cancel).await
            };

            self.ctx.publish(DomainEvent::StepCompleted {
                session_id: self.ctx.session_id.clone(),
                index,
                step: step.name().to_string(),
                success: outcome.is_ok(),
                timestamp: Utc::now(),
            });

            match outcome {
                Ok(result) => results.push(result),
                Err(error) => {
                    warn!(index, step = %step, error = %error, "Sequence aborted");
                    failure = Some((index, step.to_string(), error));
                    break;
                }
            }
        }

        // Runs on success and failure alike.
        self.close_open_container().await;

        match failure {
            None => {
                info!(steps = total, "Sequence completed");
                Ok(SequenceReport { results })
            }
            Some((index, step, error)) => Err(SequenceFailure {
                index,
                step,
                error,
                completed: results,
            }),
        }
    }

    async fn run_step(&self, step: &TaskStep, cancel: &CancellationToken) -> Result<StepResult, Error> {
        let world = self.ctx.world.as_ref();
        match step {
            TaskStep::Approach { target, label } => {
                let navigation = &self.ctx.config.navigation;
                let reach = self.ctx.config.retry.interaction_range;
                let outcome = if self.ctx.mover.distance_to(target) <= reach {
                    PursuitOutcome::Arrived {
                        distance: self.ctx.mover.distance_to(target),
                    }
                } else {
                    let goal = PursuitGoal::proximity(*target, navigation.approach_radius);
                    self.pursuit
                        .pursue(goal, navigation.approach_deadline(), reach, cancel)
                        .await?
                };
                match outcome.clone().into_error(label.clone()) {
                    Some(err) => Err(err.into()),
                    None => Ok(StepResult::Approached { outcome }),
                }
            }

            TaskStep::OpenContainer { pos, kind } => {
                if let Some(open) = self.ctx.container.current() {
                    return Err(TaskError::PreconditionUnmet(format!("{open} is still open")).into());
                }
                let handle = world
                    .open_container(*pos, *kind)
                    .await
                    .map_err(TaskError::from)?;
                self.ctx.container.occupy(handle.clone())?;
                Ok(StepResult::Opened { handle })
            }

            TaskStep::Deposit { item, count } => {
                let handle = self.open_handle()?;
                let moved = world
                    .deposit(&handle, item, *count)
                    .await
                    .map_err(TaskError::from)?;
                if moved == 0 {
                    return Err(TaskError::PreconditionUnmet(format!("no {item} to deposit")).into());
                }
                Ok(StepResult::Moved {
                    item: item.clone(),
                    count: moved,
                })
            }

            TaskStep::Withdraw { item, count } => {
                let handle = self.open_handle()?;
                let moved = world
                    .withdraw(&handle, item, *count)
                    .await
                    .map_err(TaskError::from)?;
                if moved == 0 {
                    return Err(TaskError::NotFound(format!("no {item} in {handle}")).into());
                }
                Ok(StepResult::Moved {
                    item: item.clone(),
                    count: moved,
                })
            }

            TaskStep::PutFuel { item, count } => {
                let handle = self.open_handle()?;
                world
                    .put_fuel(&handle, item, *count)
                    .await
                    .map_err(TaskError::from)?;
                Ok(StepResult::Loaded {
                    item: item.clone(),
                    count: *count,
                })
            }

            TaskStep::PutInput { item, count } => {
                let handle = self.open_handle()?;
                world
                    .put_input(&handle, item, *count)
                    .await
                    .map_err(TaskError::from)?;
                Ok(StepResult::Loaded {
                    item: item.clone(),
                    count: *count,
                })
            }

            TaskStep::TakeOutput => {
                let handle = self.open_handle()?;
                let output = world.take_output(&handle).await.map_err(TaskError::from)?;
                Ok(StepResult::Collected { output })
            }

            TaskStep::Craft {
                recipe,
                crafts,
                table,
            } => {
                world
                    .craft(recipe, *crafts, *table)
                    .await
                    .map_err(TaskError::from)?;
                Ok(StepResult::Crafted {
                    item: recipe.item.clone(),
                    count: recipe.yields.saturating_mul(*crafts),
                })
            }

            TaskStep::Wait(duration) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(Error::from(TaskError::Cancelled)),
                    _ = tokio::time::sleep(*duration) => Ok(StepResult::Waited {
                        ms: duration.as_millis() as u64,
                    }),
                }
            }

            TaskStep::CloseContainer => {
                let Some(handle) = self.ctx.container.take() else {
                    return Err(TaskError::PreconditionUnmet("no container is open".into()).into());
                };
                let closed = world.close_container(&handle).await;
                self.container_closed(&handle);
                closed.map_err(TaskError::from)?;
                Ok(StepResult::Closed)
            }
        }
    }

    fn open_handle(&self) -> Result<ContainerHandle, TaskError> {
        self.ctx
            .container
            .current()
            .ok_or_else(|| TaskError::PreconditionUnmet("no container is open".into()))
    }

    async fn close_open_container(&self) {
        let Some(handle) = self.ctx.container.take() else {
            return;
        };
        match self.ctx.world.close_container(&handle).await {
            Ok(()) => debug!(container = %handle, "Closed container left open by sequence"),
            Err(e) => warn!(container = %handle, error = %e, "Failed to close container"),
        }
        self.container_closed(&handle);
    }

    fn container_closed(&self, handle: &ContainerHandle) {
        self.ctx.publish(DomainEvent::ContainerClosed {
            session_id: self.ctx.session_id.clone(),
            container: handle.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wayfarer_config::AppConfig;
    use wayfarer_sim::{Action, Behavior, Simulation};

    fn setup(sim: &Simulation) -> (SessionContext, TaskSequencer) {
        let sim = Arc::new(sim.clone());
        let ctx = SessionContext::new(sim.clone(), sim, AppConfig::default());
        let sequencer = TaskSequencer::new(&ctx);
        (ctx, sequencer)
    }

    #[tokio::test(start_paused = true)]
    async fn container_closed_when_last_step_fails() {
        let sim = Simulation::new();
        let chest = BlockPos::new(2, 0, 0);
        sim.add_container(chest, ContainerKind::Chest);
        sim.stock_container(chest, "cobblestone", 10);
        sim.fail_next(Action::Withdraw, "slot locked");
        let (ctx, sequencer) = setup(&sim);

        let steps = vec![
            TaskStep::approach(chest, "chest"),
            TaskStep::Wait(Duration::from_millis(100)),
            TaskStep::OpenContainer {
                pos: chest,
                kind: ContainerKind::Chest,
            },
            TaskStep::Withdraw {
                item: "cobblestone".into(),
                count: 1,
            },
        ];

        let failure = sequencer
            .run(steps, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.index, 3);
        assert_eq!(failure.completed.len(), 3);
        assert!(sim.open_handle().is_none());
        assert!(ctx.container.current().is_none());
        assert!(sim.interactions().iter().any(|i| i.starts_with("close chest")));
    }

    #[tokio::test(start_paused = true)]
    async fn first_failure_stops_the_sequence() {
        let sim = Simulation::new();
        sim.push_behavior(Behavior::NoPathAfter(Duration::from_millis(10)));
        let furnace = BlockPos::new(20, 0, 0);
        sim.add_container(furnace, ContainerKind::Furnace);
        let (_ctx, sequencer) = setup(&sim);

        let failure = sequencer
            .run(
                vec![
                    TaskStep::approach(furnace, "furnace"),
                    TaskStep::OpenContainer {
                        pos: furnace,
                        kind: ContainerKind::Furnace,
                    },
                ],
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(failure.index, 0);
        assert!(failure.to_string().contains("no path"));
        assert!(sim.interactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn operations_without_open_container_are_rejected() {
        let sim = Simulation::new();
        let (_ctx, sequencer) = setup(&sim);

        let failure = sequencer
            .run(vec![TaskStep::TakeOutput], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            Error::Task(TaskError::PreconditionUnmet(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_is_cancellable() {
        let sim = Simulation::new();
        let (_ctx, sequencer) = setup(&sim);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let failure = sequencer
            .run(vec![TaskStep::Wait(Duration::from_secs(60))], &cancel)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, Error::Task(TaskError::Cancelled)));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn full_smelt_sequence_succeeds() {
        let sim = Simulation::new();
        let furnace = BlockPos::new(1, 0, 0);
        sim.add_container(furnace, ContainerKind::Furnace);
        sim.give("raw_iron", 2);
        sim.give("coal", 1);
        let (_ctx, sequencer) = setup(&sim);

        let report = sequencer
            .run(
                vec![
                    TaskStep::approach(furnace, "furnace"),
                    TaskStep::OpenContainer {
                        pos: furnace,
                        kind: ContainerKind::Furnace,
                    },
                    TaskStep::PutFuel {
                        item: "coal".into(),
                        count: 1,
                    },
                    TaskStep::PutInput {
                        item: "raw_iron".into(),
                        count: 2,
                    },
                    TaskStep::Wait(Duration::from_secs(22)),
                    TaskStep::TakeOutput,
                    TaskStep::CloseContainer,
                ],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.results.len(), 7);
        assert!(report.results.contains(&StepResult::Collected {
            output: Some(ItemStack::new("iron_ingot", 2)),
        }));
        assert_eq!(sim.inventory_count("iron_ingot"), 2);
        assert!(sim.open_handle().is_none());
    }
}
