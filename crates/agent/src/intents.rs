//! Intent operations — the public surface of an [`AgentSession`].
//!
//! Each operation takes the agent for its duration (per the busy policy),
//! drives the engine components and folds the result into an
//! [`IntentResult`] whose message names the failure kind.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use wayfarer_core::{
    BlockPos, Candidate, CandidateTarget, ContainerKind, Coordinate3, Error, InteractionError,
    IntentResult, ItemStack, PathStatus, PursuitGoal, PursuitOutcome, TaskError, World,
};

use crate::pursuit::{GoalPursuitController, ProbeOutcome};
use crate::retry::{AttemptHandler, RetryOrchestrator};
use crate::sequencer::{SequenceFailure, StepResult, TaskSequencer, TaskStep};
use crate::session::AgentSession;

/// Distance under which a probe that learned nothing counts as "already there".
const ALREADY_AT: f64 = 2.0;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn error_result(context: &str, err: &Error) -> IntentResult {
    match err {
        Error::Task(task) => IntentResult::from_error(context, task),
        Error::Mover(e) => IntentResult::fail(format!("{context}: {e}"), "mover_error"),
    }
}

fn sequence_result(context: &str, failure: &SequenceFailure) -> IntentResult {
    error_result(context, &failure.error)
        .with("failed_step", failure.index)
        .with("step", &failure.step)
}

/// Fold a pursuit outcome into a result.
fn pursuit_result(target: &str, success: String, outcome: PursuitOutcome) -> IntentResult {
    let distance = outcome.distance().filter(|d| d.is_finite()).map(round1);
    let label = outcome.label();
    let result = match outcome.into_error(target) {
        None => IntentResult::ok(success),
        Some(err) => IntentResult::from_error("Navigation failed", &err),
    };
    result.with("outcome", label).with("distance", distance)
}

struct BlockDigger {
    world: Arc<dyn World>,
    block_type: String,
}

#[async_trait]
impl AttemptHandler for BlockDigger {
    type Output = BlockPos;

    fn action(&self) -> &str {
        "dig"
    }

    async fn still_valid(&self, candidate: &Candidate) -> bool {
        let CandidateTarget::Block { pos, .. } = &candidate.target else {
            return false;
        };
        self.world
            .block_at(*pos)
            .await
            .is_some_and(|block| block.name == self.block_type)
    }

    async fn interact(&self, candidate: &Candidate) -> Result<BlockPos, InteractionError> {
        let CandidateTarget::Block { pos, .. } = &candidate.target else {
            return Err(InteractionError::failed("dig", "candidate is not a block"));
        };
        self.world.dig(*pos).await?;
        Ok(*pos)
    }
}

struct EntityMounter {
    world: Arc<dyn World>,
}

#[async_trait]
impl AttemptHandler for EntityMounter {
    type Output = u64;

    fn action(&self) -> &str {
        "mount"
    }

    async fn still_valid(&self, candidate: &Candidate) -> bool {
        let CandidateTarget::Entity { entity } = &candidate.target else {
            return false;
        };
        self.world.entity(entity.id).await.is_some()
    }

    async fn interact(&self, candidate: &Candidate) -> Result<u64, InteractionError> {
        let CandidateTarget::Entity { entity } = &candidate.target else {
            return Err(InteractionError::failed("mount", "candidate is not an entity"));
        };
        self.world.mount(entity).await?;
        Ok(entity.id)
    }
}

impl AgentSession {
    /// Walk to the block containing `target`.
    pub async fn go_to(&self, target: Coordinate3) -> IntentResult {
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error("Navigation rejected", &e),
        };
        let navigation = &self.ctx.config.navigation;

        let outcome = GoalPursuitController::new(&self.ctx)
            .pursue(
                PursuitGoal::point(target),
                navigation.deadline(),
                navigation.arrival_epsilon,
                &activity.cancel,
            )
            .await;

        match outcome {
            Ok(outcome) => {
                let message = match &outcome {
                    PursuitOutcome::NearEnough { distance } => {
                        format!("Arrived near {target}, distance: {distance:.1}")
                    }
                    _ => format!("Arrived at {target}"),
                };
                pursuit_result(&target.to_string(), message, outcome)
            }
            Err(e) => error_result("Navigation failed", &e.into()),
        }
    }

    /// Catch up with the nearest entity called `name`.
    pub async fn follow_entity(&self, name: &str, radius: f64) -> IntentResult {
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error("follow rejected", &e),
        };
        let origin = self.ctx.mover.position();
        let found = self
            .ctx
            .world
            .find_entities(name, origin, self.ctx.config.retry.search_radius)
            .await;
        let Some(target) = found.into_iter().next() else {
            return IntentResult::from_error(
                "Follow failed",
                &TaskError::NotFound(format!("{name} not found or not in range")),
            );
        };

        let entity = target.entity;
        let outcome = GoalPursuitController::new(&self.ctx)
            .pursue(
                PursuitGoal::follow(entity.clone(), radius),
                self.ctx.config.navigation.deadline(),
                radius,
                &activity.cancel,
            )
            .await;

        match outcome {
            Ok(outcome) => pursuit_result(
                &format!("{} #{}", entity.name, entity.id),
                format!("Caught up with {name}"),
                outcome,
            )
            .with("entity_id", entity.id),
            Err(e) => error_result("Follow failed", &e.into()),
        }
    }

    /// Mine one block of `block_type`, trying nearby candidates in turn.
    pub async fn collect_block(&self, block_type: &str) -> IntentResult {
        let context = format!("Failed to collect {block_type}");
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error(&context, &e),
        };
        let retry = &self.ctx.config.retry;
        let origin = self.ctx.mover.position();

        let blocks = match self
            .ctx
            .world
            .find_blocks(block_type, origin, retry.search_radius, retry.max_candidates)
            .await
        {
            Ok(blocks) => blocks,
            Err(InteractionError::Unknown { .. }) => {
                return IntentResult::from_error(
                    &context,
                    &TaskError::NotFound(format!("Unknown block type: {block_type}")),
                );
            }
            Err(e) => return IntentResult::from_error(&context, &TaskError::InteractionFailed(e)),
        };
        if blocks.is_empty() {
            return IntentResult::from_error(
                &context,
                &TaskError::NotFound(format!("No {block_type} found nearby")),
            );
        }

        let candidates = blocks
            .into_iter()
            .enumerate()
            .map(|(index, block)| Candidate::block(block.pos, block.name, index))
            .collect();
        let handler = BlockDigger {
            world: self.ctx.world.clone(),
            block_type: block_type.to_string(),
        };

        match RetryOrchestrator::new(&self.ctx)
            .pursue_any(candidates, retry.max_attempts, &handler, &activity.cancel)
            .await
        {
            Ok(success) => {
                info!(block_type, pos = %success.output, attempts = success.attempts, "Block collected");
                IntentResult::ok(format!("Mined {block_type} at {}", success.output))
                    .with("position", success.output)
                    .with("attempts", success.attempts)
            }
            Err(e) => error_result(&context, &e),
        }
    }

    /// Mount the nearest reachable entity called `name`.
    pub async fn mount_entity(&self, name: &str) -> IntentResult {
        let context = format!("Failed to mount {name}");
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error(&context, &e),
        };
        let retry = &self.ctx.config.retry;
        let origin = self.ctx.mover.position();

        let candidates: Vec<Candidate> = self
            .ctx
            .world
            .find_entities(name, origin, retry.search_radius)
            .await
            .into_iter()
            .take(retry.max_candidates)
            .enumerate()
            .map(|(index, info)| Candidate::entity(info.entity, info.position, index))
            .collect();
        if candidates.is_empty() {
            return IntentResult::from_error(
                &context,
                &TaskError::NotFound(format!("No {name} found nearby")),
            );
        }

        let handler = EntityMounter {
            world: self.ctx.world.clone(),
        };
        match RetryOrchestrator::new(&self.ctx)
            .pursue_any(candidates, retry.max_attempts, &handler, &activity.cancel)
            .await
        {
            Ok(success) => IntentResult::ok(format!("Mounted {name}"))
                .with("entity_id", success.output)
                .with("attempts", success.attempts),
            Err(e) => error_result(&context, &e),
        }
    }

    /// Craft at least `count` of `item`, walking to a crafting table when
    /// the recipe needs one.
    pub async fn craft_item(&self, item: &str, count: u32) -> IntentResult {
        let context = format!("Failed to craft {item}");
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error(&context, &e),
        };
        let world = self.ctx.world.as_ref();

        if count == 0 {
            return IntentResult::from_error(
                &context,
                &TaskError::PreconditionUnmet("count must be at least 1".into()),
            );
        }
        let Some(recipe) = world.recipe(item).await else {
            return IntentResult::from_error(
                &context,
                &TaskError::NotFound(format!("No recipe for {item}")),
            );
        };
        let crafts = recipe.crafts_for(count);
        let Some(produced) = recipe.output_for(crafts) else {
            return IntentResult::from_error(
                &context,
                &TaskError::PreconditionUnmet(format!("count too large: {count}")),
            );
        };
        let missing = recipe.missing_ingredients(&world.inventory().await, crafts);
        if !missing.is_empty() {
            let list: Vec<String> = missing.iter().map(ToString::to_string).collect();
            return IntentResult::from_error(
                &context,
                &TaskError::PreconditionUnmet(format!("missing ingredients: {}", list.join(", "))),
            )
            .with("missing", missing);
        }

        let mut steps = Vec::new();
        let table = if recipe.requires_table {
            let Some(pos) = self.nearest_block("crafting_table").await else {
                return IntentResult::from_error(
                    &context,
                    &TaskError::NotFound("No crafting table nearby".into()),
                );
            };
            steps.push(TaskStep::approach(pos, "crafting table"));
            Some(pos)
        } else {
            None
        };
        steps.push(TaskStep::Craft {
            recipe,
            crafts,
            table,
        });

        match TaskSequencer::new(&self.ctx).run(steps, &activity.cancel).await {
            Ok(_) => IntentResult::ok(format!("Crafted {produced} {item}")).with("crafted", produced),
            Err(failure) => sequence_result(&context, &failure),
        }
    }

    /// Smelt `count` of `item` in the nearest furnace.
    ///
    /// The furnace exposes no completion signal, so the sequence waits a
    /// fixed, capped estimate before collecting the output.
    pub async fn smelt_item(&self, item: &str, count: u32) -> IntentResult {
        let context = format!("Failed to smelt {item}");
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error(&context, &e),
        };
        let smelting = &self.ctx.config.smelting;
        let inventory = self.ctx.world.inventory().await;

        let have = ItemStack::count_in(&inventory, item);
        if count == 0 || have < count {
            return IntentResult::from_error(
                &context,
                &TaskError::PreconditionUnmet(format!("need {count} {item}, have {have}")),
            );
        }
        let Some(fuel) = smelting
            .fuels
            .iter()
            .find(|fuel| fuel.name != item && ItemStack::count_in(&inventory, &fuel.name) > 0)
        else {
            return IntentResult::from_error(
                &context,
                &TaskError::PreconditionUnmet("no fuel in inventory".into()),
            );
        };
        let fuel_count = fuel
            .units_for(count)
            .min(ItemStack::count_in(&inventory, &fuel.name));

        let Some(furnace) = self.nearest_block("furnace").await else {
            return IntentResult::from_error(
                &context,
                &TaskError::NotFound("No furnace nearby".into()),
            );
        };

        let wait = smelting.wait_for(count);
        info!(item, count, fuel = %fuel.name, fuel_count, wait_ms = wait.as_millis() as u64, "Smelting");
        let steps = vec![
            TaskStep::approach(furnace, "furnace"),
            TaskStep::OpenContainer {
                pos: furnace,
                kind: ContainerKind::Furnace,
            },
            TaskStep::PutFuel {
                item: fuel.name.clone(),
                count: fuel_count,
            },
            TaskStep::PutInput {
                item: item.to_string(),
                count,
            },
            TaskStep::Wait(wait),
            TaskStep::TakeOutput,
            TaskStep::CloseContainer,
        ];

        let report = match TaskSequencer::new(&self.ctx).run(steps, &activity.cancel).await {
            Ok(report) => report,
            Err(failure) => return sequence_result(&context, &failure),
        };
        let output = report.results.into_iter().find_map(|result| match result {
            StepResult::Collected { output } => output,
            _ => None,
        });
        match output {
            Some(stack) => IntentResult::ok(format!("Smelted {count} {item} into {stack}"))
                .with("output", stack)
                .with("waited_ms", wait.as_millis() as u64),
            None => IntentResult::from_error(
                &context,
                &TaskError::InteractionFailed(InteractionError::failed(
                    "take_output",
                    "furnace output slot is empty",
                )),
            ),
        }
    }

    /// Put up to `count` of `item` (all of it when `None`) into a container.
    pub async fn deposit_items(
        &self,
        item: &str,
        count: Option<u32>,
        at: Option<BlockPos>,
    ) -> IntentResult {
        let context = format!("Failed to deposit {item}");
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error(&context, &e),
        };

        let have = ItemStack::count_in(&self.ctx.world.inventory().await, item);
        if have == 0 {
            return IntentResult::from_error(
                &context,
                &TaskError::PreconditionUnmet(format!("no {item} in inventory")),
            );
        }
        let count = count.unwrap_or(have).min(have);
        let (pos, kind) = match self.locate_container(at).await {
            Ok(found) => found,
            Err(e) => return IntentResult::from_error(&context, &e),
        };

        let steps = vec![
            TaskStep::approach(pos, kind.block_name()),
            TaskStep::OpenContainer { pos, kind },
            TaskStep::Deposit {
                item: item.to_string(),
                count,
            },
            TaskStep::CloseContainer,
        ];
        match TaskSequencer::new(&self.ctx).run(steps, &activity.cancel).await {
            Ok(report) => {
                let moved = moved_count(&report.results);
                IntentResult::ok(format!(
                    "Deposited {moved} {item} into {} at {pos}",
                    kind.block_name()
                ))
                .with("moved", moved)
            }
            Err(failure) => sequence_result(&context, &failure),
        }
    }

    /// Take up to `count` of `item` out of a container.
    pub async fn withdraw_items(&self, item: &str, count: u32, at: Option<BlockPos>) -> IntentResult {
        let context = format!("Failed to withdraw {item}");
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error(&context, &e),
        };
        let (pos, kind) = match self.locate_container(at).await {
            Ok(found) => found,
            Err(e) => return IntentResult::from_error(&context, &e),
        };

        let steps = vec![
            TaskStep::approach(pos, kind.block_name()),
            TaskStep::OpenContainer { pos, kind },
            TaskStep::Withdraw {
                item: item.to_string(),
                count,
            },
            TaskStep::CloseContainer,
        ];
        match TaskSequencer::new(&self.ctx).run(steps, &activity.cancel).await {
            Ok(report) => {
                let moved = moved_count(&report.results);
                IntentResult::ok(format!(
                    "Withdrew {moved} {item} from {} at {pos}",
                    kind.block_name()
                ))
                .with("moved", moved)
            }
            Err(failure) => sequence_result(&context, &failure),
        }
    }

    /// Ask the mover whether a path to `target` exists, without walking it.
    pub async fn can_reach(&self, target: Coordinate3) -> IntentResult {
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error("Reachability check rejected", &e),
        };
        let probe = GoalPursuitController::new(&self.ctx)
            .probe(
                PursuitGoal::point(target),
                self.ctx.config.navigation.reach_probe(),
                &activity.cancel,
            )
            .await;
        let distance = self.ctx.mover.distance_to(&target);
        let direct = round1(distance);

        match probe {
            Ok(ProbeOutcome::Path {
                status: PathStatus::NoPath,
                ..
            }) => IntentResult::ok(format!("Position {target} is NOT reachable - no path exists"))
                .with_reason("no_path")
                .with("reachable", false),
            Ok(ProbeOutcome::Path {
                status: PathStatus::Timeout,
                ..
            }) => IntentResult::ok(format!(
                "Cannot determine if {target} is reachable - path calculation timeout"
            ))
            .with_reason("timeout")
            .with("reachable", false),
            Ok(ProbeOutcome::Path { path, .. }) => {
                IntentResult::ok(format!("Position {target} is reachable"))
                    .with("reachable", true)
                    .with("path_length", path.len())
                    .with("direct_distance", direct)
            }
            Ok(ProbeOutcome::Arrived) => already_at(target, direct),
            Ok(ProbeOutcome::Expired) if distance < ALREADY_AT => already_at(target, direct),
            Ok(ProbeOutcome::Expired) => {
                IntentResult::ok(format!("Path calculation still in progress for {target}"))
                    .with_reason("timeout")
                    .with("reachable", serde_json::Value::Null)
                    .with("direct_distance", direct)
            }
            Ok(ProbeOutcome::Cancelled) => {
                IntentResult::from_error("Reachability check interrupted", &TaskError::Cancelled)
            }
            Err(e) => error_result("Reachability check failed", &e.into()),
        }
    }

    /// Compute the path the mover would take to `target`, without walking it.
    pub async fn compute_path_to(&self, target: Coordinate3) -> IntentResult {
        let activity = match self.begin().await {
            Ok(activity) => activity,
            Err(e) => return IntentResult::from_error("Path computation rejected", &e),
        };
        let probe = GoalPursuitController::new(&self.ctx)
            .probe(
                PursuitGoal::point(target),
                self.ctx.config.navigation.path_probe(),
                &activity.cancel,
            )
            .await;
        let direct = round1(self.ctx.mover.distance_to(&target));

        let path = match probe {
            Ok(ProbeOutcome::Path {
                status: PathStatus::NoPath,
                ..
            }) => {
                return IntentResult::ok(format!("No path found to {target}"))
                    .with_reason("no_path")
                    .with("found", false);
            }
            Ok(ProbeOutcome::Path {
                status: PathStatus::Timeout,
                ..
            })
            | Ok(ProbeOutcome::Expired) => {
                return IntentResult::ok(format!("Path calculation timeout for {target}"))
                    .with_reason("timeout")
                    .with("found", false);
            }
            Ok(ProbeOutcome::Path { path, .. }) => path,
            Ok(ProbeOutcome::Arrived) => Vec::new(),
            Ok(ProbeOutcome::Cancelled) => {
                return IntentResult::from_error("Path computation interrupted", &TaskError::Cancelled);
            }
            Err(e) => return error_result("Path computation failed", &e.into()),
        };

        let waypoints: Vec<BlockPos> = path.iter().map(Coordinate3::block).collect();
        let key_points = key_points(&waypoints);
        IntentResult::ok(format!(
            "Found path to {target} with {} waypoints",
            waypoints.len()
        ))
        .with("found", true)
        .with("path_length", waypoints.len())
        .with("direct_distance", direct)
        .with("path", &waypoints)
        .with("key_points", key_points)
    }

    async fn nearest_block(&self, name: &str) -> Option<BlockPos> {
        let origin = self.ctx.mover.position();
        self.ctx
            .world
            .find_blocks(name, origin, self.ctx.config.retry.search_radius, 1)
            .await
            .ok()?
            .into_iter()
            .next()
            .map(|block| block.pos)
    }

    /// The container at `at`, or the nearest chest (then barrel).
    async fn locate_container(
        &self,
        at: Option<BlockPos>,
    ) -> Result<(BlockPos, ContainerKind), TaskError> {
        if let Some(pos) = at {
            return self
                .ctx
                .world
                .block_at(pos)
                .await
                .and_then(|block| ContainerKind::from_block_name(&block.name))
                .filter(|kind| *kind != ContainerKind::Furnace)
                .map(|kind| (pos, kind))
                .ok_or_else(|| TaskError::NotFound(format!("No container at {pos}")));
        }
        for kind in [ContainerKind::Chest, ContainerKind::Barrel] {
            if let Some(pos) = self.nearest_block(kind.block_name()).await {
                return Ok((pos, kind));
            }
        }
        Err(TaskError::NotFound("No chest nearby".into()))
    }
}

fn already_at(target: Coordinate3, direct: f64) -> IntentResult {
    IntentResult::ok(format!("Already at position {target}"))
        .with("reachable", true)
        .with("path_length", 0)
        .with("direct_distance", direct)
}

fn moved_count(results: &[StepResult]) -> u32 {
    results
        .iter()
        .map(|result| match result {
            StepResult::Moved { count, .. } => *count,
            _ => 0,
        })
        .sum()
}

/// Every fifth waypoint plus the last one.
fn key_points(waypoints: &[BlockPos]) -> Vec<BlockPos> {
    let last = waypoints.len().saturating_sub(1);
    waypoints
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 5 == 0 || *i == last)
        .map(|(_, pos)| *pos)
        .collect()
}
