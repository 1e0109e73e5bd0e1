//! End-to-end integration tests for the Wayfarer goal-pursuit engine.
//!
//! These tests drive whole intents through an `AgentSession` backed by the
//! in-memory simulator, checking timing, goal hygiene, retries, sequencing
//! and session behavior the way a planner would observe them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wayfarer_agent::{
    AgentSession, CandidateSelector, SessionContext, StepResult, TaskSequencer, TaskStep,
};
use wayfarer_config::{AppConfig, BusyPolicy};
use wayfarer_core::{
    BlockPos, Candidate, ContainerKind, Coordinate3, DomainEvent, EntityRef, Mover, MoverEvent,
    PathStatus,
};
use wayfarer_sim::{Action, Behavior, Simulation};

// ── Harness ─────────────────────────────────────────────────────────────

fn session(sim: &Simulation) -> AgentSession {
    session_with(sim, AppConfig::default())
}

fn session_with(sim: &Simulation, config: AppConfig) -> AgentSession {
    let handle = Arc::new(sim.clone());
    AgentSession::new(handle.clone(), handle, config)
}

/// Fixed targets of every goal the mover received, in order.
fn goal_targets(sim: &Simulation) -> Vec<Coordinate3> {
    sim.goal_calls()
        .iter()
        .filter_map(|call| call.goal.as_ref().and_then(|g| g.fixed_target()))
        .collect()
}

/// Everything already published on a receiver.
fn drain(rx: &mut broadcast::Receiver<Arc<DomainEvent>>) -> Vec<Arc<DomainEvent>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── E2E: Navigation ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn e2e_go_to_reports_no_path_within_fifty_ms() {
    let sim = Simulation::new();
    sim.push_behavior(Behavior::NoPathAfter(Duration::from_millis(50)));
    let agent = session(&sim);
    let started = Instant::now();

    let result = agent.go_to(Coordinate3::new(100.0, 64.0, 100.0)).await;

    assert!(!result.success);
    assert!(result.message.contains("no path"), "{}", result.message);
    assert_eq!(result.get("outcome").unwrap(), "no_path");
    assert_eq!(started.elapsed(), Duration::from_millis(50));
    assert!(sim.current_goal().is_none());
}

#[tokio::test(start_paused = true)]
async fn e2e_go_to_walks_and_arrives() {
    let sim = Simulation::new();
    let agent = session(&sim);
    let target = Coordinate3::new(7.0, 0.0, 7.0);

    let result = agent.go_to(target).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(sim.position().block(), target.block());
    assert_eq!(sim.goal_sets(), 1);
    assert!(sim.current_goal().is_none());
}

#[tokio::test(start_paused = true)]
async fn e2e_silent_mover_is_declared_stuck_at_ten_seconds() {
    let sim = Simulation::new();
    sim.push_behavior(Behavior::Idle);
    let agent = session(&sim);
    let started = Instant::now();

    let result = agent.go_to(Coordinate3::new(100.0, 64.0, 100.0)).await;

    assert_eq!(result.reason.as_deref(), Some("stuck"));
    assert!(result.message.contains("Stuck for 10000ms"), "{}", result.message);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert!(sim.current_goal().is_none());
}

#[tokio::test(start_paused = true)]
async fn e2e_short_deadline_times_out_before_stall() {
    let sim = Simulation::new();
    sim.push_behavior(Behavior::Idle);
    let mut config = AppConfig::default();
    config.navigation.deadline_ms = 5_000;
    let agent = session_with(&sim, config);
    let started = Instant::now();

    let result = agent.go_to(Coordinate3::new(100.0, 64.0, 100.0)).await;

    assert_eq!(result.reason.as_deref(), Some("timeout"));
    assert_eq!(started.elapsed(), Duration::from_millis(5_000));
    assert!(sim.current_goal().is_none());
}

#[tokio::test(start_paused = true)]
async fn e2e_deadline_within_epsilon_counts_as_success() {
    let sim = Simulation::at(Coordinate3::new(98.5, 64.0, 100.0));
    sim.push_behavior(Behavior::Idle);
    let mut config = AppConfig::default();
    config.navigation.deadline_ms = 5_000;
    let agent = session_with(&sim, config);

    let result = agent.go_to(Coordinate3::new(100.0, 64.0, 100.0)).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.get("outcome").unwrap(), "near_enough");
    assert!(result.message.starts_with("Arrived near"));
}

#[tokio::test(start_paused = true)]
async fn e2e_follow_catches_up_with_player() {
    let sim = Simulation::new();
    sim.add_entity(EntityRef::new(42, "Alex"), Coordinate3::new(15.0, 0.0, 0.0));
    let agent = session(&sim);

    let result = agent.follow_entity("Alex", 2.0).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.get("entity_id").unwrap(), 42);
    assert!(sim.position().distance_to(&Coordinate3::new(15.0, 0.0, 0.0)) <= 2.0);
    assert!(sim.goal_calls()[0].dynamic);
    assert!(sim.current_goal().is_none());
}

// ── E2E: Single Resolution ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn e2e_replayed_notifications_cannot_change_the_outcome() {
    let sim = Simulation::new();
    sim.push_behavior(Behavior::NoPathAfter(Duration::from_millis(50)));
    let agent = session(&sim);
    let mut events = agent.subscribe();

    let result = agent.go_to(Coordinate3::new(30.0, 0.0, 0.0)).await;
    assert_eq!(result.reason.as_deref(), Some("no_path"));
    assert_eq!(sim.subscriber_count(), 0);

    sim.emit(MoverEvent::Arrived);
    sim.emit(MoverEvent::PathStatus {
        status: PathStatus::Success,
        path: Vec::new(),
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let resolved = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e.as_ref(), DomainEvent::PursuitResolved { .. }))
        .count();
    assert_eq!(resolved, 1);
    assert_eq!(sim.goal_clears(), 1);
}

// ── E2E: Candidate Ranking & Retry ──────────────────────────────────────

#[test]
fn e2e_elevated_candidate_is_ranked_behind_level_one() {
    let level = Candidate::block(BlockPos::new(10, 0, 0), "oak_log", 0);
    let mut elevated = Candidate::block(BlockPos::new(0, 6, 0), "oak_log", 1);
    elevated.position = Coordinate3::new(28f64.sqrt(), 6.0, 0.0);

    let ranked = CandidateSelector::default().rank(vec![elevated, level], Coordinate3::ORIGIN);

    let scores: Vec<f64> = ranked.iter().map(|c| (c.score * 1e6).round() / 1e6).collect();
    assert_eq!(scores, vec![10.0, 26.0]);
    assert_eq!(ranked[0].discovery_index, 0);
}

#[tokio::test(start_paused = true)]
async fn e2e_collect_exhausts_three_candidates_in_ranked_order() {
    let sim = Simulation::new();
    for x in [30, 10, 40, 20] {
        sim.add_block(BlockPos::new(x, 0, 0), "oak_log");
    }
    for _ in 0..3 {
        sim.push_behavior(Behavior::NoPathAfter(Duration::from_millis(20)));
    }
    let agent = session(&sim);
    let mut events = agent.subscribe();

    let result = agent.collect_block("oak_log").await;

    assert!(!result.success);
    assert_eq!(result.reason.as_deref(), Some("exhausted"));
    assert!(result.message.contains("All 3 attempt(s) failed"), "{}", result.message);
    assert!(result.message.contains("(30, 0, 0)"), "{}", result.message);

    let xs: Vec<f64> = goal_targets(&sim).iter().map(|t| t.x).collect();
    assert_eq!(xs, vec![10.0, 20.0, 30.0]);
    assert_eq!(sim.inventory_count("oak_log"), 0);
    assert!(sim.current_goal().is_none());

    let abandoned: Vec<usize> = drain(&mut events)
        .iter()
        .filter_map(|e| match e.as_ref() {
            DomainEvent::AttemptAbandoned { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(abandoned, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn e2e_collect_recovers_from_failed_dig() {
    let sim = Simulation::new();
    sim.add_block(BlockPos::new(8, 0, 0), "oak_log");
    sim.add_block(BlockPos::new(12, 0, 0), "oak_log");
    sim.fail_next(Action::Dig, "tool slipped");
    let agent = session(&sim);

    let result = agent.collect_block("oak_log").await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.get("attempts").unwrap(), 2);
    assert_eq!(sim.inventory_count("oak_log"), 1);
    assert!(sim.interactions().iter().any(|i| i.starts_with("dig (12, 0, 0)")));
}

#[tokio::test(start_paused = true)]
async fn e2e_mount_skips_vanished_entity() {
    let sim = Simulation::new();
    sim.add_entity(EntityRef::new(1, "horse"), Coordinate3::new(10.0, 0.0, 0.0));
    sim.add_entity(EntityRef::new(2, "horse"), Coordinate3::new(14.0, 0.0, 0.0));
    sim.push_behavior(Behavior::ArriveAfter(Duration::from_millis(500)));
    let agent = session(&sim);

    let despawn = {
        let sim = sim.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            sim.remove_entity(1);
        })
    };
    let result = agent.mount_entity("horse").await;
    despawn.await.unwrap();

    assert!(result.success, "{}", result.message);
    assert_eq!(result.get("entity_id").unwrap(), 2);
    assert_eq!(sim.mounted(), Some(EntityRef::new(2, "horse")));
}

// ── E2E: Sequences & Containers ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn e2e_failing_fourth_step_still_closes_container() {
    let sim = Simulation::new();
    let chest = BlockPos::new(6, 0, 0);
    sim.add_container(chest, ContainerKind::Chest);
    let handle = Arc::new(sim.clone());
    let ctx = SessionContext::new(handle.clone(), handle, AppConfig::default());

    let steps = vec![
        TaskStep::approach(chest, "chest"),
        TaskStep::Wait(Duration::from_millis(100)),
        TaskStep::OpenContainer {
            pos: chest,
            kind: ContainerKind::Chest,
        },
        TaskStep::Withdraw {
            item: "diamond".into(),
            count: 1,
        },
    ];

    let failure = TaskSequencer::new(&ctx)
        .run(steps, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.index, 3);
    assert_eq!(failure.completed.len(), 3);
    assert!(matches!(failure.completed[2], StepResult::Opened { .. }));
    assert!(sim.open_handle().is_none());
    assert!(ctx.container.current().is_none());
    assert_eq!(sim.interactions().last().unwrap(), "close chest at (6, 0, 0)");
}

#[tokio::test(start_paused = true)]
async fn e2e_deposit_failure_closes_container_and_names_step() {
    let sim = Simulation::new();
    sim.add_container(BlockPos::new(5, 0, 0), ContainerKind::Barrel);
    sim.give("cobblestone", 10);
    sim.fail_next(Action::Deposit, "slot locked");
    let agent = session(&sim);

    let result = agent.deposit_items("cobblestone", Some(4), Some(BlockPos::new(5, 0, 0))).await;

    assert!(!result.success);
    assert_eq!(result.reason.as_deref(), Some("interaction_failed"));
    assert_eq!(result.get("step").unwrap(), "deposit cobblestone x4");
    assert_eq!(result.get("failed_step").unwrap(), 2);
    assert!(sim.open_handle().is_none());
    assert_eq!(sim.inventory_count("cobblestone"), 10);
}

#[tokio::test(start_paused = true)]
async fn e2e_smelt_then_withdraw_round() {
    let sim = Simulation::new();
    let chest = BlockPos::new(-4, 0, 0);
    sim.add_container(BlockPos::new(3, 0, 0), ContainerKind::Furnace);
    sim.add_container(chest, ContainerKind::Chest);
    sim.stock_container(chest, "raw_iron", 5);
    sim.give("charcoal", 1);
    let agent = session(&sim);

    let withdrawn = agent.withdraw_items("raw_iron", 5, None).await;
    assert!(withdrawn.success, "{}", withdrawn.message);

    let smelted = agent.smelt_item("raw_iron", 5).await;
    assert!(smelted.success, "{}", smelted.message);
    assert_eq!(sim.inventory_count("iron_ingot"), 5);
    assert_eq!(sim.inventory_count("charcoal"), 0);
    assert!(sim.open_handle().is_none());
}

// ── E2E: Probes ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn e2e_probes_never_move_the_agent() {
    let sim = Simulation::new();
    let agent = session(&sim);

    let reach = agent.can_reach(Coordinate3::new(20.0, 0.0, 0.0)).await;
    let path = agent.compute_path_to(Coordinate3::new(20.0, 0.0, 0.0)).await;

    assert_eq!(reach.get("reachable").unwrap(), true);
    assert_eq!(path.get("found").unwrap(), true);
    assert_eq!(path.get("path_length").unwrap(), 20);
    assert_eq!(sim.position(), Coordinate3::ORIGIN);
    assert_eq!(sim.goal_sets(), 2);
    assert!(sim.current_goal().is_none());
}

// ── E2E: Sessions ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn e2e_stop_cancels_walk_and_clears_goal() {
    let sim = Simulation::new();
    sim.push_behavior(Behavior::Idle);
    let agent = Arc::new(session(&sim));

    let walker = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.go_to(Coordinate3::new(80.0, 0.0, 0.0)).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(agent.is_busy());

    let stopped = agent.stop();
    let walked = walker.await.unwrap();

    assert_eq!(stopped.get("interrupted_activity").unwrap(), true);
    assert_eq!(walked.reason.as_deref(), Some("cancelled"));
    assert!(sim.current_goal().is_none());
    assert!(!agent.is_busy());
}

#[tokio::test(start_paused = true)]
async fn e2e_reject_policy_reports_busy() {
    let sim = Simulation::new();
    sim.push_behavior(Behavior::ArriveAfter(Duration::from_secs(2)));
    let mut config = AppConfig::default();
    config.session.busy_policy = BusyPolicy::Reject;
    let agent = Arc::new(session_with(&sim, config));

    let first = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.go_to(Coordinate3::new(40.0, 0.0, 0.0)).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = agent.collect_block("oak_log").await;

    assert_eq!(second.reason.as_deref(), Some("busy"));
    assert!(first.await.unwrap().success);
    assert_eq!(sim.goal_sets(), 1);
}

#[tokio::test(start_paused = true)]
async fn e2e_separate_sessions_do_not_interfere() {
    let left = Simulation::new();
    let right = Simulation::new();
    right.add_container(BlockPos::new(2, 0, 0), ContainerKind::Chest);
    right.give("torch", 3);
    let a = session(&left);
    let b = session(&right);

    let (walked, deposited) = tokio::join!(
        a.go_to(Coordinate3::new(5.0, 0.0, 0.0)),
        b.deposit_items("torch", None, None),
    );

    assert!(walked.success, "{}", walked.message);
    assert!(deposited.success, "{}", deposited.message);
    assert_ne!(a.session_id(), b.session_id());
    assert!(left.interactions().is_empty());
    assert!(right.open_handle().is_none());
}
