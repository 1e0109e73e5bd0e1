//! `wayfarer simulate` — Run one intent against a scripted in-memory world.
//!
//! Each scenario builds a [`Simulation`], runs a single intent through an
//! [`AgentSession`] and prints the resulting `IntentResult` as JSON.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use wayfarer_agent::AgentSession;
use wayfarer_config::AppConfig;
use wayfarer_core::{
    BlockPos, ContainerKind, Coordinate3, EntityRef, IntentResult, ItemStack, Recipe,
};
use wayfarer_sim::{Action, Behavior, Simulation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Walk to a nearby coordinate
    Goto,
    /// The planner reports that no path exists
    NoPath,
    /// The mover accepts the goal and never moves
    Stall,
    /// Collect a log; the first candidate fails to dig
    Collect,
    /// Follow a wandering player
    Follow,
    /// Mount the nearest horse
    Mount,
    /// Craft a crafting table next to an existing one
    Craft,
    /// Smelt iron in the nearest furnace
    Smelt,
    /// Deposit cobblestone into the nearest chest
    Deposit,
    /// Withdraw from a chest that lacks the item
    Withdraw,
    /// Probe whether a coordinate is reachable
    Reach,
    /// Compute a path without moving
    Path,
}

pub async fn run(scenario: Scenario, show_events: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let sim = Simulation::new();
    let mover = Arc::new(sim.clone());
    let agent = AgentSession::new(mover.clone(), mover, config);

    println!("🧭 Scenario: {scenario:?} (session {})", agent.session_id());

    let forwarder = show_events.then(|| {
        let mut rx = agent.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                match serde_json::to_string(event.as_ref()) {
                    Ok(json) => println!("  📡 {json}"),
                    Err(e) => tracing::warn!("Unserializable event: {e}"),
                }
            }
        })
    });

    let result = play(scenario, &sim, &agent).await;

    if let Some(handle) = forwarder {
        // Let buffered events drain before the summary.
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
    }

    report(&result)?;
    tracing::debug!(interactions = ?sim.interactions(), "Simulation finished");

    Ok(())
}

async fn play(scenario: Scenario, sim: &Simulation, agent: &AgentSession) -> IntentResult {
    match scenario {
        Scenario::Goto => agent.go_to(Coordinate3::new(8.0, 0.0, 3.0)).await,
        Scenario::NoPath => {
            sim.push_behavior(Behavior::NoPathAfter(Duration::from_millis(50)));
            agent.go_to(Coordinate3::new(100.0, 64.0, 100.0)).await
        }
        Scenario::Stall => {
            sim.push_behavior(Behavior::Idle);
            agent.go_to(Coordinate3::new(40.0, 0.0, 0.0)).await
        }
        Scenario::Collect => {
            sim.add_block(BlockPos::new(4, 0, 0), "oak_log");
            sim.add_block(BlockPos::new(9, 0, 2), "oak_log");
            sim.fail_next(Action::Dig, "tool slipped");
            agent.collect_block("oak_log").await
        }
        Scenario::Follow => {
            let player = EntityRef::new(42, "Alex");
            sim.add_entity(player, Coordinate3::new(12.0, 0.0, 0.0));
            let wander = tokio::spawn(wander(sim.clone(), 42));
            let result = agent.follow_entity("Alex", 2.0).await;
            wander.abort();
            result
        }
        Scenario::Mount => {
            sim.add_entity(EntityRef::new(7, "horse"), Coordinate3::new(6.0, 0.0, 1.0));
            agent.mount_entity("horse").await
        }
        Scenario::Craft => {
            sim.add_block(BlockPos::new(5, 0, 0), "crafting_table");
            sim.give("oak_planks", 4);
            sim.add_recipe(Recipe {
                item: "crafting_table".into(),
                yields: 1,
                ingredients: vec![ItemStack::new("oak_planks", 4)],
                requires_table: true,
            });
            agent.craft_item("crafting_table", 1).await
        }
        Scenario::Smelt => {
            sim.add_container(BlockPos::new(3, 0, 0), ContainerKind::Furnace);
            sim.give("raw_iron", 2);
            sim.give("coal", 1);
            agent.smelt_item("raw_iron", 2).await
        }
        Scenario::Deposit => {
            sim.add_container(BlockPos::new(4, 0, 0), ContainerKind::Chest);
            sim.give("cobblestone", 32);
            agent.deposit_items("cobblestone", None, None).await
        }
        Scenario::Withdraw => {
            let chest = BlockPos::new(4, 0, 0);
            sim.add_container(chest, ContainerKind::Chest);
            sim.stock_container(chest, "oak_log", 3);
            agent.withdraw_items("diamond", 1, Some(chest)).await
        }
        Scenario::Reach => agent.can_reach(Coordinate3::new(30.0, 0.0, 0.0)).await,
        Scenario::Path => agent.compute_path_to(Coordinate3::new(16.0, 0.0, 4.0)).await,
    }
}

/// Walk entity `id` away from its spawn point for a few seconds.
async fn wander(sim: Simulation, id: u64) {
    for step in 1..=6 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let step = f64::from(step);
        sim.move_entity(id, Coordinate3::new(12.0 + step, 0.0, step * 0.5));
    }
}

fn report(result: &IntentResult) -> Result<(), Box<dyn std::error::Error>> {
    if result.success {
        println!("\n✅ {}", result.message);
    } else {
        println!("\n❌ {}", result.message);
    }
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
