//! # Wayfarer Sim
//!
//! An in-memory [`Simulation`] that implements both [`Mover`] and
//! [`World`](wayfarer_core::World). Useful for testing the engine and for
//! running scenarios from the CLI without a game server.
//!
//! Every goal the mover receives plays out one scripted [`Behavior`]
//! (walk, arrive, report no path, stay silent, ...). Goal calls and
//! interactions are recorded so tests can assert on them afterwards.

pub mod behavior;
pub mod world;

pub use behavior::{Behavior, TICK, straight_path};
pub use world::Action;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use wayfarer_core::{
    BlockPos, ContainerHandle, ContainerKind, Coordinate3, EntityInfo, EntityRef, ItemStack,
    Mover, MoverError, MoverEvent, PursuitGoal, Recipe,
};

/// One recorded `set_goal` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalCall {
    pub goal: Option<PursuitGoal>,
    pub dynamic: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ContainerState {
    pub kind: Option<ContainerKind>,
    pub items: Vec<ItemStack>,
    pub fuel: Option<ItemStack>,
    pub input: Option<ItemStack>,
}

pub(crate) struct SimState {
    pub position: Coordinate3,
    pub goal: Option<PursuitGoal>,
    pub generation: u64,
    pub disconnected: bool,
    pub behaviors: VecDeque<Behavior>,
    pub default_behavior: Behavior,
    pub goal_log: Vec<GoalCall>,

    pub blocks: HashMap<BlockPos, String>,
    pub known_blocks: HashSet<String>,
    pub entities: HashMap<u64, EntityInfo>,
    pub inventory: Vec<ItemStack>,
    pub recipes: HashMap<String, Recipe>,
    pub smelting: HashMap<String, String>,
    pub containers: HashMap<BlockPos, ContainerState>,
    pub open: Option<ContainerHandle>,
    pub next_handle: u64,
    pub failures: HashMap<Action, VecDeque<String>>,
    pub delays: HashMap<Action, Duration>,
    pub interactions: Vec<String>,
    pub mounted: Option<EntityRef>,
}

impl SimState {
    fn new() -> Self {
        let smelting = [
            ("raw_iron", "iron_ingot"),
            ("iron_ore", "iron_ingot"),
            ("raw_gold", "gold_ingot"),
            ("raw_copper", "copper_ingot"),
            ("sand", "glass"),
            ("cobblestone", "stone"),
            ("oak_log", "charcoal"),
            ("beef", "cooked_beef"),
        ]
        .into_iter()
        .map(|(input, output)| (input.to_string(), output.to_string()))
        .collect();

        Self {
            position: Coordinate3::ORIGIN,
            goal: None,
            generation: 0,
            disconnected: false,
            behaviors: VecDeque::new(),
            default_behavior: Behavior::default(),
            goal_log: Vec::new(),
            blocks: HashMap::new(),
            known_blocks: HashSet::new(),
            entities: HashMap::new(),
            inventory: Vec::new(),
            recipes: HashMap::new(),
            smelting,
            containers: HashMap::new(),
            open: None,
            next_handle: 1,
            failures: HashMap::new(),
            delays: HashMap::new(),
            interactions: Vec::new(),
            mounted: None,
        }
    }

    pub(crate) fn goal_target(&self, goal: &PursuitGoal) -> Option<Coordinate3> {
        match goal {
            PursuitGoal::Point { target } | PursuitGoal::Proximity { target, .. } => Some(*target),
            PursuitGoal::Follow { entity, .. } => {
                self.entities.get(&entity.id).map(|info| info.position)
            }
        }
    }
}

pub(crate) struct Shared {
    state: Mutex<SimState>,
    pub events: broadcast::Sender<MoverEvent>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `event` only while `generation` is still the installed goal.
    pub(crate) fn emit_if_current(&self, generation: u64, event: MoverEvent) {
        let state = self.lock();
        if state.generation == generation {
            let _ = self.events.send(event);
        }
    }
}

/// The simulated agent: mover and world in one.
#[derive(Clone)]
pub struct Simulation {
    shared: Arc<Shared>,
}

impl Simulation {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SimState::new()),
                events,
            }),
        }
    }

    pub fn at(position: Coordinate3) -> Self {
        let sim = Self::new();
        sim.set_position(position);
        sim
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SimState> {
        self.shared.lock()
    }

    // --- Mover scripting ---

    /// Queue a behavior for the next installed goal.
    pub fn push_behavior(&self, behavior: Behavior) {
        self.lock().behaviors.push_back(behavior);
    }

    /// Behavior used once the queue is empty.
    pub fn set_default_behavior(&self, behavior: Behavior) {
        self.lock().default_behavior = behavior;
    }

    /// Broadcast a notification regardless of the installed goal.
    pub fn emit(&self, event: MoverEvent) {
        let _ = self.shared.events.send(event);
    }

    pub fn set_position(&self, position: Coordinate3) {
        self.lock().position = position;
    }

    /// Make every further `set_goal` fail.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    // --- Mover inspection ---

    pub fn current_goal(&self) -> Option<PursuitGoal> {
        self.lock().goal.clone()
    }

    pub fn goal_calls(&self) -> Vec<GoalCall> {
        self.lock().goal_log.clone()
    }

    pub fn goal_sets(&self) -> usize {
        self.lock()
            .goal_log
            .iter()
            .filter(|call| call.goal.is_some())
            .count()
    }

    pub fn goal_clears(&self) -> usize {
        self.lock()
            .goal_log
            .iter()
            .filter(|call| call.goal.is_none())
            .count()
    }

    /// Live notification subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.events.receiver_count()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Mover for Simulation {
    fn name(&self) -> &str {
        "sim"
    }

    fn set_goal(&self, goal: Option<PursuitGoal>, dynamic: bool) -> Result<(), MoverError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MoverError::Internal(e.to_string()))?;

        let mut state = self.lock();
        if state.disconnected {
            return Err(MoverError::Disconnected);
        }

        state.generation += 1;
        state.goal_log.push(GoalCall {
            goal: goal.clone(),
            dynamic,
        });
        state.goal = goal.clone();

        let Some(goal) = goal else {
            return Ok(());
        };
        let behavior = match state.behaviors.pop_front() {
            Some(behavior) => behavior,
            None => state.default_behavior.clone(),
        };
        tracing::debug!(%goal, ?behavior, "sim goal installed");
        runtime.spawn(behavior::drive(
            self.shared.clone(),
            state.generation,
            goal,
            behavior,
        ));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<MoverEvent> {
        self.shared.events.subscribe()
    }

    fn position(&self) -> Coordinate3 {
        self.lock().position
    }

    fn locate(&self, entity: &EntityRef) -> Option<Coordinate3> {
        self.lock().entities.get(&entity.id).map(|info| info.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::PathStatus;

    #[tokio::test(start_paused = true)]
    async fn walk_reaches_point_and_reports_arrival() {
        let sim = Simulation::new();
        let mut rx = sim.subscribe();
        let target = Coordinate3::new(4.0, 0.0, 0.0);

        sim.set_goal(Some(PursuitGoal::point(target)), false).unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            MoverEvent::PathStatus { .. }
        ));
        assert_eq!(rx.recv().await.unwrap(), MoverEvent::Arrived);
        assert_eq!(sim.position(), target);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_goal_stays_silent() {
        let sim = Simulation::new();
        sim.push_behavior(Behavior::NoPathAfter(Duration::from_millis(50)));
        let mut rx = sim.subscribe();

        sim.set_goal(Some(PursuitGoal::point(Coordinate3::new(9.0, 0.0, 0.0))), false)
            .unwrap();
        sim.set_goal(None, false).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(sim.goal_sets(), 1);
        assert_eq!(sim.goal_clears(), 1);
        assert!(sim.current_goal().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn default_behavior_applies_once_queue_is_empty() {
        let sim = Simulation::new();
        let path = vec![Coordinate3::new(1.0, 0.0, 0.0), Coordinate3::new(2.0, 0.0, 0.0)];
        sim.push_behavior(Behavior::PathFound {
            path: path.clone(),
            after: Duration::from_millis(20),
        });
        sim.set_default_behavior(Behavior::NoPathAfter(Duration::from_millis(20)));
        let mut rx = sim.subscribe();
        let goal = PursuitGoal::point(Coordinate3::new(2.0, 0.0, 0.0));

        sim.set_goal(Some(goal.clone()), false).unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            MoverEvent::PathStatus {
                status: PathStatus::Success,
                path,
            }
        );
        assert_eq!(sim.position(), Coordinate3::ORIGIN);

        for _ in 0..2 {
            sim.set_goal(Some(goal.clone()), false).unwrap();
            assert_eq!(
                rx.recv().await.unwrap(),
                MoverEvent::PathStatus {
                    status: PathStatus::NoPath,
                    path: Vec::new(),
                }
            );
        }
        assert_eq!(sim.goal_sets(), 3);
    }

    #[tokio::test]
    async fn disconnected_mover_rejects_goals() {
        let sim = Simulation::new();
        sim.disconnect();
        let err = sim
            .set_goal(Some(PursuitGoal::point(Coordinate3::ORIGIN)), false)
            .unwrap_err();
        assert!(matches!(err, MoverError::Disconnected));
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let sim = Simulation::new();
        assert_eq!(sim.subscriber_count(), 0);
        let rx = sim.subscribe();
        assert_eq!(sim.subscriber_count(), 1);
        drop(rx);
        assert_eq!(sim.subscriber_count(), 0);
    }
}
