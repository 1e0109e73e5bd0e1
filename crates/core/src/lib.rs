//! # Wayfarer Core
//!
//! Domain types, capability traits, and error definitions for the Wayfarer
//! goal-pursuit engine. This crate has **no engine logic** — it defines the
//! vocabulary that the engine, the simulator and the CLI share.
//!
//! ## Design Philosophy
//!
//! The outside world is reached through two traits defined here:
//! - [`Mover`]: the motion subsystem that accepts one goal at a time and
//!   reports progress through asynchronous notifications
//! - [`World`]: world queries (blocks, entities, inventory) and opaque
//!   effectful interactions (dig, craft, open containers, ...)
//!
//! Implementations live elsewhere (a game-bot bridge, or the in-memory
//! simulator in `wayfarer-sim`), which keeps the engine testable.

pub mod candidate;
pub mod error;
pub mod event;
pub mod geometry;
pub mod goal;
pub mod intent;
pub mod mover;
pub mod world;

// Re-export key types at crate root for ergonomics
pub use candidate::{Candidate, CandidateTarget};
pub use error::{Error, InteractionError, MoverError, Result, TaskError};
pub use event::{DomainEvent, EventBus};
pub use geometry::{BlockPos, Coordinate3};
pub use goal::{EntityRef, PursuitGoal, PursuitOutcome};
pub use intent::IntentResult;
pub use mover::{Mover, MoverEvent, PathStatus};
pub use world::{
    BlockInfo, ContainerHandle, ContainerKind, EntityInfo, ItemStack, Recipe, World,
};
