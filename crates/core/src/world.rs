//! World trait — queries and opaque effectful interactions.
//!
//! The engine treats every interaction as a binary success/failure call and
//! never looks inside. World queries are read-only snapshots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InteractionError;
use crate::geometry::{BlockPos, Coordinate3};
use crate::goal::EntityRef;

/// A block as reported by the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub name: String,
    pub pos: BlockPos,
}

/// An entity as reported by the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub entity: EntityRef,
    pub position: Coordinate3,
}

/// A stack of items in an inventory or container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }

    /// Total count of `name` across a list of stacks.
    pub fn count_in(stacks: &[ItemStack], name: &str) -> u32 {
        stacks
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.count)
            .sum()
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.name, self.count)
    }
}

/// A crafting recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Output item name
    pub item: String,

    /// Items produced per craft
    #[serde(default = "default_yield")]
    pub yields: u32,

    /// Ingredients consumed per craft
    pub ingredients: Vec<ItemStack>,

    /// Whether a crafting table must be nearby
    #[serde(default)]
    pub requires_table: bool,
}

fn default_yield() -> u32 {
    1
}

impl Recipe {
    /// Number of crafts needed to produce at least `count` items.
    pub fn crafts_for(&self, count: u32) -> u32 {
        count.div_ceil(self.yields.max(1))
    }

    /// Items produced by `crafts` crafts, or `None` when the output or any
    /// ingredient total does not fit in a `u32`.
    pub fn output_for(&self, crafts: u32) -> Option<u32> {
        for needed in &self.ingredients {
            needed.count.checked_mul(crafts)?;
        }
        self.yields.checked_mul(crafts)
    }

    /// Ingredients missing from `inventory` for `crafts` crafts.
    pub fn missing_ingredients(&self, inventory: &[ItemStack], crafts: u32) -> Vec<ItemStack> {
        self.ingredients
            .iter()
            .filter_map(|needed| {
                let have = ItemStack::count_in(inventory, &needed.name);
                let want = needed.count.saturating_mul(crafts);
                (have < want).then(|| ItemStack::new(&needed.name, want - have))
            })
            .collect()
    }
}

/// Kinds of openable world objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Chest,
    Barrel,
    Furnace,
}

impl ContainerKind {
    /// The block name that hosts this container.
    pub fn block_name(&self) -> &'static str {
        match self {
            Self::Chest => "chest",
            Self::Barrel => "barrel",
            Self::Furnace => "furnace",
        }
    }

    pub fn from_block_name(name: &str) -> Option<Self> {
        match name {
            "chest" | "trapped_chest" => Some(Self::Chest),
            "barrel" => Some(Self::Barrel),
            "furnace" => Some(Self::Furnace),
            _ => None,
        }
    }
}

/// An open container window. At most one exists per agent at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: u64,
    pub kind: ContainerKind,
    pub pos: BlockPos,
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind.block_name(), self.pos)
    }
}

/// The core World trait.
#[async_trait]
pub trait World: Send + Sync {
    // --- Queries ---

    /// Blocks named `name` within `max_distance` of `origin`, nearest first,
    /// at most `limit`. Unknown block names are an error.
    async fn find_blocks(
        &self,
        name: &str,
        origin: Coordinate3,
        max_distance: f64,
        limit: usize,
    ) -> Result<Vec<BlockInfo>, InteractionError>;

    /// The block at a position, if loaded and not air.
    async fn block_at(&self, pos: BlockPos) -> Option<BlockInfo>;

    /// Entities named `name` within `max_distance` of `origin`, nearest first.
    async fn find_entities(&self, name: &str, origin: Coordinate3, max_distance: f64)
        -> Vec<EntityInfo>;

    /// Current state of an entity, if it still exists.
    async fn entity(&self, id: u64) -> Option<EntityInfo>;

    /// Snapshot of the agent inventory.
    async fn inventory(&self) -> Vec<ItemStack>;

    /// The recipe for `item`, if craftable.
    async fn recipe(&self, item: &str) -> Option<Recipe>;

    // --- Interactions ---

    async fn dig(&self, pos: BlockPos) -> Result<(), InteractionError>;

    async fn craft(
        &self,
        recipe: &Recipe,
        crafts: u32,
        table: Option<BlockPos>,
    ) -> Result<(), InteractionError>;

    async fn mount(&self, entity: &EntityRef) -> Result<(), InteractionError>;

    async fn open_container(
        &self,
        pos: BlockPos,
        kind: ContainerKind,
    ) -> Result<ContainerHandle, InteractionError>;

    async fn close_container(&self, handle: &ContainerHandle) -> Result<(), InteractionError>;

    /// Move up to `count` of `item` from the inventory into the container.
    /// Returns the number moved.
    async fn deposit(
        &self,
        handle: &ContainerHandle,
        item: &str,
        count: u32,
    ) -> Result<u32, InteractionError>;

    /// Move up to `count` of `item` from the container into the inventory.
    /// Returns the number moved.
    async fn withdraw(
        &self,
        handle: &ContainerHandle,
        item: &str,
        count: u32,
    ) -> Result<u32, InteractionError>;

    async fn put_fuel(
        &self,
        handle: &ContainerHandle,
        item: &str,
        count: u32,
    ) -> Result<(), InteractionError>;

    async fn put_input(
        &self,
        handle: &ContainerHandle,
        item: &str,
        count: u32,
    ) -> Result<(), InteractionError>;

    /// Collect whatever the furnace output slot holds.
    async fn take_output(
        &self,
        handle: &ContainerHandle,
    ) -> Result<Option<ItemStack>, InteractionError>;
}
