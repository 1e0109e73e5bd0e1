//! Simulated world: blocks, entities, inventory, recipes and containers.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use wayfarer_core::{
    BlockInfo, BlockPos, ContainerHandle, ContainerKind, Coordinate3, EntityInfo, EntityRef,
    InteractionError, ItemStack, Recipe, World,
};

use crate::{ContainerState, Simulation};

/// Interactions that can be slowed down or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Dig,
    Craft,
    Mount,
    Open,
    Close,
    Deposit,
    Withdraw,
    PutFuel,
    PutInput,
    TakeOutput,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dig => "dig",
            Self::Craft => "craft",
            Self::Mount => "mount",
            Self::Open => "open",
            Self::Close => "close",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::PutFuel => "put_fuel",
            Self::PutInput => "put_input",
            Self::TakeOutput => "take_output",
        }
    }
}

fn add_items(stacks: &mut Vec<ItemStack>, name: &str, count: u32) {
    if count == 0 {
        return;
    }
    match stacks.iter_mut().find(|s| s.name == name) {
        Some(stack) => stack.count += count,
        None => stacks.push(ItemStack::new(name, count)),
    }
}

/// Remove up to `count` of `name`. Returns the number removed.
fn take_items(stacks: &mut Vec<ItemStack>, name: &str, count: u32) -> u32 {
    let mut remaining = count;
    for stack in stacks.iter_mut().filter(|s| s.name == name) {
        let taken = stack.count.min(remaining);
        stack.count -= taken;
        remaining -= taken;
    }
    stacks.retain(|s| s.count > 0);
    count - remaining
}

impl Simulation {
    // --- World setup ---

    /// Make a block type known without placing any.
    pub fn register_block_type(&self, name: &str) {
        self.lock().known_blocks.insert(name.to_string());
    }

    pub fn add_block(&self, pos: BlockPos, name: &str) {
        let mut state = self.lock();
        state.known_blocks.insert(name.to_string());
        state.blocks.insert(pos, name.to_string());
    }

    pub fn remove_block(&self, pos: BlockPos) {
        self.lock().blocks.remove(&pos);
    }

    pub fn add_entity(&self, entity: EntityRef, position: Coordinate3) {
        self.lock()
            .entities
            .insert(entity.id, EntityInfo { entity, position });
    }

    pub fn move_entity(&self, id: u64, position: Coordinate3) {
        if let Some(info) = self.lock().entities.get_mut(&id) {
            info.position = position;
        }
    }

    pub fn remove_entity(&self, id: u64) {
        self.lock().entities.remove(&id);
    }

    pub fn give(&self, item: &str, count: u32) {
        add_items(&mut self.lock().inventory, item, count);
    }

    pub fn inventory_count(&self, item: &str) -> u32 {
        ItemStack::count_in(&self.lock().inventory, item)
    }

    pub fn add_recipe(&self, recipe: Recipe) {
        self.lock().recipes.insert(recipe.item.clone(), recipe);
    }

    /// Register what a furnace turns `input` into.
    pub fn add_smelting(&self, input: &str, output: &str) {
        self.lock()
            .smelting
            .insert(input.to_string(), output.to_string());
    }

    /// Place a container block.
    pub fn add_container(&self, pos: BlockPos, kind: ContainerKind) {
        let mut state = self.lock();
        state.known_blocks.insert(kind.block_name().to_string());
        state.blocks.insert(pos, kind.block_name().to_string());
        state.containers.insert(
            pos,
            ContainerState {
                kind: Some(kind),
                ..Default::default()
            },
        );
    }

    /// Put items into a container directly, bypassing the inventory.
    pub fn stock_container(&self, pos: BlockPos, item: &str, count: u32) {
        if let Some(container) = self.lock().containers.get_mut(&pos) {
            add_items(&mut container.items, item, count);
        }
    }

    pub fn container_items(&self, pos: BlockPos) -> Vec<ItemStack> {
        self.lock()
            .containers
            .get(&pos)
            .map(|c| c.items.clone())
            .unwrap_or_default()
    }

    /// Make the next call of `action` fail with `reason`.
    pub fn fail_next(&self, action: Action, reason: &str) {
        self.lock()
            .failures
            .entry(action)
            .or_default()
            .push_back(reason.to_string());
    }

    /// Delay every call of `action`.
    pub fn delay(&self, action: Action, delay: Duration) {
        self.lock().delays.insert(action, delay);
    }

    // --- World inspection ---

    /// Interactions performed so far, in order (e.g. "dig (1, 2, 3)").
    pub fn interactions(&self) -> Vec<String> {
        self.lock().interactions.clone()
    }

    pub fn open_handle(&self) -> Option<ContainerHandle> {
        self.lock().open.clone()
    }

    pub fn mounted(&self) -> Option<EntityRef> {
        self.lock().mounted.clone()
    }

    async fn before(&self, action: Action) -> Result<(), InteractionError> {
        let delay = self.lock().delays.get(&action).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        if let Some(reason) = state.failures.get_mut(&action).and_then(VecDeque::pop_front) {
            state.interactions.push(format!("{} failed", action.label()));
            return Err(InteractionError::failed(action.label(), reason));
        }
        Ok(())
    }

    fn check_open(&self, handle: &ContainerHandle, action: Action) -> Result<(), InteractionError> {
        if self.lock().open.as_ref() == Some(handle) {
            Ok(())
        } else {
            Err(InteractionError::failed(
                action.label(),
                format!("{handle} is not open"),
            ))
        }
    }
}

#[async_trait]
impl World for Simulation {
    async fn find_blocks(
        &self,
        name: &str,
        origin: Coordinate3,
        max_distance: f64,
        limit: usize,
    ) -> Result<Vec<BlockInfo>, InteractionError> {
        let state = self.lock();
        if !state.known_blocks.contains(name) {
            return Err(InteractionError::Unknown {
                kind: "block type".into(),
                name: name.into(),
            });
        }

        let mut found: Vec<(f64, BlockInfo)> = state
            .blocks
            .iter()
            .filter(|(_, block)| block.as_str() == name)
            .map(|(pos, block)| {
                let info = BlockInfo {
                    name: block.clone(),
                    pos: *pos,
                };
                (origin.distance_to(&pos.as_coordinate()), info)
            })
            .filter(|(distance, _)| *distance <= max_distance)
            .collect();

        found.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.pos.cmp(&b.1.pos)));
        Ok(found.into_iter().take(limit).map(|(_, info)| info).collect())
    }

    async fn block_at(&self, pos: BlockPos) -> Option<BlockInfo> {
        self.lock().blocks.get(&pos).map(|name| BlockInfo {
            name: name.clone(),
            pos,
        })
    }

    async fn find_entities(
        &self,
        name: &str,
        origin: Coordinate3,
        max_distance: f64,
    ) -> Vec<EntityInfo> {
        let state = self.lock();
        let mut found: Vec<EntityInfo> = state
            .entities
            .values()
            .filter(|info| info.entity.name == name)
            .filter(|info| origin.distance_to(&info.position) <= max_distance)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            origin
                .distance_to(&a.position)
                .total_cmp(&origin.distance_to(&b.position))
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });
        found
    }

    async fn entity(&self, id: u64) -> Option<EntityInfo> {
        self.lock().entities.get(&id).cloned()
    }

    async fn inventory(&self) -> Vec<ItemStack> {
        self.lock().inventory.clone()
    }

    async fn recipe(&self, item: &str) -> Option<Recipe> {
        self.lock().recipes.get(item).cloned()
    }

    async fn dig(&self, pos: BlockPos) -> Result<(), InteractionError> {
        self.before(Action::Dig).await?;
        let mut state = self.lock();
        let Some(name) = state.blocks.remove(&pos) else {
            return Err(InteractionError::failed("dig", format!("no block at {pos}")));
        };
        state.interactions.push(format!("dig {pos}"));
        add_items(&mut state.inventory, &name, 1);
        Ok(())
    }

    async fn craft(
        &self,
        recipe: &Recipe,
        crafts: u32,
        table: Option<BlockPos>,
    ) -> Result<(), InteractionError> {
        self.before(Action::Craft).await?;
        let mut state = self.lock();
        if recipe.requires_table {
            let has_table = table
                .and_then(|pos| state.blocks.get(&pos))
                .is_some_and(|name| name == "crafting_table");
            if !has_table {
                return Err(InteractionError::failed("craft", "no crafting table"));
            }
        }
        let missing = recipe.missing_ingredients(&state.inventory, crafts);
        if !missing.is_empty() {
            return Err(InteractionError::failed(
                "craft",
                format!("missing ingredients: {missing:?}"),
            ));
        }
        for ingredient in &recipe.ingredients {
            take_items(&mut state.inventory, &ingredient.name, ingredient.count * crafts);
        }
        add_items(&mut state.inventory, &recipe.item, recipe.yields * crafts);
        state
            .interactions
            .push(format!("craft {} x{crafts}", recipe.item));
        Ok(())
    }

    async fn mount(&self, entity: &EntityRef) -> Result<(), InteractionError> {
        self.before(Action::Mount).await?;
        let mut state = self.lock();
        if !state.entities.contains_key(&entity.id) {
            return Err(InteractionError::failed(
                "mount",
                format!("{} #{} is gone", entity.name, entity.id),
            ));
        }
        state.mounted = Some(entity.clone());
        state
            .interactions
            .push(format!("mount {} #{}", entity.name, entity.id));
        Ok(())
    }

    async fn open_container(
        &self,
        pos: BlockPos,
        kind: ContainerKind,
    ) -> Result<ContainerHandle, InteractionError> {
        self.before(Action::Open).await?;
        let mut state = self.lock();
        if state.open.is_some() {
            return Err(InteractionError::failed("open", "another container is open"));
        }
        let matches = state
            .containers
            .get(&pos)
            .is_some_and(|c| c.kind == Some(kind));
        if !matches {
            return Err(InteractionError::failed(
                "open",
                format!("no {} at {pos}", kind.block_name()),
            ));
        }
        let handle = ContainerHandle {
            id: state.next_handle,
            kind,
            pos,
        };
        state.next_handle += 1;
        state.open = Some(handle.clone());
        state.interactions.push(format!("open {handle}"));
        Ok(handle)
    }

    async fn close_container(&self, handle: &ContainerHandle) -> Result<(), InteractionError> {
        self.before(Action::Close).await?;
        let mut state = self.lock();
        if state.open.as_ref() != Some(handle) {
            return Err(InteractionError::failed("close", format!("{handle} is not open")));
        }
        state.open = None;
        state.interactions.push(format!("close {handle}"));
        Ok(())
    }

    async fn deposit(
        &self,
        handle: &ContainerHandle,
        item: &str,
        count: u32,
    ) -> Result<u32, InteractionError> {
        self.before(Action::Deposit).await?;
        self.check_open(handle, Action::Deposit)?;
        let mut state = self.lock();
        let moved = take_items(&mut state.inventory, item, count);
        if let Some(container) = state.containers.get_mut(&handle.pos) {
            add_items(&mut container.items, item, moved);
        }
        state.interactions.push(format!("deposit {item} x{moved}"));
        Ok(moved)
    }

    async fn withdraw(
        &self,
        handle: &ContainerHandle,
        item: &str,
        count: u32,
    ) -> Result<u32, InteractionError> {
        self.before(Action::Withdraw).await?;
        self.check_open(handle, Action::Withdraw)?;
        let mut state = self.lock();
        let moved = match state.containers.get_mut(&handle.pos) {
            Some(container) => take_items(&mut container.items, item, count),
            None => 0,
        };
        add_items(&mut state.inventory, item, moved);
        state.interactions.push(format!("withdraw {item} x{moved}"));
        Ok(moved)
    }

    async fn put_fuel(
        &self,
        handle: &ContainerHandle,
        item: &str,
        count: u32,
    ) -> Result<(), InteractionError> {
        self.before(Action::PutFuel).await?;
        self.check_open(handle, Action::PutFuel)?;
        let mut state = self.lock();
        let moved = take_items(&mut state.inventory, item, count);
        if moved == 0 {
            return Err(InteractionError::failed("put_fuel", format!("no {item} in inventory")));
        }
        if let Some(furnace) = state.containers.get_mut(&handle.pos) {
            furnace.fuel = Some(ItemStack::new(item, moved));
        }
        state.interactions.push(format!("fuel {item} x{moved}"));
        Ok(())
    }

    async fn put_input(
        &self,
        handle: &ContainerHandle,
        item: &str,
        count: u32,
    ) -> Result<(), InteractionError> {
        self.before(Action::PutInput).await?;
        self.check_open(handle, Action::PutInput)?;
        let mut state = self.lock();
        let moved = take_items(&mut state.inventory, item, count);
        if moved < count {
            add_items(&mut state.inventory, item, moved);
            return Err(InteractionError::failed(
                "put_input",
                format!("only {moved} of {count} {item} in inventory"),
            ));
        }
        if let Some(furnace) = state.containers.get_mut(&handle.pos) {
            furnace.input = Some(ItemStack::new(item, moved));
        }
        state.interactions.push(format!("input {item} x{moved}"));
        Ok(())
    }

    async fn take_output(
        &self,
        handle: &ContainerHandle,
    ) -> Result<Option<ItemStack>, InteractionError> {
        self.before(Action::TakeOutput).await?;
        self.check_open(handle, Action::TakeOutput)?;
        let mut state = self.lock();
        let smelted = state.containers.get_mut(&handle.pos).and_then(|furnace| {
            furnace.fuel.as_ref()?;
            furnace.input.take()
        });
        let output = smelted.and_then(|input| {
            state
                .smelting
                .get(&input.name)
                .map(|name| ItemStack::new(name.clone(), input.count))
        });
        if let Some(stack) = &output {
            add_items(&mut state.inventory, &stack.name, stack.count);
            state.interactions.push(format!("take {stack}"));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_blocks_orders_by_distance_and_limits() {
        let sim = Simulation::new();
        sim.add_block(BlockPos::new(10, 0, 0), "oak_log");
        sim.add_block(BlockPos::new(3, 0, 0), "oak_log");
        sim.add_block(BlockPos::new(5, 0, 0), "stone");
        sim.add_block(BlockPos::new(40, 0, 0), "oak_log");

        let found = sim
            .find_blocks("oak_log", Coordinate3::ORIGIN, 32.0, 8)
            .await
            .unwrap();
        let xs: Vec<i64> = found.iter().map(|b| b.pos.x).collect();
        assert_eq!(xs, vec![3, 10]);

        let limited = sim
            .find_blocks("oak_log", Coordinate3::ORIGIN, 64.0, 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn unknown_block_type_is_an_error() {
        let sim = Simulation::new();
        let err = sim
            .find_blocks("unobtainium", Coordinate3::ORIGIN, 32.0, 8)
            .await
            .unwrap_err();
        assert!(matches!(err, InteractionError::Unknown { .. }));
    }

    #[tokio::test]
    async fn dig_moves_block_into_inventory() {
        let sim = Simulation::new();
        let pos = BlockPos::new(1, 0, 0);
        sim.add_block(pos, "oak_log");
        sim.dig(pos).await.unwrap();
        assert!(sim.block_at(pos).await.is_none());
        assert_eq!(sim.inventory_count("oak_log"), 1);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let sim = Simulation::new();
        let pos = BlockPos::new(1, 0, 0);
        sim.add_block(pos, "oak_log");
        sim.fail_next(Action::Dig, "tool broke");
        assert!(sim.dig(pos).await.is_err());
        assert!(sim.dig(pos).await.is_ok());
    }

    #[tokio::test]
    async fn only_one_container_open_at_a_time() {
        let sim = Simulation::new();
        let a = BlockPos::new(1, 0, 0);
        let b = BlockPos::new(2, 0, 0);
        sim.add_container(a, ContainerKind::Chest);
        sim.add_container(b, ContainerKind::Chest);

        let handle = sim.open_container(a, ContainerKind::Chest).await.unwrap();
        assert!(sim.open_container(b, ContainerKind::Chest).await.is_err());
        sim.close_container(&handle).await.unwrap();
        assert!(sim.open_handle().is_none());
    }

    #[tokio::test]
    async fn furnace_smelts_on_take_output() {
        let sim = Simulation::new();
        let pos = BlockPos::new(1, 0, 0);
        sim.add_container(pos, ContainerKind::Furnace);
        sim.give("raw_iron", 3);
        sim.give("coal", 1);

        let handle = sim.open_container(pos, ContainerKind::Furnace).await.unwrap();
        sim.put_fuel(&handle, "coal", 1).await.unwrap();
        sim.put_input(&handle, "raw_iron", 3).await.unwrap();
        let output = sim.take_output(&handle).await.unwrap();

        assert_eq!(output, Some(ItemStack::new("iron_ingot", 3)));
        assert_eq!(sim.inventory_count("iron_ingot"), 3);
        assert_eq!(sim.inventory_count("raw_iron"), 0);
    }

    #[test]
    fn take_items_spans_stacks() {
        let mut stacks = vec![ItemStack::new("coal", 2), ItemStack::new("coal", 5)];
        assert_eq!(take_items(&mut stacks, "coal", 4), 4);
        assert_eq!(ItemStack::count_in(&stacks, "coal"), 3);
    }
}
