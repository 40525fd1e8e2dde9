//! In-memory stack client for tests
//!
//! Backs the full [`StackClient`](crate::client::StackClient) contract with
//! plain maps so the import/export pipelines can be exercised end to end
//! without a live service. Saves and state transitions are recorded for
//! assertion.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{SectionData, StackClient, StackMetaData, StackState};
use crate::collection::ResolvedTileSpecCollection;
use crate::error::{Error, Result};
use crate::spec::TileSpec;
use crate::zkey::ZKey;

/// One recorded `save_resolved_tiles` call.
#[derive(Debug, Clone)]
pub struct SavedTiles {
    pub stack: String,
    pub z: Option<f64>,
    pub tiles: ResolvedTileSpecCollection,
}

#[derive(Debug, Default)]
struct Recorded {
    saves: Vec<SavedTiles>,
    states: Vec<(String, StackState)>,
    derived_stacks: Vec<String>,
}

/// Map-backed stack client.
#[derive(Debug, Default)]
pub struct InMemoryStackClient {
    collections: BTreeMap<(String, ZKey), ResolvedTileSpecCollection>,
    section_data: BTreeMap<String, Vec<SectionData>>,
    meta_data: BTreeMap<String, StackMetaData>,
    recorded: Mutex<Recorded>,
}

impl InMemoryStackClient {
    pub fn new() -> InMemoryStackClient {
        InMemoryStackClient::default()
    }

    /// Seed the collection served for (stack, z).
    pub fn put_resolved_tiles(
        &mut self,
        stack: &str,
        z: f64,
        tiles: ResolvedTileSpecCollection,
    ) {
        self.collections
            .insert((stack.to_string(), ZKey::new(z)), tiles);
    }

    /// Seed the section data served for a stack.
    pub fn put_section_data(&mut self, stack: &str, section_data: Vec<SectionData>) {
        self.section_data.insert(stack.to_string(), section_data);
    }

    /// Seed the metadata served for a stack.
    pub fn put_meta_data(&mut self, stack: &str, meta_data: StackMetaData) {
        self.meta_data.insert(stack.to_string(), meta_data);
    }

    /// Collections saved so far, in call order.
    pub fn saved_tiles(&self) -> Vec<SavedTiles> {
        self.recorded.lock().expect("lock poisoned").saves.clone()
    }

    /// Stack state transitions recorded so far.
    pub fn state_transitions(&self) -> Vec<(String, StackState)> {
        self.recorded.lock().expect("lock poisoned").states.clone()
    }

    /// Stacks created via `setup_derived_stack`.
    pub fn derived_stacks(&self) -> Vec<String> {
        self.recorded
            .lock()
            .expect("lock poisoned")
            .derived_stacks
            .clone()
    }
}

#[async_trait]
impl StackClient for InMemoryStackClient {
    async fn get_tile(&self, stack: &str, tile_id: &str) -> Result<TileSpec> {
        self.collections
            .iter()
            .filter(|((s, _), _)| s == stack)
            .find_map(|(_, tiles)| tiles.get_tile_spec(tile_id))
            .cloned()
            .ok_or_else(|| Error::MissingTile {
                tile_id: tile_id.to_string(),
                context: format!("stack {}", stack),
            })
    }

    async fn get_resolved_tiles(
        &self,
        stack: &str,
        z: f64,
    ) -> Result<ResolvedTileSpecCollection> {
        self.collections
            .get(&(stack.to_string(), ZKey::new(z)))
            .cloned()
            .ok_or_else(|| Error::EmptyCollection {
                context: format!("stack {} z {}", stack, z),
            })
    }

    async fn save_resolved_tiles(
        &self,
        tiles: &ResolvedTileSpecCollection,
        stack: &str,
        z: Option<f64>,
    ) -> Result<()> {
        self.recorded
            .lock()
            .expect("lock poisoned")
            .saves
            .push(SavedTiles {
                stack: stack.to_string(),
                z,
                tiles: tiles.clone(),
            });
        Ok(())
    }

    async fn get_stack_section_data(
        &self,
        stack: &str,
        min_z: Option<f64>,
        max_z: Option<f64>,
    ) -> Result<Vec<SectionData>> {
        let mut section_data = self
            .section_data
            .get(stack)
            .cloned()
            .unwrap_or_default();
        section_data.retain(|section| {
            min_z.map_or(true, |min| section.z >= min)
                && max_z.map_or(true, |max| section.z <= max)
        });
        Ok(section_data)
    }

    async fn get_stack_meta_data(&self, stack: &str) -> Result<StackMetaData> {
        self.meta_data
            .get(stack)
            .cloned()
            .ok_or_else(|| Error::EmptyCollection {
                context: format!("metadata for stack {}", stack),
            })
    }

    async fn setup_derived_stack(
        &self,
        _basis_meta_data: &StackMetaData,
        new_stack: &str,
    ) -> Result<()> {
        self.recorded
            .lock()
            .expect("lock poisoned")
            .derived_stacks
            .push(new_stack.to_string());
        Ok(())
    }

    async fn set_stack_state(&self, stack: &str, state: StackState) -> Result<()> {
        self.recorded
            .lock()
            .expect("lock poisoned")
            .states
            .push((stack.to_string(), state));
        Ok(())
    }
}
