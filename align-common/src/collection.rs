//! Resolved tile spec collections
//!
//! The set of tile specs for one z-layer as fetched from (and stored back
//! to) the stack service. Iteration order is sorted by tile id so that
//! progress logging and update order are deterministic run to run.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::spec::{TileSpec, TransformSpec};
use crate::validate::TileSpecValidator;

/// Tile specs for one z-layer, keyed by tile id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedTileSpecCollection {
    #[serde(rename = "tileIdToSpecMap")]
    tile_id_to_spec_map: BTreeMap<String, TileSpec>,
}

impl ResolvedTileSpecCollection {
    pub fn from_tile_specs(tile_specs: Vec<TileSpec>) -> ResolvedTileSpecCollection {
        ResolvedTileSpecCollection {
            tile_id_to_spec_map: tile_specs
                .into_iter()
                .map(|tile_spec| (tile_spec.tile_id.clone(), tile_spec))
                .collect(),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tile_id_to_spec_map.len()
    }

    pub fn has_tile_specs(&self) -> bool {
        !self.tile_id_to_spec_map.is_empty()
    }

    pub fn get_tile_spec(&self, tile_id: &str) -> Option<&TileSpec> {
        self.tile_id_to_spec_map.get(tile_id)
    }

    pub fn get_tile_spec_mut(&mut self, tile_id: &str) -> Option<&mut TileSpec> {
        self.tile_id_to_spec_map.get_mut(tile_id)
    }

    /// Tile ids in sorted order.
    pub fn tile_ids(&self) -> impl Iterator<Item = &str> {
        self.tile_id_to_spec_map.keys().map(String::as_str)
    }

    pub fn tile_specs(&self) -> impl Iterator<Item = &TileSpec> {
        self.tile_id_to_spec_map.values()
    }

    /// Keep only tiles whose ids are in `tile_ids`.
    ///
    /// Callers decide whether an empty result is an error; the import path
    /// treats it as a z-value/tile-id mismatch while the export
    /// finalization tolerates it.
    pub fn retain_tile_ids(&mut self, tile_ids: &BTreeSet<String>) {
        self.tile_id_to_spec_map
            .retain(|tile_id, _| tile_ids.contains(tile_id));
    }

    /// Append `transform_spec` to the tile's stack, then re-derive its
    /// bounding box and re-check it against `validator`.
    ///
    /// A tile failing the re-check is silently removed from the collection;
    /// the caller observes this only through the before/after tile count
    /// (the "removed bad tiles" diagnostic).
    pub fn add_transform_spec_to_tile(
        &mut self,
        tile_id: &str,
        transform_spec: TransformSpec,
        validator: Option<&dyn TileSpecValidator>,
    ) -> Result<()> {
        let tile_count = self.tile_id_to_spec_map.len();
        let tile_spec = self
            .tile_id_to_spec_map
            .get_mut(tile_id)
            .ok_or_else(|| Error::MissingTile {
                tile_id: tile_id.to_string(),
                context: format!("collection with {} tiles", tile_count),
            })?;

        tile_spec.append_transform(transform_spec);
        tile_spec.derive_bounding_box()?;

        if let Some(validator) = validator {
            if let Err(e) = validator.validate(tile_spec) {
                debug!("removing bad tile {}: {}", tile_id, e);
                self.tile_id_to_spec_map.remove(tile_id);
            }
        }

        Ok(())
    }

    /// Re-derive every tile's bounding box from its final transform stack.
    pub fn recalculate_bounding_boxes(&mut self) -> Result<()> {
        for tile_spec in self.tile_id_to_spec_map.values_mut() {
            tile_spec.derive_bounding_box()?;
        }
        Ok(())
    }
}
