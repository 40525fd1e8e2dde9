//! Patch export pipeline
//!
//! Walks the project layers in the configured z range, collapses each
//! visible patch's transform tree into a single alignment leaf, applies it
//! to the basis stack's tile specs, and saves the touched tiles into the
//! target stack. All layers are processed in memory before the first save.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{info, warn};

use align_common::client::{StackClient, StackState};
use align_common::collection::ResolvedTileSpecCollection;
use align_common::error::{Error, Result};
use align_common::progress::ProcessTimer;
use align_common::zkey::ZKey;

use crate::flatten::{concatenate_stage_and_alignment, flatten_transforms};
use crate::project::{section_id_from_tile_id, ProjectDump};

/// Parameters for one export run, validated before the pipeline starts.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Basis stack supplying the canonical tile specs
    pub basis_stack: String,
    /// Target stack receiving the exported tiles
    pub target_stack: String,
    /// First project z to export
    pub min_z: f64,
    /// Last project z to export
    pub max_z: f64,
    /// Project z to target z overrides; unmapped values pass through
    pub z_map: BTreeMap<ZKey, f64>,
    /// Mark the target stack COMPLETE after the last save
    pub complete_after_export: bool,
}

impl ExportConfig {
    fn target_z_for(&self, project_z: f64) -> f64 {
        self.z_map
            .get(&ZKey::new(project_z))
            .copied()
            .unwrap_or(project_z)
    }
}

/// Parse a `sourceZ=targetZ,sourceZ=targetZ,...` override string.
///
/// `None` or an empty string means the identity mapping.
pub fn parse_z_map(value: Option<&str>) -> Result<BTreeMap<ZKey, f64>> {
    let mut z_map = BTreeMap::new();
    let value = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(z_map),
    };

    fn invalid(value: &str) -> Error {
        Error::InvalidZMap {
            value: value.to_string(),
        }
    }

    for pair in value.split(',') {
        let (source, target) = pair.split_once('=').ok_or_else(|| invalid(value))?;
        let source: f64 = source.trim().parse().map_err(|_| invalid(value))?;
        let target: f64 = target.trim().parse().map_err(|_| invalid(value))?;
        z_map.insert(ZKey::new(source), target);
    }
    Ok(z_map)
}

/// Counters for one export run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportSummary {
    pub layer_count: usize,
    pub tile_count: usize,
}

struct SectionUpdate {
    tiles: ResolvedTileSpecCollection,
    touched_tile_ids: BTreeSet<String>,
}

/// Export every visible patch of `project` within the configured z range.
pub async fn export_patches(
    project: &ProjectDump,
    config: &ExportConfig,
    basis_client: &dyn StackClient,
    target_client: &dyn StackClient,
) -> Result<ExportSummary> {
    let basis_meta_data = basis_client
        .get_stack_meta_data(&config.basis_stack)
        .await?;
    target_client
        .setup_derived_stack(&basis_meta_data, &config.target_stack)
        .await?;

    let section_to_z: HashMap<String, f64> = basis_client
        .get_stack_section_data(&config.basis_stack, None, None)
        .await?
        .into_iter()
        .map(|section| (section.section_id, section.z))
        .collect();

    let min_key = ZKey::new(config.min_z);
    let max_key = ZKey::new(config.max_z);
    let mut updates: BTreeMap<ZKey, SectionUpdate> = BTreeMap::new();
    let mut summary = ExportSummary::default();
    let mut timer = ProcessTimer::new();

    for layer in &project.layers {
        let layer_key = ZKey::new(layer.z);
        if layer_key < min_key || layer_key > max_key {
            continue;
        }

        let patches: Vec<_> = project_layer_patches(layer);
        if patches.is_empty() {
            warn!("export_patches: layer z {} has no visible patches", layer.z);
            continue;
        }

        let section_id = section_id_from_tile_id(&patches[0].tile_id)?;
        let basis_z = *section_to_z
            .get(&section_id)
            .ok_or_else(|| Error::UnknownSection {
                section_id: section_id.clone(),
            })?;

        let update = match updates.entry(ZKey::new(basis_z)) {
            std::collections::btree_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::btree_map::Entry::Vacant(entry) => {
                let tiles = basis_client
                    .get_resolved_tiles(&config.basis_stack, basis_z)
                    .await?;
                entry.insert(SectionUpdate {
                    tiles,
                    touched_tile_ids: BTreeSet::new(),
                })
            }
        };

        let mut updated_tile_count = 0;
        for patch in &patches {
            let tile_spec = update
                .tiles
                .get_tile_spec_mut(&patch.tile_id)
                .ok_or_else(|| Error::MissingTile {
                    tile_id: patch.tile_id.clone(),
                    context: format!(
                        "basis collection for z {} of stack {}",
                        basis_z, config.basis_stack
                    ),
                })?;

            // the basis tile's prior alignment transform is superseded by
            // the concatenated one
            tile_spec.remove_last_transform();
            update.touched_tile_ids.insert(patch.tile_id.clone());

            if !config.z_map.is_empty() {
                tile_spec.z = config.target_z_for(layer.z);
            }

            let flattened = flatten_transforms(&patch.transforms);
            let alignment = concatenate_stage_and_alignment(&patch.tile_id, &flattened)?;
            tile_spec.append_transform(alignment);

            updated_tile_count += 1;
            if timer.has_interval_passed() {
                info!(
                    "export_patches: updated {} out of {} tile specs for section {}",
                    updated_tile_count,
                    patches.len(),
                    section_id
                );
            }
        }

        info!(
            "export_patches: updated {} tile specs for section {}",
            updated_tile_count, section_id
        );
        summary.layer_count += 1;
        summary.tile_count += updated_tile_count;
    }

    // every layer has been applied in memory; now persist per basis z
    for (basis_key, mut update) in updates {
        update.tiles.retain_tile_ids(&update.touched_tile_ids);

        info!(
            "export_patches: updating bounding boxes for z {}",
            basis_key
        );
        update.tiles.recalculate_bounding_boxes()?;

        // tiles may have been remapped to other z values, so the save
        // carries no collection-level z
        target_client
            .save_resolved_tiles(&update.tiles, &config.target_stack, None)
            .await?;

        info!(
            "export_patches: exported {} tiles for z {}",
            update.touched_tile_ids.len(),
            basis_key
        );
    }

    if config.complete_after_export {
        target_client
            .set_stack_state(&config.target_stack, StackState::Complete)
            .await?;
    }

    info!(
        "export_patches: done, exported {} tiles from {} layers",
        summary.tile_count, summary.layer_count
    );
    Ok(summary)
}

fn project_layer_patches(layer: &crate::project::LayerDump) -> Vec<&crate::project::PatchDump> {
    layer.patches.iter().filter(|patch| patch.visible).collect()
}
