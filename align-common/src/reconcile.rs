//! Section reconciliation
//!
//! External alignment producers hand over per-tile transform records
//! grouped by section/z. Reconciliation fetches the canonical collection
//! for each z, filters it down to the tiles the producer touched, applies
//! the new transform under the configured update policy, and persists the
//! results only after every section has been updated cleanly in memory.
//! A run that fails partway leaves the target stack untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use crate::client::StackClient;
use crate::collection::ResolvedTileSpecCollection;
use crate::error::{Error, Result};
use crate::progress::ProcessTimer;
use crate::spec::TransformSpec;
use crate::validate::TileSpecValidator;
use crate::zkey::ZKey;

/// How a tile's existing transform stack is treated when the new alignment
/// transform arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Keep the existing stack and append the new transform at the end.
    #[default]
    Append,
    /// Discard the existing stack entirely, then append the new transform.
    ReplaceAll,
}

/// New transforms for the tiles of one section, keyed by tile id.
#[derive(Debug, Clone)]
pub struct SectionBatch {
    source: String,
    z: f64,
    tile_id_to_transform: BTreeMap<String, TransformSpec>,
}

impl SectionBatch {
    pub fn new(source: impl Into<String>, z: f64) -> SectionBatch {
        SectionBatch {
            source: source.into(),
            z,
            tile_id_to_transform: BTreeMap::new(),
        }
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tile_count(&self) -> usize {
        self.tile_id_to_transform.len()
    }

    pub fn tile_ids(&self) -> BTreeSet<String> {
        self.tile_id_to_transform.keys().cloned().collect()
    }

    pub fn transforms(&self) -> impl Iterator<Item = (&str, &TransformSpec)> {
        self.tile_id_to_transform
            .iter()
            .map(|(tile_id, spec)| (tile_id.as_str(), spec))
    }
}

/// Per-z batches accumulated over one input scan.
///
/// Batches are created lazily the first time a section's z is seen, and a
/// tile id may be recorded at most once per run: the scan fails fast on the
/// second reference rather than silently overwriting the first.
#[derive(Debug)]
pub struct BatchSet {
    source: String,
    batches: BTreeMap<ZKey, SectionBatch>,
    tile_id_to_line: HashMap<String, usize>,
}

impl BatchSet {
    pub fn new(source: impl Into<String>) -> BatchSet {
        BatchSet {
            source: source.into(),
            batches: BTreeMap::new(),
            tile_id_to_line: HashMap::new(),
        }
    }

    /// Record one (z, tile, transform) triple from line `line` of the
    /// input.
    pub fn add_record(
        &mut self,
        z: f64,
        tile_id: &str,
        line: usize,
        transform: TransformSpec,
    ) -> Result<()> {
        if let Some(&first_line) = self.tile_id_to_line.get(tile_id) {
            return Err(Error::DuplicateTile {
                tile_id: tile_id.to_string(),
                input: self.source.clone(),
                first_line,
                second_line: line,
            });
        }
        self.tile_id_to_line.insert(tile_id.to_string(), line);

        let source = &self.source;
        self.batches
            .entry(ZKey::new(z))
            .or_insert_with(|| SectionBatch::new(source.clone(), z))
            .tile_id_to_transform
            .insert(tile_id.to_string(), transform);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Batches in ascending z order.
    pub fn into_batches(self) -> Vec<SectionBatch> {
        self.batches.into_values().collect()
    }
}

/// Outcome counters for one batch update.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateStats {
    pub updated_tile_count: usize,
    pub removed_bad_tile_count: usize,
}

/// Apply one batch to its fetched collection in memory.
///
/// Pure with respect to external effects: the caller fetches the collection
/// and decides when (and whether) to persist the result.
pub fn apply_batch(
    tiles: &mut ResolvedTileSpecCollection,
    batch: &SectionBatch,
    policy: UpdatePolicy,
    validator: Option<&dyn TileSpecValidator>,
) -> Result<UpdateStats> {
    let context = format!("collection for z {} of {}", batch.z(), batch.source());

    if !tiles.has_tile_specs() {
        return Err(Error::EmptyCollection { context });
    }

    info!(
        "apply_batch: filtering {} tiles down to the {} tile ids of z {}",
        tiles.tile_count(),
        batch.tile_count(),
        batch.z()
    );

    tiles.retain_tile_ids(&batch.tile_ids());

    if !tiles.has_tile_specs() {
        return Err(Error::EmptyCollection {
            context: format!("after filtering out non-aligned tiles, {}", context),
        });
    }

    let mut timer = ProcessTimer::new();
    let mut updated_tile_count = 0;
    for (tile_id, transform) in batch.transforms() {
        if policy == UpdatePolicy::ReplaceAll {
            let tile_spec =
                tiles
                    .get_tile_spec_mut(tile_id)
                    .ok_or_else(|| Error::MissingTile {
                        tile_id: tile_id.to_string(),
                        context: context.clone(),
                    })?;
            tile_spec.clear_transforms();
        }

        tiles.add_transform_spec_to_tile(tile_id, transform.clone(), validator)?;
        updated_tile_count += 1;

        if timer.has_interval_passed() {
            info!(
                "apply_batch: updated transforms for {} out of {} tiles",
                updated_tile_count,
                batch.tile_count()
            );
        }
    }

    let removed_bad_tile_count = updated_tile_count - tiles.tile_count();
    debug!(
        "apply_batch: updated transforms for {} tiles, removed {} bad tiles, elapsedSeconds={}",
        updated_tile_count,
        removed_bad_tile_count,
        timer.elapsed_seconds()
    );

    Ok(UpdateStats {
        updated_tile_count,
        removed_bad_tile_count,
    })
}

/// Two-phase driver: update every batch's collection in memory, then save.
pub struct SectionReconciler<'a> {
    client: &'a dyn StackClient,
    source_stack: String,
    target_stack: String,
    policy: UpdatePolicy,
    validator: Option<&'a dyn TileSpecValidator>,
}

impl<'a> SectionReconciler<'a> {
    pub fn new(
        client: &'a dyn StackClient,
        source_stack: impl Into<String>,
        target_stack: impl Into<String>,
        policy: UpdatePolicy,
        validator: Option<&'a dyn TileSpecValidator>,
    ) -> SectionReconciler<'a> {
        SectionReconciler {
            client,
            source_stack: source_stack.into(),
            target_stack: target_stack.into(),
            policy,
            validator,
        }
    }

    /// Run the full reconciliation.
    ///
    /// Every batch must complete its in-memory update before any batch is
    /// persisted, so a failure mid-run leaves the target stack untouched.
    /// A save failure after that gate leaves earlier saves in place; that
    /// partial outcome is accepted at the storage layer (there is no
    /// cross-batch save transaction).
    pub async fn run(&self, batches: Vec<SectionBatch>) -> Result<UpdateStats> {
        let mut updated: Vec<(f64, ResolvedTileSpecCollection)> = Vec::with_capacity(batches.len());
        let mut totals = UpdateStats::default();

        for batch in &batches {
            info!(
                "run: updating tiles for z {} of stack {}",
                batch.z(),
                self.source_stack
            );
            let mut tiles = self
                .client
                .get_resolved_tiles(&self.source_stack, batch.z())
                .await?;
            let stats = apply_batch(&mut tiles, batch, self.policy, self.validator)?;
            totals.updated_tile_count += stats.updated_tile_count;
            totals.removed_bad_tile_count += stats.removed_bad_tile_count;
            updated.push((batch.z(), tiles));
        }

        // only save updated data if all updates completed successfully
        for (z, tiles) in &updated {
            info!(
                "run: saving {} tiles for z {} to stack {}",
                tiles.tile_count(),
                z,
                self.target_stack
            );
            self.client
                .save_resolved_tiles(tiles, &self.target_stack, Some(*z))
                .await?;
        }

        info!(
            "run: saved tiles and transforms for {} sections",
            updated.len()
        );
        Ok(totals)
    }
}
