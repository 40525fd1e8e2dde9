//! met-import - MET alignment data import client
//!
//! Reads a MET transform export, groups its records by canonical z, and
//! reconciles them against the acquire stack's tile collections, saving the
//! corrected collections into the target (align) stack. Nothing is saved
//! until every section has been updated cleanly in memory.

pub mod parser;

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::info;

use align_common::client::StackClient;
use align_common::error::{Error, Result};
use align_common::reconcile::{BatchSet, SectionReconciler, UpdatePolicy, UpdateStats};
use align_common::validate::TileSpecValidator;

use parser::{parse_met_file, MetFormat};

/// Parameters for one import run, validated before the pipeline starts.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Source (acquire) stack holding the base tile specs
    pub acquire_stack: String,
    /// Target (align, montage, ...) stack receiving the imported transforms
    pub align_stack: String,
    /// MET file for the run
    pub met_file: PathBuf,
    pub format: MetFormat,
    pub policy: UpdatePolicy,
}

/// Run a full MET import against `client`.
pub async fn run(
    config: &ImportConfig,
    client: &dyn StackClient,
    validator: Option<&dyn TileSpecValidator>,
) -> Result<UpdateStats> {
    let source = config.met_file.display().to_string();
    let records = parse_met_file(&config.met_file, config.format)?;

    if records.is_empty() {
        return Err(Error::EmptyInput { input: source });
    }

    // Resolve each section to its z lazily, from the tile's current record
    // in the acquire stack rather than from anything in the file.
    let mut section_to_z: HashMap<String, f64> = HashMap::new();
    let mut batches = BatchSet::new(source.as_str());

    for record in records {
        let z = match section_to_z.get(&record.section) {
            Some(&z) => z,
            None => {
                let tile_spec = client
                    .get_tile(&config.acquire_stack, &record.tile_id)
                    .await?;
                info!(
                    "run: mapped section {} to z value {}",
                    record.section, tile_spec.z
                );
                section_to_z.insert(record.section.clone(), tile_spec.z);
                tile_spec.z
            }
        };
        batches.add_record(z, &record.tile_id, record.line, record.transform)?;
    }

    info!(
        "run: reconciling {} sections from {}",
        batches.batch_count(),
        source
    );

    let reconciler = SectionReconciler::new(
        client,
        config.acquire_stack.as_str(),
        config.align_stack.as_str(),
        config.policy,
        validator,
    );
    reconciler.run(batches.into_batches()).await
}
