//! Project dump model
//!
//! The export client works from a JSON dump of a TrakEM2-style project:
//! layers in z order, each carrying the visible patches with their full
//! per-patch transform trees. Patches marked not visible are typically the
//! ones flagged as problems upstream and are skipped.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use align_common::error::{Error, Result};
use align_common::spec::TransformSpec;

/// One patch: a tile id plus its full (possibly nested) transform tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchDump {
    pub tile_id: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub transforms: TransformSpec,
}

fn default_visible() -> bool {
    true
}

/// One project layer at a TrakEM2 z value.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDump {
    pub z: f64,
    pub patches: Vec<PatchDump>,
}

/// Full project dump.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDump {
    pub layers: Vec<LayerDump>,
}

impl ProjectDump {
    pub fn load(path: &Path) -> Result<ProjectDump> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Extract the section id from a tile id.
///
/// Tile ids end in `<section>.<subsection>`, e.g.
/// `150501185511004011.2429.3` carries section id `2429.3`.
pub fn section_id_from_tile_id(tile_id: &str) -> Result<String> {
    let mut parts = tile_id.rsplitn(3, '.');
    let subsection = parts.next();
    let section = parts.next();
    let rest = parts.next();

    match (rest, section, subsection) {
        (Some(_), Some(section), Some(subsection))
            if !section.is_empty()
                && !subsection.is_empty()
                && section.bytes().all(|b| b.is_ascii_digit())
                && subsection.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Ok(format!("{}.{}", section, subsection))
        }
        _ => Err(Error::InvalidTileId {
            tile_id: tile_id.to_string(),
        }),
    }
}
