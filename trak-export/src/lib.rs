//! trak-export - TrakEM2 patch export client
//!
//! Exports per-patch alignment data from a TrakEM2-style project dump into
//! a render stack: flattens each patch's transform tree, collapses the
//! stage and alignment transforms into one affine leaf, and writes the
//! touched tiles of each basis section into the target stack.

pub mod export;
pub mod flatten;
pub mod project;

pub use export::{export_patches, parse_z_map, ExportConfig, ExportSummary};
