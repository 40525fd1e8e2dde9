//! MET file parsing
//!
//! MET files are whitespace-delimited text, one tile record per line, no
//! header. Two format versions exist and the caller says which one to
//! expect:
//!
//! v1 (affine), minimum 9 fields. The six affine parameters appear in a
//! different order than the model's native one and are permuted while
//! reading:
//!
//! ```text
//! section  tileId              ?  affineParameters (file order 1-6 maps to model order 1,4,2,5,3,6)
//! 5100     140731162138009113  1  0.992264  0.226714  27606.648556  -0.085614  0.712238  38075.232380  ...
//! ```
//!
//! v2 (second-order polynomial), minimum 15 fields, twelve parameters at
//! indices 3..=14 in natural order:
//!
//! ```text
//! section  tileId                     ?  polyParameters (12 values)                  ...
//! 11       150226163251007079.3461.0  1  144835.943662  -0.960118  ... 0.000009180979 ...
//! ```
//!
//! Lines with fewer fields than the format minimum are skipped with a
//! warning; this is the only recoverable input defect. A parameter string
//! the target model rejects fails the run.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use align_common::error::{Error, Result};
use align_common::spec::TransformSpec;
use align_common::transform::{TransformModel, AFFINE_2D, POLYNOMIAL_2D};

/// MET format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MetFormat {
    /// Affine records, six permuted parameters
    V1,
    /// Polynomial records, twelve parameters in natural order
    V2,
}

impl MetFormat {
    /// Source field indices of the model parameters, in model order.
    fn parameter_indexes(self) -> &'static [usize] {
        match self {
            MetFormat::V1 => &[3, 6, 4, 7, 5, 8],
            MetFormat::V2 => &[3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14],
        }
    }

    /// Minimum number of whitespace-delimited fields for a valid line.
    fn min_field_count(self) -> usize {
        match self {
            MetFormat::V1 => 9,
            MetFormat::V2 => 15,
        }
    }

    /// Wire class id of the target transform model.
    pub fn model_class(self) -> &'static str {
        match self {
            MetFormat::V1 => AFFINE_2D,
            MetFormat::V2 => POLYNOMIAL_2D,
        }
    }
}

/// One decoded MET line.
#[derive(Debug, Clone)]
pub struct MetRecord {
    pub section: String,
    pub tile_id: String,
    pub line: usize,
    pub transform: TransformSpec,
}

/// Decode every valid record of a MET file.
///
/// Short lines are skipped with a warning. A parameter string the target
/// model cannot parse is a fatal [`Error::MalformedTransform`] naming the
/// line, the file, and the offending string.
pub fn parse_met_file(path: &Path, format: MetFormat) -> Result<Vec<MetRecord>> {
    let path_display = path.display().to_string();
    info!(
        "parse_met_file: entry, format={:?}, modelClass={}, path={}",
        format,
        format.model_class(),
        path_display
    );

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() < format.min_field_count() {
            warn!(
                "parse_met_file: skipping line {} because it only contains {} fields",
                line_number,
                fields.len()
            );
            continue;
        }

        let data_string = format
            .parameter_indexes()
            .iter()
            .map(|&i| fields[i])
            .collect::<Vec<_>>()
            .join(" ");

        if let Err(e) = TransformModel::from_parameters(format.model_class(), &data_string) {
            return Err(Error::MalformedTransform {
                line: line_number,
                path: path_display,
                data: data_string,
                reason: e.to_string(),
            });
        }

        records.push(MetRecord {
            section: fields[0].to_string(),
            tile_id: fields[1].to_string(),
            line: line_number,
            transform: TransformSpec::Leaf {
                class_name: format.model_class().to_string(),
                data_string,
            },
        });
    }

    info!(
        "parse_met_file: exit, loaded {} records from {}",
        records.len(),
        path_display
    );
    Ok(records)
}
