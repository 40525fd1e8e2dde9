//! Tile spec validation policies

use crate::error::{Error, Result};
use crate::spec::TileSpec;

/// Validation policy applied to tile specs before and during reconciliation.
pub trait TileSpecValidator: Send + Sync {
    fn validate(&self, tile_spec: &TileSpec) -> Result<()>;
}

/// Bounds validator for TEM-style stacks: the derived box must exist, sit
/// within the coordinate range, and have plausible dimensions.
#[derive(Debug, Clone, Copy)]
pub struct BoundsTileSpecValidator {
    pub min_coordinate: f64,
    pub max_coordinate: f64,
    pub min_size: f64,
    pub max_size: f64,
}

impl Default for BoundsTileSpecValidator {
    fn default() -> Self {
        BoundsTileSpecValidator {
            min_coordinate: -500_000.0,
            max_coordinate: 500_000.0,
            min_size: 1.0,
            max_size: 100_000.0,
        }
    }
}

impl TileSpecValidator for BoundsTileSpecValidator {
    fn validate(&self, tile_spec: &TileSpec) -> Result<()> {
        let invalid = |reason: String| Error::Validation {
            tile_id: tile_spec.tile_id.clone(),
            reason,
        };

        let bounding_box = tile_spec
            .bounding_box
            .ok_or_else(|| invalid("bounding box has not been derived".to_string()))?;

        for (name, value) in [
            ("minX", bounding_box.min_x),
            ("minY", bounding_box.min_y),
            ("maxX", bounding_box.max_x),
            ("maxY", bounding_box.max_y),
        ] {
            if !value.is_finite()
                || value < self.min_coordinate
                || value > self.max_coordinate
            {
                return Err(invalid(format!(
                    "{} value {} is outside coordinate range [{}, {}]",
                    name, value, self.min_coordinate, self.max_coordinate
                )));
            }
        }

        for (name, value) in [
            ("width", bounding_box.width()),
            ("height", bounding_box.height()),
        ] {
            if value < self.min_size || value > self.max_size {
                return Err(invalid(format!(
                    "{} value {} is outside size range [{}, {}]",
                    name, value, self.min_size, self.max_size
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::TransformSpec;
    use crate::transform::TRANSLATION_2D;

    fn tile_with_offset(tx: f64, ty: f64) -> TileSpec {
        let mut tile = TileSpec::new("t1", 1.0, 100.0, 100.0);
        tile.append_transform(TransformSpec::Leaf {
            class_name: TRANSLATION_2D.to_string(),
            data_string: format!("{} {}", tx, ty),
        });
        tile.derive_bounding_box().expect("should derive");
        tile
    }

    #[test]
    fn test_valid_tile_passes() {
        let validator = BoundsTileSpecValidator::default();
        assert!(validator.validate(&tile_with_offset(100.0, 200.0)).is_ok());
    }

    #[test]
    fn test_out_of_range_tile_fails() {
        let validator = BoundsTileSpecValidator::default();
        let result = validator.validate(&tile_with_offset(9_000_000.0, 0.0));
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_missing_bounding_box_fails() {
        let validator = BoundsTileSpecValidator::default();
        let tile = TileSpec::new("t1", 1.0, 100.0, 100.0);
        assert!(validator.validate(&tile).is_err());
    }
}
