//! Tile and transform specifications
//!
//! Wire types matching the render web service JSON: a transform spec is
//! either a leaf (class id + parameter string) or an ordered list of specs,
//! and a tile spec carries one transform list applied earliest-first when
//! mapping tile-local pixels into the global frame. The last list element
//! is conventionally the current alignment transform.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transform::TransformModel;

/// Tagged transform spec: a concrete model or an ordered grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransformSpec {
    #[serde(rename = "leaf")]
    Leaf {
        #[serde(rename = "className")]
        class_name: String,
        #[serde(rename = "dataString")]
        data_string: String,
    },
    #[serde(rename = "list")]
    List {
        #[serde(rename = "specList")]
        spec_list: Vec<TransformSpec>,
    },
}

impl TransformSpec {
    /// Leaf spec for a concrete model, serialized in canonical order.
    pub fn leaf(model: &TransformModel) -> TransformSpec {
        TransformSpec::Leaf {
            class_name: model.class_name().to_string(),
            data_string: model.to_data_string(),
        }
    }

    /// Empty list spec.
    pub fn empty_list() -> TransformSpec {
        TransformSpec::List { spec_list: Vec::new() }
    }

    /// Class id for logging: the leaf's class, or "list".
    pub fn class_name(&self) -> &str {
        match self {
            TransformSpec::Leaf { class_name, .. } => class_name,
            TransformSpec::List { .. } => "list",
        }
    }

    /// Parse the concrete model for a leaf spec.
    ///
    /// Errors for list specs and for leaves whose parameter string is not
    /// accepted by the named model.
    pub fn build_model(&self) -> Result<TransformModel> {
        match self {
            TransformSpec::Leaf {
                class_name,
                data_string,
            } => TransformModel::from_parameters(class_name, data_string),
            TransformSpec::List { .. } => Err(crate::error::Error::UnknownTransformClass {
                class_name: "list".to_string(),
            }),
        }
    }

    /// Append leaf specs in depth-first, left-to-right order.
    pub fn flatten_into(&self, flattened: &mut Vec<TransformSpec>) {
        match self {
            TransformSpec::Leaf { .. } => flattened.push(self.clone()),
            TransformSpec::List { spec_list } => {
                for spec in spec_list {
                    spec.flatten_into(flattened);
                }
            }
        }
    }
}

/// Derived world bounds for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "minX")]
    pub min_x: f64,
    #[serde(rename = "minY")]
    pub min_y: f64,
    #[serde(rename = "maxX")]
    pub max_x: f64,
    #[serde(rename = "maxY")]
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Metadata plus the ordered transform stack for one imaged tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSpec {
    pub tile_id: String,
    pub z: f64,
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub bounding_box: Option<BoundingBox>,
    pub transforms: TransformSpec,
}

impl TileSpec {
    pub fn new(tile_id: impl Into<String>, z: f64, width: f64, height: f64) -> TileSpec {
        TileSpec {
            tile_id: tile_id.into(),
            z,
            width,
            height,
            bounding_box: None,
            transforms: TransformSpec::empty_list(),
        }
    }

    /// Leaf specs of the transform stack in application order.
    pub fn flattened_transforms(&self) -> Vec<TransformSpec> {
        let mut flattened = Vec::new();
        self.transforms.flatten_into(&mut flattened);
        flattened
    }

    /// Number of leaf transforms in the stack.
    pub fn transform_count(&self) -> usize {
        self.flattened_transforms().len()
    }

    pub fn last_transform(&self) -> Option<TransformSpec> {
        self.flattened_transforms().pop()
    }

    /// Append a transform at the end of the stack (the new "current"
    /// alignment transform).
    pub fn append_transform(&mut self, spec: TransformSpec) {
        match &mut self.transforms {
            TransformSpec::List { spec_list } => spec_list.push(spec),
            leaf @ TransformSpec::Leaf { .. } => {
                let first = leaf.clone();
                self.transforms = TransformSpec::List {
                    spec_list: vec![first, spec],
                };
            }
        }
    }

    /// Drop the last transform of the stack, if any.
    pub fn remove_last_transform(&mut self) {
        if let TransformSpec::List { spec_list } = &mut self.transforms {
            spec_list.pop();
        } else {
            self.transforms = TransformSpec::empty_list();
        }
    }

    /// Discard the entire stack (replace-all update policy).
    pub fn clear_transforms(&mut self) {
        self.transforms = TransformSpec::empty_list();
    }

    /// Parse every leaf into its concrete model, in application order.
    pub fn build_models(&self) -> Result<Vec<TransformModel>> {
        self.flattened_transforms()
            .iter()
            .map(TransformSpec::build_model)
            .collect()
    }

    /// Map a tile-local point through the full transform stack.
    pub fn map_local_point(&self, point: [f64; 2]) -> Result<[f64; 2]> {
        let mut mapped = point;
        for model in self.build_models()? {
            mapped = model.apply(mapped);
        }
        Ok(mapped)
    }

    /// Recompute the world bounding box from the tile's corner points
    /// mapped through the final transform stack.
    pub fn derive_bounding_box(&mut self) -> Result<()> {
        let corners = [
            [0.0, 0.0],
            [self.width, 0.0],
            [0.0, self.height],
            [self.width, self.height],
        ];
        let mut min = [f64::INFINITY, f64::INFINITY];
        let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        for corner in corners {
            let world = self.map_local_point(corner)?;
            for axis in 0..2 {
                min[axis] = min[axis].min(world[axis]);
                max[axis] = max[axis].max(world[axis]);
            }
        }
        self.bounding_box = Some(BoundingBox {
            min_x: min[0],
            min_y: min[1],
            max_x: max[0],
            max_y: max[1],
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{AFFINE_2D, TRANSLATION_2D};

    fn leaf(class_name: &str, data_string: &str) -> TransformSpec {
        TransformSpec::Leaf {
            class_name: class_name.to_string(),
            data_string: data_string.to_string(),
        }
    }

    #[test]
    fn test_nested_list_flattens_depth_first() {
        let x = leaf(TRANSLATION_2D, "1 0");
        let y = leaf(TRANSLATION_2D, "2 0");
        let z = leaf(TRANSLATION_2D, "3 0");
        let nested = TransformSpec::List {
            spec_list: vec![
                TransformSpec::List {
                    spec_list: vec![x.clone(), y.clone()],
                },
                z.clone(),
            ],
        };

        let mut flattened = Vec::new();
        nested.flatten_into(&mut flattened);
        assert_eq!(flattened, vec![x, y, z]);
    }

    #[test]
    fn test_append_and_remove_last_transform() {
        let mut tile = TileSpec::new("t1", 1.0, 10.0, 10.0);
        tile.append_transform(leaf(TRANSLATION_2D, "1 1"));
        tile.append_transform(leaf(AFFINE_2D, "1 0 0 1 5 5"));
        assert_eq!(tile.transform_count(), 2);
        assert_eq!(tile.last_transform().unwrap().class_name(), AFFINE_2D);

        tile.remove_last_transform();
        assert_eq!(tile.transform_count(), 1);
        assert_eq!(tile.last_transform().unwrap().class_name(), TRANSLATION_2D);
    }

    #[test]
    fn test_derive_bounding_box_through_stack() {
        let mut tile = TileSpec::new("t1", 1.0, 100.0, 50.0);
        tile.append_transform(leaf(TRANSLATION_2D, "10 20"));
        tile.derive_bounding_box().expect("should derive");

        let bounding_box = tile.bounding_box.expect("box should be set");
        assert_eq!(bounding_box.min_x, 10.0);
        assert_eq!(bounding_box.min_y, 20.0);
        assert_eq!(bounding_box.max_x, 110.0);
        assert_eq!(bounding_box.max_y, 70.0);
        assert_eq!(bounding_box.width(), 100.0);
    }

    #[test]
    fn test_tile_spec_json_round_trip() {
        let mut tile = TileSpec::new("140731162138009113", 5100.0, 2560.0, 2160.0);
        tile.append_transform(leaf(AFFINE_2D, "1 0 0 1 100 200"));

        let json = serde_json::to_string(&tile).expect("should serialize");
        assert!(json.contains("\"tileId\":\"140731162138009113\""));
        assert!(json.contains("\"type\":\"list\""));
        assert!(json.contains("\"dataString\":\"1 0 0 1 100 200\""));

        let parsed: TileSpec = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(parsed.tile_id, tile.tile_id);
        assert_eq!(parsed.transforms, tile.transforms);
    }
}
