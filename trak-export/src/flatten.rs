//! Transform tree flattening and stage/alignment concatenation
//!
//! A patch's full transform is a tree: list nodes group other transforms,
//! leaves are concrete models. Flattening yields the leaves depth-first,
//! left to right, which is also their application order.
//!
//! The usual chain is lens correction transforms, then a stage translation,
//! then an alignment affine. Downstream tools expect exactly one "last"
//! transform, so the stage translation is concatenated onto the alignment
//! affine, producing a single affine leaf that preserves the point behavior
//! of both. Any other tail shape fails the run: consumers assume this
//! shape, so violating it is a hard precondition, not a recoverable case.

use align_common::error::{Error, Result};
use align_common::spec::TransformSpec;
use align_common::transform::TransformModel;

/// Leaf specs of `spec` in depth-first, left-to-right order.
pub fn flatten_transforms(spec: &TransformSpec) -> Vec<TransformSpec> {
    let mut flattened = Vec::new();
    spec.flatten_into(&mut flattened);
    flattened
}

/// Collapse the `[.., stage translation, alignment affine]` tail of a
/// flattened chain into a single affine leaf.
///
/// The stage transform is applied before the alignment transform in the
/// chain, so the combined leaf applies the stage translation first.
pub fn concatenate_stage_and_alignment(
    tile_id: &str,
    flattened: &[TransformSpec],
) -> Result<TransformSpec> {
    if flattened.len() < 2 {
        return Err(Error::UnexpectedTransformShape {
            tile_id: tile_id.to_string(),
            role: "stage",
            class_name: "<none>".to_string(),
        });
    }

    let stage_spec = &flattened[flattened.len() - 2];
    let alignment_spec = &flattened[flattened.len() - 1];

    let stage = match stage_spec.build_model() {
        Ok(model @ TransformModel::Translation(_)) => model,
        _ => {
            return Err(Error::UnexpectedTransformShape {
                tile_id: tile_id.to_string(),
                role: "stage",
                class_name: stage_spec.class_name().to_string(),
            })
        }
    };

    let alignment = match alignment_spec.build_model() {
        Ok(model @ TransformModel::Affine(_)) => model,
        _ => {
            return Err(Error::UnexpectedTransformShape {
                tile_id: tile_id.to_string(),
                role: "alignment",
                class_name: alignment_spec.class_name().to_string(),
            })
        }
    };

    let combined = alignment.concatenate(&stage)?;
    Ok(TransformSpec::leaf(&combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use align_common::transform::{AFFINE_2D, TRANSLATION_2D};

    fn leaf(class_name: &str, data_string: &str) -> TransformSpec {
        TransformSpec::Leaf {
            class_name: class_name.to_string(),
            data_string: data_string.to_string(),
        }
    }

    #[test]
    fn test_flatten_is_depth_first_left_to_right() {
        let x = leaf(TRANSLATION_2D, "1 0");
        let y = leaf(TRANSLATION_2D, "2 0");
        let z = leaf(TRANSLATION_2D, "3 0");
        let tree = TransformSpec::List {
            spec_list: vec![
                TransformSpec::List {
                    spec_list: vec![x.clone(), y.clone()],
                },
                z.clone(),
            ],
        };

        assert_eq!(flatten_transforms(&tree), vec![x, y, z]);
    }

    #[test]
    fn test_concatenation_preserves_point_behavior() {
        let stage = leaf(TRANSLATION_2D, "7500.0 20150.0");
        let alignment = leaf(AFFINE_2D, "0.97764 0.0025473 0.0092028 1.0106125 45979.1 6001.5");
        let flattened = vec![stage.clone(), alignment.clone()];

        let combined_spec =
            concatenate_stage_and_alignment("t1", &flattened).expect("should concatenate");
        let combined = combined_spec.build_model().expect("leaf should parse");

        let stage_model = stage.build_model().unwrap();
        let alignment_model = alignment.build_model().unwrap();
        for point in [[0.0, 0.0], [2560.0, 0.0], [1280.0, 2160.0]] {
            let chained = alignment_model.apply(stage_model.apply(point));
            let collapsed = combined.apply(point);
            assert!(
                (chained[0] - collapsed[0]).abs() < 1e-6
                    && (chained[1] - collapsed[1]).abs() < 1e-6,
                "point {:?}: chained {:?} vs collapsed {:?}",
                point,
                chained,
                collapsed
            );
        }
    }

    #[test]
    fn test_wrong_stage_class_names_the_class() {
        let flattened = vec![
            leaf(AFFINE_2D, "1 0 0 1 0 0"),
            leaf(AFFINE_2D, "1 0 0 1 0 0"),
        ];
        match concatenate_stage_and_alignment("t1", &flattened) {
            Err(Error::UnexpectedTransformShape {
                role, class_name, ..
            }) => {
                assert_eq!(role, "stage");
                assert_eq!(class_name, AFFINE_2D);
            }
            other => panic!("expected UnexpectedTransformShape, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_alignment_class_names_the_class() {
        let flattened = vec![
            leaf(TRANSLATION_2D, "1 1"),
            leaf(TRANSLATION_2D, "2 2"),
        ];
        match concatenate_stage_and_alignment("t1", &flattened) {
            Err(Error::UnexpectedTransformShape {
                tile_id,
                role,
                class_name,
            }) => {
                assert_eq!(tile_id, "t1");
                assert_eq!(role, "alignment");
                assert_eq!(class_name, TRANSLATION_2D);
            }
            other => panic!("expected UnexpectedTransformShape, got {:?}", other),
        }
    }

    #[test]
    fn test_chain_too_short_is_rejected() {
        let flattened = vec![leaf(AFFINE_2D, "1 0 0 1 0 0")];
        assert!(concatenate_stage_and_alignment("t1", &flattened).is_err());
    }
}
