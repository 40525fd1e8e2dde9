//! End-to-end export tests against the in-memory stack client

use align_common::client::{SectionData, StackMetaData, StackState};
use align_common::collection::ResolvedTileSpecCollection;
use align_common::spec::{TileSpec, TransformSpec};
use align_common::testing::InMemoryStackClient;
use align_common::transform::{AFFINE_2D, TRANSLATION_2D};
use trak_export::project::{LayerDump, PatchDump, ProjectDump};
use trak_export::{export_patches, parse_z_map, ExportConfig};

const BASIS_STACK: &str = "v12_acquire_merged";
const TARGET_STACK: &str = "trakem2_montage";

const TILE_A: &str = "150501185511004011.2429.0";
const TILE_B: &str = "150501185511004012.2429.0";
const TILE_UNTOUCHED: &str = "150501185511004013.2429.0";

fn leaf(class_name: &str, data_string: &str) -> TransformSpec {
    TransformSpec::Leaf {
        class_name: class_name.to_string(),
        data_string: data_string.to_string(),
    }
}

fn basis_tile(tile_id: &str, z: f64) -> TileSpec {
    let mut tile = TileSpec::new(tile_id, z, 2560.0, 2160.0);
    tile.append_transform(leaf(TRANSLATION_2D, "10 10"));
    tile.append_transform(leaf(AFFINE_2D, "1 0 0 1 999 999"));
    tile
}

fn patch(tile_id: &str) -> PatchDump {
    PatchDump {
        tile_id: tile_id.to_string(),
        visible: true,
        transforms: TransformSpec::List {
            spec_list: vec![
                leaf(AFFINE_2D, "0.98 -0.01 -0.007 1.009 130.0 30.0"),
                leaf(TRANSLATION_2D, "7500.0 20150.0"),
                leaf(AFFINE_2D, "0.97764 0.00254 0.0092 1.01061 45979.1 6001.5"),
            ],
        },
    }
}

fn basis_client() -> InMemoryStackClient {
    let mut client = InMemoryStackClient::new();
    client.put_meta_data(
        BASIS_STACK,
        StackMetaData {
            stack_id: None,
            state: StackState::Complete,
            current_version: None,
        },
    );
    client.put_section_data(
        BASIS_STACK,
        vec![SectionData {
            section_id: "2429.0".to_string(),
            z: 2429.0,
        }],
    );
    client.put_resolved_tiles(
        BASIS_STACK,
        2429.0,
        ResolvedTileSpecCollection::from_tile_specs(vec![
            basis_tile(TILE_A, 2429.0),
            basis_tile(TILE_B, 2429.0),
            basis_tile(TILE_UNTOUCHED, 2429.0),
        ]),
    );
    client
}

fn export_config(z_map: Option<&str>, complete: bool) -> ExportConfig {
    ExportConfig {
        basis_stack: BASIS_STACK.to_string(),
        target_stack: TARGET_STACK.to_string(),
        min_z: 2429.0,
        max_z: 2429.3,
        z_map: parse_z_map(z_map).expect("z map should parse"),
        complete_after_export: complete,
    }
}

fn one_layer_project(patches: Vec<PatchDump>) -> ProjectDump {
    ProjectDump {
        layers: vec![LayerDump {
            z: 2429.0,
            patches,
        }],
    }
}

#[tokio::test]
async fn test_export_replaces_last_transform_and_drops_untouched_tiles() {
    let basis = basis_client();
    let target = InMemoryStackClient::new();
    let project = one_layer_project(vec![patch(TILE_A), patch(TILE_B)]);
    let config = export_config(None, false);

    let summary = export_patches(&project, &config, &basis, &target)
        .await
        .expect("export should succeed");
    assert_eq!(summary.layer_count, 1);
    assert_eq!(summary.tile_count, 2);

    assert_eq!(target.derived_stacks(), vec![TARGET_STACK.to_string()]);

    let saves = target.saved_tiles();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].stack, TARGET_STACK);
    assert_eq!(saves[0].z, None, "tiles carry their own z values");

    let saved = &saves[0].tiles;
    assert_eq!(saved.tile_count(), 2);
    assert!(saved.get_tile_spec(TILE_UNTOUCHED).is_none());

    let tile = saved.get_tile_spec(TILE_A).expect("tile should be saved");
    let flattened = tile.flattened_transforms();
    // prior alignment transform replaced by the concatenated one
    assert_eq!(flattened.len(), 2);
    assert_eq!(flattened[0].class_name(), TRANSLATION_2D);
    assert_eq!(flattened[1].class_name(), AFFINE_2D);
    assert!(
        tile.bounding_box.is_some(),
        "bounding boxes are recomputed before saving"
    );

    // the collapsed leaf behaves like stage then alignment
    let combined = flattened[1].build_model().expect("leaf should parse");
    let stage = leaf(TRANSLATION_2D, "7500.0 20150.0").build_model().unwrap();
    let alignment = leaf(AFFINE_2D, "0.97764 0.00254 0.0092 1.01061 45979.1 6001.5")
        .build_model()
        .unwrap();
    for point in [[0.0, 0.0], [2560.0, 2160.0]] {
        let expected = alignment.apply(stage.apply(point));
        let actual = combined.apply(point);
        assert!((expected[0] - actual[0]).abs() < 1e-6);
        assert!((expected[1] - actual[1]).abs() < 1e-6);
    }

    assert!(target.state_transitions().is_empty());
}

#[tokio::test]
async fn test_export_skips_hidden_patches() {
    let basis = basis_client();
    let target = InMemoryStackClient::new();
    let mut hidden = patch(TILE_B);
    hidden.visible = false;
    let project = one_layer_project(vec![patch(TILE_A), hidden]);

    export_patches(&project, &export_config(None, false), &basis, &target)
        .await
        .expect("export should succeed");

    let saves = target.saved_tiles();
    assert_eq!(saves[0].tiles.tile_count(), 1);
    assert!(saves[0].tiles.get_tile_spec(TILE_B).is_none());
}

#[tokio::test]
async fn test_export_applies_z_map_to_tiles() {
    let basis = basis_client();
    let target = InMemoryStackClient::new();
    let project = one_layer_project(vec![patch(TILE_A)]);
    let config = export_config(Some("2429.0=102524.0"), false);

    export_patches(&project, &config, &basis, &target)
        .await
        .expect("export should succeed");

    let saves = target.saved_tiles();
    let tile = saves[0].tiles.get_tile_spec(TILE_A).expect("tile saved");
    assert_eq!(tile.z, 102524.0);
}

#[tokio::test]
async fn test_export_marks_stack_complete_when_configured() {
    let basis = basis_client();
    let target = InMemoryStackClient::new();
    let project = one_layer_project(vec![patch(TILE_A)]);

    export_patches(&project, &export_config(None, true), &basis, &target)
        .await
        .expect("export should succeed");

    assert_eq!(
        target.state_transitions(),
        vec![(TARGET_STACK.to_string(), StackState::Complete)]
    );
}

#[tokio::test]
async fn test_bad_transform_shape_aborts_before_any_save() {
    let basis = basis_client();
    let target = InMemoryStackClient::new();

    // chain ends in translation, not affine
    let bad_patch = PatchDump {
        tile_id: TILE_A.to_string(),
        visible: true,
        transforms: TransformSpec::List {
            spec_list: vec![
                leaf(TRANSLATION_2D, "1 1"),
                leaf(TRANSLATION_2D, "2 2"),
            ],
        },
    };
    let project = one_layer_project(vec![bad_patch]);

    let result = export_patches(&project, &export_config(None, true), &basis, &target).await;
    assert!(result.is_err());
    assert!(target.saved_tiles().is_empty());
    assert!(target.state_transitions().is_empty());
}

#[tokio::test]
async fn test_layers_outside_z_range_are_ignored() {
    let basis = basis_client();
    let target = InMemoryStackClient::new();
    let project = ProjectDump {
        layers: vec![
            LayerDump {
                z: 2429.0,
                patches: vec![patch(TILE_A)],
            },
            LayerDump {
                z: 9999.0,
                patches: vec![patch(TILE_B)],
            },
        ],
    };

    let summary = export_patches(&project, &export_config(None, false), &basis, &target)
        .await
        .expect("export should succeed");

    assert_eq!(summary.layer_count, 1);
    assert_eq!(summary.tile_count, 1);
}

#[tokio::test]
async fn test_unknown_section_is_fatal() {
    let basis = basis_client();
    let target = InMemoryStackClient::new();
    let project = ProjectDump {
        layers: vec![LayerDump {
            z: 2429.0,
            patches: vec![patch("150501185511004011.3999.0")],
        }],
    };

    let mut config = export_config(None, false);
    config.min_z = 0.0;
    config.max_z = 10000.0;

    let result = export_patches(&project, &config, &basis, &target).await;
    assert!(matches!(
        result,
        Err(align_common::Error::UnknownSection { .. })
    ));
    assert!(target.saved_tiles().is_empty());
}

#[tokio::test]
async fn test_multiple_layers_merge_into_one_basis_section_save() {
    // two project layers whose sections both resolve to basis z 2429.0
    let mut basis = basis_client();
    basis.put_section_data(
        BASIS_STACK,
        vec![
            SectionData {
                section_id: "2429.0".to_string(),
                z: 2429.0,
            },
            SectionData {
                section_id: "2429.1".to_string(),
                z: 2429.0,
            },
        ],
    );
    let target = InMemoryStackClient::new();

    let project = ProjectDump {
        layers: vec![
            LayerDump {
                z: 2429.0,
                patches: vec![patch(TILE_A)],
            },
            LayerDump {
                z: 2429.1,
                patches: vec![patch("150501185511004012.2429.1")],
            },
        ],
    };

    // second layer's tile id exists in the basis collection under a
    // different subsection, so seed it explicitly
    basis.put_resolved_tiles(
        BASIS_STACK,
        2429.0,
        ResolvedTileSpecCollection::from_tile_specs(vec![
            basis_tile(TILE_A, 2429.0),
            basis_tile("150501185511004012.2429.1", 2429.0),
        ]),
    );

    let summary = export_patches(&project, &export_config(None, false), &basis, &target)
        .await
        .expect("export should succeed");

    assert_eq!(summary.layer_count, 2);
    assert_eq!(target.saved_tiles().len(), 1, "one save per basis z");
    assert_eq!(target.saved_tiles()[0].tiles.tile_count(), 2);
}
