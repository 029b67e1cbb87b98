use burn::backend::ndarray::NdArray;
use burn_dataset::{
    BatchConfig, BatchIter, BatchSource, BurnDatasetError, FreiHand, ImageTransform,
};
use data_contracts::{ContractError, DatasetSplit, SplitRanges};
use image::RgbImage;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use vision_core::{HeatmapEncoder, HeatmapError};

type Backend = NdArray<f32>;

const SAMPLES: usize = 6;

fn ranges() -> SplitRanges {
    SplitRanges {
        train: 0..3,
        val: 3..5,
        test_len: 1,
    }
}

fn write_synthetic_freihand(root: &Path, samples: usize) {
    let rgb = root.join("training/rgb");
    fs::create_dir_all(&rgb).unwrap();
    // Written out of order; the index sorts names.
    for i in (0..samples).rev() {
        let img = RgbImage::from_pixel(16, 16, image::Rgb([(i * 40) as u8, 64, 32]));
        img.save(rgb.join(format!("{i:08}.png"))).unwrap();
    }
    let k = vec![[[100.0f32, 0.0, 112.0], [0.0, 100.0, 112.0], [0.0, 0.0, 1.0]]; samples];
    fs::write(root.join("training_K.json"), serde_json::to_string(&k).unwrap()).unwrap();
    let xyz: Vec<Vec<[f32; 3]>> = (0..samples)
        .map(|s| {
            (0..21)
                .map(|j| {
                    let a = (j + s) as f32 * 0.3;
                    [0.1 * a.cos(), 0.1 * a.sin(), 1.0]
                })
                .collect()
        })
        .collect();
    fs::write(root.join("training_xyz.json"), serde_json::to_string(&xyz).unwrap()).unwrap();
}

fn open_small(root: &Path, split: DatasetSplit) -> FreiHand {
    FreiHand::open(root, split, &ranges())
        .unwrap()
        .with_transform(ImageTransform::default().with_target_size(8))
        .with_encoder(HeatmapEncoder::new(8))
}

#[test]
fn splits_select_sorted_entries() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic_freihand(dir.path(), SAMPLES);

    let train = open_small(dir.path(), DatasetSplit::Train);
    let val = open_small(dir.path(), DatasetSplit::Val);
    let test = open_small(dir.path(), DatasetSplit::Test);
    assert_eq!((train.len(), val.len(), test.len()), (3, 2, 1));
    assert_eq!(train.image_name(0).unwrap(), "00000000.png");
    assert_eq!(val.image_name(0).unwrap(), "00000003.png");
    assert_eq!(test.image_name(0).unwrap(), "00000005.png");
}

#[test]
fn sample_carries_projected_keypoints_and_heatmaps() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic_freihand(dir.path(), SAMPLES);
    let train = open_small(dir.path(), DatasetSplit::Train);

    let sample = train.get(1).unwrap();
    assert_eq!(sample.image_name, "00000001.png");
    assert_eq!(sample.raw_image.dims(), [3, 16, 16]);
    assert_eq!(sample.image.dims(), [3, 8, 8]);
    assert_eq!(sample.heatmaps.resolution(), 8);

    // Joint 0 of sample 1: angle 0.3 rad, 10px from the principal point at 112.
    let expected_x = (112.0 + 10.0 * 0.3f32.cos()) / 224.0;
    let expected_y = (112.0 + 10.0 * 0.3f32.sin()) / 224.0;
    assert!((sample.keypoints[0].x - expected_x).abs() < 1e-5);
    assert!((sample.keypoints[0].y - expected_y).abs() < 1e-5);
    assert!(sample.heatmaps.map(0).iter().any(|v| *v == 1.0));
}

#[test]
fn index_out_of_range_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic_freihand(dir.path(), SAMPLES);
    let val = open_small(dir.path(), DatasetSplit::Val);
    let err = val.get(2).unwrap_err();
    assert!(matches!(
        err,
        BurnDatasetError::IndexOutOfRange { index: 2, len: 2 }
    ));
}

#[test]
fn missing_annotations_fail_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic_freihand(dir.path(), SAMPLES);
    fs::remove_file(dir.path().join("training_xyz.json")).unwrap();
    let err = FreiHand::open(dir.path(), DatasetSplit::Train, &ranges()).unwrap_err();
    assert!(matches!(
        err,
        BurnDatasetError::Contract(ContractError::Io { .. })
    ));
}

#[test]
fn split_needs_enough_images() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic_freihand(dir.path(), SAMPLES);
    fs::remove_file(dir.path().join("training/rgb/00000004.png")).unwrap();
    fs::remove_file(dir.path().join("training/rgb/00000005.png")).unwrap();
    let err = FreiHand::open(dir.path(), DatasetSplit::Val, &ranges()).unwrap_err();
    assert!(matches!(
        err,
        BurnDatasetError::Contract(ContractError::SplitOutOfRange { available: 4, .. })
    ));
}

#[test]
fn batches_follow_index_order_and_restart_on_reset() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic_freihand(dir.path(), SAMPLES);
    let train = Arc::new(open_small(dir.path(), DatasetSplit::Train));
    let device = Default::default();
    let mut iter = BatchIter::new(
        train,
        BatchConfig {
            batch_size: 2,
            ..Default::default()
        },
    );

    let first = iter.next_batch::<Backend>(&device).unwrap().unwrap();
    assert_eq!(first.images.dims(), [2, 3, 8, 8]);
    assert_eq!(first.heatmaps.dims(), [2, 21, 8, 8]);
    assert_eq!(first.keypoints.dims(), [2, 21, 2]);
    assert_eq!(first.image_names, vec!["00000000.png", "00000001.png"]);

    let second = iter.next_batch::<Backend>(&device).unwrap().unwrap();
    assert_eq!(second.len(), 1);
    assert!(iter.next_batch::<Backend>(&device).unwrap().is_none());

    iter.reset();
    let again = iter.next_batch::<Backend>(&device).unwrap().unwrap();
    assert_eq!(again.image_names, first.image_names);
}

#[test]
fn drop_last_and_seeded_shuffle() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic_freihand(dir.path(), SAMPLES);
    let train = Arc::new(open_small(dir.path(), DatasetSplit::Train));
    let device = Default::default();
    let cfg = BatchConfig {
        batch_size: 2,
        shuffle: true,
        seed: Some(7),
        drop_last: true,
    };

    let mut a = BatchIter::new(train.clone(), cfg.clone());
    let b = BatchIter::new(train, cfg);
    assert_eq!(a.order(), b.order());
    let mut sorted = a.order().to_vec();
    sorted.sort();
    assert_eq!(sorted, vec![0, 1, 2]);

    assert_eq!(a.next_batch::<Backend>(&device).unwrap().unwrap().len(), 2);
    assert!(a.next_batch::<Backend>(&device).unwrap().is_none());
}

#[test]
fn zero_depth_joint_fails_the_sample() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic_freihand(dir.path(), SAMPLES);
    let xyz_path = dir.path().join("training_xyz.json");
    let mut xyz: Vec<Vec<[f32; 3]>> =
        serde_json::from_str(&fs::read_to_string(&xyz_path).unwrap()).unwrap();
    xyz[0][5] = [0.1, 0.0, 0.0];
    fs::write(&xyz_path, serde_json::to_string(&xyz).unwrap()).unwrap();

    let train = open_small(dir.path(), DatasetSplit::Train);
    let kp = train.keypoints(0).unwrap();
    assert!(!kp[5].x.is_finite());

    let err = train.get(0).unwrap_err();
    assert!(matches!(
        err,
        BurnDatasetError::Heatmap {
            source: HeatmapError::NonFiniteKeypoint { joint: 5 },
            ..
        }
    ));
    assert!(train.get(1).is_ok());
}
