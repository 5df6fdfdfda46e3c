//! End-to-end merge job tests against filesystem tile stores.

use std::cell::Cell;

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use tempfile::TempDir;

use tilemerge::coord::{Coord, GridOrigin, TileBounds};
use tilemerge::format::{encode_image, FormatStrategy, TileFormat};
use tilemerge::job::{plan_batches, JobRunner};
use tilemerge::source::{FsSource, Source};
use tilemerge::status::BatchStatusManager;
use tilemerge::task::{MergeTask, SourceDescriptor, SourceKind};
use tilemerge::tile::{Tile, TILE_SIZE};

fn solid_payload(pixel: Rgba<u8>, format: TileFormat) -> Vec<u8> {
    let image = RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, pixel);
    encode_image(&DynamicImage::ImageRgba8(image), format).unwrap()
}

fn fill_store(dir: &TempDir, bounds: TileBounds, pixel: Rgba<u8>, format: TileFormat) {
    let store = FsSource::create(dir.path(), GridOrigin::LowerLeft).unwrap();
    let tiles: Vec<Tile> = bounds
        .coords()
        .map(|coord| Tile::new(coord, solid_payload(pixel, format)).unwrap())
        .collect();
    store.write_tiles(&tiles).unwrap();
}

fn descriptor(dir: &TempDir) -> SourceDescriptor {
    SourceDescriptor {
        path: dir.path().display().to_string(),
        kind: SourceKind::Fs,
        origin: GridOrigin::LowerLeft,
    }
}

fn task(
    target: &TempDir,
    sources: Vec<SourceDescriptor>,
    bounds: Vec<TileBounds>,
    batch_size: u64,
) -> MergeTask {
    MergeTask {
        target: descriptor(target),
        sources,
        bounds,
        format: TileFormat::Png,
        strategy: FormatStrategy::Mixed,
        upload_only: false,
        batch_size,
    }
}

#[test]
fn fresh_merge_writes_every_tile_and_completes_the_layer() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let bounds = TileBounds::new(2, 0, 2, 0, 2).unwrap();
    fill_store(&source_dir, bounds, Rgba([200, 10, 10, 255]), TileFormat::Png);

    let task = task(&target_dir, vec![descriptor(&source_dir)], vec![bounds], 2);
    let manager = BatchStatusManager::new(true, vec!["merge".to_string()]);
    let checkpoints = Cell::new(0usize);

    let summary = JobRunner::new()
        .run(&task, &manager, |_| {
            checkpoints.set(checkpoints.get() + 1);
            Ok(())
        })
        .unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.tiles_written, 4);
    assert_eq!(summary.batches_completed, 2);
    // One checkpoint per batch plus the final one
    assert_eq!(checkpoints.get(), 3);

    let layer = task.target.path.clone();
    assert!(manager.is_layer_done(&layer));
    assert_eq!(manager.total_completed_tiles(&layer), 4);
    assert_eq!(manager.remaining_batches(&layer), 0);

    let target = FsSource::open(target_dir.path(), GridOrigin::LowerLeft).unwrap();
    for coord in bounds.coords() {
        let tile = target.get_tile(coord).unwrap().unwrap();
        assert_eq!(tile.format(), TileFormat::Png);
    }
}

#[test]
fn higher_priority_source_blends_over_lower() {
    let front_dir = TempDir::new().unwrap();
    let back_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let bounds = TileBounds::new(1, 0, 1, 0, 1).unwrap();
    fill_store(&front_dir, bounds, Rgba([255, 0, 0, 128]), TileFormat::Png);
    fill_store(&back_dir, bounds, Rgba([0, 0, 255, 255]), TileFormat::Png);

    let task = task(
        &target_dir,
        vec![descriptor(&front_dir), descriptor(&back_dir)],
        vec![bounds],
        100,
    );
    let manager = BatchStatusManager::new(true, Vec::new());
    JobRunner::new().run(&task, &manager, |_| Ok(())).unwrap();

    let target = FsSource::open(target_dir.path(), GridOrigin::LowerLeft).unwrap();
    let tile = target
        .get_tile(Coord::new(1, 0, 0).unwrap())
        .unwrap()
        .unwrap();
    let merged = image::load_from_memory(tile.data()).unwrap();
    let pixel = merged.get_pixel(10, 10);
    // Translucent red blended over opaque blue
    assert!(pixel[0] > 100, "red was {}", pixel[0]);
    assert!(pixel[2] > 100, "blue was {}", pixel[2]);
    assert_eq!(pixel[3], 255);
}

#[test]
fn missing_tiles_fall_back_to_upscaled_ancestors() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    // Only a single zoom-1 tile exists; the job merges at zoom 2
    let ancestor_bounds = TileBounds::new(1, 0, 1, 0, 1).unwrap();
    fill_store(
        &source_dir,
        ancestor_bounds,
        Rgba([30, 99, 30, 255]),
        TileFormat::Png,
    );

    let merge_bounds = TileBounds::new(2, 0, 2, 0, 2).unwrap();
    let task = task(
        &target_dir,
        vec![descriptor(&source_dir)],
        vec![merge_bounds],
        100,
    );
    let manager = BatchStatusManager::new(true, Vec::new());
    let summary = JobRunner::new().run(&task, &manager, |_| Ok(())).unwrap();
    assert_eq!(summary.tiles_written, 4);

    let target = FsSource::open(target_dir.path(), GridOrigin::LowerLeft).unwrap();
    for coord in merge_bounds.coords() {
        let tile = target.get_tile(coord).unwrap().unwrap();
        let merged = image::load_from_memory(tile.data()).unwrap();
        assert_eq!(merged.get_pixel(50, 50), Rgba([30, 99, 30, 255]));
    }
}

#[test]
fn coords_with_no_data_anywhere_are_skipped() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    // Source covers only the left column of a 2x2 merge range
    let filled = TileBounds::new(2, 0, 1, 0, 2).unwrap();
    fill_store(&source_dir, filled, Rgba([1, 2, 3, 255]), TileFormat::Png);

    let merge_bounds = TileBounds::new(2, 0, 2, 0, 2).unwrap();
    let task = task(
        &target_dir,
        vec![descriptor(&source_dir)],
        vec![merge_bounds],
        100,
    );
    let manager = BatchStatusManager::new(true, Vec::new());
    let summary = JobRunner::new().run(&task, &manager, |_| Ok(())).unwrap();

    assert_eq!(summary.tiles_written, 2);
    let target = FsSource::open(target_dir.path(), GridOrigin::LowerLeft).unwrap();
    assert!(target.tile_exists(Coord::new(2, 0, 0).unwrap()).unwrap());
    assert!(!target.tile_exists(Coord::new(2, 1, 0).unwrap()).unwrap());
}

#[test]
fn upload_only_passes_source_tiles_through_byte_identical() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let bounds = TileBounds::new(2, 0, 2, 0, 2).unwrap();
    fill_store(&source_dir, bounds, Rgba([77, 77, 77, 255]), TileFormat::Jpeg);

    let mut task = task(&target_dir, vec![descriptor(&source_dir)], vec![bounds], 100);
    task.upload_only = true;
    task.format = TileFormat::Jpeg;

    let manager = BatchStatusManager::new(true, Vec::new());
    JobRunner::new().run(&task, &manager, |_| Ok(())).unwrap();

    let source = FsSource::open(source_dir.path(), GridOrigin::LowerLeft).unwrap();
    let target = FsSource::open(target_dir.path(), GridOrigin::LowerLeft).unwrap();
    for coord in bounds.coords() {
        let original = source.get_tile(coord).unwrap().unwrap();
        let uploaded = target.get_tile(coord).unwrap().unwrap();
        assert_eq!(uploaded.data(), original.data());
        assert_eq!(uploaded.format(), TileFormat::Jpeg);
    }
}

#[test]
fn resumed_job_skips_completed_batches_and_drains_the_rest() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    // 2 wide, 4 tall, batch size 2: four one-row batches
    let bounds = TileBounds::new(3, 0, 2, 0, 4).unwrap();
    fill_store(&source_dir, bounds, Rgba([9, 9, 9, 255]), TileFormat::Png);

    let task = task(&target_dir, vec![descriptor(&source_dir)], vec![bounds], 2);
    let layer = task.target.path.clone();
    let plan: std::collections::HashMap<String, TileBounds> =
        plan_batches(&task.bounds, task.batch_size)
            .unwrap()
            .into_iter()
            .collect();
    assert_eq!(plan.len(), 4);

    // Simulate an interrupted earlier run: the plan was assigned, one batch
    // finished, a second was claimed but never completed
    let manager = BatchStatusManager::new(true, vec!["merge".to_string()]);
    manager.initialize_layer(&layer);
    for id in plan.keys() {
        manager.assign_batch(&layer, id);
    }
    let finished = manager.claim_batch(&layer).unwrap();
    manager.complete_batch(&layer, &finished, 2);
    let interrupted = manager.claim_batch(&layer).unwrap();
    manager.set_current_batch(&layer, Some(interrupted.clone()));
    let snapshot = manager.snapshot().unwrap();

    // Resume: restore, return in-flight work to pending, drain
    let restored = BatchStatusManager::restore(&snapshot).unwrap();
    restored.reset_batch_status();
    let summary = JobRunner::new().run(&task, &restored, |_| Ok(())).unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.batches_completed, 3);
    assert_eq!(summary.tiles_written, 6);
    assert!(restored.is_layer_done(&layer));
    // The pre-crash completion still counts toward the layer total
    assert_eq!(restored.total_completed_tiles(&layer), 8);

    // Only the batches run after the resume touched the target; the batch
    // completed before the crash is not redone
    let finished_bounds = plan[&finished];
    let target = FsSource::open(target_dir.path(), GridOrigin::LowerLeft).unwrap();
    for coord in bounds.coords() {
        let expected = !finished_bounds.contains(coord);
        assert_eq!(
            target.tile_exists(coord).unwrap(),
            expected,
            "unexpected target state at {coord}"
        );
    }
}

#[test]
fn existing_target_tiles_are_the_bottom_layer() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let bounds = TileBounds::new(1, 0, 1, 0, 1).unwrap();
    // The target already holds opaque blue; the update layer is translucent
    fill_store(&target_dir, bounds, Rgba([0, 0, 255, 255]), TileFormat::Png);
    fill_store(&source_dir, bounds, Rgba([255, 0, 0, 128]), TileFormat::Png);

    let task = task(&target_dir, vec![descriptor(&source_dir)], vec![bounds], 100);
    // is_new_target = false: the target exists and is read back
    let manager = BatchStatusManager::new(false, Vec::new());
    JobRunner::new().run(&task, &manager, |_| Ok(())).unwrap();

    let target = FsSource::open(target_dir.path(), GridOrigin::LowerLeft).unwrap();
    let tile = target
        .get_tile(Coord::new(1, 0, 0).unwrap())
        .unwrap()
        .unwrap();
    let merged = image::load_from_memory(tile.data()).unwrap();
    let pixel = merged.get_pixel(0, 0);
    assert!(pixel[0] > 100, "update layer missing, red was {}", pixel[0]);
    assert!(pixel[2] > 100, "target base missing, blue was {}", pixel[2]);
}

#[test]
fn upper_left_source_feeds_a_lower_left_target() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();

    // Write one tile through an upper-left adapter; on disk it lands at the
    // flipped row
    let source = FsSource::create(source_dir.path(), GridOrigin::UpperLeft).unwrap();
    let coord = Coord::new(1, 0, 0).unwrap();
    source
        .write_tiles(&[
            Tile::new(coord, solid_payload(Rgba([5, 6, 7, 255]), TileFormat::Png)).unwrap(),
        ])
        .unwrap();
    assert!(source_dir.path().join("1/0/1.png").is_file());

    let bounds = TileBounds::new(1, 0, 1, 0, 1).unwrap();
    let mut task = task(&target_dir, vec![descriptor(&source_dir)], vec![bounds], 100);
    task.sources[0].origin = GridOrigin::UpperLeft;

    let manager = BatchStatusManager::new(true, Vec::new());
    let summary = JobRunner::new().run(&task, &manager, |_| Ok(())).unwrap();
    assert_eq!(summary.tiles_written, 1);

    // The lower-left target stores the tile at the pipeline row
    assert!(target_dir.path().join("1/0/0.png").is_file());
}
