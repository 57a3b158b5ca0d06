use tilescope_core::locks::MemoryLockBackend;
use tilescope_core::{
    mask_cache_key, GridConfig, TileCoord, TileLockStore, TileMask, Viewport, MASK_USABLE,
};

const CANVAS: f64 = 1280.0;
const DPR: f64 = 2.0;

fn build_viewport(mask_byte: u8) -> Viewport {
    let config = GridConfig::new(4096, 4096, 24, None, None).unwrap();
    let mut viewport = Viewport::new(config);
    viewport.set_canvas_size(CANVAS * DPR, CANVAS * DPR, DPR);
    viewport.set_image_ready(true);
    let total = (config.cols * config.rows) as usize;
    viewport.install_mask(TileMask::new(config.cols, config.rows, vec![mask_byte; total]).unwrap());
    viewport.center_view();
    viewport
}

fn css_for_tile(viewport: &Viewport, tile: TileCoord) -> (f64, f64) {
    let view = viewport.view();
    let (world_x, world_y) = viewport
        .config()
        .tile_center_world(viewport.offset(), tile);
    (
        (world_x - view.pan_x) * view.scale / viewport.dpr(),
        (world_y - view.pan_y) * view.scale / viewport.dpr(),
    )
}

#[test]
fn select_claim_and_share_locks() {
    let mut viewport = build_viewport(MASK_USABLE);
    let backend = MemoryLockBackend::new();
    let mut locks = TileLockStore::with_backend(Box::new(backend.clone()));

    // Rectangle-select a 2x3 block.
    let (x0, y0) = css_for_tile(&viewport, TileCoord::new(0, 0));
    viewport.pointer_down(x0, y0, true, &locks);
    let (x1, y1) = css_for_tile(&viewport, TileCoord::new(1, 2));
    viewport.pointer_move(x1, y1);
    viewport.pointer_up(&locks);
    assert_eq!(viewport.selection().len(), 6);

    // The external claim workflow locks the selection.
    let selected: Vec<TileCoord> = viewport.selection().iter().collect();
    locks.lock_many(&selected, "mara", 1_700_000_000_000);
    assert_eq!(locks.len(), 6);
    for tile in &selected {
        assert!(!viewport.cell_allowed(&locks, *tile));
    }

    // Another session imports the exported lock set and sees the same claims.
    let json = locks.export_json();
    let mut peer = TileLockStore::new();
    assert_eq!(peer.import_json(&json).unwrap(), 6);
    for tile in &selected {
        assert_eq!(
            peer.is_locked(*tile).map(|record| record.user.as_str()),
            Some("mara")
        );
    }

    // Releasing the claim makes the tiles selectable again.
    locks.unlock_many(&selected);
    assert!(locks.is_empty());
    assert!(backend.is_empty());
    assert!(viewport.cell_allowed(&locks, selected[0]));
}

#[test]
fn locked_tiles_disappear_from_render_geometry() {
    let mut viewport = build_viewport(MASK_USABLE);
    let mut locks = TileLockStore::new();
    let window = viewport.render_window(1).unwrap();
    let before = viewport.allowed_cells(&locks, window).len();

    let hole = viewport.config().tile_at(
        (window.ix_min + 1) as i32,
        (window.iy_min + 1) as i32,
    );
    locks.lock(hole, "juno", 1);
    let after = viewport.allowed_cells(&locks, window).len();
    assert_eq!(after, before - 1);

    // The lock hole now has traced boundary edges around it.
    let edges = viewport.boundary_edges(&locks, window);
    let (hx, hy) = viewport.config().index_of(hole);
    assert!(edges
        .iter()
        .any(|edge| edge.ix == hx as u32 - 1 && edge.iy == hy as u32));
}

#[test]
fn purge_resets_mask_and_forces_recompute_path() {
    let mut viewport = build_viewport(MASK_USABLE);
    assert!(viewport.ready());
    viewport.clear_mask();
    assert!(!viewport.ready());
    assert!(viewport.mask().is_none());
    // The geometry key is unchanged, so the next pipeline run looks up the
    // same slot the purge emptied.
    let config = viewport.config();
    assert_eq!(
        mask_cache_key(config.cols, config.rows, config.tile_size),
        "mask-stable-v2:170x170@24"
    );
}

#[test]
fn selection_survives_zoom_but_not_reconfigure() {
    let mut viewport = build_viewport(MASK_USABLE);
    let locks = TileLockStore::new();
    let (x, y) = css_for_tile(&viewport, TileCoord::new(4, 4));
    viewport.pointer_down(x, y, false, &locks);
    viewport.pointer_up(&locks);
    assert_eq!(viewport.selection().len(), 1);

    for _ in 0..40 {
        viewport.wheel(600.0, 400.0, -1.0);
    }
    assert_eq!(viewport.selection().len(), 1);

    let config = GridConfig::new(2048, 1024, 24, None, None).unwrap();
    viewport.reconfigure(config);
    assert!(viewport.selection().is_empty());
    assert_eq!(
        mask_cache_key(config.cols, config.rows, config.tile_size),
        "mask-stable-v2:85x42@24"
    );
}
