use std::collections::HashSet;

use crate::grid::{GridConfig, Offset, TileCoord, PAN_PADDING};
use crate::locks::TileLockStore;
use crate::mask::TileMask;
use crate::scheduler::RenderWindow;

/// Exactly one interaction mode at a time; invalid flag combinations are
/// unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interaction {
    Idle,
    Dragging {
        drag_start: (f64, f64),
        pan_start: (f64, f64),
    },
    GroupSelecting {
        start: TileCoord,
        current: TileCoord,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub pan_x: f64,
    pub pan_y: f64,
    pub scale: f64,
    pub pan_locked: bool,
}

/// Insertion-ordered set of selected tiles; the first entry is the focus
/// tile for centering.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    order: Vec<TileCoord>,
    members: HashSet<TileCoord>,
}

impl Selection {
    pub fn insert(&mut self, tile: TileCoord) -> bool {
        if self.members.insert(tile) {
            self.order.push(tile);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn contains(&self, tile: TileCoord) -> bool {
        self.members.contains(&tile)
    }

    pub fn first(&self) -> Option<TileCoord> {
        self.order.first().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.order.iter().copied()
    }
}

pub const EDGE_TOP: u8 = 1;
pub const EDGE_RIGHT: u8 = 2;
pub const EDGE_BOTTOM: u8 = 4;
pub const EDGE_LEFT: u8 = 8;

/// Sides of an allowed tile that face a disallowed or absent neighbor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryEdges {
    pub ix: u32,
    pub iy: u32,
    pub sides: u8,
}

/// Clamped bounding rectangle of an in-progress group drag, in grid
/// coordinates, both corners inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

/// Pan/zoom/drag/selection state machine over one grid. Pointer and wheel
/// handlers no-op until both the image and the mask are ready; that gate is
/// readiness, not an error.
pub struct Viewport {
    config: GridConfig,
    offset: Offset,
    view: ViewState,
    interaction: Interaction,
    selection: Selection,
    mask: Option<TileMask>,
    hovered: Option<TileCoord>,
    image_ready: bool,
    mask_ready: bool,
    canvas_width: f64,
    canvas_height: f64,
    dpr: f64,
}

impl Viewport {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            offset: config.offset(),
            view: ViewState {
                pan_x: 0.0,
                pan_y: 0.0,
                scale: 1.0,
                pan_locked: false,
            },
            interaction: Interaction::Idle,
            selection: Selection::default(),
            mask: None,
            hovered: None,
            image_ready: false,
            mask_ready: false,
            canvas_width: 0.0,
            canvas_height: 0.0,
            dpr: 1.0,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn dpr(&self) -> f64 {
        self.dpr
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn hovered(&self) -> Option<TileCoord> {
        self.hovered
    }

    pub fn mask(&self) -> Option<&TileMask> {
        self.mask.as_ref()
    }

    /// Swaps in freshly derived geometry. The installed mask and anything
    /// cached from the old grid are invalid afterwards; callers rebuild the
    /// mask-cache key and restart the mask pipeline.
    pub fn reconfigure(&mut self, config: GridConfig) {
        self.config = config;
        self.offset = config.offset();
        self.mask = None;
        self.mask_ready = false;
        self.selection.clear();
        self.hovered = None;
        self.interaction = Interaction::Idle;
    }

    /// Canvas size in device pixels plus the current devicePixelRatio.
    pub fn set_canvas_size(&mut self, device_width: f64, device_height: f64, dpr: f64) {
        self.canvas_width = device_width;
        self.canvas_height = device_height;
        self.dpr = dpr;
    }

    pub fn set_image_ready(&mut self, ready: bool) {
        self.image_ready = ready;
    }

    pub fn install_mask(&mut self, mask: TileMask) {
        self.mask = Some(mask);
        self.mask_ready = true;
    }

    /// Purge support: drops the mask and readiness back to their initial
    /// state so the next lookup is a guaranteed recompute.
    pub fn clear_mask(&mut self) {
        self.mask = None;
        self.mask_ready = false;
    }

    pub fn image_ready(&self) -> bool {
        self.image_ready
    }

    pub fn mask_ready(&self) -> bool {
        self.mask_ready
    }

    pub fn ready(&self) -> bool {
        self.image_ready && self.mask_ready
    }

    pub fn screen_to_tile(&self, css_x: f64, css_y: f64) -> TileCoord {
        self.config.tile_at_screen(
            self.offset,
            self.view.pan_x,
            self.view.pan_y,
            self.view.scale,
            self.dpr,
            css_x,
            css_y,
        )
    }

    pub fn valid_tile(&self, tile: TileCoord) -> bool {
        self.config.valid_tile(tile)
    }

    /// Mask ∧ lock predicate. Fails open while no mask is installed so the
    /// view stays responsive during load.
    pub fn cell_allowed(&self, locks: &TileLockStore, tile: TileCoord) -> bool {
        let Some(mask) = &self.mask else {
            return true;
        };
        let (ix, iy) = self.config.index_of(tile);
        if !self.config.in_index_bounds(ix, iy) {
            return false;
        }
        mask.usable(ix, iy) && locks.is_locked(tile).is_none()
    }

    /// Pointer press. With a group modifier held this opens a rectangle
    /// draft; otherwise it replaces the selection with the pressed tile and
    /// arms dragging when the zoom level permits panning. Returns whether a
    /// redraw is needed.
    pub fn pointer_down(
        &mut self,
        css_x: f64,
        css_y: f64,
        group_modifier: bool,
        locks: &TileLockStore,
    ) -> bool {
        if !self.ready() {
            return false;
        }
        let tile = self.screen_to_tile(css_x, css_y);
        if group_modifier {
            if matches!(self.interaction, Interaction::Idle) {
                self.interaction = Interaction::GroupSelecting {
                    start: tile,
                    current: tile,
                };
                return true;
            }
            return false;
        }
        if matches!(self.interaction, Interaction::GroupSelecting { .. }) {
            // A plain press while a rectangle drag is active is absorbed by
            // the drag; the existing selection stays.
            return false;
        }
        self.selection.clear();
        if self.valid_tile(tile) && self.cell_allowed(locks, tile) {
            self.selection.insert(tile);
        }
        if self.view.scale <= self.center_lock_scale() {
            self.center_view();
        }
        if self.view.scale > self.center_lock_scale() && !self.view.pan_locked {
            self.interaction = Interaction::Dragging {
                drag_start: (css_x, css_y),
                pan_start: (self.view.pan_x, self.view.pan_y),
            };
        } else {
            self.interaction = Interaction::Idle;
        }
        true
    }

    /// Pointer motion: hover tracking, rectangle growth, or pan. Returns
    /// whether anything visible changed.
    pub fn pointer_move(&mut self, css_x: f64, css_y: f64) -> bool {
        if !self.ready() {
            return false;
        }
        let tile = self.screen_to_tile(css_x, css_y);
        let mut changed = false;
        if self.hovered != Some(tile) {
            self.hovered = Some(tile);
            changed = true;
        }
        match self.interaction {
            Interaction::GroupSelecting { start, current } => {
                if current != tile {
                    self.interaction = Interaction::GroupSelecting {
                        start,
                        current: tile,
                    };
                }
                changed = true;
            }
            Interaction::Dragging {
                drag_start,
                pan_start,
            } => {
                let dx = (css_x - drag_start.0) * self.dpr / self.view.scale;
                let dy = (css_y - drag_start.1) * self.dpr / self.view.scale;
                self.view.pan_x = pan_start.0 - dx;
                self.view.pan_y = pan_start.1 - dy;
                self.clamp_pan();
                changed = true;
            }
            Interaction::Idle => {}
        }
        changed
    }

    /// Pointer release. A finished rectangle drag merges every allowed tile
    /// inside it into the selection in one step; the draft is discarded
    /// either way.
    pub fn pointer_up(&mut self, locks: &TileLockStore) -> bool {
        if !self.ready() {
            return false;
        }
        match self.interaction {
            Interaction::GroupSelecting { start, current } => {
                self.merge_group(start, current, locks);
                self.interaction = Interaction::Idle;
                true
            }
            Interaction::Dragging { .. } => {
                self.interaction = Interaction::Idle;
                false
            }
            Interaction::Idle => false,
        }
    }

    fn merge_group(&mut self, a: TileCoord, b: TileCoord, locks: &TileLockStore) {
        let x0 = a.x.min(b.x).max(self.config.coord_min_x);
        let x1 = a.x.max(b.x).min(self.config.coord_max_x);
        let y0 = a.y.min(b.y).max(self.config.coord_min_y);
        let y1 = a.y.max(b.y).min(self.config.coord_max_y);
        for x in x0..=x1 {
            for y in y0..=y1 {
                let tile = TileCoord::new(x, y);
                if self.cell_allowed(locks, tile) {
                    self.selection.insert(tile);
                }
            }
        }
    }

    /// Wheel zoom, anchored at the cursor. Entering the pan-lock band forces
    /// re-centering instead of anchoring. Returns whether the scale changed;
    /// the host suppresses default scrolling either way.
    pub fn wheel(&mut self, css_x: f64, css_y: f64, delta_y: f64) -> bool {
        if !self.ready() {
            return false;
        }
        let factor = if delta_y < 0.0 {
            self.config.zoom_step
        } else {
            1.0 / self.config.zoom_step
        };
        let old_scale = self.view.scale;
        let new_scale =
            (old_scale * factor).clamp(self.config.min_scale, self.config.max_scale);
        if new_scale == old_scale {
            return false;
        }
        let world_x = css_x * self.dpr / old_scale + self.view.pan_x;
        let world_y = css_y * self.dpr / old_scale + self.view.pan_y;
        self.view.scale = new_scale;
        self.view.pan_x = world_x - css_x * self.dpr / new_scale;
        self.view.pan_y = world_y - css_y * self.dpr / new_scale;
        if new_scale <= self.center_lock_scale() {
            self.center_view();
        } else {
            self.clamp_pan();
        }
        self.check_pan_lock();
        true
    }

    pub fn center_lock_scale(&self) -> f64 {
        self.config.min_scale
    }

    /// The world-space point the view centers on: the first selected tile's
    /// center, or the image's geometric center when nothing is selected.
    pub fn focus_world(&self) -> (f64, f64) {
        if let Some(first) = self.selection.first() {
            return self.config.tile_center_world(self.offset, first);
        }
        self.config.image_center_world(self.offset)
    }

    pub fn center_view(&mut self) {
        if self.view.scale <= 0.0 || self.dpr <= 0.0 {
            return;
        }
        let view_w = self.canvas_width / self.dpr / self.view.scale;
        let view_h = self.canvas_height / self.dpr / self.view.scale;
        let (focus_x, focus_y) = self.focus_world();
        self.view.pan_x = focus_x - view_w * 0.5;
        self.view.pan_y = focus_y - view_h * 0.5;
    }

    /// At or below the lock scale, pan is forced to the centering solution;
    /// above it, pan clamps to the image bounds plus the overscroll padding.
    pub fn clamp_pan(&mut self) {
        if self.view.scale <= self.center_lock_scale() {
            self.center_view();
            return;
        }
        let view_w = self.canvas_width / self.dpr / self.view.scale;
        let view_h = self.canvas_height / self.dpr / self.view.scale;
        let left = self.offset.x - PAN_PADDING;
        let right = self.offset.x + self.config.image_width as f64 - view_w + PAN_PADDING;
        let top = self.offset.y - PAN_PADDING;
        let bottom = self.offset.y + self.config.image_height as f64 - view_h + PAN_PADDING;
        self.view.pan_x = self.view.pan_x.clamp(left, right.max(left));
        self.view.pan_y = self.view.pan_y.clamp(top, bottom.max(top));
    }

    /// Edge-triggered: crossing into the lock band recenters and cancels any
    /// drag; crossing out keeps the current framing.
    pub fn check_pan_lock(&mut self) {
        let should_lock = self.view.scale <= self.center_lock_scale();
        if should_lock && !self.view.pan_locked {
            self.view.pan_locked = true;
            self.center_view();
            if matches!(self.interaction, Interaction::Dragging { .. }) {
                self.interaction = Interaction::Idle;
            }
        } else if !should_lock && self.view.pan_locked {
            self.view.pan_locked = false;
        }
    }

    pub fn reset_view(&mut self) {
        self.view.scale = 1.0;
        self.check_pan_lock();
        self.center_view();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn render_window(&self, margin: u32) -> Option<RenderWindow> {
        RenderWindow::compute(
            &self.config,
            self.offset,
            self.view.pan_x,
            self.view.pan_y,
            self.view.scale,
            self.canvas_width,
            self.canvas_height,
            self.dpr,
            margin,
        )
    }

    fn index_allowed(&self, locks: &TileLockStore, ix: i32, iy: i32) -> bool {
        self.config.in_index_bounds(ix, iy)
            && self.cell_allowed(locks, self.config.tile_at(ix, iy))
    }

    /// Grid indices inside the window that pass `cell_allowed`, row-major.
    pub fn allowed_cells(&self, locks: &TileLockStore, window: RenderWindow) -> Vec<(u32, u32)> {
        let mut cells = Vec::new();
        for iy in window.iy_min..=window.iy_max {
            for ix in window.ix_min..=window.ix_max {
                if self.index_allowed(locks, ix as i32, iy as i32) {
                    cells.push((ix, iy));
                }
            }
        }
        cells
    }

    /// 4-neighbor boundary trace over the window: for each allowed tile,
    /// the sides whose neighbor is disallowed or absent.
    pub fn boundary_edges(
        &self,
        locks: &TileLockStore,
        window: RenderWindow,
    ) -> Vec<BoundaryEdges> {
        let mut edges = Vec::new();
        for iy in window.iy_min..=window.iy_max {
            for ix in window.ix_min..=window.ix_max {
                let (ix_i, iy_i) = (ix as i32, iy as i32);
                if !self.index_allowed(locks, ix_i, iy_i) {
                    continue;
                }
                let mut sides = 0u8;
                if !self.index_allowed(locks, ix_i, iy_i - 1) {
                    sides |= EDGE_TOP;
                }
                if !self.index_allowed(locks, ix_i + 1, iy_i) {
                    sides |= EDGE_RIGHT;
                }
                if !self.index_allowed(locks, ix_i, iy_i + 1) {
                    sides |= EDGE_BOTTOM;
                }
                if !self.index_allowed(locks, ix_i - 1, iy_i) {
                    sides |= EDGE_LEFT;
                }
                if sides != 0 {
                    edges.push(BoundaryEdges { ix, iy, sides });
                }
            }
        }
        edges
    }

    /// Clamped rectangle of the in-progress group drag, only when it
    /// contains at least one allowed tile.
    pub fn group_box(&self, locks: &TileLockStore) -> Option<GroupBox> {
        let Interaction::GroupSelecting { start, current } = self.interaction else {
            return None;
        };
        let x0 = start.x.min(current.x).max(self.config.coord_min_x);
        let x1 = start.x.max(current.x).min(self.config.coord_max_x);
        let y0 = start.y.min(current.y).max(self.config.coord_min_y);
        let y1 = start.y.max(current.y).min(self.config.coord_max_y);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        let mut any = false;
        'scan: for x in x0..=x1 {
            for y in y0..=y1 {
                if self.cell_allowed(locks, TileCoord::new(x, y)) {
                    any = true;
                    break 'scan;
                }
            }
        }
        if !any {
            return None;
        }
        Some(GroupBox { x0, y0, x1, y1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::MASK_USABLE;

    const CANVAS: f64 = 1024.0;

    fn ready_viewport() -> Viewport {
        let config = GridConfig::new(4096, 4096, 24, None, None).unwrap();
        let mut viewport = Viewport::new(config);
        viewport.set_canvas_size(CANVAS, CANVAS, 1.0);
        viewport.set_image_ready(true);
        let total = (config.cols * config.rows) as usize;
        viewport.install_mask(TileMask::new(config.cols, config.rows, vec![MASK_USABLE; total]).unwrap());
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
    fn handlers_gate_on_readiness() {
        let config = GridConfig::new(4096, 4096, 24, None, None).unwrap();
        let mut viewport = Viewport::new(config);
        viewport.set_canvas_size(CANVAS, CANVAS, 1.0);
        let locks = TileLockStore::new();
        assert!(!viewport.pointer_down(10.0, 10.0, false, &locks));
        assert!(!viewport.pointer_move(20.0, 20.0));
        assert!(!viewport.pointer_up(&locks));
        assert!(!viewport.wheel(10.0, 10.0, -1.0));
        assert!(viewport.selection().is_empty());
        assert!(viewport.hovered().is_none());
    }

    #[test]
    fn plain_press_replaces_selection() {
        let mut viewport = ready_viewport();
        let locks = TileLockStore::new();
        let (x, y) = css_for_tile(&viewport, TileCoord::new(0, 0));
        viewport.pointer_down(x, y, false, &locks);
        viewport.pointer_up(&locks);
        assert_eq!(viewport.selection().len(), 1);
        assert!(viewport.selection().contains(TileCoord::new(0, 0)));

        let (x, y) = css_for_tile(&viewport, TileCoord::new(3, 4));
        viewport.pointer_down(x, y, false, &locks);
        viewport.pointer_up(&locks);
        assert_eq!(viewport.selection().len(), 1);
        assert!(viewport.selection().contains(TileCoord::new(3, 4)));
    }

    #[test]
    fn locked_tile_is_not_selectable() {
        let mut viewport = ready_viewport();
        let mut locks = TileLockStore::new();
        let tile = TileCoord::new(2, 2);
        locks.lock(tile, "mara", 1);
        assert!(!viewport.cell_allowed(&locks, tile));
        let (x, y) = css_for_tile(&viewport, tile);
        viewport.pointer_down(x, y, false, &locks);
        assert!(viewport.selection().is_empty());
    }

    #[test]
    fn mask_zero_blocks_selection_but_not_hover() {
        let config = GridConfig::new(4096, 4096, 24, None, None).unwrap();
        let mut viewport = Viewport::new(config);
        viewport.set_canvas_size(CANVAS, CANVAS, 1.0);
        viewport.set_image_ready(true);
        let total = (config.cols * config.rows) as usize;
        viewport.install_mask(TileMask::new(config.cols, config.rows, vec![0; total]).unwrap());
        let locks = TileLockStore::new();
        let (x, y) = css_for_tile(&viewport, TileCoord::new(0, 0));
        viewport.pointer_down(x, y, false, &locks);
        assert!(viewport.selection().is_empty());
        viewport.pointer_move(x, y);
        assert_eq!(viewport.hovered(), Some(TileCoord::new(0, 0)));
    }

    #[test]
    fn group_drag_merges_allowed_rectangle_atomically() {
        let mut viewport = ready_viewport();
        let mut locks = TileLockStore::new();
        locks.lock(TileCoord::new(1, 1), "mara", 1);

        let (x0, y0) = css_for_tile(&viewport, TileCoord::new(0, 0));
        viewport.pointer_down(x0, y0, true, &locks);
        // Nothing merges while the drag is open.
        let (x1, y1) = css_for_tile(&viewport, TileCoord::new(2, 2));
        viewport.pointer_move(x1, y1);
        assert!(viewport.selection().is_empty());
        assert!(matches!(
            viewport.interaction(),
            Interaction::GroupSelecting { .. }
        ));

        viewport.pointer_up(&locks);
        assert!(matches!(viewport.interaction(), Interaction::Idle));
        // 3x3 rectangle minus the locked tile.
        assert_eq!(viewport.selection().len(), 8);
        assert!(!viewport.selection().contains(TileCoord::new(1, 1)));
    }

    #[test]
    fn group_rectangle_is_clamped_to_grid_bounds() {
        let mut viewport = ready_viewport();
        let locks = TileLockStore::new();
        let config = *viewport.config();

        // Drag from inside the far corner out past the grid edge.
        let inside = TileCoord::new(config.coord_max_x - 1, config.coord_max_y - 1);
        let (x0, y0) = css_for_tile(&viewport, inside);
        viewport.pointer_down(x0, y0, true, &locks);
        let outside = TileCoord::new(config.coord_max_x + 5, config.coord_max_y + 5);
        let (x1, y1) = css_for_tile(&viewport, outside);
        viewport.pointer_move(x1, y1);
        viewport.pointer_up(&locks);

        assert_eq!(viewport.selection().len(), 4);
        for tile in viewport.selection().iter() {
            assert!(viewport.valid_tile(tile));
        }
    }

    #[test]
    fn plain_press_during_group_drag_keeps_selection() {
        let mut viewport = ready_viewport();
        let locks = TileLockStore::new();
        let (x, y) = css_for_tile(&viewport, TileCoord::new(0, 0));
        viewport.pointer_down(x, y, false, &locks);
        viewport.pointer_up(&locks);
        assert_eq!(viewport.selection().len(), 1);

        let (gx, gy) = css_for_tile(&viewport, TileCoord::new(5, 5));
        viewport.pointer_down(gx, gy, true, &locks);
        let (px, py) = css_for_tile(&viewport, TileCoord::new(8, 8));
        assert!(!viewport.pointer_down(px, py, false, &locks));
        assert!(viewport.selection().contains(TileCoord::new(0, 0)));
        assert!(matches!(
            viewport.interaction(),
            Interaction::GroupSelecting { .. }
        ));
    }

    #[test]
    fn zoom_is_clamped_and_locks_pan_at_minimum() {
        let mut viewport = ready_viewport();
        for _ in 0..4000 {
            viewport.wheel(500.0, 500.0, -1.0);
        }
        assert_eq!(viewport.view().scale, viewport.config().max_scale);

        for _ in 0..8000 {
            viewport.wheel(500.0, 500.0, 1.0);
        }
        let view = viewport.view();
        assert_eq!(view.scale, viewport.config().min_scale);
        assert!(view.pan_locked);

        // Pan is the centering solution for the image center.
        let (focus_x, focus_y) = viewport.focus_world();
        let expected_x = focus_x - CANVAS / view.scale * 0.5;
        let expected_y = focus_y - CANVAS / view.scale * 0.5;
        assert!((view.pan_x - expected_x).abs() < 1.0e-9);
        assert!((view.pan_y - expected_y).abs() < 1.0e-9);
    }

    #[test]
    fn wheel_zoom_keeps_cursor_anchor() {
        let mut viewport = ready_viewport();
        let (css_x, css_y) = (311.0, 123.0);
        let before = viewport.view();
        let world_x = css_x * viewport.dpr() / before.scale + before.pan_x;
        let world_y = css_y * viewport.dpr() / before.scale + before.pan_y;

        assert!(viewport.wheel(css_x, css_y, -1.0));
        let after = viewport.view();
        let world_x_after = css_x * viewport.dpr() / after.scale + after.pan_x;
        let world_y_after = css_y * viewport.dpr() / after.scale + after.pan_y;
        assert!((world_x - world_x_after).abs() < 1.0e-9);
        assert!((world_y - world_y_after).abs() < 1.0e-9);
    }

    #[test]
    fn entering_pan_lock_cancels_drag() {
        let mut viewport = ready_viewport();
        let locks = TileLockStore::new();
        viewport.pointer_down(500.0, 500.0, false, &locks);
        assert!(matches!(
            viewport.interaction(),
            Interaction::Dragging { .. }
        ));
        // Zoom all the way out; crossing the lock threshold cancels the drag.
        for _ in 0..8000 {
            viewport.wheel(500.0, 500.0, 1.0);
        }
        assert!(viewport.view().pan_locked);
        assert!(matches!(viewport.interaction(), Interaction::Idle));
        // Zooming back out of the lock does not recenter.
        let locked_pan = viewport.view();
        viewport.wheel(500.0, 500.0, -1.0);
        assert!(!viewport.view().pan_locked);
        assert_ne!(viewport.view().scale, locked_pan.scale);
    }

    #[test]
    fn dragging_moves_and_clamps_pan() {
        let mut viewport = ready_viewport();
        let locks = TileLockStore::new();
        viewport.center_view();
        let before = viewport.view();
        viewport.pointer_down(500.0, 500.0, false, &locks);
        viewport.pointer_move(450.0, 480.0);
        let after = viewport.view();
        assert!((after.pan_x - (before.pan_x + 50.0)).abs() < 1.0e-9);
        assert!((after.pan_y - (before.pan_y + 20.0)).abs() < 1.0e-9);

        // A huge drag is held inside the padded bounds.
        viewport.pointer_move(-1.0e7, -1.0e7);
        let clamped = viewport.view();
        let view_w = CANVAS / clamped.scale;
        let right = viewport.offset().x + viewport.config().image_width as f64 - view_w
            + PAN_PADDING;
        assert!(clamped.pan_x <= right);
        viewport.pointer_up(&locks);
    }

    #[test]
    fn all_zero_mask_renders_nothing() {
        let config = GridConfig::new(4096, 4096, 24, None, None).unwrap();
        let mut viewport = Viewport::new(config);
        viewport.set_canvas_size(CANVAS, CANVAS, 1.0);
        viewport.set_image_ready(true);
        let total = (config.cols * config.rows) as usize;
        viewport.install_mask(TileMask::new(config.cols, config.rows, vec![0; total]).unwrap());
        let locks = TileLockStore::new();
        viewport.center_view();
        let window = viewport.render_window(2).unwrap();
        assert!(viewport.allowed_cells(&locks, window).is_empty());
        assert!(viewport.boundary_edges(&locks, window).is_empty());
    }

    #[test]
    fn boundary_edges_trace_mask_holes() {
        let config = GridConfig::new(96, 96, 24, None, None).unwrap();
        let mut viewport = Viewport::new(config);
        viewport.set_canvas_size(96.0, 96.0, 1.0);
        viewport.set_image_ready(true);
        // 4x4 grid with a blocked hole at index (1,1).
        let mut bytes = vec![MASK_USABLE; 16];
        bytes[1 * 4 + 1] = 0;
        viewport.install_mask(TileMask::new(4, 4, bytes).unwrap());
        let locks = TileLockStore::new();
        let window = RenderWindow {
            ix_min: 0,
            iy_min: 0,
            ix_max: 3,
            iy_max: 3,
        };
        let edges = viewport.boundary_edges(&locks, window);
        // The tile left of the hole shows its right edge.
        let left_of_hole = edges.iter().find(|e| e.ix == 0 && e.iy == 1).unwrap();
        assert!(left_of_hole.sides & EDGE_RIGHT != 0);
        // The corner tile keeps its outer edges.
        let corner = edges.iter().find(|e| e.ix == 0 && e.iy == 0).unwrap();
        assert!(corner.sides & EDGE_TOP != 0);
        assert!(corner.sides & EDGE_LEFT != 0);
        assert!(corner.sides & EDGE_RIGHT == 0);
    }

    #[test]
    fn group_box_needs_an_allowed_tile() {
        let mut viewport = ready_viewport();
        let mut locks = TileLockStore::new();
        let (x, y) = css_for_tile(&viewport, TileCoord::new(0, 0));
        viewport.pointer_down(x, y, true, &locks);
        assert!(viewport.group_box(&locks).is_some());

        // Lock the whole 1x1 draft rectangle away.
        locks.lock(TileCoord::new(0, 0), "mara", 1);
        assert!(viewport.group_box(&locks).is_none());
    }

    #[test]
    fn focus_follows_first_selected_tile() {
        let mut viewport = ready_viewport();
        let locks = TileLockStore::new();
        let tile = TileCoord::new(10, -20);
        let (x, y) = css_for_tile(&viewport, tile);
        viewport.pointer_down(x, y, false, &locks);
        viewport.pointer_up(&locks);
        let expected = viewport
            .config()
            .tile_center_world(viewport.offset(), tile);
        assert_eq!(viewport.focus_world(), expected);

        viewport.clear_selection();
        let image_center = viewport
            .config()
            .image_center_world(viewport.offset());
        assert_eq!(viewport.focus_world(), image_center);
    }

    #[test]
    fn reconfigure_resets_mask_and_selection() {
        let mut viewport = ready_viewport();
        let locks = TileLockStore::new();
        let (x, y) = css_for_tile(&viewport, TileCoord::new(0, 0));
        viewport.pointer_down(x, y, false, &locks);
        assert!(viewport.ready());

        let config = GridConfig::new(2048, 2048, 24, None, None).unwrap();
        viewport.reconfigure(config);
        assert!(!viewport.mask_ready());
        assert!(viewport.mask().is_none());
        assert!(viewport.selection().is_empty());
        assert!(!viewport.ready());
    }
}
