//! Canvas-2D drawing of one frame, bounded to the render window. Transform
//! order matters: devicePixelRatio first, then the pan translation, then the
//! zoom scale. Each phase scopes its own style state with save/restore.

use tilescope_core::viewport::{EDGE_BOTTOM, EDGE_LEFT, EDGE_RIGHT, EDGE_TOP};
use tilescope_core::{RenderWindow, TileCoord, TileLockStore, Viewport};
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageBitmap};

const GRID_LINE_STYLE: &str = "rgba(255,255,255,0.15)";
const MASK_BOUNDARY_STYLE: &str = "#47ff55";
const SELECTION_FILL: &str = "rgba(54,162,235,0.4)";
const GROUP_BOX_STYLE: &str = "rgba(255,159,64,0.6)";
const HOVER_STYLE: &str = "rgba(255,205,86,0.8)";

pub(crate) fn draw(
    ctx: &CanvasRenderingContext2d,
    canvas: &HtmlCanvasElement,
    viewport: &Viewport,
    locks: &TileLockStore,
    image: &ImageBitmap,
    window: RenderWindow,
) -> Result<(), JsValue> {
    let view = viewport.view();
    let config = *viewport.config();
    let offset = viewport.offset();
    let scale = view.scale;
    let dpr = viewport.dpr();
    let tile = config.tile_size as f64;

    ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
    ctx.clear_rect(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);

    ctx.save();
    ctx.scale(dpr, dpr)?;
    ctx.translate(-view.pan_x * scale, -view.pan_y * scale)?;
    ctx.scale(scale, scale)?;
    ctx.set_image_smoothing_enabled(scale < 1.0);

    ctx.draw_image_with_image_bitmap_and_dw_and_dh(
        image,
        offset.x,
        offset.y,
        config.image_width as f64,
        config.image_height as f64,
    )?;

    // Grid lines for allowed tiles inside the window.
    let cells = viewport.allowed_cells(locks, window);
    if !cells.is_empty() {
        ctx.save();
        ctx.set_stroke_style_str(GRID_LINE_STYLE);
        ctx.set_line_width(1.0 / (scale * dpr));
        ctx.begin_path();
        for (ix, iy) in &cells {
            let (px, py) = config.index_origin(offset, *ix, *iy);
            ctx.rect(px, py, tile, tile);
        }
        ctx.stroke();
        ctx.restore();
    }

    // Mask boundary: only the edges facing a disallowed neighbor, batched
    // into a single stroked path.
    let edges = viewport.boundary_edges(locks, window);
    if !edges.is_empty() {
        ctx.save();
        ctx.set_stroke_style_str(MASK_BOUNDARY_STYLE);
        ctx.set_line_width(3.0 / (scale * dpr));
        ctx.begin_path();
        for edge in &edges {
            let (px, py) = config.index_origin(offset, edge.ix, edge.iy);
            if edge.sides & EDGE_TOP != 0 {
                ctx.move_to(px, py);
                ctx.line_to(px + tile, py);
            }
            if edge.sides & EDGE_RIGHT != 0 {
                ctx.move_to(px + tile, py);
                ctx.line_to(px + tile, py + tile);
            }
            if edge.sides & EDGE_BOTTOM != 0 {
                ctx.move_to(px + tile, py + tile);
                ctx.line_to(px, py + tile);
            }
            if edge.sides & EDGE_LEFT != 0 {
                ctx.move_to(px, py + tile);
                ctx.line_to(px, py);
            }
        }
        ctx.stroke();
        ctx.restore();
    }

    // Selected tiles still allowed and inside the window.
    ctx.save();
    ctx.set_fill_style_str(SELECTION_FILL);
    for selected in viewport.selection().iter() {
        let (ix, iy) = config.index_of(selected);
        if ix < 0 || iy < 0 {
            continue;
        }
        let (ix, iy) = (ix as u32, iy as u32);
        if !window.contains_index(ix, iy) {
            continue;
        }
        if !viewport.cell_allowed(locks, selected) {
            continue;
        }
        let (px, py) = config.index_origin(offset, ix, iy);
        ctx.fill_rect(px, py, tile, tile);
    }
    ctx.restore();

    // In-progress group rectangle, only when it holds at least one allowed
    // tile.
    if let Some(group) = viewport.group_box(locks) {
        let (ix, iy) = config.index_of(TileCoord::new(group.x0, group.y0));
        let (px, py) = config.index_origin(offset, ix as u32, iy as u32);
        ctx.save();
        ctx.set_stroke_style_str(GROUP_BOX_STYLE);
        ctx.set_line_width(2.0 / (scale * dpr));
        ctx.stroke_rect(
            px,
            py,
            (group.x1 - group.x0 + 1) as f64 * tile,
            (group.y1 - group.y0 + 1) as f64 * tile,
        );
        ctx.restore();
    }

    // Hovered tile, dashed.
    if let Some(hovered) = viewport.hovered() {
        if viewport.valid_tile(hovered) && viewport.cell_allowed(locks, hovered) {
            let (ix, iy) = config.index_of(hovered);
            let (px, py) = config.index_origin(offset, ix as u32, iy as u32);
            ctx.save();
            ctx.set_stroke_style_str(HOVER_STYLE);
            ctx.set_line_width(2.0 / (scale * dpr));
            let dash = 2.0 / (scale * dpr);
            let segments: JsValue =
                js_sys::Array::of2(&JsValue::from_f64(dash), &JsValue::from_f64(dash)).into();
            ctx.set_line_dash(&segments)?;
            ctx.stroke_rect(px, py, tile, tile);
            ctx.restore();
        }
    }

    ctx.restore();
    Ok(())
}
