//! Mask computation in a dedicated Web Worker. The shell posts one
//! `generateMask` request with the grid geometry; this crate scans the
//! reference mask image tile by tile, streams `maskProgress` percentages,
//! and finishes with a single `maskGenerated` buffer of 0/1 bytes.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, DedicatedWorkerGlobalScope, ImageBitmap, MessageEvent, OffscreenCanvas,
    OffscreenCanvasRenderingContext2d, Response,
};

use tilescope_core::MASK_DARK_THRESHOLD;

const MASK_IMAGE_SRC: &str = "./assets/mainmask.png";

#[derive(Clone, Copy, Debug)]
struct MaskRequest {
    cols: u32,
    rows: u32,
    tile_size: u32,
}

#[wasm_bindgen(start)]
pub fn start() {
    let Ok(scope) = js_sys::global().dyn_into::<DedicatedWorkerGlobalScope>() else {
        return;
    };
    let scope_for_message = scope.clone();
    let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
        let Some(request) = parse_request(&event.data()) else {
            return;
        };
        let scope = scope_for_message.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = generate_mask(&scope, request).await {
                gloo::console::warn!("mask generation failed", err);
            }
        });
    }) as Box<dyn FnMut(MessageEvent)>);
    scope.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    on_message.forget();
}

fn parse_request(data: &JsValue) -> Option<MaskRequest> {
    let kind = js_sys::Reflect::get(data, &JsValue::from_str("type"))
        .ok()?
        .as_string()?;
    if kind != "generateMask" {
        return None;
    }
    let field = |name: &str| {
        js_sys::Reflect::get(data, &JsValue::from_str(name))
            .ok()
            .and_then(|value| value.as_f64())
    };
    Some(MaskRequest {
        cols: field("cols")? as u32,
        rows: field("rows")? as u32,
        tile_size: field("tileSize")? as u32,
    })
}

async fn generate_mask(
    scope: &DedicatedWorkerGlobalScope,
    request: MaskRequest,
) -> Result<(), JsValue> {
    let bitmap = fetch_mask_bitmap(scope).await?;
    let width = bitmap.width();
    let height = bitmap.height();
    let canvas = OffscreenCanvas::new(width, height)?;
    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("no 2d context"))?
        .dyn_into::<OffscreenCanvasRenderingContext2d>()?;
    ctx.draw_image_with_image_bitmap(&bitmap, 0.0, 0.0)?;

    let total = request.cols as usize * request.rows as usize;
    if total == 0 {
        return Err(JsValue::from_str("empty mask request"));
    }
    let mut mask = vec![0u8; total];
    let step = (total / 100).max(1);
    let tile = request.tile_size as f64;
    let mut done = 0usize;
    for y in 0..request.rows {
        for x in 0..request.cols {
            let x0 = (x as f64 * tile).floor();
            let y0 = (y as f64 * tile).floor();
            let x1 = ((x as f64 + 1.0) * tile).ceil().min(width as f64);
            let y1 = ((y as f64 + 1.0) * tile).ceil().min(height as f64);
            let index = y as usize * request.cols as usize + x as usize;
            if x1 > x0 && y1 > y0 {
                let data = ctx.get_image_data(x0, y0, x1 - x0, y1 - y0)?.data();
                if has_ink(&data) {
                    mask[index] = 1;
                }
            }
            done += 1;
            if done % step == 0 || done == total {
                let percent = ((done as f64 / total as f64) * 100.0).round() as u32;
                post_progress(scope, percent)?;
            }
        }
    }
    post_mask(scope, &mask)
}

/// A tile is usable when any pixel in its footprint is near-black.
fn has_ink(data: &[u8]) -> bool {
    data.chunks_exact(4).any(|pixel| {
        pixel[0] < MASK_DARK_THRESHOLD
            && pixel[1] < MASK_DARK_THRESHOLD
            && pixel[2] < MASK_DARK_THRESHOLD
    })
}

async fn fetch_mask_bitmap(scope: &DedicatedWorkerGlobalScope) -> Result<ImageBitmap, JsValue> {
    let response: Response = JsFuture::from(scope.fetch_with_str(MASK_IMAGE_SRC))
        .await?
        .dyn_into()?;
    let blob: Blob = JsFuture::from(response.blob()?).await?.dyn_into()?;
    JsFuture::from(scope.create_image_bitmap_with_blob(&blob)?)
        .await?
        .dyn_into::<ImageBitmap>()
}

fn post_progress(scope: &DedicatedWorkerGlobalScope, percent: u32) -> Result<(), JsValue> {
    let message = js_sys::Object::new();
    js_sys::Reflect::set(
        &message,
        &JsValue::from_str("type"),
        &JsValue::from_str("maskProgress"),
    )?;
    js_sys::Reflect::set(
        &message,
        &JsValue::from_str("percent"),
        &JsValue::from_f64(percent as f64),
    )?;
    scope.post_message(&message)
}

fn post_mask(scope: &DedicatedWorkerGlobalScope, mask: &[u8]) -> Result<(), JsValue> {
    let array = js_sys::Uint8Array::from(mask);
    let message = js_sys::Object::new();
    js_sys::Reflect::set(
        &message,
        &JsValue::from_str("type"),
        &JsValue::from_str("maskGenerated"),
    )?;
    js_sys::Reflect::set(
        &message,
        &JsValue::from_str("maskBuffer"),
        &array.buffer(),
    )?;
    scope.post_message(&message)
}
