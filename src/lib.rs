//! Tilescope: a pannable, zoomable tile-grid viewer over one large map
//! image, with per-tile mask gating and a local claim-lock workflow. The
//! engine lives in `tilescope-core`; this crate is the browser shell.

mod idb;
mod lock_backend;
mod mask_pipeline;
mod renderer;
mod status;
mod viewer;
mod worker_bridge;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::viewer::{Viewer, ViewerOptions};

thread_local! {
    static VIEWER: RefCell<Option<Rc<Viewer>>> = RefCell::new(None);
}

#[wasm_bindgen(start)]
pub fn start() {
    match Viewer::boot(ViewerOptions::default()) {
        Ok(viewer) => VIEWER.with(|slot| *slot.borrow_mut() = Some(viewer)),
        Err(err) => gloo::console::warn!("viewer boot failed", err),
    }
}

fn with_viewer<F: FnOnce(&Rc<Viewer>)>(action: F) {
    VIEWER.with(|slot| {
        if let Some(viewer) = slot.borrow().as_ref() {
            action(viewer);
        }
    });
}

/// Claim every selected tile for `user`. Exposed for the host's cell-action
/// menu; the viewport itself never mutates locks.
#[wasm_bindgen]
pub fn claim_selected(user: String) {
    with_viewer(|viewer| viewer.claim_selected(&user));
}

#[wasm_bindgen]
pub fn release_selected() {
    with_viewer(|viewer| viewer.release_selected());
}

#[wasm_bindgen]
pub fn reset_view() {
    with_viewer(|viewer| viewer.reset_view());
}

#[wasm_bindgen]
pub fn clear_selection() {
    with_viewer(|viewer| viewer.clear_selection());
}

/// Serialized lock set for manual exchange between users.
#[wasm_bindgen]
pub fn export_locks() -> String {
    let mut out = String::from("{}");
    with_viewer(|viewer| out = viewer.export_locks());
    out
}

/// Merges a previously exported lock set. Rejects unparsable JSON without
/// touching existing locks; returns the number of merged entries.
#[wasm_bindgen]
pub fn import_locks(json: String) -> Result<u32, JsValue> {
    let mut result = Ok(0);
    with_viewer(|viewer| result = viewer.import_locks(&json).map(|merged| merged as u32));
    result.map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn purge_cache() {
    with_viewer(|viewer| viewer.purge_cache());
}
