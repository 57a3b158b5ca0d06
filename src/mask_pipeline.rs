//! Cache-then-compute mask acquisition. A durable-cache hit installs the
//! mask immediately; a miss (or an unavailable cache) hands the geometry to
//! the worker and installs the buffer it streams back.

use std::rc::Rc;

use crate::idb;
use crate::status;
use crate::viewer::Viewer;

pub(crate) async fn start(viewer: Rc<Viewer>) {
    status::show_progress(true, 0, "Loading mask…");
    let key = viewer.mask_key();
    match idb::open_db().await {
        Ok(db) => {
            let cached = match idb::get_bytes(&db, &key).await {
                Ok(cached) => cached,
                Err(err) => {
                    gloo::console::warn!("mask cache read failed", idb::js_err(err));
                    None
                }
            };
            viewer.set_db(Some(db));
            if let Some(bytes) = cached {
                if viewer.install_mask(bytes, false) {
                    status::show_progress(false, 100, "");
                    return;
                }
                // Stale or truncated cache entry: fall through to recompute.
            }
        }
        Err(err) => {
            // Cache unavailable degrades to compute-always, never fatal.
            gloo::console::warn!("mask cache unavailable", idb::js_err(err));
        }
    }
    viewer.request_mask_from_worker();
}
