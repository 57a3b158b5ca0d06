use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::events::{EventListener, EventListenerOptions, EventListenerPhase};
use gloo::render::{request_animation_frame, AnimationFrame};
use js_sys::Date;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    CanvasRenderingContext2d, Event, HtmlCanvasElement, HtmlImageElement, IdbDatabase,
    ImageBitmap, PointerEvent, WheelEvent,
};

use tilescope_core::{
    mask_cache_key, Error, GridConfig, RenderScheduler, TileCoord, TileLockStore, TileMask,
    Viewport,
};

use crate::lock_backend::LocalStorageBackend;
use crate::worker_bridge::{MaskWorker, MaskWorkerHooks};
use crate::{idb, mask_pipeline, renderer, status};

pub(crate) struct ViewerOptions {
    pub image_width: u32,
    pub image_height: u32,
    pub tile_size: u32,
    pub coord_min_x: Option<i32>,
    pub coord_min_y: Option<i32>,
    pub image_src: String,
    pub worker_src: String,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            image_width: 4096,
            image_height: 4096,
            tile_size: 24,
            coord_min_x: None,
            coord_min_y: None,
            image_src: "./assets/mainmap.png".to_string(),
            worker_src: "./mask_worker.js".to_string(),
        }
    }
}

/// The one shared viewer: core viewport + lock store + render pacing, plus
/// every browser-side collaborator. All interaction handlers run on the main
/// thread; interior mutability keeps borrows short and non-overlapping.
pub(crate) struct Viewer {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    viewport: RefCell<Viewport>,
    locks: RefCell<TileLockStore>,
    scheduler: RefCell<RenderScheduler>,
    image: RefCell<Option<ImageBitmap>>,
    db: RefCell<Option<IdbDatabase>>,
    worker: RefCell<Option<MaskWorker>>,
    mask_key: RefCell<String>,
    needs_redraw: Cell<bool>,
    raf: RefCell<Option<AnimationFrame>>,
    listeners: RefCell<Vec<EventListener>>,
    options: ViewerOptions,
}

impl Viewer {
    pub(crate) fn boot(options: ViewerOptions) -> Result<Rc<Self>, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("missing window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("missing document"))?;
        let canvas = document
            .get_element_by_id("canvas")
            .ok_or_else(|| JsValue::from_str("missing #canvas"))?
            .dyn_into::<HtmlCanvasElement>()?;
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()?;

        let config = GridConfig::new(
            options.image_width,
            options.image_height,
            options.tile_size,
            options.coord_min_x,
            options.coord_min_y,
        )
        .map_err(|err| JsValue::from_str(&err.to_string()))?;

        let locks = match LocalStorageBackend::open() {
            Ok(backend) => TileLockStore::with_backend(Box::new(backend)),
            Err(err) => {
                gloo::console::warn!("lock store degraded to memory-only", err.to_string());
                TileLockStore::new()
            }
        };

        let mask_key = mask_cache_key(config.cols, config.rows, config.tile_size);
        let viewer = Rc::new(Self {
            canvas,
            ctx,
            viewport: RefCell::new(Viewport::new(config)),
            locks: RefCell::new(locks),
            scheduler: RefCell::new(RenderScheduler::new()),
            image: RefCell::new(None),
            db: RefCell::new(None),
            worker: RefCell::new(None),
            mask_key: RefCell::new(mask_key),
            needs_redraw: Cell::new(false),
            raf: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            options,
        });

        viewer.resize_canvas();
        viewer.install_listeners();
        spawn_local(mask_pipeline::start(Rc::clone(&viewer)));
        viewer.load_image();
        Ok(viewer)
    }

    pub(crate) fn mask_key(&self) -> String {
        self.mask_key.borrow().clone()
    }

    pub(crate) fn set_db(&self, db: Option<IdbDatabase>) {
        *self.db.borrow_mut() = db;
    }

    fn install_listeners(self: &Rc<Self>) {
        let mut listeners = Vec::new();
        let window = match web_sys::window() {
            Some(window) => window,
            None => return,
        };

        let view = Rc::clone(self);
        let canvas = self.canvas.clone();
        let listener = EventListener::new_with_options(
            &self.canvas,
            "pointerdown",
            EventListenerOptions {
                phase: EventListenerPhase::Bubble,
                passive: false,
            },
            move |event: &Event| {
                let Some(event) = event.dyn_ref::<PointerEvent>() else {
                    return;
                };
                if !view.viewport.borrow().ready() {
                    return;
                }
                let rect = canvas.get_bounding_client_rect();
                let css_x = event.client_x() as f64 - rect.left();
                let css_y = event.client_y() as f64 - rect.top();
                let group_modifier = event.shift_key() || event.ctrl_key();
                let changed = {
                    let locks = view.locks.borrow();
                    view.viewport
                        .borrow_mut()
                        .pointer_down(css_x, css_y, group_modifier, &locks)
                };
                if changed {
                    view.update_info();
                    view.request_draw();
                }
                event.prevent_default();
            },
        );
        listeners.push(listener);

        let view = Rc::clone(self);
        let canvas = self.canvas.clone();
        let listener = EventListener::new(&window, "pointermove", move |event: &Event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else {
                return;
            };
            if !view.viewport.borrow().ready() {
                return;
            }
            let rect = canvas.get_bounding_client_rect();
            let css_x = event.client_x() as f64 - rect.left();
            let css_y = event.client_y() as f64 - rect.top();
            let changed = view.viewport.borrow_mut().pointer_move(css_x, css_y);
            {
                let viewport = view.viewport.borrow();
                let label = match viewport.hovered() {
                    Some(tile) if viewport.valid_tile(tile) => format!("{},{}", tile.x, tile.y),
                    _ => "-".to_string(),
                };
                status::set_tile_display(&label);
            }
            if changed {
                view.request_draw();
            }
        });
        listeners.push(listener);

        let view = Rc::clone(self);
        let listener = EventListener::new(&window, "pointerup", move |_event: &Event| {
            if !view.viewport.borrow().ready() {
                return;
            }
            let changed = {
                let locks = view.locks.borrow();
                view.viewport.borrow_mut().pointer_up(&locks)
            };
            if changed {
                view.update_info();
                view.request_draw();
            }
        });
        listeners.push(listener);

        let view = Rc::clone(self);
        let canvas = self.canvas.clone();
        let listener = EventListener::new_with_options(
            &self.canvas,
            "wheel",
            EventListenerOptions {
                phase: EventListenerPhase::Bubble,
                passive: false,
            },
            move |event: &Event| {
                let Some(event) = event.dyn_ref::<WheelEvent>() else {
                    return;
                };
                if !view.viewport.borrow().ready() {
                    return;
                }
                let rect = canvas.get_bounding_client_rect();
                let css_x = event.client_x() as f64 - rect.left();
                let css_y = event.client_y() as f64 - rect.top();
                let changed = view
                    .viewport
                    .borrow_mut()
                    .wheel(css_x, css_y, event.delta_y());
                if changed {
                    view.update_scale_display();
                    view.request_draw();
                }
                event.prevent_default();
            },
        );
        listeners.push(listener);

        let view = Rc::clone(self);
        let listener = EventListener::new(&window, "resize", move |_event: &Event| {
            view.resize_canvas();
            view.request_draw();
        });
        listeners.push(listener);

        if let Some(button) = window
            .document()
            .and_then(|document| document.get_element_by_id("purgeCacheButton"))
        {
            let view = Rc::clone(self);
            let listener = EventListener::new(&button, "click", move |_event: &Event| {
                view.purge_cache();
            });
            listeners.push(listener);
        }

        self.listeners.borrow_mut().extend(listeners);
    }

    fn resize_canvas(&self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let width = window
            .inner_width()
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0);
        let height = window
            .inner_height()
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0);
        let dpr = window.device_pixel_ratio();
        self.canvas.set_width((width * dpr) as u32);
        self.canvas.set_height((height * dpr) as u32);
        let _ = self.canvas.style().set_property("width", &format!("{width}px"));
        let _ = self
            .canvas
            .style()
            .set_property("height", &format!("{height}px"));
        self.viewport
            .borrow_mut()
            .set_canvas_size(width * dpr, height * dpr, dpr);
        self.needs_redraw.set(true);
    }

    /// Coalesced redraw: any number of requests collapse into at most one
    /// draw per animation frame, and nothing draws before readiness.
    pub(crate) fn request_draw(self: &Rc<Self>) {
        if !self.viewport.borrow().ready() {
            return;
        }
        self.needs_redraw.set(true);
        if self.raf.borrow().is_some() {
            return;
        }
        let view = Rc::clone(self);
        let handle = request_animation_frame(move |timestamp| view.on_frame(timestamp));
        *self.raf.borrow_mut() = Some(handle);
    }

    fn on_frame(self: &Rc<Self>, timestamp: f64) {
        self.raf.borrow_mut().take();
        if !self.needs_redraw.replace(false) {
            return;
        }
        let margin = self.scheduler.borrow_mut().begin_frame(timestamp);
        let viewport = self.viewport.borrow();
        let locks = self.locks.borrow();
        let image = self.image.borrow();
        let Some(image) = image.as_ref() else {
            return;
        };
        let Some(window) = viewport.render_window(margin) else {
            return;
        };
        if let Err(err) = renderer::draw(&self.ctx, &self.canvas, &viewport, &locks, image, window)
        {
            gloo::console::warn!("draw failed", err);
        }
    }

    fn load_image(self: &Rc<Self>) {
        let Ok(img) = HtmlImageElement::new() else {
            return;
        };
        let view = Rc::clone(self);
        let img_for_load = img.clone();
        let listener = EventListener::once(&img, "load", move |_event: &Event| {
            view.on_image_loaded(img_for_load);
        });
        self.listeners.borrow_mut().push(listener);
        let listener = EventListener::once(&img, "error", move |_event: &Event| {
            gloo::console::warn!("map image failed to load");
            status::show_progress(true, 100, "Error: image load failed.");
        });
        self.listeners.borrow_mut().push(listener);
        img.set_src(&self.options.image_src);
    }

    fn on_image_loaded(self: &Rc<Self>, img: HtmlImageElement) {
        let width = img.natural_width();
        let height = img.natural_height();
        let needs_reconfigure = {
            let viewport = self.viewport.borrow();
            let config = viewport.config();
            width != config.image_width || height != config.image_height
        };
        if needs_reconfigure {
            // The decoded image is authoritative; rebuild geometry around it
            // (keeping the established coordinate origin) and restart the
            // mask pipeline under the new cache key.
            let (tile_size, min_x, min_y) = {
                let viewport = self.viewport.borrow();
                let config = viewport.config();
                (config.tile_size, config.coord_min_x, config.coord_min_y)
            };
            match GridConfig::new(width, height, tile_size, Some(min_x), Some(min_y)) {
                Ok(config) => {
                    self.viewport.borrow_mut().reconfigure(config);
                    *self.mask_key.borrow_mut() =
                        mask_cache_key(config.cols, config.rows, config.tile_size);
                    spawn_local(mask_pipeline::start(Rc::clone(self)));
                }
                Err(err) => {
                    gloo::console::warn!("image dimensions rejected", err.to_string());
                    return;
                }
            }
        }
        let view = Rc::clone(self);
        spawn_local(async move {
            let Some(window) = web_sys::window() else {
                return;
            };
            let promise = match window.create_image_bitmap_with_html_image_element(&img) {
                Ok(promise) => promise,
                Err(err) => {
                    gloo::console::warn!("createImageBitmap failed", err);
                    return;
                }
            };
            match wasm_bindgen_futures::JsFuture::from(promise).await {
                Ok(value) => {
                    let Ok(bitmap) = value.dyn_into::<ImageBitmap>() else {
                        return;
                    };
                    *view.image.borrow_mut() = Some(bitmap);
                    view.viewport.borrow_mut().set_image_ready(true);
                    view.maybe_ready();
                }
                Err(err) => {
                    gloo::console::warn!("image decode failed", err);
                }
            }
        });
    }

    /// Installs a mask buffer into the viewport; `persist` additionally
    /// writes it back to the durable cache. Returns false when the buffer
    /// does not fit the current geometry.
    pub(crate) fn install_mask(self: &Rc<Self>, bytes: Vec<u8>, persist: bool) -> bool {
        let (cols, rows) = {
            let viewport = self.viewport.borrow();
            let config = viewport.config();
            (config.cols, config.rows)
        };
        let mask = match TileMask::new(cols, rows, bytes) {
            Ok(mask) => mask,
            Err(err) => {
                gloo::console::warn!("mask buffer rejected", err.to_string());
                return false;
            }
        };
        if persist {
            if let Some(db) = self.db.borrow().as_ref() {
                let db = db.clone();
                let key = self.mask_key();
                let bytes = mask.as_bytes().to_vec();
                spawn_local(async move {
                    if let Err(err) = idb::put_bytes(&db, &key, &bytes).await {
                        gloo::console::warn!("mask cache write failed", idb::js_err(err));
                    }
                });
            }
        }
        self.viewport.borrow_mut().install_mask(mask);
        self.maybe_ready();
        true
    }

    pub(crate) fn request_mask_from_worker(self: &Rc<Self>) {
        status::show_progress(true, 0, "Initializing worker…");
        let on_progress = Rc::new(|percent: u32| {
            status::show_progress(true, percent, &format!("Generating mask: {percent}%"));
        });
        let view = Rc::clone(self);
        let on_complete = Rc::new(move |bytes: Vec<u8>| {
            if view.install_mask(bytes, true) {
                status::show_progress(false, 100, "Done");
            }
        });
        let on_error = Rc::new(|message: String| {
            // No silent fail-open for the whole map; the UI stays hidden.
            gloo::console::warn!(
                "mask worker unavailable",
                Error::WorkerUnavailable(message).to_string()
            );
            status::show_progress(true, 100, "Error: worker init failed.");
        });

        let worker = match MaskWorker::spawn(
            &self.options.worker_src,
            MaskWorkerHooks {
                on_progress,
                on_complete,
                on_error,
            },
        ) {
            Ok(worker) => worker,
            Err(err) => {
                gloo::console::warn!("mask worker spawn failed", err);
                status::show_progress(true, 100, "Error: worker init failed.");
                return;
            }
        };

        let (cols, rows, tile_size, offset_x, offset_y) = {
            let viewport = self.viewport.borrow();
            let config = viewport.config();
            let offset = viewport.offset();
            (config.cols, config.rows, config.tile_size, offset.x, offset.y)
        };
        status::show_progress(true, 0, "Generating mask…");
        if let Err(err) = worker.request_mask(cols, rows, tile_size, offset_x, offset_y) {
            gloo::console::warn!("mask request failed", err);
            status::show_progress(true, 100, "Error: worker init failed.");
            return;
        }
        *self.worker.borrow_mut() = Some(worker);
    }

    fn maybe_ready(self: &Rc<Self>) {
        if !self.viewport.borrow().ready() {
            return;
        }
        self.resize_canvas();
        self.viewport.borrow_mut().center_view();
        self.request_draw();
        status::reveal_ui();
        self.update_scale_display();
        self.update_info();
    }

    /// Host purge command: discard the in-memory mask and the durable cache,
    /// then restart the whole load sequence via a reload.
    pub(crate) fn purge_cache(self: &Rc<Self>) {
        if let Some(db) = self.db.borrow_mut().take() {
            db.close();
        }
        self.viewport.borrow_mut().clear_mask();
        spawn_local(async {
            if let Err(err) = idb::delete_database().await {
                gloo::console::warn!("mask cache purge failed", idb::js_err(err));
            }
            if let Some(window) = web_sys::window() {
                let _ = window.location().reload();
            }
        });
    }

    /// Claim workflow: lock every currently selected tile for `user`. The
    /// viewport itself never writes locks; this is the external mutation
    /// path.
    pub(crate) fn claim_selected(self: &Rc<Self>, user: &str) {
        let tiles: Vec<TileCoord> = self.viewport.borrow().selection().iter().collect();
        if tiles.is_empty() {
            return;
        }
        self.locks
            .borrow_mut()
            .lock_many(&tiles, user, Date::now() as i64);
        self.request_draw();
    }

    pub(crate) fn release_selected(self: &Rc<Self>) {
        let tiles: Vec<TileCoord> = self.viewport.borrow().selection().iter().collect();
        if tiles.is_empty() {
            return;
        }
        self.locks.borrow_mut().unlock_many(&tiles);
        self.request_draw();
    }

    pub(crate) fn export_locks(&self) -> String {
        self.locks.borrow().export_json()
    }

    pub(crate) fn import_locks(self: &Rc<Self>, json: &str) -> Result<usize, Error> {
        let merged = self.locks.borrow_mut().import_json(json)?;
        self.request_draw();
        Ok(merged)
    }

    pub(crate) fn reset_view(self: &Rc<Self>) {
        self.viewport.borrow_mut().reset_view();
        self.update_scale_display();
        self.request_draw();
    }

    pub(crate) fn clear_selection(self: &Rc<Self>) {
        self.viewport.borrow_mut().clear_selection();
        self.update_info();
        self.request_draw();
    }

    fn update_info(&self) {
        status::set_selected_count(self.viewport.borrow().selection().len());
    }

    fn update_scale_display(&self) {
        status::set_scale_display(self.viewport.borrow().view().scale);
    }
}
