//! Message channel to the mask-computation worker. The request carries grid
//! geometry; the worker answers with a stream of `maskProgress` messages and
//! exactly one terminal `maskGenerated` buffer.

use std::rc::Rc;

use js_sys::Reflect;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Event, MessageEvent, Worker};

pub(crate) struct MaskWorkerHooks {
    pub on_progress: Rc<dyn Fn(u32)>,
    pub on_complete: Rc<dyn Fn(Vec<u8>)>,
    pub on_error: Rc<dyn Fn(String)>,
}

/// Owns the worker plus its callback closures; dropping this detaches the
/// channel.
pub(crate) struct MaskWorker {
    worker: Worker,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
}

impl MaskWorker {
    pub(crate) fn spawn(src: &str, hooks: MaskWorkerHooks) -> Result<Self, JsValue> {
        let worker = Worker::new(src)?;

        let progress = hooks.on_progress;
        let complete = hooks.on_complete;
        let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
            let data = event.data();
            let Some(kind) = Reflect::get(&data, &JsValue::from_str("type"))
                .ok()
                .and_then(|value| value.as_string())
            else {
                return;
            };
            match kind.as_str() {
                "maskProgress" => {
                    if let Some(percent) = Reflect::get(&data, &JsValue::from_str("percent"))
                        .ok()
                        .and_then(|value| value.as_f64())
                    {
                        progress(percent.clamp(0.0, 100.0) as u32);
                    }
                }
                "maskGenerated" => {
                    if let Ok(buffer) = Reflect::get(&data, &JsValue::from_str("maskBuffer")) {
                        let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
                        complete(bytes);
                    }
                }
                _ => {}
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        worker.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let error_hook = hooks.on_error;
        let on_error = Closure::wrap(Box::new(move |_event: Event| {
            error_hook("mask worker failed".to_string());
        }) as Box<dyn FnMut(Event)>);
        worker.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        Ok(Self {
            worker,
            _on_message: on_message,
            _on_error: on_error,
        })
    }

    pub(crate) fn request_mask(
        &self,
        cols: u32,
        rows: u32,
        tile_size: u32,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<(), JsValue> {
        let message = js_sys::Object::new();
        Reflect::set(
            &message,
            &JsValue::from_str("type"),
            &JsValue::from_str("generateMask"),
        )?;
        Reflect::set(
            &message,
            &JsValue::from_str("cols"),
            &JsValue::from_f64(cols as f64),
        )?;
        Reflect::set(
            &message,
            &JsValue::from_str("rows"),
            &JsValue::from_f64(rows as f64),
        )?;
        Reflect::set(
            &message,
            &JsValue::from_str("tileSize"),
            &JsValue::from_f64(tile_size as f64),
        )?;
        Reflect::set(
            &message,
            &JsValue::from_str("offsetX"),
            &JsValue::from_f64(offset_x),
        )?;
        Reflect::set(
            &message,
            &JsValue::from_str("offsetY"),
            &JsValue::from_f64(offset_y),
        )?;
        self.worker.post_message(&message)
    }
}
