//! Thin host shims: progress indicator, chrome reveal, and the live
//! scale/selection/hover read-outs. Every call is forgiving — a missing
//! element is a host concern, not ours.

use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement};

fn document() -> Option<Document> {
    web_sys::window().and_then(|window| window.document())
}

fn element(id: &str) -> Option<HtmlElement> {
    document()?
        .get_element_by_id(id)?
        .dyn_into::<HtmlElement>()
        .ok()
}

pub(crate) fn show_progress(visible: bool, percent: u32, label: &str) {
    let Some(indicator) = element("loadingIndicator") else {
        return;
    };
    if visible {
        let _ = indicator.style().set_property("display", "block");
        if let Some(fill) = element("progressFill") {
            let _ = fill.style().set_property("width", &format!("{percent}%"));
        }
        if let Some(text) = element("progressText") {
            text.set_text_content(Some(label));
        }
    } else {
        let _ = indicator.style().set_property("display", "none");
    }
}

/// Unhides the chrome once both image and mask are ready.
pub(crate) fn reveal_ui() {
    for id in ["controls", "tileInfo", "footer"] {
        let Some(el) = element(id) else {
            continue;
        };
        let class_list = el.class_list();
        if class_list.contains("hidden") {
            let _ = class_list.remove_1("hidden");
            let _ = class_list.add_1("fade-in");
        }
    }
}

pub(crate) fn set_scale_display(scale: f64) {
    if let Some(el) = element("scaleDisplay") {
        el.set_text_content(Some(&format!("{scale:.2}")));
    }
}

pub(crate) fn set_selected_count(count: usize) {
    if let Some(el) = element("selectedCount") {
        el.set_text_content(Some(&count.to_string()));
    }
}

pub(crate) fn set_tile_display(label: &str) {
    if let Some(el) = element("tileDisplay") {
        el.set_text_content(Some(label));
    }
}
