/// UI module exports
use wasm_bindgen::JsValue;

pub mod card;
pub mod components;
pub mod login;
pub mod workspace;

/// Readable text for a rejected JS promise: the string itself, an Error's
/// `message`, or the debug form.
pub(crate) fn js_error_text(error: &JsValue) -> String {
    if let Some(text) = error.as_string() {
        return text;
    }
    js_sys::Reflect::get(error, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}
