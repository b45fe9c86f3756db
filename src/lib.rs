/// UnderPAR side panel - ESM decomp workspace and IMS login helper
/// Built with Rust + WASM + Yew

pub mod channel;
pub mod columns;
pub mod config;
pub mod dates;
pub mod error;
pub mod login;
pub mod messages;
pub mod report;
pub mod request_context;
pub mod sort;
pub mod storage;
pub mod table;
pub mod workspace;
pub mod ui;

use wasm_bindgen::prelude::*;
use crate::config::PanelConfig;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export column normalization for the side-panel scripts
#[wasm_bindgen]
pub fn normalize_esm_columns(columns: JsValue) -> Result<JsValue, JsValue> {
    let columns: Vec<serde_json::Value> = serde_wasm_bindgen::from_value(columns)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse columns: {:?}", e)))?;
    serde_wasm_bindgen::to_value(&columns::normalize_json_columns(&columns))
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize columns: {:?}", e)))
}

// Start the Yew app for the decomp workspace tab
#[wasm_bindgen]
pub fn start_workspace(config_json: Option<String>) {
    let config = PanelConfig::from_json(config_json.as_deref());
    yew::Renderer::<ui::workspace::Workspace>::with_props(ui::workspace::WorkspaceProps {
        config: config.workspace,
    })
    .render();
}

// Start the Yew app for the login helper window
#[wasm_bindgen]
pub fn start_login_helper(config_json: Option<String>) {
    let config = PanelConfig::from_json(config_json.as_deref());
    yew::Renderer::<ui::login::LoginHelperPage>::with_props(ui::login::LoginHelperProps {
        ims: config.ims,
    })
    .render();
}
