/// Login helper window

use yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use patternfly_yew::prelude::*;
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::config::ImsConfig;
use crate::login::flow::{LoginHelper, LoginHost};
use crate::login::profile::{IdentityRequest, IdentityResponse, IdentityTransport};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::ui::js_error_text;

// Import JS bridge functions
#[wasm_bindgen(module = "/login.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn fetchIdentity(request: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setExtensionSessionItems(items: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(message: JsValue) -> Result<JsValue, JsValue>;

    fn closeWindowAfter(delay_ms: u32);
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("Failed to serialize: {:?}", e))
}

/// The helper window itself: location, clock, status text and the
/// extension APIs behind `/login.js`.
struct BrowserLoginHost {
    status: UseStateHandle<String>,
}

#[async_trait(?Send)]
impl LoginHost for BrowserLoginHost {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn current_href(&self) -> String {
        web_sys::window()
            .and_then(|window| window.location().href().ok())
            .unwrap_or_default()
    }

    fn set_status(&self, text: &str) {
        self.status.set(text.to_string());
    }

    fn replace_location(&self, url: &str) {
        let replaced = web_sys::window()
            .map(|window| window.location().replace(url))
            .unwrap_or_else(|| Err(JsValue::from_str("no window")));
        if let Err(e) = replaced {
            warn!("Failed to redirect: {}", js_error_text(&e));
        }
    }

    fn close_window_soon(&self, delay_ms: u32) {
        closeWindowAfter(delay_ms);
    }

    async fn cache_result(&self, items: Value) -> Result<(), String> {
        setExtensionSessionItems(to_js(&items)?)
            .await
            .map_err(|e| format!("Failed to cache result: {}", js_error_text(&e)))
    }

    async fn post_message(&self, message: Value) -> Result<(), String> {
        sendRuntimeMessage(to_js(&message)?)
            .await
            .map(|_| ())
            .map_err(|e| js_error_text(&e))
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct FetchReply {
    ok: bool,
    status: u16,
    body: String,
}

/// CORS `fetch` from the helper page.
struct FetchTransport;

#[async_trait(?Send)]
impl IdentityTransport for FetchTransport {
    async fn get(&self, request: &IdentityRequest) -> Result<IdentityResponse, String> {
        let reply_js = fetchIdentity(to_js(request)?)
            .await
            .map_err(|e| js_error_text(&e))?;
        let reply: FetchReply = serde_wasm_bindgen::from_value(reply_js)
            .map_err(|e| format!("Failed to parse response: {:?}", e))?;

        Ok(IdentityResponse {
            ok: reply.ok,
            status: reply.status,
            body: reply.body,
        })
    }
}

/// The window's session storage, or memory when the browser refuses it.
enum HelperStore {
    Session(web_sys::Storage),
    Memory(MemoryStore),
}

impl HelperStore {
    fn open() -> HelperStore {
        match web_sys::window().and_then(|window| window.session_storage().ok().flatten()) {
            Some(storage) => HelperStore::Session(storage),
            None => {
                warn!("Session storage unavailable, helper state will not survive the redirect");
                HelperStore::Memory(MemoryStore::new())
            }
        }
    }

    fn inner(&self) -> &dyn KeyValueStore {
        match self {
            HelperStore::Session(storage) => storage as &dyn KeyValueStore,
            HelperStore::Memory(memory) => memory,
        }
    }
}

impl KeyValueStore for HelperStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner().get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        self.inner().set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        self.inner().remove_item(key)
    }
}

#[derive(Properties, PartialEq)]
pub struct LoginHelperProps {
    pub ims: ImsConfig,
}

#[function_component(LoginHelperPage)]
pub fn login_helper_page(props: &LoginHelperProps) -> Html {
    let status = use_state(|| "Preparing sign-in...".to_string());

    // Run the helper once on mount
    {
        let status = status.clone();
        let ims = props.ims.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                let helper = LoginHelper::new(
                    ims,
                    BrowserLoginHost { status },
                    FetchTransport,
                    HelperStore::open(),
                );
                helper.run().await;
            });
            || ()
        });
    }

    html! {
        <div class="container login-helper">
            <div class="loading-text-center">
                <Spinner />
                <p class="loading-text">{(*status).clone()}</p>
            </div>
        </div>
    }
}
