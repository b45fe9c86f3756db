/// Login helper window: start the implicit grant, finish it on redirect,
/// or sign out, then report back to the extension and close
use crate::config::ImsConfig;
use crate::login::expiry::{decode_base64_url, parse_json_object};
use crate::login::profile::{IdentityTransport, fetch_organizations, fetch_profile};
use crate::login::redact::redact_sensitive_token_values;
use crate::login::redirect::parse_auth_response;
use crate::login::session::ImsSessionSnapshot;
use crate::storage::{
    HelperState, KeyValueStore, clear_helper_state, read_helper_state, result_storage_keys,
    write_helper_state,
};
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};
use url::{Url, form_urlencoded};

pub const HELPER_RESULT_MESSAGE_TYPE: &str = "underpar:loginHelperResult";
pub const LEGACY_HELPER_RESULT_MESSAGE_TYPE: &str = "mincloudlogin:loginHelperResult";
pub const CLOSE_WINDOW_DELAY_MS: u32 = 350;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMode {
    #[default]
    Login,
    Logout,
}

/// The helper page's own URL parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperQuery {
    pub mode: LoginMode,
    pub request_id: String,
    pub state: String,
    pub extra: Option<String>,
    pub from_ims: bool,
}

impl HelperQuery {
    pub fn from_href(href: &str) -> HelperQuery {
        let pairs: Vec<(String, String)> = Url::parse(href)
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default();
        let param = |key: &str| {
            pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.trim().to_string())
        };

        let mode = match param("mode") {
            Some(mode) if mode.eq_ignore_ascii_case("logout") => LoginMode::Logout,
            _ => LoginMode::Login,
        };
        let from_ims = param("from_ims").is_some_and(|flag| flag.eq_ignore_ascii_case("true"))
            || href.contains("from_ims=true");

        HelperQuery {
            mode,
            request_id: param("requestId").unwrap_or_default(),
            state: param("state").unwrap_or_default(),
            extra: param("extra").filter(|extra| !extra.is_empty()),
            from_ims,
        }
    }
}

/// Extra authorize parameters: base64url JSON object, anything else is empty.
pub fn decode_extra_params(raw: Option<&str>) -> Map<String, Value> {
    raw.and_then(decode_base64_url)
        .and_then(|text| parse_json_object(&text))
        .unwrap_or_default()
}

pub fn build_authorize_url(ims: &ImsConfig, request_state: &str, extra: &Map<String, Value>) -> String {
    let mut params: Vec<(String, String)> = [
        ("client_id", ims.client_id.as_str()),
        ("response_type", "token"),
        ("scope", ims.scope.as_str()),
        ("state", request_state),
        ("locale", ims.locale.as_str()),
        ("redirect_uri", ims.redirect_uri.as_str()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();

    for (key, value) in extra {
        let value = match value {
            Value::Null => continue,
            Value::String(text) if text.is_empty() => continue,
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        match params.iter_mut().find(|(name, _)| name == key) {
            Some(existing) => existing.1 = value,
            None => params.push((key.clone(), value)),
        }
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{}?{}", ims.authorize_url, query)
}

/// 24 hex characters of randomness.
pub fn random_token() -> String {
    let mut bytes = [0u8; 12];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => bytes.iter().map(|byte| format!("{:02x}", byte)).collect(),
        Err(e) => {
            warn!("No secure randomness available: {}", e);
            uuid::Uuid::new_v4().simple().to_string()[..24].to_string()
        }
    }
}

/// Outcome reported to the extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub ok: bool,
    pub mode: LoginMode,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ims_session: Option<ImsSessionSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underpar_only: Option<bool>,
}

impl LoginResult {
    fn failure(request_id: &str, message: String) -> LoginResult {
        LoginResult {
            ok: false,
            mode: LoginMode::Login,
            request_id: request_id.to_string(),
            error: Some(message),
            ..LoginResult::default()
        }
    }
}

/// Browser facilities the helper needs.
#[async_trait(?Send)]
pub trait LoginHost {
    fn now_ms(&self) -> f64;
    fn current_href(&self) -> String;
    fn set_status(&self, text: &str);
    fn replace_location(&self, url: &str);
    fn close_window_soon(&self, delay_ms: u32);
    /// Write `items` to extension session storage.
    async fn cache_result(&self, items: Value) -> Result<(), String>;
    async fn post_message(&self, message: Value) -> Result<(), String>;
}

pub struct LoginHelper<H, T, S> {
    ims: ImsConfig,
    host: H,
    transport: T,
    store: S,
}

impl<H: LoginHost, T: IdentityTransport, S: KeyValueStore> LoginHelper<H, T, S> {
    pub fn new(ims: ImsConfig, host: H, transport: T, store: S) -> Self {
        LoginHelper {
            ims,
            host,
            transport,
            store,
        }
    }

    pub async fn run(&self) {
        let query = HelperQuery::from_href(&self.host.current_href());
        match query.mode {
            LoginMode::Logout => self.begin_logout(&query).await,
            LoginMode::Login if query.from_ims => self.handle_redirect(&query).await,
            LoginMode::Login => self.begin_login(&query),
        }
    }

    /// Remember the request, then send the window to the authorize endpoint.
    pub fn begin_login(&self, query: &HelperQuery) {
        let request_id = non_empty_or_random(&query.request_id);
        let request_state = non_empty_or_random(&query.state);
        let extra = decode_extra_params(query.extra.as_deref());
        let authorize_url = build_authorize_url(&self.ims, &request_state, &extra);

        write_helper_state(
            &self.store,
            &HelperState {
                request_id,
                request_state,
                created_at: self.host.now_ms(),
            },
        );

        self.host.set_status("Redirecting to UnderPAR IMS...");
        self.host.replace_location(&authorize_url);
    }

    pub async fn handle_redirect(&self, query: &HelperQuery) {
        let stored = read_helper_state(&self.store).unwrap_or_default();
        let request_id = first_non_blank(&stored.request_id, &query.request_id);
        let expected_state = first_non_blank(&stored.request_state, &query.state);

        self.host.set_status("Finishing sign-in...");
        let auth = match parse_auth_response(&self.host.current_href(), &expected_state, self.host.now_ms()) {
            Ok(auth) => auth,
            Err(e) => {
                clear_helper_state(&self.store);
                self.fail_login(&request_id, &e.to_string()).await;
                return;
            }
        };

        let profile = fetch_profile(&self.transport, &self.ims, &auth.access_token).await;
        let organizations = fetch_organizations(&self.transport, &self.ims, &auth.access_token).await;
        clear_helper_state(&self.store);

        info!("Sign-in completed for request {}", request_id);
        self.emit(LoginResult {
            ok: true,
            mode: LoginMode::Login,
            request_id,
            access_token: Some(auth.access_token),
            expires_at: Some(auth.expires_at),
            token_type: Some(auth.token_type),
            scope: Some(auth.scope),
            id_token: Some(auth.id_token),
            refresh_token: Some(auth.refresh_token),
            ims_session: auth.ims_session,
            profile,
            organizations,
            ..LoginResult::default()
        })
        .await;

        self.host.set_status("Sign-in completed. Closing window...");
        self.host.close_window_soon(CLOSE_WINDOW_DELAY_MS);
    }

    pub async fn begin_logout(&self, query: &HelperQuery) {
        self.host.set_status("Signing out of UnderPAR...");
        clear_helper_state(&self.store);
        self.emit(LoginResult {
            ok: true,
            mode: LoginMode::Logout,
            request_id: query.request_id.clone(),
            underpar_only: Some(true),
            ..LoginResult::default()
        })
        .await;
        self.host.set_status("UnderPAR sign-out completed. Closing window...");
        self.host.close_window_soon(CLOSE_WINDOW_DELAY_MS);
    }

    async fn fail_login(&self, request_id: &str, message: &str) {
        let message = redact_sensitive_token_values(message);
        let message = if message.is_empty() {
            "Login failed.".to_string()
        } else {
            message
        };
        warn!("Sign-in failed: {}", message);
        self.host.set_status(&message);
        self.emit(LoginResult::failure(request_id, message)).await;
        self.host.close_window_soon(CLOSE_WINDOW_DELAY_MS);
    }

    /// Cache the result for polling, then message the opener under both the
    /// current and the legacy type. Each step may fail on its own.
    async fn emit(&self, mut result: LoginResult) {
        result.request_id = result.request_id.trim().to_string();
        let payload = match serde_json::to_value(&result) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize login result: {}", e);
                return;
            }
        };

        let keys = result_storage_keys(&result.request_id);
        if !keys.is_empty() {
            let items: Map<String, Value> = keys.into_iter().map(|key| (key, payload.clone())).collect();
            if let Err(e) = self.host.cache_result(Value::Object(items)).await {
                warn!("Failed to cache login result: {}", e);
            }
        }

        for message_type in [HELPER_RESULT_MESSAGE_TYPE, LEGACY_HELPER_RESULT_MESSAGE_TYPE] {
            let message = json!({ "type": message_type, "message": payload });
            if let Err(e) = self.host.post_message(message).await {
                warn!("{} not delivered: {}", message_type, e);
            }
        }
    }
}

fn non_empty_or_random(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        random_token()
    } else {
        value.to_string()
    }
}

fn first_non_blank(primary: &str, fallback: &str) -> String {
    let primary = primary.trim();
    if primary.is_empty() {
        fallback.trim().to_string()
    } else {
        primary.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::profile::{IdentityRequest, IdentityResponse};
    use crate::storage::{HELPER_STATE_KEY, MemoryStore};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use futures::executor::block_on;
    use std::cell::RefCell;

    const NOW: f64 = 1_700_000_000_000.0;

    #[derive(Default)]
    struct FakeHost {
        href: String,
        statuses: RefCell<Vec<String>>,
        location: RefCell<Option<String>>,
        closed_after: RefCell<Option<u32>>,
        cached: RefCell<Vec<Value>>,
        posted: RefCell<Vec<Value>>,
        opener_gone: bool,
    }

    impl FakeHost {
        fn at(href: &str) -> Self {
            FakeHost {
                href: href.to_string(),
                ..FakeHost::default()
            }
        }
    }

    #[async_trait(?Send)]
    impl LoginHost for FakeHost {
        fn now_ms(&self) -> f64 {
            NOW
        }

        fn current_href(&self) -> String {
            self.href.clone()
        }

        fn set_status(&self, text: &str) {
            self.statuses.borrow_mut().push(text.to_string());
        }

        fn replace_location(&self, url: &str) {
            *self.location.borrow_mut() = Some(url.to_string());
        }

        fn close_window_soon(&self, delay_ms: u32) {
            *self.closed_after.borrow_mut() = Some(delay_ms);
        }

        async fn cache_result(&self, items: Value) -> Result<(), String> {
            self.cached.borrow_mut().push(items);
            Ok(())
        }

        async fn post_message(&self, message: Value) -> Result<(), String> {
            if self.opener_gone {
                return Err("Could not establish connection.".to_string());
            }
            self.posted.borrow_mut().push(message);
            Ok(())
        }
    }

    struct OfflineTransport;

    #[async_trait(?Send)]
    impl IdentityTransport for OfflineTransport {
        async fn get(&self, _request: &IdentityRequest) -> Result<IdentityResponse, String> {
            Err("offline".to_string())
        }
    }

    fn helper(host: FakeHost, store: MemoryStore) -> LoginHelper<FakeHost, OfflineTransport, MemoryStore> {
        LoginHelper::new(ImsConfig::default(), host, OfflineTransport, store)
    }

    #[test]
    fn test_helper_query() {
        let query = HelperQuery::from_href("chrome-extension://x/login.html?mode=LOGOUT&requestId=%20r1%20");
        assert_eq!(query.mode, LoginMode::Logout);
        assert_eq!(query.request_id, "r1");
        assert!(!query.from_ims);

        let redirect = HelperQuery::from_href("chrome-extension://x/login.html#from_ims=true&access_token=t");
        assert_eq!(redirect.mode, LoginMode::Login);
        assert!(redirect.from_ims);
    }

    #[test]
    fn test_decode_extra_params() {
        let raw = URL_SAFE_NO_PAD.encode(r#"{"prompt":"login","puser":""}"#);
        let extra = decode_extra_params(Some(&raw));
        assert_eq!(extra.get("prompt"), Some(&json!("login")));
        assert!(decode_extra_params(Some("W10")).is_empty());
        assert!(decode_extra_params(None).is_empty());
    }

    #[test]
    fn test_build_authorize_url() {
        let mut extra = Map::new();
        extra.insert("locale".to_string(), json!("fr_FR"));
        extra.insert("prompt".to_string(), json!("login"));
        extra.insert("puser".to_string(), json!(""));
        extra.insert("dl".to_string(), json!(null));

        let url = build_authorize_url(&ImsConfig::default(), "st 1", &extra);
        assert!(url.starts_with("https://ims-na1.adobelogin.com/ims/authorize/v1?client_id=adobeExperienceCloudDebugger&response_type=token&scope=AdobeID%2Copenid"));
        assert!(url.contains("&state=st+1&locale=fr_FR&redirect_uri=https%3A%2F%2Flogin.aepdebugger.adobe.com&prompt=login"));
        assert!(!url.contains("puser"));
        assert!(!url.contains("dl="));
    }

    #[test]
    fn test_random_token() {
        let token = random_token();
        assert_eq!(token.len(), 24);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, random_token());
    }

    #[test]
    fn test_begin_login_stores_state_and_redirects() {
        let host = FakeHost::at("chrome-extension://x/login.html?requestId=r1&state=s1");
        let helper = helper(host, MemoryStore::new());
        block_on(helper.run());

        let stored = read_helper_state(&helper.store).unwrap();
        assert_eq!(stored.request_id, "r1");
        assert_eq!(stored.request_state, "s1");
        assert_eq!(stored.created_at, NOW);
        let location = helper.host.location.borrow().clone().unwrap();
        assert!(location.contains("state=s1"));
        assert_eq!(helper.host.statuses.borrow().as_slice(), ["Redirecting to UnderPAR IMS..."]);
    }

    #[test]
    fn test_begin_login_generates_missing_ids() {
        let helper = helper(FakeHost::at("chrome-extension://x/login.html"), MemoryStore::new());
        block_on(helper.run());
        let stored = read_helper_state(&helper.store).unwrap();
        assert_eq!(stored.request_id.len(), 24);
        assert_eq!(stored.request_state.len(), 24);
    }

    #[test]
    fn test_redirect_success_emits_result() {
        let store = MemoryStore::new();
        write_helper_state(
            &store,
            &HelperState {
                request_id: "r1".to_string(),
                request_state: "s1".to_string(),
                created_at: NOW,
            },
        );
        let host = FakeHost::at("chrome-extension://x/login.html?from_ims=true#access_token=tok&state=s1&expires_in=3600");
        let helper = helper(host, store);
        block_on(helper.run());

        assert_eq!(helper.store.get_item(HELPER_STATE_KEY), None);
        let cached = helper.host.cached.borrow();
        assert_eq!(cached.len(), 1);
        let result = &cached[0]["underpar_helper_result_v1:r1"];
        assert_eq!(result["ok"], true);
        assert_eq!(result["mode"], "login");
        assert_eq!(result["accessToken"], "tok");
        assert_eq!(result["expiresAt"], json!(NOW + 3_600_000.0));
        assert!(result.get("profile").is_none());
        assert_eq!(cached[0]["mincloudlogin_helper_result_v1:r1"], *result);

        let posted = helper.host.posted.borrow();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0]["type"], HELPER_RESULT_MESSAGE_TYPE);
        assert_eq!(posted[1]["type"], LEGACY_HELPER_RESULT_MESSAGE_TYPE);
        assert_eq!(*helper.host.closed_after.borrow(), Some(CLOSE_WINDOW_DELAY_MS));
        assert_eq!(
            helper.host.statuses.borrow().last().map(String::as_str),
            Some("Sign-in completed. Closing window...")
        );
    }

    #[test]
    fn test_redirect_state_mismatch_fails() {
        let store = MemoryStore::new();
        write_helper_state(
            &store,
            &HelperState {
                request_id: "r1".to_string(),
                request_state: "expected".to_string(),
                created_at: NOW,
            },
        );
        let host = FakeHost::at("chrome-extension://x/login.html?from_ims=true#access_token=tok&state=forged");
        let helper = helper(host, store);
        block_on(helper.run());

        let posted = helper.host.posted.borrow();
        assert_eq!(posted[0]["message"]["ok"], false);
        assert_eq!(posted[0]["message"]["requestId"], "r1");
        assert_eq!(posted[0]["message"]["error"], "State validation failed.");
        assert!(posted[0]["message"].get("accessToken").is_none());
        assert_eq!(helper.store.get_item(HELPER_STATE_KEY), None);
    }

    #[test]
    fn test_redirect_error_is_redacted() {
        let host = FakeHost::at(
            "chrome-extension://x/login.html?from_ims=true&requestId=r2#error=invalid_token&error_description=access_token%3Dabcdefghijklmnop1234",
        );
        let helper = helper(host, MemoryStore::new());
        block_on(helper.run());

        let posted = helper.host.posted.borrow();
        assert_eq!(
            posted[0]["message"]["error"],
            "invalid_token: access_token=<redacted>"
        );
    }

    #[test]
    fn test_logout_without_opener() {
        let mut host = FakeHost::at("chrome-extension://x/login.html?mode=logout&requestId=r3");
        host.opener_gone = true;
        let store = MemoryStore::new();
        store.set_item(HELPER_STATE_KEY, "{}").unwrap();
        let helper = helper(host, store);
        block_on(helper.run());

        assert_eq!(helper.store.get_item(HELPER_STATE_KEY), None);
        let cached = helper.host.cached.borrow();
        let result = &cached[0]["underpar_helper_result_v1:r3"];
        assert_eq!(result["mode"], "logout");
        assert_eq!(result["underparOnly"], true);
        assert!(helper.host.posted.borrow().is_empty());
        assert_eq!(*helper.host.closed_after.borrow(), Some(CLOSE_WINDOW_DELAY_MS));
    }
}
