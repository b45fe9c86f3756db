/// Implicit-grant redirect parsing
use crate::error::LoginError;
use crate::login::expiry::{positive_number_text, resolve_expiry};
use crate::login::session::{ImsSessionSnapshot, first_non_empty, parse_ims_state_payload, string_field};
use url::{Url, form_urlencoded};

/// Parameters from the query string and the fragment. The query wins when a
/// key appears in both; within each source the first value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthParams {
    pairs: Vec<(String, String)>,
}

impl AuthParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed value, `None` when missing or blank.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|value| !value.is_empty())
    }

    fn has(&self, key: &str) -> bool {
        self.pairs.iter().any(|(name, _)| name == key)
    }
}

/// Fragment text as a form-encoded string. IMS sometimes appends a second
/// query after `from_ims=true`, and extra `#` separators.
fn normalize_fragment(fragment: &str) -> String {
    fragment.replacen('?', "&", 1).replace('#', "&")
}

pub fn extract_auth_params(response_url: &str) -> Result<AuthParams, LoginError> {
    let parsed = Url::parse(response_url.trim())
        .map_err(|e| LoginError::InvalidRedirectUrl(e.to_string()))?;

    let mut params = AuthParams {
        pairs: parsed.query_pairs().into_owned().collect(),
    };
    if let Some(fragment) = parsed.fragment().filter(|fragment| !fragment.is_empty()) {
        let normalized = normalize_fragment(fragment);
        for (key, value) in form_urlencoded::parse(normalized.as_bytes()).into_owned() {
            if !params.has(&key) {
                params.pairs.push((key, value));
            }
        }
    }
    Ok(params)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub access_token: String,
    /// Epoch milliseconds, 0 when unknown.
    pub expires_at: f64,
    pub token_type: String,
    pub scope: String,
    pub id_token: String,
    pub refresh_token: String,
    pub ims_session: Option<ImsSessionSnapshot>,
}

/// Validate the redirect and pull out the token and session details.
///
/// A state mismatch only fails when both the expected and the returned
/// state are present.
pub fn parse_auth_response(
    response_url: &str,
    expected_state: &str,
    now_ms: f64,
) -> Result<AuthResponse, LoginError> {
    let params = extract_auth_params(response_url)?;

    if let Some(code) = params.non_empty("error") {
        return Err(LoginError::Provider {
            code: code.to_string(),
            description: params.non_empty("error_description").map(str::to_string),
        });
    }

    let returned_state = params.get("state").unwrap_or_default();
    let expected_state = expected_state.trim();
    if !expected_state.is_empty() && !returned_state.is_empty() && returned_state != expected_state {
        return Err(LoginError::StateMismatch);
    }

    let access_token = params
        .non_empty("access_token")
        .ok_or(LoginError::MissingAccessToken)?
        .to_string();

    let token_snapshot = ImsSessionSnapshot::from_access_token(&access_token);
    let expires_in = params.get("expires_in").and_then(positive_number_text);
    let expires_at = resolve_expiry(
        token_snapshot.as_ref().and_then(|snapshot| snapshot.expires_at),
        expires_in,
        now_ms,
    );

    let token_type = params.non_empty("token_type").unwrap_or("bearer").to_string();
    let scope = params.non_empty("scope").unwrap_or_default().to_string();
    let state = parse_ims_state_payload(returned_state);
    let state_field = |key: &str| state.as_ref().and_then(|state| string_field(state, key));

    let callback_snapshot = ImsSessionSnapshot {
        token_id: first_non_empty([params.get("id")]),
        session_id: first_non_empty([params.get("sid")]),
        session_url: first_non_empty([params.get("session"), state_field("session")]),
        user_id: first_non_empty([params.get("user_id"), params.get("userId")]),
        auth_id: first_non_empty([params.get("aa_id"), params.get("authId"), params.get("auth_id")]),
        client_id: first_non_empty([params.get("client_id")]),
        token_type: Some(token_type.clone()),
        scope: first_non_empty([Some(scope.as_str())]),
        auth_server: first_non_empty([params.get("as")]),
        fg: first_non_empty([params.get("fg")]),
        moi: first_non_empty([params.get("moi")]),
        pba: first_non_empty([params.get("pba")]),
        key_alias: first_non_empty([params.get("key_alias")]),
        state_nonce: first_non_empty([state_field("nonce")]),
        state_jslib_version: first_non_empty([state_field("jslibver"), state_field("jslibVersion")]),
        expires_at: Some(expires_at),
        ..ImsSessionSnapshot::default()
    };

    let mut ims_session = ImsSessionSnapshot::merge(token_snapshot.as_ref(), Some(&callback_snapshot));
    if let Some(session) = ims_session.as_mut() {
        if session.expires_at.is_none() && expires_at > 0.0 {
            session.expires_at = Some(expires_at);
        }
    }

    Ok(AuthResponse {
        access_token,
        expires_at,
        token_type,
        scope,
        id_token: params.non_empty("id_token").unwrap_or_default().to_string(),
        refresh_token: params.non_empty("refresh_token").unwrap_or_default().to_string(),
        ims_session,
    })
}
