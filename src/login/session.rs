/// IMS session snapshot reconciled from token claims and callback parameters
use crate::login::expiry::{parse_json_object, parse_jwt_payload, positive_number};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Epoch values below this are seconds, not milliseconds.
const MILLISECOND_EPOCH_FLOOR: f64 = 1_000_000_000_000.0;

/// Best-effort view of the identity session. Empty strings and non-positive
/// numbers are never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImsSessionSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    pub auth_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pba: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_jslib_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
}

/// First trimmed, non-empty candidate.
pub fn first_non_empty<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    values
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// String-typed field of a JSON object.
pub fn string_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

/// A `state` value that is itself a JSON object.
pub fn parse_ims_state_payload(raw_state: &str) -> Option<Map<String, Value>> {
    let state = raw_state.trim();
    if !state.starts_with('{') {
        return None;
    }
    parse_json_object(state)
}

impl ImsSessionSnapshot {
    pub fn is_empty(&self) -> bool {
        *self == ImsSessionSnapshot::default()
    }

    /// Drop empty strings and non-positive numbers.
    fn normalized(self) -> ImsSessionSnapshot {
        let text = |value: Option<String>| first_non_empty([value.as_deref()]);
        let number = |value: Option<f64>| value.filter(|n| n.is_finite() && *n > 0.0);
        ImsSessionSnapshot {
            token_id: text(self.token_id),
            session_id: text(self.session_id),
            session_url: text(self.session_url),
            user_id: text(self.user_id),
            auth_id: text(self.auth_id),
            client_id: text(self.client_id),
            token_type: text(self.token_type),
            scope: text(self.scope),
            auth_server: text(self.auth_server),
            fg: text(self.fg),
            moi: text(self.moi),
            pba: text(self.pba),
            key_alias: text(self.key_alias),
            state_nonce: text(self.state_nonce),
            state_jslib_version: text(self.state_jslib_version),
            created_at: number(self.created_at),
            issued_at: number(self.issued_at),
            expires_at: number(self.expires_at),
        }
    }

    /// Field-by-field merge preferring `incoming`. `None` when nothing
    /// survives.
    pub fn merge(
        base: Option<&ImsSessionSnapshot>,
        incoming: Option<&ImsSessionSnapshot>,
    ) -> Option<ImsSessionSnapshot> {
        let empty = ImsSessionSnapshot::default();
        let base = base.unwrap_or(&empty);
        let incoming = incoming.unwrap_or(&empty);
        let text = |a: &Option<String>, b: &Option<String>| {
            first_non_empty([a.as_deref(), b.as_deref()])
        };
        let number = |a: Option<f64>, b: Option<f64>| {
            a.filter(|n| n.is_finite() && *n > 0.0)
                .or(b.filter(|n| n.is_finite() && *n > 0.0))
        };

        let merged = ImsSessionSnapshot {
            token_id: text(&incoming.token_id, &base.token_id),
            session_id: text(&incoming.session_id, &base.session_id),
            session_url: text(&incoming.session_url, &base.session_url),
            user_id: text(&incoming.user_id, &base.user_id),
            auth_id: text(&incoming.auth_id, &base.auth_id),
            client_id: text(&incoming.client_id, &base.client_id),
            token_type: text(&incoming.token_type, &base.token_type),
            scope: text(&incoming.scope, &base.scope),
            auth_server: text(&incoming.auth_server, &base.auth_server),
            fg: text(&incoming.fg, &base.fg),
            moi: text(&incoming.moi, &base.moi),
            pba: text(&incoming.pba, &base.pba),
            key_alias: text(&incoming.key_alias, &base.key_alias),
            state_nonce: text(&incoming.state_nonce, &base.state_nonce),
            state_jslib_version: text(&incoming.state_jslib_version, &base.state_jslib_version),
            created_at: number(incoming.created_at, base.created_at),
            issued_at: number(incoming.issued_at, base.issued_at),
            expires_at: number(incoming.expires_at, base.expires_at),
        };
        (!merged.is_empty()).then_some(merged)
    }

    /// Snapshot from the claims of a JWT-shaped access token.
    pub fn from_access_token(access_token: &str) -> Option<ImsSessionSnapshot> {
        let claims = parse_jwt_payload(access_token)?;
        let claim = |key: &str| string_field(&claims, key);
        let state = claim("state").and_then(parse_ims_state_payload);
        let state_field = |key: &str| state.as_ref().and_then(|state| string_field(state, key));
        let seconds_to_ms = |key: &str| positive_number(claims.get(key)).map(|seconds| seconds * 1000.0);
        let created_at = positive_number(claims.get("created_at")).map(|created| {
            if created < MILLISECOND_EPOCH_FLOOR {
                created * 1000.0
            } else {
                created
            }
        });

        let snapshot = ImsSessionSnapshot {
            token_id: first_non_empty([claim("id")]),
            session_id: first_non_empty([claim("sid")]),
            session_url: first_non_empty([claim("session"), state_field("session")]),
            user_id: first_non_empty([claim("user_id"), claim("userId")]),
            auth_id: first_non_empty([claim("aa_id"), claim("authId")]),
            client_id: first_non_empty([claim("client_id"), claim("clientId")]),
            token_type: first_non_empty([claim("type")]),
            scope: first_non_empty([claim("scope")]),
            auth_server: first_non_empty([claim("as")]),
            fg: first_non_empty([claim("fg")]),
            moi: first_non_empty([claim("moi")]),
            pba: first_non_empty([claim("pba")]),
            key_alias: first_non_empty([claim("key_alias"), claim("keyAlias")]),
            state_nonce: first_non_empty([state_field("nonce")]),
            state_jslib_version: first_non_empty([state_field("jslibver"), state_field("jslibVersion")]),
            created_at,
            issued_at: seconds_to_ms("iat"),
            expires_at: seconds_to_ms("exp"),
        }
        .normalized();
        (!snapshot.is_empty()).then_some(snapshot)
    }
}
