/// Profile and organization lookups against the identity service
///
/// The profile endpoint answers differently depending on client id and
/// whether cookies are sent, so several variants are tried in order and
/// the payload with the most usable avatar wins.
use crate::config::ImsConfig;
use crate::login::avatar::{EARLY_EXIT_SCORE, score_profile_payload};
use crate::request_context::encode_uri_component;
use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

const ACCEPT_ANY_JSON: &str = "application/json, text/plain, */*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsMode {
    Omit,
    Include,
}

/// A CORS GET. Headers are name/value pairs so the browser side can pass
/// them straight to `new Headers(...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityRequest {
    pub url: String,
    pub credentials: CredentialsMode,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResponse {
    pub ok: bool,
    pub status: u16,
    pub body: String,
}

#[async_trait(?Send)]
pub trait IdentityTransport {
    async fn get(&self, request: &IdentityRequest) -> Result<IdentityResponse, String>;
}

pub fn profile_headers(access_token: &str, client_id: &str) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Accept".to_string(), ACCEPT_ANY_JSON.to_string()),
        (
            "Content-Type".to_string(),
            "application/json;charset=utf-8".to_string(),
        ),
    ];
    if !client_id.is_empty() {
        for name in ["X-IMS-ClientId", "x-api-key", "client_id"] {
            headers.push((name.to_string(), client_id.to_string()));
        }
    }
    if !access_token.is_empty() {
        headers.push(("Authorization".to_string(), format!("Bearer {}", access_token)));
    }
    headers
}

/// Every profile request to try, in order: each client id, then the bare
/// endpoint, each without and then with credentials.
pub fn profile_attempts(ims: &ImsConfig, access_token: &str) -> Vec<IdentityRequest> {
    let endpoints = ims
        .profile_client_ids
        .iter()
        .map(|client_id| {
            (
                format!("{}?client_id={}", ims.profile_url, encode_uri_component(client_id)),
                client_id.as_str(),
            )
        })
        .chain(std::iter::once((ims.profile_url.clone(), "")));

    endpoints
        .flat_map(|(url, client_id)| {
            [CredentialsMode::Omit, CredentialsMode::Include].map(|credentials| IdentityRequest {
                url: url.clone(),
                credentials,
                headers: profile_headers(access_token, client_id),
            })
        })
        .collect()
}

async fn get_json<T: IdentityTransport + ?Sized>(transport: &T, request: &IdentityRequest) -> Option<Value> {
    let response = match transport.get(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("GET {} failed: {}", request.url, e);
            return None;
        }
    };
    if !response.ok {
        debug!("GET {} returned {}", request.url, response.status);
        return None;
    }
    match serde_json::from_str::<Value>(&response.body) {
        Ok(value) if value.is_object() || value.is_array() => Some(value),
        Ok(_) => None,
        Err(e) => {
            warn!("GET {} returned unreadable JSON: {}", request.url, e);
            None
        }
    }
}

/// Try the profile variants in sequence. Stops at the first payload whose
/// avatar score reaches the early-exit threshold, otherwise returns the
/// best-scoring payload seen.
pub async fn fetch_profile<T: IdentityTransport + ?Sized>(
    transport: &T,
    ims: &ImsConfig,
    access_token: &str,
) -> Option<Value> {
    if access_token.is_empty() {
        return None;
    }

    let mut best: Option<(i32, Value)> = None;
    for request in profile_attempts(ims, access_token) {
        let Some(payload) = get_json(transport, &request).await else {
            continue;
        };
        let Some(score) = score_profile_payload(&payload, ims) else {
            continue;
        };
        if score >= EARLY_EXIT_SCORE {
            debug!("Profile from {} scored {}", request.url, score);
            return Some(payload);
        }
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, payload));
        }
    }
    best.map(|(_, payload)| payload)
}

pub async fn fetch_organizations<T: IdentityTransport + ?Sized>(
    transport: &T,
    ims: &ImsConfig,
    access_token: &str,
) -> Option<Value> {
    if access_token.is_empty() {
        return None;
    }
    let request = IdentityRequest {
        url: ims.organizations_url.clone(),
        credentials: CredentialsMode::Include,
        headers: vec![
            ("Accept".to_string(), ACCEPT_ANY_JSON.to_string()),
            ("Authorization".to_string(), format!("Bearer {}", access_token)),
        ],
    };
    get_json(transport, &request).await
}
