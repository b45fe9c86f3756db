/// Avatar discovery and scoring over profile payloads of unknown shape
use crate::config::ImsConfig;
use crate::login::session::{first_non_empty, string_field};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;
use url::Url;

/// A payload scoring at least this well ends the profile lookup early.
pub const EARLY_EXIT_SCORE: i32 = 320;

const NO_CANDIDATE_SCORE: i32 = -100;
const SCORED_CANDIDATE_LIMIT: usize = 10;

const EXPLICIT_AVATAR_POINTERS: [&str; 17] = [
    "/user_image_url",
    "/userImageUrl",
    "/avatar",
    "/avatarUrl",
    "/avatar_url",
    "/additional_info/user_image_url",
    "/additional_info/userImageUrl",
    "/additional_info/avatar",
    "/additional_info/avatarUrl",
    "/additional_info/avatar_url",
    "/picture",
    "/photo",
    "/imageUrl",
    "/images/avatar/url",
    "/images/avatar/href",
    "/images/profile/url",
    "/images/profile/href",
];

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("static pattern")
}

static PPS_RELATIVE_PATH: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)^/?api/profile/[^/]+/image(/|$)"));
static IMS_DOWNLOAD_RELATIVE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)^ims/avatar/download/"));
static AVATAR_DOWNLOAD_RELATIVE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)^avatar/download/"));
static IMS_DOWNLOAD_ROOTED: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)^/ims/avatar/download/"));
static BARE_DOMAIN: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)^[a-z0-9.-]+\.[a-z]{2,}(/|$)"));
static IMS_HOST: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)(^|\.)adobelogin\.com$"));
static PPS_HOST: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)(^|\.)pps\.services\.adobe\.com$"));
static IMS_DOWNLOAD_PATH: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)/ims/avatar/download/([^/?#]+)"));
static PPS_IMAGE_PATH: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)/api/profile/[^/]+/image(/|$)"));
static PPS_IMAGE_VALUE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)/api/profile/[^/]+/image/"));
static IMS_AVATAR_ANY: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)/ims/avatar/"));
static AVATAR_KEY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)avatar|photo|picture|image|thumbnail|icon"));
static AVATAR_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)avatar|profile|picture|photo|image"));

fn is_inline_image(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("data:image/") || lower.starts_with("blob:")
}

/// Turn a raw avatar value into an absolute https (or inline) URL.
pub fn normalize_avatar_candidate(value: &str, ims: &ImsConfig) -> Option<String> {
    let trimmed = value.trim().trim_matches(|c: char| c == '\'' || c == '"');
    if trimmed.is_empty() {
        return None;
    }
    if is_inline_image(trimmed) {
        return Some(trimmed.to_string());
    }
    if trimmed.starts_with("//") {
        return Some(format!("https:{}", trimmed));
    }

    let ims_base = ims.base_url();
    if PPS_RELATIVE_PATH.is_match(trimmed) {
        let path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        return Some(format!("{}{}", ims.pps_profile_base_url, path));
    }
    if IMS_DOWNLOAD_RELATIVE.is_match(trimmed) {
        return Some(format!("{}/{}", ims_base, trimmed));
    }
    if AVATAR_DOWNLOAD_RELATIVE.is_match(trimmed) {
        return Some(format!("{}/ims/{}", ims_base, trimmed));
    }
    if IMS_DOWNLOAD_ROOTED.is_match(trimmed) || trimmed.starts_with('/') {
        return Some(format!("{}{}", ims_base, trimmed));
    }
    if !trimmed.contains("://") && BARE_DOMAIN.is_match(trimmed) {
        return Some(format!("https://{}", trimmed));
    }

    let mut parsed = Url::parse(trimmed).ok()?;
    if parsed.scheme() == "http" {
        parsed.set_scheme("https").ok()?;
    }
    (parsed.scheme() == "https").then(|| parsed.to_string())
}

fn parse_remote(url: &str) -> Option<Url> {
    if is_inline_image(url) {
        return None;
    }
    Url::parse(url).ok()
}

pub fn is_ims_avatar_download_url(url: &str) -> bool {
    parse_remote(url).is_some_and(|parsed| {
        IMS_HOST.is_match(parsed.host_str().unwrap_or_default())
            && IMS_DOWNLOAD_PATH.is_match(parsed.path())
    })
}

pub fn is_pps_profile_image_url(url: &str) -> bool {
    parse_remote(url).is_some_and(|parsed| {
        PPS_HOST.is_match(parsed.host_str().unwrap_or_default())
            && PPS_IMAGE_PATH.is_match(parsed.path())
    })
}

fn profile_identity(profile: &Value) -> Option<String> {
    let fields = profile.as_object()?;
    first_non_empty(["userId", "user_id", "sub", "id"].map(|key| string_field(fields, key)))
}

/// An IMS download URL built from the profile's own id rather than a real
/// uploaded image.
fn is_synthetic_identity_candidate(identity: Option<&str>, candidate: &str) -> bool {
    let Some(identity) = identity else {
        return false;
    };
    if !is_ims_avatar_download_url(candidate) {
        return false;
    }
    let Some(parsed) = parse_remote(candidate) else {
        return false;
    };
    IMS_DOWNLOAD_PATH
        .captures(parsed.path())
        .and_then(|captures| captures.get(1))
        .map(|segment| percent_decode_str(segment.as_str()).decode_utf8_lossy().trim().to_string())
        .is_some_and(|decoded| decoded == identity)
}

/// Every normalized avatar candidate in discovery order, without duplicates.
pub fn collect_avatar_candidates(profile: &Value, ims: &ImsConfig) -> Vec<String> {
    if !is_container(profile) {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |raw: &str| {
        if let Some(normalized) = normalize_avatar_candidate(raw, ims) {
            if seen.insert(normalized.clone()) {
                candidates.push(normalized);
            }
        }
    };

    for pointer in EXPLICIT_AVATAR_POINTERS {
        if let Some(Value::String(raw)) = profile.pointer(pointer) {
            push(raw);
        }
    }

    let mut queue = VecDeque::from([profile]);
    while let Some(current) = queue.pop_front() {
        match current {
            Value::Array(entries) => {
                for entry in entries {
                    match entry {
                        Value::Object(_) | Value::Array(_) => queue.push_back(entry),
                        Value::String(raw) => push(raw),
                        _ => {}
                    }
                }
            }
            Value::Object(fields) => {
                for (key, value) in fields {
                    match value {
                        Value::Object(_) | Value::Array(_) => queue.push_back(value),
                        Value::String(raw) if AVATAR_KEY.is_match(key) || PPS_IMAGE_VALUE.is_match(raw) => {
                            push(raw)
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    candidates
}

fn candidate_score(candidate: &str) -> i32 {
    let base = if candidate.starts_with("data:image/") {
        420
    } else if is_pps_profile_image_url(candidate) {
        340
    } else if is_ims_avatar_download_url(candidate) {
        260
    } else if IMS_AVATAR_ANY.is_match(candidate) {
        220
    } else {
        140
    };
    if AVATAR_KEYWORD.is_match(candidate) {
        base + 16
    } else {
        base
    }
}

fn scored_candidates(profile: &Value, ims: &ImsConfig) -> Vec<String> {
    let identity = profile_identity(profile);
    collect_avatar_candidates(profile, ims)
        .into_iter()
        .filter(|candidate| !is_synthetic_identity_candidate(identity.as_deref(), candidate))
        .collect()
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// How promising a profile payload is for avatar display. `None` for
/// payloads that are neither objects nor arrays.
pub fn score_profile_payload(profile: &Value, ims: &ImsConfig) -> Option<i32> {
    if !is_container(profile) {
        return None;
    }
    let candidates = scored_candidates(profile, ims);
    if candidates.is_empty() {
        return Some(NO_CANDIDATE_SCORE);
    }

    let best = candidates
        .iter()
        .take(SCORED_CANDIDATE_LIMIT)
        .map(|candidate| candidate_score(candidate))
        .max()
        .unwrap_or(NO_CANDIDATE_SCORE);
    let breadth = candidates.len().min(SCORED_CANDIDATE_LIMIT) as i32 * 3;
    Some(best + breadth)
}

/// The highest scoring avatar URL; the earliest wins ties.
pub fn best_avatar_candidate(profile: &Value, ims: &ImsConfig) -> Option<String> {
    let mut best: Option<(i32, String)> = None;
    for candidate in scored_candidates(profile, ims) {
        let score = candidate_score(&candidate);
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ims() -> ImsConfig {
        ImsConfig::default()
    }

    #[test]
    fn test_normalize_candidates() {
        let ims = ims();
        assert_eq!(
            normalize_avatar_candidate("//cdn.example.com/a.png", &ims).as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(
            normalize_avatar_candidate("api/profile/ABC/image/100", &ims).as_deref(),
            Some("https://pps.services.adobe.com/api/profile/ABC/image/100")
        );
        assert_eq!(
            normalize_avatar_candidate("ims/avatar/download/xyz", &ims).as_deref(),
            Some("https://ims-na1.adobelogin.com/ims/avatar/download/xyz")
        );
        assert_eq!(
            normalize_avatar_candidate("avatar/download/xyz", &ims).as_deref(),
            Some("https://ims-na1.adobelogin.com/ims/avatar/download/xyz")
        );
        assert_eq!(
            normalize_avatar_candidate("/other/path.png", &ims).as_deref(),
            Some("https://ims-na1.adobelogin.com/other/path.png")
        );
        assert_eq!(
            normalize_avatar_candidate("example.com/me.jpg", &ims).as_deref(),
            Some("https://example.com/me.jpg")
        );
        assert_eq!(
            normalize_avatar_candidate("http://example.com/me.jpg", &ims).as_deref(),
            Some("https://example.com/me.jpg")
        );
        assert_eq!(
            normalize_avatar_candidate("'data:image/png;base64,AAAA'", &ims).as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert_eq!(normalize_avatar_candidate("ftp://example.com/me.jpg", &ims), None);
        assert_eq!(normalize_avatar_candidate("Jane Doe", &ims), None);
        assert_eq!(normalize_avatar_candidate("  ", &ims), None);
    }

    #[test]
    fn test_collect_walks_nested_values() {
        let profile = json!({
            "name": "Jane",
            "picture": "https://cdn.example.com/p.png",
            "links": {"thumbnailUrl": "https://cdn.example.com/t.png", "homepage": "https://example.com"},
            "gallery": ["https://cdn.example.com/p.png", {"iconHref": "//cdn.example.com/i.png"}],
            "meta": {"src": "/api/profile/ABC/image/50"}
        });
        assert_eq!(
            collect_avatar_candidates(&profile, &ims()),
            vec![
                "https://cdn.example.com/p.png",
                "https://cdn.example.com/t.png",
                "https://pps.services.adobe.com/api/profile/ABC/image/50",
                "https://cdn.example.com/i.png",
            ]
        );
    }

    #[test]
    fn test_data_uri_beats_picture() {
        let profile = json!({
            "picture": "https://cdn.example.com/p.png",
            "additional_info": {"avatar": "data:image/png;base64,AAAA"}
        });
        assert_eq!(
            best_avatar_candidate(&profile, &ims()).as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert_eq!(score_profile_payload(&profile, &ims()), Some(420 + 16 + 6));
    }

    #[test]
    fn test_synthetic_identity_avatar_excluded() {
        let profile = json!({
            "userId": "ABC@AdobeID",
            "avatar": "https://ims-na1.adobelogin.com/ims/avatar/download/ABC%40AdobeID"
        });
        assert_eq!(best_avatar_candidate(&profile, &ims()), None);
        assert_eq!(score_profile_payload(&profile, &ims()), Some(-100));

        let other = json!({
            "userId": "ABC@AdobeID",
            "avatar": "https://ims-na1.adobelogin.com/ims/avatar/download/uploaded-1"
        });
        assert_eq!(score_profile_payload(&other, &ims()), Some(260 + 16 + 3));
    }

    #[test]
    fn test_pps_image_scores_above_threshold() {
        let profile = json!({"userImageUrl": "https://pps.services.adobe.com/api/profile/ABC/image/100"});
        let score = score_profile_payload(&profile, &ims()).unwrap();
        assert_eq!(score, 340 + 16 + 3);
        assert!(score >= EARLY_EXIT_SCORE);
    }

    #[test]
    fn test_array_payload_is_scored() {
        let profile = json!([{"userImageUrl": "https://pps.services.adobe.com/api/profile/ABC/image/100"}]);
        assert_eq!(
            collect_avatar_candidates(&profile, &ims()),
            vec!["https://pps.services.adobe.com/api/profile/ABC/image/100"]
        );
        let score = score_profile_payload(&profile, &ims()).unwrap();
        assert_eq!(score, 340 + 16 + 3);
        assert!(score >= EARLY_EXIT_SCORE);

        assert_eq!(score_profile_payload(&json!([1, 2]), &ims()), Some(-100));
    }

    #[test]
    fn test_scalar_payload() {
        assert_eq!(score_profile_payload(&json!("x"), &ims()), None);
        assert_eq!(score_profile_payload(&Value::Null, &ims()), None);
        assert!(collect_avatar_candidates(&json!("x"), &ims()).is_empty());
    }
}
