/// ESM request URL parsing: breadcrumb path, query chips, sibling endpoints
///
/// Everything here is best-effort. A URL that fails to parse falls back to
/// plain string slicing so a card header always renders.
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use url::Url;

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const ESM_NODE_BASE_URL: &str = "https://mgmt.auth.adobe.com/esm/v3/media-company/";
pub const ESM_NODE_BASE_PATH: &str = "esm/v3/media-company/";

/// One `key[=value]` entry of a query string, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    pub key: String,
    pub value: String,
    pub has_value: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub full_url: String,
    pub display_path: String,
    pub query_pairs: Vec<QueryPair>,
}

impl RequestContext {
    /// Decoded, non-empty path segments below the media-company base.
    pub fn path_segments(&self) -> Vec<String> {
        self.display_path
            .split('/')
            .map(|segment| safe_decode_url_segment(segment.trim()))
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// One clickable step of a card's breadcrumb path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub label: String,
    pub endpoint_url: Option<String>,
    pub terminal: bool,
}

pub fn encode_uri_component(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}

/// Percent-decode a path or query segment, keeping the raw text when the
/// result is not valid UTF-8.
pub fn safe_decode_url_segment(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Strip the ESM base path (case-insensitive) and surrounding slashes.
pub fn strip_esm_base_from_path(path: &str) -> String {
    let normalized = path.trim_matches('/');
    if normalized.is_empty() {
        return String::new();
    }

    let marker_len = ESM_NODE_BASE_PATH.len();
    let has_marker = normalized
        .get(..marker_len)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ESM_NODE_BASE_PATH));
    if has_marker {
        normalized[marker_len..].trim_matches('/').to_string()
    } else {
        normalized.to_string()
    }
}

/// Split the query of `url` by hand so duplicate keys, bare keys and bad
/// escapes all survive.
pub fn parse_raw_query_pairs(url: &str) -> Vec<QueryPair> {
    let raw = url.trim();
    let Some((_, after_question)) = raw.split_once('?') else {
        return Vec::new();
    };
    let query = after_question
        .split_once('#')
        .map_or(after_question, |(query, _)| query)
        .trim();

    query
        .split('&')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => QueryPair {
                key: safe_decode_url_segment(&key.replace('+', " ")),
                value: value.to_string(),
                has_value: true,
            },
            None => QueryPair {
                key: safe_decode_url_segment(&entry.replace('+', " ")),
                value: String::new(),
                has_value: false,
            },
        })
        .collect()
}

pub fn parse_request_context(url: &str) -> RequestContext {
    let raw = url.trim();
    if raw.is_empty() {
        return RequestContext::default();
    }

    let mut display_path = Url::parse(raw)
        .map(|parsed| strip_esm_base_from_path(parsed.path()))
        .unwrap_or_default();

    if display_path.is_empty() {
        let without_query = raw.split(['?', '#']).next().unwrap_or(raw);
        let without_base = without_query
            .strip_prefix(ESM_NODE_BASE_URL)
            .unwrap_or(without_query);
        display_path = strip_esm_base_from_path(without_base);
    }

    RequestContext {
        full_url: raw.to_string(),
        display_path,
        query_pairs: parse_raw_query_pairs(raw),
    }
}

/// Endpoint for the first `depth` segments, built on `base_endpoint_url` with
/// only its path replaced.
pub fn build_path_endpoint_url(
    base_endpoint_url: &str,
    segments: &[String],
    depth: usize,
) -> Option<String> {
    if depth < 1 {
        return None;
    }
    let kept: Vec<&str> = segments
        .iter()
        .map(|segment| segment.trim())
        .filter(|segment| !segment.is_empty())
        .take(depth)
        .collect();
    if kept.is_empty() {
        return None;
    }

    let target_path = kept.join("/");
    let fallback = format!("{}{}", ESM_NODE_BASE_URL, target_path);
    let raw_base = base_endpoint_url.trim();
    if raw_base.is_empty() {
        return Some(fallback);
    }

    match Url::parse(raw_base) {
        Ok(mut parsed) => {
            parsed.set_path(&format!("/{}{}", ESM_NODE_BASE_PATH, target_path));
            parsed.set_query(None);
            parsed.set_fragment(None);
            Some(parsed.to_string())
        }
        Err(_) => Some(fallback),
    }
}

/// Request URL for a drill-down card: the new endpoint carrying every query
/// parameter of the request it was opened from.
pub fn build_inherited_request_url(endpoint_url: &str, source_request_url: &str) -> String {
    let endpoint_raw = endpoint_url.trim();
    if endpoint_raw.is_empty() {
        return String::new();
    }

    let Ok(mut endpoint) = Url::parse(endpoint_raw) else {
        return endpoint_raw.to_string();
    };
    endpoint.set_query(None);
    endpoint.set_fragment(None);

    let source_raw = source_request_url.trim();
    if source_raw.is_empty() {
        return endpoint.to_string();
    }

    let Ok(source) = Url::parse(source_raw) else {
        return endpoint_raw.to_string();
    };
    let inherited: Vec<(String, String)> = source.query_pairs().into_owned().collect();
    if !inherited.is_empty() {
        endpoint.query_pairs_mut().extend_pairs(inherited);
    }
    endpoint.to_string()
}

/// Breadcrumbs for a card header. Links target `endpoint_url` when given,
/// otherwise the request URL itself.
pub fn breadcrumbs(request_url: &str, endpoint_url: &str) -> Vec<Breadcrumb> {
    let context = parse_request_context(request_url);
    let segments = context.path_segments();
    let base = if endpoint_url.trim().is_empty() {
        context.full_url.as_str()
    } else {
        endpoint_url
    };

    let last = segments.len().saturating_sub(1);
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| Breadcrumb {
            label: segment.clone(),
            endpoint_url: build_path_endpoint_url(base, &segments, index + 1),
            terminal: index == last,
        })
        .collect()
}

/// Short label for a request: its deepest path segment.
pub fn node_label(url: &str) -> String {
    let context = parse_request_context(url);
    if context.full_url.is_empty() {
        return "node".to_string();
    }
    context
        .display_path
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .last()
        .map(safe_decode_url_segment)
        .unwrap_or_else(|| "node".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str =
        "https://mgmt.auth.adobe.com/esm/v3/media-company/year/month/mvpd?requestor-id=espn&format=json&debug";

    #[test]
    fn test_strip_esm_base_from_path() {
        assert_eq!(strip_esm_base_from_path("/esm/v3/media-company/year/month/"), "year/month");
        assert_eq!(strip_esm_base_from_path("/ESM/V3/Media-Company/year"), "year");
        assert_eq!(strip_esm_base_from_path("/other/path/"), "other/path");
        assert_eq!(strip_esm_base_from_path("///"), "");
    }

    #[test]
    fn test_parse_request_context() {
        let context = parse_request_context(REQUEST);
        assert_eq!(context.display_path, "year/month/mvpd");
        assert_eq!(context.path_segments(), vec!["year", "month", "mvpd"]);
        assert_eq!(
            context.query_pairs,
            vec![
                QueryPair { key: "requestor-id".into(), value: "espn".into(), has_value: true },
                QueryPair { key: "format".into(), value: "json".into(), has_value: true },
                QueryPair { key: "debug".into(), value: String::new(), has_value: false },
            ]
        );
    }

    #[test]
    fn test_query_pairs_keep_duplicates_and_empty_values() {
        let pairs = parse_raw_query_pairs("https://x/y?mvpd=a&mvpd=b&empty=&my+key=%zz#frag=1");
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0].value, "a");
        assert_eq!(pairs[1].value, "b");
        assert!(pairs[2].has_value);
        assert_eq!(pairs[2].value, "");
        assert_eq!(pairs[3].key, "my key");
        assert_eq!(pairs[3].value, "%zz");
    }

    #[test]
    fn test_query_pairs_without_query() {
        assert!(parse_raw_query_pairs("https://x/y").is_empty());
        assert!(parse_raw_query_pairs("https://x/y?#a").is_empty());
    }

    #[test]
    fn test_unparseable_url_falls_back_to_slicing() {
        let context = parse_request_context("esm/v3/media-company/year/channel?x=1");
        assert_eq!(context.display_path, "year/channel");
        assert_eq!(context.query_pairs.len(), 1);
    }

    #[test]
    fn test_build_path_endpoint_url() {
        let segments: Vec<String> = vec!["year".into(), "month".into(), "mvpd".into()];
        assert_eq!(
            build_path_endpoint_url(REQUEST, &segments, 2).as_deref(),
            Some("https://mgmt.auth.adobe.com/esm/v3/media-company/year/month")
        );
        assert_eq!(
            build_path_endpoint_url("not a url", &segments, 1).as_deref(),
            Some("https://mgmt.auth.adobe.com/esm/v3/media-company/year")
        );
        assert_eq!(build_path_endpoint_url(REQUEST, &segments, 0), None);
        assert_eq!(build_path_endpoint_url(REQUEST, &[], 1), None);
    }

    #[test]
    fn test_build_inherited_request_url() {
        let inherited = build_inherited_request_url(
            "https://mgmt.auth.adobe.com/esm/v3/media-company/year?stale=1#x",
            REQUEST,
        );
        assert_eq!(
            inherited,
            "https://mgmt.auth.adobe.com/esm/v3/media-company/year?requestor-id=espn&format=json&debug="
        );
        assert_eq!(
            build_inherited_request_url("https://h/esm/v3/media-company/year", ""),
            "https://h/esm/v3/media-company/year"
        );
        assert_eq!(build_inherited_request_url("garbage", REQUEST), "garbage");
        assert_eq!(build_inherited_request_url("  ", REQUEST), "");
    }

    #[test]
    fn test_breadcrumbs() {
        let crumbs = breadcrumbs(REQUEST, "");
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[0].label, "year");
        assert_eq!(
            crumbs[0].endpoint_url.as_deref(),
            Some("https://mgmt.auth.adobe.com/esm/v3/media-company/year")
        );
        assert!(!crumbs[1].terminal);
        assert!(crumbs[2].terminal);
    }

    #[test]
    fn test_breadcrumbs_decode_segments() {
        let crumbs = breadcrumbs("https://h/esm/v3/media-company/my%20node", "");
        assert_eq!(crumbs[0].label, "my node");
        assert_eq!(
            crumbs[0].endpoint_url.as_deref(),
            Some("https://h/esm/v3/media-company/my%20node")
        );
    }

    #[test]
    fn test_node_label() {
        assert_eq!(node_label(REQUEST), "mvpd");
        assert_eq!(node_label(""), "node");
        assert_eq!(node_label("   "), "node");
        assert_eq!(node_label("https://h/esm/v3/media-company/year/channel/"), "channel");
    }

    #[test]
    fn test_encode_uri_component() {
        assert_eq!(encode_uri_component("acme tv/1"), "acme%20tv%2F1");
        assert_eq!(encode_uri_component("a-b_c.d~e!(x)*'"), "a-b_c.d~e!(x)*'");
        assert_eq!(encode_uri_component("a@b&c=d"), "a%40b%26c%3Dd");
    }
}
