/// ESM column vocabulary and request column normalization
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Raw metric columns the reporting API can return. These never show up as
/// verbatim extra columns in a report table.
pub const ESM_METRIC_COLUMNS: [&str; 19] = [
    "authn-attempts",
    "authn-successful",
    "authn-pending",
    "authn-failed",
    "clientless-tokens",
    "clientless-failures",
    "authz-attempts",
    "authz-successful",
    "authz-failed",
    "authz-rejected",
    "authz-latency",
    "media-tokens",
    "unique-accounts",
    "unique-sessions",
    "count",
    "decision-attempts",
    "decision-successful",
    "decision-failed",
    "decision-media-tokens",
];

/// Wall-clock fields every report row carries.
pub const ESM_DATE_PARTS: [&str; 5] = ["year", "month", "day", "hour", "minute"];

/// Tenant identifier column, implied by the request path.
pub const ESM_IDENTIFIER_COLUMN: &str = "media-company";

const ESM_DEPRECATED_COLUMN_KEYS: [&str; 2] = ["clientless-failures", "clientless-tokens"];

pub const NO_REPORT_COLUMNS: &str = "No report columns";

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));
static NO_REPORT_COLUMNS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^no\s+report\s+columns$").expect("static pattern"));

pub fn is_metric_column(key: &str) -> bool {
    ESM_METRIC_COLUMNS.contains(&key)
}

pub fn is_date_part(key: &str) -> bool {
    ESM_DATE_PARTS.contains(&key)
}

/// Clean up a requested column list.
///
/// Tags are stripped, whitespace collapsed and trimmed, deprecated clientless
/// columns dropped, and duplicates removed case-insensitively (first spelling
/// wins). Any casing of "no report columns" collapses to the canonical label.
pub fn normalize_esm_columns<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    let mut output = Vec::new();
    let mut seen = HashSet::new();

    for raw in columns {
        let without_tags = HTML_TAG.replace_all(raw.as_ref(), " ");
        let collapsed = WHITESPACE_RUN.replace_all(&without_tags, " ");
        let normalized = collapsed.trim();
        if normalized.is_empty() {
            continue;
        }

        if NO_REPORT_COLUMNS_PATTERN.is_match(normalized) {
            if seen.insert(NO_REPORT_COLUMNS.to_lowercase()) {
                output.push(NO_REPORT_COLUMNS.to_string());
            }
            continue;
        }

        let lower = normalized.to_lowercase();
        if ESM_DEPRECATED_COLUMN_KEYS.contains(&lower.as_str()) {
            continue;
        }
        if seen.insert(lower) {
            output.push(normalized.to_string());
        }
    }

    output
}

/// Normalize columns that arrived as loose JSON from the controller.
pub fn normalize_json_columns(values: &[Value]) -> Vec<String> {
    let texts: Vec<String> = values
        .iter()
        .map(|value| match value {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect();
    normalize_esm_columns(&texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_drops_deprecated_and_canonicalizes() {
        let normalized =
            normalize_esm_columns(&["Clientless-Tokens", "  Authz-Attempts  ", "No Report Columns"]);
        assert_eq!(normalized, vec!["Authz-Attempts", "No report columns"]);
    }

    #[test]
    fn test_normalize_strips_html_and_collapses_whitespace() {
        let normalized = normalize_esm_columns(&["<b>authn</b>-attempts", "mvpd \n  channel"]);
        assert_eq!(normalized, vec!["authn -attempts", "mvpd channel"]);
    }

    #[test]
    fn test_normalize_dedupes_case_insensitively() {
        let normalized = normalize_esm_columns(&["mvpd", "MVPD", "requestor-id", "no  REPORT columns", "No report columns"]);
        assert_eq!(normalized, vec!["mvpd", "requestor-id", "No report columns"]);
    }

    #[test]
    fn test_normalize_skips_blank_entries() {
        let normalized = normalize_esm_columns(&["", "   ", "<br/>"]);
        assert!(normalized.is_empty());
    }

    #[test]
    fn test_normalize_json_columns_coerces_values() {
        let values = vec![json!("mvpd"), json!(null), json!(42), json!("clientless-failures")];
        assert_eq!(normalize_json_columns(&values), vec!["mvpd", "42"]);
    }

    #[test]
    fn test_column_classification() {
        assert!(is_metric_column("authz-latency"));
        assert!(!is_metric_column("mvpd"));
        assert!(is_date_part("minute"));
        assert!(!is_date_part("second"));
    }
}
