/// Token redaction for messages that may be shown or posted
use regex::Regex;
use std::sync::LazyLock;

static BEARER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bBearer\s+[A-Za-z0-9._~-]{20,}\b").expect("static pattern")
});

static NAMED_TOKEN_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(access[_\s-]?token|id[_\s-]?token|refresh[_\s-]?token)\b\s*([:=])\s*([A-Za-z0-9._~-]{16,})",
    )
    .expect("static pattern")
});

static JWT_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\b")
        .expect("static pattern")
});

/// Replace bearer tokens, `access_token=...` style assignments and
/// JWT-shaped values.
pub fn redact_sensitive_token_values(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let text = BEARER_TOKEN.replace_all(raw, "Bearer <redacted>");
    let text = NAMED_TOKEN_VALUE.replace_all(&text, "${1}${2}<redacted>");
    JWT_VALUE.replace_all(&text, "<redacted-jwt>").into_owned()
}
