/// Access-token decoding and expiry reconciliation
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

const MILLISECOND_EXPIRES_IN_MIN: f64 = 100_000.0;
const MILLISECOND_EXPIRES_IN_MAX: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// URL-safe alphabet, padding optional, lenient about trailing bits.
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode base64url (or standard base64) text. Invalid input yields `None`.
pub fn decode_base64_url(value: &str) -> Option<String> {
    let normalized: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    if normalized.is_empty() {
        return None;
    }
    let bytes = LENIENT_URL_SAFE.decode(normalized.as_bytes()).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse JSON text that must be an object.
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(fields) => Some(fields),
        _ => None,
    }
}

/// Claims from the middle segment of a JWT-shaped token.
pub fn parse_jwt_payload(access_token: &str) -> Option<Map<String, Value>> {
    let token = access_token.trim();
    let mut parts = token.split('.');
    let _header = parts.next()?;
    let payload = parts.next()?;
    parse_json_object(&decode_base64_url(payload)?)
}

/// Finite positive number from a JSON value, string or number alike.
pub fn positive_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite() && *n > 0.0),
        Value::String(text) => positive_number_text(text),
        _ => None,
    }
}

pub fn positive_number_text(text: &str) -> Option<f64> {
    let number = text.trim().parse::<f64>().ok()?;
    (number.is_finite() && number > 0.0).then_some(number)
}

/// Expiry instant in epoch milliseconds, or 0 when nothing is known.
///
/// `token_expires_at` is the token's `exp` in milliseconds and wins whenever
/// it is known. A lone `expires_in` is read as seconds unless it falls in the
/// range that looks like milliseconds.
pub fn resolve_expiry(token_expires_at: Option<f64>, expires_in: Option<f64>, now_ms: f64) -> f64 {
    let token_expires_at = token_expires_at.filter(|value| value.is_finite() && *value > 0.0);
    let expires_in = expires_in.filter(|value| value.is_finite() && *value > 0.0);

    match (token_expires_at, expires_in) {
        (None, None) => 0.0,
        (Some(token_expires_at), _) => token_expires_at,
        (None, Some(expires_in)) => {
            if (MILLISECOND_EXPIRES_IN_MIN..=MILLISECOND_EXPIRES_IN_MAX).contains(&expires_in) {
                now_ms + expires_in
            } else {
                now_ms + expires_in * 1000.0
            }
        }
    }
}
