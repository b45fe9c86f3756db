/// Data structures for ESM report rows
use crate::dates::DateParts;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One time-bucketed row of a report, keyed by column name.
///
/// Key order is the order the API sent, which decides the order of extra
/// columns in the rendered table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportRow(Map<String, Value>);

impl ReportRow {
    pub fn new(fields: Map<String, Value>) -> ReportRow {
        ReportRow(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// A field counts as present when it exists and is not `null`.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|value| !value.is_null())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(to_number)
    }

    /// Text shown in a table cell; missing and `null` render empty.
    pub fn display(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn date_parts(&self) -> DateParts {
        let part = |key: &str, default: f64| -> f64 {
            match self.0.get(key) {
                None | Some(Value::Null) => default,
                Some(value) => to_number(value).unwrap_or(default),
            }
        };

        DateParts {
            year: part("year", 1970.0) as i64,
            month: part("month", 1.0) as i64,
            day: part("day", 1.0) as i64,
            hour: part("hour", 0.0) as i64,
            minute: part("minute", 0.0) as i64,
        }
    }
}

impl From<Map<String, Value>> for ReportRow {
    fn from(fields: Map<String, Value>) -> Self {
        ReportRow(fields)
    }
}

/// Loose numeric coercion for report cells.
///
/// Numbers pass through when finite, numeric strings are parsed (blank means
/// zero), booleans map to 0/1 and `null` to zero. Anything else is not a number.
pub fn to_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null => Some(0.0),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    };
    parsed.filter(|number| number.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> ReportRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_row_preserves_key_order() {
        let report_row = row(json!({"year": 2024, "zeta": 1, "alpha": 2, "mvpd": "Comcast"}));
        let keys: Vec<&String> = report_row.keys().collect();
        assert_eq!(keys, vec!["year", "zeta", "alpha", "mvpd"]);
    }

    #[test]
    fn test_has_treats_null_as_missing() {
        let report_row = row(json!({"count": null, "authn-attempts": 0}));
        assert!(!report_row.has("count"));
        assert!(report_row.has("authn-attempts"));
        assert!(!report_row.has("authn-successful"));
    }

    #[test]
    fn test_date_parts_defaults_and_coercion() {
        let report_row = row(json!({"year": "2023", "month": 7, "day": null, "hour": "x"}));
        let parts = report_row.date_parts();
        assert_eq!(parts.year, 2023);
        assert_eq!(parts.month, 7);
        assert_eq!(parts.day, 1);
        assert_eq!(parts.hour, 0);
        assert_eq!(parts.minute, 0);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(12.5)), Some(12.5));
        assert_eq!(to_number(&json!(" 42 ")), Some(42.0));
        assert_eq!(to_number(&json!("")), Some(0.0));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!(null)), Some(0.0));
        assert_eq!(to_number(&json!([1])), None);
        assert_eq!(to_number(&json!("inf")), None);
    }

    #[test]
    fn test_display() {
        let report_row = row(json!({"mvpd": "Comcast", "count": 3, "blank": null}));
        assert_eq!(report_row.display("mvpd"), "Comcast");
        assert_eq!(report_row.display("count"), "3");
        assert_eq!(report_row.display("blank"), "");
        assert_eq!(report_row.display("missing"), "");
    }

    #[test]
    fn test_serialization() {
        let report_row = row(json!({"year": 2024, "mvpd": "Comcast"}));
        let text = serde_json::to_string(&report_row).unwrap();
        assert_eq!(text, r#"{"year":2024,"mvpd":"Comcast"}"#);
    }
}
