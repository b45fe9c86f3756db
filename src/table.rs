/// Report table layout: derived columns, cell text and viewport sizing
use crate::columns::{ESM_IDENTIFIER_COLUMN, is_date_part, is_metric_column};
use crate::dates::format_esm_date_label;
use crate::report::{ReportRow, to_number};
use chrono::TimeZone;
use std::fmt::Display;

pub const DATE_COLUMN: &str = "DATE";
pub const AUTHN_SUCCESS_COLUMN: &str = "AuthN Success";
pub const AUTHZ_SUCCESS_COLUMN: &str = "AuthZ Success";
pub const COUNT_COLUMN: &str = "COUNT";

pub const DEFAULT_VISIBLE_ROW_CAP: usize = 10;

const DEFAULT_ROW_HEIGHT: f64 = 36.0;
const DEFAULT_HEADER_HEIGHT: f64 = 42.0;
const DEFAULT_FOOTER_HEIGHT: f64 = 40.0;

/// Which columns a table shows, inferred once from its first row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    pub has_authn: bool,
    pub has_authz: bool,
    pub has_count: bool,
    pub display_columns: Vec<String>,
}

impl TableLayout {
    /// Returns `None` for an empty row set.
    pub fn infer(rows: &[ReportRow]) -> Option<TableLayout> {
        let first = rows.first()?;

        let display_columns = first
            .keys()
            .filter(|key| {
                !is_metric_column(key) && !is_date_part(key) && key.as_str() != ESM_IDENTIFIER_COLUMN
            })
            .cloned()
            .collect();

        Some(TableLayout {
            has_authn: first.has("authn-attempts") && first.has("authn-successful"),
            has_authz: first.has("authz-attempts") && first.has("authz-successful"),
            has_count: first.has("count"),
            display_columns,
        })
    }

    /// The plain count column only appears when no rate column does.
    pub fn shows_count(&self) -> bool {
        !self.has_authn && !self.has_authz && self.has_count
    }

    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec![DATE_COLUMN.to_string()];
        if self.has_authn {
            headers.push(AUTHN_SUCCESS_COLUMN.to_string());
        }
        if self.has_authz {
            headers.push(AUTHZ_SUCCESS_COLUMN.to_string());
        }
        if self.shows_count() {
            headers.push(COUNT_COLUMN.to_string());
        }
        headers.extend(self.display_columns.iter().cloned());
        headers
    }

    pub fn row_cells<Tz>(&self, row: &ReportRow, tz: &Tz, zone_label: &str) -> Vec<String>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let mut cells = vec![format_esm_date_label(&row.date_parts(), tz, zone_label)];
        if self.has_authn {
            cells.push(format_percent(authn_rate(row)));
        }
        if self.has_authz {
            cells.push(format_percent(authz_rate(row)));
        }
        if self.shows_count() {
            cells.push(row.display("count"));
        }
        cells.extend(self.display_columns.iter().map(|column| row.display(column)));
        cells
    }
}

pub fn authn_rate(row: &ReportRow) -> Option<f64> {
    safe_rate(row.number("authn-successful"), row.number("authn-attempts"))
}

pub fn authz_rate(row: &ReportRow) -> Option<f64> {
    safe_rate(row.number("authz-successful"), row.number("authz-attempts"))
}

/// `numerator / denominator`, undefined for a missing, non-finite or
/// non-positive denominator.
pub fn safe_rate(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let numerator = numerator?;
    let denominator = denominator.filter(|d| d.is_finite() && *d > 0.0)?;
    let rate = numerator / denominator;
    rate.is_finite().then_some(rate)
}

pub fn format_percent(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.2}%", rate * 100.0),
        None => "—".to_string(),
    }
}

/// Measured pixel heights of a rendered table; missing parts use defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TableGeometry {
    pub header_height: Option<f64>,
    pub row_height: Option<f64>,
    pub footer_height: Option<f64>,
}

/// Max height for the scroll wrapper so at most `row_cap` rows are visible.
pub fn viewport_height(total_rows: usize, geometry: TableGeometry, row_cap: usize) -> u32 {
    let visible_rows = if total_rows > 0 {
        total_rows.min(row_cap.max(1))
    } else {
        1
    };
    let header = geometry.header_height.unwrap_or(DEFAULT_HEADER_HEIGHT);
    let footer = geometry.footer_height.unwrap_or(DEFAULT_FOOTER_HEIGHT);
    let row = geometry.row_height.unwrap_or(DEFAULT_ROW_HEIGHT);

    (header + footer + row * visible_rows as f64 + 2.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{Value, json};

    fn rows(values: Vec<Value>) -> Vec<ReportRow> {
        values.into_iter().map(|v| serde_json::from_value(v).unwrap()).collect()
    }

    #[test]
    fn test_layout_with_both_rates() {
        let data = rows(vec![json!({
            "year": 2024, "month": 1, "day": 1, "hour": 0, "minute": 0,
            "media-company": "acme",
            "mvpd": "Comcast",
            "authn-attempts": 10, "authn-successful": 9,
            "authz-attempts": 4, "authz-successful": 2,
            "count": 7,
            "requestor-id": "espn"
        })]);
        let layout = TableLayout::infer(&data).unwrap();

        assert!(layout.has_authn && layout.has_authz && layout.has_count);
        assert!(!layout.shows_count());
        assert_eq!(layout.display_columns, vec!["mvpd", "requestor-id"]);
        assert_eq!(
            layout.headers(),
            vec!["DATE", "AuthN Success", "AuthZ Success", "mvpd", "requestor-id"]
        );
    }

    #[test]
    fn test_layout_requires_both_rate_fields() {
        let data = rows(vec![json!({
            "authn-attempts": 10,
            "authz-successful": 3,
            "count": 12
        })]);
        let layout = TableLayout::infer(&data).unwrap();

        assert!(!layout.has_authn);
        assert!(!layout.has_authz);
        assert!(layout.shows_count());
        assert_eq!(layout.headers(), vec!["DATE", "COUNT"]);
    }

    #[test]
    fn test_layout_reads_only_first_row() {
        let data = rows(vec![
            json!({"mvpd": "Comcast"}),
            json!({"mvpd": "Dish", "count": 3, "channel": "x"}),
        ]);
        let layout = TableLayout::infer(&data).unwrap();
        assert!(!layout.has_count);
        assert_eq!(layout.headers(), vec!["DATE", "mvpd"]);
    }

    #[test]
    fn test_layout_empty_rows() {
        assert!(TableLayout::infer(&[]).is_none());
    }

    #[test]
    fn test_safe_rate_and_percent() {
        assert_eq!(format_percent(safe_rate(Some(9.0), Some(10.0))), "90.00%");
        assert_eq!(format_percent(safe_rate(Some(1.0), Some(3.0))), "33.33%");
        assert_eq!(safe_rate(Some(1.0), Some(0.0)), None);
        assert_eq!(safe_rate(Some(1.0), Some(-2.0)), None);
        assert_eq!(safe_rate(Some(1.0), None), None);
        assert_eq!(safe_rate(None, Some(2.0)), None);
        assert_eq!(format_percent(None), "—");
    }

    #[test]
    fn test_row_cells() {
        let data = rows(vec![json!({
            "year": 2024, "month": 1, "day": 15, "hour": 20, "minute": 30,
            "authn-attempts": "4", "authn-successful": 3,
            "mvpd": "Comcast", "note": null
        })]);
        let layout = TableLayout::infer(&data).unwrap();
        let cells = layout.row_cells(&data[0], &Utc, "UTC");
        assert_eq!(cells, vec!["01/16/2024, 04:30 AM UTC", "75.00%", "Comcast", ""]);
    }

    #[test]
    fn test_count_cell_rendered_verbatim() {
        let data = rows(vec![json!({"count": 12, "mvpd": "Dish"})]);
        let layout = TableLayout::infer(&data).unwrap();
        let cells = layout.row_cells(&data[0], &Utc, "");
        assert_eq!(&cells[1..], &["12".to_string(), "Dish".to_string()]);
    }

    #[test]
    fn test_viewport_height() {
        let measured = TableGeometry {
            header_height: Some(40.0),
            row_height: Some(30.5),
            footer_height: Some(38.0),
        };
        assert_eq!(viewport_height(25, measured, 10), 385);
        assert_eq!(viewport_height(3, measured, 10), 172);
        assert_eq!(viewport_height(0, TableGeometry::default(), 10), 120);
    }
}
