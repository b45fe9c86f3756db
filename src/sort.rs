/// Multi-key sorting for report tables
use crate::dates::esm_parts_to_utc_ms;
use crate::report::{ReportRow, to_number};
use crate::table::{
    AUTHN_SUCCESS_COLUMN, AUTHZ_SUCCESS_COLUMN, COUNT_COLUMN, DATE_COLUMN, TableLayout,
    authn_rate, authz_rate,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// One key of a sort stack. Serializes as `{"col": .., "dir": "ASC"|"DESC"}`
/// for the controller's CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortRule {
    pub col: String,
    pub dir: SortDirection,
}

impl SortRule {
    pub fn new(col: impl Into<String>, dir: SortDirection) -> SortRule {
        SortRule { col: col.into(), dir }
    }
}

/// Ordered sort keys, primary first. A column appears at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortStack {
    rules: Vec<SortRule>,
}

impl Default for SortStack {
    fn default() -> Self {
        SortStack {
            rules: vec![SortRule::new(DATE_COLUMN, SortDirection::Desc)],
        }
    }
}

impl SortStack {
    pub fn rules(&self) -> &[SortRule] {
        &self.rules
    }

    pub fn primary(&self) -> Option<&SortRule> {
        self.rules.first()
    }

    /// Apply a header click.
    ///
    /// A plain click makes `column` the only key; its direction flips when it
    /// already was the only key and starts DESC otherwise. An extending
    /// (shift) click flips `column` in place or appends it DESC, keeping the
    /// other keys.
    pub fn click(&mut self, column: &str, extend: bool) {
        if extend {
            match self.rules.iter_mut().find(|rule| rule.col == column) {
                Some(rule) => rule.dir = rule.dir.toggled(),
                None => self.rules.push(SortRule::new(column, SortDirection::Desc)),
            }
            return;
        }

        let dir = match self.rules.as_slice() {
            [only] if only.col == column => only.dir.toggled(),
            _ => SortDirection::Desc,
        };
        self.rules = vec![SortRule::new(column, dir)];
    }

    /// Arrow for a header cell; only the primary key is marked.
    pub fn indicator(&self, column: &str) -> Option<&'static str> {
        self.primary()
            .filter(|rule| rule.col == column)
            .map(|rule| match rule.dir {
                SortDirection::Asc => "▲",
                SortDirection::Desc => "▼",
            })
    }
}

/// Comparison value of a cell. Numbers order before text.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Number(f64),
    Text(String),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        }
    }
}

pub fn sort_value(row: &ReportRow, column: &str, layout: &TableLayout) -> SortValue {
    if column == DATE_COLUMN {
        return SortValue::Number(esm_parts_to_utc_ms(&row.date_parts()) as f64);
    }
    if layout.has_authn && column == AUTHN_SUCCESS_COLUMN {
        return SortValue::Number(authn_rate(row).unwrap_or(-1.0));
    }
    if layout.has_authz && column == AUTHZ_SUCCESS_COLUMN {
        return SortValue::Number(authz_rate(row).unwrap_or(-1.0));
    }
    if column == COUNT_COLUMN {
        return SortValue::Number(row.number("count").unwrap_or(0.0));
    }

    match row.get(column) {
        None | Some(Value::Null) => SortValue::Text(String::new()),
        Some(value) => match to_number(value) {
            Some(number) => SortValue::Number(number),
            None => SortValue::Text(row.display(column).to_lowercase()),
        },
    }
}

/// Stable sort by `stack`, falling back to newest-first.
pub fn sort_rows(rows: &[ReportRow], stack: &SortStack, layout: &TableLayout) -> Vec<ReportRow> {
    let default_stack = SortStack::default();
    let rules = if stack.rules.is_empty() {
        default_stack.rules()
    } else {
        stack.rules()
    };

    // Precompute keys so each cell is derived once
    let mut keyed: Vec<(Vec<SortValue>, i64, &ReportRow)> = rows
        .iter()
        .map(|row| {
            let keys = rules.iter().map(|rule| sort_value(row, &rule.col, layout)).collect();
            (keys, esm_parts_to_utc_ms(&row.date_parts()), row)
        })
        .collect();

    keyed.sort_by(|a, b| {
        rules
            .iter()
            .enumerate()
            .map(|(index, rule)| rule.dir.apply(a.0[index].compare(&b.0[index])))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| b.1.cmp(&a.1))
    });

    keyed.into_iter().map(|(_, _, row)| row.clone()).collect()
}
