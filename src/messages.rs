/// Wire format between the workspace page and the side-panel controller
///
/// Payloads come from another extension context and are read loosely:
/// wrong types degrade to empty values instead of failing the whole event.
use crate::columns::normalize_json_columns;
use crate::report::ReportRow;
use crate::sort::SortRule;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const DECOMP_MESSAGE_TYPE: &str = "underpar:decomp";
pub const WORKSPACE_EVENT_CHANNEL: &str = "workspace-event";
pub const WORKSPACE_ACTION_CHANNEL: &str = "workspace-action";
pub const PATH_LINK_REQUEST_SOURCE: &str = "workspace-path-link";

/// `String(value || "")` semantics: falsy values become empty.
pub fn loose_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) if number.as_f64() == Some(0.0) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn loose_non_empty(value: Option<&Value>) -> Option<String> {
    Some(loose_string(value)).filter(|text| !text.is_empty())
}

fn loose_string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| loose_string(Some(item)).trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Card fields sent to the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload {
    pub card_id: String,
    pub endpoint_url: String,
    pub request_url: String,
    pub zoom_key: String,
    pub columns: Vec<String>,
}

/// Card fields pushed by the controller. `None` means "not supplied", which
/// leaves an existing card's value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardDescriptor {
    pub card_id: String,
    pub endpoint_url: Option<String>,
    pub request_url: Option<String>,
    pub zoom_key: Option<String>,
    pub columns: Option<Vec<String>>,
}

impl CardDescriptor {
    /// Descriptors without a card id are ignored.
    pub fn from_value(payload: &Value) -> Option<CardDescriptor> {
        let card_id = loose_string(payload.get("cardId")).trim().to_string();
        if card_id.is_empty() {
            return None;
        }
        Some(CardDescriptor {
            card_id,
            endpoint_url: loose_non_empty(payload.get("endpointUrl")),
            request_url: loose_non_empty(payload.get("requestUrl")),
            zoom_key: loose_non_empty(payload.get("zoomKey")),
            columns: payload
                .get("columns")
                .and_then(Value::as_array)
                .map(|columns| normalize_json_columns(columns)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportResult {
    pub card: CardDescriptor,
    pub ok: bool,
    pub error: Option<String>,
    pub rows: Vec<ReportRow>,
    pub last_modified: Option<String>,
}

/// Controller context pushed with every `controller-state` event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerSnapshot {
    pub online: bool,
    /// `None` until the controller knows whether the tenant has ESM.
    pub esm_available: Option<bool>,
    pub programmer_id: String,
    pub programmer_name: String,
    pub requestor_ids: Vec<String>,
    pub mvpd_ids: Vec<String>,
    pub login_history: Vec<Map<String, Value>>,
    /// The most recent login capture, kept apart from the history list.
    pub latest_login: Option<Map<String, Value>>,
}

impl ControllerSnapshot {
    pub fn from_value(payload: &Value) -> ControllerSnapshot {
        let latest = payload
            .get("profileHarvest")
            .and_then(Value::as_object)
            .cloned();
        let listed: Vec<Map<String, Value>> = payload
            .get("profileHarvestList")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).cloned().collect())
            .unwrap_or_default();
        let login_history = if listed.is_empty() {
            latest.iter().cloned().collect()
        } else {
            listed
        };

        ControllerSnapshot {
            online: payload.get("controllerOnline") == Some(&Value::Bool(true)),
            esm_available: payload.get("esmAvailable").and_then(Value::as_bool),
            programmer_id: loose_string(payload.get("programmerId")),
            programmer_name: loose_string(payload.get("programmerName")),
            requestor_ids: loose_string_list(payload.get("requestorIds")),
            mvpd_ids: loose_string_list(payload.get("mvpdIds")),
            login_history,
            latest_login: latest,
        }
    }
}

/// Events the controller pushes to the workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceEvent {
    ControllerState(ControllerSnapshot),
    ReportStart(CardDescriptor),
    ReportResult(ReportResult),
    BatchStart { total: usize },
    BatchEnd { total: usize },
    CsvComplete,
}

impl WorkspaceEvent {
    pub fn parse(event: &str, payload: &Value) -> Option<WorkspaceEvent> {
        let total = || {
            payload
                .get("total")
                .and_then(Value::as_f64)
                .filter(|total| total.is_finite() && *total > 0.0)
                .map_or(0, |total| total as usize)
        };

        match event.trim() {
            "controller-state" => Some(WorkspaceEvent::ControllerState(
                ControllerSnapshot::from_value(payload),
            )),
            "report-start" => CardDescriptor::from_value(payload).map(WorkspaceEvent::ReportStart),
            "report-result" => {
                let card = CardDescriptor::from_value(payload)?;
                let rows = payload
                    .get("rows")
                    .and_then(Value::as_array)
                    .map(|rows| {
                        rows.iter()
                            .filter_map(Value::as_object)
                            .map(|row| ReportRow::new(row.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                Some(WorkspaceEvent::ReportResult(ReportResult {
                    card,
                    ok: payload.get("ok") == Some(&Value::Bool(true)),
                    error: loose_non_empty(payload.get("error")),
                    rows,
                    last_modified: loose_non_empty(payload.get("lastModified")),
                }))
            }
            "batch-start" => Some(WorkspaceEvent::BatchStart { total: total() }),
            "batch-end" => Some(WorkspaceEvent::BatchEnd { total: total() }),
            "csv-complete" => Some(WorkspaceEvent::CsvComplete),
            _ => None,
        }
    }
}

/// Pick workspace events out of the runtime message stream.
///
/// Messages of another type or channel, or addressed to a different window,
/// are dropped.
pub fn route_inbound(message: &Value, window_id: u32) -> Option<WorkspaceEvent> {
    let message_type = message.get("type").and_then(Value::as_str);
    let channel = message.get("channel").and_then(Value::as_str);
    if message_type != Some(DECOMP_MESSAGE_TYPE) || channel != Some(WORKSPACE_EVENT_CHANNEL) {
        return None;
    }

    let target_window = message
        .get("targetWindowId")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    if target_window > 0.0 && window_id > 0 && target_window != f64::from(window_id) {
        debug!("Ignoring workspace event for window {}", target_window);
        return None;
    }

    let event = message.get("event").and_then(Value::as_str).unwrap_or_default();
    let empty = Value::Object(Map::new());
    let payload = match message.get("payload") {
        Some(payload) if payload.is_object() => payload,
        _ => &empty,
    };
    WorkspaceEvent::parse(event, payload)
}

/// Where a `run-card` request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSource {
    Rerun,
    PathLink,
}

/// Requests the workspace sends to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceAction {
    WorkspaceReady,
    RunCard { card: CardPayload, source: RunSource },
    RerunAll { cards: Vec<CardPayload> },
    DownloadCsv { card: CardPayload, sort_rule: SortRule },
    MakeClickEsm,
}

impl WorkspaceAction {
    pub fn name(&self) -> &'static str {
        match self {
            WorkspaceAction::WorkspaceReady => "workspace-ready",
            WorkspaceAction::RunCard { .. } => "run-card",
            WorkspaceAction::RerunAll { .. } => "rerun-all",
            WorkspaceAction::DownloadCsv { .. } => "download-csv",
            WorkspaceAction::MakeClickEsm => "make-clickesm",
        }
    }

    /// The readiness handshake is the only action allowed while locked.
    pub fn is_handshake(&self) -> bool {
        matches!(self, WorkspaceAction::WorkspaceReady)
    }

    pub fn to_message(&self) -> Value {
        let mut message = json!({
            "type": DECOMP_MESSAGE_TYPE,
            "channel": WORKSPACE_ACTION_CHANNEL,
            "action": self.name(),
        });

        let payload = match self {
            WorkspaceAction::WorkspaceReady | WorkspaceAction::MakeClickEsm => json!({}),
            WorkspaceAction::RunCard { card, source } => match source {
                RunSource::Rerun => json!({ "card": card }),
                RunSource::PathLink => {
                    json!({ "requestSource": PATH_LINK_REQUEST_SOURCE, "card": card })
                }
            },
            WorkspaceAction::RerunAll { cards } => json!({ "cards": cards }),
            WorkspaceAction::DownloadCsv { card, sort_rule } => {
                json!({ "card": card, "sortRule": sort_rule })
            }
        };

        if let (Some(target), Value::Object(fields)) = (message.as_object_mut(), payload) {
            target.extend(fields);
        }
        message
    }
}

/// Controller reply to an action: `{ok, error?, fileName?, ...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionResult {
    pub ok: bool,
    pub error: Option<String>,
    pub file_name: Option<String>,
    pub extra: Map<String, Value>,
}

impl ActionResult {
    pub fn failure(message: impl Into<String>) -> ActionResult {
        ActionResult {
            ok: false,
            error: Some(message.into()),
            ..ActionResult::default()
        }
    }

    /// Read a reply. Anything that is not an object is a failure without a
    /// message.
    pub fn from_value(value: &Value) -> ActionResult {
        let Some(fields) = value.as_object() else {
            return ActionResult::default();
        };
        let mut extra = fields.clone();
        for key in ["ok", "error", "fileName"] {
            extra.remove(key);
        }
        ActionResult {
            ok: fields.get("ok") == Some(&Value::Bool(true)),
            error: loose_non_empty(fields.get("error")),
            file_name: loose_non_empty(fields.get("fileName")),
            extra,
        }
    }

    /// The error text, or `fallback` when the controller gave none.
    pub fn error_or(&self, fallback: &str) -> String {
        self.error.clone().unwrap_or_else(|| fallback.to_string())
    }
}
