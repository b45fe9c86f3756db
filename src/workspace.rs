/// Workspace state: report cards, controller context and lock handling
///
/// All mutation goes through `WorkspaceState` so the Yew layer only renders
/// and forwards clicks. Events from the controller are applied with
/// `apply_event`; user actions are planned with the `*_action` methods and
/// their replies recorded with `record_result`.
use crate::channel::LockGate;
use crate::config::WorkspaceConfig;
use crate::messages::{
    ActionResult, CardDescriptor, CardPayload, ControllerSnapshot, ReportResult, RunSource,
    WorkspaceAction, WorkspaceEvent, loose_string,
};
use crate::report::ReportRow;
use crate::request_context::{build_inherited_request_url, encode_uri_component};
use crate::sort::{SortStack, sort_rows};
use crate::table::TableLayout;
use log::{debug, info};
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

const WORKSPACE_LOCK_MESSAGE_SUFFIX: &str = "does not have access to ESM. Please confirm if the console is out of sync and this Media Company should have access to ESM.";
const DEFAULT_CLICKESM_FILE_NAME: &str = "clickESM.html";

static CARD_ID_PREFIX_JUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[^a-z0-9_-]+").expect("static pattern"));

/// Fresh card id such as `path-5f0c...`.
pub fn build_workspace_card_id(prefix: &str) -> String {
    let prefix = if prefix.is_empty() { "workspace" } else { prefix };
    let normalized = CARD_ID_PREFIX_JUNK.replace_all(prefix, "-");
    format!("{}-{}", normalized, Uuid::new_v4())
}

/// Where a card is in its request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardPhase {
    Waiting,
    Loading,
    Populated,
    Empty,
    Error(String),
    /// The user closed the table; the card stays.
    Closed,
}

impl CardPhase {
    /// Body message for phases without a table, and whether it is an error.
    pub fn message(&self) -> Option<(&str, bool)> {
        match self {
            CardPhase::Waiting => Some(("Waiting for data...", false)),
            CardPhase::Loading => Some(("Loading report...", false)),
            CardPhase::Populated => None,
            CardPhase::Empty => Some(("No data", false)),
            CardPhase::Error(message) => Some((message.as_str(), true)),
            CardPhase::Closed => Some(("Table closed.", false)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardState {
    pub card_id: String,
    pub endpoint_url: String,
    pub request_url: String,
    pub zoom_key: String,
    pub columns: Vec<String>,
    /// Rows in display order.
    pub rows: Vec<ReportRow>,
    pub layout: Option<TableLayout>,
    pub sort_stack: SortStack,
    pub last_modified: Option<String>,
    pub running: bool,
    pub phase: CardPhase,
}

impl CardState {
    fn from_descriptor(descriptor: &CardDescriptor) -> CardState {
        let endpoint_url = descriptor.endpoint_url.clone().unwrap_or_default();
        CardState {
            card_id: descriptor.card_id.clone(),
            request_url: descriptor
                .request_url
                .clone()
                .unwrap_or_else(|| endpoint_url.clone()),
            endpoint_url,
            zoom_key: descriptor.zoom_key.clone().unwrap_or_default(),
            columns: descriptor.columns.clone().unwrap_or_default(),
            rows: Vec::new(),
            layout: None,
            sort_stack: SortStack::default(),
            last_modified: None,
            running: false,
            phase: CardPhase::Waiting,
        }
    }

    fn merge_descriptor(&mut self, descriptor: &CardDescriptor) {
        if let Some(endpoint_url) = &descriptor.endpoint_url {
            self.endpoint_url = endpoint_url.clone();
        }
        if let Some(request_url) = &descriptor.request_url {
            self.request_url = request_url.clone();
        }
        if let Some(zoom_key) = &descriptor.zoom_key {
            self.zoom_key = zoom_key.clone();
        }
        if let Some(columns) = &descriptor.columns {
            self.columns = columns.clone();
        }
    }

    pub fn payload(&self) -> CardPayload {
        CardPayload {
            card_id: self.card_id.clone(),
            endpoint_url: self.endpoint_url.clone(),
            request_url: self.request_url.clone(),
            zoom_key: self.zoom_key.clone(),
            columns: self.columns.clone(),
        }
    }

    /// The URL shown in the header: the request URL, else the endpoint.
    pub fn display_url(&self) -> &str {
        let request_url = self.request_url.trim();
        if request_url.is_empty() {
            self.endpoint_url.trim()
        } else {
            request_url
        }
    }

    pub fn subtitle(&self) -> String {
        let zoom = if self.zoom_key.is_empty() {
            "--"
        } else {
            self.zoom_key.as_str()
        };
        format!("Zoom: {} | Rows: {}", zoom, self.rows.len())
    }

    fn start(&mut self) {
        self.running = true;
        self.rows.clear();
        self.layout = None;
        self.sort_stack = SortStack::default();
        self.phase = CardPhase::Loading;
    }

    fn finish(&mut self, result: ReportResult) {
        self.running = false;
        if !result.ok {
            self.phase = CardPhase::Error(result.error.unwrap_or_else(|| "Request failed.".to_string()));
            return;
        }

        self.sort_stack = SortStack::default();
        self.last_modified = result.last_modified;
        self.layout = TableLayout::infer(&result.rows);
        match &self.layout {
            Some(layout) => {
                self.rows = sort_rows(&result.rows, &self.sort_stack, layout);
                self.phase = CardPhase::Populated;
            }
            None => {
                self.rows = Vec::new();
                self.phase = CardPhase::Empty;
            }
        }
    }

    pub fn click_header(&mut self, column: &str, extend: bool) {
        let Some(layout) = &self.layout else {
            return;
        };
        self.sort_stack.click(column, extend);
        self.rows = sort_rows(&self.rows, &self.sort_stack, layout);
    }

    pub fn close_table(&mut self) {
        self.rows.clear();
        self.layout = None;
        self.last_modified = None;
        self.sort_stack = SortStack::default();
        self.phase = CardPhase::Closed;
    }

    /// Payload for a new card opened from one of this card's path links.
    pub fn path_node_payload(&self, endpoint_url: &str, source_request_url: &str) -> Option<CardPayload> {
        let endpoint_url = endpoint_url.trim();
        if endpoint_url.is_empty() {
            return None;
        }
        let source = if source_request_url.trim().is_empty() {
            self.request_url.as_str()
        } else {
            source_request_url
        };
        let inherited = build_inherited_request_url(endpoint_url, source);

        Some(CardPayload {
            card_id: build_workspace_card_id("path"),
            endpoint_url: endpoint_url.to_string(),
            request_url: if inherited.is_empty() {
                endpoint_url.to_string()
            } else {
                inherited
            },
            zoom_key: self.zoom_key.clone(),
            columns: self.columns.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusKind {
    #[default]
    Info,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    pub message: String,
    pub kind: StatusKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceState {
    pub window_id: u32,
    pub controller: ControllerSnapshot,
    /// Newest card first.
    pub cards: Vec<CardState>,
    pub batch_running: bool,
    pub status: StatusLine,
    console_programmers_url: String,
}

impl WorkspaceState {
    pub fn new(config: &WorkspaceConfig) -> WorkspaceState {
        WorkspaceState {
            window_id: 0,
            controller: ControllerSnapshot::default(),
            cards: Vec::new(),
            batch_running: false,
            status: StatusLine::default(),
            console_programmers_url: config.pass_console_programmers_url.clone(),
        }
    }

    pub fn set_status(&mut self, message: &str, kind: StatusKind) {
        self.status = StatusLine {
            message: message.trim().to_string(),
            kind,
        };
    }

    pub fn card(&self, card_id: &str) -> Option<&CardState> {
        self.cards.iter().find(|card| card.card_id == card_id)
    }

    fn card_mut(&mut self, card_id: &str) -> Option<&mut CardState> {
        self.cards.iter_mut().find(|card| card.card_id == card_id)
    }

    fn ensure_card(&mut self, descriptor: &CardDescriptor) -> &mut CardState {
        match self.cards.iter().position(|card| card.card_id == descriptor.card_id) {
            Some(index) => {
                let card = &mut self.cards[index];
                card.merge_descriptor(descriptor);
                card
            }
            None => {
                debug!("Creating card {}", descriptor.card_id);
                self.cards.insert(0, CardState::from_descriptor(descriptor));
                &mut self.cards[0]
            }
        }
    }

    pub fn apply_event(&mut self, event: WorkspaceEvent) {
        match event {
            WorkspaceEvent::ControllerState(snapshot) => self.apply_controller_state(snapshot),
            WorkspaceEvent::ReportStart(descriptor) => self.ensure_card(&descriptor).start(),
            WorkspaceEvent::ReportResult(result) => {
                let failure = (!result.ok)
                    .then(|| result.error.clone().unwrap_or_else(|| "Request failed.".to_string()));
                let descriptor = result.card.clone();
                self.ensure_card(&descriptor).finish(result);
                if let Some(message) = failure {
                    self.set_status(&message, StatusKind::Error);
                }
            }
            WorkspaceEvent::BatchStart { total } => {
                self.batch_running = true;
                let message = if total > 0 {
                    format!("Re-running {} report(s)...", total)
                } else {
                    "Re-running reports...".to_string()
                };
                self.set_status(&message, StatusKind::Info);
            }
            WorkspaceEvent::BatchEnd { total } => {
                self.batch_running = false;
                let message = if total > 0 {
                    format!("Re-run completed for {} report(s).", total)
                } else {
                    "Re-run completed.".to_string()
                };
                self.set_status(&message, StatusKind::Info);
            }
            WorkspaceEvent::CsvComplete => self.set_status("CSV download started.", StatusKind::Info),
        }
    }

    fn apply_controller_state(&mut self, snapshot: ControllerSnapshot) {
        self.controller = snapshot;
        if self.is_locked() {
            info!("Workspace locked for {}", self.programmer_label());
            self.cards.clear();
        }
    }

    fn has_programmer_context(&self) -> bool {
        !self.controller.programmer_id.trim().is_empty()
            || !self.controller.programmer_name.trim().is_empty()
    }

    /// Locked (and shown as the non-ESM screen) when the controller is
    /// offline, the tenant is known to lack ESM, and a tenant is selected.
    pub fn is_locked(&self) -> bool {
        !self.controller.online
            && self.controller.esm_available == Some(false)
            && self.has_programmer_context()
    }

    pub fn programmer_label(&self) -> String {
        let name = self.controller.programmer_name.trim();
        let id = self.controller.programmer_id.trim();
        match (name.is_empty(), id.is_empty()) {
            (false, false) if name != id => format!("{} ({})", name, id),
            (false, _) => name.to_string(),
            (true, false) => id.to_string(),
            (true, true) => "Selected Media Company".to_string(),
        }
    }

    pub fn lock_message(&self) -> String {
        format!("{} {}", self.programmer_label(), WORKSPACE_LOCK_MESSAGE_SUFFIX)
    }

    pub fn lock_gate(&self) -> LockGate {
        if self.is_locked() {
            LockGate::closed(self.lock_message())
        } else {
            LockGate::open()
        }
    }

    pub fn non_esm_headline(&self) -> String {
        format!(
            "No Soup for {}. No Premium, No ESM, No Dice.",
            self.programmer_label()
        )
    }

    /// Pass Console page listing the selected programmer's applications.
    pub fn console_applications_url(&self) -> Option<String> {
        let id = self.controller.programmer_id.trim();
        if id.is_empty() {
            return None;
        }
        Some(format!(
            "{}/{}/applications",
            self.console_programmers_url,
            encode_uri_component(id)
        ))
    }

    /// Headline and filter line for the controller banner.
    pub fn controller_banner(&self) -> (String, String) {
        if !self.controller.online {
            return if self.is_locked() {
                (
                    format!("Selected Media Company: {}", self.programmer_label()),
                    "decomp workspace is locked for this media company. No Premium, No ESM, No Dice."
                        .to_string(),
                )
            } else if self.has_programmer_context() {
                (
                    format!("Selected Media Company: {}", self.programmer_label()),
                    "Waiting for decomp controller sync from UnderPAR side panel...".to_string(),
                )
            } else {
                (
                    "Waiting for UnderPAR side panel controller...".to_string(),
                    String::new(),
                )
            };
        }

        let requestors = if self.controller.requestor_ids.is_empty() {
            "All requestors".to_string()
        } else {
            self.controller.requestor_ids.join(", ")
        };
        let mvpds = if self.controller.mvpd_ids.is_empty() {
            "All MVPDs".to_string()
        } else {
            self.controller.mvpd_ids.join(", ")
        };

        let history = &self.controller.login_history;
        let latest = self.controller.latest_login.as_ref().or(history.first());
        let history_summary = match latest {
            None => String::new(),
            Some(latest) => {
                let requestor = loose_string(latest.get("requestorId")).trim().to_string();
                let mvpd = loose_string(latest.get("mvpd")).trim().to_string();
                let pair = if requestor.is_empty() && mvpd.is_empty() {
                    String::new()
                } else {
                    format!(
                        " | Latest: {} x {}",
                        if requestor.is_empty() { "requestor" } else { &requestor },
                        if mvpd.is_empty() { "mvpd" } else { &mvpd }
                    )
                };
                format!(" | MVPD Login History: {} captured{}", history.len(), pair)
            }
        };

        (
            format!("Selected Media Company: {}", self.programmer_label()),
            format!("RequestorId(s): {} | MVPD(s): {}{}", requestors, mvpds, history_summary),
        )
    }

    pub fn action_buttons_disabled(&self) -> bool {
        self.batch_running || self.is_locked()
    }

    pub fn make_clickesm_visible(&self) -> bool {
        self.controller.esm_available == Some(true)
    }

    /// Refuse a user action while locked, reporting why on the status line.
    pub fn ensure_unlocked(&mut self) -> bool {
        if !self.is_locked() {
            return true;
        }
        let message = self.lock_message();
        self.set_status(&message, StatusKind::Error);
        false
    }

    pub fn close_card(&mut self, card_id: &str) {
        self.cards.retain(|card| card.card_id != card_id);
    }

    pub fn clear_cards(&mut self) {
        if self.ensure_unlocked() {
            self.cards.clear();
        }
    }

    pub fn click_header(&mut self, card_id: &str, column: &str, extend: bool) {
        if let Some(card) = self.card_mut(card_id) {
            card.click_header(column, extend);
        }
    }

    pub fn close_table(&mut self, card_id: &str) {
        if let Some(card) = self.card_mut(card_id) {
            card.close_table();
        }
    }

    pub fn rerun_card_action(&mut self, card_id: &str) -> Option<WorkspaceAction> {
        if !self.ensure_unlocked() {
            return None;
        }
        let card = self.card(card_id)?;
        Some(WorkspaceAction::RunCard {
            card: card.payload(),
            source: RunSource::Rerun,
        })
    }

    pub fn path_node_action(
        &mut self,
        card_id: &str,
        endpoint_url: &str,
        source_request_url: &str,
    ) -> Option<WorkspaceAction> {
        if !self.ensure_unlocked() {
            return None;
        }
        let card = self
            .card(card_id)?
            .path_node_payload(endpoint_url, source_request_url)?;
        Some(WorkspaceAction::RunCard {
            card,
            source: RunSource::PathLink,
        })
    }

    pub fn rerun_all_action(&mut self) -> Option<WorkspaceAction> {
        if !self.ensure_unlocked() {
            return None;
        }
        if self.cards.is_empty() {
            self.set_status("No reports are open.", StatusKind::Info);
            return None;
        }

        let cards: Vec<CardPayload> = self.cards.iter().map(CardState::payload).collect();
        self.batch_running = true;
        self.set_status(&format!("Re-running {} report(s)...", cards.len()), StatusKind::Info);
        Some(WorkspaceAction::RerunAll { cards })
    }

    pub fn download_csv_action(&mut self, card_id: &str) -> Option<WorkspaceAction> {
        if !self.ensure_unlocked() {
            return None;
        }
        let card = self.card(card_id)?;
        let sort_rule = card
            .sort_stack
            .primary()
            .cloned()
            .or_else(|| SortStack::default().primary().cloned())?;
        Some(WorkspaceAction::DownloadCsv {
            card: card.payload(),
            sort_rule,
        })
    }

    pub fn make_clickesm_action(&mut self) -> Option<WorkspaceAction> {
        if !self.ensure_unlocked() {
            return None;
        }
        if self.controller.esm_available != Some(true) {
            self.set_status(
                "clickESM generation is only available for media companies with ESM.",
                StatusKind::Error,
            );
            return None;
        }
        self.set_status("Generating clickESM file...", StatusKind::Info);
        Some(WorkspaceAction::MakeClickEsm)
    }

    /// Reflect a controller reply on the status line and cards.
    pub fn record_result(&mut self, action: &WorkspaceAction, result: &ActionResult) {
        match action {
            WorkspaceAction::WorkspaceReady => {
                if !result.ok {
                    let message =
                        result.error_or("Unable to contact UnderPAR side panel controller.");
                    self.set_status(&message, StatusKind::Error);
                }
            }
            WorkspaceAction::RunCard { card, source } => {
                if result.ok {
                    return;
                }
                match source {
                    RunSource::Rerun => {
                        let message = result
                            .error_or("Unable to run report from UnderPAR side panel controller.");
                        if let Some(existing) = self.card_mut(&card.card_id) {
                            existing.phase = CardPhase::Error(message.clone());
                        }
                        self.set_status(&message, StatusKind::Error);
                    }
                    RunSource::PathLink => {
                        let message = result.error_or("Unable to run ESM path node report.");
                        self.set_status(&message, StatusKind::Error);
                    }
                }
            }
            WorkspaceAction::RerunAll { .. } => {
                if !result.ok {
                    self.batch_running = false;
                    let message = result.error_or("Unable to re-run reports.");
                    self.set_status(&message, StatusKind::Error);
                }
            }
            WorkspaceAction::DownloadCsv { .. } => {
                if result.ok {
                    self.set_status("CSV download started.", StatusKind::Info);
                } else {
                    let message = result.error_or("Unable to download CSV.");
                    self.set_status(&message, StatusKind::Error);
                }
            }
            WorkspaceAction::MakeClickEsm => {
                if result.ok {
                    let file_name = result
                        .file_name
                        .as_deref()
                        .unwrap_or(DEFAULT_CLICKESM_FILE_NAME);
                    self.set_status(&format!("Downloaded {}.", file_name), StatusKind::Info);
                } else {
                    let message = result.error_or("Unable to generate clickESM file.");
                    self.set_status(&message, StatusKind::Error);
                }
            }
        }
    }
}
