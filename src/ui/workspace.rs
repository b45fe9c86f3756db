/// Decomp workspace page: controller banner, report cards and batch actions

use std::rc::Rc;
use yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use patternfly_yew::prelude::*;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use crate::channel::{ControllerChannel, LockGate, WorkspaceClient};
use crate::config::WorkspaceConfig;
use crate::error::ChannelError;
use crate::messages::{ActionResult, WorkspaceAction, route_inbound};
use crate::ui::card::{ReportCard, viewer_zone_label};
use crate::ui::components::StatusBar;
use crate::ui::js_error_text;
use crate::workspace::WorkspaceState;

// Import JS bridge functions
#[wasm_bindgen(module = "/workspace.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getCurrentWindowId() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(message: JsValue) -> Result<JsValue, JsValue>;

    fn addRuntimeMessageListener(callback: &js_sys::Function);

    fn removeRuntimeMessageListener(callback: &js_sys::Function);
}

/// `chrome.runtime.sendMessage` to the side-panel controller.
struct ChromeRuntimeChannel;

#[async_trait(?Send)]
impl ControllerChannel for ChromeRuntimeChannel {
    async fn send(&self, message: Value) -> Result<Value, ChannelError> {
        let message_js = message
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| ChannelError::Send(format!("Failed to serialize message: {:?}", e)))?;

        let reply = sendRuntimeMessage(message_js)
            .await
            .map_err(|e| ChannelError::Send(js_error_text(&e)))?;

        if reply.is_null() || reply.is_undefined() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(reply).map_err(|e| ChannelError::Decode(format!("{:?}", e)))
    }
}

/// An action waiting to be handed to the channel, with the lock status it
/// was issued under.
#[derive(Debug, Clone, PartialEq)]
struct Outgoing {
    id: u64,
    gate: LockGate,
    action: WorkspaceAction,
}

pub enum WorkspaceMsg {
    WindowId(u32),
    /// Raw runtime message; routed against the current window id.
    Inbound(Value),
    Ready,
    RerunCard(String),
    PathNode {
        card_id: String,
        endpoint_url: String,
        source_request_url: String,
    },
    RerunAll,
    DownloadCsv(String),
    MakeClickEsm,
    Replied { id: u64, result: ActionResult },
    CloseCard(String),
    ClearCards,
    ClickHeader {
        card_id: String,
        column: String,
        extend: bool,
    },
    CloseTable(String),
}

/// Workspace state plus the queue of actions the page still has to send.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceModel {
    pub state: WorkspaceState,
    outbox: Vec<Outgoing>,
    last_queued: u64,
}

impl WorkspaceModel {
    pub fn new(config: &WorkspaceConfig) -> Self {
        WorkspaceModel {
            state: WorkspaceState::new(config),
            outbox: Vec::new(),
            last_queued: 0,
        }
    }

    fn update(&mut self, msg: WorkspaceMsg) {
        let planned = match msg {
            WorkspaceMsg::WindowId(window_id) => {
                self.state.window_id = window_id;
                None
            }
            WorkspaceMsg::Inbound(message) => {
                if let Some(event) = route_inbound(&message, self.state.window_id) {
                    self.state.apply_event(event);
                }
                None
            }
            WorkspaceMsg::Ready => Some(WorkspaceAction::WorkspaceReady),
            WorkspaceMsg::RerunCard(card_id) => self.state.rerun_card_action(&card_id),
            WorkspaceMsg::PathNode {
                card_id,
                endpoint_url,
                source_request_url,
            } => self
                .state
                .path_node_action(&card_id, &endpoint_url, &source_request_url),
            WorkspaceMsg::RerunAll => self.state.rerun_all_action(),
            WorkspaceMsg::DownloadCsv(card_id) => self.state.download_csv_action(&card_id),
            WorkspaceMsg::MakeClickEsm => self.state.make_clickesm_action(),
            WorkspaceMsg::Replied { id, result } => {
                match self.outbox.iter().position(|outgoing| outgoing.id == id) {
                    Some(index) => {
                        let sent = self.outbox.remove(index);
                        self.state.record_result(&sent.action, &result);
                    }
                    None => debug!("Dropping reply for unknown action {}", id),
                }
                None
            }
            WorkspaceMsg::CloseCard(card_id) => {
                self.state.close_card(&card_id);
                None
            }
            WorkspaceMsg::ClearCards => {
                self.state.clear_cards();
                None
            }
            WorkspaceMsg::ClickHeader {
                card_id,
                column,
                extend,
            } => {
                self.state.click_header(&card_id, &column, extend);
                None
            }
            WorkspaceMsg::CloseTable(card_id) => {
                self.state.close_table(&card_id);
                None
            }
        };

        if let Some(action) = planned {
            self.last_queued += 1;
            self.outbox.push(Outgoing {
                id: self.last_queued,
                gate: self.state.lock_gate(),
                action,
            });
        }
    }

    /// Queued actions newer than `after`.
    fn unsent(&self, after: u64) -> Vec<Outgoing> {
        self.outbox
            .iter()
            .filter(|outgoing| outgoing.id > after)
            .cloned()
            .collect()
    }
}

impl Reducible for WorkspaceModel {
    type Action = WorkspaceMsg;

    fn reduce(self: Rc<Self>, msg: Self::Action) -> Rc<Self> {
        let mut next = (*self).clone();
        next.update(msg);
        Rc::new(next)
    }
}

#[derive(Properties, PartialEq)]
pub struct WorkspaceProps {
    pub config: WorkspaceConfig,
}

#[function_component(Workspace)]
pub fn workspace(props: &WorkspaceProps) -> Html {
    let model = use_reducer(|| WorkspaceModel::new(&props.config));
    let zone_label = use_memo((), |_| viewer_zone_label());
    let last_sent = use_mut_ref(|| 0u64);

    // Subscribe to controller events and announce readiness on mount
    {
        let dispatcher = model.dispatcher();
        use_effect_with((), move |_| {
            let listener = {
                let dispatcher = dispatcher.clone();
                Closure::wrap(Box::new(move |message: JsValue| {
                    match serde_wasm_bindgen::from_value::<Value>(message) {
                        Ok(message) => dispatcher.dispatch(WorkspaceMsg::Inbound(message)),
                        Err(e) => debug!("Ignoring unreadable runtime message: {:?}", e),
                    }
                }) as Box<dyn Fn(JsValue)>)
            };
            addRuntimeMessageListener(listener.as_ref().unchecked_ref());

            spawn_local(async move {
                match getCurrentWindowId().await {
                    Ok(window_id) => {
                        let window_id = window_id.as_f64().filter(|id| *id > 0.0).unwrap_or(0.0) as u32;
                        dispatcher.dispatch(WorkspaceMsg::WindowId(window_id));
                        info!("Workspace ready in window {}", window_id);
                    }
                    Err(e) => warn!("Failed to get current window: {}", js_error_text(&e)),
                }
                dispatcher.dispatch(WorkspaceMsg::Ready);
            });

            move || {
                removeRuntimeMessageListener(listener.as_ref().unchecked_ref());
                drop(listener);
            }
        });
    }

    // Hand newly queued actions to the controller
    {
        let dispatcher = model.dispatcher();
        let pending = model.unsent(*last_sent.borrow());
        let last_sent = last_sent.clone();
        use_effect_with(model.last_queued, move |_| {
            for outgoing in pending {
                *last_sent.borrow_mut() = outgoing.id;
                let dispatcher = dispatcher.clone();
                spawn_local(async move {
                    let client = WorkspaceClient::new(ChromeRuntimeChannel);
                    let result = client.send_action(&outgoing.gate, &outgoing.action).await;
                    dispatcher.dispatch(WorkspaceMsg::Replied {
                        id: outgoing.id,
                        result,
                    });
                });
            }
            || ()
        });
    }

    let state = &model.state;
    let disabled = state.action_buttons_disabled();

    // Card handlers
    let on_rerun = {
        let model = model.clone();
        Callback::from(move |card_id: String| model.dispatch(WorkspaceMsg::RerunCard(card_id)))
    };
    let on_path_node = {
        let model = model.clone();
        Callback::from(move |(card_id, endpoint_url, source_request_url): (String, String, String)| {
            model.dispatch(WorkspaceMsg::PathNode {
                card_id,
                endpoint_url,
                source_request_url,
            })
        })
    };
    let on_download_csv = {
        let model = model.clone();
        Callback::from(move |card_id: String| model.dispatch(WorkspaceMsg::DownloadCsv(card_id)))
    };
    let on_close_table = {
        let model = model.clone();
        Callback::from(move |card_id: String| model.dispatch(WorkspaceMsg::CloseTable(card_id)))
    };
    let on_close_card = {
        let model = model.clone();
        Callback::from(move |card_id: String| model.dispatch(WorkspaceMsg::CloseCard(card_id)))
    };
    let on_header_click = {
        let model = model.clone();
        Callback::from(move |(card_id, column, extend): (String, String, bool)| {
            model.dispatch(WorkspaceMsg::ClickHeader {
                card_id,
                column,
                extend,
            })
        })
    };

    // Toolbar handlers
    let on_rerun_all = {
        let model = model.clone();
        Callback::from(move |_| model.dispatch(WorkspaceMsg::RerunAll))
    };
    let on_clear_all = {
        let model = model.clone();
        Callback::from(move |_| model.dispatch(WorkspaceMsg::ClearCards))
    };
    let on_make_clickesm = {
        let model = model.clone();
        Callback::from(move |_| model.dispatch(WorkspaceMsg::MakeClickEsm))
    };

    let (banner_title, banner_detail) = state.controller_banner();

    if state.is_locked() {
        return html! {
            <div class="container workspace-locked">
                <div class="header">
                    <h1 class="main-title">{state.non_esm_headline()}</h1>
                </div>
                <Alert r#type={AlertType::Warning} title={state.lock_message()} inline={true} />
                if let Some(console_url) = state.console_applications_url() {
                    <p class="non-esm-link">
                        <a href={console_url} target="_blank" rel="noopener noreferrer">
                            {"Open this Media Company in Pass Console"}
                        </a>
                    </p>
                }
                <StatusBar status={state.status.clone()} />
            </div>
        };
    }

    html! {
        <div class="container">
            <div class="header">
                <div class="controller-banner">
                    <h1 class="main-title">{banner_title}</h1>
                    if !banner_detail.is_empty() {
                        <p class="controller-filters">{banner_detail}</p>
                    }
                </div>
                <div class="workspace-toolbar">
                    <Button onclick={on_rerun_all} disabled={disabled}>
                        {"Re-run All"}
                    </Button>
                    <Button onclick={on_clear_all} disabled={disabled} variant={ButtonVariant::Secondary}>
                        {"Clear All"}
                    </Button>
                    if state.make_clickesm_visible() {
                        <Button onclick={on_make_clickesm} disabled={disabled} variant={ButtonVariant::Secondary}>
                            {"Make clickESM"}
                        </Button>
                    }
                </div>
            </div>

            <StatusBar status={state.status.clone()} />

            if state.cards.is_empty() {
                <div class="empty-state">
                    <p>{"No reports yet."}</p>
                    <p class="empty-state-hint">{"Run an ESM report from the UnderPAR side panel."}</p>
                </div>
            } else {
                <div class="cards-list">
                    {for state.cards.iter().map(|card| html! {
                        <ReportCard
                            key={card.card_id.clone()}
                            card={card.clone()}
                            row_cap={props.config.visible_row_cap}
                            zone_label={(*zone_label).clone()}
                            disabled={disabled}
                            on_rerun={on_rerun.clone()}
                            on_path_node={on_path_node.clone()}
                            on_download_csv={on_download_csv.clone()}
                            on_close_table={on_close_table.clone()}
                            on_close_card={on_close_card.clone()}
                            on_header_click={on_header_click.clone()}
                        />
                    })}
                </div>
            }
        </div>
    }
}
