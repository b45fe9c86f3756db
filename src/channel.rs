/// Outbound action dispatch to the side-panel controller
use crate::error::ChannelError;
use crate::messages::{ActionResult, WorkspaceAction};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

/// Transport to the controller. The browser implementation wraps
/// `chrome.runtime.sendMessage`.
#[async_trait(?Send)]
pub trait ControllerChannel {
    async fn send(&self, message: Value) -> Result<Value, ChannelError>;
}

/// Lock status captured when an action is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockGate {
    pub locked: bool,
    pub message: String,
}

impl LockGate {
    pub fn open() -> LockGate {
        LockGate::default()
    }

    pub fn closed(message: impl Into<String>) -> LockGate {
        LockGate {
            locked: true,
            message: message.into(),
        }
    }
}

pub struct WorkspaceClient<C> {
    channel: C,
}

impl<C: ControllerChannel> WorkspaceClient<C> {
    pub fn new(channel: C) -> Self {
        WorkspaceClient { channel }
    }

    /// Send `action` and normalize the reply.
    ///
    /// While the gate is closed every action except the readiness handshake
    /// is refused here and never reaches the channel. Transport failures come
    /// back as `{ok: false, error}`.
    pub async fn send_action(&self, gate: &LockGate, action: &WorkspaceAction) -> ActionResult {
        if gate.locked && !action.is_handshake() {
            debug!("Refusing {} while workspace is locked", action.name());
            return ActionResult::failure(gate.message.clone());
        }

        match self.channel.send(action.to_message()).await {
            Ok(reply) => ActionResult::from_value(&reply),
            Err(e) => {
                warn!("{} failed: {}", action.name(), e);
                ActionResult::failure(e.to_string())
            }
        }
    }
}
