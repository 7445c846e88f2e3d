//! Notification dispatch: batching confirmed transitions into bridge messages.
//!
//! One message carries every region id that transitioned in the same
//! direction during one pass. Enter and exit ids are never mixed and empty
//! batches never reach the sink.

use std::sync::mpsc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Direction of a reported transition.
///
/// Serialized as its platform code (`Enter = 1`, `Exit = 2`), the values the
/// bridge's `GeofenceTransition` enum uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Transition {
    Enter,
    Exit,
}

impl Transition {
    pub fn code(self) -> u8 {
        match self {
            Transition::Enter => 1,
            Transition::Exit => 2,
        }
    }
}

impl From<Transition> for u8 {
    fn from(transition: Transition) -> Self {
        transition.code()
    }
}

impl TryFrom<u8> for Transition {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            1 => Ok(Transition::Enter),
            2 => Ok(Transition::Exit),
            other => Err(format!("unknown transition code {}", other)),
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Enter => write!(f, "enter"),
            Transition::Exit => write!(f, "exit"),
        }
    }
}

/// Message handed to the event-delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TransitionMessage {
    pub ids: Vec<String>,
    pub transition: Transition,
}

impl TransitionMessage {
    /// Bridge payload: `{"ids": [...], "transition": 1}`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Receives transition messages on the far side of the monitor.
///
/// Called while the monitor's lock is held, so implementations must not call
/// back into the monitor.
pub trait TransitionSink: Send {
    fn deliver(&self, message: TransitionMessage);
}

impl<F> TransitionSink for F
where
    F: Fn(TransitionMessage) + Send,
{
    fn deliver(&self, message: TransitionMessage) {
        self(message)
    }
}

/// Sink that forwards messages into an mpsc channel.
pub struct ChannelSink {
    sender: mpsc::Sender<TransitionMessage>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<TransitionMessage>) -> Self {
        Self { sender }
    }

    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::Receiver<TransitionMessage>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl TransitionSink for ChannelSink {
    fn deliver(&self, message: TransitionMessage) {
        if self.sender.send(message).is_err() {
            warn!("[Dispatcher] Transition receiver dropped, message discarded");
        }
    }
}

/// Batches ids per direction and hands them to a [`TransitionSink`].
pub struct NotificationDispatcher {
    sink: Box<dyn TransitionSink>,
}

impl NotificationDispatcher {
    pub fn new(sink: Box<dyn TransitionSink>) -> Self {
        Self { sink }
    }

    pub fn dispatch_enter(&self, ids: Vec<String>) {
        self.dispatch(ids, Transition::Enter);
    }

    pub fn dispatch_exit(&self, ids: Vec<String>) {
        self.dispatch(ids, Transition::Exit);
    }

    fn dispatch(&self, ids: Vec<String>, transition: Transition) {
        if ids.is_empty() {
            return;
        }
        info!("[Dispatcher] {} {} region(s): {:?}", transition, ids.len(), ids);
        self.sink.deliver(TransitionMessage { ids, transition });
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}
