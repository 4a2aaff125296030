//! Typed inbound messaging.
//!
//! The scanning agent posts messages tagged with a `type` field. A
//! [`MessageRouter`] delivers each message to the single subscriber
//! registered for its tag and discards everything else.

use crate::services::MessageChannel;
use adscope_core::{AdscopeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Where an inbound message came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    /// URL of the page the agent ran in
    #[serde(default)]
    pub url: Option<String>,
    /// Browser tab the page was loaded in
    #[serde(default)]
    pub tab_id: Option<u64>,
}

/// A message as delivered by the channel: payload plus sender envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message payload, expected to carry a `type` tag
    pub message: Value,
    /// Sender envelope
    #[serde(default)]
    pub sender: MessageSender,
}

impl InboundMessage {
    /// Build a message from a payload and the URL of the sending page.
    #[must_use]
    pub fn from_page(message: Value, url: impl Into<String>) -> Self {
        Self {
            message,
            sender: MessageSender {
                url: Some(url.into()),
                tab_id: None,
            },
        }
    }

    /// The payload's `type` tag, if it has a textual one.
    #[must_use]
    pub fn message_type(&self) -> Option<&str> {
        self.message.get("type").and_then(Value::as_str)
    }
}

/// Request to receive every message with a given type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Type tag to subscribe to
    pub message_type: String,
}

impl Subscription {
    #[must_use]
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
        }
    }
}

/// Result of handing one message to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Queued for the subscriber of its type
    Delivered,
    /// No subscriber for the message's type, or no type tag at all
    Unroutable,
    /// The subscriber has gone away
    Closed,
}

/// In-process message channel keyed by type tag.
#[derive(Clone)]
pub struct MessageRouter {
    routes: Arc<RwLock<HashMap<String, mpsc::Sender<InboundMessage>>>>,
    buffer: usize,
}

impl MessageRouter {
    /// Default per-subscriber queue depth.
    pub const DEFAULT_BUFFER: usize = 256;

    /// Create a router with the default queue depth.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer(Self::DEFAULT_BUFFER)
    }

    /// Create a router whose subscriber queues hold up to `buffer` messages.
    #[must_use]
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    /// Route a message to its subscriber, waiting for queue space.
    pub async fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let Some(message_type) = message.message_type().map(str::to_owned) else {
            trace!("discarding message without a type tag");
            return DispatchOutcome::Unroutable;
        };

        let sender = self
            .routes
            .read()
            .expect("acquire read lock on routes")
            .get(&message_type)
            .cloned();

        let Some(sender) = sender else {
            trace!(message_type = %message_type, "no subscriber for message type");
            return DispatchOutcome::Unroutable;
        };

        if sender.send(message).await.is_ok() {
            DispatchOutcome::Delivered
        } else {
            debug!(message_type = %message_type, "subscriber closed, removing route");
            self.routes
                .write()
                .expect("acquire write lock on routes")
                .remove(&message_type);
            DispatchOutcome::Closed
        }
    }

    /// Whether a live subscriber exists for the type tag.
    #[must_use]
    pub fn has_subscriber(&self, message_type: &str) -> bool {
        self.routes
            .read()
            .expect("acquire read lock on routes")
            .get(message_type)
            .is_some_and(|sender| !sender.is_closed())
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageChannel for MessageRouter {
    fn subscribe(&self, subscription: Subscription) -> Result<mpsc::Receiver<InboundMessage>> {
        let mut routes = self.routes.write().expect("acquire write lock on routes");

        if routes
            .get(&subscription.message_type)
            .is_some_and(|sender| !sender.is_closed())
        {
            return Err(AdscopeError::Messaging(format!(
                "message type {} already has a subscriber",
                subscription.message_type
            )));
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        debug!(message_type = %subscription.message_type, "subscribed to message type");
        routes.insert(subscription.message_type, tx);
        Ok(rx)
    }
}
