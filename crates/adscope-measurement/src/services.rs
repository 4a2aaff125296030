//! Collaborator traits the measurement is wired against.
//!
//! Each trait stands for a browser or study facility that lives outside the
//! coordination pipeline. Implementations must be thread-safe (Send + Sync)
//! because report handlers run concurrently on the async runtime.

use crate::injector::{ContentScriptRegistration, ScriptRegistrationId};
use crate::messaging::{InboundMessage, Subscription};
use crate::record::TelemetryRecord;
use adscope_core::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Page identity service that assigns a stable id to every page visit.
#[async_trait]
pub trait PageManager: Send + Sync {
    /// Make sure page ids are being assigned before any agent runs.
    async fn initialize(&self) -> Result<()>;
}

/// Browser facility that injects scripts into matching pages.
#[async_trait]
pub trait ContentScriptHost: Send + Sync {
    /// Register a content script. The registration persists until the
    /// host itself goes away.
    ///
    /// # Errors
    /// Returns error if the host rejects the registration, for example
    /// because a match pattern is malformed.
    async fn register(&self, registration: ContentScriptRegistration)
        -> Result<ScriptRegistrationId>;
}

/// Typed inbound message channel.
pub trait MessageChannel: Send + Sync {
    /// Subscribe to every message carrying the subscription's type tag.
    ///
    /// # Errors
    /// Returns error if the subscription cannot be established.
    fn subscribe(&self, subscription: Subscription) -> Result<mpsc::Receiver<InboundMessage>>;
}

/// Participant survey identity resolver.
#[async_trait]
pub trait SurveyIdentity: Send + Sync {
    /// Current survey id of the participant, if one has been assigned.
    async fn survey_id(&self) -> Result<Option<String>>;
}

/// Remote telemetry transport used outside development mode.
#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    /// Submit a record under the given ping name.
    async fn send_ping(&self, ping_name: &str, payload: &TelemetryRecord) -> Result<()>;
}

/// Local diagnostic sink used in development mode.
pub trait DiagnosticSink: Send + Sync {
    /// Write a record under a diagnostic key.
    fn write(&self, key: &str, record: &TelemetryRecord) -> Result<()>;
}

/// The set of collaborators an activation is wired to.
#[derive(Clone)]
pub struct MeasurementServices {
    /// Page identity service
    pub page_manager: Arc<dyn PageManager>,
    /// Content script injection facility
    pub content_scripts: Arc<dyn ContentScriptHost>,
    /// Inbound message channel
    pub messages: Arc<dyn MessageChannel>,
    /// Survey identity resolver
    pub survey: Arc<dyn SurveyIdentity>,
    /// Diagnostic sink for development mode
    pub diagnostics: Arc<dyn DiagnosticSink>,
}
