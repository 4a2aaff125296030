//! Adscope Measurement - advertisement measurement coordination.
//!
//! Activates at most once per process, registers the page-scanning agent on
//! the configured domains, validates the reports the agent sends back,
//! enriches them with the participant's survey identity and emits one
//! telemetry record per report, either to a local diagnostic sink
//! (development mode) or as a remote `advertisement` ping.
//!
//! Browser and study facilities are reached through the traits in
//! [`services`]; [`MessageRouter`], [`ScriptRegistry`],
//! [`FixedSurveyIdentity`], [`TracingDiagnosticSink`] and
//! [`HttpPingTransport`] are ready-made implementations.
//!
//! # Example
//!
//! ```rust,no_run
//! use adscope_measurement::{
//!     ActivationGate, AdvertisementMeasurement, FixedSurveyIdentity, HttpPingTransport,
//!     MeasurementOptions, MeasurementServices, MessageRouter, PipelineSettings,
//!     ScriptRegistry, StaticPageManager, TracingDiagnosticSink,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let router = MessageRouter::new();
//! let services = MeasurementServices {
//!     page_manager: Arc::new(StaticPageManager),
//!     content_scripts: Arc::new(ScriptRegistry::new()),
//!     messages: Arc::new(router.clone()),
//!     survey: Arc::new(FixedSurveyIdentity::new(None)),
//!     diagnostics: Arc::new(TracingDiagnosticSink),
//! };
//! let transport = HttpPingTransport::new(&Default::default())?;
//!
//! let measurement = AdvertisementMeasurement::new(services, PipelineSettings::default());
//! let options = MeasurementOptions::new(vec!["example.com".to_string()], Arc::new(transport));
//! let _outcome = measurement.start(ActivationGate::global(), options).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod emitter;
pub mod error;
pub mod gate;
pub mod identity;
pub mod injector;
pub mod listener;
pub mod measurement;
pub mod messaging;
pub mod outcome;
pub mod record;
pub mod report;
pub mod services;
pub mod transport;

pub use emitter::{diagnostic_key, EmissionTarget, Emitter, TracingDiagnosticSink, PING_NAME};
pub use error::{MeasurementError, Result};
pub use gate::{ActivationGate, ActivationState, ActivationSummary};
pub use identity::{resolve_user_id, FixedSurveyIdentity, StaticPageManager};
pub use injector::{
    inject_agent, ContentScriptRegistration, RunAt, ScriptFile, ScriptRegistrationId,
    ScriptRegistry, AGENT_SCRIPT_PATH,
};
pub use listener::{ListenerLimits, ReportHandler, ReportListener};
pub use measurement::{
    ActivationOutcome, AdvertisementMeasurement, MeasurementHandle, MeasurementOptions,
    PipelineSettings,
};
pub use messaging::{DispatchOutcome, InboundMessage, MessageRouter, MessageSender, Subscription};
pub use outcome::{HandlingOutcome, OutcomeEntry, OutcomeLog, PipelineStats, StatsSnapshot};
pub use record::TelemetryRecord;
pub use report::{validate_report, AdvertisementReport, FieldKind, SchemaViolation};
pub use services::{
    ContentScriptHost, DiagnosticSink, MeasurementServices, MessageChannel, PageManager,
    SurveyIdentity, TelemetryTransport,
};
pub use transport::HttpPingTransport;
