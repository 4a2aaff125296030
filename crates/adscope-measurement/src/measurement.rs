//! Measurement entry point.
//!
//! [`AdvertisementMeasurement::start`] wires the pipeline together: it
//! claims the activation gate, waits for the page identity service,
//! compiles the domain allow-list, registers the scanning agent, subscribes
//! to reports, picks the emission sink and spawns the listener.

use crate::emitter::Emitter;
use crate::error::{MeasurementError, Result};
use crate::gate::{ActivationGate, ActivationSummary};
use crate::injector::{inject_agent, ScriptRegistrationId};
use crate::listener::{ListenerLimits, ReportHandler, ReportListener};
use crate::messaging::Subscription;
use crate::outcome::{OutcomeEntry, OutcomeLog, PipelineStats, StatsSnapshot};
use crate::services::{MeasurementServices, TelemetryTransport};
use adscope_core::MeasurementConfig;
use adscope_matching::{domains_to_match_patterns, MatchPatternSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pipeline settings that are not part of the per-activation options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Prefix of the message type, record type and diagnostic keys
    pub namespace: String,
    /// Also cover subdomains of every configured domain
    pub match_subdomains: bool,
    /// Upper bound on one report's handling time
    pub handler_timeout: Duration,
    /// Reports handled concurrently
    pub max_concurrent_reports: usize,
    /// Outcomes retained in the handle's outcome log
    pub outcome_log_capacity: usize,
}

impl PipelineSettings {
    /// Settings from the `[measurement]` config section.
    #[must_use]
    pub fn from_config(config: &MeasurementConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            match_subdomains: config.match_subdomains,
            handler_timeout: config.handler_timeout(),
            max_concurrent_reports: config.max_concurrent_reports,
            outcome_log_capacity: config.outcome_log_capacity,
        }
    }

    /// Type tag of agent reports, which is also the record type.
    #[must_use]
    pub fn message_type(&self) -> String {
        format!("{}.advertisements", self.namespace)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&MeasurementConfig::default())
    }
}

/// Options supplied with a start request.
#[derive(Clone)]
pub struct MeasurementOptions {
    /// Domains whose pages are measured
    pub domains: Vec<String>,
    /// Transport used outside development mode
    pub transport: Arc<dyn TelemetryTransport>,
    /// Send records to the diagnostic sink instead of the transport
    pub development_mode: bool,
}

impl MeasurementOptions {
    /// Options for normal operation.
    #[must_use]
    pub fn new(domains: Vec<String>, transport: Arc<dyn TelemetryTransport>) -> Self {
        Self {
            domains,
            transport,
            development_mode: false,
        }
    }

    /// Options from the `[measurement]` config section.
    #[must_use]
    pub fn from_config(config: &MeasurementConfig, transport: Arc<dyn TelemetryTransport>) -> Self {
        Self {
            domains: config.domains.clone(),
            transport,
            development_mode: config.development_mode,
        }
    }

    /// Switch development mode on or off.
    #[must_use]
    pub fn with_development_mode(mut self, enabled: bool) -> Self {
        self.development_mode = enabled;
        self
    }

    fn summary(&self) -> ActivationSummary {
        ActivationSummary {
            domains: self.domains.clone(),
            development_mode: self.development_mode,
        }
    }
}

/// Result of a start request.
#[derive(Debug)]
pub enum ActivationOutcome {
    /// This call activated the measurement
    Started(MeasurementHandle),
    /// An earlier call already did; nothing was changed
    AlreadyActive,
}

impl ActivationOutcome {
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    /// The handle, if this call activated the measurement.
    #[must_use]
    pub fn into_handle(self) -> Option<MeasurementHandle> {
        match self {
            Self::Started(handle) => Some(handle),
            Self::AlreadyActive => None,
        }
    }
}

/// Advertisement measurement wired to its collaborators.
pub struct AdvertisementMeasurement {
    services: MeasurementServices,
    settings: PipelineSettings,
}

impl AdvertisementMeasurement {
    #[must_use]
    pub fn new(services: MeasurementServices, settings: PipelineSettings) -> Self {
        Self { services, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Start the measurement unless `gate` has already been claimed.
    ///
    /// Only the first call performs setup. Later calls, including calls
    /// with different options and calls after a failed setup, return
    /// [`ActivationOutcome::AlreadyActive`] without side effects.
    ///
    /// # Errors
    /// Returns error if page manager initialization, pattern compilation,
    /// agent registration or the report subscription fails. The gate is
    /// then left `Incomplete`.
    pub async fn start(
        &self,
        gate: &ActivationGate,
        options: MeasurementOptions,
    ) -> Result<ActivationOutcome> {
        let summary = options.summary();

        if !gate.try_activate(summary.clone()) {
            match gate.first_activation() {
                Some(first) if *first != summary => warn!(
                    requested_domains = ?summary.domains,
                    requested_development_mode = summary.development_mode,
                    active_domains = ?first.domains,
                    active_development_mode = first.development_mode,
                    "advertisement measurement already active with different options, ignoring"
                ),
                _ => debug!("advertisement measurement already active"),
            }
            return Ok(ActivationOutcome::AlreadyActive);
        }

        match self.activate(options).await {
            Ok(handle) => Ok(ActivationOutcome::Started(handle)),
            Err(e) => {
                gate.mark_incomplete();
                error!(error = %e, "advertisement measurement activation failed");
                Err(e)
            }
        }
    }

    async fn activate(&self, options: MeasurementOptions) -> Result<MeasurementHandle> {
        self.services
            .page_manager
            .initialize()
            .await
            .map_err(MeasurementError::PageManager)?;

        let patterns =
            domains_to_match_patterns(&options.domains, self.settings.match_subdomains)?;

        let registration = inject_agent(self.services.content_scripts.as_ref(), &patterns)
            .await
            .map_err(MeasurementError::Registration)?;

        let message_type = self.settings.message_type();
        let receiver = self
            .services
            .messages
            .subscribe(Subscription::new(message_type.clone()))
            .map_err(MeasurementError::Subscription)?;

        let emitter = Emitter::select(
            options.development_mode,
            &self.settings.namespace,
            Arc::clone(&self.services.diagnostics),
            options.transport,
        );
        let development_mode = emitter.is_development();

        let stats = Arc::new(PipelineStats::default());
        let outcomes = Arc::new(OutcomeLog::new(self.settings.outcome_log_capacity));
        let cancel = CancellationToken::new();

        let listener = ReportListener::new(
            receiver,
            ReportHandler::new(Arc::clone(&self.services.survey), emitter, message_type.clone()),
            message_type,
            ListenerLimits {
                handler_timeout: self.settings.handler_timeout,
                max_concurrent: self.settings.max_concurrent_reports,
            },
            Arc::clone(&stats),
            Arc::clone(&outcomes),
            cancel.clone(),
        );
        let task = tokio::spawn(listener.run());

        info!(
            registration = %registration,
            pattern_count = patterns.len(),
            development_mode,
            "advertisement measurement started"
        );

        Ok(MeasurementHandle {
            registration,
            patterns,
            development_mode,
            stats,
            outcomes,
            cancel,
            task,
        })
    }
}

/// Handle on a running measurement.
///
/// Dropping the handle leaves the listener running until the message
/// channel closes.
#[derive(Debug)]
pub struct MeasurementHandle {
    registration: ScriptRegistrationId,
    patterns: MatchPatternSet,
    development_mode: bool,
    stats: Arc<PipelineStats>,
    outcomes: Arc<OutcomeLog>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MeasurementHandle {
    /// Id of the scanning agent registration.
    #[must_use]
    pub fn registration(&self) -> ScriptRegistrationId {
        self.registration
    }

    /// Match patterns the agent was registered for.
    #[must_use]
    pub fn patterns(&self) -> &MatchPatternSet {
        &self.patterns
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.development_mode
    }

    /// Current pipeline counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Retained handling outcomes, oldest first.
    #[must_use]
    pub fn outcomes(&self) -> Vec<OutcomeEntry> {
        self.outcomes.entries()
    }

    /// Whether the listener has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop listening, wait for in-flight reports and return the final
    /// counters. The agent registration stays in place.
    ///
    /// # Errors
    /// Returns `MeasurementError::Listener` if the listener task panicked.
    pub async fn shutdown(self) -> Result<StatsSnapshot> {
        self.cancel.cancel();
        self.task.await?;

        let snapshot = self.stats.snapshot();
        info!(
            received = snapshot.received,
            emitted = snapshot.emitted,
            dropped = snapshot.dropped,
            failed = snapshot.failed,
            timed_out = snapshot.timed_out,
            "advertisement measurement stopped"
        );
        Ok(snapshot)
    }
}
