//! Error types for the measurement pipeline.

use adscope_core::AdscopeError;
use adscope_matching::MatchPatternError;
use thiserror::Error;

/// Errors raised while activating the measurement or handling a report.
#[derive(Error, Debug)]
pub enum MeasurementError {
    /// The page identity service could not be initialized
    #[error("page manager initialization failed: {0}")]
    PageManager(#[source] AdscopeError),

    /// The domain allow-list could not be compiled into match patterns
    #[error("match pattern compilation failed: {0}")]
    Pattern(#[from] MatchPatternError),

    /// The content script host rejected the agent registration
    #[error("content script registration failed: {0}")]
    Registration(#[source] AdscopeError),

    /// The message channel refused the subscription
    #[error("message subscription failed: {0}")]
    Subscription(#[source] AdscopeError),

    /// The survey identity lookup failed
    #[error("survey identity lookup failed: {0}")]
    Identity(#[source] AdscopeError),

    /// Writing to the diagnostic sink failed
    #[error("diagnostic write failed for {key}: {source}")]
    Diagnostic {
        /// Diagnostic key of the record
        key: String,
        /// Underlying sink error
        #[source]
        source: AdscopeError,
    },

    /// Submitting the ping to the telemetry transport failed
    #[error("ping submission failed for {ping}: {source}")]
    Transport {
        /// Ping name
        ping: String,
        /// Underlying transport error
        #[source]
        source: AdscopeError,
    },

    /// The listener task panicked or was aborted
    #[error("report listener task failed: {0}")]
    Listener(#[from] tokio::task::JoinError),
}

/// Result type alias for measurement operations.
pub type Result<T> = std::result::Result<T, MeasurementError>;

impl From<MeasurementError> for AdscopeError {
    fn from(err: MeasurementError) -> Self {
        match err {
            MeasurementError::Pattern(e) => AdscopeError::Pattern(e.to_string()),
            MeasurementError::Registration(e) => AdscopeError::Registration(e.to_string()),
            MeasurementError::Subscription(e) => AdscopeError::Messaging(e.to_string()),
            MeasurementError::Identity(e) => AdscopeError::Identity(e.to_string()),
            e @ (MeasurementError::Diagnostic { .. } | MeasurementError::Transport { .. }) => {
                AdscopeError::Emission(e.to_string())
            }
            e @ (MeasurementError::PageManager(_) | MeasurementError::Listener(_)) => {
                AdscopeError::Internal(e.to_string())
            }
        }
    }
}
