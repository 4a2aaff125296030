//! Record emission.
//!
//! In development mode every record goes to a local diagnostic sink under a
//! per-visit key; otherwise it is submitted as an `advertisement` ping. The
//! choice is made once per activation and never changes afterwards.

use crate::error::{MeasurementError, Result};
use crate::record::TelemetryRecord;
use crate::services::{DiagnosticSink, TelemetryTransport};
use adscope_core::{AdscopeError, PageId};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Ping name records are submitted under.
pub const PING_NAME: &str = "advertisement";

/// Diagnostic key for a visit: `<namespace>.Advertisements.<visitId>`.
#[must_use]
pub fn diagnostic_key(namespace: &str, visit_id: &PageId) -> String {
    format!("{namespace}.Advertisements.{visit_id}")
}

/// Where a record ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "sink", rename_all = "snake_case")]
pub enum EmissionTarget {
    /// Written to the diagnostic sink under this key
    Diagnostic {
        /// Diagnostic key
        key: String,
    },
    /// Submitted to the telemetry transport under this ping name
    Remote {
        /// Ping name
        ping: String,
    },
}

/// Emission sink fixed for the lifetime of an activation.
#[derive(Clone)]
pub enum Emitter {
    /// Development mode
    Diagnostic {
        /// Sink receiving the records
        sink: Arc<dyn DiagnosticSink>,
        /// Key prefix
        namespace: String,
    },
    /// Normal operation
    Remote {
        /// Ping transport
        transport: Arc<dyn TelemetryTransport>,
    },
}

impl Emitter {
    /// Pick the sink for an activation.
    #[must_use]
    pub fn select(
        development_mode: bool,
        namespace: &str,
        diagnostics: Arc<dyn DiagnosticSink>,
        transport: Arc<dyn TelemetryTransport>,
    ) -> Self {
        if development_mode {
            Self::Diagnostic {
                sink: diagnostics,
                namespace: namespace.to_string(),
            }
        } else {
            Self::Remote { transport }
        }
    }

    /// Whether records go to the diagnostic sink.
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Diagnostic { .. })
    }

    /// Send one record to the selected sink. No retry.
    ///
    /// # Errors
    /// Returns `MeasurementError::Diagnostic` or `MeasurementError::Transport`
    /// if the sink fails.
    pub async fn emit(&self, record: &TelemetryRecord) -> Result<EmissionTarget> {
        match self {
            Self::Diagnostic { sink, namespace } => {
                let key = diagnostic_key(namespace, &record.visit_id);
                sink.write(&key, record)
                    .map_err(|source| MeasurementError::Diagnostic {
                        key: key.clone(),
                        source,
                    })?;
                Ok(EmissionTarget::Diagnostic { key })
            }
            Self::Remote { transport } => {
                transport
                    .send_ping(PING_NAME, record)
                    .await
                    .map_err(|source| MeasurementError::Transport {
                        ping: PING_NAME.to_string(),
                        source,
                    })?;
                Ok(EmissionTarget::Remote {
                    ping: PING_NAME.to_string(),
                })
            }
        }
    }
}

/// Diagnostic sink that writes `{key: record}` to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn write(&self, key: &str, record: &TelemetryRecord) -> adscope_core::Result<()> {
        let mut entry = serde_json::Map::new();
        let value = serde_json::to_value(record)
            .map_err(|e| AdscopeError::Emission(format!("failed to serialize record: {e}")))?;
        entry.insert(key.to_string(), value);

        info!(
            target: "adscope::diagnostics",
            key,
            "{}",
            serde_json::Value::Object(entry)
        );
        Ok(())
    }
}
