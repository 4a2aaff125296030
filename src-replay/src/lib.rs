//! Adscope replay shell.
//!
//! Feeds recorded agent reports from a JSON Lines file through the
//! measurement pipeline, using the in-process message router and script
//! registry in place of a browser.

use adscope_core::AppConfig;
use adscope_measurement::{
    ActivationGate, AdvertisementMeasurement, DispatchOutcome, FixedSurveyIdentity,
    HttpPingTransport, InboundMessage, MeasurementOptions, MeasurementServices, MessageRouter,
    PipelineSettings, ScriptRegistry, StaticPageManager, StatsSnapshot, TracingDiagnosticSink,
};
use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "adscope-replay")]
#[command(about = "Replay recorded advertisement reports through the measurement pipeline")]
#[command(version)]
pub struct Cli {
    /// JSON Lines file of recorded report envelopes
    #[arg(value_name = "FILE")]
    pub reports: PathBuf,

    /// TOML config file (default: the per-user config file)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Load the configuration this invocation asks for, with environment
    /// overrides applied.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or the result is invalid.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        let Some(path) = &self.config else {
            return AppConfig::load_with_env().context("failed to load configuration");
        };
        let mut config = AppConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Initialize tracing with env filter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,adscope=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Parse one line of a report file.
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// Returns error if the line is not a `{"sender": ..., "message": ...}` object.
pub fn parse_line(line: &str) -> anyhow::Result<Option<InboundMessage>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let message = serde_json::from_str(line).context("invalid report envelope")?;
    Ok(Some(message))
}

/// Counts from one replay run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReplaySummary {
    /// Envelopes read from the file
    pub messages: usize,
    /// Envelopes handed to the measurement
    pub delivered: usize,
    /// Envelopes no subscriber wanted
    pub unroutable: usize,
    /// Final pipeline counters
    pub stats: StatsSnapshot,
}

/// Replay every report in `path` through a measurement started on `gate`.
///
/// # Errors
/// Returns error if the file cannot be read or parsed, or the measurement
/// cannot be started.
pub async fn replay_file(
    path: &Path,
    config: &AppConfig,
    gate: &ActivationGate,
) -> anyhow::Result<ReplaySummary> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut messages = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if let Some(message) =
            parse_line(line).with_context(|| format!("{}:{}", path.display(), index + 1))?
        {
            messages.push(message);
        }
    }

    let router = MessageRouter::new();
    let services = MeasurementServices {
        page_manager: Arc::new(StaticPageManager),
        content_scripts: Arc::new(ScriptRegistry::new()),
        messages: Arc::new(router.clone()),
        survey: Arc::new(FixedSurveyIdentity::new(config.survey.survey_id.clone())),
        diagnostics: Arc::new(TracingDiagnosticSink),
    };
    let transport = HttpPingTransport::new(&config.telemetry)?;

    let measurement = AdvertisementMeasurement::new(
        services,
        PipelineSettings::from_config(&config.measurement),
    );
    let options = MeasurementOptions::from_config(&config.measurement, Arc::new(transport));
    let Some(handle) = measurement.start(gate, options).await?.into_handle() else {
        bail!("advertisement measurement was already active");
    };

    let mut summary = ReplaySummary {
        messages: messages.len(),
        ..ReplaySummary::default()
    };
    for message in messages {
        match router.dispatch(message).await {
            DispatchOutcome::Delivered => summary.delivered += 1,
            DispatchOutcome::Unroutable => summary.unroutable += 1,
            DispatchOutcome::Closed => {
                warn!("measurement stopped listening, ending replay early");
                break;
            }
        }
    }

    summary.stats = handle.shutdown().await?;
    Ok(summary)
}

/// Command-line entry point: `adscope-replay [--config FILE] <FILE>`.
///
/// # Errors
/// Returns error on invalid configuration or a failed replay.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting adscope-replay v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.load_config()?;
    let summary = replay_file(&cli.reports, &config, ActivationGate::global()).await?;

    info!(
        messages = summary.messages,
        delivered = summary.delivered,
        unroutable = summary.unroutable,
        stats = %serde_json::to_string(&summary.stats)?,
        "replay finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const TYPE: &str = "WebScience.advertisements";

    fn envelope(url: &str, message: serde_json::Value) -> String {
        json!({"sender": {"url": url}, "message": message}).to_string()
    }

    #[test]
    fn test_parse_line() {
        let line = envelope("https://example.com/a", json!({"type": TYPE, "pageId": "p1"}));
        let message = parse_line(&line)
            .expect("valid line")
            .expect("line has a message");

        assert_eq!(message.sender.url.as_deref(), Some("https://example.com/a"));
        assert_eq!(message.message_type(), Some("WebScience.advertisements"));
    }

    #[test]
    fn test_parse_line_skips_blank_and_comments() {
        assert!(parse_line("   ").expect("blank line").is_none());
        assert!(parse_line("# recorded 2024-05-01").expect("comment").is_none());
        assert!(parse_line("{not json").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from(["adscope-replay", "reports.jsonl"]).expect("valid args");
        assert_eq!(cli.reports, PathBuf::from("reports.jsonl"));
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["adscope-replay", "--config", "ads.toml", "r.jsonl"])
            .expect("valid args");
        assert_eq!(cli.config, Some(PathBuf::from("ads.toml")));

        assert!(Cli::try_parse_from(["adscope-replay"]).is_err());
    }

    #[test]
    fn test_explicit_config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[measurement]\ndomains = [\"example.org\"]").expect("write config");

        let cli = Cli {
            reports: PathBuf::from("reports.jsonl"),
            config: Some(file.path().to_path_buf()),
        };
        let config = cli.load_config().expect("load config");
        assert_eq!(config.measurement.domains, vec!["example.org".to_string()]);
    }

    #[tokio::test]
    async fn test_replay_in_development_mode() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        let valid = json!({"type": TYPE, "pageId": "p1", "ads": {}, "body": {}});
        let scalar_ads = json!({"type": TYPE, "pageId": "p2", "ads": 5, "body": {}});
        writeln!(file, "{}", envelope("https://example.com/a", valid)).expect("write line");
        writeln!(file, "{}", envelope("https://example.com/b", scalar_ads)).expect("write line");
        writeln!(file, r#"{{"sender":{{}},"message":{{"type":"Other"}}}}"#).expect("write line");

        let mut config = AppConfig::default();
        config.measurement.development_mode = true;
        config.measurement.domains = vec!["example.com".to_string()];

        let summary = replay_file(file.path(), &config, &ActivationGate::new())
            .await
            .expect("replay succeeds");

        assert_eq!(summary.messages, 3);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.unroutable, 1);
        assert_eq!(summary.stats.emitted, 1);
        assert_eq!(summary.stats.dropped, 1);
    }
}
