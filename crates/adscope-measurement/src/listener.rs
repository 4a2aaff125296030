//! Report listener.
//!
//! Takes messages off the subscription, validates them and hands every
//! valid report to its own handler future. Handlers overlap, up to
//! `max_concurrent` at a time, and each is bounded by a timeout. The
//! listener stops when the channel closes or it is cancelled; in both
//! cases handlers already accepted run to completion or timeout.

use crate::emitter::{EmissionTarget, Emitter};
use crate::error::{MeasurementError, Result};
use crate::identity::resolve_user_id;
use crate::messaging::InboundMessage;
use crate::outcome::{HandlingOutcome, OutcomeLog, PipelineStats};
use crate::record::TelemetryRecord;
use crate::report::{validate_report, AdvertisementReport};
use crate::services::SurveyIdentity;
use adscope_core::PageId;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Turns one validated report into one emitted record.
pub struct ReportHandler {
    identity: Arc<dyn SurveyIdentity>,
    emitter: Emitter,
    record_type: String,
}

impl ReportHandler {
    #[must_use]
    pub fn new(
        identity: Arc<dyn SurveyIdentity>,
        emitter: Emitter,
        record_type: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            emitter,
            record_type: record_type.into(),
        }
    }

    /// Resolve the participant, build the record and emit it.
    ///
    /// # Errors
    /// Returns `MeasurementError::Identity` if the identity lookup fails, or
    /// the emitter's error. Nothing is emitted in either case.
    pub async fn handle(&self, report: AdvertisementReport) -> Result<EmissionTarget> {
        let user_id = resolve_user_id(self.identity.as_ref())
            .await
            .map_err(MeasurementError::Identity)?;
        let record = TelemetryRecord::from_report(self.record_type.clone(), user_id, report);
        self.emitter.emit(&record).await
    }
}

async fn handle_report(
    handler: Arc<ReportHandler>,
    report: AdvertisementReport,
    timeout: Duration,
) -> (PageId, HandlingOutcome) {
    let visit_id = report.page_id.clone();
    let outcome = match tokio::time::timeout(timeout, handler.handle(report)).await {
        Ok(Ok(target)) => HandlingOutcome::Emitted { target },
        Ok(Err(e)) => HandlingOutcome::Failed {
            reason: e.to_string(),
        },
        Err(_) => HandlingOutcome::TimedOut,
    };
    (visit_id, outcome)
}

/// Listener limits.
#[derive(Debug, Clone, Copy)]
pub struct ListenerLimits {
    /// Upper bound on one handler's run time
    pub handler_timeout: Duration,
    /// Handlers allowed in flight at once
    pub max_concurrent: usize,
}

/// Consumes the report subscription until closed or cancelled.
pub struct ReportListener {
    receiver: mpsc::Receiver<InboundMessage>,
    handler: Arc<ReportHandler>,
    message_type: String,
    limits: ListenerLimits,
    stats: Arc<PipelineStats>,
    outcomes: Arc<OutcomeLog>,
    cancel: CancellationToken,
}

enum Event {
    Cancelled,
    Settled(PageId, HandlingOutcome),
    Received(InboundMessage),
    Closed,
}

impl ReportListener {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        receiver: mpsc::Receiver<InboundMessage>,
        handler: ReportHandler,
        message_type: impl Into<String>,
        limits: ListenerLimits,
        stats: Arc<PipelineStats>,
        outcomes: Arc<OutcomeLog>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            handler: Arc::new(handler),
            message_type: message_type.into(),
            limits,
            stats,
            outcomes,
            cancel,
        }
    }

    /// Run until the channel closes or the token is cancelled, then drain.
    pub async fn run(self) {
        let Self {
            mut receiver,
            handler,
            message_type,
            limits,
            stats,
            outcomes,
            cancel,
        } = self;

        let max_concurrent = limits.max_concurrent.max(1);
        let mut in_flight = FuturesUnordered::new();
        let mut closing = false;

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled(), if !closing => Event::Cancelled,
                Some((visit_id, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    Event::Settled(visit_id, outcome)
                }
                message = receiver.recv(), if in_flight.len() < max_concurrent => {
                    message.map_or(Event::Closed, Event::Received)
                }
            };

            match event {
                Event::Cancelled => {
                    debug!("report listener cancelled, closing subscription");
                    receiver.close();
                    closing = true;
                }
                Event::Settled(visit_id, outcome) => {
                    settle(&stats, &outcomes, Some(visit_id), outcome);
                }
                Event::Received(message) => {
                    stats.record_received();
                    match validate_report(&message, &message_type) {
                        Ok(report) => {
                            in_flight.push(handle_report(
                                Arc::clone(&handler),
                                report,
                                limits.handler_timeout,
                            ));
                        }
                        Err(violation) => {
                            debug!(
                                url = message.sender.url.as_deref().unwrap_or_default(),
                                %violation,
                                "dropping report that failed schema validation"
                            );
                            settle(
                                &stats,
                                &outcomes,
                                None,
                                HandlingOutcome::Dropped { violation },
                            );
                        }
                    }
                }
                Event::Closed => break,
            }
        }

        while let Some((visit_id, outcome)) = in_flight.next().await {
            settle(&stats, &outcomes, Some(visit_id), outcome);
        }

        debug!(stats = ?stats.snapshot(), "report listener stopped");
    }
}

fn settle(
    stats: &PipelineStats,
    outcomes: &OutcomeLog,
    visit_id: Option<PageId>,
    outcome: HandlingOutcome,
) {
    let visit = visit_id.as_ref().map(PageId::as_str).unwrap_or_default();
    match &outcome {
        HandlingOutcome::Emitted { target } => {
            debug!(visit_id = visit, ?target, outcome = outcome.label(), "report emitted");
        }
        HandlingOutcome::Failed { reason } => {
            warn!(
                visit_id = visit,
                reason = %reason,
                outcome = outcome.label(),
                "report handling failed"
            );
        }
        HandlingOutcome::TimedOut => {
            warn!(visit_id = visit, outcome = outcome.label(), "report handling timed out");
        }
        HandlingOutcome::Dropped { .. } => {}
    }

    stats.record_outcome(&outcome);
    outcomes.record(visit_id, outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::TracingDiagnosticSink;
    use crate::services::TelemetryTransport;
    use async_trait::async_trait;
    use serde_json::json;

    struct Known;

    #[async_trait]
    impl SurveyIdentity for Known {
        async fn survey_id(&self) -> adscope_core::Result<Option<String>> {
            Ok(Some("u1".to_string()))
        }
    }

    struct NoTransport;

    #[async_trait]
    impl TelemetryTransport for NoTransport {
        async fn send_ping(
            &self,
            _ping_name: &str,
            _payload: &TelemetryRecord,
        ) -> adscope_core::Result<()> {
            Err(adscope_core::AdscopeError::Emission("not expected".to_string()))
        }
    }

    const TYPE: &str = "WebScience.advertisements";

    fn listener(
        receiver: mpsc::Receiver<InboundMessage>,
        cancel: CancellationToken,
    ) -> (ReportListener, Arc<PipelineStats>, Arc<OutcomeLog>) {
        let stats = Arc::new(PipelineStats::default());
        let outcomes = Arc::new(OutcomeLog::new(16));
        let emitter = Emitter::select(
            true,
            "WebScience",
            Arc::new(TracingDiagnosticSink),
            Arc::new(NoTransport),
        );
        let listener = ReportListener::new(
            receiver,
            ReportHandler::new(Arc::new(Known), emitter, TYPE),
            TYPE,
            ListenerLimits {
                handler_timeout: Duration::from_secs(5),
                max_concurrent: 2,
            },
            Arc::clone(&stats),
            Arc::clone(&outcomes),
            cancel,
        );
        (listener, stats, outcomes)
    }

    #[tokio::test]
    async fn test_stops_when_channel_closes() {
        let (tx, rx) = mpsc::channel(8);
        let (listener, stats, outcomes) = listener(rx, CancellationToken::new());

        for page in ["p1", "p2", "p3"] {
            tx.send(InboundMessage::from_page(
                json!({"type": TYPE, "pageId": page, "ads": {}, "body": {}}),
                "https://example.com/",
            ))
            .await
            .expect("send message");
        }
        tx.send(InboundMessage::from_page(json!({"type": TYPE}), "https://example.com/"))
            .await
            .expect("send message");
        drop(tx);

        listener.run().await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 4);
        assert_eq!(snapshot.emitted, 3);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(outcomes.len(), 4);
    }

    #[tokio::test]
    async fn test_cancel_drains_buffered_messages() {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let (listener, stats, _outcomes) = listener(rx, cancel.clone());

        tx.send(InboundMessage::from_page(
            json!({"type": TYPE, "pageId": "p1", "ads": {}, "body": {}}),
            "https://example.com/",
        ))
        .await
        .expect("send message");
        cancel.cancel();

        listener.run().await;

        assert_eq!(stats.snapshot().emitted, 1);
        assert!(tx.is_closed());
    }
}
