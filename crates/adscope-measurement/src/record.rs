//! Outgoing telemetry record.

use crate::report::AdvertisementReport;
use adscope_core::{PageId, SurveyUserId};
use adscope_matching::NormalizedUrl;
use serde::Serialize;
use serde_json::Value;

/// The record emitted for one advertisement report.
///
/// Serializes to exactly `type`, `userId`, `visitId`, `url`, `body` and
/// `ads`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Record type tag, e.g. `WebScience.advertisements`
    #[serde(rename = "type")]
    pub record_type: String,
    /// Participant id, `"undefined"` when not assigned
    pub user_id: String,
    /// Page-visit id copied from the report
    pub visit_id: PageId,
    /// Normalized page URL
    pub url: NormalizedUrl,
    /// Page metadata, passed through unchanged
    pub body: Value,
    /// Advertisement collection, passed through unchanged
    pub ads: Value,
}

impl TelemetryRecord {
    /// Build the record for a validated report.
    #[must_use]
    pub fn from_report(
        record_type: impl Into<String>,
        user_id: SurveyUserId,
        report: AdvertisementReport,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            user_id: user_id.into_inner(),
            visit_id: report.page_id,
            url: report.url,
            body: report.body,
            ads: report.ads,
        }
    }
}
