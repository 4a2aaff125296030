//! Shared types used across the adscope crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace prefix used for record type tags and diagnostic keys.
pub const DEFAULT_NAMESPACE: &str = "WebScience";

/// Identifier of a single page visit.
///
/// Assigned by the page identity service and carried verbatim by the
/// scanning agent's reports. The value is opaque: any string is accepted,
/// including the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Create a new `PageId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<PageId> for String {
    fn from(id: PageId) -> Self {
        id.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Participant identifier resolved from the survey identity service.
///
/// The service may not know the participant yet; an absent identity is
/// rendered as the text `"undefined"` so that every record carries a
/// textual `userId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurveyUserId(String);

impl SurveyUserId {
    /// Text used for an identity that has not been assigned.
    pub const UNDEFINED: &'static str = "undefined";

    /// Coerce a possibly-missing identity to its textual form.
    #[must_use]
    pub fn coerce(id: Option<String>) -> Self {
        Self(id.unwrap_or_else(|| Self::UNDEFINED.to_string()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SurveyUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_display() {
        let page_id = PageId::new("visit-42");
        assert_eq!(page_id.as_str(), "visit-42");
        assert_eq!(page_id.to_string(), "visit-42");
    }

    #[test]
    fn test_page_id_is_opaque() {
        assert_eq!(PageId::new("").as_str(), "");
        assert_eq!(PageId::new("visit\n42").as_str(), "visit\n42");
    }

    #[test]
    fn test_page_id_serde() {
        let page_id: PageId = serde_json::from_str("\"p1\"").expect("deserialize page ID");
        assert_eq!(page_id.as_str(), "p1");
        let empty: PageId = serde_json::from_str("\"\"").expect("deserialize empty page ID");
        assert_eq!(empty.as_str(), "");

        let json = serde_json::to_string(&page_id).expect("serialize page ID");
        assert_eq!(json, "\"p1\"");
    }

    #[test]
    fn test_survey_user_id_coercion() {
        assert_eq!(SurveyUserId::coerce(Some("u9".to_string())).as_str(), "u9");
        assert_eq!(SurveyUserId::coerce(None).as_str(), "undefined");
    }

    #[test]
    fn test_timestamp_ordering() {
        let ts1 = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let ts2 = Timestamp::now();
        assert!(ts2 > ts1);
    }
}
