//! Report schema validation.
//!
//! A report must carry a `pageId` string plus object-like `body` and `ads`
//! fields, and come from a page with a usable URL. Anything else is
//! rejected here and never reaches the handler.

use crate::messaging::InboundMessage;
use adscope_core::PageId;
use adscope_matching::{normalize_url, NormalizedUrl};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A report that passed schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertisementReport {
    /// Page-visit id assigned by the page identity service
    pub page_id: PageId,
    /// Normalized URL of the sending page
    pub url: NormalizedUrl,
    /// Page metadata collected by the agent
    pub body: Value,
    /// Advertisements detected on the page
    pub ads: Value,
}

/// Expected JSON kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// JSON string
    String,
    /// JSON object or array
    Object,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Object => value.is_object() || value.is_array(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// Reason a message was rejected by the schema gate.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum SchemaViolation {
    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message type {found:?} does not match {expected:?}")]
    WrongType { expected: String, found: String },

    #[error("missing required field {field}")]
    MissingField { field: &'static str },

    #[error("field {field} must be a {expected}, found {found}")]
    WrongFieldType {
        field: &'static str,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("sender has no page URL")]
    MissingSenderUrl,

    #[error("sender URL is not an absolute URL")]
    InvalidSenderUrl,
}

struct FieldRule {
    name: &'static str,
    kind: FieldKind,
    required: bool,
}

const REPORT_SCHEMA: &[FieldRule] = &[
    FieldRule {
        name: "type",
        kind: FieldKind::String,
        required: true,
    },
    FieldRule {
        name: "pageId",
        kind: FieldKind::String,
        required: true,
    },
    FieldRule {
        name: "url",
        kind: FieldKind::String,
        required: false,
    },
    FieldRule {
        name: "body",
        kind: FieldKind::Object,
        required: true,
    },
    FieldRule {
        name: "ads",
        kind: FieldKind::Object,
        required: true,
    },
];

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_fields(payload: &Map<String, Value>) -> Result<(), SchemaViolation> {
    for rule in REPORT_SCHEMA {
        match payload.get(rule.name) {
            None if rule.required => {
                return Err(SchemaViolation::MissingField { field: rule.name });
            }
            None => {}
            Some(value) if !rule.kind.accepts(value) => {
                return Err(SchemaViolation::WrongFieldType {
                    field: rule.name,
                    expected: rule.kind,
                    found: json_kind(value),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Validate an inbound message against the advertisement report schema.
///
/// Extra payload fields are ignored. The page URL is taken from the sender
/// envelope, never from the payload.
///
/// # Errors
/// Returns the first [`SchemaViolation`] found.
pub fn validate_report(
    message: &InboundMessage,
    expected_type: &str,
) -> Result<AdvertisementReport, SchemaViolation> {
    let payload = message
        .message
        .as_object()
        .ok_or(SchemaViolation::NotAnObject)?;

    check_fields(payload)?;

    let found_type = payload.get("type").and_then(Value::as_str).unwrap_or_default();
    if found_type != expected_type {
        return Err(SchemaViolation::WrongType {
            expected: expected_type.to_string(),
            found: found_type.to_string(),
        });
    }

    let page_id = PageId::new(
        payload
            .get("pageId")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    );

    let sender_url = message
        .sender
        .url
        .as_deref()
        .ok_or(SchemaViolation::MissingSenderUrl)?;
    let url = normalize_url(sender_url).map_err(|_| SchemaViolation::InvalidSenderUrl)?;

    Ok(AdvertisementReport {
        page_id,
        url,
        body: payload.get("body").cloned().unwrap_or_default(),
        ads: payload.get("ads").cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TYPE: &str = "WebScience.advertisements";

    fn message(payload: Value) -> InboundMessage {
        InboundMessage::from_page(payload, "https://example.com/a?x=1#frag")
    }

    #[test]
    fn test_minimal_report_is_accepted() {
        let report = validate_report(
            &message(json!({"type": TYPE, "pageId": "p1", "ads": {}, "body": {}})),
            TYPE,
        )
        .expect("valid report");

        assert_eq!(report.page_id.as_str(), "p1");
        assert_eq!(report.url.as_str(), "https://example.com/a");
        assert_eq!(report.ads, json!({}));
    }

    #[test]
    fn test_arrays_count_as_objects() {
        let report = validate_report(
            &message(json!({"type": TYPE, "pageId": "p1", "ads": [{"w": 300}], "body": {}})),
            TYPE,
        )
        .expect("array ads accepted");
        assert!(report.ads.is_array());
    }

    #[test]
    fn test_scalar_ads_are_rejected() {
        let err = validate_report(
            &message(json!({"type": TYPE, "pageId": "p1", "ads": 5, "body": {}})),
            TYPE,
        )
        .expect_err("scalar ads rejected");

        assert_eq!(
            err,
            SchemaViolation::WrongFieldType {
                field: "ads",
                expected: FieldKind::Object,
                found: "number",
            }
        );
    }

    #[test]
    fn test_null_body_is_rejected() {
        let err = validate_report(
            &message(json!({"type": TYPE, "pageId": "p1", "ads": {}, "body": null})),
            TYPE,
        )
        .expect_err("null body rejected");
        assert!(matches!(err, SchemaViolation::WrongFieldType { field: "body", .. }));
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        assert_eq!(
            validate_report(&message(json!({"type": TYPE, "ads": {}, "body": {}})), TYPE),
            Err(SchemaViolation::MissingField { field: "pageId" })
        );
        assert!(matches!(
            validate_report(
                &message(json!({"type": TYPE, "pageId": 7, "ads": {}, "body": {}})),
                TYPE
            ),
            Err(SchemaViolation::WrongFieldType { field: "pageId", .. })
        ));
        assert!(matches!(
            validate_report(
                &message(json!({"type": TYPE, "pageId": "p1", "url": 3, "ads": {}, "body": {}})),
                TYPE
            ),
            Err(SchemaViolation::WrongFieldType { field: "url", .. })
        ));
        assert_eq!(
            validate_report(&message(json!("hello")), TYPE),
            Err(SchemaViolation::NotAnObject)
        );
    }

    #[test]
    fn test_any_string_page_id_is_accepted() {
        for page_id in ["", "visit\n42", "  "] {
            let report = validate_report(
                &message(json!({"type": TYPE, "pageId": page_id, "ads": {}, "body": {}})),
                TYPE,
            )
            .expect("string page id accepted");
            assert_eq!(report.page_id.as_str(), page_id);
        }
    }

    #[test]
    fn test_wrong_type_tag() {
        let err = validate_report(
            &message(json!({"type": "Other", "pageId": "p1", "ads": {}, "body": {}})),
            TYPE,
        )
        .expect_err("wrong type rejected");
        assert!(matches!(err, SchemaViolation::WrongType { .. }));
    }

    #[test]
    fn test_sender_url_is_required() {
        let payload = json!({"type": TYPE, "pageId": "p1", "ads": {}, "body": {}});

        let no_url = InboundMessage {
            message: payload.clone(),
            sender: crate::messaging::MessageSender::default(),
        };
        assert_eq!(
            validate_report(&no_url, TYPE),
            Err(SchemaViolation::MissingSenderUrl)
        );

        let relative = InboundMessage::from_page(payload, "/relative");
        assert_eq!(
            validate_report(&relative, TYPE),
            Err(SchemaViolation::InvalidSenderUrl)
        );
    }

    #[test]
    fn test_payload_url_is_ignored() {
        let report = validate_report(
            &message(json!({
                "type": TYPE,
                "pageId": "p1",
                "url": "https://spoofed.example/",
                "ads": {},
                "body": {}
            })),
            TYPE,
        )
        .expect("valid report");
        assert_eq!(report.url.as_str(), "https://example.com/a");
    }
}
