//! Scanning agent injection.
//!
//! Registers the external page-scanning agent with the content script host,
//! scoped to the compiled match patterns and timed to run as soon as the
//! destination document starts loading. [`ScriptRegistry`] is an in-process
//! host that keeps registrations in memory and answers which scripts a page
//! would receive.

use crate::services::ContentScriptHost;
use adscope_core::{AdscopeError, Result};
use adscope_matching::MatchPatternSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// Extension-relative path of the page-scanning agent.
pub const AGENT_SCRIPT_PATH: &str = "/dist/content-scripts/page-ads.js";

/// Page-load phase at which a content script runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAt {
    /// As soon as the document starts loading, before any page script
    DocumentStart,
    /// After the DOM is parsed, before subresources finish
    DocumentEnd,
    /// After the page is idle
    DocumentIdle,
}

/// A script file inside the extension package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFile {
    /// Extension-relative path
    pub file: String,
}

/// A content script registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentScriptRegistration {
    /// Match patterns of the pages that receive the scripts
    pub matches: Vec<String>,
    /// Scripts to inject, in order
    pub js: Vec<ScriptFile>,
    /// Injection timing
    pub run_at: RunAt,
}

impl ContentScriptRegistration {
    /// Registration of the advertisement scanning agent for the given patterns.
    #[must_use]
    pub fn scanning_agent(patterns: &MatchPatternSet) -> Self {
        Self {
            matches: patterns.as_strings(),
            js: vec![ScriptFile {
                file: AGENT_SCRIPT_PATH.to_string(),
            }],
            run_at: RunAt::DocumentStart,
        }
    }
}

/// Identifier handed out by a content script host for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptRegistrationId(Uuid);

impl ScriptRegistrationId {
    /// Create a new random registration id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ScriptRegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Register the scanning agent for the pages covered by `patterns`.
///
/// An empty pattern set still registers the agent; it simply never runs.
///
/// # Errors
/// Returns the host's error if it rejects the registration.
pub async fn inject_agent(
    host: &dyn ContentScriptHost,
    patterns: &MatchPatternSet,
) -> Result<ScriptRegistrationId> {
    if patterns.is_empty() {
        debug!("registering scanning agent with an empty match set, it will not run");
    }

    let registration = ContentScriptRegistration::scanning_agent(patterns);
    let id = host.register(registration).await?;

    info!(
        registration = %id,
        pattern_count = patterns.len(),
        script = AGENT_SCRIPT_PATH,
        "registered advertisement scanning agent"
    );

    Ok(id)
}

struct RegisteredScript {
    registration: ContentScriptRegistration,
    patterns: MatchPatternSet,
}

/// In-memory content script host.
///
/// Validates match patterns the way a browser does at registration time
/// and keeps every accepted registration for the life of the registry.
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    scripts: Arc<RwLock<HashMap<ScriptRegistrationId, RegisteredScript>>>,
}

impl ScriptRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registrations held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts
            .read()
            .expect("acquire read lock on scripts")
            .len()
    }

    /// Whether the registry holds no registrations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a registration by id.
    #[must_use]
    pub fn get(&self, id: &ScriptRegistrationId) -> Option<ContentScriptRegistration> {
        self.scripts
            .read()
            .expect("acquire read lock on scripts")
            .get(id)
            .map(|script| script.registration.clone())
    }

    /// Scripts that would be injected into `url` at the given phase.
    #[must_use]
    pub fn scripts_for(&self, url: &str, run_at: RunAt) -> Vec<ScriptFile> {
        let Ok(url) = Url::parse(url) else {
            return Vec::new();
        };

        self.scripts
            .read()
            .expect("acquire read lock on scripts")
            .values()
            .filter(|script| script.registration.run_at == run_at && script.patterns.matches(&url))
            .flat_map(|script| script.registration.js.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl ContentScriptHost for ScriptRegistry {
    async fn register(
        &self,
        registration: ContentScriptRegistration,
    ) -> Result<ScriptRegistrationId> {
        let patterns = MatchPatternSet::parse(&registration.matches)
            .map_err(|e| AdscopeError::Registration(e.to_string()))?;

        if registration.js.is_empty() {
            return Err(AdscopeError::Registration(
                "registration must name at least one script".to_string(),
            ));
        }

        let id = ScriptRegistrationId::generate();
        self.scripts
            .write()
            .expect("acquire write lock on scripts")
            .insert(
                id,
                RegisteredScript {
                    registration,
                    patterns,
                },
            );

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscope_matching::domains_to_match_patterns;

    #[tokio::test]
    async fn test_agent_runs_on_matching_pages_only() {
        let registry = ScriptRegistry::new();
        let patterns = domains_to_match_patterns(&["example.com"], true).expect("valid domains");

        let id = inject_agent(&registry, &patterns).await.expect("register agent");

        let registration = registry.get(&id).expect("registration stored");
        assert_eq!(registration.run_at, RunAt::DocumentStart);
        assert_eq!(registration.js[0].file, AGENT_SCRIPT_PATH);

        let injected = registry.scripts_for("https://sub.example.com/x", RunAt::DocumentStart);
        assert_eq!(injected.len(), 1);
        assert!(registry
            .scripts_for("https://notexample.com/x", RunAt::DocumentStart)
            .is_empty());
        assert!(registry
            .scripts_for("https://example.com/x", RunAt::DocumentIdle)
            .is_empty());
    }

    #[tokio::test]
    async fn test_empty_match_set_never_fires() {
        let registry = ScriptRegistry::new();

        inject_agent(&registry, &MatchPatternSet::new())
            .await
            .expect("empty set still registers");

        assert_eq!(registry.len(), 1);
        assert!(registry
            .scripts_for("https://example.com/x", RunAt::DocumentStart)
            .is_empty());
    }

    #[tokio::test]
    async fn test_malformed_pattern_is_rejected() {
        let registry = ScriptRegistry::new();
        let registration = ContentScriptRegistration {
            matches: vec!["not a pattern".to_string()],
            js: vec![ScriptFile {
                file: AGENT_SCRIPT_PATH.to_string(),
            }],
            run_at: RunAt::DocumentStart,
        };

        let result = registry.register(registration).await;
        assert!(matches!(result, Err(AdscopeError::Registration(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registration_wire_format() {
        let patterns = MatchPatternSet::parse(["*://example.com/*"]).expect("valid pattern");
        let registration = ContentScriptRegistration::scanning_agent(&patterns);
        let json = serde_json::to_value(&registration).expect("serialize registration");

        assert_eq!(
            json,
            serde_json::json!({
                "matches": ["*://example.com/*"],
                "js": [{ "file": "/dist/content-scripts/page-ads.js" }],
                "runAt": "document_start"
            })
        );
    }
}
