//! Participant identity enrichment and simple collaborator implementations.

use crate::services::{PageManager, SurveyIdentity};
use adscope_core::{Result, SurveyUserId};
use async_trait::async_trait;
use tracing::trace;

/// Resolve the participant id for one report.
///
/// An unassigned identity is rendered as `"undefined"`.
///
/// # Errors
/// Propagates the identity service's error unchanged.
pub async fn resolve_user_id(identity: &dyn SurveyIdentity) -> Result<SurveyUserId> {
    let id = identity.survey_id().await?;
    if id.is_none() {
        trace!("survey identity not assigned, using placeholder");
    }
    Ok(SurveyUserId::coerce(id))
}

/// Identity service that always answers with the same value.
#[derive(Debug, Clone, Default)]
pub struct FixedSurveyIdentity {
    survey_id: Option<String>,
}

impl FixedSurveyIdentity {
    #[must_use]
    pub fn new(survey_id: Option<String>) -> Self {
        Self { survey_id }
    }
}

#[async_trait]
impl SurveyIdentity for FixedSurveyIdentity {
    async fn survey_id(&self) -> Result<Option<String>> {
        Ok(self.survey_id.clone())
    }
}

/// Page manager for hosts that assign page ids elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPageManager;

#[async_trait]
impl PageManager for StaticPageManager {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscope_core::AdscopeError;

    struct Unavailable;

    #[async_trait]
    impl SurveyIdentity for Unavailable {
        async fn survey_id(&self) -> Result<Option<String>> {
            Err(AdscopeError::Identity("storage unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_assigned_identity_is_used() {
        let identity = FixedSurveyIdentity::new(Some("u9".to_string()));
        let user = resolve_user_id(&identity).await.expect("resolve identity");
        assert_eq!(user.as_str(), "u9");
    }

    #[tokio::test]
    async fn test_missing_identity_becomes_undefined() {
        let user = resolve_user_id(&FixedSurveyIdentity::default())
            .await
            .expect("resolve identity");
        assert_eq!(user.as_str(), "undefined");
    }

    #[tokio::test]
    async fn test_identity_failure_propagates() {
        let result = resolve_user_id(&Unavailable).await;
        assert!(matches!(result, Err(AdscopeError::Identity(_))));
    }
}
