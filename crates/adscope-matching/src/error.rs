use thiserror::Error;

pub type Result<T> = std::result::Result<T, MatchPatternError>;

#[derive(Debug, Error)]
pub enum MatchPatternError {
    #[error("invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("invalid match pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MatchPatternError::InvalidDomain {
            domain: "exa mple.com".to_string(),
            reason: "not a valid host".to_string(),
        };
        assert_eq!(err.to_string(), "invalid domain 'exa mple.com': not a valid host");
    }

    #[test]
    fn test_invalid_url_keeps_source() {
        let source = url::Url::parse("not a url").expect_err("should not parse");
        let err = MatchPatternError::InvalidUrl {
            url: "not a url".to_string(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
    }
}
