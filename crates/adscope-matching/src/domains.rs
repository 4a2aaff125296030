//! Domain allow-list to match pattern compilation.

use crate::error::{MatchPatternError, Result};
use crate::pattern::{MatchPattern, MatchPatternSet};
use url::Host;

/// Build the match patterns that cover a list of domains.
///
/// Every domain yields `*://<domain>/*`. With `match_subdomains` a second
/// pattern `*://*.<domain>/*` is added so that any subdomain is covered too.
/// Domains are trimmed, lower-cased and stripped of a trailing dot before
/// use; duplicates collapse into a single pattern.
///
/// An empty list produces an empty set, which matches no page.
///
/// # Errors
/// Returns `MatchPatternError::InvalidDomain` for an entry that is empty,
/// carries a scheme, port, path or wildcard, or is not a valid host name.
pub fn domains_to_match_patterns<S: AsRef<str>>(
    domains: &[S],
    match_subdomains: bool,
) -> Result<MatchPatternSet> {
    let mut set = MatchPatternSet::new();

    for domain in domains {
        let host = canonical_host(domain.as_ref())?;

        set.insert(MatchPattern::parse(&format!("*://{}/*", host.name))?);
        if match_subdomains && host.is_domain {
            set.insert(MatchPattern::parse(&format!("*://*.{}/*", host.name))?);
        }
    }

    tracing::debug!(
        domains = domains.len(),
        patterns = set.len(),
        match_subdomains,
        "compiled domain match patterns"
    );

    Ok(set)
}

struct CanonicalHost {
    name: String,
    is_domain: bool,
}

fn canonical_host(raw: &str) -> Result<CanonicalHost> {
    let invalid = |reason: &str| MatchPatternError::InvalidDomain {
        domain: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(invalid("domain is empty"));
    }
    if trimmed.contains('*') {
        return Err(invalid("wildcards are added by the matcher, not the domain list"));
    }
    if trimmed.contains(['/', ':', '?', '#', '@']) || trimmed.chars().any(char::is_whitespace) {
        return Err(invalid("expected a bare host name"));
    }

    match Host::parse(&trimmed) {
        Ok(Host::Domain(name)) => Ok(CanonicalHost {
            name,
            is_domain: true,
        }),
        Ok(Host::Ipv4(addr)) => Ok(CanonicalHost {
            name: addr.to_string(),
            is_domain: false,
        }),
        Ok(Host::Ipv6(_)) => Err(invalid("IPv6 hosts are not supported")),
        Err(e) => Err(invalid(&e.to_string())),
    }
}
