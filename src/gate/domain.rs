//! Email domain allow-list for the first gate stage.

use std::fmt;

pub const DEFAULT_ALLOWED_DOMAINS: &str = "gmail.com,yahoo.com,outlook.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedDomains(Vec<String>);

impl AllowedDomains {
    /// Parse a comma separated list; blank entries are dropped, entries are
    /// trimmed but case is kept.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|domain| !domain.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True iff the text after the last `@` equals one entry exactly
    /// (case-sensitive).
    #[must_use]
    pub fn is_domain_allowed(&self, email: &str) -> bool {
        email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| self.0.iter().any(|allowed| allowed == domain))
    }
}

impl Default for AllowedDomains {
    fn default() -> Self {
        Self::parse(DEFAULT_ALLOWED_DOMAINS)
    }
}

impl fmt::Display for AllowedDomains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}
