//! Email allow-list guarding the admin view.

use hashbrown::HashSet;

/// Set-membership check over configured admin identities.
///
/// Comparison trims whitespace and ignores ASCII case.
#[derive(Debug, Clone, Default)]
pub struct AdminGate {
    allowed: HashSet<String>,
}

impl AdminGate {
    /// Gate admitting exactly `identities`.
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = identities
            .into_iter()
            .map(|id| normalize(id.as_ref()))
            .filter(|id| !id.is_empty())
            .collect();
        Self { allowed }
    }

    /// Gate built from [`crate::config::SurveyConfig::admin_emails`].
    pub fn from_config(config: &crate::config::SurveyConfig) -> Self {
        Self::new(&config.admin_emails)
    }

    /// Returns true when `identity` is on the allow-list.
    pub fn is_authorized(&self, identity: &str) -> bool {
        let identity = normalize(identity);
        !identity.is_empty() && self.allowed.contains(&identity)
    }

    /// Number of admitted identities.
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    /// Returns true when nobody is admitted.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

fn normalize(identity: &str) -> String {
    identity.trim().to_ascii_lowercase()
}
