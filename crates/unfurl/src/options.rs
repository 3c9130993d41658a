// ABOUTME: Configuration for the unfurl pipeline: Options and the fluent UnfurlerBuilder.
// ABOUTME: Covers HTTP behaviour, the rule set in use, and repository lookup bases.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::client::Unfurler;
use crate::repo_image::{DEFAULT_GITHUB_BASE, DEFAULT_GITLAB_API_BASE};
use crate::rules::RuleSet;

/// Default bound on each outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration options for the Unfurler.
#[derive(Debug, Clone)]
pub struct Options {
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub http_client: Option<reqwest::Client>,
    pub headers: HashMap<String, String>,
    /// Rule set to extract with; the embedded table when `None`.
    pub rules: Option<Arc<RuleSet>>,
    pub github_base: String,
    pub gitlab_api_base: String,
    pub resolve_repo_images: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("digests-unfurl/{}", env!("CARGO_PKG_VERSION")),
            allow_private_networks: false,
            http_client: None,
            headers: HashMap::new(),
            rules: None,
            github_base: DEFAULT_GITHUB_BASE.to_string(),
            gitlab_api_base: DEFAULT_GITLAB_API_BASE.to_string(),
            resolve_repo_images: true,
        }
    }
}

/// Builder for constructing Unfurler instances with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct UnfurlerBuilder {
    opts: Options,
}

impl UnfurlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Use a custom HTTP client. Timeout and redirect settings then come from it.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a header sent with the primary fetch.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    pub fn rules(mut self, rules: Arc<RuleSet>) -> Self {
        self.opts.rules = Some(rules);
        self
    }

    /// Base URL GitHub repository pages are recognized under and fetched from.
    pub fn github_base(mut self, base: impl Into<String>) -> Self {
        self.opts.github_base = base.into();
        self
    }

    /// Base URL GitLab projects are recognized under and looked up through.
    pub fn gitlab_api_base(mut self, base: impl Into<String>) -> Self {
        self.opts.gitlab_api_base = base.into();
        self
    }

    pub fn resolve_repo_images(mut self, enabled: bool) -> Self {
        self.opts.resolve_repo_images = enabled;
        self
    }

    pub fn build(self) -> Unfurler {
        Unfurler::new(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::default();
        assert_eq!(opts.timeout, Duration::from_secs(15));
        assert!(!opts.allow_private_networks);
        assert!(opts.resolve_repo_images);
        assert!(opts.user_agent.starts_with("digests-unfurl/"));
        assert_eq!(opts.github_base, "https://github.com");
    }

    #[test]
    fn builder_sets_fields() {
        let builder = UnfurlerBuilder::new()
            .timeout(Duration::from_secs(3))
            .allow_private_networks(true)
            .header("x-a", "1")
            .github_base("http://127.0.0.1:1")
            .resolve_repo_images(false);
        assert_eq!(builder.opts.timeout, Duration::from_secs(3));
        assert!(builder.opts.allow_private_networks);
        assert_eq!(builder.opts.headers.get("x-a").map(String::as_str), Some("1"));
        assert_eq!(builder.opts.github_base, "http://127.0.0.1:1");
        assert!(!builder.opts.resolve_repo_images);
    }
}
