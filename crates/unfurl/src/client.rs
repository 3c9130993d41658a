// ABOUTME: The Unfurler: runs fetch, parse, extract, finalize, repository image and URL cleaning.
// ABOUTME: Holds the shared HTTP client and rule set; one instance serves all requests.

use std::net::ToSocketAddrs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::clean;
use crate::document;
use crate::error::UnfurlError;
use crate::extract::{self, FinalizeContext};
use crate::options::{Options, UnfurlerBuilder};
use crate::repo_image::{RepoHosts, RepoImageResolver};
use crate::resource::{fetch, is_private_ip, FetchOptions};
use crate::result::ExtractionResult;
use crate::rules::loader::load_builtin_rules;
use crate::rules::RuleSet;

/// Key under which the repository's author-supplied image is attached.
pub const ORIGINAL_OG_IMAGE: &str = "originalOGImage";

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

static SCHEME_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").expect("valid scheme regex"));

static BUILTIN_RULES: Lazy<Arc<RuleSet>> = Lazy::new(|| Arc::new(load_builtin_rules()));

/// Turns caller input into an absolute URL, prepending `https://` to bare
/// domains such as `example.com/page`.
pub fn normalize_input(url: &str) -> Result<String, UnfurlError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(UnfurlError::invalid_input(
            url,
            "Unfurl",
            Some(anyhow::anyhow!("empty URL")),
        ));
    }
    let candidate = if SCHEME_PREFIX_RE.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    Url::parse(&candidate).map(String::from).map_err(|e| {
        UnfurlError::invalid_input(url, "Unfurl", Some(anyhow::anyhow!("malformed URL: {}", e)))
    })
}

fn redirect_blocked(next: &Url) -> Option<&'static str> {
    let host = next.host_str()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return is_private_ip(&ip).then_some("redirect to private IP blocked");
    }
    let port = next.port_or_known_default().unwrap_or(80);
    // Redirect policies are synchronous, so resolution here blocks.
    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs
            .any(|sa| is_private_ip(&sa.ip()))
            .then_some("redirect to private IP blocked"),
        Err(_) => Some("DNS lookup failed during redirect"),
    }
}

/// Fetches pages and turns them into metadata.
pub struct Unfurler {
    opts: Options,
    http_client: reqwest::Client,
    rules: Arc<RuleSet>,
    repo_images: RepoImageResolver,
}

impl Unfurler {
    pub fn builder() -> UnfurlerBuilder {
        UnfurlerBuilder::new()
    }

    /// Create a new Unfurler with the given options.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized while building the
    /// default HTTP client.
    pub fn new(opts: Options) -> Self {
        let http_client = opts.http_client.clone().unwrap_or_else(|| {
            let allow_private = opts.allow_private_networks;
            let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    return attempt.error("too many redirects");
                }
                if !allow_private {
                    if let Some(reason) = redirect_blocked(attempt.url()) {
                        return attempt.error(reason);
                    }
                }
                attempt.follow()
            });

            reqwest::Client::builder()
                .redirect(redirect_policy)
                .user_agent(&opts.user_agent)
                .timeout(opts.timeout)
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .expect("failed to build HTTP client")
        });

        let rules = opts
            .rules
            .clone()
            .unwrap_or_else(|| Arc::clone(&BUILTIN_RULES));
        let repo_images = RepoImageResolver::new(
            http_client.clone(),
            RepoHosts::new(&opts.github_base, &opts.gitlab_api_base),
        );

        Self {
            opts,
            http_client,
            rules,
            repo_images,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Fetches `url` and extracts its metadata.
    ///
    /// Bare domains are accepted. With `clean_url` set, a `cleaned_url`
    /// field is added when the final URL can be cleaned.
    pub async fn unfurl(&self, url: &str, clean_url: bool) -> Result<ExtractionResult, UnfurlError> {
        let input = normalize_input(url)?;

        let fetch_opts = FetchOptions {
            headers: self.opts.headers.clone(),
            allow_private_networks: self.opts.allow_private_networks,
        };
        let outcome = fetch(&self.http_client, &input, &fetch_opts).await?;

        let html = outcome.text();
        let mut result = self.extract_document(&html, &outcome.requested_url, &outcome.final_url)?;

        if self.opts.resolve_repo_images {
            if let Some(repo) = self.repo_images.hosts().parse(&outcome.requested_url) {
                debug!(url = %outcome.requested_url, ?repo, "resolving repository image");
                if let Some(image) = self.repo_images.resolve(&repo).await {
                    result.set(ORIGINAL_OG_IMAGE, image);
                }
            }
        }

        if clean_url {
            if let Some(cleaned) = clean::clean_url(&outcome.final_url) {
                result.set("cleaned_url", cleaned);
            }
        }

        info!(
            url = %outcome.requested_url,
            final_url = %outcome.final_url,
            fields = result.len(),
            "unfurled"
        );
        Ok(result)
    }

    /// Extracts metadata from already-fetched HTML served at `url`.
    ///
    /// No network access: the repository image lookup is skipped.
    pub fn unfurl_html(&self, html: &str, url: &str) -> Result<ExtractionResult, UnfurlError> {
        let url = normalize_input(url)?;
        self.extract_document(html, &url, &url)
    }

    /// Parse, extract and finalize. Panics inside extraction surface as
    /// `Unexpected` instead of tearing down the request task.
    fn extract_document(
        &self,
        html: &str,
        requested_url: &str,
        final_url: &str,
    ) -> Result<ExtractionResult, UnfurlError> {
        let rules = &self.rules;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let doc = document::parse(html);
            let mut result = extract::extract(&doc, rules);
            extract::finalize(
                &mut result,
                rules,
                &FinalizeContext {
                    requested_url,
                    final_url,
                },
            );
            result
        }));
        outcome.map_err(|_| {
            UnfurlError::unexpected(
                requested_url,
                "Extract",
                Some(anyhow::anyhow!("extraction panicked")),
            )
        })
    }
}
