// ABOUTME: Document fetcher: one bounded GET per request with SSRF protection and a body cap.
// ABOUTME: Also owns the discussion-platform rewrite and charset-aware body decoding.

use std::collections::HashMap;
use std::net::IpAddr;

use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use tracing::debug;
use url::Url;

use crate::error::UnfurlError;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Host that serves the static rendition of reddit pages.
const REDDIT_STATIC_HOST: &str = "old.reddit.com";

static PRIVATE_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    [
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "0.0.0.0/8",
        "100.64.0.0/10",
    ]
    .iter()
    .filter_map(|net| net.parse().ok())
    .collect()
});

static PRIVATE_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    ["fc00::/7", "fe80::/10"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

/// Options for fetching a document.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
}

/// Raw outcome of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The URL actually requested, after any rewrite.
    pub requested_url: String,
    /// The URL after following redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchOutcome {
    /// Decodes the body using the `Content-Type` charset, or detection.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Check if an IP address is in a private/reserved range.
pub(crate) fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => PRIVATE_V4.iter().any(|net| net.contains(ip)),
        IpAddr::V6(ip) => {
            if ip.is_loopback() || ip.is_unspecified() {
                return true;
            }
            if let Some(mapped) = ip.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            PRIVATE_V6.iter().any(|net| net.contains(ip))
        }
    }
}

/// Rewrites reddit URLs to the static host so the returned markup carries
/// the post's meta tags. Other URLs pass through unchanged.
pub fn rewrite_target(url: &Url) -> Url {
    let Some(host) = url.host_str() else {
        return url.clone();
    };
    let host = host.to_ascii_lowercase();
    if host == REDDIT_STATIC_HOST || !(host == "reddit.com" || host.ends_with(".reddit.com")) {
        return url.clone();
    }
    let mut rewritten = url.clone();
    match rewritten.set_host(Some(REDDIT_STATIC_HOST)) {
        Ok(()) => {
            debug!(from = %url, to = %rewritten, "rewrote discussion URL");
            rewritten
        }
        Err(_) => url.clone(),
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
pub(crate) fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(extract_charset)
        .and_then(|charset| encoding_rs::Encoding::for_label(charset.as_bytes()));
    let encoding = declared.unwrap_or_else(|| {
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(body, true);
        detector.guess(None, true)
    });
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    content_type.to_lowercase().split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|cs| cs.trim_matches('"').trim_matches('\'').to_string())
    })
}

/// Refuses hosts that are, or resolve to, private addresses.
async fn guard_host(target: &Url, requested: &str, what: &str) -> Result<(), UnfurlError> {
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let blocked = || {
        UnfurlError::ssrf(
            requested,
            "Fetch",
            Some(anyhow::anyhow!("{} private IP address is not allowed", what)),
        )
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return if is_private_ip(&ip) { Err(blocked()) } else { Ok(()) };
    }

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        UnfurlError::fetch(
            requested,
            "Fetch",
            Some(anyhow::anyhow!("DNS lookup failed: {}", e)),
        )
    })?;
    for socket_addr in addrs {
        if is_private_ip(&socket_addr.ip()) {
            return Err(blocked());
        }
    }
    Ok(())
}

fn request_error(url: &str, err: reqwest::Error) -> UnfurlError {
    if err.is_timeout() {
        UnfurlError::timeout(url, "Fetch", Some(anyhow::anyhow!("request timed out")))
    } else {
        UnfurlError::fetch(url, "Fetch", Some(anyhow::anyhow!("request failed: {}", err)))
    }
}

/// Reads a response body, rejecting anything over [`MAX_CONTENT_LENGTH`]
/// by declared `Content-Length` or by actual size.
pub(crate) async fn read_body(response: reqwest::Response, url: &str) -> Result<Bytes, UnfurlError> {
    let too_large = || UnfurlError::fetch(url, "Fetch", Some(anyhow::anyhow!("content too large")));
    if response
        .content_length()
        .is_some_and(|len| len > MAX_CONTENT_LENGTH as u64)
    {
        return Err(too_large());
    }
    let body = response.bytes().await.map_err(|e| request_error(url, e))?;
    if body.len() > MAX_CONTENT_LENGTH {
        return Err(too_large());
    }
    Ok(body)
}

/// Fetch the document at `url`.
///
/// The URL must be absolute http(s); reddit hosts are rewritten first.
/// Any status outside 2xx is a `Fetch` error.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchOutcome, UnfurlError> {
    if url.trim().is_empty() {
        return Err(UnfurlError::invalid_input(url, "Fetch", None));
    }

    let parsed = Url::parse(url).map_err(|e| {
        UnfurlError::invalid_input(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(UnfurlError::invalid_input(
            url,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    let target = rewrite_target(&parsed);
    let requested_url = target.to_string();

    if !opts.allow_private_networks {
        guard_host(&target, &requested_url, "request to").await?;
    }

    let mut request = client.get(target.clone());
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| request_error(&requested_url, e))?;

    if !opts.allow_private_networks && response.url() != &target {
        guard_host(response.url(), &requested_url, "redirect to").await?;
    }

    let status = response.status();
    if !status.is_success() {
        return Err(UnfurlError::fetch(
            &requested_url,
            "Fetch",
            Some(anyhow::anyhow!("HTTP status {}", status.as_u16())),
        ));
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    let body = read_body(response, &requested_url).await?;

    debug!(
        url = %requested_url,
        final_url = %final_url,
        status = status.as_u16(),
        bytes = body.len(),
        "fetched document"
    );

    Ok(FetchOutcome {
        requested_url,
        final_url,
        status: status.as_u16(),
        content_type,
        body,
    })
}
