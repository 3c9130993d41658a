// ABOUTME: Link classifier assigning a coarse content-type label from URL shape alone.
// ABOUTME: Pure and deterministic: file extensions, known platform hosts, dated article paths.

//! Link type classification.
//!
//! The pipeline calls [`classify`] in non-strict mode with the URL the caller
//! asked for. Non-strict host matching also accepts subdomains
//! (`m.youtube.com`, `old.reddit.com`); strict mode requires the exact host.
//! [`classify_response`] is the strict variant that may also consult a
//! fetched `Content-Type`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Coarse content label for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Image,
    Video,
    Audio,
    Document,
    Repository,
    Profile,
    Post,
    Article,
    Website,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Image => "image",
            LinkType::Video => "video",
            LinkType::Audio => "audio",
            LinkType::Document => "document",
            LinkType::Repository => "repository",
            LinkType::Profile => "profile",
            LinkType::Post => "post",
            LinkType::Article => "article",
            LinkType::Website => "website",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "avif", "bmp", "ico", "tif", "tiff",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "mkv", "avi", "ogv", "m3u8"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "oga", "m4a", "flac", "aac", "opus"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "odt", "epub",
];

/// First path segments on GitHub that are site routes, not accounts.
pub(crate) const GITHUB_RESERVED: &[&str] = &[
    "about", "apps", "blog", "collections", "contact", "customer-stories", "enterprise",
    "events", "explore", "features", "issues", "login", "marketplace", "new", "notifications",
    "orgs", "pricing", "pulls", "search", "security", "settings", "signup", "site", "sponsors",
    "topics", "trending",
];

/// Handle-style first segments on X/Twitter/Instagram that are site routes.
const SOCIAL_RESERVED: &[&str] = &[
    "explore", "home", "i", "intent", "login", "messages", "notifications", "search",
    "settings", "share", "signup", "tos", "privacy", "accounts", "direct", "reels", "stories",
];

static DATED_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(19|20)\d{2}/(0?[1-9]|1[0-2])(/|$)").expect("valid date regex"));

/// Host matcher honoring strict/non-strict semantics.
fn host_is(host: &str, domain: &str, strict: bool) -> bool {
    if host == domain || host == format!("www.{}", domain) {
        return true;
    }
    !strict && host.ends_with(&format!(".{}", domain))
}

fn extension_type(segments: &[&str]) -> Option<LinkType> {
    let last = segments.last()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.contains(&ext) {
        Some(LinkType::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(LinkType::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some(LinkType::Audio)
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        Some(LinkType::Document)
    } else {
        None
    }
}

fn platform_type(host: &str, segments: &[&str], url: &Url, strict: bool) -> Option<LinkType> {
    let on = |domain: &str| host_is(host, domain, strict);
    let seg = |i: usize| segments.get(i).copied();
    let is_handle = |s: &str, reserved: &[&str]| {
        !reserved.iter().any(|r| r.eq_ignore_ascii_case(s))
    };

    // Video platforms
    if on("youtube.com") {
        if seg(0) == Some("watch") && url.query_pairs().any(|(k, _)| k == "v") {
            return Some(LinkType::Video);
        }
        if matches!(seg(0), Some("shorts") | Some("embed") | Some("live")) && seg(1).is_some() {
            return Some(LinkType::Video);
        }
        if seg(0).is_some_and(|s| s.starts_with('@')) {
            return Some(LinkType::Profile);
        }
        return None;
    }
    if on("youtu.be") && seg(0).is_some() {
        return Some(LinkType::Video);
    }
    if on("vimeo.com") && seg(0).is_some_and(|s| s.chars().all(|c| c.is_ascii_digit())) {
        return Some(LinkType::Video);
    }
    if on("twitch.tv") {
        return match (seg(0), seg(1)) {
            (Some("videos"), Some(_)) => Some(LinkType::Video),
            (Some(_), Some("clip")) => Some(LinkType::Video),
            (Some(_), None) => Some(LinkType::Profile),
            _ => None,
        };
    }
    if on("tiktok.com") {
        return match (seg(0), seg(1)) {
            (Some(user), Some("video")) if user.starts_with('@') => Some(LinkType::Video),
            (Some(user), None) if user.starts_with('@') => Some(LinkType::Profile),
            _ => None,
        };
    }

    // Source hosting and package registries
    if on("github.com") {
        return match (seg(0), seg(1)) {
            (Some(owner), Some(_)) if is_handle(owner, GITHUB_RESERVED) => {
                Some(LinkType::Repository)
            }
            (Some(owner), None) if is_handle(owner, GITHUB_RESERVED) => Some(LinkType::Profile),
            _ => None,
        };
    }
    if (on("gitlab.com") || on("bitbucket.org")) && seg(0).is_some() {
        return Some(if seg(1).is_some() {
            LinkType::Repository
        } else {
            LinkType::Profile
        });
    }
    if on("npmjs.com") && seg(0) == Some("package") && seg(1).is_some() {
        return Some(LinkType::Repository);
    }
    if on("crates.io") && seg(0) == Some("crates") && seg(1).is_some() {
        return Some(LinkType::Repository);
    }
    if on("pypi.org") && seg(0) == Some("project") && seg(1).is_some() {
        return Some(LinkType::Repository);
    }

    // Social platforms
    if on("twitter.com") || on("x.com") {
        return match (seg(0), seg(1), seg(2)) {
            (Some(_), Some("status"), Some(_)) => Some(LinkType::Post),
            (Some(user), None, None) if is_handle(user, SOCIAL_RESERVED) => {
                Some(LinkType::Profile)
            }
            _ => None,
        };
    }
    if on("reddit.com") {
        return match (seg(0), seg(2)) {
            (Some("r"), Some("comments")) => Some(LinkType::Post),
            (Some("user") | Some("u"), _) if seg(1).is_some() => Some(LinkType::Profile),
            _ => None,
        };
    }
    if on("news.ycombinator.com") {
        return match seg(0) {
            Some("item") => Some(LinkType::Post),
            Some("user") => Some(LinkType::Profile),
            _ => None,
        };
    }
    if on("instagram.com") {
        return match (seg(0), seg(1)) {
            (Some("p") | Some("reel"), Some(_)) => Some(LinkType::Post),
            (Some(user), None) if is_handle(user, SOCIAL_RESERVED) => Some(LinkType::Profile),
            _ => None,
        };
    }
    if on("bsky.app") {
        return match (seg(0), seg(1), seg(2)) {
            (Some("profile"), Some(_), Some("post")) => Some(LinkType::Post),
            (Some("profile"), Some(_), None) => Some(LinkType::Profile),
            _ => None,
        };
    }
    if on("linkedin.com") {
        return match seg(0) {
            Some("posts") | Some("feed") if seg(1).is_some() => Some(LinkType::Post),
            Some("in") if seg(1).is_some() => Some(LinkType::Profile),
            _ => None,
        };
    }

    None
}

/// Classifies a link by URL shape alone.
///
/// Unparseable input and URLs matching no known shape are `Website`.
pub fn classify(url: &str, strict: bool) -> LinkType {
    let Ok(parsed) = Url::parse(url) else {
        return LinkType::Website;
    };
    let host = parsed
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
        .unwrap_or_default();
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if let Some(ty) = extension_type(&segments) {
        return ty;
    }
    if let Some(ty) = platform_type(&host, &segments, &parsed, strict) {
        return ty;
    }
    if DATED_PATH_RE.is_match(parsed.path()) {
        return LinkType::Article;
    }
    LinkType::Website
}

/// Strict classification that lets a fetched `Content-Type` decide first.
pub fn classify_response(url: &str, content_type: Option<&str>) -> LinkType {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match mime.split_once('/') {
        Some(("image", _)) => return LinkType::Image,
        Some(("video", _)) => return LinkType::Video,
        Some(("audio", _)) => return LinkType::Audio,
        _ => {}
    }
    if mime == "application/pdf" || mime == "application/epub+zip" {
        return LinkType::Document;
    }
    classify(url, true)
}
