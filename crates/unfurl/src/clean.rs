// ABOUTME: URL cleaner producing `cleaned_url`: strips tracking parameters and unwraps redirectors.
// ABOUTME: Keeps every other query parameter in its original order and form, and the fragment.

use url::Url;

/// Tracking parameters removed on every host.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "gclsrc",
    "dclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "igshid",
    "_hsenc",
    "_hsmi",
    "mkt_tok",
    "yclid",
    "ref_src",
    "spm",
    "vero_id",
    "oly_enc_id",
    "oly_anon_id",
    "__s",
    "wickedid",
];

/// Hosts where `si` is a share tracker rather than content.
const SI_HOSTS: &[&str] = &["youtube.com", "youtu.be", "spotify.com"];

/// Redirect wrappers and the parameters carrying the real target.
const REDIRECTORS: &[(&str, &str, &[&str])] = &[
    ("l.facebook.com", "/l.php", &["u"]),
    ("lm.facebook.com", "/l.php", &["u"]),
    ("www.google.com", "/url", &["q", "url"]),
    ("google.com", "/url", &["q", "url"]),
    ("out.reddit.com", "/", &["url"]),
];

/// Maximum nested redirect wrappers followed.
const MAX_UNWRAP: usize = 3;

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn is_tracking(key: &str, host: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_")
        || TRACKING_PARAMS.contains(&key.as_str())
        || (key == "si" && SI_HOSTS.iter().any(|d| host_matches(host, d)))
}

/// The wrapped destination, if `url` is a known redirector.
fn unwrap_redirect(url: &Url) -> Option<Url> {
    let host = url.host_str()?.to_ascii_lowercase();
    let (_, _, keys) = REDIRECTORS
        .iter()
        .find(|(h, path, _)| *h == host && url.path() == *path)?;
    url.query_pairs()
        .find(|(k, _)| keys.contains(&&**k))
        .and_then(|(_, v)| Url::parse(&v).ok())
        .filter(|target| matches!(target.scheme(), "http" | "https"))
}

/// Returns `url` without tracking noise, or `None` if it cannot be parsed.
pub fn clean_url(url: &str) -> Option<String> {
    let mut current = Url::parse(url.trim()).ok()?;
    for _ in 0..MAX_UNWRAP {
        match unwrap_redirect(&current) {
            Some(target) => current = target,
            None => break,
        }
    }

    let host = current.host_str().unwrap_or_default().to_ascii_lowercase();
    if let Some(query) = current.query() {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                !pair.is_empty() && !is_tracking(key, &host)
            })
            .collect();
        let rebuilt = kept.join("&");
        if rebuilt.is_empty() {
            current.set_query(None);
        } else {
            current.set_query(Some(&rebuilt));
        }
    }

    Some(current.to_string())
}
