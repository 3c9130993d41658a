// ABOUTME: Repository image resolver recovering the author-uploaded preview of GitHub/GitLab repos.
// ABOUTME: Best-effort secondary lookup; every failure collapses to None and is only logged.

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::classify::GITHUB_RESERVED;
use crate::document::{self, MetaKey};
use crate::resource;

pub const DEFAULT_GITHUB_BASE: &str = "https://github.com";
pub const DEFAULT_GITLAB_API_BASE: &str = "https://gitlab.com";

/// Hosts GitHub uses for generated social cards and avatars.
const GENERATED_IMAGE_HOSTS: &[&str] = &["opengraph.githubassets.com", "avatars.githubusercontent.com"];

/// First path segments that are GitLab site routes, not namespaces.
const GITLAB_RESERVED: &[&str] = &[
    "explore", "users", "groups", "dashboard", "admin", "api", "help", "search",
    "projects", "snippets", "profile", "oauth", "jwt", "assets", "uploads",
];

/// A repository recognized from a page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoRef {
    GitHub { owner: String, repo: String },
    /// Full namespace path, e.g. `group/subgroup/project`.
    GitLab { path: String },
}

/// Where repositories live and where to look them up.
#[derive(Debug, Clone)]
pub struct RepoHosts {
    github_base: String,
    gitlab_api_base: String,
}

impl Default for RepoHosts {
    fn default() -> Self {
        Self::new(DEFAULT_GITHUB_BASE, DEFAULT_GITLAB_API_BASE)
    }
}

/// `host[:port]` of a base URL, lowercased.
fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

fn same_authority(page: &Url, base: &str) -> bool {
    let (Some(page_auth), Some(base_auth)) =
        (authority(page), Url::parse(base).ok().as_ref().and_then(authority))
    else {
        return false;
    };
    page_auth == base_auth || page_auth.strip_prefix("www.") == Some(base_auth.as_str())
}

impl RepoHosts {
    pub fn new(github_base: impl Into<String>, gitlab_api_base: impl Into<String>) -> Self {
        Self {
            github_base: github_base.into().trim_end_matches('/').to_string(),
            gitlab_api_base: gitlab_api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Recognizes `owner/repo` pages on the configured hosts.
    pub fn parse(&self, url: &str) -> Option<RepoRef> {
        let url = Url::parse(url).ok()?;
        let segments: Vec<&str> = url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .collect();

        if same_authority(&url, &self.github_base) {
            let (owner, repo) = (segments.first()?, segments.get(1)?);
            if GITHUB_RESERVED.iter().any(|r| r.eq_ignore_ascii_case(owner)) {
                return None;
            }
            return Some(RepoRef::GitHub {
                owner: owner.to_string(),
                repo: repo.trim_end_matches(".git").to_string(),
            });
        }

        if same_authority(&url, &self.gitlab_api_base) {
            let path: Vec<&str> = segments.into_iter().take_while(|s| *s != "-").collect();
            if path.len() < 2
                || GITLAB_RESERVED.iter().any(|r| r.eq_ignore_ascii_case(path[0]))
            {
                return None;
            }
            return Some(RepoRef::GitLab {
                path: path.join("/"),
            });
        }

        None
    }
}

/// True if `url` is a repository page on github.com or gitlab.com.
pub fn is_repository_url(url: &str) -> bool {
    RepoHosts::default().parse(url).is_some()
}

fn is_generated_image(image: &str) -> bool {
    match Url::parse(image) {
        Ok(url) => url
            .host_str()
            .is_some_and(|h| GENERATED_IMAGE_HOSTS.contains(&h.to_ascii_lowercase().as_str())),
        Err(_) => true,
    }
}

#[derive(Debug, Deserialize)]
struct GitLabProject {
    avatar_url: Option<String>,
}

/// Looks up the preview image a repository's author uploaded.
#[derive(Debug, Clone)]
pub struct RepoImageResolver {
    client: reqwest::Client,
    hosts: RepoHosts,
}

impl RepoImageResolver {
    pub fn new(client: reqwest::Client, hosts: RepoHosts) -> Self {
        Self { client, hosts }
    }

    pub fn hosts(&self) -> &RepoHosts {
        &self.hosts
    }

    /// Resolves the original image, or `None` on any failure.
    pub async fn resolve(&self, repo: &RepoRef) -> Option<String> {
        match repo {
            RepoRef::GitHub { owner, repo } => self.resolve_github(owner, repo).await,
            RepoRef::GitLab { path } => self.resolve_gitlab(path).await,
        }
    }

    /// GETs `url`, returning its status-checked, size-capped body and content type.
    async fn get_body(&self, url: &str) -> Option<(Bytes, Option<String>)> {
        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %url, error = %e, "repository lookup failed");
                return None;
            }
        };
        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "repository lookup returned error status");
            return None;
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_lowercase);
        match resource::read_body(response, url).await {
            Ok(body) => Some((body, content_type)),
            Err(e) => {
                warn!(url = %url, error = %e, "failed to read repository lookup body");
                None
            }
        }
    }

    async fn resolve_github(&self, owner: &str, repo: &str) -> Option<String> {
        let page = format!("{}/{}/{}", self.hosts.github_base, owner, repo);
        let (body, content_type) = self.get_body(&page).await?;
        let html = resource::decode_body(&body, content_type.as_deref());
        let image = document::parse(&html).meta_content("og:image", MetaKey::Property);
        match image {
            Some(image) if !is_generated_image(&image) => Some(image),
            Some(_) => {
                debug!(repo = %page, "repository has no custom social image");
                None
            }
            None => {
                debug!(repo = %page, "repository page has no og:image");
                None
            }
        }
    }

    async fn resolve_gitlab(&self, path: &str) -> Option<String> {
        let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        let api = format!("{}/api/v4/projects/{}", self.hosts.gitlab_api_base, encoded);
        let (body, _) = self.get_body(&api).await?;
        let project: GitLabProject = match serde_json::from_slice(&body) {
            Ok(project) => project,
            Err(e) => {
                warn!(url = %api, error = %e, "unexpected GitLab project payload");
                return None;
            }
        };
        let avatar = project.avatar_url.filter(|a| !a.trim().is_empty());
        if avatar.is_none() {
            debug!(project = %path, "project has no avatar");
        }
        avatar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn resolver(server: &MockServer) -> RepoImageResolver {
        RepoImageResolver::new(
            reqwest::Client::new(),
            RepoHosts::new(server.base_url(), server.base_url()),
        )
    }

    #[test]
    fn recognizes_repository_urls() {
        assert!(is_repository_url("https://github.com/rust-lang/rust"));
        assert!(is_repository_url("https://www.github.com/rust-lang/rust/issues/1"));
        assert!(is_repository_url("https://gitlab.com/gitlab-org/gitlab/-/issues"));
        assert!(!is_repository_url("https://github.com/rust-lang"));
        assert!(!is_repository_url("https://github.com/features/actions"));
        assert!(!is_repository_url("https://example.com/a/b"));
        assert!(!is_repository_url("not a url"));
    }

    #[test]
    fn parse_extracts_owner_and_path() {
        let hosts = RepoHosts::default();
        assert_eq!(
            hosts.parse("https://github.com/serde-rs/serde.git"),
            Some(RepoRef::GitHub {
                owner: "serde-rs".into(),
                repo: "serde".into()
            })
        );
        assert_eq!(
            hosts.parse("https://gitlab.com/group/sub/project/-/tree/main"),
            Some(RepoRef::GitLab {
                path: "group/sub/project".into()
            })
        );
    }

    #[test]
    fn gitlab_site_routes_are_not_projects() {
        for url in [
            "https://gitlab.com/explore/projects",
            "https://gitlab.com/users/sign_in",
            "https://gitlab.com/dashboard/issues",
            "https://gitlab.com/groups/new",
        ] {
            assert!(!is_repository_url(url), "{}", url);
        }
        assert!(is_repository_url("https://gitlab.com/inkscape/inkscape"));
    }

    #[test]
    fn parse_honors_configured_base_with_port() {
        let hosts = RepoHosts::new("http://127.0.0.1:9000", DEFAULT_GITLAB_API_BASE);
        assert!(hosts.parse("http://127.0.0.1:9000/owner/repo").is_some());
        assert!(hosts.parse("http://127.0.0.1:9001/owner/repo").is_none());
    }

    #[tokio::test]
    async fn github_custom_image_is_returned() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/owner/repo");
            then.status(200).body(
                r#"<meta property="og:image" content="https://repository-images.githubusercontent.com/1/abc">"#,
            );
        });

        let image = resolver(&server)
            .resolve(&RepoRef::GitHub {
                owner: "owner".into(),
                repo: "repo".into(),
            })
            .await;
        mock.assert();
        assert_eq!(
            image.as_deref(),
            Some("https://repository-images.githubusercontent.com/1/abc")
        );
    }

    #[tokio::test]
    async fn github_generated_card_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/owner/repo");
            then.status(200).body(
                r#"<meta property="og:image" content="https://opengraph.githubassets.com/hash/owner/repo">"#,
            );
        });

        let image = resolver(&server)
            .resolve(&RepoRef::GitHub {
                owner: "owner".into(),
                repo: "repo".into(),
            })
            .await;
        assert!(image.is_none());
    }

    #[tokio::test]
    async fn github_lookup_failure_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/owner/repo");
            then.status(503);
        });

        let image = resolver(&server)
            .resolve(&RepoRef::GitHub {
                owner: "owner".into(),
                repo: "repo".into(),
            })
            .await;
        assert!(image.is_none());
    }

    #[tokio::test]
    async fn gitlab_avatar_from_api() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v4/projects/group%2Fproject");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"id": 1, "avatar_url": "https://gitlab.com/uploads/avatar.png"}"#);
        });

        let image = resolver(&server)
            .resolve(&RepoRef::GitLab {
                path: "group/project".into(),
            })
            .await;
        mock.assert();
        assert_eq!(image.as_deref(), Some("https://gitlab.com/uploads/avatar.png"));
    }

    #[tokio::test]
    async fn gitlab_null_avatar_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/projects/group%2Fproject");
            then.status(200).body(r#"{"id": 1, "avatar_url": null}"#);
        });

        let image = resolver(&server)
            .resolve(&RepoRef::GitLab {
                path: "group/project".into(),
            })
            .await;
        assert!(image.is_none());
    }

    #[tokio::test]
    async fn oversized_lookup_body_is_none() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/owner/repo");
            then.status(200)
                .body(vec![b' '; resource::MAX_CONTENT_LENGTH + 1]);
        });

        let image = resolver(&server)
            .resolve(&RepoRef::GitHub {
                owner: "owner".into(),
                repo: "repo".into(),
            })
            .await;
        mock.assert();
        assert!(image.is_none());
    }
}
