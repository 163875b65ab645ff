//! # Git URL Normalization
//!
//! Canonical form of repository URLs used as the `repo` label of `app_info`.
//! Different spellings of the same repository must collapse to one label value.

use regex::Regex;
use std::sync::LazyLock;

/// `user@host:path` scp-like SSH syntax (no scheme)
static SCP_LIKE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<user>[a-z0-9._~-]+)@(?P<host>[a-z0-9.-]+):(?P<path>[^/].*)$")
        .expect("Failed to compile SCP_LIKE_URL pattern - this should never happen")
});

/// Normalize a git repository URL for comparison and labeling.
///
/// - surrounding whitespace is trimmed and the URL is lower-cased
/// - scp-like `git@host:org/repo` becomes `ssh://git@host/org/repo`
/// - `user:password@` credentials are stripped from non-SSH URLs
/// - trailing `/` and `.git` suffixes are removed
pub fn normalize_git_url(repo: &str) -> String {
    let repo = repo.trim().to_lowercase();

    let repo = match SCP_LIKE_URL.captures(&repo) {
        Some(caps) => format!("ssh://{}@{}/{}", &caps["user"], &caps["host"], &caps["path"]),
        None => repo,
    };

    let repo = if repo.starts_with("ssh://") {
        repo
    } else {
        strip_credentials(&repo)
    };

    let mut repo = repo.trim_end_matches('/');
    if let Some(stripped) = repo.strip_suffix(".git") {
        repo = stripped;
    }
    repo.to_string()
}

/// Remove the userinfo part of `scheme://userinfo@host/...`
fn strip_credentials(repo: &str) -> String {
    let Some((scheme, rest)) = repo.split_once("://") else {
        return repo.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, path) = rest.split_at(authority_end);
    match authority.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://{host}{path}"),
        None => repo.to_string(),
    }
}
