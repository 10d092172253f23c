use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Owner and name of a github.com repository.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct ParsedRepo {
    pub owner: String,
    pub repo: String,
}

impl ParsedRepo {
    /// REST API path prefix, e.g. `/repos/foo/bar`.
    pub fn api_path(&self) -> String { format!("/repos/{}/{}", self.owner, self.repo) }

    pub fn url(&self) -> String { format!("https://github.com/{}/{}", self.owner, self.repo) }
}

impl fmt::Display for ParsedRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RepoLinkError {
    #[error("not a github.com link")]
    NotGitHub,
    #[error("expected owner/repo, found {0} path segments")]
    SegmentCount(usize),
    #[error("empty path segment")]
    EmptySegment,
    #[error("invalid characters in {0:?}")]
    InvalidSegment(String),
}

/// Parse a stored repository link into owner and repository name.
///
/// Accepts an optional `http://` or `https://` scheme, an optional `www.`
/// prefix, one trailing slash and a `.git` suffix. The path must consist of
/// exactly two non-empty segments made of characters GitHub allows in names.
pub fn parse_repo_link(link: &str) -> Result<ParsedRepo, RepoLinkError> {
    let link = link.trim();
    let rest =
        link.strip_prefix("https://").or_else(|| link.strip_prefix("http://")).unwrap_or(link);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    let path = rest.strip_prefix("github.com/").ok_or(RepoLinkError::NotGitHub)?;
    let path = path.strip_suffix('/').unwrap_or(path);
    let mut segments = path.split('/');
    let (Some(owner), Some(repo), None) = (segments.next(), segments.next(), segments.next())
    else {
        return Err(RepoLinkError::SegmentCount(path.split('/').count()));
    };
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    for segment in [owner, repo] {
        if segment.is_empty() {
            return Err(RepoLinkError::EmptySegment);
        }
        if !segment.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.')) {
            return Err(RepoLinkError::InvalidSegment(segment.to_string()));
        }
    }
    Ok(ParsedRepo { owner: owner.to_string(), repo: repo.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_link() {
        let ok = |owner: &str, repo: &str| {
            Ok(ParsedRepo { owner: owner.to_string(), repo: repo.to_string() })
        };
        let cases: &[(&str, Result<ParsedRepo, RepoLinkError>)] = &[
            ("https://github.com/foo/bar", ok("foo", "bar")),
            ("http://github.com/foo/bar/", ok("foo", "bar")),
            ("https://www.github.com/foo/bar.git", ok("foo", "bar")),
            ("github.com/foo-org/bar_baz.rs", ok("foo-org", "bar_baz.rs")),
            ("  https://github.com/foo/bar  ", ok("foo", "bar")),
            ("https://gitlab.com/foo/bar", Err(RepoLinkError::NotGitHub)),
            ("not-a-github-url", Err(RepoLinkError::NotGitHub)),
            ("https://github.com/foo", Err(RepoLinkError::SegmentCount(1))),
            ("https://github.com/foo/bar/issues/17", Err(RepoLinkError::SegmentCount(4))),
            ("https://github.com/foo//", Err(RepoLinkError::EmptySegment)),
            ("https://github.com//bar", Err(RepoLinkError::EmptySegment)),
            (
                "https://github.com/foo/bar?tab=readme",
                Err(RepoLinkError::InvalidSegment("bar?tab=readme".to_string())),
            ),
        ];
        for (link, expected) in cases {
            assert_eq!(&parse_repo_link(link), expected, "{link}");
        }
    }

    #[test]
    fn test_paths() {
        let repo = parse_repo_link("https://github.com/foo/bar").unwrap();
        assert_eq!(repo.api_path(), "/repos/foo/bar");
        assert_eq!(repo.url(), "https://github.com/foo/bar");
        assert_eq!(repo.to_string(), "foo/bar");
    }
}
