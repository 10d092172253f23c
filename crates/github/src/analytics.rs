use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::repo::ParsedRepo;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Contributors,
    Commits,
    Languages,
    Collaborators,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contributors => "contributors",
            Self::Commits => "commits",
            Self::Languages => "languages",
            Self::Collaborators => "collaborators",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Everything the dashboard shows for one repository. Built fresh per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub repo: Option<ParsedRepo>,
    pub contributors: Vec<Contributor>,
    pub commits: Vec<CommitSummary>,
    pub languages: Vec<Language>,
    pub collaborators: Vec<Collaborator>,
    /// Endpoints whose request failed and were left empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<Endpoint>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub contributions: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    #[serde(default)]
    pub id: Option<u64>,
    pub login: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CommitSummary {
    pub sha: String,
    pub author: Option<String>,
    pub message: Option<String>,
    pub date: Option<String>,
    pub html_url: Option<String>,
}

impl CommitSummary {
    /// First line of the commit message.
    pub fn title(&self) -> Option<&str> {
        self.message.as_deref().and_then(|m| m.lines().next()).filter(|l| !l.is_empty())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Language {
    pub name: String,
    pub bytes: u64,
}

// Wire shapes of `GET /repos/{owner}/{repo}/commits`, reduced to what we display.
#[derive(Deserialize)]
pub(crate) struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct RawCommitDetail {
    #[serde(default)]
    author: Option<RawCommitAuthor>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct RawCommitAuthor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl From<RawCommit> for CommitSummary {
    fn from(raw: RawCommit) -> Self {
        let (author, date) = match raw.commit.author {
            Some(author) => (author.name, author.date),
            None => (None, None),
        };
        Self {
            sha: raw.sha,
            author: author.filter(|n| !n.is_empty()),
            message: raw.commit.message.filter(|m| !m.is_empty()),
            date,
            html_url: raw.html_url,
        }
    }
}

/// Largest share first; ties by name.
pub(crate) fn sort_languages(languages: HashMap<String, u64>) -> Vec<Language> {
    let mut out =
        languages.into_iter().map(|(name, bytes)| Language { name, bytes }).collect::<Vec<_>>();
    out.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.name.cmp(&b.name)));
    out
}
