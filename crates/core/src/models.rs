use std::{
    fmt,
    str::FromStr,
    sync::{
        LazyLock, OnceLock,
        atomic::{AtomicU32, Ordering},
    },
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub enum ProjectStatus {
    #[default]
    Pending,
    Active,
    Completed,
}

impl ProjectStatus {
    pub const fn variants() -> &'static [Self] { &[Self::Pending, Self::Active, Self::Completed] }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Completed => "Completed",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Storage identifier: 12 bytes rendered as 24 lowercase hex characters.
///
/// Layout: 4-byte big-endian creation time in seconds, 5 bytes chosen once per
/// process, 3-byte counter seeded randomly.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

static PROCESS_UNIQUE: LazyLock<[u8; 5]> = LazyLock::new(rand::random);
static COUNTER: LazyLock<AtomicU32> = LazyLock::new(|| AtomicU32::new(rand::random()));

impl ProjectId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        let seconds = OffsetDateTime::now_utc().unix_timestamp() as u32;
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl FromStr for ProjectId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(())
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub user_email: String,
    pub repo_link: String,
    pub status: ProjectStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A validated, not yet persisted project.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewProject {
    pub user_email: String,
    pub repo_link: String,
}

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum NewProjectError {
    #[error("userEmail and repoLink are required")]
    MissingFields,
    #[error("Invalid GitHub repository link")]
    InvalidRepoLink,
}

impl NewProject {
    /// Trims both fields and checks them against the project schema.
    pub fn new(user_email: Option<&str>, repo_link: Option<&str>) -> Result<Self, NewProjectError> {
        let user_email = user_email.map(str::trim).unwrap_or_default();
        let repo_link = repo_link.map(str::trim).unwrap_or_default();
        if user_email.is_empty() || repo_link.is_empty() {
            return Err(NewProjectError::MissingFields);
        }
        if !is_github_repo_link(repo_link) {
            return Err(NewProjectError::InvalidRepoLink);
        }
        Ok(Self { user_email: user_email.to_string(), repo_link: repo_link.to_string() })
    }
}

pub fn is_github_repo_link(link: &str) -> bool {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(r"^(https?://)?(www\.)?github\.com/.+/.+$").unwrap())
        .is_match(link)
}
