pub mod analytics;
pub mod repo;

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use codecollab_core::config::GitHubConfig;
use http::{HeaderMap, HeaderValue, header};
use octocrab::{Octocrab, service::middleware::retry::RetryConfig};
use serde::de::DeserializeOwned;

pub use crate::{
    analytics::{AnalyticsSnapshot, Collaborator, CommitSummary, Contributor, Endpoint, Language},
    repo::{ParsedRepo, RepoLinkError, parse_repo_link},
};
use crate::analytics::{RawCommit, sort_languages};

/// Commits requested per analytics refresh. Only the first page is fetched.
pub const COMMITS_PER_PAGE: u8 = 30;

#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
}

#[derive(serde::Serialize)]
struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    per_page: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

impl GitHub {
    pub async fn new(config: &GitHubConfig) -> Result<Arc<Self>> {
        let mut builder = Octocrab::builder()
            .base_uri(config.api_url.as_str())
            .context("Invalid GitHub API URL")?
            // Failed endpoints degrade to empty results instead
            .add_retry_config(RetryConfig::None);
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
            tracing::info!("GitHub: using configured token");
        } else {
            tracing::info!("GitHub: no token configured, using anonymous rate limits");
        }
        let client = builder.build().context("Failed to create GitHub client")?;
        Ok(Arc::new(Self { client }))
    }

    /// Fetch analytics for a stored repository link.
    ///
    /// A link that does not name exactly one repository yields an empty
    /// snapshot and no requests are made.
    pub async fn fetch_analytics(&self, repo_link: &str) -> AnalyticsSnapshot {
        match parse_repo_link(repo_link) {
            Ok(repo) => self.fetch_repo_analytics(&repo).await,
            Err(e) => {
                tracing::warn!("Skipping analytics for {:?}: {}", repo_link, e);
                AnalyticsSnapshot::default()
            }
        }
    }

    /// Issue the four analytics requests concurrently. Each failed request
    /// leaves its section empty and is recorded in [`AnalyticsSnapshot::degraded`].
    pub async fn fetch_repo_analytics(&self, repo: &ParsedRepo) -> AnalyticsSnapshot {
        let base = repo.api_path();
        let mut collaborator_headers = HeaderMap::new();
        collaborator_headers
            .insert(header::ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let commit_params = PageParams { per_page: Some(COMMITS_PER_PAGE), page: None };
        let (contributors, commits, languages, collaborators) = tokio::join!(
            self.get::<Vec<Contributor>>(format!("{base}/contributors"), None, None),
            self.get::<Vec<RawCommit>>(
                format!("{base}/commits"),
                Some(&commit_params),
                None,
            ),
            self.get::<HashMap<String, u64>>(format!("{base}/languages"), None, None),
            self.get::<Vec<Collaborator>>(
                format!("{base}/collaborators"),
                None,
                Some(collaborator_headers),
            ),
        );

        let mut snapshot = AnalyticsSnapshot { repo: Some(repo.clone()), ..Default::default() };
        let degraded = &mut snapshot.degraded;
        snapshot.contributors = settle(repo, Endpoint::Contributors, contributors, degraded);
        snapshot.commits = settle(repo, Endpoint::Commits, commits, degraded)
            .into_iter()
            .map(CommitSummary::from)
            .collect();
        snapshot.languages = sort_languages(settle(repo, Endpoint::Languages, languages, degraded));
        snapshot.collaborators = settle(repo, Endpoint::Collaborators, collaborators, degraded);
        tracing::debug!(
            "Fetched analytics for {}: {} contributors, {} commits, {} languages, {} collaborators",
            repo,
            snapshot.contributors.len(),
            snapshot.commits.len(),
            snapshot.languages.len(),
            snapshot.collaborators.len(),
        );
        snapshot
    }

    async fn get<T: DeserializeOwned>(
        &self,
        route: String,
        params: Option<&PageParams>,
        headers: Option<HeaderMap>,
    ) -> octocrab::Result<T> {
        self.client.get_with_headers(route, params, headers).await
    }
}

fn settle<T: Default>(
    repo: &ParsedRepo,
    endpoint: Endpoint,
    result: octocrab::Result<T>,
    degraded: &mut Vec<Endpoint>,
) -> T {
    match result {
        Ok(value) => value,
        Err(octocrab::Error::GitHub { source, .. }) => {
            tracing::warn!(
                "GitHub {} for {} failed with {}: {}",
                endpoint,
                repo,
                source.status_code,
                source.message
            );
            degraded.push(endpoint);
            T::default()
        }
        Err(e) => {
            tracing::warn!("GitHub {} for {} failed: {}", endpoint, repo, e);
            degraded.push(endpoint);
            T::default()
        }
    }
}
