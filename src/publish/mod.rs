//! Publisher adapter: puts a generated page on GitHub Pages.
//!
//! Publishing is an upsert keyed by task id. An existing repository has its
//! files overwritten in place (read the blob sha, then write); otherwise a new
//! repository is created. Each publish writes exactly three files:
//! `index.html`, `LICENSE`, and `README.md`. Enabling Pages is best-effort.

pub mod documents;
mod github;

pub use github::{GitHubClient, RepoInfo};

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::task::PublishResult;
use documents::{INDEX_PATH, LICENSE_PATH, MIT_LICENSE, README_PATH};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("GitHub rejected credentials: {0}")]
    Unauthorized(String),
    #[error("Repository name conflict could not be resolved: {0}")]
    NameConflict(String),
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("GitHub request failed: {0}")]
    Network(String),
    #[error("Unexpected GitHub response: {0}")]
    Decode(String),
}

/// Outcome of asking the host to serve a repository as a static site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagesStatus {
    Enabled,
    AlreadyEnabled,
    Failed(String),
}

/// Publishes generated application source.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        task_id: &str,
        source: &str,
        brief: &str,
    ) -> Result<PublishResult, PublishError>;
}

/// GitHub repository names allow ASCII letters, digits, `-`, `_`, and `.`.
pub fn repo_name_for(task_id: &str) -> String {
    let trimmed = task_id.trim();
    if trimmed.is_empty() {
        return "app".to_string();
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

pub struct GitHubPublisher {
    github: GitHubClient,
    owner: String,
    settle_delay: Duration,
}

impl GitHubPublisher {
    pub fn new(github: GitHubClient, owner: impl Into<String>, settle_delay: Duration) -> Self {
        Self {
            github,
            owner: owner.into(),
            settle_delay,
        }
    }

    pub fn pages_url(&self, repo: &str) -> String {
        format!("https://{}.github.io/{}/", self.owner, repo)
    }

    /// Existing repository, or a freshly created one.
    async fn ensure_repo(&self, repo: &str, brief: &str) -> Result<RepoInfo, PublishError> {
        if let Some(existing) = self.github.get_repo(&self.owner, repo).await? {
            tracing::info!(repo = %repo, "Updating existing repository");
            return Ok(existing);
        }

        tracing::info!(repo = %repo, "Creating repository");
        match self
            .github
            .create_repo(repo, &documents::repo_description(brief))
            .await
        {
            Ok(created) => Ok(created),
            // Lost a race with another writer; use what is there now.
            Err(PublishError::NameConflict(message)) => self
                .github
                .get_repo(&self.owner, repo)
                .await?
                .ok_or(PublishError::NameConflict(message)),
            Err(e) => Err(e),
        }
    }

    async fn upsert_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
    ) -> Result<String, PublishError> {
        let sha = self.github.file_sha(&self.owner, repo, path).await?;
        let message = match sha {
            Some(_) => format!("Update {}", path),
            None => format!("Add {}", path),
        };
        tracing::debug!(repo = %repo, path = %path, update = sha.is_some(), "Writing file");
        self.github
            .put_file(&self.owner, repo, path, &message, content, sha.as_deref())
            .await
    }
}

#[async_trait]
impl Publisher for GitHubPublisher {
    async fn publish(
        &self,
        task_id: &str,
        source: &str,
        brief: &str,
    ) -> Result<PublishResult, PublishError> {
        let repo = repo_name_for(task_id);
        let info = self.ensure_repo(&repo, brief).await?;

        let readme = documents::render_readme(&repo, task_id, brief, Utc::now());
        for (path, content) in [
            (INDEX_PATH, source),
            (LICENSE_PATH, MIT_LICENSE),
            (README_PATH, readme.as_str()),
        ] {
            self.upsert_file(&repo, path, content).await?;
        }

        let branch = info.default_branch.as_deref().unwrap_or("main");
        match self.github.enable_pages(&self.owner, &repo, branch).await {
            PagesStatus::Enabled => tracing::info!(repo = %repo, "Enabled GitHub Pages"),
            PagesStatus::AlreadyEnabled => {
                tracing::debug!(repo = %repo, "GitHub Pages already enabled")
            }
            PagesStatus::Failed(reason) => {
                tracing::warn!(repo = %repo, "Could not enable GitHub Pages: {}", reason)
            }
        }

        let commit_sha = self.github.latest_commit(&self.owner, &repo).await?;

        if !self.settle_delay.is_zero() {
            tracing::info!(repo = %repo, "Waiting {:?} for Pages to deploy", self.settle_delay);
            tokio::time::sleep(self.settle_delay).await;
        }

        Ok(PublishResult {
            repo_url: info.html_url,
            commit_sha,
            pages_url: self.pages_url(&repo),
        })
    }
}
