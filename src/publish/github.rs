//! Minimal GitHub REST client for repositories, contents, and Pages.

use base64::Engine;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{PagesStatus, PublishError};

const API_VERSION: &str = "2022-11-28";

/// Repository metadata we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutContentResponse {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(concat!("pagesmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build GitHub HTTP client ({}), using defaults", e);
                Client::new()
            });
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, PublishError> {
        self.authorized(builder)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))
    }

    /// Turn a non-success response into the matching error.
    async fn error_for(response: Response) -> PublishError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::Unauthorized(body),
            _ => PublishError::Api {
                status: status.as_u16(),
                message: body,
            },
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PublishError> {
        response
            .json()
            .await
            .map_err(|e| PublishError::Decode(e.to_string()))
    }

    /// Fetch a repository, `None` if it does not exist.
    pub async fn get_repo(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<RepoInfo>, PublishError> {
        let response = self
            .send(self.client.get(self.url(&format!("/repos/{}/{}", owner, repo))))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Self::decode(response).await.map(Some),
            _ => Err(Self::error_for(response).await),
        }
    }

    /// Create a public, empty repository for the authenticated user.
    pub async fn create_repo(
        &self,
        name: &str,
        description: &str,
    ) -> Result<RepoInfo, PublishError> {
        let body = json!({
            "name": name,
            "description": description,
            "private": false,
            "auto_init": false,
        });
        let response = self
            .send(self.client.post(self.url("/user/repos")).json(&body))
            .await?;
        match response.status() {
            s if s.is_success() => Self::decode(response).await,
            StatusCode::UNPROCESSABLE_ENTITY => {
                let message = response.text().await.unwrap_or_default();
                Err(PublishError::NameConflict(message))
            }
            _ => Err(Self::error_for(response).await),
        }
    }

    /// Current blob sha of a file, `None` if the file (or any commit) is absent.
    pub async fn file_sha(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<String>, PublishError> {
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/repos/{}/{}/contents/{}", owner, repo, path))),
            )
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let info: ContentInfo = Self::decode(response).await?;
                Ok(Some(info.sha))
            }
            _ => Err(Self::error_for(response).await),
        }
    }

    /// Create or overwrite a file. Overwrites must carry the current blob sha.
    ///
    /// Returns the sha of the commit that wrote the file.
    pub async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> Result<String, PublishError> {
        let mut body = json!({
            "message": message,
            "content": base64::engine::general_purpose::STANDARD.encode(content),
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }

        let response = self
            .send(
                self.client
                    .put(self.url(&format!("/repos/{}/{}/contents/{}", owner, repo, path)))
                    .json(&body),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let written: PutContentResponse = Self::decode(response).await?;
        Ok(written.commit.sha)
    }

    /// Turn on Pages for `branch`. Never fails; the outcome is reported instead.
    pub async fn enable_pages(&self, owner: &str, repo: &str, branch: &str) -> PagesStatus {
        let body = json!({ "source": { "branch": branch, "path": "/" } });
        let response = match self
            .send(
                self.client
                    .post(self.url(&format!("/repos/{}/{}/pages", owner, repo)))
                    .json(&body),
            )
            .await
        {
            Ok(r) => r,
            Err(e) => return PagesStatus::Failed(e.to_string()),
        };

        match response.status() {
            s if s.is_success() => PagesStatus::Enabled,
            StatusCode::CONFLICT => PagesStatus::AlreadyEnabled,
            status => {
                let body = response.text().await.unwrap_or_default();
                PagesStatus::Failed(format!("{}: {}", status, body))
            }
        }
    }

    /// Sha of the most recent commit on the default branch.
    pub async fn latest_commit(&self, owner: &str, repo: &str) -> Result<String, PublishError> {
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/repos/{}/{}/commits", owner, repo)))
                    .query(&[("per_page", "1")]),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let commits: Vec<CommitRef> = Self::decode(response).await?;
        commits
            .into_iter()
            .next()
            .map(|c| c.sha)
            .ok_or_else(|| PublishError::Decode("Repository has no commits".to_string()))
    }
}
