use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::memory::EpisodeMemory;

const DEFAULT_API_URL: &str = "https://api.github.com";

/// Store failures callers must be able to branch on: a stale-token write is
/// handled differently from a transport problem.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("version conflict: remote episode memory changed since the last read")]
    VersionConflict,
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Backend {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed memory blob: {0}")]
    Malformed(String),
}

/// Opaque token returned by a read and required by the subsequent write.
/// Absent on the first-ever write. Only this module touches its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken(String);

/// Episode-memory persistence against a contents-API blob backend.
/// Reads return the current version token; writes are conditional on it, so
/// a concurrent second writer fails detectably instead of silently clobbering.
pub struct MemoryStore {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    path: String,
    branch: String,
    token: String,
}

impl MemoryStore {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, MemoryStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Briefcast/0.1.0")
            .build()?;
        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            branch: branch.into(),
            token: token.into(),
        })
    }

    /// Point the store at a different API root (tests use a mock server).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url, self.owner, self.repo, self.path
        )
    }

    /// Read the persisted memory. Backend "not found" is the empty state,
    /// not an error; any other failure propagates.
    pub async fn read(&self) -> Result<(EpisodeMemory, Option<VersionToken>), MemoryStoreError> {
        let response = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.branch.as_str())])
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok((EpisodeMemory::default(), None));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryStoreError::Backend { status, body });
        }

        let contents: ContentsResponse = response.json().await?;

        // The contents API returns base64 with embedded newlines
        let compact: String = contents
            .content
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| MemoryStoreError::Malformed(e.to_string()))?;
        let memory: EpisodeMemory = serde_json::from_slice(&bytes)
            .map_err(|e| MemoryStoreError::Malformed(e.to_string()))?;

        Ok((memory, Some(VersionToken(contents.sha))))
    }

    /// Conditional write presenting the token from the most recent read, or
    /// no token for the first-ever write. A stale token is rejected by the
    /// backend and surfaces as `VersionConflict`; there is no retry loop.
    pub async fn write(
        &self,
        memory: &EpisodeMemory,
        token: Option<&VersionToken>,
    ) -> Result<(), MemoryStoreError> {
        let json = serde_json::to_vec_pretty(memory)
            .map_err(|e| MemoryStoreError::Malformed(e.to_string()))?;

        let body = PutContentsBody {
            message: "Update episode memory",
            content: BASE64.encode(&json),
            branch: &self.branch,
            sha: token.map(|t| t.0.as_str()),
        };

        let response = self
            .client
            .put(self.contents_url())
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(MemoryStoreError::VersionConflict);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryStoreError::Backend { status, body });
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}
