//! HTTP directory client — the concrete authoritative-lookup collaborator.
//!
//! Looks a user up at `GET {base}/users/{username}`; the endpoint returns
//! the workspace record as JSON, or 404 when the user has no entry.

use futures_util::future::BoxFuture;
use gate_cache::{DirectoryClient, DirectoryError};
use gate_core::WorkspaceRecord;
use reqwest::StatusCode;
use tracing::debug;

pub struct HttpDirectoryClient {
    base: String,
    client: reqwest::Client,
}

impl HttpDirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        Self {
            base,
            client: reqwest::Client::new(),
        }
    }
}

impl DirectoryClient for HttpDirectoryClient {
    fn lookup<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, Result<WorkspaceRecord, DirectoryError>> {
        Box::pin(async move {
            let url = format!("{}/users/{}", self.base, username);
            debug!(username, %url, "directory lookup");

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

            if response.status() == StatusCode::NOT_FOUND {
                return Err(DirectoryError::NotFound);
            }
            let response = response
                .error_for_status()
                .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

            response
                .json::<WorkspaceRecord>()
                .await
                .map_err(|e| DirectoryError::Unavailable(e.to_string()))
        })
    }
}
