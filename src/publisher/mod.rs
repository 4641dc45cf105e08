use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::publisher::model::{AppEdit, CommitResponse, Track};

pub mod model;

const PUBLISHER_API_BASE: &str = "https://androidpublisher.googleapis.com/";

/// Edit-transaction operations of the Android Publisher API.
#[async_trait]
pub trait PublisherService: Send + Sync {
    async fn insert_edit(&self, package_name: &str) -> Result<AppEdit>;

    async fn get_track(&self, package_name: &str, edit_id: &str, track: &str) -> Result<Track>;

    /// Replace the content of `track.track` inside the edit.
    async fn update_track(&self, package_name: &str, edit_id: &str, track: &Track)
        -> Result<Track>;

    async fn commit_edit(&self, package_name: &str, edit_id: &str) -> Result<CommitResponse>;

    async fn delete_edit(&self, package_name: &str, edit_id: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct PublisherClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for PublisherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PublisherClient {
    pub fn new(token: String) -> Result<Self> {
        let base_url = Url::parse(PUBLISHER_API_BASE).context("invalid publisher base URL")?;
        Self::with_base_url(token, base_url)
    }

    pub fn with_base_url(token: String, base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("play-promote/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// `androidpublisher/v3/applications/{package}/edits/{tail..}` under the
    /// base URL. Each segment is percent-encoded on its own.
    pub fn edits_url(&self, package_name: &str, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("publisher base URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(["androidpublisher", "v3", "applications", package_name, "edits"])
            .extend(tail);
        Ok(url)
    }

    pub fn build_request(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let mut builder = self
            .http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json");
        builder = match body {
            Some(body) => builder.json(body),
            // Google front ends reject body-less POSTs without a length.
            None => builder.header("Content-Length", "0"),
        };
        builder.build().context("failed to build publisher request")
    }

    async fn execute(&self, operation: &str, request: reqwest::Request) -> Result<Response> {
        debug!(method = %request.method(), url = %request.url(), operation, "sending publisher request");
        let res = self
            .http
            .execute(request)
            .await
            .with_context(|| format!("{} failed to reach publisher API", operation))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("{} error {}: {}", operation, status, body));
        }
        Ok(res)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::Request,
    ) -> Result<T> {
        let res = self.execute(operation, request).await?;
        res.json::<T>()
            .await
            .with_context(|| format!("invalid {} response", operation))
    }
}

#[async_trait]
impl PublisherService for PublisherClient {
    async fn insert_edit(&self, package_name: &str) -> Result<AppEdit> {
        let url = self.edits_url(package_name, &[])?;
        let request = self.build_request(Method::POST, url, None)?;
        self.execute_json("edits.insert", request).await
    }

    async fn get_track(&self, package_name: &str, edit_id: &str, track: &str) -> Result<Track> {
        let url = self.edits_url(package_name, &[edit_id, "tracks", track])?;
        let request = self.build_request(Method::GET, url, None)?;
        self.execute_json("edits.tracks.get", request).await
    }

    async fn update_track(
        &self,
        package_name: &str,
        edit_id: &str,
        track: &Track,
    ) -> Result<Track> {
        let url = self.edits_url(package_name, &[edit_id, "tracks", track.track.as_str()])?;
        let body = serde_json::to_value(track).context("failed to encode track")?;
        let request = self.build_request(Method::PUT, url, Some(&body))?;
        self.execute_json("edits.tracks.update", request).await
    }

    async fn commit_edit(&self, package_name: &str, edit_id: &str) -> Result<CommitResponse> {
        let url = self.edits_url(package_name, &[format!("{}:commit", edit_id).as_str()])?;
        let request = self.build_request(Method::POST, url, None)?;
        let res = self.execute("edits.commit", request).await?;
        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read edits.commit response")?;
        Ok(CommitResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            edit_id: parse_commit_body(&body)?,
        })
    }

    async fn delete_edit(&self, package_name: &str, edit_id: &str) -> Result<()> {
        let url = self.edits_url(package_name, &[edit_id])?;
        let request = self.build_request(Method::DELETE, url, None)?;
        self.execute("edits.delete", request).await?;
        Ok(())
    }
}

/// Extract the committed edit id; an empty body means no id.
pub fn parse_commit_body(body: &str) -> Result<Option<String>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let edit: AppEdit = serde_json::from_str(body).context("invalid edits.commit response")?;
    Ok(edit.id.filter(|id| !id.is_empty()))
}
