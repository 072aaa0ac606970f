//! REST implementation of [`RemoteStore`] on top of reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{ApiResponse, RemoteError, RemoteStore, ENVELOPE_CONTENT_TYPE, PAGE_SIZE};
use crate::clip::Clip;

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

/// Client for the `/clips` endpoint set
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    clips_url: Url,
}

impl HttpRemoteStore {
    /// Build a client for the API rooted at `base_url` (e.g. `https://host/api`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    /// Build on top of an existing reqwest client
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, RemoteError> {
        let raw = format!("{}/clips", base_url.trim_end_matches('/'));
        let clips_url = Url::parse(&raw).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        if clips_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(raw));
        }
        Ok(Self { client, clips_url })
    }

    /// URL of the collection endpoint
    pub fn clips_url(&self) -> &Url {
        &self.clips_url
    }

    fn clip_url(&self, id: &str) -> Result<Url, RemoteError> {
        let mut url = self.clips_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.clips_url.to_string()))?
            .push(id);
        Ok(url)
    }
}

/// Validate status and declared content type, then decode the envelope.
/// Status alone is not trusted: SPA dev servers and proxies answer unknown
/// routes with `200 text/html`.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let is_envelope = content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains(ENVELOPE_CONTENT_TYPE));
    if !is_envelope {
        return Err(RemoteError::ContentType(content_type));
    }

    let body = response.bytes().await?;
    let envelope: ApiResponse<T> = serde_json::from_slice(&body)?;
    envelope.into_result()
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn list(&self) -> Result<Vec<Clip>, RemoteError> {
        let response = self.client.get(self.clips_url.clone()).send().await?;
        let mut clips: Vec<Clip> = read_envelope(response).await?.unwrap_or_default();
        clips.truncate(PAGE_SIZE);
        debug!("Fetched {} clips from remote store", clips.len());
        Ok(clips)
    }

    async fn create(&self, content: &str, note: Option<String>) -> Result<Clip, RemoteError> {
        let clip = Clip::new(content, note);
        let response = self
            .client
            .post(self.clips_url.clone())
            .json(&clip)
            .send()
            .await?;
        // The body carries no data the client needs; it already holds the
        // authoritative copy it generated.
        read_envelope::<serde_json::Value>(response).await?;
        debug!("Created clip {}", clip.id);
        Ok(clip)
    }

    async fn update(
        &self,
        id: &str,
        content: &str,
        note: Option<String>,
    ) -> Result<(), RemoteError> {
        let body = UpdateBody {
            content,
            note: note.as_deref(),
        };
        let response = self.client.put(self.clip_url(id)?).json(&body).send().await?;
        read_envelope::<serde_json::Value>(response).await?;
        debug!("Updated clip {}", id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let response = self.client.delete(self.clip_url(id)?).send().await?;
        read_envelope::<serde_json::Value>(response).await?;
        debug!("Deleted clip {}", id);
        Ok(())
    }
}
