//! Shared HTTP plumbing for talking to the try-on server.

use std::time::Duration;

use tryon_shared::protocol::ErrorBody;

const USER_AGENT: &str = concat!("tryon-client/", env!("CARGO_PKG_VERSION"));

/// Base URL plus a pooled `reqwest` client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// No overall request timeout is set here: generation can run for
    /// minutes, so callers bound each request themselves.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Status code and message of a non-2xx response. The server answers with
/// `{"error": "..."}`; anything else is returned as raw text.
pub(crate) async fn error_parts(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) => text,
    };
    (status, message)
}
