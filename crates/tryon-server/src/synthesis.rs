//! Client for the hosted try-on model.
//!
//! A prediction is created with the garment image, the body image and a
//! short garment description, then polled until it settles. The output is a
//! URL (or a list of URLs) pointing at the composite image, which is
//! downloaded and returned as bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ServerConfig;

const USER_AGENT: &str = concat!("tryon-server/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Synthesis is not configured (missing API key)")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Prediction {status}: {message}")]
    Failed { status: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Inputs of one synthesis call, as URLs the model can fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub garment_url: String,
    pub body_url: String,
    pub description: String,
}

/// The external image-synthesis service.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Produce the composite image. May take a long time; callers bound it.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes, SynthesisError>;
}

#[derive(Debug, Serialize)]
struct ModelInput<'a> {
    garm_img: &'a str,
    human_img: &'a str,
    garment_des: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePrediction<'a> {
    version: &'a str,
    input: ModelInput<'a>,
}

#[derive(Debug, Clone, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Clone, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl Prediction {
    fn is_settled(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

/// First output URL of a finished prediction: either a plain string or the
/// first string of an array.
fn output_url(output: &serde_json::Value) -> Option<String> {
    match output {
        serde_json::Value::String(url) => Some(url.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(output_url),
        _ => None,
    }
}

pub struct ReplicateSynthesizer {
    http_client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model_version: String,
    poll_interval: Duration,
}

impl ReplicateSynthesizer {
    pub fn new(config: &ServerConfig) -> Result<Self, SynthesisError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http_client,
            api_url: config.replicate_api_url.clone(),
            api_key: config.replicate_api_key.clone(),
            model_version: config.model_version.clone(),
            poll_interval: config.poll_interval,
        })
    }

    async fn create(&self, key: &str, request: &SynthesisRequest) -> Result<Prediction, SynthesisError> {
        let body = CreatePrediction {
            version: &self.model_version,
            input: ModelInput {
                garm_img: &request.garment_url,
                human_img: &request.body_url,
                garment_des: &request.description,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/predictions", self.api_url))
            .bearer_auth(key)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn poll(&self, key: &str, url: &str) -> Result<Prediction, SynthesisError> {
        let response = self.http_client.get(url).bearer_auth(key).send().await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Prediction, SynthesisError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api(status.as_u16(), text));
        }
        response
            .json::<Prediction>()
            .await
            .map_err(|e| SynthesisError::Parse(e.to_string()))
    }

    async fn download(&self, url: &str) -> Result<Bytes, SynthesisError> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Api(status.as_u16(), format!("fetching output {url}")));
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl Synthesizer for ReplicateSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes, SynthesisError> {
        let key = self.api_key.as_deref().ok_or(SynthesisError::NotConfigured)?;

        let mut prediction = self.create(key, request).await?;
        info!(prediction = %prediction.id, status = %prediction.status, "Prediction created");

        while !prediction.is_settled() {
            tokio::time::sleep(self.poll_interval).await;
            let url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .ok_or_else(|| SynthesisError::Parse("prediction has no status URL".into()))?;
            prediction = self.poll(key, &url).await?;
            debug!(prediction = %prediction.id, status = %prediction.status, "Prediction polled");
        }

        if prediction.status != "succeeded" {
            let message = prediction
                .error
                .map(|e| match e {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "no error message".into());
            return Err(SynthesisError::Failed {
                status: prediction.status,
                message,
            });
        }

        let url = prediction
            .output
            .as_ref()
            .and_then(output_url)
            .ok_or_else(|| SynthesisError::Parse("prediction succeeded without output".into()))?;
        let image = self.download(&url).await?;

        info!(prediction = %prediction.id, size = image.len(), "Prediction output downloaded");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_url_shapes() {
        assert_eq!(
            output_url(&json!("https://cdn/out.jpg")).as_deref(),
            Some("https://cdn/out.jpg")
        );
        assert_eq!(
            output_url(&json!(["https://cdn/a.jpg", "https://cdn/b.jpg"])).as_deref(),
            Some("https://cdn/a.jpg")
        );
        assert!(output_url(&json!({"image": 1})).is_none());
        assert!(output_url(&json!([])).is_none());
    }

    #[test]
    fn test_prediction_settled_states() {
        let parse = |status: &str| -> Prediction {
            serde_json::from_value(json!({"id": "p1", "status": status})).unwrap()
        };
        assert!(!parse("starting").is_settled());
        assert!(!parse("processing").is_settled());
        assert!(parse("succeeded").is_settled());
        assert!(parse("failed").is_settled());
        assert!(parse("canceled").is_settled());
    }

    #[test]
    fn test_create_body_wire_shape() {
        let body = CreatePrediction {
            version: "v1",
            input: ModelInput {
                garm_img: "https://host/images/g.jpg",
                human_img: "https://host/images/b.jpg",
                garment_des: "clothing item",
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["version"], "v1");
        assert_eq!(value["input"]["garm_img"], "https://host/images/g.jpg");
        assert_eq!(value["input"]["human_img"], "https://host/images/b.jpg");
        assert_eq!(value["input"]["garment_des"], "clothing item");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let synthesizer = ReplicateSynthesizer::new(&ServerConfig::default()).unwrap();
        let request = SynthesisRequest {
            garment_url: "g".into(),
            body_url: "b".into(),
            description: "d".into(),
        };
        assert!(matches!(
            synthesizer.synthesize(&request).await,
            Err(SynthesisError::NotConfigured)
        ));
    }
}
