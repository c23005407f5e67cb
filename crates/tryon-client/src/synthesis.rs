use async_trait::async_trait;
use tracing::info;

use tryon_shared::protocol::{GenerateRequest, GenerateResponse};
use tryon_shared::UserId;

use crate::error::{ClientError, Result};
use crate::http::{error_parts, ApiClient};

/// What the workflow hands to the synthesis backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInputs {
    pub user_id: UserId,
    pub garment_name: String,
    pub body_name: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait SynthesisService: Send + Sync {
    /// Run one synthesis and return the blob name of the composite image.
    async fn generate(&self, inputs: &GenerationInputs) -> Result<String>;
}

/// Calls the server's `/api/generate`, which runs the model and stores the
/// result under the user's result name.
pub struct HttpSynthesisService {
    api: ApiClient,
}

impl HttpSynthesisService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SynthesisService for HttpSynthesisService {
    async fn generate(&self, inputs: &GenerationInputs) -> Result<String> {
        let request = GenerateRequest {
            user_id: inputs.user_id.clone(),
            garment_name: inputs.garment_name.clone(),
            body_name: inputs.body_name.clone(),
            description: inputs.description.clone(),
        };

        let response = self
            .api
            .http()
            .post(self.api.url("/api/generate"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(ClientError::Status { status, message });
        }

        let body: GenerateResponse = response.json().await?;
        info!(job = %body.job_id, file = %body.file_name, "Generation completed on server");
        Ok(body.file_name)
    }
}
