//! Generation state machine.
//!
//! ```text
//! Idle ──inputs present──▶ Ready ──generate()──▶ Generating ──▶ Succeeded
//!   ▲                        ▲                        │
//!   └────────reset()─────────┴──acknowledge()──── Failed ◀┘ (error / timeout)
//! ```
//!
//! The in-flight guard lives in the state itself: while the state is
//! `Generating`, every further `generate()` is rejected without touching the
//! synthesis service, whoever the caller is.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use tryon_shared::naming;
use tryon_shared::UserId;

use crate::error::WorkflowError;
use crate::synthesis::{GenerationInputs, SynthesisService};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    /// Waiting for a body photo and a garment.
    #[default]
    Idle,
    Ready,
    Generating,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub file_name: String,
    pub display_url: String,
}

#[derive(Debug, Default)]
struct Inner {
    state: GenerationState,
    body: Option<String>,
    garment: Option<String>,
    result: Option<GenerationResult>,
    error: Option<String>,
}

impl Inner {
    /// Recompute Idle/Ready from the inputs. Other states are left alone.
    fn settle(&mut self) {
        if matches!(self.state, GenerationState::Idle | GenerationState::Ready) {
            self.state = if self.body.is_some() && self.garment.is_some() {
                GenerationState::Ready
            } else {
                GenerationState::Idle
            };
        }
    }

    fn missing_inputs(&self) -> String {
        match (&self.body, &self.garment) {
            (None, None) => "select a body photo and upload a garment".into(),
            (None, Some(_)) => "select a body photo".into(),
            (Some(_), None) => "upload a garment".into(),
            (Some(_), Some(_)) => "inputs not ready".into(),
        }
    }
}

pub struct GenerationWorkflow {
    user: UserId,
    service: Arc<dyn SynthesisService>,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl GenerationWorkflow {
    pub fn new(user: UserId, service: Arc<dyn SynthesisService>, timeout: Duration) -> Self {
        Self {
            user,
            service,
            timeout,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> GenerationState {
        self.lock().state
    }

    pub fn result(&self) -> Option<GenerationResult> {
        self.lock().result.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn body_photo(&self) -> Option<String> {
        self.lock().body.clone()
    }

    pub fn garment(&self) -> Option<String> {
        self.lock().garment.clone()
    }

    /// Blob name of the body photo to dress, or `None` to clear it.
    pub fn select_body_photo(&self, name: Option<String>) {
        let mut inner = self.lock();
        inner.body = name;
        inner.settle();
    }

    pub fn set_garment(&self, name: Option<String>) {
        let mut inner = self.lock();
        inner.garment = name;
        inner.settle();
    }

    /// Run one synthesis. Only valid from `Ready`; the call is bounded by
    /// the workflow timeout and always leaves `Generating`.
    pub async fn generate(
        &self,
        description: Option<String>,
    ) -> Result<GenerationResult, WorkflowError> {
        let inputs = {
            let mut inner = self.lock();
            match inner.state {
                GenerationState::Generating => {
                    warn!(user = %self.user, "Generate requested while already generating");
                    return Err(WorkflowError::AlreadyGenerating);
                }
                GenerationState::Ready => {}
                GenerationState::Succeeded | GenerationState::Failed => {
                    return Err(WorkflowError::NotReady);
                }
                GenerationState::Idle => {
                    return Err(WorkflowError::ValidationFailure(inner.missing_inputs()));
                }
            }
            let (Some(body_name), Some(garment_name)) = (inner.body.clone(), inner.garment.clone())
            else {
                return Err(WorkflowError::ValidationFailure(inner.missing_inputs()));
            };

            inner.state = GenerationState::Generating;
            inner.result = None;
            inner.error = None;
            GenerationInputs {
                user_id: self.user.clone(),
                garment_name,
                body_name,
                description,
            }
        };

        info!(user = %self.user, body = %inputs.body_name, "Generation started");
        let mut flight = Flight {
            workflow: self,
            landed: false,
        };
        let outcome = tokio::time::timeout(self.timeout, self.service.generate(&inputs)).await;
        flight.landed = true;

        let mut inner = self.lock();
        match outcome {
            Ok(Ok(file_name)) => {
                let result = GenerationResult {
                    display_url: naming::display_url(&file_name, naming::freshness_token()),
                    file_name,
                };
                info!(user = %self.user, file = %result.file_name, "Generation succeeded");
                inner.state = GenerationState::Succeeded;
                inner.result = Some(result.clone());
                Ok(result)
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                warn!(user = %self.user, error = %message, "Generation failed");
                inner.state = GenerationState::Failed;
                inner.error = Some(message.clone());
                Err(WorkflowError::Upstream(message))
            }
            Err(_) => {
                let secs = self.timeout.as_secs();
                warn!(user = %self.user, timeout_secs = secs, "Generation timed out");
                inner.state = GenerationState::Failed;
                inner.error = Some(format!("timed out after {secs}s"));
                Err(WorkflowError::Timeout(secs))
            }
        }
    }

    /// Leave `Succeeded`/`Failed`, keeping inputs and any result.
    pub fn acknowledge(&self) {
        let mut inner = self.lock();
        if matches!(
            inner.state,
            GenerationState::Succeeded | GenerationState::Failed
        ) {
            inner.state = GenerationState::Idle;
            inner.error = None;
            inner.settle();
        }
    }

    /// Discard the result and the garment selection. The body selection
    /// stays.
    pub fn reset(&self) -> Result<(), WorkflowError> {
        let mut inner = self.lock();
        if inner.state == GenerationState::Generating {
            return Err(WorkflowError::AlreadyGenerating);
        }
        inner.result = None;
        inner.error = None;
        inner.garment = None;
        inner.state = GenerationState::Idle;
        inner.settle();
        Ok(())
    }
}

/// Moves the workflow to `Failed` if a generation is dropped mid-flight.
struct Flight<'a> {
    workflow: &'a GenerationWorkflow,
    landed: bool,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if self.landed {
            return;
        }
        let mut inner = self.workflow.lock();
        if inner.state == GenerationState::Generating {
            warn!(user = %self.workflow.user, "Generation abandoned");
            inner.state = GenerationState::Failed;
            inner.error = Some("generation cancelled".into());
        }
    }
}
