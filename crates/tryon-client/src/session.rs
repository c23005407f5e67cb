//! One user's try-on session: the photo set as last seen, the selected body
//! photo and the generation workflow, kept consistent with each other.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};

use tryon_shared::UserId;
use tryon_store::{BlobStore, BodyPhotoSlot, GarmentSlot, PhotoSet, PhotoSetError, PhotoSetManager};

use crate::error::{ClientError, Result};
use crate::synthesis::SynthesisService;
use crate::workflow::{GenerationResult, GenerationWorkflow};

pub struct TryOnSession {
    user: UserId,
    photos: PhotoSetManager,
    workflow: GenerationWorkflow,
    view: PhotoSet,
    /// Index of the selected body photo in `view`.
    selected: Option<u8>,
}

/// Where the selection goes after slot `deleted` is removed and the rest
/// shift down. A deleted selection falls back to the first photo.
fn remap_selection(selected: Option<u8>, deleted: u8, remaining: usize) -> Option<u8> {
    match selected {
        Some(s) if s == deleted => (remaining > 0).then_some(1),
        Some(s) if s > deleted => Some(s - 1),
        other => other,
    }
}

impl TryOnSession {
    pub fn new(
        user: UserId,
        store: Arc<dyn BlobStore>,
        synthesis: Arc<dyn SynthesisService>,
        generate_timeout: Duration,
    ) -> Self {
        Self {
            workflow: GenerationWorkflow::new(user.clone(), synthesis, generate_timeout),
            photos: PhotoSetManager::new(store),
            view: PhotoSet::default(),
            selected: None,
            user,
        }
    }

    /// Create a session and load the user's photos.
    pub async fn open(
        user: UserId,
        store: Arc<dyn BlobStore>,
        synthesis: Arc<dyn SynthesisService>,
        generate_timeout: Duration,
    ) -> Result<Self> {
        let mut session = Self::new(user, store, synthesis, generate_timeout);
        session.load().await?;
        Ok(session)
    }

    /// Re-read the photo set from storage. The selection survives when its
    /// slot still exists, otherwise the first photo is selected.
    pub async fn load(&mut self) -> Result<()> {
        self.view = self.photos.list_slots(&self.user).await?;
        self.selected = match self.selected {
            Some(i) if self.view.body.iter().any(|s| s.index == i) => Some(i),
            _ => self.view.body.first().map(|s| s.index),
        };
        self.sync_body();
        self.workflow
            .set_garment(self.view.garment.as_ref().map(|g| g.blob_name.clone()));

        info!(
            user = %self.user,
            body = self.view.body.len(),
            garment = self.view.garment.is_some(),
            "Photo set loaded"
        );
        Ok(())
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn photo_set(&self) -> &PhotoSet {
        &self.view
    }

    pub fn workflow(&self) -> &GenerationWorkflow {
        &self.workflow
    }

    pub fn selected(&self) -> Option<&BodyPhotoSlot> {
        let index = self.selected?;
        self.view.body.iter().find(|s| s.index == index)
    }

    pub fn select(&mut self, index: u8) -> Result<()> {
        if !self.view.body.iter().any(|s| s.index == index) {
            return Err(ClientError::NoSuchPhoto(index));
        }
        self.selected = Some(index);
        self.sync_body();
        Ok(())
    }

    fn sync_body(&self) {
        self.workflow
            .select_body_photo(self.selected().map(|s| s.blob_name.clone()));
    }

    /// Upload a body photo. The new photo becomes the selection.
    pub async fn add_body_photo(&mut self, data: Bytes) -> Result<BodyPhotoSlot> {
        let slot = self.photos.add_body_photo(&self.user, data).await?;
        self.view = self.photos.list_slots(&self.user).await?;
        self.selected = Some(slot.index);
        self.sync_body();
        Ok(slot)
    }

    /// Delete the body photo at `index`; later photos move down by one.
    ///
    /// On a partial renumbering failure the view is re-read from storage
    /// before the error is returned, so it never shows a stale layout.
    pub async fn delete_body_photo(&mut self, index: u8) -> Result<()> {
        match self
            .photos
            .delete_body_photo(&self.user, &self.view.body, index)
            .await
        {
            Ok(body) => {
                self.selected = remap_selection(self.selected, index, body.len());
                self.view.body = body;
                self.sync_body();
                Ok(())
            }
            Err(e @ PhotoSetError::PartialRenameFailure { .. }) => {
                warn!(user = %self.user, error = %e, "Renumbering interrupted, re-reading photo set");
                if let Err(reload) = self.load().await {
                    warn!(user = %self.user, error = %reload, "Re-read after failed renumbering also failed");
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_garment(&mut self, data: Bytes) -> Result<GarmentSlot> {
        let slot = self.photos.set_garment_photo(&self.user, data).await?;
        self.view.garment = Some(slot.clone());
        self.workflow.set_garment(Some(slot.blob_name.clone()));
        Ok(slot)
    }

    pub async fn remove_garment(&mut self) -> Result<()> {
        self.photos.remove_garment_photo(&self.user).await?;
        self.view.garment = None;
        self.workflow.set_garment(None);
        Ok(())
    }

    pub async fn generate(&self, description: Option<String>) -> Result<GenerationResult> {
        Ok(self.workflow.generate(description).await?)
    }

    pub fn acknowledge(&self) {
        self.workflow.acknowledge();
    }

    /// Drop the result and the garment selection. Stored photos are kept;
    /// [`load`](Self::load) picks a stored garment up again.
    pub fn reset(&mut self) -> Result<()> {
        self.workflow.reset()?;
        self.view.garment = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use tryon_shared::naming;
    use tryon_store::MemoryBlobStore;

    use crate::error::WorkflowError;
    use crate::synthesis::GenerationInputs;
    use crate::workflow::GenerationState;

    const USER: &str = "user_s3ss10n00";

    struct EchoService;

    #[async_trait]
    impl SynthesisService for EchoService {
        async fn generate(&self, inputs: &GenerationInputs) -> Result<String> {
            Ok(naming::result_name(&inputs.user_id))
        }
    }

    fn user() -> UserId {
        UserId::parse(USER).unwrap()
    }

    async fn session_with(store: Arc<MemoryBlobStore>) -> TryOnSession {
        TryOnSession::open(user(), store, Arc::new(EchoService), Duration::from_secs(5))
            .await
            .unwrap()
    }

    async fn session_with_abc() -> (TryOnSession, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        let mut session = session_with(store.clone()).await;
        for photo in ["A", "B", "C"] {
            session.add_body_photo(Bytes::from(photo)).await.unwrap();
        }
        (session, store)
    }

    async fn content_of(store: &MemoryBlobStore, slot: &BodyPhotoSlot) -> Bytes {
        store.get(&slot.blob_name).await.unwrap()
    }

    #[test]
    fn test_remap_selection() {
        assert_eq!(remap_selection(Some(1), 1, 2), Some(1));
        assert_eq!(remap_selection(Some(1), 1, 0), None);
        assert_eq!(remap_selection(Some(3), 1, 2), Some(2));
        assert_eq!(remap_selection(Some(1), 2, 2), Some(1));
        assert_eq!(remap_selection(None, 1, 2), None);
    }

    #[tokio::test]
    async fn test_upload_selects_new_photo() {
        let (session, store) = session_with_abc().await;
        let selected = session.selected().unwrap();
        assert_eq!(selected.index, 3);
        assert_eq!(content_of(&store, selected).await, Bytes::from("C"));
        assert_eq!(session.photo_set().indices(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fourth_upload_rejected() {
        let (mut session, store) = session_with_abc().await;
        let before = store.names().await;

        let err = session.add_body_photo(Bytes::from("D")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::PhotoSet(PhotoSetError::CapacityExceeded { max: 3 })
        ));
        assert_eq!(store.names().await, before);
        assert_eq!(session.photo_set().indices(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_selected_first_moves_selection_to_next_photo() {
        let (mut session, store) = session_with_abc().await;
        session.select(1).unwrap();

        session.delete_body_photo(1).await.unwrap();

        assert_eq!(session.photo_set().indices(), vec![1, 2]);
        let selected = session.selected().unwrap();
        assert_eq!(selected.index, 1);
        assert_eq!(content_of(&store, selected).await, Bytes::from("B"));
        assert_eq!(
            session.workflow().body_photo(),
            Some(naming::name_for(&user(), tryon_shared::SlotKind::Body, 1))
        );
    }

    #[tokio::test]
    async fn test_selection_follows_photo_that_shifts_down() {
        let (mut session, store) = session_with_abc().await;
        session.select(3).unwrap();

        session.delete_body_photo(1).await.unwrap();

        let selected = session.selected().unwrap();
        assert_eq!(selected.index, 2);
        assert_eq!(content_of(&store, selected).await, Bytes::from("C"));
    }

    #[tokio::test]
    async fn test_partial_rename_failure_resyncs_view() {
        let (mut session, store) = session_with_abc().await;
        store
            .fail_copy_to(&naming::name_for(&user(), tryon_shared::SlotKind::Body, 2))
            .await;

        let err = session.delete_body_photo(1).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::PhotoSet(PhotoSetError::PartialRenameFailure { .. })
        ));

        store.clear_faults().await;
        let fresh = session.photos.list_slots(&user()).await.unwrap();
        assert_eq!(session.photo_set().indices(), fresh.indices());
        assert!(session.selected().is_some());
    }

    #[tokio::test]
    async fn test_select_missing_index() {
        let store = Arc::new(MemoryBlobStore::new());
        let mut session = session_with(store).await;
        assert!(matches!(session.select(1), Err(ClientError::NoSuchPhoto(1))));
    }

    #[tokio::test]
    async fn test_generate_and_reset() {
        let (mut session, store) = session_with_abc().await;
        assert_eq!(session.workflow().state(), GenerationState::Idle);

        session.set_garment(Bytes::from("shirt")).await.unwrap();
        assert_eq!(session.workflow().state(), GenerationState::Ready);

        let result = session.generate(None).await.unwrap();
        assert_eq!(result.file_name, naming::result_name(&user()));
        assert_eq!(session.workflow().state(), GenerationState::Succeeded);

        session.reset().unwrap();
        assert_eq!(session.workflow().state(), GenerationState::Idle);
        // View and workflow agree that no garment is selected.
        assert!(session.photo_set().garment.is_none());
        assert!(session.workflow().garment().is_none());
        assert!(matches!(
            session.generate(None).await,
            Err(ClientError::Workflow(WorkflowError::ValidationFailure(_)))
        ));

        // The stored garment and body photos are untouched.
        let garment = naming::name_for(&user(), tryon_shared::SlotKind::Cloth, 1);
        assert!(store.names().await.contains(&garment));
        assert_eq!(session.photo_set().body.len(), 3);

        // Re-reading storage brings the stored garment back.
        session.load().await.unwrap();
        assert_eq!(
            session.photo_set().garment.as_ref().map(|g| g.blob_name.clone()),
            Some(garment.clone())
        );
        assert_eq!(session.workflow().garment(), Some(garment));
        assert_eq!(session.workflow().state(), GenerationState::Ready);
    }

    #[tokio::test]
    async fn test_load_picks_up_existing_photos() {
        let (_, store) = session_with_abc().await;
        store
            .put(
                &naming::name_for(&user(), tryon_shared::SlotKind::Cloth, 1),
                Bytes::from("shirt"),
            )
            .await
            .unwrap();

        let session = session_with(store).await;
        assert_eq!(session.photo_set().indices(), vec![1, 2, 3]);
        assert_eq!(session.selected().map(|s| s.index), Some(1));
        assert_eq!(session.workflow().state(), GenerationState::Ready);
    }
}
