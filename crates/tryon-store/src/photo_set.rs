//! Per-user photo-set lifecycle.
//!
//! A user owns up to [`MAX_BODY_SLOTS`] body photos stored at
//! `{user}-body1.jpg ..= {user}-bodyN.jpg` with no gaps, and at most one
//! garment photo at `{user}-cloth1.jpg`. The store underneath is a flat key
//! space without transactions or renames, so every multi-step change is
//! sequenced here.
//!
//! One logical writer per user is assumed; callers serialize mutations of
//! the same user at a higher layer.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use tryon_shared::constants::MAX_BODY_SLOTS;
use tryon_shared::naming;
use tryon_shared::types::{SlotKind, UserId};

use crate::blob::BlobStore;
use crate::error::{BlobError, PhotoSetError, Result};
use crate::models::{is_contiguous, BodyPhotoSlot, GarmentSlot, PhotoSet};
use crate::renumber::{RenameStep, RenumberSaga};

pub struct PhotoSetManager {
    store: Arc<dyn BlobStore>,
    /// Old names whose delete failed after a successful copy. They duplicate
    /// a live slot, are hidden from listings and deleted again on the next
    /// listing.
    stale: Mutex<HashMap<UserId, BTreeSet<String>>>,
}

impl PhotoSetManager {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            stale: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Read the user's slots from the store.
    ///
    /// Names that do not parse are ignored. An empty store yields an empty
    /// set.
    pub async fn list_slots(&self, user: &UserId) -> Result<PhotoSet> {
        self.collect_stale(user).await;
        let hidden = self.stale_names(user).await;

        let names = self.store.list(&naming::user_prefix(user)).await?;

        let mut body = BTreeMap::new();
        let mut garment = None;
        for name in names {
            if !naming::belongs_to(&name, user) || hidden.contains(&name) {
                continue;
            }
            let Some(parsed) = naming::parse(&name) else {
                debug!(user = %user, name = %name, "Ignoring foreign blob");
                continue;
            };
            match parsed.kind {
                SlotKind::Body => {
                    body.entry(parsed.index).or_insert(name);
                }
                SlotKind::Cloth => {
                    garment.get_or_insert(name);
                }
            }
        }

        Ok(PhotoSet {
            body: body
                .into_iter()
                .map(|(index, name)| BodyPhotoSlot::from_name(index, name))
                .collect(),
            garment: garment.map(GarmentSlot::from_name),
        })
    }

    /// Store a new body photo in the next free slot.
    ///
    /// Fails with `CapacityExceeded` before writing anything when all slots
    /// are taken. If the stored set has a gap (left by an interrupted
    /// renumbering) it is compacted first so the new photo lands at
    /// `count + 1` without overwriting anything.
    pub async fn add_body_photo(&self, user: &UserId, data: Bytes) -> Result<BodyPhotoSlot> {
        let set = self.list_slots(user).await?;
        if set.body.len() >= usize::from(MAX_BODY_SLOTS) {
            return Err(PhotoSetError::CapacityExceeded {
                max: MAX_BODY_SLOTS,
            });
        }

        let body = if set.is_contiguous() {
            set.body
        } else {
            warn!(user = %user, indices = ?set.indices(), "Compacting body photos before add");
            self.renumber(user, set.body).await?
        };

        let index = body.len() as u8 + 1;
        let slot = BodyPhotoSlot::canonical(user, index);
        self.store.put(&slot.blob_name, data).await?;
        self.forget_stale(user, &slot.blob_name).await;

        info!(user = %user, index, name = %slot.blob_name, "Body photo added");
        Ok(slot)
    }

    /// Delete the body photo at `index` and renumber the rest.
    ///
    /// `slots` is the caller's current ordered view. On success the returned
    /// list is that view minus the deleted slot, renumbered `1..=N`. On
    /// `PartialRenameFailure` the caller must re-read with
    /// [`list_slots`](Self::list_slots) (or finish the job with
    /// [`resume_renumbering`](Self::resume_renumbering)).
    pub async fn delete_body_photo(
        &self,
        user: &UserId,
        slots: &[BodyPhotoSlot],
        index: u8,
    ) -> Result<Vec<BodyPhotoSlot>> {
        let mut remaining = slots.to_vec();
        remaining.sort_by_key(|s| s.index);

        let pos = remaining
            .iter()
            .position(|s| s.index == index)
            .ok_or(PhotoSetError::NoSuchSlot(index))?;
        let target = remaining.remove(pos);

        match self.store.delete(&target.blob_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(user = %user, name = %target.blob_name, "Body photo already absent");
            }
            Err(e) => return Err(e.into()),
        }
        self.forget_stale(user, &target.blob_name).await;

        info!(user = %user, index, name = %target.blob_name, "Body photo deleted");
        self.renumber(user, remaining).await
    }

    /// Apply the unfinished steps of a saga returned inside a
    /// `PartialRenameFailure`, then return the authoritative set.
    pub async fn resume_renumbering(&self, mut saga: RenumberSaga) -> Result<PhotoSet> {
        let user = saga.user_id().clone();
        info!(
            user = %user,
            completed = saga.completed(),
            total = saga.steps().len(),
            "Resuming body photo renumbering"
        );
        self.run_saga(&mut saga).await?;
        self.list_slots(&user).await
    }

    /// Replace the garment photo.
    ///
    /// The previous garment is deleted first on a best-effort basis: the new
    /// photo is written under the same canonical name, so a failed delete
    /// never blocks the upload.
    pub async fn set_garment_photo(&self, user: &UserId, data: Bytes) -> Result<GarmentSlot> {
        let slot = GarmentSlot::canonical(user);

        match self.store.exists(&slot.blob_name).await {
            Ok(true) => {
                if let Err(e) = self.store.delete(&slot.blob_name).await {
                    warn!(user = %user, name = %slot.blob_name, error = %e, "Could not delete previous garment, overwriting");
                }
            }
            Ok(false) => {}
            Err(e) => {
                warn!(user = %user, name = %slot.blob_name, error = %e, "Could not check for previous garment");
            }
        }

        self.store.put(&slot.blob_name, data).await?;

        info!(user = %user, name = %slot.blob_name, "Garment photo set");
        Ok(slot)
    }

    /// Remove the garment photo. Succeeds when there is none.
    pub async fn remove_garment_photo(&self, user: &UserId) -> Result<()> {
        let slot = GarmentSlot::canonical(user);
        match self.store.delete(&slot.blob_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        info!(user = %user, "Garment photo removed");
        Ok(())
    }

    /// Rename `remaining` (in display order) to canonical names `1..=N`.
    async fn renumber(
        &self,
        user: &UserId,
        remaining: Vec<BodyPhotoSlot>,
    ) -> Result<Vec<BodyPhotoSlot>> {
        let mut saga = RenumberSaga::plan(user, &remaining);
        self.run_saga(&mut saga).await?;

        let renumbered: Vec<BodyPhotoSlot> = remaining
            .into_iter()
            .zip(1u8..)
            .map(|(slot, index)| {
                if slot.index == index && slot.blob_name == naming::name_for(user, SlotKind::Body, index) {
                    slot
                } else {
                    BodyPhotoSlot::canonical(user, index)
                }
            })
            .collect();
        debug_assert!(is_contiguous(&renumbered));
        Ok(renumbered)
    }

    /// Run the pending steps of `saga` one at a time, in order.
    async fn run_saga(&self, saga: &mut RenumberSaga) -> Result<()> {
        let user = saga.user_id().clone();

        while let Some(step) = saga.next_step().cloned() {
            debug!(
                user = %user,
                step = saga.completed() + 1,
                from = %step.from,
                to = %step.to,
                "Renaming body photo"
            );

            if let Err(cause) = self.copy_step(&step).await {
                error!(
                    user = %user,
                    from = %step.from,
                    to = %step.to,
                    error = %cause,
                    "Renumbering aborted"
                );
                return Err(PhotoSetError::PartialRenameFailure {
                    renamed: saga.renamed(),
                    saga: saga.clone(),
                    cause,
                });
            }
            self.forget_stale(&user, &step.to).await;

            // The copy is confirmed, so losing the old name is now safe.
            match self.store.delete(&step.from).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(
                        user = %user,
                        name = %step.from,
                        error = %e,
                        "Old name left behind as a duplicate"
                    );
                    self.remember_stale(&user, &step.from).await;
                }
            }

            saga.advance();
        }

        Ok(())
    }

    async fn copy_step(&self, step: &RenameStep) -> std::result::Result<(), BlobError> {
        match self.store.copy(&step.from, &step.to).await {
            Ok(()) => Ok(()),
            // Source gone but target present: a previous attempt got here.
            Err(e) if e.is_not_found() => match self.store.exists(&step.to).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(e),
                Err(other) => Err(other),
            },
            Err(e) => Err(e),
        }
    }

    async fn collect_stale(&self, user: &UserId) {
        for name in self.stale_names(user).await {
            match self.store.delete(&name).await {
                Ok(()) => {
                    debug!(user = %user, name = %name, "Collected stale duplicate");
                    self.forget_stale(user, &name).await;
                }
                Err(e) => {
                    debug!(user = %user, name = %name, error = %e, "Stale duplicate still present");
                }
            }
        }
    }

    async fn stale_names(&self, user: &UserId) -> BTreeSet<String> {
        self.stale
            .lock()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    async fn remember_stale(&self, user: &UserId, name: &str) {
        self.stale
            .lock()
            .await
            .entry(user.clone())
            .or_default()
            .insert(name.to_string());
    }

    async fn forget_stale(&self, user: &UserId, name: &str) {
        let mut stale = self.stale.lock().await;
        if let Some(names) = stale.get_mut(user) {
            names.remove(name);
            if names.is_empty() {
                stale.remove(user);
            }
        }
    }
}
