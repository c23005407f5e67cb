//! Per-user single-flight guard for synthesis requests.
//!
//! At most one generation may run per user. The guard is enforced here, on
//! the server, so that any caller (not only the bundled client) is held to
//! it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use tryon_shared::UserId;

#[derive(Clone, Default)]
pub struct InFlightGuard {
    users: Arc<Mutex<HashSet<UserId>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<UserId>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the slot for `user`. `None` while another generation for the
    /// same user holds it. The slot is released when the permit drops.
    pub fn try_acquire(&self, user: &UserId) -> Option<InFlightPermit> {
        if !self.lock().insert(user.clone()) {
            warn!(user = %user, "Generation already in flight");
            return None;
        }
        debug!(user = %user, "Generation slot acquired");
        Some(InFlightPermit {
            guard: self.clone(),
            user: user.clone(),
        })
    }

    pub fn is_busy(&self, user: &UserId) -> bool {
        self.lock().contains(user)
    }
}

pub struct InFlightPermit {
    guard: InFlightGuard,
    user: UserId,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.user);
        debug!(user = %self.user, "Generation slot released");
    }
}
