use serde::Serialize;

use tryon_shared::constants::GARMENT_INDEX;
use tryon_shared::naming;
use tryon_shared::types::{SlotKind, UserId};

/// One of a user's reference body photos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyPhotoSlot {
    /// 1-based position; also the display order.
    pub index: u8,
    pub blob_name: String,
    /// Cache-busted URL for the current content of `blob_name`.
    pub display_url: String,
}

impl BodyPhotoSlot {
    /// Slot at its canonical name with a fresh display URL.
    pub fn canonical(user: &UserId, index: u8) -> Self {
        Self::from_name(index, naming::name_for(user, SlotKind::Body, index))
    }

    pub fn from_name(index: u8, blob_name: String) -> Self {
        let display_url = naming::display_url(&blob_name, naming::freshness_token());
        Self {
            index,
            blob_name,
            display_url,
        }
    }
}

/// The single garment photo of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GarmentSlot {
    pub blob_name: String,
    pub display_url: String,
}

impl GarmentSlot {
    pub fn canonical(user: &UserId) -> Self {
        Self::from_name(naming::name_for(user, SlotKind::Cloth, GARMENT_INDEX))
    }

    pub fn from_name(blob_name: String) -> Self {
        let display_url = naming::display_url(&blob_name, naming::freshness_token());
        Self {
            blob_name,
            display_url,
        }
    }
}

/// Everything a user currently has stored, as classified by the naming
/// scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhotoSet {
    /// Sorted by index, ascending.
    pub body: Vec<BodyPhotoSlot>,
    pub garment: Option<GarmentSlot>,
}

impl PhotoSet {
    pub fn indices(&self) -> Vec<u8> {
        self.body.iter().map(|s| s.index).collect()
    }

    /// Whether the body indices are exactly `1..=N`.
    pub fn is_contiguous(&self) -> bool {
        is_contiguous(&self.body)
    }
}

pub(crate) fn is_contiguous(slots: &[BodyPhotoSlot]) -> bool {
    slots
        .iter()
        .enumerate()
        .all(|(pos, slot)| usize::from(slot.index) == pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_slots() {
        let user = UserId::parse("user_abc").unwrap();
        let slot = BodyPhotoSlot::canonical(&user, 2);
        assert_eq!(slot.blob_name, "user_abc-body2.jpg");
        assert!(slot.display_url.starts_with("/images/user_abc-body2.jpg?t="));

        let garment = GarmentSlot::canonical(&user);
        assert_eq!(garment.blob_name, "user_abc-cloth1.jpg");
    }

    #[test]
    fn test_contiguity() {
        let user = UserId::parse("user_abc").unwrap();
        let mut set = PhotoSet::default();
        assert!(set.is_contiguous());

        set.body = vec![
            BodyPhotoSlot::canonical(&user, 1),
            BodyPhotoSlot::canonical(&user, 3),
        ];
        assert!(!set.is_contiguous());

        set.body[1] = BodyPhotoSlot::canonical(&user, 2);
        assert!(set.is_contiguous());
        assert_eq!(set.indices(), vec![1, 2]);
    }
}
