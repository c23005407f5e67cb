use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{GARMENT_INDEX, MAX_BODY_SLOTS, MAX_USER_ID_LEN};
use crate::error::{IdentityError, ProtocolError};

// User identity = opaque client-chosen string, restricted to [A-Za-z0-9_]
// so that the name delimiter can never appear inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(pub(crate) String);

impl UserId {
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let valid = !s.is_empty()
            && s.len() <= MAX_USER_ID_LEN
            && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
        if !valid {
            return Err(IdentityError::InvalidUserId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Which kind of slot a blob occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Body,
    Cloth,
}

impl SlotKind {
    /// Tag used inside canonical blob names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Cloth => "cloth",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "body" => Some(Self::Body),
            "cloth" => Some(Self::Cloth),
            _ => None,
        }
    }

    /// Whether `index` is a legal slot index for this kind.
    pub fn accepts(self, index: u8) -> bool {
        match self {
            Self::Body => (1..=MAX_BODY_SLOTS).contains(&index),
            Self::Cloth => index == GARMENT_INDEX,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SlotKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| ProtocolError::UnknownSlotKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_accepts_generated_shape() {
        let id = UserId::parse("user_k3j9x0a1b").unwrap();
        assert_eq!(id.as_str(), "user_k3j9x0a1b");
        assert_eq!(id.to_string(), "user_k3j9x0a1b");
    }

    #[test]
    fn test_user_id_rejects_delimiter_and_traversal() {
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("alice-bob").is_err());
        assert!(UserId::parse("../etc").is_err());
        assert!(UserId::parse("a/b").is_err());
        assert!(UserId::parse(&"x".repeat(MAX_USER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_user_id_serde_validates() {
        let ok: UserId = serde_json::from_str("\"user_abc\"").unwrap();
        assert_eq!(ok.as_str(), "user_abc");
        assert!(serde_json::from_str::<UserId>("\"user-abc\"").is_err());
    }

    #[test]
    fn test_slot_kind_indices() {
        assert!(SlotKind::Body.accepts(1));
        assert!(SlotKind::Body.accepts(3));
        assert!(!SlotKind::Body.accepts(0));
        assert!(!SlotKind::Body.accepts(4));
        assert!(SlotKind::Cloth.accepts(1));
        assert!(!SlotKind::Cloth.accepts(2));
    }

    #[test]
    fn test_slot_kind_serde_lowercase() {
        assert_eq!(serde_json::to_string(&SlotKind::Cloth).unwrap(), "\"cloth\"");
        let kind: SlotKind = serde_json::from_str("\"body\"").unwrap();
        assert_eq!(kind, SlotKind::Body);
        assert!("shoe".parse::<SlotKind>().is_err());
    }
}
