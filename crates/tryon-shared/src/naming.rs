//! Canonical blob names.
//!
//! Every stored image is named `{user}-{kind}{index}.jpg`, e.g.
//! `user_k3j9x0a1b-body2.jpg` or `user_k3j9x0a1b-cloth1.jpg`. The generation
//! result lives at `{user}-result.jpg` and is not a slot.
//!
//! User ids cannot contain `-`, so the first `-` in a name always terminates
//! the owner segment. Ownership checks compare that whole segment and never
//! rely on a bare `starts_with`, which would let `user_a` claim the blobs of
//! `user_ab`.

use chrono::Utc;

use crate::constants::{IMAGE_EXTENSION, IMAGE_ROUTE, NAME_DELIMITER};
use crate::types::{SlotKind, UserId};

const RESULT_TAG: &str = "result";

/// A canonical slot name broken back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub user_id: UserId,
    pub kind: SlotKind,
    pub index: u8,
}

/// Canonical name of the blob occupying `(user, kind, index)`.
pub fn name_for(user: &UserId, kind: SlotKind, index: u8) -> String {
    format!(
        "{user}{NAME_DELIMITER}{}{index}.{IMAGE_EXTENSION}",
        kind.tag()
    )
}

/// Name of the single generation result kept per user.
pub fn result_name(user: &UserId) -> String {
    format!("{user}{NAME_DELIMITER}{RESULT_TAG}.{IMAGE_EXTENSION}")
}

/// Listing prefix covering exactly the blobs of `user`.
pub fn user_prefix(user: &UserId) -> String {
    format!("{user}{NAME_DELIMITER}")
}

/// Inverse of [`user_prefix`].
pub fn user_from_prefix(prefix: &str) -> Option<UserId> {
    let owner = prefix.strip_suffix(NAME_DELIMITER)?;
    UserId::parse(owner).ok()
}

/// The owner segment of `name`, if it has one.
pub fn owner_segment(name: &str) -> Option<&str> {
    name.split_once(NAME_DELIMITER).map(|(owner, _)| owner)
}

/// Exact-segment ownership test.
pub fn belongs_to(name: &str, user: &UserId) -> bool {
    owner_segment(name) == Some(user.as_str())
}

/// Parse a canonical slot name. Foreign names (other schemes, the result
/// image, out-of-range indices) yield `None`.
pub fn parse(name: &str) -> Option<ParsedName> {
    let (owner, rest) = name.split_once(NAME_DELIMITER)?;
    let user_id = UserId::parse(owner).ok()?;
    let stem = rest.strip_suffix(IMAGE_EXTENSION)?.strip_suffix('.')?;

    let split = stem.find(|c: char| c.is_ascii_digit())?;
    let (tag, digits) = stem.split_at(split);
    let kind = SlotKind::from_tag(tag)?;

    if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u8 = digits.parse().ok()?;
    if !kind.accepts(index) {
        return None;
    }

    Some(ParsedName {
        user_id,
        kind,
        index,
    })
}

/// Whether `name` is the result image of `user`.
pub fn is_result_name(name: &str, user: &UserId) -> bool {
    name == result_name(user)
}

/// Millisecond timestamp appended to display URLs so that an overwritten
/// canonical name is never served from a stale cache.
pub fn freshness_token() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn display_url(name: &str, token: i64) -> String {
    format!("{IMAGE_ROUTE}/{name}?t={token}")
}

/// Recover the blob name from a display URL (or return a bare name as is).
pub fn name_from_display_url(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}
