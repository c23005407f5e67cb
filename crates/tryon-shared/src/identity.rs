use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use rand::Rng;
use tracing::{debug, info};

use crate::constants::{USER_ID_PREFIX, USER_ID_RANDOM_LEN};
use crate::error::IdentityError;
use crate::types::UserId;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a fresh random user id (`user_` + 9 base-36 chars).
pub fn generate() -> UserId {
    let mut rng = rand::thread_rng();
    let tail: String = (0..USER_ID_RANDOM_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    UserId(format!("{USER_ID_PREFIX}{tail}"))
}

/// Load the user id persisted at `path`, creating it on first use.
///
/// Provisioning is idempotent: once a file exists its id is returned
/// unchanged forever. Two processes racing on first use both end up with
/// whichever id was written first.
pub fn provision(path: &Path) -> Result<UserId, IdentityError> {
    if let Some(existing) = load(path)? {
        debug!(path = %path.display(), user = %existing, "Loaded existing identity");
        return Ok(existing);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let fresh = generate();
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(fresh.as_str().as_bytes())?;
            file.sync_all()?;
            info!(path = %path.display(), user = %fresh, "Provisioned new identity");
            Ok(fresh)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            load(path)?.ok_or_else(|| IdentityError::InvalidUserId(String::new()))
        }
        Err(e) => Err(e.into()),
    }
}

fn load(path: &Path) -> Result<Option<UserId>, IdentityError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => UserId::parse(contents.trim()).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_shape() {
        let id = generate();
        let s = id.as_str();
        assert!(s.starts_with(USER_ID_PREFIX));
        assert_eq!(s.len(), USER_ID_PREFIX.len() + USER_ID_RANDOM_LEN);
        assert!(UserId::parse(s).is_ok());
    }

    #[test]
    fn test_provision_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("identity");

        let first = provision(&path).unwrap();
        let second = provision(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_provision_keeps_existing_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity");
        std::fs::write(&path, "user_fixed123\n").unwrap();

        assert_eq!(provision(&path).unwrap().as_str(), "user_fixed123");
    }

    #[test]
    fn test_provision_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity");
        std::fs::write(&path, "not a valid id!").unwrap();

        assert!(provision(&path).is_err());
    }
}
