/// Application name
pub const APP_NAME: &str = "tryon";

/// Number of reference body photo slots per user
pub const MAX_BODY_SLOTS: u8 = 3;

/// The garment slot always uses this index
pub const GARMENT_INDEX: u8 = 1;

/// Every generated user id starts with this
pub const USER_ID_PREFIX: &str = "user_";

/// Length of the random base-36 tail of a generated user id
pub const USER_ID_RANDOM_LEN: usize = 9;

/// Upper bound on accepted user id length
pub const MAX_USER_ID_LEN: usize = 64;

/// Separates the user segment from the slot part of a blob name.
/// Never valid inside a user id.
pub const NAME_DELIMITER: char = '-';

/// Extension carried by every stored image
pub const IMAGE_EXTENSION: &str = "jpg";

/// Route prefix under which stored images are served
pub const IMAGE_ROUTE: &str = "/images";

/// Description sent to the synthesis model when the caller gives none
pub const DEFAULT_GARMENT_DESCRIPTION: &str = "clothing item";

/// Maximum decoded image size in bytes (10 MiB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Bound on a blob listing round trip, in seconds
pub const LIST_TIMEOUT_SECS: u64 = 5;
