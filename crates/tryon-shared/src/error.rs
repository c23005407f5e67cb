use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    #[error("Identity file error: {0}")]
    IdentityFile(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed data URI")]
    InvalidDataUri,

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unknown slot kind: {0:?}")]
    UnknownSlotKind(String),
}
