//! JSON bodies exchanged between the HTTP API and its clients.
//!
//! Field names are camelCase on the wire.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::types::{SlotKind, UserId};

/// `GET /api/files?userId=...`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFilesResponse {
    pub files: Vec<String>,
}

/// `POST /api/files`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// `data:image/...;base64,...` (a bare base64 payload is accepted too)
    pub image_data: String,
    #[serde(rename = "type")]
    pub kind: SlotKind,
    pub index: u8,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
}

/// `DELETE /api/files?userId=...&fileName=...`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    pub user_id: UserId,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// `POST /api/files/rename` (copy then delete; 404 when the source is absent)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub old_file_name: String,
    pub new_file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResponse {
    pub message: String,
    pub old_file_name: String,
    pub new_file_name: String,
}

/// `POST /api/files/copy`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    pub from: String,
    pub to: String,
}

/// `POST /api/generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub user_id: UserId,
    pub garment_name: String,
    pub body_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub job_id: Uuid,
    pub file_name: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Wrap raw image bytes in a base64 data URI.
pub fn encode_data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(data))
}

/// Decode a `data:<mime>;base64,<payload>` URI, or a bare base64 string.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ProtocolError> {
    let payload = match uri.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or(ProtocolError::InvalidDataUri)?;
            if !header.ends_with(";base64") {
                return Err(ProtocolError::InvalidDataUri);
            }
            payload
        }
        None => uri,
    };
    Ok(STANDARD.decode(payload.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_decode() {
        let uri = encode_data_uri("image/jpeg", b"\xff\xd8\xff\xe0jpeg");
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap(), b"\xff\xd8\xff\xe0jpeg");
    }

    #[test]
    fn test_bare_base64_accepted() {
        assert_eq!(decode_data_uri("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_malformed_data_uri() {
        assert!(matches!(
            decode_data_uri("data:image/png,plain"),
            Err(ProtocolError::InvalidDataUri)
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64"),
            Err(ProtocolError::InvalidDataUri)
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,!!!"),
            Err(ProtocolError::Base64(_))
        ));
    }

    #[test]
    fn test_upload_request_wire_names() {
        let json = r#"{"imageData":"aGk=","type":"cloth","index":1,"userId":"user_abc"}"#;
        let req: UploadRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, SlotKind::Cloth);
        assert_eq!(req.index, 1);
        assert_eq!(req.user_id.as_str(), "user_abc");

        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back["type"], "cloth");
        assert_eq!(back["userId"], "user_abc");
    }

    #[test]
    fn test_generate_request_description_optional() {
        let json = r#"{"userId":"user_abc","garmentName":"g","bodyName":"b"}"#;
        let req: GenerateRequest = serde_json::from_str(json).unwrap();
        assert!(req.description.is_none());
    }
}
