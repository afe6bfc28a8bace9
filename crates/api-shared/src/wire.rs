//! JSON bodies exchanged with the processing endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Header carrying the processing service API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Request to materialise a document record for a stored upload.
///
/// `file_name` is the stored file name (the last segment of the storage key), not the name the
/// user picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProcessReq {
    pub user_id: String,
    pub file_name: String,
}

/// Outcome reported by the processing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProcessRes {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProcessRes {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}
