//! JSON response envelope
//!
//! Every API response is `{success, message?, data?, speed?}`. Successful
//! payloads are a closed set of variants so each handler produces exactly
//! one well-formed shape.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::storage::results::{DeleteResult, FileDescriptor, ItemType};
use crate::transfer::results::{SpeedInfo, UploadResult};

/// Identity of a deleted entry as reported to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedItem {
    pub item_type: ItemType,
    pub name: String,
}

/// A successful API outcome.
#[derive(Debug, Clone)]
pub enum ApiResponse {
    FileList(Vec<FileDescriptor>),
    Uploaded { message: String, speed: SpeedInfo },
    Deleted { message: String, item: DeletedItem },
}

impl ApiResponse {
    pub fn uploaded(result: UploadResult) -> Self {
        ApiResponse::Uploaded {
            message: format!("file {} uploaded successfully", result.filename),
            speed: result.speed,
        }
    }

    pub fn deleted(result: DeleteResult) -> Self {
        ApiResponse::Deleted {
            message: format!("{} {} deleted successfully", result.item_type, result.name),
            item: DeletedItem {
                item_type: result.item_type,
                name: result.name,
            },
        }
    }

    fn envelope(&self) -> Envelope<'_> {
        match self {
            ApiResponse::FileList(entries) => Envelope {
                success: true,
                message: None,
                data: Some(Payload::Files(entries)),
                speed: None,
            },
            ApiResponse::Uploaded { message, speed } => Envelope {
                success: true,
                message: Some(message.as_str()),
                data: None,
                speed: Some(speed),
            },
            ApiResponse::Deleted { message, item } => Envelope {
                success: true,
                message: Some(message.as_str()),
                data: Some(Payload::Deleted(item)),
                speed: None,
            },
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Payload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<&'a SpeedInfo>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Payload<'a> {
    Files(&'a [FileDescriptor]),
    Deleted(&'a DeletedItem),
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.envelope())).into_response()
    }
}

/// Failure envelope: `{"success": false, "message": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    success: bool,
    message: String,
}

impl ErrorBody {
    pub fn new(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}
