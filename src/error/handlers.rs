//! Error handlers
//!
//! Maps errors onto HTTP status classes and the failure envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};

use crate::error::types::{ApiError, StorageError, TransferError};
use crate::protocol::responses::ErrorBody;

/// Log an error under the tag of the operation that produced it
pub fn handle_error(tag: &str, err: &ApiError) {
    if error_to_status(err).is_server_error() {
        error!("[{}] {}", tag, err);
    } else {
        warn!("[{}] {}", tag, err);
    }
}

/// Convert error to HTTP status code
pub fn error_to_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Storage(e) => storage_status(e),
        ApiError::Transfer(e) => match e {
            TransferError::Storage(inner) => storage_status(inner),
            TransferError::NoFilePart(_) | TransferError::MalformedRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            TransferError::WriteFailed(..) | TransferError::OpenFailed(..) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::InvalidPath(_)
        | StorageError::InvalidFilename(_)
        | StorageError::IsDirectory(_) => StatusCode::BAD_REQUEST,
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::DirectoryCreateFailed(..)
        | StorageError::FileCreateFailed(..)
        | StorageError::DeleteFailed(..)
        | StorageError::ReadDirFailed(..)
        | StorageError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Message shown to the client; never carries server-side paths
pub fn client_message(err: &ApiError) -> &'static str {
    match err {
        ApiError::Storage(e) => storage_message(e),
        ApiError::Transfer(e) => match e {
            TransferError::Storage(inner) => storage_message(inner),
            TransferError::WriteFailed(..) => "failed to save file",
            TransferError::OpenFailed(..) => "failed to open file",
            TransferError::NoFilePart(_) => "failed to read file data",
            TransferError::MalformedRequest(_) => "failed to parse upload request",
        },
    }
}

fn storage_message(err: &StorageError) -> &'static str {
    match err {
        StorageError::InvalidPath(_) => "invalid path",
        StorageError::InvalidFilename(_) => "invalid filename",
        StorageError::NotFound(_) => "file or directory not found",
        StorageError::IsDirectory(_) => "cannot download a directory",
        StorageError::DirectoryCreateFailed(..) => "failed to create directory",
        StorageError::FileCreateFailed(..) => "failed to create file",
        StorageError::DeleteFailed(..) => "failed to delete",
        StorageError::ReadDirFailed(..) => "failed to read file list",
        StorageError::IoError(_) => "failed to access file",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = error_to_status(&self);
        (status, Json(ErrorBody::new(client_message(&self)))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_validation_faults_are_bad_requests() {
        let err = ApiError::from(StorageError::InvalidPath("../etc".into()));
        assert_eq!(error_to_status(&err), StatusCode::BAD_REQUEST);
        assert_eq!(client_message(&err), "invalid path");

        let err = ApiError::from(TransferError::from(StorageError::InvalidFilename(
            "a/b".into(),
        )));
        assert_eq!(error_to_status(&err), StatusCode::BAD_REQUEST);
        assert!(matches!(err, ApiError::Storage(StorageError::InvalidFilename(_))));
    }

    #[test]
    fn test_missing_target_is_not_found() {
        let err = ApiError::from(StorageError::NotFound("a.txt".into()));
        assert_eq!(error_to_status(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_io_faults_are_server_errors() {
        let err = ApiError::from(TransferError::WriteFailed(
            PathBuf::from("/srv/a.txt"),
            io::Error::other("disk full"),
        ));
        assert_eq!(error_to_status(&err), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(client_message(&err), "failed to save file");
        assert!(!client_message(&err).contains("/srv"));
    }
}
