//! Error types
//!
//! Defines domain-specific error types for the storage and transfer modules,
//! plus the boundary error every HTTP handler returns.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Storage module errors
#[derive(Debug)]
pub enum StorageError {
    InvalidPath(String),
    InvalidFilename(String),
    NotFound(String),
    IsDirectory(String),
    DirectoryCreateFailed(PathBuf, io::Error),
    FileCreateFailed(PathBuf, io::Error),
    DeleteFailed(PathBuf, io::Error),
    ReadDirFailed(PathBuf, io::Error),
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidPath(p) => write!(f, "Invalid path: {}", p),
            StorageError::InvalidFilename(n) => write!(f, "Invalid filename: {:?}", n),
            StorageError::NotFound(p) => write!(f, "Not found: {}", p),
            StorageError::IsDirectory(p) => write!(f, "Is a directory: {}", p),
            StorageError::DirectoryCreateFailed(p, e) => {
                write!(f, "Failed to create directory {}: {}", p.display(), e)
            }
            StorageError::FileCreateFailed(p, e) => {
                write!(f, "Failed to create file {}: {}", p.display(), e)
            }
            StorageError::DeleteFailed(p, e) => {
                write!(f, "Failed to delete {}: {}", p.display(), e)
            }
            StorageError::ReadDirFailed(p, e) => {
                write!(f, "Failed to read directory {}: {}", p.display(), e)
            }
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

/// Transfer module errors
#[derive(Debug)]
pub enum TransferError {
    /// Path or filename fault raised while preparing the transfer.
    Storage(StorageError),
    WriteFailed(PathBuf, io::Error),
    OpenFailed(PathBuf, io::Error),
    NoFilePart(String),
    MalformedRequest(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Storage(e) => write!(f, "{}", e),
            TransferError::WriteFailed(p, e) => {
                write!(f, "Failed to write {}: {}", p.display(), e)
            }
            TransferError::OpenFailed(p, e) => write!(f, "Failed to open {}: {}", p.display(), e),
            TransferError::NoFilePart(msg) => write!(f, "No file part in request: {}", msg),
            TransferError::MalformedRequest(msg) => write!(f, "Malformed upload request: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {}

impl From<StorageError> for TransferError {
    fn from(error: StorageError) -> Self {
        TransferError::Storage(error)
    }
}

/// Boundary error returned by every HTTP handler
#[derive(Debug)]
pub enum ApiError {
    Storage(StorageError),
    Transfer(TransferError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Storage(e) => write!(f, "Storage error: {}", e),
            ApiError::Transfer(e) => write!(f, "Transfer error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        ApiError::Storage(error)
    }
}

impl From<TransferError> for ApiError {
    fn from(error: TransferError) -> Self {
        match error {
            TransferError::Storage(inner) => ApiError::Storage(inner),
            other => ApiError::Transfer(other),
        }
    }
}
