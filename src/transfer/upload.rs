//! File upload
//!
//! Materialises exactly one file from a multipart request under the storage
//! root. The request body is first buffered in memory up to a threshold and
//! parsed as a complete form; if that fails for any reason the bytes read so
//! far are replayed in front of the rest of the body and the first multipart
//! part is streamed straight to disk instead.

use axum::body::{Body, BodyDataStream, Bytes};
use axum::extract::multipart::Field;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::request::Parts;
use bytes::BytesMut;
use futures::StreamExt;
use futures::stream;
use log::{error, info, warn};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::{StorageError, TransferError};
use crate::storage::validation::{PathGuard, validate_filename};
use crate::transfer::meter::{TransferMeter, TransferStats};
use crate::transfer::results::{UploadMode, UploadResult};
use crate::transfer::sampler::SpeedSampler;
use crate::utils::{format_size, format_speed};

/// Form field holding the file in buffered mode
pub const FILE_FIELD: &str = "file";

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Tunables for an upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadSettings {
    /// Bodies larger than this are never parsed in memory
    pub memory_limit: usize,
    /// Cadence of the background progress sampler
    pub sample_interval: Duration,
}

/// Receives one uploaded file into `dest_path` (relative to the root).
pub async fn receive_upload(
    guard: &PathGuard,
    settings: UploadSettings,
    dest_path: &str,
    request: Request,
) -> Result<UploadResult, TransferError> {
    let started = Instant::now();

    // Reject a bad destination before reading any of the body.
    guard.resolve_subpath(dest_path)?;

    let (parts, body) = request.into_parts();
    match buffer_body(body, settings.memory_limit).await? {
        BufferedBody::Complete(bytes) => {
            let reason = match parse_buffered_form(&parts, bytes.clone()).await {
                Ok(Some((filename, data))) => {
                    info!(
                        "[UPLOAD] Buffered upload - filename: {}, size: {}",
                        filename,
                        format_size(data.len() as u64)
                    );
                    let source = UploadSource::Buffered(data);
                    return store_upload(guard, settings, dest_path, filename, source, started)
                        .await;
                }
                Ok(None) => format!("form has no `{}` field", FILE_FIELD),
                Err(reason) => reason,
            };
            info!("[UPLOAD] Buffered parse failed, falling back to streaming: {}", reason);
            stream_first_part(guard, settings, dest_path, &parts, Body::from(bytes), started).await
        }
        BufferedBody::Overflow { prefix, rest } => {
            info!(
                "[UPLOAD] Body exceeds {} in-memory threshold, streaming",
                format_size(settings.memory_limit as u64)
            );
            let replay = stream::iter(prefix.into_iter().map(Ok::<_, axum::Error>)).chain(rest);
            let body = Body::from_stream(replay);
            stream_first_part(guard, settings, dest_path, &parts, body, started).await
        }
    }
}

enum BufferedBody {
    Complete(Bytes),
    Overflow {
        prefix: Vec<Bytes>,
        rest: BodyDataStream,
    },
}

async fn buffer_body(body: Body, limit: usize) -> Result<BufferedBody, TransferError> {
    let mut data = body.into_data_stream();
    let mut chunks = Vec::new();
    let mut total = 0usize;

    while let Some(chunk) = data.next().await {
        let chunk = chunk.map_err(|e| TransferError::MalformedRequest(e.to_string()))?;
        total += chunk.len();
        chunks.push(chunk);
        if total > limit {
            return Ok(BufferedBody::Overflow {
                prefix: chunks,
                rest: data,
            });
        }
    }

    let mut joined = BytesMut::with_capacity(total);
    for chunk in chunks {
        joined.extend_from_slice(&chunk);
    }
    Ok(BufferedBody::Complete(joined.freeze()))
}

/// Parses a fully buffered form and returns the `file` field, if any.
///
/// `Err` means the form itself could not be parsed.
async fn parse_buffered_form(
    parts: &Parts,
    bytes: Bytes,
) -> Result<Option<(String, Bytes)>, String> {
    let request = rebuild_request(parts, Body::from(bytes));
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| e.body_text())?;

    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| e.body_text())?;
        return Ok(Some((filename, data)));
    }

    Ok(None)
}

async fn stream_first_part(
    guard: &PathGuard,
    settings: UploadSettings,
    dest_path: &str,
    parts: &Parts,
    body: Body,
    started: Instant,
) -> Result<UploadResult, TransferError> {
    let request = rebuild_request(parts, body);
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| TransferError::MalformedRequest(e.body_text()))?;

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return Err(TransferError::NoFilePart("multipart body has no parts".into()));
        }
        Err(e) => return Err(TransferError::NoFilePart(e.body_text())),
    };

    let filename = field.file_name().unwrap_or_default().to_string();
    info!(
        "[UPLOAD] Streaming upload - filename: {}, content type: {}",
        filename,
        field.content_type().unwrap_or("unknown")
    );

    let source = UploadSource::Streaming(field);
    store_upload(guard, settings, dest_path, filename, source, started).await
}

/// Where the decoded file bytes come from.
enum UploadSource<'a> {
    Buffered(Bytes),
    Streaming(Field<'a>),
}

impl UploadSource<'_> {
    fn mode(&self) -> UploadMode {
        match self {
            UploadSource::Buffered(_) => UploadMode::Buffered,
            UploadSource::Streaming(_) => UploadMode::Streaming,
        }
    }

    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        match self {
            UploadSource::Buffered(data) => {
                if data.is_empty() {
                    return Ok(None);
                }
                let n = data.len().min(COPY_CHUNK_SIZE);
                Ok(Some(data.split_to(n)))
            }
            UploadSource::Streaming(field) => field
                .chunk()
                .await
                .map_err(|e| io::Error::other(e.body_text())),
        }
    }
}

async fn store_upload(
    guard: &PathGuard,
    settings: UploadSettings,
    dest_path: &str,
    filename: String,
    mut source: UploadSource<'_>,
    started: Instant,
) -> Result<UploadResult, TransferError> {
    if let Err(e) = validate_filename(&filename) {
        warn!("[UPLOAD] Invalid filename {:?}", filename);
        return Err(e.into());
    }

    let target_dir = guard.prepare_directory(dest_path)?;
    let full_path = target_dir.join(&filename);
    let mode = source.mode();

    info!("[UPLOAD] Creating target file {}", full_path.display());
    let file = File::create(&full_path)
        .await
        .map_err(|e| StorageError::FileCreateFailed(full_path.clone(), e))?;

    let mut meter = TransferMeter::new(file);
    let stats = meter.stats();
    let sampler = SpeedSampler::spawn("UPLOAD", stats.clone(), settings.sample_interval, None);

    info!("[UPLOAD] Copying file content ({} mode)...", mode);
    let copied = copy_source(&mut source, &mut meter).await;
    sampler.stop().await;
    drop(meter);

    if let Err(e) = copied {
        error!(
            "[UPLOAD] Write failed for {} after {}: {}",
            full_path.display(),
            format_size(stats.total_bytes()),
            e
        );
        discard_partial(&full_path).await;
        return Err(TransferError::WriteFailed(full_path, e));
    }

    Ok(finish_upload(filename, &full_path, mode, &stats, started).await)
}

async fn copy_source(
    source: &mut UploadSource<'_>,
    sink: &mut TransferMeter<File>,
) -> io::Result<()> {
    while let Some(chunk) = source.next_chunk().await? {
        sink.write_all(&chunk).await?;
    }
    sink.flush().await
}

async fn discard_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => info!("[UPLOAD] Removed incomplete file {}", path.display()),
        Err(e) => error!(
            "[UPLOAD] Failed to remove incomplete file {}: {}",
            path.display(),
            e
        ),
    }
}

async fn finish_upload(
    filename: String,
    written: &Path,
    mode: UploadMode,
    stats: &TransferStats,
    started: Instant,
) -> UploadResult {
    let speed = stats.summary(started.elapsed());
    info!(
        "[UPLOAD] Success: {} uploaded, size: {}, elapsed: {}, average speed: {}",
        filename,
        format_size(speed.total_bytes),
        speed.duration,
        format_speed(speed.average_speed)
    );
    if let Ok(metadata) = fs::metadata(written).await {
        info!(
            "[UPLOAD] File info - final size: {} bytes, modified: {:?}",
            metadata.len(),
            metadata.modified().ok()
        );
    }

    UploadResult {
        filename,
        mode,
        speed,
    }
}

/// Rebuilds a request around a replacement body, keeping the original
/// headers and extensions (the body-limit setting lives in the latter).
fn rebuild_request(parts: &Parts, body: Body) -> Request {
    let mut request = Request::new(body);
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = parts.uri.clone();
    *request.headers_mut() = parts.headers.clone();
    *request.extensions_mut() = parts.extensions.clone();
    request
}
