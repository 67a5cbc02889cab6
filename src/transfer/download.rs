//! File download
//!
//! Streams a file under the storage root back to the client as an
//! attachment. The file is opened and sized before any response is
//! produced, so every failure up to that point still maps to a clean
//! error response.

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use futures::StreamExt;
use futures::stream;
use log::{error, info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;

use crate::error::{StorageError, TransferError};
use crate::storage::operations::{base_name, stat_target};
use crate::storage::validation::PathGuard;
use crate::transfer::meter::{TransferMeter, TransferStats};
use crate::transfer::sampler::SpeedSampler;
use crate::utils::{format_size, format_speed};

/// A validated, opened file that is ready to be streamed.
#[derive(Debug)]
pub struct PreparedDownload {
    pub filename: String,
    pub size: u64,
    file: File,
    started: Instant,
}

/// Resolves `relative`, checks that it names a regular file and opens it.
///
/// The transfer clock starts here, so the reported duration covers path
/// checks and the open as well as streaming.
pub async fn prepare_download(
    guard: &PathGuard,
    relative: &str,
) -> Result<PreparedDownload, TransferError> {
    let started = Instant::now();
    let full_path = guard.resolve_target(relative)?;
    info!("[DOWNLOAD] Resolved {:?} -> {}", relative, full_path.display());

    let metadata = stat_target(&full_path, relative).await?;
    if metadata.is_dir() {
        warn!("[DOWNLOAD] {} is a directory", full_path.display());
        return Err(StorageError::IsDirectory(relative.to_string()).into());
    }

    let file = File::open(&full_path)
        .await
        .map_err(|e| TransferError::OpenFailed(full_path.clone(), e))?;

    let filename = base_name(relative);
    info!(
        "[DOWNLOAD] Opened {}, size: {}",
        filename,
        format_size(metadata.len())
    );

    Ok(PreparedDownload {
        filename,
        size: metadata.len(),
        file,
        started,
    })
}

impl PreparedDownload {
    /// Time since the download request started being handled
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Builds the attachment response, sampling progress every `interval`.
    pub fn into_response(self, interval: Duration) -> Response {
        info!(
            "[DOWNLOAD] Streaming {} after {:?} of preparation",
            self.filename,
            self.elapsed()
        );
        let disposition = HeaderValue::from_bytes(
            format!("attachment; filename={}", self.filename).as_bytes(),
        )
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

        let meter = TransferMeter::new(self.file);
        let stats = meter.stats();
        let sampler = SpeedSampler::spawn("DOWNLOAD", Arc::clone(&stats), interval, Some(self.size));

        let state = DownloadState {
            reader: ReaderStream::new(meter),
            sampler: Some(sampler),
            stats,
            filename: self.filename,
            size: self.size,
            started: self.started,
            done: false,
        };

        let body = stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            match state.reader.next().await {
                Some(Ok(chunk)) => Some((Ok(chunk), state)),
                Some(Err(e)) => {
                    state.fail(&e).await;
                    Some((Err(e), state))
                }
                None => {
                    state.finish().await;
                    None
                }
            }
        });

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(CONTENT_DISPOSITION, disposition);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(self.size));
        response
    }
}

/// Per-response streaming state, owned by the body stream.
struct DownloadState {
    reader: ReaderStream<TransferMeter<File>>,
    sampler: Option<SpeedSampler>,
    stats: Arc<TransferStats>,
    filename: String,
    size: u64,
    started: Instant,
    done: bool,
}

impl DownloadState {
    async fn finish(&mut self) {
        self.done = true;
        if let Some(sampler) = self.sampler.take() {
            sampler.stop().await;
        }
        let speed = self.stats.summary(self.started.elapsed());
        info!(
            "[DOWNLOAD] Success: {} sent, size: {}, elapsed: {}, average speed: {}",
            self.filename,
            format_size(speed.total_bytes),
            speed.duration,
            format_speed(speed.average_speed)
        );
    }

    async fn fail(&mut self, e: &io::Error) {
        self.done = true;
        if let Some(sampler) = self.sampler.take() {
            sampler.stop().await;
        }
        error!(
            "[DOWNLOAD] Read failed for {} after {}/{}: {}",
            self.filename,
            format_size(self.stats.total_bytes()),
            format_size(self.size),
            e
        );
    }
}

impl Drop for DownloadState {
    fn drop(&mut self) {
        if !self.done {
            // Client went away; the sampler's own Drop stops its task.
            warn!(
                "[DOWNLOAD] Aborted: {} after {}/{}",
                self.filename,
                format_size(self.stats.total_bytes()),
                format_size(self.size)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use http_body_util::BodyExt;
    use tempfile::tempdir;

    async fn collect_body(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    fn setup() -> (tempfile::TempDir, PathGuard) {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir_all(temp.path().join("docs")).unwrap();
        std::fs::write(temp.path().join("docs/notes.md"), b"# notes").unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();
        (temp, guard)
    }

    #[tokio::test]
    async fn test_download_streams_file_with_headers() {
        let (_temp, guard) = setup();
        let prepared = prepare_download(&guard, "a.txt").await.unwrap();
        assert_eq!(prepared.size, 5);

        let response = prepared.into_response(Duration::from_millis(50));
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_LENGTH], "5");
        assert_eq!(headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=a.txt");

        assert_eq!(&collect_body(response).await[..], b"hello");
    }

    #[tokio::test]
    async fn test_nested_download_uses_base_name() {
        let (_temp, guard) = setup();
        let response = prepare_download(&guard, "docs/notes.md")
            .await
            .unwrap()
            .into_response(Duration::from_secs(1));
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=notes.md"
        );
        assert_eq!(&collect_body(response).await[..], b"# notes");
    }

    #[tokio::test]
    async fn test_large_download_is_byte_identical() {
        let (temp, guard) = setup();
        let content: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
        std::fs::write(temp.path().join("big.bin"), &content).unwrap();

        let response = prepare_download(&guard, "big.bin")
            .await
            .unwrap()
            .into_response(Duration::from_millis(10));
        assert_eq!(collect_body(response).await.to_vec(), content);
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let (_temp, guard) = setup();
        assert!(matches!(
            prepare_download(&guard, "docs").await,
            Err(TransferError::Storage(StorageError::IsDirectory(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_temp, guard) = setup();
        assert!(matches!(
            prepare_download(&guard, "ghost.txt").await,
            Err(TransferError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (_temp, guard) = setup();
        assert!(matches!(
            prepare_download(&guard, "../secret").await,
            Err(TransferError::Storage(StorageError::InvalidPath(_)))
        ));
        assert!(matches!(
            prepare_download(&guard, "").await,
            Err(TransferError::Storage(StorageError::InvalidPath(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_starts_before_response_is_built() {
        let (_temp, guard) = setup();
        let prepared = prepare_download(&guard, "a.txt").await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(prepared.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_absolute_path_to_prefix_sibling_is_not_served() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("files");
        let sibling = temp.path().join("files-private");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("secret.txt"), b"secret").unwrap();
        let guard = PathGuard::new(&root).unwrap();

        let absolute = sibling.join("secret.txt");
        assert!(matches!(
            prepare_download(&guard, &absolute.to_string_lossy()).await,
            Err(TransferError::Storage(StorageError::NotFound(_)))
        ));
        assert!(matches!(
            prepare_download(&guard, "/").await,
            Err(TransferError::Storage(StorageError::InvalidPath(_)))
        ));
    }

    #[tokio::test]
    async fn test_dropping_body_midway_is_harmless() {
        let (_temp, guard) = setup();
        let response = prepare_download(&guard, "a.txt")
            .await
            .unwrap()
            .into_response(Duration::from_millis(10));
        drop(response);
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
}
