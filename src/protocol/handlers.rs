//! HTTP handlers for the filedock API.
//!
//! Each handler validates its input through the shared [`PathGuard`], runs
//! one storage or transfer operation and turns the outcome into the JSON
//! envelope (or a file stream, for downloads).

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{Html, IntoResponse, Response};
use log::info;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{ApiError, handle_error};
use crate::protocol::responses::ApiResponse;
use crate::storage::{PathGuard, delete_entry, list_directory};
use crate::transfer::{UploadSettings, prepare_download, receive_upload};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub guard: Arc<PathGuard>,
}

impl AppState {
    pub fn new(config: ServerConfig, guard: PathGuard) -> Self {
        Self {
            config: Arc::new(config),
            guard: Arc::new(guard),
        }
    }

    fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            memory_limit: self.config.memory_buffer_bytes(),
            sample_interval: self.config.sample_interval(),
        }
    }
}

/// `?path=` query, absent means the storage root
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

/// GET {root}/api/files?path=
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<ApiResponse, ApiError> {
    info!("[LIST] Request - path: {:?}", query.path);
    match list_directory(&state.guard, &query.path).await {
        Ok(result) => Ok(ApiResponse::FileList(result.entries)),
        Err(e) => Err(report("LIST", e.into())),
    }
}

/// POST {root}/api/upload?path=
pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    request: Request,
) -> Result<ApiResponse, ApiError> {
    let content_length = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    info!(
        "[UPLOAD] Request - path: {:?}, content length: {}, content type: {:?}",
        query.path,
        content_length,
        request.headers().get(CONTENT_TYPE)
    );

    match receive_upload(&state.guard, state.upload_settings(), &query.path, request).await {
        Ok(result) => Ok(ApiResponse::uploaded(result)),
        Err(e) => Err(report("UPLOAD", e.into())),
    }
}

/// GET {root}/api/download/{*path}
pub async fn download_file(
    State(state): State<AppState>,
    Path(relative): Path<String>,
) -> Result<Response, ApiError> {
    info!("[DOWNLOAD] Request - file: {:?}", relative);
    match prepare_download(&state.guard, &relative).await {
        Ok(prepared) => Ok(prepared.into_response(state.config.sample_interval())),
        Err(e) => Err(report("DOWNLOAD", e.into())),
    }
}

/// DELETE {root}/api/delete/{*path}
pub async fn delete_file(
    State(state): State<AppState>,
    Path(relative): Path<String>,
) -> Result<ApiResponse, ApiError> {
    info!("[DELETE] Request - target: {:?}", relative);
    match delete_entry(&state.guard, &relative).await {
        Ok(result) => Ok(ApiResponse::deleted(result)),
        Err(e) => Err(report("DELETE", e.into())),
    }
}

/// GET {root}
pub async fn serve_index(State(state): State<AppState>) -> impl IntoResponse {
    let page = inject_root_path(INDEX_HTML, &state.config.root_path);
    info!("[INDEX] Serving front page, {} bytes", page.len());
    Html(page)
}

/// Makes the mount prefix visible to the page's script.
pub fn inject_root_path(html: &str, root_path: &str) -> String {
    let escaped = root_path.replace('\\', "\\\\").replace('"', "\\\"");
    let script = format!("<script>window.ROOT_PATH = \"{}\";</script>", escaped);
    match html.find("</head>") {
        Some(index) => format!("{}{}{}", &html[..index], script, &html[index..]),
        None => format!("{}{}", script, html),
    }
}

fn report(tag: &str, err: ApiError) -> ApiError {
    handle_error(tag, &err);
    err
}
