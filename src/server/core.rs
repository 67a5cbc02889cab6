use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use log::{error, info};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::middleware::log_requests;
use crate::protocol::AppState;
use crate::protocol::handlers::{delete_file, download_file, list_files, serve_index, upload_file};
use crate::storage::PathGuard;

pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    /// Prepares the storage root and binds the listener.
    pub async fn new(config: ServerConfig) -> io::Result<Self> {
        let storage_root = config.storage_root();
        if let Err(e) = std::fs::create_dir_all(&storage_root) {
            error!(
                "Failed to create storage directory {}: {}",
                storage_root.display(),
                e
            );
            return Err(e);
        }

        let guard = PathGuard::new(&storage_root)?;
        info!("Storage directory: {}", guard.resolved_root().display());
        info!("Root path: {}", config.root_path);

        let addr = config.socket_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("Server bound to {}", addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", addr, e);
                return Err(e);
            }
        };

        let router = build_router(AppState::new(config, guard));
        Ok(Self { listener, router })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until Ctrl-C.
    pub async fn start(self) -> io::Result<()> {
        let addr = self.local_addr()?;
        info!("Starting filedock server on http://{}", addr);

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        info!("Server stopped");
        Ok(())
    }
}

/// Builds the application router, mounted under the configured root path.
pub fn build_router(state: AppState) -> Router {
    let root = state.config.root_path.clone();

    let mut router = Router::new()
        .route(&mount(&root, "/"), get(serve_index))
        .route(&mount(&root, "/api/files"), get(list_files))
        .route(
            &mount(&root, "/api/upload"),
            post(upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route(&mount(&root, "/api/download/{*path}"), get(download_file))
        .route(&mount(&root, "/api/delete/{*path}"), delete(delete_file));

    if root != "/" {
        router = router.route(&format!("{}/", root), get(serve_index));
    }

    router
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn mount(root: &str, path: &str) -> String {
    match (root, path) {
        ("/", _) => path.to_string(),
        (_, "/") => root.to_string(),
        _ => format!("{}{}", root, path),
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
