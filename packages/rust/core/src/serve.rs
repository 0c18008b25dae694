//! Ephemeral local content server for URL-only transforms.
//!
//! Serves files under the source root at `/source/{*path}` on a loopback
//! port chosen by the OS. Only plain relative paths are served; anything
//! that would escape the root is answered with `400`.

use std::net::SocketAddr;
use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use apidiagram_shared::{DiagramError, DocumentFormat, Result};

/// First path segment of every served document URL.
pub const SERVE_PREFIX: &str = "source";

/// A running content server. Stops when [`ContentServer::shutdown`] is
/// awaited or, failing that, when dropped.
#[derive(Debug)]
pub struct ContentServer {
    base_url: Url,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ContentServer {
    /// Bind `127.0.0.1:0` and start serving `root`.
    pub async fn start(root: &FsPath) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| DiagramError::io(root, e))?;

        let app = Router::new()
            .route(&format!("/{SERVE_PREFIX}/{{*path}}"), get(serve_document))
            .with_state(Arc::new(root.clone()));

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| DiagramError::Server(format!("bind {addr}: {e}")))?;
        let local = listener
            .local_addr()
            .map_err(|e| DiagramError::Server(format!("local address: {e}")))?;

        let base_url = Url::parse(&format!("http://{local}/"))
            .map_err(|e| DiagramError::Server(format!("base URL: {e}")))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "content server stopped with an error");
            }
        });

        info!(address = %local, root = %root.display(), "content server started");

        Ok(Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "content server task failed");
            }
        }
        debug!("content server stopped");
    }
}

impl Drop for ContentServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

async fn serve_document(State(root): State<Arc<PathBuf>>, Path(path): Path<String>) -> Response {
    let relative = PathBuf::from(&path);
    let is_plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !is_plain {
        debug!(%path, "rejected non-relative request path");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let full = root.join(&relative);

    // Symlinks may still point outside the root.
    match full.canonicalize() {
        Ok(resolved) if resolved.starts_with(root.as_path()) => {}
        Ok(_) => return StatusCode::BAD_REQUEST.into_response(),
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    }

    match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_file() => {}
        _ => return StatusCode::NOT_FOUND.into_response(),
    }

    let body = match tokio::fs::read(&full).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %full.display(), error = %e, "failed to read served document");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let content_type = DocumentFormat::from_path(&full)
        .map_or("text/plain; charset=utf-8", |format| format.content_type());

    ([(header::CONTENT_TYPE, content_type)], Body::from(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "apidiagram-serve-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn serves_documents_with_their_content_type() {
        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("src/team")).unwrap();
        std::fs::write(tmp.join("src/team/api.yaml"), "openapi: 3.0.0\n").unwrap();
        std::fs::write(tmp.join("src/api.json"), "{}").unwrap();

        let server = ContentServer::start(&tmp.join("src")).await.unwrap();
        let base = server.base_url().clone();
        assert_eq!(base.host_str(), Some("127.0.0.1"));

        let yaml = reqwest::get(base.join("source/team/api.yaml").unwrap())
            .await
            .unwrap();
        assert_eq!(yaml.status(), 200);
        assert_eq!(
            yaml.headers()[reqwest::header::CONTENT_TYPE],
            DocumentFormat::Yaml.content_type()
        );
        assert_eq!(yaml.text().await.unwrap(), "openapi: 3.0.0\n");

        let json = reqwest::get(base.join("source/api.json").unwrap())
            .await
            .unwrap();
        assert_eq!(
            json.headers()[reqwest::header::CONTENT_TYPE],
            DocumentFormat::Json.content_type()
        );

        server.shutdown().await;
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn missing_files_and_directories_are_not_found() {
        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("src/team")).unwrap();

        let server = ContentServer::start(&tmp.join("src")).await.unwrap();
        let base = server.base_url().clone();

        let missing = reqwest::get(base.join("source/nope.yaml").unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let dir = reqwest::get(base.join("source/team").unwrap()).await.unwrap();
        assert_eq!(dir.status(), 404);

        server.shutdown().await;
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn escaping_the_root_is_rejected() {
        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("src")).unwrap();
        std::fs::write(tmp.join("secret.yaml"), "token: x\n").unwrap();

        let server = ContentServer::start(&tmp.join("src")).await.unwrap();
        let url = format!("{}source/..%2Fsecret.yaml", server.base_url());

        let response = reqwest::get(url).await.unwrap();
        assert_eq!(response.status(), 400);

        server.shutdown().await;
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn missing_root_fails_to_start() {
        let tmp = temp_dir();
        let err = ContentServer::start(&tmp.join("absent")).await.unwrap_err();
        assert!(matches!(err, DiagramError::Io { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
