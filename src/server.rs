//! Artifact file server.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Router serving the storage root at `/` plus a health check.
///
/// Paths mirror the storage layout, so an artifact's URL maps straight onto
/// its file: `/<kind>/<namespace>/<name>/<revision>.tar.gz`.
pub fn create_app(storage_root: impl Into<PathBuf>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .fallback_service(ServeDir::new(storage_root.into()))
        .layer(TraceLayer::new_for_http())
}

/// Serve `storage_root` on `addr` until `cancel` fires.
///
/// # Errors
///
/// Returns the I/O error from binding or serving.
pub async fn run_server(
    addr: SocketAddr,
    storage_root: PathBuf,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, root = %storage_root.display(), "Artifact server listening");

    axum::serve(listener, create_app(storage_root))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_serves_stored_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("http/default/site")).unwrap();
        std::fs::write(root.path().join("http/default/site/abc.tar.gz"), b"archive").unwrap();

        let response = create_app(root.path())
            .oneshot(
                Request::builder()
                    .uri("/http/default/site/abc.tar.gz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"archive");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let response = create_app(root.path())
            .oneshot(Request::builder().uri("/http/default/site/none.tar.gz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let root = tempfile::tempdir().unwrap();
        let response = create_app(root.path())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
