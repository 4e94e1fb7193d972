//! HTTP server lifecycle.
//!
//! Binds the listener and spawns the API router on a background task that
//! stops on [`ApiServer::shutdown`].

use std::net::SocketAddr;

use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::HttpConfig;
use crate::error::Error;

/// A single HTTP server hosting the estimator API.
pub struct ApiServer {
    config: HttpConfig,
    router: Option<Router>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(config: HttpConfig, router: Router) -> Self {
        Self {
            config,
            router: Some(router),
            local_addr: None,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Bind the listener and spawn the server. Returns the bound address,
    /// which differs from the configured one when port 0 was requested.
    pub async fn start(&mut self) -> Result<SocketAddr, Error> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let router = self.router.take().ok_or_else(|| Error::Bind {
            addr: addr.clone(),
            source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "server already started"),
        })?;

        let listener = tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| Error::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        tracing::info!("Estimator API listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                    tracing::info!("Estimator API shutting down");
                })
                .await
            {
                tracing::error!("Estimator API server error: {}", e);
            }
        });

        self.handle = Some(handle);
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Signal graceful shutdown and wait for the server task to finish.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::api::{ApiState, EstimatorApi};
    use crate::estimation::{ConfigStore, DurationEstimator, EstimatorConfig, ModelEstimator};

    fn router(dir: &std::path::Path) -> Router {
        let store = Arc::new(ConfigStore::new(EstimatorConfig::default(), dir.join("o.json")));
        EstimatorApi::router(ApiState {
            estimator: Arc::new(DurationEstimator::new(
                store,
                ModelEstimator::new(None, Duration::from_secs(1)),
            )),
            environment: "test".to_string(),
        })
    }

    fn local_config() -> HttpConfig {
        HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }

    #[tokio::test]
    async fn test_serves_health_and_shuts_down() {
        let dir = tempdir().unwrap();
        let mut server = ApiServer::new(local_config(), router(dir.path()));
        let addr = server.start().await.unwrap();
        assert_eq!(server.local_addr(), Some(addr));

        let body: serde_json::Value = reqwest::get(format!("http://{}/api/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "OK");

        server.shutdown().await;
        assert!(reqwest::get(format!("http://{}/api/health", addr)).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let dir = tempdir().unwrap();
        let mut first = ApiServer::new(local_config(), router(dir.path()));
        let addr = first.start().await.unwrap();

        let taken = HttpConfig {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
        };
        let mut second = ApiServer::new(taken, router(dir.path()));
        assert!(matches!(second.start().await, Err(Error::Bind { .. })));

        first.shutdown().await;
    }
}
