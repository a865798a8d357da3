use std::future::Future;
use std::sync::Arc;

use lnk_protocol::{RpcClient, RpcServer};
use lnk_store::{PrimaryStore, ReplicaStore, Store};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// The store a process serves, plus the primary behind it when it owns one.
pub struct Backend {
    pub store: Arc<dyn Store>,
    pub primary: Option<Arc<PrimaryStore>>,
}

impl Backend {
    /// Open the primary store, or connect a replica when `master` is set.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &ServerConfig) -> Self {
        match &config.master {
            Some(master) => {
                info!(%master, "running as replica");
                let remote = RpcClient::new(master.clone(), config.client_config());
                Self {
                    store: Arc::new(ReplicaStore::new(Arc::new(remote))),
                    primary: None,
                }
            }
            None => {
                let primary = Arc::new(PrimaryStore::open(config.primary_config()));
                Self {
                    store: primary.clone(),
                    primary: Some(primary),
                }
            }
        }
    }

    /// Flush and close the primary store, if any.
    pub async fn close(&self) -> ServerResult<()> {
        if let Some(primary) = &self.primary {
            primary.close().await?;
        }
        Ok(())
    }
}

/// Lnk HTTP + RPC server.
pub struct LnkServer {
    config: ServerConfig,
}

impl LnkServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router around `store` (useful for testing).
    pub fn router(&self, store: Arc<dyn Store>) -> axum::Router {
        build_router(AppState::new(
            store,
            self.config.hostname.clone(),
            self.config.role(),
        ))
    }

    /// Serve HTTP (and RPC when enabled) until `shutdown` resolves, then close
    /// the store so every queued record reaches the log.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        // Bind before opening the store so a bind failure leaves no writer behind.
        let http = TcpListener::bind(self.config.http_addr).await?;
        let rpc = match self.config.rpc_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };

        info!(role = self.config.role(), "Lnk HTTP listening on {}", http.local_addr()?);

        let backend = Backend::from_config(&self.config);
        let app = self.router(Arc::clone(&backend.store));

        let (stop_tx, stop_rx) = watch::channel(false);

        let http_rx = stop_rx.clone();
        let http_task = async move {
            axum::serve(http, app)
                .with_graceful_shutdown(stopped(http_rx))
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))
        };

        let rpc_store = Arc::clone(&backend.store);
        let rpc_task = async move {
            match rpc {
                Some(listener) => RpcServer::new(rpc_store)
                    .serve(listener, stopped(stop_rx))
                    .await
                    .map_err(ServerError::from),
                None => Ok(()),
            }
        };

        let servers = async { tokio::try_join!(http_task, rpc_task).map(|_| ()) };
        tokio::pin!(servers);
        tokio::pin!(shutdown);

        let result = tokio::select! {
            result = &mut servers => result,
            _ = &mut shutdown => {
                info!("shutdown requested");
                let _ = stop_tx.send(true);
                (&mut servers).await
            }
        };

        backend.close().await?;
        result
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
