use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use lnk_store::Store;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::codec::{read_message, write_message};
use crate::error::ProtocolResult;
use crate::message::{codes, StoreMessage};

/// Exposes a [`Store`] as `Store.Get` / `Store.Put` over TCP.
///
/// Each connection is served by its own task and handles requests one at a
/// time, in order.
pub struct RpcServer {
    store: Arc<dyn Store>,
}

impl RpcServer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ProtocolResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local = listener.local_addr()?;
        info!(addr = %local, "RPC server listening");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(addr = %local, "RPC server stopping");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(store, stream, peer).await {
                            warn!(%peer, error = %e, "RPC connection ended with error");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    store: Arc<dyn Store>,
    mut stream: TcpStream,
    peer: SocketAddr,
) -> ProtocolResult<()> {
    debug!(%peer, "RPC connection opened");
    while let Some(request) = read_message(&mut stream).await? {
        let response = dispatch(store.as_ref(), request).await;
        write_message(&mut stream, &response).await?;
    }
    debug!(%peer, "RPC connection closed");
    Ok(())
}

/// Run one request against `store` and build its response.
pub async fn dispatch(store: &dyn Store, request: StoreMessage) -> StoreMessage {
    match request {
        StoreMessage::Get { key } => match store.get(&key).await {
            Ok(url) => StoreMessage::Value { url },
            Err(e) => StoreMessage::from_store_error(&e),
        },
        StoreMessage::Put { url } => match store.put(url).await {
            Ok(key) => StoreMessage::Key { key },
            Err(e) => StoreMessage::from_store_error(&e),
        },
        other => StoreMessage::Error {
            code: codes::BAD_REQUEST,
            message: format!("{} is not a request", other.type_name()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnk_store::PrimaryStore;

    #[tokio::test]
    async fn dispatch_put_then_get() {
        let store = PrimaryStore::in_memory();
        let reply = dispatch(&store, StoreMessage::Put { url: "a.com".into() }).await;
        assert_eq!(reply, StoreMessage::Key { key: "0".into() });

        let reply = dispatch(&store, StoreMessage::Get { key: "0".into() }).await;
        assert_eq!(reply, StoreMessage::Value { url: "a.com".into() });
    }

    #[tokio::test]
    async fn dispatch_missing_key() {
        let store = PrimaryStore::in_memory();
        let reply = dispatch(&store, StoreMessage::Get { key: "0".into() }).await;
        assert!(matches!(
            reply,
            StoreMessage::Error { code: codes::NOT_FOUND, .. }
        ));
    }

    #[tokio::test]
    async fn dispatch_rejects_responses_as_requests() {
        let store = PrimaryStore::in_memory();
        let reply = dispatch(&store, StoreMessage::Key { key: "0".into() }).await;
        assert!(matches!(
            reply,
            StoreMessage::Error { code: codes::BAD_REQUEST, .. }
        ));
    }
}
