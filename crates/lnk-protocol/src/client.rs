use std::time::Duration;

use async_trait::async_trait;
use lnk_store::{Store, StoreError, StoreResult};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::codec::{read_message, write_message};
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{store_error, StoreMessage};

/// Timeouts for remote store calls.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Limit on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Limit on one request/response exchange.
    pub call_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// [`Store`] implementation that calls a remote [`RpcServer`](crate::RpcServer).
///
/// Holds one connection, opened on first use and reopened on the next call
/// after any failure. Calls are serialized over that connection. No call is
/// retried.
pub struct RpcClient {
    addr: String,
    config: ClientConfig,
    conn: Mutex<Option<TcpStream>>,
}

impl RpcClient {
    pub fn new(addr: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            addr: addr.into(),
            config,
            conn: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and wait for its response.
    pub async fn call(&self, request: StoreMessage) -> ProtocolResult<StoreMessage> {
        let mut conn = self.conn.lock().await;
        let mut stream = match conn.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        let exchange = async {
            write_message(&mut stream, &request).await?;
            read_message(&mut stream)
                .await?
                .ok_or(ProtocolError::ConnectionClosed)
        };
        let outcome = match timeout(self.config.call_timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProtocolError::Timeout {
                operation: request.method().unwrap_or("call"),
                millis: self.config.call_timeout.as_millis(),
            }),
        };

        match outcome {
            Ok(response) => {
                *conn = Some(stream);
                Ok(response)
            }
            Err(e) => {
                warn!(addr = %self.addr, error = %e, "RPC call failed; dropping connection");
                Err(e)
            }
        }
    }

    async fn connect(&self) -> ProtocolResult<TcpStream> {
        let stream = timeout(self.config.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ProtocolError::Timeout {
                operation: "connect",
                millis: self.config.connect_timeout.as_millis(),
            })??;
        stream.set_nodelay(true)?;
        debug!(addr = %self.addr, "RPC connection established");
        Ok(stream)
    }
}

fn unexpected(got: &StoreMessage, expected: &'static str) -> StoreError {
    remote(ProtocolError::UnexpectedMessage {
        got: got.type_name(),
        expected,
    })
}

fn remote(err: ProtocolError) -> StoreError {
    StoreError::Remote(err.to_string())
}

#[async_trait]
impl Store for RpcClient {
    async fn put(&self, url: String) -> StoreResult<String> {
        match self.call(StoreMessage::Put { url }).await.map_err(remote)? {
            StoreMessage::Key { key } => Ok(key),
            StoreMessage::Error { code, message } => Err(store_error(code, message, None)),
            other => Err(unexpected(&other, "Key")),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        let request = StoreMessage::Get {
            key: key.to_string(),
        };
        match self.call(request).await.map_err(remote)? {
            StoreMessage::Value { url } => Ok(url),
            StoreMessage::Error { code, message } => Err(store_error(code, message, Some(key))),
            other => Err(unexpected(&other, "Value")),
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("addr", &self.addr)
            .field("config", &self.config)
            .finish()
    }
}
