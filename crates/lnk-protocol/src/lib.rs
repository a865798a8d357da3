//! Wire protocol for Lnk.
//!
//! Carries the two remotely callable store operations, `Store.Get` and
//! `Store.Put`, as length-prefixed bincode frames over TCP. [`RpcServer`]
//! exposes any [`lnk_store::Store`]; [`RpcClient`] is itself a `Store`, which
//! is what a replica delegates to.

pub mod client;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod server;

pub use client::{ClientConfig, RpcClient};
pub use codec::{read_message, write_message, LnkCodec};
pub use endpoint::{endpoints, HealthResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{codes, methods, StoreMessage, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
pub use server::RpcServer;
