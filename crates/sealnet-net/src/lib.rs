//! Networking for the SealNet storage network
//!
//! This crate provides:
//! - Protocol messages and their postcard encoding
//! - Content-addressed fragment keys and the fragment store interface
//! - The router interface to the external DHT
//! - TLS material loading with per-instance configuration
//! - The HTTPS server (bounded worker pool) and client transport

pub mod fragment;
pub mod message;
pub mod router;
pub mod server;
pub mod tls;
pub mod transport;

pub use fragment::{FragmentKey, FragmentStore, MemoryFragmentStore, StoreError};
pub use message::{Message, MessageError, MessageKind};
pub use router::{Router, RouterError};
pub use server::{BoundServer, Server, ServerError, ServerSettings};
pub use tls::{ServerTls, TlsError, TrustStore};
pub use transport::{CallState, Transport, TransportConfig, TransportError};
