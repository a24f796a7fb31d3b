//! sealnetd - SealNet storage node
//!
//! This daemon provides:
//! - The HTTPS endpoint for protocol messages and fragments
//! - A sled-backed fragment store and message inbox
//! - A static routing table with an optional fallback peer
//! - Persistent node identity

pub mod config;
pub mod identity_file;
pub mod node;
pub mod router;
pub mod storage;

pub use config::Config;
pub use node::Node;
pub use router::StaticRouter;
pub use storage::Storage;
