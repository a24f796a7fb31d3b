//! Routing interface
//!
//! The DHT lives outside this crate. The transport only needs to turn a
//! routing key into an address and to hand inbound messages to someone.

use async_trait::async_trait;
use sealnet_core::RoutingKey;
use std::net::SocketAddr;
use thiserror::Error;

use crate::message::Message;

/// Router errors
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Message rejected: {0}")]
    Rejected(String),
    #[error("Router backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Router: Send + Sync {
    /// Address of the node responsible for `key`, if known
    async fn resolve(&self, key: &RoutingKey) -> Option<SocketAddr>;

    /// Accept a message delivered to this node
    async fn receive(&self, message: Message) -> Result<(), RouterError>;
}
