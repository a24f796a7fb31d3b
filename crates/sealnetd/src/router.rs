//! Static routing table backed by the node's inbox

use async_trait::async_trait;
use parking_lot::Mutex;
use sealnet_core::RoutingKey;
use sealnet_net::{Message, Router, RouterError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Route;
use crate::storage::Storage;

/// Routes from configuration, with an optional catch-all peer
pub struct StaticRouter {
    routes: HashMap<RoutingKey, SocketAddr>,
    fallback: Option<SocketAddr>,
    storage: Arc<Storage>,
    max_inbox: usize,
    /// Serializes the inbox length check with the append
    inbox_lock: Mutex<()>,
}

impl StaticRouter {
    pub fn new(
        routes: &[Route],
        fallback: Option<SocketAddr>,
        storage: Arc<Storage>,
        max_inbox: usize,
    ) -> Self {
        Self {
            routes: routes.iter().map(|r| (r.key, r.addr)).collect(),
            fallback,
            storage,
            max_inbox,
            inbox_lock: Mutex::new(()),
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn fallback(&self) -> Option<SocketAddr> {
        self.fallback
    }
}

#[async_trait]
impl Router for StaticRouter {
    async fn resolve(&self, key: &RoutingKey) -> Option<SocketAddr> {
        self.routes.get(key).copied().or(self.fallback)
    }

    async fn receive(&self, message: Message) -> Result<(), RouterError> {
        let id = {
            let _guard = self.inbox_lock.lock();
            if self.storage.inbox_len() >= self.max_inbox {
                warn!(
                    kind = message.name(),
                    max_inbox = self.max_inbox,
                    "Inbox full, refusing message"
                );
                return Err(RouterError::Rejected(format!(
                    "inbox full ({} messages)",
                    self.max_inbox
                )));
            }
            self.storage
                .append_inbox(&message)
                .map_err(|e| RouterError::Backend(e.to_string()))?
        };
        info!(
            kind = message.name(),
            target = %message.target,
            inbox_id = id,
            "Message queued"
        );
        Ok(())
    }
}
