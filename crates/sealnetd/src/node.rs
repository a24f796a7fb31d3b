//! sealnetd node - wiring and service loop

use anyhow::Context;
use sealnet_core::{Identity, RoutingKey};
use sealnet_net::{
    BoundServer, Message, MessageKind, Server, ServerError, ServerTls, Transport, TrustStore,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::identity_file;
use crate::router::StaticRouter;
use crate::storage::Storage;

/// Metadata key holding the node's identity fingerprint
pub const FINGERPRINT_KEY: &str = "identity_fingerprint";

/// A storage node
pub struct Node {
    config: Config,
    identity: Identity,
    storage: Arc<Storage>,
    router: Arc<StaticRouter>,
    /// Present when trust roots are configured
    transport: Option<Transport>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Node {
    /// Open storage, load or create the identity and build the router
    pub fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let storage = Arc::new(
            Storage::open(&config.data_dir)
                .with_context(|| format!("opening storage at {}", config.data_dir.display()))?,
        );

        let identity = identity_file::load_or_create(&config.identity_path())?;
        storage.put_metadata(FINGERPRINT_KEY, identity.public().fingerprint_hex().as_bytes())?;

        let router = Arc::new(StaticRouter::new(
            &config.route,
            config.fallback,
            storage.clone(),
            config.max_inbox,
        ));

        let transport = match &config.trust_roots {
            Some(path) => {
                let trust = TrustStore::load(path)?;
                Some(Transport::new(config.transport_config(), &trust)?)
            }
            None => None,
        };

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(
            fingerprint = %identity.public(),
            routes = router.route_count(),
            outbound = transport.is_some(),
            "Node initialized"
        );

        Ok(Self {
            config,
            identity,
            storage,
            router,
            transport,
            shutdown_tx,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn transport(&self) -> Option<&Transport> {
        self.transport.as_ref()
    }

    /// Signal the service loop to stop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Load TLS material and bind the listener. Any failure is fatal.
    pub fn bind(&self) -> Result<BoundServer, ServerError> {
        let tls = ServerTls::load(&self.config.tls_cert, &self.config.tls_key)?;
        Server::bind(
            self.config.server_settings(),
            &tls,
            self.router.clone(),
            self.storage.clone(),
        )
    }

    /// Serve on a bound listener until shutdown, then flush storage
    pub async fn serve(&self, server: BoundServer) -> anyhow::Result<()> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        info!(addr = %server.local_addr(), "Starting sealnetd");

        self.announce();
        server.run(shutdown_rx).await?;

        self.storage.flush()?;
        info!("Storage flushed");
        Ok(())
    }

    /// Bind and serve
    pub async fn run(&self) -> anyhow::Result<()> {
        let server = self.bind()?;
        self.serve(server).await
    }

    /// Send a join message to the fallback peer, if there is one
    fn announce(&self) {
        let (Some(transport), Some(peer)) = (self.transport.clone(), self.config.fallback) else {
            return;
        };
        let public = *self.identity.public();
        let message = Message::new(
            MessageKind::Join,
            RoutingKey(public.fingerprint()),
            public.export(),
        );

        tokio::spawn(async move {
            match transport
                .send_message(&message, &peer.ip().to_string(), peer.port())
                .await
            {
                Ok(()) => info!(%peer, "Announced to fallback peer"),
                Err(e) => warn!(%peer, error = %e, "Announce failed"),
            }
        });
    }
}
