//! End-to-end tests over real TLS connections on localhost

use async_trait::async_trait;
use parking_lot::Mutex;
use sealnet_core::RoutingKey;
use sealnet_net::{
    FragmentKey, MemoryFragmentStore, Message, MessageKind, Router, RouterError, Server,
    ServerError, ServerSettings, ServerTls, TlsError, Transport, TransportConfig, TransportError,
    TrustStore,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

struct TestMaterial {
    cert_pem: String,
    key_pem: String,
}

fn material() -> TestMaterial {
    let rcgen::CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .unwrap();
    TestMaterial {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    }
}

#[derive(Default)]
struct RecordingRouter {
    routes: HashMap<RoutingKey, SocketAddr>,
    received: Mutex<Vec<Message>>,
    fail: bool,
    delay: Option<Duration>,
}

#[async_trait]
impl Router for RecordingRouter {
    async fn resolve(&self, key: &RoutingKey) -> Option<SocketAddr> {
        self.routes.get(key).copied()
    }

    async fn receive(&self, message: Message) -> Result<(), RouterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RouterError::Rejected("refusing everything".into()));
        }
        self.received.lock().push(message);
        Ok(())
    }
}

struct Running {
    addr: SocketAddr,
    router: Arc<RecordingRouter>,
    store: Arc<MemoryFragmentStore>,
    shutdown: broadcast::Sender<()>,
    handle: tokio::task::JoinHandle<Result<(), ServerError>>,
}

fn start(material: &TestMaterial, router: RecordingRouter) -> Running {
    let settings = ServerSettings {
        listen: "127.0.0.1:0".parse().unwrap(),
        workers: 4,
        ..Default::default()
    };
    let tls = ServerTls::from_pem(material.cert_pem.as_bytes(), material.key_pem.as_bytes()).unwrap();
    let router = Arc::new(router);
    let store = Arc::new(MemoryFragmentStore::new());

    let server = Server::bind(settings, &tls, router.clone(), store.clone()).unwrap();
    let addr = server.local_addr();
    let (shutdown, rx) = broadcast::channel(1);
    let handle = tokio::spawn(server.run(rx));

    Running {
        addr,
        router,
        store,
        shutdown,
        handle,
    }
}

fn client(material: &TestMaterial, config: TransportConfig) -> Transport {
    let trust = TrustStore::from_pem(material.cert_pem.as_bytes()).unwrap();
    Transport::new(config, &trust).unwrap()
}

#[tokio::test]
async fn test_message_delivery() {
    let material = material();
    let running = start(&material, RecordingRouter::default());
    let transport = client(&material, TransportConfig::default());

    let message = Message::share("bob", vec![1, 2, 3]);
    transport
        .send_message(&message, "127.0.0.1", running.addr.port())
        .await
        .unwrap();

    let received = running.router.received.lock().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], message);
    assert_eq!(received[0].payload, vec![1, 2, 3]);

    running.shutdown.send(()).unwrap();
    running.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_fragment_store_and_fetch() {
    let material = material();
    let running = start(&material, RecordingRouter::default());
    let transport = client(&material, TransportConfig::default());
    let port = running.addr.port();

    let data = b"some encrypted fragment bytes".to_vec();
    let key = FragmentKey::for_content(&data);
    transport
        .store_fragment("127.0.0.1", port, &key, data.clone())
        .await
        .unwrap();
    assert_eq!(running.store.len(), 1);

    let fetched = transport.fetch_fragment("127.0.0.1", port, &key).await.unwrap();
    assert_eq!(fetched, data);

    let missing = FragmentKey::for_content(b"never stored");
    assert!(matches!(
        transport.fetch_fragment("127.0.0.1", port, &missing).await,
        Err(TransportError::NonSuccessStatus(404))
    ));
}

#[tokio::test]
async fn test_fragment_hash_mismatch_rejected() {
    let material = material();
    let running = start(&material, RecordingRouter::default());
    let transport = client(&material, TransportConfig::default());

    let key = FragmentKey::for_content(b"one thing");
    assert!(matches!(
        transport
            .store_fragment("127.0.0.1", running.addr.port(), &key, b"another".to_vec())
            .await,
        Err(TransportError::NonSuccessStatus(422))
    ));
    assert!(running.store.is_empty());
}

#[tokio::test]
async fn test_fetch_over_limit() {
    let material = material();
    let running = start(&material, RecordingRouter::default());

    let data = vec![7u8; 4096];
    let key = FragmentKey::for_content(&data);
    client(&material, TransportConfig::default())
        .store_fragment("127.0.0.1", running.addr.port(), &key, data)
        .await
        .unwrap();

    let small = client(
        &material,
        TransportConfig {
            max_fragment_size: 1024,
            ..Default::default()
        },
    );
    assert!(matches!(
        small.fetch_fragment("127.0.0.1", running.addr.port(), &key).await,
        Err(TransportError::TooLarge { limit: 1024 })
    ));
}

#[tokio::test]
async fn test_router_failure_is_server_error() {
    let material = material();
    let running = start(
        &material,
        RecordingRouter {
            fail: true,
            ..Default::default()
        },
    );
    let transport = client(&material, TransportConfig::default());

    let message = Message::echo(RoutingKey([1; 32]));
    assert!(matches!(
        transport.send_message(&message, "127.0.0.1", running.addr.port()).await,
        Err(TransportError::NonSuccessStatus(500))
    ));
}

#[tokio::test]
async fn test_deliver_through_router() {
    let material = material();
    let running = start(&material, RecordingRouter::default());
    let transport = client(&material, TransportConfig::default());

    let target = RoutingKey::for_username("bob");
    let mut routes = HashMap::new();
    routes.insert(target, running.addr);
    let lookup = RecordingRouter {
        routes,
        ..Default::default()
    };

    let message = Message::new(MessageKind::Share, target, vec![9]);
    transport.deliver(&lookup, &message).await.unwrap();
    assert_eq!(running.router.received.lock().len(), 1);

    let unknown = Message::echo(RoutingKey([2; 32]));
    assert!(matches!(
        transport.deliver(&lookup, &unknown).await,
        Err(TransportError::NoRoute(key)) if key == RoutingKey([2; 32])
    ));
}

/// Storing to an address where nothing listens fails within the connect timeout.
#[tokio::test]
async fn test_unreachable_peer() {
    let material = material();
    let port = free_port();

    let config = TransportConfig {
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let transport = client(&material, config);

    let data = b"fragment".to_vec();
    let key = FragmentKey::for_content(&data);
    let started = Instant::now();
    let result = transport.store_fragment("127.0.0.1", port, &key, data).await;

    assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    assert!(started.elapsed() < Duration::from_secs(5));
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// A peer that never completes the TCP handshake is abandoned at the connect timeout.
#[tokio::test]
async fn test_stalled_connect_times_out() {
    let material = material();
    let socket = tokio::net::TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    // Fill the accept queue; once it is full, new SYNs go unanswered
    let mut held = Vec::new();
    for _ in 0..64 {
        match tokio::time::timeout(Duration::from_millis(200), tokio::net::TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => held.push(stream),
            _ => break,
        }
    }
    assert!(!held.is_empty());

    let connect_timeout = Duration::from_secs(1);
    let transport = client(
        &material,
        TransportConfig {
            connect_timeout,
            ..Default::default()
        },
    );

    let data = b"fragment".to_vec();
    let key = FragmentKey::for_content(&data);
    let started = Instant::now();
    let result = transport.store_fragment("127.0.0.1", addr.port(), &key, data).await;

    assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    assert!(started.elapsed() < connect_timeout + Duration::from_secs(2));
    drop(listener);
}

/// Unusable TLS material stops startup before anything listens.
#[tokio::test]
async fn test_invalid_tls_material() {
    assert!(matches!(
        ServerTls::from_pem(b"-----BEGIN GARBAGE-----", b"garbage"),
        Err(TlsError::NoCertificates)
    ));

    let ours = material();
    let theirs = material();
    let port = free_port();
    let settings = ServerSettings {
        listen: SocketAddr::from(([127, 0, 0, 1], port)),
        ..Default::default()
    };

    // Certificate and key parse but belong to different pairs
    let mismatched = ServerTls::from_pem(ours.cert_pem.as_bytes(), theirs.key_pem.as_bytes()).unwrap();
    let result = Server::bind(
        settings.clone(),
        &mismatched,
        Arc::new(RecordingRouter::default()),
        Arc::new(MemoryFragmentStore::new()),
    );
    assert!(matches!(result, Err(ServerError::Tls(_))));
    assert!(tokio::net::TcpStream::connect(settings.listen).await.is_err());

    // The same port accepts a server once the material is valid
    let valid = ServerTls::from_pem(ours.cert_pem.as_bytes(), ours.key_pem.as_bytes()).unwrap();
    let server = Server::bind(
        settings.clone(),
        &valid,
        Arc::new(RecordingRouter::default()),
        Arc::new(MemoryFragmentStore::new()),
    )
    .unwrap();
    assert_eq!(server.local_addr().port(), port);
    assert!(tokio::net::TcpStream::connect(settings.listen).await.is_ok());
}

#[tokio::test]
async fn test_bind_conflict_is_fatal() {
    let material = material();
    let running = start(&material, RecordingRouter::default());
    let tls = ServerTls::from_pem(material.cert_pem.as_bytes(), material.key_pem.as_bytes()).unwrap();

    let settings = ServerSettings {
        listen: running.addr,
        ..Default::default()
    };
    let result = Server::bind(
        settings,
        &tls,
        Arc::new(RecordingRouter::default()),
        Arc::new(MemoryFragmentStore::new()),
    );
    assert!(matches!(result, Err(ServerError::Bind { .. })));
}

#[tokio::test]
async fn test_untrusted_server_rejected() {
    let server_material = material();
    let running = start(&server_material, RecordingRouter::default());

    let other = material();
    let transport = client(&other, TransportConfig::default());
    let message = Message::echo(RoutingKey([3; 32]));
    assert!(matches!(
        transport.send_message(&message, "127.0.0.1", running.addr.port()).await,
        Err(TransportError::ConnectFailed(_))
    ));
    assert!(running.router.received.lock().is_empty());
}

#[tokio::test]
async fn test_slow_peer_times_out() {
    let material = material();
    let running = start(
        &material,
        RecordingRouter {
            delay: Some(Duration::from_secs(3)),
            ..Default::default()
        },
    );
    let transport = client(
        &material,
        TransportConfig {
            request_timeout: Duration::from_millis(500),
            ..Default::default()
        },
    );

    let message = Message::echo(RoutingKey([4; 32]));
    assert!(matches!(
        transport.send_message(&message, "127.0.0.1", running.addr.port()).await,
        Err(TransportError::Timeout)
    ));
}

#[tokio::test]
async fn test_server_request_timeout() {
    let material = material();
    let settings = ServerSettings {
        listen: "127.0.0.1:0".parse().unwrap(),
        request_timeout: Duration::from_millis(300),
        ..Default::default()
    };
    let tls = ServerTls::from_pem(material.cert_pem.as_bytes(), material.key_pem.as_bytes()).unwrap();
    let router = Arc::new(RecordingRouter {
        delay: Some(Duration::from_secs(3)),
        ..Default::default()
    });
    let server = Server::bind(settings, &tls, router, Arc::new(MemoryFragmentStore::new())).unwrap();
    let port = server.local_addr().port();
    let (_shutdown, rx) = broadcast::channel(1);
    tokio::spawn(server.run(rx));

    let transport = client(&material, TransportConfig::default());
    let message = Message::echo(RoutingKey([6; 32]));
    assert!(matches!(
        transport.send_message(&message, "127.0.0.1", port).await,
        Err(TransportError::NonSuccessStatus(408))
    ));
}

#[tokio::test]
async fn test_oversized_message_not_sent() {
    let material = material();
    let transport = client(
        &material,
        TransportConfig {
            max_message_size: 64,
            ..Default::default()
        },
    );

    let message = Message::new(MessageKind::Share, RoutingKey([5; 32]), vec![0; 128]);
    assert!(matches!(
        transport.send_message(&message, "127.0.0.1", 1).await,
        Err(TransportError::Codec(_))
    ));
}
