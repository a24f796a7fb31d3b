//! TLS material: server certificate chains and client trust roots
//!
//! Configurations are built per instance with an explicit crypto provider;
//! nothing is installed process-wide.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// TLS setup errors
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No certificates found in PEM input")]
    NoCertificates,
    #[error("No private key found in PEM input")]
    NoPrivateKey,
    #[error("No trust roots configured")]
    NoTrustRoots,
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("Client setup failed: {0}")]
    Client(String),
}

fn read_file(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = BufReader::new(pem);
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .filter_map(|c| c.ok())
        .collect();
    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    Ok(certs)
}

// =============================================================================
// SERVER
// =============================================================================

/// Certificate chain and private key presented by a server
pub struct ServerTls {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ServerTls {
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsError> {
        let chain = parse_certs(cert_pem)?;
        let mut reader = BufReader::new(key_pem);
        let key = rustls_pemfile::private_key(&mut reader)
            .ok()
            .flatten()
            .ok_or(TlsError::NoPrivateKey)?;
        Ok(Self { chain, key })
    }

    /// Load PEM files from disk
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        Self::from_pem(&read_file(cert_path)?, &read_file(key_path)?)
    }

    /// Immutable server config: no client auth, ALPN `h2` then `http/1.1`
    pub fn server_config(&self) -> Result<Arc<rustls::ServerConfig>, TlsError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(self.chain.clone(), self.key.clone_key())?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Ok(Arc::new(config))
    }
}

impl std::fmt::Debug for ServerTls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerTls")
            .field("chain_len", &self.chain.len())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Certificates a client accepts as roots. Nothing else is trusted.
#[derive(Clone, Debug)]
pub struct TrustStore {
    roots: Vec<CertificateDer<'static>>,
}

impl TrustStore {
    pub fn from_pem(pem: &[u8]) -> Result<Self, TlsError> {
        let roots = parse_certs(pem).map_err(|e| match e {
            TlsError::NoCertificates => TlsError::NoTrustRoots,
            other => other,
        })?;
        Ok(Self { roots })
    }

    pub fn load(path: &Path) -> Result<Self, TlsError> {
        Self::from_pem(&read_file(path)?)
    }

    pub fn roots(&self) -> &[CertificateDer<'static>] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> (String, String) {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (cert.pem(), key_pair.serialize_pem())
    }

    #[test]
    fn test_server_config_from_pem() {
        let (cert, key) = self_signed();
        let tls = ServerTls::from_pem(cert.as_bytes(), key.as_bytes()).unwrap();
        let config = tls.server_config().unwrap();
        assert_eq!(config.alpn_protocols[0], b"h2");
        assert!(format!("{:?}", tls).contains("REDACTED"));
    }

    #[test]
    fn test_garbage_material_rejected() {
        let (cert, _) = self_signed();
        assert!(matches!(
            ServerTls::from_pem(b"not a certificate", b"nor a key"),
            Err(TlsError::NoCertificates)
        ));
        assert!(matches!(
            ServerTls::from_pem(cert.as_bytes(), b"nor a key"),
            Err(TlsError::NoPrivateKey)
        ));
    }

    #[test]
    fn test_trust_store() {
        let (cert, _) = self_signed();
        let store = TrustStore::from_pem(cert.as_bytes()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(matches!(
            TrustStore::from_pem(b""),
            Err(TlsError::NoTrustRoots)
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = TrustStore::load(Path::new("/nonexistent/roots.pem")).unwrap_err();
        assert!(matches!(err, TlsError::Io { .. }));
    }
}
