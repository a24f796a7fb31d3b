//! On-disk node identity
//!
//! The file holds hex-encoded full credentials. A missing file is replaced
//! by a freshly generated identity; a public-only file is refused.

use anyhow::{bail, Context};
use sealnet_core::{Credentials, Identity};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub fn load_or_create(path: &Path) -> anyhow::Result<Identity> {
    if path.exists() {
        return load(path);
    }

    let identity = Identity::random();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut file = create_private(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(hex::encode(identity.serialize()).as_bytes())
        .and_then(|()| file.sync_all())
        .with_context(|| format!("writing {}", path.display()))?;

    info!(
        path = %path.display(),
        fingerprint = %identity.public(),
        "Generated new identity"
    );
    Ok(identity)
}

pub fn load(path: &Path) -> anyhow::Result<Identity> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let bytes = hex::decode(text.trim()).with_context(|| format!("decoding {}", path.display()))?;
    let credentials = Credentials::deserialize(&bytes)
        .with_context(|| format!("parsing {}", path.display()))?;

    match credentials.into_identity() {
        Some(identity) => Ok(identity),
        None => bail!(
            "{} holds public keys only; a node needs its secret keys",
            path.display()
        ),
    }
}

/// Create a new file readable only by the owner
#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_then_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys").join("identity.hex");

        let created = load_or_create(&path).unwrap();
        assert!(path.exists());
        let reloaded = load_or_create(&path).unwrap();
        assert_eq!(created, reloaded);
    }

    #[cfg(unix)]
    #[test]
    fn test_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.hex");

        load_or_create(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_public_only_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.hex");
        let identity = Identity::random();
        fs::write(&path, hex::encode(identity.public().export())).unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("public keys only"));
    }

    #[test]
    fn test_garbage_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.hex");
        fs::write(&path, "zz not hex").unwrap();
        assert!(load(&path).is_err());

        fs::write(&path, "0102").unwrap();
        assert!(load(&path).is_err());
    }
}
