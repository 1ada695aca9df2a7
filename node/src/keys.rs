//! Node key file: the hex-encoded 32-byte signing seed on one line.

use std::path::Path;

use drawtree_crypto::{generate_keypair, keypair_from_hex, private_key_hex};
use drawtree_types::KeyPair;

use crate::NodeError;

pub fn load_keypair(path: &Path) -> Result<KeyPair, NodeError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| NodeError::KeyFile(format!("{}: {e}", path.display())))?;
    Ok(keypair_from_hex(&content)?)
}

pub fn save_keypair(path: &Path, keys: &KeyPair) -> Result<(), NodeError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, format!("{}\n", private_key_hex(&keys.private)))
        .map_err(|e| NodeError::KeyFile(format!("{}: {e}", path.display())))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Load the key file, creating it with fresh keys if it does not exist.
pub fn load_or_generate(path: &Path) -> Result<KeyPair, NodeError> {
    if path.exists() {
        return load_keypair(path);
    }
    let keys = generate_keypair()?;
    save_keypair(path, &keys)?;
    tracing::info!(path = %path.display(), account = %keys.account(), "generated new node key");
    Ok(keys)
}
