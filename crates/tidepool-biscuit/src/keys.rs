//! Keypair management for session tokens.

use crate::error::BiscuitError;
use biscuit_auth::{Algorithm, KeyPair as BiscuitKeyPair, PrivateKey, PublicKey};
use rand::RngCore;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the private key inside a key directory.
pub const PRIVATE_KEY_FILE: &str = "private.key";
/// File name of the public key inside a key directory.
pub const PUBLIC_KEY_FILE: &str = "public.key";

/// An Ed25519 keypair for signing and verifying session tokens.
pub struct KeyPair {
    inner: BiscuitKeyPair,
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_private_key(self.inner.private())
    }
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Result<Self, BiscuitError> {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);

        let private_key = PrivateKey::from_bytes(&bytes, Algorithm::Ed25519)
            .map_err(|e| BiscuitError::KeyGenerationFailed(e.to_string()))?;
        Ok(Self::from_private_key(private_key))
    }

    /// Create a keypair from an existing private key.
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        Self {
            inner: BiscuitKeyPair::from(&private_key),
        }
    }

    /// Load a keypair from a hex-encoded private key string.
    pub fn from_private_key_hex(hex: &str) -> Result<Self, BiscuitError> {
        let private_key = PrivateKey::from_bytes_hex(hex.trim(), Algorithm::Ed25519)
            .map_err(|e| BiscuitError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_private_key(private_key))
    }

    /// Load a keypair from a private key file.
    pub fn load_from_file(private_key_path: &Path) -> Result<Self, BiscuitError> {
        let hex = fs::read_to_string(private_key_path)?;
        Self::from_private_key_hex(&hex)
    }

    /// Get the inner biscuit keypair.
    pub fn inner(&self) -> &BiscuitKeyPair {
        &self.inner
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        self.inner.public()
    }

    /// Get the private key as hex string.
    pub fn private_key_hex(&self) -> String {
        self.inner.private().to_bytes_hex()
    }

    /// Get the public key as hex string.
    pub fn public_key_hex(&self) -> String {
        self.inner.public().to_bytes_hex()
    }

    /// Write `private.key` and `public.key` into `dir`, creating it if needed.
    pub fn save_to_dir(&self, dir: &Path) -> Result<(PathBuf, PathBuf), BiscuitError> {
        fs::create_dir_all(dir)?;
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);
        fs::write(&private_path, self.private_key_hex())?;
        fs::write(&public_path, self.public_key_hex())?;
        Ok((private_path, public_path))
    }
}

/// Load a public key from hex string (for verification-only scenarios).
pub fn load_public_key_hex(hex: &str) -> Result<PublicKey, BiscuitError> {
    PublicKey::from_bytes_hex(hex.trim(), Algorithm::Ed25519)
        .map_err(|e| BiscuitError::InvalidPublicKey(e.to_string()))
}

/// Load a public key from a file.
pub fn load_public_key_file(path: &Path) -> Result<PublicKey, BiscuitError> {
    let hex = fs::read_to_string(path)?;
    load_public_key_hex(&hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_keypair_roundtrip() {
        let keypair1 = KeyPair::generate().unwrap();
        let keypair2 = KeyPair::from_private_key_hex(&keypair1.private_key_hex()).unwrap();
        assert_eq!(keypair1.public_key_hex(), keypair2.public_key_hex());
    }

    #[test]
    fn test_clone_keeps_key() {
        let keypair = KeyPair::generate().unwrap();
        assert_eq!(keypair.clone().public_key_hex(), keypair.public_key_hex());
    }

    #[test]
    fn test_save_and_load_dir() {
        let dir = tempdir().unwrap();
        let keypair = KeyPair::generate().unwrap();
        let (private_path, public_path) = keypair.save_to_dir(dir.path()).unwrap();

        // Hex keys are 64 characters (32 bytes)
        assert_eq!(fs::read_to_string(&private_path).unwrap().len(), 64);

        let loaded = KeyPair::load_from_file(&private_path).unwrap();
        assert_eq!(loaded.public_key_hex(), keypair.public_key_hex());

        let public = load_public_key_file(&public_path).unwrap();
        assert_eq!(public.to_bytes_hex(), keypair.public_key_hex());
    }

    #[test]
    fn test_invalid_hex_is_rejected() {
        assert!(matches!(
            KeyPair::from_private_key_hex("zz"),
            Err(BiscuitError::InvalidPrivateKey(_))
        ));
        assert!(matches!(
            load_public_key_hex("nothex"),
            Err(BiscuitError::InvalidPublicKey(_))
        ));
    }
}
