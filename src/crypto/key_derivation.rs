//! Key derivation using Argon2id
//!
//! Derives the database key from the master passphrase using Argon2id,
//! a memory-hard key derivation function resistant to GPU/ASIC attacks.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, Params,
};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CofferError, CofferResult};

use super::SecureString;

/// Parameters for key derivation, stored in the clear in the database header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationParams {
    /// Salt for key derivation (base64 encoded)
    pub salt: String,
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism degree (default: 4)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            salt: String::new(), // Will be generated on first use
            memory_cost: 65536,  // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KeyDerivationParams {
    /// Create new params with a random salt and the default cost
    pub fn new() -> Self {
        let defaults = Self::default();
        Self::with_cost(defaults.memory_cost, defaults.time_cost, defaults.parallelism)
    }

    /// Create params with a random salt and a specific cost
    pub fn with_cost(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        let salt = SaltString::generate(&mut OsRng);
        Self {
            salt: salt.to_string(),
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Fresh salt, same cost
    pub fn resalted(&self) -> Self {
        Self::with_cost(self.memory_cost, self.time_cost, self.parallelism)
    }
}

/// A derived encryption key, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    /// The 32-byte key for AES-256
    key: [u8; 32],
}

impl DerivedKey {
    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derive an encryption key from a protected passphrase
pub fn derive_key(passphrase: &SecureString, params: &KeyDerivationParams) -> CofferResult<DerivedKey> {
    passphrase.with_plaintext(|bytes| derive_key_from_bytes(bytes, params))?
}

fn derive_key_from_bytes(passphrase: &[u8], params: &KeyDerivationParams) -> CofferResult<DerivedKey> {
    // Parse the salt
    let salt = SaltString::from_b64(&params.salt)
        .map_err(|e| CofferError::Encryption(format!("Invalid salt: {}", e)))?;

    // Configure Argon2id with custom params
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(32), // Output length for AES-256
    )
    .map_err(|e| CofferError::Encryption(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let hash = argon2
        .hash_password(passphrase, &salt)
        .map_err(|e| CofferError::Encryption(format!("Key derivation failed: {}", e)))?;

    let hash_output = hash
        .hash
        .ok_or_else(|| CofferError::Encryption("No hash output generated".to_string()))?;

    let hash_bytes = hash_output.as_bytes();

    if hash_bytes.len() < 32 {
        return Err(CofferError::Encryption(
            "Hash output too short for AES-256 key".to_string(),
        ));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&hash_bytes[..32]);

    Ok(DerivedKey { key })
}

#[cfg(test)]
pub(crate) fn test_params() -> KeyDerivationParams {
    KeyDerivationParams::with_cost(1024, 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key() {
        let key = derive_key(&"test_passphrase".into(), &test_params()).unwrap();
        assert_eq!(key.as_bytes().len(), 32);
    }

    #[test]
    fn test_same_passphrase_same_key() {
        let params = test_params();
        let key1 = derive_key(&"test_passphrase".into(), &params).unwrap();
        let key2 = derive_key(&"test_passphrase".into(), &params).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_passphrase_different_key() {
        let params = test_params();
        let key1 = derive_key(&"passphrase1".into(), &params).unwrap();
        let key2 = derive_key(&"passphrase2".into(), &params).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_resalted_changes_key() {
        let params = test_params();
        let other = params.resalted();
        assert_eq!(params.memory_cost, other.memory_cost);
        assert_ne!(params.salt, other.salt);
        let key1 = derive_key(&"same".into(), &params).unwrap();
        let key2 = derive_key(&"same".into(), &other).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let mut params = test_params();
        params.memory_cost = 1;
        let result = derive_key(&"x".into(), &params);
        assert!(matches!(result, Err(CofferError::Encryption(_))));
    }

    #[test]
    fn test_empty_passphrase_derives() {
        let key = derive_key(&SecureString::new(Vec::new()), &test_params()).unwrap();
        assert_eq!(key.as_bytes().len(), 32);
    }
}
