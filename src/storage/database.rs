//! Encrypted database container
//!
//! On disk a database is one JSON file:
//!
//! ```json
//! { "format": "coffer", "version": 1, "kdf": { ... }, "payload": { ... } }
//! ```
//!
//! The key derivation parameters travel in the clear so the key can be
//! re-derived from the passphrase. The payload is the AES-GCM sealed
//! [`TreeDocument`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::document::TreeDocument;
use super::file_io::{read_json_required, write_json_atomic};
use crate::crypto::{decrypt, encrypt, DerivedKey, EncryptedData, KeyDerivationParams};
use crate::error::{CofferError, CofferResult};
use crate::models::Tree;

/// Format marker stored in every database file
pub const FORMAT_NAME: &str = "coffer";

/// Current container version
pub const FORMAT_VERSION: u32 = 1;

/// The on-disk container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseFile {
    pub format: String,
    pub version: u32,
    pub kdf: KeyDerivationParams,
    pub payload: EncryptedData,
}

impl DatabaseFile {
    /// Seal a tree into a container
    pub fn seal(tree: &Tree, key: &DerivedKey, kdf: &KeyDerivationParams) -> CofferResult<Self> {
        let document = TreeDocument::from_tree(tree, key)?;
        let plaintext = Zeroizing::new(serde_json::to_vec(&document)?);
        Ok(Self {
            format: FORMAT_NAME.to_string(),
            version: FORMAT_VERSION,
            kdf: kdf.clone(),
            payload: encrypt(&plaintext, key)?,
        })
    }

    /// Read a container and check its header; nothing is decrypted yet
    pub fn read(path: &Path) -> CofferResult<Self> {
        let file: DatabaseFile = read_json_required(path)?;
        if file.format != FORMAT_NAME {
            return Err(CofferError::Storage(format!(
                "{} is not a coffer database",
                path.display()
            )));
        }
        if file.version != FORMAT_VERSION {
            return Err(CofferError::Storage(format!(
                "Unsupported database version {}",
                file.version
            )));
        }
        Ok(file)
    }

    /// Write the container atomically
    pub fn write(&self, path: &Path) -> CofferResult<()> {
        write_json_atomic(path, self)?;
        debug!(path = %path.display(), "Wrote database");
        Ok(())
    }

    /// Decrypt the payload and rebuild the tree
    ///
    /// A wrong key or tampered payload fails with an encryption error.
    pub fn open(&self, key: &DerivedKey) -> CofferResult<Tree> {
        let plaintext = decrypt(&self.payload, key)?;
        let document: TreeDocument = serde_json::from_slice(&plaintext)
            .map_err(|e| CofferError::Storage(format!("Corrupt database payload: {}", e)))?;
        document.into_tree(key)
    }
}
