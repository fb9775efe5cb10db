//! The encryption collaborator seam.
//!
//! Encryption-at-rest of personal fields is an external concern. The core
//! round-trips [`crate::combatant::PersonalInfo`] through this trait as a
//! JSON value and never lets plaintext cross a persistence boundary.

use crate::Result;

/// Encrypts and decrypts JSON documents. Implementations live outside the
/// core (the real one wraps a key-management service; tests use a
/// transparent stand-in).
pub trait Encryptor: Send + Sync {
  fn encrypt_json(&self, value: &serde_json::Value) -> Result<Vec<u8>>;

  fn decrypt_json(&self, blob: &[u8]) -> Result<serde_json::Value>;
}
