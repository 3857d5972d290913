//! Key vault
//!
//! AES-256-GCM decryption of per-wallet secret bundles. Decrypted secret
//! material is transient: created immediately before use by an adapter and
//! dropped at the end of the call. Plaintext is never logged.

use crate::config::KeyVaultConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::ledger::EncryptedSecret;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

/// Decrypts stored secret bundles with the service master key
pub struct KeyVault {
    key: [u8; 32],
}

impl KeyVault {
    pub fn new(config: &KeyVaultConfig) -> OrchestratorResult<Self> {
        let bytes = hex::decode(&config.encryption_key)
            .map_err(|e| OrchestratorError::KeyVault(format!("Invalid key hex: {}", e)))?;

        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| OrchestratorError::KeyVault("Key must be 32 bytes".to_string()))?;

        Ok(Self { key })
    }

    /// Decrypt a stored bundle back to its utf-8 plaintext secret
    pub fn decrypt(&self, bundle: &EncryptedSecret) -> OrchestratorResult<String> {
        let iv = hex::decode(&bundle.iv)
            .map_err(|e| OrchestratorError::KeyVault(format!("Invalid iv hex: {}", e)))?;
        let mut ciphertext = hex::decode(&bundle.ciphertext)
            .map_err(|e| OrchestratorError::KeyVault(format!("Invalid ciphertext hex: {}", e)))?;
        let tag = hex::decode(&bundle.auth_tag)
            .map_err(|e| OrchestratorError::KeyVault(format!("Invalid tag hex: {}", e)))?;

        if iv.len() != 12 {
            return Err(OrchestratorError::KeyVault(
                "GCM iv must be 12 bytes".to_string(),
            ));
        }

        // Stored layout keeps the tag separate; the aead API expects it
        // appended to the ciphertext
        ciphertext.extend_from_slice(&tag);

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = Nonce::from_slice(&iv);

        let plaintext = cipher
            .decrypt(nonce, Payload::from(ciphertext.as_slice()))
            .map_err(|_| OrchestratorError::KeyVault("Decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| OrchestratorError::KeyVault("Plaintext is not utf-8".to_string()))
    }

    /// Encrypt a plaintext secret into a stored bundle
    ///
    /// The orchestration core never writes wallet rows; this exists for
    /// operational tooling and tests.
    pub fn encrypt(&self, plaintext: &str, iv: &[u8; 12]) -> OrchestratorResult<EncryptedSecret> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = Nonce::from_slice(iv);

        let mut sealed = cipher
            .encrypt(nonce, Payload::from(plaintext.as_bytes()))
            .map_err(|_| OrchestratorError::KeyVault("Encryption failed".to_string()))?;

        // aead appends the 16-byte tag; split it back out to match storage
        let tag = sealed.split_off(sealed.len() - 16);

        Ok(EncryptedSecret {
            iv: hex::encode(iv),
            ciphertext: hex::encode(&sealed),
            auth_tag: hex::encode(&tag),
        })
    }
}
