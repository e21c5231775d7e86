//! Ed25519 binding of the signing and verification ports.

use crate::domain::KeyMaterial;
use crate::ports::{MessageSigner, MessageVerifier};
use shared_crypto::{CryptoError, Ed25519PublicKey, Ed25519Signature};

/// Signs with the key pair carried in [`KeyMaterial`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl MessageSigner for Ed25519Signer {
    fn sign(&self, key: &KeyMaterial, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(key.key_pair().sign(message).to_vec())
    }
}

/// Verifies Ed25519 signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl MessageVerifier for Ed25519Verifier {
    fn verify(
        &self,
        public_key: &Ed25519PublicKey,
        signature: &[u8],
        message: &[u8],
    ) -> Result<bool, CryptoError> {
        let signature = Ed25519Signature::from_slice(signature)?;
        match public_key.verify(message, &signature) {
            Ok(()) => Ok(true),
            Err(CryptoError::SignatureVerificationFailed) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
