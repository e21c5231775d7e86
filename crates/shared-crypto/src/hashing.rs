//! # BLAKE3 Hashing
//!
//! Used to derive node identities from gateway public keys.

/// Derive a 32-byte value from a context string and input material.
///
/// The context string must be hardcoded and globally unique for its use.
pub fn blake3_derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(key_material);
    *hasher.finalize().as_bytes()
}
