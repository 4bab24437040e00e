//! Signature verification.
//!
//! Advertisements carry an Ed25519 signature from the advertising node.
//! Verification sits behind [`SignatureVerifier`] so callers can substitute
//! their own implementation; [`Ed25519Verifier`] is the default.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Size of an Ed25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of an Ed25519 signature.
pub const SIGNATURE_SIZE: usize = 64;

/// Checks a detached signature over a message.
pub trait SignatureVerifier {
    /// Return true only if `signature` is a valid signature of `message`
    /// by `public_key`. Malformed keys or signatures yield false.
    fn verify(
        &self,
        public_key: &[u8; PUBLIC_KEY_SIZE],
        message: &[u8],
        signature: &[u8; SIGNATURE_SIZE],
    ) -> bool;
}

/// Ed25519 verification backed by `ed25519-dalek`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(
        &self,
        public_key: &[u8; PUBLIC_KEY_SIZE],
        message: &[u8],
        signature: &[u8; SIGNATURE_SIZE],
    ) -> bool {
        let key = match VerifyingKey::from_bytes(public_key) {
            Ok(key) => key,
            Err(e) => {
                log::debug!("rejecting signature, bad public key: {}", e);
                return false;
            }
        };
        let signature = Signature::from_bytes(signature);
        key.verify(message, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    #[test]
    fn test_verify_valid_signature() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let public_key = signing_key.verifying_key().to_bytes();
        let signature = signing_key.sign(b"hello mesh").to_bytes();

        assert!(Ed25519Verifier.verify(&public_key, b"hello mesh", &signature));
        assert!(!Ed25519Verifier.verify(&public_key, b"hello mesh!", &signature));
    }

    #[test]
    fn test_verify_wrong_key_is_false() {
        let signer = SigningKey::from_bytes(&[1u8; 32]);
        let other = SigningKey::from_bytes(&[2u8; 32]).verifying_key().to_bytes();
        let signature = signer.sign(b"data").to_bytes();
        assert!(!Ed25519Verifier.verify(&other, b"data", &signature));
    }
}
