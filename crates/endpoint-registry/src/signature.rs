//! Ed25519 verification of endpoint announcements.
//!
//! Every register/deregister request is signed over the message
//! `"{index}-{identity}-{url}"` by the private key behind `identity`.

use ed25519_dalek::{Signature, VerifyingKey};
use tracing::debug;

/// Build the message a member signs for an endpoint request.
pub fn signing_message(index: i64, identity: &str, url: &str) -> String {
    format!("{}-{}-{}", index, identity, url)
}

/// Checks that `identity` authorized `message`.
///
/// Implementations must fail closed: anything that cannot be decoded or
/// verified is `false`, and the reason never leaves the verifier.
#[cfg_attr(test, mockall::automock)]
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &str, identity: &str) -> bool;
}

/// Verifier for base58 Ed25519 identities and hex-encoded signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &str, identity: &str) -> bool {
        let key = match decode_identity(identity) {
            Some(key) => key,
            None => {
                debug!("Rejecting signature: undecodable identity");
                return false;
            }
        };

        let signature = match decode_signature(signature) {
            Some(sig) => sig,
            None => {
                debug!("Rejecting signature: undecodable signature");
                return false;
            }
        };

        key.verify_strict(message, &signature).is_ok()
    }
}

/// Decode a base58 public key into a verifying key.
pub fn decode_identity(identity: &str) -> Option<VerifyingKey> {
    let bytes = bs58::decode(identity).into_vec().ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

/// Encode a verifying key as a base58 identity.
pub fn encode_identity(key: &VerifyingKey) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

fn decode_signature(signature: &str) -> Option<Signature> {
    let hex_str = signature.strip_prefix("0x").unwrap_or(signature);
    let bytes = hex::decode(hex_str).ok()?;
    Signature::from_slice(&bytes).ok()
}
