//! Digest and signature checks
//!
//! Two independent checks protect every file in a package, both mandatory:
//! the SHA-256 digest must match the manifest exactly (hex comparison is
//! case-insensitive because digests are compared as decoded bytes), and a
//! detached ed25519 signature must verify. The manifest is signed over its
//! raw file bytes; each binary is signed over its 32-byte digest.
//!
//! Production code uses the embedded release key via
//! [`SignatureVerifier::release`]; tests inject their own key with
//! [`SignatureVerifier::with_key`].

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Public half of the release signing key.
const RELEASE_PUBLIC_KEY: [u8; 32] = [
    0xd7, 0x5a, 0x98, 0x01, 0x82, 0xb1, 0x0a, 0xb7, 0xd5, 0x4b, 0xfe, 0xd3, 0xc9, 0x64, 0x07,
    0x3a, 0x0e, 0xe1, 0x72, 0xf3, 0xda, 0xa6, 0x23, 0x25, 0xaf, 0x02, 0x1a, 0x68, 0xf7, 0x07,
    0x51, 0x1a,
];

/// Verification failures. All of them abort a package load; none are ever
/// downgraded to a warning.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("embedded public key is malformed")]
    MalformedKey,

    #[error("malformed signature for {file}: {detail}")]
    MalformedSignature { file: String, detail: String },

    #[error("malformed digest in manifest for {file}: {detail}")]
    MalformedDigest { file: String, detail: String },

    #[error("no signature file for {0}")]
    MissingSignature(String),

    #[error("signature for {0} does not verify")]
    SignatureInvalid(String),

    #[error("digest mismatch for {file}: manifest declares {expected}, file hashes to {actual}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

/// Checks manifest and binary signatures against one public key.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    /// Verifier bound to the embedded release key.
    pub fn release() -> Result<Self, VerifyError> {
        let key = VerifyingKey::from_bytes(&RELEASE_PUBLIC_KEY)
            .map_err(|_| VerifyError::MalformedKey)?;
        Ok(Self { key })
    }

    /// Verifier bound to an explicit key.
    pub fn with_key(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Check the detached signature over the raw manifest bytes.
    pub fn verify_manifest(&self, manifest: &[u8], signature_hex: &str) -> Result<(), VerifyError> {
        self.verify_detached("manifest.json", manifest, signature_hex)?;
        debug!("manifest signature verified");
        Ok(())
    }

    /// Hash a binary, compare against the manifest digest, then check the
    /// detached signature over the digest.
    pub fn verify_binary(
        &self,
        file: &str,
        bytes: &[u8],
        expected_sha256: &str,
        signature_hex: &str,
    ) -> Result<(), VerifyError> {
        let expected = decode_digest(file, expected_sha256)?;
        let actual: [u8; 32] = Sha256::digest(bytes).into();
        if actual != expected {
            return Err(VerifyError::HashMismatch {
                file: file.to_string(),
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }

        self.verify_detached(file, &actual, signature_hex)?;
        debug!(file, digest = %hex::encode(actual), "binary digest and signature verified");
        Ok(())
    }

    fn verify_detached(
        &self,
        file: &str,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<(), VerifyError> {
        let signature = parse_signature(file, signature_hex)?;
        self.key
            .verify(message, &signature)
            .map_err(|_| VerifyError::SignatureInvalid(file.to_string()))
    }
}

fn parse_signature(file: &str, signature_hex: &str) -> Result<Signature, VerifyError> {
    let bytes = hex::decode(signature_hex.trim()).map_err(|e| VerifyError::MalformedSignature {
        file: file.to_string(),
        detail: e.to_string(),
    })?;
    let bytes: [u8; 64] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        VerifyError::MalformedSignature {
            file: file.to_string(),
            detail: format!("expected 64 bytes, got {}", bytes.len()),
        }
    })?;
    Ok(Signature::from_bytes(&bytes))
}

fn decode_digest(file: &str, digest_hex: &str) -> Result<[u8; 32], VerifyError> {
    let bytes = hex::decode(digest_hex.trim()).map_err(|e| VerifyError::MalformedDigest {
        file: file.to_string(),
        detail: e.to_string(),
    })?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| VerifyError::MalformedDigest {
            file: file.to_string(),
            detail: format!("expected 32 bytes, got {}", bytes.len()),
        })
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};
    use pretty_assertions::assert_eq;
    use rand::rngs::OsRng;

    use super::*;

    fn test_verifier() -> (SigningKey, SignatureVerifier) {
        let signing = SigningKey::generate(&mut OsRng);
        let verifier = SignatureVerifier::with_key(signing.verifying_key());
        (signing, verifier)
    }

    #[test]
    fn release_key_is_well_formed() {
        SignatureVerifier::release().unwrap();
    }

    #[test]
    fn manifest_signature_round_trip() {
        let (signing, verifier) = test_verifier();
        let manifest = br#"{"version":"1.0.0"}"#;
        let signature = hex::encode(signing.sign(manifest).to_bytes());

        verifier.verify_manifest(manifest, &signature).unwrap();
    }

    #[test]
    fn tampered_manifest_is_rejected() {
        let (signing, verifier) = test_verifier();
        let signature = hex::encode(signing.sign(b"original").to_bytes());

        let err = verifier.verify_manifest(b"tampered", &signature).unwrap_err();
        assert_eq!(err, VerifyError::SignatureInvalid("manifest.json".to_string()));
    }

    #[test]
    fn digest_comparison_is_case_insensitive() {
        let (signing, verifier) = test_verifier();
        let bytes = b"firmware image bytes";
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        let signature = hex::encode(signing.sign(&digest).to_bytes());

        let uppercase = hex::encode(digest).to_uppercase();
        verifier
            .verify_binary("firmware.bin", bytes, &uppercase, &signature)
            .unwrap();
    }

    #[test]
    fn flipped_byte_fails_the_digest_check_first() {
        let (signing, verifier) = test_verifier();
        let bytes = b"firmware image bytes";
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        let signature = hex::encode(signing.sign(&digest).to_bytes());

        let mut flipped = bytes.to_vec();
        flipped[0] ^= 0x01;
        let err = verifier
            .verify_binary("firmware.bin", &flipped, &hex::encode(digest), &signature)
            .unwrap_err();
        assert!(matches!(err, VerifyError::HashMismatch { .. }), "{err:?}");
    }

    #[test]
    fn binary_signed_by_wrong_key_is_rejected() {
        let (_, verifier) = test_verifier();
        let other = SigningKey::generate(&mut OsRng);
        let bytes = b"firmware image bytes";
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        let signature = hex::encode(other.sign(&digest).to_bytes());

        let err = verifier
            .verify_binary("firmware.bin", bytes, &hex::encode(digest), &signature)
            .unwrap_err();
        assert_eq!(err, VerifyError::SignatureInvalid("firmware.bin".to_string()));
    }

    #[test]
    fn malformed_hex_is_reported_as_such() {
        let (_, verifier) = test_verifier();
        let err = verifier.verify_manifest(b"m", "not-hex").unwrap_err();
        assert!(matches!(err, VerifyError::MalformedSignature { .. }), "{err:?}");

        let err = verifier
            .verify_binary("firmware.bin", b"i", "aabb", &"00".repeat(64))
            .unwrap_err();
        assert!(matches!(err, VerifyError::MalformedDigest { .. }), "{err:?}");
    }
}
