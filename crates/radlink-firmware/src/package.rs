//! Verified firmware packages

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::manifest::FirmwareManifest;
use crate::verify::{SignatureVerifier, VerifyError};

const MANIFEST_FILE: &str = "manifest.json";

/// Package loading failures.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to read package file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("manifest lists no binaries")]
    EmptyManifest,

    #[error("manifest names a file outside the package directory: {0}")]
    UnsafePath(String),

    #[error("{file} is {actual} bytes but manifest declares {declared}")]
    SizeMismatch {
        file: String,
        declared: u64,
        actual: u64,
    },

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// A loaded, fully verified firmware package.
///
/// The fields are private and there is no mutating API: the bytes an
/// uploader reads are exactly the bytes that passed verification.
#[derive(Debug, Clone)]
pub struct FirmwarePackage {
    manifest: FirmwareManifest,
    payloads: HashMap<String, Vec<u8>>,
}

impl FirmwarePackage {
    /// Load the package at `dir`, verifying everything before returning.
    ///
    /// Check order is fail-closed: the manifest signature is verified
    /// against the raw file bytes before the manifest is parsed; then every
    /// binary must pass its size check, digest check, and detached
    /// signature check before the package exists.
    pub fn load_verified(
        dir: impl AsRef<Path>,
        verifier: &SignatureVerifier,
    ) -> Result<Self, PackageError> {
        let dir = dir.as_ref();

        let manifest_bytes = std::fs::read(dir.join(MANIFEST_FILE))?;
        let manifest_sig = read_signature(dir, MANIFEST_FILE)?;
        verifier.verify_manifest(&manifest_bytes, &manifest_sig)?;

        let manifest: FirmwareManifest = serde_json::from_slice(&manifest_bytes)?;
        if manifest.binaries.is_empty() {
            return Err(PackageError::EmptyManifest);
        }

        let mut payloads = HashMap::with_capacity(manifest.binaries.len());
        for descriptor in &manifest.binaries {
            if descriptor.filename.contains(['/', '\\']) || descriptor.filename == ".." {
                return Err(PackageError::UnsafePath(descriptor.filename.clone()));
            }

            let bytes = std::fs::read(dir.join(&descriptor.filename))?;
            if bytes.len() as u64 != descriptor.size {
                return Err(PackageError::SizeMismatch {
                    file: descriptor.filename.clone(),
                    declared: descriptor.size,
                    actual: bytes.len() as u64,
                });
            }

            let signature = read_signature(dir, &descriptor.filename)?;
            verifier.verify_binary(&descriptor.filename, &bytes, &descriptor.sha256, &signature)?;
            payloads.insert(descriptor.filename.clone(), bytes);
        }

        info!(
            version = %manifest.version,
            model = %manifest.model,
            binaries = manifest.binaries.len(),
            "firmware package verified"
        );
        Ok(Self { manifest, payloads })
    }

    pub fn manifest(&self) -> &FirmwareManifest {
        &self.manifest
    }

    /// Verified bytes of one binary, by manifest filename.
    pub fn binary(&self, filename: &str) -> Option<&[u8]> {
        self.payloads.get(filename).map(Vec::as_slice)
    }

    /// The main application image: the manifest's first binary.
    pub fn main_image(&self) -> &[u8] {
        // load_verified rejects empty manifests, so the first descriptor
        // and its payload always exist.
        let descriptor = &self.manifest.binaries[0];
        &self.payloads[&descriptor.filename]
    }
}

/// Read `<file>.sig`, mapping a missing file to the verification taxonomy.
fn read_signature(dir: &Path, file: &str) -> Result<String, PackageError> {
    match std::fs::read_to_string(dir.join(format!("{file}.sig"))) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VerifyError::MissingSignature(file.to_string()).into())
        }
        Err(e) => Err(e.into()),
    }
}
