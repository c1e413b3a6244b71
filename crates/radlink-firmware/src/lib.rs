//! radlink-firmware - firmware package loading and verification
//!
//! A firmware package is a directory holding a signed manifest, the
//! binaries it describes, and one detached signature per file:
//!
//! ```text
//! package/
//!   manifest.json        model, board id, version, binary descriptors
//!   manifest.json.sig    ed25519 signature over the raw manifest bytes
//!   firmware.bin         main image (first manifest entry)
//!   firmware.bin.sig     ed25519 signature over the image's SHA-256 digest
//!   bootloader.bin       further binaries per the manifest...
//!   bootloader.bin.sig
//! ```
//!
//! Verification is fail-closed and happens before anything else looks at
//! the bytes: the manifest signature is checked against the release key
//! before the manifest is even parsed, then every binary's size, digest,
//! and signature are checked against the manifest. The only way to obtain
//! a [`FirmwarePackage`] is [`FirmwarePackage::load_verified`], so holding
//! one is proof the checks passed.

mod manifest;
mod package;
mod verify;

pub use manifest::{BinaryDescriptor, FirmwareManifest};
pub use package::{FirmwarePackage, PackageError};
pub use verify::{SignatureVerifier, VerifyError};
