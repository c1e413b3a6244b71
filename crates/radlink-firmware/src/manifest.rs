//! Release manifest schema

use serde::{Deserialize, Serialize};

/// One binary inside a firmware package.
///
/// The digest is hex-encoded (case-insensitive on input); `filename` is a
/// bare name resolved relative to the package directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryDescriptor {
    /// File name within the package directory.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 of the file, hex.
    pub sha256: String,
    /// Device flash address this binary is written to.
    pub flash_offset: u32,
}

/// Parsed `manifest.json`.
///
/// The first descriptor is the main application image; bootloader,
/// partition table, and auxiliary payloads follow in flash order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareManifest {
    /// Device model this package targets, e.g. `"RL-900"`.
    pub model: String,
    /// Hardware board identifier.
    pub board_id: String,
    /// Release version string, e.g. `"2.4.1"`.
    pub version: String,
    /// Constituent binaries, main image first.
    pub binaries: Vec<BinaryDescriptor>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn manifest_parses_from_json() {
        let text = r#"{
            "model": "RL-900",
            "board_id": "rl900-rev-c",
            "version": "2.4.1",
            "binaries": [
                {"filename": "firmware.bin", "size": 131072, "sha256": "AA00BB11", "flash_offset": 65536},
                {"filename": "bootloader.bin", "size": 4096, "sha256": "cc22dd33", "flash_offset": 0}
            ]
        }"#;
        let manifest: FirmwareManifest = serde_json::from_str(text).unwrap();
        assert_eq!(manifest.version, "2.4.1");
        assert_eq!(manifest.binaries.len(), 2);
        assert_eq!(manifest.binaries[0].filename, "firmware.bin");
        assert_eq!(manifest.binaries[1].flash_offset, 0);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let text = r#"{"model": "RL-900", "version": "2.4.1"}"#;
        assert!(serde_json::from_str::<FirmwareManifest>(text).is_err());
    }
}
