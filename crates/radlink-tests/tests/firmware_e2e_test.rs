//! End-to-end firmware path: build a signed package on disk, load it
//! through the verifying loader, and flash it over the mock transport.

use std::sync::{Arc, Mutex};

use ed25519_dalek::{Signer, SigningKey};
use pretty_assertions::assert_eq;
use radlink_client::{OtaConfig, OtaError, OtaPhase, OtaUploader};
use radlink_core::ota::{encode_begin, encode_chunk, encode_end, to_wire_text};
use radlink_firmware::{FirmwarePackage, PackageError, SignatureVerifier, VerifyError};
use radlink_transport::{CommandSequencer, MockConfig, MockTransport, SequencerConfig};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

const ACK_TEXT: &str = "\u{6}";
const CHUNK_SIZE: usize = 512;

/// Write a complete signed single-binary package into a fresh tempdir and
/// return it with a verifier bound to its signing key.
fn signed_package(image: &[u8]) -> (TempDir, SignatureVerifier) {
    let signing = SigningKey::generate(&mut OsRng);
    let dir = TempDir::new().unwrap();

    let digest: [u8; 32] = Sha256::digest(image).into();
    let manifest = serde_json::json!({
        "model": "RL-900",
        "board_id": "rl900-rev-c",
        "version": "3.1.0",
        "binaries": [{
            "filename": "firmware.bin",
            "size": image.len(),
            "sha256": hex::encode(digest),
            "flash_offset": 0x1_0000u32,
        }],
    });
    let manifest_bytes = serde_json::to_vec_pretty(&manifest).unwrap();

    std::fs::write(dir.path().join("manifest.json"), &manifest_bytes).unwrap();
    std::fs::write(
        dir.path().join("manifest.json.sig"),
        hex::encode(signing.sign(&manifest_bytes).to_bytes()),
    )
    .unwrap();
    std::fs::write(dir.path().join("firmware.bin"), image).unwrap();
    std::fs::write(
        dir.path().join("firmware.bin.sig"),
        hex::encode(signing.sign(&digest).to_bytes()),
    )
    .unwrap();

    (dir, SignatureVerifier::with_key(signing.verifying_key()))
}

fn uploader_over(transport: Arc<MockTransport>) -> OtaUploader {
    let sequencer = CommandSequencer::new(
        transport,
        SequencerConfig {
            command_timeout_ms: 150,
            quiet_period_ms: 15,
            queue_depth: 8,
        },
    );
    OtaUploader::new(
        sequencer,
        OtaConfig {
            chunk_size: CHUNK_SIZE,
            settle_time_ms: 0,
        },
    )
}

/// Hex prefix of a chunk's 6-byte header, for scripting per-chunk mock
/// responses without spelling out the payload.
fn chunk_prefix(offset: u32, data: &[u8]) -> String {
    to_wire_text(&encode_chunk(offset, data)[..6])
}

#[tokio::test]
async fn verified_package_flashes_end_to_end() {
    let image: Vec<u8> = (0..1300u32).map(|i| (i % 251) as u8).collect();
    let (dir, verifier) = signed_package(&image);
    let package = FirmwarePackage::load_verified(dir.path(), &verifier).unwrap();

    let transport = MockTransport::new(&MockConfig::default());
    transport.add_text_response("", ACK_TEXT);

    let phases = Arc::new(Mutex::new(Vec::new()));
    let seen = phases.clone();
    let uploader =
        uploader_over(transport.clone()).with_progress(move |p| seen.lock().unwrap().push(p));

    uploader.flash_package(&package).await.unwrap();

    // begin + 3 chunks + end, carrying exactly the verified bytes.
    let writes = transport.writes();
    assert_eq!(writes.len(), 5);
    assert_eq!(writes[0], to_wire_text(&encode_begin(1300)).into_bytes());
    assert_eq!(
        writes[1],
        to_wire_text(&encode_chunk(0, &image[..CHUNK_SIZE])).into_bytes()
    );
    assert_eq!(
        writes[3],
        to_wire_text(&encode_chunk(1024, &image[1024..])).into_bytes()
    );
    assert_eq!(writes[4], to_wire_text(&encode_end()).into_bytes());

    let phases = phases.lock().unwrap();
    assert_eq!(phases.first().unwrap().phase, OtaPhase::Starting);
    assert_eq!(phases.last().unwrap().phase, OtaPhase::Complete);
    assert_eq!(phases.last().unwrap().bytes_sent, 1300);
}

#[tokio::test]
async fn withheld_ack_aborts_and_later_chunks_are_never_sent() {
    let image = vec![0xC3u8; 1536];
    let (dir, verifier) = signed_package(&image);
    let package = FirmwarePackage::load_verified(dir.path(), &verifier).unwrap();

    let transport = MockTransport::new(&MockConfig::default());
    transport.add_text_response(to_wire_text(&encode_begin(1536)), ACK_TEXT);
    transport.add_text_response(chunk_prefix(0, &image[..CHUNK_SIZE]), ACK_TEXT);
    // The chunk at offset 512 gets no ACK; the one at 1024 must never go out.

    let uploader = uploader_over(transport.clone());
    let err = uploader.flash_package(&package).await.unwrap_err();

    assert!(matches!(err, OtaError::ChunkFailed { offset: 512 }), "{err:?}");
    // begin, chunk 0, failed chunk at 512 - and nothing after.
    assert_eq!(transport.writes().len(), 3);
}

#[test]
fn tampered_image_never_reaches_the_link() {
    let image = vec![0x7Eu8; 1024];
    let (dir, verifier) = signed_package(&image);

    let mut tampered = image;
    tampered[512] ^= 0x80;
    std::fs::write(dir.path().join("firmware.bin"), &tampered).unwrap();

    let err = FirmwarePackage::load_verified(dir.path(), &verifier).unwrap_err();
    assert!(
        matches!(err, PackageError::Verify(VerifyError::HashMismatch { .. })),
        "{err:?}"
    );
}

#[test]
fn package_signed_by_another_key_is_rejected() {
    let image = vec![0x42u8; 256];
    let (dir, _) = signed_package(&image);
    let other = SignatureVerifier::with_key(SigningKey::generate(&mut OsRng).verifying_key());

    let err = FirmwarePackage::load_verified(dir.path(), &other).unwrap_err();
    assert!(
        matches!(
            err,
            PackageError::Verify(VerifyError::SignatureInvalid(ref file)) if file == "manifest.json"
        ),
        "{err:?}"
    );
}
