//! End-to-end tests for the command path: sequencer ordering, response
//! correlation, retry behavior, and error classification over the mock
//! transport.

use std::sync::Arc;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use radlink_client::{ProtocolConfig, RpcClient, RpcError};
use radlink_core::RpcRequest;
use radlink_transport::{
    CommandSequencer, LinkError, MockConfig, MockTransport, SequencerConfig,
};
use serde_json::Value;

fn fast_sequencer_config() -> SequencerConfig {
    SequencerConfig {
        command_timeout_ms: 150,
        quiet_period_ms: 15,
        queue_depth: 16,
    }
}

fn fast_client(transport: Arc<MockTransport>) -> RpcClient {
    let config = ProtocolConfig {
        max_retries: 2,
        retry_base_delay_ms: 5,
        sequencer: fast_sequencer_config(),
    };
    let sequencer = CommandSequencer::new(transport, config.sequencer.clone());
    RpcClient::new(sequencer, config)
}

/// Decode the request ids out of everything written to the transport.
fn written_ids(transport: &MockTransport) -> Vec<u64> {
    transport
        .writes()
        .iter()
        .map(|bytes| {
            let request: RpcRequest = serde_json::from_slice(bytes).unwrap();
            request.id
        })
        .collect()
}

#[tokio::test]
async fn concurrent_commands_complete_in_submission_order() {
    let transport = MockTransport::new(&MockConfig::default());
    for i in 0..5 {
        transport.add_text_response(format!("cmd-{i}"), format!("resp-{i}\n"));
    }
    let sequencer = CommandSequencer::new(transport.clone(), fast_sequencer_config());

    // Build the futures in order and poll them together; each submission
    // enqueues on its first poll, so arrival order is deterministic.
    let submissions = (0..5).map(|i| sequencer.submit(format!("cmd-{i}")));
    let results = join_all(submissions).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), format!("resp-{i}"));
    }
    let writes: Vec<String> = transport
        .writes()
        .iter()
        .map(|w| String::from_utf8(w.clone()).unwrap())
        .collect();
    assert_eq!(writes, vec!["cmd-0", "cmd-1", "cmd-2", "cmd-3", "cmd-4"]);
}

#[tokio::test]
async fn request_ids_strictly_increase_across_calls() {
    let transport = MockTransport::new(&MockConfig::default());
    for id in 1..=3u64 {
        transport.add_text_response(
            format!(r#"{{"jsonrpc":"2.0","method":"ping","id":{id}}}"#),
            format!("{{\"jsonrpc\":\"2.0\",\"result\":\"pong\",\"id\":{id}}}\n"),
        );
    }
    let client = fast_client(transport.clone());

    for _ in 0..3 {
        assert_eq!(client.ping().await.unwrap(), "pong");
    }

    assert_eq!(written_ids(&transport), vec![1, 2, 3]);
}

#[tokio::test]
async fn fragmented_response_reaches_the_typed_client() {
    let transport = MockTransport::new(&MockConfig::default());
    // The device fragments the envelope into BLE-notification-sized pieces.
    transport.add_response(
        "{\"jsonrpc\":\"2.0\",\"method\":\"device_info\"",
        vec![
            b"{\"jsonrpc\":\"2.0\",\"result\":{\"model\":\"RL-900\",".to_vec(),
            b"\"serial\":\"RL9-00417\",".to_vec(),
            b"\"firmware_version\":\"2.3.0\"},\"id\":1}".to_vec(),
        ],
    );
    let client = fast_client(transport);

    let info = client.device_info().await.unwrap();
    assert_eq!(info.model, "RL-900");
    assert_eq!(info.serial, "RL9-00417");
    assert_eq!(info.firmware_version, "2.3.0");
}

#[tokio::test]
async fn device_rejection_surfaces_without_retry() {
    let transport = MockTransport::new(&MockConfig::default());
    transport.add_text_response(
        "{\"jsonrpc\":\"2.0\",\"method\":\"frobnicate\"",
        "{\"jsonrpc\":\"2.0\",\"error\":{\"code\":-32601,\"message\":\"Method not found\"},\"id\":1}\n",
    );
    let client = fast_client(transport.clone());

    let err = client.call::<Value>("frobnicate", None).await.unwrap_err();
    assert_eq!(err, RpcError::MethodNotFound("Method not found".to_string()));
    assert_eq!(transport.writes().len(), 1);
}

#[tokio::test]
async fn timeout_exhausts_retries_then_link_recovers() {
    let transport = MockTransport::new(&MockConfig::default());
    let client = fast_client(transport.clone());

    // "reboot" is never answered: initial attempt plus two retries, each
    // with its own id, then the timeout surfaces.
    let err = client.call::<Value>("reboot", None).await.unwrap_err();
    assert_eq!(err, RpcError::Timeout);
    assert_eq!(written_ids(&transport), vec![1, 2, 3]);

    // The stack stays usable: the next call gets id 4 and succeeds.
    transport.add_text_response(
        r#"{"jsonrpc":"2.0","method":"ping","id":4}"#,
        "{\"jsonrpc\":\"2.0\",\"result\":\"pong\",\"id\":4}\n",
    );
    assert_eq!(client.ping().await.unwrap(), "pong");
}

#[tokio::test]
async fn link_loss_fails_queued_commands() {
    let transport = MockTransport::new(&MockConfig::default());
    let sequencer = CommandSequencer::new(
        transport.clone(),
        SequencerConfig {
            command_timeout_ms: 5000,
            ..fast_sequencer_config()
        },
    );

    let in_flight = tokio::spawn({
        let sequencer = sequencer.clone();
        async move { sequencer.submit("first").await }
    });
    // Let the first command reach the transport before queueing the second.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let queued = tokio::spawn({
        let sequencer = sequencer.clone();
        async move { sequencer.submit("second").await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    transport.set_state(radlink_core::ConnectionState::Disconnected);

    let first = in_flight.await.unwrap().unwrap_err();
    let second = queued.await.unwrap().unwrap_err();
    assert_eq!(first, LinkError::LinkLost);
    // The queued command never reached the transport.
    assert!(matches!(second, LinkError::NotConnected | LinkError::LinkLost));
}

#[tokio::test]
async fn write_setting_round_trips_through_the_stack() {
    let transport = MockTransport::new(&MockConfig::default());
    transport.add_text_response(
        "{\"jsonrpc\":\"2.0\",\"method\":\"write_setting\"",
        "{\"jsonrpc\":\"2.0\",\"result\":null,\"id\":1}\n",
    );
    let client = fast_client(transport.clone());

    client
        .write_setting("squelch", serde_json::json!(3))
        .await
        .unwrap();

    let written: RpcRequest = serde_json::from_slice(&transport.writes()[0]).unwrap();
    assert_eq!(written.method, "write_setting");
    assert_eq!(
        written.params.unwrap(),
        serde_json::json!({"key": "squelch", "value": 3})
    );
}
