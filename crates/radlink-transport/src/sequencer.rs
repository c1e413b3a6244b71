//! Command sequencer: single-in-flight command queue per transport
//!
//! Any number of callers may submit commands concurrently; a single worker
//! task drains them in arrival order, so at most one command is ever
//! outstanding on the transport and responses are delivered back in
//! submission order. The worker also owns the [`FrameReassembler`] buffer,
//! which keeps all buffer mutation on one task.
//!
//! Every wait is bounded: a command either completes with the next
//! reassembled message, fails with [`LinkError::Timeout`] after the
//! configured window, or fails with [`LinkError::LinkLost`] when the
//! connection drops. Exactly one of those outcomes resolves a given wait -
//! the worker owns the reply channel and a single `select!` arm consumes
//! it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::SequencerConfig;
use crate::reassembly::FrameReassembler;
use crate::{LinkError, Transport};

/// A queued command awaiting dispatch.
struct PendingCommand {
    text: String,
    reply: oneshot::Sender<Result<String, LinkError>>,
    queued_at: Instant,
}

/// Handle to the sequencer worker. Cheap to clone; dropping every handle
/// shuts the worker down.
#[derive(Clone)]
pub struct CommandSequencer {
    queue: mpsc::Sender<PendingCommand>,
    transport: Arc<dyn Transport>,
}

impl CommandSequencer {
    /// Spawn the worker task for `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: SequencerConfig) -> Self {
        let (queue, rx) = mpsc::channel(config.queue_depth);
        let worker = Worker {
            transport: transport.clone(),
            config,
            reassembler: FrameReassembler::new(),
            buffer_stale: false,
        };
        tokio::spawn(worker.run(rx));
        Self { queue, transport }
    }

    /// The transport this sequencer drives.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Submit a command and wait for its response.
    ///
    /// Commands from concurrent callers are served strictly in arrival
    /// order; the response (or failure) for this command is delivered to
    /// this caller only.
    pub async fn submit(&self, text: impl Into<String>) -> Result<String, LinkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = PendingCommand {
            text: text.into(),
            reply: reply_tx,
            queued_at: Instant::now(),
        };
        self.queue
            .send(command)
            .await
            .map_err(|_| LinkError::NotConnected)?;
        // The worker resolves every accepted command exactly once; a closed
        // channel means it observed disconnection while we were queued.
        reply_rx.await.map_err(|_| LinkError::LinkLost)?
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    config: SequencerConfig,
    reassembler: FrameReassembler,
    buffer_stale: bool,
}

impl Worker {
    async fn run(mut self, mut queue: mpsc::Receiver<PendingCommand>) {
        let mut fragments = self.transport.fragments();
        let mut state = self.transport.watch_state();

        while let Some(command) = queue.recv().await {
            trace!(
                queued_ms = command.queued_at.elapsed().as_millis() as u64,
                "dispatching command"
            );
            let result = self.execute(&command.text, &mut fragments, &mut state).await;
            let disconnected = matches!(result, Err(LinkError::LinkLost));
            let _ = command.reply.send(result);

            if disconnected {
                // Fail everything queued behind the in-flight command; no
                // wait may outlive the connection that created it.
                while let Ok(stale) = queue.try_recv() {
                    let _ = stale.reply.send(Err(LinkError::NotConnected));
                }
                self.reassembler.reset();
                self.buffer_stale = false;
            }
        }
        debug!("command sequencer worker stopped");
    }

    async fn execute(
        &mut self,
        text: &str,
        fragments: &mut broadcast::Receiver<Vec<u8>>,
        state: &mut tokio::sync::watch::Receiver<radlink_core::ConnectionState>,
    ) -> Result<String, LinkError> {
        if !self.transport.is_ready() {
            return Err(LinkError::NotConnected);
        }

        // A previous command timed out: its late response may have landed
        // in the buffer or the fragment queue since. Discard it now that a
        // new command begins.
        if self.buffer_stale {
            self.reassembler.reset();
            while fragments.try_recv().is_ok() {}
            self.buffer_stale = false;
        }

        self.transport.write(text.as_bytes()).await?;

        let quiet_period = Duration::from_millis(self.config.quiet_period_ms);
        let deadline = Instant::now() + Duration::from_millis(self.config.command_timeout_ms);
        // No quiet deadline until the first fragment arrives.
        let mut quiet_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                fragment = fragments.recv() => {
                    match fragment {
                        Ok(data) => {
                            if let Err(overflow) = self.reassembler.push(&data) {
                                warn!(size = overflow.size, "response exceeded buffer limit");
                                return Err(LinkError::InvalidResponse(overflow.to_string()));
                            }
                            quiet_deadline = Some(Instant::now() + quiet_period);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "fragment receiver lagged");
                            return Err(LinkError::InvalidResponse(
                                "inbound fragments dropped".to_string(),
                            ));
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(LinkError::LinkLost);
                        }
                    }
                }
                _ = tokio::time::sleep_until(quiet_deadline.unwrap_or(deadline)),
                    if quiet_deadline.is_some() =>
                {
                    if let Some(message) = self.reassembler.try_complete() {
                        trace!(len = message.len(), "response complete");
                        return Ok(message);
                    }
                    // Not complete yet; wait for more fragments.
                    quiet_deadline = None;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    // Leave the buffer in place: a late response can still
                    // arrive and will be discarded when the next command
                    // begins.
                    self.buffer_stale = true;
                    return Err(LinkError::Timeout);
                }
                changed = state.changed() => {
                    let connected = changed.is_ok() && state.borrow().is_connected();
                    if !connected {
                        return Err(LinkError::LinkLost);
                    }
                }
            }
        }
    }
}
