use crate::config::TranscriberConfig;
use crate::error::TranscriberError;
use crate::queue::{frame_queue, FrameReceiver, FrameSender, OutboundFrame};
use crate::session;
use crate::state::{Lifecycle, LifecycleState};
use crate::transcript::Transcription;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// State shared between the client handle, the supervisor, and the session
/// flows of the current attempt.
pub(crate) struct TranscriberShared {
    pub(crate) config: TranscriberConfig,
    pub(crate) api_key: String,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) attempts: AtomicU32,
    pub(crate) exhausted: AtomicBool,
    sinks: Mutex<Vec<Sender<Transcription>>>,
}

impl TranscriberShared {
    pub(crate) fn emit(&self, event: Transcription) {
        if let Ok(sinks) = self.sinks.lock() {
            for sink in sinks.iter() {
                let _ = sink.send(event.clone());
            }
        }
    }
}

/// Streaming transcription client.
///
/// Frames pushed with [`send_audio_frame`](Self::send_audio_frame) are
/// forwarded in order over a live WebSocket session; partial and final
/// results come back on channels obtained from
/// [`subscribe`](Self::subscribe). A dropped connection is restarted
/// transparently until the retry budget runs out, after which the client
/// stays alive but silent.
pub struct RevAiTranscriber {
    shared: Arc<TranscriberShared>,
    frame_tx: FrameSender,
    frame_rx: FrameReceiver,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl RevAiTranscriber {
    /// Builds a client. Fails only when no API key can be resolved from the
    /// config or the environment.
    pub fn new(config: TranscriberConfig) -> Result<Self, TranscriberError> {
        let api_key = config.resolve_api_key()?;
        let (frame_tx, frame_rx) = frame_queue();
        Ok(Self {
            shared: Arc::new(TranscriberShared {
                config,
                api_key,
                lifecycle: Lifecycle::new(),
                attempts: AtomicU32::new(0),
                exhausted: AtomicBool::new(false),
                sinks: Mutex::new(Vec::new()),
            }),
            frame_tx,
            frame_rx,
            supervisor: Mutex::new(None),
        })
    }

    /// Starts the reconnect supervisor on the ambient tokio runtime.
    /// Idempotent; a second call while running is a no-op.
    pub fn start(&self) {
        if let Ok(mut guard) = self.supervisor.lock() {
            if guard.is_some() || self.shared.lifecycle.is_closing() {
                return;
            }
            let shared = self.shared.clone();
            let frames = self.frame_rx.clone();
            *guard = Some(tokio::spawn(session::run_supervisor(shared, frames)));
        }
    }

    /// Enqueues one encoded audio frame. Never blocks; frames queued while
    /// the connection is down are delivered, in order, once it is back.
    pub fn send_audio_frame(&self, frame: Vec<u8>) {
        self.frame_tx.send(OutboundFrame::Audio(frame));
    }

    /// Registers a transcription sink. Every subscriber receives every
    /// event; a receiver that falls behind only buffers, never blocks the
    /// session flows.
    pub fn subscribe(&self) -> Receiver<Transcription> {
        let (tx, rx) = channel();
        if let Ok(mut sinks) = self.shared.sinks.lock() {
            sinks.push(tx);
        }
        rx
    }

    /// Shuts the client down: sends the end-of-stream control message
    /// (best-effort), stops both session flows, and prevents any further
    /// connection attempts. Returns once the supervisor has observably
    /// stopped, bounded by the idle timeout.
    pub async fn terminate(&self) {
        self.frame_tx.send(OutboundFrame::CloseStream);
        self.shared.lifecycle.advance(LifecycleState::Closing);

        let handle = self.supervisor.lock().ok().and_then(|mut g| g.take());
        if let Some(mut handle) = handle {
            let grace = Duration::from_secs(self.shared.config.idle_timeout_secs.max(1));
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                log::warn!("supervisor did not stop within {:?}; aborting", grace);
                handle.abort();
            }
        }
        self.shared.lifecycle.advance(LifecycleState::Closed);
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.shared.lifecycle.state()
    }

    /// Number of connection attempts made so far.
    pub fn connection_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// True once the supervisor has given up reconnecting. The client is
    /// still alive but will not produce further events.
    pub fn retry_budget_exhausted(&self) -> bool {
        self.shared.exhausted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointingMode;

    fn local_config(base_url: String) -> TranscriberConfig {
        TranscriberConfig {
            api_key: Some("test-key".into()),
            base_url,
            endpointing: EndpointingMode::ServerSignal,
            retry_budget: 3,
            ..TranscriberConfig::default()
        }
    }

    /// Binds then drops a listener so the port actively refuses connections.
    async fn refused_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{}", addr)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exhausts_retry_budget_without_escalating() {
        let client = RevAiTranscriber::new(local_config(refused_endpoint().await)).unwrap();
        let events = client.subscribe();
        client.start();

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !client.retry_budget_exhausted() {
            assert!(
                std::time::Instant::now() < deadline,
                "supervisor never exhausted its budget"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(client.connection_attempts(), 3);
        assert!(events.try_recv().is_err());
        // The client handle stays usable; terminate still returns cleanly.
        client.terminate().await;
        assert_eq!(client.lifecycle(), LifecycleState::Closed);
    }

    #[tokio::test]
    async fn start_after_terminate_is_a_no_op() {
        let client = RevAiTranscriber::new(local_config(refused_endpoint().await)).unwrap();
        client.terminate().await;
        client.start();
        assert!(self_supervisor_is_empty(&client));
        assert_eq!(client.connection_attempts(), 0);
    }

    fn self_supervisor_is_empty(client: &RevAiTranscriber) -> bool {
        client
            .supervisor
            .lock()
            .map(|g| g.is_none())
            .unwrap_or(false)
    }
}
