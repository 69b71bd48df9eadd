use crate::client::TranscriberShared;
use crate::queue::{Dequeued, FrameReceiver, OutboundFrame};
use crate::transcript::{parse_message, UtteranceAccumulator};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite};

/// How one connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionOutcome {
    /// The WebSocket handshake never completed.
    ConnectFailed,
    /// The session ran and then stopped (idle exit, transport loss, decode
    /// failure, or client shutdown).
    Ended,
}

/// Keeps a session alive until the retry budget is spent or the client
/// closes. No backoff between attempts: connection loss is the expected
/// failure mode of a long-lived stream and a fresh attempt starts at once.
pub(crate) async fn run_supervisor(shared: Arc<TranscriberShared>, frames: FrameReceiver) {
    let url = shared.config.stream_url(&shared.api_key);
    let budget = shared.config.retry_budget;
    let mut restarts: u32 = 0;

    while !shared.lifecycle.is_closing() && restarts < budget {
        if frames.is_closed().await {
            log::debug!("frame queue closed; supervisor stopping");
            return;
        }
        let outcome = run_session(&url, &frames, &shared).await;
        restarts += 1;
        shared.attempts.store(restarts, Ordering::SeqCst);
        log::debug!(
            "session ended ({:?}), restart {}/{}",
            outcome,
            restarts,
            budget
        );
    }

    if !shared.lifecycle.is_closing() && restarts >= budget {
        shared.exhausted.store(true, Ordering::SeqCst);
        log::warn!(
            "retry budget of {} connection attempts exhausted; no further transcriptions will be produced",
            budget
        );
    }
}

/// Runs exactly one connection attempt to completion: connect, then a send
/// flow and a receive flow over the split socket, joined before returning.
pub(crate) async fn run_session(
    url: &str,
    frames: &FrameReceiver,
    shared: &Arc<TranscriberShared>,
) -> SessionOutcome {
    let ws_stream = match connect_async(url).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            log::debug!("connect failed: {}", e);
            return SessionOutcome::ConnectFailed;
        }
    };
    log::debug!("websocket connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let idle_timeout = Duration::from_secs(shared.config.idle_timeout_secs.max(1));

    // Send flow: drain the frame queue onto the wire. A quiet queue ends the
    // attempt after the idle timeout and lets the supervisor start fresh.
    let send_shared = shared.clone();
    let send_frames = frames.clone();
    let send_task = tokio::spawn(async move {
        while !send_shared.lifecycle.is_closing() {
            match send_frames.recv_timeout(idle_timeout).await {
                Dequeued::Frame(OutboundFrame::Audio(pcm)) => {
                    if ws_tx
                        .send(tungstenite::Message::Binary(pcm.into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Dequeued::Frame(OutboundFrame::CloseStream) => {
                    let msg = serde_json::json!({"type": "CloseStream"});
                    let _ = ws_tx
                        .send(tungstenite::Message::Text(msg.to_string().into()))
                        .await;
                    break;
                }
                Dequeued::TimedOut => {
                    log::debug!("no audio for {:?}; ending session attempt", idle_timeout);
                    break;
                }
                Dequeued::Disconnected => break,
            }
        }
        // Closing our side unblocks the peer read in the receive flow.
        let _ = ws_tx.close().await;
        log::debug!("sender flow stopped");
    });

    // Receive flow: decode server messages and feed the utterance
    // accumulator. Each attempt starts a fresh utterance context.
    let recv_shared = shared.clone();
    let recv_task = tokio::spawn(async move {
        let mut utterance = UtteranceAccumulator::new(recv_shared.config.endpointing);
        while !recv_shared.lifecycle.is_closing() {
            let msg = match ws_rx.next().await {
                Some(Ok(m)) => m,
                Some(Err(e)) => {
                    log::debug!("websocket error: {}", e);
                    break;
                }
                None => break,
            };
            let text = match msg {
                tungstenite::Message::Text(t) => t,
                tungstenite::Message::Close(_) => break,
                _ => continue,
            };
            let parsed = match parse_message(&text) {
                Ok(m) => m,
                Err(e) => {
                    log::debug!("undecodable server message: {}", e);
                    break;
                }
            };
            if let Some(event) = utterance.observe(&parsed) {
                recv_shared.emit(event);
            }
        }
        log::debug!("receiver flow stopped");
    });

    let _ = tokio::join!(send_task, recv_task);
    SessionOutcome::Ended
}
