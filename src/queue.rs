use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// One unit of outbound traffic. The end-of-stream control message travels
/// through the same queue as audio so it is delivered after any frames still
/// pending, keeping wire order equal to enqueue order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OutboundFrame {
    Audio(Vec<u8>),
    CloseStream,
}

/// Result of a bounded-wait dequeue.
#[derive(Debug)]
pub(crate) enum Dequeued {
    Frame(OutboundFrame),
    TimedOut,
    /// Every sender is gone; no more frames will ever arrive.
    Disconnected,
}

/// Creates the shared frame queue. The receiver half is cloneable so it can
/// outlive individual session attempts: a reconnect picks up exactly where
/// the dead session left off, queued frames included.
pub(crate) fn frame_queue() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FrameSender { tx }, FrameReceiver { rx: Arc::new(Mutex::new(rx)) })
}

#[derive(Clone)]
pub(crate) struct FrameSender {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl FrameSender {
    /// Non-blocking, infallible append. A send after shutdown is dropped.
    pub(crate) fn send(&self, frame: OutboundFrame) {
        let _ = self.tx.send(frame);
    }
}

#[derive(Clone)]
pub(crate) struct FrameReceiver {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<OutboundFrame>>>,
}

impl FrameReceiver {
    /// Waits for the next frame, up to `wait`.
    pub(crate) async fn recv_timeout(&self, wait: Duration) -> Dequeued {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(frame)) => Dequeued::Frame(frame),
            Ok(None) => Dequeued::Disconnected,
            Err(_) => Dequeued::TimedOut,
        }
    }

    pub(crate) async fn is_closed(&self) -> bool {
        self.rx.lock().await.is_closed()
    }
}
