use crate::config::EndpointingMode;
use crate::error::TranscriberError;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// A normalized transcription event pushed to subscribers.
///
/// `confidence` is always 1.0: the service does not supply a usable score.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
    pub is_final: bool,
}

/// One decoded message from the wire.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ServerMessage {
    Connected,
    /// Cumulative in-progress result; element values concatenate to the text.
    Partial(Vec<String>),
    /// Authoritative end of the utterance.
    Final(Vec<String>),
    /// Unrecognized `type`; ignored without ending the session.
    Other(String),
}

/// Decodes a text frame into a [`ServerMessage`].
///
/// Non-JSON input or a partial/final without a well-formed `elements` array
/// is a decode error and ends the session attempt. An unknown `type` is not:
/// the service may add message kinds we do not care about.
pub(crate) fn parse_message(text: &str) -> Result<ServerMessage, TranscriberError> {
    let event: Value = serde_json::from_str(text)?;
    let kind = event.get("type").and_then(|t| t.as_str()).unwrap_or("");
    match kind {
        "connected" => Ok(ServerMessage::Connected),
        "partial" | "final" => {
            let elements = event
                .get("elements")
                .and_then(|e| e.as_array())
                .ok_or(TranscriberError::MissingField("elements"))?;
            let values = elements
                .iter()
                .map(|el| {
                    el.get("value")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .ok_or(TranscriberError::MissingField("value"))
                })
                .collect::<Result<Vec<String>, _>>()?;
            if kind == "final" {
                Ok(ServerMessage::Final(values))
            } else {
                Ok(ServerMessage::Partial(values))
            }
        }
        other => Ok(ServerMessage::Other(other.to_string())),
    }
}

/// Holds the evolving text of the current utterance and decides finality.
///
/// The service sends cumulative results, so each partial replaces the buffer
/// outright. The growth timestamp moves only when the new text is strictly
/// longer than the old, which is what the time-cutoff endpointing compares
/// against: a buffer that stopped growing for the configured window is
/// treated as a finished utterance even without a server `final`.
pub(crate) struct UtteranceAccumulator {
    mode: EndpointingMode,
    buffer: String,
    last_growth: Instant,
}

impl UtteranceAccumulator {
    pub(crate) fn new(mode: EndpointingMode) -> Self {
        Self {
            mode,
            buffer: String::new(),
            last_growth: Instant::now(),
        }
    }

    /// Applies one decoded message, returning the event to emit, if any.
    pub(crate) fn observe(&mut self, message: &ServerMessage) -> Option<Transcription> {
        let (elements, from_server) = match message {
            ServerMessage::Connected | ServerMessage::Other(_) => return None,
            ServerMessage::Partial(elements) => (elements, false),
            ServerMessage::Final(elements) => (elements, true),
        };

        let mut is_done = from_server;
        if !is_done && !self.buffer.is_empty() {
            if let EndpointingMode::TimeCutoff { seconds } = self.mode {
                // A degenerate cutoff (negative, NaN, astronomical) never fires.
                let deadline = Duration::try_from_secs_f64(seconds)
                    .ok()
                    .and_then(|cutoff| self.last_growth.checked_add(cutoff));
                if matches!(deadline, Some(d) if Instant::now() > d) {
                    is_done = true;
                }
            }
        }

        let new_text = elements.concat();
        if new_text.len() > self.buffer.len() {
            self.last_growth = Instant::now();
        }
        self.buffer = new_text;

        let event = Transcription {
            text: self.buffer.clone(),
            confidence: 1.0,
            is_final: is_done,
        };
        if is_done {
            self.buffer.clear();
        }
        Some(event)
    }
}
