use serde_json::Value;

use super::payload::node_from_message_value;
use crate::errors::TransportError;
use crate::stream::StreamFrame;

/// Binds the service's event-stream framing to [`StreamFrame`]s.
///
/// The live wire pushes `data: <json>` lines where the JSON carries a full
/// `message` snapshot, closing with a bare `data: [DONE]`. Because `[DONE]`
/// names no message, the reader remembers the last id it saw and binds the
/// sentinel to it. Replay files use the `kind`-tagged JSON form of
/// [`StreamFrame`] directly; both shapes are accepted line by line.
///
/// Unrecognizable lines are skipped with a stderr warning so a single garbled
/// line cannot kill a live reply.
pub struct FrameReader<L> {
    lines: L,
    last_message_id: Option<String>,
}

impl<L> FrameReader<L>
where
    L: Iterator<Item = Result<String, TransportError>>,
{
    pub fn new(lines: L) -> Self {
        Self {
            lines,
            last_message_id: None,
        }
    }

    fn frame_from_line(&mut self, line: &str) -> Option<StreamFrame> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        // Event-stream framing; anything without the prefix is taken as a
        // bare replay-file line.
        let data = trimmed.strip_prefix("data: ").unwrap_or(trimmed);

        if data == "[DONE]" {
            let message_id = self.last_message_id.take()?;
            return Some(StreamFrame::Done { message_id });
        }

        // Canonical kind-tagged form first (replay files).
        if let Ok(frame) = serde_json::from_str::<StreamFrame>(data) {
            self.last_message_id = Some(frame.message_id().to_string());
            return Some(frame);
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(e) => {
                eprintln!("Warning: skipping unparseable stream line: {}", e);
                return None;
            }
        };

        if let Some(reason) = value.get("error") {
            let message_id = self.last_message_id.clone().unwrap_or_default();
            return Some(StreamFrame::Error {
                message_id,
                reason: reason
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| reason.to_string()),
            });
        }

        let Some(message) = value.get("message").and_then(node_from_message_value) else {
            eprintln!("Warning: skipping stream event without a usable message");
            return None;
        };
        self.last_message_id = Some(message.id.clone());
        Some(StreamFrame::Replace { message })
    }
}

impl<L> Iterator for FrameReader<L>
where
    L: Iterator<Item = Result<String, TransportError>>,
{
    type Item = Result<StreamFrame, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) => {
                    if let Some(frame) = self.frame_from_line(&line) {
                        return Some(Ok(frame));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
