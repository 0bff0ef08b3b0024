use chrono::Utc;

use super::frame::StreamFrame;
use crate::errors::{StreamError, TransportError};
use crate::models::{ContentPart, MessageNode, NodeStatus, Role};

/// Per-message decoding state: EMPTY (absent from the table) → ACCUMULATING →
/// COMPLETE or ERRORED.
enum MessageState {
    Accumulating(MessageNode),
    Complete,
    Errored,
}

/// Pull-based decoder turning a frame source into progressively-complete
/// message snapshots.
///
/// Each pull consumes frames until exactly one produces a snapshot (frames
/// that change nothing are skipped). Snapshots for a given message id arrive
/// in non-decreasing completeness order; snapshots across ids follow
/// frame-arrival order. The caller may stop pulling at any point — there is
/// no draining obligation, and dropping the decoder releases all buffers.
///
/// A `Done` sentinel finalizes a message and is the last emission for its id.
/// An `Error` sentinel, or source exhaustion with a message still
/// accumulating, surfaces the accumulated partial content in the error.
pub struct StreamDecoder<F> {
    frames: F,
    // Vec keeps ids in first-seen order so truncation reports are stable.
    states: Vec<(String, MessageState)>,
    exhausted: bool,
}

impl<F> StreamDecoder<F>
where
    F: Iterator<Item = Result<StreamFrame, TransportError>>,
{
    pub fn new(frames: F) -> Self {
        Self {
            frames,
            states: Vec::new(),
            exhausted: false,
        }
    }

    fn state_mut(&mut self, message_id: &str) -> Option<&mut MessageState> {
        self.states
            .iter_mut()
            .find(|(id, _)| id == message_id)
            .map(|(_, state)| state)
    }

    /// Seed an ACCUMULATING entry for an unseen id. Streamed replies are
    /// always assistant messages; a `Replace` frame overrides this anyway.
    fn seed(&mut self, message_id: &str) -> &mut MessageState {
        let node = MessageNode {
            id: message_id.to_string(),
            parent_id: None,
            children_ids: Vec::new(),
            role: Role::Assistant,
            content: Vec::new(),
            created_at: Utc::now(),
            status: NodeStatus::InProgress,
        };
        self.states
            .push((message_id.to_string(), MessageState::Accumulating(node)));
        let last = self.states.last_mut().expect("just pushed");
        &mut last.1
    }

    /// Apply one frame; returns the snapshot to emit, if any.
    fn apply(&mut self, frame: StreamFrame) -> Result<Option<MessageNode>, StreamError> {
        match frame {
            StreamFrame::Delta {
                message_id,
                part,
                text,
            } => {
                if self.state_mut(&message_id).is_none() {
                    self.seed(&message_id);
                }
                match self.state_mut(&message_id).expect("seeded above") {
                    MessageState::Accumulating(node) => {
                        while node.content.len() <= part {
                            node.content.push(ContentPart::new(""));
                        }
                        node.content[part].text.push_str(&text);
                        Ok(Some(node.clone()))
                    }
                    // Frames after a terminal sentinel are stale replays.
                    _ => {
                        eprintln!(
                            "Warning: dropping delta for finished message {}",
                            message_id
                        );
                        Ok(None)
                    }
                }
            }
            StreamFrame::Replace { mut message } => {
                message.status = NodeStatus::InProgress;
                let message_id = message.id.clone();
                match self.state_mut(&message_id) {
                    None => {
                        self.seed(&message_id);
                        let state = self.state_mut(&message_id).expect("seeded above");
                        *state = MessageState::Accumulating(message.clone());
                        Ok(Some(message))
                    }
                    Some(state @ MessageState::Accumulating(_)) => {
                        *state = MessageState::Accumulating(message.clone());
                        Ok(Some(message))
                    }
                    Some(_) => {
                        eprintln!(
                            "Warning: dropping replacement for finished message {}",
                            message_id
                        );
                        Ok(None)
                    }
                }
            }
            StreamFrame::Done { message_id } => match self.state_mut(&message_id) {
                Some(state @ MessageState::Accumulating(_)) => {
                    let MessageState::Accumulating(node) = state else {
                        unreachable!()
                    };
                    let mut finished = node.clone();
                    finished.status = NodeStatus::Complete;
                    *state = MessageState::Complete;
                    Ok(Some(finished))
                }
                _ => Ok(None),
            },
            StreamFrame::Error { message_id, reason } => {
                let partial = match self.state_mut(&message_id) {
                    Some(state @ MessageState::Accumulating(_)) => {
                        let MessageState::Accumulating(node) = state else {
                            unreachable!()
                        };
                        let partial = node.joined_text();
                        *state = MessageState::Errored;
                        partial
                    }
                    _ => String::new(),
                };
                Err(StreamError::Interrupted {
                    message_id,
                    reason,
                    partial,
                })
            }
        }
    }

    /// Stream-level close without a terminal sentinel: the first message
    /// still accumulating becomes ERRORED and its partial content surfaces.
    fn truncation(&mut self) -> Option<StreamError> {
        for (id, state) in self.states.iter_mut() {
            if let MessageState::Accumulating(node) = state {
                let partial = node.joined_text();
                let message_id = id.clone();
                *state = MessageState::Errored;
                return Some(StreamError::Truncated {
                    message_id,
                    partial,
                });
            }
        }
        None
    }
}

impl<F> Iterator for StreamDecoder<F>
where
    F: Iterator<Item = Result<StreamFrame, TransportError>>,
{
    type Item = Result<MessageNode, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.exhausted {
                return self.truncation().map(Err);
            }
            match self.frames.next() {
                Some(Ok(frame)) => match self.apply(frame) {
                    Ok(Some(snapshot)) => return Some(Ok(snapshot)),
                    Ok(None) => continue,
                    Err(err) => return Some(Err(err)),
                },
                Some(Err(transport)) => {
                    self.exhausted = true;
                    return Some(Err(StreamError::Source(transport)));
                }
                None => {
                    self.exhausted = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(id: &str, text: &str) -> Result<StreamFrame, TransportError> {
        Ok(StreamFrame::Delta {
            message_id: id.to_string(),
            part: 0,
            text: text.to_string(),
        })
    }

    fn delta_part(id: &str, part: usize, text: &str) -> Result<StreamFrame, TransportError> {
        Ok(StreamFrame::Delta {
            message_id: id.to_string(),
            part,
            text: text.to_string(),
        })
    }

    fn done(id: &str) -> Result<StreamFrame, TransportError> {
        Ok(StreamFrame::Done {
            message_id: id.to_string(),
        })
    }

    fn decode_all(
        frames: Vec<Result<StreamFrame, TransportError>>,
    ) -> Vec<Result<MessageNode, StreamError>> {
        StreamDecoder::new(frames.into_iter()).collect()
    }

    #[test]
    fn test_progressive_growth_then_done() {
        let out = decode_all(vec![delta("m1", "Hel"), delta("m1", "lo"), done("m1")]);
        assert_eq!(out.len(), 3);

        let texts: Vec<String> = out
            .iter()
            .map(|r| r.as_ref().unwrap().joined_text())
            .collect();
        assert_eq!(texts, vec!["Hel", "Hello", "Hello"]);

        let statuses: Vec<NodeStatus> =
            out.iter().map(|r| r.as_ref().unwrap().status).collect();
        assert_eq!(
            statuses,
            vec![
                NodeStatus::InProgress,
                NodeStatus::InProgress,
                NodeStatus::Complete
            ]
        );
    }

    #[test]
    fn test_truncated_stream_carries_partial() {
        let out = decode_all(vec![delta("m1", "partial")]);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        match out[1].as_ref().unwrap_err() {
            StreamError::Truncated {
                message_id,
                partial,
            } => {
                assert_eq!(message_id, "m1");
                assert_eq!(partial, "partial");
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_error_sentinel_carries_partial() {
        let frames = vec![
            delta("m1", "half-finis"),
            Ok(StreamFrame::Error {
                message_id: "m1".to_string(),
                reason: "server hiccup".to_string(),
            }),
        ];
        let out = decode_all(frames);
        match out[1].as_ref().unwrap_err() {
            StreamError::Interrupted {
                partial, reason, ..
            } => {
                assert_eq!(partial, "half-finis");
                assert_eq!(reason, "server hiccup");
            }
            other => panic!("expected Interrupted, got {other:?}"),
        }
        // The errored id is settled; no additional truncation error follows.
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_replace_overwrites_accumulated_content() {
        let replacement = MessageNode {
            id: "m1".to_string(),
            parent_id: None,
            children_ids: Vec::new(),
            role: Role::Assistant,
            content: vec![ContentPart::new("corrected")],
            created_at: Utc::now(),
            status: NodeStatus::InProgress,
        };
        let out = decode_all(vec![
            delta("m1", "wrong"),
            Ok(StreamFrame::Replace {
                message: replacement,
            }),
            done("m1"),
        ]);
        let texts: Vec<String> = out
            .iter()
            .map(|r| r.as_ref().unwrap().joined_text())
            .collect();
        assert_eq!(texts, vec!["wrong", "corrected", "corrected"]);
    }

    #[test]
    fn test_parallel_parts_tracked_independently() {
        let out = decode_all(vec![
            delta_part("m1", 0, "alpha"),
            delta_part("m1", 1, "beta"),
            delta_part("m1", 0, "!"),
            done("m1"),
        ]);
        let final_node = out.last().unwrap().as_ref().unwrap();
        assert_eq!(final_node.content.len(), 2);
        assert_eq!(final_node.content[0].text, "alpha!");
        assert_eq!(final_node.content[1].text, "beta");
    }

    #[test]
    fn test_frames_after_done_are_ignored() {
        let out = decode_all(vec![delta("m1", "x"), done("m1"), delta("m1", "late")]);
        // delta, done — the late delta emits nothing and nothing is left
        // accumulating at close.
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].as_ref().unwrap().joined_text(), "x");
    }

    #[test]
    fn test_interleaved_ids_emit_in_arrival_order() {
        let out = decode_all(vec![
            delta("m1", "a"),
            delta("m2", "b"),
            delta("m1", "c"),
            done("m1"),
            done("m2"),
        ]);
        let ids: Vec<String> = out
            .iter()
            .map(|r| r.as_ref().unwrap().id.clone())
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m1", "m1", "m2"]);
    }

    #[test]
    fn test_source_error_surfaces() {
        let frames = vec![
            delta("m1", "x"),
            Err(TransportError::Unreachable("connection reset".to_string())),
        ];
        let out = decode_all(frames);
        assert!(matches!(
            out[1].as_ref().unwrap_err(),
            StreamError::Source(_)
        ));
    }

    #[test]
    fn test_abandoning_mid_stream_is_safe() {
        let frames = vec![delta("m1", "a"), delta("m1", "b"), done("m1")];
        let mut decoder = StreamDecoder::new(frames.into_iter());
        let first = decoder.next().unwrap().unwrap();
        assert_eq!(first.joined_text(), "a");
        drop(decoder);
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        let out = decode_all(Vec::new());
        assert!(out.is_empty());
    }
}
