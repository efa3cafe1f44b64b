//! Turn stream decoding.
//!
//! The server answers a streamed turn with Server-Sent Events. Every `data:`
//! line carries one JSON chunk of the form `{"event": {"payload": {...}}}`.
//! Lines are decoded independently into [`StreamEvent`]s; anything that does
//! not look like a text delta or a completed turn becomes
//! [`StreamEvent::Unknown`] instead of an error.

use crate::client::{StreamEvent, TurnStream};
use concierge_core::{AppError, AppResult};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;

/// Sentinel some servers send after the last event.
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    event: Option<WireEvent>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
enum WirePayload {
    StepProgress {
        #[serde(default)]
        delta: Option<WireDelta>,
    },
    TurnComplete {
        turn: WireTurn,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    /// Older servers put the fragment under `content`
    #[serde(default)]
    content: Option<String>,
}

impl WireDelta {
    fn into_text(self) -> Option<String> {
        match self.kind.as_deref() {
            None | Some("text") => self.text.or(self.content),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireTurn {
    #[serde(default)]
    output_message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: WireContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Items(Vec<WireContentItem>),
}

#[derive(Debug, Deserialize)]
struct WireContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl WireContent {
    fn into_text(self) -> Option<String> {
        match self {
            WireContent::Text(text) => Some(text),
            WireContent::Items(items) => {
                let texts: Vec<String> = items
                    .into_iter()
                    .filter(|item| item.kind == "text")
                    .filter_map(|item| item.text)
                    .collect();
                if texts.is_empty() {
                    None
                } else {
                    Some(texts.concat())
                }
            }
        }
    }
}

/// Classify an event payload.
fn classify_payload(payload: serde_json::Value) -> StreamEvent {
    let event_type = payload
        .get("event_type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    let text = match serde_json::from_value::<WirePayload>(payload) {
        Ok(WirePayload::StepProgress { delta: Some(delta) }) => {
            delta.into_text().map(StreamEvent::delta)
        }
        Ok(WirePayload::TurnComplete { turn }) => turn
            .output_message
            .and_then(|message| message.content.into_text())
            .map(StreamEvent::final_message),
        Ok(WirePayload::StepProgress { delta: None }) | Ok(WirePayload::Other) => None,
        Err(e) => {
            tracing::trace!("Unrecognized payload shape for {:?}: {}", event_type, e);
            None
        }
    };

    text.unwrap_or_else(|| StreamEvent::unknown(event_type.as_deref()))
}

/// Decode the JSON carried by one `data:` line.
///
/// Returns `None` for the `[DONE]` sentinel.
pub fn parse_event_data(data: &str) -> Option<AppResult<StreamEvent>> {
    let data = data.trim();
    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }

    let chunk: WireChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::trace!("Ignoring malformed event data: {}", e);
            return Some(Ok(StreamEvent::unknown(None)));
        }
    };

    if let Some(error) = chunk.error {
        let message = error
            .message
            .or(error.detail)
            .unwrap_or_else(|| "agent reported an error".to_string());
        return Some(Err(AppError::Stream(message)));
    }

    match chunk.event {
        Some(event) => Some(Ok(classify_payload(event.payload))),
        None => Some(Ok(StreamEvent::unknown(None))),
    }
}

/// Decode one SSE line. Comments, other fields and blank lines yield `None`.
fn parse_line(line: &[u8]) -> Option<AppResult<StreamEvent>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');
    let data = line.strip_prefix("data:")?;
    parse_event_data(data)
}

struct DecoderState<B> {
    inner: BoxStream<'static, AppResult<B>>,
    buffer: Vec<u8>,
    pending: VecDeque<AppResult<StreamEvent>>,
    finished: bool,
}

impl<B> DecoderState<B> {
    fn drain_complete_lines(&mut self) {
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(event) = parse_line(&line[..newline_pos]) {
                self.pending.push_back(event);
            }
        }
    }

    fn flush_remainder(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            if let Some(event) = parse_line(&line) {
                self.pending.push_back(event);
            }
        }
    }
}

/// Turn a byte stream of SSE text into a stream of turn events.
///
/// Bytes are buffered until a full line is available, so events and multi-byte
/// characters may be split across transport chunks. The first transport error
/// is yielded as-is and ends the stream.
pub fn decode_turn_stream<S, B>(bytes: S) -> TurnStream
where
    S: Stream<Item = AppResult<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = DecoderState {
        inner: bytes.boxed(),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }

            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    state.drain_complete_lines();
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    state.flush_remainder();
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({
                "event": {"payload": {
                    "event_type": "step_progress",
                    "step_type": "inference",
                    "delta": {"type": "text", "text": text}
                }}
            })
        )
    }

    fn complete_line(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({
                "event": {"payload": {
                    "event_type": "turn_complete",
                    "turn": {"output_message": {"role": "assistant", "content": text}}
                }}
            })
        )
    }

    async fn collect(chunks: Vec<AppResult<Vec<u8>>>) -> Vec<AppResult<StreamEvent>> {
        decode_turn_stream(futures::stream::iter(chunks))
            .collect()
            .await
    }

    #[test]
    fn test_parse_step_progress_delta() {
        let data = r#"{"event":{"payload":{"event_type":"step_progress","delta":{"type":"text","text":"Hel"}}}}"#;
        let event = parse_event_data(data).unwrap().unwrap();
        assert_eq!(event, StreamEvent::delta("Hel"));
    }

    #[test]
    fn test_parse_legacy_delta_content() {
        let data = r#"{"event":{"payload":{"event_type":"step_progress","delta":{"content":"lo"}}}}"#;
        let event = parse_event_data(data).unwrap().unwrap();
        assert_eq!(event, StreamEvent::delta("lo"));
    }

    #[test]
    fn test_parse_turn_complete_with_content_items() {
        let data = r#"{"event":{"payload":{"event_type":"turn_complete","turn":{"output_message":{"content":[{"type":"text","text":"Hi "},{"type":"image"},{"type":"text","text":"there"}]}}}}}"#;
        let event = parse_event_data(data).unwrap().unwrap();
        assert_eq!(event, StreamEvent::final_message("Hi there"));
    }

    #[test]
    fn test_tool_call_delta_is_unknown() {
        let data = r#"{"event":{"payload":{"event_type":"step_progress","delta":{"type":"tool_call","tool_call":"knowledge_search","parse_status":"in_progress"}}}}"#;
        let event = parse_event_data(data).unwrap().unwrap();
        assert_eq!(event, StreamEvent::unknown(Some("step_progress")));
    }

    #[test]
    fn test_unrecognized_event_type_is_unknown() {
        let data = r#"{"event":{"payload":{"event_type":"step_start","step_type":"tool_execution"}}}"#;
        let event = parse_event_data(data).unwrap().unwrap();
        assert_eq!(event, StreamEvent::unknown(Some("step_start")));
    }

    #[test]
    fn test_malformed_data_is_unknown() {
        let event = parse_event_data("{not json").unwrap().unwrap();
        assert_eq!(event, StreamEvent::unknown(None));
    }

    #[test]
    fn test_done_sentinel_is_skipped() {
        assert!(parse_event_data(" [DONE]").is_none());
    }

    #[test]
    fn test_error_payload_is_stream_error() {
        let result = parse_event_data(r#"{"error":{"message":"model overloaded"}}"#).unwrap();
        match result {
            Err(AppError::Stream(message)) => assert_eq!(message, "model overloaded"),
            other => panic!("Expected stream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_events_split_across_chunks() {
        let body = format!("{}{}{}", delta_line("Hel"), delta_line("lo"), complete_line("Hello!"));
        let bytes = body.into_bytes();
        let chunks: Vec<AppResult<Vec<u8>>> = bytes.chunks(7).map(|c| Ok(c.to_vec())).collect();

        let events: Vec<StreamEvent> = collect(chunks)
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::delta("Hel"),
                StreamEvent::delta("lo"),
                StreamEvent::final_message("Hello!"),
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_multibyte_split() {
        let body = delta_line("Grüße 🎤").into_bytes();
        // Split inside the microphone emoji
        let emoji = "🎤".as_bytes();
        let split = body.windows(emoji.len()).position(|w| w == emoji).unwrap() + 2;
        let chunks = vec![Ok(body[..split].to_vec()), Ok(body[split..].to_vec())];

        let events = collect(chunks).await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::delta("Grüße 🎤")
        );
    }

    #[tokio::test]
    async fn test_decode_skips_comments_and_other_fields() {
        let body = format!(
            ": keep-alive\r\nevent: message\r\nid: 7\r\n{}data: [DONE]\n",
            delta_line("ok").replace('\n', "\r\n")
        );
        let events = collect(vec![Ok(body.into_bytes())]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::delta("ok"));
    }

    #[tokio::test]
    async fn test_decode_flushes_unterminated_last_line() {
        let body = delta_line("tail");
        let body = body.trim_end().to_string();
        let events = collect(vec![Ok(body.into_bytes())]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::delta("tail"));
    }

    #[tokio::test]
    async fn test_decode_transport_error_ends_stream() {
        let chunks = vec![
            Ok(delta_line("partial").into_bytes()),
            Err(AppError::Stream("connection reset".to_string())),
            Ok(delta_line("never seen").into_bytes()),
        ];

        let events = collect(chunks).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::delta("partial"));
        assert!(matches!(events[1], Err(AppError::Stream(_))));
    }
}
