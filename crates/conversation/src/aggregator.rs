//! Stream aggregation.
//!
//! Reduces the events of one turn to the answer text. Deltas win over the
//! final message: when any non-empty delta text arrived, the answer is the
//! deltas concatenated in arrival order and the final message is ignored.

use concierge_agent::{StreamEvent, TurnStream};
use concierge_core::config::DEFAULT_FALLBACK_RESPONSE;
use concierge_core::{AppError, AppResult};
use futures::StreamExt;

/// Running state of one reduction.
#[derive(Debug, Default)]
pub struct Aggregation {
    accumulated: String,
    saw_delta: bool,
    final_text: Option<String>,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event in. Returns the delta text when the event was a delta.
    pub fn push(&mut self, event: StreamEvent) -> Option<String> {
        match event {
            StreamEvent::DeltaChunk { text } => {
                self.accumulated.push_str(&text);
                self.saw_delta = true;
                Some(text)
            }
            StreamEvent::FinalMessage { text } => {
                if self.final_text.is_none() {
                    self.final_text = Some(text);
                }
                None
            }
            StreamEvent::Unknown { event_type } => {
                tracing::trace!("Ignoring stream event {:?}", event_type);
                None
            }
        }
    }

    pub fn saw_delta(&self) -> bool {
        self.saw_delta
    }

    /// Text collected from deltas so far.
    pub fn partial(&self) -> &str {
        &self.accumulated
    }

    /// Produce the answer, using `fallback` when the turn yielded no text.
    pub fn finish(self, fallback: &str) -> String {
        if self.saw_delta && !self.accumulated.is_empty() {
            return self.accumulated;
        }

        match self.final_text {
            Some(text) if !text.is_empty() => text,
            _ => fallback.to_string(),
        }
    }
}

/// Consumes turn streams into answers.
#[derive(Debug, Clone)]
pub struct StreamAggregator {
    fallback: String,
}

impl StreamAggregator {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
        }
    }

    /// Consume `stream` to exhaustion and return the answer.
    pub async fn aggregate(&self, stream: TurnStream) -> AppResult<String> {
        self.aggregate_with(stream, |_| {}).await
    }

    /// Like [`aggregate`](Self::aggregate), calling `on_delta` with each
    /// fragment as it arrives.
    ///
    /// # Errors
    /// `AppError::Stream` when the transport breaks; text collected up to that
    /// point is discarded.
    pub async fn aggregate_with<F>(&self, mut stream: TurnStream, mut on_delta: F) -> AppResult<String>
    where
        F: FnMut(&str),
    {
        let mut aggregation = Aggregation::new();

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    if !aggregation.partial().is_empty() {
                        tracing::warn!(
                            "Discarding {} bytes of partial response after stream failure",
                            aggregation.partial().len()
                        );
                    }
                    return Err(match e {
                        AppError::Stream(_) => e,
                        other => AppError::Stream(other.to_string()),
                    });
                }
            };

            if let Some(text) = aggregation.push(event) {
                on_delta(&text);
            }
        }

        Ok(aggregation.finish(&self.fallback))
    }
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_RESPONSE)
    }
}
