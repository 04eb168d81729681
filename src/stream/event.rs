use serde_json::{json, Map, Value};

use super::step::Step;

/// A non-terminal event, forwarded to the UI with the full parsed object
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Parsed `step` field, if present
    pub step: Option<Step>,
    /// Structured payload carried by the step, if any
    pub data: Option<Value>,
    /// The complete JSON object as received
    pub raw: Value,
}

/// One application-level event decoded from an SSE `data:` line
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Named phase marker or any other non-terminal object
    Progress(ProgressUpdate),
    /// Incremental analysis text to append to the session accumulator
    AnalysisChunk { text: String },
    /// Terminal success carrying the final report
    Complete { report: Value },
    /// Terminal failure reported by the server
    Error { message: String },
}

impl StreamEvent {
    /// Decide what a parsed object means. `status` wins over `step`.
    pub fn classify(value: Value) -> Self {
        match value.get("status").and_then(Value::as_str) {
            Some("complete") => StreamEvent::Complete {
                report: value.get("report").cloned().unwrap_or(Value::Null),
            },
            Some("error") => StreamEvent::Error {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            },
            Some("analysis_chunk") => StreamEvent::AnalysisChunk {
                text: value
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => {
                let step = value.get("step").and_then(Value::as_str).map(Step::from_name);
                let data = value.get("data").cloned();
                StreamEvent::Progress(ProgressUpdate {
                    step,
                    data,
                    raw: value,
                })
            }
        }
    }

    /// Build a step marker with an optional data payload
    pub fn step(step: Step, data: Option<Value>) -> Self {
        let mut raw = Map::new();
        raw.insert("step".to_string(), Value::String(step.as_str().to_string()));
        if let Some(data) = &data {
            raw.insert("data".to_string(), data.clone());
        }
        StreamEvent::Progress(ProgressUpdate {
            step: Some(step),
            data,
            raw: Value::Object(raw),
        })
    }

    /// Build an analysis text chunk
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamEvent::AnalysisChunk { text: text.into() }
    }

    /// Build the terminal success event
    pub fn complete(report: Value) -> Self {
        StreamEvent::Complete { report }
    }

    /// Build the terminal failure event
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// Returns true if this event ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }

    /// JSON object as it travels on the wire
    pub fn to_value(&self) -> Value {
        match self {
            StreamEvent::Progress(update) => update.raw.clone(),
            StreamEvent::AnalysisChunk { text } => json!({ "status": "analysis_chunk", "text": text }),
            StreamEvent::Complete { report } => json!({ "status": "complete", "report": report }),
            StreamEvent::Error { message } => json!({ "status": "error", "message": message }),
        }
    }

    /// Full SSE frame: `data: <json>` followed by a blank line
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_value())
    }
}
