use serde_json::Value;
use tracing::{debug, warn};

use super::event::{ProgressUpdate, StreamEvent};
use super::parser::{parse_data_line, LineParser};
use super::step::Step;
use crate::error::StreamError;

/// Receiver of session updates (the UI sink).
///
/// Chunk and progress callbacks have no-op defaults so a sink can subscribe
/// to only the outcomes it renders.
pub trait StreamHandler {
    /// A non-terminal event arrived
    fn on_update(&mut self, _update: &ProgressUpdate) {}

    /// Analysis text grew; `accumulated` is everything received so far
    fn on_chunk(&mut self, _delta: &str, _accumulated: &str) {}

    /// The session finished successfully
    fn on_complete(&mut self, report: &Value);

    /// The session failed
    fn on_error(&mut self, error: &StreamError);

    /// The connection ended before any terminal event; `last_step` is the
    /// last progress marker seen
    fn on_closed(&mut self, _last_step: &Step) {}
}

/// Lifecycle of one streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    /// Returns true once nothing more will be processed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Active)
    }
}

/// One in-flight analysis or forecast request.
///
/// Mutated only by the reader loop feeding it fragments. Once a terminal
/// event has been seen the remaining input is ignored.
#[derive(Debug)]
pub struct StreamSession {
    buffer: LineParser,
    accumulated_text: String,
    last_step: Step,
    state: SessionState,
    report: Option<Value>,
    error: Option<String>,
    skipped_lines: usize,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    /// Start a fresh session
    pub fn new() -> Self {
        Self {
            buffer: LineParser::new(),
            accumulated_text: String::new(),
            last_step: Step::Initializing,
            state: SessionState::Active,
            report: None,
            error: None,
            skipped_lines: 0,
        }
    }

    /// Concatenation of every `analysis_chunk` text seen so far
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    /// Most recent phase marker received
    pub fn last_step(&self) -> &Step {
        &self.last_step
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Final report, once completed
    pub fn report(&self) -> Option<&Value> {
        self.report.as_ref()
    }

    /// Message of the error that ended the session, if it failed
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of `data:` lines dropped because they were not valid JSON
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Feed one network fragment and dispatch every complete event in it
    pub fn feed<H: StreamHandler + ?Sized>(
        &mut self,
        fragment: &[u8],
        handler: &mut H,
    ) -> SessionState {
        if self.state.is_terminal() {
            return self.state;
        }

        for line in self.buffer.feed(fragment) {
            let Some(parsed) = parse_data_line(&line) else {
                continue;
            };

            match parsed {
                Ok(value) => self.dispatch(StreamEvent::classify(value), handler),
                Err(e) => {
                    self.skipped_lines += 1;
                    warn!(error = %e, "Skipping malformed stream event");
                }
            }

            if self.state.is_terminal() {
                break;
            }
        }

        self.state
    }

    /// Apply one decoded event
    pub fn dispatch<H: StreamHandler + ?Sized>(&mut self, event: StreamEvent, handler: &mut H) {
        if self.state.is_terminal() {
            return;
        }

        match event {
            StreamEvent::Progress(update) => {
                if let Some(step) = &update.step {
                    self.last_step = step.clone();
                }
                handler.on_update(&update);
            }
            StreamEvent::AnalysisChunk { text } => {
                self.accumulated_text.push_str(&text);
                handler.on_chunk(&text, &self.accumulated_text);
            }
            StreamEvent::Complete { report } => {
                debug!(chars = self.accumulated_text.len(), "Stream session complete");
                self.last_step = Step::Complete;
                self.state = SessionState::Completed;
                handler.on_complete(&report);
                self.report = Some(report);
            }
            StreamEvent::Error { message } => {
                self.last_step = Step::Error;
                self.fail(StreamError::Upstream { message }, handler);
            }
        }
    }

    /// Terminate the session with an error (transport, status, or upstream)
    pub fn fail<H: StreamHandler + ?Sized>(&mut self, error: StreamError, handler: &mut H) {
        if self.state.is_terminal() {
            return;
        }
        self.state = SessionState::Failed;
        handler.on_error(&error);
        self.error = Some(error.to_string());
    }

    /// Stop processing at the consumer's request
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Cancelled;
            self.buffer.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<Value>,
        chunks: Vec<String>,
        completed: Vec<Value>,
        errors: Vec<String>,
    }

    impl StreamHandler for Recorder {
        fn on_update(&mut self, update: &ProgressUpdate) {
            self.updates.push(update.raw.clone());
        }

        fn on_chunk(&mut self, delta: &str, _accumulated: &str) {
            self.chunks.push(delta.to_string());
        }

        fn on_complete(&mut self, report: &Value) {
            self.completed.push(report.clone());
        }

        fn on_error(&mut self, error: &StreamError) {
            self.errors.push(error.to_string());
        }
    }

    fn frame(value: Value) -> String {
        format!("data: {}\n\n", value)
    }

    #[test]
    fn test_accumulates_chunks_in_order() {
        let mut session = StreamSession::new();
        let mut recorder = Recorder::default();

        for text in ["Hello, ", "world", "!"] {
            let f = frame(json!({"status": "analysis_chunk", "text": text}));
            session.feed(f.as_bytes(), &mut recorder);
        }

        assert_eq!(session.accumulated_text(), "Hello, world!");
        assert_eq!(recorder.chunks, vec!["Hello, ", "world", "!"]);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_accumulation_is_independent_of_fragmenting() {
        let mut payload = String::new();
        for text in ["Héllo, ", "wörld", "!"] {
            payload.push_str(&frame(json!({"status": "analysis_chunk", "text": text})));
        }

        for size in [1, 4, 9, 64] {
            let mut session = StreamSession::new();
            let mut recorder = Recorder::default();
            for fragment in payload.as_bytes().chunks(size) {
                session.feed(fragment, &mut recorder);
            }
            assert_eq!(session.accumulated_text(), "Héllo, wörld!", "chunk size {}", size);
        }
    }

    #[test]
    fn test_comment_lines_produce_no_events() {
        let mut session = StreamSession::new();
        let mut recorder = Recorder::default();

        session.feed(b": keep-alive\n\n", &mut recorder);

        assert!(recorder.updates.is_empty());
        assert!(recorder.chunks.is_empty());
        assert_eq!(session.skipped_lines(), 0);
    }

    #[test]
    fn test_invalid_json_is_skipped_and_stream_continues() {
        let mut session = StreamSession::new();
        let mut recorder = Recorder::default();

        let mut payload = String::from("data: {broken\n\n");
        payload.push_str(&frame(json!({"step": "initializing"})));
        session.feed(payload.as_bytes(), &mut recorder);

        assert_eq!(session.skipped_lines(), 1);
        assert_eq!(recorder.updates, vec![json!({"step": "initializing"})]);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_complete_is_terminal_and_stops_processing() {
        let mut session = StreamSession::new();
        let mut recorder = Recorder::default();

        let mut payload = frame(json!({"status": "complete", "report": {"x": 1}}));
        payload.push_str(&frame(json!({"status": "analysis_chunk", "text": "late"})));
        session.feed(payload.as_bytes(), &mut recorder);
        session.feed(frame(json!({"step": "initializing"})).as_bytes(), &mut recorder);

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(recorder.completed, vec![json!({"x": 1})]);
        assert_eq!(session.report(), Some(&json!({"x": 1})));
        assert!(recorder.chunks.is_empty());
        assert!(recorder.updates.is_empty());
        assert_eq!(session.accumulated_text(), "");
    }

    #[test]
    fn test_error_event_is_terminal() {
        let mut session = StreamSession::new();
        let mut recorder = Recorder::default();

        session.feed(
            frame(json!({"status": "error", "message": "boom"})).as_bytes(),
            &mut recorder,
        );
        session.feed(
            frame(json!({"status": "complete", "report": {}})).as_bytes(),
            &mut recorder,
        );

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(recorder.errors, vec!["boom".to_string()]);
        assert!(recorder.completed.is_empty());
        assert_eq!(session.last_step(), &Step::Error);
    }

    #[test]
    fn test_last_step_tracks_markers_in_any_order() {
        let mut session = StreamSession::new();
        let mut recorder = Recorder::default();

        for step in ["calculating_impact", "fetching_location_data", "mystery"] {
            session.feed(frame(json!({"step": step})).as_bytes(), &mut recorder);
        }

        assert_eq!(session.last_step(), &Step::Other("mystery".to_string()));
        assert_eq!(recorder.updates.len(), 3);
    }

    #[test]
    fn test_cancel_stops_processing() {
        let mut session = StreamSession::new();
        let mut recorder = Recorder::default();

        session.feed(b"data: {\"status\":\"analysis_chunk\",", &mut recorder);
        session.cancel();
        session.feed(b"\"text\":\"x\"}\n\n", &mut recorder);

        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(recorder.chunks.is_empty());
    }

    #[test]
    fn test_fail_after_complete_is_ignored() {
        let mut session = StreamSession::new();
        let mut recorder = Recorder::default();

        session.dispatch(StreamEvent::complete(json!({})), &mut recorder);
        session.fail(StreamError::Status { status: 500 }, &mut recorder);

        assert_eq!(session.state(), SessionState::Completed);
        assert!(recorder.errors.is_empty());
    }
}
