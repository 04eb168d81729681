//! Server-Sent Events plumbing shared by the gateway and the client.
//!
//! This module provides:
//! - Byte-level line splitting with carry-over between fragments
//! - `data:` line decoding and event classification
//! - The step dispatch table used for status display
//! - Streaming sessions that accumulate analysis text
//! - The reader loop that drives a session from an HTTP response

mod consumer;
mod event;
mod parser;
mod session;
mod step;

pub use consumer::consume_response;
pub use event::{ProgressUpdate, StreamEvent};
pub use parser::{parse_data_line, LineParser, DATA_PREFIX};
pub use session::{SessionState, StreamHandler, StreamSession};
pub use step::{Step, SummaryKind};
