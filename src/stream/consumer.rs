use futures::StreamExt;
use tracing::{debug, error, info};

use super::session::{SessionState, StreamHandler, StreamSession};
use crate::error::StreamError;

/// Drive a session from an HTTP response body until it ends.
///
/// A non-2xx status fails the session before any body is read. There is no
/// retry and no read timeout; the loop stops on a terminal event, on a read
/// failure, or when the server closes the connection. A close that leaves
/// the session active is reported through `StreamHandler::on_closed`.
pub async fn consume_response<H: StreamHandler + ?Sized>(
    response: reqwest::Response,
    session: &mut StreamSession,
    handler: &mut H,
) -> SessionState {
    let status = response.status();
    if !status.is_success() {
        error!(status = status.as_u16(), "Stream request rejected");
        session.fail(
            StreamError::Status {
                status: status.as_u16(),
            },
            handler,
        );
        return session.state();
    }

    let mut body = response.bytes_stream();
    let mut fragments = 0usize;

    while let Some(next) = body.next().await {
        match next {
            Ok(bytes) => {
                fragments += 1;
                if session.feed(&bytes, handler).is_terminal() {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "Stream read failed");
                session.fail(
                    StreamError::Transport {
                        message: e.to_string(),
                    },
                    handler,
                );
                break;
            }
        }
    }

    debug!(fragments, state = ?session.state(), "Stream reader loop finished");
    if session.state() == SessionState::Active {
        info!(last_step = %session.last_step(), "Stream closed without a terminal event");
        handler.on_closed(session.last_step());
    }

    session.state()
}
