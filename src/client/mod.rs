//! Terminal client for the gateway.
//!
//! `ApiClient` speaks HTTP, `AppController` holds the user's selection and
//! persists it, and `TerminalRenderer` is the stream sink that prints.

mod api;
mod controller;
mod render;

pub use api::{resolve_base_url, ApiClient};
pub use controller::AppController;
pub use render::{summarize, TerminalRenderer};
