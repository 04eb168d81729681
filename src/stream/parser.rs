use serde_json::Value;
use tracing::debug;

/// Prefix that marks an SSE data line. Case-sensitive, includes the space.
pub const DATA_PREFIX: &str = "data: ";

/// Splits an arbitrarily chunked byte stream into complete lines.
///
/// Splitting happens on raw bytes, so a fragment boundary that falls inside a
/// multi-byte UTF-8 character is harmless: the character is only decoded once
/// its line is complete. The final segment after the last newline is held
/// back until the next fragment arrives.
#[derive(Debug, Default, Clone)]
pub struct LineParser {
    buffer: Vec<u8>,
}

impl LineParser {
    /// Create an empty parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every line it completed
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(fragment);

        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete[..complete.len() - 1]
            .split(|b| *b == b'\n')
            .map(|raw| {
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                String::from_utf8_lossy(raw).into_owned()
            })
            .collect()
    }

    /// Bytes held back waiting for a newline
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop any held-back bytes
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Interpret one line as an SSE data event.
///
/// Returns `None` for anything that is not a `data: ` line (comments such as
/// `: keep-alive`, blank separators, `event:` fields). Otherwise the JSON
/// parse outcome is returned so the caller can decide how to fail.
pub fn parse_data_line(line: &str) -> Option<Result<Value, serde_json::Error>> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let parsed = serde_json::from_str::<Value>(payload);
    if let Err(e) = &parsed {
        debug!(error = %e, len = payload.len(), "SSE data line is not valid JSON");
    }
    Some(parsed)
}
