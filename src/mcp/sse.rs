//! Line classification for session-proxy event streams
//!
//! Bodies are split into lines by the HTTP transport; these helpers decide
//! what a single line carries.

use serde_json::Value;

/// Prefix of the line announcing the session endpoint
pub const SESSION_ENDPOINT_PREFIX: &str = "data: /message?sessionId=";

/// Session path (`/message?sessionId=...`) announced by a handshake line
pub fn session_path_from_line(line: &str) -> Option<&str> {
    let line = line.trim_end();
    if line.starts_with(SESSION_ENDPOINT_PREFIX) {
        Some(&line["data: ".len()..])
    } else {
        None
    }
}

/// JSON payload carried by a response line
///
/// Accepts bare `{...}` lines and `data: {...}` event lines. Lines that look
/// like JSON but do not parse yield `None`.
pub fn json_from_line(line: &str) -> Option<Value> {
    let trimmed = line.trim();
    let payload = if trimmed.starts_with("data: {") {
        &trimmed["data: ".len()..]
    } else if trimmed.starts_with('{') {
        trimmed
    } else {
        return None;
    };

    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("[MCP] Ignoring unparseable line ({}): {}", e, trimmed);
            None
        }
    }
}
