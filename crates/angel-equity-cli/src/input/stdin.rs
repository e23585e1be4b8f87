use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Read a piped request from stdin. Returns `None` when stdin is a TTY or
/// carries nothing but whitespace.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_document(&buffer)
}

/// JSON when the document opens with `{` or `[`, YAML otherwise.
fn parse_document<T: DeserializeOwned>(raw: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let is_json = trimmed.starts_with('{') || trimmed.starts_with('[');
    tracing::debug!(bytes = trimmed.len(), json = is_json, "read request from stdin");
    let request = if is_json {
        serde_json::from_str(trimmed).map_err(|e| format!("Failed to parse stdin as JSON: {e}"))?
    } else {
        serde_yaml::from_str(trimmed).map_err(|e| format!("Failed to parse stdin as YAML: {e}"))?
    };
    Ok(Some(request))
}
