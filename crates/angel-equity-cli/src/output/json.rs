use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print the result envelope to stdout. Decimals are already strings,
/// so amounts keep every digit.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    if let Err(e) = write_json(&mut stdout.lock(), value) {
        tracing::error!(error = %e, "failed to write JSON output");
    }
}

fn write_json<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}
