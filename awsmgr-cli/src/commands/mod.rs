//! Command implementations.
//!
//! One module per subcommand group. Each group's `run` is generic over the
//! library backend trait so the same code drives the AWS clients and the
//! in-memory backends used in tests. Results go to the given writer (stdout
//! in the binary); status and progress go to stderr.

pub(crate) mod completions;
pub(crate) mod logs;
pub(crate) mod s3;
pub(crate) mod sns;

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

/// Write `data` as the `{"ok": true, "data": ...}` JSON envelope.
pub(crate) fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, data: &T) -> Result<()> {
    let envelope = serde_json::json!({
        "ok": true,
        "data": data,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&envelope)?)?;
    Ok(())
}

/// Write the continuation token line if there is another page.
pub(crate) fn write_next_token(out: &mut dyn Write, next_token: Option<&str>) -> Result<()> {
    if let Some(token) = next_token {
        writeln!(out, "Next token: {token}")?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn output_string(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json_envelope() {
        let mut buf = Vec::new();
        write_json(&mut buf, &serde_json::json!({"count": 2})).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["data"]["count"], 2);
    }

    #[test]
    fn test_write_next_token_only_when_present() {
        let mut buf = Vec::new();
        write_next_token(&mut buf, None).unwrap();
        assert!(buf.is_empty());

        write_next_token(&mut buf, Some("abc")).unwrap();
        assert_eq!(output_string(buf), "Next token: abc\n");
    }
}
