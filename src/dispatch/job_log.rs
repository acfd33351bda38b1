//! # Rendering job log records and results into bounded text lines.
//!
//! One policy, applied uniformly to handler log entries and to the final
//! result before emission:
//!
//! - a **scalar** value becomes a single record, truncated to
//!   [`MAX_LOG_CHARS`] characters with [`TRUNCATION_MARKER`] appended when
//!   longer;
//! - a **non-scalar** value (array, object) is rendered as pretty-printed
//!   multi-line text, trimmed, and split into one record per line.
//!
//! ```rust
//! use serde_json::json;
//! use gearvisor::dispatch::render_value;
//!
//! assert_eq!(render_value(&json!("ok")), vec!["ok"]);
//! assert_eq!(render_value(&json!(42)), vec!["42"]);
//!
//! let lines = render_value(&json!({ "resized": 3 }));
//! assert!(lines.len() > 1); // one record per rendered line
//! ```

use serde_json::Value;

/// Longest log record emitted verbatim; longer scalars are truncated.
pub const MAX_LOG_CHARS: usize = 256;

/// Suffix appended to truncated records.
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Renders a value into log records under the uniform policy.
pub fn render_value(value: &Value) -> Vec<String> {
    if let Some(text) = scalar_text(value) {
        return vec![clip(&text)];
    }
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    pretty.trim().lines().map(str::to_string).collect()
}

/// Truncates `text` to [`MAX_LOG_CHARS`] characters, appending the marker
/// when anything was cut. Character-based, so multi-byte text never splits
/// inside a code point.
pub fn clip(text: &str) -> String {
    let mut chars = text.char_indices();
    match chars.nth(MAX_LOG_CHARS) {
        None => text.to_string(),
        Some((byte_end, _)) => {
            let mut out = String::with_capacity(byte_end + TRUNCATION_MARKER.len());
            out.push_str(&text[..byte_end]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

/// Display text of a primitive scalar, `None` for arrays and objects.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null | Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
