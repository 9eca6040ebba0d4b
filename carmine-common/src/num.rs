//! Numeric parsing and formatting shared by the command layer.
//!
//! Floats are formatted with Rust's shortest-round-trip formatter, which
//! already prints `2` for 2.0 and never leaves trailing zeros or a
//! dangling decimal point.

/// Parses a signed 64-bit integer from raw argument bytes.
pub fn parse_int(data: &[u8]) -> Option<i64> {
    std::str::from_utf8(data).ok()?.parse::<i64>().ok()
}

/// Parses a double from raw argument bytes.
///
/// Accepts `inf`, `+inf`, `-inf`, and `nan` spellings the way command
/// arguments do; callers reject NaN where it is not meaningful.
pub fn parse_float(data: &[u8]) -> Option<f64> {
    std::str::from_utf8(data).ok()?.parse::<f64>().ok()
}

/// Formats a double the way it is sent on the wire.
pub fn format_float(value: f64) -> String {
    if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}
