//! # Client-Side RESP2
//!
//! Command encoding and response parsing for the blocking client.
//! Responses are parsed top-down with a single reusable line buffer;
//! bulk strings stay raw bytes throughout.

use std::io::BufRead;

use crate::client::{ClientError, ClientResult};

/// One parsed server response.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// `+OK` style line.
    Simple(Vec<u8>),
    /// `-ERR ...` style line.
    Error(Vec<u8>),
    /// `:123`.
    Integer(i64),
    /// `$...` bulk string; `None` is the null bulk.
    Bulk(Option<Vec<u8>>),
    /// `*...` array of nested responses.
    Array(Vec<RespValue>),
}

/// Encodes a command as a RESP2 array of bulk strings into `out`.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    out.extend_from_slice(args.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        out.extend_from_slice(arg.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads one complete response from the buffered reader.
///
/// `scratch` is a caller-owned line buffer reused across calls to keep
/// allocations off the per-command path.
pub fn read_response<R: BufRead>(reader: &mut R, scratch: &mut Vec<u8>) -> ClientResult<RespValue> {
    read_line(reader, scratch)?;
    if scratch.is_empty() {
        return Err(ClientError::Protocol);
    }

    match scratch[0] {
        b'+' => Ok(RespValue::Simple(scratch[1..].to_vec())),
        b'-' => Ok(RespValue::Error(scratch[1..].to_vec())),
        b':' => Ok(RespValue::Integer(parse_i64(&scratch[1..])?)),
        b'$' => {
            let len = parse_i64(&scratch[1..])?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(&scratch[1..])?;
            read_array(reader, len, scratch)
        }
        _ => Err(ClientError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Bulk(None));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != *b"\r\n" {
        return Err(ClientError::Protocol);
    }
    Ok(RespValue::Bulk(Some(payload)))
}

fn read_array<R: BufRead>(
    reader: &mut R,
    len: i64,
    scratch: &mut Vec<u8>,
) -> ClientResult<RespValue> {
    if len <= 0 {
        return Ok(RespValue::Array(Vec::new()));
    }
    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        items.push(read_response(reader, scratch)?);
    }
    Ok(RespValue::Array(items))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(ClientError::Protocol);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(ClientError::Protocol)
}
