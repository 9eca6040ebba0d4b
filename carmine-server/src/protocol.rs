//! # RESP Request Parser
//!
//! Streaming decoder for inbound command frames. The connection handler
//! reads raw bytes into a `BytesMut` and calls [`RespParser::parse`] in
//! a loop; the parser consumes nothing until a complete frame is
//! buffered, so partial reads and pipelined requests both fall out of
//! the same code path.
//!
//! Accepted frames:
//! - `*N` arrays of `$L` bulk strings (the normal command form);
//! - a standalone `$L` bulk string, yielding a one-argument frame;
//! - a `+` simple line, yielding a one-argument frame.
//!
//! Anything else is a protocol error; the handler reports it and closes
//! the connection.

use bytes::{Buf, BytesMut};

/// Upper bound on elements in one command frame.
const MAX_FRAME_ARGS: i64 = 1024 * 1024;

/// Upper bound on a single bulk payload (512 MB, the conventional cap).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Errors produced while decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespError {
    /// Malformed frame; the payload describes what was wrong.
    Protocol(String),
}

impl RespError {
    fn protocol(message: impl Into<String>) -> RespError {
        RespError::Protocol(message.into())
    }
}

/// Incremental frame decoder; one per connection.
pub struct RespParser;

impl RespParser {
    pub fn new() -> Self {
        RespParser
    }

    /// Attempts to decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(Some(args))` and consumes the frame's bytes when a
    /// complete frame is available, `Ok(None)` (consuming nothing) when
    /// more bytes are needed, and an error on malformed input.
    pub fn parse(&mut self, buf: &mut BytesMut) -> Result<Option<Vec<Vec<u8>>>, RespError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let mut pos = 0;
        let args = match buf[0] {
            b'*' => match self.parse_array(buf, &mut pos)? {
                Some(args) => args,
                None => return Ok(None),
            },
            b'$' => match self.parse_bulk_element(buf, &mut pos)? {
                Some(arg) => vec![arg],
                None => return Ok(None),
            },
            b'+' => match read_line(buf, &mut pos)? {
                Some(line) => vec![line[1..].to_vec()],
                None => return Ok(None),
            },
            other => {
                return Err(RespError::protocol(format!(
                    "unexpected first byte 0x{:02x}",
                    other
                )))
            }
        };

        buf.advance(pos);
        Ok(Some(args))
    }

    fn parse_array(
        &self,
        buf: &BytesMut,
        pos: &mut usize,
    ) -> Result<Option<Vec<Vec<u8>>>, RespError> {
        let header = match read_line(buf, pos)? {
            Some(line) => line,
            None => return Ok(None),
        };
        let count = parse_length(&header[1..])
            .ok_or_else(|| RespError::protocol("invalid multibulk length"))?;
        if count < 0 || count > MAX_FRAME_ARGS {
            return Err(RespError::protocol("invalid multibulk length"));
        }

        let mut args = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.parse_bulk_element(buf, pos)? {
                Some(arg) => args.push(arg),
                None => return Ok(None),
            }
        }
        Ok(Some(args))
    }

    fn parse_bulk_element(
        &self,
        buf: &BytesMut,
        pos: &mut usize,
    ) -> Result<Option<Vec<u8>>, RespError> {
        let header = match read_line(buf, pos)? {
            Some(line) => line,
            None => return Ok(None),
        };
        if header.first() != Some(&b'$') {
            return Err(RespError::protocol(format!(
                "expected '$', got 0x{:02x}",
                header.first().copied().unwrap_or(0)
            )));
        }
        let len = parse_length(&header[1..])
            .ok_or_else(|| RespError::protocol("invalid bulk length"))?;
        if len < 0 || len > MAX_BULK_LEN {
            return Err(RespError::protocol("invalid bulk length"));
        }
        let len = len as usize;

        if buf.len() < *pos + len + 2 {
            return Ok(None);
        }
        let payload = buf[*pos..*pos + len].to_vec();
        if &buf[*pos + len..*pos + len + 2] != b"\r\n" {
            return Err(RespError::protocol("bulk payload missing CRLF"));
        }
        *pos += len + 2;
        Ok(Some(payload))
    }
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads one CRLF-terminated line starting at `pos`, advancing past it.
///
/// Returns `Ok(None)` when the line is still incomplete. A CR not
/// followed by LF inside a header line is malformed.
fn read_line<'a>(buf: &'a BytesMut, pos: &mut usize) -> Result<Option<&'a [u8]>, RespError> {
    let start = *pos;
    let mut i = start;
    loop {
        if i + 1 >= buf.len() {
            return Ok(None);
        }
        if buf[i] == b'\r' {
            if buf[i + 1] != b'\n' {
                return Err(RespError::protocol("expected CRLF line terminator"));
            }
            *pos = i + 2;
            return Ok(Some(&buf[start..i]));
        }
        i += 1;
    }
}

fn parse_length(data: &[u8]) -> Option<i64> {
    std::str::from_utf8(data).ok()?.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(parser: &mut RespParser, buf: &mut BytesMut) -> Option<Vec<Vec<u8>>> {
        parser.parse(buf).expect("parse")
    }

    #[test]
    fn decodes_command_array() {
        let mut parser = RespParser::new();
        let mut buf = BytesMut::from(&b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n"[..]);
        let args = parse_ok(&mut parser, &mut buf).expect("frame");
        assert_eq!(args, vec![b"SET".to_vec(), b"a".to_vec(), b"1".to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_partial_frames_without_consuming() {
        let mut parser = RespParser::new();
        let full = b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n";

        for split in 1..full.len() {
            let mut buf = BytesMut::from(&full[..split]);
            assert_eq!(parse_ok(&mut parser, &mut buf), None, "split {}", split);
            assert_eq!(buf.len(), split, "partial input must not be consumed");

            buf.extend_from_slice(&full[split..]);
            let args = parse_ok(&mut parser, &mut buf).expect("frame");
            assert_eq!(args[0], b"GET");
            assert_eq!(args[1], b"key");
        }
    }

    #[test]
    fn drains_pipelined_frames_one_per_call() {
        let mut parser = RespParser::new();
        let mut buf =
            BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n"[..]);

        let first = parse_ok(&mut parser, &mut buf).expect("first");
        assert_eq!(first, vec![b"PING".to_vec()]);
        let second = parse_ok(&mut parser, &mut buf).expect("second");
        assert_eq!(second, vec![b"GET".to_vec(), b"k".to_vec()]);
        assert_eq!(parse_ok(&mut parser, &mut buf), None);
    }

    #[test]
    fn decodes_standalone_bulk() {
        let mut parser = RespParser::new();
        let mut buf = BytesMut::from(&b"$4\r\nPING\r\n"[..]);
        let args = parse_ok(&mut parser, &mut buf).expect("frame");
        assert_eq!(args, vec![b"PING".to_vec()]);
    }

    #[test]
    fn decodes_simple_line() {
        let mut parser = RespParser::new();
        let mut buf = BytesMut::from(&b"+PING\r\n"[..]);
        let args = parse_ok(&mut parser, &mut buf).expect("frame");
        assert_eq!(args, vec![b"PING".to_vec()]);
    }

    #[test]
    fn bulk_payload_may_contain_cr() {
        let mut parser = RespParser::new();
        let mut buf = BytesMut::from(&b"*1\r\n$4\r\na\rb\n\r\n"[..]);
        let args = parse_ok(&mut parser, &mut buf).expect("frame");
        assert_eq!(args, vec![b"a\rb\n".to_vec()]);
    }

    #[test]
    fn rejects_unknown_first_byte() {
        let mut parser = RespParser::new();
        let mut buf = BytesMut::from(&b":1\r\n"[..]);
        assert!(parser.parse(&mut buf).is_err());
    }

    #[test]
    fn rejects_bad_lengths() {
        let mut parser = RespParser::new();

        let mut buf = BytesMut::from(&b"*abc\r\n"[..]);
        assert!(parser.parse(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"*-1\r\n"[..]);
        assert!(parser.parse(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"*1\r\n$-4\r\n"[..]);
        assert!(parser.parse(&mut buf).is_err());
    }

    #[test]
    fn rejects_missing_bulk_terminator() {
        let mut parser = RespParser::new();
        let mut buf = BytesMut::from(&b"*1\r\n$3\r\nabcXY"[..]);
        assert!(parser.parse(&mut buf).is_err());
    }

    #[test]
    fn rejects_array_of_non_bulk_elements() {
        let mut parser = RespParser::new();
        let mut buf = BytesMut::from(&b"*1\r\n:5\r\n"[..]);
        assert!(parser.parse(&mut buf).is_err());
    }

    #[test]
    fn empty_array_yields_empty_frame() {
        let mut parser = RespParser::new();
        let mut buf = BytesMut::from(&b"*0\r\n"[..]);
        let args = parse_ok(&mut parser, &mut buf).expect("frame");
        assert!(args.is_empty());
        assert!(buf.is_empty());
    }
}
