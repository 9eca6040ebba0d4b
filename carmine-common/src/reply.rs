//! # Reply Model
//!
//! Typed RESP2 replies and their wire encoding. Commands return a
//! `Reply` value; the connection handler encodes it once and writes the
//! bytes back on the socket.
//!
//! ## Design Principles
//! 1. **Typed Until the Socket**: replies stay structured through dispatch
//!    so tests can assert on values instead of byte strings.
//! 2. **Single Encoder**: one `encode` covers every variant; arrays recurse.
//! 3. **Binary-Safe**: bulk payloads are raw bytes, never UTF-8.
//! 4. **RESP2 Nil**: absent values encode as `$-1\r\n` (`*-1\r\n` for
//!    absent arrays); the RESP3 `_` token is never emitted.

use crate::error::CommandError;

const CRLF: &[u8] = b"\r\n";

/// A single RESP2 reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+...` line, e.g. `+OK`.
    Simple(String),
    /// `-...` line carrying a catalogued error.
    Error(CommandError),
    /// `:...` signed 64-bit integer.
    Integer(i64),
    /// `$len` length-prefixed byte string.
    Bulk(Vec<u8>),
    /// Null bulk string, `$-1`.
    Nil,
    /// `*len` array of nested replies.
    Array(Vec<Reply>),
    /// Null array, `*-1`.
    NilArray,
}

impl Reply {
    /// The canonical `+OK` reply.
    pub fn ok() -> Reply {
        Reply::Simple("OK".to_string())
    }

    /// Bulk reply over any byte source.
    pub fn bulk(data: impl Into<Vec<u8>>) -> Reply {
        Reply::Bulk(data.into())
    }

    /// Appends the wire encoding of this reply to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Simple(text) => {
                out.push(b'+');
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(CRLF);
            }
            Reply::Error(err) => {
                out.push(b'-');
                out.extend_from_slice(err.to_string().as_bytes());
                out.extend_from_slice(CRLF);
            }
            Reply::Integer(value) => {
                out.push(b':');
                out.extend_from_slice(value.to_string().as_bytes());
                out.extend_from_slice(CRLF);
            }
            Reply::Bulk(data) => {
                out.push(b'$');
                out.extend_from_slice(data.len().to_string().as_bytes());
                out.extend_from_slice(CRLF);
                out.extend_from_slice(data);
                out.extend_from_slice(CRLF);
            }
            Reply::Nil => out.extend_from_slice(b"$-1\r\n"),
            Reply::Array(items) => {
                out.push(b'*');
                out.extend_from_slice(items.len().to_string().as_bytes());
                out.extend_from_slice(CRLF);
                for item in items {
                    item.encode(out);
                }
            }
            Reply::NilArray => out.extend_from_slice(b"*-1\r\n"),
        }
    }

    /// Encodes this reply into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        self.encode(&mut out);
        out
    }
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Reply {
        Reply::Error(err)
    }
}
