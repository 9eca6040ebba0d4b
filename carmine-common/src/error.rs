//! # Command Errors
//!
//! Every error reply the server can produce. The `Display` output of a
//! variant is exactly the payload written after `-` on the wire, so the
//! encoder never has to special-case messages.

use thiserror::Error;

/// Errors surfaced to clients as RESP error replies.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Command missing from both the data and the server tables.
    #[error("ERR unknown command '{name}', with args beginning with: '{args_start}'")]
    UnknownCommand { name: String, args_start: String },

    /// Argument count does not satisfy the command's arity.
    #[error("ERR wrong number of arguments for '{0}'")]
    WrongArity(String),

    /// Option parsing hit a conflict or an unknown token.
    #[error("ERR syntax error")]
    Syntax,

    /// A typed command was applied to a value of another type.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// Integer parse failure or 64-bit overflow.
    #[error("ERR value is not an integer or out of range")]
    InvalidInteger,

    /// Float parse failure.
    #[error("ERR value is not a float")]
    InvalidFloat,

    /// Timed expiry option with a non-positive value.
    #[error("ERR invalid expire time in EXPIRE command")]
    InvalidExpireTime,

    /// Negative SETRANGE offset.
    #[error("ERR offset out of range")]
    OffsetOutOfRange,

    /// ZADD produced a NaN score.
    #[error("ERR result score is not a number (NaN)")]
    NotANumber,

    /// ZCOUNT-style range bound failed to parse.
    #[error("ERR min or max is not a float")]
    MinOrMaxNotFloat,

    /// SELECT index outside the configured database range.
    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,

    #[error("ERR XX and NX options at the same time are not compatible")]
    NxAndXx,

    #[error("ERR GT, LT, and/or NX options at the same time are not compatible")]
    GtLtAndNx,

    #[error("ERR INCR option supports a single increment-element pair")]
    IncrSinglePair,

    /// INCRBYFLOAT result left the finite domain.
    #[error("ERR increment would produce NaN or Infinity")]
    NonFiniteIncrement,

    /// Malformed inbound frame; the connection closes after reporting.
    #[error("ERR Protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_payload() {
        assert_eq!(
            CommandError::WrongType.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
        assert_eq!(CommandError::Syntax.to_string(), "ERR syntax error");
        assert_eq!(
            CommandError::WrongArity("get".to_string()).to_string(),
            "ERR wrong number of arguments for 'get'"
        );
    }

    #[test]
    fn unknown_command_includes_first_argument_byte() {
        let err = CommandError::UnknownCommand {
            name: "frobnicate".to_string(),
            args_start: "k".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ERR unknown command 'frobnicate', with args beginning with: 'k'"
        );
    }
}
