//! # Extended String Options
//!
//! Shared parser for the option tails of SET and GETEX. Options
//! accumulate into a bit mask; the compatibility rules are:
//!
//! - at most one of EX / PX / EXAT / PXAT / PERSIST / KEEPTTL;
//! - NX and XX are mutually exclusive, and NX excludes GET;
//! - PERSIST belongs to GETEX only; KEEPTTL, NX, XX, GET to SET only;
//! - every timed option takes one integer argument, strictly positive.
//!
//! Timed options normalize to a signed duration in milliseconds from
//! now; EXAT/PXAT convert their absolute target with `target − now`, so
//! a target behind the clock produces a negative duration and the key
//! dies on its next touch.

use std::time::{SystemTime, UNIX_EPOCH};

use carmine_common::{parse_int, CommandError};

pub const FLAG_NONE: u32 = 0;
pub const FLAG_NX: u32 = 1 << 0;
pub const FLAG_XX: u32 = 1 << 1;
pub const FLAG_EX: u32 = 1 << 2;
pub const FLAG_PX: u32 = 1 << 3;
pub const FLAG_EXAT: u32 = 1 << 4;
pub const FLAG_PXAT: u32 = 1 << 5;
pub const FLAG_PERSIST: u32 = 1 << 6;
pub const FLAG_KEEPTTL: u32 = 1 << 7;
pub const FLAG_GET: u32 = 1 << 8;

/// Any option that installs or retains a deadline.
pub const FLAGS_TIMED: u32 = FLAG_EX | FLAG_PX | FLAG_EXAT | FLAG_PXAT;

/// Options that contend for the single expiry slot.
const FLAGS_EXPIRY: u32 = FLAGS_TIMED | FLAG_PERSIST | FLAG_KEEPTTL;

/// Which command's option vocabulary applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendMode {
    Set,
    Get,
}

/// Parses an option tail into `(flags, duration_ms)`.
///
/// `duration_ms` is meaningful only when a flag in [`FLAGS_TIMED`] is
/// set.
pub fn parse_extended_options(
    args: &[Vec<u8>],
    mode: ExtendMode,
) -> Result<(u32, i64), CommandError> {
    let mut flags = FLAG_NONE;
    let mut duration_ms = 0i64;

    let mut i = 0;
    while i < args.len() {
        let token = args[i].to_ascii_lowercase();
        match token.as_slice() {
            b"nx" => {
                if mode != ExtendMode::Set || flags & (FLAG_XX | FLAG_GET) != 0 {
                    return Err(CommandError::Syntax);
                }
                flags |= FLAG_NX;
            }
            b"xx" => {
                if mode != ExtendMode::Set || flags & FLAG_NX != 0 {
                    return Err(CommandError::Syntax);
                }
                flags |= FLAG_XX;
            }
            b"get" => {
                if mode != ExtendMode::Set || flags & FLAG_NX != 0 {
                    return Err(CommandError::Syntax);
                }
                flags |= FLAG_GET;
            }
            b"keepttl" => {
                if mode != ExtendMode::Set || flags & FLAGS_EXPIRY != 0 {
                    return Err(CommandError::Syntax);
                }
                flags |= FLAG_KEEPTTL;
            }
            b"persist" => {
                if mode != ExtendMode::Get || flags & FLAGS_EXPIRY != 0 {
                    return Err(CommandError::Syntax);
                }
                flags |= FLAG_PERSIST;
            }
            b"ex" | b"px" | b"exat" | b"pxat" => {
                if flags & FLAGS_EXPIRY != 0 {
                    return Err(CommandError::Syntax);
                }
                let value = match args.get(i + 1) {
                    Some(raw) => parse_int(raw).ok_or(CommandError::InvalidInteger)?,
                    None => return Err(CommandError::Syntax),
                };
                if value <= 0 {
                    return Err(CommandError::InvalidExpireTime);
                }

                let now_ms = epoch_millis();
                duration_ms = match token.as_slice() {
                    b"ex" => {
                        flags |= FLAG_EX;
                        value
                            .checked_mul(1000)
                            .ok_or(CommandError::InvalidExpireTime)?
                    }
                    b"px" => {
                        flags |= FLAG_PX;
                        value
                    }
                    b"exat" => {
                        flags |= FLAG_EXAT;
                        value
                            .checked_mul(1000)
                            .ok_or(CommandError::InvalidExpireTime)?
                            - now_ms
                    }
                    _ => {
                        flags |= FLAG_PXAT;
                        value - now_ms
                    }
                };
                i += 1;
            }
            _ => return Err(CommandError::Syntax),
        }
        i += 1;
    }

    Ok((flags, duration_ms))
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().min(i64::MAX as u128) as i64)
        .unwrap_or(0)
}
