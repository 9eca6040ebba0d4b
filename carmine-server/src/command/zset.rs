//! # Sorted-Set Commands
//!
//! ZADD with its flag prefix (NX/XX/GT/LT/CH/INCR), cardinality, score
//! lookup, and range counting. Mutations run in place under the shard
//! write lock; reads take the read lock.

use carmine_common::{format_float, parse_float, CommandError, Reply};
use carmine_engine::{Database, RangeSpec, Value, ZSet};

use super::{register, DataCommand};

const ZADD_NONE: u32 = 0;
const ZADD_INCR: u32 = 1 << 0;
const ZADD_NX: u32 = 1 << 1;
const ZADD_XX: u32 = 1 << 2;
const ZADD_GT: u32 = 1 << 3;
const ZADD_LT: u32 = 1 << 4;

pub(crate) fn register_all(table: &mut std::collections::HashMap<&'static str, DataCommand>) {
    register(table, "zadd", -4, zadd);
    register(table, "zcard", 2, zcard);
    register(table, "zcount", 4, zcount);
    register(table, "zscore", 3, zscore);
}

/// Outcome of one member application inside ZADD.
enum AddOutcome {
    /// Score (or increment result) was NaN; the command aborts.
    Nan,
    /// Condition flags suppressed the write.
    Nop,
    /// Member was inserted.
    Added(f64),
    /// Member moved to a new score.
    Updated(f64),
    /// Member already sat at exactly this score.
    Unchanged(f64),
}

/// Applies one `(score, member)` pair under the given flags.
fn zset_add(set: &mut ZSet, member: &[u8], mut score: f64, flags: u32) -> AddOutcome {
    if score.is_nan() {
        return AddOutcome::Nan;
    }
    let incr = flags & ZADD_INCR != 0;
    let nx = flags & ZADD_NX != 0;
    let xx = flags & ZADD_XX != 0;
    let gt = flags & ZADD_GT != 0;
    let lt = flags & ZADD_LT != 0;

    match set.score(member) {
        Some(current) => {
            if nx {
                return AddOutcome::Nop;
            }
            if incr {
                score += current;
                if score.is_nan() {
                    return AddOutcome::Nan;
                }
            }
            if (gt && score <= current) || (lt && score >= current) {
                return AddOutcome::Nop;
            }
            if score != current {
                set.update(member, score);
                AddOutcome::Updated(score)
            } else {
                AddOutcome::Unchanged(score)
            }
        }
        None => {
            if xx {
                return AddOutcome::Nop;
            }
            set.insert(member, score);
            AddOutcome::Added(score)
        }
    }
}

fn zadd(db: &Database, args: &[Vec<u8>]) -> Reply {
    zadd_generic(db, args, ZADD_NONE)
}

fn zadd_generic(db: &Database, args: &[Vec<u8>], mut flags: u32) -> Reply {
    let key = &args[0];
    let mut ch = false;

    let mut cursor = 1;
    while cursor < args.len() {
        let token = args[cursor].to_ascii_lowercase();
        match token.as_slice() {
            b"nx" => flags |= ZADD_NX,
            b"xx" => flags |= ZADD_XX,
            b"gt" => flags |= ZADD_GT,
            b"lt" => flags |= ZADD_LT,
            b"incr" => flags |= ZADD_INCR,
            b"ch" => ch = true,
            _ => break,
        }
        cursor += 1;
    }

    let rest = args.len() - cursor;
    if rest == 0 || rest % 2 != 0 {
        return CommandError::Syntax.into();
    }
    let pairs = rest / 2;

    let incr = flags & ZADD_INCR != 0;
    let nx = flags & ZADD_NX != 0;
    let xx = flags & ZADD_XX != 0;
    let gt = flags & ZADD_GT != 0;
    let lt = flags & ZADD_LT != 0;
    if nx && xx {
        return CommandError::NxAndXx.into();
    }
    if (gt && nx) || (lt && nx) || (gt && lt) {
        return CommandError::GtLtAndNx.into();
    }
    if incr && pairs > 1 {
        return CommandError::IncrSinglePair.into();
    }

    // All scores must parse before anything is applied; a NaN score is
    // rejected here so a failed call cannot leave an empty set behind.
    let mut scores = Vec::with_capacity(pairs);
    for pair in 0..pairs {
        match parse_float(&args[cursor + pair * 2]) {
            Some(score) if score.is_nan() => return CommandError::NotANumber.into(),
            Some(score) => scores.push(score),
            None => return CommandError::InvalidFloat.into(),
        }
    }

    // XX against a missing key has nothing to do, and must not leave an
    // empty set behind.
    let exists = match db.read(key, |value| match value {
        None => Ok(false),
        Some(Value::Sorted(_)) => Ok(true),
        Some(_) => Err(CommandError::WrongType),
    }) {
        Ok(exists) => exists,
        Err(err) => return err.into(),
    };
    if !exists && xx {
        return if incr { Reply::Nil } else { Reply::Integer(0) };
    }

    db.upsert(
        key,
        || Value::Sorted(ZSet::new()),
        |value| {
            let set = match value {
                Value::Sorted(set) => set,
                _ => return CommandError::WrongType.into(),
            };

            let mut added = 0i64;
            let mut updated = 0i64;
            let mut processed = 0i64;
            let mut last_score = 0.0;
            for pair in 0..pairs {
                let member = &args[cursor + pair * 2 + 1];
                match zset_add(set, member, scores[pair], flags) {
                    AddOutcome::Nan => return CommandError::NotANumber.into(),
                    AddOutcome::Nop => {}
                    AddOutcome::Added(score) => {
                        added += 1;
                        processed += 1;
                        last_score = score;
                    }
                    AddOutcome::Updated(score) => {
                        updated += 1;
                        processed += 1;
                        last_score = score;
                    }
                    AddOutcome::Unchanged(score) => {
                        processed += 1;
                        last_score = score;
                    }
                }
            }

            if incr {
                if processed > 0 {
                    Reply::Bulk(format_float(last_score).into_bytes())
                } else {
                    Reply::Nil
                }
            } else {
                Reply::Integer(if ch { added + updated } else { added })
            }
        },
    )
}

fn zcard(db: &Database, args: &[Vec<u8>]) -> Reply {
    db.read(&args[0], |value| match value {
        None => Reply::Integer(0),
        Some(Value::Sorted(set)) => Reply::Integer(set.len() as i64),
        Some(_) => CommandError::WrongType.into(),
    })
}

fn zscore(db: &Database, args: &[Vec<u8>]) -> Reply {
    db.read(&args[0], |value| match value {
        None => Reply::Nil,
        Some(Value::Sorted(set)) => match set.score(&args[1]) {
            Some(score) => Reply::Bulk(format_float(score).into_bytes()),
            None => Reply::Nil,
        },
        Some(_) => CommandError::WrongType.into(),
    })
}

fn zcount(db: &Database, args: &[Vec<u8>]) -> Reply {
    let range = match parse_range(&args[1], &args[2]) {
        Ok(range) => range,
        Err(err) => return err.into(),
    };

    db.read(&args[0], |value| match value {
        None => Reply::Integer(0),
        Some(Value::Sorted(set)) => {
            // Count by rank arithmetic over the first and last in-range
            // elements; ranks are 1-based.
            let first = match set.nth_in_range(&range, 0) {
                Some((member, score)) => set.rank(member, score),
                None => return Reply::Integer(0),
            };
            let last = match set.nth_in_range(&range, -1) {
                Some((member, score)) => set.rank(member, score),
                None => return Reply::Integer(0),
            };
            Reply::Integer((last - first + 1) as i64)
        }
        Some(_) => CommandError::WrongType.into(),
    })
}

/// Parses ZCOUNT-style bounds; a `(` prefix marks a bound exclusive.
fn parse_range(min: &[u8], max: &[u8]) -> Result<RangeSpec, CommandError> {
    let (min_ex, min_bytes) = strip_exclusive(min);
    let (max_ex, max_bytes) = strip_exclusive(max);
    let min = parse_float(min_bytes).ok_or(CommandError::MinOrMaxNotFloat)?;
    let max = parse_float(max_bytes).ok_or(CommandError::MinOrMaxNotFloat)?;
    Ok(RangeSpec {
        min,
        max,
        min_ex,
        max_ex,
    })
}

fn strip_exclusive(bound: &[u8]) -> (bool, &[u8]) {
    match bound.first() {
        Some(b'(') => (true, &bound[1..]),
        _ => (false, bound),
    }
}
