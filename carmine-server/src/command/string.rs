//! # String Commands
//!
//! The byte-string family: reads, conditional writes with expiry
//! options, range edits, counters, and the LCS subsequence query.
//! Every handler receives its arguments without the command name and
//! returns a typed reply; arity was already validated by dispatch.

use carmine_common::{format_float, parse_float, parse_int, CommandError, Reply};
use carmine_engine::{Database, Value};

use super::extended::{
    parse_extended_options, ExtendMode, FLAGS_TIMED, FLAG_GET, FLAG_KEEPTTL, FLAG_NX,
    FLAG_PERSIST, FLAG_XX,
};
use super::{register, DataCommand};

pub(crate) fn register_all(table: &mut std::collections::HashMap<&'static str, DataCommand>) {
    register(table, "get", 2, get);
    register(table, "set", -3, set);
    register(table, "setrange", 4, setrange);
    register(table, "getrange", 4, getrange);
    register(table, "getdel", 2, getdel);
    register(table, "getex", -2, getex);
    register(table, "mget", -2, mget);
    register(table, "mset", -3, mset);
    register(table, "del", -2, del);
    register(table, "incr", 2, incr);
    register(table, "decr", 2, decr);
    register(table, "incrby", 3, incrby);
    register(table, "decrby", 3, decrby);
    register(table, "incrbyfloat", 3, incrbyfloat);
    register(table, "append", 3, append);
    register(table, "strlen", 2, strlen);
    register(table, "lcs", -3, lcs);
}

fn get(db: &Database, args: &[Vec<u8>]) -> Reply {
    match db.get_string(&args[0]) {
        Ok(Some(data)) => Reply::Bulk(data.to_vec()),
        Ok(None) => Reply::Nil,
        Err(err) => Reply::Error(err),
    }
}

fn set(db: &Database, args: &[Vec<u8>]) -> Reply {
    let key = &args[0];
    let (flags, duration_ms) = match parse_extended_options(&args[2..], ExtendMode::Set) {
        Ok(parsed) => parsed,
        Err(err) => return err.into(),
    };

    // GET wants the prior value, and refuses to trample a non-string.
    let prior = if flags & FLAG_GET != 0 {
        match db.get_string(key) {
            Ok(value) => Some(value),
            Err(err) => return err.into(),
        }
    } else {
        None
    };

    let value = Value::str(args[1].clone());
    let written = if flags & FLAG_NX != 0 {
        db.set_if_absent(key, value)
    } else if flags & FLAG_XX != 0 {
        db.set_if_present(key, value)
    } else {
        db.set(key, value);
        true
    };

    if written {
        if flags & FLAGS_TIMED != 0 {
            db.expire_in(key, duration_ms);
        } else if flags & FLAG_KEEPTTL == 0 {
            db.persist(key);
        }
    }

    match prior {
        Some(Some(data)) => Reply::Bulk(data.to_vec()),
        Some(None) => Reply::Nil,
        None if written => Reply::ok(),
        None => Reply::Nil,
    }
}

fn setrange(db: &Database, args: &[Vec<u8>]) -> Reply {
    let key = &args[0];
    let offset = match parse_int(&args[1]) {
        Some(value) => value,
        None => return CommandError::InvalidInteger.into(),
    };
    if offset < 0 {
        return CommandError::OffsetOutOfRange.into();
    }
    let offset = offset as usize;
    let patch = &args[2];

    // An empty patch reports the current length without creating the key.
    if patch.is_empty() {
        return match db.get_string(key) {
            Ok(Some(data)) => Reply::Integer(data.len() as i64),
            Ok(None) => Reply::Integer(0),
            Err(err) => err.into(),
        };
    }

    db.upsert(
        key,
        || Value::str(Vec::new()),
        |value| {
            let data = match value {
                Value::Str(data) => data,
                _ => return CommandError::WrongType.into(),
            };
            let mut buf = data.to_vec();
            if buf.len() < offset + patch.len() {
                buf.resize(offset + patch.len(), 0);
            }
            buf[offset..offset + patch.len()].copy_from_slice(patch);
            let len = buf.len() as i64;
            *value = Value::str(buf);
            Reply::Integer(len)
        },
    )
}

fn getrange(db: &Database, args: &[Vec<u8>]) -> Reply {
    let data = match db.get_string(&args[0]) {
        Ok(Some(data)) => data,
        Ok(None) => return Reply::Bulk(Vec::new()),
        Err(err) => return err.into(),
    };
    let (start, end) = match (parse_int(&args[1]), parse_int(&args[2])) {
        (Some(start), Some(end)) => (start, end),
        _ => return CommandError::InvalidInteger.into(),
    };

    let len = data.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end };
    if end < 0 || start > end || start >= len {
        return Reply::Bulk(Vec::new());
    }
    let end = end.min(len - 1);
    Reply::Bulk(data[start as usize..=end as usize].to_vec())
}

fn getdel(db: &Database, args: &[Vec<u8>]) -> Reply {
    match db.get_string(&args[0]) {
        Ok(Some(data)) => {
            db.delete(&args[0]);
            Reply::Bulk(data.to_vec())
        }
        Ok(None) => Reply::Nil,
        Err(err) => err.into(),
    }
}

fn getex(db: &Database, args: &[Vec<u8>]) -> Reply {
    let key = &args[0];
    let (flags, duration_ms) = match parse_extended_options(&args[1..], ExtendMode::Get) {
        Ok(parsed) => parsed,
        Err(err) => return err.into(),
    };

    let data = match db.get_string(key) {
        Ok(Some(data)) => data,
        Ok(None) => return Reply::Nil,
        Err(err) => return err.into(),
    };

    // Unlike SET, a bare GETEX leaves the deadline untouched.
    if flags & FLAGS_TIMED != 0 {
        db.expire_in(key, duration_ms);
    } else if flags & FLAG_PERSIST != 0 {
        db.persist(key);
    }
    Reply::Bulk(data.to_vec())
}

fn mget(db: &Database, args: &[Vec<u8>]) -> Reply {
    let mut replies = Vec::with_capacity(args.len());
    for key in args {
        match db.get_string(key) {
            Ok(Some(data)) => replies.push(Reply::Bulk(data.to_vec())),
            Ok(None) => replies.push(Reply::Nil),
            // Strict policy: the first wrong-type hit aborts the reply.
            Err(err) => return err.into(),
        }
    }
    Reply::Array(replies)
}

fn mset(db: &Database, args: &[Vec<u8>]) -> Reply {
    if args.len() % 2 != 0 {
        return CommandError::WrongArity("mset".to_string()).into();
    }
    for pair in args.chunks_exact(2) {
        db.set(&pair[0], Value::str(pair[1].clone()));
        db.persist(&pair[0]);
    }
    Reply::ok()
}

fn del(db: &Database, args: &[Vec<u8>]) -> Reply {
    let removed = args.iter().filter(|key| db.delete(key)).count();
    Reply::Integer(removed as i64)
}

/// Shared add path for the INCR/DECR family.
fn incr_by(db: &Database, key: &[u8], delta: i64) -> Reply {
    db.upsert(
        key,
        || Value::str(&b"0"[..]),
        |value| {
            let data = match value {
                Value::Str(data) => data,
                _ => return CommandError::WrongType.into(),
            };
            let current = match parse_int(data) {
                Some(current) => current,
                None => return CommandError::InvalidInteger.into(),
            };
            let next = match current.checked_add(delta) {
                Some(next) => next,
                None => return CommandError::InvalidInteger.into(),
            };
            *value = Value::str(next.to_string().into_bytes());
            Reply::Integer(next)
        },
    )
}

fn incr(db: &Database, args: &[Vec<u8>]) -> Reply {
    incr_by(db, &args[0], 1)
}

fn decr(db: &Database, args: &[Vec<u8>]) -> Reply {
    incr_by(db, &args[0], -1)
}

fn incrby(db: &Database, args: &[Vec<u8>]) -> Reply {
    match parse_int(&args[1]) {
        Some(delta) => incr_by(db, &args[0], delta),
        None => CommandError::InvalidInteger.into(),
    }
}

fn decrby(db: &Database, args: &[Vec<u8>]) -> Reply {
    match parse_int(&args[1]).and_then(|delta| delta.checked_neg()) {
        Some(delta) => incr_by(db, &args[0], delta),
        None => CommandError::InvalidInteger.into(),
    }
}

fn incrbyfloat(db: &Database, args: &[Vec<u8>]) -> Reply {
    let delta = match parse_float(&args[1]) {
        Some(delta) => delta,
        None => return CommandError::InvalidFloat.into(),
    };
    db.upsert(
        &args[0],
        || Value::str(&b"0"[..]),
        |value| {
            let data = match value {
                Value::Str(data) => data,
                _ => return CommandError::WrongType.into(),
            };
            let current = match parse_float(data) {
                Some(current) => current,
                None => return CommandError::InvalidFloat.into(),
            };
            let next = current + delta;
            if !next.is_finite() {
                return CommandError::NonFiniteIncrement.into();
            }
            let text = format_float(next);
            *value = Value::str(text.as_bytes().to_vec());
            Reply::Bulk(text.into_bytes())
        },
    )
}

fn append(db: &Database, args: &[Vec<u8>]) -> Reply {
    let suffix = &args[1];
    db.upsert(
        &args[0],
        || Value::str(Vec::new()),
        |value| {
            let data = match value {
                Value::Str(data) => data,
                _ => return CommandError::WrongType.into(),
            };
            let mut buf = data.to_vec();
            buf.extend_from_slice(suffix);
            let len = buf.len() as i64;
            *value = Value::str(buf);
            Reply::Integer(len)
        },
    )
}

fn strlen(db: &Database, args: &[Vec<u8>]) -> Reply {
    match db.get_string(&args[0]) {
        Ok(Some(data)) => Reply::Integer(data.len() as i64),
        Ok(None) => Reply::Integer(0),
        Err(err) => err.into(),
    }
}

fn lcs(db: &Database, args: &[Vec<u8>]) -> Reply {
    let first = match db.get_string(&args[0]) {
        Ok(data) => data.map(|d| d.to_vec()).unwrap_or_default(),
        Err(err) => return err.into(),
    };
    let second = match db.get_string(&args[1]) {
        Ok(data) => data.map(|d| d.to_vec()).unwrap_or_default(),
        Err(err) => return err.into(),
    };

    let mut want_idx = false;
    let mut with_match_len = false;
    let mut min_match_len = 0i64;
    let mut i = 2;
    while i < args.len() {
        let token = args[i].to_ascii_lowercase();
        match token.as_slice() {
            b"idx" => want_idx = true,
            b"withmatchlen" => with_match_len = true,
            b"minmatchlen" => {
                let value = match args.get(i + 1) {
                    Some(raw) => parse_int(raw),
                    None => return CommandError::Syntax.into(),
                };
                match value {
                    Some(value) => min_match_len = value.max(0),
                    None => return CommandError::InvalidInteger.into(),
                }
                i += 1;
            }
            _ => return CommandError::Syntax.into(),
        }
        i += 1;
    }

    let table = LcsTable::build(&first, &second);
    if !want_idx {
        return Reply::Bulk(table.subsequence());
    }

    let matches = table.matches(min_match_len as usize, with_match_len);
    Reply::Array(vec![
        Reply::Bulk(b"matches".to_vec()),
        Reply::Array(matches),
        Reply::Bulk(b"len".to_vec()),
        Reply::Integer(table.total_len() as i64),
    ])
}

/// Dynamic-programming table for the longest common subsequence of two
/// byte strings, flattened row-major.
struct LcsTable<'a> {
    a: &'a [u8],
    b: &'a [u8],
    cells: Vec<u32>,
}

impl<'a> LcsTable<'a> {
    fn build(a: &'a [u8], b: &'a [u8]) -> Self {
        let width = b.len() + 1;
        let mut cells = vec![0u32; (a.len() + 1) * width];
        for i in 1..=a.len() {
            for j in 1..=b.len() {
                cells[i * width + j] = if a[i - 1] == b[j - 1] {
                    cells[(i - 1) * width + (j - 1)] + 1
                } else {
                    cells[(i - 1) * width + j].max(cells[i * width + (j - 1)])
                };
            }
        }
        LcsTable { a, b, cells }
    }

    fn at(&self, i: usize, j: usize) -> u32 {
        self.cells[i * (self.b.len() + 1) + j]
    }

    fn total_len(&self) -> u32 {
        self.at(self.a.len(), self.b.len())
    }

    /// Reconstructs the subsequence itself by backtracking.
    fn subsequence(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len() as usize);
        let (mut i, mut j) = (self.a.len(), self.b.len());
        while i > 0 && j > 0 {
            if self.a[i - 1] == self.b[j - 1] {
                out.push(self.a[i - 1]);
                i -= 1;
                j -= 1;
            } else if self.at(i - 1, j) > self.at(i, j - 1) {
                i -= 1;
            } else {
                j -= 1;
            }
        }
        out.reverse();
        out
    }

    /// Collects match intervals by backtracking, coalescing contiguous
    /// runs. Runs surface in discovery order, which is decreasing
    /// position; runs shorter than `min_len` are skipped.
    fn matches(&self, min_len: usize, with_len: bool) -> Vec<Reply> {
        let mut out = Vec::new();
        // (a_start, a_end, b_start, b_end) of the run being extended
        let mut run: Option<(usize, usize, usize, usize)> = None;
        let mut emit = |run: &mut Option<(usize, usize, usize, usize)>| {
            if let Some((a_start, a_end, b_start, b_end)) = run.take() {
                let len = a_end - a_start + 1;
                if len >= min_len {
                    let mut parts = vec![
                        Reply::Array(vec![
                            Reply::Integer(a_start as i64),
                            Reply::Integer(a_end as i64),
                        ]),
                        Reply::Array(vec![
                            Reply::Integer(b_start as i64),
                            Reply::Integer(b_end as i64),
                        ]),
                    ];
                    if with_len {
                        parts.push(Reply::Integer(len as i64));
                    }
                    out.push(Reply::Array(parts));
                }
            }
        };

        let (mut i, mut j) = (self.a.len(), self.b.len());
        while i > 0 && j > 0 {
            if self.a[i - 1] == self.b[j - 1] {
                match &mut run {
                    Some((a_start, _, b_start, _)) => {
                        *a_start = i - 1;
                        *b_start = j - 1;
                    }
                    None => run = Some((i - 1, i - 1, j - 1, j - 1)),
                }
                i -= 1;
                j -= 1;
            } else {
                emit(&mut run);
                if self.at(i - 1, j) > self.at(i, j - 1) {
                    i -= 1;
                } else {
                    j -= 1;
                }
            }
        }
        emit(&mut run);
        out
    }
}
