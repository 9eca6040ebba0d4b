//! Keyspace commands that work on any value type: expiry management,
//! existence checks, and type inspection.

use carmine_common::{parse_int, CommandError, Reply};
use carmine_engine::{Database, TtlStatus};

use super::{register, DataCommand};

pub(crate) fn register_all(table: &mut std::collections::HashMap<&'static str, DataCommand>) {
    register(table, "expire", 3, expire);
    register(table, "ttl", 2, ttl);
    register(table, "persist", 2, persist);
    register(table, "exists", -2, exists);
    register(table, "type", 2, type_of);
}

fn expire(db: &Database, args: &[Vec<u8>]) -> Reply {
    let seconds = match parse_int(&args[1]) {
        Some(seconds) => seconds,
        None => return CommandError::InvalidInteger.into(),
    };
    if !db.contains(&args[0]) {
        return Reply::Integer(0);
    }
    if seconds <= 0 {
        // A deadline that has already passed just deletes the key.
        db.delete(&args[0]);
        return Reply::Integer(1);
    }
    let millis = match seconds.checked_mul(1000) {
        Some(millis) => millis,
        None => return CommandError::InvalidExpireTime.into(),
    };
    db.expire_in(&args[0], millis);
    Reply::Integer(1)
}

fn ttl(db: &Database, args: &[Vec<u8>]) -> Reply {
    match db.ttl(&args[0]) {
        TtlStatus::Missing => Reply::Integer(-2),
        TtlStatus::NoExpiry => Reply::Integer(-1),
        TtlStatus::ExpiresIn(remaining) => {
            // report to the nearest second
            Reply::Integer(((remaining.as_millis() as i64) + 500) / 1000)
        }
    }
}

fn persist(db: &Database, args: &[Vec<u8>]) -> Reply {
    Reply::Integer(db.persist(&args[0]) as i64)
}

fn exists(db: &Database, args: &[Vec<u8>]) -> Reply {
    let present = args.iter().filter(|key| db.contains(key)).count();
    Reply::Integer(present as i64)
}

fn type_of(db: &Database, args: &[Vec<u8>]) -> Reply {
    db.read(&args[0], |value| {
        let name = value.map(|v| v.type_name()).unwrap_or("none");
        Reply::Simple(name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use carmine_engine::{Value, ZSet};

    fn run(db: &Database, command: fn(&Database, &[Vec<u8>]) -> Reply, args: &[&str]) -> Reply {
        let args: Vec<Vec<u8>> = args.iter().map(|a| a.as_bytes().to_vec()).collect();
        command(db, &args)
    }

    #[test]
    fn expire_and_ttl_lifecycle() {
        let db = Database::new();
        assert_eq!(run(&db, expire, &["k", "10"]), Reply::Integer(0));
        assert_eq!(run(&db, ttl, &["k"]), Reply::Integer(-2));

        db.set(b"k", Value::str(&b"v"[..]));
        assert_eq!(run(&db, ttl, &["k"]), Reply::Integer(-1));

        assert_eq!(run(&db, expire, &["k", "10"]), Reply::Integer(1));
        match run(&db, ttl, &["k"]) {
            Reply::Integer(secs) => assert!((1..=10).contains(&secs)),
            other => panic!("unexpected ttl reply {:?}", other),
        }

        assert_eq!(run(&db, persist, &["k"]), Reply::Integer(1));
        assert_eq!(run(&db, persist, &["k"]), Reply::Integer(0));
        assert_eq!(run(&db, ttl, &["k"]), Reply::Integer(-1));
    }

    #[test]
    fn non_positive_expire_deletes_the_key() {
        let db = Database::new();
        db.set(b"k", Value::str(&b"v"[..]));
        assert_eq!(run(&db, expire, &["k", "0"]), Reply::Integer(1));
        assert!(!db.contains(b"k"));

        db.set(b"k", Value::str(&b"v"[..]));
        assert_eq!(run(&db, expire, &["k", "-5"]), Reply::Integer(1));
        assert!(!db.contains(b"k"));
    }

    #[test]
    fn expire_rejects_garbage() {
        let db = Database::new();
        assert_eq!(
            run(&db, expire, &["k", "soon"]),
            Reply::Error(CommandError::InvalidInteger)
        );
    }

    #[test]
    fn exists_counts_repeats() {
        let db = Database::new();
        db.set(b"a", Value::str(&b"1"[..]));
        assert_eq!(run(&db, exists, &["a", "b", "a"]), Reply::Integer(2));
    }

    #[test]
    fn type_reports_each_variant() {
        let db = Database::new();
        db.set(b"s", Value::str(&b"1"[..]));
        db.set(b"z", Value::Sorted(ZSet::new()));
        assert_eq!(run(&db, type_of, &["s"]), Reply::Simple("string".to_string()));
        assert_eq!(run(&db, type_of, &["z"]), Reply::Simple("zset".to_string()));
        assert_eq!(run(&db, type_of, &["x"]), Reply::Simple("none".to_string()));
    }
}
