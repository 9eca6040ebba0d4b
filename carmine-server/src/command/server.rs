//! Server-level commands: database selection, liveness, and the INFO
//! snapshot. These run against the server and the connection rather
//! than a database.

use carmine_common::{parse_int, CommandError, Reply};

use crate::connection::Connection;
use crate::server::{Server, DB_COUNT};

use super::{register_server, ServerCommand};

pub(crate) fn register_all(table: &mut std::collections::HashMap<&'static str, ServerCommand>) {
    register_server(table, "select", 2, select);
    register_server(table, "bgsave", 1, bgsave);
    register_server(table, "ping", -1, ping);
    register_server(table, "info", 1, info);
}

fn select(_server: &Server, conn: &mut Connection, args: &[Vec<u8>]) -> Reply {
    let index = match parse_int(&args[0]) {
        Some(index) => index,
        None => return CommandError::InvalidInteger.into(),
    };
    if index < 0 || index >= DB_COUNT as i64 {
        return CommandError::DbIndexOutOfRange.into();
    }
    conn.select_db(index as usize);
    Reply::ok()
}

fn bgsave(_server: &Server, _conn: &mut Connection, _args: &[Vec<u8>]) -> Reply {
    Reply::Simple("Command not implemented yet".to_string())
}

fn ping(_server: &Server, _conn: &mut Connection, args: &[Vec<u8>]) -> Reply {
    match args.len() {
        0 => Reply::Simple("PONG".to_string()),
        1 => Reply::Bulk(args[0].clone()),
        _ => CommandError::WrongArity("ping".to_string()).into(),
    }
}

fn info(server: &Server, _conn: &mut Connection, _args: &[Vec<u8>]) -> Reply {
    let snapshot = server.metrics().snapshot();
    let text = format!(
        "role:master\r\ndatabases:{}\r\nuptime_in_seconds:{}\r\nconnected_clients:{}\r\ntotal_commands_processed:{}\r\ntotal_errors:{}\r\n",
        DB_COUNT,
        server.uptime().as_secs(),
        snapshot.connections_open,
        snapshot.commands_total,
        snapshot.errors_total,
    );
    Reply::Bulk(text.into_bytes())
}
