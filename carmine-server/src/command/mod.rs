//! # Command Table
//!
//! Registry of every command the server answers, split into data
//! commands (run against the connection's selected database) and server
//! commands (run against the server and connection). The table is built
//! once at server construction and injected; after that it is read-only
//! and shared across connection tasks without locking.
//!
//! Arity counts the command name itself: a positive arity demands that
//! exact argument count, a negative arity at least its magnitude.

use std::collections::HashMap;

use carmine_common::Reply;
use carmine_engine::Database;

use crate::connection::Connection;
use crate::server::Server;

mod extended;
mod generic;
mod server;
mod string;
mod zset;

/// Handler for a command executed against one database.
pub type DataCommandFn = fn(&Database, &[Vec<u8>]) -> Reply;

/// Handler for a command executed against the server itself.
pub type ServerCommandFn = fn(&Server, &mut Connection, &[Vec<u8>]) -> Reply;

pub struct DataCommand {
    pub name: &'static str,
    pub arity: i32,
    pub exec: DataCommandFn,
}

pub struct ServerCommand {
    pub name: &'static str,
    pub arity: i32,
    pub exec: ServerCommandFn,
}

fn register(
    table: &mut HashMap<&'static str, DataCommand>,
    name: &'static str,
    arity: i32,
    exec: DataCommandFn,
) {
    table.insert(name, DataCommand { name, arity, exec });
}

fn register_server(
    table: &mut HashMap<&'static str, ServerCommand>,
    name: &'static str,
    arity: i32,
    exec: ServerCommandFn,
) {
    table.insert(name, ServerCommand { name, arity, exec });
}

/// Immutable lookup table over both command families.
pub struct CommandTable {
    data: HashMap<&'static str, DataCommand>,
    server: HashMap<&'static str, ServerCommand>,
}

impl CommandTable {
    /// Builds the full table with every registered family.
    pub fn new() -> Self {
        let mut data = HashMap::new();
        string::register_all(&mut data);
        zset::register_all(&mut data);
        generic::register_all(&mut data);

        let mut server = HashMap::new();
        self::server::register_all(&mut server);

        CommandTable { data, server }
    }

    pub fn data(&self, name: &str) -> Option<&DataCommand> {
        self.data.get(name)
    }

    pub fn server(&self, name: &str) -> Option<&ServerCommand> {
        self.server.get(name)
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}
