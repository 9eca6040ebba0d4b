//! # Server Core
//!
//! The fixed array of logical databases, the injected command table,
//! and the dispatch path every parsed frame goes through: resolve the
//! command by lowercased name, validate arity, then execute against the
//! server or the connection's selected database.

use std::time::{Duration, Instant};

use carmine_common::{CommandError, Reply};
use carmine_engine::Database;

use crate::command::CommandTable;
use crate::connection::Connection;
use crate::metrics::Metrics;

/// Number of logical databases, selectable per connection.
pub const DB_COUNT: usize = 16;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 3301;

/// The server: databases plus the read-only command table.
pub struct Server {
    databases: Vec<Database>,
    commands: CommandTable,
    metrics: Metrics,
    started_at: Instant,
}

impl Server {
    /// Creates a server with `DB_COUNT` empty databases.
    pub fn new() -> Self {
        let mut databases = Vec::with_capacity(DB_COUNT);
        for _ in 0..DB_COUNT {
            databases.push(Database::new());
        }
        Server {
            databases,
            commands: CommandTable::new(),
            metrics: Metrics::new(),
            started_at: Instant::now(),
        }
    }

    /// The database at `index`; callers pass a validated index.
    pub fn database(&self, index: usize) -> &Database {
        &self.databases[index]
    }

    /// Shared request-path metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Time since the server was constructed.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Executes one command frame for a connection.
    pub fn exec(&self, conn: &mut Connection, args: &[Vec<u8>]) -> Reply {
        let name = match args.first() {
            Some(first) => String::from_utf8_lossy(first).to_lowercase(),
            None => return CommandError::Syntax.into(),
        };

        if let Some(command) = self.commands.server(&name) {
            if !arity_matches(command.arity, args.len()) {
                return CommandError::WrongArity(name).into();
            }
            return (command.exec)(self, conn, &args[1..]);
        }

        if let Some(command) = self.commands.data(&name) {
            if !arity_matches(command.arity, args.len()) {
                return CommandError::WrongArity(name).into();
            }
            let db = self.database(conn.selected_db());
            return (command.exec)(db, &args[1..]);
        }

        CommandError::UnknownCommand {
            name,
            args_start: first_arg_byte(args),
        }
        .into()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Positive arity demands an exact count, negative at least |arity|;
/// the count includes the command name.
fn arity_matches(arity: i32, arg_count: usize) -> bool {
    if arity >= 0 {
        arg_count == arity as usize
    } else {
        arg_count >= arity.unsigned_abs() as usize
    }
}

/// First byte of the first argument, for the unknown-command message.
fn first_arg_byte(args: &[Vec<u8>]) -> String {
    args.get(1)
        .and_then(|arg| arg.first())
        .map(|&byte| (byte as char).to_string())
        .unwrap_or_default()
}
