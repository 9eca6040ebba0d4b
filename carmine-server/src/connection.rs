//! Per-connection state. The socket itself stays with the handler; the
//! command layer only ever sees this.

use crate::server::DB_COUNT;

/// State carried by one client connection.
pub struct Connection {
    selected_db: usize,
}

impl Connection {
    /// New connections start on database 0.
    pub fn new() -> Self {
        Connection { selected_db: 0 }
    }

    /// Index of the currently selected database.
    pub fn selected_db(&self) -> usize {
        self.selected_db
    }

    /// Switches the connection to another database.
    ///
    /// Callers validate the index against [`DB_COUNT`] first.
    pub fn select_db(&mut self, index: usize) {
        debug_assert!(index < DB_COUNT);
        self.selected_db = index;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
