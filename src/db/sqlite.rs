//! SQLite row source backed by rusqlite. Used by embedded deployments and
//! the test suite; server backends implement [`RowSource`] over their own
//! drivers.

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::errors::DataReadError;
use super::{Row, RowCursor, RowSource, VecCursor};

pub struct SqliteRowSource {
    conn: Connection,
}

impl SqliteRowSource {
    pub fn new(conn: Connection) -> Self {
        SqliteRowSource { conn }
    }

    pub fn open_in_memory() -> Result<Self, DataReadError> {
        Connection::open_in_memory()
            .map(SqliteRowSource::new)
            .map_err(from_sqlite)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RowSource for SqliteRowSource {
    fn rows<'a>(&'a self, sql: &str) -> Result<Box<dyn RowCursor + 'a>, DataReadError> {
        // SQLite is in-process; buffering the statement keeps the cursor
        // free of the prepared statement's borrow.
        let mut stmt = self.conn.prepare(sql).map_err(from_sqlite)?;
        let column_count = stmt.column_count();
        let mut rows = Vec::new();
        let mut raw = stmt.query([]).map_err(from_sqlite)?;
        while let Some(row) = raw.next().map_err(from_sqlite)? {
            let mut cells = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                cells.push(cell_to_text(row.get_ref(idx).map_err(from_sqlite)?));
            }
            rows.push(Row(cells));
        }
        Ok(Box::new(VecCursor::new(rows)))
    }

    fn execute(&self, sql: &str) -> Result<(), DataReadError> {
        self.conn.execute_batch(sql).map_err(from_sqlite)
    }
}

fn cell_to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn from_sqlite(err: rusqlite::Error) -> DataReadError {
    DataReadError::Database(err.to_string())
}
