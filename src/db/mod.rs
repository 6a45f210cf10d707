//! Row-source seam between the query engine and a database driver.
//!
//! The engine never sees driver types: it executes statement text through
//! [`RowSource`] and walks nullable text cells positionally, in the column
//! order the join-graph compiler fixed for the statement. Cell parsing by
//! declared value type happens in the result processors, not here.

pub mod errors;
pub mod sqlite;

pub use errors::DataReadError;
pub use sqlite::SqliteRowSource;

/// One result row: nullable text cells, indexed positionally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row(pub Vec<Option<String>>);

impl Row {
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).and_then(|cell| cell.as_deref())
    }
}

/// A forward-only cursor over result rows.
pub trait RowCursor {
    fn next_row(&mut self) -> Result<Option<Row>, DataReadError>;
}

/// A read-only connection capable of executing generated statements.
///
/// `rows` takes `&self` so one query execution can hold several cursors open
/// at once (the streaming assembler advances the main cursor and the
/// reference cursors key by key).
pub trait RowSource {
    fn rows<'a>(&'a self, sql: &str) -> Result<Box<dyn RowCursor + 'a>, DataReadError>;

    /// Execute a statement with no result rows (staging DDL).
    fn execute(&self, sql: &str) -> Result<(), DataReadError>;
}

/// Cursor over pre-collected rows. Drivers that buffer (and tests) use this.
pub struct VecCursor {
    rows: std::vec::IntoIter<Row>,
}

impl VecCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        VecCursor {
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for VecCursor {
    fn next_row(&mut self) -> Result<Option<Row>, DataReadError> {
        Ok(self.rows.next())
    }
}
