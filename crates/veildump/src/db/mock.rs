//! Scripted database double for tests.

use std::io::{Cursor, Read};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

use super::{Connector, DbConn};

#[derive(Default)]
struct MockState {
    /// `(marker, bytes)` pairs; `copy_out` serves the first entry whose
    /// marker is a substring of the SQL.
    copy_streams: Vec<(String, Vec<u8>)>,
    /// `(marker, rows)` pairs served by `query_rows` the same way.
    query_results: Vec<(String, Vec<Vec<Option<String>>>)>,
    /// Every statement seen by `execute`/`batch_execute`, in order.
    executed: Vec<String>,
    /// Every `copy_in` call with the bytes it consumed.
    copied_in: Vec<(String, Vec<u8>)>,
}

/// A scripted in-process database shared by every connection it hands out.
///
/// Statements are recorded globally in execution order, which lets tests
/// assert cross-connection ordering (for example that restore ran entries
/// respecting their dependencies).
#[derive(Clone, Default)]
pub struct MockDb {
    state: Arc<Mutex<MockState>>,
}

impl MockDb {
    /// Creates an empty scripted database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `bytes` for any `copy_out` whose SQL contains `marker`.
    pub fn add_copy_stream(&self, marker: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.state.lock().copy_streams.push((marker.into(), bytes.into()));
    }

    /// Serves `rows` for any `query_rows` whose SQL contains `marker`.
    pub fn add_query_result(&self, marker: impl Into<String>, rows: Vec<Vec<Option<String>>>) {
        self.state.lock().query_results.push((marker.into(), rows));
    }

    /// Statements executed so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// `copy_in` calls with the bytes they consumed.
    #[must_use]
    pub fn copied_in(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().copied_in.clone()
    }
}

impl Connector for MockDb {
    fn connect(&self) -> Result<Box<dyn DbConn>> {
        Ok(Box::new(MockConn { state: Arc::clone(&self.state) }))
    }
}

struct MockConn {
    state: Arc<Mutex<MockState>>,
}

impl DbConn for MockConn {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        self.state.lock().executed.push(sql.to_owned());
        Ok(0)
    }

    fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.state.lock().executed.push(sql.to_owned());
        Ok(())
    }

    fn query_rows(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>> {
        let state = self.state.lock();
        for (marker, rows) in &state.query_results {
            if sql.contains(marker.as_str()) {
                return Ok(rows.clone());
            }
        }
        Ok(Vec::new())
    }

    fn copy_out<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Read + 'a>> {
        let state = self.state.lock();
        for (marker, bytes) in &state.copy_streams {
            if sql.contains(marker.as_str()) {
                return Ok(Box::new(Cursor::new(bytes.clone())));
            }
        }
        Err(Error::Database(format!("no scripted copy stream matches {sql:?}")))
    }

    fn copy_in(&mut self, sql: &str, data: &mut dyn Read) -> Result<u64> {
        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes)?;
        let mut state = self.state.lock();
        state.executed.push(sql.to_owned());
        state.copied_in.push((sql.to_owned(), bytes));
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_copy_stream_matches_by_marker() {
        let db = MockDb::new();
        db.add_copy_stream("\"public\".\"users\"", b"1\ta\n".to_vec());

        let mut conn = db.connect().unwrap();
        let mut out = Vec::new();
        conn.copy_out("COPY (SELECT * FROM \"public\".\"users\") TO STDOUT")
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"1\ta\n");
        assert!(conn.copy_out("COPY (SELECT * FROM other) TO STDOUT").is_err());
    }

    #[test]
    fn statements_are_recorded_across_connections() {
        let db = MockDb::new();
        let mut a = db.connect().unwrap();
        let mut b = db.connect().unwrap();
        a.execute("CREATE TABLE x ()").unwrap();
        b.batch_execute("BEGIN").unwrap();
        assert_eq!(db.executed(), vec!["CREATE TABLE x ()".to_owned(), "BEGIN".to_owned()]);
    }
}
