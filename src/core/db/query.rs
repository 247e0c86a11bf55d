/// Query Execution Module
///
/// Deferred query handles and the SQL formatting used for statement logs.
///
/// A [`Query`] holds everything needed to run a statement but touches the
/// database only when it is scanned, so the destination decides whether one
/// row or all of them are read.

use crate::core::db::connection::{Pool, PooledConnection};
use crate::core::db::cursor::SqliteCursor;
use crate::core::Result;
use crate::scan::{Decode, Decoder};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

enum Source<'c> {
    Pool(&'c Pool),
    Connection(&'c Connection),
}

/// A statement and its arguments, ready to be decoded.
pub struct Query<'c> {
    source: Source<'c>,
    sql: String,
    args: Vec<SqlValue>,
    decoder: Decoder,
}

impl<'c> Query<'c> {
    pub(crate) fn pooled(pool: &'c Pool, sql: &str, args: &[SqlValue], decoder: Decoder) -> Self {
        Query {
            source: Source::Pool(pool),
            sql: sql.to_string(),
            args: args.to_vec(),
            decoder,
        }
    }

    /// A query bound to one connection, e.g. inside a transaction.
    pub fn on(conn: &'c Connection, sql: &str, args: &[SqlValue], decoder: Decoder) -> Self {
        Query {
            source: Source::Connection(conn),
            sql: sql.to_string(),
            args: args.to_vec(),
            decoder,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    /// Decodes the whole result into `dest`.
    ///
    /// A sequence receives every row; any other destination receives the
    /// first row and is left untouched when there is none.
    pub fn scan<D: Decode + ?Sized>(&self, dest: &mut D) -> Result<()> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&self.sql)?;
            let cursor = SqliteCursor::open(&mut stmt, params_from_iter(self.args.iter()))?;
            self.decoder.decode(cursor, dest)
        })
    }

    /// Decodes exactly one row into `dest`.
    ///
    /// # Returns
    ///
    /// `Ok(())` once the first row is decoded, `SqlbindError::NoRows` when the
    /// result is empty, or the error that prevented the statement from running.
    pub fn scan_one<D: Decode + ?Sized>(&self, dest: &mut D) -> Result<()> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&self.sql)?;
            let acquired = SqliteCursor::open(&mut stmt, params_from_iter(self.args.iter()));
            self.decoder.decode_one(acquired, dest)
        })
    }

    fn with_connection<T>(&self, run: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        match self.source {
            Source::Pool(pool) => {
                let conn: PooledConnection = pool.get()?;
                run(&conn)
            }
            Source::Connection(conn) => run(conn),
        }
    }
}

/// Renders `value` as a SQL literal.
pub fn sql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("X'{}'", hex)
        }
    }
}

/// Interpolates `args` into the `?` placeholders of `sql` for logging.
///
/// Placeholders inside quoted strings and identifiers are left alone, as are
/// placeholders beyond the number of arguments.
pub fn format_sql(sql: &str, args: &[SqlValue]) -> String {
    let mut formatted = String::with_capacity(sql.len());
    let mut args = args.iter();
    let mut quote: Option<char> = None;

    for c in sql.chars() {
        match (quote, c) {
            (Some(open), _) if c == open => {
                quote = None;
                formatted.push(c);
            }
            (Some(_), _) => formatted.push(c),
            (None, '\'' | '"' | '`') => {
                quote = Some(c);
                formatted.push(c);
            }
            (None, '?') => match args.next() {
                Some(arg) => formatted.push_str(&sql_literal(arg)),
                None => formatted.push(c),
            },
            (None, _) => formatted.push(c),
        }
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::connection::PoolLimits;
    use crate::core::SqlbindError;
    use crate::scan::RowMap;

    fn setup_test_pool() -> Pool {
        let pool = Pool::open(":memory:", Vec::new(), PoolLimits::default()).unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "
                CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);
                INSERT INTO users (name, age) VALUES ('Alice', 30);
                INSERT INTO users (name, age) VALUES ('Bob', 25);
            ",
            )
            .unwrap();
        pool
    }

    #[test]
    fn test_format_sql() {
        let args = [
            SqlValue::Integer(1),
            SqlValue::Text("O'Brien".into()),
            SqlValue::Null,
        ];
        assert_eq!(
            format_sql("SELECT * FROM t WHERE id = ? AND name = ? AND note IS ?", &args),
            "SELECT * FROM t WHERE id = 1 AND name = 'O''Brien' AND note IS NULL"
        );
        assert_eq!(
            format_sql("SELECT '?' AS q, \"a?\" FROM t WHERE x = ?", &[SqlValue::Real(1.5)]),
            "SELECT '?' AS q, \"a?\" FROM t WHERE x = 1.5"
        );
        assert_eq!(format_sql("SELECT ?, ?", &[SqlValue::Integer(1)]), "SELECT 1, ?");
    }

    #[test]
    fn test_sql_literal_blob() {
        assert_eq!(sql_literal(&SqlValue::Blob(vec![0xde, 0xad])), "X'DEAD'");
    }

    #[test]
    fn test_query_is_deferred() {
        let pool = setup_test_pool();
        let query = Query::pooled(&pool, "SELECT * FROM missing", &[], Decoder::new());
        assert_eq!(query.sql(), "SELECT * FROM missing");

        let mut rows: Vec<RowMap> = Vec::new();
        match query.scan(&mut rows) {
            Err(SqlbindError::Database(_)) => {}
            other => panic!("Expected Database error, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_with_arguments() {
        let pool = setup_test_pool();
        let mut names: Vec<String> = Vec::new();
        Query::pooled(
            &pool,
            "SELECT name FROM users WHERE age > ? ORDER BY id",
            &[SqlValue::Integer(20)],
            Decoder::new(),
        )
        .scan(&mut names)
        .unwrap();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_scan_one_reports_no_rows() {
        let pool = setup_test_pool();
        let mut age = 0i64;
        let result = Query::pooled(
            &pool,
            "SELECT age FROM users WHERE name = ?",
            &[SqlValue::Text("Carol".into())],
            Decoder::new(),
        )
        .scan_one(&mut age);

        assert!(result.unwrap_err().is_no_rows());
        assert_eq!(age, 0);
    }

    #[test]
    fn test_scan_on_single_connection() {
        let pool = setup_test_pool();
        let conn = pool.get().unwrap();
        let mut count = 0i64;
        Query::on(&conn, "SELECT count(*) FROM users", &[], Decoder::new())
            .scan_one(&mut count)
            .unwrap();
        assert_eq!(count, 2);
    }
}
