/// Connection Management Module
///
/// This module provides the bounded SQLite connection pool and the per-client
/// handle that queries, executes and opens transactions through it.

use crate::config::{ClientOptions, PoolOptions};
use crate::core::db::query::{format_sql, Query};
use crate::core::db::transaction::Tx;
use crate::core::{Result, SqlbindError};
use crate::dialect::{sqlite, Dialect};
use crate::scan::Decoder;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Effective limits of a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_open: usize,
    pub max_idle: usize,
    /// `None` keeps connections forever.
    pub max_lifetime: Option<Duration>,
}

impl From<PoolOptions> for PoolLimits {
    fn from(options: PoolOptions) -> Self {
        PoolLimits {
            max_open: options.max_open(),
            max_idle: options.max_idle(),
            max_lifetime: Some(options.max_lifetime()),
        }
    }
}

impl Default for PoolLimits {
    fn default() -> Self {
        PoolOptions::default().into()
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently alive, checked out or idle.
    pub open: usize,
    pub idle: usize,
}

struct IdleConnection {
    conn: Connection,
    created: Instant,
}

struct PoolState {
    idle: Vec<IdleConnection>,
    open: usize,
    /// Owning thread of every connection held by an open transaction.
    pinned: Vec<ThreadId>,
    closed: bool,
}

struct PoolInner {
    path: String,
    pragmas: Vec<String>,
    limits: PoolLimits,
    state: Mutex<PoolState>,
    available: Condvar,
}

/// A bounded pool of SQLite connections to one database.
///
/// At most `max_open` connections are alive at once; callers asking for more
/// block until one is returned. Returned connections are kept idle up to
/// `max_idle` and discarded once older than `max_lifetime`.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Opens a pool and pings the database once.
    ///
    /// # Arguments
    ///
    /// * `path` - Database file path, or ":memory:" for an in-memory database
    /// * `pragmas` - Statements run on every new connection
    /// * `limits` - Pool limits; an in-memory database is clamped to a single
    ///   connection that never expires, so every checkout sees the same data
    pub fn open(path: &str, pragmas: Vec<String>, limits: PoolLimits) -> Result<Pool> {
        let limits = if sqlite::is_memory(path) {
            PoolLimits {
                max_open: 1,
                max_idle: 1,
                max_lifetime: None,
            }
        } else {
            limits
        };

        let pool = Pool {
            inner: Arc::new(PoolInner {
                path: path.to_string(),
                pragmas,
                limits,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    open: 0,
                    pinned: Vec::new(),
                    closed: false,
                }),
                available: Condvar::new(),
            }),
        };

        let conn = pool.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        drop(conn);

        debug!(path, max_open = limits.max_open, max_idle = limits.max_idle, "opened pool");
        Ok(pool)
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn limits(&self) -> PoolLimits {
        self.inner.limits
    }

    pub fn stats(&self) -> Result<PoolStats> {
        let state = self.inner.lock()?;
        Ok(PoolStats {
            open: state.open,
            idle: state.idle.len(),
        })
    }

    /// Checks out a connection, blocking while the pool is at `max_open`.
    ///
    /// Fails instead of blocking when every connection is held by a
    /// transaction opened on the calling thread, since none of them can be
    /// returned while it waits.
    pub fn get(&self) -> Result<PooledConnection> {
        let inner = &self.inner;
        let mut state = inner.lock()?;

        loop {
            if state.closed {
                return Err(SqlbindError::Pool("pool is closed".to_string()));
            }

            if let Some(idle) = state.idle.pop() {
                if inner.expired(idle.created) {
                    state.open -= 1;
                    continue;
                }
                return Ok(PooledConnection {
                    conn: Some(idle.conn),
                    created: idle.created,
                    pinned_by: None,
                    pool: Arc::clone(inner),
                });
            }

            if state.open < inner.limits.max_open {
                state.open += 1;
                drop(state);
                return match inner.connect() {
                    Ok(conn) => Ok(PooledConnection {
                        conn: Some(conn),
                        created: Instant::now(),
                        pinned_by: None,
                        pool: Arc::clone(inner),
                    }),
                    Err(e) => {
                        if let Ok(mut state) = inner.state.lock() {
                            state.open -= 1;
                        }
                        inner.available.notify_one();
                        Err(e)
                    }
                };
            }

            let current = thread::current().id();
            if state.pinned.iter().filter(|owner| **owner == current).count() >= inner.limits.max_open {
                return Err(SqlbindError::Pool("connection held by an open transaction".to_string()));
            }

            state = inner
                .available
                .wait(state)
                .map_err(|_| SqlbindError::Pool("pool lock poisoned".to_string()))?;
        }
    }

    /// Closes idle connections and refuses further checkouts.
    ///
    /// Connections still checked out are closed when they are returned.
    pub fn close(&self) -> Result<()> {
        let mut state = self.inner.lock()?;
        state.closed = true;
        let idle = std::mem::take(&mut state.idle);
        state.open -= idle.len();
        drop(state);

        self.inner.available.notify_all();
        for IdleConnection { conn, .. } in idle {
            conn.close().map_err(|(_, e)| SqlbindError::Database(e))?;
        }
        Ok(())
    }
}

impl PoolInner {
    fn lock(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| SqlbindError::Pool("pool lock poisoned".to_string()))
    }

    fn expired(&self, created: Instant) -> bool {
        self.limits
            .max_lifetime
            .map_or(false, |lifetime| created.elapsed() >= lifetime)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        for pragma in &self.pragmas {
            conn.execute_batch(pragma)?;
        }
        Ok(conn)
    }

    fn release(&self, conn: Connection, created: Instant, pinned_by: Option<ThreadId>) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(owner) = pinned_by {
                if let Some(pos) = state.pinned.iter().position(|t| *t == owner) {
                    state.pinned.swap_remove(pos);
                }
            }
            if state.closed || self.expired(created) || state.idle.len() >= self.limits.max_idle {
                state.open -= 1;
            } else {
                state.idle.push(IdleConnection { conn, created });
            }
        }
        self.available.notify_one();
    }
}

/// A connection checked out of a [`Pool`]; returned to it on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    created: Instant,
    pinned_by: Option<ThreadId>,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    /// Marks the connection as held by a transaction on the current thread
    /// until it is returned.
    pub(crate) fn pin(&mut self) -> Result<()> {
        if self.pinned_by.is_none() {
            let owner = thread::current().id();
            self.pool.lock()?.pinned.push(owner);
            self.pinned_by = Some(owner);
        }
        Ok(())
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `drop` takes the connection out.
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.created, self.pinned_by);
        }
    }
}

/// A named database client backed by a connection pool.
#[derive(Clone)]
pub struct Client {
    name: String,
    dialect: Dialect,
    pool: Pool,
    logging: bool,
    decoder: Decoder,
}

impl Client {
    /// Opens a client from resolved options.
    ///
    /// # Returns
    ///
    /// The client, `SqlbindError::Dialect` for an unknown dialect or one with
    /// no linked driver (the message carries the connection string with the
    /// password masked), or
    /// `SqlbindError::Config` when no database is configured.
    pub fn open(name: &str, options: &ClientOptions) -> Result<Client> {
        let dialect = Dialect::of(options)?;
        let dsn = dialect.dsn(options)?;

        if !dialect.has_driver() {
            warn!(client = name, %dialect, "no driver linked for dialect");
            return Err(SqlbindError::Dialect(format!(
                "no {} driver is linked into this build; connection string: {}",
                dialect,
                dialect.redacted_dsn(options)?
            )));
        }

        let pool = Pool::open(&dsn, sqlite::pragmas(options), options.pool_limits().into())?;
        info!(client = name, %dialect, "client opened");

        Ok(Client {
            name: name.to_string(),
            dialect,
            pool,
            logging: options.logging_enabled(),
            decoder: Decoder::new(),
        })
    }

    /// Uses `decoder` for every query of this client.
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn logging(&self) -> bool {
        self.logging
    }

    /// Prepares a deferred query; nothing runs until the handle is scanned.
    pub fn query(&self, sql: &str, args: &[SqlValue]) -> Query<'_> {
        if self.logging {
            info!("Query: {}", format_sql(sql, args));
        }
        Query::pooled(&self.pool, sql, args, self.decoder)
    }

    /// Executes a statement and returns the number of affected rows.
    pub fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<usize> {
        if self.logging {
            info!("Exec: {}", format_sql(sql, args));
        }
        let conn = self.pool.get()?;
        Ok(conn.execute(sql, params_from_iter(args.iter()))?)
    }

    /// Starts a transaction on a dedicated pooled connection.
    pub fn begin(&self) -> Result<Tx> {
        let mut conn = self.pool.get()?;
        conn.pin()?;
        Tx::begin(conn, self.logging, self.decoder)
    }

    pub fn close(&self) -> Result<()> {
        self.pool.close()?;
        info!(client = %self.name, "client closed");
        Ok(())
    }
}
