/// Transaction Module
///
/// A transaction owns one pooled connection from `BEGIN` until it is
/// committed, rolled back or dropped.

use crate::core::db::connection::PooledConnection;
use crate::core::db::query::{format_sql, Query};
use crate::core::{Result, SqlbindError};
use crate::scan::Decoder;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use tracing::{info, warn};
use uuid::Uuid;

/// Represents transaction states
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransactionState {
    /// Statements may still run
    Active,
    Committed,
    RolledBack,
}

/// An open transaction.
///
/// Dropping an active transaction rolls it back.
pub struct Tx {
    conn: PooledConnection,
    id: Uuid,
    state: TransactionState,
    logging: bool,
    decoder: Decoder,
}

impl Tx {
    pub(crate) fn begin(conn: PooledConnection, logging: bool, decoder: Decoder) -> Result<Tx> {
        let id = Uuid::new_v4();
        if logging {
            info!("Executing ({}): BEGIN;", id);
        }
        conn.execute_batch("BEGIN")
            .map_err(|e| SqlbindError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        Ok(Tx {
            conn,
            id,
            state: TransactionState::Active,
            logging,
            decoder,
        })
    }

    /// Random identifier used to correlate the transaction's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => {
                Err(SqlbindError::Transaction("Transaction has already been committed".to_string()))
            }
            TransactionState::RolledBack => {
                Err(SqlbindError::Transaction("Transaction has already been rolled back".to_string()))
            }
        }
    }

    /// Prepares a deferred query inside the transaction.
    pub fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Query<'_>> {
        self.ensure_active()?;
        if self.logging {
            info!("Query ({}): {}", self.id, format_sql(sql, args));
        }
        Ok(Query::on(&self.conn, sql, args, self.decoder))
    }

    /// Executes a statement inside the transaction and returns the affected row count.
    pub fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<usize> {
        self.ensure_active()?;
        if self.logging {
            info!("Exec ({}): {}", self.id, format_sql(sql, args));
        }
        Ok(self.conn.execute(sql, params_from_iter(args.iter()))?)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.logging {
            info!("Executing ({}): COMMIT;", self.id);
        }
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| SqlbindError::Transaction(format!("Failed to commit transaction: {}", e)))?;
        self.state = TransactionState::Committed;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.logging {
            info!("Executing ({}): ROLLBACK", self.id);
        }
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| SqlbindError::Transaction(format!("Failed to roll back transaction: {}", e)))?;
        self.state = TransactionState::RolledBack;
        Ok(())
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            if let Err(e) = self.rollback() {
                warn!(tx = %self.id, "rollback on drop failed: {}", e);
            }
        }
    }
}
