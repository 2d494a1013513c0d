/// r2d2 pool of SQLite connections, plus the write-transaction helper.
///
/// Every pooled connection is prepared by the manager's init hook with a
/// busy timeout, foreign keys and WAL. Writes begin `IMMEDIATE`.
use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::{StoreError, StoreResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Build a pool of at most `max_size` connections. A checkout waits up to
/// `timeout` and then fails with `StoreError::Transient`.
pub fn open_pool(path: impl AsRef<Path>, max_size: usize, timeout: Duration) -> StoreResult<ConnectionPool> {
    let manager = SqliteConnectionManager::file(path.as_ref()).with_init(prepare_connection);
    let max_size = u32::try_from(max_size.max(1)).unwrap_or(u32::MAX);
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .min_idle(Some(0))
        .connection_timeout(timeout)
        .build(manager)?;
    Ok(pool)
}

fn prepare_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")
}

/// Begin a transaction that takes the write lock up front.
pub(super) fn write_tx(conn: &mut Connection) -> StoreResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

impl From<r2d2::Error> for StoreError {
    fn from(value: r2d2::Error) -> Self {
        log::warn!(target: "corkboard.store.pool", "Connection checkout failed: {}", value);
        StoreError::Transient(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_connections_share_one_database() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("pool.db"), 2, Duration::from_millis(200)).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        }
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        for conn in [&a, &b] {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_init_hook_enables_foreign_keys_and_wal() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("pool.db"), 1, Duration::from_millis(200)).unwrap();
        let conn = pool.get().unwrap();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
        assert_eq!(fk, 1);
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_checkout_times_out_when_exhausted() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("pool.db"), 1, Duration::from_millis(50)).unwrap();
        let _held = pool.get().unwrap();
        let err = StoreError::from(pool.get().map(|_| ()).unwrap_err());
        assert!(matches!(err, StoreError::Transient(_)));
    }

    #[test]
    fn test_released_connection_unblocks_waiter() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("pool.db"), 1, Duration::from_secs(2)).unwrap();
        let held = pool.get().unwrap();
        std::thread::scope(|s| {
            let waiter = s.spawn(|| pool.get().map(|_| ()));
            std::thread::sleep(Duration::from_millis(20));
            drop(held);
            assert!(waiter.join().unwrap().is_ok());
        });
    }

    #[test]
    fn test_write_tx_takes_the_write_lock() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("pool.db"), 2, Duration::from_millis(200)).unwrap();
        pool.get().unwrap().execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

        let mut first = pool.get().unwrap();
        let mut second = pool.get().unwrap();
        second.busy_timeout(Duration::from_millis(10)).unwrap();
        let tx = write_tx(&mut first).unwrap();
        assert!(write_tx(&mut second).is_err());
        tx.commit().unwrap();
        assert!(write_tx(&mut second).is_ok());
    }
}
