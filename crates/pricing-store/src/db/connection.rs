//! SQLite connection and pool helpers.
//!
//! Provides [`connect_sqlite`], which opens a single connection and applies
//! the PRAGMAs recommended for a write-heavy single-file SQLite database
//! (WAL journaling, foreign_keys=ON, a busy_timeout), and [`build_pool`],
//! which wraps those PRAGMAs into an `r2d2` connection manager so the async
//! [`crate::sqlite_store::SqliteStore`] can hand pooled connections to
//! blocking tasks.

use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::{Connection, RunQueryDsl, SqliteConnection, sql_query};

/// Opens a SQLite connection and applies connection-wide PRAGMAs.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)?;
    apply_pragmas(&mut conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &mut SqliteConnection) -> anyhow::Result<()> {
    sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    Ok(())
}

#[derive(Debug)]
struct PragmaCustomizer;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        apply_pragmas(conn).map_err(|e| diesel::r2d2::Error::QueryError(
            diesel::result::Error::QueryBuilderError(e.to_string().into()),
        ))
    }
}

/// A pooled SQLite connection manager with the core's PRAGMAs applied to
/// every connection as it is checked out.
pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

/// Builds a bounded connection pool for `database_url`. Each connection gets
/// the PRAGMAs from [`connect_sqlite`] applied on acquire.
pub fn build_pool(database_url: &str, max_size: u32) -> anyhow::Result<SqlitePool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(PragmaCustomizer))
        .build(manager)?;
    Ok(pool)
}
