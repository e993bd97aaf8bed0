//! Database utilities for connections, pooling, and schema migrations.
//!
//! - [`connection::connect_sqlite`] applies WAL, foreign_keys=ON, and a
//!   5000ms busy_timeout to a single connection; [`connection::build_pool`]
//!   applies the same PRAGMAs to every connection in an `r2d2` pool.
//! - [`migrate::run_sqlite`] applies the embedded Diesel migrations that
//!   create the generic `documents` table.
//!
//! Example:
//! ```no_run
//! use pricing_store::db::{migrate, connection};
//!
//! let db_path = std::env::temp_dir().join("pricing_store_example.db");
//! migrate::run_sqlite(db_path.to_str().unwrap()).expect("migrations");
//! let pool = connection::build_pool(db_path.to_str().unwrap(), 4).expect("pool");
//! ```

pub mod connection;
pub mod migrate;
