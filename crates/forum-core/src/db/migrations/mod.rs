//! Forum database migrations
//!
//! SQL migrations are embedded as strings and executed when the database is opened.

use rusqlite::Connection;

use crate::error::Result;

/// Forum tables SQL (001)
pub const FORUM_TABLES_SQL: &str = include_str!("001_forum_tables.sql");

/// Run all forum migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(FORUM_TABLES_SQL)?;
    Ok(())
}
