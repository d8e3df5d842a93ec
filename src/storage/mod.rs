//! SQLite persistence layer.
//!
//! Every function takes a pooled connection and returns `rusqlite::Result`;
//! timestamps are RFC 3339 strings in UTC so SQLite's `datetime()` and plain
//! string comparison both order them correctly.

pub mod db;
pub mod engagement;
pub mod folders;
pub mod links;
pub mod otp;
pub mod roster;

pub use db::{create_pool, get_connection, DbConnection, DbPool};
