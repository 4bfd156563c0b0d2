//! Database layer for chatsync

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::LibSqlLocalStore;
