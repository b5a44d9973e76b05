//! # chatterbox-store
//!
//! SQLite persistence for Chatterbox.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for user accounts,
//! conversations with their messages, and knowledge-base rows. Callers open
//! one handle per unit of work and drop it when done.

pub mod conversations;
pub mod database;
pub mod knowledge;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
