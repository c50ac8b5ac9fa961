//! # missive-store
//!
//! SQLite implementation of the Missive backend schema.
//!
//! The hosted backend owns the real tables; this crate reproduces the same
//! `user`, `message` and `notification` tables, the denormalized `v_message`
//! view and the notification-on-message behaviour so that the client can run
//! against a local file (development, tests, single-machine installs). The
//! crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and returns the backend row types from
//! `missive-shared`.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod notifications;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use notifications::NewNotification;
