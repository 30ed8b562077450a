//! kith storage core.
//!
//! Local-first storage for a personal relationship tracker: one embedded
//! SQLite database behind a retrying façade, with typed repositories on top.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod repo;

pub use db::Database;
pub use error::{Error, ErrorClass};
