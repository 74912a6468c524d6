//! plantlog-core - Core library for Plantlog
//!
//! This crate contains the local record store, sync settings / history /
//! conflict stores, the remote API client, and the sync engine shared by all
//! Plantlog interfaces.

pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Collection, Record, SyncStatus};
