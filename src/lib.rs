//! # Kestrel
//!
//! An in-memory key-value server that speaks RESP2, so stock Redis clients
//! can talk to it. Holds strings, lists, hashes, sets and sorted sets with
//! per-key expiration, and persists through an append-only command log.

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod glob;
pub mod persistence;
pub mod resp;
pub mod server;
pub mod store;
pub mod types;
