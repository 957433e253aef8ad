//! # Parsers
//!
//! Per-family history database readers and the canonical record model they produce.

pub mod browser;
pub mod epoch;
pub mod snapshot;
pub mod sqlite_db;
