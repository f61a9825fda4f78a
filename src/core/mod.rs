//! Shared primitives: errors, time, workspace paths, configuration, the
//! `Mode` type and the append-only audit log.

pub mod audit;
pub mod config;
pub mod error;
pub mod mode;
pub mod output;
pub mod store;
pub mod time;
