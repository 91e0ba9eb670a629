//! Build event protocol driver: runs an external build tool, streams its
//! event file live, and aggregates the stream into a queryable result.

pub mod aggregate;
pub mod bep;
pub mod config;
pub mod diagnostics;
pub mod display;
pub mod exec;
pub mod invocation;
pub mod output;
