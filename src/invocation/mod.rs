//! Invocation lifecycle: spawn, live streaming, aggregation.

mod exit;
mod invoke;
mod reader;

pub use exit::*;
pub use invoke::*;
pub use reader::*;
