//! Build tool command construction and process control.

mod command;
mod process;

pub use command::*;
pub use process::*;
