//! Build event protocol (BEP) consumption: the event-output file, the
//! length-delimited frame decoder, and the decoded event model.

mod decoder;
mod events;
mod sink;
mod tailer;

pub use decoder::*;
pub use events::*;
pub use sink::*;
pub use tailer::*;
