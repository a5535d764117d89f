//! Serial console shell
//!
//! Line editing and a small static command table. The embedded task in
//! `tasks::shell` wires this to the USB serial console.

pub mod commands;
pub mod line;

pub use commands::{Shell, ShellCommand, ShellError, COMMANDS};
pub use line::LineAccumulator;
