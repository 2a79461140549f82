//! Prompro-8 command protocol.
//!
//! The device speaks a line-oriented ASCII protocol. Every command is
//! terminated by a carriage return and the device signals that it is ready
//! for the next command by sending a single `*` prompt byte.

pub mod channel;
pub mod prompt;
pub mod select;

pub use channel::Channel;
pub use prompt::wait_for_prompt;
pub use select::TypeSelector;

/// Prompt byte sent by the device when it is ready.
pub const PROMPT: u8 = b'*';

/// Command terminator.
pub const LINE_END: u8 = b'\r';

/// Command letter for "select device type".
pub const SELECT_COMMAND: u8 = b'S';
