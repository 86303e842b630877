//! Slash commands: descriptors, parsing, and handling.

pub mod command;
pub mod definition;
pub mod handler;

pub use command::Command;
pub use definition::{CommandSpec, OptionSpec, command_definitions, command_specs};
pub use handler::CommandHandler;
