//! Protocol module
//!
//! The text protocol spoken by clients:
//! - Command parsing (verbs, aliases, arity)
//! - Rendering of replies and notifications

pub mod command;
pub mod text;

pub use command::Command;
