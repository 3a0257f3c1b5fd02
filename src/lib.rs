//! Pokebattle Game Server Library
//!
//! This library provides the core functionality for the Pokebattle game
//! server: a UDP text protocol where players join, collect creatures and
//! fight turn-based battles against each other.
//!
//! ## Modules
//!
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `game` - Creatures, rosters, sessions, invitations and battles
//! - `net` - UDP transport, receive loop and command dispatch
//! - `protocol` - Command parsing and reply rendering

pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod protocol;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{GameError, Result, ServerError};
pub use net::{Dispatcher, Outbound};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
