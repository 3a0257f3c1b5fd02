//! Error handling module
//!
//! Defines custom error types for the Pokebattle server.

use std::io;

use thiserror::Error;

/// Main error type for the Pokebattle server
#[derive(Error, Debug)]
pub enum ServerError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Game logic errors
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// Creature catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Roster persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Write error: {0}")]
    WriteError(String),

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Creature catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog not found at: {0}")]
    NotFound(String),

    #[error("Invalid catalog format: {0}")]
    InvalidFormat(String),

    #[error("Catalog is empty")]
    Empty,

    #[error("Duplicate creature id: {0}")]
    DuplicateId(String),

    #[error("Creature {0} has no hit points")]
    NoHitPoints(String),
}

/// Roster persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read roster for {player}: {reason}")]
    Load { player: String, reason: String },

    #[error("Failed to write roster for {player}: {reason}")]
    Save { player: String, reason: String },
}

/// Game logic errors
///
/// Every variant is recoverable: it is reported to the session that issued
/// the command and the server keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("You must join the game first (usage: join <name>)")]
    NotJoined,

    #[error("You have already joined the game")]
    AlreadyJoined,

    #[error("Username {0} already exists")]
    NameTaken(String),

    #[error("You do not own a creature with id {0}")]
    NotOwned(String),

    #[error("Player {0} not found")]
    NoSuchPlayer(String),

    #[error("Cannot invite yourself")]
    SelfInvite,

    #[error("{0} is busy, please try later")]
    TargetBusy(String),

    #[error("You are already in a battle")]
    AlreadyInBattle,

    #[error("You have no pending battle invitation")]
    NoPendingInvite,

    #[error("You already invited {0}, wait for an answer")]
    InvitePending(String),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("You are not in a battle")]
    NoActiveBattle,

    #[error("A battle is already in progress")]
    AlreadyInProgress,

    #[error("Both players must pick a team first (usage: pick <id> [id] [id])")]
    TeamNotReady,

    #[error("Waiting for {0} to switch creatures")]
    AwaitingSwitch(String),

    #[error("{0} has fainted, switch to another creature")]
    CreatureFainted(String),

    #[error("You have no creature able to battle")]
    AllFainted,

    #[error("Invalid arguments (usage: {0})")]
    InvalidArguments(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("No creature {0} in the catalog")]
    UnknownCreature(String),

    #[error("Creature catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Roster unavailable: {0}")]
    RosterUnavailable(String),
}

/// Result type alias for Pokebattle operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Result type alias for game operations
pub type GameResult<T> = std::result::Result<T, GameError>;
