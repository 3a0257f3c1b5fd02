//! Game module
//!
//! This module contains the core game logic for the Pokebattle server:
//! - Creature data model and the read-only catalog
//! - Roster persistence
//! - Combat rules (damage, experience, levels)
//! - Sessions, invitations and the battle state machine
//! - The world that owns all of the above

pub mod battle;
pub mod catalog;
pub mod combat;
pub mod creature;
pub mod invitation;
pub mod persistence;
pub mod session;
pub mod world;

pub use battle::{BattleEngine, BattleState};
pub use catalog::{CatalogLoader, CreatureCatalog, JsonCatalogLoader, StaticCatalogLoader};
pub use creature::{CreatureInstance, CreatureTemplate, ElementType};
pub use persistence::{JsonRosterStore, MemoryRosterStore, RosterStore};
pub use session::SessionId;
pub use world::{GameWorld, WorldSettings};
