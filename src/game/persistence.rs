//! Roster persistence module
//!
//! Handles saving and loading player rosters.
//! This includes:
//! - The `RosterStore` collaborator trait
//! - A JSON file store (one file per player)
//! - An in-memory store for tests and ephemeral servers

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{PersistenceError, Result};
use crate::game::creature::{CreatureInstance, CreatureTemplate};

/// Durable per-player storage of owned creatures
pub trait RosterStore: Send + Sync {
    /// Load a player's roster, `None` if the player has never saved one
    fn load(&self, player: &str) -> Result<Option<Vec<CreatureInstance>>>;

    /// Replace a player's stored roster
    fn save(&self, player: &str, roster: &[CreatureInstance]) -> Result<()>;
}

/// Normalize a player name into a storage key
pub fn roster_key(player: &str) -> String {
    player.trim().to_lowercase()
}

/// On-disk roster document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterFile {
    /// Player display name
    pub player: String,
    /// Last save timestamp
    pub saved_at: DateTime<Utc>,
    /// Owned creatures, in roster order
    pub creatures: Vec<CreatureInstance>,
}

/// Roster store writing one JSON file per player
#[derive(Debug, Clone)]
pub struct JsonRosterStore {
    dir: PathBuf,
}

impl JsonRosterStore {
    /// Create a store rooted at `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding roster files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a player
    pub fn path_for(&self, player: &str) -> PathBuf {
        self.dir.join(format!("{}.json", roster_key(player)))
    }

    /// Parse a roster document, accepting the legacy bare-array layout
    fn parse(player: &str, content: &str) -> Result<Vec<CreatureInstance>> {
        if let Ok(file) = serde_json::from_str::<RosterFile>(content) {
            return Ok(file.creatures);
        }

        // Legacy rosters are a plain array of catalog entries
        let legacy: Vec<CreatureTemplate> =
            serde_json::from_str(content).map_err(|e| PersistenceError::Load {
                player: player.to_string(),
                reason: e.to_string(),
            })?;

        info!(
            player = %player,
            creatures = legacy.len(),
            "Migrating legacy roster"
        );

        Ok(legacy
            .into_iter()
            .map(|template| {
                let level = template.level;
                template.instantiate(level)
            })
            .collect())
    }
}

impl RosterStore for JsonRosterStore {
    fn load(&self, player: &str) -> Result<Option<Vec<CreatureInstance>>> {
        let path = self.path_for(player);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| PersistenceError::Load {
            player: player.to_string(),
            reason: e.to_string(),
        })?;

        let roster = Self::parse(player, &content)?;

        debug!(
            player = %player,
            creatures = roster.len(),
            "Loaded roster"
        );

        Ok(Some(roster))
    }

    fn save(&self, player: &str, roster: &[CreatureInstance]) -> Result<()> {
        let save_error = |reason: String| PersistenceError::Save {
            player: player.to_string(),
            reason,
        };

        fs::create_dir_all(&self.dir).map_err(|e| save_error(e.to_string()))?;

        let document = RosterFile {
            player: player.to_string(),
            saved_at: Utc::now(),
            creatures: roster.to_vec(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        // Write to a temp file, then rename over the old roster
        let path = self.path_for(player);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| save_error(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| {
            error!(player = %player, error = %e, "Failed to replace roster file");
            save_error(e.to_string())
        })?;

        debug!(
            player = %player,
            path = %path.display(),
            creatures = roster.len(),
            "Saved roster"
        );

        Ok(())
    }
}

/// Roster store kept in memory
#[derive(Debug, Default)]
pub struct MemoryRosterStore {
    rosters: RwLock<HashMap<String, Vec<CreatureInstance>>>,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rosters
    pub fn len(&self) -> usize {
        self.rosters.read().len()
    }

    /// Check if no roster has been stored
    pub fn is_empty(&self) -> bool {
        self.rosters.read().is_empty()
    }
}

impl RosterStore for MemoryRosterStore {
    fn load(&self, player: &str) -> Result<Option<Vec<CreatureInstance>>> {
        Ok(self.rosters.read().get(&roster_key(player)).cloned())
    }

    fn save(&self, player: &str, roster: &[CreatureInstance]) -> Result<()> {
        self.rosters
            .write()
            .insert(roster_key(player), roster.to_vec());
        Ok(())
    }
}
