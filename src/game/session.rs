//! Session registry module
//!
//! Tracks joined players:
//! - Session identifiers issued at join time
//! - Address and (case-insensitive) name indices
//! - Per-session roster, active creature and battle-team selection

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{GameError, GameResult};
use crate::game::creature::CreatureInstance;

/// Unique session identifier
pub type SessionId = u64;

/// Longest accepted player name
pub const MAX_NAME_LENGTH: usize = 16;

/// Largest battle team
pub const MAX_TEAM_SIZE: usize = 3;

/// Check a requested name and return it trimmed.
///
/// Names double as roster file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_name(name: &str) -> GameResult<String> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(name.to_string())
    } else {
        Err(GameError::InvalidArguments(format!(
            "join <name>, 1-{} letters, digits, '_' or '-'",
            MAX_NAME_LENGTH
        )))
    }
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// A joined player
#[derive(Debug, Clone)]
pub struct Session {
    /// Issued session identifier
    pub id: SessionId,
    /// Transport address replies are sent to
    pub address: SocketAddr,
    /// Display name
    pub name: String,
    /// Every creature the player owns
    pub roster: Vec<CreatureInstance>,
    /// Roster index of the active creature
    active: usize,
    /// Copies of the creatures picked for battle
    team: Vec<CreatureInstance>,
    /// Time the session joined
    pub joined_at: Instant,
}

impl Session {
    /// Create a new session
    pub fn new(
        id: SessionId,
        address: SocketAddr,
        name: String,
        roster: Vec<CreatureInstance>,
    ) -> Self {
        Self {
            id,
            address,
            name,
            roster,
            active: 0,
            team: Vec::new(),
            joined_at: Instant::now(),
        }
    }

    /// The currently active roster creature
    pub fn active_creature(&self) -> Option<&CreatureInstance> {
        self.roster.get(self.active)
    }

    /// The selected battle team
    pub fn team(&self) -> &[CreatureInstance] {
        &self.team
    }

    /// Whether a battle team has been picked
    pub fn has_team(&self) -> bool {
        !self.team.is_empty()
    }

    /// Pick the battle team by catalog ids, in the given order.
    ///
    /// Each id consumes a distinct roster instance, so picking the same id
    /// twice requires owning two of that creature.
    pub fn select_team(&mut self, ids: &[&str]) -> GameResult<&[CreatureInstance]> {
        if ids.is_empty() || ids.len() > MAX_TEAM_SIZE {
            return Err(GameError::InvalidArguments(
                "pick <id> [id] [id]".to_string(),
            ));
        }

        let mut used: Vec<usize> = Vec::with_capacity(ids.len());
        for id in ids {
            let index = self
                .roster
                .iter()
                .enumerate()
                .position(|(i, c)| c.id().eq_ignore_ascii_case(id) && !used.contains(&i))
                .ok_or_else(|| GameError::NotOwned(id.to_string()))?;
            used.push(index);
        }

        self.team = used
            .into_iter()
            .map(|index| {
                let mut creature = self.roster[index].clone();
                creature.heal();
                creature
            })
            .collect();

        if let Some(lead) = self.team.first() {
            let lead_uid = lead.uid;
            if let Some(index) = self.roster.iter().position(|c| c.uid == lead_uid) {
                self.active = index;
            }
        }

        debug!(
            session_id = self.id,
            team = ?self.team.iter().map(|c| c.name()).collect::<Vec<_>>(),
            "Battle team selected"
        );

        Ok(&self.team)
    }

    /// Write battle progress back into the roster.
    ///
    /// Level and experience are copied onto the roster entries with the same
    /// uid; HP is not. Team copies are refreshed from the roster at full HP.
    pub fn reconcile(&mut self, fought: &[CreatureInstance]) -> bool {
        let mut changed = false;
        for creature in fought {
            if let Some(entry) = self.roster.iter_mut().find(|c| c.uid == creature.uid) {
                if entry.level != creature.level || entry.experience != creature.experience {
                    entry.level = creature.level;
                    entry.experience = creature.experience;
                    changed = true;
                }
            }
        }

        for slot in self.team.iter_mut() {
            if let Some(entry) = self.roster.iter().find(|c| c.uid == slot.uid) {
                *slot = entry.clone();
                slot.heal();
            }
        }

        changed
    }
}

/// Registry of joined sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Session id to session
    sessions: HashMap<SessionId, Session>,
    /// Transport address to session id
    by_address: HashMap<SocketAddr, SessionId>,
    /// Lowercase name to session id
    by_name: HashMap<String, SessionId>,
    /// Last issued session id
    last_id: SessionId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `address` may join under `name`
    pub fn check_available(&self, address: SocketAddr, name: &str) -> GameResult<()> {
        if self.by_address.contains_key(&address) {
            return Err(GameError::AlreadyJoined);
        }
        if self.by_name.contains_key(&name_key(name)) {
            return Err(GameError::NameTaken(name.to_string()));
        }
        Ok(())
    }

    /// Register a new session with an already loaded roster
    pub fn register(
        &mut self,
        address: SocketAddr,
        name: &str,
        roster: Vec<CreatureInstance>,
    ) -> GameResult<SessionId> {
        self.check_available(address, name)?;

        self.last_id += 1;
        let id = self.last_id;

        self.sessions
            .insert(id, Session::new(id, address, name.to_string(), roster));
        self.by_address.insert(address, id);
        self.by_name.insert(name_key(name), id);

        info!(
            session_id = id,
            address = %address,
            name = %name,
            "Session created"
        );

        Ok(id)
    }

    /// Remove a session
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.by_address.remove(&session.address);
        self.by_name.remove(&name_key(&session.name));

        info!(
            session_id = id,
            name = %session.name,
            "Session removed"
        );

        Some(session)
    }

    /// Get a session by id
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Get a mutable session by id
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Get a session, failing with `NotJoined`
    pub fn require(&self, id: SessionId) -> GameResult<&Session> {
        self.get(id).ok_or(GameError::NotJoined)
    }

    /// Get a mutable session, failing with `NotJoined`
    pub fn require_mut(&mut self, id: SessionId) -> GameResult<&mut Session> {
        self.get_mut(id).ok_or(GameError::NotJoined)
    }

    /// Resolve a transport address to its session
    pub fn resolve(&self, address: &SocketAddr) -> Option<SessionId> {
        self.by_address.get(address).copied()
    }

    /// Find a session by name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<SessionId> {
        self.by_name.get(&name_key(name)).copied()
    }

    /// Address of a session
    pub fn address_of(&self, id: SessionId) -> Option<SocketAddr> {
        self.get(id).map(|s| s.address)
    }

    /// Name of a session
    pub fn name_of(&self, id: SessionId) -> Option<&str> {
        self.get(id).map(|s| s.name.as_str())
    }

    /// Append creatures to a roster, returning the full roster
    pub fn append_creatures(
        &mut self,
        id: SessionId,
        creatures: Vec<CreatureInstance>,
    ) -> GameResult<&[CreatureInstance]> {
        let session = self.require_mut(id)?;
        session.roster.extend(creatures);
        Ok(&session.roster)
    }

    /// Iterate over all sessions
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Number of joined sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
