//! World module
//!
//! The game world is the single owner of all mutable game state:
//! - Session registry (joined players and their rosters)
//! - Invitation tracker
//! - Battle engine
//! - The shared random number generator
//!
//! It is not thread-safe on its own; the server keeps it behind one mutex
//! and every command runs to completion while holding it.

use std::net::SocketAddr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{GameError, GameResult};
use crate::game::battle::{
    AttackOutcome, Battle, BattleEnd, BattleEngine, BattleId, Conclusion, Participant,
    StartReport, SwitchReport,
};
use crate::game::catalog::{CatalogLoader, CreatureCatalog};
use crate::game::creature::{CreatureInstance, CreatureTemplate};
use crate::game::invitation::{Invitation, InvitationTracker};
use crate::game::persistence::RosterStore;
use crate::game::session::{validate_name, Session, SessionId, SessionRegistry};

/// Default starter creature
pub const DEFAULT_STARTER: &str = "#0001";

/// Default number of creatures drawn by `catch`
pub const DEFAULT_ROLL_COUNT: usize = 4;

/// World settings
#[derive(Debug, Clone)]
pub struct WorldSettings {
    /// Catalog id given to new players
    pub starter_creature_id: String,
    /// Creatures drawn per catch
    pub roll_count: usize,
    /// Fixed RNG seed, entropy when `None`
    pub rng_seed: Option<u64>,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            starter_creature_id: DEFAULT_STARTER.to_string(),
            roll_count: DEFAULT_ROLL_COUNT,
            rng_seed: None,
        }
    }
}

impl WorldSettings {
    /// Build settings from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            starter_creature_id: config.starter_creature_id.clone(),
            roll_count: config.roll_count,
            rng_seed: config.rng_seed,
        }
    }

    /// Set the starter creature
    pub fn with_starter(mut self, id: impl Into<String>) -> Self {
        self.starter_creature_id = id.into();
        self
    }

    /// Set the catch size
    pub fn with_roll_count(mut self, count: usize) -> Self {
        self.roll_count = count;
        self
    }

    /// Use a fixed RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinReport {
    pub session: SessionId,
    pub name: String,
    pub roster_size: usize,
    /// Starter given to a first-time player
    pub starter: Option<CreatureInstance>,
}

/// Result of a session leaving
#[derive(Debug, Clone)]
pub struct LeaveReport {
    pub name: String,
    pub address: SocketAddr,
    pub battle: Option<BattleEnd>,
    pub withdrawn: Vec<Invitation>,
}

/// One row of the player list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    pub name: String,
    pub creatures: usize,
    pub in_battle: bool,
}

/// Result of answering an invitation
#[derive(Debug, Clone)]
pub struct Response {
    pub invitation: Invitation,
    pub accepted: bool,
    pub battle_id: Option<BattleId>,
    /// Other invitations dropped because both parties are now paired
    pub superseded: Vec<Invitation>,
}

/// Result of picking a battle team
#[derive(Debug, Clone)]
pub struct PickReport {
    pub team: Vec<CreatureInstance>,
    /// Whether the session is currently paired
    pub paired: bool,
    /// Opponent to notify when this pick made the battle ready
    pub ready_opponent: Option<SessionId>,
}

/// Game world - owns sessions, invitations and battles
pub struct GameWorld {
    /// World settings
    pub settings: WorldSettings,
    catalog_loader: Arc<dyn CatalogLoader>,
    catalog: Option<Arc<CreatureCatalog>>,
    rosters: Arc<dyn RosterStore>,
    sessions: SessionRegistry,
    invitations: InvitationTracker,
    battles: BattleEngine,
    rng: StdRng,
}

impl GameWorld {
    /// Create a new world. The catalog is loaded lazily.
    pub fn new(
        settings: WorldSettings,
        catalog_loader: Arc<dyn CatalogLoader>,
        rosters: Arc<dyn RosterStore>,
    ) -> Self {
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            settings,
            catalog_loader,
            catalog: None,
            rosters,
            sessions: SessionRegistry::new(),
            invitations: InvitationTracker::new(),
            battles: BattleEngine::new(),
            rng,
        }
    }

    /// Load the catalog if it is not loaded yet.
    ///
    /// A failed load is reported as `CatalogUnavailable` and retried on the
    /// next call.
    pub fn ensure_catalog(&mut self) -> GameResult<Arc<CreatureCatalog>> {
        if let Some(catalog) = &self.catalog {
            return Ok(Arc::clone(catalog));
        }

        match CreatureCatalog::load(self.catalog_loader.as_ref()) {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                self.catalog = Some(Arc::clone(&catalog));
                Ok(catalog)
            }
            Err(e) => {
                warn!(error = %e, "Creature catalog unavailable");
                Err(GameError::CatalogUnavailable(e.to_string()))
            }
        }
    }

    /// Whether the catalog has been loaded
    pub fn catalog_loaded(&self) -> bool {
        self.catalog.is_some()
    }

    fn persist(&self, id: SessionId) {
        let Some(session) = self.sessions.get(id) else {
            return;
        };
        if let Err(e) = self.rosters.save(&session.name, &session.roster) {
            error!(
                session_id = id,
                name = %session.name,
                error = %e,
                "Failed to save roster"
            );
        }
    }

    // Session views

    /// Session bound to a transport address
    pub fn resolve(&self, address: &SocketAddr) -> Option<SessionId> {
        self.sessions.resolve(address)
    }

    /// Get a joined session
    pub fn session(&self, id: SessionId) -> GameResult<&Session> {
        self.sessions.require(id)
    }

    /// Transport address of a session
    pub fn address_of(&self, id: SessionId) -> Option<SocketAddr> {
        self.sessions.address_of(id)
    }

    /// Number of joined sessions
    pub fn session_count(&self) -> usize {
        self.sessions.count()
    }

    /// Number of live pairings
    pub fn battle_count(&self) -> usize {
        self.battles.count()
    }

    /// Pending invitations
    pub fn invitation_count(&self) -> usize {
        self.invitations.len()
    }

    /// Everyone except `id`, sorted by name
    pub fn players(&self, id: SessionId) -> Vec<PlayerSummary> {
        let mut players: Vec<PlayerSummary> = self
            .sessions
            .iter()
            .filter(|s| s.id != id)
            .map(|s| PlayerSummary {
                name: s.name.clone(),
                creatures: s.roster.len(),
                in_battle: self.battles.is_engaged(s.id),
            })
            .collect();
        players.sort_by_key(|p| p.name.to_lowercase());
        players
    }

    // Session registry operations

    /// Join under `name`, loading or seeding the roster
    pub fn join(&mut self, address: SocketAddr, name: &str) -> GameResult<JoinReport> {
        let name = validate_name(name)?;
        self.sessions.check_available(address, &name)?;

        let stored = self.rosters.load(&name).map_err(|e| {
            error!(name = %name, error = %e, "Failed to load roster");
            GameError::RosterUnavailable(e.to_string())
        })?;

        let (roster, starter) = match stored {
            Some(roster) if !roster.is_empty() => (roster, None),
            _ => {
                let catalog = self.ensure_catalog()?;
                let starter = catalog
                    .starter(&self.settings.starter_creature_id)
                    .instantiate(1);
                (vec![starter.clone()], Some(starter))
            }
        };

        let roster_size = roster.len();
        let id = self.sessions.register(address, &name, roster)?;
        if starter.is_some() {
            info!(session_id = id, name = %name, "New player seeded with starter");
            self.persist(id);
        }

        Ok(JoinReport {
            session: id,
            name,
            roster_size,
            starter,
        })
    }

    /// Leave the game, forfeiting any battle and dropping invitations
    pub fn leave(&mut self, id: SessionId) -> GameResult<LeaveReport> {
        self.sessions.require(id)?;

        let battle = self.battles.abandon(id);
        if let Some(BattleEnd::Concluded(conclusion)) = &battle {
            self.settle(conclusion);
        }
        let withdrawn = self.invitations.withdraw(id);

        self.persist(id);
        let session = self.sessions.remove(id).ok_or(GameError::NotJoined)?;

        Ok(LeaveReport {
            name: session.name,
            address: session.address,
            battle,
            withdrawn,
        })
    }

    /// Draw new creatures from the catalog into the roster
    pub fn catch(&mut self, id: SessionId) -> GameResult<Vec<CreatureInstance>> {
        self.sessions.require(id)?;
        let catalog = self.ensure_catalog()?;

        let caught = catalog.roll(&mut self.rng, self.settings.roll_count);
        let roster_size = self.sessions.append_creatures(id, caught.clone())?.len();
        self.persist(id);

        debug!(
            session_id = id,
            caught = caught.len(),
            roster_size,
            "Creatures caught"
        );

        Ok(caught)
    }

    /// Pick the battle team and commit it to a pending battle
    pub fn pick(&mut self, id: SessionId, ids: &[&str]) -> GameResult<PickReport> {
        self.sessions.require(id)?;
        self.battles.ensure_team_editable(id)?;

        let team = self.sessions.require_mut(id)?.select_team(ids)?.to_vec();
        let ready_opponent = self.battles.commit_team(id, team.clone())?;

        Ok(PickReport {
            team,
            paired: self.battles.is_engaged(id),
            ready_opponent,
        })
    }

    /// Catalog entry by id or name
    pub fn catalog_entry(&mut self, query: &str) -> GameResult<CreatureTemplate> {
        let catalog = self.ensure_catalog()?;
        catalog
            .lookup(query)
            .cloned()
            .ok_or_else(|| GameError::UnknownCreature(query.to_string()))
    }

    // Invitation operations

    /// Invite another player to battle
    pub fn invite(&mut self, id: SessionId, target_name: &str) -> GameResult<Invitation> {
        let sender_name = self.sessions.require(id)?.name.clone();
        let target_name = target_name.trim();

        if sender_name.eq_ignore_ascii_case(target_name) {
            return Err(GameError::SelfInvite);
        }
        let target = self
            .sessions
            .find_by_name(target_name)
            .ok_or_else(|| GameError::NoSuchPlayer(target_name.to_string()))?;
        let target_name = self.sessions.require(target)?.name.clone();

        if self.battles.is_engaged(id) {
            return Err(GameError::AlreadyInBattle);
        }
        if self.battles.is_engaged(target) {
            return Err(GameError::TargetBusy(target_name));
        }

        let invitation = Invitation::new(id, &sender_name, target, &target_name);
        self.invitations.invite(invitation.clone())?;

        info!(from = %sender_name, to = %target_name, "Battle invitation sent");
        Ok(invitation)
    }

    /// Accept or decline the invitation addressed to `id`
    pub fn respond(&mut self, id: SessionId, accept: bool) -> GameResult<Response> {
        self.sessions.require(id)?;
        let invitation = self.invitations.respond(id)?;

        if !accept {
            info!(
                from = %invitation.initiator_name,
                to = %invitation.recipient_name,
                "Battle invitation declined"
            );
            return Ok(Response {
                invitation,
                accepted: false,
                battle_id: None,
                superseded: Vec::new(),
            });
        }

        let mut superseded = self.invitations.withdraw(invitation.initiator);
        superseded.extend(self.invitations.withdraw(id));

        let first = self.participant(invitation.initiator, &invitation.initiator_name)?;
        let second = self.participant(id, &invitation.recipient_name)?;
        let battle_id = self.battles.pair(first, second)?;

        Ok(Response {
            invitation,
            accepted: true,
            battle_id: Some(battle_id),
            superseded,
        })
    }

    fn participant(&self, id: SessionId, name: &str) -> GameResult<Participant> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| GameError::NoSuchPlayer(name.to_string()))?;
        Ok(Participant::new(id, &session.name, session.team().to_vec()))
    }

    // Battle operations

    /// Battle the session takes part in
    pub fn battle(&self, id: SessionId) -> GameResult<&Battle> {
        self.sessions.require(id)?;
        self.battles.battle_of(id).ok_or(GameError::NoActiveBattle)
    }

    /// Start the session's battle
    pub fn start(&mut self, id: SessionId) -> GameResult<StartReport> {
        self.sessions.require(id)?;
        self.battles.start(id)
    }

    /// Attack with the active creature
    pub fn attack(&mut self, id: SessionId) -> GameResult<AttackOutcome> {
        self.sessions.require(id)?;
        let outcome = self.battles.attack(id, &mut self.rng)?;
        if let AttackOutcome::Concluded(_, conclusion) = &outcome {
            self.settle(conclusion);
        }
        Ok(outcome)
    }

    /// Switch the active creature
    pub fn switch(&mut self, id: SessionId, creature_id: &str) -> GameResult<SwitchReport> {
        self.sessions.require(id)?;
        self.battles.switch(id, creature_id)
    }

    /// Give up the current battle
    pub fn surrender(&mut self, id: SessionId) -> GameResult<BattleEnd> {
        self.sessions.require(id)?;
        let end = self.battles.surrender(id)?;
        if let BattleEnd::Concluded(conclusion) = &end {
            self.settle(conclusion);
        }
        Ok(end)
    }

    /// Write the winner's progress back into its roster
    fn settle(&mut self, conclusion: &Conclusion) {
        let Some(session) = self.sessions.get_mut(conclusion.winner) else {
            return;
        };
        if session.reconcile(&conclusion.winner_team) {
            self.persist(conclusion.winner);
        }
    }
}
