//! Battle engine
//!
//! Owns every pairing between two sessions, from the accepted invitation to
//! the conclusion:
//! - Team commitment and start (first turn by lead speed)
//! - Turn-checked attacks and switches
//! - Faint handling and forced switches
//! - Surrender, abandonment and experience distribution
//!
//! State machine per battle:
//!
//! ```text
//! AwaitingTeams -> AwaitingStart -> Active <-> AwaitingSwitch(side)
//!                                      \-> concluded (removed)
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::error::{GameError, GameResult};
use crate::game::combat::{self, AttackKind, DamageRoll, ExperienceReport};
use crate::game::creature::CreatureInstance;
use crate::game::session::SessionId;

/// Unique battle identifier
pub type BattleId = u64;

/// Unordered pair of participant names, lowercased
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (a, b) = (a.to_lowercase(), b.to_lowercase());
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// One of the two participants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::First => 0,
            Side::Second => 1,
        }
    }
}

/// Battle lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleState {
    /// Paired, at least one team missing
    AwaitingTeams,
    /// Both teams committed
    AwaitingStart,
    /// Turns are being taken
    Active,
    /// The given side must replace a fainted creature
    AwaitingSwitch(Side),
}

impl BattleState {
    /// Whether turns have started
    pub fn is_started(&self) -> bool {
        matches!(self, BattleState::Active | BattleState::AwaitingSwitch(_))
    }

    /// Get a human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            BattleState::AwaitingTeams => "waiting for teams",
            BattleState::AwaitingStart => "waiting for start",
            BattleState::Active => "in progress",
            BattleState::AwaitingSwitch(_) => "waiting for a switch",
        }
    }
}

/// A session taking part in a battle
#[derive(Debug, Clone)]
pub struct Participant {
    pub session: SessionId,
    pub name: String,
    /// Battle copies of the picked creatures
    pub team: Vec<CreatureInstance>,
    /// Index of the active creature in `team`
    pub active: usize,
}

impl Participant {
    pub fn new(session: SessionId, name: &str, team: Vec<CreatureInstance>) -> Self {
        Self {
            session,
            name: name.to_string(),
            team,
            active: 0,
        }
    }

    pub fn active_creature(&self) -> Option<&CreatureInstance> {
        self.team.get(self.active)
    }

    fn active_creature_mut(&mut self) -> Option<&mut CreatureInstance> {
        self.team.get_mut(self.active)
    }

    /// Whether any creature other than the active one can still fight
    pub fn has_reserve(&self) -> bool {
        self.team
            .iter()
            .enumerate()
            .any(|(i, c)| i != self.active && !c.is_fainted())
    }

    fn active_name(&self) -> String {
        self.active_creature()
            .map(|c| c.name().to_string())
            .unwrap_or_default()
    }
}

/// Why a battle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConclusionReason {
    /// The loser's whole team fainted
    Defeat,
    /// The loser surrendered
    Surrender,
    /// The loser left the game
    Abandon,
}

/// Result of a finished battle
#[derive(Debug, Clone)]
pub struct Conclusion {
    pub battle_id: BattleId,
    pub reason: ConclusionReason,
    pub winner: SessionId,
    pub winner_name: String,
    pub loser: SessionId,
    pub loser_name: String,
    /// Winner's battle team after experience was applied
    pub winner_team: Vec<CreatureInstance>,
    pub experience: ExperienceReport,
}

/// How a battle left the engine
#[derive(Debug, Clone)]
pub enum BattleEnd {
    /// Started battle decided
    Concluded(Conclusion),
    /// Pairing dropped before the start, no experience awarded
    Cancelled {
        battle_id: BattleId,
        other: SessionId,
        other_name: String,
    },
}

/// First turn assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub battle_id: BattleId,
    pub first: SessionId,
    pub first_name: String,
    pub opponent: SessionId,
    pub leads: (String, String),
}

/// One resolved attack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackReport {
    pub attacker: SessionId,
    pub attacker_name: String,
    pub attacker_creature: String,
    pub defender: SessionId,
    pub defender_name: String,
    pub defender_creature: String,
    pub kind: AttackKind,
    pub damage: u32,
    pub remaining_hp: u32,
    pub max_hp: u32,
}

/// What happened after an attack
#[derive(Debug, Clone)]
pub enum AttackOutcome {
    /// Turn passed to the defender
    Continue(AttackReport),
    /// Defender's creature fainted, defender must switch
    Fainted(AttackReport),
    /// Defender has nothing left, attacker wins
    Concluded(AttackReport, Conclusion),
}

impl AttackOutcome {
    pub fn report(&self) -> &AttackReport {
        match self {
            AttackOutcome::Continue(report)
            | AttackOutcome::Fainted(report)
            | AttackOutcome::Concluded(report, _) => report,
        }
    }
}

/// A completed switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    pub session: SessionId,
    pub name: String,
    pub creature: String,
    pub next_turn: SessionId,
    /// Whether the switch replaced a fainted creature
    pub forced: bool,
}

/// A pairing between two sessions
#[derive(Debug, Clone)]
pub struct Battle {
    pub id: BattleId,
    pub key: PairKey,
    participants: [Participant; 2],
    turn: Side,
    state: BattleState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Battle {
    fn new(id: BattleId, first: Participant, second: Participant) -> Self {
        let key = PairKey::new(&first.name, &second.name);
        let mut battle = Self {
            id,
            key,
            participants: [first, second],
            turn: Side::First,
            state: BattleState::AwaitingTeams,
            created_at: Utc::now(),
            started_at: None,
        };
        battle.refresh_readiness();
        battle
    }

    pub fn state(&self) -> BattleState {
        self.state
    }

    /// Side holding the turn marker (meaningful once started)
    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn participant(&self, side: Side) -> &Participant {
        &self.participants[side.index()]
    }

    fn participant_mut(&mut self, side: Side) -> &mut Participant {
        &mut self.participants[side.index()]
    }

    /// Side played by `session`
    pub fn side_of(&self, session: SessionId) -> Option<Side> {
        if self.participants[0].session == session {
            Some(Side::First)
        } else if self.participants[1].session == session {
            Some(Side::Second)
        } else {
            None
        }
    }

    fn refresh_readiness(&mut self) {
        if self.state.is_started() {
            return;
        }
        self.state = if self.participants.iter().all(|p| !p.team.is_empty()) {
            BattleState::AwaitingStart
        } else {
            BattleState::AwaitingTeams
        };
    }
}

/// Every live pairing
#[derive(Debug, Default)]
pub struct BattleEngine {
    battles: HashMap<BattleId, Battle>,
    by_session: HashMap<SessionId, BattleId>,
    by_key: HashMap<PairKey, BattleId>,
    last_id: BattleId,
}

impl BattleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live pairings
    pub fn count(&self) -> usize {
        self.battles.len()
    }

    /// Battle `session` takes part in
    pub fn battle_of(&self, session: SessionId) -> Option<&Battle> {
        self.by_session
            .get(&session)
            .and_then(|id| self.battles.get(id))
    }

    /// Whether `session` is paired
    pub fn is_engaged(&self, session: SessionId) -> bool {
        self.by_session.contains_key(&session)
    }

    /// Fails with `AlreadyInProgress` once the session's battle has started
    pub fn ensure_team_editable(&self, session: SessionId) -> GameResult<()> {
        match self.battle_of(session) {
            Some(battle) if battle.state.is_started() => Err(GameError::AlreadyInProgress),
            _ => Ok(()),
        }
    }

    fn locate(&self, session: SessionId) -> GameResult<(BattleId, Side)> {
        let id = *self
            .by_session
            .get(&session)
            .ok_or(GameError::NoActiveBattle)?;
        let side = self
            .battles
            .get(&id)
            .and_then(|b| b.side_of(session))
            .ok_or(GameError::NoActiveBattle)?;
        Ok((id, side))
    }

    fn battle_mut(&mut self, id: BattleId) -> GameResult<&mut Battle> {
        self.battles.get_mut(&id).ok_or(GameError::NoActiveBattle)
    }

    /// Register a new pairing
    pub fn pair(&mut self, first: Participant, second: Participant) -> GameResult<BattleId> {
        if self.by_key.contains_key(&PairKey::new(&first.name, &second.name)) {
            return Err(GameError::AlreadyInProgress);
        }
        for participant in [&first, &second] {
            if self.is_engaged(participant.session) {
                return Err(GameError::TargetBusy(participant.name.clone()));
            }
        }

        self.last_id += 1;
        let id = self.last_id;
        let battle = Battle::new(id, first, second);

        info!(
            battle_id = id,
            key = %battle.key,
            state = battle.state.name(),
            "Battle paired"
        );

        for participant in &battle.participants {
            self.by_session.insert(participant.session, id);
        }
        self.by_key.insert(battle.key.clone(), id);
        self.battles.insert(id, battle);
        Ok(id)
    }

    /// Store a freshly picked team.
    ///
    /// Returns the opponent's session when this commit made the battle ready
    /// to start. A session that is not paired is left alone.
    pub fn commit_team(
        &mut self,
        session: SessionId,
        team: Vec<CreatureInstance>,
    ) -> GameResult<Option<SessionId>> {
        let Ok((id, side)) = self.locate(session) else {
            return Ok(None);
        };
        let battle = self.battle_mut(id)?;
        if battle.state.is_started() {
            return Err(GameError::AlreadyInProgress);
        }

        let participant = battle.participant_mut(side);
        participant.team = team;
        participant.active = 0;

        let was_ready = battle.state == BattleState::AwaitingStart;
        battle.refresh_readiness();

        debug!(
            battle_id = id,
            session_id = session,
            state = battle.state.name(),
            "Team committed"
        );

        if battle.state == BattleState::AwaitingStart && !was_ready {
            Ok(Some(battle.participant(side.opponent()).session))
        } else {
            Ok(None)
        }
    }

    /// Begin turns. The faster lead moves first; the issuer wins ties.
    pub fn start(&mut self, session: SessionId) -> GameResult<StartReport> {
        let (id, issuer) = self.locate(session)?;
        let battle = self.battle_mut(id)?;

        match battle.state {
            BattleState::AwaitingTeams => return Err(GameError::TeamNotReady),
            BattleState::Active | BattleState::AwaitingSwitch(_) => {
                return Err(GameError::AlreadyInProgress)
            }
            BattleState::AwaitingStart => {}
        }

        let speed = |side: Side| {
            battle
                .participant(side)
                .active_creature()
                .map(|c| c.stats().speed)
                .unwrap_or(0)
        };
        let first = if speed(issuer.opponent()) > speed(issuer) {
            issuer.opponent()
        } else {
            issuer
        };

        battle.turn = first;
        battle.state = BattleState::Active;
        battle.started_at = Some(Utc::now());

        let report = StartReport {
            battle_id: id,
            first: battle.participant(first).session,
            first_name: battle.participant(first).name.clone(),
            opponent: battle.participant(first.opponent()).session,
            leads: (
                battle.participant(Side::First).active_name(),
                battle.participant(Side::Second).active_name(),
            ),
        };

        info!(
            battle_id = id,
            key = %battle.key,
            first = %report.first_name,
            "Battle started"
        );

        Ok(report)
    }

    /// Resolve an attack from the turn holder
    pub fn attack<R: Rng + ?Sized>(
        &mut self,
        session: SessionId,
        rng: &mut R,
    ) -> GameResult<AttackOutcome> {
        let (id, side) = self.locate(session)?;
        let battle = self.battle_mut(id)?;

        match battle.state {
            BattleState::AwaitingTeams | BattleState::AwaitingStart => {
                return Err(GameError::NoActiveBattle)
            }
            BattleState::AwaitingSwitch(waiting) if waiting == side => {
                return Err(GameError::CreatureFainted(
                    battle.participant(side).active_name(),
                ))
            }
            BattleState::AwaitingSwitch(waiting) => {
                return Err(GameError::AwaitingSwitch(
                    battle.participant(waiting).name.clone(),
                ))
            }
            BattleState::Active => {}
        }
        if battle.turn != side {
            return Err(GameError::NotYourTurn);
        }

        let defending = side.opponent();
        let attacker = battle
            .participant(side)
            .active_creature()
            .cloned()
            .ok_or(GameError::AllFainted)?;
        if attacker.is_fainted() {
            return Err(GameError::CreatureFainted(attacker.name().to_string()));
        }

        let defender = battle
            .participant_mut(defending)
            .active_creature_mut()
            .ok_or(GameError::NoActiveBattle)?;
        if defender.is_fainted() {
            return Err(GameError::AwaitingSwitch(defender.name().to_string()));
        }

        let (kind, damage) = DamageRoll::compute(&attacker, defender).choose(rng);
        let remaining_hp = defender.apply_damage(damage);

        let report = AttackReport {
            attacker: session,
            attacker_name: battle.participant(side).name.clone(),
            attacker_creature: attacker.name().to_string(),
            defender: battle.participant(defending).session,
            defender_name: battle.participant(defending).name.clone(),
            defender_creature: battle.participant(defending).active_name(),
            kind,
            damage,
            remaining_hp,
            max_hp: battle
                .participant(defending)
                .active_creature()
                .map(|c| c.max_hp())
                .unwrap_or(0),
        };

        debug!(
            battle_id = id,
            attacker = %report.attacker_creature,
            defender = %report.defender_creature,
            kind = kind.name(),
            damage,
            remaining_hp,
            "Attack resolved"
        );

        if remaining_hp > 0 {
            battle.turn = defending;
            return Ok(AttackOutcome::Continue(report));
        }

        if battle.participant(defending).has_reserve() {
            battle.state = BattleState::AwaitingSwitch(defending);
            info!(
                battle_id = id,
                fainted = %report.defender_creature,
                "Creature fainted, awaiting switch"
            );
            return Ok(AttackOutcome::Fainted(report));
        }

        let conclusion = self.conclude(id, side, ConclusionReason::Defeat)?;
        Ok(AttackOutcome::Concluded(report, conclusion))
    }

    /// Replace the active creature with the team member `creature_id`
    pub fn switch(&mut self, session: SessionId, creature_id: &str) -> GameResult<SwitchReport> {
        let (id, side) = self.locate(session)?;
        let battle = self.battle_mut(id)?;

        let forced = match battle.state {
            BattleState::AwaitingTeams | BattleState::AwaitingStart => {
                return Err(GameError::NoActiveBattle)
            }
            BattleState::AwaitingSwitch(waiting) if waiting != side => {
                return Err(GameError::NotYourTurn)
            }
            BattleState::AwaitingSwitch(_) => true,
            BattleState::Active if battle.turn != side => return Err(GameError::NotYourTurn),
            BattleState::Active => false,
        };

        let participant = battle.participant_mut(side);
        let candidates: Vec<usize> = participant
            .team
            .iter()
            .enumerate()
            .filter(|(_, c)| c.id().eq_ignore_ascii_case(creature_id))
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() {
            return Err(GameError::NotOwned(creature_id.to_string()));
        }
        let index = candidates
            .iter()
            .copied()
            .find(|&i| i != participant.active && !participant.team[i].is_fainted());

        let index = match index {
            Some(index) => index,
            None if candidates.iter().all(|&i| {
                i == participant.active && !participant.team[i].is_fainted()
            }) =>
            {
                return Err(GameError::InvalidArguments(format!(
                    "switch <id>, {} is already active",
                    participant.active_name()
                )))
            }
            None => {
                return Err(GameError::CreatureFainted(
                    participant.team[candidates[0]].name().to_string(),
                ))
            }
        };

        participant.active = index;
        let report = SwitchReport {
            session,
            name: participant.name.clone(),
            creature: participant.active_name(),
            next_turn: battle.participant(side.opponent()).session,
            forced,
        };

        battle.state = BattleState::Active;
        battle.turn = side.opponent();

        debug!(
            battle_id = id,
            session_id = session,
            creature = %report.creature,
            forced,
            "Creature switched"
        );

        Ok(report)
    }

    /// The issuer loses a started battle, or cancels a pairing not yet started
    pub fn surrender(&mut self, session: SessionId) -> GameResult<BattleEnd> {
        self.forfeit(session, ConclusionReason::Surrender)
    }

    /// Surrender on behalf of a session that is leaving, if it is paired
    pub fn abandon(&mut self, session: SessionId) -> Option<BattleEnd> {
        self.forfeit(session, ConclusionReason::Abandon).ok()
    }

    fn forfeit(&mut self, session: SessionId, reason: ConclusionReason) -> GameResult<BattleEnd> {
        let (id, side) = self.locate(session)?;
        let battle = self.battles.get(&id).ok_or(GameError::NoActiveBattle)?;

        if battle.state.is_started() {
            return Ok(BattleEnd::Concluded(self.conclude(id, side.opponent(), reason)?));
        }

        let other = battle.participant(side.opponent());
        let (other, other_name) = (other.session, other.name.clone());
        self.remove(id);

        info!(battle_id = id, session_id = session, "Pairing cancelled before start");

        Ok(BattleEnd::Cancelled {
            battle_id: id,
            other,
            other_name,
        })
    }

    fn remove(&mut self, id: BattleId) -> Option<Battle> {
        let battle = self.battles.remove(&id)?;
        for participant in &battle.participants {
            self.by_session.remove(&participant.session);
        }
        self.by_key.remove(&battle.key);
        Some(battle)
    }

    fn conclude(
        &mut self,
        id: BattleId,
        winner: Side,
        reason: ConclusionReason,
    ) -> GameResult<Conclusion> {
        let mut battle = self.remove(id).ok_or(GameError::NoActiveBattle)?;
        let loser = battle.participant(winner.opponent()).clone();
        let winner = battle.participant_mut(winner);

        let experience = combat::distribute_experience(&mut winner.team, &loser.team);

        info!(
            battle_id = id,
            winner = %winner.name,
            loser = %loser.name,
            reason = ?reason,
            experience = experience.per_creature,
            "Battle concluded"
        );

        Ok(Conclusion {
            battle_id: id,
            reason,
            winner: winner.session,
            winner_name: winner.name.clone(),
            loser: loser.session,
            loser_name: loser.name,
            winner_team: winner.team.clone(),
            experience,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::creature::{BaseStats, CreatureTemplate};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Physical and special damage are equal, so the roll does not matter
    fn creature(id: &str, hp: u32, power: u32, speed: u32) -> CreatureInstance {
        CreatureTemplate::new(id, &format!("Mon{}", id))
            .stats(BaseStats {
                hp,
                attack: power,
                defense: 0,
                special_attack: power,
                special_defense: 0,
                speed,
            })
            .experience(10)
            .instantiate(1)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    /// Ash (1) vs Misty (2), both teams committed
    fn ready_engine(ash: Vec<CreatureInstance>, misty: Vec<CreatureInstance>) -> BattleEngine {
        let mut engine = BattleEngine::new();
        engine
            .pair(
                Participant::new(1, "Ash", ash),
                Participant::new(2, "Misty", misty),
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_pair_key_is_unordered() {
        assert_eq!(PairKey::new("Ash", "misty"), PairKey::new("MISTY", "ash"));
        assert_eq!(PairKey::new("b", "a").to_string(), "a:b");
    }

    #[test]
    fn test_pair_conflicts() {
        let mut engine = BattleEngine::new();
        engine
            .pair(Participant::new(1, "Ash", vec![]), Participant::new(2, "Misty", vec![]))
            .unwrap();

        assert_eq!(
            engine
                .pair(Participant::new(3, "misty", vec![]), Participant::new(4, "ASH", vec![]))
                .unwrap_err(),
            GameError::AlreadyInProgress
        );
        assert_eq!(
            engine
                .pair(Participant::new(2, "Misty", vec![]), Participant::new(3, "Brock", vec![]))
                .unwrap_err(),
            GameError::TargetBusy("Misty".to_string())
        );
        assert_eq!(engine.count(), 1);
    }

    #[test]
    fn test_commit_team_transitions_to_awaiting_start() {
        let mut engine = BattleEngine::new();
        engine
            .pair(Participant::new(1, "Ash", vec![]), Participant::new(2, "Misty", vec![]))
            .unwrap();

        assert_eq!(engine.start(1).unwrap_err(), GameError::TeamNotReady);
        assert_eq!(engine.commit_team(1, vec![creature("#1", 10, 5, 5)]).unwrap(), None);
        assert_eq!(engine.battle_of(1).unwrap().state(), BattleState::AwaitingTeams);
        assert_eq!(engine.commit_team(2, vec![creature("#2", 10, 5, 5)]).unwrap(), Some(1));
        assert_eq!(engine.battle_of(2).unwrap().state(), BattleState::AwaitingStart);

        // Unpaired sessions are ignored
        assert_eq!(engine.commit_team(9, vec![]).unwrap(), None);
    }

    #[test]
    fn test_start_faster_lead_goes_first() {
        let mut engine = ready_engine(vec![creature("#1", 10, 5, 10)], vec![creature("#2", 10, 5, 20)]);
        let report = engine.start(1).unwrap();
        assert_eq!(report.first, 2);
        assert_eq!(report.first_name, "Misty");
    }

    #[test]
    fn test_start_tie_goes_to_issuer() {
        let mut engine = ready_engine(vec![creature("#1", 10, 5, 15)], vec![creature("#2", 10, 5, 15)]);
        assert_eq!(engine.start(2).unwrap().first, 2);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let mut engine = ready_engine(vec![creature("#1", 10, 5, 5)], vec![creature("#2", 10, 5, 5)]);
        engine.start(1).unwrap();
        assert_eq!(engine.start(2).unwrap_err(), GameError::AlreadyInProgress);
        assert_eq!(engine.start(1).unwrap_err(), GameError::AlreadyInProgress);
        assert_eq!(engine.count(), 1);
    }

    #[test]
    fn test_attack_requires_started_battle() {
        let mut engine = ready_engine(vec![creature("#1", 10, 5, 5)], vec![creature("#2", 10, 5, 5)]);
        assert_eq!(engine.attack(1, &mut rng()).unwrap_err(), GameError::NoActiveBattle);
        assert_eq!(engine.attack(7, &mut rng()).unwrap_err(), GameError::NoActiveBattle);
    }

    #[test]
    fn test_turns_alternate() {
        let mut engine = ready_engine(vec![creature("#1", 100, 5, 20)], vec![creature("#2", 100, 5, 10)]);
        engine.start(1).unwrap();
        let mut rng = rng();

        assert_eq!(engine.attack(2, &mut rng).unwrap_err(), GameError::NotYourTurn);

        let outcome = engine.attack(1, &mut rng).unwrap();
        assert!(matches!(outcome, AttackOutcome::Continue(_)));
        assert_eq!(outcome.report().damage, 5);
        assert_eq!(outcome.report().remaining_hp, 95);

        assert_eq!(engine.attack(1, &mut rng).unwrap_err(), GameError::NotYourTurn);
        assert!(matches!(engine.attack(2, &mut rng).unwrap(), AttackOutcome::Continue(_)));
        assert_eq!(engine.battle_of(1).unwrap().turn(), Side::First);
    }

    #[test]
    fn test_faint_with_reserve_requires_switch() {
        let mut engine = ready_engine(
            vec![creature("#1", 100, 50, 20)],
            vec![creature("#2", 10, 5, 10), creature("#3", 100, 5, 10)],
        );
        engine.start(1).unwrap();
        let mut rng = rng();

        let outcome = engine.attack(1, &mut rng).unwrap();
        assert!(matches!(outcome, AttackOutcome::Fainted(_)));
        assert_eq!(outcome.report().remaining_hp, 0);
        assert_eq!(
            engine.battle_of(1).unwrap().state(),
            BattleState::AwaitingSwitch(Side::Second)
        );

        // Neither side may attack until Misty switches
        assert_eq!(
            engine.attack(1, &mut rng).unwrap_err(),
            GameError::AwaitingSwitch("Misty".to_string())
        );
        assert_eq!(
            engine.attack(2, &mut rng).unwrap_err(),
            GameError::CreatureFainted("Mon#2".to_string())
        );
        assert_eq!(engine.switch(1, "#1").unwrap_err(), GameError::NotYourTurn);
        assert_eq!(
            engine.switch(2, "#2").unwrap_err(),
            GameError::CreatureFainted("Mon#2".to_string())
        );

        let report = engine.switch(2, "#3").unwrap();
        assert!(report.forced);
        assert_eq!(report.creature, "Mon#3");
        // The side that fainted loses the tempo
        assert_eq!(report.next_turn, 1);
        assert_eq!(engine.battle_of(1).unwrap().state(), BattleState::Active);
    }

    #[test]
    fn test_voluntary_switch_uses_turn() {
        let mut engine = ready_engine(
            vec![creature("#1", 100, 5, 20), creature("#4", 100, 5, 20)],
            vec![creature("#2", 100, 5, 10)],
        );
        engine.start(1).unwrap();

        assert_eq!(engine.switch(2, "#2").unwrap_err(), GameError::NotYourTurn);
        assert_eq!(
            engine.switch(1, "#9").unwrap_err(),
            GameError::NotOwned("#9".to_string())
        );
        assert!(matches!(
            engine.switch(1, "#1").unwrap_err(),
            GameError::InvalidArguments(_)
        ));

        let report = engine.switch(1, "#4").unwrap();
        assert!(!report.forced);
        assert_eq!(report.next_turn, 2);
        assert_eq!(engine.battle_of(1).unwrap().turn(), Side::Second);
    }

    #[test]
    fn test_last_faint_concludes_and_awards_experience() {
        let mut engine = ready_engine(
            vec![creature("#1", 100, 50, 20), creature("#4", 100, 5, 1)],
            vec![creature("#2", 10, 5, 10)],
        );
        engine.start(1).unwrap();

        let outcome = engine.attack(1, &mut rng()).unwrap();
        let AttackOutcome::Concluded(_, conclusion) = outcome else {
            panic!("expected the battle to conclude");
        };
        assert_eq!(conclusion.winner, 1);
        assert_eq!(conclusion.loser, 2);
        assert_eq!(conclusion.reason, ConclusionReason::Defeat);
        // Loser team carries 10 experience, split over two winners
        assert_eq!(conclusion.experience.total, 10);
        assert_eq!(conclusion.experience.per_creature, 5);
        assert!(conclusion.winner_team.iter().all(|c| c.experience == 15));

        assert_eq!(engine.count(), 0);
        assert!(!engine.is_engaged(1));
        assert_eq!(engine.attack(1, &mut rng()).unwrap_err(), GameError::NoActiveBattle);
    }

    #[test]
    fn test_surrender_started_battle() {
        let mut engine = ready_engine(vec![creature("#1", 100, 5, 5)], vec![creature("#2", 100, 5, 5)]);
        engine.start(1).unwrap();

        let BattleEnd::Concluded(conclusion) = engine.surrender(1).unwrap() else {
            panic!("expected a conclusion");
        };
        assert_eq!(conclusion.winner_name, "Misty");
        assert_eq!(conclusion.reason, ConclusionReason::Surrender);
        assert_eq!(engine.count(), 0);
    }

    #[test]
    fn test_surrender_before_start_cancels() {
        let mut engine = ready_engine(vec![creature("#1", 100, 5, 5)], vec![]);
        let end = engine.surrender(2).unwrap();
        assert!(matches!(end, BattleEnd::Cancelled { other: 1, .. }));
        assert_eq!(engine.count(), 0);
        assert_eq!(engine.surrender(2).unwrap_err(), GameError::NoActiveBattle);
    }

    #[test]
    fn test_abandon_unpaired_is_none() {
        let mut engine = BattleEngine::new();
        assert!(engine.abandon(1).is_none());
    }

    #[test]
    fn test_team_locked_once_started() {
        let mut engine = ready_engine(vec![creature("#1", 100, 5, 5)], vec![creature("#2", 100, 5, 5)]);
        assert!(engine.ensure_team_editable(1).is_ok());
        engine.start(1).unwrap();
        assert_eq!(engine.ensure_team_editable(1), Err(GameError::AlreadyInProgress));
        assert_eq!(
            engine.commit_team(1, vec![creature("#1", 1, 1, 1)]).unwrap_err(),
            GameError::AlreadyInProgress
        );
    }
}
