//! Command dispatcher
//!
//! The single entry point for inbound commands. Each call parses one line,
//! locks the game world for the whole command and returns every message the
//! command produced, already addressed.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{GameError, GameResult};
use crate::game::battle::{AttackOutcome, BattleEnd};
use crate::game::invitation::Invitation;
use crate::game::session::SessionId;
use crate::game::world::GameWorld;
use crate::protocol::text;
use crate::protocol::Command;

/// A message to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: SocketAddr,
    pub text: String,
}

impl Outbound {
    pub fn new(to: SocketAddr, text: impl Into<String>) -> Self {
        Self {
            to,
            text: text.into(),
        }
    }
}

/// Messages produced by one command
struct Replies<'a> {
    world: &'a GameWorld,
    sender: SocketAddr,
    messages: Vec<Outbound>,
}

impl<'a> Replies<'a> {
    fn new(world: &'a GameWorld, sender: SocketAddr) -> Self {
        Self {
            world,
            sender,
            messages: Vec::new(),
        }
    }

    /// Message to whoever sent the command
    fn reply(&mut self, text: impl Into<String>) {
        self.messages.push(Outbound::new(self.sender, text));
    }

    /// Message to another session, dropped if it has left
    fn notify(&mut self, session: SessionId, text: impl Into<String>) {
        if let Some(address) = self.world.address_of(session) {
            self.messages.push(Outbound::new(address, text));
        }
    }

    fn battle_end(&mut self, end: &BattleEnd, issuer: SessionId, issuer_name: &str) {
        match end {
            BattleEnd::Concluded(conclusion) => {
                self.notify(conclusion.winner, text::conclusion_for_winner(conclusion));
                if conclusion.loser == issuer && self.world.address_of(issuer).is_some() {
                    self.reply(text::conclusion_for_loser(conclusion));
                }
            }
            BattleEnd::Cancelled {
                other, other_name, ..
            } => {
                self.notify(*other, text::cancelled_for_other(issuer_name));
                if self.world.address_of(issuer).is_some() {
                    self.reply(text::cancelled_for_self(other_name));
                }
            }
        }
    }

    fn withdrawn(&mut self, invitations: &[Invitation], skip: &[SessionId]) {
        for invitation in invitations {
            for party in [invitation.initiator, invitation.recipient] {
                if !skip.contains(&party) {
                    let (_, name) = invitation.counterpart(party);
                    self.notify(party, text::invitation_withdrawn(name));
                }
            }
        }
    }
}

/// Routes commands into the game world
#[derive(Clone)]
pub struct Dispatcher {
    world: Arc<Mutex<GameWorld>>,
}

impl Dispatcher {
    pub fn new(world: Arc<Mutex<GameWorld>>) -> Self {
        Self { world }
    }

    /// Shared world handle
    pub fn world(&self) -> &Arc<Mutex<GameWorld>> {
        &self.world
    }

    /// Handle one command line from `sender`
    pub fn dispatch(&self, sender: SocketAddr, line: &str) -> Vec<Outbound> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => return vec![Outbound::new(sender, e.to_string())],
        };

        let mut world = self.world.lock();
        let session = world.resolve(&sender);

        debug!(
            address = %sender,
            session_id = ?session,
            command = %command,
            "Dispatching command"
        );

        match route(&mut world, sender, session, command) {
            Ok(messages) => messages,
            Err(e) => {
                debug!(address = %sender, error = %e, "Command rejected");
                vec![Outbound::new(sender, e.to_string())]
            }
        }
    }
}

fn route(
    world: &mut GameWorld,
    sender: SocketAddr,
    session: Option<SessionId>,
    command: Command,
) -> GameResult<Vec<Outbound>> {
    if !command.requires_session() {
        return route_open(world, sender, session, command);
    }
    let id = session.ok_or(GameError::NotJoined)?;

    match command {
        Command::Bag => {
            let roster = text::roster(world.session(id)?);
            Ok(vec![Outbound::new(sender, roster)])
        }
        Command::Catch => {
            let caught = world.catch(id)?;
            Ok(vec![Outbound::new(sender, text::caught(&caught))])
        }
        Command::List => Ok(vec![Outbound::new(sender, text::players(&world.players(id)))]),
        Command::Invite(target) => {
            let invitation = world.invite(id, &target)?;
            let mut out = Replies::new(world, sender);
            out.reply(text::invitation_sent(&invitation.recipient_name));
            out.notify(
                invitation.recipient,
                text::invitation_received(&invitation.initiator_name),
            );
            Ok(out.messages)
        }
        Command::Accept(accept) => {
            let response = world.respond(id, accept)?;
            let invitation = &response.invitation;
            let mut out = Replies::new(world, sender);
            if response.accepted {
                out.reply(text::battle_joined(&invitation.initiator_name));
                out.notify(
                    invitation.initiator,
                    text::invitation_accepted(&invitation.recipient_name),
                );
                out.withdrawn(&response.superseded, &[id, invitation.initiator]);
            } else {
                out.reply(text::decline_confirmed(&invitation.initiator_name));
                out.notify(
                    invitation.initiator,
                    text::invitation_declined(&invitation.recipient_name),
                );
            }
            Ok(out.messages)
        }
        Command::Pick(ids) => {
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            let report = world.pick(id, &ids)?;
            let name = world.session(id)?.name.clone();
            let mut out = Replies::new(world, sender);
            out.reply(text::team_picked(&report.team, report.paired));
            if let Some(opponent) = report.ready_opponent {
                out.notify(opponent, text::opponent_ready(&name));
            }
            Ok(out.messages)
        }
        Command::Start => {
            let report = world.start(id)?;
            let mut out = Replies::new(world, sender);
            out.notify(report.first, text::battle_started(&report, report.first));
            out.notify(report.opponent, text::battle_started(&report, report.opponent));
            Ok(out.messages)
        }
        Command::Attack => {
            let outcome = world.attack(id)?;
            let report = outcome.report();
            let mut out = Replies::new(world, sender);
            out.reply(text::attack_for_attacker(report));
            out.notify(report.defender, text::attack_for_defender(report));

            match &outcome {
                AttackOutcome::Continue(report) => {
                    out.notify(report.defender, text::your_turn());
                }
                AttackOutcome::Fainted(report) => {
                    out.reply(text::fainted_for_attacker(report));
                    out.notify(report.defender, text::fainted_for_defender(report));
                }
                AttackOutcome::Concluded(_, conclusion) => {
                    out.reply(text::conclusion_for_winner(conclusion));
                    out.notify(conclusion.loser, text::conclusion_for_loser(conclusion));
                }
            }
            Ok(out.messages)
        }
        Command::Switch(creature_id) => {
            let report = world.switch(id, &creature_id)?;
            let mut out = Replies::new(world, sender);
            out.reply(text::switched_for_self(&report));
            out.notify(
                report.next_turn,
                format!("{}\n{}", text::switched_for_opponent(&report), text::your_turn()),
            );
            Ok(out.messages)
        }
        Command::Surrender => {
            let end = world.surrender(id)?;
            let name = world.session(id)?.name.clone();
            let mut out = Replies::new(world, sender);
            out.battle_end(&end, id, &name);
            Ok(out.messages)
        }
        Command::Status => {
            let status = text::status(world.battle(id)?, id);
            Ok(vec![Outbound::new(sender, status)])
        }
        Command::Quit => {
            let report = world.leave(id)?;
            let mut out = Replies::new(world, sender);
            out.reply(text::QUIT_REPLY);
            if let Some(end) = &report.battle {
                out.battle_end(end, id, &report.name);
            }
            out.withdrawn(&report.withdrawn, &[id]);
            Ok(out.messages)
        }
        other @ (Command::Join(_) | Command::Help | Command::Info(_)) => {
            Err(GameError::UnknownCommand(other.verb().to_string()))
        }
    }
}

/// Commands that work before joining
fn route_open(
    world: &mut GameWorld,
    sender: SocketAddr,
    session: Option<SessionId>,
    command: Command,
) -> GameResult<Vec<Outbound>> {
    match command {
        Command::Join(_) if session.is_some() => Err(GameError::AlreadyJoined),
        Command::Join(name) => {
            let report = world.join(sender, &name)?;
            let mut out = Replies::new(world, sender);
            out.reply(text::welcome(&report));
            Ok(out.messages)
        }
        Command::Help => Ok(vec![Outbound::new(sender, text::help())]),
        Command::Info(query) => {
            let template = world.catalog_entry(&query)?;
            Ok(vec![Outbound::new(sender, text::info(&template))])
        }
        other => Err(GameError::UnknownCommand(other.verb().to_string())),
    }
}
