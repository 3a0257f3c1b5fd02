//! Text rendering
//!
//! Every line a client sees is produced here.

use std::fmt::Write;

use crate::game::battle::{
    AttackReport, Battle, BattleState, Conclusion, ConclusionReason, Side, StartReport,
    SwitchReport,
};
use crate::game::creature::{CreatureInstance, CreatureTemplate};
use crate::game::session::{Session, SessionId};
use crate::game::world::{JoinReport, PlayerSummary};
use crate::protocol::command::USAGE;

/// Reply to `quit`. The legacy client exits when it sees this exact line.
pub const QUIT_REPLY: &str = "You are out of the game";

fn creature_line(creature: &CreatureInstance) -> String {
    let stats = creature.stats();
    format!(
        "ID: {} - Name: {} [Level: {}] - Exp: {} - HP: {} - ATK: {} - DEF: {} - SPEED: {}",
        creature.id(),
        creature.name(),
        creature.level,
        creature.experience,
        creature.max_hp(),
        stats.attack,
        stats.defense,
        stats.speed
    )
}

fn hp(creature: &CreatureInstance) -> String {
    format!("{}/{}", creature.current_hp, creature.max_hp())
}

pub fn welcome(report: &JoinReport) -> String {
    let mut text = format!("[{}] Welcome to the Pokebattle game!", report.name);
    match &report.starter {
        Some(starter) => {
            let _ = write!(text, "\nYour first creature: {} ({})", starter.name(), starter.id());
        }
        None => {
            let _ = write!(text, "\nWelcome back, you own {} creatures", report.roster_size);
        }
    }
    text.push_str("\nType help for the list of commands");
    text
}

pub fn roster(session: &Session) -> String {
    let lead = session
        .has_team()
        .then(|| session.active_creature())
        .flatten()
        .map(|c| c.uid);

    let mut text = String::from("Your bag:");
    for creature in &session.roster {
        let marker = if lead == Some(creature.uid) {
            " * (lead)"
        } else if session.team().iter().any(|c| c.uid == creature.uid) {
            " *"
        } else {
            ""
        };
        let _ = write!(text, "\n{}{}", creature_line(creature), marker);
    }
    if session.has_team() {
        text.push_str("\n(* in your battle team)");
    }
    text
}

pub fn caught(creatures: &[CreatureInstance]) -> String {
    let mut text = String::from("Your new creatures:");
    for creature in creatures {
        let _ = write!(
            text,
            "\n[ID: {} -- Name: {} -- Level: {}]",
            creature.id(),
            creature.name(),
            creature.level
        );
    }
    text
}

pub fn players(players: &[PlayerSummary]) -> String {
    if players.is_empty() {
        return "No other players online".to_string();
    }
    let mut text = String::from("Current players:");
    for player in players {
        let _ = write!(
            text,
            "\n[Player: {}] {} creatures{}",
            player.name,
            player.creatures,
            if player.in_battle { " (in battle)" } else { "" }
        );
    }
    text
}

pub fn invitation_sent(target: &str) -> String {
    format!("Invitation sent to {}, waiting for your competitor", target)
}

pub fn invitation_received(from: &str) -> String {
    format!("{} sent you a request to battle! (accept yes/no)", from)
}

pub fn invitation_accepted(by: &str) -> String {
    format!(
        "{} has accepted the battle\n(Usage: pick <id> [id] [id], then start)",
        by
    )
}

pub fn battle_joined(opponent: &str) -> String {
    format!(
        "You joined the battle against {}\n(Usage: pick <id> [id] [id], then start)",
        opponent
    )
}

pub fn invitation_declined(by: &str) -> String {
    format!("{} declined your battle request", by)
}

pub fn decline_confirmed(from: &str) -> String {
    format!("You declined the battle request from {}", from)
}

pub fn invitation_withdrawn(by: &str) -> String {
    format!("The battle request involving {} was withdrawn", by)
}

pub fn team_picked(team: &[CreatureInstance], paired: bool) -> String {
    let names: Vec<&str> = team.iter().map(|c| c.name()).collect();
    let mut text = format!("Your creatures chosen: {}", names.join(" "));
    if paired {
        text.push_str("\n(Usage: start to begin the battle)");
    }
    text
}

pub fn opponent_ready(name: &str) -> String {
    format!("{} is ready, both teams are set (Usage: start)", name)
}

pub fn battle_started(report: &StartReport, viewer: SessionId) -> String {
    let leads = format!("{} vs {}", report.leads.0, report.leads.1);
    if viewer == report.first {
        format!("Battle started: {}\nYou first", leads)
    } else {
        format!("Battle started: {}\n{} moves first", leads, report.first_name)
    }
}

pub fn attack_for_attacker(report: &AttackReport) -> String {
    format!(
        "Your {} used a {} attack on {}'s {} for {} damage ({} HP left)",
        report.attacker_creature,
        report.kind.name(),
        report.defender_name,
        report.defender_creature,
        report.damage,
        report.remaining_hp
    )
}

pub fn attack_for_defender(report: &AttackReport) -> String {
    format!(
        "{}'s {} used a {} attack on your {} for {} damage ({}/{} HP)",
        report.attacker_name,
        report.attacker_creature,
        report.kind.name(),
        report.defender_creature,
        report.damage,
        report.remaining_hp,
        report.max_hp
    )
}

pub fn your_turn() -> String {
    "Your turn (attack or switch <id>)".to_string()
}

pub fn fainted_for_defender(report: &AttackReport) -> String {
    format!(
        "Your {} fainted! Choose another creature (Usage: switch <id>)",
        report.defender_creature
    )
}

pub fn fainted_for_attacker(report: &AttackReport) -> String {
    format!(
        "{}'s {} fainted, waiting for {} to switch",
        report.defender_name, report.defender_creature, report.defender_name
    )
}

pub fn switched_for_self(report: &SwitchReport) -> String {
    format!("Go, {}!", report.creature)
}

pub fn switched_for_opponent(report: &SwitchReport) -> String {
    format!("{} switched to {}", report.name, report.creature)
}

pub fn conclusion_for_winner(conclusion: &Conclusion) -> String {
    let mut text = match conclusion.reason {
        ConclusionReason::Defeat => format!("You won the battle against {}!", conclusion.loser_name),
        ConclusionReason::Surrender => format!("{} surrendered, you win!", conclusion.loser_name),
        ConclusionReason::Abandon => format!("{} left the game, you win!", conclusion.loser_name),
    };
    let _ = write!(
        text,
        "\nEach of your creatures gained {} experience",
        conclusion.experience.per_creature
    );
    for level_up in &conclusion.experience.level_ups {
        let _ = write!(
            text,
            "\n{} grew from level {} to {}",
            level_up.name, level_up.old_level, level_up.new_level
        );
    }
    text
}

pub fn conclusion_for_loser(conclusion: &Conclusion) -> String {
    match conclusion.reason {
        ConclusionReason::Defeat => {
            format!("All your creatures fainted, {} wins", conclusion.winner_name)
        }
        ConclusionReason::Surrender | ConclusionReason::Abandon => {
            format!("You surrendered, {} wins", conclusion.winner_name)
        }
    }
}

pub fn cancelled_for_self(other: &str) -> String {
    format!("You left the battle with {} before it started", other)
}

pub fn cancelled_for_other(name: &str) -> String {
    format!("{} left the battle before it started", name)
}

pub fn info(template: &CreatureTemplate) -> String {
    let stats = &template.stats;
    let types: Vec<&str> = template.types.iter().map(|t| t.name()).collect();
    format!(
        "ID: {} - Name: {} - Types: {} - HP: {} - ATK: {} - DEF: {} - Sp.Atk: {} - Sp.Def: {} - SPEED: {}",
        template.id,
        template.name,
        if types.is_empty() { "-".to_string() } else { types.join("/") },
        stats.hp,
        stats.attack,
        stats.defense,
        stats.special_attack,
        stats.special_defense,
        stats.speed
    )
}

pub fn status(battle: &Battle, viewer: SessionId) -> String {
    let mut text = format!("Battle #{} ({})", battle.id, battle.state().name());

    for side in [Side::First, Side::Second] {
        let participant = battle.participant(side);
        let _ = write!(text, "\n{}: ", participant.name);
        match participant.active_creature() {
            Some(creature) if battle.state().is_started() => {
                let _ = write!(text, "{} {} HP", creature.name(), hp(creature));
                let able = participant.team.iter().filter(|c| !c.is_fainted()).count();
                let _ = write!(text, " ({}/{} able)", able, participant.team.len());
            }
            _ if participant.team.is_empty() => text.push_str("no team yet"),
            _ => {
                let names: Vec<&str> = participant.team.iter().map(|c| c.name()).collect();
                text.push_str(&names.join(" "));
            }
        }
    }

    match battle.state() {
        BattleState::Active => {
            let holder = battle.participant(battle.turn());
            if holder.session == viewer {
                text.push_str("\nYour turn");
            } else {
                let _ = write!(text, "\n{}'s turn", holder.name);
            }
        }
        BattleState::AwaitingSwitch(side) => {
            let _ = write!(text, "\nWaiting for {} to switch", battle.participant(side).name);
        }
        _ => {}
    }
    text
}

pub fn help() -> String {
    let mut text = String::from("Commands:");
    for (usage, description) in USAGE {
        let _ = write!(text, "\n  {:<20} {}", usage, description);
    }
    text
}
