//! Command parsing
//!
//! Turns one inbound text line into a [`Command`]. Verbs are
//! case-insensitive and the legacy client's spellings (`@join`, numeric menu
//! choices, `p`) are accepted as aliases.

use std::fmt;

use crate::error::{GameError, GameResult};
use crate::game::session::MAX_TEAM_SIZE;

/// A parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Join the game under a name
    Join(String),
    /// Show the roster
    Bag,
    /// Catch new creatures
    Catch,
    /// List other players
    List,
    /// Invite a player to battle
    Invite(String),
    /// Accept (`true`) or decline a pending invitation
    Accept(bool),
    /// Pick 1-3 creatures by catalog id
    Pick(Vec<String>),
    /// Start the paired battle
    Start,
    /// Attack with the active creature
    Attack,
    /// Switch to another team creature
    Switch(String),
    /// Give up the battle
    Surrender,
    /// Leave the game
    Quit,
    /// Show a catalog entry
    Info(String),
    /// Show the battle state
    Status,
    /// List commands
    Help,
}

/// Usage strings, one per verb
pub const USAGE: &[(&str, &str)] = &[
    ("join <name>", "join the game"),
    ("bag", "show your creatures"),
    ("catch", "catch new creatures"),
    ("list", "list other players"),
    ("invite <name>", "invite a player to battle"),
    ("accept yes|no", "answer a battle invitation"),
    ("pick <id> [id] [id]", "choose your battle team"),
    ("start", "start the battle"),
    ("attack", "attack with your active creature"),
    ("switch <id>", "switch your active creature"),
    ("surrender", "give up the battle"),
    ("info <id|name>", "show a creature from the catalog"),
    ("status", "show the battle state"),
    ("help", "show this list"),
    ("quit", "leave the game"),
];

fn usage(verb: &str) -> GameError {
    let text = USAGE
        .iter()
        .find(|(usage, _)| usage.split_whitespace().next() == Some(verb))
        .map(|(usage, _)| *usage)
        .unwrap_or(verb);
    GameError::InvalidArguments(text.to_string())
}

fn single(verb: &str, args: &[&str]) -> GameResult<String> {
    match args {
        [arg] => Ok(arg.to_string()),
        _ => Err(usage(verb)),
    }
}

fn none(verb: &str, args: &[&str], command: Command) -> GameResult<Command> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(usage(verb))
    }
}

impl Command {
    /// Parse one command line
    pub fn parse(line: &str) -> GameResult<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((verb, args)) = parts.split_first() else {
            return Err(GameError::UnknownCommand(String::new()));
        };

        let lowered = verb.to_lowercase();
        let verb = lowered.trim_start_matches('@');

        match verb {
            "join" => single("join", args).map(Command::Join),
            "bag" | "roster" | "1" => none("bag", args, Command::Bag),
            "catch" | "roll" | "2" => none("catch", args, Command::Catch),
            "list" | "players" | "3" => none("list", args, Command::List),
            "invite" | "4" => single("invite", args).map(Command::Invite),
            "accept" => match single("accept", args)?.to_lowercase().as_str() {
                "yes" | "y" => Ok(Command::Accept(true)),
                "no" | "n" => Ok(Command::Accept(false)),
                _ => Err(usage("accept")),
            },
            "pick" | "p" => {
                if args.is_empty() || args.len() > MAX_TEAM_SIZE {
                    return Err(usage("pick"));
                }
                Ok(Command::Pick(args.iter().map(|s| s.to_string()).collect()))
            }
            "start" | "play" => none("start", args, Command::Start),
            "attack" => none("attack", args, Command::Attack),
            "switch" => single("switch", args).map(Command::Switch),
            "surrender" => none("surrender", args, Command::Surrender),
            "quit" | "5" => none("quit", args, Command::Quit),
            "info" => {
                if args.is_empty() {
                    return Err(usage("info"));
                }
                Ok(Command::Info(args.join(" ")))
            }
            "status" => none("status", args, Command::Status),
            "help" => none("help", args, Command::Help),
            _ => Err(GameError::UnknownCommand(lowered.clone())),
        }
    }

    /// Canonical verb
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Join(_) => "join",
            Command::Bag => "bag",
            Command::Catch => "catch",
            Command::List => "list",
            Command::Invite(_) => "invite",
            Command::Accept(_) => "accept",
            Command::Pick(_) => "pick",
            Command::Start => "start",
            Command::Attack => "attack",
            Command::Switch(_) => "switch",
            Command::Surrender => "surrender",
            Command::Quit => "quit",
            Command::Info(_) => "info",
            Command::Status => "status",
            Command::Help => "help",
        }
    }

    /// Whether the sender must have joined first
    pub fn requires_session(&self) -> bool {
        !matches!(self, Command::Join(_) | Command::Help | Command::Info(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_verbs() {
        assert_eq!(Command::parse("join Ash"), Ok(Command::Join("Ash".to_string())));
        assert_eq!(Command::parse("  ATTACK  "), Ok(Command::Attack));
        assert_eq!(Command::parse("switch #0004"), Ok(Command::Switch("#0004".to_string())));
        assert_eq!(Command::parse("accept YES"), Ok(Command::Accept(true)));
        assert_eq!(Command::parse("accept no"), Ok(Command::Accept(false)));
    }

    #[test]
    fn test_parse_legacy_aliases() {
        assert_eq!(Command::parse("@join Ash"), Ok(Command::Join("Ash".to_string())));
        assert_eq!(Command::parse("1"), Ok(Command::Bag));
        assert_eq!(Command::parse("2"), Ok(Command::Catch));
        assert_eq!(Command::parse("3"), Ok(Command::List));
        assert_eq!(Command::parse("4 Misty"), Ok(Command::Invite("Misty".to_string())));
        assert_eq!(Command::parse("5"), Ok(Command::Quit));
        assert_eq!(Command::parse("@play"), Ok(Command::Start));
        assert_eq!(
            Command::parse("p #0001 #0004 #0007"),
            Ok(Command::Pick(vec![
                "#0001".to_string(),
                "#0004".to_string(),
                "#0007".to_string()
            ]))
        );
    }

    #[test]
    fn test_parse_arity_errors() {
        assert_eq!(
            Command::parse("join"),
            Err(GameError::InvalidArguments("join <name>".to_string()))
        );
        assert_eq!(
            Command::parse("join Ash Ketchum"),
            Err(GameError::InvalidArguments("join <name>".to_string()))
        );
        assert!(matches!(Command::parse("pick"), Err(GameError::InvalidArguments(_))));
        assert!(matches!(
            Command::parse("pick a b c d"),
            Err(GameError::InvalidArguments(_))
        ));
        assert!(matches!(Command::parse("accept maybe"), Err(GameError::InvalidArguments(_))));
        assert!(matches!(Command::parse("attack now"), Err(GameError::InvalidArguments(_))));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            Command::parse("dance"),
            Err(GameError::UnknownCommand("dance".to_string()))
        );
        assert!(matches!(Command::parse("   "), Err(GameError::UnknownCommand(_))));
    }

    #[test]
    fn test_info_accepts_multi_word_names() {
        assert_eq!(
            Command::parse("info Mr. Mime"),
            Ok(Command::Info("Mr. Mime".to_string()))
        );
    }

    #[test]
    fn test_requires_session() {
        assert!(!Command::Join("a".to_string()).requires_session());
        assert!(!Command::Help.requires_session());
        assert!(Command::Attack.requires_session());
    }
}
