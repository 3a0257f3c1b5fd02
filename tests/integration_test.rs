//! Integration tests for the command dispatcher and UDP loop
//!
//! These tests drive the server the way clients do, one command line at a
//! time, and check:
//! - Joining, name collisions and roster seeding
//! - The invitation, team pick and start flow
//! - Turn order, fainting, forced switches and conclusion
//! - Quitting mid-battle
//! - Fragmented replies over a real UDP socket

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use pokebattle_server::config::ServerConfig;
use pokebattle_server::game::creature::BaseStats;
use pokebattle_server::game::{
    CreatureTemplate, GameWorld, MemoryRosterStore, RosterStore, StaticCatalogLoader,
    WorldSettings,
};
use pokebattle_server::net::transport::fragment;
use pokebattle_server::net::{DatagramHandler, UdpTransport};
use pokebattle_server::protocol::text;
use pokebattle_server::{AppState, Dispatcher, GameError, Outbound};

const ASH: u16 = 40001;
const MISTY: u16 = 40002;
const BROCK: u16 = 40003;

/// Physical and special damage are both `power` against these creatures
fn template(id: &str, name: &str, hp: u32, speed: u32, experience: u32) -> CreatureTemplate {
    CreatureTemplate::new(id, name)
        .stats(BaseStats {
            hp,
            attack: 20,
            defense: 0,
            special_attack: 20,
            special_defense: 0,
            speed,
        })
        .experience(experience)
}

fn catalog() -> StaticCatalogLoader {
    StaticCatalogLoader::new(vec![
        template("#0001", "Bulbasaur", 45, 45, 64),
        template("#0004", "Charmander", 39, 65, 62),
        template("#0007", "Squirtle", 44, 43, 63),
    ])
}

fn setup() -> (Dispatcher, Arc<MemoryRosterStore>) {
    let store = Arc::new(MemoryRosterStore::new());
    let world = GameWorld::new(
        WorldSettings::default().with_seed(2024),
        Arc::new(catalog()),
        store.clone(),
    );
    (Dispatcher::new(Arc::new(Mutex::new(world))), store)
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn send(dispatcher: &Dispatcher, port: u16, line: &str) -> Vec<Outbound> {
    dispatcher.dispatch(addr(port), line)
}

/// Texts addressed to `port`, in order
fn texts_for(out: &[Outbound], port: u16) -> Vec<String> {
    out.iter()
        .filter(|o| o.to == addr(port))
        .map(|o| o.text.clone())
        .collect()
}

/// Join Ash and Misty, pair them and pick the starter on both sides
fn paired(dispatcher: &Dispatcher) {
    send(dispatcher, ASH, "join Ash");
    send(dispatcher, MISTY, "join Misty");
    send(dispatcher, ASH, "invite Misty");
    send(dispatcher, MISTY, "accept yes");
    send(dispatcher, ASH, "pick #0001");
    send(dispatcher, MISTY, "pick #0001");
}

/// Test that distinct names join independently and duplicates are refused
#[test]
fn test_join_and_name_taken() {
    let (dispatcher, store) = setup();

    let out = send(&dispatcher, ASH, "join Ash");
    assert!(out[0].text.starts_with("[Ash] Welcome"));
    assert!(out[0].text.contains("Bulbasaur (#0001)"));

    let out = send(&dispatcher, MISTY, "@join Misty");
    assert_eq!(out[0].to, addr(MISTY));

    let out = send(&dispatcher, BROCK, "join ASH");
    assert_eq!(
        texts_for(&out, BROCK),
        vec![GameError::NameTaken("ASH".to_string()).to_string()]
    );

    // Both new players had their starter saved
    assert_eq!(store.len(), 2);
    assert_eq!(dispatcher.world().lock().session_count(), 2);
}

/// Test that a returning player gets the stored roster back
#[test]
fn test_rejoin_restores_roster() {
    let (dispatcher, store) = setup();

    send(&dispatcher, ASH, "join Ash");
    let out = send(&dispatcher, ASH, "catch");
    assert!(out[0].text.starts_with("Your new creatures:"));
    send(&dispatcher, ASH, "quit");

    assert_eq!(store.load("ash").unwrap().unwrap().len(), 5);

    let out = send(&dispatcher, BROCK, "join ash");
    assert!(out[0].text.contains("you own 5 creatures"));
}

/// Test that inviting an unknown player creates no invitation
#[test]
fn test_invite_unknown_player() {
    let (dispatcher, _) = setup();
    send(&dispatcher, ASH, "join Ash");

    let out = send(&dispatcher, ASH, "invite Gary");
    assert_eq!(
        out,
        vec![Outbound::new(
            addr(ASH),
            GameError::NoSuchPlayer("Gary".to_string()).to_string()
        )]
    );
    assert_eq!(dispatcher.world().lock().invitation_count(), 0);
}

/// Test that a second invitation to a busy recipient is rejected
#[test]
fn test_invite_busy_recipient() {
    let (dispatcher, _) = setup();
    send(&dispatcher, ASH, "join Ash");
    send(&dispatcher, MISTY, "join Misty");
    send(&dispatcher, BROCK, "join Brock");

    send(&dispatcher, ASH, "invite Misty");
    let out = send(&dispatcher, BROCK, "invite Misty");
    assert_eq!(
        texts_for(&out, BROCK),
        vec![GameError::TargetBusy("Misty".to_string()).to_string()]
    );

    // Misty still answers Ash's invitation
    let out = send(&dispatcher, MISTY, "accept yes");
    assert!(texts_for(&out, ASH)[0].contains("Misty has accepted the battle"));
}

/// Test the full flow from invitation to the first attack
#[test]
fn test_battle_flow_and_double_start() {
    let (dispatcher, _) = setup();
    send(&dispatcher, ASH, "join Ash");
    send(&dispatcher, MISTY, "join Misty");

    let out = send(&dispatcher, ASH, "start");
    assert_eq!(texts_for(&out, ASH), vec![GameError::NoActiveBattle.to_string()]);

    send(&dispatcher, ASH, "invite Misty");
    send(&dispatcher, MISTY, "accept yes");

    let out = send(&dispatcher, ASH, "start");
    assert_eq!(texts_for(&out, ASH), vec![GameError::TeamNotReady.to_string()]);

    send(&dispatcher, ASH, "pick #0001");
    let out = send(&dispatcher, MISTY, "p #0001");
    assert!(texts_for(&out, ASH)[0].contains("Misty is ready"));

    // Equal speed, the issuer moves first
    let out = send(&dispatcher, MISTY, "start");
    assert!(texts_for(&out, MISTY)[0].ends_with("You first"));
    assert!(texts_for(&out, ASH)[0].ends_with("Misty moves first"));

    let out = send(&dispatcher, ASH, "start");
    assert_eq!(
        texts_for(&out, ASH),
        vec![GameError::AlreadyInProgress.to_string()]
    );
    assert_eq!(dispatcher.world().lock().battle_count(), 1);
}

/// Test that turns alternate and a single-creature team loses when it faints
#[test]
fn test_turns_alternate_until_conclusion() {
    let (dispatcher, store) = setup();
    paired(&dispatcher);
    send(&dispatcher, ASH, "start");

    let out = send(&dispatcher, MISTY, "attack");
    assert_eq!(texts_for(&out, MISTY), vec![GameError::NotYourTurn.to_string()]);

    // 45 HP, 20 damage per hit: Misty's starter faints on Ash's third hit
    let expected_hp = [25, 5];
    for hp in expected_hp {
        let out = send(&dispatcher, ASH, "attack");
        assert!(texts_for(&out, ASH)[0].contains(&format!("({} HP left)", hp)));
        assert_eq!(texts_for(&out, MISTY)[1], text::your_turn());

        let out = send(&dispatcher, MISTY, "attack");
        assert_eq!(texts_for(&out, ASH).len(), 2);
    }

    let out = send(&dispatcher, ASH, "attack");
    let ash = texts_for(&out, ASH);
    assert!(ash[1].starts_with("You won the battle against Misty!"));
    assert!(ash[1].contains("Each of your creatures gained 64 experience"));
    assert!(ash[1].contains("Bulbasaur grew from level 1 to 2"));
    assert!(texts_for(&out, MISTY)[1].starts_with("All your creatures fainted"));

    // The battle is gone
    let out = send(&dispatcher, ASH, "attack");
    assert_eq!(texts_for(&out, ASH), vec![GameError::NoActiveBattle.to_string()]);
    assert_eq!(dispatcher.world().lock().battle_count(), 0);

    // Progress was written back to the roster and saved
    let roster = store.load("Ash").unwrap().unwrap();
    assert_eq!(roster[0].level, 2);
    assert_eq!(roster[0].experience, 128);
    assert_eq!(roster[0].current_hp, 45);
}

/// Test that a faint with a reserve waits for the defender to switch
#[test]
fn test_faint_requires_switch() {
    let (dispatcher, _) = setup();
    send(&dispatcher, ASH, "join Ash");
    send(&dispatcher, MISTY, "join Misty");
    send(&dispatcher, MISTY, "catch");

    let reserve = {
        let world = dispatcher.world().lock();
        let id = world.resolve(&addr(MISTY)).unwrap();
        world.session(id).unwrap().roster[1].id().to_string()
    };

    send(&dispatcher, ASH, "invite Misty");
    send(&dispatcher, MISTY, "accept yes");
    send(&dispatcher, ASH, "pick #0001");
    send(&dispatcher, MISTY, &format!("pick #0001 {}", reserve));
    send(&dispatcher, ASH, "start");

    send(&dispatcher, ASH, "attack");
    send(&dispatcher, MISTY, "attack");
    send(&dispatcher, ASH, "attack");
    send(&dispatcher, MISTY, "attack");
    let out = send(&dispatcher, ASH, "attack");
    assert!(texts_for(&out, MISTY)[1].starts_with("Your Bulbasaur fainted!"));

    let out = send(&dispatcher, ASH, "attack");
    assert_eq!(
        texts_for(&out, ASH),
        vec![GameError::AwaitingSwitch("Misty".to_string()).to_string()]
    );
    let out = send(&dispatcher, MISTY, "attack");
    assert_eq!(
        texts_for(&out, MISTY),
        vec![GameError::CreatureFainted("Bulbasaur".to_string()).to_string()]
    );

    let out = send(&dispatcher, MISTY, &format!("switch {}", reserve));
    assert!(texts_for(&out, MISTY)[0].starts_with("Go, "));
    assert!(texts_for(&out, ASH)[0].ends_with(&text::your_turn()));

    // The side that fainted lost the tempo
    let out = send(&dispatcher, MISTY, "attack");
    assert_eq!(texts_for(&out, MISTY), vec![GameError::NotYourTurn.to_string()]);
    let out = send(&dispatcher, ASH, "status");
    assert!(texts_for(&out, ASH)[0].ends_with("Your turn"));
}

/// Test surrender before and after the start
#[test]
fn test_surrender() {
    let (dispatcher, _) = setup();
    paired(&dispatcher);

    // Not started yet: the pairing is simply cancelled
    let out = send(&dispatcher, MISTY, "surrender");
    assert!(texts_for(&out, ASH)[0].contains("Misty left the battle before it started"));
    assert_eq!(dispatcher.world().lock().battle_count(), 0);

    send(&dispatcher, ASH, "invite Misty");
    send(&dispatcher, MISTY, "accept yes");
    send(&dispatcher, ASH, "start");

    let out = send(&dispatcher, ASH, "surrender");
    assert_eq!(texts_for(&out, ASH), vec!["You surrendered, Misty wins".to_string()]);
    assert!(texts_for(&out, MISTY)[0].starts_with("Ash surrendered, you win!"));
}

/// Test that quitting mid-battle hands the win to the opponent
#[test]
fn test_quit_mid_battle() {
    let (dispatcher, _) = setup();
    paired(&dispatcher);
    send(&dispatcher, ASH, "start");

    let out = send(&dispatcher, ASH, "5");
    assert_eq!(texts_for(&out, ASH), vec![text::QUIT_REPLY.to_string()]);
    assert!(texts_for(&out, MISTY)[0].starts_with("Ash left the game, you win!"));

    let out = send(&dispatcher, ASH, "bag");
    assert_eq!(texts_for(&out, ASH), vec![GameError::NotJoined.to_string()]);

    let out = send(&dispatcher, MISTY, "list");
    assert_eq!(texts_for(&out, MISTY), vec!["No other players online".to_string()]);
}

/// Test that a quitting player's pending invitation is withdrawn
#[test]
fn test_quit_withdraws_invitation() {
    let (dispatcher, _) = setup();
    send(&dispatcher, ASH, "join Ash");
    send(&dispatcher, MISTY, "join Misty");
    send(&dispatcher, ASH, "invite Misty");

    let out = send(&dispatcher, ASH, "quit");
    assert!(texts_for(&out, MISTY)[0].contains("withdrawn"));

    let out = send(&dispatcher, MISTY, "accept yes");
    assert_eq!(texts_for(&out, MISTY), vec![GameError::NoPendingInvite.to_string()]);
}

/// Test that picking creatures not in the roster fails
#[test]
fn test_pick_not_owned() {
    let (dispatcher, _) = setup();
    send(&dispatcher, ASH, "join Ash");

    let out = send(&dispatcher, ASH, "pick #0001 #0001");
    assert_eq!(
        texts_for(&out, ASH),
        vec![GameError::NotOwned("#0001".to_string()).to_string()]
    );
}

/// Test replies over a real socket, fragmented to the payload ceiling
#[tokio::test]
async fn test_udp_round_trip_with_fragments() {
    let mut config = ServerConfig::default();
    config.max_payload_bytes = 64;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let state = Arc::new(AppState::with_collaborators(
        config,
        shutdown_tx.clone(),
        Arc::new(catalog()),
        Arc::new(MemoryRosterStore::new()),
    ));

    let transport = UdpTransport::bind(addr(0), 64).await.unwrap();
    let handler = DatagramHandler::new(state, transport);
    let server_addr = handler.local_addr().unwrap();

    let mut shutdown_rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move {
        handler.run(&mut shutdown_rx).await;
    });

    let client = UdpSocket::bind(addr(0)).await.unwrap();
    client.send_to(b"help\n", server_addr).await.unwrap();

    let help = text::help();
    let expected = fragment(&help, 64);
    let mut received = Vec::new();
    let mut buf = [0u8; 128];
    for _ in 0..expected.len() {
        let (n, from) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("reply timed out")
            .unwrap();
        assert_eq!(from, server_addr);
        assert!(n <= 64);
        received.push(String::from_utf8(buf[..n].to_vec()).unwrap());
    }
    assert_eq!(received.concat(), help);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}
