use std::time::Duration;

use merge_six_core::{
    Accumulation, BoardEnd, CellCoord, Command, Event, Outcome, SpawnFailure, StackDepth, TileId,
    TileKind, VisualTicket,
};
use merge_six_system_lifecycle::{is_board_clean, BoardLifecycle, Config, LoneTilePolicy, Phase};
use merge_six_world::{self as world, query, World, WorldConfig};

fn board_with(tiles: &[(u32, u32, u8, TileKind)]) -> World {
    let mut world = World::with_config(WorldConfig::new(3, 3, 5));
    let mut events = Vec::new();
    let ids: Vec<TileId> = query::board_view(&world).iter().map(|tile| tile.id).collect();
    for tile in ids {
        world::apply(&mut world, Command::RemoveTile { tile }, &mut events);
    }
    for (column, row, value, kind) in tiles {
        world::apply(
            &mut world,
            Command::CreateTile {
                cell: CellCoord::new(*column, *row),
                value: *value,
                locked: false,
                kind: *kind,
            },
            &mut events,
        );
    }
    world
}

fn confirmed(ticket: u64) -> Event {
    Event::MergeConfirmed {
        outcome: Outcome::Accumulated(Accumulation {
            destination: TileId::new(0),
            cell: CellCoord::new(0, 0),
            value: 2,
            stack_depth: StackDepth::new(2),
            score: 2,
        }),
        ticket: VisualTicket::new(ticket),
    }
}

fn tick(millis: u64) -> Event {
    Event::TimeAdvanced {
        dt: Duration::from_millis(millis),
    }
}

/// Feeds events to the lifecycle and applies its commands until nothing is left.
fn drive(world: &mut World, lifecycle: &mut BoardLifecycle, events: Vec<Event>) -> Vec<Command> {
    let mut issued = Vec::new();
    let mut pending = events;
    while !pending.is_empty() {
        let mut commands = Vec::new();
        let view = query::board_view(world);
        lifecycle.handle(&pending, &view, query::status(world).moves, &mut commands);
        pending = Vec::new();
        for command in commands {
            issued.push(command.clone());
            world::apply(world, command, &mut pending);
        }
    }
    issued
}

#[test]
fn evaluation_waits_for_matching_visual_ticket() {
    let mut world = board_with(&[(0, 0, 2, TileKind::Normal)]);
    let mut lifecycle = BoardLifecycle::default();

    let issued = drive(&mut world, &mut lifecycle, vec![confirmed(4)]);
    assert!(issued.is_empty(), "evaluation must be deferred");
    assert_eq!(lifecycle.phase(), Phase::Evaluating);

    let issued = drive(
        &mut world,
        &mut lifecycle,
        vec![Event::VisualCompleted {
            ticket: VisualTicket::new(3),
        }],
    );
    assert!(issued.is_empty(), "stale tickets are ignored");

    let issued = drive(
        &mut world,
        &mut lifecycle,
        vec![Event::VisualCompleted {
            ticket: VisualTicket::new(4),
        }],
    );
    assert_eq!(
        issued,
        vec![Command::BeginBoardEnd {
            end: BoardEnd::Stuck
        }]
    );
}

#[test]
fn fallback_timer_evaluates_without_visual_signal() {
    let mut world = board_with(&[(0, 0, 1, TileKind::Normal), (1, 0, 2, TileKind::Normal)]);
    let mut lifecycle = BoardLifecycle::default();
    let _ = drive(&mut world, &mut lifecycle, vec![confirmed(0)]);

    let _ = drive(&mut world, &mut lifecycle, vec![tick(899)]);
    assert_eq!(lifecycle.phase(), Phase::Evaluating);
    let _ = drive(&mut world, &mut lifecycle, vec![tick(1)]);
    assert_eq!(lifecycle.phase(), Phase::Playing);
}

#[test]
fn clean_board_advances_after_end_delay() {
    let mut world = board_with(&[]);
    let mut lifecycle = BoardLifecycle::default();
    let _ = drive(&mut world, &mut lifecycle, vec![confirmed(0)]);

    let issued = drive(&mut world, &mut lifecycle, vec![tick(900)]);
    assert_eq!(
        issued,
        vec![Command::BeginBoardEnd {
            end: BoardEnd::Cleared
        }]
    );
    assert_eq!(lifecycle.phase(), Phase::Ending(BoardEnd::Cleared));
    assert!(query::status(&world).busy_ending);

    let issued = drive(&mut world, &mut lifecycle, vec![tick(1_199)]);
    assert!(issued.is_empty());
    let issued = drive(&mut world, &mut lifecycle, vec![tick(1)]);
    assert_eq!(issued, vec![Command::AdvanceBoard]);
    assert_eq!(query::status(&world).board_number, 2);
    assert_eq!(lifecycle.phase(), Phase::Playing);
}

#[test]
fn refused_wild_leaves_the_clear_intact() {
    let mut world = board_with(&[]);
    let mut lifecycle = BoardLifecycle::default();
    let mut events = Vec::new();
    world::apply(&mut world, Command::SpawnWild, &mut events);
    assert_eq!(
        events,
        vec![Event::WildSpawnFailed {
            reason: SpawnFailure::BoardClean
        }]
    );

    let _ = drive(&mut world, &mut lifecycle, vec![confirmed(0)]);
    events.push(tick(900));
    let issued = drive(&mut world, &mut lifecycle, events);

    assert_eq!(
        issued,
        vec![Command::BeginBoardEnd {
            end: BoardEnd::Cleared
        }]
    );
    assert!(is_board_clean(&query::board_view(&world)));
}

#[test]
fn stuck_board_restarts_session() {
    let mut world = board_with(&[(0, 0, 5, TileKind::Normal), (2, 2, 5, TileKind::Normal)]);
    let mut lifecycle = BoardLifecycle::default();
    let _ = drive(&mut world, &mut lifecycle, vec![confirmed(0), tick(900)]);
    assert_eq!(lifecycle.phase(), Phase::Ending(BoardEnd::Stuck));

    let issued = drive(&mut world, &mut lifecycle, vec![tick(1_200)]);

    assert_eq!(issued, vec![Command::RestartSession]);
    assert_eq!(query::status(&world).board_number, 1);
    assert!(!query::status(&world).busy_ending);
}

#[test]
fn wild_without_partner_triggers_single_rescue() {
    let mut world = board_with(&[(1, 1, 0, TileKind::Wild)]);
    let mut lifecycle = BoardLifecycle::default();

    let issued = drive(&mut world, &mut lifecycle, vec![confirmed(0), tick(900)]);

    assert_eq!(issued, vec![Command::RescueSpawn { max: 3 }]);
    let view = query::board_view(&world);
    let numbered = view.active().filter(|tile| !tile.is_wild()).count();
    assert!((1..=3).contains(&numbered), "rescue opens one to three tiles");
    assert_eq!(lifecycle.phase(), Phase::Playing);
}

#[test]
fn out_of_moves_fails_a_playable_board() {
    let mut world = World::with_config(WorldConfig::new(3, 3, 5).with_moves_per_board(0));
    let mut lifecycle = BoardLifecycle::default();

    let issued = drive(&mut world, &mut lifecycle, vec![confirmed(0), tick(900)]);

    assert_eq!(
        issued,
        vec![Command::BeginBoardEnd {
            end: BoardEnd::OutOfMoves
        }]
    );
}

#[test]
fn lone_tile_rescue_policy_spawns_partners() {
    let mut world = board_with(&[(0, 0, 3, TileKind::Normal)]);
    let mut lifecycle =
        BoardLifecycle::new(Config::default().with_lone_tile_policy(LoneTilePolicy::Rescue));

    let issued = drive(&mut world, &mut lifecycle, vec![confirmed(0), tick(900)]);

    assert_eq!(issued.first(), Some(&Command::RescueSpawn { max: 3 }));
}
