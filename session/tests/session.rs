use std::{
    cell::RefCell,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    rc::Rc,
    time::Duration,
};

use merge_six_core::{
    can_merge, BoardEnd, CellCoord, Outcome, RejectReason, TileId, TileSnapshot, VisualTicket,
};
use merge_six_session::{GameSession, MergeHelpers, Presentation, SessionConfig, StatsSink};
use merge_six_system_drag_targeting::BoardLayout;
use merge_six_system_lifecycle::Phase;
use merge_six_system_persistence::{KeyValueStore, ManualClock, MemoryStore, DEFAULT_KEY};
use merge_six_world::query;

const NOW: u64 = 1_700_000_000_000;

#[derive(Clone, Default)]
struct Recorder {
    log: Rc<RefCell<Vec<String>>>,
    tickets: Rc<RefCell<Vec<VisualTicket>>>,
    failed: Rc<RefCell<Vec<BoardEnd>>>,
    cleared: Rc<RefCell<Vec<u32>>>,
}

impl Presentation for Recorder {
    fn create_tile(&mut self, tile: &TileSnapshot) {
        self.log.borrow_mut().push(format!("create {tile:?}"));
    }

    fn destroy_tile(&mut self, tile: TileId) {
        self.log.borrow_mut().push(format!("destroy {}", tile.get()));
    }

    fn update_tile(&mut self, tile: &TileSnapshot) {
        self.log.borrow_mut().push(format!("update {tile:?}"));
    }

    fn merge_confirmed(&mut self, outcome: &Outcome, ticket: VisualTicket) {
        self.log.borrow_mut().push(format!("merge {outcome:?}"));
        self.tickets.borrow_mut().push(ticket);
    }
}

impl StatsSink for Recorder {
    fn score_changed(&mut self, score: u64) {
        self.log.borrow_mut().push(format!("score {score}"));
    }

    fn combo_changed(&mut self, combo: u32) {
        self.log.borrow_mut().push(format!("combo {combo}"));
    }

    fn board_cleared(&mut self, board_number: u32) {
        self.cleared.borrow_mut().push(board_number);
    }

    fn board_failed(&mut self, end: BoardEnd) {
        self.failed.borrow_mut().push(end);
    }
}

#[derive(Default)]
struct Helpers {
    snapped: Vec<(TileId, CellCoord)>,
    centred: Vec<(TileId, TileId)>,
}

impl MergeHelpers for Helpers {
    fn snap_back(&mut self, tile: TileId, origin: CellCoord) {
        self.snapped.push((tile, origin));
    }

    fn center_on(&mut self, tile: TileId, target: TileId) {
        self.centred.push((tile, target));
    }
}

fn session_with(config: &SessionConfig, store: MemoryStore, clock: &ManualClock) -> GameSession {
    GameSession::new(config, Box::new(store), Box::new(clock.clone()))
}

fn recorded_session(config: &SessionConfig, recorder: &Recorder) -> GameSession {
    recorded_session_with(config, MemoryStore::new(), recorder)
}

fn recorded_session_with(
    config: &SessionConfig,
    store: MemoryStore,
    recorder: &Recorder,
) -> GameSession {
    let clock = ManualClock::new(NOW);
    session_with(config, store, &clock)
        .with_presentation(Box::new(recorder.clone()))
        .with_stats(Box::new(recorder.clone()))
}

fn legal_pair(session: &GameSession) -> Option<(TileSnapshot, TileSnapshot)> {
    let view = session.board_view();
    let tiles: Vec<TileSnapshot> = view.active().copied().collect();
    for source in &tiles {
        for destination in &tiles {
            if can_merge(source, destination) {
                return Some((*source, *destination));
            }
        }
    }
    None
}

#[test]
fn fresh_start_fills_the_first_board() {
    let config = SessionConfig::default();
    let clock = ManualClock::new(NOW);
    let mut session = session_with(&config, MemoryStore::new(), &clock);

    assert!(!session.start(), "empty store should not resume");

    let status = session.status();
    assert_eq!(status.board_number, 1);
    assert_eq!(status.score, 0);
    assert_eq!(status.moves, config.moves_per_board);
    assert_eq!(session.board_view().iter().count(), 30);
    assert!(legal_pair(&session).is_some(), "new board must offer a merge");
    assert!(query::check_consistency(session.world()).is_ok());
}

#[test]
fn legal_merge_spends_a_move_and_autosaves() {
    let config = SessionConfig::default();
    let clock = ManualClock::new(NOW);
    let mut session = session_with(&config, MemoryStore::new(), &clock);
    let _ = session.start();

    let (source, destination) = legal_pair(&session).expect("legal pair");
    let outcome = session.merge(source.id, destination.id, &mut Helpers::default());

    assert!(outcome.is_success());
    assert_eq!(session.status().moves, config.moves_per_board - 1);
    assert_eq!(session.status().moves_made_on_board, 1);
    assert_eq!(session.combo(), 1);
    assert!(session.status().score >= u64::from(source.value + destination.value));
    assert!(
        session.store().get(DEFAULT_KEY).expect("read").is_some(),
        "merge should be autosaved"
    );
    assert!(query::check_consistency(session.world()).is_ok());
}

#[test]
fn rejected_merge_snaps_the_tile_back() {
    let mut session = session_with(
        &SessionConfig::default(),
        MemoryStore::new(),
        &ManualClock::new(NOW),
    );
    let _ = session.start();
    let tile = *session.board_view().active().next().expect("tile");
    let mut helpers = Helpers::default();

    let outcome = session.merge(tile.id, tile.id, &mut helpers);

    assert_eq!(outcome, Outcome::Rejected(RejectReason::SameTile));
    assert_eq!(helpers.snapped, vec![(tile.id, tile.cell)]);
    assert_eq!(session.status().moves, 30);
    assert_eq!(session.combo(), 0);
}

#[test]
fn dropping_onto_a_partner_centres_and_merges() {
    let mut session = session_with(
        &SessionConfig::default(),
        MemoryStore::new(),
        &ManualClock::new(NOW),
    );
    let _ = session.start();
    let (source, destination) = legal_pair(&session).expect("legal pair");
    let layout = BoardLayout::default();
    let grab = layout.cell_rect(source.cell).center();
    let drop = layout.cell_rect(destination.cell).center();
    let mut helpers = Helpers::default();

    assert!(session.begin_drag(source.id, grab));
    assert_eq!(session.drag_to(drop), Some(destination.id));
    assert_eq!(session.pick_target(source.id), Some(destination.id));
    let outcome = session.end_drag(drop, &mut helpers).expect("drag was active");

    assert!(outcome.is_success());
    assert_eq!(helpers.centred, vec![(source.id, destination.id)]);
    assert!(helpers.snapped.is_empty());
}

#[test]
fn dropping_on_nothing_returns_home() {
    let mut session = session_with(
        &SessionConfig::default(),
        MemoryStore::new(),
        &ManualClock::new(NOW),
    );
    let _ = session.start();
    let tile = *session.board_view().active().next().expect("tile");
    let layout = BoardLayout::default();
    let grab = layout.cell_rect(tile.cell).center();
    let far = grab + glam::Vec2::new(-5_000.0, -5_000.0);
    let mut helpers = Helpers::default();

    assert!(session.begin_drag(tile.id, grab));
    assert_eq!(session.drag_to(far), None);
    assert_eq!(session.end_drag(far, &mut helpers), None);
    assert_eq!(helpers.snapped, vec![(tile.id, tile.cell)]);
    assert_eq!(session.status().moves, 30);
}

#[test]
fn combo_lapses_after_idle_window() {
    let config = SessionConfig::default();
    let mut session = session_with(&config, MemoryStore::new(), &ManualClock::new(NOW));
    let _ = session.start();

    let (source, destination) = legal_pair(&session).expect("legal pair");
    let _ = session.merge(source.id, destination.id, &mut Helpers::default());
    assert_eq!(session.combo(), 1);

    session.tick(Duration::from_millis(config.combo_timeout_ms - 1));
    assert_eq!(session.combo(), 1, "combo should survive inside the window");

    session.tick(Duration::from_millis(1));
    assert_eq!(session.combo(), 0, "combo should lapse once idle");
}

#[test]
fn visual_completion_settles_the_board() {
    let recorder = Recorder::default();
    let mut session = recorded_session(&SessionConfig::default(), &recorder);
    let _ = session.start();

    let (source, destination) = legal_pair(&session).expect("legal pair");
    let _ = session.merge(source.id, destination.id, &mut Helpers::default());
    assert_eq!(session.phase(), Phase::Evaluating);

    let ticket = *recorder.tickets.borrow().last().expect("ticket issued");
    session.visual_complete(ticket);

    assert!(
        !matches!(session.phase(), Phase::Evaluating),
        "evaluation should run once the visual completes"
    );
}

#[test]
fn missing_visual_falls_back_to_timer() {
    let config = SessionConfig::default();
    let mut session = session_with(&config, MemoryStore::new(), &ManualClock::new(NOW));
    let _ = session.start();

    let (source, destination) = legal_pair(&session).expect("legal pair");
    let _ = session.merge(source.id, destination.id, &mut Helpers::default());
    assert_eq!(session.phase(), Phase::Evaluating);

    session.tick(Duration::from_millis(config.visual_fallback_ms));

    assert!(!matches!(session.phase(), Phase::Evaluating));
}

#[test]
fn running_out_of_moves_restarts_the_session() {
    let config = SessionConfig {
        moves_per_board: 1,
        auto_complete_visuals: true,
        ..SessionConfig::default()
    };
    let recorder = Recorder::default();
    let mut session = recorded_session(&config, &recorder);
    let _ = session.start();

    let (source, destination) = legal_pair(&session).expect("legal pair");
    let _ = session.merge(source.id, destination.id, &mut Helpers::default());

    assert!(
        matches!(session.phase(), Phase::Ending(end) if !end.is_clear()),
        "board should be ending after its last move, got {:?}",
        session.phase()
    );
    assert_eq!(recorder.failed.borrow().len(), 1);

    session.tick(Duration::from_millis(config.end_delay_ms));

    let status = session.status();
    assert_eq!(status.board_number, 1);
    assert_eq!(status.score, 0);
    assert_eq!(status.moves, 1);
    assert_eq!(session.phase(), Phase::Playing);
    assert!(
        session.store().get(DEFAULT_KEY).expect("read").is_none(),
        "a failed session should not be resumable"
    );
}

#[test]
fn saved_session_resumes_identically() {
    let config = SessionConfig::default();
    let clock = ManualClock::new(NOW);
    let mut first = session_with(&config, MemoryStore::new(), &clock);
    let _ = first.start();
    let (source, destination) = legal_pair(&first).expect("legal pair");
    let _ = first.merge(source.id, destination.id, &mut Helpers::default());

    let json = first
        .store()
        .get(DEFAULT_KEY)
        .expect("read")
        .expect("snapshot written");
    let mut store = MemoryStore::new();
    store.set(DEFAULT_KEY, &json).expect("write");
    clock.advance(60_000);

    let mut second = session_with(&config, store, &clock);
    assert!(second.start(), "stored session should resume");

    assert_eq!(
        query::session_record(second.world()),
        query::session_record(first.world())
    );
    assert!((second.wild_meter() - first.wild_meter()).abs() < 1e-9);
    assert!(query::check_consistency(second.world()).is_ok());
}

#[test]
fn stale_snapshot_is_discarded_on_start() {
    let config = SessionConfig::default();
    let clock = ManualClock::new(NOW);
    let mut first = session_with(&config, MemoryStore::new(), &clock);
    let _ = first.start();
    let (source, destination) = legal_pair(&first).expect("legal pair");
    let _ = first.merge(source.id, destination.id, &mut Helpers::default());
    let json = first
        .store()
        .get(DEFAULT_KEY)
        .expect("read")
        .expect("snapshot written");

    let mut store = MemoryStore::new();
    store.set(DEFAULT_KEY, &json).expect("write");
    clock.advance(25 * 60 * 60 * 1_000);

    let mut second = session_with(&config, store, &clock);
    assert!(!second.start(), "stale snapshot must not resume");
    assert_eq!(second.status().moves_made_on_board, 0);
    assert!(second.store().get(DEFAULT_KEY).expect("read").is_none());
}

#[test]
fn hiding_an_untouched_first_board_saves_nothing() {
    let mut session = session_with(
        &SessionConfig::default(),
        MemoryStore::new(),
        &ManualClock::new(NOW),
    );
    let _ = session.start();

    session.on_platform_hidden();

    assert!(session.store().get(DEFAULT_KEY).expect("read").is_none());
}

#[test]
fn greedy_replay_is_deterministic() {
    fn play() -> (u64, u64) {
        let config = SessionConfig {
            auto_complete_visuals: true,
            ..SessionConfig::default()
        };
        let recorder = Recorder::default();
        let mut session = recorded_session(&config, &recorder);
        let _ = session.start();

        for _ in 0..60 {
            if let Some((source, destination)) = legal_pair(&session) {
                let _ = session.merge(source.id, destination.id, &mut Helpers::default());
            }
            session.tick(Duration::from_millis(700));
            assert!(query::check_consistency(session.world()).is_ok());
        }

        let mut hasher = DefaultHasher::new();
        for line in recorder.log.borrow().iter() {
            line.hash(&mut hasher);
        }
        format!("{:?}", query::session_record(session.world())).hash(&mut hasher);
        (hasher.finish(), session.status().best_score)
    }

    let (first, best) = play();
    let (second, _) = play();

    assert_eq!(first, second, "same seed should replay identically");
    assert!(best > 0, "greedy play should score");
}

#[test]
fn charged_meter_does_not_spoil_a_board_clear() {
    let mut store = MemoryStore::new();
    let json = format!(
        r#"{{"gridSnapshot":[{{"column":0,"row":0,"value":1,"locked":false}},
            {{"column":1,"row":0,"value":5,"locked":false}}],
            "columns":2,"rows":1,"score":40,"level":1,"boardNumber":2,"moves":10,
            "wildMeterRaw":0.9,"bestScore":40,"timestampMs":{NOW}}}"#
    );
    store.set(DEFAULT_KEY, &json).expect("write");
    let config = SessionConfig::default();
    let recorder = Recorder::default();
    let mut session = recorded_session_with(&config, store, &recorder);
    assert!(session.start(), "stored board should resume");

    let view = session.board_view();
    let source = view.occupant(CellCoord::new(0, 0)).expect("left tile").id;
    let destination = view.occupant(CellCoord::new(1, 0)).expect("right tile").id;
    let outcome = session.merge(source, destination, &mut Helpers::default());

    assert!(matches!(outcome, Outcome::Exploded(explosion) if explosion.board_clean));
    assert!(session.is_board_clean(), "no wild may land on a clean board");
    assert!(session.wild_meter() >= 1.0, "charge must be kept for later");

    for _ in 0..40 {
        session.tick(Duration::from_millis(100));
    }

    assert_eq!(*recorder.cleared.borrow(), vec![2]);
    assert!(recorder.failed.borrow().is_empty());
    assert_eq!(session.status().board_number, 3);
    assert!(query::check_consistency(session.world()).is_ok());
}

#[test]
fn zero_sized_board_request_starts_a_playable_board() {
    let config = SessionConfig {
        columns: 0,
        rows: 0,
        ..SessionConfig::default()
    };
    let mut session = session_with(&config, MemoryStore::new(), &ManualClock::new(NOW));

    assert!(!session.start());

    assert_eq!(session.board_view().dimensions(), (2, 2));
    assert!(legal_pair(&session).is_some(), "board must offer a merge");
    assert_eq!(session.phase(), Phase::Playing);
}

#[test]
fn oversized_snapshot_is_discarded_on_start() {
    let mut store = MemoryStore::new();
    let json = format!(
        r#"{{"gridSnapshot":[],"columns":4294967295,"rows":4294967295,"score":0,
            "level":1,"boardNumber":2,"moves":10,"wildMeterRaw":0.0,"bestScore":0,
            "timestampMs":{NOW}}}"#
    );
    store.set(DEFAULT_KEY, &json).expect("write");
    let config = SessionConfig::default();
    let mut session = session_with(&config, store, &ManualClock::new(NOW));

    assert!(!session.start(), "oversized snapshot must not resume");

    assert_eq!(session.board_view().dimensions(), (5, 6));
    assert!(session.store().get(DEFAULT_KEY).expect("read").is_none());
}
