use std::time::Duration;

use merge_six_core::{
    Accumulation, CellCoord, Event, Outcome, RejectReason, StackDepth, TileId, VisualTicket,
    MAX_COMBO,
};
use merge_six_system_combo::ComboTracker;

fn merge_confirmed() -> Event {
    Event::MergeConfirmed {
        outcome: Outcome::Accumulated(Accumulation {
            destination: TileId::new(1),
            cell: CellCoord::new(0, 0),
            value: 3,
            stack_depth: StackDepth::new(2),
            score: 3,
        }),
        ticket: VisualTicket::new(0),
    }
}

fn tick(millis: u64) -> Event {
    Event::TimeAdvanced {
        dt: Duration::from_millis(millis),
    }
}

#[test]
fn merge_increments_combo() {
    let mut tracker = ComboTracker::default();
    let mut notices = Vec::new();

    tracker.handle(&[merge_confirmed()], &mut notices);

    assert_eq!(tracker.combo(), 1);
    assert_eq!(notices, vec![Event::ComboChanged { combo: 1 }]);
}

#[test]
fn combo_survives_until_just_before_timeout() {
    let mut tracker = ComboTracker::default();
    let mut notices = Vec::new();
    tracker.handle(&[merge_confirmed()], &mut notices);

    tracker.handle(&[tick(1_999)], &mut notices);
    tracker.handle(&[merge_confirmed()], &mut notices);

    assert_eq!(tracker.combo(), 2, "a merge at 1999 ms keeps the combo alive");
}

#[test]
fn combo_resets_at_exactly_two_seconds() {
    let mut tracker = ComboTracker::default();
    let mut notices = Vec::new();
    tracker.handle(&[merge_confirmed()], &mut notices);
    tracker.handle(&[merge_confirmed()], &mut notices);

    tracker.handle(&[tick(1_000), tick(1_000)], &mut notices);

    assert_eq!(tracker.combo(), 0);
    assert_eq!(notices.last(), Some(&Event::ComboChanged { combo: 0 }));
}

#[test]
fn rejected_merges_do_not_count() {
    let mut tracker = ComboTracker::default();
    let mut notices = Vec::new();

    tracker.handle(
        &[Event::MergeConfirmed {
            outcome: Outcome::Rejected(RejectReason::WildOnWild),
            ticket: VisualTicket::new(3),
        }],
        &mut notices,
    );

    assert_eq!(tracker.combo(), 0);
    assert!(notices.is_empty());
}

#[test]
fn combo_saturates_at_ninety_nine() {
    let mut tracker = ComboTracker::default();
    let mut notices = Vec::new();
    let merges: Vec<Event> = (0..150).map(|_| merge_confirmed()).collect();

    tracker.handle(&merges, &mut notices);

    assert_eq!(tracker.combo(), MAX_COMBO);
}

#[test]
fn new_board_resets_combo_and_timer() {
    let mut tracker = ComboTracker::default();
    let mut notices = Vec::new();
    tracker.handle(&[merge_confirmed(), merge_confirmed()], &mut notices);

    tracker.handle(
        &[Event::BoardBuilt {
            board_number: 2,
            level: 1,
            moves: 30,
            restarted: false,
        }],
        &mut notices,
    );
    notices.clear();
    tracker.handle(&[tick(5_000)], &mut notices);

    assert_eq!(tracker.combo(), 0);
    assert!(notices.is_empty(), "cancelled timer must not fire later");
}
