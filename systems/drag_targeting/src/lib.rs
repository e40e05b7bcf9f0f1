#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Drag targeting system that picks the merge partner under a dragged tile.
//!
//! Targets are chosen by overlap ratio: the intersection of the dragged
//! tile's rectangle with a candidate's resting rectangle, divided by the
//! candidate's area. Only candidates that pass the drop filter and the merge
//! legality pre-check compete. The chosen target is nudged toward the dragged
//! tile (the magnetic assist) and springs back once it stops being the target.

mod geometry;

use std::time::Duration;

use glam::Vec2;
use merge_six_core::{can_merge, BoardView, CellCoord, Event, TileId, TileSnapshot};
use tracing::debug;

pub use geometry::{BoardLayout, Rect};

const DEFAULT_THRESHOLD: f32 = 0.06;
const MIN_THRESHOLD: f32 = 0.03;
const MAX_THRESHOLD: f32 = 0.10;
const DEFAULT_PULL: f32 = 0.35;
const MAX_OFFSET_RATIO: f32 = 0.11;
const ASSIST_SCALE: f32 = 1.03;
const DEFAULT_RETURN_DURATION: Duration = Duration::from_millis(140);

/// Configuration parameters required to construct the drag targeting system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    threshold: f32,
    pull: f32,
    return_duration: Duration,
    can_drop: fn(&TileSnapshot) -> bool,
}

impl Config {
    /// Creates a configuration with the provided overlap threshold.
    ///
    /// The threshold is clamped into `0.03..=0.10`.
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD),
            pull: DEFAULT_PULL,
            return_duration: DEFAULT_RETURN_DURATION,
            can_drop: not_locked,
        }
    }

    /// Overrides how strongly the target is pulled toward the dragged tile.
    #[must_use]
    pub fn with_pull(mut self, pull: f32) -> Self {
        self.pull = pull.max(0.0);
        self
    }

    /// Overrides the duration of the spring-back tween.
    #[must_use]
    pub const fn with_return_duration(mut self, duration: Duration) -> Self {
        self.return_duration = duration;
        self
    }

    /// Overrides the drop filter applied before the legality pre-check.
    #[must_use]
    pub const fn with_can_drop(mut self, can_drop: fn(&TileSnapshot) -> bool) -> Self {
        self.can_drop = can_drop;
        self
    }

    /// Minimum overlap ratio a candidate needs to become the target.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

fn not_locked(tile: &TileSnapshot) -> bool {
    !tile.locked
}

/// Result of a finished drag gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Release {
    /// Tile that was dragged.
    pub source: TileId,
    /// Cell the dragged tile snaps back to when no merge happens.
    pub origin_cell: CellCoord,
    /// Merge partner under the tile when it was dropped.
    pub target: Option<TileId>,
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    tile: TileId,
    origin_cell: CellCoord,
    grab_offset: Vec2,
    rect: Rect,
    assist: Option<Assist>,
}

#[derive(Clone, Copy, Debug)]
struct Assist {
    tile: TileId,
    offset: Vec2,
}

#[derive(Clone, Copy, Debug)]
struct ReturnTween {
    tile: TileId,
    from_offset: Vec2,
    elapsed: Duration,
}

/// Stateful system tracking one drag gesture and its magnetic assist.
#[derive(Debug)]
pub struct DragTargeting {
    config: Config,
    layout: BoardLayout,
    drag: Option<Drag>,
    returns: Vec<ReturnTween>,
}

impl DragTargeting {
    /// Creates a new drag targeting system.
    #[must_use]
    pub fn new(config: Config, layout: BoardLayout) -> Self {
        Self {
            config,
            layout,
            drag: None,
            returns: Vec::new(),
        }
    }

    /// Layout used to map cells onto world space.
    #[must_use]
    pub const fn layout(&self) -> BoardLayout {
        self.layout
    }

    /// Tile currently being dragged.
    #[must_use]
    pub fn dragged(&self) -> Option<TileId> {
        self.drag.map(|drag| drag.tile)
    }

    /// Current world-space rectangle of the dragged tile.
    #[must_use]
    pub fn dragged_rect(&self) -> Option<Rect> {
        self.drag.map(|drag| drag.rect)
    }

    /// Target currently receiving the magnetic assist.
    #[must_use]
    pub fn current_target(&self) -> Option<TileId> {
        self.drag
            .and_then(|drag| drag.assist)
            .map(|assist| assist.tile)
    }

    /// Reports whether `tile` is springing back to its resting position.
    #[must_use]
    pub fn is_returning(&self, tile: TileId) -> bool {
        self.returns.iter().any(|tween| tween.tile == tile)
    }

    /// Picks the best merge partner for `source` dragged to `source_rect`.
    #[must_use]
    pub fn pick_target(&self, view: &BoardView, source: TileId, source_rect: Rect) -> Option<TileId> {
        let source_tile = view.tile(source)?;
        let mut best: Option<(TileId, f32)> = None;
        for candidate in view.active() {
            if candidate.id == source
                || !(self.config.can_drop)(candidate)
                || !can_merge(source_tile, candidate)
            {
                continue;
            }
            let rect = self.layout.cell_rect(candidate.cell);
            let area = rect.area();
            if area <= f32::EPSILON {
                continue;
            }
            let ratio = source_rect.intersection_area(&rect) / area;
            if best.map_or(true, |(_, best_ratio)| ratio > best_ratio) {
                best = Some((candidate.id, ratio));
            }
        }
        best.filter(|(_, ratio)| *ratio >= self.config.threshold)
            .map(|(tile, _)| tile)
    }

    /// Starts dragging `tile`, grabbed at world-space `pointer`.
    ///
    /// Returns `false` when the tile cannot be dragged.
    pub fn begin_drag(
        &mut self,
        view: &BoardView,
        tile: TileId,
        pointer: Vec2,
        out: &mut Vec<Event>,
    ) -> bool {
        self.cancel_drag();
        for tween in self.returns.drain(..) {
            out.push(rest_frame(tween.tile));
        }

        let Some(snapshot) = view.tile(tile).filter(|snapshot| snapshot.is_active()) else {
            return false;
        };
        if view.is_busy_ending() {
            return false;
        }
        let rect = self.layout.cell_rect(snapshot.cell);
        self.drag = Some(Drag {
            tile,
            origin_cell: snapshot.cell,
            grab_offset: pointer - rect.min(),
            rect,
            assist: None,
        });
        true
    }

    /// Moves the dragged tile so the grab point sits under `pointer`.
    ///
    /// Returns the target under the tile after the move.
    pub fn drag_to(&mut self, view: &BoardView, pointer: Vec2, out: &mut Vec<Event>) -> Option<TileId> {
        let mut drag = self.drag?;
        drag.rect = drag.rect.moved_to(pointer - drag.grab_offset);
        let target = self.pick_target(view, drag.tile, drag.rect);

        let previous = drag.assist.map(|assist| assist.tile);
        if previous != target {
            if let Some(assist) = drag.assist.take() {
                self.start_return(assist);
            }
            if let Some(tile) = target {
                self.returns.retain(|tween| tween.tile != tile);
            }
            debug!(
                source = drag.tile.get(),
                target = target.map(|tile| tile.get()),
                "drag target changed"
            );
        }

        drag.assist = target
            .and_then(|tile| view.tile(tile))
            .map(|tile| self.assist_for(tile, drag.rect));
        if let Some(assist) = drag.assist {
            out.push(Event::AssistFrame {
                tile: assist.tile,
                offset_x: assist.offset.x,
                offset_y: assist.offset.y,
                scale: ASSIST_SCALE,
            });
        }

        self.drag = Some(drag);
        target
    }

    /// Finishes the drag at `pointer`, picking the target one final time.
    pub fn end_drag(&mut self, view: &BoardView, pointer: Vec2, out: &mut Vec<Event>) -> Option<Release> {
        let target = self.drag_to(view, pointer, out);
        let drag = self.drag.take()?;
        if let Some(assist) = drag.assist {
            self.start_return(assist);
        }
        Some(Release {
            source: drag.tile,
            origin_cell: drag.origin_cell,
            target,
        })
    }

    /// Abandons the current drag, springing any assisted target back.
    pub fn cancel_drag(&mut self) {
        if let Some(assist) = self.drag.take().and_then(|drag| drag.assist) {
            self.start_return(assist);
        }
    }

    /// Advances spring-back tweens and forgets tiles that left the board.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Event>) {
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => self.advance_returns(*dt, out),
                Event::TileRemoved { tile, .. } => self.forget(*tile),
                Event::BoardBuilt { .. } | Event::SessionRestored { .. } => {
                    self.drag = None;
                    self.returns.clear();
                }
                _ => {}
            }
        }
    }

    fn assist_for(&self, target: &TileSnapshot, dragged: Rect) -> Assist {
        let resting = self.layout.cell_rect(target.cell);
        let delta = dragged.center() - resting.center();
        let limit = MAX_OFFSET_RATIO * resting.size().x;
        let magnitude = (delta.length() * self.config.pull).min(limit);
        Assist {
            tile: target.id,
            offset: delta.normalize_or_zero() * magnitude,
        }
    }

    fn start_return(&mut self, assist: Assist) {
        self.returns.retain(|tween| tween.tile != assist.tile);
        self.returns.push(ReturnTween {
            tile: assist.tile,
            from_offset: assist.offset,
            elapsed: Duration::ZERO,
        });
    }

    fn advance_returns(&mut self, dt: Duration, out: &mut Vec<Event>) {
        let duration = self.config.return_duration;
        for tween in &mut self.returns {
            tween.elapsed = tween.elapsed.saturating_add(dt);
            let progress = if duration.is_zero() {
                1.0
            } else {
                (tween.elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0)
            };
            let remaining = 1.0 - progress;
            let offset = tween.from_offset * remaining;
            out.push(Event::AssistFrame {
                tile: tween.tile,
                offset_x: offset.x,
                offset_y: offset.y,
                scale: 1.0 + (ASSIST_SCALE - 1.0) * remaining,
            });
        }
        self.returns.retain(|tween| tween.elapsed < duration);
    }

    fn forget(&mut self, tile: TileId) {
        self.returns.retain(|tween| tween.tile != tile);
        if self.drag.is_some_and(|drag| drag.tile == tile) {
            self.drag = None;
        }
        if let Some(drag) = self.drag.as_mut() {
            if drag.assist.is_some_and(|assist| assist.tile == tile) {
                drag.assist = None;
            }
        }
    }
}

fn rest_frame(tile: TileId) -> Event {
    Event::AssistFrame {
        tile,
        offset_x: 0.0,
        offset_y: 0.0,
        scale: 1.0,
    }
}
