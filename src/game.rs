//! Simulation context: board, falling block, spawner, RNG and score.
//!
//! The falling block moves in sub-cell units so presentation can draw it
//! smoothly; its logical row is `offset / CELL_UNITS`. Everything that lands is
//! resolved immediately, then a short settle delay holds the next spawn while
//! presentation plays the events.

use crate::board::{Board, Pos};
use crate::catalog::{BlockKind, Catalog, KindId, Special};
use crate::resolve::{self, GameEvent, Resolution};
use crate::score::ScoreLedger;
use crate::spawner::Spawner;
use crate::GameConfig;
use rand::prelude::*;
use tracing::{debug, info};

/// Sub-cell units per row (one 60 px cell in the classic 400x720 layout).
pub const CELL_UNITS: u32 = 60;

/// The single block under player control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Falling {
    pub col: usize,
    /// Distance of the block's top edge from the board top, in sub-cell units.
    pub offset: u32,
    pub kind: BlockKind,
}

impl Falling {
    #[inline]
    pub fn row(&self) -> usize {
        (self.offset / CELL_UNITS) as usize
    }

    #[inline]
    pub fn pos(&self) -> Pos {
        Pos::new(self.col, self.row())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned,
    /// Row 0 of the chosen column is taken: the board has topped out.
    Blocked,
    /// A block is still falling or the last landing is still settling.
    Busy,
}

/// Convert a millisecond delay into scheduler ticks.
pub fn ms_to_ticks(ms: u64, tick_rate: f64) -> u32 {
    ((ms as f64) * tick_rate / 1000.0).round().max(0.0) as u32
}

#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    falling: Option<Falling>,
    catalog: Catalog,
    spawner: Spawner,
    rng: StdRng,
    score: ScoreLedger,
    fall_speed: u32,
    settle_ticks: u32,
    settle_remaining: u32,
    blaster_shots: Option<u32>,
    landing_points: bool,
}

impl Game {
    pub fn new(config: &GameConfig, best: u32) -> Self {
        let catalog = if config.allow_specials {
            Catalog::with_disabled(&config.disabled)
        } else {
            Catalog::numeric_only()
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            board: Board::new(config.cols, config.rows),
            falling: None,
            catalog,
            spawner: Spawner::new(config.special_chance),
            rng,
            score: ScoreLedger::with_best(best),
            fall_speed: config.fall_speed.clamp(1, CELL_UNITS),
            settle_ticks: ms_to_ticks(config.settle_delay_ms, config.tick_rate),
            settle_remaining: 0,
            blaster_shots: config.blaster_shots,
            landing_points: config.landing_points,
        }
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn falling(&self) -> Option<&Falling> {
        self.falling.as_ref()
    }

    #[inline]
    pub fn score(&self) -> &ScoreLedger {
        &self.score
    }

    pub fn score_mut(&mut self) -> &mut ScoreLedger {
        &mut self.score
    }

    /// Blaster shots left this session; `None` when unlimited.
    pub fn blaster_shots(&self) -> Option<u32> {
        self.blaster_shots
    }

    /// No block falling and the last landing has finished settling.
    pub fn ready_to_spawn(&self) -> bool {
        self.falling.is_none() && self.settle_remaining == 0
    }

    /// Where the falling block would come to rest if dropped now.
    pub fn ghost(&self) -> Option<Pos> {
        self.falling
            .map(|f| Pos::new(f.col, self.board.resting_row(f.col, f.row())))
    }

    /// Ask the spawner for the next block and put it at row 0 of a random column.
    pub fn spawn(&mut self, events: &mut Vec<GameEvent>) -> SpawnOutcome {
        if !self.ready_to_spawn() {
            return SpawnOutcome::Busy;
        }
        let kind = self.spawner.next(&self.board, &self.catalog, &mut self.rng);
        let col = self.spawner.column(self.board.cols(), &mut self.rng);
        self.spawn_kind_at(col, kind, events)
    }

    /// Spawn a specific kind at row 0 of `col`.
    pub fn spawn_kind_at(
        &mut self,
        col: usize,
        kind: BlockKind,
        events: &mut Vec<GameEvent>,
    ) -> SpawnOutcome {
        if !self.ready_to_spawn() {
            return SpawnOutcome::Busy;
        }
        let pos = Pos::new(col, 0);
        if !self.board.is_within_bounds(col, 0) || self.board.is_occupied(pos) {
            info!(col, "spawn cell occupied, board topped out");
            return SpawnOutcome::Blocked;
        }
        self.falling = Some(Falling {
            col,
            offset: 0,
            kind,
        });
        debug!(col, ?kind, "spawned");
        events.push(GameEvent::Spawned { pos, kind });
        SpawnOutcome::Spawned
    }

    /// One scheduler tick: count down the settle delay, or let the block fall.
    pub fn tick(&mut self, events: &mut Vec<GameEvent>) {
        if self.settle_remaining > 0 {
            self.settle_remaining -= 1;
            return;
        }
        let Some(f) = self.falling.as_mut() else {
            return;
        };
        let limit = self.board.resting_row(f.col, f.row());
        let next = f.offset + self.fall_speed;
        if next >= limit as u32 * CELL_UNITS {
            let f = *f;
            self.land(f, limit, events);
        } else {
            f.offset = next;
        }
    }

    /// Shift the falling block one column. Rejected moves change nothing.
    pub fn shift(&mut self, dir: isize, events: &mut Vec<GameEvent>) -> bool {
        let Some(f) = self.falling.as_mut() else {
            return false;
        };
        let Some(col) = f.col.checked_add_signed(dir) else {
            return false;
        };
        let row = f.row();
        if !self.board.is_within_bounds(col, row) || self.board.is_occupied(Pos::new(col, row)) {
            return false;
        }
        let from = f.pos();
        f.col = col;
        events.push(GameEvent::Moved {
            from,
            to: Pos::new(col, row),
        });
        true
    }

    /// Hard drop, or fire when the falling block is a Blaster with a shot left.
    pub fn drop_block(&mut self, events: &mut Vec<GameEvent>) {
        let Some(f) = self.falling else {
            return;
        };
        if f.kind.is(Special::Blaster) && self.blaster_shots.map_or(true, |s| s > 0) {
            self.fire(f, events);
            return;
        }
        let row = self.board.resting_row(f.col, f.row());
        events.push(GameEvent::Dropped {
            from: f.pos(),
            to: Pos::new(f.col, row),
        });
        self.land(f, row, events);
    }

    /// Debug override of the falling block's kind. Unknown ids become the lowest tile.
    pub fn set_active_kind(&mut self, id: KindId) {
        let kind = self.catalog.kind_or_lowest(id);
        match self.falling.as_mut() {
            Some(f) => {
                debug!(?kind, "falling block kind overridden");
                f.kind = kind;
            }
            None => debug!(?kind, "no falling block to override"),
        }
    }

    fn fire(&mut self, f: Falling, events: &mut Vec<GameEvent>) {
        self.falling = None;
        if let Some(shots) = self.blaster_shots.as_mut() {
            *shots = shots.saturating_sub(1);
        }
        let res = resolve::resolve_blaster(
            &mut self.board,
            &self.catalog,
            &mut self.rng,
            f.col,
            f.row(),
        );
        self.apply(res, events);
    }

    fn land(&mut self, f: Falling, row: usize, events: &mut Vec<GameEvent>) {
        self.falling = None;
        let pos = Pos::new(f.col, row);
        debug!(?pos, kind = ?f.kind, "landed");
        events.push(GameEvent::BlockLanded { pos, kind: f.kind });
        if !self.board.place(pos, f.kind) {
            return;
        }
        if self.landing_points {
            if let Some(v) = f.kind.value() {
                self.score.award(v);
                events.push(GameEvent::Scored(v));
            }
        }
        let res = resolve::resolve_landing(&mut self.board, &self.catalog, &mut self.rng, pos);
        self.apply(res, events);
    }

    fn apply(&mut self, res: Resolution, events: &mut Vec<GameEvent>) {
        debug!(points = res.points, merges = res.merges, "resolved");
        self.score.award(res.points);
        events.extend(res.events);
        self.settle_remaining = self.settle_ticks;
    }

    #[cfg(test)]
    pub(crate) fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        GameConfig {
            settle_delay_ms: 0,
            seed: Some(11),
            ..GameConfig::default()
        }
    }

    fn n(v: u32) -> BlockKind {
        BlockKind::Number(v.trailing_zeros() as u8)
    }

    fn run_until_landed(game: &mut Game, events: &mut Vec<GameEvent>) -> usize {
        let mut ticks = 0;
        while game.falling().is_some() {
            game.tick(events);
            ticks += 1;
            assert!(ticks < 10_000, "block never landed");
        }
        ticks
    }

    #[test]
    fn block_falls_to_floor() {
        let mut game = Game::new(&config(), 0);
        let mut ev = Vec::new();
        assert_eq!(game.spawn_kind_at(2, n(4), &mut ev), SpawnOutcome::Spawned);
        let ticks = run_until_landed(&mut game, &mut ev);
        let floor = game.board().rows() - 1;
        assert_eq!(game.board().occupied_at(Pos::new(2, floor)), Some(n(4)));
        assert_eq!(ticks as u32, floor as u32 * CELL_UNITS / config().fall_speed);
        assert!(ev.iter().any(|e| matches!(e, GameEvent::BlockLanded { .. })));
    }

    #[test]
    fn block_lands_on_stack_and_merges() {
        let mut game = Game::new(&config(), 0);
        let floor = game.board().rows() - 1;
        game.board_mut().place(Pos::new(0, floor), n(2));
        let mut ev = Vec::new();
        game.spawn_kind_at(0, n(2), &mut ev);
        run_until_landed(&mut game, &mut ev);
        assert_eq!(game.board().occupied_at(Pos::new(0, floor)), Some(n(4)));
        assert_eq!(game.board().block_count(), 1);
        assert_eq!(game.score().current(), 4);
    }

    #[test]
    fn spawn_into_occupied_top_cell_is_blocked() {
        let mut game = Game::new(&config(), 0);
        game.board_mut().place(Pos::new(1, 0), n(8));
        let mut ev = Vec::new();
        assert_eq!(game.spawn_kind_at(1, n(1), &mut ev), SpawnOutcome::Blocked);
        assert!(game.falling().is_none());
        assert!(ev.is_empty());
    }

    #[test]
    fn only_one_falling_block() {
        let mut game = Game::new(&config(), 0);
        let mut ev = Vec::new();
        assert_eq!(game.spawn_kind_at(0, n(1), &mut ev), SpawnOutcome::Spawned);
        assert_eq!(game.spawn_kind_at(1, n(1), &mut ev), SpawnOutcome::Busy);
        assert_eq!(game.spawn(&mut ev), SpawnOutcome::Busy);
        assert_eq!(game.falling().unwrap().col, 0);
    }

    #[test]
    fn shift_rejects_walls_and_occupied_cells() {
        let mut game = Game::new(&config(), 0);
        game.board_mut().place(Pos::new(1, 0), n(8));
        let mut ev = Vec::new();
        game.spawn_kind_at(0, n(1), &mut ev);
        assert!(!game.shift(-1, &mut ev));
        assert!(!game.shift(1, &mut ev));
        assert_eq!(game.falling().unwrap().col, 0);
        // fall below the obstruction's row, then the move is free
        while game.falling().unwrap().row() < 1 {
            game.tick(&mut ev);
        }
        assert!(game.shift(1, &mut ev));
        assert_eq!(game.falling().unwrap().col, 1);
    }

    #[test]
    fn hard_drop_lands_immediately() {
        let mut game = Game::new(&config(), 0);
        let floor = game.board().rows() - 1;
        game.board_mut().place(Pos::new(3, floor), n(16));
        let mut ev = Vec::new();
        game.spawn_kind_at(3, n(16), &mut ev);
        assert_eq!(game.ghost(), Some(Pos::new(3, floor - 1)));
        game.drop_block(&mut ev);
        assert!(game.falling().is_none());
        assert_eq!(game.board().occupied_at(Pos::new(3, floor)), Some(n(32)));
        assert_eq!(game.score().current(), 32);
        assert!(ev.iter().any(|e| matches!(e, GameEvent::Dropped { .. })));
    }

    #[test]
    fn blaster_fires_instead_of_landing() {
        let mut game = Game::new(&config(), 0);
        let floor = game.board().rows() - 1;
        game.board_mut().place(Pos::new(1, floor), n(4));
        game.board_mut().place(Pos::new(1, floor - 1), n(64));
        let mut ev = Vec::new();
        game.spawn_kind_at(1, BlockKind::Special(Special::Blaster), &mut ev);
        game.drop_block(&mut ev);
        assert!(game.falling().is_none());
        assert_eq!(game.score().current(), 64);
        assert_eq!(game.board().block_count(), 1);
        assert!(!game.board().blocks().any(|b| b.kind.is(Special::Blaster)));
    }

    #[test]
    fn blaster_without_shots_just_drops() {
        let cfg = GameConfig {
            blaster_shots: Some(0),
            ..config()
        };
        let mut game = Game::new(&cfg, 0);
        let floor = game.board().rows() - 1;
        game.board_mut().place(Pos::new(1, floor), n(4));
        let mut ev = Vec::new();
        game.spawn_kind_at(1, BlockKind::Special(Special::Blaster), &mut ev);
        game.drop_block(&mut ev);
        assert_eq!(game.score().current(), 0);
        assert_eq!(game.board().block_count(), 1);
    }

    #[test]
    fn landing_points_are_opt_in() {
        let cfg = GameConfig {
            landing_points: true,
            ..config()
        };
        let mut game = Game::new(&cfg, 0);
        let mut ev = Vec::new();
        game.spawn_kind_at(0, n(8), &mut ev);
        game.drop_block(&mut ev);
        assert_eq!(game.score().current(), 8);
    }

    #[test]
    fn settle_delay_holds_next_spawn() {
        let cfg = GameConfig {
            settle_delay_ms: 100,
            tick_rate: 50.0,
            ..config()
        };
        let mut game = Game::new(&cfg, 0);
        let mut ev = Vec::new();
        game.spawn_kind_at(0, n(1), &mut ev);
        game.drop_block(&mut ev);
        assert!(!game.ready_to_spawn());
        assert_eq!(game.spawn(&mut ev), SpawnOutcome::Busy);
        for _ in 0..ms_to_ticks(100, 50.0) {
            game.tick(&mut ev);
        }
        assert!(game.ready_to_spawn());
    }

    #[test]
    fn dev_override_falls_back_to_lowest() {
        let mut game = Game::new(&config(), 0);
        let mut ev = Vec::new();
        game.spawn_kind_at(0, n(64), &mut ev);
        game.set_active_kind(13);
        assert_eq!(
            game.falling().unwrap().kind,
            BlockKind::Special(Special::Magnet)
        );
        game.set_active_kind(99);
        assert_eq!(game.falling().unwrap().kind, BlockKind::LOWEST);
    }
}
