//! Landing resolution: special effects, merge chains and gravity, driven by a
//! work list until the board is quiescent.
//!
//! Resolution is synchronous. The board is mutated to its final state at once
//! and every step is recorded as a [`GameEvent`] so presentation can replay it
//! at its own pace.

use crate::board::{Board, Pos};
use crate::catalog::{BlockKind, Catalog, Special};
use rand::prelude::*;
use std::collections::VecDeque;
use tracing::debug;

/// What happened, for renderers and audio. Carries no logic back into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Countdown(u8),
    Spawned { pos: Pos, kind: BlockKind },
    Moved { from: Pos, to: Pos },
    /// Hard drop straight to `to` (fast cadence).
    Dropped { from: Pos, to: Pos },
    BlockLanded { pos: Pos, kind: BlockKind },
    /// Two blocks merged into `value` at `pos`.
    Merged { pos: Pos, value: u32 },
    /// Doubling past the largest tile: points awarded, block removed.
    MaxMerge { pos: Pos, points: u32 },
    SpecialTriggered { kind: Special, pos: Pos },
    /// A special found no target and did nothing.
    SpecialFailed { kind: Special, pos: Pos },
    Removed { pos: Pos, kind: BlockKind, points: u32 },
    /// Bug and Wild cancelled each other.
    Annihilated { upper: Pos, lower: Pos },
    Swapped { upper: Pos, lower: Pos },
    Shuffled { col: usize },
    Fell { from: Pos, to: Pos },
    Scored(u32),
    Paused,
    Resumed,
    GameOver { score: u32, best: u32, new_best: bool },
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub points: u32,
    /// Merge steps taken, across all chains.
    pub merges: u32,
    pub events: Vec<GameEvent>,
}

/// How an upper block pairs with the block directly beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pairing {
    None,
    Annihilate,
    /// Legal merge; the value that doubles.
    Merge(u32),
}

fn pairing(upper: BlockKind, lower: BlockKind) -> Pairing {
    use BlockKind::{Number, Special as S};
    match (upper, lower) {
        (S(Special::Bug), S(Special::Wild)) | (S(Special::Wild), S(Special::Bug)) => {
            Pairing::Annihilate
        }
        (Number(a), Number(b)) if a == b => Pairing::Merge(1u32 << a),
        (S(Special::Wild), Number(e)) | (Number(e), S(Special::Wild)) => {
            Pairing::Merge(1u32 << e)
        }
        (S(Special::Wild), S(Special::Wild)) => Pairing::Merge(1),
        _ => Pairing::None,
    }
}

/// Resolve a block that just settled at `pos`.
pub fn resolve_landing<R: Rng + ?Sized>(
    board: &mut Board,
    catalog: &Catalog,
    rng: &mut R,
    pos: Pos,
) -> Resolution {
    let mut r = Resolver::new(board, catalog, rng);
    r.dispatch(pos);
    r.settle();
    r.out
}

/// Blaster shot from a falling block at `(col, row)`: removes and scores the
/// first settled block beneath it. The Blaster itself never settles.
pub fn resolve_blaster<R: Rng + ?Sized>(
    board: &mut Board,
    catalog: &Catalog,
    rng: &mut R,
    col: usize,
    row: usize,
) -> Resolution {
    let origin = Pos::new(col, row);
    let mut r = Resolver::new(board, catalog, rng);
    match r.board.first_below(col, row) {
        Some(target) => {
            r.trigger(Special::Blaster, origin);
            r.remove_scored(Pos::new(col, target));
        }
        None => r.fail(Special::Blaster, origin),
    }
    r.settle();
    r.out
}

struct Resolver<'a, R: ?Sized> {
    board: &'a mut Board,
    catalog: &'a Catalog,
    rng: &'a mut R,
    /// Cells awaiting merge evaluation, in order.
    pending: VecDeque<Pos>,
    out: Resolution,
}

impl<'a, R: Rng + ?Sized> Resolver<'a, R> {
    fn new(board: &'a mut Board, catalog: &'a Catalog, rng: &'a mut R) -> Self {
        Self {
            board,
            catalog,
            rng,
            pending: VecDeque::new(),
            out: Resolution::default(),
        }
    }

    fn emit(&mut self, event: GameEvent) {
        self.out.events.push(event);
    }

    fn award(&mut self, points: u32) {
        if points > 0 {
            self.out.points = self.out.points.saturating_add(points);
            self.emit(GameEvent::Scored(points));
        }
    }

    fn trigger(&mut self, kind: Special, pos: Pos) {
        debug!(?kind, ?pos, "special triggered");
        self.emit(GameEvent::SpecialTriggered { kind, pos });
    }

    fn fail(&mut self, kind: Special, pos: Pos) {
        debug!(?kind, ?pos, "special had no target");
        self.emit(GameEvent::SpecialFailed { kind, pos });
    }

    /// Remove a block without scoring it.
    fn discard(&mut self, pos: Pos) {
        if let Some(kind) = self.board.take(pos) {
            self.emit(GameEvent::Removed { pos, kind, points: 0 });
        }
    }

    /// Remove a block and score its value (0 for specials).
    fn remove_scored(&mut self, pos: Pos) {
        if let Some(kind) = self.board.take(pos) {
            let points = kind.points();
            self.emit(GameEvent::Removed { pos, kind, points });
            self.award(points);
        }
    }

    /// Per-kind handling of the block that just landed at `pos`.
    fn dispatch(&mut self, pos: Pos) {
        let Some(kind) = self.board.occupied_at(pos) else {
            return;
        };
        match kind {
            BlockKind::Number(_)
            | BlockKind::Special(Special::Bug)
            | BlockKind::Special(Special::Wild) => self.pending.push_back(pos),
            BlockKind::Special(Special::Swap) => self.swap(pos),
            BlockKind::Special(Special::Bomb) => self.bomb(pos),
            BlockKind::Special(Special::Magnet) => self.magnet(pos),
            BlockKind::Special(Special::Zap) => self.zap(pos),
            BlockKind::Special(Special::Nuke) => self.nuke(pos),
            BlockKind::Special(Special::Blaster) => {
                // Landed instead of firing: it never stays on the grid.
                self.discard(pos);
                self.fail(Special::Blaster, pos);
            }
        }
    }

    fn swap(&mut self, pos: Pos) {
        self.discard(pos);
        let upper = self.board.below(pos).filter(|&p| self.board.is_occupied(p));
        let lower = upper
            .and_then(|p| self.board.below(p))
            .filter(|&p| self.board.is_occupied(p));
        match (upper, lower) {
            (Some(upper), Some(lower)) => {
                self.trigger(Special::Swap, pos);
                self.board.swap(upper, lower);
                self.emit(GameEvent::Swapped { upper, lower });
                self.pending.push_back(lower);
                self.pending.push_back(upper);
            }
            _ => self.fail(Special::Swap, pos),
        }
    }

    fn bomb(&mut self, pos: Pos) {
        self.discard(pos);
        match self.board.below(pos).filter(|&p| self.board.is_occupied(p)) {
            Some(target) => {
                self.trigger(Special::Bomb, pos);
                self.remove_scored(target);
            }
            None => self.fail(Special::Bomb, pos),
        }
    }

    fn magnet(&mut self, pos: Pos) {
        let others: Vec<_> = self
            .board
            .column_blocks(pos.col)
            .into_iter()
            .filter(|b| b.pos != pos)
            .collect();
        self.discard(pos);
        if others.len() < 2 {
            self.fail(Special::Magnet, pos);
            return;
        }
        self.trigger(Special::Magnet, pos);
        let mut kinds: Vec<_> = others.iter().map(|b| b.kind).collect();
        kinds.shuffle(&mut *self.rng);
        for (block, kind) in others.iter().zip(kinds) {
            self.board.retype(block.pos, kind);
        }
        self.emit(GameEvent::Shuffled { col: pos.col });
        // top to bottom, one at a time
        self.pending.extend(others.iter().map(|b| b.pos));
    }

    fn zap(&mut self, pos: Pos) {
        let Some(target) = self.board.below(pos).filter(|&p| self.board.is_occupied(p)) else {
            self.discard(pos);
            self.fail(Special::Zap, pos);
            return;
        };
        self.trigger(Special::Zap, pos);
        let row = target.row;
        let mut hit = vec![target];
        for col in (0..target.col).rev() {
            let p = Pos::new(col, row);
            if !self.board.is_occupied(p) {
                break;
            }
            hit.push(p);
        }
        for col in target.col + 1..self.board.cols() {
            let p = Pos::new(col, row);
            if !self.board.is_occupied(p) {
                break;
            }
            hit.push(p);
        }
        for p in hit {
            self.remove_scored(p);
        }
        self.discard(pos);
    }

    fn nuke(&mut self, pos: Pos) {
        let column: Vec<_> = self
            .board
            .column_blocks(pos.col)
            .into_iter()
            .filter(|b| b.pos != pos)
            .collect();
        if column.is_empty() {
            self.discard(pos);
            self.fail(Special::Nuke, pos);
            return;
        }
        self.trigger(Special::Nuke, pos);
        for b in column.iter().rev() {
            self.remove_scored(b.pos);
        }
        self.discard(pos);
    }

    /// Pair rule and merge chain for the block at `pos`, iterated down the column.
    fn evaluate(&mut self, start: Pos) {
        let mut pos = start;
        loop {
            let Some(upper) = self.board.occupied_at(pos) else {
                return;
            };
            let Some(below) = self.board.below(pos) else {
                return;
            };
            let Some(lower) = self.board.occupied_at(below) else {
                return;
            };
            match pairing(upper, lower) {
                Pairing::None => return,
                Pairing::Annihilate => {
                    self.board.take(pos);
                    self.board.take(below);
                    debug!(?pos, "bug and wild annihilated");
                    self.emit(GameEvent::Annihilated { upper: pos, lower: below });
                    return;
                }
                Pairing::Merge(value) => {
                    self.board.take(pos);
                    self.board.take(below);
                    let doubled = value * 2;
                    self.out.merges += 1;
                    match self.catalog.by_value(doubled) {
                        Some(kind) => {
                            self.board.place(below, kind);
                            debug!(?below, doubled, "merged");
                            self.emit(GameEvent::Merged { pos: below, value: doubled });
                            self.award(doubled);
                            pos = below;
                        }
                        None => {
                            debug!(?below, doubled, "max merge");
                            self.emit(GameEvent::MaxMerge { pos: below, points: doubled });
                            self.award(doubled);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn drain(&mut self) {
        while let Some(pos) = self.pending.pop_front() {
            self.evaluate(pos);
        }
    }

    /// Alternate merge evaluation and compaction until the board is quiescent.
    fn settle(&mut self) {
        loop {
            self.drain();
            let falls = self.board.compact();
            if falls.is_empty() {
                return;
            }
            for f in falls {
                self.emit(GameEvent::Fell { from: f.from, to: f.to });
                self.pending.push_back(f.to);
            }
        }
    }
}
