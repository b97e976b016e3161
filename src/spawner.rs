//! Next-block selection: a special roll, then a weighted numeric table that
//! widens as bigger tiles appear on the board.

use crate::board::Board;
use crate::catalog::{BlockKind, Catalog};
use rand::prelude::*;

/// Default percent chance that a spawn is a special block.
pub const SPECIAL_CHANCE: u32 = 10;

/// Base weights by tile value, always present.
const BASE_WEIGHTS: [(u32, u32); 4] = [(1, 50), (2, 30), (4, 15), (8, 5)];

/// (board max value threshold, tile value, weight). An unlocked tier adds its
/// weight on top of any base weight for that tile.
const ESCALATIONS: [(u32, u32, u32); 4] = [(8, 8, 10), (16, 16, 5), (32, 32, 3), (64, 64, 1)];

#[derive(Debug, Clone)]
pub struct Spawner {
    special_chance: u32,
}

impl Default for Spawner {
    fn default() -> Self {
        Self::new(SPECIAL_CHANCE)
    }
}

impl Spawner {
    pub fn new(special_chance: u32) -> Self {
        Self {
            special_chance: special_chance.min(100),
        }
    }

    /// Weighted numeric table for a board whose largest tile is `max_value`.
    pub fn weights(max_value: u32) -> Vec<(u32, u32)> {
        let mut table = BASE_WEIGHTS.to_vec();
        for &(threshold, value, weight) in &ESCALATIONS {
            if max_value < threshold {
                continue;
            }
            match table.iter_mut().find(|(v, _)| *v == value) {
                Some(entry) => entry.1 += weight,
                None => table.push((value, weight)),
            }
        }
        table
    }

    /// Pick the next block kind for `board`.
    pub fn next<R: Rng + ?Sized>(&self, board: &Board, catalog: &Catalog, rng: &mut R) -> BlockKind {
        let roll = rng.gen_range(0..100);
        if roll < self.special_chance {
            let specials = catalog.all_enabled_specials();
            if let Some(&s) = specials.choose(rng) {
                return BlockKind::Special(s);
            }
        }

        let table = Self::weights(board.max_value());
        let total: u32 = table.iter().map(|(_, w)| w).sum();
        let mut pick = rng.gen_range(0..total);
        for (value, weight) in table {
            if pick < weight {
                return catalog.by_value(value).unwrap_or(BlockKind::LOWEST);
            }
            pick -= weight;
        }
        BlockKind::LOWEST
    }

    /// Spawn column, uniform over the board width. Spawns always enter at row 0.
    pub fn column<R: Rng + ?Sized>(&self, cols: usize, rng: &mut R) -> usize {
        rng.gen_range(0..cols.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Pos;
    use crate::catalog::Special;

    #[test]
    fn empty_board_uses_base_table() {
        assert_eq!(Spawner::weights(1), vec![(1, 50), (2, 30), (4, 15), (8, 5)]);
    }

    #[test]
    fn escalations_unlock_without_touching_lower_tiers() {
        assert_eq!(Spawner::weights(4), Spawner::weights(1));
        assert_eq!(Spawner::weights(8), vec![(1, 50), (2, 30), (4, 15), (8, 15)]);
        assert_eq!(
            Spawner::weights(64),
            vec![(1, 50), (2, 30), (4, 15), (8, 15), (16, 5), (32, 3), (64, 1)]
        );
        assert_eq!(Spawner::weights(256), Spawner::weights(64));
    }

    #[test]
    fn numeric_only_catalog_never_yields_special() {
        let spawner = Spawner::new(100);
        let cat = Catalog::numeric_only();
        let board = Board::new(4, 12);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert!(spawner.next(&board, &cat, &mut rng).value().is_some());
        }
    }

    #[test]
    fn forced_special_picks_an_enabled_one() {
        let spawner = Spawner::new(100);
        let cat = Catalog::with_disabled(&[
            Special::Bug,
            Special::Wild,
            Special::Swap,
            Special::Bomb,
            Special::Magnet,
            Special::Zap,
            Special::Blaster,
        ]);
        let board = Board::new(4, 12);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            assert_eq!(
                spawner.next(&board, &cat, &mut rng),
                BlockKind::Special(Special::Nuke)
            );
        }
    }

    #[test]
    fn small_board_only_spawns_base_values() {
        let spawner = Spawner::new(0);
        let cat = Catalog::default();
        let mut board = Board::new(4, 12);
        board.place(Pos::new(0, 11), BlockKind::Number(2));
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..1000 {
            let v = spawner.next(&board, &cat, &mut rng).value().unwrap();
            assert!([1, 2, 4, 8].contains(&v), "unexpected {v}");
        }
    }

    #[test]
    fn big_tiles_unlock_bigger_spawns() {
        let spawner = Spawner::new(0);
        let cat = Catalog::default();
        let mut board = Board::new(4, 12);
        board.place(Pos::new(0, 11), BlockKind::Number(7));
        let mut rng = StdRng::seed_from_u64(3);
        let seen_big = (0..5000)
            .map(|_| spawner.next(&board, &cat, &mut rng).value().unwrap())
            .any(|v| v >= 16);
        assert!(seen_big);
    }
}
