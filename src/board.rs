//! Grid of settled blocks: occupancy queries, add/remove, gravity compaction.

use crate::catalog::BlockKind;

/// Cell address. `row` 0 is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub col: usize,
    pub row: usize,
}

impl Pos {
    #[inline]
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

/// A settled block and where it sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    pub pos: Pos,
    pub kind: BlockKind,
}

/// One block relocated by compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fall {
    pub from: Pos,
    pub to: Pos,
}

/// Settled blocks, one per cell at most. Storage is row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cols: usize,
    rows: usize,
    cells: Vec<Option<BlockKind>>,
}

impl Board {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![None; cols * rows],
        }
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_within_bounds(&self, col: usize, row: usize) -> bool {
        col < self.cols && row < self.rows
    }

    #[inline]
    fn index(&self, pos: Pos) -> Option<usize> {
        self.is_within_bounds(pos.col, pos.row)
            .then(|| pos.row * self.cols + pos.col)
    }

    /// Kind settled at `pos`, if any. Out-of-bounds reads as empty.
    #[inline]
    pub fn occupied_at(&self, pos: Pos) -> Option<BlockKind> {
        self.index(pos).and_then(|i| self.cells[i])
    }

    #[inline]
    pub fn is_occupied(&self, pos: Pos) -> bool {
        self.occupied_at(pos).is_some()
    }

    /// Cell directly beneath `pos`, or `None` on the floor row.
    #[inline]
    pub fn below(&self, pos: Pos) -> Option<Pos> {
        (pos.row + 1 < self.rows).then(|| Pos::new(pos.col, pos.row + 1))
    }

    /// Blocks in one column, top to bottom.
    pub fn column_blocks(&self, col: usize) -> Vec<Settled> {
        (0..self.rows)
            .filter_map(|row| {
                let pos = Pos::new(col, row);
                self.occupied_at(pos).map(|kind| Settled { pos, kind })
            })
            .collect()
    }

    /// All settled blocks in row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = Settled> + '_ {
        self.cells.iter().enumerate().filter_map(|(i, cell)| {
            cell.map(|kind| Settled {
                pos: Pos::new(i % self.cols, i / self.cols),
                kind,
            })
        })
    }

    pub fn block_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Highest numeric value on the board; 1 when there is none.
    pub fn max_value(&self) -> u32 {
        self.blocks()
            .filter_map(|b| b.kind.value())
            .max()
            .unwrap_or(1)
    }

    /// First occupied row strictly below `row` in `col`.
    pub fn first_below(&self, col: usize, row: usize) -> Option<usize> {
        (row + 1..self.rows).find(|&r| self.is_occupied(Pos::new(col, r)))
    }

    /// Row a block at `(col, row)` would come to rest in if dropped straight down.
    pub fn resting_row(&self, col: usize, row: usize) -> usize {
        match self.first_below(col, row) {
            Some(r) => r - 1,
            None => self.rows.saturating_sub(1),
        }
    }

    /// Put a block in an empty cell. Refuses occupied or out-of-bounds cells.
    pub fn place(&mut self, pos: Pos, kind: BlockKind) -> bool {
        match self.index(pos) {
            Some(i) if self.cells[i].is_none() => {
                self.cells[i] = Some(kind);
                true
            }
            Some(_) => {
                tracing::warn!(?pos, ?kind, "refusing to place block on occupied cell");
                false
            }
            None => {
                tracing::warn!(?pos, ?kind, "refusing to place block out of bounds");
                false
            }
        }
    }

    /// Remove and return the block at `pos`.
    pub fn take(&mut self, pos: Pos) -> Option<BlockKind> {
        let i = self.index(pos)?;
        self.cells[i].take()
    }

    /// Reassign the kind of an occupied cell. Returns the previous kind.
    pub fn retype(&mut self, pos: Pos, kind: BlockKind) -> Option<BlockKind> {
        let i = self.index(pos)?;
        let slot = self.cells[i].as_mut()?;
        Some(std::mem::replace(slot, kind))
    }

    /// Exchange the contents of two cells.
    pub fn swap(&mut self, a: Pos, b: Pos) {
        if let (Some(i), Some(j)) = (self.index(a), self.index(b)) {
            self.cells.swap(i, j);
        }
    }

    /// Drop every floating block to the lowest free row in its column.
    ///
    /// Columns are independent. Within a column blocks keep their order. Returned
    /// falls are grouped by column (left to right), bottom-most first.
    pub fn compact(&mut self) -> Vec<Fall> {
        let mut falls = Vec::new();
        for col in 0..self.cols {
            let mut free = self.rows;
            for row in (0..self.rows).rev() {
                let from = Pos::new(col, row);
                let Some(kind) = self.occupied_at(from) else {
                    continue;
                };
                free -= 1;
                if free != row {
                    let to = Pos::new(col, free);
                    self.take(from);
                    self.place(to, kind);
                    falls.push(Fall { from, to });
                }
            }
        }
        falls
    }
}
