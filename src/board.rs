//! Board: grid occupancy, the single source of truth for collision and matching.

use thiserror::Error;

/// Matchable piece colours. Ids 0..=3 index the theme palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PuyoColor {
    Red,
    Green,
    Blue,
    Yellow,
}

impl PuyoColor {
    pub const ALL: [Self; 4] = [Self::Red, Self::Green, Self::Blue, Self::Yellow];

    /// Colour id 0..4 for theme.puyo_color().
    pub fn index(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::Yellow => 3,
        }
    }
}

/// Single cell: empty, a coloured puyo, or inert junk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Puyo(PuyoColor),
    /// Blocks space and falls, but never matches and never seeds a flood fill.
    Ojama,
}

impl Cell {
    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }

    /// Colour if this cell can take part in a match.
    #[inline]
    pub fn matchable(self) -> Option<PuyoColor> {
        match self {
            Self::Puyo(c) => Some(c),
            _ => None,
        }
    }
}

/// Grid coordinate. Row 0 is the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("cell ({row}, {col}) is outside the {rows}x{cols} board")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// Fixed-size playfield. Cells are stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Board {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::Empty; rows * cols],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True if a signed coordinate lies on the board.
    #[inline]
    pub fn contains(&self, row: i32, col: i32) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    fn index(&self, row: usize, col: usize) -> Result<usize, BoardError> {
        if row >= self.rows || col >= self.cols {
            return Err(BoardError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Cell, BoardError> {
        let i = self.index(row, col)?;
        Ok(self.cells[i])
    }

    pub fn is_occupied(&self, row: usize, col: usize) -> Result<bool, BoardError> {
        Ok(!self.get(row, col)?.is_empty())
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) -> Result<(), BoardError> {
        let i = self.index(row, col)?;
        self.cells[i] = cell;
        Ok(())
    }

    pub fn clear(&mut self, row: usize, col: usize) -> Result<(), BoardError> {
        self.set(row, col, Cell::Empty)
    }

    /// Column new groups spawn into.
    #[inline]
    pub fn spawn_col(&self) -> usize {
        (self.cols / 2).saturating_sub(1)
    }

    /// The two top-row cells whose occupancy ends the game.
    pub fn spawn_trigger_cells(&self) -> [Pos; 2] {
        let c = self.spawn_col();
        [Pos::new(0, c), Pos::new(0, (c + 1).min(self.cols - 1))]
    }

    /// Game over if either spawn-trigger cell is occupied.
    pub fn is_spawn_blocked(&self) -> bool {
        self.spawn_trigger_cells()
            .iter()
            .any(|p| self.cells[p.row * self.cols + p.col] != Cell::Empty)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }

    /// Occupied cells with their coordinates, row-major.
    pub fn occupied(&self) -> impl Iterator<Item = (Pos, Cell)> + '_ {
        self.cells.iter().enumerate().filter_map(move |(i, &c)| {
            (!c.is_empty()).then(|| (Pos::new(i / self.cols, i % self.cols), c))
        })
    }

    /// Build a board from text rows, top first. `.` empty, `R G B Y` puyos, `O` ojama.
    #[cfg(test)]
    pub fn from_rows(rows: &[&str]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut board = Self::new(rows.len(), cols);
        for (r, line) in rows.iter().enumerate() {
            for (c, ch) in line.chars().enumerate() {
                let cell = match ch {
                    'R' => Cell::Puyo(PuyoColor::Red),
                    'G' => Cell::Puyo(PuyoColor::Green),
                    'B' => Cell::Puyo(PuyoColor::Blue),
                    'Y' => Cell::Puyo(PuyoColor::Yellow),
                    'O' => Cell::Ojama,
                    _ => Cell::Empty,
                };
                board.set(r, c, cell).unwrap();
            }
        }
        board
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_board_is_empty() {
        let board = Board::new(12, 6);
        assert_eq!(board.rows(), 12);
        assert_eq!(board.cols(), 6);
        for r in 0..12 {
            for c in 0..6 {
                assert_eq!(board.get(r, c), Ok(Cell::Empty));
                assert_eq!(board.is_occupied(r, c), Ok(false));
            }
        }
        assert_eq!(board.occupied_count(), 0);
    }

    #[test]
    fn set_get_and_clear() {
        let mut board = Board::new(12, 6);
        board.set(11, 0, Cell::Puyo(PuyoColor::Blue)).unwrap();
        board.set(3, 5, Cell::Ojama).unwrap();
        assert_eq!(board.get(11, 0), Ok(Cell::Puyo(PuyoColor::Blue)));
        assert_eq!(board.is_occupied(3, 5), Ok(true));
        assert_eq!(board.occupied_count(), 2);

        board.clear(11, 0).unwrap();
        assert_eq!(board.is_occupied(11, 0), Ok(false));
        assert_eq!(board.occupied_count(), 1);
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let mut board = Board::new(12, 6);
        let err = BoardError::OutOfBounds {
            row: 12,
            col: 0,
            rows: 12,
            cols: 6,
        };
        assert_eq!(board.get(12, 0), Err(err));
        assert_eq!(board.is_occupied(12, 0), Err(err));
        assert!(board.set(0, 6, Cell::Ojama).is_err());
        assert!(board.clear(99, 99).is_err());
        assert_eq!(board.occupied_count(), 0);
    }

    #[test]
    fn contains_checks_signed_coordinates() {
        let board = Board::new(12, 6);
        assert!(board.contains(0, 0));
        assert!(board.contains(11, 5));
        assert!(!board.contains(-1, 0));
        assert!(!board.contains(0, -1));
        assert!(!board.contains(12, 0));
        assert!(!board.contains(0, 6));
    }

    #[test]
    fn spawn_blocked_by_either_trigger_cell() {
        let mut board = Board::new(12, 6);
        assert_eq!(board.spawn_col(), 2);
        assert!(!board.is_spawn_blocked());

        board.set(0, 3, Cell::Ojama).unwrap();
        assert!(board.is_spawn_blocked());

        board.clear(0, 3).unwrap();
        board.set(0, 2, Cell::Puyo(PuyoColor::Red)).unwrap();
        assert!(board.is_spawn_blocked());

        board.clear(0, 2).unwrap();
        board.set(0, 0, Cell::Puyo(PuyoColor::Red)).unwrap();
        assert!(!board.is_spawn_blocked());
    }

    #[test]
    fn from_rows_parses_cells() {
        let board = Board::from_rows(&["R.O", ".GY", "B.."]);
        assert_eq!(board.get(0, 0), Ok(Cell::Puyo(PuyoColor::Red)));
        assert_eq!(board.get(0, 2), Ok(Cell::Ojama));
        assert_eq!(board.get(1, 2), Ok(Cell::Puyo(PuyoColor::Yellow)));
        assert_eq!(board.occupied().count(), 5);
    }
}
