//! Active group: the falling unit of three puyos the player steers.

use crate::board::{Board, BoardError, Cell, Pos, PuyoColor};

/// Members per group.
pub const GROUP_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Stacked in one column, rows y..y+3.
    Vertical,
    /// Side by side in one row, columns x..x+3.
    Horizontal,
}

impl Orientation {
    fn toggled(self) -> Self {
        match self {
            Self::Vertical => Self::Horizontal,
            Self::Horizontal => Self::Vertical,
        }
    }

    /// (row step, col step) between consecutive members.
    fn delta(self) -> (i32, i32) {
        match self {
            Self::Vertical => (1, 0),
            Self::Horizontal => (0, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Result of one downward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved,
    Locked,
}

/// Falling group: anchor is the first member; the others follow the orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGroup {
    pub x: i32,
    pub y: i32,
    pub orientation: Orientation,
    pub colors: [PuyoColor; GROUP_LEN],
}

impl ActiveGroup {
    /// New vertical group at the top of the spawn column.
    pub fn spawn_on(board: &Board, colors: [PuyoColor; GROUP_LEN]) -> Self {
        Self {
            x: board.spawn_col() as i32,
            y: 0,
            orientation: Orientation::Vertical,
            colors,
        }
    }

    /// Member coordinates for a given anchor and orientation (may be off-board).
    fn cells_at(x: i32, y: i32, orientation: Orientation) -> [(i32, i32); GROUP_LEN] {
        let (dr, dc) = orientation.delta();
        let mut out = [(0, 0); GROUP_LEN];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (y + dr * i as i32, x + dc * i as i32);
        }
        out
    }

    /// Current member (row, col) coordinates, anchor first.
    pub fn cells(&self) -> [(i32, i32); GROUP_LEN] {
        Self::cells_at(self.x, self.y, self.orientation)
    }

    /// Members paired with their board position. Only valid while the group is on the board.
    pub fn placed(&self) -> impl Iterator<Item = (Pos, PuyoColor)> + '_ {
        self.cells()
            .into_iter()
            .zip(self.colors)
            .map(|((r, c), color)| (Pos::new(r.max(0) as usize, c.max(0) as usize), color))
    }

    /// True if every cell is on the board and empty.
    pub fn fits(board: &Board, cells: &[(i32, i32)]) -> Result<bool, BoardError> {
        for &(r, c) in cells {
            if !board.contains(r, c) || board.is_occupied(r as usize, c as usize)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Shift one column. Returns false (no change) when off-board or blocked.
    pub fn shift(&mut self, board: &Board, dir: Direction) -> Result<bool, BoardError> {
        let nx = match dir {
            Direction::Left => self.x - 1,
            Direction::Right => self.x + 1,
        };
        let target = Self::cells_at(nx, self.y, self.orientation);
        if !Self::fits(board, &target)? {
            return Ok(false);
        }
        self.x = nx;
        Ok(true)
    }

    /// Toggle orientation, clamping the anchor back onto the board.
    /// Occupied cells do not block rotation.
    pub fn rotate(&mut self, board: &Board) {
        let span = GROUP_LEN as i32 - 1;
        self.orientation = self.orientation.toggled();
        match self.orientation {
            Orientation::Horizontal => {
                let max_x = board.cols() as i32 - 1 - span;
                self.x = self.x.min(max_x).max(0);
            }
            Orientation::Vertical => {
                let max_y = board.rows() as i32 - 1 - span;
                self.y = self.y.min(max_y).max(0);
            }
        }
    }

    /// True if every member can advance one row.
    pub fn can_descend(&self, board: &Board) -> Result<bool, BoardError> {
        let target = Self::cells_at(self.x, self.y + 1, self.orientation);
        Self::fits(board, &target)
    }

    /// Advance one row, or write the members into the board when blocked.
    /// On `Locked` the caller drops the group; its cells now belong to the board.
    pub fn step(&mut self, board: &mut Board) -> Result<StepOutcome, BoardError> {
        if self.can_descend(board)? {
            self.y += 1;
            return Ok(StepOutcome::Moved);
        }
        self.lock_into(board)?;
        Ok(StepOutcome::Locked)
    }

    fn lock_into(&self, board: &mut Board) -> Result<(), BoardError> {
        for (pos, color) in self.placed() {
            board.set(pos.row, pos.col, Cell::Puyo(color))?;
        }
        Ok(())
    }
}
