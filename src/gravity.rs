//! Gravity: compact every column so no occupied cell floats over a gap.

use crate::board::{Board, BoardError, Cell, Pos};

/// One cell sliding down its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMove {
    pub from: Pos,
    pub to: Pos,
    pub cell: Cell,
}

/// Drop every floating cell until it rests on the floor or another cell.
/// Columns are scanned from the second-to-last row upward; a single call fully
/// compacts the board. An empty result means nothing moved.
pub fn settle(board: &mut Board) -> Result<Vec<CellMove>, BoardError> {
    let rows = board.rows();
    let mut moves = Vec::new();
    if rows < 2 {
        return Ok(moves);
    }

    for col in 0..board.cols() {
        for row in (0..rows - 1).rev() {
            let cell = board.get(row, col)?;
            if cell.is_empty() || board.is_occupied(row + 1, col)? {
                continue;
            }
            let mut dest = row + 1;
            while dest + 1 < rows && !board.is_occupied(dest + 1, col)? {
                dest += 1;
            }
            board.set(dest, col, cell)?;
            board.clear(row, col)?;
            moves.push(CellMove {
                from: Pos::new(row, col),
                to: Pos::new(dest, col),
                cell,
            });
        }
    }
    Ok(moves)
}
