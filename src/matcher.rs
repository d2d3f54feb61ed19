//! Match detection: 4-connected same-colour clusters via flood fill.

use crate::board::{Board, BoardError, Pos, PuyoColor};

/// Default minimum cluster size for removal.
pub const DEFAULT_MATCH_THRESHOLD: usize = 4;

/// Same-colour connected cells eligible for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub color: PuyoColor,
    pub cells: Vec<Pos>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.cells.len()
    }
}

const NEIGHBOURS_4: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Row-major scan; each unvisited puyo seeds a flood fill over its colour.
/// Ojama never seeds and never joins a cluster. Clusters smaller than
/// `threshold` are dropped.
pub fn find_matches(board: &Board, threshold: usize) -> Result<Vec<Cluster>, BoardError> {
    let (rows, cols) = (board.rows(), board.cols());
    let mut visited = vec![false; rows * cols];
    let mut clusters = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if visited[row * cols + col] {
                continue;
            }
            let Some(color) = board.get(row, col)?.matchable() else {
                continue;
            };

            let mut cells = Vec::new();
            let mut stack = vec![Pos::new(row, col)];
            visited[row * cols + col] = true;

            while let Some(p) = stack.pop() {
                cells.push(p);
                for (dr, dc) in NEIGHBOURS_4 {
                    let (nr, nc) = (p.row as i32 + dr, p.col as i32 + dc);
                    if !board.contains(nr, nc) {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if visited[nr * cols + nc] {
                        continue;
                    }
                    if board.get(nr, nc)?.matchable() == Some(color) {
                        visited[nr * cols + nc] = true;
                        stack.push(Pos::new(nr, nc));
                    }
                }
            }

            if cells.len() >= threshold {
                clusters.push(Cluster { color, cells });
            }
        }
    }
    Ok(clusters)
}
