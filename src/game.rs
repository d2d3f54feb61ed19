//! Game state: board, active group, colour feed, chain resolution, score.

use crate::board::{Board, BoardError, Cell, Pos, PuyoColor};
use crate::gravity::{self, CellMove};
use crate::group::{ActiveGroup, Direction, GROUP_LEN, StepOutcome};
use crate::matcher::{self, Cluster, DEFAULT_MATCH_THRESHOLD};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Groups shown in the next preview.
pub const NEXT_QUEUE_LEN: usize = 2;

/// Points per removed cell.
pub const DEFAULT_CELL_REWARD: u32 = 10;

/// Board size and scoring rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    pub rows: usize,
    pub cols: usize,
    pub match_threshold: usize,
    pub cell_reward: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            rows: 12,
            cols: 6,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            cell_reward: DEFAULT_CELL_REWARD,
        }
    }
}

/// Seeded source of group colours with a short look-ahead queue.
#[derive(Debug, Clone)]
pub struct ColorFeed {
    queue: VecDeque<[PuyoColor; GROUP_LEN]>,
    rng: StdRng,
}

impl ColorFeed {
    pub fn new(seed: u64) -> Self {
        let mut feed = Self {
            queue: VecDeque::with_capacity(NEXT_QUEUE_LEN + 1),
            rng: StdRng::seed_from_u64(seed),
        };
        feed.refill();
        feed
    }

    fn draw(&mut self) -> [PuyoColor; GROUP_LEN] {
        std::array::from_fn(|_| PuyoColor::ALL[self.rng.random_range(0..PuyoColor::ALL.len())])
    }

    fn refill(&mut self) {
        while self.queue.len() < NEXT_QUEUE_LEN + 1 {
            let colors = self.draw();
            self.queue.push_back(colors);
        }
    }

    pub fn next(&mut self) -> [PuyoColor; GROUP_LEN] {
        self.refill();
        let colors = self.queue.pop_front().unwrap_or_else(|| self.draw());
        self.refill();
        colors
    }

    /// Upcoming groups, soonest first.
    pub fn upcoming(&self) -> impl Iterator<Item = &[PuyoColor; GROUP_LEN]> {
        self.queue.iter().take(NEXT_QUEUE_LEN)
    }
}

/// Notifications for the presentation layer, drained with [`Game::take_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Spawned(ActiveGroup),
    SpawnBlocked,
    /// Group cells now owned by the board.
    Locked(Vec<(Pos, Cell)>),
    /// Cells that fell during a settle.
    Settled(Vec<CellMove>),
    /// Cells cleared by one resolution pass.
    Removed {
        cells: Vec<(Pos, Cell)>,
        chain: u32,
        gained: u32,
    },
    OjamaDropped(Vec<Pos>),
    GameOver {
        score: u32,
        best: u32,
        new_best: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// A group may be falling; input accepted.
    Idle,
    /// Chain resolution in progress; input rejected.
    Resolving,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned,
    Blocked,
}

/// What one resolution pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Clusters removed; another pass follows.
    Removed(usize),
    /// Cells fell but nothing matched; another pass follows.
    Settled,
    /// Nothing moved and nothing matched; resolution finished.
    Stable,
}

/// Simulation context: everything the core mutates, owned by the caller.
#[derive(Debug)]
pub struct Game {
    rules: Rules,
    board: Board,
    group: Option<ActiveGroup>,
    feed: ColorFeed,
    state: EngineState,
    score: u32,
    best: u32,
    chain: u32,
    events: Vec<GameEvent>,
}

impl Game {
    /// New game with the first group already spawned.
    pub fn new(rules: Rules, seed: u64, best: u32) -> Result<Self, BoardError> {
        let mut game = Self {
            rules,
            board: Board::new(rules.rows, rules.cols),
            group: None,
            feed: ColorFeed::new(seed),
            state: EngineState::Idle,
            score: 0,
            best,
            chain: 0,
            events: Vec::new(),
        };
        game.spawn_next()?;
        Ok(game)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn group(&self) -> Option<&ActiveGroup> {
        self.group.as_ref()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_over(&self) -> bool {
        self.state == EngineState::GameOver
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn best(&self) -> u32 {
        self.best
    }

    /// Removal passes so far in the current resolution.
    pub fn chain(&self) -> u32 {
        self.chain
    }

    pub fn upcoming(&self) -> impl Iterator<Item = &[PuyoColor; GROUP_LEN]> {
        self.feed.upcoming()
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn accepts_input(&self) -> bool {
        self.state == EngineState::Idle && self.group.is_some()
    }

    /// Place a new group at the spawn point, or end the game if it is blocked.
    pub fn spawn(&mut self, colors: [PuyoColor; GROUP_LEN]) -> Result<SpawnOutcome, BoardError> {
        if self.state == EngineState::GameOver {
            return Ok(SpawnOutcome::Blocked);
        }
        let group = ActiveGroup::spawn_on(&self.board, colors);
        if self.board.is_spawn_blocked() || !ActiveGroup::fits(&self.board, &group.cells())? {
            info!(score = self.score, "spawn blocked");
            self.group = None;
            self.events.push(GameEvent::SpawnBlocked);
            self.finish();
            return Ok(SpawnOutcome::Blocked);
        }
        debug!(?colors, "spawned group");
        self.events.push(GameEvent::Spawned(group.clone()));
        self.group = Some(group);
        self.state = EngineState::Idle;
        Ok(SpawnOutcome::Spawned)
    }

    fn spawn_next(&mut self) -> Result<SpawnOutcome, BoardError> {
        let colors = self.feed.next();
        self.spawn(colors)
    }

    /// Shift the group one column. False when rejected.
    pub fn move_group(&mut self, dir: Direction) -> Result<bool, BoardError> {
        if !self.accepts_input() {
            return Ok(false);
        }
        match self.group.as_mut() {
            Some(group) => group.shift(&self.board, dir),
            None => Ok(false),
        }
    }

    /// Toggle orientation with wall clamping. False when rejected.
    pub fn rotate(&mut self) -> bool {
        if !self.accepts_input() {
            return false;
        }
        match self.group.as_mut() {
            Some(group) => {
                group.rotate(&self.board);
                true
            }
            None => false,
        }
    }

    /// One gravity tick (timer or soft drop). `None` when rejected.
    pub fn step(&mut self) -> Result<Option<StepOutcome>, BoardError> {
        if !self.accepts_input() {
            return Ok(None);
        }
        let Some(group) = self.group.as_mut() else {
            return Ok(None);
        };
        let outcome = group.step(&mut self.board)?;
        if outcome == StepOutcome::Locked {
            let cells = self
                .group
                .take()
                .map(|g| g.placed().map(|(p, c)| (p, Cell::Puyo(c))).collect::<Vec<_>>())
                .unwrap_or_default();
            debug!(?cells, "group locked");
            self.events.push(GameEvent::Locked(cells));
            self.begin_resolution();
        }
        Ok(Some(outcome))
    }

    /// Step until the group locks. False when rejected.
    pub fn hard_drop(&mut self) -> Result<bool, BoardError> {
        if !self.accepts_input() {
            return Ok(false);
        }
        while self.step()? == Some(StepOutcome::Moved) {}
        Ok(true)
    }

    fn begin_resolution(&mut self) {
        self.state = EngineState::Resolving;
        self.chain = 0;
    }

    /// Run exactly one resolution pass. `None` when not resolving.
    /// On `Stable` the next group is spawned (or the game ends).
    pub fn advance(&mut self) -> Result<Option<Pass>, BoardError> {
        if self.state != EngineState::Resolving {
            return Ok(None);
        }

        let moves = gravity::settle(&mut self.board)?;
        let moved = !moves.is_empty();
        if moved {
            debug!(count = moves.len(), "settled");
            self.events.push(GameEvent::Settled(moves));
        }

        let clusters = matcher::find_matches(&self.board, self.rules.match_threshold)?;
        if !clusters.is_empty() {
            let mut cells = Vec::new();
            for cluster in &clusters {
                for p in &cluster.cells {
                    cells.push((*p, self.board.get(p.row, p.col)?));
                    self.board.clear(p.row, p.col)?;
                }
            }
            let removed = u32::try_from(cells.len()).unwrap_or(u32::MAX);
            let gained = self.rules.cell_reward.saturating_mul(removed);
            self.score = self.score.saturating_add(gained);
            self.chain += 1;
            let sizes: Vec<usize> = clusters.iter().map(Cluster::size).collect();
            debug!(chain = self.chain, ?sizes, gained, "cleared clusters");
            self.events.push(GameEvent::Removed {
                cells,
                chain: self.chain,
                gained,
            });
            return Ok(Some(Pass::Removed(clusters.len())));
        }
        if moved {
            return Ok(Some(Pass::Settled));
        }

        debug!(chain = self.chain, occupied = self.board.occupied_count(), "board stable");
        self.state = EngineState::Idle;
        self.spawn_next()?;
        Ok(Some(Pass::Stable))
    }

    /// Run passes until stable. Returns the number of passes taken.
    pub fn resolve(&mut self) -> Result<usize, BoardError> {
        let mut passes = 0;
        while let Some(pass) = self.advance()? {
            passes += 1;
            if pass == Pass::Stable {
                break;
            }
        }
        Ok(passes)
    }

    /// Interrupt play with a flood of junk: the falling group is discarded and
    /// `count` ojama pieces drop into random columns. Resolution follows.
    pub fn drop_ojama(&mut self, count: usize) -> Result<bool, BoardError> {
        if self.state != EngineState::Idle {
            return Ok(false);
        }
        self.group = None;
        let mut placed = Vec::new();
        let mut moves = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let mut free: Vec<usize> = Vec::with_capacity(self.board.cols());
            for col in 0..self.board.cols() {
                if !self.board.is_occupied(0, col)? {
                    free.push(col);
                }
            }
            if free.is_empty() {
                break;
            }
            free.shuffle(&mut self.feed.rng);
            for &col in free.iter().take(remaining) {
                self.board.set(0, col, Cell::Ojama)?;
                placed.push(Pos::new(0, col));
                remaining -= 1;
            }
            moves.extend(gravity::settle(&mut self.board)?);
        }
        info!(requested = count, dropped = placed.len(), "ojama flood");
        // Drops are reported at their entry cells, then the falls that bring them to rest.
        self.events.push(GameEvent::OjamaDropped(placed));
        if !moves.is_empty() {
            self.events.push(GameEvent::Settled(moves));
        }
        self.begin_resolution();
        Ok(true)
    }

    /// End the game immediately, as if the spawn were blocked.
    pub fn force_game_over(&mut self) -> bool {
        if self.state == EngineState::GameOver {
            return false;
        }
        info!(score = self.score, "game over forced");
        self.group = None;
        self.finish();
        true
    }

    fn finish(&mut self) {
        self.state = EngineState::GameOver;
        let new_best = self.score > self.best;
        info!(score = self.score, best = self.best, new_best, "game over");
        self.events.push(GameEvent::GameOver {
            score: self.score,
            best: self.best,
            new_best,
        });
        if new_best {
            self.best = self.score;
        }
    }

    /// Replace the board and start resolving it, with no group in play.
    #[cfg(test)]
    fn resolve_from(&mut self, board: Board) {
        self.board = board;
        self.group = None;
        self.begin_resolution();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::strategies::board_strategy;
    use crate::group::Orientation;
    use PuyoColor::*;
    use proptest::prelude::*;

    fn game() -> Game {
        Game::new(Rules::default(), 7, 0).unwrap()
    }

    fn group_cells(game: &Game) -> Vec<(i32, i32)> {
        game.group().map(|g| g.cells().to_vec()).unwrap_or_default()
    }

    #[test]
    fn new_game_spawns_first_group() {
        let mut g = game();
        assert_eq!(g.state(), EngineState::Idle);
        assert_eq!(group_cells(&g), vec![(0, 2), (1, 2), (2, 2)]);
        assert_eq!(g.upcoming().count(), NEXT_QUEUE_LEN);
        let events = g.take_events();
        assert!(matches!(events.as_slice(), [GameEvent::Spawned(_)]));
        assert!(g.take_events().is_empty());
    }

    #[test]
    fn same_seed_draws_same_colours() {
        let mut a = ColorFeed::new(42);
        let mut b = ColorFeed::new(42);
        for _ in 0..20 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn upcoming_becomes_next_spawn() {
        let mut g = game();
        let expected = *g.upcoming().next().unwrap();
        g.hard_drop().unwrap();
        g.resolve().unwrap();
        assert_eq!(g.group().unwrap().colors, expected);
    }

    #[test]
    fn step_locks_and_enters_resolution() {
        let mut g = game();
        g.take_events();
        assert!(g.hard_drop().unwrap());
        assert!(g.group().is_none());
        assert_eq!(g.state(), EngineState::Resolving);
        assert_eq!(g.board().occupied_count(), 3);
        let events = g.take_events();
        match events.as_slice() {
            [GameEvent::Locked(cells)] => {
                let positions: Vec<Pos> = cells.iter().map(|(p, _)| *p).collect();
                assert_eq!(positions, vec![Pos::new(9, 2), Pos::new(10, 2), Pos::new(11, 2)]);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn input_is_rejected_while_resolving() {
        let mut g = game();
        g.hard_drop().unwrap();
        assert_eq!(g.state(), EngineState::Resolving);
        assert!(!g.move_group(Direction::Left).unwrap());
        assert!(!g.rotate());
        assert_eq!(g.step().unwrap(), None);
        assert!(!g.hard_drop().unwrap());
        assert!(!g.drop_ojama(5).unwrap());
    }

    #[test]
    fn resolution_spawns_next_group() {
        let mut g = game();
        g.hard_drop().unwrap();
        g.take_events();
        assert_eq!(g.advance().unwrap(), Some(Pass::Stable));
        assert_eq!(g.state(), EngineState::Idle);
        assert!(g.group().is_some());
        assert!(matches!(g.take_events().as_slice(), [GameEvent::Spawned(_)]));
        assert_eq!(g.advance().unwrap(), None);
    }

    #[test]
    fn l_shape_is_removed_for_forty_points() {
        let mut g = game();
        g.resolve_from(Board::from_rows(&[
            "......", "......", "......", "......", "......", "......", //
            "......", "......", "......", "R.....", "R.....", "RR....",
        ]));
        g.take_events();
        assert_eq!(g.advance().unwrap(), Some(Pass::Removed(1)));
        assert_eq!(g.score(), 40);
        assert_eq!(g.board().occupied_count(), 0);
        match g.take_events().as_slice() {
            [GameEvent::Removed { cells, chain, gained }] => {
                assert_eq!(cells.len(), 4);
                assert_eq!(*chain, 1);
                assert_eq!(*gained, 40);
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert_eq!(g.advance().unwrap(), Some(Pass::Stable));
        assert_eq!(g.score(), 40);
    }

    #[test]
    fn two_step_chain_counts_both_removals() {
        // Clearing the reds drops the top green onto the other three.
        let mut g = game();
        g.resolve_from(Board::from_rows(&[
            "......", "......", "......", "......", "......", "......", //
            "......", "G.....", "R.....", "R.....", "RG....", "RGG...",
        ]));
        g.resolve().unwrap();
        assert_eq!(g.chain(), 2);
        assert_eq!(g.score(), 80);
        assert_eq!(g.board().occupied_count(), 0);
        let chains: Vec<u32> = g
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                GameEvent::Removed { chain, .. } => Some(chain),
                _ => None,
            })
            .collect();
        assert_eq!(chains, vec![1, 2]);
    }

    #[test]
    fn floating_cells_settle_before_matching() {
        let mut g = game();
        g.resolve_from(Board::from_rows(&[
            "......", "......", "......", "......", "......", "......", //
            "......", "......", "B.....", "......", "......", "BBB...",
        ]));
        g.take_events();
        assert_eq!(g.advance().unwrap(), Some(Pass::Removed(1)));
        let events = g.take_events();
        assert!(matches!(events[0], GameEvent::Settled(_)));
        assert!(matches!(events[1], GameEvent::Removed { .. }));
    }

    #[test]
    fn spawn_blocked_by_trigger_cells_ends_game() {
        let mut g = game();
        g.hard_drop().unwrap();
        g.resolve().unwrap();
        g.group = None;
        g.board.set(0, 2, Cell::Ojama).unwrap();
        g.board.set(0, 3, Cell::Ojama).unwrap();
        g.take_events();
        assert_eq!(g.spawn([Red, Red, Red]).unwrap(), SpawnOutcome::Blocked);
        assert!(g.group().is_none());
        assert!(g.is_over());
        let events = g.take_events();
        assert_eq!(events[0], GameEvent::SpawnBlocked);
        assert!(matches!(events[1], GameEvent::GameOver { .. }));
    }

    #[test]
    fn filled_spawn_column_ends_game_after_resolution() {
        let mut g = Game::new(Rules::default(), 3, 0).unwrap();
        g.group = None;
        // Column 2 full of alternating ojama/puyo; nothing can match.
        let mut board = Board::new(12, 6);
        for row in 0..12 {
            let cell = if row % 2 == 0 { Cell::Ojama } else { Cell::Puyo(Blue) };
            board.set(row, 2, cell).unwrap();
        }
        g.resolve_from(board);
        g.resolve().unwrap();
        assert!(g.is_over());
        assert!(g.group().is_none());
    }

    #[test]
    fn game_over_reports_new_best() {
        let mut g = Game::new(Rules::default(), 1, 30).unwrap();
        g.score = 50;
        g.take_events();
        assert!(g.force_game_over());
        assert_eq!(
            g.take_events(),
            vec![GameEvent::GameOver {
                score: 50,
                best: 30,
                new_best: true,
            }]
        );
        assert_eq!(g.best(), 50);
        assert!(!g.force_game_over());
    }

    #[test]
    fn game_over_without_new_best() {
        let mut g = Game::new(Rules::default(), 1, 500).unwrap();
        g.force_game_over();
        assert!(g.take_events().contains(&GameEvent::GameOver {
            score: 0,
            best: 500,
            new_best: false,
        }));
        assert_eq!(g.best(), 500);
    }

    #[test]
    fn input_rejected_after_game_over() {
        let mut g = game();
        g.force_game_over();
        assert!(!g.rotate());
        assert_eq!(g.step().unwrap(), None);
        assert_eq!(g.spawn([Red, Green, Blue]).unwrap(), SpawnOutcome::Blocked);
    }

    #[test]
    fn moves_and_rotation_go_through_engine() {
        let mut g = game();
        assert!(g.rotate());
        assert_eq!(g.group().unwrap().orientation, Orientation::Horizontal);
        assert!(g.move_group(Direction::Right).unwrap());
        assert_eq!(g.group().unwrap().x, 3);
        assert!(!g.move_group(Direction::Right).unwrap());
        assert_eq!(g.group().unwrap().x, 3);
        assert_eq!(g.step().unwrap(), Some(StepOutcome::Moved));
        assert_eq!(g.group().unwrap().y, 1);
    }

    #[test]
    fn ojama_flood_replaces_group_and_settles() {
        let mut g = game();
        g.take_events();
        assert!(g.drop_ojama(8).unwrap());
        assert!(g.group().is_none());
        assert_eq!(g.state(), EngineState::Resolving);
        assert_eq!(g.board().occupied_count(), 8);
        for (p, cell) in g.board().occupied() {
            assert_eq!(cell, Cell::Ojama);
            assert!(p.row >= 10);
        }
        let dropped = g.take_events().into_iter().find_map(|e| match e {
            GameEvent::OjamaDropped(cells) => Some(cells.len()),
            _ => None,
        });
        assert_eq!(dropped, Some(8));
        g.resolve().unwrap();
        assert_eq!(g.board().occupied_count(), 8);
        assert_eq!(g.score(), 0);
        assert!(g.group().is_some());
    }

    #[test]
    fn ojama_flood_stops_when_board_is_full() {
        let mut g = game();
        assert!(g.drop_ojama(1000).unwrap());
        assert_eq!(g.board().occupied_count(), 72);
        g.resolve().unwrap();
        assert!(g.is_over());
    }

    #[test]
    fn huge_reward_saturates_score() {
        let rules = Rules {
            cell_reward: u32::MAX / 2,
            ..Rules::default()
        };
        let mut g = Game::new(rules, 7, 0).unwrap();
        g.resolve_from(Board::from_rows(&[
            "......", "......", "......", "......", "......", "......", //
            "......", "......", "R.....", "R.....", "RG....", "RGGG..",
        ]));
        g.take_events();
        assert_eq!(g.advance().unwrap(), Some(Pass::Removed(2)));
        assert_eq!(g.score(), u32::MAX);
        match g.take_events().as_slice() {
            [GameEvent::Removed { gained, .. }] => assert_eq!(*gained, u32::MAX),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn occupied_group_cells_block_spawn_with_trigger_cells_free() {
        let mut g = game();
        g.group = None;
        // Column 2 filled from row 1 down; nothing matches and row 0 stays empty.
        for row in 1..12 {
            let cell = if row % 2 == 0 { Cell::Ojama } else { Cell::Puyo(Green) };
            g.board.set(row, 2, cell).unwrap();
        }
        assert!(!g.board().is_spawn_blocked());
        g.take_events();
        assert_eq!(g.spawn([Red, Blue, Yellow]).unwrap(), SpawnOutcome::Blocked);
        assert!(g.is_over());
        assert!(g.group().is_none());
        assert_eq!(g.board().get(1, 2), Ok(Cell::Puyo(Green)));
        assert_eq!(g.take_events()[0], GameEvent::SpawnBlocked);
    }

    #[test]
    fn ojama_drop_is_reported_before_its_fall() {
        let mut g = game();
        g.take_events();
        assert!(g.drop_ojama(4).unwrap());
        let events = g.take_events();
        match events.as_slice() {
            [GameEvent::OjamaDropped(cells), GameEvent::Settled(moves)] => {
                assert_eq!(cells.len(), 4);
                assert!(cells.iter().all(|p| p.row == 0));
                assert_eq!(moves.len(), 4);
                for m in moves {
                    assert!(cells.contains(&m.from));
                    assert_eq!(m.to.row, 11);
                }
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn resolution_converges_within_cell_count(board in board_strategy(12, 6), seed in any::<u64>()) {
            let mut g = Game::new(Rules::default(), seed, 0).unwrap();
            g.resolve_from(board);
            let passes = g.resolve().unwrap();
            prop_assert!(passes <= 12 * 6);
            prop_assert_ne!(g.state(), EngineState::Resolving);
            prop_assert!(matcher::find_matches(g.board(), 4).unwrap().is_empty());
        }

        #[test]
        fn score_grows_by_reward_per_removed_cell(board in board_strategy(12, 6)) {
            let mut g = game();
            let before = board.occupied_count();
            g.resolve_from(board);
            g.resolve().unwrap();
            let removed: usize = g
                .take_events()
                .iter()
                .map(|e| match e {
                    GameEvent::Removed { cells, .. } => cells.len(),
                    _ => 0,
                })
                .sum();
            prop_assert_eq!(g.score(), removed as u32 * DEFAULT_CELL_REWARD);
            prop_assert_eq!(g.board().occupied_count() + removed, before);
        }
    }
}
