//! Special events: a mode drawn once per game that interrupts play after a delay.

use crate::board::BoardError;
use crate::game::Game;
use rand::Rng;
use std::time::Duration;
use tracing::info;

/// Chance of an instant loss.
const LOSS_CHANCE: f64 = 0.01;
/// Chance of an ojama flood (cumulative with LOSS_CHANCE).
const FLOOD_CHANCE: f64 = 0.06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialMode {
    Normal,
    /// Discard the falling group and bury the board in ojama.
    Flood,
    /// End the game on the spot.
    Loss,
}

impl SpecialMode {
    /// Map a roll in [0, 1) to a mode.
    pub fn from_roll(roll: f64) -> Self {
        if roll < LOSS_CHANCE {
            Self::Loss
        } else if roll < FLOOD_CHANCE {
            Self::Flood
        } else {
            Self::Normal
        }
    }

    pub fn draw<R: Rng>(rng: &mut R) -> Self {
        Self::from_roll(rng.random::<f64>())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialPhase {
    Waiting,
    /// Board flashes before the event lands.
    Warning,
    Done,
}

/// Timeline of one special event, driven by elapsed play time.
#[derive(Debug, Clone)]
pub struct SpecialEvent {
    pub mode: SpecialMode,
    delay: Duration,
    warning: Duration,
    ojama_count: usize,
    phase: SpecialPhase,
}

impl SpecialEvent {
    pub fn new(mode: SpecialMode, delay: Duration, warning: Duration, ojama_count: usize) -> Self {
        let phase = if mode == SpecialMode::Normal {
            SpecialPhase::Done
        } else {
            SpecialPhase::Waiting
        };
        Self {
            mode,
            delay,
            warning,
            ojama_count,
            phase,
        }
    }

    pub fn phase(&self) -> SpecialPhase {
        self.phase
    }

    /// Advance the timeline. Returns true once the event is due.
    pub fn update(&mut self, elapsed: Duration) -> bool {
        match self.phase {
            SpecialPhase::Waiting if elapsed >= self.delay => {
                info!(mode = ?self.mode, "special event warning");
                self.phase = SpecialPhase::Warning;
                false
            }
            SpecialPhase::Warning => elapsed >= self.delay + self.warning,
            _ => false,
        }
    }

    /// Apply the event to the game. Stays pending if the game cannot take it yet
    /// (e.g. mid-resolution).
    pub fn fire(&mut self, game: &mut Game) -> Result<bool, BoardError> {
        if self.phase != SpecialPhase::Warning {
            return Ok(false);
        }
        let applied = match self.mode {
            SpecialMode::Normal => true,
            SpecialMode::Flood => game.drop_ojama(self.ojama_count)?,
            SpecialMode::Loss => game.force_game_over(),
        };
        if applied {
            info!(mode = ?self.mode, "special event fired");
            self.phase = SpecialPhase::Done;
        }
        Ok(applied)
    }
}
