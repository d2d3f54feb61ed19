//! App: terminal init, main loop, tick and key handling.

use crate::GameConfig;
use crate::board::{Cell, Pos};
use crate::game::{EngineState, Game, GameEvent};
use crate::group::Direction;
use crate::highscores;
use crate::input::{Action, key_to_action};
use crate::special::SpecialEvent;
use crate::theme::Theme;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;
use tracing::{debug, warn};

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding.
const REPEAT_INTERVAL_MS: u64 = 60;
/// Render frame budget (~60 FPS).
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    GameOver,
}

/// Cells removed by the last resolution pass, shown until their fade completes.
#[derive(Debug, Clone)]
pub struct ClearFlash {
    pub cells: Vec<(Pos, Cell)>,
    pub chain: u32,
    pub gained: u32,
    pub started: Instant,
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    game: Game,
    special: SpecialEvent,
    screen: Screen,
    paused: bool,
    /// Unpaused play time; drives the special event timeline.
    play_time: Duration,
    last_frame: Instant,
    last_tick: Instant,
    last_pass: Instant,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    flash: Option<ClearFlash>,
    /// TachyonFX fade over the flashing cells (created when the flash is first drawn).
    clear_effect: Option<Effect>,
    clear_effect_process_time: Option<Instant>,
    new_best: bool,
    /// Seed for the next restart; each game derives a fresh one.
    next_seed: u64,
    /// Terminal reports key releases, so held keys can use our own DAS/ARR.
    key_release: bool,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Result<Self> {
        let best = highscores::load_best(&config.best_path);
        let (game, special) = Self::fresh_game(&config, config.seed, best)?;
        let now = Instant::now();
        Ok(Self {
            next_seed: config.seed.wrapping_add(1),
            config,
            theme,
            game,
            special,
            screen: Screen::Playing,
            paused: false,
            play_time: Duration::ZERO,
            last_frame: now,
            last_tick: now,
            last_pass: now,
            repeat_state: None,
            last_repeat_fire: None,
            flash: None,
            clear_effect: None,
            clear_effect_process_time: None,
            new_best: false,
            key_release: false,
        })
    }

    fn fresh_game(config: &GameConfig, seed: u64, best: u32) -> Result<(Game, SpecialEvent)> {
        let game = Game::new(config.rules, seed, best)?;
        let mut rng = rand::rng();
        let mode = config.special.resolve(&mut rng);
        debug!(seed, ?mode, "new game");
        let special = SpecialEvent::new(
            mode,
            config.special_delay,
            config.special_warning,
            config.ojama_count,
        );
        Ok((game, special))
    }

    fn reset_game(&mut self) -> Result<()> {
        let best = self.game.best();
        let seed = self.next_seed;
        self.next_seed = self.next_seed.wrapping_add(1);
        let (game, special) = Self::fresh_game(&self.config, seed, best)?;
        let now = Instant::now();
        self.game = game;
        self.special = special;
        self.screen = Screen::Playing;
        self.paused = false;
        self.play_time = Duration::ZERO;
        self.last_tick = now;
        self.last_pass = now;
        self.repeat_state = None;
        self.last_repeat_fire = None;
        self.clear_flash();
        self.new_best = false;
        Ok(())
    }

    fn clear_flash(&mut self) {
        self.flash = None;
        self.clear_effect = None;
        self.clear_effect_process_time = None;
    }

    fn apply_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::MoveLeft => {
                self.game.move_group(Direction::Left)?;
            }
            Action::MoveRight => {
                self.game.move_group(Direction::Right)?;
            }
            Action::Rotate => {
                self.game.rotate();
            }
            Action::SoftDrop => {
                if self.game.step()?.is_some() {
                    self.last_tick = Instant::now();
                }
            }
            Action::HardDrop => {
                self.game.hard_drop()?;
                self.repeat_state = None;
            }
            Action::Pause | Action::Restart | Action::Quit | Action::None => {}
        }
        Ok(())
    }

    fn tick_repeat(&mut self) -> Result<()> {
        let now = Instant::now();
        let Some((action, first)) = self.repeat_state else {
            return Ok(());
        };
        if now.duration_since(first) < Duration::from_millis(REPEAT_DELAY_MS) {
            return Ok(());
        }
        let next = self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action)?;
            self.last_repeat_fire = Some(now);
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
        };

        let mut terminal = ratatui::try_init()?;
        // Without release events a held key never stops; fall back to OS key repeat.
        self.key_release = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                std::io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        debug!(key_release = self.key_release, "terminal ready");

        let result = self.run_loop(&mut terminal);

        if self.key_release {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        }
        ratatui::restore();
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &crate::ui::View {
                        screen: self.screen,
                        game: &self.game,
                        theme: &self.theme,
                        special: &self.special,
                        paused: self.paused,
                        flash: self.flash.as_ref(),
                        new_best: self.new_best,
                        animation: self.config.animation,
                        now,
                        play_time: self.play_time,
                    },
                    &mut self.clear_effect,
                    &mut self.clear_effect_process_time,
                )
            })?;

            let timeout = FRAME.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    let action = key_to_action(key);

                    // Ignore OS repeats; we run our own DAS/ARR.
                    if key.kind != KeyEventKind::Press {
                        if key.kind == KeyEventKind::Release
                            && self.repeat_state.map(|(a, _)| a) == Some(action)
                        {
                            self.repeat_state = None;
                            self.last_repeat_fire = None;
                        }
                        continue;
                    }
                    if self.repeat_state.map(|(a, _)| a) == Some(action) {
                        continue;
                    }
                    if action == Action::Quit {
                        return Ok(());
                    }

                    match self.screen {
                        Screen::Playing if self.paused => {
                            if action == Action::Pause {
                                self.paused = false;
                                self.last_tick = Instant::now();
                            }
                        }
                        Screen::Playing => {
                            if action == Action::Pause {
                                self.paused = true;
                                self.repeat_state = None;
                                continue;
                            }
                            self.apply_action(action)?;
                            if self.key_release
                                && matches!(action, Action::MoveLeft | Action::MoveRight | Action::SoftDrop)
                            {
                                self.repeat_state = Some((action, Instant::now()));
                                self.last_repeat_fire = None;
                            }
                            // A lock ends the held input.
                            if self.game.state() != EngineState::Idle {
                                self.repeat_state = None;
                            }
                        }
                        Screen::GameOver => {
                            if action == Action::Restart {
                                self.reset_game()?;
                            }
                        }
                    }
                }
            }

            let frame_delta = self.last_frame.elapsed();
            self.last_frame = Instant::now();
            if self.screen == Screen::Playing && !self.paused {
                self.play_time += frame_delta;
                self.tick_repeat()?;
                self.update_special()?;
                self.update_engine()?;
                self.drain_events();
            }
        }
    }

    fn update_special(&mut self) -> Result<()> {
        if self.special.update(self.play_time) && self.special.fire(&mut self.game)? {
            self.repeat_state = None;
        }
        Ok(())
    }

    /// Gravity while a group falls; paced passes while resolving.
    fn update_engine(&mut self) -> Result<()> {
        match self.game.state() {
            EngineState::Idle => {
                if self.last_tick.elapsed() >= self.config.tick_interval {
                    self.last_tick = Instant::now();
                    self.game.step()?;
                }
            }
            EngineState::Resolving => {
                if !self.config.animation {
                    self.game.resolve()?;
                    self.last_tick = Instant::now();
                    return Ok(());
                }
                let fading = match (&self.flash, &self.clear_effect) {
                    (Some(_), Some(effect)) => !effect.done(),
                    (Some(flash), None) => flash.started.elapsed() < self.config.pass_delay,
                    (None, _) => false,
                };
                if fading || self.last_pass.elapsed() < self.config.pass_delay {
                    return Ok(());
                }
                self.clear_flash();
                self.last_pass = Instant::now();
                self.game.advance()?;
                self.last_tick = Instant::now();
            }
            EngineState::GameOver => {}
        }
        Ok(())
    }

    fn drain_events(&mut self) {
        for ev in self.game.take_events() {
            match ev {
                GameEvent::Removed { cells, chain, gained } => {
                    if self.config.animation {
                        self.clear_effect = None;
                        self.clear_effect_process_time = None;
                        self.flash = Some(ClearFlash {
                            cells,
                            chain,
                            gained,
                            started: Instant::now(),
                        });
                    }
                }
                GameEvent::Locked(cells) => {
                    // Let the locked cells sit for one beat before the first pass.
                    self.last_pass = Instant::now();
                    debug!(cells = cells.len(), "locked");
                }
                GameEvent::OjamaDropped(cells) => {
                    self.last_pass = Instant::now();
                    self.repeat_state = None;
                    debug!(count = cells.len(), "ojama landed");
                }
                GameEvent::Settled(moves) => debug!(moves = moves.len(), "settled"),
                GameEvent::Spawned(group) => debug!(colors = ?group.colors, "spawned"),
                GameEvent::GameOver { score, best, new_best } => {
                    debug!(score, best, new_best, "showing game over");
                    self.clear_flash();
                    self.screen = Screen::GameOver;
                    self.repeat_state = None;
                    self.new_best = new_best;
                    if new_best {
                        if let Err(e) = highscores::save_best(&self.config.best_path, score) {
                            warn!(error = %e, "could not save best score");
                        }
                    }
                }
                GameEvent::SpawnBlocked => {}
            }
        }
    }
}
