//! Layout and drawing: playfield, active group, next preview, score, overlays.

use crate::app::{ClearFlash, Screen};
use crate::board::{Cell, Pos};
use crate::game::{EngineState, Game};
use crate::special::{SpecialEvent, SpecialMode, SpecialPhase};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each board cell is two terminal columns wide so puyos look square.
const CELL_WIDTH: u16 = 2;
const CELL_HEIGHT: u16 = 1;
const SIDEBAR_WIDTH: u16 = 22;
/// Fade time for removed cells.
const CLEAR_FADE_MS: u32 = 300;
/// Warning flash half-period.
const BLINK_MS: u128 = 200;

const PUYO_GLYPH: &str = "()";
const OJAMA_GLYPH: &str = "▒▒";
const SPAWN_MARK: &str = "><";

/// Borrowed state for one frame.
pub struct View<'a> {
    pub screen: Screen,
    pub game: &'a Game,
    pub theme: &'a Theme,
    pub special: &'a SpecialEvent,
    pub paused: bool,
    pub flash: Option<&'a ClearFlash>,
    pub new_best: bool,
    pub animation: bool,
    pub now: Instant,
    /// Unpaused play time; phases the warning blink.
    pub play_time: Duration,
}

/// Playfield size in terminal cells including the border.
fn playfield_outer_size(game: &Game) -> (u16, u16) {
    let b = game.board();
    (b.cols() as u16 * CELL_WIDTH + 2, b.rows() as u16 * CELL_HEIGHT + 2)
}

/// Board rect (inside border) for the centred layout; matches draw_game.
fn playfield_board_rect(area: Rect, game: &Game) -> Rect {
    let (pw, ph) = playfield_outer_size(game);
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    Rect {
        x: x + 1,
        y: y + 1,
        width: (pw - 2).min(area.width.saturating_sub(2)),
        height: (ph - 2).min(area.height.saturating_sub(2)),
    }
}

/// Terminal position of a board cell's left half, if visible.
fn cell_origin(board_rect: Rect, p: Pos) -> Option<(u16, u16)> {
    let x = board_rect.x + p.col as u16 * CELL_WIDTH;
    let y = board_rect.y + p.row as u16 * CELL_HEIGHT;
    (x + CELL_WIDTH <= board_rect.x + board_rect.width && y < board_rect.y + board_rect.height)
        .then_some((x, y))
}

/// Buffer positions covered by the flashing cells.
fn clearing_buffer_positions(board_rect: Rect, cells: &[(Pos, Cell)]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(p, _) in cells {
        if let Some((x, y)) = cell_origin(board_rect, p) {
            for dx in 0..CELL_WIDTH {
                set.insert((x + dx, y));
            }
        }
    }
    set
}

fn cell_color(theme: &Theme, cell: Cell) -> Option<Color> {
    match cell {
        Cell::Empty => None,
        Cell::Puyo(c) => Some(theme.puyo_color(c.index())),
        Cell::Ojama => Some(theme.ojama),
    }
}

fn paint_cell(buf: &mut Buffer, board_rect: Rect, theme: &Theme, p: Pos, cell: Cell) {
    let (Some((x, y)), Some(color)) = (cell_origin(board_rect, p), cell_color(theme, cell)) else {
        return;
    };
    let glyph = if cell == Cell::Ojama { OJAMA_GLYPH } else { PUYO_GLYPH };
    buf.set_string(x, y, glyph, Style::default().fg(theme.bg).bg(color).bold());
}

/// Create or update the clear fade and process it (TachyonFX: removed cells fade to bg).
fn apply_clear_effect(
    frame: &mut Frame,
    view: &View,
    area: Rect,
    flash: &ClearFlash,
    clear_effect: &mut Option<Effect>,
    clear_process_time: &mut Option<Instant>,
) {
    let board_rect = playfield_board_rect(area, view.game);
    let delta = clear_process_time
        .map(|t| view.now.saturating_duration_since(t))
        .unwrap_or(Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *clear_process_time = Some(view.now);

    if clear_effect.is_none() {
        let clearing_set = clearing_buffer_positions(board_rect, &flash.cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            clearing_set.contains(&(pos.x, pos.y))
        }));
        let bg = view.theme.bg;
        let effect = fx::fade_to(bg, bg, (CLEAR_FADE_MS, Interpolation::QuadIn))
            .with_filter(filter)
            .with_area(board_rect);
        *clear_effect = Some(effect);
    }

    if let Some(effect) = clear_effect {
        frame.render_effect(effect, board_rect, TfxDuration::from_millis(delta_ms));
    }
}

/// Draw the current screen with overlays; runs the clear fade while a flash is showing.
pub fn draw(
    frame: &mut Frame,
    view: &View,
    clear_effect: &mut Option<Effect>,
    clear_process_time: &mut Option<Instant>,
) {
    let area = frame.area();
    Block::default()
        .style(Style::default().bg(view.theme.bg))
        .render(area, frame.buffer_mut());
    draw_game(frame, view, area);
    match view.screen {
        Screen::Playing => {
            if let Some(flash) = view.flash.filter(|_| view.animation) {
                apply_clear_effect(frame, view, area, flash, clear_effect, clear_process_time);
            }
            if view.paused {
                draw_pause_overlay(frame, view, area);
            }
        }
        Screen::GameOver => draw_game_over(frame, view, area),
    }
}

/// Draw game: playfield + sidebar, centred in the full area.
fn draw_game(frame: &mut Frame, view: &View, area: Rect) {
    let (pw, ph) = playfield_outer_size(view.game);
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Fill(1), Constraint::Length(total_w), Constraint::Fill(1)])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(ph), Constraint::Fill(1)])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);

    draw_playfield(frame, view, inner[0]);
    draw_sidebar(frame, view, inner[1]);
}

fn draw_playfield(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" puyotui ", Style::default().fg(theme.title)));
    let board_rect = block.inner(area);
    block.render(area, frame.buffer_mut());

    let board = view.game.board();
    // The board blinks while a special event is about to land.
    let blink_off = view.special.phase() == SpecialPhase::Warning
        && (view.play_time.as_millis() / BLINK_MS) % 2 == 1;

    let buf = frame.buffer_mut();
    for p in board.spawn_trigger_cells() {
        if board.get(p.row, p.col).is_ok_and(Cell::is_empty) {
            if let Some((x, y)) = cell_origin(board_rect, p) {
                buf.set_string(x, y, SPAWN_MARK, Style::default().fg(theme.div_line).bg(theme.bg));
            }
        }
    }
    if !blink_off {
        for (p, cell) in board.occupied() {
            paint_cell(buf, board_rect, theme, p, cell);
        }
        if let Some(group) = view.game.group() {
            for (p, color) in group.placed() {
                paint_cell(buf, board_rect, theme, p, Cell::Puyo(color));
            }
        }
    }
    if let Some(flash) = view.flash {
        for &(p, cell) in &flash.cells {
            paint_cell(buf, board_rect, theme, p, cell);
        }
    }
}

fn sidebar_block(theme: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let hint_style = Style::default().fg(theme.inactive_fg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Next (border + title + 3 rows)
            Constraint::Length(5), // Stats (border + score, best, chain)
            Constraint::Length(4), // Event banner
            Constraint::Fill(1),   // Key hints
        ])
        .split(area);

    // --- Next ---
    let next_block = sidebar_block(theme);
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    Paragraph::new(Line::from(Span::styled("Next", title_style))).render(next_inner, frame.buffer_mut());
    draw_next_preview(frame, view, next_inner);

    // --- Stats ---
    let stats_block = sidebar_block(theme);
    let stats_inner = stats_block.inner(chunks[1]);
    stats_block.render(chunks[1], frame.buffer_mut());
    let chain = view.flash.map_or(view.game.chain(), |f| f.chain);
    let stats = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(view.game.score().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best:  ", title_style),
            Span::styled(view.game.best().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Chain: ", title_style),
            Span::styled(
                if view.game.state() == EngineState::Resolving && chain > 0 {
                    chain.to_string()
                } else {
                    "-".to_string()
                },
                fg_style,
            ),
        ]),
    ];
    Paragraph::new(stats).render(stats_inner, frame.buffer_mut());

    // --- Event banner ---
    let banner = event_banner(view);
    Paragraph::new(banner)
        .alignment(Alignment::Center)
        .render(chunks[2], frame.buffer_mut());

    // --- Key hints ---
    let hints = vec![
        Line::from(Span::styled("←/→ h/l  move", hint_style)),
        Line::from(Span::styled("↑ k x    rotate", hint_style)),
        Line::from(Span::styled("↓ j      step", hint_style)),
        Line::from(Span::styled("space    drop", hint_style)),
        Line::from(Span::styled("p pause  q quit", hint_style)),
    ];
    Paragraph::new(hints).render(chunks[3], frame.buffer_mut());
}

/// Chain / special-event text under the stats.
fn event_banner(view: &View) -> Vec<Line<'static>> {
    if view.special.phase() == SpecialPhase::Warning {
        let text = match view.special.mode {
            SpecialMode::Flood => "Brace yourself!!",
            SpecialMode::Loss => "Something is off...",
            SpecialMode::Normal => "",
        };
        return vec![Line::from(""), Line::from(Span::styled(text, Style::default().fg(Color::Red).bold()))];
    }
    match view.flash {
        Some(flash) if flash.chain >= 2 => vec![
            Line::from(Span::styled(
                format!("{} chain!", flash.chain),
                Style::default().fg(view.theme.title).bold(),
            )),
            Line::from(Span::styled(format!("+{}", flash.gained), Style::default().fg(view.theme.main_fg))),
        ],
        Some(flash) => vec![
            Line::from(""),
            Line::from(Span::styled(format!("+{}", flash.gained), Style::default().fg(view.theme.main_fg))),
        ],
        None => Vec::new(),
    }
}

/// Upcoming groups as small vertical stacks, side by side.
fn draw_next_preview(frame: &mut Frame, view: &View, area: Rect) {
    let buf = frame.buffer_mut();
    let top = area.y + 1;
    for (i, colors) in view.game.upcoming().enumerate() {
        let x = area.x + 2 + i as u16 * (CELL_WIDTH + 3);
        for (j, &color) in colors.iter().enumerate() {
            let y = top + j as u16;
            if x + CELL_WIDTH > area.x + area.width || y >= area.y + area.height {
                continue;
            }
            let c = view.theme.puyo_color(color.index());
            buf.set_string(x, y, PUYO_GLYPH, Style::default().fg(view.theme.bg).bg(c).bold());
        }
    }
}

fn centered_popup(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, view: &View, area: Rect) {
    let popup = centered_popup(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(" Paused ", Style::default().fg(Color::Black).bg(Color::Yellow))),
        Line::from(""),
        Line::from(Span::styled(" P: resume    Q: quit ", Style::default().fg(view.theme.main_fg))),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(view.theme.div_line).bg(view.theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let popup = centered_popup(area, 32, 11);
    let mut lines: Vec<Line> = vec![
        Line::from(""),
        Line::from(Span::styled(" Game Over ", Style::default().fg(Color::White).bg(Color::Red))),
        Line::from(""),
    ];
    if view.special.mode == SpecialMode::Loss && view.special.phase() == SpecialPhase::Done {
        lines.push(Line::from(Span::styled(
            " Your rival drew the winning tile. ",
            Style::default().fg(theme.title),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!(" Score: {} ", view.game.score()),
        Style::default().fg(theme.main_fg),
    )));
    lines.push(Line::from(Span::styled(
        format!(" Best: {} ", view.game.best()),
        Style::default().fg(theme.main_fg),
    )));
    if view.new_best {
        lines.push(Line::from(Span::styled(" New record! ", Style::default().fg(Color::Yellow).bold())));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" R: restart    Q: quit ", Style::default().fg(theme.main_fg))));
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" puyotui ", Style::default().fg(theme.title))),
    );
    p.render(popup, frame.buffer_mut());
}
