//! Layout and drawing: title, countdown, board, falling block, ghost, popups,
//! sidebar, pause and game over.
//!
//! Rendering only reads a [`Snapshot`]. Short-lived effects (removal fade,
//! score popups) live in [`Presentation`], which the app feeds with the
//! session's events.

use crate::board::Pos;
use crate::catalog::{BlockKind, Special};
use crate::game::{Falling, CELL_UNITS};
use crate::resolve::GameEvent;
use crate::session::{SessionState, Snapshot};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

const SIDEBAR_WIDTH: u16 = 24;
/// Tile size in terminal cells; shrinks when the terminal is small.
const MAX_CELL_W: u16 = 6;
const MAX_CELL_H: u16 = 2;

/// Removed cells flash white, then fade to the board background.
const REMOVAL_FADE_MS: u32 = 350;
/// Lifetime of a `+N` label.
const POPUP_MS: u32 = 900;

/// Floating label over the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub pos: Pos,
    pub text: String,
    pub color: Color,
    pub age_ms: u32,
}

/// Presentation-only state paced by wall-clock frames, never by the core.
pub struct Presentation {
    show_ghost: bool,
    show_popups: bool,
    animate: bool,
    dev_keys: bool,
    popups: Vec<Popup>,
    /// Cells removed since the current fade started.
    fading: HashSet<Pos>,
    fade: Option<Effect>,
    last_frame: Option<Instant>,
    delta_ms: u32,
    new_best: bool,
}

impl Presentation {
    pub fn new(show_ghost: bool, show_popups: bool, animate: bool, dev_keys: bool) -> Self {
        Self {
            show_ghost,
            show_popups,
            animate,
            dev_keys,
            popups: Vec::new(),
            fading: HashSet::new(),
            fade: None,
            last_frame: None,
            delta_ms: 0,
            new_best: false,
        }
    }

    pub fn is_fading(&self, pos: Pos) -> bool {
        self.fading.contains(&pos)
    }

    /// Turn one core event into visuals.
    pub fn observe(&mut self, event: &GameEvent, theme: &Theme) {
        match *event {
            GameEvent::Merged { pos, value } => {
                self.popup(pos, format!("+{value}"), theme.title);
            }
            GameEvent::MaxMerge { pos, points } => {
                self.popup(pos, format!("+{points}!"), Color::White);
                self.fade_cell(pos);
            }
            GameEvent::Removed { pos, points, .. } => {
                if points > 0 {
                    self.popup(pos, format!("+{points}"), theme.title);
                }
                self.fade_cell(pos);
            }
            GameEvent::Annihilated { upper, lower } => {
                self.fade_cell(upper);
                self.fade_cell(lower);
            }
            GameEvent::SpecialTriggered { kind, pos } => {
                let color = theme.kind_color(BlockKind::Special(kind));
                self.popup(pos, format!("{}!", kind.label()), color);
            }
            GameEvent::GameOver { new_best, .. } => self.new_best = new_best,
            _ => {}
        }
    }

    fn popup(&mut self, pos: Pos, text: String, color: Color) {
        if self.show_popups {
            self.popups.push(Popup {
                pos,
                text,
                color,
                age_ms: 0,
            });
        }
    }

    fn fade_cell(&mut self, pos: Pos) {
        if self.animate {
            self.fading.insert(pos);
            // restart so the new cells are part of the filter
            self.fade = None;
        }
    }

    /// Age popups and retire finished effects. Call once per frame.
    pub fn advance(&mut self, now: Instant) {
        let delta = self
            .last_frame
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default();
        self.last_frame = Some(now);
        self.delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
        self.age(self.delta_ms);
        if self.fade.as_ref().is_some_and(Effect::done) {
            self.fade = None;
            self.fading.clear();
        }
    }

    fn age(&mut self, delta_ms: u32) {
        for p in &mut self.popups {
            p.age_ms = p.age_ms.saturating_add(delta_ms);
        }
        self.popups.retain(|p| p.age_ms < POPUP_MS);
    }

    /// Forget everything (restart).
    pub fn reset(&mut self) {
        self.popups.clear();
        self.fading.clear();
        self.fade = None;
        self.new_best = false;
    }
}

/// Largest tile size that fits `cols x rows` plus the sidebar into `area`.
pub fn cell_size_for(area: Rect, cols: usize, rows: usize) -> (u16, u16) {
    let cols = cols.max(1) as u16;
    let rows = rows.max(1) as u16;
    let w = (area.width.saturating_sub(SIDEBAR_WIDTH + 2) / cols).clamp(1, MAX_CELL_W);
    let h = (area.height.saturating_sub(2) / rows).clamp(1, MAX_CELL_H);
    (w, h)
}

/// Board inner rect and tile size.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    board: Rect,
    cell_w: u16,
    cell_h: u16,
}

impl Geometry {
    fn cell_rect(&self, pos: Pos) -> Rect {
        Rect {
            x: self.board.x + pos.col as u16 * self.cell_w,
            y: self.board.y + pos.row as u16 * self.cell_h,
            width: self.cell_w,
            height: self.cell_h,
        }
        .intersection(self.board)
    }

    /// Falling block at its sub-cell offset.
    fn falling_rect(&self, f: &Falling) -> Rect {
        let dy = (f.offset as u64 * self.cell_h as u64 / CELL_UNITS as u64) as u16;
        Rect {
            x: self.board.x + f.col as u16 * self.cell_w,
            y: self.board.y + dy,
            width: self.cell_w,
            height: self.cell_h,
        }
        .intersection(self.board)
    }
}

/// Board outer rect, geometry and sidebar rect, centred in `area`.
fn layout(area: Rect, cols: usize, rows: usize) -> (Rect, Geometry, Rect) {
    let (cell_w, cell_h) = cell_size_for(area, cols, rows);
    let bw = cell_w * cols as u16 + 2;
    let bh = cell_h * rows as u16 + 2;
    let total_w = bw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bh),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let outer = inner[0];
    let board = Rect {
        x: outer.x + 1,
        y: outer.y + 1,
        width: outer.width.saturating_sub(2),
        height: outer.height.saturating_sub(2),
    };
    (
        outer,
        Geometry {
            board,
            cell_w,
            cell_h,
        },
        inner[1],
    )
}

/// Draw the current session view.
pub fn draw(frame: &mut Frame, snap: &Snapshot<'_>, theme: &Theme, pres: &mut Presentation) {
    let area = frame.area();
    let (outer, geo, sidebar) = layout(area, snap.board.cols(), snap.board.rows());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" BitCrunch ", Style::default().fg(theme.title)));
    block.render(outer, frame.buffer_mut());

    draw_board(frame.buffer_mut(), snap, theme, pres, geo);
    if !pres.fading.is_empty() {
        apply_removal_fade(frame, snap, theme, pres, geo);
    }
    draw_popups(frame.buffer_mut(), theme, pres, geo);
    draw_sidebar(frame.buffer_mut(), snap, theme, pres, sidebar);

    match snap.state {
        SessionState::Idle => draw_title(frame, snap, theme, outer),
        SessionState::Countdown(n) => draw_countdown(frame, theme, n, geo.board),
        SessionState::Paused => draw_pause_overlay(frame, theme, outer),
        SessionState::Over => draw_game_over(frame, snap, theme, pres.new_best, outer),
        SessionState::Running => {}
    }
}

fn fill(buf: &mut Buffer, rect: Rect, symbol: &str, style: Style) {
    for y in rect.top()..rect.bottom() {
        for x in rect.left()..rect.right() {
            buf[(x, y)].set_symbol(symbol).set_style(style);
        }
    }
}

/// Solid tile with its label centred on the middle row.
fn paint_tile(buf: &mut Buffer, rect: Rect, kind: BlockKind, theme: &Theme) {
    if rect.is_empty() {
        return;
    }
    let bg = theme.kind_color(kind);
    fill(buf, rect, " ", Style::default().bg(bg));
    let label = kind.label();
    let lw = (label.chars().count() as u16).min(rect.width);
    let x = rect.x + rect.width.saturating_sub(lw) / 2;
    let y = rect.y + rect.height.saturating_sub(1) / 2;
    let style = Style::default()
        .fg(theme.label_color(kind))
        .bg(bg)
        .add_modifier(Modifier::BOLD);
    buf.set_stringn(x, y, &label, rect.width as usize, style);
}

fn draw_board(buf: &mut Buffer, snap: &Snapshot<'_>, theme: &Theme, pres: &Presentation, geo: Geometry) {
    fill(buf, geo.board, " ", Style::default().bg(theme.bg));
    let dot = Style::default().fg(theme.div_line).bg(theme.bg);
    for row in 0..snap.board.rows() {
        for col in 0..snap.board.cols() {
            let pos = Pos::new(col, row);
            let rect = geo.cell_rect(pos);
            match snap.board.occupied_at(pos) {
                Some(kind) => paint_tile(buf, rect, kind, theme),
                None if pres.is_fading(pos) => fill(buf, rect, " ", Style::default().bg(Color::White)),
                None if !rect.is_empty() => {
                    let x = rect.x + rect.width.saturating_sub(1) / 2;
                    let y = rect.y + rect.height.saturating_sub(1) / 2;
                    buf[(x, y)].set_symbol("·").set_style(dot);
                }
                None => {}
            }
        }
    }

    let Some(falling) = snap.falling else {
        return;
    };
    if pres.show_ghost {
        if let Some(ghost) = snap.ghost.filter(|g| g.row > falling.row()) {
            let rect = geo.cell_rect(ghost);
            let style = Style::default()
                .fg(theme.kind_color(falling.kind))
                .bg(theme.bg);
            fill(buf, rect, "░", style);
        }
    }
    paint_tile(buf, geo.falling_rect(falling), falling.kind, theme);
}

/// Fade removed cells (white flash) to the background with TachyonFX.
fn apply_removal_fade(
    frame: &mut Frame,
    snap: &Snapshot<'_>,
    theme: &Theme,
    pres: &mut Presentation,
    geo: Geometry,
) {
    if pres.fade.is_none() {
        let mut cells = HashSet::new();
        for &pos in pres.fading.iter().filter(|p| !snap.board.is_occupied(**p)) {
            let rect = geo.cell_rect(pos);
            for y in rect.top()..rect.bottom() {
                for x in rect.left()..rect.right() {
                    cells.insert((x, y));
                }
            }
        }
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            cells.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_to(theme.bg, theme.bg, (REMOVAL_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(geo.board);
        pres.fade = Some(effect);
    }
    let delta = TfxDuration::from_millis(pres.delta_ms);
    if let Some(effect) = pres.fade.as_mut() {
        frame.render_effect(effect, geo.board, delta);
    }
}

fn draw_popups(buf: &mut Buffer, theme: &Theme, pres: &Presentation, geo: Geometry) {
    for popup in &pres.popups {
        let rect = geo.cell_rect(popup.pos);
        if rect.is_empty() {
            continue;
        }
        // rise up to two rows over the popup's lifetime
        let rise = (popup.age_ms * 2 / POPUP_MS) as u16;
        let Some(y) = (rect.y + rect.height.saturating_sub(1) / 2).checked_sub(rise) else {
            continue;
        };
        if y < geo.board.y {
            continue;
        }
        let w = popup.text.chars().count() as u16;
        let x = (rect.x + rect.width / 2)
            .saturating_sub(w / 2)
            .max(geo.board.x);
        let max = geo.board.right().saturating_sub(x) as usize;
        let style = Style::default()
            .fg(popup.color)
            .bg(theme.bg)
            .add_modifier(Modifier::BOLD);
        buf.set_stringn(x, y, &popup.text, max, style);
    }
}

fn section(buf: &mut Buffer, area: Rect, theme: &Theme, title: &str) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(format!(" {title} "), Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, buf);
    inner
}

fn draw_sidebar(
    buf: &mut Buffer,
    snap: &Snapshot<'_>,
    theme: &Theme,
    pres: &Presentation,
    area: Rect,
) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Score, best, blaster
            Constraint::Length(4), // Tiles ramp
            Constraint::Length(6), // Specials legend
            Constraint::Min(0),    // Keys
        ])
        .split(area);

    let inner = section(buf, chunks[0], theme, "Score");
    let shots = match snap.blaster_shots {
        Some(n) => n.to_string(),
        None => "∞".to_string(),
    };
    let stats = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(snap.score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best:  ", title_style),
            Span::styled(snap.best.max(snap.score).to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Shots: ", title_style),
            Span::styled(shots, fg_style),
        ]),
    ];
    Paragraph::new(stats).render(inner, buf);

    let inner = section(buf, chunks[1], theme, "Tiles");
    let ramp: Vec<Line> = (0..=crate::catalog::MAX_EXPONENT)
        .collect::<Vec<_>>()
        .chunks(5)
        .map(|exps| {
            Line::from(
                exps.iter()
                    .map(|&e| {
                        let kind = BlockKind::Number(e);
                        Span::styled(
                            format!("{:>4}", kind.label()),
                            Style::default().fg(theme.kind_color(kind)),
                        )
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    Paragraph::new(ramp).render(inner, buf);

    let inner = section(buf, chunks[2], theme, "Specials");
    let legend: Vec<Line> = Special::ALL
        .chunks(2)
        .map(|pair| {
            Line::from(
                pair.iter()
                    .map(|&s| {
                        Span::styled(
                            format!(" {:<5}", s.label()),
                            Style::default().fg(theme.kind_color(BlockKind::Special(s))),
                        )
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    Paragraph::new(legend).render(inner, buf);

    let inner = section(buf, chunks[3], theme, "Keys");
    let mut keys = vec![
        Line::from(Span::styled("←/→ h/l   Move", fg_style)),
        Line::from(Span::styled("↓ Space   Drop / fire", fg_style)),
        Line::from(Span::styled("P         Pause", fg_style)),
        Line::from(Span::styled("Q Esc     Quit", fg_style)),
    ];
    if pres.dev_keys {
        keys.push(Line::from(Span::styled(
            "1-9 F1-F8 Set kind",
            Style::default().fg(theme.inactive_fg),
        )));
    }
    Paragraph::new(keys).render(inner, buf);
}

/// Centred popup box of `w x h` inside `area`.
fn popup_rect(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn render_box(frame: &mut Frame, theme: &Theme, rect: Rect, lines: Vec<Line<'_>>) {
    Clear.render(rect, frame.buffer_mut());
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        );
    p.render(rect, frame.buffer_mut());
}

fn draw_title(frame: &mut Frame, snap: &Snapshot<'_>, theme: &Theme, area: Rect) {
    let fg = Style::default().fg(theme.main_fg);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " BitCrunch ",
            Style::default()
                .fg(Color::Black)
                .bg(theme.kind_color(BlockKind::Number(8)))
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("Stack equal numbers", fg)),
        Line::from(Span::styled("to double them.", fg)),
        Line::from(""),
        Line::from(Span::styled(format!("Best: {}", snap.best), fg)),
        Line::from(""),
        Line::from(Span::styled(
            "Enter  Start",
            Style::default().fg(theme.title),
        )),
        Line::from(Span::styled("Q  Quit", fg)),
    ];
    render_box(frame, theme, popup_rect(area, 24, 12), lines);
}

fn draw_countdown(frame: &mut Frame, theme: &Theme, n: u8, board: Rect) {
    let text = if n > 0 { n.to_string() } else { "GO".to_string() };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(" {text} "),
            Style::default()
                .fg(Color::Black)
                .bg(theme.title)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    render_box(frame, theme, popup_rect(board, 9, 4), lines);
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P Resume   Q Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    render_box(frame, theme, popup_rect(area, 24, 6), lines);
}

fn draw_game_over(
    frame: &mut Frame,
    snap: &Snapshot<'_>,
    theme: &Theme,
    new_best: bool,
    area: Rect,
) {
    let fg = Style::default().fg(theme.main_fg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", snap.score), fg)),
        Line::from(Span::styled(format!(" Best: {} ", snap.best), fg)),
    ];
    if new_best {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" R Restart   Q Quit ", fg)));
    render_box(frame, theme, popup_rect(area, 24, 10), lines);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameConfig;
    use crate::session::{Command, Session};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn cell_size_shrinks_to_fit() {
        let big = Rect::new(0, 0, 200, 60);
        assert_eq!(cell_size_for(big, 4, 12), (MAX_CELL_W, MAX_CELL_H));
        let small = Rect::new(0, 0, 40, 20);
        let (w, h) = cell_size_for(small, 4, 12);
        assert!(w * 4 + 2 + SIDEBAR_WIDTH <= 40);
        assert_eq!(h, 1);
        let tiny = Rect::new(0, 0, 10, 5);
        assert_eq!(cell_size_for(tiny, 4, 12), (1, 1));
    }

    #[test]
    fn removals_fade_and_merges_pop() {
        let theme = Theme::default();
        let mut pres = Presentation::new(true, true, true, false);
        pres.observe(&GameEvent::Merged { pos: Pos::new(1, 11), value: 8 }, &theme);
        pres.observe(
            &GameEvent::Removed {
                pos: Pos::new(2, 11),
                kind: BlockKind::Number(4),
                points: 16,
            },
            &theme,
        );
        pres.observe(
            &GameEvent::Annihilated {
                upper: Pos::new(0, 10),
                lower: Pos::new(0, 11),
            },
            &theme,
        );
        assert_eq!(pres.popups.len(), 2);
        assert_eq!(pres.popups[0].text, "+8");
        assert!(pres.is_fading(Pos::new(2, 11)));
        assert!(pres.is_fading(Pos::new(0, 10)));
        assert!(!pres.is_fading(Pos::new(1, 11)));

        pres.age(POPUP_MS);
        assert!(pres.popups.is_empty());
    }

    #[test]
    fn disabled_visuals_collect_nothing() {
        let theme = Theme::default();
        let mut pres = Presentation::new(false, false, false, false);
        pres.observe(
            &GameEvent::MaxMerge {
                pos: Pos::new(0, 11),
                points: 512,
            },
            &theme,
        );
        assert!(pres.popups.is_empty());
        assert!(!pres.is_fading(Pos::new(0, 11)));
    }

    #[test]
    fn draws_every_state() {
        let theme = Theme::default();
        let mut pres = Presentation::new(true, true, true, true);
        let mut session = Session::new(
            GameConfig {
                seed: Some(3),
                countdown_ms: 10,
                tick_rate: 100.0,
                ..GameConfig::default()
            },
            120,
        );
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();

        terminal
            .draw(|f| draw(f, &session.snapshot(), &theme, &mut pres))
            .unwrap();
        assert!(screen_text(&terminal).contains("Enter  Start"));

        session.handle(Command::Start);
        terminal
            .draw(|f| draw(f, &session.snapshot(), &theme, &mut pres))
            .unwrap();
        assert!(screen_text(&terminal).contains(" 3 "));

        while session.state() != SessionState::Running {
            session.tick();
        }
        session.handle(Command::Pause);
        terminal
            .draw(|f| draw(f, &session.snapshot(), &theme, &mut pres))
            .unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Paused"));
        assert!(text.contains("Best:  120"));
    }
}
