//! App: terminal init, main loop, scheduler ticks and key handling.

use crate::GameConfig;
use crate::highscores::HighScoreStore;
use crate::input::{Action, key_to_action};
use crate::resolve::GameEvent;
use crate::session::{Command, Session, SessionState};
use crate::theme::Theme;
use crate::ui::{self, Presentation};
use crate::Args;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// DAS (Delayed Auto-Shift): delay before a held move starts repeating.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding.
const REPEAT_INTERVAL_MS: u64 = 50;
/// Render cadence (~60 FPS).
const FRAME: Duration = Duration::from_millis(16);
/// Ticks replayed at most per frame after a stall.
const MAX_CATCH_UP: u32 = 5;

/// Session command for a key action in `state`. `None` for quit and no-ops.
pub fn command_for(action: Action, state: SessionState) -> Option<Command> {
    use SessionState as S;
    match (action, state) {
        (Action::Confirm, S::Idle) => Some(Command::Start),
        (Action::Confirm | Action::Restart, S::Over) => Some(Command::Restart),
        (Action::Pause, S::Running) => Some(Command::Pause),
        (Action::Pause, S::Paused) => Some(Command::Resume),
        (Action::MoveLeft, _) => Some(Command::MoveLeft),
        (Action::MoveRight, _) => Some(Command::MoveRight),
        (Action::Drop, _) => Some(Command::Drop),
        (Action::SetKind(id), _) => Some(Command::DevSetActiveKind(id)),
        _ => None,
    }
}

pub struct App {
    session: Session,
    theme: Theme,
    store: HighScoreStore,
    presentation: Presentation,
    tick_interval: Duration,
    last_tick: Instant,
    dev_keys: bool,
    /// Terminal reports key releases, so held moves can auto-repeat.
    key_release: bool,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme, store: HighScoreStore) -> Self {
        let best = store.load_or_zero();
        info!(best, path = %store.path().display(), "loaded best score");
        let tick_interval = Duration::from_secs_f64(1.0 / config.tick_rate);
        let dev_keys = config.dev_keys;
        Self {
            session: Session::new(config, best),
            theme,
            store,
            presentation: Presentation::new(
                !args.no_ghost,
                !args.no_popups,
                !args.no_animation,
                dev_keys,
            ),
            tick_interval,
            last_tick: Instant::now(),
            dev_keys,
            key_release: false,
            repeat_state: None,
            last_repeat_fire: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                DisableFocusChange, EnableFocusChange, KeyboardEnhancementFlags,
                PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
                supports_keyboard_enhancement,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;

        // Release events drive auto-repeat; without them we rely on OS key repeat.
        self.key_release = supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        if self.key_release {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        }
        execute!(std::io::stdout(), DisableFocusChange, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            self.presentation.advance(now);
            let session = &self.session;
            let theme = &self.theme;
            let presentation = &mut self.presentation;
            terminal.draw(|f| ui::draw(f, &session.snapshot(), theme, presentation))?;

            let timeout = FRAME.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) => {
                            let action = key_to_action(key, self.dev_keys);
                            if key.kind == KeyEventKind::Release {
                                if self.repeat_state.map(|(a, _)| a) == Some(action) {
                                    self.repeat_state = None;
                                    self.last_repeat_fire = None;
                                }
                                continue;
                            }
                            if key.kind == KeyEventKind::Repeat && self.key_release {
                                continue;
                            }
                            if action == Action::Quit {
                                return Ok(());
                            }
                            self.apply_action(action);
                            if self.key_release
                                && matches!(action, Action::MoveLeft | Action::MoveRight)
                            {
                                self.repeat_state = Some((action, Instant::now()));
                                self.last_repeat_fire = None;
                            }
                        }
                        Event::FocusLost if self.session.state() == SessionState::Running => {
                            info!("focus lost, pausing");
                            self.session.handle(Command::Pause);
                            self.repeat_state = None;
                        }
                        _ => {}
                    }
                }
                self.drain_events();
            }

            self.tick_repeat();

            let mut steps = 0;
            while self.last_tick.elapsed() >= self.tick_interval {
                if steps == MAX_CATCH_UP {
                    self.last_tick = Instant::now();
                    break;
                }
                self.last_tick += self.tick_interval;
                self.session.tick();
                steps += 1;
            }
            self.drain_events();
        }
    }

    fn apply_action(&mut self, action: Action) {
        let state = self.session.state();
        let Some(command) = command_for(action, state) else {
            return;
        };
        self.session.handle(command);
        if command == Command::Restart && self.session.state() == SessionState::Idle {
            self.presentation.reset();
            self.repeat_state = None;
        }
    }

    fn tick_repeat(&mut self) {
        let Some((action, first)) = self.repeat_state else {
            return;
        };
        if self.session.state() != SessionState::Running {
            self.repeat_state = None;
            return;
        }
        if first.elapsed() < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let now = Instant::now();
        let next =
            self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    /// Feed queued events to presentation and persist a new best.
    fn drain_events(&mut self) {
        for event in self.session.take_events() {
            if let GameEvent::GameOver {
                best,
                new_best: true,
                ..
            } = event
            {
                if let Err(e) = self.store.save(best) {
                    warn!(error = %e, "could not save best score");
                }
            }
            self.presentation.observe(&event, &self.theme);
        }
    }
}
