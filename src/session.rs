//! Session state machine: idle, countdown, running, paused, over.
//!
//! The session is the only thing the app talks to. It turns player commands
//! and scheduler ticks into game steps and queues [`GameEvent`]s for
//! presentation to drain.

use crate::board::{Board, Pos};
use crate::catalog::KindId;
use crate::game::{ms_to_ticks, Falling, Game, SpawnOutcome};
use crate::resolve::GameEvent;
use crate::GameConfig;
use tracing::{debug, info};

/// Countdown starts here and shows each value down to 1 before play.
pub const COUNTDOWN_FROM: u8 = 3;

/// `Countdown(n)` holds 3, 2 and 1. The step after 1 is reported as a
/// `Countdown(0)` event and enters `Running` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Countdown(u8),
    Running,
    Paused,
    Over,
}

/// Player intent, already decoupled from key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    MoveLeft,
    MoveRight,
    Drop,
    Pause,
    Resume,
    Restart,
    DevSetActiveKind(KindId),
}

/// Read-only view for renderers.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub state: SessionState,
    pub board: &'a Board,
    pub falling: Option<&'a Falling>,
    pub ghost: Option<Pos>,
    pub score: u32,
    pub best: u32,
    pub blaster_shots: Option<u32>,
}

#[derive(Debug)]
pub struct Session {
    config: GameConfig,
    game: Game,
    state: SessionState,
    countdown_ticks: u32,
    countdown_remaining: u32,
    events: Vec<GameEvent>,
}

impl Session {
    pub fn new(config: GameConfig, best: u32) -> Self {
        let game = Game::new(&config, best);
        let countdown_ticks = ms_to_ticks(config.countdown_ms, config.tick_rate).max(1);
        Self {
            config,
            game,
            state: SessionState::Idle,
            countdown_ticks,
            countdown_remaining: 0,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            state: self.state,
            board: self.game.board(),
            falling: self.game.falling(),
            ghost: self.game.ghost(),
            score: self.game.score().current(),
            best: self.game.score().best(),
            blaster_shots: self.game.blaster_shots(),
        }
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply a player command. Commands invalid in the current state are ignored.
    pub fn handle(&mut self, command: Command) {
        use SessionState as S;
        match (self.state, command) {
            (S::Idle, Command::Start) => self.begin_countdown(),
            (S::Running, Command::MoveLeft) => {
                self.game.shift(-1, &mut self.events);
            }
            (S::Running, Command::MoveRight) => {
                self.game.shift(1, &mut self.events);
            }
            (S::Running, Command::Drop) => {
                self.game.drop_block(&mut self.events);
                self.spawn_if_ready();
            }
            (S::Running, Command::Pause) => {
                info!("paused");
                self.state = S::Paused;
                self.events.push(GameEvent::Paused);
            }
            (S::Paused, Command::Resume) => {
                info!("resumed");
                self.state = S::Running;
                self.events.push(GameEvent::Resumed);
            }
            (S::Over, Command::Restart) => self.restart(),
            (S::Running, Command::DevSetActiveKind(id)) if self.config.dev_keys => {
                self.game.set_active_kind(id);
            }
            (state, command) => debug!(?state, ?command, "command ignored"),
        }
    }

    /// Advance one scheduler tick.
    pub fn tick(&mut self) {
        match self.state {
            SessionState::Countdown(n) => {
                self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
                if self.countdown_remaining > 0 {
                    return;
                }
                if n > 1 {
                    self.state = SessionState::Countdown(n - 1);
                    self.countdown_remaining = self.countdown_ticks;
                    self.events.push(GameEvent::Countdown(n - 1));
                } else {
                    self.events.push(GameEvent::Countdown(0));
                    self.state = SessionState::Running;
                    info!("game started");
                    self.spawn_if_ready();
                }
            }
            SessionState::Running => {
                self.game.tick(&mut self.events);
                self.spawn_if_ready();
            }
            SessionState::Idle | SessionState::Paused | SessionState::Over => {}
        }
    }

    fn begin_countdown(&mut self) {
        self.state = SessionState::Countdown(COUNTDOWN_FROM);
        self.countdown_remaining = self.countdown_ticks;
        self.events.push(GameEvent::Countdown(COUNTDOWN_FROM));
    }

    fn spawn_if_ready(&mut self) {
        if self.state != SessionState::Running || !self.game.ready_to_spawn() {
            return;
        }
        if self.game.spawn(&mut self.events) == SpawnOutcome::Blocked {
            self.game_over();
        }
    }

    fn game_over(&mut self) {
        let score = self.game.score().current();
        let new_best = self.game.score_mut().finish().is_some();
        let best = self.game.score().best();
        let blocks = self.game.board().block_count();
        info!(score, best, new_best, blocks, "game over");
        self.state = SessionState::Over;
        self.events.push(GameEvent::GameOver {
            score,
            best,
            new_best,
        });
    }

    fn restart(&mut self) {
        let best = self.game.score().best();
        self.game = Game::new(&self.config, best);
        self.state = SessionState::Idle;
        self.countdown_remaining = 0;
        info!("session reset");
    }

    #[cfg(test)]
    pub(crate) fn game(&self) -> &Game {
        &self.game
    }

    #[cfg(test)]
    pub(crate) fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }
}
