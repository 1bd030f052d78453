//! Match scheduler - the single task that owns the session store
//!
//! Socket tasks and timer tasks never touch the store. They post `Command`s into one
//! queue and the scheduler applies them in order, so every mutation, tick and broadcast
//! happens on one logical thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::util::time::unix_millis;
use crate::ws::connections::Outbox;
use crate::ws::protocol::{ClientMsg, Phase, ServerMsg};

use super::elimination::{self, Elimination};
use super::scoring;
use super::session::SessionStore;
use super::shrink::{self, WarningTracker};
use super::timer::{spawn_countdown, spawn_repeating, TimerSlot};

/// Queue depth between connection tasks and the scheduler
const COMMAND_CAPACITY: usize = 1024;

/// Everything the scheduler reacts to
#[derive(Debug, Clone)]
pub enum Command {
    /// A socket was upgraded (not yet joined)
    Connected { id: String },
    /// A parsed client message
    Inbound { id: String, msg: ClientMsg },
    /// A socket closed
    Disconnected { id: String },
    /// 20 Hz match loop
    Tick { round: u64 },
    /// 1 Hz score loop
    ScoreTick { round: u64 },
    /// One countdown step
    Countdown { round: u64, remaining: u32 },
    /// Stop the scheduler, cancelling every timer
    Shutdown,
}

/// Cloneable handle used by connection tasks and the HTTP surface
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    player_count: Arc<AtomicUsize>,
}

impl SessionHandle {
    /// Submit a command. Returns false once the scheduler has stopped.
    pub async fn send(&self, cmd: Command) -> bool {
        self.tx.send(cmd).await.is_ok()
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

pub struct MatchScheduler<O: Outbox> {
    pub(crate) store: SessionStore,
    pub(crate) outbox: O,
    inbox: mpsc::Receiver<Command>,
    /// Sender cloned into timer tasks
    tx: mpsc::Sender<Command>,
    /// Bumped whenever timers are torn down so stale timer commands are ignored
    round: u64,
    tick_timer: TimerSlot,
    score_timer: TimerSlot,
    countdown_timer: TimerSlot,
    warning: WarningTracker,
    player_count: Arc<AtomicUsize>,
}

impl<O: Outbox> MatchScheduler<O> {
    pub fn new(config: GameConfig, seed: u64, outbox: O) -> (Self, SessionHandle) {
        let (tx, inbox) = mpsc::channel(COMMAND_CAPACITY);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = SessionHandle {
            tx: tx.clone(),
            player_count: player_count.clone(),
        };

        let scheduler = Self {
            store: SessionStore::new(config, seed),
            outbox,
            inbox,
            tx,
            round: 0,
            tick_timer: TimerSlot::Idle,
            score_timer: TimerSlot::Idle,
            countdown_timer: TimerSlot::Idle,
            warning: WarningTracker::default(),
            player_count,
        };

        (scheduler, handle)
    }

    /// Process commands until shutdown
    pub async fn run(mut self) {
        info!("Match scheduler started");

        while let Some(cmd) = self.inbox.recv().await {
            if !self.handle(cmd, unix_millis()) {
                break;
            }
        }

        self.stop_timers();
        info!("Match scheduler stopped");
    }

    /// Apply one command. Returns false when the scheduler should stop.
    pub fn handle(&mut self, cmd: Command, now: u64) -> bool {
        match cmd {
            Command::Connected { id } => {
                self.outbox.send_to(
                    &id,
                    ServerMsg::PlayerCount {
                        count: self.store.len(),
                        max: self.store.config().max_players,
                    },
                );
            }
            Command::Inbound { id, msg } => {
                if let Err(e) = self.dispatch(&id, msg, now) {
                    debug!(participant_id = %id, reason = %e, "Ignored client message");
                }
            }
            Command::Disconnected { id } => self.on_disconnect(&id, now),
            Command::Tick { round } if round == self.round => self.tick(now),
            Command::ScoreTick { round } if round == self.round => self.score_tick(now),
            Command::Countdown { round, remaining } if round == self.round => {
                self.countdown_step(remaining, now)
            }
            Command::Tick { .. } | Command::ScoreTick { .. } | Command::Countdown { .. } => {
                debug!("Dropped stale timer command");
            }
            Command::Shutdown => {
                self.stop_timers();
                return false;
            }
        }
        true
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn timers_running(&self) -> bool {
        self.tick_timer.is_running()
            || self.score_timer.is_running()
            || self.countdown_timer.is_running()
    }

    // ------------------------------------------------------------------
    // Match loop
    // ------------------------------------------------------------------

    /// One 20 Hz step: positions, eliminations, end check, warning, shrink. In that order.
    fn tick(&mut self, now: u64) {
        if self.store.phase() != Phase::Playing {
            return;
        }

        self.outbox.broadcast(ServerMsg::PositionUpdate {
            players: self.store.position_snapshot(),
            timestamp: now,
        });

        for id in self.store.alive_ids() {
            if let Some(out) = elimination::evaluate(&mut self.store, &id, now) {
                self.announce_elimination(out);
            }
        }

        if self.check_match_end(now) {
            return;
        }

        let config = self.store.config().clone();
        let radius = self.store.arena_radius();
        let last_shrink = self.store.last_shrink_at().unwrap_or(now);

        let warning = shrink::warning_state(now, last_shrink, radius, &config);
        if let Some(changed) = self
            .warning
            .update(warning, config.warning_progress_threshold)
        {
            self.outbox.broadcast(ServerMsg::PlatformWarning {
                is_warning: changed.is_warning,
                progress: changed.progress,
            });
        }

        if shrink::should_shrink(now, last_shrink, radius, &config) {
            let radius = self
                .store
                .shrink_arena(shrink::next_radius(radius, &config), now);
            info!(radius, "Arena shrunk");
            self.outbox.broadcast(ServerMsg::PlatformShrink { radius });
        }
    }

    fn score_tick(&mut self, now: u64) {
        if self.store.phase() != Phase::Playing {
            return;
        }
        self.outbox.broadcast(ServerMsg::ScoreUpdate {
            scores: self.store.score_snapshot(now),
        });
    }

    pub(crate) fn announce_elimination(&mut self, out: Elimination) {
        info!(
            participant_id = %out.id,
            reason = ?out.reason,
            eliminated_by = ?out.eliminated_by.as_ref().map(|a| &a.id),
            "Participant eliminated"
        );
        self.outbox.broadcast(ServerMsg::PlayerEliminated {
            id: out.id,
            name: out.name,
            reason: out.reason,
            eliminated_by: out.eliminated_by,
        });
    }

    /// End the match if at most one participant is left standing
    pub(crate) fn check_match_end(&mut self, now: u64) -> bool {
        if self.store.phase() != Phase::Playing {
            return false;
        }
        let alive = self.store.alive_ids();
        if alive.len() > 1 {
            return false;
        }
        self.end_match(alive.into_iter().next(), now);
        true
    }

    // ------------------------------------------------------------------
    // Phase transitions
    // ------------------------------------------------------------------

    pub(crate) fn begin_countdown(&mut self, now: u64) {
        let seconds = self.store.config().countdown_secs;
        self.store.set_phase(Phase::Countdown, now);
        info!(seconds, participants = self.store.len(), "Countdown started");
        self.outbox.broadcast(ServerMsg::Countdown { count: seconds });

        if seconds == 0 {
            self.start_match(now);
            return;
        }

        let round = self.round;
        self.countdown_timer.start(spawn_countdown(
            seconds,
            Duration::from_secs(1),
            self.tx.clone(),
            move |remaining| Command::Countdown { round, remaining },
        ));
    }

    fn countdown_step(&mut self, remaining: u32, now: u64) {
        if self.store.phase() != Phase::Countdown {
            return;
        }
        self.outbox.broadcast(ServerMsg::Countdown { count: remaining });
        if remaining == 0 {
            self.start_match(now);
        }
    }

    fn start_match(&mut self, now: u64) {
        self.countdown_timer.cancel();
        self.store.set_phase(Phase::Playing, now);
        self.warning.reset();

        self.outbox.broadcast(ServerMsg::GameStart {
            snapshot: self.store.snapshot(now),
        });
        info!(participants = self.store.len(), "Match started");

        let round = self.round;
        let config = self.store.config();
        self.tick_timer.start(spawn_repeating(
            config.tick_period(),
            self.tx.clone(),
            move || Command::Tick { round },
        ));
        self.score_timer.start(spawn_repeating(
            config.score_period(),
            self.tx.clone(),
            move || Command::ScoreTick { round },
        ));
    }

    /// Stop the loops, freeze survivors' scores and announce the result
    pub(crate) fn end_match(&mut self, winner: Option<String>, now: u64) {
        if self.store.phase() != Phase::Playing {
            return;
        }
        self.stop_timers();

        let running_since = self.store.running_since();
        let config = self.store.config().clone();
        for id in self.store.alive_ids() {
            if let Some(p) = self.store.participant_mut(&id) {
                scoring::finalize(p, now, running_since, &config);
            }
        }
        self.store.set_phase(Phase::Ended, now);

        let scores = self.store.score_snapshot(now);
        let winner = winner.and_then(|id| self.store.view(&id, now));
        info!(
            winner = ?winner.as_ref().map(|w| &w.id),
            "Match ended"
        );

        self.outbox.broadcast(ServerMsg::ScoreUpdate {
            scores: scores.clone(),
        });
        self.outbox.broadcast(ServerMsg::GameEnd { winner, scores });
    }

    pub(crate) fn reset_round(&mut self, now: u64) {
        self.stop_timers();
        self.store.reset_for_new_round(now);
        self.warning.reset();
        self.outbox.broadcast(ServerMsg::GameReset {
            snapshot: self.store.snapshot(now),
        });
    }

    /// Cancel every per-match timer and invalidate anything they already queued
    pub(crate) fn stop_timers(&mut self) {
        self.tick_timer.cancel();
        self.score_timer.cancel();
        self.countdown_timer.cancel();
        self.round += 1;
    }

    pub(crate) fn sync_player_count(&self) {
        self.player_count.store(self.store.len(), Ordering::Relaxed);
    }

    pub(crate) fn broadcast_player_count(&self) {
        self.outbox.broadcast(ServerMsg::PlayerCount {
            count: self.store.len(),
            max: self.store.config().max_players,
        });
    }
}
