//! Cancellable deferred tasks keyed to game ids.
//!
//! Turn timers and bot moves are both deferred work that may outlive the
//! state that scheduled them. Each game has at most one of each: arming
//! aborts the previous handle, and removing a game cancels everything.
//! The tasks themselves re-check game liveness when they fire; this registry
//! only guarantees that stale handles never pile up.

use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Default)]
pub struct TaskRegistry {
    turn_timers: DashMap<Uuid, JoinHandle<()>>,
    bot_tasks: DashMap<Uuid, JoinHandle<()>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the turn timer for a game, aborting any previous one. A game
    /// never has two live timers.
    pub fn arm_turn_timer(&self, game_id: Uuid, handle: JoinHandle<()>) {
        if let Some(old) = self.turn_timers.insert(game_id, handle) {
            old.abort();
        }
    }

    pub fn cancel_turn_timer(&self, game_id: Uuid) {
        if let Some((_, old)) = self.turn_timers.remove(&game_id) {
            old.abort();
        }
    }

    /// Install the pending bot move for a game, aborting any previous one.
    pub fn arm_bot_task(&self, game_id: Uuid, handle: JoinHandle<()>) {
        if let Some(old) = self.bot_tasks.insert(game_id, handle) {
            old.abort();
        }
    }

    pub fn cancel_bot_task(&self, game_id: Uuid) {
        if let Some((_, old)) = self.bot_tasks.remove(&game_id) {
            old.abort();
        }
    }

    /// Cancel all deferred work for a game (abandonment, game over).
    pub fn cancel_all(&self, game_id: Uuid) {
        self.cancel_turn_timer(game_id);
        self.cancel_bot_task(game_id);
    }
}
