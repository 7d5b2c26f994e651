//! Player state: hand ownership, initial-play flag, score.

use crate::bot::BotDifficulty;
use crate::tile::{PlayerId, Tile, TileId};
use serde::{Deserialize, Serialize};

/// A single player's state. Hand tiles are exclusively owned here; ownership
/// moves to the board on a successful play and back on undo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Seat index (0-3)
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Tiles currently held
    pub hand: Vec<Tile>,
    /// Whether the 30-point initial play has been made
    pub has_played_initial: bool,
    /// Running score across the game (settled at game end)
    pub score: i32,
    /// Whether this seat is driven by the bot strategist
    pub is_bot: bool,
    /// Difficulty for bot seats
    pub bot_difficulty: Option<BotDifficulty>,
    /// Forced draws in a row; escalates bot aggressiveness. Bot seats only.
    pub consecutive_draws: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            hand: Vec::new(),
            has_played_initial: false,
            score: 0,
            is_bot: false,
            bot_difficulty: None,
            consecutive_draws: 0,
        }
    }

    pub fn new_bot(id: PlayerId, name: String, difficulty: BotDifficulty) -> Self {
        Self {
            is_bot: true,
            bot_difficulty: Some(difficulty),
            ..Self::new(id, name)
        }
    }

    pub fn has_tile(&self, id: TileId) -> bool {
        self.hand.iter().any(|t| t.id == id)
    }

    pub fn find_tile(&self, id: TileId) -> Option<Tile> {
        self.hand.iter().find(|t| t.id == id).copied()
    }

    /// Remove the given tiles from the hand. Callers verify ownership first;
    /// unknown ids are ignored here.
    pub fn remove_tiles(&mut self, ids: &[TileId]) {
        self.hand.retain(|t| !ids.contains(&t.id));
    }

    /// Pip value of the remaining hand (for end-of-game settlement).
    pub fn hand_value(&self) -> u32 {
        self.hand.iter().map(|t| t.pip_value()).sum()
    }
}
