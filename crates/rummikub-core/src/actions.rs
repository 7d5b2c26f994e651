//! Player actions and the events they produce.
//!
//! Actions are what the transport layer (or the bot strategist) submits;
//! events are the append-only log the engine keeps of everything that
//! happened in a game.

use crate::meld::Meld;
use crate::tile::{PlayerId, TileId};
use serde::{Deserialize, Serialize};

/// All actions a player can take during their turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    /// Play tiles from hand as a new meld, or append them to the meld at
    /// `set_index`.
    PlaySet {
        tile_ids: Vec<TileId>,
        set_index: Option<usize>,
    },

    /// Play several new melds atomically; their combined value must clear the
    /// initial-play minimum if that is still outstanding.
    PlayMultipleSets { sets: Vec<Vec<TileId>> },

    /// Draw one tile from the deck. Ends the turn.
    DrawTile,

    /// Replace the working board with a rearranged layout (uncommitted).
    UpdateBoard { layout: Vec<Meld> },

    /// Commit the turn. Gated on strict board validation.
    EndTurn,

    /// Discard all uncommitted changes and restore the turn-start snapshot.
    UndoTurn,
}

/// Events appended to the game's action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A player (human or bot) joined before the game started
    PlayerJoined { player: PlayerId, name: String },

    /// Tiles were dealt and play began
    GameStarted { first_player: PlayerId },

    /// A meld was played or extended
    SetPlayed {
        player: PlayerId,
        tile_ids: Vec<TileId>,
        set_index: usize,
        value: u32,
    },

    /// A tile moved deck -> hand, ending the turn
    TileDrawn { player: PlayerId },

    /// The working board was replaced mid-turn
    BoardRearranged { player: PlayerId },

    /// Uncommitted changes were rolled back to the snapshot
    TurnUndone { player: PlayerId },

    /// The turn timer fired: snapshot restored, forced draw (if possible)
    TurnTimedOut { player: PlayerId, forced_draw: bool },

    /// Turn advanced to the next player
    TurnEnded { player: PlayerId, next: PlayerId },

    /// A player emptied their hand
    GameWon { player: PlayerId },
}
