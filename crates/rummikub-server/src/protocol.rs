//! WebSocket protocol messages for multiplayer Rummikub.

use rummikub_core::{BotDifficulty, GameAction, GameView, SetIndex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game; the creator takes the first seat
    CreateGame {
        player_name: String,
        #[serde(default)]
        timer_enabled: bool,
        #[serde(default)]
        debug_mode: bool,
    },

    /// Join an existing game by id
    JoinGame { game_id: Uuid, player_name: String },

    /// Add a bot seat (host only)
    AddBot { difficulty: BotDifficulty },

    /// Start the game (host only)
    StartGame,

    /// Submit a game action for the sender's seat
    Action { action: GameAction },

    /// Ask for a strict or lenient check of the working board
    ValidateBoard { is_end_turn: bool },

    /// Request the list of joinable games
    ListGames,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client. Game state always travels as a
/// per-viewer [`GameView`]; no message ever carries another player's hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with the connection's player id
    Welcome { player_id: Uuid },

    /// Game created; the sender is host
    GameCreated { game_id: Uuid },

    /// Joined a game
    Joined { game_id: Uuid, view: GameView },

    /// The viewer's projection of the game after a state change
    GameUpdate { view: GameView },

    /// Outcome of the sender's last action
    ActionResult { success: bool, error: Option<String> },

    /// Result of a board validation request
    ValidationResult {
        valid: bool,
        invalid_set_index: Option<SetIndex>,
    },

    /// Joinable games
    GameList { games: Vec<GameInfo> },

    /// The game finished
    GameOver { winner_name: String },

    /// Error outside the action path
    Error { message: String },

    /// Pong response
    Pong,
}

/// Lobby-level information about a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInfo {
    pub id: Uuid,
    pub name: String,
    pub player_names: Vec<String>,
    pub started: bool,
}
