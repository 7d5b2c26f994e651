//! Rummikub game engine.
//!
//! This crate provides the complete core logic for multiplayer Rummikub:
//! - Tile model and the 106-tile deck
//! - Run/group validation with joker resolution, and meld scoring that is
//!   guaranteed to agree with validation
//! - The board with turn-start snapshots for undo and timeout recovery
//! - The turn state machine with strict/lenient validation modes
//! - A tiered heuristic bot strategist
//!
//! # Architecture
//!
//! The engine is synchronous and in-memory: it never blocks and performs no
//! I/O. Timers, bot scheduling and broadcasting are the transport layer's
//! responsibility; the engine exposes [`GameState::handle_timeout`] and
//! [`GameState::is_live`] for it to drive deferred work safely.
//!
//! # Modules
//!
//! - [`tile`]: tiles, colors and the deck
//! - [`meld`]: run/group validation and scoring
//! - [`board`]: the shared board and snapshots
//! - [`player`]: per-player state
//! - [`actions`]: player actions and the event log
//! - [`game`]: the game state machine
//! - [`bot`]: the bot strategist

pub mod actions;
pub mod board;
pub mod bot;
pub mod game;
pub mod meld;
pub mod player;
pub mod tile;

// Re-export commonly used types
pub use actions::{GameAction, GameEvent};
pub use board::{Board, SetIndex, ValidationMode};
pub use bot::{Bot, BotDifficulty};
pub use game::{
    GameError, GameOptions, GameState, GameView, PlayerSummary, INITIAL_HAND_SIZE,
    INITIAL_PLAY_MINIMUM, MAX_PLAYERS,
};
pub use meld::{
    is_valid_group, is_valid_run, is_valid_set, resolve_run, set_value, Meld, RunResolution,
    MIN_MELD_SIZE,
};
pub use player::Player;
pub use tile::{Color, Deck, PlayerId, Tile, TileId, TileKind, MAX_NUMBER};
