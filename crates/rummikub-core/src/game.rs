//! Core game state machine.
//!
//! `GameState` owns the deck, the players, the board and its turn-start
//! snapshot, sequences turns, and enforces every rule: meld validity, the
//! 30-point initial play, tile ownership, strict commit validation, undo and
//! timeout recovery. It performs no I/O and never blocks; timers and bot
//! scheduling are driven from outside via [`GameState::handle_timeout`] and
//! the bot strategist.

use crate::actions::{GameAction, GameEvent};
use crate::board::{Board, SetIndex, ValidationMode};
use crate::bot::BotDifficulty;
use crate::meld::{is_valid_set, set_value, Meld};
use crate::player::Player;
use crate::tile::{Deck, PlayerId, Tile, TileId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Maximum seats per game.
pub const MAX_PLAYERS: usize = 4;

/// Tiles dealt to each player at game start.
pub const INITIAL_HAND_SIZE: usize = 14;

/// Minimum combined meld value for a player's first play.
pub const INITIAL_PLAY_MINIMUM: u32 = 30;

/// Errors returned to the acting player. Every failure leaves the game state
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Tiles do not form a valid run or group")]
    InvalidSet,

    #[error("Initial play must total at least {INITIAL_PLAY_MINIMUM} points")]
    InsufficientInitialValue,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Game has not started")]
    GameNotStarted,

    #[error("Game has already started")]
    GameAlreadyStarted,

    #[error("Game already has {MAX_PLAYERS} players")]
    GameFull,

    #[error("At least 2 players are required to start")]
    InsufficientPlayers,

    #[error("The deck is empty")]
    DeckEmpty,

    #[error("Board set {0} is not a valid meld")]
    InvalidBoardState(SetIndex),

    #[error("Tile {0} is not owned by the acting player")]
    TileNotOwned(TileId),

    #[error("Tile {0} was committed to the board and cannot be removed")]
    BoardTileMissing(TileId),

    #[error("Game is over")]
    GameOver,
}

/// Per-game options chosen at creation time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GameOptions {
    /// Whether the transport layer should run a per-turn timer
    pub timer_enabled: bool,
    /// Assert the tile-ownership invariant after every mutation
    pub debug_mode: bool,
}

/// Public summary of another player: everything except their tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub tile_count: usize,
    pub has_played_initial: bool,
    pub score: i32,
    pub is_bot: bool,
}

/// The state one viewer is allowed to see: their own hand, everyone else as
/// counts. This is the only shape that ever leaves the engine per player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub you: PlayerId,
    pub hand: Vec<Tile>,
    pub players: Vec<PlayerSummary>,
    pub board: Vec<Meld>,
    pub current_player: PlayerId,
    pub started: bool,
    pub winner: Option<PlayerId>,
    pub deck_remaining: usize,
    pub timer_enabled: bool,
}

/// The complete state of one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub players: Vec<Player>,
    pub current_player: PlayerId,
    pub deck: Deck,
    pub board: Board,
    /// Deep copy of the board taken at the start of the current turn
    snapshot: Board,
    pub started: bool,
    pub winner: Option<PlayerId>,
    pub options: GameOptions,
    pub turn_number: u32,
    /// Append-only log of everything that happened
    pub log: Vec<GameEvent>,
}

impl GameState {
    pub fn new(options: GameOptions) -> Self {
        Self {
            players: Vec::new(),
            current_player: 0,
            deck: Deck::standard(),
            board: Board::new(),
            snapshot: Board::new(),
            started: false,
            winner: None,
            options,
            turn_number: 0,
            log: Vec::new(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id as usize)
    }

    /// Whether deferred work (bot moves, timers) should still act on this
    /// game.
    pub fn is_live(&self) -> bool {
        self.started && self.winner.is_none()
    }

    // ==================== Lobby ====================

    pub fn add_player(&mut self, name: String) -> Result<PlayerId, GameError> {
        self.add_seat(name, None)
    }

    pub fn add_bot_player(
        &mut self,
        name: String,
        difficulty: BotDifficulty,
    ) -> Result<PlayerId, GameError> {
        self.add_seat(name, Some(difficulty))
    }

    fn add_seat(
        &mut self,
        name: String,
        difficulty: Option<BotDifficulty>,
    ) -> Result<PlayerId, GameError> {
        if self.started {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::GameFull);
        }

        let id = self.players.len() as PlayerId;
        let player = match difficulty {
            Some(d) => Player::new_bot(id, name.clone(), d),
            None => Player::new(id, name.clone()),
        };
        self.players.push(player);
        self.log.push(GameEvent::PlayerJoined { player: id, name });
        Ok(id)
    }

    /// Deal 14 tiles to each player and begin the first turn.
    pub fn start_game(&mut self) -> Result<(), GameError> {
        if self.started {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.players.len() < 2 {
            return Err(GameError::InsufficientPlayers);
        }

        let mut rng = rand::thread_rng();
        self.deck.shuffle(&mut rng);

        for player in &mut self.players {
            for _ in 0..INITIAL_HAND_SIZE {
                // 106 tiles always cover 4 players x 14.
                if let Some(tile) = self.deck.draw() {
                    player.hand.push(tile);
                }
            }
        }

        self.current_player = rng.gen_range(0..self.players.len()) as PlayerId;
        self.started = true;
        self.turn_number = 1;
        self.snapshot = self.board.snapshot();
        self.log.push(GameEvent::GameStarted {
            first_player: self.current_player,
        });
        self.check_invariant();
        Ok(())
    }

    // ==================== Turn actions ====================

    /// Dispatch a single action on behalf of `player`.
    pub fn apply_action(&mut self, player: PlayerId, action: GameAction) -> Result<(), GameError> {
        match action {
            GameAction::PlaySet {
                tile_ids,
                set_index,
            } => self.play_set(player, &tile_ids, set_index),
            GameAction::PlayMultipleSets { sets } => self.play_multiple_sets(player, &sets),
            GameAction::DrawTile => self.draw_tile(player),
            GameAction::UpdateBoard { layout } => self.update_board(player, layout),
            GameAction::EndTurn => self.end_turn(player),
            GameAction::UndoTurn => self.request_undo(player),
        }
    }

    /// Play tiles from hand as a new meld, or append them to an existing one.
    pub fn play_set(
        &mut self,
        player: PlayerId,
        tile_ids: &[TileId],
        set_index: Option<usize>,
    ) -> Result<(), GameError> {
        self.ensure_turn(player)?;
        if tile_ids.is_empty() {
            return Err(GameError::InvalidSet);
        }

        let tiles = self.owned_tiles(player, tile_ids)?;
        let pidx = player as usize;

        let target_index = match set_index {
            Some(index) => {
                // Board tiles must not subsidize the 30-point threshold, so
                // extending existing melds is locked until the initial play.
                if !self.players[pidx].has_played_initial {
                    return Err(GameError::InsufficientInitialValue);
                }
                let meld = self.board.melds.get(index).ok_or(GameError::InvalidSet)?;
                let mut candidate = meld.tiles.clone();
                candidate.extend_from_slice(&tiles);
                if !is_valid_set(&candidate) {
                    return Err(GameError::InvalidSet);
                }

                self.players[pidx].remove_tiles(tile_ids);
                self.board.melds[index].tiles.extend_from_slice(&tiles);
                index
            }
            None => {
                if !is_valid_set(&tiles) {
                    return Err(GameError::InvalidSet);
                }
                if !self.players[pidx].has_played_initial {
                    let value = set_value(&tiles).unwrap_or(0);
                    if value < INITIAL_PLAY_MINIMUM {
                        return Err(GameError::InsufficientInitialValue);
                    }
                }

                self.players[pidx].remove_tiles(tile_ids);
                self.board.melds.push(Meld::new(tiles.clone()));
                self.board.melds.len() - 1
            }
        };

        let value = set_value(&self.board.melds[target_index].tiles).unwrap_or(0);
        self.players[pidx].has_played_initial = true;
        self.players[pidx].consecutive_draws = 0;
        self.log.push(GameEvent::SetPlayed {
            player,
            tile_ids: tile_ids.to_vec(),
            set_index: target_index,
            value,
        });

        self.check_win(player);
        self.check_invariant();
        Ok(())
    }

    /// Play several new melds atomically. Every meld must validate on its own
    /// and, on an initial play, their combined value must clear the minimum.
    pub fn play_multiple_sets(
        &mut self,
        player: PlayerId,
        sets: &[Vec<TileId>],
    ) -> Result<(), GameError> {
        self.ensure_turn(player)?;
        if sets.is_empty() || sets.iter().any(|s| s.is_empty()) {
            return Err(GameError::InvalidSet);
        }

        // Validate everything before touching any state.
        let mut seen: HashSet<TileId> = HashSet::new();
        let mut resolved: Vec<Vec<Tile>> = Vec::with_capacity(sets.len());
        let mut combined_value: u32 = 0;

        for tile_ids in sets {
            for &id in tile_ids {
                if !seen.insert(id) {
                    return Err(GameError::TileNotOwned(id));
                }
            }
            let tiles = self.owned_tiles(player, tile_ids)?;
            if !is_valid_set(&tiles) {
                return Err(GameError::InvalidSet);
            }
            combined_value += set_value(&tiles).unwrap_or(0);
            resolved.push(tiles);
        }

        let pidx = player as usize;
        if !self.players[pidx].has_played_initial && combined_value < INITIAL_PLAY_MINIMUM {
            return Err(GameError::InsufficientInitialValue);
        }

        for (tile_ids, tiles) in sets.iter().zip(resolved) {
            self.players[pidx].remove_tiles(tile_ids);
            let value = set_value(&tiles).unwrap_or(0);
            self.board.melds.push(Meld::new(tiles));
            self.log.push(GameEvent::SetPlayed {
                player,
                tile_ids: tile_ids.clone(),
                set_index: self.board.melds.len() - 1,
                value,
            });
        }

        self.players[pidx].has_played_initial = true;
        self.players[pidx].consecutive_draws = 0;
        self.check_win(player);
        self.check_invariant();
        Ok(())
    }

    /// Draw one tile and end the turn. Any uncommitted rearrangement is
    /// rolled back first so a mid-edit board never crosses a turn boundary.
    pub fn draw_tile(&mut self, player: PlayerId) -> Result<(), GameError> {
        self.ensure_turn(player)?;
        if self.deck.is_empty() {
            return Err(GameError::DeckEmpty);
        }

        self.restore_snapshot();
        let tile = self.deck.draw().ok_or(GameError::DeckEmpty)?;
        let pidx = player as usize;
        self.players[pidx].hand.push(tile);
        if self.players[pidx].is_bot {
            self.players[pidx].consecutive_draws += 1;
        }

        self.log.push(GameEvent::TileDrawn { player });
        self.advance_turn(player);
        self.check_invariant();
        Ok(())
    }

    /// Replace the working board with a rearranged layout.
    ///
    /// The layout is diffed against the turn-start snapshot: committed board
    /// tiles may move between melds but never disappear, and tiles new to the
    /// board must come from the acting player's hand. Tile data is replaced
    /// by the canonical tiles the engine knows, so a client cannot forge a
    /// tile's kind.
    pub fn update_board(&mut self, player: PlayerId, layout: Vec<Meld>) -> Result<(), GameError> {
        self.ensure_turn(player)?;
        let pidx = player as usize;

        let snapshot_ids = self.snapshot.tile_ids();
        let current_ids = self.board.tile_ids();
        let hand_ids: HashSet<TileId> = self.players[pidx].hand.iter().map(|t| t.id).collect();

        let mut new_ids: HashSet<TileId> = HashSet::new();
        for meld in &layout {
            for tile in &meld.tiles {
                if !new_ids.insert(tile.id) {
                    return Err(GameError::TileNotOwned(tile.id));
                }
            }
        }

        for &id in &snapshot_ids {
            if !new_ids.contains(&id) {
                return Err(GameError::BoardTileMissing(id));
            }
        }
        for &id in &new_ids {
            if !current_ids.contains(&id) && !hand_ids.contains(&id) {
                return Err(GameError::TileNotOwned(id));
            }
        }

        // Canonical tile lookup: the working board plus the player's hand
        // covers every id the checks above admitted.
        let canonical: HashMap<TileId, Tile> = self
            .board
            .tiles()
            .copied()
            .chain(self.players[pidx].hand.iter().copied())
            .map(|t| (t.id, t))
            .collect();

        // Uncommitted tiles dropped from the layout go back to the hand.
        let returned: Vec<Tile> = self
            .board
            .tiles()
            .filter(|t| !snapshot_ids.contains(&t.id) && !new_ids.contains(&t.id))
            .copied()
            .collect();

        let placed: Vec<TileId> = new_ids
            .iter()
            .copied()
            .filter(|id| hand_ids.contains(id))
            .collect();

        self.players[pidx].remove_tiles(&placed);
        self.players[pidx].hand.extend(returned);
        self.board.melds = layout
            .into_iter()
            .filter(|m| !m.is_empty())
            .map(|m| Meld::new(m.tiles.iter().map(|t| canonical[&t.id]).collect()))
            .collect();

        self.log.push(GameEvent::BoardRearranged { player });
        self.check_invariant();
        Ok(())
    }

    /// Commit the turn. Every board meld must be a complete valid set.
    pub fn end_turn(&mut self, player: PlayerId) -> Result<(), GameError> {
        self.ensure_turn(player)?;
        self.board
            .validate(ValidationMode::Strict)
            .map_err(GameError::InvalidBoardState)?;
        self.advance_turn(player);
        Ok(())
    }

    /// Discard all uncommitted changes: tiles placed this turn return to the
    /// acting player's hand and the board reverts to the snapshot.
    pub fn request_undo(&mut self, player: PlayerId) -> Result<(), GameError> {
        self.ensure_turn(player)?;
        self.restore_snapshot();
        self.log.push(GameEvent::TurnUndone { player });
        self.check_invariant();
        Ok(())
    }

    /// Strict or lenient board validation, as the commit gate uses it.
    pub fn validate_board(&self, is_end_turn: bool) -> Result<(), SetIndex> {
        let mode = if is_end_turn {
            ValidationMode::Strict
        } else {
            ValidationMode::Lenient
        };
        self.board.validate(mode)
    }

    /// The current player's turn timer expired: roll back uncommitted edits,
    /// force-draw one tile if the deck allows, and pass the turn. A no-op on
    /// games that are not live.
    pub fn handle_timeout(&mut self) {
        if !self.is_live() {
            return;
        }

        let player = self.current_player;
        self.restore_snapshot();

        let forced_draw = match self.deck.draw() {
            Some(tile) => {
                let pidx = player as usize;
                self.players[pidx].hand.push(tile);
                if self.players[pidx].is_bot {
                    self.players[pidx].consecutive_draws += 1;
                }
                true
            }
            // Deck exhausted: no draw rule exists for this case, the turn
            // simply passes.
            None => false,
        };

        self.log.push(GameEvent::TurnTimedOut {
            player,
            forced_draw,
        });
        self.advance_turn(player);
        self.check_invariant();
    }

    // ==================== Views ====================

    /// Project the state for one viewer: their own hand, every other hand as
    /// a count only.
    pub fn view_for(&self, viewer: PlayerId) -> GameView {
        GameView {
            you: viewer,
            hand: self
                .get_player(viewer)
                .map(|p| p.hand.clone())
                .unwrap_or_default(),
            players: self
                .players
                .iter()
                .map(|p| PlayerSummary {
                    id: p.id,
                    name: p.name.clone(),
                    tile_count: p.hand.len(),
                    has_played_initial: p.has_played_initial,
                    score: p.score,
                    is_bot: p.is_bot,
                })
                .collect(),
            board: self.board.melds.clone(),
            current_player: self.current_player,
            started: self.started,
            winner: self.winner,
            deck_remaining: self.deck.len(),
            timer_enabled: self.options.timer_enabled,
        }
    }

    // ==================== Helpers ====================

    fn ensure_turn(&self, player: PlayerId) -> Result<(), GameError> {
        if !self.started {
            return Err(GameError::GameNotStarted);
        }
        if self.winner.is_some() {
            return Err(GameError::GameOver);
        }
        if player != self.current_player {
            return Err(GameError::NotYourTurn);
        }
        Ok(())
    }

    /// Look up the requested tiles in the player's hand, rejecting duplicates
    /// and unowned ids. Does not mutate.
    fn owned_tiles(&self, player: PlayerId, tile_ids: &[TileId]) -> Result<Vec<Tile>, GameError> {
        let owner = self.get_player(player).ok_or(GameError::NotYourTurn)?;
        let mut seen: HashSet<TileId> = HashSet::new();
        let mut tiles = Vec::with_capacity(tile_ids.len());
        for &id in tile_ids {
            if !seen.insert(id) {
                return Err(GameError::TileNotOwned(id));
            }
            tiles.push(owner.find_tile(id).ok_or(GameError::TileNotOwned(id))?);
        }
        Ok(tiles)
    }

    /// Return every uncommitted board tile to the current player's hand and
    /// revert the board to the turn-start snapshot.
    fn restore_snapshot(&mut self) {
        let returned = self.board.tiles_not_in(&self.snapshot);
        let pidx = self.current_player as usize;
        self.players[pidx].hand.extend(returned);
        self.board = self.snapshot.snapshot();
    }

    fn advance_turn(&mut self, player: PlayerId) {
        if self.winner.is_some() {
            return;
        }
        self.current_player = (self.current_player + 1) % self.players.len() as PlayerId;
        self.turn_number += 1;
        self.snapshot = self.board.snapshot();
        self.log.push(GameEvent::TurnEnded {
            player,
            next: self.current_player,
        });
    }

    /// An empty hand after a play wins the game. Scores settle immediately:
    /// each opponent loses their remaining hand value, the winner gains the
    /// total.
    fn check_win(&mut self, player: PlayerId) {
        if !self.players[player as usize].hand.is_empty() {
            return;
        }

        let mut pot: i32 = 0;
        for other in &mut self.players {
            if other.id != player {
                let value = other.hand_value() as i32;
                other.score -= value;
                pot += value;
            }
        }
        self.players[player as usize].score += pot;
        self.winner = Some(player);
        self.log.push(GameEvent::GameWon { player });
    }

    /// Invariant: a tile id appears in at most one of {deck, any hand, any
    /// board meld}. A breach means desynchronized state and is fatal for the
    /// game actor, so it panics rather than being papered over. Only checked
    /// when `debug_mode` is set.
    fn check_invariant(&self) {
        if !self.options.debug_mode {
            return;
        }

        let mut seen: HashSet<TileId> = HashSet::new();
        let mut check = |id: TileId, owner: &str| {
            assert!(
                seen.insert(id),
                "tile {} appears in two owners (second: {})",
                id,
                owner
            );
        };

        for tile in self.deck.tiles() {
            check(tile.id, "deck");
        }
        for player in &self.players {
            for tile in &player.hand {
                check(tile.id, "hand");
            }
        }
        for tile in self.board.tiles() {
            check(tile.id, "board");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Color;
    use pretty_assertions::assert_eq;

    fn started_game() -> GameState {
        let mut game = GameState::new(GameOptions {
            timer_enabled: false,
            debug_mode: true,
        });
        game.add_player("Alice".to_string()).unwrap();
        game.add_player("Bob".to_string()).unwrap();
        game.start_game().unwrap();
        game
    }

    /// Swap tiles into the current player's hand, pulling the originals out
    /// of play entirely so the ownership invariant holds.
    fn give_hand(game: &mut GameState, tiles: Vec<Tile>) -> PlayerId {
        let player = game.current_player;
        game.players[player as usize].hand = tiles;
        // Disable the invariant check: test hands are fabricated and may
        // collide with ids still in the deck.
        game.options.debug_mode = false;
        player
    }

    #[test]
    fn test_capacity_limit() {
        let mut game = GameState::new(GameOptions::default());
        for i in 0..4 {
            game.add_player(format!("P{}", i)).unwrap();
        }
        assert_eq!(
            game.add_player("P4".to_string()),
            Err(GameError::GameFull)
        );
    }

    #[test]
    fn test_start_requires_two_players() {
        let mut game = GameState::new(GameOptions::default());
        game.add_player("Alice".to_string()).unwrap();
        assert_eq!(game.start_game(), Err(GameError::InsufficientPlayers));
    }

    #[test]
    fn test_start_deals_fourteen_each() {
        let game = started_game();
        for player in &game.players {
            assert_eq!(player.hand.len(), INITIAL_HAND_SIZE);
        }
        assert_eq!(game.deck.len(), 106 - 2 * INITIAL_HAND_SIZE);
        assert!(game.is_live());
    }

    #[test]
    fn test_cannot_join_after_start() {
        let mut game = started_game();
        assert_eq!(
            game.add_player("Carol".to_string()),
            Err(GameError::GameAlreadyStarted)
        );
    }

    #[test]
    fn test_play_set_requires_turn() {
        let mut game = started_game();
        let other = (game.current_player + 1) % 2;
        let tile_ids: Vec<TileId> = game.players[other as usize]
            .hand
            .iter()
            .take(3)
            .map(|t| t.id)
            .collect();

        let hand_before = game.players[other as usize].hand.clone();
        let result = game.play_set(other, &tile_ids, None);
        assert_eq!(result, Err(GameError::NotYourTurn));
        assert_eq!(game.players[other as usize].hand, hand_before);
        assert!(game.board.melds.is_empty());
    }

    #[test]
    fn test_play_set_rejects_unowned_tile() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                Tile::numbered(0, Color::Red, 1),
                Tile::numbered(1, Color::Red, 2),
            ],
        );
        // Tile 2 is not in the hand.
        let result = game.play_set(player, &[0, 1, 2], None);
        assert_eq!(result, Err(GameError::TileNotOwned(2)));
        assert_eq!(game.players[player as usize].hand.len(), 2);
    }

    #[test]
    fn test_initial_play_minimum_enforced() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                Tile::numbered(0, Color::Red, 1),
                Tile::numbered(1, Color::Red, 2),
                Tile::numbered(2, Color::Red, 3),
                Tile::numbered(3, Color::Blue, 5),
            ],
        );

        // 1+2+3 = 6 points: below the minimum.
        let result = game.play_set(player, &[0, 1, 2], None);
        assert_eq!(result, Err(GameError::InsufficientInitialValue));
        assert!(game.board.melds.is_empty());
        assert!(!game.players[player as usize].has_played_initial);
    }

    #[test]
    fn test_initial_play_succeeds_at_thirty() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                Tile::numbered(0, Color::Red, 13),
                Tile::numbered(1, Color::Blue, 13),
                Tile::numbered(2, Color::Yellow, 13),
                Tile::numbered(3, Color::Black, 1),
            ],
        );

        game.play_set(player, &[0, 1, 2], None).unwrap();
        assert!(game.players[player as usize].has_played_initial);
        assert_eq!(game.board.melds.len(), 1);
        assert_eq!(game.players[player as usize].hand.len(), 1);
    }

    #[test]
    fn test_play_multiple_sets_combined_minimum() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                // Run 1-2-3 red (6 points)
                Tile::numbered(0, Color::Red, 1),
                Tile::numbered(1, Color::Red, 2),
                Tile::numbered(2, Color::Red, 3),
                // Group of 9s (27 points): combined 33 >= 30
                Tile::numbered(3, Color::Red, 9),
                Tile::numbered(4, Color::Blue, 9),
                Tile::numbered(5, Color::Yellow, 9),
            ],
        );

        // Individually the run is below 30, together they clear it.
        game.play_multiple_sets(player, &[vec![0, 1, 2], vec![3, 4, 5]])
            .unwrap();
        assert_eq!(game.board.melds.len(), 2);
        assert!(game.players[player as usize].hand.is_empty());
        // Emptying the hand wins immediately.
        assert_eq!(game.winner, Some(player));
    }

    #[test]
    fn test_play_multiple_sets_all_or_nothing() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                Tile::numbered(0, Color::Red, 11),
                Tile::numbered(1, Color::Red, 12),
                Tile::numbered(2, Color::Red, 13),
                Tile::numbered(3, Color::Blue, 2),
                Tile::numbered(4, Color::Yellow, 5),
                Tile::numbered(5, Color::Black, 8),
            ],
        );

        // Second set is invalid: nothing must be applied.
        let result = game.play_multiple_sets(player, &[vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(result, Err(GameError::InvalidSet));
        assert!(game.board.melds.is_empty());
        assert_eq!(game.players[player as usize].hand.len(), 6);
    }

    #[test]
    fn test_extend_requires_initial_play() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![Tile::numbered(0, Color::Red, 4), Tile::joker(105)],
        );
        game.board.melds.push(Meld::new(vec![
            Tile::numbered(10, Color::Red, 1),
            Tile::numbered(11, Color::Red, 2),
            Tile::numbered(12, Color::Red, 3),
        ]));
        game.snapshot = game.board.snapshot();

        let result = game.play_set(player, &[0], Some(0));
        assert_eq!(result, Err(GameError::InsufficientInitialValue));
    }

    #[test]
    fn test_extend_existing_run() {
        let mut game = started_game();
        let player = give_hand(&mut game, vec![Tile::numbered(0, Color::Red, 4)]);
        game.players[player as usize].has_played_initial = true;
        game.players[player as usize].hand.push(Tile::joker(105));
        game.board.melds.push(Meld::new(vec![
            Tile::numbered(10, Color::Red, 1),
            Tile::numbered(11, Color::Red, 2),
            Tile::numbered(12, Color::Red, 3),
        ]));
        game.snapshot = game.board.snapshot();

        game.play_set(player, &[0], Some(0)).unwrap();
        assert_eq!(game.board.melds[0].len(), 4);
        assert!(!game.players[player as usize].has_tile(0));
    }

    #[test]
    fn test_draw_tile_ends_turn() {
        let mut game = started_game();
        let player = game.current_player;
        let hand_before = game.players[player as usize].hand.len();

        game.draw_tile(player).unwrap();
        assert_eq!(game.players[player as usize].hand.len(), hand_before + 1);
        assert_ne!(game.current_player, player);
    }

    #[test]
    fn test_draw_from_empty_deck_fails_cleanly() {
        let mut game = started_game();
        let player = game.current_player;
        while game.deck.draw().is_some() {}

        let hand_before = game.players[player as usize].hand.clone();
        let result = game.draw_tile(player);
        assert_eq!(result, Err(GameError::DeckEmpty));
        assert_eq!(game.players[player as usize].hand, hand_before);
        assert_eq!(game.current_player, player);
    }

    #[test]
    fn test_undo_returns_played_tiles() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                Tile::numbered(0, Color::Red, 13),
                Tile::numbered(1, Color::Blue, 13),
                Tile::numbered(2, Color::Yellow, 13),
                Tile::numbered(3, Color::Black, 1),
            ],
        );

        game.play_set(player, &[0, 1, 2], None).unwrap();
        assert_eq!(game.players[player as usize].hand.len(), 1);

        game.request_undo(player).unwrap();
        assert_eq!(game.players[player as usize].hand.len(), 4);
        assert!(game.board.melds.is_empty());
    }

    #[test]
    fn test_end_turn_gated_on_strict_validation() {
        let mut game = started_game();
        let player = game.current_player;
        // Leave a 2-tile fragment on the working board.
        game.board.melds.push(Meld::new(vec![
            Tile::numbered(200, Color::Red, 1),
            Tile::numbered(201, Color::Red, 2),
        ]));
        game.options.debug_mode = false;

        assert_eq!(game.end_turn(player), Err(GameError::InvalidBoardState(0)));
        assert_eq!(game.validate_board(false), Ok(()));
        assert_eq!(game.validate_board(true), Err(0));
    }

    #[test]
    fn test_update_board_moves_hand_tile() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                Tile::numbered(0, Color::Red, 5),
                Tile::numbered(1, Color::Red, 6),
                Tile::numbered(2, Color::Red, 7),
            ],
        );

        let layout = vec![Meld::new(vec![
            Tile::numbered(0, Color::Red, 5),
            Tile::numbered(1, Color::Red, 6),
            Tile::numbered(2, Color::Red, 7),
        ])];
        game.update_board(player, layout).unwrap();

        assert!(game.players[player as usize].hand.is_empty());
        assert_eq!(game.board.melds.len(), 1);

        // Dropping the tiles from a later layout returns them to the hand.
        game.update_board(player, vec![]).unwrap();
        assert_eq!(game.players[player as usize].hand.len(), 3);
        assert!(game.board.melds.is_empty());
    }

    #[test]
    fn test_update_board_rejects_removing_committed_tile() {
        let mut game = started_game();
        let player = give_hand(&mut game, vec![]);
        game.board.melds.push(Meld::new(vec![
            Tile::numbered(10, Color::Red, 1),
            Tile::numbered(11, Color::Red, 2),
            Tile::numbered(12, Color::Red, 3),
        ]));
        game.snapshot = game.board.snapshot();

        let result = game.update_board(player, vec![]);
        assert!(matches!(result, Err(GameError::BoardTileMissing(_))));
        assert_eq!(game.board.melds.len(), 1);
    }

    #[test]
    fn test_update_board_rejects_foreign_tile() {
        let mut game = started_game();
        let player = give_hand(&mut game, vec![]);

        // Tile 50 belongs to the deck or the other player, not this hand.
        let layout = vec![Meld::new(vec![
            Tile::numbered(50, Color::Red, 5),
            Tile::numbered(51, Color::Red, 6),
            Tile::numbered(52, Color::Red, 7),
        ])];
        let result = game.update_board(player, layout);
        assert!(matches!(result, Err(GameError::TileNotOwned(_))));
    }

    #[test]
    fn test_timeout_restores_and_force_draws() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                Tile::numbered(0, Color::Red, 13),
                Tile::numbered(1, Color::Blue, 13),
                Tile::numbered(2, Color::Yellow, 13),
                Tile::numbered(3, Color::Black, 1),
            ],
        );

        game.play_set(player, &[0, 1, 2], None).unwrap();
        game.handle_timeout();

        // Played tiles came back, plus one forced draw.
        assert_eq!(game.players[player as usize].hand.len(), 5);
        assert!(game.board.melds.is_empty());
        assert_ne!(game.current_player, player);
        assert!(game
            .log
            .iter()
            .any(|e| matches!(e, GameEvent::TurnTimedOut { forced_draw: true, .. })));
    }

    #[test]
    fn test_timeout_with_empty_deck_passes_turn() {
        let mut game = started_game();
        let player = game.current_player;
        while game.deck.draw().is_some() {}
        game.options.debug_mode = false;

        game.handle_timeout();
        assert_ne!(game.current_player, player);
        assert!(game
            .log
            .iter()
            .any(|e| matches!(e, GameEvent::TurnTimedOut { forced_draw: false, .. })));
    }

    #[test]
    fn test_win_settles_scores() {
        let mut game = started_game();
        let player = give_hand(
            &mut game,
            vec![
                Tile::numbered(0, Color::Red, 13),
                Tile::numbered(1, Color::Blue, 13),
                Tile::numbered(2, Color::Yellow, 13),
            ],
        );
        let other = (player + 1) % 2;
        game.players[other as usize].hand = vec![
            Tile::numbered(10, Color::Red, 5),
            Tile::joker(104),
        ];

        game.play_set(player, &[0, 1, 2], None).unwrap();
        assert_eq!(game.winner, Some(player));
        assert_eq!(game.players[player as usize].score, 35);
        assert_eq!(game.players[other as usize].score, -35);

        // No further actions accepted.
        assert_eq!(game.draw_tile(player), Err(GameError::GameOver));
    }

    #[test]
    fn test_view_hides_other_hands() {
        let game = started_game();
        let viewer = game.current_player;
        let other = (viewer + 1) % 2;
        let view = game.view_for(viewer);

        assert_eq!(view.you, viewer);
        assert_eq!(view.hand, game.players[viewer as usize].hand);
        let other_summary = view
            .players
            .iter()
            .find(|p| p.id == other)
            .expect("other player should be summarized");
        assert_eq!(other_summary.tile_count, INITIAL_HAND_SIZE);
        // Summaries never carry tiles; only the viewer's own hand appears.
        assert_eq!(view.players.len(), 2);
    }

    #[test]
    fn test_invariant_check_catches_duplicate_owner() {
        let mut game = started_game();
        let player = game.current_player as usize;
        let duplicated = game.players[player].hand[0];
        game.players[(player + 1) % 2].hand.push(duplicated);

        let result = std::panic::catch_unwind(move || game.check_invariant());
        assert!(result.is_err());
    }
}
