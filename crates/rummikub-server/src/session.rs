//! Game session management.
//!
//! A session wraps one `GameState`, maps connection ids to seats, runs bot
//! turns, and produces the per-viewer projections the server broadcasts.
//! All mutation of a session happens under the registry's per-entry lock, so
//! actions on one game are serialized.

use rummikub_core::{Bot, BotDifficulty, GameAction, GameError, GameOptions, GameState, GameView, PlayerId};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::GameInfo;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Player not in game")]
    PlayerNotInGame,

    #[error("Only the host may do that")]
    NotHost,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// A human player's connection bound to a seat.
#[derive(Debug, Clone)]
pub struct SessionPlayer {
    pub id: Uuid,
    pub name: String,
    pub connected: bool,
    pub seat: PlayerId,
}

/// One joined game: the engine state plus connection bookkeeping.
pub struct GameSession {
    pub id: Uuid,
    pub name: String,
    pub host_id: Uuid,
    pub players: HashMap<Uuid, SessionPlayer>,
    pub game: GameState,
    /// Strategists for bot seats
    bots: Vec<Bot>,
}

impl GameSession {
    pub fn new(id: Uuid, host_id: Uuid, host_name: String, options: GameOptions) -> Self {
        let mut game = GameState::new(options);
        // Capacity 4, empty game: the first join cannot fail.
        let seat = game.add_player(host_name.clone()).unwrap_or(0);

        let mut players = HashMap::new();
        players.insert(
            host_id,
            SessionPlayer {
                id: host_id,
                name: host_name.clone(),
                connected: true,
                seat,
            },
        );

        Self {
            id,
            name: format!("{}'s game", host_name),
            host_id,
            players,
            game,
            bots: Vec::new(),
        }
    }

    pub fn join(&mut self, player_id: Uuid, name: String) -> Result<PlayerId, SessionError> {
        let seat = self.game.add_player(name.clone())?;
        self.players.insert(
            player_id,
            SessionPlayer {
                id: player_id,
                name,
                connected: true,
                seat,
            },
        );
        Ok(seat)
    }

    pub fn add_bot(
        &mut self,
        requester: Uuid,
        difficulty: BotDifficulty,
    ) -> Result<PlayerId, SessionError> {
        if requester != self.host_id {
            return Err(SessionError::NotHost);
        }
        let name = format!("Bot {}", self.bots.len() + 1);
        let seat = self.game.add_bot_player(name, difficulty)?;
        self.bots.push(Bot::new(seat, difficulty));
        Ok(seat)
    }

    pub fn start(&mut self, requester: Uuid) -> Result<(), SessionError> {
        if requester != self.host_id {
            return Err(SessionError::NotHost);
        }
        self.game.start_game()?;
        Ok(())
    }

    /// Apply an action on behalf of a connected human.
    pub fn apply(&mut self, player_id: Uuid, action: GameAction) -> Result<(), SessionError> {
        let seat = self.seat_of(player_id)?;
        self.game.apply_action(seat, action)?;
        Ok(())
    }

    pub fn seat_of(&self, player_id: Uuid) -> Result<PlayerId, SessionError> {
        self.players
            .get(&player_id)
            .map(|p| p.seat)
            .ok_or(SessionError::PlayerNotInGame)
    }

    /// Whether the current seat belongs to a bot on a live game.
    pub fn bot_to_move(&self) -> bool {
        self.game.is_live()
            && self
                .game
                .get_player(self.game.current_player)
                .is_some_and(|p| p.is_bot)
    }

    /// Run one complete bot turn: choose a single action, apply it, and make
    /// sure the turn advances. Dead ends (no play, empty deck) degrade to a
    /// forced pass instead of crashing the scheduler.
    pub fn run_bot_turn(&mut self) {
        let seat = self.game.current_player;
        let Some(bot) = self.bots.iter_mut().find(|b| b.player_id == seat) else {
            warn!(game = %self.id, seat, "current seat has no bot strategist");
            return;
        };

        let action = bot.choose_action(&self.game);
        let ends_turn = matches!(action, GameAction::DrawTile);

        match self.game.apply_action(seat, action) {
            Ok(()) => {
                if !ends_turn && self.game.winner.is_none() {
                    if let Err(e) = self.game.end_turn(seat) {
                        warn!(game = %self.id, seat, error = %e, "bot could not commit turn, undoing");
                        let _ = self.game.request_undo(seat);
                        let _ = self.game.end_turn(seat);
                    }
                }
            }
            Err(GameError::DeckEmpty) => {
                // Nothing to play and nothing to draw: forced pass.
                warn!(game = %self.id, seat, "bot is stuck with an empty deck, passing");
                let _ = self.game.end_turn(seat);
            }
            Err(e) => {
                warn!(game = %self.id, seat, error = %e, "bot action rejected, passing");
                let _ = self.game.request_undo(seat);
                let _ = self.game.end_turn(seat);
            }
        }
    }

    /// Per-viewer projections for every connected human.
    pub fn views(&self) -> Vec<(Uuid, GameView)> {
        self.players
            .values()
            .filter(|p| p.connected)
            .map(|p| (p.id, self.game.view_for(p.seat)))
            .collect()
    }

    pub fn set_connected(&mut self, player_id: Uuid, connected: bool) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.connected = connected;
        }
    }

    pub fn has_connected_humans(&self) -> bool {
        self.players.values().any(|p| p.connected)
    }

    pub fn winner_name(&self) -> Option<String> {
        let winner = self.game.winner?;
        self.game.get_player(winner).map(|p| p.name.clone())
    }

    pub fn to_info(&self) -> GameInfo {
        GameInfo {
            id: self.id,
            name: self.name.clone(),
            player_names: self.game.players.iter().map(|p| p.name.clone()).collect(),
            started: self.game.started,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> GameSession {
        GameSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Host".to_string(),
            GameOptions::default(),
        )
    }

    #[test]
    fn test_create_session_seats_host() {
        let s = session();
        assert_eq!(s.game.player_count(), 1);
        assert_eq!(s.seat_of(s.host_id).unwrap(), 0);
        assert!(!s.game.started);
    }

    #[test]
    fn test_join_and_capacity() {
        let mut s = session();
        for i in 0..3 {
            s.join(Uuid::new_v4(), format!("P{}", i)).unwrap();
        }
        let result = s.join(Uuid::new_v4(), "Overflow".to_string());
        assert!(matches!(
            result,
            Err(SessionError::Game(GameError::GameFull))
        ));
    }

    #[test]
    fn test_only_host_starts_and_adds_bots() {
        let mut s = session();
        let guest = Uuid::new_v4();
        s.join(guest, "Guest".to_string()).unwrap();

        assert!(matches!(
            s.add_bot(guest, BotDifficulty::Easy),
            Err(SessionError::NotHost)
        ));
        assert!(matches!(s.start(guest), Err(SessionError::NotHost)));

        let host = s.host_id;
        s.add_bot(host, BotDifficulty::Easy).unwrap();
        s.start(host).unwrap();
        assert!(s.game.started);
    }

    #[test]
    fn test_start_requires_two_seats() {
        let mut s = session();
        let host = s.host_id;
        assert!(matches!(
            s.start(host),
            Err(SessionError::Game(GameError::InsufficientPlayers))
        ));
    }

    #[test]
    fn test_bot_turn_always_advances() {
        let mut s = session();
        let host = s.host_id;
        s.add_bot(host, BotDifficulty::Hard).unwrap();
        s.start(host).unwrap();

        if s.bot_to_move() {
            let seat = s.game.current_player;
            s.run_bot_turn();
            assert_ne!(s.game.current_player, seat);
        }
    }

    #[test]
    fn test_views_cover_connected_humans_only() {
        let mut s = session();
        let guest = Uuid::new_v4();
        s.join(guest, "Guest".to_string()).unwrap();
        let host = s.host_id;
        s.add_bot(host, BotDifficulty::Easy).unwrap();

        assert_eq!(s.views().len(), 2);
        s.set_connected(guest, false);
        assert_eq!(s.views().len(), 1);
        assert!(s.has_connected_humans());
    }
}
