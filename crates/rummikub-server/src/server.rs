//! WebSocket server, connection handling and deferred-task scheduling.

use crate::protocol::{ClientMessage, GameInfo, ServerMessage};
use crate::session::GameSession;
use crate::timers::TaskRegistry;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use rummikub_core::{GameOptions, MAX_PLAYERS};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Deadline for a single turn when the game was created with a timer.
const TURN_TIMEOUT: Duration = Duration::from_secs(60);

/// Pause before a scheduled bot move fires.
const BOT_MOVE_DELAY: Duration = Duration::from_millis(700);

/// Server state shared across all connections.
pub struct ServerState {
    /// All game sessions, keyed by game id. Mutation goes through
    /// `get_mut`, which serializes actors on the same game while leaving
    /// distinct games fully parallel.
    pub sessions: DashMap<Uuid, GameSession>,
    /// Mapping from connection id to the game it joined
    pub player_games: DashMap<Uuid, Uuid>,
    /// Mapping from connection id to its outgoing message channel
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    /// Cancellable turn timers and bot tasks, one of each per game at most
    pub tasks: TaskRegistry,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            player_games: DashMap::new(),
            player_senders: DashMap::new(),
            tasks: TaskRegistry::new(),
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    /// Games that can still be joined.
    pub fn joinable_games(&self) -> Vec<GameInfo> {
        self.sessions
            .iter()
            .filter(|s| !s.game.started && s.game.player_count() < MAX_PLAYERS)
            .map(|s| s.to_info())
            .collect()
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Rummikub server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let player_id = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = ServerMessage::Welcome { player_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text.into())).await?;

    // Forward outgoing messages from the channel to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_message(player_id, client_msg, &state);
                } else {
                    warn!("Invalid message from {}: {}", player_id, text);
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_player(player_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(player_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateGame {
            player_name,
            timer_enabled,
            debug_mode,
        } => {
            let game_id = Uuid::new_v4();
            let options = GameOptions {
                timer_enabled,
                debug_mode,
            };
            let session = GameSession::new(game_id, player_id, player_name, options);
            let view = session.game.view_for(0);

            state.sessions.insert(game_id, session);
            state.player_games.insert(player_id, game_id);

            state.send_to_player(player_id, ServerMessage::GameCreated { game_id });
            state.send_to_player(player_id, ServerMessage::Joined { game_id, view });
        }

        ClientMessage::JoinGame {
            game_id,
            player_name,
        } => {
            let joined = match state.sessions.get_mut(&game_id) {
                Some(mut session) => session.join(player_id, player_name).map(|seat| {
                    let view = session.game.view_for(seat);
                    state.player_games.insert(player_id, game_id);
                    view
                }),
                None => {
                    state.send_to_player(
                        player_id,
                        ServerMessage::Error {
                            message: "Game not found".to_string(),
                        },
                    );
                    return;
                }
            };

            match joined {
                Ok(view) => {
                    state.send_to_player(player_id, ServerMessage::Joined { game_id, view });
                    broadcast_views(state, game_id);
                }
                Err(e) => {
                    state.send_to_player(
                        player_id,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        ClientMessage::AddBot { difficulty } => {
            if let Some(&game_id) = state.player_games.get(&player_id).as_deref() {
                let result = state
                    .sessions
                    .get_mut(&game_id)
                    .map(|mut s| s.add_bot(player_id, difficulty));
                match result {
                    Some(Ok(_)) => broadcast_views(state, game_id),
                    Some(Err(e)) => state.send_to_player(
                        player_id,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    ),
                    None => {}
                }
            }
        }

        ClientMessage::StartGame => {
            if let Some(&game_id) = state.player_games.get(&player_id).as_deref() {
                let result = state
                    .sessions
                    .get_mut(&game_id)
                    .map(|mut s| s.start(player_id));
                match result {
                    Some(Ok(())) => after_state_change(state, game_id, true),
                    Some(Err(e)) => state.send_to_player(
                        player_id,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    ),
                    None => {}
                }
            }
        }

        ClientMessage::Action { action } => {
            if let Some(&game_id) = state.player_games.get(&player_id).as_deref() {
                let outcome = state.sessions.get_mut(&game_id).map(|mut session| {
                    let turn_before = session.game.turn_number;
                    let result = session.apply(player_id, action);
                    let turn_advanced = session.game.turn_number != turn_before;
                    (result, turn_advanced)
                });

                match outcome {
                    Some((Ok(()), turn_advanced)) => {
                        state.send_to_player(
                            player_id,
                            ServerMessage::ActionResult {
                                success: true,
                                error: None,
                            },
                        );
                        after_state_change(state, game_id, turn_advanced);
                    }
                    Some((Err(e), _)) => {
                        state.send_to_player(
                            player_id,
                            ServerMessage::ActionResult {
                                success: false,
                                error: Some(e.to_string()),
                            },
                        );
                    }
                    None => {}
                }
            }
        }

        ClientMessage::ValidateBoard { is_end_turn } => {
            if let Some(&game_id) = state.player_games.get(&player_id).as_deref() {
                if let Some(session) = state.sessions.get(&game_id) {
                    let result = session.game.validate_board(is_end_turn);
                    state.send_to_player(
                        player_id,
                        ServerMessage::ValidationResult {
                            valid: result.is_ok(),
                            invalid_set_index: result.err(),
                        },
                    );
                }
            }
        }

        ClientMessage::ListGames => {
            let games = state.joinable_games();
            state.send_to_player(player_id, ServerMessage::GameList { games });
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
}

/// Send each connected human their own projection of the game.
fn broadcast_views(state: &Arc<ServerState>, game_id: Uuid) {
    let views = match state.sessions.get(&game_id) {
        Some(session) => session.views(),
        None => return,
    };
    for (player_id, view) in views {
        state.send_to_player(player_id, ServerMessage::GameUpdate { view });
    }
}

/// Broadcast the new state and reschedule deferred work after any successful
/// mutation. The turn timer is only re-armed when the turn actually changed,
/// so mid-turn rearrangement does not extend the deadline.
fn after_state_change(state: &Arc<ServerState>, game_id: Uuid, turn_advanced: bool) {
    let (views, winner, live, timer_enabled, bot_next) = match state.sessions.get(&game_id) {
        Some(session) => (
            session.views(),
            session.winner_name(),
            session.game.is_live(),
            session.game.options.timer_enabled,
            session.bot_to_move(),
        ),
        None => {
            state.tasks.cancel_all(game_id);
            return;
        }
    };

    let recipients: Vec<Uuid> = views.iter().map(|(id, _)| *id).collect();
    for (player_id, view) in views {
        state.send_to_player(player_id, ServerMessage::GameUpdate { view });
    }
    if let Some(winner_name) = winner {
        for player_id in &recipients {
            state.send_to_player(
                *player_id,
                ServerMessage::GameOver {
                    winner_name: winner_name.clone(),
                },
            );
        }
    }

    if !live {
        state.tasks.cancel_all(game_id);
        return;
    }

    if bot_next {
        let task_state = Arc::clone(state);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(BOT_MOVE_DELAY).await;
            on_bot_turn(&task_state, game_id);
        });
        state.tasks.arm_bot_task(game_id, handle);
    } else {
        state.tasks.cancel_bot_task(game_id);
    }

    if timer_enabled && turn_advanced {
        let task_state = Arc::clone(state);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(TURN_TIMEOUT).await;
            on_turn_timeout(&task_state, game_id);
        });
        state.tasks.arm_turn_timer(game_id, handle);
    }
}

/// A scheduled bot move fired. Liveness is re-checked under the session
/// lock: the game may have finished or been abandoned since scheduling.
fn on_bot_turn(state: &Arc<ServerState>, game_id: Uuid) {
    {
        let Some(mut session) = state.sessions.get_mut(&game_id) else {
            return;
        };
        if !session.bot_to_move() {
            return;
        }
        session.run_bot_turn();
    }
    after_state_change(state, game_id, true);
}

/// The turn timer fired. Same liveness re-check as the bot path.
fn on_turn_timeout(state: &Arc<ServerState>, game_id: Uuid) {
    {
        let Some(mut session) = state.sessions.get_mut(&game_id) else {
            return;
        };
        if !session.game.is_live() {
            return;
        }
        info!(game = %game_id, "turn timer expired");
        session.game.handle_timeout();
    }
    after_state_change(state, game_id, true);
}

/// Handle player disconnect: mark them disconnected; a game with no humans
/// left is abandoned and its deferred tasks cancelled.
fn handle_disconnect(player_id: Uuid, state: &Arc<ServerState>) {
    if let Some((_, game_id)) = state.player_games.remove(&player_id) {
        let abandoned = {
            match state.sessions.get_mut(&game_id) {
                Some(mut session) => {
                    session.set_connected(player_id, false);
                    !session.has_connected_humans()
                }
                None => false,
            }
        };

        if abandoned {
            info!(game = %game_id, "last human disconnected, removing game");
            state.sessions.remove(&game_id);
            state.tasks.cancel_all(game_id);
        } else {
            broadcast_views(state, game_id);
        }
    }
}
