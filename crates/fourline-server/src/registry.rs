//! In-memory session registry.
//!
//! Pure bookkeeping with no game rules: the authoritative index of active
//! games, the username-to-game and username-to-connection mappings, and the
//! single matchmaking waiting slot. All map access is keyed and atomic;
//! per-game mutation goes through `games.get_mut`, whose shard lock
//! serializes concurrent moves against the same game.

use crate::protocol::{GameStateView, ServerMessage};
use dashmap::DashMap;
use fourline_core::{Game, Player};
use std::sync::Mutex;
use std::time::{Instant, SystemTime};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Display name of the synthetic opponent.
pub const BOT_NAME: &str = "Bot";

/// A live connection: outbox sender plus the generation that identifies it.
/// The most recent bind for a username wins; teardown only removes the
/// entry when the generation still matches.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub generation: Uuid,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

/// The single occupant of the matchmaking queue.
#[derive(Debug, Clone)]
pub struct WaitingPlayer {
    pub username: String,
    pub queued_at: Instant,
}

/// Result of [`Registry::claim_or_wait`].
pub enum SlotClaim {
    /// A different identity was waiting and has been taken from the slot.
    PairedWith(WaitingPlayer),
    /// The joiner is already the waiting identity (duplicate join).
    AlreadyWaiting,
    /// The slot was empty; the joiner now occupies it.
    Queued,
}

/// An active game plus its participants. The session observes connections
/// through the registry; it never owns them.
pub struct GameSession {
    pub id: Uuid,
    pub player1: String,
    pub player2: String,
    pub is_bot_game: bool,
    pub game: Game,
    pub created_at: SystemTime,
}

impl GameSession {
    pub fn new(player1: String, player2: String, is_bot_game: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            player1,
            player2,
            is_bot_game,
            game: Game::new(),
            created_at: SystemTime::now(),
        }
    }

    /// Which seat a username occupies, if any.
    pub fn player_number(&self, username: &str) -> Option<Player> {
        if self.player1 == username {
            Some(Player::One)
        } else if self.player2 == username {
            Some(Player::Two)
        } else {
            None
        }
    }

    /// Display name occupying a seat.
    pub fn player_name(&self, player: Player) -> &str {
        match player {
            Player::One => &self.player1,
            Player::Two => &self.player2,
        }
    }

    /// The other participant's name.
    pub fn opponent_of(&self, username: &str) -> Option<&str> {
        match self.player_number(username)? {
            Player::One => Some(&self.player2),
            Player::Two => Some(&self.player1),
        }
    }

    pub fn state_view(&self) -> GameStateView {
        GameStateView::new(
            self.id,
            &self.game,
            &self.player1,
            &self.player2,
            self.is_bot_game,
        )
    }
}

/// Shared maps behind the session engine.
pub struct Registry {
    /// All active games by id.
    pub games: DashMap<Uuid, GameSession>,
    /// Username to their one active game.
    player_games: DashMap<String, Uuid>,
    /// Username to live connection; most recent bind wins.
    connections: DashMap<String, ClientHandle>,
    /// The matchmaking waiting slot. Checked and cleared under one lock so
    /// the promotion timer and an arriving human cannot both consume it.
    waiting: Mutex<Option<WaitingPlayer>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            games: DashMap::new(),
            player_games: DashMap::new(),
            connections: DashMap::new(),
            waiting: Mutex::new(None),
        }
    }

    /// Index a new game under its id and both participant names.
    pub fn register_game(&self, session: GameSession) -> Uuid {
        let id = session.id;
        self.player_games.insert(session.player1.clone(), id);
        self.player_games.insert(session.player2.clone(), id);
        self.games.insert(id, session);
        id
    }

    /// Drop a game and its participant mappings.
    pub fn remove_game(&self, id: Uuid) {
        if let Some((_, session)) = self.games.remove(&id) {
            self.player_games
                .remove_if(&session.player1, |_, gid| *gid == id);
            self.player_games
                .remove_if(&session.player2, |_, gid| *gid == id);
        }
    }

    /// Id of the username's active game.
    pub fn game_by_player(&self, username: &str) -> Option<Uuid> {
        self.player_games.get(username).map(|entry| *entry)
    }

    /// Bind (or replace) the live connection for a username.
    pub fn bind_connection(&self, username: &str, handle: ClientHandle) {
        self.connections.insert(username.to_string(), handle);
    }

    /// Remove the connection only if `generation` is still the bound one.
    /// Returns whether this call removed it (i.e. no newer bind exists).
    pub fn unbind_connection(&self, username: &str, generation: Uuid) -> bool {
        self.connections
            .remove_if(username, |_, handle| handle.generation == generation)
            .is_some()
    }

    /// Deliver a message to a username's live connection, if any. Dead
    /// channels are ignored; the teardown path cleans them up.
    pub fn send_to(&self, username: &str, msg: ServerMessage) {
        if let Some(handle) = self.connections.get(username) {
            let _ = handle.tx.send(msg);
        }
    }

    /// Resolve a join against the waiting slot in one atomic step: pair
    /// with a different waiting identity, recognize a duplicate join, or
    /// occupy the empty slot.
    pub fn claim_or_wait(&self, username: &str) -> SlotClaim {
        let mut slot = self.waiting.lock().expect("waiting slot poisoned");
        match slot.take() {
            Some(waiting) if waiting.username == username => {
                *slot = Some(waiting);
                SlotClaim::AlreadyWaiting
            }
            Some(waiting) => SlotClaim::PairedWith(waiting),
            None => {
                *slot = Some(WaitingPlayer {
                    username: username.to_string(),
                    queued_at: Instant::now(),
                });
                SlotClaim::Queued
            }
        }
    }

    /// Take the waiting player only if the slot holds exactly `username`.
    /// This is the promotion timer's race guard: a human may have claimed
    /// the slot between the timer firing and this call.
    pub fn take_waiting_if(&self, username: &str) -> Option<WaitingPlayer> {
        let mut slot = self.waiting.lock().expect("waiting slot poisoned");
        match slot.as_ref() {
            Some(waiting) if waiting.username == username => slot.take(),
            _ => None,
        }
    }

    /// Whether the slot currently holds `username`.
    pub fn is_waiting(&self, username: &str) -> bool {
        let slot = self.waiting.lock().expect("waiting slot poisoned");
        matches!(slot.as_ref(), Some(waiting) if waiting.username == username)
    }
}
