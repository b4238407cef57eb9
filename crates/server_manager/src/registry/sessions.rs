use super::{reasons, Registry, MAX_PLAYERS_PER_SESSION, MIN_PLAYERS_PER_SESSION};
use crate::error::SessionError;
use crate::events::ServerEvent;
use crate::types::{GameSession, PlayerId, SessionId};
use std::time::{Duration, Instant};
use tracing::info;

impl Registry {
    /// Creates a session unless `session_cap` active sessions already exist.
    ///
    /// `max_players` is clamped to the supported range.
    pub fn create_session(
        &self,
        name: &str,
        map_name: &str,
        game_mode: &str,
        max_players: usize,
        ranked: bool,
        session_cap: usize,
    ) -> Result<SessionId, SessionError> {
        let max_players = max_players.clamp(MIN_PLAYERS_PER_SESSION, MAX_PLAYERS_PER_SESSION);

        let session_id = {
            let mut sessions = self.sessions.lock();
            let active = sessions.values().filter(|s| s.is_active).count();
            if active >= session_cap {
                return Err(SessionError::SessionLimitReached(session_cap));
            }

            let session = GameSession::new(
                name.to_string(),
                map_name.to_string(),
                game_mode.to_string(),
                max_players,
                ranked,
            );
            let session_id = session.session_id;
            sessions.insert(session_id, session);
            session_id
        };

        info!(
            "🎮 Session '{}' created on {} ({}, up to {} players)",
            name, map_name, session_id, max_players
        );
        self.events.publish(ServerEvent::SessionCreated {
            session_id,
            name: name.to_string(),
        });
        Ok(session_id)
    }

    /// Adds `player_id` to the session's roster.
    ///
    /// A registered player already seated in another session is refused; the
    /// player's session pointer is updated when the player is registered.
    pub fn join_session(&self, session_id: SessionId, player_id: &PlayerId) -> Result<(), SessionError> {
        let current = self
            .players
            .lock()
            .get(player_id)
            .and_then(|p| p.session_id);
        if let Some(other) = current.filter(|s| *s != session_id) {
            return Err(SessionError::AlreadyInSession(player_id.clone(), other));
        }

        {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .get_mut(&session_id)
                .ok_or(SessionError::SessionNotFound(session_id))?;
            if !session.is_active {
                return Err(SessionError::SessionInactive(session_id));
            }
            if session.has_player(player_id) {
                return Err(SessionError::AlreadyInSession(player_id.clone(), session_id));
            }
            if session.is_full() {
                return Err(SessionError::SessionFull(session_id));
            }
            session.player_ids.push(player_id.clone());
            session.current_players = session.player_ids.len();
        }

        if let Some(player) = self.players.lock().get_mut(player_id) {
            player.session_id = Some(session_id);
        }

        info!("Player {} joined session {}", player_id, session_id);
        Ok(())
    }

    /// Removes `player_id` from the roster. An emptied active session is ended.
    pub fn leave_session(&self, session_id: SessionId, player_id: &PlayerId) -> Result<(), SessionError> {
        let now_empty = {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .get_mut(&session_id)
                .ok_or(SessionError::SessionNotFound(session_id))?;
            let index = session
                .player_ids
                .iter()
                .position(|p| p == player_id)
                .ok_or_else(|| SessionError::NotAMember(player_id.clone(), session_id))?;
            session.player_ids.remove(index);
            session.current_players = session.player_ids.len();
            session.is_active && session.player_ids.is_empty()
        };

        if let Some(player) = self.players.lock().get_mut(player_id) {
            if player.session_id == Some(session_id) {
                player.session_id = None;
            }
        }

        info!("Player {} left session {}", player_id, session_id);

        if now_empty {
            let _ = self.end_session(session_id);
        }
        Ok(())
    }

    /// Ends the session, disconnecting every member, and removes it.
    ///
    /// Returns the final session duration.
    pub fn end_session(&self, session_id: SessionId) -> Result<Duration, SessionError> {
        self.end_session_at(session_id, Instant::now())
    }

    pub(crate) fn end_session_at(
        &self,
        session_id: SessionId,
        now: Instant,
    ) -> Result<Duration, SessionError> {
        // Marking the session inactive first keeps the member disconnects
        // below from ending it a second time through `leave_session`.
        let (members, duration) = {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .get_mut(&session_id)
                .ok_or(SessionError::SessionNotFound(session_id))?;
            session.is_active = false;
            session.duration = session.elapsed(now);
            (session.player_ids.clone(), session.duration)
        };

        for player_id in &members {
            let _ = self.disconnect_player(player_id, reasons::SESSION_ENDED);
        }

        let removed = self.sessions.lock().remove(&session_id);
        if removed.is_none() {
            // Ended concurrently by another caller
            return Err(SessionError::SessionNotFound(session_id));
        }

        info!(
            "🏁 Session {} ended after {:.1}s",
            session_id,
            duration.as_secs_f32()
        );
        self.events.publish(ServerEvent::SessionEnded {
            session_id,
            duration,
        });
        Ok(duration)
    }
}
