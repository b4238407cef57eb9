//! Session and player registry.
//!
//! Sessions and players live behind two independent locks. Operations that
//! cascade (ending a session disconnects its members, disconnecting a player
//! leaves its session) release one lock before taking the other, so no call
//! chain ever re-enters a lock it already holds.
//!
//! Split across files by concern:
//! - `sessions` - create, join, leave, end
//! - `players` - register, disconnect, network stats
//! - this module - queries and the periodic maintenance passes

mod players;
mod sessions;

use crate::events::EventBus;
use crate::monitoring::aggregate_network_quality;
use crate::types::{GameSession, PlayerConnection, PlayerId, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Inclusive bounds applied to a session's requested player cap.
pub const MIN_PLAYERS_PER_SESSION: usize = 1;
pub const MAX_PLAYERS_PER_SESSION: usize = 8;

/// Disconnect reasons published with [`crate::events::ServerEvent::PlayerDisconnected`].
pub mod reasons {
    pub const SESSION_ENDED: &str = "Session ended";
    pub const TIMED_OUT: &str = "Connection timed out";
    pub const SERVER_SHUTDOWN: &str = "Server shutting down";
    pub const UNREGISTERED: &str = "Unregistered";
}

/// Aggregated connection quality across all registered players.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkQuality {
    pub connected_players: usize,
    pub average_latency_ms: f32,
    pub packet_loss_percent: f32,
}

#[derive(Debug)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, GameSession>>,
    players: Mutex<HashMap<PlayerId, PlayerConnection>>,
    events: EventBus,
}

impl Registry {
    pub fn new(events: EventBus) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            players: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Snapshot of every session that is still active.
    pub fn active_sessions(&self) -> Vec<GameSession> {
        self.sessions
            .lock()
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect()
    }

    pub fn session_info(&self, session_id: SessionId) -> Option<GameSession> {
        self.sessions.lock().get(&session_id).cloned()
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.lock().values().filter(|s| s.is_active).count()
    }

    pub fn connected_players(&self) -> Vec<PlayerConnection> {
        self.players.lock().values().cloned().collect()
    }

    pub fn player_info(&self, player_id: &PlayerId) -> Option<PlayerConnection> {
        self.players.lock().get(player_id).cloned()
    }

    pub fn connected_player_count(&self) -> usize {
        self.players.lock().len()
    }

    pub fn network_quality(&self) -> NetworkQuality {
        let players = self.players.lock();
        aggregate_network_quality(players.values())
    }

    /// Recomputes derived session fields from the member lists.
    ///
    /// Returns how many sessions had a drifted player count.
    pub fn reconcile(&self, now: Instant) -> usize {
        let mut corrected = 0;
        let mut sessions = self.sessions.lock();
        for session in sessions.values_mut() {
            if session.current_players != session.player_ids.len() {
                debug!(
                    "Session {} player count drifted ({} recorded, {} members)",
                    session.session_id,
                    session.current_players,
                    session.player_ids.len()
                );
                session.current_players = session.player_ids.len();
                corrected += 1;
            }
            if session.is_active {
                session.duration = session.elapsed(now);
            }
        }
        corrected
    }

    /// Ends sessions that ran past `max_duration` or are already inactive.
    pub fn cleanup_sessions(&self, now: Instant, max_duration: Duration) -> Vec<SessionId> {
        let expired: Vec<SessionId> = self
            .sessions
            .lock()
            .values()
            .filter(|s| !s.is_active || s.elapsed(now) > max_duration)
            .map(|s| s.session_id)
            .collect();

        for session_id in &expired {
            let _ = self.end_session_at(*session_id, now);
        }
        if !expired.is_empty() {
            info!("🧹 Cleaned up {} expired session(s)", expired.len());
        }
        expired
    }

    /// Disconnects players whose connection duration exceeds `timeout`.
    pub fn evict_timed_out_players(&self, now: Instant, timeout: Duration) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> = {
            let mut players = self.players.lock();
            players
                .values_mut()
                .filter_map(|player| {
                    player.connection_duration = player.elapsed(now);
                    (player.connection_duration > timeout).then(|| player.player_id.clone())
                })
                .collect()
        };

        for player_id in &timed_out {
            let _ = self.disconnect_player(player_id, reasons::TIMED_OUT);
        }
        if !timed_out.is_empty() {
            info!("⏱️ Evicted {} timed-out player(s)", timed_out.len());
        }
        timed_out
    }

    /// Ends every session and disconnects every remaining player.
    pub fn clear(&self, reason: &str) {
        let now = Instant::now();
        let session_ids: Vec<SessionId> = self.sessions.lock().keys().copied().collect();
        for session_id in session_ids {
            let _ = self.end_session_at(session_id, now);
        }

        let player_ids: Vec<PlayerId> = self.players.lock().keys().cloned().collect();
        for player_id in player_ids {
            let _ = self.disconnect_player(&player_id, reason);
        }
    }

    /// Releases spare map capacity.
    pub fn shrink(&self) {
        self.sessions.lock().shrink_to_fit();
        self.players.lock().shrink_to_fit();
    }

    #[cfg(test)]
    pub(crate) fn corrupt_player_count(&self, session_id: SessionId, count: usize) {
        if let Some(session) = self.sessions.lock().get_mut(&session_id) {
            session.current_players = count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::events::ServerEvent;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn registry() -> Registry {
        Registry::new(EventBus::new())
    }

    fn create(registry: &Registry, max_players: usize) -> SessionId {
        registry
            .create_session("Dungeon A", "MapX", "Coop", max_players, false, 10)
            .unwrap()
    }

    #[test]
    fn test_create_join_leave_tears_down_session() {
        let registry = registry();
        let session_id = create(&registry, 4);
        let p1 = PlayerId::from("p1");

        registry.join_session(session_id, &p1).unwrap();
        assert_eq!(registry.session_info(session_id).unwrap().current_players, 1);

        registry.leave_session(session_id, &p1).unwrap();
        assert!(registry.session_info(session_id).is_none());
        assert!(registry.active_sessions().is_empty());
    }

    #[test]
    fn test_max_players_is_clamped() {
        let registry = registry();
        let big = create(&registry, 50);
        let zero = create(&registry, 0);

        assert_eq!(registry.session_info(big).unwrap().max_players, 8);
        assert_eq!(registry.session_info(zero).unwrap().max_players, 1);
    }

    #[test]
    fn test_session_cap_does_not_mutate() {
        let registry = registry();
        registry.create_session("a", "m", "Coop", 4, false, 1).unwrap();

        let result = registry.create_session("b", "m", "Coop", 4, false, 1);
        assert_eq!(result, Err(SessionError::SessionLimitReached(1)));
        assert_eq!(registry.active_session_count(), 1);
    }

    #[test]
    fn test_join_rejections() {
        let registry = registry();
        let session_id = create(&registry, 1);
        let p1 = PlayerId::from("p1");

        registry.join_session(session_id, &p1).unwrap();
        assert_eq!(
            registry.join_session(session_id, &p1),
            Err(SessionError::AlreadyInSession(p1.clone(), session_id))
        );
        assert_eq!(
            registry.join_session(session_id, &PlayerId::from("p2")),
            Err(SessionError::SessionFull(session_id))
        );

        let missing = SessionId::new();
        assert_eq!(
            registry.join_session(missing, &p1),
            Err(SessionError::SessionNotFound(missing))
        );
    }

    #[test]
    fn test_join_updates_player_session_pointer() {
        let registry = registry();
        let p1 = PlayerId::from("p1");
        registry.register_player(&p1, "One", addr(), true, 10).unwrap();

        let first = create(&registry, 4);
        let second = create(&registry, 4);
        registry.join_session(first, &p1).unwrap();
        assert_eq!(registry.player_info(&p1).unwrap().session_id, Some(first));

        assert_eq!(
            registry.join_session(second, &p1),
            Err(SessionError::AlreadyInSession(p1.clone(), first))
        );
    }

    #[test]
    fn test_registration_is_idempotent() {
        let registry = registry();
        let p1 = PlayerId::from("p1");

        assert!(registry.register_player(&p1, "First", addr(), false, 10).unwrap());
        assert!(!registry.register_player(&p1, "Renamed", addr(), true, 10).unwrap());

        assert_eq!(registry.connected_player_count(), 1);
        let info = registry.player_info(&p1).unwrap();
        assert_eq!(info.player_name, "Renamed");
        assert!(info.is_authenticated);
    }

    #[test]
    fn test_connection_cap() {
        let registry = registry();
        registry.register_player(&PlayerId::from("p1"), "", addr(), true, 1).unwrap();

        assert_eq!(
            registry.register_player(&PlayerId::from("p2"), "", addr(), true, 1),
            Err(SessionError::ConnectionLimitReached(1))
        );
        // Re-registering an existing player is still allowed at the cap
        assert!(registry.register_player(&PlayerId::from("p1"), "", addr(), true, 1).is_ok());
    }

    #[test]
    fn test_end_session_disconnects_members() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let registry = Registry::new(events);
        let session_id = create(&registry, 4);

        for id in ["p1", "p2"] {
            let player = PlayerId::from(id);
            registry.register_player(&player, id, addr(), true, 10).unwrap();
            registry.join_session(session_id, &player).unwrap();
        }

        registry.end_session(session_id).unwrap();

        assert!(registry.session_info(session_id).is_none());
        assert_eq!(registry.connected_player_count(), 0);

        let mut disconnected = 0;
        let mut ended = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                ServerEvent::PlayerDisconnected { .. } => disconnected += 1,
                ServerEvent::SessionEnded { session_id: id, .. } => {
                    assert_eq!(id, session_id);
                    ended += 1;
                }
                _ => {}
            }
        }
        assert_eq!(disconnected, 2);
        assert_eq!(ended, 1);
    }

    #[test]
    fn test_disconnect_leaves_session_first() {
        let registry = registry();
        let session_id = create(&registry, 4);
        let p1 = PlayerId::from("p1");
        let p2 = PlayerId::from("p2");
        for player in [&p1, &p2] {
            registry.register_player(player, "", addr(), true, 10).unwrap();
            registry.join_session(session_id, player).unwrap();
        }

        registry.disconnect_player(&p1, "Quit").unwrap();

        let session = registry.session_info(session_id).unwrap();
        assert_eq!(session.player_ids, vec![p2]);
        assert_eq!(session.current_players, 1);
        assert!(registry.player_info(&p1).is_none());
        assert_eq!(
            registry.disconnect_player(&p1, "Quit"),
            Err(SessionError::PlayerNotFound(p1))
        );
    }

    #[test]
    fn test_integrity_pass_repairs_counts() {
        let registry = registry();
        let session_id = create(&registry, 4);
        registry.join_session(session_id, &PlayerId::from("p1")).unwrap();
        registry.corrupt_player_count(session_id, 3);

        assert_eq!(registry.reconcile(Instant::now()), 1);
        let session = registry.session_info(session_id).unwrap();
        assert_eq!(session.current_players, session.player_ids.len());
        assert_eq!(registry.reconcile(Instant::now()), 0);
    }

    #[test]
    fn test_timeout_sweep() {
        let registry = registry();
        let p1 = PlayerId::from("p1");
        registry.register_player(&p1, "", addr(), true, 10).unwrap();

        let now = Instant::now();
        assert!(registry.evict_timed_out_players(now, Duration::from_secs(1)).is_empty());

        let later = now + Duration::from_secs(2);
        assert_eq!(registry.evict_timed_out_players(later, Duration::from_secs(1)), vec![p1]);
        assert!(registry.connected_players().is_empty());
    }

    #[test]
    fn test_cleanup_ends_overlong_sessions() {
        let registry = registry();
        let session_id = create(&registry, 4);
        let later = Instant::now() + Duration::from_secs(120);

        assert!(registry.cleanup_sessions(Instant::now(), Duration::from_secs(60)).is_empty());
        assert_eq!(
            registry.cleanup_sessions(later, Duration::from_secs(60)),
            vec![session_id]
        );
        assert!(registry.active_sessions().is_empty());
    }

    #[test]
    fn test_network_quality() {
        let registry = registry();
        for (id, ping, loss) in [("p1", 40.0, 0.1), ("p2", 60.0, 0.0)] {
            let player = PlayerId::from(id);
            registry.register_player(&player, "", addr(), true, 10).unwrap();
            registry
                .update_player_network_stats(&player, ping, loss, loss)
                .unwrap();
        }

        let quality = registry.network_quality();
        assert_eq!(quality.connected_players, 2);
        assert!((quality.average_latency_ms - 50.0).abs() < f32::EPSILON);
        assert!((quality.packet_loss_percent - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_clear_empties_everything() {
        let registry = registry();
        let session_id = create(&registry, 4);
        let p1 = PlayerId::from("p1");
        registry.register_player(&p1, "", addr(), true, 10).unwrap();
        registry.register_player(&PlayerId::from("lobby"), "", addr(), true, 10).unwrap();
        registry.join_session(session_id, &p1).unwrap();

        registry.clear(reasons::SERVER_SHUTDOWN);

        assert!(registry.active_sessions().is_empty());
        assert_eq!(registry.connected_player_count(), 0);
    }
}
