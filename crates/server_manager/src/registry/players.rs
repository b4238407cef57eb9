use super::{reasons, Registry};
use crate::error::SessionError;
use crate::events::ServerEvent;
use crate::types::{PlayerConnection, PlayerId};
use std::net::SocketAddr;
use tracing::{debug, info};

impl Registry {
    /// Registers a player or refreshes an existing record.
    ///
    /// Returns `true` when a new record was created. New players are refused
    /// once `connection_cap` players are registered.
    pub fn register_player(
        &self,
        player_id: &PlayerId,
        player_name: &str,
        address: SocketAddr,
        authenticated: bool,
        connection_cap: usize,
    ) -> Result<bool, SessionError> {
        {
            let mut players = self.players.lock();
            if let Some(existing) = players.get_mut(player_id) {
                existing.player_name = player_name.to_string();
                existing.address = address;
                existing.is_authenticated = authenticated;
                debug!("Refreshed registration for player {}", player_id);
                return Ok(false);
            }
            if players.len() >= connection_cap {
                return Err(SessionError::ConnectionLimitReached(connection_cap));
            }

            let mut connection =
                PlayerConnection::new(player_id.clone(), player_name.to_string(), address);
            connection.is_authenticated = authenticated;
            players.insert(player_id.clone(), connection);
        }

        info!("👤 Player {} ({}) connected from {}", player_id, player_name, address);
        self.events.publish(ServerEvent::PlayerConnected {
            player_id: player_id.clone(),
        });
        Ok(true)
    }

    pub fn unregister_player(&self, player_id: &PlayerId) -> Result<(), SessionError> {
        self.disconnect_player(player_id, reasons::UNREGISTERED)
    }

    /// Leaves the player's session (if any), then removes the record.
    pub fn disconnect_player(&self, player_id: &PlayerId, reason: &str) -> Result<(), SessionError> {
        let session_id = self
            .players
            .lock()
            .get(player_id)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.clone()))?
            .session_id;

        if let Some(session_id) = session_id {
            let _ = self.leave_session(session_id, player_id);
        }

        if self.players.lock().remove(player_id).is_none() {
            return Err(SessionError::PlayerNotFound(player_id.clone()));
        }

        info!("Player {} disconnected: {}", player_id, reason);
        self.events.publish(ServerEvent::PlayerDisconnected {
            player_id: player_id.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Records latest ping and packet loss fractions for a player.
    pub fn update_player_network_stats(
        &self,
        player_id: &PlayerId,
        ping_ms: f32,
        packet_loss_in: f32,
        packet_loss_out: f32,
    ) -> Result<(), SessionError> {
        let mut players = self.players.lock();
        let player = players
            .get_mut(player_id)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.clone()))?;
        player.ping_ms = ping_ms.max(0.0);
        player.packet_loss_in = packet_loss_in.clamp(0.0, 1.0);
        player.packet_loss_out = packet_loss_out.clamp(0.0, 1.0);
        Ok(())
    }
}
