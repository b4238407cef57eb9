//! Player authentication.
//!
//! Three schemes, chosen by [`AuthMethod`]:
//!
//! - **None** - every player is accepted
//! - **Basic** - base64 of `playerId:unixTimestamp:signature`
//! - **Token** - JWT-shaped `header.payload.signature` with a base64url JSON
//!   payload carrying `sub` (or `playerId`) and `exp`
//!
//! Failures never escape as errors. Each one is written to the security log,
//! published as [`ServerEvent::SecurityEvent`] and reported as `false`.

use crate::config::{AuthMethod, SecurityConfig};
use crate::error::AuthError;
use crate::events::{EventBus, ServerEvent};
use crate::security_log::SecurityLog;
use crate::types::{current_timestamp, PlayerId};
use base64::{engine::general_purpose, Engine as _};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Rolling window used for per-player rate limiting.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Minimum accepted length of a Basic token signature.
pub const MIN_SIGNATURE_LENGTH: usize = 8;

#[derive(Debug)]
pub struct Authenticator {
    attempts: DashMap<PlayerId, VecDeque<Instant>>,
    security_log: SecurityLog,
    events: EventBus,
}

impl Authenticator {
    pub fn new(security_log_path: impl Into<std::path::PathBuf>, events: EventBus) -> Self {
        Self {
            attempts: DashMap::new(),
            security_log: SecurityLog::new(security_log_path),
            events,
        }
    }

    /// Checks `token` for `player_id` under the configured scheme.
    pub fn authenticate(&self, security: &SecurityConfig, player_id: &PlayerId, token: &str) -> bool {
        self.authenticate_at(security, player_id, token, current_timestamp(), Instant::now())
    }

    /// Same as [`Authenticator::authenticate`] with explicit clocks.
    pub fn authenticate_at(
        &self,
        security: &SecurityConfig,
        player_id: &PlayerId,
        token: &str,
        unix_now: u64,
        now: Instant,
    ) -> bool {
        let result = self
            .check_rate_limit(security, player_id, now)
            .and_then(|_| match security.auth_method {
                AuthMethod::None => Ok(()),
                AuthMethod::Basic => verify_basic_token(
                    player_id,
                    token,
                    u64::try_from(security.token_validity_duration).unwrap_or(0),
                    unix_now,
                ),
                AuthMethod::Token => verify_bearer_token(player_id, token, unix_now),
            });

        match result {
            Ok(()) => {
                debug!("Player {} authenticated ({:?})", player_id, security.auth_method);
                true
            }
            Err(e) => {
                self.report_failure(security, player_id, &e);
                false
            }
        }
    }

    fn check_rate_limit(
        &self,
        security: &SecurityConfig,
        player_id: &PlayerId,
        now: Instant,
    ) -> Result<(), AuthError> {
        if !security.enable_rate_limiting {
            return Ok(());
        }
        let limit = usize::try_from(security.max_requests_per_minute).unwrap_or(0);

        let mut window = self.attempts.entry(player_id.clone()).or_default();
        while window
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= RATE_LIMIT_WINDOW)
        {
            window.pop_front();
        }
        if window.len() >= limit {
            return Err(AuthError::RateLimited);
        }
        window.push_back(now);
        Ok(())
    }

    fn report_failure(&self, security: &SecurityConfig, player_id: &PlayerId, error: &AuthError) {
        let event = error.event_name();
        warn!("🔒 Authentication failed for player {}: {}", player_id, error);

        self.security_log.set_path(&security.security_log_path);
        if let Err(e) = self.security_log.record(event, player_id) {
            warn!(
                "Failed to write security log {}: {}",
                self.security_log.path().display(),
                e
            );
        }

        self.events.publish(ServerEvent::SecurityEvent {
            event: event.to_string(),
            player_id: player_id.clone(),
        });
    }

    /// Drops rate-limit windows with no attempts inside the window.
    pub fn purge_stale(&self, now: Instant) -> usize {
        let before = self.attempts.len();
        self.attempts.retain(|_, window| {
            window
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < RATE_LIMIT_WINDOW)
        });
        self.attempts.shrink_to_fit();
        before - self.attempts.len()
    }

    /// Number of players with a live rate-limit window.
    pub fn tracked_players(&self) -> usize {
        self.attempts.len()
    }
}

/// Validates a Basic token: base64 of `playerId:timestamp:signature`.
pub fn verify_basic_token(
    player_id: &PlayerId,
    token: &str,
    validity_secs: u64,
    unix_now: u64,
) -> Result<(), AuthError> {
    let decoded = general_purpose::STANDARD
        .decode(token.trim())
        .map_err(|_| AuthError::MalformedEncoding)?;
    let text = String::from_utf8(decoded).map_err(|_| AuthError::MalformedEncoding)?;

    let parts: Vec<&str> = text.split(':').collect();
    let [id, timestamp, signature] = parts.as_slice() else {
        return Err(AuthError::MalformedPayload);
    };

    if *id != player_id.as_str() {
        return Err(AuthError::PlayerMismatch);
    }
    if signature.len() < MIN_SIGNATURE_LENGTH {
        return Err(AuthError::WeakSignature);
    }

    let issued: u64 = timestamp.parse().map_err(|_| AuthError::MalformedPayload)?;
    if unix_now.saturating_sub(issued) > validity_secs {
        return Err(AuthError::Expired);
    }
    Ok(())
}

/// Validates a JWT-shaped token's payload claims. The signature segment is not verified.
pub fn verify_bearer_token(player_id: &PlayerId, token: &str, unix_now: u64) -> Result<(), AuthError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(AuthError::MalformedPayload);
    };

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedEncoding)?;
    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedPayload)?;
    let claims = claims.as_object().ok_or(AuthError::MalformedPayload)?;

    let subject = claims
        .get("sub")
        .or_else(|| claims.get("playerId"))
        .and_then(|v| v.as_str())
        .ok_or(AuthError::MissingClaim("sub"))?;
    if subject != player_id.as_str() {
        return Err(AuthError::PlayerMismatch);
    }

    let expires = claims
        .get("exp")
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .ok_or(AuthError::MissingClaim("exp"))?;
    if expires <= unix_now {
        return Err(AuthError::Expired);
    }
    Ok(())
}
