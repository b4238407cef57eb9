//! Error types for the dedicated server manager.
//!
//! Each layer has its own error enum so callers can tell a refused operation
//! apart from a broken one. [`ServerError`] wraps the lifecycle-level failures.

use crate::types::{PlayerId, ServerStatus, SessionId};
use std::io::Error as IoError;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading, saving and validation errors.
///
/// A failed load never touches the configuration that was already in memory.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file {0}: {1}")]
    Read(PathBuf, IoError),

    #[error("Failed to write configuration file {0}: {1}")]
    Write(PathBuf, IoError),

    #[error("Failed to parse configuration file {0}: {1}")]
    Parse(PathBuf, serde_json::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(serde_json::Error),

    #[error("Configuration is invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Listener setup failures.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Invalid server IP address: {0}")]
    InvalidAddress(String),

    #[error("Socket creation failed: {0}")]
    SocketCreation(IoError),

    #[error("Socket option {option} failed: {source}")]
    SocketOption {
        option: &'static str,
        source: IoError,
    },

    #[error("Bind to {0} failed: {1}")]
    Bind(SocketAddr, IoError),

    #[error("Listen failed: {0}")]
    Listen(IoError),
}

/// Reasons a session or player registry operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Server is not online (status: {0})")]
    ServerNotOnline(ServerStatus),

    #[error("Session limit of {0} reached")]
    SessionLimitReached(usize),

    #[error("Connection limit of {0} reached")]
    ConnectionLimitReached(usize),

    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    #[error("Session {0} is no longer active")]
    SessionInactive(SessionId),

    #[error("Session {0} is full")]
    SessionFull(SessionId),

    #[error("Player {0} is already in session {1}")]
    AlreadyInSession(PlayerId, SessionId),

    #[error("Player {0} is not a member of session {1}")]
    NotAMember(PlayerId, SessionId),

    #[error("Player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("Player {0} failed authentication")]
    AuthenticationFailed(PlayerId),
}

/// Authentication failure reasons.
///
/// These never leave the authentication boundary; they are turned into
/// security log entries and a `false` result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token is not valid base64")]
    MalformedEncoding,

    #[error("Token payload has an unexpected layout")]
    MalformedPayload,

    #[error("Token was issued for a different player")]
    PlayerMismatch,

    #[error("Token signature is too short")]
    WeakSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is missing a required claim: {0}")]
    MissingClaim(&'static str),

    #[error("Too many authentication attempts")]
    RateLimited,
}

impl AuthError {
    /// Event name written to the security log for this failure.
    pub fn event_name(&self) -> &'static str {
        match self {
            AuthError::MalformedEncoding => "MalformedToken",
            AuthError::MalformedPayload => "MalformedToken",
            AuthError::PlayerMismatch => "PlayerIdMismatch",
            AuthError::WeakSignature => "InvalidSignature",
            AuthError::Expired => "ExpiredToken",
            AuthError::MissingClaim(_) => "MissingClaim",
            AuthError::RateLimited => "RateLimitExceeded",
        }
    }
}

/// Lifecycle-level server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Cannot start server while {0}")]
    AlreadyRunning(ServerStatus),

    #[error("Operation not allowed while {0}")]
    InvalidState(ServerStatus),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Auto-recovery failed: {0}")]
    RecoveryFailed(String),
}
