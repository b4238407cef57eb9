//! Host loop: drives the manager's tick and serves accepted sockets.
//!
//! A client joins by sending one JSON line:
//!
//! ```text
//! {"player_id":"p1","player_name":"Alice","token":"..."}
//! ```
//!
//! and receives `{"accepted":true,"reason":null}` or a refusal with a
//! reason. An accepted player stays registered until the socket closes.

use serde::{Deserialize, Serialize};
use server_manager::{PlayerId, ServerManager};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Longest handshake line accepted from a client.
const MAX_HANDSHAKE_BYTES: usize = 4096;

const ALREADY_CONNECTED: &str = "Player already connected";

#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub player_id: String,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub accepted: bool,
    pub reason: Option<String>,
}

impl JoinResponse {
    fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn refused(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Ticks the manager at its frame budget and hands accepted sockets to
/// their own tasks, until `shutdown` flips to `true`.
pub async fn run_tick_loop(manager: Arc<ServerManager>, mut shutdown: watch::Receiver<bool>) {
    let mut budget = manager.frame_budget();
    let mut ticker = interval(budget);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("⏱️ Tick loop running every {:?}", budget);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.tick();

                while let Some((stream, addr)) = manager.accept_connection() {
                    let manager = manager.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        serve_client(manager, stream, addr, shutdown).await;
                    });
                }

                let current = manager.frame_budget();
                if current != budget {
                    info!("Frame budget changed: {:?} -> {:?}", budget, current);
                    budget = current;
                    ticker = interval(budget);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("Tick loop stopped");
}

/// Validates a handshake line and registers the player.
///
/// An ID that is already connected is refused; the live record stays bound
/// to the socket that registered it.
pub fn process_handshake(manager: &ServerManager, line: &str, addr: SocketAddr) -> (Option<PlayerId>, JoinResponse) {
    let request: JoinRequest = match serde_json::from_str(line.trim()) {
        Ok(request) => request,
        Err(e) => return (None, JoinResponse::refused(format!("Malformed handshake: {e}"))),
    };
    if request.player_id.trim().is_empty() {
        return (None, JoinResponse::refused("Missing player_id"));
    }

    let player_id = PlayerId::new(request.player_id);
    if manager.player_info(&player_id).is_some() {
        return (None, JoinResponse::refused(ALREADY_CONNECTED));
    }
    match manager.handle_player_connection(&player_id, &request.player_name, addr, &request.token) {
        Ok(true) => (Some(player_id), JoinResponse::accepted()),
        Ok(false) => (None, JoinResponse::refused(ALREADY_CONNECTED)),
        Err(e) => (None, JoinResponse::refused(e.to_string())),
    }
}

async fn serve_client(
    manager: Arc<ServerManager>,
    stream: std::net::TcpStream,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) {
    let stream = match TcpStream::from_std(stream) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to adopt connection from {}: {}", addr, e);
            return;
        }
    };
    debug!("Connection from {}", addr);

    let handshake_timeout = Duration::from_secs_f32(
        manager.config().network.client_timeout.clamp(1.0, 300.0),
    );
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut line = String::new();
    let read = timeout(
        handshake_timeout,
        (&mut reader).take(MAX_HANDSHAKE_BYTES as u64).read_line(&mut line),
    )
    .await;
    let bytes_in = match read {
        Ok(Ok(n)) if n > 0 => n,
        Ok(Ok(_)) => return,
        Ok(Err(e)) => {
            debug!("Handshake read from {} failed: {}", addr, e);
            return;
        }
        Err(_) => {
            debug!("Handshake from {} timed out", addr);
            return;
        }
    };

    let (player_id, response) = process_handshake(&manager, &line, addr);
    let mut payload = match serde_json::to_vec(&response) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to encode handshake response: {}", e);
            return;
        }
    };
    payload.push(b'\n');
    if let Err(e) = writer.write_all(&payload).await {
        debug!("Failed to reply to {}: {}", addr, e);
    }
    manager.record_network_traffic(bytes_in as u64, payload.len() as u64);

    let Some(player_id) = player_id else {
        return;
    };

    let mut buffer = vec![0u8; 4096];
    loop {
        tokio::select! {
            read = reader.read(&mut buffer) => match read {
                Ok(0) | Err(_) => break,
                Ok(n) => manager.record_network_traffic(n as u64, 0),
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    let owns_record = manager
        .player_info(&player_id)
        .is_some_and(|player| player.address == addr);
    if owns_record
        && manager
            .disconnect_player(&player_id, "Client disconnected")
            .is_ok()
    {
        debug!("Connection for {} closed", player_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use server_manager::{ManagerOptions, ServerConfiguration, ServerEnvironment};
    use std::net::TcpListener as StdTcpListener;

    fn online_manager() -> Arc<ServerManager> {
        let mut config = ServerConfiguration::default();
        config.network.server_ip = "127.0.0.1".to_string();
        config.network.server_port = StdTcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port() as i32;
        let manager = ServerManager::with_options(
            config,
            ManagerOptions {
                settle_delay: Duration::from_millis(10),
                restart_delay: Duration::from_millis(10),
            },
        );
        manager.start_server(ServerEnvironment::Development).unwrap();
        Arc::new(manager)
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:6000".parse().unwrap()
    }

    #[test]
    fn test_handshake_registers_player() {
        let manager = online_manager();
        let (player, response) = process_handshake(
            &manager,
            r#"{"player_id":"p1","player_name":"Alice","token":""}"#,
            addr(),
        );

        assert_eq!(response, JoinResponse::accepted());
        assert_eq!(player, Some(PlayerId::from("p1")));
        assert_eq!(manager.connected_player_count(), 1);
    }

    #[test]
    fn test_duplicate_handshake_is_refused() {
        let manager = online_manager();
        let first: SocketAddr = "127.0.0.1:6001".parse().unwrap();
        let second: SocketAddr = "127.0.0.1:6002".parse().unwrap();
        let line = r#"{"player_id":"p1","player_name":"Alice"}"#;

        assert!(process_handshake(&manager, line, first).1.accepted);
        let (player, response) = process_handshake(&manager, line, second);

        assert!(player.is_none());
        assert_eq!(response, JoinResponse::refused(ALREADY_CONNECTED));
        assert_eq!(manager.player_info(&PlayerId::from("p1")).unwrap().address, first);
    }

    #[test]
    fn test_malformed_handshake_is_refused() {
        let manager = online_manager();
        let (player, response) = process_handshake(&manager, "hello", addr());

        assert!(player.is_none());
        assert!(!response.accepted);
        assert!(response.reason.unwrap().starts_with("Malformed handshake"));

        let (_, response) = process_handshake(&manager, r#"{"player_id":"  "}"#, addr());
        assert_eq!(response, JoinResponse::refused("Missing player_id"));
    }

    #[tokio::test]
    async fn test_socket_join_and_leave() {
        let manager = online_manager();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tick_loop = tokio::spawn(run_tick_loop(manager.clone(), shutdown_rx));

        let server_addr = manager.local_addr().unwrap();
        let mut client = TcpStream::connect(server_addr).await.unwrap();
        client
            .write_all(b"{\"player_id\":\"p7\",\"player_name\":\"Seven\"}\n")
            .await
            .unwrap();

        let mut reply = String::new();
        let mut reader = BufReader::new(&mut client);
        timeout(Duration::from_secs(5), reader.read_line(&mut reply))
            .await
            .unwrap()
            .unwrap();
        let response: JoinResponse = serde_json::from_str(&reply).unwrap();
        assert!(response.accepted);
        assert!(manager.player_info(&PlayerId::from("p7")).is_some());

        drop(client);
        for _ in 0..100 {
            if manager.connected_player_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.connected_player_count(), 0);

        shutdown_tx.send(true).unwrap();
        tick_loop.await.unwrap();
    }

    async fn join(addr: SocketAddr, player_id: &str) -> (TcpStream, JoinResponse) {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(format!("{{\"player_id\":\"{player_id}\"}}\n").as_bytes())
            .await
            .unwrap();

        let mut reply = String::new();
        {
            let mut reader = BufReader::new(&mut client);
            timeout(Duration::from_secs(5), reader.read_line(&mut reply))
                .await
                .unwrap()
                .unwrap();
        }
        (client, serde_json::from_str(&reply).unwrap())
    }

    #[tokio::test]
    async fn test_second_socket_cannot_evict_live_player() {
        let manager = online_manager();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tick_loop = tokio::spawn(run_tick_loop(manager.clone(), shutdown_rx));
        let server_addr = manager.local_addr().unwrap();
        let p9 = PlayerId::from("p9");

        let (first, response) = join(server_addr, "p9").await;
        assert!(response.accepted);
        let (second, response) = join(server_addr, "p9").await;
        assert_eq!(response, JoinResponse::refused(ALREADY_CONNECTED));

        drop(second);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(manager.player_info(&p9).is_some());

        drop(first);
        for _ in 0..100 {
            if manager.player_info(&p9).is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(manager.player_info(&p9).is_none());

        shutdown_tx.send(true).unwrap();
        tick_loop.await.unwrap();
    }
}
