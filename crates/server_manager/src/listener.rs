//! TCP connection listener.
//!
//! Creates the listening socket with `socket2` so address reuse, non-blocking
//! mode and backlog can be set before the socket is handed to anyone else.
//! Buffer and delay tuning happens only after the listener is up and is
//! best-effort.

use crate::config::NetworkConfig;
use crate::error::NetworkError;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Smallest socket buffer the tuning step will apply.
pub const MIN_SOCKET_BUFFER_SIZE: usize = 64 * 1024;

/// A bound, listening TCP socket.
#[derive(Debug)]
pub struct ConnectionListener {
    socket: Option<Socket>,
    local_addr: Option<SocketAddr>,
}

impl ConnectionListener {
    /// Creates, binds and starts listening according to `config`.
    ///
    /// Any failing step aborts the sequence; the partially configured socket
    /// is dropped (and closed) before the error is returned.
    pub fn start(config: &NetworkConfig) -> Result<Self, NetworkError> {
        let ip: IpAddr = config
            .server_ip
            .parse()
            .map_err(|_| NetworkError::InvalidAddress(config.server_ip.clone()))?;
        let port = u16::try_from(config.server_port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                NetworkError::InvalidAddress(format!("{}:{}", config.server_ip, config.server_port))
            })?;
        let address = SocketAddr::new(ip, port);

        let domain = if address.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(NetworkError::SocketCreation)?;

        socket
            .set_reuse_address(true)
            .map_err(|source| NetworkError::SocketOption {
                option: "SO_REUSEADDR",
                source,
            })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| NetworkError::SocketOption {
                option: "O_NONBLOCK",
                source,
            })?;

        socket
            .bind(&address.into())
            .map_err(|e| NetworkError::Bind(address, e))?;

        let backlog = config.max_connections.max(1);
        socket.listen(backlog).map_err(NetworkError::Listen)?;

        let local_addr = socket
            .local_addr()
            .ok()
            .and_then(|a| a.as_socket())
            .unwrap_or(address);

        info!("✅ Listener bound on {} (backlog {})", local_addr, backlog);

        let listener = Self {
            socket: Some(socket),
            local_addr: Some(local_addr),
        };
        listener.apply_platform_tuning(config);
        Ok(listener)
    }

    /// Adjusts buffers, Nagle and linger. Failures are logged, never fatal.
    fn apply_platform_tuning(&self, config: &NetworkConfig) {
        let Some(socket) = &self.socket else {
            return;
        };

        let send_target = tuned_buffer_size(config.send_buffer_size);
        if let Err(e) = socket.set_send_buffer_size(send_target) {
            warn!("Failed to set send buffer size to {}: {}", send_target, e);
        }
        let recv_target = tuned_buffer_size(config.receive_buffer_size);
        if let Err(e) = socket.set_recv_buffer_size(recv_target) {
            warn!("Failed to set receive buffer size to {}: {}", recv_target, e);
        }

        if let Err(e) = socket.set_tcp_nodelay(true) {
            warn!("Failed to disable Nagle's algorithm: {}", e);
        }

        if let Err(e) = socket.set_linger(Some(Duration::ZERO)) {
            warn!("Failed to set linger: {}", e);
        }

        debug!(
            "Socket tuning applied (send {} bytes, recv {} bytes)",
            send_target, recv_target
        );
    }

    /// Accepts one pending connection without blocking.
    ///
    /// Returns `None` when nothing is waiting or the listener is stopped.
    pub fn try_accept(&self) -> Option<(TcpStream, SocketAddr)> {
        let socket = self.socket.as_ref()?;
        match socket.accept() {
            Ok((conn, addr)) => {
                let addr = addr.as_socket()?;
                if let Err(e) = conn.set_nonblocking(true) {
                    warn!("Failed to make connection from {} non-blocking: {}", addr, e);
                }
                Some((conn.into(), addr))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                None
            }
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_listening(&self) -> bool {
        self.socket.is_some()
    }

    /// Closes the socket. Calling this on a stopped listener does nothing.
    pub fn stop(&mut self) {
        if let Some(socket) = self.socket.take() {
            drop(socket);
            if let Some(addr) = self.local_addr.take() {
                info!("Listener on {} closed", addr);
            }
        }
    }
}

impl Drop for ConnectionListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clamps a configured buffer size to the safe minimum.
pub fn tuned_buffer_size(configured: i32) -> usize {
    usize::try_from(configured)
        .unwrap_or(0)
        .max(MIN_SOCKET_BUFFER_SIZE)
}
