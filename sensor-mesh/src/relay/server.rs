//! TCP accept loop for the relay
//!
//! One reader thread (plus one writer thread) per accepted connection, with no
//! upper bound on the number of connections. The listener is polled in
//! non-blocking mode so the loop can notice the shutdown flag.

use crate::config::IpVersion;
use crate::error::{Error, Result};
use crate::relay::broadcast::Relay;
use crate::relay::connection::ConnectionHandler;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Poll period of the non-blocking accept loop
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Relay server owning the listening socket
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
    running: Arc<AtomicBool>,
}

impl RelayServer {
    /// Bind the wildcard address of the given IP version on `port`
    pub fn bind_port(
        ip_version: IpVersion,
        port: u16,
        relay: Arc<Relay>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let addr = match ip_version {
            IpVersion::V4 => SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            IpVersion::V6 => SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
        };
        Self::bind(addr, relay, running)
    }

    /// Bind an explicit address
    pub fn bind(addr: SocketAddr, relay: Arc<Relay>, running: Arc<AtomicBool>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| Error::Other(format!("Failed to bind to {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            relay,
            running,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Accept connections until the running flag clears
    pub fn run(&self) -> Result<()> {
        log::info!("Relay listening on {}", self.local_addr()?);

        while self.running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.spawn_connection(stream, peer) {
                        log::error!("Failed to start connection from {}: {}", peer, e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        log::info!(
            "Relay stopped accepting ({} connections still open)",
            self.relay.registry().len()
        );
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        // Accepted sockets may inherit non-blocking mode from the listener
        stream.set_nonblocking(false)?;

        let handler = ConnectionHandler::accept(stream, peer, Arc::clone(&self.relay))?;
        let id = handler.id();

        let spawned = thread::Builder::new()
            .name(format!("relay-conn-{}", id))
            .spawn(move || {
                if let Err(e) = handler.run() {
                    log::debug!("Connection {} ended with: {}", id, e);
                }
            });

        if let Err(e) = spawned {
            self.relay.detach(id);
            return Err(Error::Other(format!(
                "Failed to spawn reader for connection {}: {}",
                id, e
            )));
        }
        Ok(())
    }
}
