//! Per-connection duties on the relay
//!
//! Each accepted connection gets two threads:
//!
//! - **Reader** ([`ConnectionHandler`]): reads reports, sets the connection's
//!   identity from the first one, and broadcasts every report unchanged.
//! - **Writer** ([`run_writer`]): drains the connection's outbound queue onto
//!   the socket.
//!
//! # Connection Lifecycle
//!
//! ```text
//! 1. Server accepts socket, Relay::attach registers it (identity unset)
//! 2. Writer thread starts on a clone of the socket
//! 3. Reader loop: read -> identify (first time) -> broadcast
//! 4. EOF / short read / bad report / I/O error ends the reader
//! 5. Relay::detach unregisters and broadcasts the disconnect sentinel
//! 6. Socket shut down; writer sees its queue close and exits
//! ```
//!
//! A writer that fails to write shuts the socket down, which makes the reader
//! hit step 4 on its next read.

use crate::core::types::SensorReport;
use crate::error::{Error, Result};
use crate::relay::broadcast::Relay;
use crate::relay::registry::ConnectionId;
use crate::streaming::wire::{read_report, write_report};
use crossbeam_channel::Receiver;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Reader duty for one relay connection
pub struct ConnectionHandler {
    id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
    relay: Arc<Relay>,
    identified: bool,
}

impl ConnectionHandler {
    pub fn new(id: ConnectionId, peer: SocketAddr, stream: TcpStream, relay: Arc<Relay>) -> Self {
        Self {
            id,
            peer,
            stream,
            relay,
            identified: false,
        }
    }

    /// Register `stream` with the relay, start its writer thread and return
    /// the reader duty ready to run.
    pub fn accept(stream: TcpStream, peer: SocketAddr, relay: Arc<Relay>) -> Result<Self> {
        let write_half = stream.try_clone()?;
        let (id, outbound) = relay.attach(peer);

        if let Err(e) = spawn_writer(id, write_half, outbound) {
            relay.detach(id);
            return Err(e);
        }

        Ok(Self::new(id, peer, stream, relay))
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Run until the connection ends, then unregister it and notify peers.
    ///
    /// Returns the error that ended the connection, or `Ok(())` on a clean close.
    pub fn run(mut self) -> Result<()> {
        log::info!("Connection {} opened from {}", self.id, self.peer);

        let outcome = self.read_loop();
        match &outcome {
            Ok(()) => log::info!("Connection {} ({}) closed by peer", self.id, self.peer),
            Err(e) if e.is_disconnect() => {
                log::info!("Connection {} ({}) dropped: {}", self.id, self.peer, e)
            }
            Err(e) => log::warn!("Connection {} ({}) terminated: {}", self.id, self.peer, e),
        }

        self.relay.detach(self.id);
        let _ = self.stream.shutdown(Shutdown::Both);
        outcome
    }

    fn read_loop(&mut self) -> Result<()> {
        while let Some(report) = read_report(&mut self.stream)? {
            self.handle_report(&report);
        }
        Ok(())
    }

    fn handle_report(&mut self, report: &SensorReport) {
        if !self.identified {
            self.identified = self.relay.identify(self.id, report);
        }

        log::info!(
            "{} sensor in {} measurement: {:.4}",
            report.kind,
            report.coord,
            report.measurement
        );

        self.relay.broadcast(report);
    }
}

/// Spawn the writer thread for a connection
pub fn spawn_writer(
    id: ConnectionId,
    stream: TcpStream,
    outbound: Receiver<SensorReport>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("relay-writer-{}", id))
        .spawn(move || run_writer(id, stream, outbound))
        .map_err(|e| Error::Other(format!("Failed to spawn writer for connection {}: {}", id, e)))
}

/// Drain `outbound` onto `stream` until the queue closes or a write fails
pub fn run_writer(id: ConnectionId, mut stream: TcpStream, outbound: Receiver<SensorReport>) {
    for report in outbound.iter() {
        if let Err(e) = write_report(&mut stream, &report) {
            log::warn!("Connection {} write failed: {}", id, e);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
    }
    log::debug!("Connection {} writer finished", id);
}
