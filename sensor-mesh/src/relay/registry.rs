//! Connection registry for the relay
//!
//! Tracks every live connection together with the identity (kind and
//! coordinates) it announced in its first report. One mutex covers the whole
//! collection, so the relay's fan-out iteration and any mutation never
//! interleave.
//!
//! # Entry Lifecycle
//!
//! ```text
//! 1. Connection accepted      -> register()      (identity unset)
//! 2. First report received    -> set_identity()  (kind + coordinates)
//! 3. Reports relayed          -> fan_out()       (matches on kind only)
//! 4. Stream ends or breaks    -> unregister()    (returns last known entry)
//! ```

use crate::core::types::{Coord, SensorKind, SensorReport};
use crossbeam_channel::Sender;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

/// Identifier handed out by [`ConnectionRegistry::register`]
pub type ConnectionId = u64;

/// Sending half of a connection's outbound report queue
pub type Outbound = Sender<SensorReport>;

/// What a connection announced about itself in its first report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Identity {
    pub kind: SensorKind,
    pub coord: Coord,
}

/// One live connection
#[derive(Debug)]
pub struct ConnectionEntry {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub outbound: Outbound,
    /// Unset until the first report arrives
    pub identity: Option<Identity>,
}

impl ConnectionEntry {
    /// True when this entry should receive reports of `kind`
    #[inline]
    pub fn accepts(&self, kind: SensorKind) -> bool {
        self.identity.is_some_and(|identity| identity.kind == kind)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: ConnectionId,
    entries: Vec<ConnectionEntry>,
}

/// Mutex-guarded list of live connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a freshly accepted connection with no identity. Always succeeds.
    pub fn register(&self, peer: SocketAddr, outbound: Outbound) -> ConnectionId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(ConnectionEntry {
            id,
            peer,
            outbound,
            identity: None,
        });
        log::debug!("Registered connection {} from {}", id, peer);
        id
    }

    /// Record the identity of a connection.
    ///
    /// Returns false (and changes nothing) when the entry is already gone.
    pub fn set_identity(&self, id: ConnectionId, kind: SensorKind, coord: Coord) -> bool {
        let mut inner = self.lock();
        match inner.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.identity = Some(Identity { kind, coord });
                true
            }
            None => false,
        }
    }

    /// Remove a connection and hand back its last known state.
    ///
    /// Dropping the returned entry closes its outbound queue.
    pub fn unregister(&self, id: ConnectionId) -> Option<ConnectionEntry> {
        let mut inner = self.lock();
        let pos = inner.entries.iter().position(|entry| entry.id == id)?;
        let entry = inner.entries.swap_remove(pos);
        log::debug!(
            "Unregistered connection {} ({} remaining)",
            id,
            inner.entries.len()
        );
        Some(entry)
    }

    /// Identity of a connection, if it is registered and has announced one
    pub fn identity(&self, id: ConnectionId) -> Option<Identity> {
        self.lock()
            .entries
            .iter()
            .find(|entry| entry.id == id)
            .and_then(|entry| entry.identity)
    }

    /// Visit every entry accepting `kind` while holding the registry lock
    /// for the whole iteration. Returns the number of entries visited.
    pub fn fan_out<F>(&self, kind: SensorKind, mut visit: F) -> usize
    where
        F: FnMut(&ConnectionEntry),
    {
        let inner = self.lock();
        let mut visited = 0;
        for entry in inner.entries.iter().filter(|entry| entry.accepts(kind)) {
            visit(entry);
            visited += 1;
        }
        visited
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live connections that have announced an identity
    pub fn identified_count(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.identity.is_some())
            .count()
    }
}
