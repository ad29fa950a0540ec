//! Type-scoped broadcast relay
//!
//! Fans each received report out to every registered connection of the same
//! kind, and turns a dropped connection into a synthesized disconnect report.
//!
//! # Delivery Model
//!
//! `broadcast` holds the registry lock for the entire fan-out. Instead of
//! writing to sockets under that lock, it pushes into each recipient's bounded
//! outbound queue with a non-blocking `try_send`; a dedicated writer thread per
//! connection drains the queue onto the socket (see `connection`).
//!
//! | Recipient state | Outcome |
//! |-----------------|---------|
//! | Queue has room | Report queued |
//! | Queue full (slow reader) | Report dropped for that recipient, warning logged |
//! | Writer gone | Report dropped, connection is about to be unregistered |
//!
//! A failure for one recipient never affects the others.

use crate::core::types::SensorReport;
use crate::relay::registry::{ConnectionId, ConnectionRegistry, Outbound};
use crossbeam_channel::{Receiver, TrySendError, bounded};
use std::net::SocketAddr;

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_QUEUE: usize = 64;

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients whose queue accepted the report
    pub queued: usize,
    /// Recipients that matched but could not take the report
    pub dropped: usize,
}

/// Broadcast relay over a connection registry
#[derive(Debug)]
pub struct Relay {
    registry: ConnectionRegistry,
    queue_capacity: usize,
}

impl Relay {
    /// Create a relay whose connections get outbound queues of `queue_capacity`
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register a new connection and create its outbound queue.
    ///
    /// The returned receiver is meant for the connection's writer thread.
    pub fn attach(&self, peer: SocketAddr) -> (ConnectionId, Receiver<SensorReport>) {
        let (tx, rx): (Outbound, Receiver<SensorReport>) = bounded(self.queue_capacity);
        let id = self.registry.register(peer, tx);
        (id, rx)
    }

    /// Set a connection's identity from the report it just sent
    pub fn identify(&self, id: ConnectionId, report: &SensorReport) -> bool {
        let updated = self.registry.set_identity(id, report.kind, report.coord);
        if updated {
            log::info!(
                "Connection {} identified as {} sensor in {}",
                id,
                report.kind,
                report.coord
            );
        }
        updated
    }

    /// Queue `report` for every connection of the same kind
    pub fn broadcast(&self, report: &SensorReport) -> Delivery {
        let mut delivery = Delivery::default();

        self.registry.fan_out(report.kind, |entry| {
            match entry.outbound.try_send(*report) {
                Ok(()) => delivery.queued += 1,
                Err(TrySendError::Full(_)) => {
                    delivery.dropped += 1;
                    log::warn!(
                        "Outbound queue full for connection {} ({}), dropping report",
                        entry.id,
                        entry.peer
                    );
                }
                Err(TrySendError::Disconnected(_)) => {
                    delivery.dropped += 1;
                    log::debug!("Connection {} writer gone, skipping", entry.id);
                }
            }
        });

        log::trace!(
            "Relayed {} ({} queued, {} dropped)",
            report,
            delivery.queued,
            delivery.dropped
        );
        delivery
    }

    /// Remove a connection and notify its peers that it left.
    ///
    /// Returns the synthesized disconnect report, or `None` when the
    /// connection never announced an identity (or was already removed).
    pub fn detach(&self, id: ConnectionId) -> Option<SensorReport> {
        let entry = self.registry.unregister(id)?;
        let identity = entry.identity?;
        drop(entry);

        let notice = SensorReport::disconnect(identity.kind, identity.coord);
        log::info!(
            "{} sensor in {} measurement: {:.4} (disconnected)",
            notice.kind,
            notice.coord,
            notice.measurement
        );
        self.broadcast(&notice);
        Some(notice)
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_QUEUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Coord, SensorKind};

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn report(kind: SensorKind, x: i32, y: i32, m: f32) -> SensorReport {
        SensorReport::new(kind, Coord::new(x, y).unwrap(), m)
    }

    #[test]
    fn test_broadcast_reaches_same_kind_including_sender() {
        let relay = Relay::new(8);
        let (a, rx_a) = relay.attach(peer(1));
        let (b, rx_b) = relay.attach(peer(2));
        let (c, rx_c) = relay.attach(peer(3));

        let from_a = report(SensorKind::Temperature, 1, 1, 30.0);
        relay.identify(a, &from_a);
        relay.identify(b, &report(SensorKind::Temperature, 2, 2, 25.0));
        relay.identify(c, &report(SensorKind::Humidity, 3, 3, 50.0));

        let delivery = relay.broadcast(&from_a);
        assert_eq!(delivery, Delivery { queued: 2, dropped: 0 });
        assert_eq!(rx_a.try_recv().unwrap(), from_a);
        assert_eq!(rx_b.try_recv().unwrap(), from_a);
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_unidentified_connection_receives_nothing() {
        let relay = Relay::new(8);
        let (a, _rx_a) = relay.attach(peer(1));
        let (_b, rx_b) = relay.attach(peer(2));
        let r = report(SensorKind::AirQuality, 0, 0, 20.0);
        relay.identify(a, &r);

        relay.broadcast(&r);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_does_not_block_other_recipients() {
        let relay = Relay::new(1);
        let (slow, _rx_slow) = relay.attach(peer(1));
        let (fast, rx_fast) = relay.attach(peer(2));
        let r = report(SensorKind::Humidity, 4, 4, 40.0);
        relay.identify(slow, &r);
        relay.identify(fast, &r);

        assert_eq!(relay.broadcast(&r).queued, 2);
        rx_fast.try_recv().unwrap();

        // Slow recipient still holds the first report; second is dropped for it only
        let delivery = relay.broadcast(&r);
        assert_eq!(delivery, Delivery { queued: 1, dropped: 1 });
        assert_eq!(rx_fast.try_recv().unwrap(), r);
    }

    #[test]
    fn test_closed_writer_counts_as_dropped() {
        let relay = Relay::new(4);
        let (gone, rx_gone) = relay.attach(peer(1));
        let (live, rx_live) = relay.attach(peer(2));
        let r = report(SensorKind::Temperature, 5, 5, 22.0);
        relay.identify(gone, &r);
        relay.identify(live, &r);
        drop(rx_gone);

        assert_eq!(relay.broadcast(&r), Delivery { queued: 1, dropped: 1 });
        assert_eq!(rx_live.try_recv().unwrap(), r);
    }

    #[test]
    fn test_detach_broadcasts_sentinel_with_last_coordinates() {
        let relay = Relay::new(4);
        let (leaving, _rx_leaving) = relay.attach(peer(1));
        let (staying, rx_staying) = relay.attach(peer(2));
        relay.identify(leaving, &report(SensorKind::Temperature, 6, 5, 30.0));
        relay.identify(staying, &report(SensorKind::Temperature, 5, 5, 28.0));

        let notice = relay.detach(leaving).unwrap();
        assert!(notice.is_disconnect());
        assert_eq!(notice.coord, Coord::new(6, 5).unwrap());

        let received = rx_staying.try_recv().unwrap();
        assert_eq!(received, notice);
        assert_eq!(relay.registry().len(), 1);
    }

    #[test]
    fn test_detach_without_identity_is_silent() {
        let relay = Relay::new(4);
        let (silent, _rx) = relay.attach(peer(1));
        let (other, rx_other) = relay.attach(peer(2));
        relay.identify(other, &report(SensorKind::Temperature, 1, 1, 30.0));

        assert!(relay.detach(silent).is_none());
        assert!(rx_other.try_recv().is_err());
        assert!(relay.detach(silent).is_none());
    }
}
