//! Relay integration tests over loopback TCP.
//!
//! Starts a real `RelayServer` and drives it with raw sockets speaking the
//! 24-byte report format. Every socket has a read timeout so a missing
//! delivery fails the test instead of hanging it.
//!
//! Run with: `cargo test --test relay_integration`

use sensor_mesh::core::types::{Coord, SensorKind, SensorReport};
use sensor_mesh::relay::{Relay, RelayServer};
use sensor_mesh::streaming::wire::{read_report, write_report};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(300);

// ============================================================================
// Fixtures
// ============================================================================

struct TestRelay {
    addr: SocketAddr,
    relay: Arc<Relay>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestRelay {
    fn start() -> Self {
        let relay = Arc::new(Relay::new(16));
        let running = Arc::new(AtomicBool::new(true));
        let server = RelayServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            Arc::clone(&relay),
            Arc::clone(&running),
        )
        .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || server.run().unwrap());

        Self {
            addr,
            relay,
            running,
            handle: Some(handle),
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
        stream
    }

    /// Block until the registry satisfies `check`, or panic after a timeout
    fn wait_for(&self, what: &str, check: impl Fn(&Relay) -> bool) {
        let deadline = Instant::now() + READ_TIMEOUT;
        while !check(self.relay.as_ref()) {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn report(kind: SensorKind, x: i32, y: i32, m: f32) -> SensorReport {
    SensorReport::new(kind, Coord::new(x, y).unwrap(), m)
}

/// Read reports until one matches, panicking on timeout
fn read_until(stream: &mut TcpStream, matches: impl Fn(&SensorReport) -> bool) -> SensorReport {
    loop {
        match read_report(stream) {
            Ok(Some(r)) if matches(&r) => return r,
            Ok(Some(_)) => continue,
            Ok(None) => panic!("relay closed the connection"),
            Err(e) => panic!("no matching report: {}", e),
        }
    }
}

/// Collect everything that arrives within the quiet period
fn drain(stream: &mut TcpStream) -> Vec<SensorReport> {
    stream.set_read_timeout(Some(QUIET_PERIOD)).unwrap();
    let mut seen = Vec::new();
    while let Ok(Some(r)) = read_report(stream) {
        seen.push(r);
    }
    stream.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
    seen
}

/// Connect and introduce a sensor, returning its socket once identified
fn join(relay: &TestRelay, intro: SensorReport) -> TcpStream {
    let before = relay.relay.registry().identified_count();
    let mut stream = relay.connect();
    write_report(&mut stream, &intro).unwrap();
    relay.wait_for("identity", |r| r.registry().identified_count() > before);
    stream
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_report_relayed_to_same_kind_only() {
    let relay = TestRelay::start();
    let mut a = join(&relay, report(SensorKind::Temperature, 1, 1, 25.0));
    let mut b = join(&relay, report(SensorKind::Temperature, 2, 2, 26.0));
    let mut c = join(&relay, report(SensorKind::Humidity, 3, 3, 50.0));
    drain(&mut a);
    drain(&mut b);
    drain(&mut c);

    let sent = report(SensorKind::Temperature, 1, 1, 30.0);
    write_report(&mut a, &sent).unwrap();

    assert_eq!(read_until(&mut b, |r| r.coord == sent.coord), sent);
    // Sender is a same-kind recipient too
    assert_eq!(read_until(&mut a, |r| r.coord == sent.coord), sent);
    assert!(
        drain(&mut c)
            .iter()
            .all(|r| r.kind == SensorKind::Humidity)
    );
}

#[test]
fn test_disconnect_broadcasts_sentinel() {
    let relay = TestRelay::start();
    let leaving = join(&relay, report(SensorKind::AirQuality, 6, 5, 20.0));
    let mut staying = join(&relay, report(SensorKind::AirQuality, 5, 5, 21.0));
    drain(&mut staying);

    drop(leaving);

    let notice = read_until(&mut staying, |r| r.is_disconnect());
    assert_eq!(notice.kind, SensorKind::AirQuality);
    assert_eq!(notice.coord, Coord::new(6, 5).unwrap());
    relay.wait_for("unregister", |r| r.registry().len() == 1);
}

#[test]
fn test_silent_disconnect_sends_nothing() {
    let relay = TestRelay::start();
    let mut watcher = join(&relay, report(SensorKind::Temperature, 0, 0, 25.0));
    drain(&mut watcher);

    let silent = relay.connect();
    relay.wait_for("registration", |r| r.registry().len() == 2);
    drop(silent);
    relay.wait_for("unregister", |r| r.registry().len() == 1);

    assert!(drain(&mut watcher).is_empty());
}

#[test]
fn test_truncated_report_drops_connection() {
    use std::io::Write;

    let relay = TestRelay::start();
    let mut watcher = join(&relay, report(SensorKind::Humidity, 0, 0, 40.0));
    let mut broken = join(&relay, report(SensorKind::Humidity, 4, 4, 60.0));
    drain(&mut watcher);
    drain(&mut broken);

    broken.write_all(&[0u8; 10]).unwrap();

    let notice = read_until(&mut watcher, |r| r.is_disconnect());
    assert_eq!(notice.coord, Coord::new(4, 4).unwrap());
    relay.wait_for("unregister", |r| r.registry().len() == 1);
}

#[test]
fn test_identity_fixed_by_first_report() {
    let relay = TestRelay::start();
    let mut mover = join(&relay, report(SensorKind::Temperature, 1, 1, 25.0));
    let mut watcher = join(&relay, report(SensorKind::Temperature, 8, 8, 25.0));
    drain(&mut mover);
    drain(&mut watcher);

    // Later reports from other coordinates are relayed but do not re-identify
    let moved = report(SensorKind::Temperature, 2, 2, 27.0);
    write_report(&mut mover, &moved).unwrap();
    assert_eq!(read_until(&mut watcher, |r| r.coord == moved.coord), moved);

    drop(mover);
    let notice = read_until(&mut watcher, |r| r.is_disconnect());
    assert_eq!(notice.coord, Coord::new(1, 1).unwrap());
}
