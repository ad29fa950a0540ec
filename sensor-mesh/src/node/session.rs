//! Node session: emitter and receiver duties under a supervisor
//!
//! # Duties
//!
//! | Duty | Loop | Ends when |
//! |------|------|-----------|
//! | Emitter | snapshot -> send -> wait emit interval | send fails, or supervisor stops it |
//! | Receiver | read -> correct -> console entry | stream ends or read fails |
//!
//! Both share one [`SensorNode`]. Neither retries: the first duty to fail ends
//! the session. The supervisor then stops the other duty (closing the
//! emitter's stop channel and shutting the socket down so a blocked read
//! returns), joins both threads and hands the error back to the caller.
//! Clearing the running flag (Ctrl-C) stops the session the same way and
//! yields `Ok(())`.

use crate::error::{Error, Result};
use crate::node::console::write_entry;
use crate::node::state::SensorNode;
use crate::streaming::wire::{read_report, write_report};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::fmt;
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the supervisor checks the running flag
const SUPERVISOR_POLL: Duration = Duration::from_millis(100);

/// Connect to the relay, trying every address `host` resolves to
pub fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port))
        .map_err(|e| Error::Other(format!("Failed to connect to {}:{}: {}", host, port, e)))?;
    log::info!(
        "Connected to relay {} (local {})",
        stream.peer_addr()?,
        stream.local_addr()?
    );
    Ok(stream)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Duty {
    Emitter,
    Receiver,
}

impl fmt::Display for Duty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Duty::Emitter => f.write_str("emitter"),
            Duty::Receiver => f.write_str("receiver"),
        }
    }
}

type DutyExit = (Duty, Result<()>);

/// One connected node session
pub struct Session<W> {
    node: Arc<SensorNode>,
    stream: TcpStream,
    console: W,
    running: Arc<AtomicBool>,
}

impl<W: Write + Send + 'static> Session<W> {
    /// `console` receives the action log; `running` is polled for shutdown
    pub fn new(
        node: Arc<SensorNode>,
        stream: TcpStream,
        console: W,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            node,
            stream,
            console,
            running,
        }
    }

    /// Run both duties until one ends or the running flag clears.
    ///
    /// Returns the error of the first duty that failed; a lost relay
    /// connection is [`Error::Disconnected`].
    pub fn run(self) -> Result<()> {
        let Session {
            node,
            stream,
            console,
            running,
        } = self;

        let emit_stream = stream.try_clone()?;
        let recv_stream = stream.try_clone()?;
        let (exit_tx, exit_rx) = bounded::<DutyExit>(2);
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let emitter = {
            let node = Arc::clone(&node);
            spawn_duty(Duty::Emitter, exit_tx.clone(), move || {
                run_emitter(&node, emit_stream, &stop_rx)
            })?
        };

        let receiver = {
            let node = Arc::clone(&node);
            spawn_duty(Duty::Receiver, exit_tx, move || {
                run_receiver(&node, recv_stream, console)
            })
        };
        let receiver = match receiver {
            Ok(handle) => handle,
            Err(e) => {
                drop(stop_tx);
                let _ = emitter.join();
                return Err(e);
            }
        };

        let first = supervise(&running, &exit_rx, &emitter, &receiver);

        // Orderly shutdown of whichever duty is still running
        drop(stop_tx);
        let _ = stream.shutdown(Shutdown::Both);
        let emitter_panicked = emitter.join().is_err();
        let receiver_panicked = receiver.join().is_err();

        match first {
            Some((duty, Err(e))) => {
                log::error!("Session {} failed: {}", duty, e);
                Err(e)
            }
            _ if emitter_panicked || receiver_panicked => Err(Error::ThreadPanic),
            Some((duty, Ok(()))) => {
                log::info!("Session {} finished", duty);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Wait for the first duty to exit or for shutdown to be requested
fn supervise(
    running: &AtomicBool,
    exit_rx: &Receiver<DutyExit>,
    emitter: &JoinHandle<()>,
    receiver: &JoinHandle<()>,
) -> Option<DutyExit> {
    loop {
        match exit_rx.recv_timeout(SUPERVISOR_POLL) {
            Ok(exit) => return Some(exit),
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::Relaxed) {
                    log::info!("Shutdown requested, stopping session");
                    return None;
                }
                // A duty that finished without reporting has panicked
                if emitter.is_finished() || receiver.is_finished() {
                    return exit_rx.try_recv().ok();
                }
            }
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

fn spawn_duty<F>(duty: Duty, exit_tx: Sender<DutyExit>, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    thread::Builder::new()
        .name(format!("node-{}", duty))
        .spawn(move || {
            let result = body();
            let _ = exit_tx.send((duty, result));
        })
        .map_err(|e| Error::Other(format!("Failed to spawn {}: {}", duty, e)))
}

/// Emit the local report, then wait one interval, until stopped or a send fails
fn run_emitter(node: &SensorNode, mut stream: TcpStream, stop: &Receiver<()>) -> Result<()> {
    log::debug!("Emitter started (interval {:?})", node.emit_interval());
    loop {
        let report = node.snapshot();
        write_report(&mut stream, &report)?;
        log::debug!("Emitted {}", report);

        match stop.recv_timeout(node.emit_interval()) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Emitter stopped");
                return Ok(());
            }
        }
    }
}

/// Apply every received report until the relay connection ends
fn run_receiver<W: Write>(node: &SensorNode, mut stream: TcpStream, mut console: W) -> Result<()> {
    log::debug!("Receiver started");
    loop {
        let Some(report) = read_report(&mut stream)? else {
            return Err(Error::Disconnected);
        };

        let action = node.handle_report(&report);
        log::debug!("Received {} -> {}", report, action);
        write_entry(&mut console, &report, &action)?;
    }
}
