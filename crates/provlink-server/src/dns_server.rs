//! Captive-portal DNS hijack service.
//!
//! A UDP listener that answers every incoming query with the configured
//! redirect address; this is what triggers the captive-portal prompt on
//! client devices. The receive loop never blocks the scheduler: each tick
//! attempts a non-blocking receive and otherwise yields for the poll tick.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use provlink_protocol::dns::hijack_response;

const MAX_DATAGRAM: usize = 512;

/// Outcome of one non-blocking receive attempt.
enum Recv {
    Datagram(usize, SocketAddr),
    WouldBlock,
}

/// DNS hijack responder.
///
/// `start` binds the socket and spawns the responder task; `stop` is
/// idempotent and safe to call when the server was never started. The
/// connectivity state machine starts this service when entering AP mode
/// and stops it when leaving.
pub struct DnsHijackServer {
    port: u16,
    ttl_secs: u32,
    poll_tick: Duration,
    local_addr: Option<SocketAddr>,
    task: Option<JoinHandle<()>>,
}

impl DnsHijackServer {
    /// Create a stopped responder. `port` 0 binds an ephemeral port
    /// (used by tests; real deployments use 53).
    pub fn new(port: u16, ttl_secs: u32, poll_tick: Duration) -> Self {
        Self {
            port,
            ttl_secs,
            poll_tick,
            local_addr: None,
            task: None,
        }
    }

    /// Bind the UDP socket and start answering queries with `redirect`.
    ///
    /// Starting an already-running server is a no-op.
    pub async fn start(&mut self, redirect: Ipv4Addr) -> io::Result<()> {
        if self.task.is_some() {
            return Ok(());
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port)).await?;
        let local_addr = socket.local_addr()?;
        self.local_addr = Some(local_addr);
        info!(
            "DNS hijack responder on {} (redirecting all queries to {})",
            local_addr, redirect
        );

        let ttl_secs = self.ttl_secs;
        let poll_tick = self.poll_tick;
        self.task = Some(tokio::spawn(async move {
            run_responder(socket, redirect, ttl_secs, poll_tick).await;
        }));
        Ok(())
    }

    /// Stop the responder. Idempotent; a no-op if never started.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.local_addr = None;
            info!("DNS hijack responder stopped");
        }
    }

    /// Whether the responder task is running.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Bound address while running (tests bind port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for DnsHijackServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_responder(socket: UdpSocket, redirect: Ipv4Addr, ttl_secs: u32, poll_tick: Duration) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        match try_recv(&socket, &mut buf) {
            Ok(Recv::Datagram(len, peer)) => {
                // Malformed queries produce no response; the loop continues.
                match hijack_response(&buf[..len], redirect, ttl_secs) {
                    Some(response) => {
                        if let Err(err) = socket.send_to(&response, peer).await {
                            warn!("DNS send to {} failed: {}", peer, err);
                        } else {
                            debug!("DNS query from {} answered with {}", peer, redirect);
                        }
                    }
                    None => debug!("ignoring malformed DNS datagram from {}", peer),
                }
            }
            Ok(Recv::WouldBlock) => {
                tokio::time::sleep(poll_tick).await;
            }
            Err(err) => {
                warn!("DNS receive error: {}", err);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn try_recv(socket: &UdpSocket, buf: &mut [u8]) -> io::Result<Recv> {
    match socket.try_recv_from(buf) {
        Ok((len, peer)) => Ok(Recv::Datagram(len, peer)),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(Recv::WouldBlock),
        Err(err) => Err(err),
    }
}
