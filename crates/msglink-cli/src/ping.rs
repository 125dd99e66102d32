//! Round-trip latency check against an echo peer

use crate::message::ChatMessage;
use anyhow::{bail, Context, Result};
use msglink::{Connection, ConnectionConfig, LinkEvent, StateChange};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a ping run
#[derive(Debug, Default)]
pub struct PingSummary {
    /// Pings sent
    pub sent: u64,
    /// Round-trip time of each answered ping
    pub rtts: Vec<Duration>,
}

impl PingSummary {
    /// Number of answered pings
    pub fn received(&self) -> u64 {
        self.rtts.len() as u64
    }

    /// Fastest round trip
    pub fn min(&self) -> Option<Duration> {
        self.rtts.iter().min().copied()
    }

    /// Slowest round trip
    pub fn max(&self) -> Option<Duration> {
        self.rtts.iter().max().copied()
    }

    /// Mean round trip
    pub fn average(&self) -> Option<Duration> {
        if self.rtts.is_empty() {
            return None;
        }
        Some(self.rtts.iter().sum::<Duration>() / self.rtts.len() as u32)
    }
}

/// Send `count` numbered pings and wait up to `timeout` for each echo
pub fn run(config: ConnectionConfig, count: u64, timeout: Duration) -> Result<PingSummary> {
    let target = config.target();
    let (conn, events) = Connection::<ChatMessage>::channel(config);
    conn.connect()
        .with_context(|| format!("Failed to connect to {}", target))?;

    let mut summary = PingSummary::default();
    for seq in 1..=count {
        let started = Instant::now();
        conn.send(&ChatMessage::Ping { seq: Some(seq) })?;
        summary.sent += 1;

        match wait_for_echo(&events, seq, started, timeout)? {
            Some(rtt) => {
                println!("reply from {}: seq={} time={:.3} ms", target, seq, millis(rtt));
                summary.rtts.push(rtt);
            }
            None => println!("request timeout for seq={}", seq),
        }
    }
    conn.disconnect();

    println!(
        "{} sent, {} received, {:.1}% loss",
        summary.sent,
        summary.received(),
        loss_percent(&summary)
    );
    if let (Some(min), Some(avg), Some(max)) = (summary.min(), summary.average(), summary.max()) {
        println!(
            "rtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
            millis(min),
            millis(avg),
            millis(max)
        );
    }

    if summary.sent > 0 && summary.rtts.is_empty() {
        bail!("No replies from {}", target);
    }
    Ok(summary)
}

/// Wait for the echo of ping `seq` sent at `sent_at`; `None` on timeout
fn wait_for_echo(
    events: &mpsc::Receiver<LinkEvent<ChatMessage>>,
    seq: u64,
    sent_at: Instant,
    timeout: Duration,
) -> Result<Option<Duration>> {
    let deadline = sent_at + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(LinkEvent::Message(Ok(ChatMessage::Ping { seq: Some(got) }))) if got == seq => {
                return Ok(Some(sent_at.elapsed()));
            }
            Ok(LinkEvent::Message(Ok(other))) => debug!("Ignoring {}", other),
            Ok(LinkEvent::Message(Err(e))) => warn!("Unreadable reply: {}", e),
            Ok(LinkEvent::State(StateChange::Disconnected(reason))) => {
                bail!("Connection lost: {}", reason)
            }
            Ok(LinkEvent::State(StateChange::Connected { .. })) => {}
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => bail!("Event channel closed"),
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn loss_percent(summary: &PingSummary) -> f64 {
    if summary.sent == 0 {
        return 0.0;
    }
    (summary.sent - summary.received()) as f64 * 100.0 / summary.sent as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn spawn_peer<F>(peer: F) -> u16
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            peer(stream);
        });
        port
    }

    fn config(port: u16) -> ConnectionConfig {
        ConnectionConfig::new(&format!("127.0.0.1:{}", port)).unwrap()
    }

    #[test]
    fn test_pings_through_echo_peer() {
        let port = spawn_peer(|mut stream| {
            let mut reader = stream.try_clone().unwrap();
            std::io::copy(&mut reader, &mut stream).ok();
        });

        let summary = run(config(port), 3, Duration::from_secs(5)).unwrap();
        assert_eq!(summary.sent, 3);
        assert_eq!(summary.received(), 3);
        assert!(summary.min() <= summary.average());
        assert!(summary.average() <= summary.max());
    }

    #[test]
    fn test_silent_peer_times_out() {
        let port = spawn_peer(|mut stream| {
            let mut sink = [0u8; 64];
            while matches!(stream.read(&mut sink), Ok(n) if n > 0) {}
        });

        let err = run(config(port), 1, Duration::from_millis(100)).unwrap_err();
        assert!(err.to_string().contains("No replies"));
    }

    #[test]
    fn test_peer_closing_aborts() {
        let port = spawn_peer(|mut stream| {
            let mut header = [0u8; 4];
            stream.read_exact(&mut header).ok();
        });

        let err = run(config(port), 2, Duration::from_secs(5)).unwrap_err();
        assert!(err.to_string().contains("Connection lost"));
    }

    #[test]
    fn test_summary_stats() {
        let summary = PingSummary {
            sent: 4,
            rtts: vec![Duration::from_millis(2), Duration::from_millis(4), Duration::from_millis(6)],
        };
        assert_eq!(summary.received(), 3);
        assert_eq!(summary.min(), Some(Duration::from_millis(2)));
        assert_eq!(summary.max(), Some(Duration::from_millis(6)));
        assert_eq!(summary.average(), Some(Duration::from_millis(4)));
        assert_eq!(loss_percent(&summary), 25.0);
        assert_eq!(PingSummary::default().average(), None);
    }
}
