//! Single-address reachability probes and their outcome taxonomy.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use surge_ping::{Client, Config, IcmpPacket, PingIdentifier, PingSequence, SurgeError};

/// Echo payload sent with every probe, mirroring the classic 56-byte ping.
const PAYLOAD: [u8; 56] = [0; 56];

/// What a single probe observed for one address.
///
/// Exactly one variant per address, by construction. Faults at the network
/// layer are data here, not errors: a timed-out or unreachable host is a
/// perfectly valid survey result.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// An echo reply arrived within the deadline.
    Reply { latency_ms: f64 },
    /// No reply before the deadline expired.
    Timeout,
    /// The network stack reported the destination unreachable, distinct
    /// from simply never hearing back.
    Unreachable,
    /// Issuing the probe itself failed (permissions, resource exhaustion).
    Failed { message: String },
}

/// One reachability check against one address with a bounded wait.
///
/// Implementations never propagate errors past this boundary; every fault
/// folds into [`ProbeOutcome::Failed`].
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, addr: Ipv4Addr) -> ProbeOutcome;
}

/// ICMP echo prober backed by one shared [`surge_ping::Client`].
///
/// The client multiplexes replies from a single raw socket, so every worker
/// can probe concurrently through the same instance.
pub struct IcmpProber {
    client: Client,
    ident: PingIdentifier,
    timeout: Duration,
}

impl IcmpProber {
    /// Opens the raw ICMP socket. Requires CAP_NET_RAW or root.
    pub fn new(timeout: Duration) -> io::Result<Self> {
        let client = Client::new(&Config::default())?;
        Ok(Self {
            client,
            // Stable per process; replies are matched on (address, ident).
            ident: PingIdentifier(std::process::id() as u16),
            timeout,
        })
    }
}

#[async_trait]
impl Probe for IcmpProber {
    async fn probe(&self, addr: Ipv4Addr) -> ProbeOutcome {
        let mut pinger = self.client.pinger(IpAddr::V4(addr), self.ident).await;
        pinger.timeout(self.timeout);
        let outcome = classify(pinger.ping(PingSequence(0), &PAYLOAD).await);
        debug!("probe {addr} -> {outcome:?}");
        outcome
    }
}

/// Folds the raw ping result into the outcome taxonomy.
fn classify(result: Result<(IcmpPacket, Duration), SurgeError>) -> ProbeOutcome {
    match result {
        Ok((_, rtt)) => ProbeOutcome::Reply {
            latency_ms: rtt.as_secs_f64() * 1000.0,
        },
        Err(SurgeError::Timeout { .. }) => ProbeOutcome::Timeout,
        Err(SurgeError::IOError(err)) if is_unreachable(&err) => ProbeOutcome::Unreachable,
        Err(err) => ProbeOutcome::Failed {
            message: err.to_string(),
        },
    }
}

fn is_unreachable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::AddrNotAvailable
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_timeout() {
        let outcome = classify(Err(SurgeError::Timeout {
            seq: PingSequence(0),
        }));
        assert_eq!(outcome, ProbeOutcome::Timeout);
    }

    #[test]
    fn unreachable_io_error_maps_to_unreachable() {
        for kind in [
            io::ErrorKind::HostUnreachable,
            io::ErrorKind::NetworkUnreachable,
            io::ErrorKind::AddrNotAvailable,
        ] {
            let outcome = classify(Err(SurgeError::IOError(io::Error::from(kind))));
            assert_eq!(outcome, ProbeOutcome::Unreachable);
        }
    }

    #[test]
    fn other_io_error_maps_to_failed() {
        let outcome = classify(Err(SurgeError::IOError(io::Error::from(
            io::ErrorKind::PermissionDenied,
        ))));
        let ProbeOutcome::Failed { message } = outcome else {
            panic!("expected Failed");
        };
        assert!(!message.is_empty());
    }
}
