//! Reachability checks for the remote endpoint.

use crate::config::NetworkConfig;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Decides whether the remote endpoint is reachable right now.
///
/// Implementations never fail: any internal error means "unavailable".
pub trait NetworkProbe: Send + Sync {
    /// Returns true if the remote endpoint is reachable.
    fn is_available(&self) -> bool;
}

/// Probes reachability with bounded TCP connects.
///
/// Two checks run in sequence, each bounded by the probe timeout: a
/// well-known external host, then the remote host and port. The first
/// failure returns `false` without retrying.
///
/// Name resolution counts against the timeout. Every resolved address is
/// tried in order until one connects or the time runs out.
#[derive(Debug, Clone)]
pub struct TcpNetworkChecker {
    config: NetworkConfig,
}

impl TcpNetworkChecker {
    /// Creates a checker.
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }

    fn probe(addr: &str, timeout: Duration) -> bool {
        let owned = addr.to_string();
        Self::probe_with(addr, timeout, move || {
            owned.to_socket_addrs().map(|addrs| addrs.collect())
        })
    }

    fn probe_with<F>(addr: &str, timeout: Duration, resolve: F) -> bool
    where
        F: FnOnce() -> io::Result<Vec<SocketAddr>> + Send + 'static,
    {
        let deadline = Instant::now() + timeout;
        let targets = match resolve_within(resolve, timeout) {
            Some(Ok(targets)) if !targets.is_empty() => targets,
            Some(Ok(_)) => {
                debug!(addr, "probe address resolved to nothing");
                return false;
            }
            Some(Err(e)) => {
                debug!(addr, error = %e, "probe address did not resolve");
                return false;
            }
            None => {
                debug!(addr, ?timeout, "probe address resolution timed out");
                return false;
            }
        };

        for target in &targets {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(addr, "probe timed out before every address was tried");
                return false;
            }
            match TcpStream::connect_timeout(target, remaining) {
                Ok(_) => return true,
                Err(e) => debug!(addr, %target, error = %e, "probe connect failed"),
            }
        }
        false
    }
}

/// Runs a blocking resolver on a helper thread and waits at most `timeout`.
///
/// A resolver that outlives the timeout finishes in the background and its
/// answer is dropped.
fn resolve_within<F>(resolve: F, timeout: Duration) -> Option<io::Result<Vec<SocketAddr>>>
where
    F: FnOnce() -> io::Result<Vec<SocketAddr>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("edusync-resolve".into())
        .spawn(move || {
            let _ = tx.send(resolve());
        });
    if let Err(e) = spawned {
        return Some(Err(e));
    }
    rx.recv_timeout(timeout).ok()
}

impl NetworkProbe for TcpNetworkChecker {
    fn is_available(&self) -> bool {
        let timeout = self.config.probe_timeout;
        if let Some(host) = &self.config.reachability_host {
            if !Self::probe(host, timeout) {
                return false;
            }
        }
        Self::probe(&self.config.remote_addr(), timeout)
    }
}

/// A probe with a fixed, switchable answer.
///
/// Counts how often it was asked.
#[derive(Debug)]
pub struct StaticNetworkProbe {
    available: AtomicBool,
    checks: AtomicU64,
}

impl StaticNetworkProbe {
    /// Creates a probe answering `available`.
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            checks: AtomicU64::new(0),
        }
    }

    /// Changes the answer.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns how many times the probe was asked.
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::SeqCst)
    }
}

impl NetworkProbe for StaticNetworkProbe {
    fn is_available(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.available.load(Ordering::SeqCst)
    }
}
