//! Connection statistics and heartbeat messages.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::time::Instant;

use super::logging::NOTICE;

/// Counters are cleared this often.
pub const RESET_COUNTERS: Duration = Duration::from_secs(24 * 60 * 60);

/// What a single heartbeat reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSummary {
    pub uptime: Duration,
    /// Whole hours covered by the connection counters.
    pub window_hours: u64,
    pub connections: u64,
    pub unique_addresses: usize,
    pub counters_reset: bool,
}

impl HeartbeatSummary {
    /// Uptime split into (days, hours, minutes).
    pub fn uptime_parts(&self) -> (u64, u64, u64) {
        let secs = self.uptime.as_secs();
        (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60)
    }
}

/// Uptime and connection bookkeeping shared by the network layer and the
/// heartbeat timer.
#[derive(Debug)]
pub struct Status {
    started: Instant,
    last_reset: Instant,
    connections: u64,
    addresses: HashSet<IpAddr>,
    heartbeats: u64,
}

impl Status {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            started: now,
            last_reset: now,
            connections: 0,
            addresses: HashSet::new(),
            heartbeats: 0,
        }
    }

    /// Record an accepted connection from `peer`.
    pub fn note_connection(&mut self, peer: SocketAddr) {
        self.addresses.insert(peer.ip());
        self.connections += 1;
    }

    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub fn unique_addresses(&self) -> usize {
        self.addresses.len()
    }

    /// Heartbeats logged so far.
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    /// Log the heartbeat summary for the current time.
    pub fn log_heartbeat(&mut self) -> HeartbeatSummary {
        self.heartbeat_at(Instant::now())
    }

    pub fn heartbeat_at(&mut self, now: Instant) -> HeartbeatSummary {
        self.heartbeats += 1;
        let since_reset = now.saturating_duration_since(self.last_reset);
        let mut beat = HeartbeatSummary {
            uptime: now.saturating_duration_since(self.started),
            window_hours: since_reset.as_secs() / 3_600,
            connections: self.connections,
            unique_addresses: self.addresses.len(),
            counters_reset: false,
        };

        let (days, hours, minutes) = beat.uptime_parts();
        tracing::info!(target: NOTICE, days, hours, minutes, "Heartbeat: uptime is {days} day(s), {hours} hour(s), and {minutes} minute(s)");

        if beat.unique_addresses > 0 {
            tracing::info!(
                target: NOTICE,
                window_hours = beat.window_hours,
                connections = beat.connections,
                unique_addresses = beat.unique_addresses,
                "Heartbeat: during the last {} hour(s) we saw {} connection(s) from {} unique address(es)",
                beat.window_hours,
                beat.connections,
                beat.unique_addresses
            );
        }

        if since_reset >= RESET_COUNTERS {
            tracing::debug!("Resetting connection counters");
            self.clear();
            self.last_reset += RESET_COUNTERS;
            beat.counters_reset = true;
        }

        beat
    }

    /// Drop the connection counters; used at teardown.
    pub fn connections_cleanup(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.connections = 0;
        self.addresses.clear();
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}
