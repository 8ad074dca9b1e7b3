//! # Protocol Configuration & Constants
//!
//! Every tunable in the ledger lives here. Protocol constants are plain
//! `const`s; the knobs a deployment is allowed to turn are gathered in
//! [`LedgerConfig`], which deserializes from the `[ledger]` table of the node
//! configuration file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Bumped whenever the canonical transaction byte layout changes. Signatures
/// made under one version never verify under another.
pub const PROTOCOL_VERSION: u16 = 1;

/// Bech32 human-readable prefix for party addresses.
pub const PARTY_HRP: &str = "party";

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// How long an issuance (or transfer) proposal stays committable after it is
/// built. Ten seconds is enough for two parties on a LAN to exchange
/// signatures and short enough that a stale proposal dies quickly.
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(10);

/// Upper bound on how long the initiator waits for all counterparties.
pub const DEFAULT_COUNTERPARTY_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Channel Capacities
// ---------------------------------------------------------------------------

/// Buffer size of the vault's commit broadcast. A subscriber that falls this
/// far behind skips ahead and gets a warning in the log.
pub const VAULT_EVENT_CAPACITY: usize = 256;

/// Bounded inbox of each responder task.
pub const RESPONDER_INBOX_CAPACITY: usize = 64;

/// Finished flows a tracker remembers before forgetting the oldest.
pub const FLOW_RETENTION: usize = 1024;

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Runtime configuration shared by builders and coordinators.
///
/// Durations are written as milliseconds in TOML (`time_window_ms = 10000`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Validity window attached to new proposals.
    pub time_window_ms: u64,
    /// Counterparty wait bound.
    pub counterparty_timeout_ms: u64,
    /// Responder inbox size.
    pub inbox_capacity: usize,
    /// Terminal flows kept per coordinator.
    pub flow_retention: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            time_window_ms: DEFAULT_TIME_WINDOW.as_millis() as u64,
            counterparty_timeout_ms: DEFAULT_COUNTERPARTY_TIMEOUT.as_millis() as u64,
            inbox_capacity: RESPONDER_INBOX_CAPACITY,
            flow_retention: FLOW_RETENTION,
        }
    }
}

impl LedgerConfig {
    pub fn time_window(&self) -> Duration {
        Duration::from_millis(self.time_window_ms)
    }

    pub fn counterparty_timeout(&self) -> Duration {
        Duration::from_millis(self.counterparty_timeout_ms)
    }

    /// Override the proposal window. Mostly for tests that want a proposal
    /// to expire without sleeping ten seconds.
    pub fn with_time_window(mut self, window: Duration) -> Self {
        self.time_window_ms = window.as_millis() as u64;
        self
    }

    pub fn with_counterparty_timeout(mut self, timeout: Duration) -> Self {
        self.counterparty_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
