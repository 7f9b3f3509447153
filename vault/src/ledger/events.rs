//! # Vault Event Log
//!
//! Every state-changing operation records a [`VaultEvent`]. Events are the
//! audit trail the UI and any off-vault indexer consume: who deposited
//! what, what a rebalance moved, when the owner pulled the pause lever.
//!
//! The in-memory [`EventLog`] is a bounded ring with dense, monotonically
//! increasing sequence numbers. Eviction only drops events from memory —
//! the daemon journals every event to the persistent store before old ones
//! roll off, and `since(seq)` is how pollers page through them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EVENT_LOG_CAPACITY;

// ---------------------------------------------------------------------------
// VaultEvent
// ---------------------------------------------------------------------------

/// A state-changing vault operation, as seen by observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VaultEvent {
    /// A deposit was accepted and shares were minted.
    #[serde(rename = "deposited")]
    Deposited {
        principal: String,
        assets: u128,
        shares: u128,
        timestamp: DateTime<Utc>,
    },

    /// Shares were burned and assets paid out.
    #[serde(rename = "withdrawn")]
    Withdrawn {
        principal: String,
        shares: u128,
        assets: u128,
        timestamp: DateTime<Utc>,
    },

    /// Assets moved between the reserve and the strategy. At most one of
    /// `pulled`/`pushed` is non-zero; both zero means the reserve was
    /// already inside the band.
    #[serde(rename = "rebalanced")]
    Rebalanced {
        pulled: u128,
        pushed: u128,
        reserve_after: u128,
        timestamp: DateTime<Utc>,
    },

    /// The owner paused the vault.
    #[serde(rename = "paused")]
    Paused { by: String, timestamp: DateTime<Utc> },

    /// The owner unpaused the vault.
    #[serde(rename = "unpaused")]
    Unpaused { by: String, timestamp: DateTime<Utc> },

    /// Deposit ceilings were changed.
    #[serde(rename = "limits_updated")]
    LimitsUpdated {
        max_per_principal: u128,
        max_total_assets: u128,
        timestamp: DateTime<Utc>,
    },

    /// The delegated rebalancer was set or cleared.
    #[serde(rename = "rebalancer_updated")]
    RebalancerUpdated {
        rebalancer: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The owner swept an asset out of the vault.
    #[serde(rename = "emergency_sweep")]
    EmergencySweep {
        symbol: String,
        amount: u128,
        to: String,
        timestamp: DateTime<Utc>,
    },
}

/// An event paired with its log sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// Dense, monotonically increasing position in the log. Never reused.
    pub seq: u64,
    /// The event itself.
    pub event: VaultEvent,
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Bounded in-memory ring of recent events.
#[derive(Debug, Clone)]
pub struct EventLog {
    ring: VecDeque<SequencedEvent>,
    capacity: usize,
    next_seq: u64,
}

impl EventLog {
    /// Creates an empty log with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }

    /// Creates an empty log holding at most `capacity` events in memory.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Resumes sequence numbering after a restart so journal positions
    /// stay unique across process lifetimes.
    pub fn resume_from(&mut self, next_seq: u64) {
        self.next_seq = next_seq;
    }

    /// Appends an event, evicting the oldest if the ring is full.
    /// Returns the assigned sequence number.
    pub fn record(&mut self, event: VaultEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(SequencedEvent { seq, event });
        seq
    }

    /// Events with sequence number >= `seq`, oldest first. Events already
    /// evicted from memory are served by the persistent journal instead.
    pub fn since(&self, seq: u64) -> Vec<SequencedEvent> {
        self.ring.iter().filter(|e| e.seq >= seq).cloned().collect()
    }

    /// The `n` most recent events, oldest first.
    pub fn latest(&self, n: usize) -> Vec<SequencedEvent> {
        let skip = self.ring.len().saturating_sub(n);
        self.ring.iter().skip(skip).cloned().collect()
    }

    /// The sequence number the next recorded event will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Number of events currently held in memory.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` if no events are held in memory.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit_event(principal: &str, assets: u128) -> VaultEvent {
        VaultEvent::Deposited {
            principal: principal.into(),
            assets,
            shares: assets,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn record_assigns_dense_sequence_numbers() {
        let mut log = EventLog::new();
        assert_eq!(log.record(deposit_event("alice", 100)), 0);
        assert_eq!(log.record(deposit_event("bob", 200)), 1);
        assert_eq!(log.record(deposit_event("carol", 300)), 2);
        assert_eq!(log.next_seq(), 3);
    }

    #[test]
    fn ring_evicts_oldest_but_keeps_numbering() {
        let mut log = EventLog::with_capacity(2);
        log.record(deposit_event("a", 1));
        log.record(deposit_event("b", 2));
        log.record(deposit_event("c", 3));

        assert_eq!(log.len(), 2);
        let remaining = log.since(0);
        assert_eq!(remaining[0].seq, 1);
        assert_eq!(remaining[1].seq, 2);
        // Numbering keeps climbing past evictions.
        assert_eq!(log.next_seq(), 3);
    }

    #[test]
    fn since_filters_by_sequence() {
        let mut log = EventLog::new();
        for i in 0..5u128 {
            log.record(deposit_event("alice", i));
        }

        let tail = log.since(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].seq, 3);
        assert_eq!(tail[1].seq, 4);

        assert!(log.since(100).is_empty());
    }

    #[test]
    fn latest_returns_most_recent_in_order() {
        let mut log = EventLog::new();
        for i in 0..5u128 {
            log.record(deposit_event("alice", i));
        }

        let last_two = log.latest(2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].seq, 3);
        assert_eq!(last_two[1].seq, 4);

        // Asking for more than exists returns everything.
        assert_eq!(log.latest(100).len(), 5);
    }

    #[test]
    fn resume_from_continues_numbering() {
        let mut log = EventLog::new();
        log.resume_from(500);
        assert_eq!(log.record(deposit_event("alice", 1)), 500);
    }

    #[test]
    fn event_serialization_is_tagged() {
        let event = VaultEvent::Rebalanced {
            pulled: 0,
            pushed: 720,
            reserve_after: 80,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "rebalanced");
        assert_eq!(json["pushed"], 720);

        let recovered: VaultEvent = serde_json::from_value(json).expect("deserialize");
        assert!(matches!(
            recovered,
            VaultEvent::Rebalanced { pushed: 720, .. }
        ));
    }

    #[test]
    fn sequenced_event_roundtrips_through_json() {
        // The journal stores events as JSON: internally tagged enums do
        // not survive bincode.
        let mut log = EventLog::new();
        log.record(deposit_event("alice", 42));
        let event = &log.since(0)[0];

        let bytes = serde_json::to_vec(event).expect("encode");
        let recovered: SequencedEvent = serde_json::from_slice(&bytes).expect("decode");
        assert_eq!(recovered.seq, 0);
        assert!(matches!(
            recovered.event,
            VaultEvent::Deposited { assets: 42, .. }
        ));
    }
}
