//! # VaultDb — Persistent Storage Engine
//!
//! The persistence layer for the vault daemon, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees", each an independent B+ tree
//! with its own keyspace:
//!
//! | Tree       | Key                | Value                      |
//! |------------|--------------------|----------------------------|
//! | `accounts` | principal (UTF-8)  | `bincode(PrincipalAccount)`|
//! | `events`   | `seq` (8B BE)      | `json(SequencedEvent)`     |
//! | `holdings` | holder (UTF-8)     | `bincode(u128)`            |
//! | `metadata` | key (UTF-8)        | `bincode(VaultMeta)`       |
//!
//! Event sequence numbers are stored as big-endian u64 so that sled's
//! lexicographic ordering matches numeric ordering — range scans over the
//! journal come out in publication order. Event values are JSON rather
//! than bincode because [`VaultEvent`] is an internally tagged enum, which
//! bincode cannot deserialize.
//!
//! ## Atomicity
//!
//! A snapshot write replaces the `accounts` tree and the metadata record
//! via per-tree batches, then flushes. The journal is append-only;
//! snapshots are idempotent full rewrites, so a crash between the two
//! leaves at worst a snapshot that the next save repairs.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sled::{Batch, Db, Tree};

use crate::ledger::account::PrincipalAccount;
use crate::ledger::engine::VaultSnapshot;
use crate::ledger::events::SequencedEvent;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the vault snapshot header.
const META_VAULT: &[u8] = b"vault_meta";

/// Everything in a [`VaultSnapshot`] except the account map, which has
/// its own tree.
#[derive(Debug, Serialize, Deserialize)]
struct VaultMeta {
    version: u32,
    total_shares: u128,
    reserve_ratio_bps: u32,
    min_deposit: u128,
    max_per_principal: u128,
    max_total_assets: u128,
    paused: bool,
    owner: String,
    rebalancer: Option<String>,
    next_event_seq: u64,
}

// ---------------------------------------------------------------------------
// VaultDb
// ---------------------------------------------------------------------------

/// Persistent storage engine for the vault daemon.
///
/// Wraps a sled `Db` instance and exposes typed accessors for the ledger
/// snapshot, the event journal, and the devnet asset holdings.
///
/// # Thread Safety
///
/// sled is inherently thread-safe — all trees support lock-free concurrent
/// reads and serialized writes. `VaultDb` can be shared across threads via
/// `Arc<VaultDb>` without external synchronization.
#[derive(Debug, Clone)]
pub struct VaultDb {
    /// The underlying sled database handle.
    db: Db,
    /// Principal accounts (snapshot body).
    accounts: Tree,
    /// Append-only event journal (big-endian u64 keys).
    events: Tree,
    /// Devnet asset ledger holdings.
    holdings: Tree,
    /// Snapshot header and other small records.
    metadata: Tree,
}

impl VaultDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is cleaned up on drop.
    ///
    /// Ideal for unit tests — no filesystem side effects, no cleanup.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let accounts = db.open_tree("accounts")?;
        let events = db.open_tree("events")?;
        let holdings = db.open_tree("holdings")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            accounts,
            events,
            holdings,
            metadata,
        })
    }

    // -- Snapshot operations ------------------------------------------------

    /// Persist a complete ledger snapshot, replacing any previous one.
    pub fn save_snapshot(&self, snapshot: &VaultSnapshot) -> DbResult<()> {
        let meta = VaultMeta {
            version: snapshot.version,
            total_shares: snapshot.total_shares,
            reserve_ratio_bps: snapshot.reserve_ratio_bps,
            min_deposit: snapshot.min_deposit,
            max_per_principal: snapshot.max_per_principal,
            max_total_assets: snapshot.max_total_assets,
            paused: snapshot.paused,
            owner: snapshot.owner.clone(),
            rebalancer: snapshot.rebalancer.clone(),
            next_event_seq: snapshot.next_event_seq,
        };
        let meta_bytes =
            bincode::serialize(&meta).map_err(|e| DbError::Serialization(e.to_string()))?;

        // Full rewrite of the accounts tree so deleted-in-memory state
        // can't resurrect (accounts are never deleted today, but the
        // snapshot contract shouldn't depend on that).
        self.accounts.clear()?;
        let mut batch = Batch::default();
        for (principal, account) in &snapshot.accounts {
            let bytes = bincode::serialize(account)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            batch.insert(principal.as_bytes(), bytes);
        }
        self.accounts.apply_batch(batch)?;

        self.metadata.insert(META_VAULT, meta_bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Load the persisted ledger snapshot, if one exists.
    pub fn load_snapshot(&self) -> DbResult<Option<VaultSnapshot>> {
        let Some(meta_bytes) = self.metadata.get(META_VAULT)? else {
            return Ok(None);
        };
        let meta: VaultMeta = bincode::deserialize(&meta_bytes)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let mut accounts = HashMap::new();
        for result in self.accounts.iter() {
            let (key, value) = result?;
            let principal = String::from_utf8(key.to_vec())
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            let account: PrincipalAccount = bincode::deserialize(&value)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            accounts.insert(principal, account);
        }

        Ok(Some(VaultSnapshot {
            version: meta.version,
            total_shares: meta.total_shares,
            accounts,
            reserve_ratio_bps: meta.reserve_ratio_bps,
            min_deposit: meta.min_deposit,
            max_per_principal: meta.max_per_principal,
            max_total_assets: meta.max_total_assets,
            paused: meta.paused,
            owner: meta.owner,
            rebalancer: meta.rebalancer,
            next_event_seq: meta.next_event_seq,
        }))
    }

    // -- Event journal ------------------------------------------------------

    /// Append events to the journal. Idempotent per sequence number —
    /// re-appending an already-journaled event overwrites it in place.
    pub fn append_events(&self, events: &[SequencedEvent]) -> DbResult<()> {
        let mut batch = Batch::default();
        for event in events {
            let bytes = serde_json::to_vec(event)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            batch.insert(&event.seq.to_be_bytes(), bytes);
        }
        self.events.apply_batch(batch)?;
        Ok(())
    }

    /// Journaled events with sequence number >= `seq`, in order.
    pub fn events_since(&self, seq: u64) -> DbResult<Vec<SequencedEvent>> {
        let mut out = Vec::new();
        for result in self.events.range(seq.to_be_bytes()..) {
            let (_key, value) = result?;
            let event: SequencedEvent = serde_json::from_slice(&value)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            out.push(event);
        }
        Ok(out)
    }

    /// Number of journaled events.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    // -- Devnet holdings ----------------------------------------------------

    /// Persist the full devnet asset ledger.
    pub fn save_holdings(&self, holdings: &[(String, u128)]) -> DbResult<()> {
        self.holdings.clear()?;
        let mut batch = Batch::default();
        for (holder, amount) in holdings {
            let bytes = bincode::serialize(amount)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            batch.insert(holder.as_bytes(), bytes);
        }
        self.holdings.apply_batch(batch)?;
        Ok(())
    }

    /// All persisted holdings as `(holder, balance)` pairs.
    pub fn load_holdings(&self) -> DbResult<Vec<(String, u128)>> {
        let mut out = Vec::new();
        for result in self.holdings.iter() {
            let (key, value) = result?;
            let holder = String::from_utf8(key.to_vec())
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            let amount: u128 = bincode::deserialize(&value)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            out.push((holder, amount));
        }
        Ok(out)
    }

    // -- Utility ------------------------------------------------------------

    /// Number of persisted principal accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LEDGER_VERSION;
    use crate::ledger::events::VaultEvent;
    use chrono::Utc;

    fn sample_snapshot() -> VaultSnapshot {
        let mut accounts = HashMap::new();
        accounts.insert(
            "alice".to_string(),
            PrincipalAccount {
                share_balance: 800,
                cumulative_deposited: 1_000,
                cumulative_withdrawn: 200,
                last_action: Utc::now(),
            },
        );
        accounts.insert("bob".to_string(), PrincipalAccount::new());

        VaultSnapshot {
            version: LEDGER_VERSION,
            total_shares: 800,
            accounts,
            reserve_ratio_bps: 1_000,
            min_deposit: 10,
            max_per_principal: 1_000_000,
            max_total_assets: 10_000_000,
            paused: false,
            owner: "owner".to_string(),
            rebalancer: Some("keeper".to_string()),
            next_event_seq: 3,
        }
    }

    fn sample_event(seq: u64) -> SequencedEvent {
        SequencedEvent {
            seq,
            event: VaultEvent::Deposited {
                principal: "alice".to_string(),
                assets: 1_000,
                shares: 1_000,
                timestamp: Utc::now(),
            },
        }
    }

    #[test]
    fn open_temporary_database() {
        let db = VaultDb::open_temporary().expect("should create temp db");
        assert_eq!(db.account_count(), 0);
        assert_eq!(db.event_count(), 0);
        assert!(db.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn snapshot_roundtrip() {
        let db = VaultDb::open_temporary().unwrap();
        let snapshot = sample_snapshot();

        db.save_snapshot(&snapshot).unwrap();
        let loaded = db.load_snapshot().unwrap().expect("snapshot exists");

        assert_eq!(loaded.version, LEDGER_VERSION);
        assert_eq!(loaded.total_shares, 800);
        assert_eq!(loaded.accounts["alice"].share_balance, 800);
        assert_eq!(loaded.accounts["bob"].share_balance, 0);
        assert_eq!(loaded.rebalancer, Some("keeper".to_string()));
        assert_eq!(loaded.next_event_seq, 3);
        assert_eq!(db.account_count(), 2);
    }

    #[test]
    fn snapshot_save_replaces_previous() {
        let db = VaultDb::open_temporary().unwrap();
        db.save_snapshot(&sample_snapshot()).unwrap();

        let mut second = sample_snapshot();
        second.accounts.remove("bob");
        second.paused = true;
        db.save_snapshot(&second).unwrap();

        let loaded = db.load_snapshot().unwrap().unwrap();
        assert!(loaded.paused);
        // Bob's stale record did not survive the rewrite.
        assert!(!loaded.accounts.contains_key("bob"));
        assert_eq!(db.account_count(), 1);
    }

    #[test]
    fn snapshot_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = VaultDb::open(dir.path()).unwrap();
            db.save_snapshot(&sample_snapshot()).unwrap();
        }
        let db = VaultDb::open(dir.path()).unwrap();
        let loaded = db.load_snapshot().unwrap().expect("snapshot survives");
        assert_eq!(loaded.total_shares, 800);
    }

    #[test]
    fn event_journal_appends_and_ranges() {
        let db = VaultDb::open_temporary().unwrap();
        let events: Vec<_> = (0..5).map(sample_event).collect();
        db.append_events(&events).unwrap();

        assert_eq!(db.event_count(), 5);

        let all = db.events_since(0).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].seq, 0);
        assert_eq!(all[4].seq, 4);

        let tail = db.events_since(3).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].seq, 3);

        assert!(db.events_since(100).unwrap().is_empty());
    }

    #[test]
    fn event_journal_ordering_survives_large_sequences() {
        let db = VaultDb::open_temporary().unwrap();
        // Big-endian keys keep numeric order past one byte.
        db.append_events(&[sample_event(255), sample_event(256), sample_event(300)])
            .unwrap();

        let all = db.events_since(0).unwrap();
        let seqs: Vec<u64> = all.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![255, 256, 300]);
    }

    #[test]
    fn reappending_an_event_is_idempotent() {
        let db = VaultDb::open_temporary().unwrap();
        db.append_events(&[sample_event(1)]).unwrap();
        db.append_events(&[sample_event(1)]).unwrap();
        assert_eq!(db.event_count(), 1);
    }

    #[test]
    fn holdings_roundtrip() {
        let db = VaultDb::open_temporary().unwrap();
        let holdings = vec![
            ("alice".to_string(), 1_000u128),
            ("vault".to_string(), 10u128.pow(24)),
        ];
        db.save_holdings(&holdings).unwrap();

        let mut loaded = db.load_holdings().unwrap();
        loaded.sort();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], ("alice".to_string(), 1_000));
        // u128 amounts past u64::MAX survive the encoding.
        assert_eq!(loaded[1], ("vault".to_string(), 10u128.pow(24)));
    }

    #[test]
    fn save_holdings_replaces_previous() {
        let db = VaultDb::open_temporary().unwrap();
        db.save_holdings(&[("alice".to_string(), 5)]).unwrap();
        db.save_holdings(&[("bob".to_string(), 7)]).unwrap();

        let loaded = db.load_holdings().unwrap();
        assert_eq!(loaded, vec![("bob".to_string(), 7)]);
    }

    #[test]
    fn flush_does_not_error() {
        let db = VaultDb::open_temporary().unwrap();
        db.save_snapshot(&sample_snapshot()).unwrap();
        db.flush().expect("flush should succeed");
    }
}
