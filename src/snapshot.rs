//! Point-in-time raffle state read through the contract's view functions.
//!
//! One snapshot is built from a single batched, non-committing execution of
//! the six view calls, so all fields observe the same ledger state. Across
//! different raffles there is no such guarantee; each may reflect a
//! different ledger height.

use crate::config::{CONTRACT_MODULE, ENTRY_FEE};
use crate::decode;
use crate::ledger::{Address, CallArg, InspectionResult, Ledger, ObjectId, TransactionPlan};
use color_eyre::eyre::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a cached snapshot short-circuits repeat reads.
pub const SNAPSHOT_CACHE_TTL: Duration = Duration::from_secs(300);

/// The view functions issued per snapshot, in positional order.
const VIEW_FUNCTIONS: [&str; 6] = [
    "get_entrant_count",
    "get_pool_value",
    "is_open",
    "get_owner",
    "has_winner",
    "get_winner",
];

/// Read-only projection of one on-chain raffle at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RaffleSnapshot {
    pub id: ObjectId,
    pub owner: Address,
    pub entry_fee: u64,
    pub pool_value: u64,
    pub entrant_count: u64,
    /// Best-effort; filled by [`SnapshotReader::entrants`], not by `fetch`.
    pub entrants: Vec<Address>,
    pub is_open: bool,
    pub has_winner: bool,
    pub winner: Option<Address>,
}

struct CachedSnapshot {
    snapshot: RaffleSnapshot,
    fetched_at: Instant,
}

/// Builds [`RaffleSnapshot`]s against one ledger, with a time-boxed
/// per-raffle cache local to this instance.
pub struct SnapshotReader<L> {
    ledger: L,
    package: ObjectId,
    cache: Mutex<HashMap<ObjectId, CachedSnapshot>>,
}

impl<L: Ledger> SnapshotReader<L> {
    pub fn new(ledger: L, package: ObjectId) -> Self {
        Self {
            ledger,
            package,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the current state of one raffle. `Ok(None)` when the object no
    /// longer exists (or cannot be probed) — a vanished object is a normal
    /// transient state, not an application error.
    pub async fn fetch(&self, raffle_id: &ObjectId) -> Result<Option<RaffleSnapshot>> {
        if let Some(snapshot) = self.cached(raffle_id) {
            return Ok(Some(snapshot));
        }

        match self.ledger.object_exists(raffle_id).await {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(err) => {
                warn!(%raffle_id, "existence probe failed: {err}");
                return Ok(None);
            }
        }

        let plan = self.view_plan(raffle_id);
        let inspection = self.ledger.inspect(&plan).await?;
        let snapshot = decode_snapshot(*raffle_id, &inspection);
        self.store(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Best-effort entrant list via `get_entrants`; empty when the return
    /// value cannot be decoded.
    pub async fn entrants(&self, raffle_id: &ObjectId) -> Result<Vec<Address>> {
        let mut plan = TransactionPlan::new();
        plan.move_call(
            self.package,
            CONTRACT_MODULE,
            "get_entrants",
            vec![CallArg::Object { id: *raffle_id }],
        );
        let inspection = self.ledger.inspect(&plan).await?;
        let entrants = inspection
            .results
            .first()
            .and_then(|result| result.return_values.first())
            .and_then(|bytes| decode::decode_address_vec(bytes))
            .unwrap_or_default();
        Ok(entrants)
    }

    /// Drop the cached snapshot for a raffle, forcing the next read to hit
    /// the ledger. Called after the raffle is known to have changed.
    pub fn invalidate(&self, raffle_id: &ObjectId) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(raffle_id);
        }
    }

    fn cached(&self, raffle_id: &ObjectId) -> Option<RaffleSnapshot> {
        let cache = self.cache.lock().ok()?;
        let entry = cache.get(raffle_id)?;
        if entry.fetched_at.elapsed() < SNAPSHOT_CACHE_TTL {
            debug!(%raffle_id, "snapshot served from cache");
            Some(entry.snapshot.clone())
        } else {
            None
        }
    }

    fn store(&self, snapshot: RaffleSnapshot) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                snapshot.id,
                CachedSnapshot {
                    snapshot,
                    fetched_at: Instant::now(),
                },
            );
        }
    }

    fn view_plan(&self, raffle_id: &ObjectId) -> TransactionPlan {
        let mut plan = TransactionPlan::new();
        for function in VIEW_FUNCTIONS {
            plan.move_call(
                self.package,
                CONTRACT_MODULE,
                function,
                vec![CallArg::Object { id: *raffle_id }],
            );
        }
        plan
    }
}

/// Decode the positional view returns. A field whose bytes cannot be decoded
/// falls back to a safe default; partial failure never aborts the snapshot.
fn decode_snapshot(id: ObjectId, inspection: &InspectionResult) -> RaffleSnapshot {
    let value = |index: usize| {
        inspection
            .results
            .get(index)
            .and_then(|result| result.return_values.first())
            .map(Vec::as_slice)
    };

    let entrant_count = value(0).and_then(decode::decode_u64_le).unwrap_or(0);
    let pool_value = value(1).and_then(decode::decode_u64_le).unwrap_or(0);
    let is_open = value(2).and_then(decode::decode_bool).unwrap_or(true);
    let owner = value(3).and_then(decode::decode_address).unwrap_or_default();
    let has_winner = value(4).and_then(decode::decode_bool).unwrap_or(false);
    let winner = if has_winner {
        value(5).and_then(decode::decode_option_address).flatten()
    } else {
        None
    };

    RaffleSnapshot {
        id,
        owner,
        entry_fee: ENTRY_FEE,
        pool_value,
        entrant_count,
        entrants: Vec::new(),
        is_open,
        has_winner,
        winner,
    }
}
