//! The collection of known raffles, reconstructed from creation events.
//!
//! Raffle ids come from the `RaffleCreated` stream; when an event's payload
//! lacks the id (one emission style omits it) the builder inspects the
//! creating transaction's object-creation effects instead. Each id is then
//! projected into a current snapshot; projections that fail outright are
//! dropped so the list degrades gracefully rather than failing wholesale.

use crate::config::CONTRACT_MODULE;
use crate::events::{CREATED_EVENT, EventRecord};
use crate::ledger::{EventEnvelope, EventFilter, Ledger, ObjectId, QueryOrder};
use crate::snapshot::{RaffleSnapshot, SnapshotReader};
use color_eyre::eyre::Result;
use futures::future::join_all;
use itertools::Itertools;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub const CREATED_QUERY_LIMIT: usize = 50;
/// Inter-request delay when projecting a known id list sequentially.
pub const PACED_REQUEST_DELAY: Duration = Duration::from_millis(500);
/// Extended delay after the provider signals throttling.
pub const RATE_LIMIT_DELAY: Duration = Duration::from_secs(2);

pub struct RaffleDirectory<L> {
    ledger: L,
    reader: SnapshotReader<L>,
    package: ObjectId,
}

impl<L: Ledger + Clone> RaffleDirectory<L> {
    pub fn new(ledger: L, package: ObjectId) -> Self {
        let reader = SnapshotReader::new(ledger.clone(), package);
        Self {
            ledger,
            reader,
            package,
        }
    }

    pub fn reader(&self) -> &SnapshotReader<L> {
        &self.reader
    }

    /// All currently known raffles, newest creation first.
    pub async fn list(&self) -> Result<Vec<RaffleSnapshot>> {
        let filter = EventFilter::new(self.package, CONTRACT_MODULE, CREATED_EVENT);
        let envelopes = self
            .ledger
            .query_events(&filter, QueryOrder::Descending, CREATED_QUERY_LIMIT)
            .await?;

        let mut ids = Vec::with_capacity(envelopes.len());
        for envelope in &envelopes {
            match self.resolve_raffle_id(envelope).await {
                Some(id) => ids.push(id),
                None => warn!(
                    digest = %envelope.tx_digest,
                    "could not resolve raffle id for creation event"
                ),
            }
        }
        let ids: Vec<ObjectId> = ids.into_iter().unique().collect();

        let outcomes = join_all(ids.iter().map(|id| self.reader.fetch(id))).await;
        Ok(outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!("dropping failed projection: {err}");
                    None
                }
            })
            .collect())
    }

    /// Project a known id list sequentially with pacing, for refreshes that
    /// bypass the event query. Missing objects are skipped; failures extend
    /// the delay when the provider reports throttling.
    pub async fn refresh_paced(&self, ids: &[ObjectId]) -> Vec<RaffleSnapshot> {
        let mut snapshots = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            match self.reader.fetch(id).await {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => {}
                Err(err) => {
                    warn!(%id, "paced refresh failed: {err}");
                    if err.to_string().contains("429") {
                        sleep(RATE_LIMIT_DELAY).await;
                    }
                    continue;
                }
            }
            if index + 1 < ids.len() {
                sleep(PACED_REQUEST_DELAY).await;
            }
        }
        snapshots
    }

    async fn resolve_raffle_id(&self, envelope: &EventEnvelope) -> Option<ObjectId> {
        if let Some(record) = EventRecord::from_envelope(envelope)
            && let Some(id) = record.raffle_id()
        {
            return Some(id);
        }
        // Some payloads carry the id under a generic key.
        if let Some(id) = envelope
            .parsed
            .get("id")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
        {
            return Some(id);
        }
        // Last resort: the creating transaction's object-creation effects.
        let detail = self
            .ledger
            .transaction_detail(&envelope.tx_digest)
            .await
            .ok()?;
        detail
            .object_changes
            .iter()
            .find(|change| {
                change.change_type == "created"
                    && change
                        .object_type
                        .contains(&format!("{CONTRACT_MODULE}::Raffle"))
            })
            .and_then(|change| change.object_id)
    }
}
