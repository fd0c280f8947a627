//! Cooperative polling of the contract's event streams.
//!
//! Each tick issues the three typed event queries independently; a failure
//! in one stream yields an empty list for that stream rather than aborting
//! the tick. The resulting batch replaces the consumer's previous view
//! wholesale — deduplication is the consumer's responsibility via the
//! records' composite keys. Stopping a subscription aborts the timer task;
//! an in-flight query simply runs to completion and its result is dropped.

use crate::config;
use crate::events::{CREATED_EVENT, EventRecord, JOINED_EVENT, WINNER_EVENT};
use crate::ledger::{EventEnvelope, EventFilter, Ledger, ObjectId, QueryOrder};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

pub struct EventFeed<L> {
    ledger: L,
    package: ObjectId,
    poll_interval: Duration,
}

impl<L: Ledger + Clone + Send + Sync + 'static> EventFeed<L> {
    pub fn new(ledger: L, package: ObjectId, poll_interval: Duration) -> Self {
        Self {
            ledger,
            package,
            poll_interval,
        }
    }

    /// Start the polling task. The first batch is fetched immediately, then
    /// once per interval until the subscription is stopped or dropped.
    pub fn subscribe(&self) -> EventFeedSubscription {
        let (batches_tx, batches_rx) = mpsc::channel(8);
        let ledger = self.ledger.clone();
        let package = self.package;
        let poll_interval = self.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                let batch = poll_once(&ledger, &package).await;
                if batches_tx.send(batch).await.is_err() {
                    // Consumer unsubscribed; discard and wind down.
                    break;
                }
            }
        });
        EventFeedSubscription {
            batches: batches_rx,
            task,
        }
    }

    /// One immediate poll outside any subscription.
    pub async fn poll_now(&self) -> Vec<EventRecord> {
        poll_once(&self.ledger, &self.package).await
    }
}

/// Query all three event streams and merge the batches, newest first per
/// stream, creation events first overall.
pub async fn poll_once<L: Ledger>(ledger: &L, package: &ObjectId) -> Vec<EventRecord> {
    let (created, joined, winners) = tokio::join!(
        safe_query(ledger, package, CREATED_EVENT),
        safe_query(ledger, package, JOINED_EVENT),
        safe_query(ledger, package, WINNER_EVENT),
    );

    let mut records = Vec::with_capacity(created.len() + joined.len() + winners.len());
    for envelopes in [created, joined, winners] {
        records.extend(envelopes.iter().filter_map(EventRecord::from_envelope));
    }
    records
}

async fn safe_query<L: Ledger>(
    ledger: &L,
    package: &ObjectId,
    event_name: &str,
) -> Vec<EventEnvelope> {
    let filter = EventFilter::new(*package, config::CONTRACT_MODULE, event_name);
    match ledger
        .query_events(&filter, QueryOrder::Descending, config::EVENT_QUERY_LIMIT)
        .await
    {
        Ok(envelopes) => envelopes,
        Err(err) => {
            warn!(%event_name, "event query failed: {err}");
            Vec::new()
        }
    }
}

/// Handle to a running polling task. Dropping it cancels the timer.
pub struct EventFeedSubscription {
    batches: mpsc::Receiver<Vec<EventRecord>>,
    task: JoinHandle<()>,
}

impl EventFeedSubscription {
    /// Wait for the next polled batch. `None` once the feed task has ended.
    pub async fn next_batch(&mut self) -> Option<Vec<EventRecord>> {
        self.batches.recv().await
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for EventFeedSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
