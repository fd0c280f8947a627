//! Typed raffle events and the derived views folded from them.
//!
//! Events are immutable, append-only, and sourced from the ledger's event
//! log; the client only reads them. Deduplication happens at the consumer
//! through a process-local seen-set keyed by transaction digest plus event
//! sequence (falling back to the envelope timestamp when the sequence is
//! absent). The seen-set is memory, not ledger state, and resets on restart.

use crate::ledger::{Address, EventEnvelope, ObjectId, TxDigest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

pub const CREATED_EVENT: &str = "RaffleCreated";
pub const JOINED_EVENT: &str = "PlayerJoined";
pub const WINNER_EVENT: &str = "WinnerPicked";

/// How many recent winners the UI announces.
pub const RECENT_WINNER_LIMIT: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaffleCreated {
    /// Some event-emission styles omit the id from the payload; the list
    /// builder then falls back to the creating transaction's object changes.
    pub raffle_id: Option<ObjectId>,
    pub owner: Option<Address>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoined {
    pub raffle_id: ObjectId,
    pub player: Address,
    pub total_entrants: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WinnerPicked {
    pub raffle_id: ObjectId,
    pub winner: Address,
    pub prize_amount: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RaffleEvent {
    Created(RaffleCreated),
    Joined(PlayerJoined),
    WinnerPicked(WinnerPicked),
}

/// One event plus the envelope metadata used for ordering and dedup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: RaffleEvent,
    pub timestamp_ms: Option<u64>,
    pub tx_digest: TxDigest,
    pub event_seq: Option<u64>,
}

impl EventRecord {
    /// Composite identity: the same on-chain event always folds to the same
    /// key, however many polling ticks re-deliver it.
    pub fn dedup_key(&self) -> String {
        match self.event_seq {
            Some(seq) => format!("{}:{}", self.tx_digest, seq),
            None => format!("{}:{}", self.tx_digest, self.timestamp_ms.unwrap_or(0)),
        }
    }

    pub fn raffle_id(&self) -> Option<ObjectId> {
        match &self.event {
            RaffleEvent::Created(created) => created.raffle_id,
            RaffleEvent::Joined(joined) => Some(joined.raffle_id),
            RaffleEvent::WinnerPicked(picked) => Some(picked.raffle_id),
        }
    }

    /// Parse a ledger envelope into a typed record. Unknown event types and
    /// payloads missing required fields yield `None`; the caller drops them.
    pub fn from_envelope(envelope: &EventEnvelope) -> Option<EventRecord> {
        let parsed = &envelope.parsed;
        let event = if envelope.event_type.contains(CREATED_EVENT) {
            RaffleEvent::Created(RaffleCreated {
                raffle_id: field_id(parsed, "raffle_id"),
                owner: field_address(parsed, "owner"),
            })
        } else if envelope.event_type.contains(JOINED_EVENT) {
            RaffleEvent::Joined(PlayerJoined {
                raffle_id: field_id(parsed, "raffle_id")?,
                player: field_address(parsed, "player")?,
                total_entrants: field_u64(parsed, "total_entrants").unwrap_or(0),
            })
        } else if envelope.event_type.contains(WINNER_EVENT) {
            RaffleEvent::WinnerPicked(WinnerPicked {
                raffle_id: field_id(parsed, "raffle_id")?,
                winner: field_address(parsed, "winner")?,
                prize_amount: field_u64(parsed, "prize_amount").unwrap_or(0),
            })
        } else {
            return None;
        };
        Some(EventRecord {
            event,
            timestamp_ms: envelope.timestamp_ms,
            tx_digest: envelope.tx_digest.clone(),
            event_seq: envelope.event_seq,
        })
    }
}

fn field_id(parsed: &Value, key: &str) -> Option<ObjectId> {
    parsed.get(key)?.as_str()?.parse().ok()
}

fn field_address(parsed: &Value, key: &str) -> Option<Address> {
    parsed.get(key)?.as_str()?.parse().ok()
}

/// Event queries deliver u64 fields either as numbers or as decimal strings
/// depending on the indexer version.
fn field_u64(parsed: &Value, key: &str) -> Option<u64> {
    match parsed.get(key)? {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.parse().ok(),
        _ => None,
    }
}

/// Process-local record of already-handled events. Owned by exactly one
/// consumer; never shared across components.
#[derive(Debug, Default)]
pub struct ProcessedEvents {
    seen: HashSet<String>,
}

impl ProcessedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event as handled. Returns true only the first time a given
    /// dedup key is seen.
    pub fn mark(&mut self, record: &EventRecord) -> bool {
        self.seen.insert(record.dedup_key())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WinnerRecord {
    pub raffle_id: ObjectId,
    pub winner: Address,
    pub prize_amount: u64,
    pub timestamp_ms: Option<u64>,
}

/// The account-centric views folded from one event batch: raffles the
/// account created, raffles it joined, and the most recent winners.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccountActivity {
    pub created: Vec<ObjectId>,
    pub joined: Vec<ObjectId>,
    pub winners: Vec<WinnerRecord>,
}

/// Fold a batch (newest first) into per-account views. Ids are deduplicated
/// preserving first appearance; winners keep batch order, capped at
/// [`RECENT_WINNER_LIMIT`].
pub fn fold_account_activity(records: &[EventRecord], account: &Address) -> AccountActivity {
    let mut created = Vec::new();
    let mut joined = Vec::new();
    let mut winners = Vec::new();
    let mut seen_created = HashSet::new();
    let mut seen_joined = HashSet::new();

    for record in records {
        match &record.event {
            RaffleEvent::Created(event) => {
                if event.owner.as_ref() == Some(account)
                    && let Some(id) = event.raffle_id
                    && seen_created.insert(id)
                {
                    created.push(id);
                }
            }
            RaffleEvent::Joined(event) => {
                if event.player == *account && seen_joined.insert(event.raffle_id) {
                    joined.push(event.raffle_id);
                }
            }
            RaffleEvent::WinnerPicked(event) => {
                if winners.len() < RECENT_WINNER_LIMIT {
                    winners.push(WinnerRecord {
                        raffle_id: event.raffle_id,
                        winner: event.winner,
                        prize_amount: event.prize_amount,
                        timestamp_ms: record.timestamp_ms,
                    });
                }
            }
        }
    }

    AccountActivity {
        created,
        joined,
        winners,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_type: &str, parsed: Value, digest: &str, seq: Option<u64>) -> EventEnvelope {
        EventEnvelope {
            event_type: event_type.to_string(),
            parsed,
            timestamp_ms: Some(1_700_000_000_000),
            tx_digest: TxDigest::new(digest),
            event_seq: seq,
        }
    }

    const PKG: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";

    fn raffle_id() -> ObjectId {
        "0x0000000000000000000000000000000000000000000000000000000000000001"
            .parse()
            .unwrap()
    }

    fn player() -> Address {
        "0x0000000000000000000000000000000000000000000000000000000000000002"
            .parse()
            .unwrap()
    }

    #[test]
    fn from_envelope__parses_each_event_kind() {
        let created = EventRecord::from_envelope(&envelope(
            &format!("{PKG}::simple_raffle::RaffleCreated"),
            json!({ "raffle_id": raffle_id().to_string(), "owner": player().to_string() }),
            "D1",
            Some(0),
        ))
        .unwrap();
        assert_eq!(created.raffle_id(), Some(raffle_id()));

        let joined = EventRecord::from_envelope(&envelope(
            &format!("{PKG}::simple_raffle::PlayerJoined"),
            json!({
                "raffle_id": raffle_id().to_string(),
                "player": player().to_string(),
                "total_entrants": "2"
            }),
            "D2",
            Some(0),
        ))
        .unwrap();
        match joined.event {
            RaffleEvent::Joined(event) => assert_eq!(event.total_entrants, 2),
            other => panic!("unexpected event: {other:?}"),
        }

        assert!(
            EventRecord::from_envelope(&envelope(
                &format!("{PKG}::simple_raffle::SomethingElse"),
                json!({}),
                "D3",
                None,
            ))
            .is_none()
        );
    }

    #[test]
    fn from_envelope__tolerates_missing_created_payload_fields() {
        let record = EventRecord::from_envelope(&envelope(
            &format!("{PKG}::simple_raffle::RaffleCreated"),
            json!({}),
            "D4",
            Some(1),
        ))
        .unwrap();
        assert_eq!(record.raffle_id(), None);
    }

    #[test]
    fn dedup_key__prefers_sequence_and_falls_back_to_timestamp() {
        let with_seq = envelope(WINNER_EVENT, json!({}), "DIG", Some(4));
        let record = EventRecord {
            event: RaffleEvent::Created(RaffleCreated {
                raffle_id: None,
                owner: None,
            }),
            timestamp_ms: with_seq.timestamp_ms,
            tx_digest: with_seq.tx_digest.clone(),
            event_seq: with_seq.event_seq,
        };
        assert_eq!(record.dedup_key(), "DIG:4");

        let without_seq = EventRecord {
            event_seq: None,
            ..record
        };
        assert_eq!(without_seq.dedup_key(), "DIG:1700000000000");
    }

    #[test]
    fn processed_events__marks_each_key_exactly_once() {
        let record = EventRecord {
            event: RaffleEvent::WinnerPicked(WinnerPicked {
                raffle_id: raffle_id(),
                winner: player(),
                prize_amount: 2_000_000_000,
            }),
            timestamp_ms: Some(5),
            tx_digest: TxDigest::new("DIG"),
            event_seq: Some(0),
        };
        let mut processed = ProcessedEvents::new();
        assert!(processed.mark(&record));
        assert!(!processed.mark(&record));
        assert_eq!(processed.len(), 1);
    }

    #[test]
    fn fold_account_activity__filters_by_account_and_caps_winners() {
        let me = player();
        let other: Address =
            "0x0000000000000000000000000000000000000000000000000000000000000003"
                .parse()
                .unwrap();
        let mut records = vec![
            EventRecord {
                event: RaffleEvent::Created(RaffleCreated {
                    raffle_id: Some(raffle_id()),
                    owner: Some(me),
                }),
                timestamp_ms: None,
                tx_digest: TxDigest::new("A"),
                event_seq: Some(0),
            },
            EventRecord {
                event: RaffleEvent::Created(RaffleCreated {
                    raffle_id: Some(raffle_id()),
                    owner: Some(other),
                }),
                timestamp_ms: None,
                tx_digest: TxDigest::new("B"),
                event_seq: Some(0),
            },
            EventRecord {
                event: RaffleEvent::Joined(PlayerJoined {
                    raffle_id: raffle_id(),
                    player: me,
                    total_entrants: 1,
                }),
                timestamp_ms: None,
                tx_digest: TxDigest::new("C"),
                event_seq: Some(0),
            },
        ];
        for index in 0..5u64 {
            records.push(EventRecord {
                event: RaffleEvent::WinnerPicked(WinnerPicked {
                    raffle_id: raffle_id(),
                    winner: other,
                    prize_amount: index,
                }),
                timestamp_ms: None,
                tx_digest: TxDigest::new(format!("W{index}")),
                event_seq: Some(0),
            });
        }

        let activity = fold_account_activity(&records, &me);
        assert_eq!(activity.created, vec![raffle_id()]);
        assert_eq!(activity.joined, vec![raffle_id()]);
        assert_eq!(activity.winners.len(), RECENT_WINNER_LIMIT);
        assert_eq!(activity.winners[0].prize_amount, 0);
    }
}
