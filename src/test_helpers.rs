//! In-memory ledger and wallet plumbing for tests.
//!
//! [`FakeLedger`] is a scriptable stand-in for the remote ledger: it holds
//! raffle objects, answers view inspections from them, interprets submitted
//! transaction plans (create/join/pick-winner), and records events and
//! transaction details the way the real node would. Failure modes — failing
//! event streams, undecodable view returns, missing details, rejected
//! executions — are injected per test.

use crate::actions::RaffleActions;
use crate::config::CONTRACT_MODULE;
use crate::directory::RaffleDirectory;
use crate::event_feed::EventFeed;
use crate::events::{CREATED_EVENT, JOINED_EVENT, WINNER_EVENT};
use crate::ledger::{
    Address, CallArg, Command, EventEnvelope, EventFilter, InspectionResult, InspectionReturn,
    Ledger, ObjectChange, ObjectId, QueryOrder, TransactionDetail, TransactionPlan,
    TransactionReceipt, TxDigest,
};
use crate::snapshot::SnapshotReader;
use crate::wallet::KeystoreWallet;
use color_eyre::eyre::{Result, eyre};
use ed25519_dalek::SigningKey;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TEST_PACKAGE: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000ee";
const BASE_TIMESTAMP_MS: u64 = 1_700_000_000_000;

pub fn test_package_id() -> ObjectId {
    TEST_PACKAGE.parse().unwrap()
}

/// Deterministic object id with the counter in the trailing bytes.
pub fn test_object_id(n: u64) -> ObjectId {
    let mut bytes = [0u8; 32];
    bytes[24..32].copy_from_slice(&n.to_be_bytes());
    ObjectId::from(bytes)
}

#[derive(Clone, Debug, Default)]
pub struct FakeRaffle {
    pub owner: Address,
    pub pool_value: u64,
    pub entrant_count: u64,
    pub entrants: Vec<Address>,
    pub is_open: bool,
    pub has_winner: bool,
    pub winner: Option<Address>,
}

impl FakeRaffle {
    pub fn open(owner: Address) -> Self {
        FakeRaffle {
            owner,
            is_open: true,
            ..FakeRaffle::default()
        }
    }
}

#[derive(Default)]
struct FakeLedgerState {
    raffles: HashMap<ObjectId, FakeRaffle>,
    raffle_order: Vec<ObjectId>,
    events: Vec<EventEnvelope>,
    details: HashMap<String, TransactionDetail>,
    executed_plans: Vec<TransactionPlan>,
    failing_queries: HashSet<String>,
    broken_views: HashSet<(ObjectId, String)>,
    failing_inspections: HashSet<ObjectId>,
    detail_fetch_failures: u32,
    next_execution_failure: Option<String>,
    next_execution_detail: Option<TransactionDetail>,
    next_receipt_raw: Option<Value>,
    next_object: u64,
    next_digest: u64,
    next_event_seq: u64,
}

#[derive(Clone)]
pub struct FakeLedger {
    package: ObjectId,
    state: Arc<Mutex<FakeLedgerState>>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            package: test_package_id(),
            state: Arc::new(Mutex::new(FakeLedgerState::default())),
        }
    }

    pub fn package(&self) -> ObjectId {
        self.package
    }

    pub fn add_raffle(&self, raffle: FakeRaffle) -> ObjectId {
        let mut state = self.state.lock().unwrap();
        state.next_object += 1;
        let id = test_object_id(state.next_object);
        state.raffles.insert(id, raffle);
        state.raffle_order.push(id);
        id
    }

    pub fn raffle(&self, id: &ObjectId) -> Option<FakeRaffle> {
        self.state.lock().unwrap().raffles.get(id).cloned()
    }

    pub fn latest_raffle_id(&self) -> Option<ObjectId> {
        self.state.lock().unwrap().raffle_order.last().copied()
    }

    pub fn executed_plans(&self) -> Vec<TransactionPlan> {
        self.state.lock().unwrap().executed_plans.clone()
    }

    pub fn fail_event_query(&self, event_name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_queries
            .insert(event_name.to_string());
    }

    /// Make one view function return undecodable bytes for one raffle.
    pub fn break_view(&self, id: ObjectId, function: &str) {
        self.state
            .lock()
            .unwrap()
            .broken_views
            .insert((id, function.to_string()));
    }

    /// Make every inspection touching this raffle fail outright.
    pub fn fail_inspection(&self, id: ObjectId) {
        self.state.lock().unwrap().failing_inspections.insert(id);
    }

    pub fn fail_detail_fetches(&self, count: u32) {
        self.state.lock().unwrap().detail_fetch_failures = count;
    }

    pub fn set_detail(&self, digest: &str, detail: TransactionDetail) {
        self.state
            .lock()
            .unwrap()
            .details
            .insert(digest.to_string(), detail);
    }

    pub fn fail_next_execution(&self, raw: impl Into<String>) {
        self.state.lock().unwrap().next_execution_failure = Some(raw.into());
    }

    /// The next executed transaction's detail record (e.g. an on-chain
    /// abort discovered only after finalization).
    pub fn set_next_execution_detail(&self, detail: TransactionDetail) {
        self.state.lock().unwrap().next_execution_detail = Some(detail);
    }

    /// The next executed transaction's immediate receipt payload.
    pub fn set_next_receipt_raw(&self, raw: Value) {
        self.state.lock().unwrap().next_receipt_raw = Some(raw);
    }

    pub fn push_created_event(
        &self,
        raffle_id: Option<ObjectId>,
        owner: Address,
        digest: &str,
    ) {
        let mut parsed = json!({ "owner": owner.to_string() });
        if let Some(id) = raffle_id {
            parsed["raffle_id"] = Value::String(id.to_string());
        }
        self.push_event(CREATED_EVENT, parsed, digest);
    }

    pub fn push_joined_event(
        &self,
        raffle_id: ObjectId,
        player: Address,
        total_entrants: u64,
        digest: &str,
    ) {
        self.push_event(
            JOINED_EVENT,
            json!({
                "raffle_id": raffle_id.to_string(),
                "player": player.to_string(),
                "total_entrants": total_entrants,
            }),
            digest,
        );
    }

    pub fn push_winner_event(
        &self,
        raffle_id: ObjectId,
        winner: Address,
        prize_amount: u64,
        digest: &str,
    ) {
        self.push_event(
            WINNER_EVENT,
            json!({
                "raffle_id": raffle_id.to_string(),
                "winner": winner.to_string(),
                "prize_amount": prize_amount,
            }),
            digest,
        );
    }

    fn push_event(&self, event_name: &str, parsed: Value, digest: &str) {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_event_seq;
        state.next_event_seq += 1;
        let event_type = format!("{}::{}::{}", self.package, CONTRACT_MODULE, event_name);
        state.events.push(EventEnvelope {
            event_type,
            parsed,
            timestamp_ms: Some(BASE_TIMESTAMP_MS + seq),
            tx_digest: TxDigest::new(digest),
            event_seq: Some(seq),
        });
    }

    fn success_detail(created: Option<ObjectId>) -> TransactionDetail {
        let mut detail = TransactionDetail {
            effects: Some(json!({ "status": { "status": "success" } })),
            ..TransactionDetail::default()
        };
        if let Some(id) = created {
            detail.object_changes.push(ObjectChange {
                change_type: "created".to_string(),
                object_type: format!("{}::{}::Raffle", TEST_PACKAGE, CONTRACT_MODULE),
                object_id: Some(id),
            });
        }
        detail
    }

    fn view_bytes(raffle: &FakeRaffle, function: &str) -> Vec<u8> {
        match function {
            "get_entrant_count" => raffle.entrant_count.to_le_bytes().to_vec(),
            "get_pool_value" => raffle.pool_value.to_le_bytes().to_vec(),
            "is_open" => vec![u8::from(raffle.is_open)],
            "get_owner" => raffle.owner.as_bytes().to_vec(),
            "has_winner" => vec![u8::from(raffle.has_winner)],
            "get_winner" => match raffle.winner {
                Some(winner) => {
                    let mut bytes = vec![1u8];
                    bytes.extend_from_slice(winner.as_bytes());
                    bytes
                }
                None => vec![0u8],
            },
            "get_entrants" => {
                // Single-byte ULEB length is enough for test-sized lists.
                let mut bytes = vec![raffle.entrants.len() as u8];
                for entrant in &raffle.entrants {
                    bytes.extend_from_slice(entrant.as_bytes());
                }
                bytes
            }
            _ => Vec::new(),
        }
    }
}

impl Ledger for FakeLedger {
    async fn object_exists(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.state.lock().unwrap().raffles.contains_key(id))
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        order: QueryOrder,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>> {
        let state = self.state.lock().unwrap();
        if state.failing_queries.contains(&filter.event) {
            return Err(eyre!("simulated outage for {} query", filter.event));
        }
        let wanted = filter.event_type();
        let mut matches: Vec<EventEnvelope> = state
            .events
            .iter()
            .filter(|envelope| envelope.event_type == wanted)
            .cloned()
            .collect();
        if matches!(order, QueryOrder::Descending) {
            matches.reverse();
        }
        matches.truncate(limit);
        Ok(matches)
    }

    async fn inspect(&self, plan: &TransactionPlan) -> Result<InspectionResult> {
        let state = self.state.lock().unwrap();
        let mut results = Vec::new();
        for command in &plan.commands {
            let Command::MoveCall {
                function,
                arguments,
                ..
            } = command
            else {
                continue;
            };
            let object = arguments.iter().find_map(|argument| match argument {
                CallArg::Object { id } => Some(*id),
                CallArg::Result { .. } => None,
            });
            let Some(id) = object else {
                results.push(InspectionReturn::default());
                continue;
            };
            if state.failing_inspections.contains(&id) {
                return Err(eyre!("simulated inspection failure for {id}"));
            }
            let return_values = match state.raffles.get(&id) {
                Some(raffle) => {
                    if state.broken_views.contains(&(id, function.clone())) {
                        vec![vec![0xffu8]]
                    } else {
                        vec![Self::view_bytes(raffle, function)]
                    }
                }
                None => Vec::new(),
            };
            results.push(InspectionReturn { return_values });
        }
        Ok(InspectionResult {
            results,
            error: None,
        })
    }

    async fn transaction_detail(&self, digest: &TxDigest) -> Result<TransactionDetail> {
        let mut state = self.state.lock().unwrap();
        if state.detail_fetch_failures > 0 {
            state.detail_fetch_failures -= 1;
            return Err(eyre!("simulated indexer lag for {digest}"));
        }
        state
            .details
            .get(digest.as_str())
            .cloned()
            .ok_or_else(|| eyre!("transaction {digest} not found"))
    }

    async fn execute_transaction(
        &self,
        plan: &TransactionPlan,
        sender: &Address,
        _signature: &str,
    ) -> Result<TransactionReceipt> {
        let mut state = self.state.lock().unwrap();
        state.executed_plans.push(plan.clone());
        if let Some(raw) = state.next_execution_failure.take() {
            return Err(eyre!(raw));
        }

        state.next_digest += 1;
        let digest = format!("FakeDigest{}", state.next_digest);
        let split_amount = plan.commands.iter().find_map(|command| match command {
            Command::SplitFromGas { amount } => Some(*amount),
            _ => None,
        });

        let mut created: Option<ObjectId> = None;
        let mut emitted: Vec<(&'static str, Value)> = Vec::new();
        for command in &plan.commands {
            let Command::MoveCall {
                function,
                arguments,
                ..
            } = command
            else {
                continue;
            };
            let object = arguments.iter().find_map(|argument| match argument {
                CallArg::Object { id } => Some(*id),
                CallArg::Result { .. } => None,
            });
            match function.as_str() {
                "create_raffle" => {
                    state.next_object += 1;
                    let id = test_object_id(state.next_object);
                    state.raffles.insert(id, FakeRaffle::open(*sender));
                    state.raffle_order.push(id);
                    created = Some(id);
                    emitted.push((
                        CREATED_EVENT,
                        json!({
                            "raffle_id": id.to_string(),
                            "owner": sender.to_string(),
                        }),
                    ));
                }
                "join" => {
                    let Some(id) = object else { continue };
                    let Some(raffle) = state.raffles.get_mut(&id) else {
                        return Err(eyre!("object not found: {id}"));
                    };
                    raffle.entrant_count += 1;
                    raffle.pool_value += split_amount.unwrap_or(0);
                    raffle.entrants.push(*sender);
                    let total = raffle.entrant_count;
                    emitted.push((
                        JOINED_EVENT,
                        json!({
                            "raffle_id": id.to_string(),
                            "player": sender.to_string(),
                            "total_entrants": total,
                        }),
                    ));
                }
                "pick_winner" => {
                    // The first object argument is the raffle; the second is
                    // the randomness source.
                    let Some(id) = object else { continue };
                    let Some(raffle) = state.raffles.get_mut(&id) else {
                        continue;
                    };
                    let winner = raffle.entrants.first().copied().unwrap_or(*sender);
                    let prize = raffle.pool_value;
                    raffle.has_winner = true;
                    raffle.winner = Some(winner);
                    raffle.is_open = false;
                    raffle.pool_value = 0;
                    emitted.push((
                        WINNER_EVENT,
                        json!({
                            "raffle_id": id.to_string(),
                            "winner": winner.to_string(),
                            "prize_amount": prize,
                        }),
                    ));
                }
                _ => {}
            }
        }

        let detail = state
            .next_execution_detail
            .take()
            .unwrap_or_else(|| Self::success_detail(created));
        state.details.insert(digest.clone(), detail);

        let raw = state
            .next_receipt_raw
            .take()
            .unwrap_or_else(|| json!({ "digest": digest }));

        for (event_name, parsed) in emitted {
            let seq = state.next_event_seq;
            state.next_event_seq += 1;
            let event_type =
                format!("{}::{}::{}", self.package, CONTRACT_MODULE, event_name);
            state.events.push(EventEnvelope {
                event_type,
                parsed,
                timestamp_ms: Some(BASE_TIMESTAMP_MS + seq),
                tx_digest: TxDigest::new(&digest),
                event_seq: Some(seq),
            });
        }

        Ok(TransactionReceipt {
            digest: TxDigest::new(digest),
            raw,
        })
    }
}

/// A detail record reporting an on-chain abort with the given code.
pub fn abort_failure_detail(code: u64) -> TransactionDetail {
    TransactionDetail {
        effects: Some(json!({
            "status": {
                "status": "failure",
                "error": format!("MoveAbort(MoveLocation {{ function: 1 }}, {code}) in command 0"),
            }
        })),
        ..TransactionDetail::default()
    }
}

/// Shared wiring for integration tests: one fake ledger, two wallets.
pub struct TestContext {
    ledger: FakeLedger,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            ledger: FakeLedger::new(),
        }
    }

    pub fn ledger(&self) -> FakeLedger {
        self.ledger.clone()
    }

    pub fn package(&self) -> ObjectId {
        self.ledger.package()
    }

    pub fn alice(&self) -> KeystoreWallet<FakeLedger> {
        KeystoreWallet::new(self.ledger.clone(), SigningKey::from_bytes(&[7u8; 32]))
    }

    pub fn owner(&self) -> KeystoreWallet<FakeLedger> {
        KeystoreWallet::new(self.ledger.clone(), SigningKey::from_bytes(&[9u8; 32]))
    }

    pub fn alice_address(&self) -> Address {
        Address::from(SigningKey::from_bytes(&[7u8; 32]).verifying_key().to_bytes())
    }

    pub fn owner_address(&self) -> Address {
        Address::from(SigningKey::from_bytes(&[9u8; 32]).verifying_key().to_bytes())
    }

    pub fn alice_actions(&self) -> RaffleActions<FakeLedger, KeystoreWallet<FakeLedger>> {
        RaffleActions::new(self.ledger(), self.alice(), self.package())
    }

    pub fn owner_actions(&self) -> RaffleActions<FakeLedger, KeystoreWallet<FakeLedger>> {
        RaffleActions::new(self.ledger(), self.owner(), self.package())
    }

    pub fn directory(&self) -> RaffleDirectory<FakeLedger> {
        RaffleDirectory::new(self.ledger(), self.package())
    }

    pub fn reader(&self) -> SnapshotReader<FakeLedger> {
        SnapshotReader::new(self.ledger(), self.package())
    }

    pub fn feed(&self, poll_interval: Duration) -> EventFeed<FakeLedger> {
        EventFeed::new(self.ledger(), self.package(), poll_interval)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
