use color_eyre::eyre::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a hex identifier cannot be parsed into 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid 32-byte hex identifier: {0}")]
pub struct ParseIdError(String);

fn parse_hex_32(raw: &str) -> Option<[u8; 32]> {
    let digits = raw.strip_prefix("0x")?;
    if digits.is_empty()
        || digits.len() > 64
        || !digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return None;
    }
    // Short well-known ids ("0x8") are left-padded to the full width.
    let padded = format!("{digits:0>64}");
    let bytes = hex::decode(padded).ok()?;
    bytes.try_into().ok()
}

/// Identifier of an addressable unit of ledger state (a raffle, the
/// randomness object, a published package). Hex-encoded with a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Abbreviated form for display: first six and last four characters.
    pub fn short(&self) -> String {
        short_hex(&self.to_string())
    }
}

impl From<[u8; 32]> for ObjectId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for ObjectId {
    type Err = ParseIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_hex_32(raw)
            .map(Self)
            .ok_or_else(|| ParseIdError(raw.to_string()))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A 32-byte account address, hex-encoded with a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 32]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn short(&self) -> String {
        short_hex(&self.to_string())
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = ParseIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_hex_32(raw)
            .map(Self)
            .ok_or_else(|| ParseIdError(raw.to_string()))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn short_hex(full: &str) -> String {
    if full.len() < 10 {
        return full.to_string();
    }
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Identity of a submitted transaction, opaque to the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxDigest(String);

impl TxDigest {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One positional argument to a contract entry point or view function.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallArg {
    /// An owned or shared object passed by id.
    Object { id: ObjectId },
    /// The output of an earlier command in the same plan (e.g. a split coin).
    Result { index: usize },
}

/// One command inside a transaction plan.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    MoveCall {
        package: ObjectId,
        module: String,
        function: String,
        arguments: Vec<CallArg>,
    },
    /// Split an exact amount off the gas coin; the result is addressable as
    /// `CallArg::Result` with this command's index.
    SplitFromGas { amount: u64 },
    /// Return a command result (an unconsumed coin) to the sender. The
    /// contract does not return unused value on its own; leaving the coin
    /// dangling fails transaction validation.
    TransferToSender { source: usize },
}

/// An ordered list of commands submitted (or inspected) as one atomic unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TransactionPlan {
    pub commands: Vec<Command>,
    pub gas_budget: Option<u64>,
}

impl TransactionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_call(
        &mut self,
        package: ObjectId,
        module: &str,
        function: &str,
        arguments: Vec<CallArg>,
    ) -> usize {
        self.commands.push(Command::MoveCall {
            package,
            module: module.to_string(),
            function: function.to_string(),
            arguments,
        });
        self.commands.len() - 1
    }

    pub fn split_from_gas(&mut self, amount: u64) -> usize {
        self.commands.push(Command::SplitFromGas { amount });
        self.commands.len() - 1
    }

    pub fn transfer_to_sender(&mut self, source: usize) -> usize {
        self.commands.push(Command::TransferToSender { source });
        self.commands.len() - 1
    }

    pub fn set_gas_budget(&mut self, budget: u64) {
        self.gas_budget = Some(budget);
    }
}

/// The immediate response to a submitted transaction: the digest plus
/// whatever effects summary the node returned inline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub digest: TxDigest,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Structured abort report some indexers attach to failed transactions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AbortError {
    pub error_code: u64,
    #[serde(default)]
    pub module: Option<String>,
}

/// An object created/mutated/deleted by a transaction, as reported by the
/// fully-indexed record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObjectChange {
    #[serde(rename = "type", default)]
    pub change_type: String,
    #[serde(rename = "objectType", default)]
    pub object_type: String,
    #[serde(rename = "objectId", default)]
    pub object_id: Option<ObjectId>,
}

/// The fully-indexed transaction record. Only the fields the client inspects
/// are typed; everything else is retained raw because the shape of failure
/// payloads is not stable across node and indexer versions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<serde_json::Value>,
    #[serde(
        rename = "abortError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub abort_error: Option<AbortError>,
    #[serde(rename = "objectChanges", default, skip_serializing_if = "Vec::is_empty")]
    pub object_changes: Vec<ObjectChange>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One event as returned by the ledger's event query, with the envelope
/// metadata the client folds into its derived views.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_type: String,
    #[serde(default)]
    pub parsed: serde_json::Value,
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    pub tx_digest: TxDigest,
    #[serde(default)]
    pub event_seq: Option<u64>,
}

/// Selects one typed event stream emitted by one contract module.
#[derive(Clone, Debug, PartialEq)]
pub struct EventFilter {
    pub package: ObjectId,
    pub module: String,
    pub event: String,
}

impl EventFilter {
    pub fn new(package: ObjectId, module: &str, event: &str) -> Self {
        Self {
            package,
            module: module.to_string(),
            event: event.to_string(),
        }
    }

    pub fn event_type(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.event)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryOrder {
    Ascending,
    Descending,
}

/// Positional return values of one command in an inspected plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionReturn {
    pub return_values: Vec<Vec<u8>>,
}

/// Result of a non-committing execution of a transaction plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionResult {
    #[serde(default)]
    pub results: Vec<InspectionReturn>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Read/write access to the remote ledger. Implementations are adapters
/// (JSON-RPC in production, in-memory in tests); all state of record lives
/// on the other side of this trait.
pub trait Ledger {
    /// Probe whether an object currently exists. A vanished object is a
    /// normal transient state, not an error.
    fn object_exists(&self, id: &ObjectId) -> impl Future<Output = Result<bool>> + Send;

    /// Query one typed event stream with ordering and a record limit.
    fn query_events(
        &self,
        filter: &EventFilter,
        order: QueryOrder,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<EventEnvelope>>> + Send;

    /// Execute a plan without committing it, against a null sender. Read
    /// access does not require authentication.
    fn inspect(
        &self,
        plan: &TransactionPlan,
    ) -> impl Future<Output = Result<InspectionResult>> + Send;

    /// Fetch the fully-indexed record of a finalized transaction. May fail
    /// or lag shortly after submission while indexers catch up.
    fn transaction_detail(
        &self,
        digest: &TxDigest,
    ) -> impl Future<Output = Result<TransactionDetail>> + Send;

    /// Submit a signed transaction for execution.
    fn execute_transaction(
        &self,
        plan: &TransactionPlan,
        sender: &Address,
        signature: &str,
    ) -> impl Future<Output = Result<TransactionReceipt>> + Send;
}

/// The connected wallet session: the current account address and the
/// sign-and-execute entry point. Key handling stays behind this trait.
pub trait Wallet {
    fn address(&self) -> Address;

    fn sign_and_execute(
        &self,
        plan: &TransactionPlan,
    ) -> impl Future<Output = Result<TransactionReceipt>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id__round_trips_through_display_and_parse() {
        let id: ObjectId = "0x5c5d81f0c1b5a307df9358299e61f9b88f12711280c5f4864ef6d124f8c13d72"
            .parse()
            .unwrap();
        let rendered = id.to_string();
        assert_eq!(
            rendered,
            "0x5c5d81f0c1b5a307df9358299e61f9b88f12711280c5f4864ef6d124f8c13d72"
        );
        assert_eq!(rendered.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn object_id__left_pads_short_well_known_ids() {
        let id: ObjectId = "0x8".parse().unwrap();
        let mut expected = [0u8; 32];
        expected[31] = 8;
        assert_eq!(id.as_bytes(), &expected);
    }

    #[test]
    fn object_id__rejects_malformed_input() {
        assert!("".parse::<ObjectId>().is_err());
        assert!("0x".parse::<ObjectId>().is_err());
        assert!("8".parse::<ObjectId>().is_err());
        assert!("0xzz".parse::<ObjectId>().is_err());
        let too_long = format!("0x{}", "a".repeat(65));
        assert!(too_long.parse::<ObjectId>().is_err());
    }

    #[test]
    fn address__short_form_keeps_prefix_and_suffix() {
        let address: Address = "0x00000000000000000000000000000000000000000000000000000000deadbeef"
            .parse()
            .unwrap();
        assert_eq!(address.short(), "0x0000...beef");
    }

    #[test]
    fn transaction_plan__indices_address_earlier_commands() {
        let mut plan = TransactionPlan::new();
        let payment = plan.split_from_gas(1_000);
        let call = plan.move_call(
            ObjectId::default(),
            "simple_raffle",
            "join",
            vec![CallArg::Result { index: payment }],
        );
        assert_eq!(payment, 0);
        assert_eq!(call, 1);
    }
}
