//! JSON-RPC adapter for the ledger port, speaking to a fullnode endpoint.

use crate::ledger::{
    Address, EventEnvelope, EventFilter, InspectionResult, InspectionReturn, Ledger, ObjectId,
    QueryOrder, TransactionDetail, TransactionPlan, TransactionReceipt, TxDigest,
};
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

/// Read access never authenticates; view batches execute against the null
/// sender.
const NULL_SENDER: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Clone)]
pub struct JsonRpcLedger {
    url: String,
    http: reqwest::Client,
}

impl JsonRpcLedger {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for ledger RPC")?;
        Ok(Self { url, http })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        debug!(%method, "ledger RPC request");
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("ledger RPC request for {method} failed"))?;
        let status = response.status();
        if !status.is_success() {
            // The status line (e.g. "429 Too Many Requests") stays in the
            // message so the pacing layer can detect throttling.
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(eyre!("ledger responded with {status} to {method}: {body}"));
        }
        let envelope: RpcResponse<T> = response
            .json()
            .await
            .wrap_err_with(|| format!("invalid ledger response for {method}"))?;
        if let Some(error) = envelope.error {
            return Err(eyre!(
                "ledger error for {method}: {} (code {})",
                error.message,
                error.code
            ));
        }
        envelope
            .result
            .ok_or_else(|| eyre!("ledger response for {method} carried neither result nor error"))
    }
}

impl Ledger for JsonRpcLedger {
    async fn object_exists(&self, id: &ObjectId) -> Result<bool> {
        let response: Value = self
            .call(
                "sui_getObject",
                json!([id.to_string(), { "showContent": true, "showType": true }]),
            )
            .await?;
        Ok(response
            .get("data")
            .map(|data| !data.is_null())
            .unwrap_or(false))
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        order: QueryOrder,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>> {
        let descending = matches!(order, QueryOrder::Descending);
        let page: EventPage = self
            .call(
                "suix_queryEvents",
                json!([
                    { "MoveEventType": filter.event_type() },
                    null,
                    limit,
                    descending,
                ]),
            )
            .await?;
        Ok(page.data.into_iter().map(EventEnvelope::from).collect())
    }

    async fn inspect(&self, plan: &TransactionPlan) -> Result<InspectionResult> {
        let wire: WireInspection = self
            .call("sui_devInspectTransactionBlock", json!([NULL_SENDER, plan]))
            .await?;
        Ok(wire.into())
    }

    async fn transaction_detail(&self, digest: &TxDigest) -> Result<TransactionDetail> {
        self.call(
            "sui_getTransactionBlock",
            json!([
                digest.as_str(),
                {
                    "showEffects": true,
                    "showEvents": true,
                    "showBalanceChanges": true,
                    "showObjectChanges": true,
                },
            ]),
        )
        .await
    }

    async fn execute_transaction(
        &self,
        plan: &TransactionPlan,
        sender: &Address,
        signature: &str,
    ) -> Result<TransactionReceipt> {
        let response: Value = self
            .call(
                "sui_executeTransactionBlock",
                json!([plan, sender.to_string(), [signature], { "showEffects": true }]),
            )
            .await?;
        let digest = response
            .get("digest")
            .and_then(Value::as_str)
            .ok_or_else(|| eyre!("ledger execution response missing digest"))?;
        Ok(TransactionReceipt {
            digest: TxDigest::new(digest),
            raw: response,
        })
    }
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct EventPage {
    #[serde(default)]
    data: Vec<WireEvent>,
}

/// Event as the node returns it; u64 envelope fields arrive as decimal
/// strings.
#[derive(Deserialize)]
struct WireEvent {
    id: WireEventId,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(rename = "parsedJson", default)]
    parsed: Value,
    #[serde(rename = "timestampMs", default)]
    timestamp_ms: Option<String>,
}

#[derive(Deserialize)]
struct WireEventId {
    #[serde(rename = "txDigest")]
    tx_digest: String,
    #[serde(rename = "eventSeq", default)]
    event_seq: Option<String>,
}

impl From<WireEvent> for EventEnvelope {
    fn from(wire: WireEvent) -> Self {
        EventEnvelope {
            event_type: wire.event_type,
            parsed: wire.parsed,
            timestamp_ms: wire.timestamp_ms.and_then(|raw| raw.parse().ok()),
            tx_digest: TxDigest::new(wire.id.tx_digest),
            event_seq: wire.id.event_seq.and_then(|raw| raw.parse().ok()),
        }
    }
}

#[derive(Deserialize)]
struct WireInspection {
    #[serde(default)]
    results: Option<Vec<WireInspectionResult>>,
    #[serde(default)]
    error: Option<String>,
}

/// Each return value pairs the raw bytes with a type tag the client ignores.
#[derive(Deserialize)]
struct WireInspectionResult {
    #[serde(rename = "returnValues", default)]
    return_values: Vec<(Vec<u8>, String)>,
}

impl From<WireInspection> for InspectionResult {
    fn from(wire: WireInspection) -> Self {
        InspectionResult {
            results: wire
                .results
                .unwrap_or_default()
                .into_iter()
                .map(|result| InspectionReturn {
                    return_values: result
                        .return_values
                        .into_iter()
                        .map(|(bytes, _type_tag)| bytes)
                        .collect(),
                })
                .collect(),
            error: wire.error,
        }
    }
}
