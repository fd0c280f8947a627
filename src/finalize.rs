//! Post-submission verification of transaction outcomes.
//!
//! A submitted transaction can fail in ways the immediate receipt does not
//! expose: indexers finalize asynchronously, and the shape of failure
//! payloads differs between node and indexer versions. The verifier scans
//! the immediate receipt first (no extra round-trip on the common failure
//! path), then fetches the fully-indexed record with bounded retries and
//! walks a layered series of structured and textual checks. No match at any
//! stage means success.

use crate::errors::{self, classify_abort_text};
use crate::ledger::{Ledger, TransactionDetail, TransactionReceipt};
use color_eyre::eyre::{Result, eyre};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

pub const DETAIL_FETCH_ATTEMPTS: u32 = 3;

const FAILURE_MARKERS: [&str; 4] = ["MoveAbort", "failure", "abort", "error"];

/// Determine whether the ledger ultimately accepted the submitted
/// transaction; fail with a classified user-facing message otherwise.
pub async fn verify_transaction<L: Ledger>(
    receipt: &TransactionReceipt,
    ledger: &L,
    context: &str,
) -> Result<()> {
    let immediate = serde_json::to_string(receipt).unwrap_or_default();
    if FAILURE_MARKERS.iter().any(|marker| immediate.contains(marker)) {
        debug!(%context, digest = %receipt.digest, "failure indicators in immediate receipt");
        return Err(eyre!(classify_abort_text(&immediate)));
    }

    let mut detail: Option<TransactionDetail> = None;
    for attempt in 0..DETAIL_FETCH_ATTEMPTS {
        if attempt > 0 {
            // Indexers need time to finalize; an immediate fetch can 404.
            sleep(Duration::from_secs(u64::from(attempt))).await;
        }
        match ledger.transaction_detail(&receipt.digest).await {
            Ok(found) => {
                detail = Some(found);
                break;
            }
            Err(err) => {
                debug!(
                    %context,
                    attempt = attempt + 1,
                    "transaction detail fetch failed: {err}"
                );
            }
        }
    }

    let Some(detail) = detail else {
        warn!(
            %context,
            digest = %receipt.digest,
            "detail unavailable after {DETAIL_FETCH_ATTEMPTS} attempts; trusting immediate receipt"
        );
        return Ok(());
    };

    check_detail(&detail).map_err(|message| eyre!(message))
}

/// Layered failure checks over the fully-indexed record. First structured
/// match wins; textual scans extract a numeric code before classification.
fn check_detail(detail: &TransactionDetail) -> Result<(), String> {
    if let Some(effects) = &detail.effects {
        // Canonical shape: effects.status.status == "failure".
        if let Some(status) = effects.get("status") {
            if status.get("status").and_then(Value::as_str) == Some("failure") {
                let error = status
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("Transaction execution failed");
                return Err(classify_abort_text(error));
            }
            // Older clients flatten the status to a bare string.
            if status.as_str() == Some("failure") {
                return Err(classify_abort_text("Transaction execution failed"));
            }
        }
    }

    if let Some(abort) = &detail.abort_error {
        let text = format!("MoveAbort error code: {}", abort.error_code);
        return Err(classify_abort_text(&text));
    }

    if let Some(effects) = &detail.effects {
        let effects_text = effects.to_string();
        if effects_text.contains("\"status\":\"failure\"")
            || effects_text.contains("MoveAbort")
            || effects_text.contains("failure")
        {
            if let Some(code) = errors::move_abort_code(&effects_text) {
                return Err(classify_abort_text(&format!(
                    "MoveAbort error code: {code}"
                )));
            }
            return Err(classify_abort_text(&effects_text));
        }
    }

    let full_text = serde_json::to_string(detail).unwrap_or_default();
    if full_text.contains("abortError")
        || full_text.contains("MoveAbort")
        || full_text.contains("\"status\":\"failure\"")
    {
        if let Some(code) = errors::error_code_field(&full_text) {
            return Err(classify_abort_text(&format!(
                "MoveAbort error code: {code}"
            )));
        }
        if let Some(code) = errors::move_abort_code(&full_text) {
            return Err(classify_abort_text(&format!(
                "MoveAbort error code: {code}"
            )));
        }
        return Err(classify_abort_text(&full_text));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RaffleAbort;
    use crate::ledger::AbortError;
    use serde_json::json;

    fn detail_with_effects(effects: Value) -> TransactionDetail {
        TransactionDetail {
            effects: Some(effects),
            ..TransactionDetail::default()
        }
    }

    #[test]
    fn check_detail__passes_clean_success_record() {
        let detail = detail_with_effects(json!({ "status": { "status": "success" } }));
        assert!(check_detail(&detail).is_ok());
    }

    #[test]
    fn check_detail__classifies_top_level_status_error() {
        let detail = detail_with_effects(json!({
            "status": { "status": "failure", "error": "MoveAbort error code: 4" }
        }));
        assert_eq!(
            check_detail(&detail),
            Err(RaffleAbort::InsufficientParticipants.to_string())
        );
    }

    #[test]
    fn check_detail__handles_flattened_status_string() {
        let detail = detail_with_effects(json!({ "status": "failure" }));
        assert!(check_detail(&detail).is_err());
    }

    #[test]
    fn check_detail__uses_dedicated_abort_error_field() {
        let detail = TransactionDetail {
            abort_error: Some(AbortError {
                error_code: 2,
                module: None,
            }),
            ..TransactionDetail::default()
        };
        assert_eq!(check_detail(&detail), Err(RaffleAbort::NotOwner.to_string()));
    }

    #[test]
    fn check_detail__extracts_code_from_effects_text() {
        let detail = detail_with_effects(json!({
            "transactions": [
                { "result": "MoveAbort(MoveLocation { function: 1 }, 3) in command 0" }
            ]
        }));
        assert_eq!(
            check_detail(&detail),
            Err(RaffleAbort::AlreadyJoined.to_string())
        );
    }

    #[test]
    fn check_detail__scans_whole_record_as_last_resort() {
        let mut detail = TransactionDetail::default();
        detail.extra.insert(
            "checkpoint".to_string(),
            json!({ "abortError": { "error_code": 1 } }),
        );
        assert_eq!(
            check_detail(&detail),
            Err(RaffleAbort::InsufficientPayment.to_string())
        );
    }
}
