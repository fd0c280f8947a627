//! Classification of raw failure payloads into stable user-facing messages.
//!
//! The remote execution environment reports failures inconsistently across
//! node and indexer versions: sometimes a bare string, sometimes an error
//! object, sometimes a deeply nested wrapper chain. The classifier normalizes
//! whatever it is handed and runs one priority-ordered rule table, so callers
//! never surface a raw provider error.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const GENERIC_FAILURE_MESSAGE: &str = "Transaction failed. Please try again.";
pub const INSUFFICIENT_BALANCE_MESSAGE: &str =
    "Insufficient balance to complete the transaction - please add more funds to your wallet";
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error - please check your connection and try again";
pub const WALLET_REJECTED_MESSAGE: &str = "Transaction was cancelled or rejected";
pub const INSUFFICIENT_GAS_MESSAGE: &str =
    "Insufficient gas to complete the transaction - please try again";
pub const OBJECT_NOT_FOUND_MESSAGE: &str =
    "Required object not found - the raffle may have been completed or deleted";

/// The five precondition failures the contract signals with abort codes.
/// `Display` renders the fixed user-facing message for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RaffleAbort {
    #[error("This raffle is not open for entries")]
    RaffleNotOpen,
    #[error("Insufficient payment amount")]
    InsufficientPayment,
    #[error("Only the raffle owner can perform this action")]
    NotOwner,
    #[error("You have already joined this raffle")]
    AlreadyJoined,
    #[error("Not enough participants to pick a winner")]
    InsufficientParticipants,
}

impl RaffleAbort {
    pub const fn code(self) -> u64 {
        match self {
            RaffleAbort::RaffleNotOpen => 0,
            RaffleAbort::InsufficientPayment => 1,
            RaffleAbort::NotOwner => 2,
            RaffleAbort::AlreadyJoined => 3,
            RaffleAbort::InsufficientParticipants => 4,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(RaffleAbort::RaffleNotOpen),
            1 => Some(RaffleAbort::InsufficientPayment),
            2 => Some(RaffleAbort::NotOwner),
            3 => Some(RaffleAbort::AlreadyJoined),
            4 => Some(RaffleAbort::InsufficientParticipants),
            _ => None,
        }
    }

    /// The constant's name as it appears in contract sources and some
    /// verbose error payloads.
    pub const fn name(self) -> &'static str {
        match self {
            RaffleAbort::RaffleNotOpen => "ERaffleNotOpen",
            RaffleAbort::InsufficientPayment => "EInsufficientPayment",
            RaffleAbort::NotOwner => "ENotOwner",
            RaffleAbort::AlreadyJoined => "EAlreadyJoined",
            RaffleAbort::InsufficientParticipants => "EInsufficientParticipants",
        }
    }

    pub const fn all() -> [RaffleAbort; 5] {
        [
            RaffleAbort::RaffleNotOpen,
            RaffleAbort::InsufficientPayment,
            RaffleAbort::NotOwner,
            RaffleAbort::AlreadyJoined,
            RaffleAbort::InsufficientParticipants,
        ]
    }
}

/// A failure as received from the provider, before normalization: either a
/// plain string or an arbitrarily nested structure.
#[derive(Debug, Clone)]
pub enum FailurePayload {
    Text(String),
    Structured(Value),
}

const MESSAGE_WRAPPERS: [&str; 4] = ["message", "cause", "error", "data"];
const MAX_MESSAGE_DEPTH: usize = 8;

impl FailurePayload {
    /// Walk wrapper fields (`message`, `cause.message`, `error.message`,
    /// `data.message`, and nestings thereof) until a string payload turns up.
    pub fn message(&self) -> Option<String> {
        match self {
            FailurePayload::Text(text) => Some(text.clone()),
            FailurePayload::Structured(value) => extract_message(value, 0),
        }
    }
}

fn extract_message(value: &Value, depth: usize) -> Option<String> {
    if depth >= MAX_MESSAGE_DEPTH {
        return None;
    }
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => {
            for key in MESSAGE_WRAPPERS {
                if let Some(inner) = map.get(key)
                    && let Some(message) = extract_message(inner, depth + 1)
                {
                    return Some(message);
                }
            }
            None
        }
        _ => None,
    }
}

/// Network- and wallet-level patterns, checked before any contract-specific
/// rule. Order matters: the first rule whose needle appears wins.
const NETWORK_RULES: &[(&[&str], &str)] = &[
    (&["InsufficientCoinBalance"], INSUFFICIENT_BALANCE_MESSAGE),
    (&["fetch", "network", "connection"], NETWORK_ERROR_MESSAGE),
    (&["rejected", "cancelled"], WALLET_REJECTED_MESSAGE),
    (&["InsufficientGas", "gas"], INSUFFICIENT_GAS_MESSAGE),
    (&["ObjectNotFound", "not found"], OBJECT_NOT_FOUND_MESSAGE),
];

/// Classify a raw failure payload into one user-facing message.
pub fn classify(payload: &FailurePayload, context: &str) -> String {
    let text = match payload.message() {
        Some(text) => text,
        None => match payload {
            FailurePayload::Text(text) => text.clone(),
            FailurePayload::Structured(value) => value.to_string(),
        },
    };
    let message = classify_text(&text);
    debug!(%context, "classified failure as: {message}");
    message
}

/// Full rule table over an extracted failure string: network-level patterns
/// first, then the contract-abort rules.
pub fn classify_text(text: &str) -> String {
    for (needles, message) in NETWORK_RULES {
        if needles.iter().any(|needle| text.contains(needle)) {
            return (*message).to_string();
        }
    }
    classify_abort_text(text)
}

/// Contract-abort rules only. Used directly on serialized receipts and
/// effects, where generic substrings like "gas" appear in every record and
/// would shadow the real abort.
pub fn classify_abort_text(text: &str) -> String {
    if let Some(code) = abort_code(text) {
        return match RaffleAbort::from_code(code) {
            Some(abort) => abort.to_string(),
            None => format!("Transaction failed with error code: {code}"),
        };
    }
    if let Some(code) = bare_small_code(text)
        && let Some(abort) = RaffleAbort::from_code(code)
    {
        return abort.to_string();
    }
    for abort in RaffleAbort::all() {
        if text.contains(abort.name()) {
            return abort.to_string();
        }
    }
    GENERIC_FAILURE_MESSAGE.to_string()
}

/// Extract an abort code from any of the textual shapes providers emit:
/// `MoveAbort(..., <code>)`, `error code: <code>`, `"error_code":<code>`,
/// or `abort` followed closely by a number.
fn abort_code(text: &str) -> Option<u64> {
    if let Some(position) = text.find("MoveAbort")
        && let Some(code) = digits_before_close_paren(&text[position..])
    {
        return Some(code);
    }
    for marker in ["error code:", "error_code"] {
        if let Some(position) = text.find(marker)
            && let Some(code) = leading_integer(&text[position + marker.len()..])
        {
            return Some(code);
        }
    }
    if let Some(position) = text.find("abort") {
        let window_end = (position + 32).min(text.len());
        if let Some(code) = first_integer(&text[position..window_end]) {
            return Some(code);
        }
    }
    None
}

/// Extract a MoveAbort code from serialized effects text; used by the
/// finalization verifier before classification.
pub(crate) fn move_abort_code(text: &str) -> Option<u64> {
    let position = text.find("MoveAbort")?;
    digits_before_close_paren(&text[position..])
}

/// Extract an `"error_code":N` field from serialized record text.
pub(crate) fn error_code_field(text: &str) -> Option<u64> {
    let position = text.find("error_code")?;
    leading_integer(&text[position + "error_code".len()..])
}

/// The code in a `MoveAbort(...)` rendering is the integer immediately
/// before a closing parenthesis; anything earlier (addresses, instruction
/// offsets) is location detail.
fn digits_before_close_paren(text: &str) -> Option<u64> {
    let bytes = text.as_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        if *byte != b')' {
            continue;
        }
        let mut start = index;
        while start > 0 && bytes[start - 1].is_ascii_digit() {
            start -= 1;
        }
        if start < index
            && let Ok(code) = text[start..index].parse::<u64>()
        {
            return Some(code);
        }
    }
    None
}

/// First integer after a marker, skipping separator punctuation.
fn leading_integer(text: &str) -> Option<u64> {
    let trimmed = text.trim_start_matches([' ', ':', '"', '=']);
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(index, _)| index)
        .unwrap_or(trimmed.len());
    if end == 0 {
        return None;
    }
    trimmed[..end].parse().ok()
}

fn first_integer(text: &str) -> Option<u64> {
    let bytes = text.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index].is_ascii_digit() {
            let start = index;
            while index < bytes.len() && bytes[index].is_ascii_digit() {
                index += 1;
            }
            return text[start..index].parse().ok();
        }
        index += 1;
    }
    None
}

/// Bare-code fallback: a standalone one- or two-digit run in range 0-10 that
/// maps to a known abort. Runs embedded in hex ids or longer numbers do not
/// qualify.
fn bare_small_code(text: &str) -> Option<u64> {
    let bytes = text.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if !bytes[index].is_ascii_digit() {
            index += 1;
            continue;
        }
        let start = index;
        while index < bytes.len() && bytes[index].is_ascii_digit() {
            index += 1;
        }
        let standalone = (start == 0 || !bytes[start - 1].is_ascii_alphanumeric())
            && (index >= bytes.len() || !bytes[index].is_ascii_alphanumeric());
        if standalone
            && index - start <= 2
            && let Ok(code) = text[start..index].parse::<u64>()
            && code <= 10
            && RaffleAbort::from_code(code).is_some()
        {
            return Some(code);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn classify_abort_text__maps_every_known_code_to_its_message() {
        for abort in RaffleAbort::all() {
            let text = format!("MoveAbort error code: {}", abort.code());
            assert_eq!(classify_abort_text(&text), abort.to_string());
        }
        assert_eq!(
            classify_abort_text("MoveAbort error code: 4"),
            "Not enough participants to pick a winner"
        );
    }

    #[test]
    fn classify_abort_text__reads_code_from_move_abort_rendering() {
        let text = "MoveAbort(MoveLocation { module: ModuleId { address: 5c5d81f0, \
                    name: Identifier(\"simple_raffle\") }, function: 2, instruction: 30, \
                    function_name: Some(\"join\") }, 3) in command 0";
        assert_eq!(
            classify_abort_text(text),
            RaffleAbort::AlreadyJoined.to_string()
        );
    }

    #[test]
    fn classify_abort_text__unknown_code_yields_generic_code_message() {
        assert_eq!(
            classify_abort_text("MoveAbort error code: 9"),
            "Transaction failed with error code: 9"
        );
    }

    #[test]
    fn classify_abort_text__bare_small_integer_hits_the_table() {
        assert_eq!(
            classify_abort_text("execution failed with 2"),
            RaffleAbort::NotOwner.to_string()
        );
        // Embedded digits (hex ids, larger amounts) never qualify.
        assert_eq!(
            classify_abort_text("object 0x2abc missing, height 1000003"),
            GENERIC_FAILURE_MESSAGE
        );
    }

    #[test]
    fn classify_abort_text__matches_literal_error_names() {
        assert_eq!(
            classify_abort_text("precondition EInsufficientParticipants was violated"),
            RaffleAbort::InsufficientParticipants.to_string()
        );
    }

    #[test]
    fn classify_text__balance_pattern_beats_embedded_small_integers() {
        assert_eq!(
            classify_text("InsufficientCoinBalance in command 2"),
            INSUFFICIENT_BALANCE_MESSAGE
        );
    }

    #[test]
    fn classify_text__wallet_rejection_and_gas_patterns() {
        assert_eq!(
            classify_text("Request rejected by user"),
            WALLET_REJECTED_MESSAGE
        );
        assert_eq!(
            classify_text("InsufficientGas at checkpoint"),
            INSUFFICIENT_GAS_MESSAGE
        );
        assert_eq!(
            classify_text("object not found in store"),
            OBJECT_NOT_FOUND_MESSAGE
        );
    }

    #[test]
    fn classify_text__falls_back_to_generic_message() {
        assert_eq!(classify_text("something odd happened"), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn classify__walks_nested_wrapper_chains() {
        let payload = FailurePayload::Structured(json!({
            "cause": { "error": { "message": "MoveAbort error code: 0" } }
        }));
        assert_eq!(
            classify(&payload, "join raffle"),
            RaffleAbort::RaffleNotOpen.to_string()
        );
    }

    #[test]
    fn classify__falls_back_to_serialized_value_without_message() {
        let payload = FailurePayload::Structured(json!({ "status": "rejected" }));
        assert_eq!(classify(&payload, "create raffle"), WALLET_REJECTED_MESSAGE);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
        #[test]
        fn classify_text__balance_rule_is_stable_under_surrounding_noise(
            prefix in "[ -~]{0,40}",
            suffix in "[ -~]{0,40}",
        ) {
            let text = format!("{prefix}InsufficientCoinBalance{suffix}");
            prop_assert_eq!(classify_text(&text), INSUFFICIENT_BALANCE_MESSAGE);
        }

        #[test]
        fn classify_text__always_returns_a_nonempty_message(text in "[ -~]{0,80}") {
            prop_assert!(!classify_text(&text).is_empty());
        }
    }
}
