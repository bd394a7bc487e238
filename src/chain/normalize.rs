//! Normalization of chain-node transaction JSON.
//!
//! Depending on whether a response came straight from algod, through a
//! JavaScript SDK, or from an indexer, the payment fields of a transaction
//! sit at different depths, under short or long names, and addresses may be
//! canonical strings, base64, raw byte arrays or `{ publicKey }` wrappers.
//! [`normalize_payment_txn`] folds all of these into a single
//! [`NormalizedPaymentTxn`]. Each accepted shape is a separate parse rule
//! below so that it can be tested on its own.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Map, Value};

use super::address::Address;
use crate::domain::MicroAlgos;

/// Where the transaction body may live, tried in order.
const BODY_POINTERS: [&str; 4] = ["/txn/txn", "/transaction/txn", "/txn", "/transaction"];
const AMOUNT_POINTERS: [&str; 4] = [
    "/amt",
    "/amount",
    "/payment/amount",
    "/payment-transaction/amount",
];
const RECEIVER_POINTERS: [&str; 4] = [
    "/rcv",
    "/receiver",
    "/payment/receiver",
    "/payment-transaction/receiver",
];
const SENDER_POINTERS: [&str; 3] = ["/snd", "/sender", "/from"];
const TYPE_POINTERS: [&str; 2] = ["/type", "/tx-type"];

/// Largest integer a JSON number can carry without precision loss in
/// JavaScript producers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Declared transaction type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnKind {
    /// `pay` or `payment`.
    Payment,
    /// Any other declared type (asset transfer, app call, ...).
    Other(String),
    /// The body carries no type field.
    Unspecified,
}

/// Payment fields extracted from a chain response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedPaymentTxn {
    /// Transferred amount in micro-ALGO.
    pub amount: MicroAlgos,
    /// Receiving address, canonical when it could be decoded.
    pub receiver: String,
    /// Sending address, best effort. Only used for logging.
    pub sender: Option<String>,
    /// Declared transaction type.
    pub kind: TxnKind,
    /// Round in which the transaction was confirmed, if reported.
    pub confirmed_round: Option<u64>,
}

/// Reasons a response cannot be read as a payment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// The transaction declares a non-payment type.
    #[error("transaction type is {0:?}, expected a payment")]
    WrongType(String),

    /// No amount field could be read.
    #[error("transaction has no readable amount")]
    MissingAmount,

    /// No receiver field could be read.
    #[error("transaction has no readable receiver")]
    MissingReceiver,
}

/// Extracts the payment fields of a transaction response.
///
/// The type check runs before field extraction, so a non-payment
/// transaction is reported as [`NormalizeError::WrongType`] even when it
/// also lacks payment fields.
///
/// # Errors
///
/// Returns [`NormalizeError`] when the transaction is not a payment or its
/// amount or receiver cannot be read.
pub fn normalize_payment_txn(response: &Value) -> Result<NormalizedPaymentTxn, NormalizeError> {
    let body = locate_body(response);

    let kind = read_kind(body);
    if let TxnKind::Other(declared) = &kind {
        return Err(NormalizeError::WrongType(declared.clone()));
    }

    let amount = read_amount(body).ok_or(NormalizeError::MissingAmount)?;
    let receiver = read_receiver(body).ok_or(NormalizeError::MissingReceiver)?;

    Ok(NormalizedPaymentTxn {
        amount,
        receiver,
        sender: read_sender(body),
        kind,
        confirmed_round: confirmed_round(response),
    })
}

/// Finds the object holding the transaction fields.
///
/// Accepts the algod signed-transaction wrapper (`txn.txn`), the SDK
/// wrapper (`transaction.txn`), a flat `txn` or `transaction` object, and
/// falls back to the response itself.
#[must_use]
pub fn locate_body(response: &Value) -> &Value {
    BODY_POINTERS
        .iter()
        .filter_map(|ptr| response.pointer(ptr))
        .find(|v| v.is_object())
        .unwrap_or(response)
}

/// Reads the declared transaction type.
#[must_use]
pub fn read_kind(body: &Value) -> TxnKind {
    match first_present(body, &TYPE_POINTERS) {
        None => TxnKind::Unspecified,
        Some(Value::String(s)) => match s.trim() {
            "pay" | "payment" => TxnKind::Payment,
            other => TxnKind::Other(other.to_string()),
        },
        Some(other) => TxnKind::Other(other.to_string()),
    }
}

/// Reads the amount as an integer number of micro-ALGO.
///
/// Accepts JSON integers, whole floats within the safe-integer range, and
/// decimal-digit strings (SDKs serialise 64-bit integers as strings).
#[must_use]
pub fn read_amount(body: &Value) -> Option<MicroAlgos> {
    first_present(body, &AMOUNT_POINTERS)
        .and_then(amount_value)
        .map(MicroAlgos::new)
}

/// Reads the receiver address.
#[must_use]
pub fn read_receiver(body: &Value) -> Option<String> {
    first_present(body, &RECEIVER_POINTERS).and_then(decode_address_value)
}

/// Reads the sender address.
#[must_use]
pub fn read_sender(body: &Value) -> Option<String> {
    first_present(body, &SENDER_POINTERS).and_then(decode_address_value)
}

/// Round in which the transaction was confirmed; `None` or `0` means it is
/// still in the pool.
#[must_use]
pub fn confirmed_round(response: &Value) -> Option<u64> {
    ["/confirmed-round", "/transaction/confirmed-round"]
        .iter()
        .filter_map(|ptr| response.pointer(ptr))
        .find_map(Value::as_u64)
        .filter(|round| *round > 0)
}

/// Non-empty `pool-error` reported by algod for a rejected transaction.
#[must_use]
pub fn pool_error(response: &Value) -> Option<&str> {
    response
        .get("pool-error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|e| !e.is_empty())
}

/// Resolves an address in any of the accepted encodings to a string.
///
/// - a canonical 58-character address is returned unchanged;
/// - base64 of a 32-byte public key is re-encoded as an address;
/// - a JSON array of 32 bytes, a Node `Buffer` (`{type, data}`) or a
///   serialised `Uint8Array` (`{"0": .., "31": ..}`) is encoded likewise;
/// - `{ publicKey: .. }` is unwrapped and resolved recursively;
/// - any other non-empty string is returned trimmed, so that it still
///   takes part in the exact receiver comparison.
#[must_use]
pub fn decode_address_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => decode_address_str(s),
        Value::Array(items) => bytes_from_array(items).and_then(|b| encode_public_key(&b)),
        Value::Object(map) => {
            if let Some(inner) = map.get("publicKey") {
                return decode_address_value(inner);
            }
            if map.get("type").and_then(Value::as_str) == Some("Buffer") {
                return match map.get("data") {
                    Some(Value::Array(items)) => {
                        bytes_from_array(items).and_then(|b| encode_public_key(&b))
                    }
                    _ => None,
                };
            }
            bytes_from_indexed_object(map).and_then(|b| encode_public_key(&b))
        }
        _ => None,
    }
}

fn decode_address_str(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if Address::is_valid(s) {
        return Some(s.to_string());
    }
    if let Ok(bytes) = STANDARD.decode(s)
        && let Some(encoded) = encode_public_key(&bytes)
    {
        return Some(encoded);
    }
    Some(s.to_string())
}

fn encode_public_key(bytes: &[u8]) -> Option<String> {
    Address::from_slice(bytes).map(|a| a.encode())
}

fn bytes_from_array(items: &[Value]) -> Option<Vec<u8>> {
    items.iter().map(byte_value).collect()
}

fn bytes_from_indexed_object(map: &Map<String, Value>) -> Option<Vec<u8>> {
    if map.is_empty() {
        return None;
    }
    let mut bytes = vec![0u8; map.len()];
    for (key, value) in map {
        let index: usize = key.parse().ok()?;
        *bytes.get_mut(index)? = byte_value(value)?;
    }
    Some(bytes)
}

fn byte_value(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}

fn amount_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= MAX_SAFE_INTEGER)
                .map(|f| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let whole = f as u64;
                    whole
                })
        }),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()
        }
        _ => None,
    }
}

/// First field that carries a value; `null` and blank strings count as
/// absent.
fn first_present<'a>(body: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers
        .iter()
        .filter_map(|ptr| body.pointer(ptr))
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}
