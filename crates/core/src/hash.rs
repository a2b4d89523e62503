//! Idempotency reference and signal digests
//!
//! Everything here is pure and offline. Digests are Keccak-256 so the values
//! match what the contracts compute on-chain.

use serde_json::{json, Value};
use sha3::{Digest, Keccak256};

use crate::{Hash32, TradeReference};

pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive the idempotency reference for a trade from its identifier bytes.
pub fn trade_reference(trade_id: &str) -> TradeReference {
    TradeReference::from_bytes(keccak256(trade_id.as_bytes()))
}

/// Canonical JSON text for hashing.
///
/// Object keys are sorted (by UTF-16 code unit, the order off-chain verifiers
/// use), arrays keep their order and nested values are canonicalized
/// recursively. Integral floats print without a fractional part.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                out.push_str(&(f as i64).to_string());
            }
            _ => out.push_str(&n.to_string()),
        },
        primitive => out.push_str(&primitive.to_string()),
    }
}

pub fn hash_canonical(value: &Value) -> Hash32 {
    keccak256(canonical_json(value).as_bytes())
}

/// Digest of the trade outcome.
///
/// An explicit hash wins. Otherwise the caller's result object is hashed, and
/// when that is absent too a default `EXECUTED` outcome is substituted.
pub fn result_hash(
    explicit: Option<&Hash32>,
    result: Option<&Value>,
    agent_id: &Value,
    trade_id: &str,
) -> Hash32 {
    if let Some(hash) = explicit {
        return *hash;
    }
    match result {
        Some(result) => hash_canonical(result),
        None => hash_canonical(&json!({
            "status": "EXECUTED",
            "tradeId": trade_id,
            "agentId": agent_id,
        })),
    }
}

/// Digest of the trade context, falling back to `{agentId, tradeId, result}`.
pub fn context_hash(
    explicit: Option<&Hash32>,
    context: Option<&Value>,
    result: Option<&Value>,
    agent_id: &Value,
    trade_id: &str,
) -> Hash32 {
    if let Some(hash) = explicit {
        return *hash;
    }
    match context {
        Some(context) => hash_canonical(context),
        None => hash_canonical(&json!({
            "agentId": agent_id,
            "tradeId": trade_id,
            "result": result.cloned().unwrap_or(Value::Null),
        })),
    }
}
