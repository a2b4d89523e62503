//! Trade command and acknowledgment

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::hash::{context_hash, result_hash, trade_reference};
use crate::{parse_bytes32_hex, AgentId, CoreError, Hash32, Result, TradeReference};

/// A validated trade-execution request.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeCommand {
    pub agent_id: AgentId,
    /// agentId exactly as the caller sent it (number or string). Echoed in the
    /// acknowledgment and hashed into the default digests.
    pub agent_id_literal: Value,
    pub trade_id: String,
    pub result: Option<Value>,
    pub result_hash: Option<Hash32>,
    pub context: Option<Value>,
    pub context_hash: Option<Hash32>,
    pub risk_flags: Option<u8>,
    /// Base58 token account that replaces the agent's derived token account
    pub recipient_override: Option<String>,
}

impl TradeCommand {
    pub fn new(agent_id: AgentId, trade_id: impl Into<String>) -> Self {
        Self {
            agent_id,
            agent_id_literal: Value::from(agent_id.get()),
            trade_id: trade_id.into(),
            result: None,
            result_hash: None,
            context: None,
            context_hash: None,
            risk_flags: None,
            recipient_override: None,
        }
    }

    /// Validate a JSON request body.
    ///
    /// Error messages are meant for the caller and name the offending field.
    pub fn from_json(body: &Value) -> Result<Self> {
        let obj = body
            .as_object()
            .ok_or_else(|| invalid("Request body must be an object"))?;

        let agent_id_literal = match obj.get("agentId") {
            Some(v @ Value::Number(_)) => v.clone(),
            Some(v @ Value::String(s)) if !s.is_empty() => v.clone(),
            _ => return Err(invalid("agentId is required")),
        };
        let agent_id = AgentId::from_json(&agent_id_literal)
            .map_err(|_| invalid("agentId must be an unsigned 64-bit integer"))?;

        let trade_id = match obj.get("tradeId") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return Err(invalid("tradeId is required")),
        };

        let result_hash = optional_hash(obj.get("resultHash"), "resultHash")?;
        let context_hash = optional_hash(obj.get("contextHash"), "contextHash")?;

        let risk_flags = match obj.get("riskFlags") {
            None => None,
            Some(Value::Number(n)) => Some(
                n.as_u64()
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| invalid("riskFlags must be an integer in range [0, 255]"))?,
            ),
            Some(_) => return Err(invalid("riskFlags must be an integer in range [0, 255]")),
        };

        // A present key is validated even when null; only a missing key is absent
        let override_value = obj
            .get("recipientOverride")
            .map(|v| ("recipientOverride", v))
            .or_else(|| {
                obj.get("solanaAgentTokenAccount")
                    .map(|v| ("solanaAgentTokenAccount", v))
            });
        let recipient_override = match override_value {
            None => None,
            Some((field, Value::String(s))) => {
                let trimmed = s.trim();
                if !is_base58_address(trimmed) {
                    return Err(invalid(&format!(
                        "{} must be a valid base58 Solana public key",
                        field
                    )));
                }
                Some(trimmed.to_string())
            }
            Some((field, _)) => return Err(invalid(&format!("{} must be a string", field))),
        };

        Ok(Self {
            agent_id,
            agent_id_literal,
            trade_id,
            result: obj.get("result").filter(|v| !v.is_null()).cloned(),
            result_hash,
            context: obj.get("context").filter(|v| !v.is_null()).cloned(),
            context_hash,
            risk_flags,
            recipient_override,
        })
    }

    pub fn trade_reference(&self) -> TradeReference {
        trade_reference(&self.trade_id)
    }

    pub fn resolved_result_hash(&self) -> Hash32 {
        result_hash(
            self.result_hash.as_ref(),
            self.result.as_ref(),
            &self.agent_id_literal,
            &self.trade_id,
        )
    }

    pub fn resolved_context_hash(&self) -> Hash32 {
        context_hash(
            self.context_hash.as_ref(),
            self.context.as_ref(),
            self.result.as_ref(),
            &self.agent_id_literal,
            &self.trade_id,
        )
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::InvalidRequest(message.to_string())
}

fn optional_hash(value: Option<&Value>, field: &'static str) -> Result<Option<Hash32>> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => parse_bytes32_hex(s, field)
            .map(Some)
            .map_err(|e| invalid(&e.to_string())),
        Some(_) => Err(invalid(&format!("{} must be a string", field))),
    }
}

/// Shape check for a base58 public key (32 to 44 alphabet characters).
pub fn is_base58_address(value: &str) -> bool {
    (32..=44).contains(&value.len())
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric() && !matches!(b, b'0' | b'O' | b'I' | b'l')
        })
}

/// Immediate acknowledgment returned before any on-chain work starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAck {
    pub ok: bool,
    pub agent_id: Value,
    pub trade_id: String,
    pub received_at: String,
}

impl TradeAck {
    pub fn new(command: &TradeCommand, received_at: DateTime<Utc>) -> Self {
        Self {
            ok: true,
            agent_id: command.agent_id_literal.clone(),
            trade_id: command.trade_id.clone(),
            received_at: received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
