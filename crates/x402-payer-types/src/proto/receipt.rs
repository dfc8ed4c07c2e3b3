use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp::UnixTimestamp;
use crate::util::{Fields, RawAmount};

/// Where a [`Receipt`]'s figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReceiptSource {
    /// Declared by the server in the response body.
    Server,
    /// Read from the `X-Payment-Response` settlement header; the amount is the quoted one.
    SettlementHeader,
    /// Rebuilt from the quote and the proof. The amount is what was asked, not a confirmed charge.
    Reconstructed,
}

impl ReceiptSource {
    pub fn is_server_confirmed(&self) -> bool {
        matches!(self, ReceiptSource::Server)
    }
}

/// The canonical record of what was charged, to and from whom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub amount_paid_atomic: u64,
    pub amount_paid: Decimal,
    pub payer: String,
    pub merchant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<UnixTimestamp>,
    pub source: ReceiptSource,
}

/// A receipt as servers spell it.
///
/// | Field | Spellings, first wins |
/// | --- | --- |
/// | `amount_paid_atomic` | `amountPaidAtomic`, `amountAtomic`, `amount` |
/// | `amount_paid` | `amountPaid`, `amountDecimal` |
/// | `payer` | `payer`, `from` |
/// | `merchant` | `merchant`, `recipient`, `payTo`, `to` |
/// | `transaction` | `transaction`, `txHash`, `signature`, `settlementReference` |
/// | `timestamp` | `timestamp`, `settledAt` |
#[derive(Debug, Clone, Default)]
pub struct ReceiptWire {
    pub amount_paid_atomic: Option<RawAmount>,
    pub amount_paid: Option<RawAmount>,
    pub payer: Option<String>,
    pub merchant: Option<String>,
    pub transaction: Option<String>,
    pub timestamp: Option<serde_json::Value>,
}

impl ReceiptWire {
    pub fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            amount_paid_atomic: fields.first(&["amountPaidAtomic", "amountAtomic", "amount"]),
            amount_paid: fields.first(&["amountPaid", "amountDecimal"]),
            payer: fields.first(&["payer", "from"]),
            merchant: fields.first(&["merchant", "recipient", "payTo", "to"]),
            transaction: fields.first(&["transaction", "txHash", "signature", "settlementReference"]),
            timestamp: fields.first(&["timestamp", "settledAt"]),
        }
    }

    /// Reads the timestamp if it is given as Unix seconds, as a number or a numeric string.
    pub fn unix_timestamp(&self) -> Option<UnixTimestamp> {
        match self.timestamp.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().map(UnixTimestamp::from_secs),
            serde_json::Value::String(s) => s.trim().parse().ok().map(UnixTimestamp::from_secs),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ReceiptWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::deserialize(deserializer)?;
        Ok(Self::from_fields(Fields::new(&map, "receipt")))
    }
}

/// Body of the `X-Payment-Response` header, the facilitator's settle response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_receipt_spellings() {
        let wire: ReceiptWire = serde_json::from_value(json!({
            "amountAtomic": "50000",
            "from": "P",
            "payTo": "R",
            "txHash": "0xabc",
            "settledAt": 1700000000
        }))
        .unwrap();
        assert_eq!(
            wire.amount_paid_atomic.as_ref().and_then(RawAmount::strict_atomic),
            Some(50_000)
        );
        assert_eq!(wire.payer.as_deref(), Some("P"));
        assert_eq!(wire.merchant.as_deref(), Some("R"));
        assert_eq!(wire.transaction.as_deref(), Some("0xabc"));
        assert_eq!(wire.unix_timestamp(), Some(UnixTimestamp::from_secs(1_700_000_000)));
    }

    #[test]
    fn test_redundant_spellings_resolve_in_order() {
        let wire: ReceiptWire = serde_json::from_value(json!({
            "amountPaidAtomic": 50000,
            "amount": "0.05",
            "payer": "P",
            "from": "Q",
            "merchant": "R",
            "recipient": "S",
            "txHash": "0xabc",
            "signature": "5sig"
        }))
        .unwrap();
        assert_eq!(
            wire.amount_paid_atomic.as_ref().and_then(RawAmount::strict_atomic),
            Some(50_000)
        );
        assert_eq!(wire.payer.as_deref(), Some("P"));
        assert_eq!(wire.merchant.as_deref(), Some("R"));
        assert_eq!(wire.transaction.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_wrongly_typed_spelling_falls_through() {
        let wire: ReceiptWire = serde_json::from_value(json!({
            "merchant": {"name": "Acme"},
            "payTo": "R",
            "amountPaidAtomic": 7
        }))
        .unwrap();
        assert_eq!(wire.merchant.as_deref(), Some("R"));
        assert!(serde_json::from_value::<ReceiptWire>(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_iso_timestamp_is_not_unix() {
        let wire: ReceiptWire =
            serde_json::from_value(json!({"timestamp": "2025-01-01T00:00:00Z"})).unwrap();
        assert_eq!(wire.unix_timestamp(), None);
    }

    #[test]
    fn test_settlement_response() {
        let settle: SettlementResponse = serde_json::from_value(json!({
            "success": true,
            "transaction": "5sig",
            "network": "solana-devnet",
            "payer": "P"
        }))
        .unwrap();
        assert!(settle.success);
        assert_eq!(settle.transaction.as_deref(), Some("5sig"));
    }
}
