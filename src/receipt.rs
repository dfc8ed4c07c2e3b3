//! Normalizing what a server says it charged into a [`Receipt`].

use x402_payer_types::proto::{
    PaymentProof, Quote, Receipt, ReceiptSource, ReceiptWire, ResponseBody, SettlementResponse,
};
use x402_payer_types::timestamp::UnixTimestamp;
use x402_payer_types::util::NormalizedAmount;

#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    #[error("Server receipt is not an object")]
    Malformed,
    #[error("Server receipt does not state the amount paid")]
    MissingAmount,
}

/// Reads the receipt of a paid call.
///
/// Sources, most authoritative first:
///
/// 1. a `receipt` object in the response body ([`ReceiptSource::Server`]),
/// 2. the `X-Payment-Response` settlement header ([`ReceiptSource::SettlementHeader`]),
/// 3. the quote and proof themselves ([`ReceiptSource::Reconstructed`]).
///
/// A server receipt that omits the amount is an error; the quoted amount is never
/// substituted for it.
pub struct ReceiptParser;

impl ReceiptParser {
    pub fn parse(
        body: &ResponseBody,
        settlement: Option<&SettlementResponse>,
        quote: &Quote,
        proof: &PaymentProof,
    ) -> Result<Receipt, ReceiptError> {
        let declared = body.envelope().and_then(|envelope| envelope.receipt.as_ref());
        if let Some(raw) = declared {
            return Self::from_server(raw, quote, proof);
        }
        match settlement {
            Some(settlement) if settlement.success => {
                Ok(Self::from_settlement(settlement, quote, proof))
            }
            _ => Ok(Self::reconstruct(quote, proof)),
        }
    }

    fn from_server(
        raw: &serde_json::Value,
        quote: &Quote,
        proof: &PaymentProof,
    ) -> Result<Receipt, ReceiptError> {
        if !raw.is_object() {
            return Err(ReceiptError::Malformed);
        }
        let wire: ReceiptWire =
            serde_json::from_value(raw.clone()).map_err(|_| ReceiptError::Malformed)?;
        let amount = wire
            .amount_paid_atomic
            .as_ref()
            .and_then(|a| a.strict_atomic())
            .map(NormalizedAmount::from_atomic)
            .or_else(|| wire.amount_paid.as_ref().and_then(|a| a.strict_decimal()))
            .ok_or(ReceiptError::MissingAmount)?;
        if amount.atomic != quote.amount.atomic {
            tracing::warn!(
                quoted = quote.amount.atomic,
                charged = amount.atomic,
                "Server receipt amount differs from the quote"
            );
        }
        let merchant = wire.merchant.clone().unwrap_or_else(|| quote.recipient.clone());
        if merchant != quote.recipient {
            tracing::warn!(quoted = %quote.recipient, %merchant, "Server receipt names another merchant");
        }
        Ok(Receipt {
            amount_paid_atomic: amount.atomic,
            amount_paid: amount.decimal,
            payer: wire.payer.clone().unwrap_or_else(|| proof.payer.clone()),
            merchant,
            transaction: wire
                .transaction
                .clone()
                .or_else(|| proof.settlement_reference.clone()),
            timestamp: wire.unix_timestamp(),
            source: ReceiptSource::Server,
        })
    }

    fn from_settlement(
        settlement: &SettlementResponse,
        quote: &Quote,
        proof: &PaymentProof,
    ) -> Receipt {
        Receipt {
            amount_paid_atomic: quote.amount.atomic,
            amount_paid: quote.amount.decimal,
            payer: settlement.payer.clone().unwrap_or_else(|| proof.payer.clone()),
            merchant: quote.recipient.clone(),
            transaction: settlement
                .transaction
                .clone()
                .filter(|tx| !tx.is_empty())
                .or_else(|| proof.settlement_reference.clone()),
            timestamp: Some(UnixTimestamp::now()),
            source: ReceiptSource::SettlementHeader,
        }
    }

    fn reconstruct(quote: &Quote, proof: &PaymentProof) -> Receipt {
        tracing::warn!(
            chain = %quote.chain,
            amount = quote.amount.atomic,
            "Server returned no receipt, reconstructing it from the quote"
        );
        Receipt {
            amount_paid_atomic: quote.amount.atomic,
            amount_paid: quote.amount.decimal,
            payer: proof.payer.clone(),
            merchant: quote.recipient.clone(),
            transaction: proof.settlement_reference.clone(),
            timestamp: Some(UnixTimestamp::now()),
            source: ReceiptSource::Reconstructed,
        }
    }
}
