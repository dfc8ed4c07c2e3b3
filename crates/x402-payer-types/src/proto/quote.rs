use serde::{Deserialize, Deserializer, Serialize};

use crate::chain::{ChainFamily, ChainId};
use crate::proto::DEFAULT_SCHEME;
use crate::util::{Fields, NormalizedAmount, RawAmount, normalize};

/// Validity window requested for an authorization when the quote does not say.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Body (or decoded header) of a `402 Payment Required` response.
///
/// Options are kept as raw JSON so one malformed option does not hide the others.
/// They are read from `priceOptions`, then `accepts`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub price_options: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
}

impl<'de> Deserialize<'de> for PaymentRequired {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::deserialize(deserializer)?;
        let fields = Fields::new(&map, "payment request");
        Ok(Self {
            price_options: fields
                .first::<Vec<serde_json::Value>>(&["priceOptions", "accepts"])
                .unwrap_or_default(),
            error: fields.first(&["error"]),
            resource: fields.first(&["resource"]),
        })
    }
}

/// A resource to retry against: either a bare URL or an object with a `url` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Url(String),
    Object { url: String },
}

impl ResourceRef {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceRef::Url(url) => url,
            ResourceRef::Object { url } => url,
        }
    }
}

/// One priced option as a server may spell it.
///
/// Canonical and x402 v1 spellings may appear side by side; the first present,
/// well-typed one wins:
///
/// | Field | Spellings |
/// | --- | --- |
/// | `chain` | `chain`, `network` |
/// | `recipient` | `recipient`, `payTo`, `merchant` |
/// | `atomic_amount_required` | `atomicAmountRequired`, `maxAmountRequired`, `amount`, `price` |
/// | `resource` | `resource`, `resourceUrl` |
/// | `sponsor` | `sponsor`, `feePayer` (then `extra.feePayer`, see [`Quote`]) |
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceOption {
    pub chain: Option<String>,
    pub recipient: Option<String>,
    pub atomic_amount_required: Option<RawAmount>,
    pub scheme: Option<String>,
    pub resource: Option<ResourceRef>,
    pub sponsor: Option<String>,
    pub asset: Option<String>,
    pub max_timeout_seconds: Option<u64>,
    pub extra: Option<PriceOptionExtra>,
}

impl PriceOption {
    pub fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            chain: fields.first(&["chain", "network"]),
            recipient: fields.first(&["recipient", "payTo", "merchant"]),
            atomic_amount_required: fields.first(&[
                "atomicAmountRequired",
                "maxAmountRequired",
                "amount",
                "price",
            ]),
            scheme: fields.first(&["scheme"]),
            resource: fields.first(&["resource", "resourceUrl"]),
            sponsor: fields.first(&["sponsor", "feePayer"]),
            asset: fields.first(&["asset"]),
            max_timeout_seconds: fields.first(&["maxTimeoutSeconds"]),
            extra: fields.first(&["extra"]),
        }
    }
}

impl<'de> Deserialize<'de> for PriceOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::deserialize(deserializer)?;
        Ok(Self::from_fields(Fields::new(&map, "price option")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceOptionExtra {
    /// EIP-712 domain name of the token contract.
    pub name: Option<String>,
    /// EIP-712 domain version of the token contract.
    pub version: Option<String>,
    pub fee_payer: Option<String>,
}

/// The priced option the payer committed to pay, after validation and normalization.
///
/// Immutable once parsed and scoped to a single paid call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub chain: ChainId,
    pub family: ChainFamily,
    /// The chain exactly as the server quoted it; echoed back in the payment envelope.
    pub network: String,
    pub recipient: String,
    pub amount: NormalizedAmount,
    pub scheme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    pub max_timeout_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<PriceOptionExtra>,
}

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("Payment required response carries no priced option")]
    NoPriceOptions,
    #[error("Payment required response is not valid JSON: {0}")]
    Unparsable(String),
    #[error("Priced option on {chain} has no recipient address")]
    MissingRecipient { chain: String },
    #[error("No supported chain among priced options, first offered: {0}")]
    UnsupportedChain(String),
    #[error("Quoted {quoted} atomic units exceed the configured limit of {limit}")]
    AboveLimit { quoted: u64, limit: u64 },
}

impl Quote {
    /// Picks the first priced option on a chain the payer supports and validates it.
    pub fn from_payment_required(payment_required: &PaymentRequired) -> Result<Self, QuoteError> {
        let mut first_unsupported: Option<String> = None;
        for raw in payment_required.price_options.iter() {
            let option = match serde_json::from_value::<PriceOption>(raw.clone()) {
                Ok(option) => option,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed price option");
                    continue;
                }
            };
            let Some(quoted_chain) = option.chain.clone() else {
                continue;
            };
            let chain = ChainId::from_quoted(&quoted_chain);
            let family = chain.as_ref().and_then(ChainId::family);
            match (chain, family) {
                (Some(chain), Some(family)) => {
                    return Self::from_option(
                        option,
                        chain,
                        family,
                        quoted_chain,
                        payment_required.resource.as_ref(),
                    );
                }
                _ => {
                    first_unsupported.get_or_insert(quoted_chain);
                }
            }
        }
        Err(match first_unsupported {
            Some(chain) => QuoteError::UnsupportedChain(chain),
            None => QuoteError::NoPriceOptions,
        })
    }

    fn from_option(
        option: PriceOption,
        chain: ChainId,
        family: ChainFamily,
        network: String,
        fallback_resource: Option<&ResourceRef>,
    ) -> Result<Self, QuoteError> {
        let recipient = option
            .recipient
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| QuoteError::MissingRecipient {
                chain: network.clone(),
            })?;
        let amount = normalize(option.atomic_amount_required.as_ref());
        let sponsor = option
            .sponsor
            .or_else(|| option.extra.as_ref().and_then(|e| e.fee_payer.clone()));
        let resource = option
            .resource
            .as_ref()
            .or(fallback_resource)
            .map(|r| r.as_str().to_string());
        Ok(Quote {
            chain,
            family,
            network,
            recipient,
            amount,
            scheme: option.scheme.unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
            sponsor,
            resource,
            asset: option.asset,
            max_timeout_seconds: option
                .max_timeout_seconds
                .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
            extra: option.extra,
        })
    }

    /// Parses a raw `402` body.
    pub fn from_slice(body: &[u8]) -> Result<Self, QuoteError> {
        let payment_required: PaymentRequired =
            serde_json::from_slice(body).map_err(|e| QuoteError::Unparsable(e.to_string()))?;
        Self::from_payment_required(&payment_required)
    }

    /// Rejects the quote if it asks for more than `limit` atomic units.
    pub fn ensure_within(&self, limit: Option<u64>) -> Result<(), QuoteError> {
        match limit {
            Some(limit) if self.amount.atomic > limit => Err(QuoteError::AboveLimit {
                quoted: self.amount.atomic,
                limit,
            }),
            _ => Ok(()),
        }
    }
}
