use serde::{Deserialize, Deserializer, Serialize};

use crate::proto::{JobHandle, Quote, Receipt};
use crate::util::Fields;

/// Format tag of a plain JSON body that is not wrapped in an envelope.
pub const FORMAT_JSON: &str = "json";
/// Format tag of a body that is not JSON at all.
pub const FORMAT_TEXT: &str = "text";

/// Success body of a (paid) call.
///
/// ```json
/// {"success": true, "response": ..., "format": "markdown", "receipt": {...},
///  "statusHandle": "/jobs/42", "etaSeconds": 30, "media": [...]}
/// ```
///
/// Every field is read on its own: a malformed optional field is logged and
/// dropped without taking the receipt or the status handle with it.
#[derive(Debug, Clone, Default)]
pub struct ResponseEnvelope {
    pub success: Option<bool>,
    pub response: Option<serde_json::Value>,
    pub format: Option<String>,
    /// Kept raw: its shape is resolved by the receipt parser.
    pub receipt: Option<serde_json::Value>,
    pub status_handle: Option<String>,
    pub eta_seconds: Option<f64>,
    pub poll_interval_seconds: Option<f64>,
    pub media: Option<Vec<serde_json::Value>>,
}

impl ResponseEnvelope {
    pub fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            success: fields.first(&["success"]),
            response: fields.raw(&["response"]).cloned(),
            format: fields.first(&["format"]),
            receipt: fields.raw(&["receipt"]).cloned(),
            status_handle: fields.first(&["statusHandle", "statusUrl"]),
            eta_seconds: fields.first(&["etaSeconds"]),
            poll_interval_seconds: fields.first(&["pollIntervalSeconds"]),
            media: fields.first(&["media"]),
        }
    }
}

impl<'de> Deserialize<'de> for ResponseEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::deserialize(deserializer)?;
        Ok(Self::from_fields(Fields::new(&map, "response envelope")))
    }
}

const ENVELOPE_KEYS: [&str; 5] = ["success", "response", "receipt", "statusHandle", "statusUrl"];

/// A response body, classified by shape.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Envelope(ResponseEnvelope),
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    pub fn parse(bytes: &[u8]) -> Self {
        let value = match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(value) => value,
            Err(_) => return ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        };
        if let Some(map) = value.as_object() {
            let fields = Fields::new(map, "response envelope");
            if fields.contains_any(&ENVELOPE_KEYS) {
                return ResponseBody::Envelope(ResponseEnvelope::from_fields(fields));
            }
        }
        ResponseBody::Json(value)
    }

    /// The payload handed back to the caller and its format tag.
    pub fn payload(&self) -> (serde_json::Value, String) {
        match self {
            ResponseBody::Envelope(envelope) => (
                envelope
                    .response
                    .clone()
                    .unwrap_or(serde_json::Value::Null),
                envelope
                    .format
                    .clone()
                    .unwrap_or_else(|| FORMAT_JSON.to_string()),
            ),
            ResponseBody::Json(value) => (value.clone(), FORMAT_JSON.to_string()),
            ResponseBody::Text(text) => {
                (serde_json::Value::String(text.clone()), FORMAT_TEXT.to_string())
            }
        }
    }

    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            ResponseBody::Envelope(envelope) => Some(envelope),
            _ => None,
        }
    }
}

/// The unified outcome of one call, paid or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResult {
    pub success: bool,
    /// HTTP status of the final response.
    pub status: u16,
    pub response: serde_json::Value,
    pub format: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<JobHandle>,
}

impl InteractionResult {
    /// Whether the call was paid for.
    pub fn is_paid(&self) -> bool {
        self.quote.is_some()
    }

    /// Whether the server accepted the call for asynchronous processing.
    pub fn is_pending(&self) -> bool {
        self.job.is_some()
    }
}
