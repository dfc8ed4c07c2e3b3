//! Normalization of quoted prices into atomic units.
//!
//! Servers quote prices loosely: `"0.03"` (decimal USDC), `"30000"` (atomic units),
//! `30000` or `0.03` as JSON numbers. [`RawAmount`] captures the wire shape as a tagged
//! union and [`normalize`] applies one fixed interpretation order:
//!
//! 1. absent → [`MIN_ATOMIC_AMOUNT`]
//! 2. string with a decimal point → decimal currency, scaled by 10^[`ATOMIC_DECIMALS`], floored
//! 3. string without a decimal point → atomic integer
//! 4. number below 1 → decimal currency, scaled and floored
//! 5. number of at least 1 → already atomic, floored
//!
//! Anything unparsable degrades to [`MIN_ATOMIC_AMOUNT`] instead of failing.
//!
//! The number rule is ambiguous by construction: `1.5` is read as 1 atomic unit, not
//! 1.5 USDC. It is kept for compatibility with servers that emit either form.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fallback charge when a quote carries no usable amount: 0.01 USDC.
pub const MIN_ATOMIC_AMOUNT: u64 = 10_000;

/// Decimal places of the settlement currency (USDC).
pub const ATOMIC_DECIMALS: u32 = 6;

static NON_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\d\.\-]+").expect("valid amount regex"));

/// A price exactly as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Text(String),
    Atomic(u64),
    Number(f64),
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

impl From<u64> for RawAmount {
    fn from(value: u64) -> Self {
        RawAmount::Atomic(value)
    }
}

impl From<f64> for RawAmount {
    fn from(value: f64) -> Self {
        RawAmount::Number(value)
    }
}

impl RawAmount {
    /// Reads the value strictly as atomic units, without the decimal heuristics.
    ///
    /// Used for fields whose name already says "atomic", e.g. a receipt's `amountPaidAtomic`.
    pub fn strict_atomic(&self) -> Option<u64> {
        match self {
            RawAmount::Text(s) => s.trim().parse().ok(),
            RawAmount::Atomic(n) => Some(*n),
            RawAmount::Number(f) if f.is_finite() && *f >= 0.0 && f.fract() == 0.0 => {
                f.to_u64()
            }
            RawAmount::Number(_) => None,
        }
    }

    /// Reads the value strictly as decimal currency units.
    pub fn strict_decimal(&self) -> Option<NormalizedAmount> {
        let decimal = match self {
            RawAmount::Text(s) => Decimal::from_str(s.trim()).ok()?,
            RawAmount::Atomic(n) => Decimal::from(*n),
            RawAmount::Number(f) => Decimal::from_f64(*f)?,
        };
        NormalizedAmount::from_decimal(decimal)
    }
}

/// A price in atomic units together with its decimal display value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAmount {
    pub atomic: u64,
    pub decimal: Decimal,
}

impl NormalizedAmount {
    pub fn from_atomic(atomic: u64) -> Self {
        let decimal = Decimal::from_i128_with_scale(atomic as i128, ATOMIC_DECIMALS);
        Self {
            atomic,
            decimal: decimal.normalize(),
        }
    }

    /// Scales a decimal currency value to atomic units, flooring any excess precision.
    /// `None` for negative or out-of-range values.
    pub fn from_decimal(decimal: Decimal) -> Option<Self> {
        if decimal.is_sign_negative() {
            return None;
        }
        let scaled = decimal.checked_mul(Decimal::from(10u64.pow(ATOMIC_DECIMALS)))?;
        let atomic = scaled.floor().to_u64()?;
        Some(Self::from_atomic(atomic))
    }

    pub fn minimum() -> Self {
        Self::from_atomic(MIN_ATOMIC_AMOUNT)
    }

    /// The decimal value as a float, for display only.
    pub fn as_f64(&self) -> f64 {
        self.decimal.to_f64().unwrap_or_default()
    }
}

impl fmt::Display for NormalizedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} atomic)", self.decimal, self.atomic)
    }
}

/// Converts a quoted price into a canonical atomic amount. See the module docs for the rules.
pub fn normalize(raw: Option<&RawAmount>) -> NormalizedAmount {
    let Some(raw) = raw else {
        return NormalizedAmount::minimum();
    };
    let normalized = match raw {
        RawAmount::Text(text) => normalize_text(text),
        RawAmount::Atomic(atomic) => Some(NormalizedAmount::from_atomic(*atomic)),
        RawAmount::Number(number) => normalize_number(*number),
    };
    normalized.unwrap_or_else(|| {
        tracing::warn!(?raw, "Unparsable quoted amount, using the minimum charge");
        NormalizedAmount::minimum()
    })
}

fn normalize_text(text: &str) -> Option<NormalizedAmount> {
    let cleaned = NON_NUMERIC.replace_all(text, "");
    if cleaned.contains('.') {
        let decimal = Decimal::from_str(&cleaned).ok()?;
        NormalizedAmount::from_decimal(decimal)
    } else {
        cleaned.parse::<u64>().ok().map(NormalizedAmount::from_atomic)
    }
}

fn normalize_number(number: f64) -> Option<NormalizedAmount> {
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    if number < 1.0 {
        NormalizedAmount::from_decimal(Decimal::from_f64(number)?)
    } else {
        number.floor().to_u64().map(NormalizedAmount::from_atomic)
    }
}
