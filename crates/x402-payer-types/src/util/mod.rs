//! Utility types for x402 payers.
//!
//! - [`b64`] - Base64 encoding/decoding utilities
//! - [`amount`] - Normalization of quoted prices into atomic units
//! - [`fields`] - Field lookup across alternative spellings

pub mod amount;
pub mod b64;
pub mod fields;

pub use amount::*;
pub use b64::*;
pub use fields::Fields;
