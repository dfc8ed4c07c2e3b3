//! Wire types and the data model of one paid interaction.
//!
//! The lifecycle of one paid call, in terms of these types:
//!
//! 1. The server answers `402` with a [`PaymentRequired`] body; the first usable
//!    [`PriceOption`] becomes a [`Quote`].
//! 2. The payer signs a [`PaymentEnvelope`] for the quote and carries it as a
//!    single-use [`PaymentProof`] in the [`PAYMENT_HEADER`] of the retry.
//! 3. The retry's body is a [`ResponseEnvelope`]; its receipt (or the
//!    [`SettlementResponse`] header, or the quote itself) becomes a [`Receipt`].
//! 4. Everything is returned as an [`InteractionResult`], with a [`JobHandle`] when
//!    the server accepted the work asynchronously.

mod job;
mod payment;
mod quote;
mod receipt;
mod response;

pub use job::*;
pub use payment::*;
pub use quote::*;
pub use receipt::*;
pub use response::*;

/// Protocol version written into every payment envelope.
pub const X402_VERSION: u8 = 1;

/// Request header carrying the base64 payment envelope on the paid retry.
pub const PAYMENT_HEADER: &str = "X-Payment";

/// Response header some servers use to carry the base64 quote instead of the body.
pub const PAYMENT_REQUIRED_HEADER: &str = "Payment-Required";

/// Response header carrying the base64 settlement result of a paid call.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-Payment-Response";

/// The payment scheme assumed when a price option does not name one.
pub const DEFAULT_SCHEME: &str = "exact";
