//! The pay-per-call protocol client.
//!
//! One call runs through these states:
//!
//! ```text
//! unpaid attempt ──(2xx)──────────────────────────────────────────► result
//!        │
//!        └─(402)─► quote ─► identity ─► proof ─► paid retry ─(2xx)─► receipt ─► result
//!                                                     │
//!                                                     └─(202 / statusHandle)──► result with job
//! ```
//!
//! A `402` is only ever answered once. A second `402` on the paid retry is
//! [`X402PayerError::PaymentRejected`]; the client never signs a second proof for
//! the same call.

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use x402_payer_solana::RpcClientLike;
use x402_payer_types::chain::{ChainFamily, ChainId};
use x402_payer_types::proto::{
    InteractionResult, JobHandle, JobStatus, PAYMENT_HEADER, PAYMENT_REQUIRED_HEADER,
    PAYMENT_RESPONSE_HEADER, PaymentProof, PaymentRequired, Quote, QuoteError, ResponseBody,
    ResponseEnvelope, SettlementResponse,
};
use x402_payer_types::util::Base64Bytes;

use crate::config::PayerConfig;
use crate::error::X402PayerError;
use crate::poller::{JobPoller, PollOptions};
use crate::proof::PaymentProofFactory;
use crate::receipt::ReceiptParser;
use crate::wallet::WalletResolver;

/// An HTTP request that may need paying for.
///
/// The body is kept as bytes so the paid retry sends exactly what the unpaid
/// attempt sent.
#[derive(Debug, Clone)]
pub struct PaidRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl PaidRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A `POST` with `payload` serialized as JSON.
    pub fn post_json<T: Serialize + ?Sized>(url: Url, payload: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(payload)?;
        Ok(Self::new(Method::POST, url)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Token balance of a wallet on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub chain: ChainId,
    pub owner: String,
    pub token: String,
    pub atomic: u64,
    pub decimal: Decimal,
}

impl Balance {
    fn new(chain: ChainId, owner: String, token: String, atomic: u64, decimals: u8) -> Self {
        let decimal = Decimal::from_i128_with_scale(atomic as i128, decimals as u32).normalize();
        Self {
            chain,
            owner,
            token,
            atomic,
            decimal,
        }
    }
}

/// Pays for HTTP calls that answer `402 Payment Required`.
///
/// Cloning is cheap; clones share the wallet cache and the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct X402Payer {
    http: ClientWithMiddleware,
    wallets: Arc<WalletResolver>,
    proofs: PaymentProofFactory,
    evm_rpc_urls: HashMap<ChainId, Url>,
    max_amount_atomic: Option<u64>,
    poll_interval: Option<Duration>,
    max_poll_attempts: Option<u32>,
}

impl X402Payer {
    pub fn new(wallets: WalletResolver) -> Self {
        Self {
            http: reqwest::Client::new().into(),
            wallets: Arc::new(wallets),
            proofs: PaymentProofFactory::new(),
            evm_rpc_urls: HashMap::new(),
            max_amount_atomic: None,
            poll_interval: None,
            max_poll_attempts: None,
        }
    }

    /// A client wired from a config file: wallets, RPC endpoints, spending limit and
    /// polling defaults.
    pub fn from_config(config: &PayerConfig) -> Self {
        let mut payer = Self::new(WalletResolver::from_config(config));
        if let Some(url) = config.solana_rpc_url() {
            let rpc = solana_client::nonblocking::rpc_client::RpcClient::new(url.to_string());
            payer = payer.with_solana_rpc(Arc::new(rpc));
        }
        payer.evm_rpc_urls = config.evm_rpc_endpoints();
        payer.max_amount_atomic = config.max_amount_atomic;
        payer.poll_interval = config.poll_interval;
        payer.max_poll_attempts = config.max_poll_attempts;
        payer
    }

    /// Sends every request through `http`, e.g. a client with retry or tracing middleware.
    pub fn with_http_client(mut self, http: impl Into<ClientWithMiddleware>) -> Self {
        self.http = http.into();
        self
    }

    pub fn with_solana_rpc(mut self, rpc: Arc<dyn RpcClientLike>) -> Self {
        self.proofs = self.proofs.with_solana_rpc(rpc);
        self
    }

    pub fn with_evm_rpc(mut self, chain: ChainId, url: Url) -> Self {
        self.evm_rpc_urls.insert(chain, url);
        self
    }

    /// Refuses quotes above `atomic` units before anything is signed.
    pub fn with_max_amount(mut self, atomic: u64) -> Self {
        self.max_amount_atomic = Some(atomic);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = Some(attempts);
        self
    }

    pub fn wallets(&self) -> &WalletResolver {
        &self.wallets
    }

    /// Calls `target`: `POST` with the JSON `payload` if one is given, `GET` otherwise.
    pub async fn send(
        &self,
        target: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<InteractionResult, X402PayerError> {
        let url = Url::parse(target).map_err(|e| X402PayerError::invalid_url(target, e))?;
        let request = match payload {
            Some(payload) => PaidRequest::post_json(url, payload)?,
            None => PaidRequest::get(url),
        };
        self.send_request(request).await
    }

    #[tracing::instrument(name = "x402.payer.send", skip_all, err, fields(method = %request.method, url = %request.url))]
    pub async fn send_request(&self, request: PaidRequest) -> Result<InteractionResult, X402PayerError> {
        let response = self.execute(&request, &request.url, None).await?;
        let status = response.status();
        if status != StatusCode::PAYMENT_REQUIRED {
            if !status.is_success() {
                return Err(transport_error(status, response).await);
            }
            tracing::debug!(%status, "Call needed no payment");
            return self.finish(response, None).await;
        }

        tracing::info!("Payment required, reading the quote");
        let payment_required = parse_payment_required(response).await?;
        let quote = Quote::from_payment_required(&payment_required)?;
        quote.ensure_within(self.max_amount_atomic)?;
        tracing::debug!(chain = %quote.chain, amount = %quote.amount, recipient = %quote.recipient, "Quote accepted");

        let identity = self.wallets.resolve(quote.family)?;
        tracing::debug!(family = %identity.family(), payer = %identity.address(), "Identity resolved");
        let proof = self.proofs.build(&quote, &identity).await?;

        let retry_url = retry_url(&request.url, &quote)?;
        let response = self.execute(&request, &retry_url, Some(&proof)).await?;
        let status = response.status();
        if status == StatusCode::PAYMENT_REQUIRED {
            let body = response_text(response).await;
            tracing::warn!(%status, "Paid retry was answered with another payment request");
            return Err(X402PayerError::PaymentRejected { status, body });
        }
        if !status.is_success() {
            return Err(transport_error(status, response).await);
        }
        self.finish(response, Some((quote, proof))).await
    }

    /// Polls a job returned by [`X402Payer::send`] with this client's transport.
    ///
    /// `options` of `None` uses the configured attempt budget and interval.
    pub async fn poll(
        &self,
        handle: &JobHandle,
        options: Option<PollOptions>,
    ) -> Result<JobStatus, X402PayerError> {
        let options = options.unwrap_or_else(|| self.default_poll_options());
        self.poller().poll(handle, &options).await
    }

    /// [`X402Payer::poll`] with a callback invoked after every status check.
    pub async fn poll_with_progress<F>(
        &self,
        handle: &JobHandle,
        options: Option<PollOptions>,
        on_progress: F,
    ) -> Result<JobStatus, X402PayerError>
    where
        F: FnMut(&JobStatus),
    {
        let options = options.unwrap_or_else(|| self.default_poll_options());
        self.poller()
            .poll_with_progress(handle, &options, on_progress)
            .await
    }

    fn poller(&self) -> JobPoller {
        JobPoller::new(self.http.clone())
    }

    fn default_poll_options(&self) -> PollOptions {
        let mut options = PollOptions::default();
        if let Some(attempts) = self.max_poll_attempts {
            options.max_attempts = attempts;
        }
        options.interval_override = self.poll_interval;
        options
    }

    /// USDC balance of `owner` on `chain`, or of the payer's own wallet if `owner` is `None`.
    #[tracing::instrument(name = "x402.payer.balance", skip_all, err, fields(chain = %chain))]
    pub async fn balance(&self, chain: &str, owner: Option<&str>) -> Result<Balance, X402PayerError> {
        let chain_id =
            ChainId::from_quoted(chain).ok_or_else(|| QuoteError::UnsupportedChain(chain.to_string()))?;
        let family = chain_id
            .family()
            .ok_or_else(|| QuoteError::UnsupportedChain(chain.to_string()))?;
        let missing_rpc = || X402PayerError::MissingRpc {
            family,
            chain: chain_id.to_string(),
        };
        let no_token = || X402PayerError::Balance {
            chain: chain_id.to_string(),
            reason: "no known USDC deployment".to_string(),
        };
        match family {
            ChainFamily::AccountModel => {
                let rpc = self.proofs.solana_rpc().ok_or_else(missing_rpc)?;
                let usdc = x402_payer_solana::chain::usdc_deployment(&chain_id).ok_or_else(no_token)?;
                let owner = match owner {
                    Some(owner) => solana_pubkey::Pubkey::from_str(owner.trim())
                        .map_err(|_| invalid_owner(family, owner))?,
                    None => self.wallets.solana()?.pubkey(),
                };
                let balance = x402_payer_solana::balance::token_balance(&**rpc, &owner, &usdc.address)
                    .await
                    .map_err(|e| X402PayerError::Balance {
                        chain: chain_id.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Balance::new(
                    chain_id.clone(),
                    owner.to_string(),
                    usdc.address.to_string(),
                    balance.amount,
                    balance.decimals,
                ))
            }
            ChainFamily::Evm => {
                let rpc_url = self.evm_rpc_urls.get(&chain_id).ok_or_else(missing_rpc)?;
                let usdc = x402_payer_eip155::chain::usdc_deployment(&chain_id).ok_or_else(no_token)?;
                let owner = match owner {
                    Some(owner) => alloy_primitives::Address::from_str(owner.trim())
                        .map_err(|_| invalid_owner(family, owner))?,
                    None => self.wallets.evm()?.address(),
                };
                let atomic = x402_payer_eip155::chain::erc20::token_balance(rpc_url, usdc.address, owner)
                    .await
                    .map_err(|e| X402PayerError::Balance {
                        chain: chain_id.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Balance::new(
                    chain_id.clone(),
                    owner.to_string(),
                    usdc.address.to_string(),
                    atomic.saturating_to::<u64>(),
                    usdc.decimals,
                ))
            }
        }
    }

    async fn execute(
        &self,
        request: &PaidRequest,
        url: &Url,
        proof: Option<&PaymentProof>,
    ) -> Result<reqwest::Response, X402PayerError> {
        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());
        if let Some(proof) = proof {
            let value = HeaderValue::from_str(proof.header_value()).map_err(|e| {
                X402PayerError::ProtocolViolation(format!("payment header is not a valid header value: {e}"))
            })?;
            builder = builder.header(PAYMENT_HEADER, value);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.body(body.clone());
        }
        Ok(builder.send().await?)
    }

    /// Normalizes a successful response. `paid` carries the quote and the spent proof.
    async fn finish(
        &self,
        response: reqwest::Response,
        paid: Option<(Quote, PaymentProof)>,
    ) -> Result<InteractionResult, X402PayerError> {
        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(reqwest_middleware::Error::Reqwest)?;

        let body = ResponseBody::parse(&bytes);
        let envelope = body.envelope();
        let job = job_handle(status, envelope, &headers, &url)?;
        let (payload, format) = body.payload();
        let mut result = InteractionResult {
            success: envelope.and_then(|e| e.success).unwrap_or(true),
            status: status.as_u16(),
            response: payload,
            format,
            media: envelope.and_then(|e| e.media.clone()).unwrap_or_default(),
            settlement_reference: None,
            receipt: None,
            quote: None,
            job,
        };

        if let Some((quote, proof)) = paid {
            let settlement = headers
                .get(PAYMENT_RESPONSE_HEADER)
                .and_then(|v| Base64Bytes::from(v.as_bytes()).decode_json::<SettlementResponse>());
            let declared = envelope.is_some_and(|e| e.receipt.is_some());
            let settled = settlement.as_ref().is_some_and(|s| s.success);
            let receipt = if result.job.is_some() && !declared && settlement.is_none() {
                None
            } else if !result.success && !declared && !settled {
                tracing::warn!(
                    chain = %quote.chain,
                    "Paid call reported failure without a receipt, not reconstructing one"
                );
                None
            } else {
                let receipt = ReceiptParser::parse(&body, settlement.as_ref(), &quote, &proof)
                    .map_err(|e| X402PayerError::ProtocolViolation(e.to_string()))?;
                Some(receipt)
            };
            result.settlement_reference = receipt
                .as_ref()
                .and_then(|r| r.transaction.clone())
                .or_else(|| proof.settlement_reference.clone());
            result.receipt = receipt;
            result.quote = Some(quote);
        }

        if let Some(job) = result.job.as_ref() {
            tracing::debug!(status_url = %job.status_url, "Server accepted the call for processing");
        }
        Ok(result)
    }
}

/// Reads the payment request from the `Payment-Required` header, then from the body.
async fn parse_payment_required(response: reqwest::Response) -> Result<PaymentRequired, X402PayerError> {
    let from_header = response
        .headers()
        .get(PAYMENT_REQUIRED_HEADER)
        .and_then(|h| Base64Bytes::from(h.as_bytes()).decode_json::<PaymentRequired>())
        .filter(|p| !p.price_options.is_empty());
    if let Some(payment_required) = from_header {
        tracing::debug!("Read payment request from header");
        return Ok(payment_required);
    }
    let bytes = response
        .bytes()
        .await
        .map_err(reqwest_middleware::Error::Reqwest)?;
    let payment_required = serde_json::from_slice::<PaymentRequired>(&bytes)
        .map_err(|e| QuoteError::Unparsable(e.to_string()))?;
    tracing::debug!("Read payment request from body");
    Ok(payment_required)
}

/// The quoted resource, resolved against the original URL, or the original URL.
fn retry_url(original: &Url, quote: &Quote) -> Result<Url, X402PayerError> {
    match quote.resource.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(resource) => original
            .join(resource)
            .map_err(|e| X402PayerError::invalid_url(resource, e)),
        None => Ok(original.clone()),
    }
}

fn job_handle(
    status: StatusCode,
    envelope: Option<&ResponseEnvelope>,
    headers: &HeaderMap,
    base: &Url,
) -> Result<Option<JobHandle>, X402PayerError> {
    let declared = envelope.and_then(|e| e.status_handle.as_deref());
    let location = headers.get(header::LOCATION).and_then(|v| v.to_str().ok());
    let handle = match (declared, status == StatusCode::ACCEPTED) {
        (Some(handle), _) => handle,
        (None, true) => match location {
            Some(location) => location,
            None => {
                tracing::warn!("Call accepted without a status handle to poll");
                return Ok(None);
            }
        },
        (None, false) => return Ok(None),
    };
    let status_url = base
        .join(handle.trim())
        .map_err(|e| X402PayerError::invalid_url(handle, e))?;
    let retry_after = headers
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    Ok(Some(JobHandle {
        status_url,
        poll_interval: envelope
            .and_then(|e| e.poll_interval_seconds)
            .and_then(seconds)
            .or(retry_after),
        eta: envelope.and_then(|e| e.eta_seconds).and_then(seconds),
    }))
}

fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok().filter(|d| !d.is_zero())
}

fn invalid_owner(family: ChainFamily, owner: &str) -> X402PayerError {
    X402PayerError::InvalidAddress {
        family,
        address: owner.to_string(),
    }
}

async fn response_text(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

async fn transport_error(status: StatusCode, response: reqwest::Response) -> X402PayerError {
    let body = response_text(response).await;
    tracing::debug!(%status, "Call failed");
    X402PayerError::Transport { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;
    use serde_json::{Value, json};
    use solana_keypair::Keypair;
    use solana_signer::Signer;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use x402_payer_eip155::EvmIdentity;
    use x402_payer_eip155::exact::ExactEvmPayload;
    use x402_payer_solana::SolanaIdentity;
    use x402_payer_solana::test_utils::{MockLedger, mint_account};
    use x402_payer_types::proto::{JobState, PaymentEnvelope, ReceiptSource};

    use crate::wallet::WalletError;

    const MERCHANT: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
    const USDC_DEVNET: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";

    fn evm_payer() -> (X402Payer, EvmIdentity) {
        let identity = EvmIdentity::new(PrivateKeySigner::random());
        let wallets = WalletResolver::default().with_evm_identity(identity.clone());
        (X402Payer::new(wallets), identity)
    }

    fn evm_quote(amount: &str) -> Value {
        json!({
            "x402Version": 1,
            "error": "X-PAYMENT header is required",
            "accepts": [{
                "scheme": "exact",
                "network": "base-sepolia",
                "maxAmountRequired": amount,
                "payTo": MERCHANT,
                "asset": USDC_BASE_SEPOLIA,
                "maxTimeoutSeconds": 60,
                "extra": {"name": "USDC", "version": "2"}
            }]
        })
    }

    async fn mount_paid(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/tool"))
            .and(header_exists(PAYMENT_HEADER))
            .respond_with(response)
            .with_priority(1)
            .mount(server)
            .await;
    }

    async fn mount_paywall(server: &MockServer, quote: Value) {
        Mock::given(method("POST"))
            .and(path("/tool"))
            .respond_with(ResponseTemplate::new(402).set_body_json(quote))
            .with_priority(2)
            .mount(server)
            .await;
    }

    fn tool_url(server: &MockServer) -> String {
        format!("{}/tool", server.uri())
    }

    #[tokio::test]
    async fn test_free_call_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/free"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let payer = X402Payer::new(WalletResolver::default());
        let result = payer
            .send(&format!("{}/free", server.uri()), None)
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.is_paid());
        assert_eq!(result.response, json!({"answer": 42}));
        assert_eq!(result.format, "json");
        assert!(result.receipt.is_none());
    }

    #[tokio::test]
    async fn test_plain_text_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let payer = X402Payer::new(WalletResolver::default());
        let result = payer.send(&server.uri(), None).await.unwrap();
        assert_eq!(result.response, json!("hello"));
        assert_eq!(result.format, "text");
    }

    #[tokio::test]
    async fn test_evm_payment_flow() {
        let server = MockServer::start().await;
        mount_paid(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "response": "## Report",
                "format": "markdown",
                "receipt": {"amountPaidAtomic": "30000", "payer": "ignored", "txHash": "0xfeed"}
            })),
        )
        .await;
        mount_paywall(&server, evm_quote("30000")).await;

        let (payer, identity) = evm_payer();
        let payload = json!({"query": "weather", "units": "metric"});
        let result = payer.send(&tool_url(&server), Some(&payload)).await.unwrap();

        assert!(result.is_paid());
        assert_eq!(result.format, "markdown");
        assert_eq!(result.response, json!("## Report"));
        assert_eq!(result.settlement_reference.as_deref(), Some("0xfeed"));
        let receipt = result.receipt.unwrap();
        assert_eq!(receipt.amount_paid_atomic, 30_000);
        assert_eq!(receipt.merchant, MERCHANT);
        assert_eq!(receipt.source, ReceiptSource::Server);
        assert_eq!(result.quote.unwrap().amount.atomic, 30_000);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].headers.get(PAYMENT_HEADER).is_none());
        assert_eq!(requests[0].body, requests[1].body);
        let header = requests[1].headers.get(PAYMENT_HEADER).unwrap();
        let envelope: PaymentEnvelope<ExactEvmPayload> =
            Base64Bytes::from(header.as_bytes()).decode_json().unwrap();
        assert_eq!(envelope.chain, "base-sepolia");
        assert_eq!(envelope.payload.authorization.from, identity.address());
        assert_eq!(envelope.payload.authorization.value, alloy_primitives::U256::from(30_000u64));
    }

    #[tokio::test]
    async fn test_receipt_with_redundant_spellings_and_odd_media() {
        let server = MockServer::start().await;
        mount_paid(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "response": "ok",
                "media": {"url": "https://cdn.example.com/chart.png"},
                "receipt": {
                    "amountPaidAtomic": 70000,
                    "payer": "P",
                    "from": "P",
                    "merchant": MERCHANT,
                    "recipient": MERCHANT,
                    "txHash": "0xabc"
                }
            })),
        )
        .await;
        let mut quote = evm_quote("70000");
        quote["accepts"][0]["amount"] = json!("70000");
        quote["accepts"][0]["recipient"] = json!(MERCHANT);
        mount_paywall(&server, quote).await;

        let (payer, _) = evm_payer();
        let result = payer.send(&tool_url(&server), Some(&json!({}))).await.unwrap();

        assert!(result.success);
        assert!(result.media.is_empty());
        let receipt = result.receipt.unwrap();
        assert_eq!(receipt.source, ReceiptSource::Server);
        assert_eq!(receipt.amount_paid_atomic, 70_000);
        assert_eq!(receipt.payer, "P");
        assert_eq!(receipt.merchant, MERCHANT);
        assert_eq!(result.settlement_reference.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_failed_paid_call_is_not_given_a_receipt() {
        let server = MockServer::start().await;
        mount_paid(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "response": "upstream model unavailable"})),
        )
        .await;
        mount_paywall(&server, evm_quote("30000")).await;

        let (payer, _) = evm_payer();
        let result = payer.send(&tool_url(&server), Some(&json!({}))).await.unwrap();

        assert!(!result.success);
        assert!(result.is_paid());
        assert!(result.receipt.is_none());
        assert_eq!(result.response, json!("upstream model unavailable"));
    }

    #[tokio::test]
    async fn test_quote_from_header() {
        let server = MockServer::start().await;
        mount_paid(&server, ResponseTemplate::new(200).set_body_string("done")).await;
        let encoded = Base64Bytes::encode_json(&evm_quote("0.02")).unwrap().to_string();
        Mock::given(method("POST"))
            .and(path("/tool"))
            .respond_with(ResponseTemplate::new(402).insert_header(PAYMENT_REQUIRED_HEADER, encoded.as_str()))
            .with_priority(2)
            .mount(&server)
            .await;

        let (payer, _) = evm_payer();
        let result = payer
            .send(&tool_url(&server), Some(&json!({})))
            .await
            .unwrap();
        let receipt = result.receipt.unwrap();
        assert_eq!(receipt.amount_paid_atomic, 20_000);
        assert_eq!(receipt.source, ReceiptSource::Reconstructed);
        assert!(result.settlement_reference.is_none());
    }

    #[tokio::test]
    async fn test_solana_payment_flow() {
        let server = MockServer::start().await;
        mount_paid(&server, ResponseTemplate::new(200).set_body_json(json!({"success": true, "response": {"ok": true}}))).await;
        let merchant = Keypair::new().pubkey().to_string();
        let sponsor = Keypair::new().pubkey().to_string();
        mount_paywall(
            &server,
            json!({
                "accepts": [{
                    "network": "solana-devnet",
                    "payTo": merchant,
                    "maxAmountRequired": "50000",
                    "extra": {"feePayer": sponsor}
                }]
            }),
        )
        .await;

        let ledger = Arc::new(
            MockLedger::default()
                .with_account(USDC_DEVNET.parse().unwrap(), mint_account(spl_token::id(), 6)),
        );
        let identity = SolanaIdentity::new(Keypair::new());
        let payer = X402Payer::new(WalletResolver::default().with_solana_identity(identity.clone()))
            .with_solana_rpc(ledger);
        let result = payer
            .send(&tool_url(&server), Some(&json!({"q": 1})))
            .await
            .unwrap();

        let reference = result.settlement_reference.clone().unwrap();
        let receipt = result.receipt.unwrap();
        assert_eq!(receipt.source, ReceiptSource::Reconstructed);
        assert_eq!(receipt.transaction.as_deref(), Some(reference.as_str()));
        assert_eq!(receipt.payer, identity.address());
        assert_eq!(receipt.merchant, merchant);

        let requests = server.received_requests().await.unwrap();
        let header = requests[1].headers.get(PAYMENT_HEADER).unwrap();
        let envelope: Value = Base64Bytes::from(header.as_bytes()).decode_json().unwrap();
        assert_eq!(envelope["payload"]["signature"], json!(reference));
    }

    #[tokio::test]
    async fn test_second_402_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tool"))
            .respond_with(ResponseTemplate::new(402).set_body_json(evm_quote("10000")))
            .expect(2)
            .mount(&server)
            .await;

        let (payer, _) = evm_payer();
        let err = payer
            .send(&tool_url(&server), Some(&json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            X402PayerError::PaymentRejected { status, .. } if status == StatusCode::PAYMENT_REQUIRED
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_not_paid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        // No wallet is configured: reaching the signing stage would fail differently.
        let payer = X402Payer::new(WalletResolver::default());
        let err = payer
            .send(&tool_url(&server), Some(&json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            X402PayerError::Transport { status, ref body } if status.as_u16() == 500 && body == "boom"
        ));
    }

    #[tokio::test]
    async fn test_spending_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_json(evm_quote("2000000")))
            .expect(1)
            .mount(&server)
            .await;

        let (payer, _) = evm_payer();
        let err = payer
            .with_max_amount(1_000_000)
            .send(&tool_url(&server), Some(&json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            X402PayerError::Quote(QuoteError::AboveLimit { quoted: 2_000_000, limit: 1_000_000 })
        ));
    }

    #[tokio::test]
    async fn test_missing_wallet_stops_before_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_json(evm_quote("10000")))
            .expect(1)
            .mount(&server)
            .await;

        let payer = X402Payer::new(WalletResolver::default());
        let err = payer
            .send(&tool_url(&server), Some(&json!({})))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(
            err,
            X402PayerError::Wallet(WalletError::NotFound { family: ChainFamily::Evm, .. })
        ));
    }

    #[tokio::test]
    async fn test_unparsable_payment_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_string("pay up"))
            .mount(&server)
            .await;

        let (payer, _) = evm_payer();
        let err = payer
            .send(&tool_url(&server), Some(&json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, X402PayerError::Quote(QuoteError::Unparsable(_))));
    }

    #[tokio::test]
    async fn test_receipt_without_amount_is_a_violation() {
        let server = MockServer::start().await;
        mount_paid(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "receipt": {"payer": "0xabc"}})),
        )
        .await;
        mount_paywall(&server, evm_quote("10000")).await;

        let (payer, _) = evm_payer();
        let err = payer
            .send(&tool_url(&server), Some(&json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, X402PayerError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn test_async_job_then_poll() {
        let server = MockServer::start().await;
        mount_paid(
            &server,
            ResponseTemplate::new(202)
                .insert_header("Retry-After", "7")
                .set_body_json(json!({"success": true, "statusHandle": "/jobs/9", "etaSeconds": 30})),
        )
        .await;
        mount_paywall(&server, evm_quote("10000")).await;
        Mock::given(method("GET"))
            .and(path("/jobs/9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"state": "succeeded", "result": "ready"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (payer, _) = evm_payer();
        let result = payer
            .send(&tool_url(&server), Some(&json!({})))
            .await
            .unwrap();
        assert!(result.is_pending());
        assert!(result.receipt.is_none());
        let job = result.job.unwrap();
        assert_eq!(job.status_url.as_str(), format!("{}/jobs/9", server.uri()));
        assert_eq!(job.poll_interval, Some(Duration::from_secs(7)));
        assert_eq!(job.eta, Some(Duration::from_secs(30)));

        let status = payer
            .poll(&job, Some(PollOptions::default().with_max_attempts(2)))
            .await
            .unwrap();
        assert_eq!(status.state, JobState::Succeeded);
        assert_eq!(status.result, Some(json!("ready")));
    }

    #[tokio::test]
    async fn test_balance_without_rpc() {
        let (payer, _) = evm_payer();
        let err = payer.balance("base-sepolia", None).await.unwrap_err();
        assert!(matches!(err, X402PayerError::MissingRpc { family: ChainFamily::Evm, .. }));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_solana_balance() {
        let owner = Keypair::new().pubkey();
        let mint: solana_pubkey::Pubkey = USDC_DEVNET.parse().unwrap();
        let ata = x402_payer_solana::exact::associated_token_address(&owner, &spl_token::id(), &mint);
        let ledger = MockLedger::default()
            .with_account(mint, mint_account(spl_token::id(), 6))
            .with_account(
                ata,
                x402_payer_solana::test_utils::token_account(&mint, &owner, 1_250_000),
            );
        let payer = X402Payer::new(WalletResolver::default()).with_solana_rpc(Arc::new(ledger));

        let balance = payer
            .balance("solana-devnet", Some(&owner.to_string()))
            .await
            .unwrap();
        assert_eq!(balance.atomic, 1_250_000);
        assert_eq!(balance.decimal, Decimal::new(125, 2));
        assert_eq!(balance.token, USDC_DEVNET);
    }

    #[tokio::test]
    async fn test_balance_rejects_unknown_chain() {
        let payer = X402Payer::new(WalletResolver::default());
        let err = payer.balance("cosmos:hub", None).await.unwrap_err();
        assert!(matches!(err, X402PayerError::Quote(QuoteError::UnsupportedChain(_))));
    }
}
