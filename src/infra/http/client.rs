//! Reqwest implementation of the wallet backend.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::domain::{
    BalanceSnapshot, ClientResult, ErrorResult, IdempotencyKey, Quote, QuoteRequest,
    TransferRequest, WalletBackend, WithdrawalSpec,
};

use super::classify::{Flow, RawFailure, classify};

/// Header carrying the client-generated deduplication token.
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// HTTP client for the wallet REST backend.
///
/// Every failure path is classified before it leaves this type: callers
/// receive an [`ErrorResult`], never a raw transport error.
pub struct HttpBackend {
    base_url: String,
    api_token: SecretString,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            client,
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        flow: Flow,
        method: Method,
        path: &str,
        body: Option<Value>,
        key: Option<&IdempotencyKey>,
    ) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(self.api_token.expose_secret());
        if let Some(key) = key {
            request = request.header(IDEMPOTENCY_HEADER, key.as_str());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                // Connect failure or timeout: no response to inspect.
                return Err(classify(
                    flow,
                    &RawFailure::NoResponse {
                        detail: e.to_string(),
                    },
                ));
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        debug!(path = %path, status = status, "backend response");

        if !(200..300).contains(&status) {
            return Err(classify(
                flow,
                &RawFailure::Response {
                    status,
                    body: text,
                },
            ));
        }

        decode_payload(flow, status, &text)
    }
}

/// Unwrap the response envelope defensively.
///
/// Endpoints disagree on shape: `{success, data: T}`, `{data: {data: T}}`,
/// or a bare `T`. A 2xx body with `success: false` is still a failure and
/// goes through the classifier.
fn decode_payload<T: DeserializeOwned>(flow: Flow, status: u16, body: &str) -> ClientResult<T> {
    let value: Value = serde_json::from_str(body).map_err(|_| {
        ErrorResult::unknown(format!("{} returned an unparseable body", flow.name()))
    })?;

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(classify(
            flow,
            &RawFailure::Response {
                status,
                body: body.to_string(),
            },
        ));
    }

    let candidates = [
        value.get("data").and_then(|d| d.get("data")),
        value.get("data"),
        Some(&value),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(payload) = serde_json::from_value::<T>(candidate.clone()) {
            return Ok(payload);
        }
    }

    Err(ErrorResult::unknown(format!(
        "{} returned an unexpected response shape",
        flow.name()
    )))
}

#[derive(Serialize)]
struct WithdrawalBody<'a> {
    kind: &'a str,
    source_asset: &'a str,
    amount: f64,
    destination: &'a crate::domain::Destination,
    two_fa_code: &'a str,
    pin: &'a str,
}

#[async_trait]
impl WalletBackend for HttpBackend {
    async fn create_quote(&self, request: &QuoteRequest) -> ClientResult<Quote> {
        let body = serde_json::to_value(request)
            .map_err(|e| ErrorResult::unknown(format!("failed to encode quote request: {}", e)))?;
        self.execute(Flow::Quote, Method::POST, "/v1/quotes", Some(body), None)
            .await
    }

    async fn accept_quote(
        &self,
        quote_id: &str,
        key: &IdempotencyKey,
    ) -> ClientResult<TransferRequest> {
        let path = format!("/v1/quotes/{}/accept", quote_id);
        self.execute(
            Flow::Commit,
            Method::POST,
            &path,
            Some(Value::Object(Default::default())),
            Some(key),
        )
        .await
    }

    async fn submit_withdrawal(
        &self,
        spec: &WithdrawalSpec,
        key: &IdempotencyKey,
    ) -> ClientResult<TransferRequest> {
        let body = WithdrawalBody {
            kind: spec.kind.as_str(),
            source_asset: &spec.source_asset,
            amount: spec.amount,
            destination: &spec.destination,
            two_fa_code: spec.auth.two_fa_code.expose_secret(),
            pin: spec.auth.pin.expose_secret(),
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| ErrorResult::unknown(format!("failed to encode withdrawal: {}", e)))?;
        self.execute(
            Flow::Withdrawal,
            Method::POST,
            "/v1/withdrawals",
            Some(body),
            Some(key),
        )
        .await
    }

    async fn get_transfer(&self, transaction_id: &str) -> ClientResult<TransferRequest> {
        let path = format!("/v1/transfers/{}", transaction_id);
        self.execute(Flow::Status, Method::GET, &path, None, None)
            .await
    }

    async fn fetch_balances(&self) -> ClientResult<Vec<BalanceSnapshot>> {
        self.execute(Flow::Balances, Method::GET, "/v1/balances", None, None)
            .await
    }
}
