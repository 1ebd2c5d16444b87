//! HTTP backend tests against a mock wallet server.

use wiremock::matchers::{body_json_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wallet_transfer_client::{
    ClientConfig, ErrorCode, HttpBackend, IdempotencyKey, QuoteRequest, QuoteSide, QuoteStatus,
    TransferStatus, WalletBackend,
};

fn backend_for(server: &MockServer) -> HttpBackend {
    let config = ClientConfig::new(server.uri(), "secret-token");
    HttpBackend::new(&config).unwrap()
}

fn quote_body() -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": {
            "id": "q_77",
            "from_asset": "BTC",
            "to_asset": "USDT",
            "amount": 0.5,
            "side": "source_given",
            "rate": 60000.0,
            "expires_at": "2099-01-01T00:00:00Z",
            "status": "open"
        }
    })
}

fn transfer_body() -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": {
            "transaction_id": "tx_42",
            "idempotency_key": "k_1",
            "kind": "swap",
            "source_asset": "BTC",
            "destination_asset": "USDT",
            "amount": 0.5,
            "fee": 0.001,
            "status": "pending"
        }
    })
}

#[tokio::test]
async fn test_create_quote_sends_bearer_and_parses_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/quotes"))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_body()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let request = QuoteRequest::new("BTC", "USDT", 0.5, QuoteSide::SourceGiven);
    let quote = backend.create_quote(&request).await.unwrap();

    assert_eq!(quote.id, "q_77");
    assert_eq!(quote.rate, 60000.0);
    assert_eq!(quote.status, QuoteStatus::Open);
}

#[tokio::test]
async fn test_accept_quote_sends_idempotency_header() {
    let server = MockServer::start().await;
    let key = IdempotencyKey::new();

    Mock::given(method("POST"))
        .and(path("/v1/quotes/q_77/accept"))
        .and(header("X-Idempotency-Key", key.as_str()))
        .and(body_json_string("{}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transfer_body()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let transfer = backend.accept_quote("q_77", &key).await.unwrap();
    assert_eq!(transfer.transaction_id, "tx_42");
    assert_eq!(transfer.status, TransferStatus::Pending);
}

#[tokio::test]
async fn test_nested_envelope_is_tolerated() {
    let server = MockServer::start().await;
    let nested = serde_json::json!({ "data": transfer_body() });

    Mock::given(method("GET"))
        .and(path("/v1/transfers/tx_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nested))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let transfer = backend.get_transfer("tx_42").await.unwrap();
    assert_eq!(transfer.transaction_id, "tx_42");
}

#[tokio::test]
async fn test_insufficient_balance_is_classified_non_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/quotes"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "success": false,
            "message": "Insufficient balance for this conversion"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let request = QuoteRequest::new("BTC", "USDT", 99.0, QuoteSide::SourceGiven);
    let err = backend.create_quote(&request).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientBalance);
    assert_eq!(err.http_status, Some(400));
    assert!(!err.retryable);
}

#[tokio::test]
async fn test_bad_2fa_on_401_is_classified_by_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/withdrawals"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "success": false,
            "message": "Invalid 2FA code provided"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let spec = wallet_transfer_client::WithdrawalSpec {
        kind: wallet_transfer_client::TransferKind::Withdrawal,
        source_asset: "BTC".to_string(),
        amount: 0.1,
        destination: wallet_transfer_client::Destination::External {
            address: "bc1qsomewhere".to_string(),
            network: None,
        },
        auth: wallet_transfer_client::AuthProof::new("123456", "654321"),
    };
    let err = backend
        .submit_withdrawal(&spec, &IdempotencyKey::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Invalid2faCode);
    assert!(!err.retryable);
}

#[tokio::test]
async fn test_bad_gateway_is_retryable_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/balances"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend.fetch_balances().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UpstreamError);
    assert!(err.retryable);
}

#[tokio::test]
async fn test_connection_failure_is_retryable_network_error() {
    // Nothing listens on this port.
    let config = ClientConfig::new("http://127.0.0.1:9", "token");
    let backend = HttpBackend::new(&config).unwrap();

    let err = backend.fetch_balances().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NetworkError);
    assert!(err.retryable);
    assert!(err.http_status.is_none());
}

#[tokio::test]
async fn test_balances_endpoint_returns_snapshot_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/balances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [
                { "asset": "BTC", "native_balance": 0.5, "usd_value": 30000.0 },
                { "asset": "USDT", "native_balance": 1200.0, "usd_value": 1200.0 }
            ]
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let balances = backend.fetch_balances().await.unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances[0].asset, "BTC");
}
