//! Back-office REST API client.
//!
//! Provides authenticated HTTP communication with the back-office service:
//! order detail fetch, cart mutations, drawer balance reads, and payment
//! calls. Responses are decoded into explicit schemas at this boundary;
//! anything malformed is reported as a decode failure rather than leaking
//! loosely-typed data inward.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{ItemUpdate, Order, OrderStatus, PaymentMethod};
use crate::session::Session;

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity test.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Failure categories for backend calls. `SessionExpired` must trigger a
/// session clear in the caller; `Conflict` is retried exactly once via the
/// re-create endpoint; everything else is surfaced as a retry-later notice.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session rejected by the backend")]
    SessionExpired,
    #[error("a payment session already exists for this order")]
    Conflict,
    #[error("{0}")]
    Backend(String),
    #[error("{0}")]
    Network(String),
    #[error("invalid response from the backend: {0}")]
    Decode(String),
}

impl ApiError {
    /// Transient failures preserve prior displayed state and may be retried
    /// by the operator.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Backend(_) | ApiError::Network(_) | ApiError::Decode(_)
        )
    }
}

/// Convert a `reqwest::Error` into a user-loggable message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach the back-office server at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid back-office URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a loggable message. 401 and 409 are
/// mapped to their dedicated variants before this is consulted.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        403 => "Terminal not authorized for this operation".to_string(),
        404 => "Back-office endpoint not found".to_string(),
        s if s >= 500 => format!("Back-office server error (HTTP {s})"),
        s => format!("Unexpected response from the back-office (HTTP {s})"),
    }
}

// ---------------------------------------------------------------------------
// URL normalisation and terminal pairing
// ---------------------------------------------------------------------------

/// Normalise the back-office base URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /api
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

fn decode_pairing_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<Value>(trimmed).ok();
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() < 20 {
        return None;
    }

    let base64 = compact.replace('-', "+").replace('_', "/");
    let padded = format!(
        "{}{}",
        base64,
        "=".repeat((4usize.wrapping_sub(base64.len() % 4)) % 4)
    );
    let decoded = BASE64_STANDARD.decode(padded).ok()?;
    serde_json::from_slice::<Value>(&decoded).ok()
}

/// Extract the base URL from a terminal pairing string (base64-encoded JSON
/// `{ "url": ..., "key": ... }` handed out by the back office).
pub fn extract_base_url_from_pairing(raw: &str) -> Option<String> {
    decode_pairing_payload(raw)
        .and_then(|v| {
            v.get("url")
                .and_then(Value::as_str)
                .map(normalize_base_url)
        })
        .filter(|s| !s.is_empty())
}

/// Extract the bearer credential from a terminal pairing string.
pub fn extract_token_from_pairing(raw: &str) -> Option<String> {
    decode_pairing_payload(raw)
        .and_then(|v| {
            v.get("key")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Request/response schemas
// ---------------------------------------------------------------------------

/// Payload for the idempotent cash settlement call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashPaymentRequest {
    pub order_id: String,
    pub method: PaymentMethod,
    pub note: String,
    /// Stable per-intent key so a retried call is deduplicated server-side.
    pub idempotency_key: String,
}

#[derive(serde::Deserialize)]
struct BalanceResponse {
    balance: Option<i64>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletPaymentResponse {
    pay_url: String,
}

// ---------------------------------------------------------------------------
// Connectivity test
// ---------------------------------------------------------------------------

/// Result of a connectivity test.
#[derive(serde::Serialize)]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Test connectivity to the back office with a lightweight health-check.
pub async fn test_connectivity(base_url: &str) -> ConnectivityResult {
    let url = normalize_base_url(base_url);
    let health_url = format!("{url}/api/health");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();
    let resp = match client.get(&health_url).send().await {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(friendly_error(&url, &e)),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();

    if status.is_success() {
        info!(latency_ms = latency, "connectivity test passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_error(status)),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated client for the back-office REST API. Holds one pooled
/// `reqwest::Client`; share by reference.
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform an authenticated request and return the response body text.
    /// Maps 401 to `SessionExpired` and 409 to `Conflict` uniformly.
    async fn send(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, ApiError> {
        let full_url = format!("{}{path}", self.base_url);
        debug!(method = %method, path, "backend request");

        let mut req = self
            .http
            .request(method, &full_url)
            .bearer_auth(session.token.as_str());
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Network(friendly_error(&self.base_url, &e)))?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::SessionExpired);
        }
        if status == StatusCode::CONFLICT {
            return Err(ApiError::Conflict);
        }

        let body_text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            // Preserve the server's own message when it sends one.
            let detail = serde_json::from_str::<Value>(&body_text)
                .ok()
                .and_then(|json| {
                    json.get("error")
                        .or_else(|| json.get("message"))
                        .and_then(Value::as_str)
                        .map(|s| s.to_string())
                })
                .unwrap_or_else(|| status_error(status));
            return Err(ApiError::Backend(format!(
                "{detail} (HTTP {})",
                status.as_u16()
            )));
        }

        Ok(body_text)
    }

    /// `send` plus schema decoding. A schema violation is a transient
    /// backend failure, never a panic.
    async fn send_decoded<T: DeserializeOwned>(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let body_text = self.send(session, method, path, body).await?;
        serde_json::from_str(&body_text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // -- Orders -------------------------------------------------------------

    /// Fetch an order with its ordered line items.
    pub async fn fetch_order(&self, session: &Session, order_id: &str) -> Result<Order, ApiError> {
        self.send_decoded(session, Method::GET, &format!("/api/orders/{order_id}"), None)
            .await
    }

    /// Delete one line item from an order.
    pub async fn delete_order_item(
        &self,
        session: &Session,
        order_id: &str,
        item_id: &str,
    ) -> Result<(), ApiError> {
        self.send(
            session,
            Method::DELETE,
            &format!("/api/orders/{order_id}/items/{item_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    /// Update a line item's size and/or quantity.
    pub async fn update_order_item(
        &self,
        session: &Session,
        order_id: &str,
        item_id: &str,
        update: &ItemUpdate,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(update).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send(
            session,
            Method::PATCH,
            &format!("/api/orders/{order_id}/items/{item_id}"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    /// Transition an order to a new lifecycle state.
    pub async fn set_order_status(
        &self,
        session: &Session,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "status": status });
        self.send(
            session,
            Method::PATCH,
            &format!("/api/orders/{order_id}/status"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    // -- Drawer -------------------------------------------------------------

    /// Read the current cash-drawer balance. `None` when the backend has no
    /// open drawer session for this operator.
    pub async fn drawer_balance(&self, session: &Session) -> Result<Option<i64>, ApiError> {
        match self
            .send_decoded::<BalanceResponse>(session, Method::GET, "/api/drawer/balance", None)
            .await
        {
            Ok(resp) => Ok(resp.balance),
            // No drawer endpoint / no open drawer on this backend build.
            Err(ApiError::Backend(msg)) if msg.contains("HTTP 404") => Ok(None),
            Err(e) => Err(e),
        }
    }

    // -- Payments -----------------------------------------------------------

    /// Record a settled cash payment. Idempotent via the request's key.
    pub async fn record_cash_payment(
        &self,
        session: &Session,
        request: &CashPaymentRequest,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(request).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send(session, Method::POST, "/api/payments/cash", Some(&body))
            .await?;
        info!(order_id = %request.order_id, "cash payment recorded");
        Ok(())
    }

    /// Create a wallet payment session; returns the redirect URL.
    pub async fn create_wallet_payment(
        &self,
        session: &Session,
        order_id: &str,
    ) -> Result<String, ApiError> {
        let body = serde_json::json!({ "orderId": order_id, "method": PaymentMethod::Momo });
        let resp: WalletPaymentResponse = self
            .send_decoded(session, Method::POST, "/api/payments/wallet", Some(&body))
            .await?;
        Ok(resp.pay_url)
    }

    /// Re-create a wallet payment session after the backend reported that
    /// one already exists. Same payload as the create call.
    pub async fn recreate_wallet_payment(
        &self,
        session: &Session,
        order_id: &str,
    ) -> Result<String, ApiError> {
        let body = serde_json::json!({ "orderId": order_id, "method": PaymentMethod::Momo });
        let resp: WalletPaymentResponse = self
            .send_decoded(
                session,
                Method::POST,
                "/api/payments/wallet/recreate",
                Some(&body),
            )
            .await?;
        Ok(resp.pay_url)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaffRole;
    use crate::testutil::{http_response, spawn_http_fixture};
    use zeroize::Zeroizing;

    fn test_session() -> Session {
        Session {
            token: Zeroizing::new("tok-test".to_string()),
            role: StaffRole::Staff,
            staff_name: None,
        }
    }

    // -- URL normalisation ---------------------------------------------------

    #[test]
    fn normalize_adds_https_scheme() {
        assert_eq!(
            normalize_base_url("pos.trasuanhalam.vn"),
            "https://pos.trasuanhalam.vn"
        );
    }

    #[test]
    fn normalize_uses_http_for_localhost() {
        assert_eq!(normalize_base_url("localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn normalize_strips_trailing_api_and_slashes() {
        assert_eq!(
            normalize_base_url("https://pos.example.vn/api/"),
            "https://pos.example.vn"
        );
        assert_eq!(
            normalize_base_url("https://pos.example.vn///"),
            "https://pos.example.vn"
        );
    }

    // -- Pairing string ------------------------------------------------------

    #[test]
    fn pairing_decodes_raw_json() {
        let raw = r#"{ "url": "pos.example.vn", "key": "tok-abc" }"#;
        assert_eq!(
            extract_base_url_from_pairing(raw).as_deref(),
            Some("https://pos.example.vn")
        );
        assert_eq!(extract_token_from_pairing(raw).as_deref(), Some("tok-abc"));
    }

    #[test]
    fn pairing_decodes_url_safe_base64() {
        let payload = r#"{"url":"https://pos.example.vn","key":"tok-xyz"}"#;
        let encoded = BASE64_STANDARD
            .encode(payload)
            .replace('+', "-")
            .replace('/', "_")
            .trim_end_matches('=')
            .to_string();
        assert_eq!(
            extract_token_from_pairing(&encoded).as_deref(),
            Some("tok-xyz")
        );
        assert_eq!(
            extract_base_url_from_pairing(&encoded).as_deref(),
            Some("https://pos.example.vn")
        );
    }

    #[test]
    fn pairing_rejects_garbage() {
        assert!(extract_token_from_pairing("short").is_none());
        assert!(extract_token_from_pairing("not base64 at all !!!!!!!!!!!!").is_none());
    }

    // -- Client --------------------------------------------------------------

    #[tokio::test]
    async fn fetch_order_decodes_items_and_sends_bearer() {
        let order_json = serde_json::json!({
            "id": "ord-1",
            "status": "pending",
            "total": 65000,
            "items": [
                { "id": "li-1", "productName": "Trà sữa", "quantity": 2, "unitPrice": 20000 }
            ]
        });
        let (base, handle) =
            spawn_http_fixture(vec![http_response("200 OK", &order_json.to_string())]);

        let client = ApiClient::new(&base).expect("client");
        let order = client
            .fetch_order(&test_session(), "ord-1")
            .await
            .expect("fetch order");

        assert_eq!(order.id, "ord-1");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].unit_price, 20000);

        let requests = handle.join().expect("fixture thread");
        assert!(requests[0].starts_with("GET /api/orders/ord-1 "));
        assert!(requests[0]
            .to_lowercase()
            .contains("authorization: bearer tok-test"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_session_expired() {
        let (base, handle) = spawn_http_fixture(vec![http_response(
            "401 Unauthorized",
            r#"{"message":"token expired"}"#,
        )]);
        let client = ApiClient::new(&base).expect("client");

        let err = client
            .fetch_order(&test_session(), "ord-1")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ApiError::SessionExpired));
        assert!(!err.is_transient());
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn conflict_maps_to_conflict() {
        let (base, handle) = spawn_http_fixture(vec![http_response(
            "409 Conflict",
            r#"{"message":"payment session exists"}"#,
        )]);
        let client = ApiClient::new(&base).expect("client");

        let err = client
            .create_wallet_payment(&test_session(), "ord-1")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ApiError::Conflict));
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn server_error_preserves_backend_message() {
        let (base, handle) = spawn_http_fixture(vec![http_response(
            "500 Internal Server Error",
            r#"{"error":"database unavailable"}"#,
        )]);
        let client = ApiClient::new(&base).expect("client");

        let err = client
            .fetch_order(&test_session(), "ord-1")
            .await
            .expect_err("should fail");
        match err {
            ApiError::Backend(msg) => {
                assert!(msg.contains("database unavailable"));
                assert!(msg.contains("HTTP 500"));
            }
            other => panic!("expected Backend error, got {other:?}"),
        }
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn malformed_body_maps_to_decode() {
        let (base, handle) = spawn_http_fixture(vec![http_response("200 OK", "this is not json")]);
        let client = ApiClient::new(&base).expect("client");

        let err = client
            .fetch_order(&test_session(), "ord-1")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(err.is_transient());
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn drawer_balance_treats_missing_endpoint_as_unknown() {
        let (base, handle) = spawn_http_fixture(vec![http_response(
            "404 Not Found",
            r#"{"message":"no drawer session"}"#,
        )]);
        let client = ApiClient::new(&base).expect("client");

        let balance = client
            .drawer_balance(&test_session())
            .await
            .expect("404 is not an error for the drawer read");
        assert_eq!(balance, None);
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn drawer_balance_decodes_known_balance() {
        let (base, handle) =
            spawn_http_fixture(vec![http_response("200 OK", r#"{"balance":350000}"#)]);
        let client = ApiClient::new(&base).expect("client");

        let balance = client
            .drawer_balance(&test_session())
            .await
            .expect("balance");
        assert_eq!(balance, Some(350000));
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn update_item_patches_only_present_fields() {
        let (base, handle) = spawn_http_fixture(vec![http_response("204 No Content", "")]);
        let client = ApiClient::new(&base).expect("client");

        client
            .update_order_item(
                &test_session(),
                "ord-1",
                "li-2",
                &ItemUpdate {
                    size: Some("L".to_string()),
                    quantity: None,
                },
            )
            .await
            .expect("update item");

        let requests = handle.join().unwrap();
        assert!(requests[0].starts_with("PATCH /api/orders/ord-1/items/li-2 "));
        assert!(requests[0].contains(r#"{"size":"L"}"#));
    }

    #[tokio::test]
    async fn connectivity_test_reports_latency() {
        let (base, handle) =
            spawn_http_fixture(vec![http_response("200 OK", r#"{"status":"ok"}"#)]);
        let result = test_connectivity(&base).await;
        assert!(result.success);
        assert!(result.latency_ms.is_some());
        assert!(result.error.is_none());
        let requests = handle.join().unwrap();
        assert!(requests[0].starts_with("GET /api/health "));
    }
}
