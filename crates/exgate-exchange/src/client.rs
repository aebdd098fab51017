//! Binance 서명 REST 클라이언트.
//!
//! 계정별 자격증명을 호출 시점에 받아 서명된 GET 요청을 보내는
//! 무상태 클라이언트. 응답 본문은 가공 없이 JSON 그대로 전달합니다
//! (이 서비스는 프록시이며 거래소 페이로드를 모델링하지 않음).
//!
//! 원격 호출 실패(비 2xx)는 응답 본문의 에러 메시지를 추출하여
//! 단일 `Upstream` 에러로 정규화합니다. 자동 재시도는 없습니다.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

use crate::error::{ExchangeError, ExchangeResult};
use crate::market::Market;
use crate::signer::{sign, QueryParams};

/// 복호화된 계정 자격증명.
///
/// # 보안
/// - `api_secret`은 `SecretString`으로 감싸 로그/Debug 노출을 차단합니다.
/// - `Debug` 구현은 `api_key`도 마스킹합니다.
#[derive(Clone)]
pub struct Credentials {
    /// API 키 (요청 헤더로 전송)
    pub api_key: String,
    /// API 시크릿 (서명 키로만 사용)
    pub api_secret: SecretString,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.len() > 8 {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("Credentials")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}

/// 체결 내역 조회 파라미터.
///
/// 없는 값은 쿼리 문자열에서 완전히 제외됩니다.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeQuery {
    /// 심볼 (필수, 예: "BTCUSDT")
    pub symbol: String,
    /// 조회 시작 시각 (epoch 밀리초)
    pub start_time: Option<u64>,
    /// 조회 종료 시각 (epoch 밀리초)
    pub end_time: Option<u64>,
    /// 페이지네이션 커서 (trade id)
    pub from_id: Option<u64>,
    /// 최대 개수 (1-1000, 기본 500)
    pub limit: Option<u32>,
    /// 수신 윈도우 (밀리초)
    pub recv_window: Option<u64>,
}

/// Binance 게이트웨이 클라이언트.
pub struct BinanceClient {
    http: Client,
    recv_window: u64,
}

impl BinanceClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::Network`를 반환합니다.
    pub fn new(timeout_secs: u64, recv_window: u64) -> ExchangeResult<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExchangeError::Network(format!("HTTP client init failed: {}", e)))?;

        Ok(Self { http, recv_window })
    }

    /// 현재 타임스탬프(밀리초) 반환.
    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as u64
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        params: &QueryParams,
    ) -> ExchangeResult<T> {
        let url = if params.is_empty() {
            format!("{}{}", base, path)
        } else {
            format!("{}{}?{}", base, path, params.encode())
        };

        debug!("GET {}", path);

        let response = self.http.get(&url).send().await?;
        Self::handle_response(response).await
    }

    /// 서명된 API 요청 (인증 필요).
    ///
    /// 호출자가 recvWindow를 지정하지 않았으면 기본값을 추가하고,
    /// timestamp를 붙인 뒤 서명합니다. `signature`는 항상 마지막 파라미터.
    async fn signed_get<T: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        mut params: QueryParams,
        creds: &Credentials,
    ) -> ExchangeResult<T> {
        if !params.contains_key("recvWindow") {
            params.push("recvWindow", self.recv_window);
        }
        params.push("timestamp", Self::timestamp_ms());

        let query = sign(&params, creds.api_secret.expose_secret());
        let url = format!("{}{}?{}", base, path, query);

        debug!("GET (signed) {}", path);

        let response = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &creds.api_key)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::Parse(e.to_string())
            })
        } else {
            Err(ExchangeError::Upstream(extract_error_message(
                &body,
                status.as_u16(),
            )))
        }
    }

    /// 체결 내역 조회 (서명).
    pub async fn user_trades(
        &self,
        market: Market,
        creds: &Credentials,
        query: &TradeQuery,
    ) -> ExchangeResult<Value> {
        let mut params = QueryParams::new();
        if market == Market::IsolatedMargin {
            params.push("isIsolated", "TRUE");
        }
        params.push("symbol", query.symbol.as_str());
        params.push_opt("startTime", query.start_time);
        params.push_opt("endTime", query.end_time);
        params.push_opt("fromId", query.from_id);
        params.push_opt("limit", query.limit);
        params.push_opt("recvWindow", query.recv_window);

        self.signed_get(market.base_url(), market.user_trades_path(), params, creds)
            .await
    }

    /// 계좌 정보 조회 (서명).
    ///
    /// 격리 마진은 선택적으로 `symbols` CSV를 받습니다.
    pub async fn account_info(
        &self,
        market: Market,
        creds: &Credentials,
        symbols: Option<&str>,
    ) -> ExchangeResult<Value> {
        let mut params = QueryParams::new();
        if market == Market::IsolatedMargin {
            params.push_opt("symbols", symbols);
        }

        self.signed_get(market.base_url(), market.account_path(), params, creds)
            .await
    }

    /// 미체결 주문 조회 (서명).
    pub async fn open_orders(
        &self,
        market: Market,
        creds: &Credentials,
        symbol: Option<&str>,
    ) -> ExchangeResult<Value> {
        let mut params = QueryParams::new();
        if market == Market::IsolatedMargin {
            params.push("isIsolated", "TRUE");
        }
        params.push_opt("symbol", symbol);

        self.signed_get(market.base_url(), market.open_orders_path(), params, creds)
            .await
    }

    /// 포지션 조회 (서명, 선물 마켓 전용).
    pub async fn positions(&self, market: Market, creds: &Credentials) -> ExchangeResult<Value> {
        let path = market.positions_path().ok_or_else(|| {
            ExchangeError::NotSupported(format!("positions are not available for {} market", market))
        })?;

        self.signed_get(market.base_url(), path, QueryParams::new(), creds)
            .await
    }

    /// 거래 가능 심볼 목록 조회 (공개).
    pub async fn symbols(&self, market: Market) -> ExchangeResult<Vec<String>> {
        let payload: Value = self
            .public_get(market.base_url(), market.exchange_info_path(), &QueryParams::new())
            .await?;

        Ok(parse_symbols(market, &payload))
    }

    /// 자격증명 검증 (서명).
    ///
    /// USDⓈ-M 계좌 조회로 키/시크릿 유효성을 확인합니다. 잘못된 키나
    /// 허용되지 않은 IP는 거래소가 에러로 응답하므로 `Upstream`으로
    /// 전파됩니다.
    pub async fn verify_credentials(&self, creds: &Credentials) -> ExchangeResult<Value> {
        let market = Market::UsdMargined;
        self.signed_get(
            market.base_url(),
            market.account_path(),
            QueryParams::new(),
            creds,
        )
        .await
    }
}

/// 원격 에러 본문에서 사람이 읽을 메시지 추출.
///
/// Binance는 `{"code":-1121,"msg":"..."}` 형태가 일반적이지만 게이트웨이나
/// 프록시 계층에 따라 `message`/`error` 필드가 올 수 있습니다. 모두 없으면
/// 상태 코드가 포함된 일반 메시지로 대체합니다.
fn extract_error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for field in ["msg", "message", "error"] {
            if let Some(msg) = value.get(field).and_then(Value::as_str) {
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }

    format!("Binance request failed (HTTP {})", status)
}

/// exchangeInfo 응답에서 거래 가능 심볼 목록 추출.
///
/// - TRADING 상태만 포함
/// - 선물 마켓은 무기한(PERPETUAL) 계약 우선, 하나도 없으면 상태 필터만 적용
/// - 옵션은 `optionSymbols` 배열과 `baseAsset`+`quoteAsset` 조합을 지원
fn parse_symbols(market: Market, payload: &Value) -> Vec<String> {
    let entries = ["symbols", "optionSymbols", "contracts"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default();

    let is_trading = |entry: &Value| {
        entry
            .get("status")
            .or_else(|| entry.get("contractStatus"))
            .and_then(Value::as_str)
            .unwrap_or("TRADING")
            == "TRADING"
    };

    let symbol_of = |entry: &Value| -> Option<String> {
        if let Some(symbol) = entry.get("symbol").and_then(Value::as_str) {
            return Some(symbol.to_string());
        }
        // 옵션 계약은 symbol 대신 base/quote 조합으로 오는 경우가 있음
        match (
            entry.get("baseAsset").and_then(Value::as_str),
            entry.get("quoteAsset").and_then(Value::as_str),
        ) {
            (Some(base), Some(quote)) => Some(format!("{}{}", base, quote)),
            _ => None,
        }
    };

    let collect = |require_perpetual: bool| -> Vec<String> {
        let mut out: Vec<String> = entries
            .iter()
            .filter(|e| is_trading(e))
            .filter(|e| {
                !require_perpetual
                    || e.get("contractType").and_then(Value::as_str) == Some("PERPETUAL")
            })
            .filter_map(symbol_of)
            .collect();
        out.sort();
        out
    };

    if market.is_futures() {
        let perpetual = collect(true);
        if !perpetual.is_empty() {
            return perpetual;
        }
    }

    collect(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_credentials() -> Credentials {
        Credentials::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        )
    }

    #[test]
    fn test_credentials_debug_is_masked() {
        let debug = format!("{:?}", test_credentials());

        assert!(!debug.contains("NhqPtmdSJYdKjVHjA7PZ"));
        assert!(debug.contains("vmPU...Eh8A"));
    }

    #[tokio::test]
    async fn test_signed_get_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fapi/v1/userTrades")
            .match_header(
                "X-MBX-APIKEY",
                "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            )
            .match_query(mockito::Matcher::Regex(
                r"^symbol=BTCUSDT&recvWindow=5000&timestamp=\d+&signature=[0-9a-f]{64}$"
                    .to_string(),
            ))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = BinanceClient::new(15, 5000).unwrap();
        let mut params = QueryParams::new();
        params.push("symbol", "BTCUSDT");

        let result: Value = client
            .signed_get(&server.url(), "/fapi/v1/userTrades", params, &test_credentials())
            .await
            .unwrap();

        assert_eq!(result, json!([]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_caller_recv_window_passes_through() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/account")
            .match_query(mockito::Matcher::Regex(
                r"^recvWindow=9000&timestamp=\d+&signature=[0-9a-f]{64}$".to_string(),
            ))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = BinanceClient::new(15, 5000).unwrap();
        let mut params = QueryParams::new();
        params.push("recvWindow", 9000u64);

        let _: Value = client
            .signed_get(&server.url(), "/api/v3/account", params, &test_credentials())
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_message_extracted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v2/account")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#)
            .create_async()
            .await;

        let client = BinanceClient::new(15, 5000).unwrap();
        let result: ExchangeResult<Value> = client
            .signed_get(
                &server.url(),
                "/fapi/v2/account",
                QueryParams::new(),
                &test_credentials(),
            )
            .await;

        match result {
            Err(ExchangeError::Upstream(msg)) => {
                assert_eq!(msg, "Invalid API-key, IP, or permissions for action.")
            }
            other => panic!("expected Upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upstream_error_fallback_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/myTrades")
            .match_query(mockito::Matcher::Any)
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let client = BinanceClient::new(15, 5000).unwrap();
        let result: ExchangeResult<Value> = client
            .signed_get(
                &server.url(),
                "/api/v3/myTrades",
                QueryParams::new(),
                &test_credentials(),
            )
            .await;

        match result {
            Err(ExchangeError::Upstream(msg)) => {
                assert_eq!(msg, "Binance request failed (HTTP 502)")
            }
            other => panic!("expected Upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_public_get_parses_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/exchangeInfo")
            .with_status(200)
            .with_body(r#"{"timezone":"UTC","symbols":[]}"#)
            .create_async()
            .await;

        let client = BinanceClient::new(15, 5000).unwrap();
        let payload: Value = client
            .public_get(&server.url(), "/api/v3/exchangeInfo", &QueryParams::new())
            .await
            .unwrap();

        assert_eq!(payload["timezone"], "UTC");
    }

    #[tokio::test]
    async fn test_positions_unsupported_market_errors() {
        let client = BinanceClient::new(15, 5000).unwrap();

        // 네트워크 호출 전에 거부되어야 함
        let result = client.positions(Market::Spot, &test_credentials()).await;
        assert!(matches!(result, Err(ExchangeError::NotSupported(_))));
    }

    #[test]
    fn test_parse_symbols_spot() {
        let payload = json!({
            "symbols": [
                {"symbol": "ETHUSDT", "status": "TRADING"},
                {"symbol": "BTCUSDT", "status": "TRADING"},
                {"symbol": "DELISTED1", "status": "BREAK"},
            ]
        });

        assert_eq!(
            parse_symbols(Market::Spot, &payload),
            vec!["BTCUSDT", "ETHUSDT"]
        );
    }

    #[test]
    fn test_parse_symbols_futures_perpetual_only() {
        let payload = json!({
            "symbols": [
                {"symbol": "BTCUSDT", "status": "TRADING", "contractType": "PERPETUAL"},
                {"symbol": "BTCUSDT_250926", "status": "TRADING", "contractType": "CURRENT_QUARTER"},
            ]
        });

        assert_eq!(
            parse_symbols(Market::UsdMargined, &payload),
            vec!["BTCUSDT"]
        );
    }

    #[test]
    fn test_parse_symbols_futures_fallback_without_perpetual() {
        let payload = json!({
            "symbols": [
                {"symbol": "BTCUSD_250926", "status": "TRADING", "contractType": "CURRENT_QUARTER"},
            ]
        });

        // 무기한 계약이 하나도 없으면 상태 필터만 적용
        assert_eq!(
            parse_symbols(Market::CoinMargined, &payload),
            vec!["BTCUSD_250926"]
        );
    }

    #[test]
    fn test_parse_symbols_options_base_quote() {
        let payload = json!({
            "optionSymbols": [
                {"baseAsset": "BTC", "quoteAsset": "USDT", "status": "TRADING"},
                {"symbol": "ETH-250926-3000-C", "status": "TRADING"},
            ]
        });

        assert_eq!(
            parse_symbols(Market::Options, &payload),
            vec!["BTCUSDT", "ETH-250926-3000-C"]
        );
    }
}
