//! API 라우터 통합 테스트.
//!
//! DB/거래소 연결 없이 라우터 레벨에서 확인 가능한 동작을 검증합니다:
//! 헬스 체크, 미구성 리소스에 대한 에러 매핑, 마켓/입력 검증.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use exgate_api::routes::create_api_router;
use exgate_api::state::AppState;
use exgate_core::{generate_master_key, CredentialVault};
use exgate_exchange::{BinanceClient, Credentials};

/// DB와 기본 자격증명이 없는 최소 상태의 앱.
fn test_app() -> axum::Router {
    let vault = CredentialVault::new(&generate_master_key()).unwrap();
    let binance = BinanceClient::new(15, 5000).unwrap();
    let state = Arc::new(AppState::new(vault, binance));

    create_api_router().with_state(state)
}

/// 환경변수 기본 자격증명만 있는 앱.
fn test_app_with_default_credentials() -> axum::Router {
    let vault = CredentialVault::new(&generate_master_key()).unwrap();
    let binance = BinanceClient::new(15, 5000).unwrap();
    let state = Arc::new(
        AppState::new(vault, binance)
            .with_default_credentials(Credentials::new("test-key", "test-secret")),
    );

    create_api_router().with_state(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_ready_reports_unconfigured_database() {
    let response = test_app()
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["components"]["database"]["status"], "not_configured");
    assert_eq!(json["components"]["vault"]["status"], "up");
}

#[tokio::test]
async fn list_accounts_without_database_is_mapped() {
    let response = test_app()
        .oneshot(Request::get("/api/v1/accounts").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["code"], "DB_NOT_CONFIGURED");
}

#[tokio::test]
async fn trades_require_symbol() {
    // 기본 자격증명이 있어도 symbol이 없으면 400
    let response = test_app_with_default_credentials()
        .oneshot(
            Request::get("/api/v1/binance/usdm/trades")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn trades_without_any_credentials_are_rejected() {
    let response = test_app()
        .oneshot(
            Request::get("/api/v1/binance/usdm/trades?symbol=BTCUSDT")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NO_CREDENTIALS");
}

#[tokio::test]
async fn unknown_market_is_rejected() {
    let response = test_app_with_default_credentials()
        .oneshot(
            Request::get("/api/v1/binance/margin/trades?symbol=BTCUSDT")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Path<Market> 역직렬화 실패
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn positions_on_spot_market_is_invalid() {
    let response = test_app_with_default_credentials()
        .oneshot(
            Request::get("/api/v1/binance/spot/positions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_MARKET");
}

#[tokio::test]
async fn unknown_route_returns_not_found() {
    let response = test_app()
        .oneshot(
            Request::get("/api/v1/binance-missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
