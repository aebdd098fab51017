//! Binance 마켓 프록시 핸들러.
//!
//! 마켓별(현물/선물/옵션/마진) 체결 내역, 계좌 정보, 미체결 주문,
//! 포지션 조회를 서명된 호출로 프록시합니다. 응답은 거래소 페이로드를
//! 가공 없이 그대로 반환합니다.
//!
//! 계정 결정 순서: `accountId` 쿼리 파라미터 → 기본 계정(DB) →
//! 환경변수 기본 자격증명 → 400.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{api_error, crypto_error, exchange_error, ApiErrorResponse, ApiResult};
use crate::repository::{decrypt_credentials, AccountRepository};
use crate::state::AppState;
use exgate_exchange::{Credentials, Market, TradeQuery};

/// 마켓 프록시 라우터.
pub fn binance_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{market}/trades", get(user_trades))
        .route("/{market}/account", get(account_info))
        .route("/{market}/openOrders", get(open_orders))
        .route("/{market}/positions", get(positions))
        .route("/{market}/symbols", get(symbols))
}

// =============================================================================
// 쿼리 타입
// =============================================================================

/// 계정 선택 파라미터 (모든 서명 엔드포인트 공통).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSelector {
    /// 사용할 계정 ID (미지정 시 기본 계정)
    pub account_id: Option<Uuid>,
}

/// 계좌 정보 조회 파라미터.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountInfoQuery {
    /// 격리 마진 전용: 조회할 심볼 CSV (예: "BTCUSDT,ETHUSDT")
    pub symbols: Option<String>,
}

/// 미체결 주문 조회 파라미터.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenOrdersQuery {
    pub symbol: Option<String>,
}

// =============================================================================
// 핸들러
// =============================================================================

/// List user trades for a market.
///
/// `GET /api/v1/binance/{market}/trades`
#[utoipa::path(
    get,
    path = "/api/v1/binance/{market}/trades",
    tag = "binance",
    responses(
        (status = 200, description = "체결 내역 (거래소 페이로드 그대로)"),
        (status = 400, description = "입력 오류", body = ApiErrorResponse),
        (status = 502, description = "거래소 호출 실패", body = ApiErrorResponse),
    )
)]
pub async fn user_trades(
    State(state): State<Arc<AppState>>,
    Path(market): Path<Market>,
    Query(selector): Query<AccountSelector>,
    Query(query): Query<TradeQuery>,
) -> ApiResult<impl IntoResponse> {
    if query.symbol.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            "symbol은 필수입니다.",
        ));
    }

    let creds = resolve_credentials(&state, selector.account_id).await?;

    debug!(%market, symbol = %query.symbol, "user trades 프록시 호출");

    let payload = state
        .binance
        .user_trades(market, &creds, &query)
        .await
        .map_err(|e| {
            warn!(%market, "user trades 실패: {}", e);
            exchange_error(&e)
        })?;

    Ok(Json(payload))
}

/// Account information for a market.
///
/// `GET /api/v1/binance/{market}/account`
#[utoipa::path(
    get,
    path = "/api/v1/binance/{market}/account",
    tag = "binance",
    responses(
        (status = 200, description = "계좌 정보 (거래소 페이로드 그대로)"),
        (status = 502, description = "거래소 호출 실패", body = ApiErrorResponse),
    )
)]
pub async fn account_info(
    State(state): State<Arc<AppState>>,
    Path(market): Path<Market>,
    Query(selector): Query<AccountSelector>,
    Query(query): Query<AccountInfoQuery>,
) -> ApiResult<impl IntoResponse> {
    let creds = resolve_credentials(&state, selector.account_id).await?;

    let payload = state
        .binance
        .account_info(market, &creds, query.symbols.as_deref())
        .await
        .map_err(|e| {
            warn!(%market, "account info 실패: {}", e);
            exchange_error(&e)
        })?;

    Ok(Json(payload))
}

/// Open orders for a market.
///
/// `GET /api/v1/binance/{market}/openOrders`
#[utoipa::path(
    get,
    path = "/api/v1/binance/{market}/openOrders",
    tag = "binance",
    responses(
        (status = 200, description = "미체결 주문 (거래소 페이로드 그대로)"),
        (status = 502, description = "거래소 호출 실패", body = ApiErrorResponse),
    )
)]
pub async fn open_orders(
    State(state): State<Arc<AppState>>,
    Path(market): Path<Market>,
    Query(selector): Query<AccountSelector>,
    Query(query): Query<OpenOrdersQuery>,
) -> ApiResult<impl IntoResponse> {
    let creds = resolve_credentials(&state, selector.account_id).await?;

    let payload = state
        .binance
        .open_orders(market, &creds, query.symbol.as_deref())
        .await
        .map_err(|e| {
            warn!(%market, "open orders 실패: {}", e);
            exchange_error(&e)
        })?;

    Ok(Json(payload))
}

/// Futures positions.
///
/// `GET /api/v1/binance/{market}/positions`
#[utoipa::path(
    get,
    path = "/api/v1/binance/{market}/positions",
    tag = "binance",
    responses(
        (status = 200, description = "포지션 (거래소 페이로드 그대로)"),
        (status = 400, description = "선물 마켓이 아님", body = ApiErrorResponse),
        (status = 502, description = "거래소 호출 실패", body = ApiErrorResponse),
    )
)]
pub async fn positions(
    State(state): State<Arc<AppState>>,
    Path(market): Path<Market>,
    Query(selector): Query<AccountSelector>,
) -> ApiResult<impl IntoResponse> {
    let creds = resolve_credentials(&state, selector.account_id).await?;

    let payload = state
        .binance
        .positions(market, &creds)
        .await
        .map_err(|e| {
            warn!(%market, "positions 실패: {}", e);
            exchange_error(&e)
        })?;

    Ok(Json(payload))
}

/// Tradable symbols for a market (public).
///
/// `GET /api/v1/binance/{market}/symbols`
#[utoipa::path(
    get,
    path = "/api/v1/binance/{market}/symbols",
    tag = "binance",
    responses(
        (status = 200, description = "거래 가능 심볼 목록", body = [String]),
        (status = 502, description = "거래소 호출 실패", body = ApiErrorResponse),
    )
)]
pub async fn symbols(
    State(state): State<Arc<AppState>>,
    Path(market): Path<Market>,
) -> ApiResult<impl IntoResponse> {
    let symbols = state.binance.symbols(market).await.map_err(|e| {
        warn!(%market, "symbols 조회 실패: {}", e);
        exchange_error(&e)
    })?;

    Ok(Json(symbols))
}

// =============================================================================
// 헬퍼
// =============================================================================

/// 요청에 사용할 자격증명 결정.
///
/// 1. `accountId`가 지정되면 해당 계정 (비활성 계정은 403)
/// 2. DB의 기본 계정
/// 3. 환경변수 기본 자격증명
/// 4. 모두 없으면 400
async fn resolve_credentials(
    state: &AppState,
    account_id: Option<Uuid>,
) -> Result<Credentials, (StatusCode, Json<ApiErrorResponse>)> {
    if let Some(id) = account_id {
        let pool = state.db_pool.as_ref().ok_or_else(|| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DB_NOT_CONFIGURED",
                "데이터베이스 연결이 설정되지 않았습니다.",
            )
        })?;

        let row = AccountRepository::find(pool, id)
            .await
            .map_err(|e| {
                error!("계정 조회 실패: {}", e);
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DB_ERROR",
                    format!("조회 실패: {}", e),
                )
            })?
            .ok_or_else(|| {
                api_error(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "계정을 찾을 수 없습니다.",
                )
            })?;

        if !row.is_active {
            return Err(api_error(
                StatusCode::FORBIDDEN,
                "ACCOUNT_INACTIVE",
                "비활성화된 계정입니다.",
            ));
        }

        return decrypt_credentials(&row, &state.vault).map_err(|e| {
            error!("계정 복호화 실패 (id: {}): {}", id, e);
            crypto_error(&e)
        });
    }

    // 기본 계정 (DB) → 환경변수 기본 자격증명 순서로 조회
    if let Some(pool) = &state.db_pool {
        match AccountRepository::find_default(pool).await {
            Ok(Some(row)) => {
                return decrypt_credentials(&row, &state.vault).map_err(|e| {
                    error!("기본 계정 복호화 실패 (id: {}): {}", row.id, e);
                    crypto_error(&e)
                });
            }
            Ok(None) => {}
            Err(e) => {
                error!("기본 계정 조회 실패: {}", e);
                return Err(api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DB_ERROR",
                    format!("조회 실패: {}", e),
                ));
            }
        }
    }

    state.default_credentials.clone().ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "NO_CREDENTIALS",
            "accountId를 지정하거나 기본 계정을 등록하세요.",
        )
    })
}
