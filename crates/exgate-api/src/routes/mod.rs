//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/accounts` - 암호화된 Binance 계정 관리
//! - `/api/v1/binance/{market}/...` - 마켓별 서명 프록시

pub mod accounts;
pub mod binance;
pub mod health;

pub use accounts::{
    accounts_router, AccountResponse, AccountsListResponse, CreateAccountRequest,
    UpdateAccountRequest, VerifyCredentialsRequest, VerifyResponse,
};
pub use binance::binance_router;
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/accounts", accounts_router())
        .nest("/api/v1/binance", binance_router())
}
