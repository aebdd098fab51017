//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiErrorResponse;
use crate::routes::{
    AccountResponse, AccountsListResponse, ComponentHealth, ComponentStatus,
    CreateAccountRequest, HealthResponse, UpdateAccountRequest, VerifyCredentialsRequest,
    VerifyResponse,
};

/// Exgate API 문서.
///
/// 모든 엔드포인트와 스키마를 포함하는 OpenAPI 3.0 스펙입니다.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Exgate API",
        description = r#"
# Binance 계정 게이트웨이 REST API

암호화된 거래소 자격증명 관리와 마켓별 서명 프록시를 제공합니다.

## 주요 기능

- **계정 관리**: API 키 등록/수정/삭제, 저장 전 실검증
- **마켓 프록시**: 현물/USDⓈ-M/COIN-M/옵션/마진 체결·계좌·주문·포지션 조회
- **암호화**: API 시크릿은 AES-256-GCM으로 저장, 응답에는 마스킹된 키만 노출
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    paths(
        crate::routes::accounts::list_accounts,
        crate::routes::accounts::create_account,
        crate::routes::accounts::update_account,
        crate::routes::accounts::delete_account,
        crate::routes::accounts::verify_account,
        crate::routes::accounts::verify_new_credentials,
        crate::routes::binance::user_trades,
        crate::routes::binance::account_info,
        crate::routes::binance::open_orders,
        crate::routes::binance::positions,
        crate::routes::binance::symbols,
    ),
    components(schemas(
        ApiErrorResponse,
        AccountResponse,
        AccountsListResponse,
        CreateAccountRequest,
        UpdateAccountRequest,
        VerifyCredentialsRequest,
        VerifyResponse,
        HealthResponse,
        ComponentHealth,
        ComponentStatus,
    )),
    tags(
        (name = "accounts", description = "암호화된 Binance 계정 관리"),
        (name = "binance", description = "마켓별 서명 프록시"),
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
