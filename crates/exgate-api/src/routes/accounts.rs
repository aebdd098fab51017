//! Binance 계정 관리 핸들러.
//!
//! 거래소 API 자격증명을 등록/수정/삭제/검증하는 엔드포인트.
//!
//! # 보안
//! - API 시크릿은 AES-256-GCM으로 암호화되어 단일 문자열로 저장
//! - 시크릿은 어떤 응답에도 포함되지 않으며 API 키는 마스킹하여 반환
//! - 시크릿 변경은 항상 새로운 암호화 페이로드를 생성 (제자리 수정 없음)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{api_error, crypto_error, exchange_error, ApiErrorResponse, ApiResult};
use crate::repository::{
    decrypt_credentials, is_unique_violation, AccountRepository, AccountRow, NewAccount,
};
use crate::state::AppState;
use exgate_exchange::Credentials;

/// 계정 관리 라우터.
pub fn accounts_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_accounts))
        .route("/", post(create_account))
        .route("/verify", post(verify_new_credentials))
        .route("/{id}", put(update_account))
        .route("/{id}", delete(delete_account))
        .route("/{id}/verify", post(verify_account))
}

// =============================================================================
// 요청/응답 타입
// =============================================================================

/// 계정 등록 요청.
///
/// # 보안
/// - `Debug` 구현은 민감 필드를 마스킹합니다.
#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    /// 계정 구분용 라벨 (고유)
    #[validate(length(min = 1, max = 64))]
    pub label: String,
    /// Binance API Key
    #[validate(length(min = 1))]
    pub api_key: String,
    /// Binance API Secret (저장 전 암호화됨)
    #[validate(length(min = 1))]
    pub api_secret: String,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// 기본 계정 지정 여부
    #[serde(default)]
    pub is_default: bool,
}

fn default_true() -> bool {
    true
}

impl fmt::Debug for CreateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAccountRequest")
            .field("label", &self.label)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .field("is_active", &self.is_active)
            .field("is_default", &self.is_default)
            .finish()
    }
}

/// 계정 수정 요청 (부분 수정).
///
/// # 보안
/// - `Debug` 구현은 민감 필드를 마스킹합니다.
#[derive(Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    pub label: Option<String>,
    pub api_key: Option<String>,
    /// 새 API Secret — 지정 시 완전히 새로운 암호화 페이로드가 생성됨
    pub api_secret: Option<String>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
}

impl fmt::Debug for UpdateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateAccountRequest")
            .field("label", &self.label)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field(
                "api_secret",
                &self.api_secret.as_ref().map(|_| "***REDACTED***"),
            )
            .field("is_active", &self.is_active)
            .field("is_default", &self.is_default)
            .finish()
    }
}

/// 저장 전 자격증명 검증 요청.
#[derive(Deserialize, ToSchema)]
pub struct VerifyCredentialsRequest {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for VerifyCredentialsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyCredentialsRequest")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}

/// 계정 응답 (마스킹됨).
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub id: Uuid,
    pub label: String,
    /// 마스킹된 API Key (예: "abcd...wxyz")
    pub api_key_masked: String,
    pub is_active: bool,
    pub is_default: bool,
    pub last_verified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&AccountRow> for AccountResponse {
    fn from(row: &AccountRow) -> Self {
        Self {
            id: row.id,
            label: row.label.clone(),
            api_key_masked: mask_api_key(&row.api_key),
            is_active: row.is_active,
            is_default: row.is_default,
            last_verified_at: row.last_verified_at.map(|t| t.to_rfc3339()),
            created_at: row.created_at.to_rfc3339(),
            updated_at: row.updated_at.to_rfc3339(),
        }
    }
}

/// 계정 목록 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountsListResponse {
    pub accounts: Vec<AccountResponse>,
    pub total: usize,
}

/// 자격증명 검증 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_info: Option<serde_json::Value>,
}

// =============================================================================
// 핸들러
// =============================================================================

/// List registered accounts.
///
/// `GET /api/v1/accounts`
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    tag = "accounts",
    responses(
        (status = 200, description = "계정 목록", body = AccountsListResponse),
        (status = 500, description = "DB 미구성", body = ApiErrorResponse),
    )
)]
pub async fn list_accounts(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let pool = require_pool(&state)?;

    let rows = AccountRepository::list(pool).await.map_err(|e| {
        error!("계정 목록 조회 실패: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DB_ERROR",
            format!("조회 실패: {}", e),
        )
    })?;

    let accounts: Vec<AccountResponse> = rows.iter().map(AccountResponse::from).collect();
    let total = accounts.len();

    Ok(Json(AccountsListResponse { accounts, total }))
}

/// Register a new account.
///
/// 저장 전에 서명된 호출로 자격증명 유효성을 실제로 확인합니다.
///
/// `POST /api/v1/accounts`
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    tag = "accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "계정 등록됨", body = AccountResponse),
        (status = 400, description = "입력 오류 또는 유효하지 않은 자격증명", body = ApiErrorResponse),
    )
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    info!("계정 등록 요청: {}", request.label);

    let pool = require_pool(&state)?;

    request.validate().map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            format!("입력 검증 실패: {}", e),
        )
    })?;

    let api_key = request.api_key.trim().to_string();
    let api_secret = request.api_secret.trim().to_string();
    if api_key.is_empty() || api_secret.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            "API Key와 Secret은 필수입니다.",
        ));
    }

    // 저장 전에 거래소에 실제 서명 호출로 키 유효성 확인
    let creds = Credentials::new(api_key.clone(), api_secret.clone());
    if let Err(e) = state.binance.verify_credentials(&creds).await {
        warn!("자격증명 검증 실패 (label: {}): {}", request.label, e);
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_CREDENTIALS",
            verification_failure_message(&e),
        ));
    }

    // 시크릿 암호화 후 저장
    let api_secret_enc = state.vault.encrypt(&api_secret).map_err(|e| {
        error!("시크릿 암호화 실패: {}", e);
        crypto_error(&e)
    })?;

    let new_account = NewAccount {
        label: request.label.trim().to_string(),
        api_key,
        api_secret_enc,
        is_active: request.is_active,
        is_default: request.is_default,
    };

    let row = AccountRepository::insert(pool, &new_account)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return api_error(
                    StatusCode::BAD_REQUEST,
                    "DUPLICATE_LABEL",
                    "이미 사용 중인 라벨입니다.",
                );
            }
            error!("계정 저장 실패: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DB_ERROR",
                format!("저장 실패: {}", e),
            )
        })?;

    // 기본 계정으로 지정되면 다른 계정의 기본 플래그 해제
    if row.is_default {
        if let Err(e) = AccountRepository::clear_other_defaults(pool, row.id).await {
            warn!("기본 계정 플래그 정리 실패 (계속 진행): {}", e);
        }
    }

    info!("계정 등록 완료: {} (id: {})", row.label, row.id);

    Ok((StatusCode::CREATED, Json(AccountResponse::from(&row))))
}

/// Update an account.
///
/// `PUT /api/v1/accounts/{id}`
#[utoipa::path(
    put,
    path = "/api/v1/accounts/{id}",
    tag = "accounts",
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "계정 수정됨", body = AccountResponse),
        (status = 404, description = "계정 없음", body = ApiErrorResponse),
    )
)]
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    info!("계정 수정 요청: {}", id);

    let pool = require_pool(&state)?;

    let mut row = AccountRepository::find(pool, id)
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

    if let Some(label) = request.label {
        let label = label.trim().to_string();
        if label.is_empty() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                "label은 비워둘 수 없습니다.",
            ));
        }
        row.label = label;
    }

    if let Some(api_key) = request.api_key {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                "api_key는 비워둘 수 없습니다.",
            ));
        }
        row.api_key = api_key;
    }

    // 새 시크릿은 항상 새로운 nonce로 새 페이로드를 만든다
    if let Some(api_secret) = request.api_secret {
        let api_secret = api_secret.trim().to_string();
        if api_secret.is_empty() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                "api_secret은 비워둘 수 없습니다.",
            ));
        }
        row.api_secret_enc = state.vault.encrypt(&api_secret).map_err(|e| {
            error!("시크릿 암호화 실패: {}", e);
            crypto_error(&e)
        })?;
    }

    if let Some(is_active) = request.is_active {
        row.is_active = is_active;
    }
    if let Some(is_default) = request.is_default {
        row.is_default = is_default;
    }

    AccountRepository::update(pool, &row).await.map_err(|e| {
        if is_unique_violation(&e) {
            return api_error(
                StatusCode::BAD_REQUEST,
                "DUPLICATE_LABEL",
                "이미 사용 중인 라벨입니다.",
            );
        }
        error!("계정 업데이트 실패: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DB_ERROR",
            format!("업데이트 실패: {}", e),
        )
    })?;

    if row.is_default {
        if let Err(e) = AccountRepository::clear_other_defaults(pool, row.id).await {
            warn!("기본 계정 플래그 정리 실패 (계속 진행): {}", e);
        }
    }

    info!("계정 수정 완료: {}", id);

    Ok(Json(AccountResponse::from(&row)))
}

/// Delete an account.
///
/// `DELETE /api/v1/accounts/{id}`
#[utoipa::path(
    delete,
    path = "/api/v1/accounts/{id}",
    tag = "accounts",
    responses(
        (status = 200, description = "계정 삭제됨"),
        (status = 404, description = "계정 없음", body = ApiErrorResponse),
    )
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    info!("계정 삭제 요청: {}", id);

    let pool = require_pool(&state)?;

    let deleted = AccountRepository::delete(pool, id).await.map_err(|e| {
        error!("계정 삭제 실패: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DB_ERROR",
            format!("삭제 실패: {}", e),
        )
    })?;

    if !deleted {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "계정을 찾을 수 없습니다.",
        ));
    }

    info!("계정 삭제 완료: {}", id);

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "계정이 삭제되었습니다."
    })))
}

/// Verify a stored account against Binance.
///
/// `POST /api/v1/accounts/{id}/verify`
#[utoipa::path(
    post,
    path = "/api/v1/accounts/{id}/verify",
    tag = "accounts",
    responses(
        (status = 200, description = "검증 결과", body = VerifyResponse),
        (status = 404, description = "계정 없음", body = ApiErrorResponse),
    )
)]
pub async fn verify_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    info!("계정 검증 요청: {}", id);

    let pool = require_pool(&state)?;

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

    let creds = decrypt_credentials(&row, &state.vault).map_err(|e| {
        error!("계정 복호화 실패 (id: {}): {}", id, e);
        crypto_error(&e)
    })?;

    match state.binance.verify_credentials(&creds).await {
        Ok(account_info) => {
            if let Err(e) = AccountRepository::mark_verified(pool, id).await {
                warn!("검증 시각 기록 실패 (계속 진행): {}", e);
            }

            info!("계정 검증 성공: {}", id);

            Ok(Json(VerifyResponse {
                success: true,
                message: "자격증명이 유효합니다.".to_string(),
                account_info: Some(account_info),
            }))
        }
        Err(e) => {
            warn!("계정 검증 실패 (id: {}): {}", id, e);
            Err(api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_CREDENTIALS",
                verification_failure_message(&e),
            ))
        }
    }
}

/// Verify credentials before saving them.
///
/// `POST /api/v1/accounts/verify`
#[utoipa::path(
    post,
    path = "/api/v1/accounts/verify",
    tag = "accounts",
    request_body = VerifyCredentialsRequest,
    responses(
        (status = 200, description = "검증 결과", body = VerifyResponse),
        (status = 400, description = "유효하지 않은 자격증명", body = ApiErrorResponse),
    )
)]
pub async fn verify_new_credentials(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyCredentialsRequest>,
) -> ApiResult<impl IntoResponse> {
    let api_key = request.api_key.trim();
    let api_secret = request.api_secret.trim();
    if api_key.is_empty() || api_secret.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            "API Key와 Secret은 필수입니다.",
        ));
    }

    let creds = Credentials::new(api_key, api_secret);
    match state.binance.verify_credentials(&creds).await {
        Ok(_) => Ok(Json(VerifyResponse {
            success: true,
            message: "자격증명이 유효합니다.".to_string(),
            account_info: None,
        })),
        Err(e) => Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_CREDENTIALS",
            verification_failure_message(&e),
        )),
    }
}

// =============================================================================
// 헬퍼
// =============================================================================

/// DB 풀 확인. 미구성 시 일관된 에러를 반환합니다.
fn require_pool(state: &AppState) -> Result<&sqlx::PgPool, (StatusCode, Json<ApiErrorResponse>)> {
    state.db_pool.as_ref().ok_or_else(|| {
        error!("DB 연결이 설정되지 않았습니다.");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DB_NOT_CONFIGURED",
            "데이터베이스 연결이 설정되지 않았습니다. DATABASE_URL을 확인하세요.",
        )
    })
}

/// 검증 실패 메시지 정규화.
///
/// 원격 메시지가 있으면 그대로, 없으면 IP allowlist 안내가 포함된
/// 일반 메시지를 사용합니다.
fn verification_failure_message(err: &exgate_exchange::ExchangeError) -> String {
    match err {
        exgate_exchange::ExchangeError::Upstream(msg) => msg.clone(),
        _ => "유효하지 않은 Binance 자격증명이거나 IP가 허용 목록에 없습니다.".to_string(),
    }
}

/// API 키 마스킹.
///
/// ```text
/// mask_api_key("abcd1234efgh5678") == "abcd...5678"
/// mask_api_key("short") == "*****"
/// ```
pub(crate) fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        "*".repeat(key.len())
    } else {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    }
}
