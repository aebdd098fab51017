//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use exgate_core::CryptoError;
use exgate_exchange::ExchangeError;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "계정을 찾을 수 없습니다.",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "DB_ERROR", "INVALID_INPUT", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiErrorResponse>)>;

/// `(StatusCode, Json<ApiErrorResponse>)` 생성 헬퍼.
pub fn api_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiErrorResponse>) {
    (status, Json(ApiErrorResponse::new(code, message)))
}

/// 복호화 에러 → API 에러 매핑.
///
/// 페이로드 형식 오류와 태그 검증 실패를 구분해 코드만 다르게 내보내고,
/// 평문이나 키 관련 정보는 절대 메시지에 싣지 않습니다.
pub fn crypto_error(err: &CryptoError) -> (StatusCode, Json<ApiErrorResponse>) {
    match err {
        CryptoError::InvalidFormat => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INVALID_SECRET_FORMAT",
            "저장된 시크릿 형식이 올바르지 않습니다.",
        ),
        CryptoError::AuthenticationFailed => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DECRYPTION_FAILED",
            "시크릿 복호화에 실패했습니다.",
        ),
        _ => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ENCRYPTION_ERROR",
            "암호화 처리 중 오류가 발생했습니다.",
        ),
    }
}

/// 거래소 에러 → API 에러 매핑.
///
/// 원격 호출 실패는 gateway-class(502)로, 지원되지 않는 마켓 조합은
/// 입력 오류(400)로 변환합니다.
pub fn exchange_error(err: &ExchangeError) -> (StatusCode, Json<ApiErrorResponse>) {
    match err {
        ExchangeError::NotSupported(msg) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_MARKET", msg.clone())
        }
        ExchangeError::Upstream(msg) => {
            api_error(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
        }
        ExchangeError::Timeout(_) | ExchangeError::Network(_) => api_error(
            StatusCode::BAD_GATEWAY,
            "UPSTREAM_UNREACHABLE",
            "Binance 요청이 실패했습니다.",
        ),
        ExchangeError::Parse(_) => api_error(
            StatusCode::BAD_GATEWAY,
            "UPSTREAM_ERROR",
            "Binance 응답을 해석할 수 없습니다.",
        ),
    }
}
