//! HMAC-SHA256 서명 쿼리 빌더.
//!
//! Binance 인증 엔드포인트가 요구하는 서명된 쿼리 문자열을 생성합니다.
//! 파라미터 맵 + API 시크릿 → `key=value&...&signature=<hex>` 형식.
//!
//! 동작 규칙:
//! - 값이 없는 파라미터는 직렬화에서 완전히 제외 (빈 문자열/null로 남기지 않음)
//! - 삽입 순서 보존, `signature`는 항상 마지막
//! - 값은 percent-encoding, 서명은 인코딩된 쿼리 문자열 위에서 계산
//! - 동일 입력 → 동일 출력 (난수 없음)

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// 서명 파라미터 값.
///
/// Binance API가 받는 스칼라 유형(string | number | boolean)의 닫힌 합집합.
/// 직렬화 규칙은 `to_query_value()` 하나로 통일합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ParamValue {
    /// 쿼리 문자열 값으로 변환 (percent-encoding 이전).
    fn to_query_value(&self) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// 삽입 순서를 보존하는 쿼리 파라미터 목록.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(Vec<(String, ParamValue)>);

impl QueryParams {
    /// 빈 파라미터 목록 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파라미터 추가.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.push((key.into(), value.into()));
    }

    /// 값이 있을 때만 파라미터 추가.
    ///
    /// `None`인 파라미터는 쿼리 문자열에 아예 나타나지 않습니다.
    pub fn push_opt<V: Into<ParamValue>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// 지정한 키가 이미 포함되어 있는지 확인.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 서명 전의 쿼리 문자열로 인코딩.
    ///
    /// 값은 percent-encoding을 적용하고 키는 그대로 둡니다
    /// (키는 호출자가 제어하는 고정 식별자).
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(&v.to_query_value())))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// 쿼리 문자열에 HMAC-SHA256 서명을 붙여 반환.
///
/// 반환값은 `<qs>&signature=<hex>` 형식으로, 그대로 요청 쿼리로 사용합니다.
/// 같은 파라미터(순서 포함)와 시크릿에 대해 결과는 항상 동일합니다.
pub fn sign(params: &QueryParams, secret: &str) -> String {
    let qs = params.encode();
    let signature = hmac_sha256_hex(secret, &qs);
    format!("{}&signature={}", qs, signature)
}

/// HMAC-SHA256 후 hex 인코딩.
fn hmac_sha256_hex(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("Invalid key");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
