//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! `AppState`는 Arc로 래핑되어 여러 요청 간에 안전하게 공유됩니다.
//! 마스터 키에서 유도된 볼트는 생성 이후 읽기 전용입니다.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use exgate_core::CredentialVault;
use exgate_exchange::{BinanceClient, Credentials};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 데이터베이스 연결 풀 (없으면 계정 저장소 비활성화)
    pub db_pool: Option<sqlx::PgPool>,

    /// 자격증명 암호화 볼트 (AES-256-GCM, 기동 시 필수)
    pub vault: Arc<CredentialVault>,

    /// Binance 서명 클라이언트
    pub binance: Arc<BinanceClient>,

    /// 환경변수로 구성된 기본 자격증명 (계정 미지정 요청에 사용)
    pub default_credentials: Option<Credentials>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    pub fn new(vault: CredentialVault, binance: BinanceClient) -> Self {
        Self {
            db_pool: None,
            vault: Arc::new(vault),
            binance: Arc::new(binance),
            default_credentials: None,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// DB 연결 풀 설정.
    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// 기본 자격증명 설정.
    pub fn with_default_credentials(mut self, credentials: Credentials) -> Self {
        self.default_credentials = Some(credentials);
        self
    }

    /// DB 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
            None => false,
        }
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
