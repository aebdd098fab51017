//! 설정 관리.
//!
//! 이 서비스는 환경변수만으로 구성됩니다.
//! 각 섹션은 `from_env()`로 로드하며, 민감 값은 `SecretString`으로 감쌉니다.

use secrecy::SecretString;
use std::fmt;
use std::net::SocketAddr;

/// 애플리케이션 설정.
#[derive(Debug)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 암호화 볼트 설정
    pub vault: VaultConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// Binance 프록시 설정
    pub binance: BinanceSettings,
}

impl AppConfig {
    /// 환경 변수에서 전체 설정을 로드합니다.
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            vault: VaultConfig::from_env(),
            database: DatabaseConfig::from_env(),
            binance: BinanceSettings::from_env(),
        }
    }
}

/// 서버 설정.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// 환경 변수에서 설정 로드 (`API_HOST`, `PORT`).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = std::env::var("API_HOST").unwrap_or(defaults.host);
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        Self { host, port }
    }

    /// 소켓 주소 반환.
    ///
    /// # Errors
    /// `host:port` 형식이 유효하지 않으면 `AddrParseError`를 반환합니다.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// 암호화 볼트 설정.
///
/// 마스터 키가 없으면 서버는 기동할 수 없습니다. 검증은 볼트 생성 시점에
/// 수행됩니다 (`CredentialVault::new`).
#[derive(Debug)]
pub struct VaultConfig {
    /// 마스터 키 원문 (`APP_ENC_KEY`): 64자 hex 또는 임의 패스프레이즈
    pub master_key: Option<SecretString>,
}

impl VaultConfig {
    /// 환경 변수에서 설정 로드 (`APP_ENC_KEY`).
    pub fn from_env() -> Self {
        Self {
            master_key: std::env::var("APP_ENC_KEY").ok().map(SecretString::from),
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 문자열 (`DATABASE_URL`, 없으면 계정 저장소 비활성화)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    /// 환경 변수에서 설정 로드 (`DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`).
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            url: std::env::var("DATABASE_URL").ok(),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            connect_timeout_secs: defaults.connect_timeout_secs,
        }
    }
}

/// Binance 프록시 설정.
///
/// # 보안
/// - `Debug` 구현은 기본 자격증명(`api_key`, `api_secret`)을 마스킹합니다.
pub struct BinanceSettings {
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수신 윈도우 기본값 (밀리초)
    pub recv_window: u64,
    /// 기본 API 키 (계정 미지정 요청에 사용, 선택적)
    pub api_key: Option<String>,
    /// 기본 API 시크릿 (선택적)
    pub api_secret: Option<SecretString>,
}

impl fmt::Debug for BinanceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceSettings")
            .field("timeout_secs", &self.timeout_secs)
            .field("recv_window", &self.recv_window)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field(
                "api_secret",
                &self.api_secret.as_ref().map(|_| "***REDACTED***"),
            )
            .finish()
    }
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            recv_window: 5000,
            api_key: None,
            api_secret: None,
        }
    }
}

impl BinanceSettings {
    /// 환경 변수에서 설정 로드.
    ///
    /// `BINANCE_API_KEY` / `BINANCE_API_SECRET`는 쌍으로만 유효하며,
    /// 한쪽만 설정된 경우 기본 자격증명은 비활성화됩니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout_secs = std::env::var("BINANCE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_secs);
        let recv_window = std::env::var("BINANCE_RECV_WINDOW")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.recv_window);

        let api_key = std::env::var("BINANCE_API_KEY").ok().filter(|k| !k.is_empty());
        let api_secret = std::env::var("BINANCE_API_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let (api_key, api_secret) = match (api_key, api_secret) {
            (Some(k), Some(s)) => (Some(k), Some(SecretString::from(s))),
            _ => (None, None),
        };

        Self {
            timeout_secs,
            recv_window,
            api_key,
            api_secret,
        }
    }

    /// 기본 자격증명이 구성되어 있는지 여부.
    pub fn has_default_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_socket_addr() {
        let config = ServerConfig::default();
        let addr = config.socket_addr().unwrap();

        assert_eq!(addr.port(), 3000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_binance_settings_defaults() {
        let settings = BinanceSettings::default();

        assert_eq!(settings.timeout_secs, 15);
        assert_eq!(settings.recv_window, 5000);
        assert!(!settings.has_default_credentials());
    }

    #[test]
    fn test_binance_settings_debug_redacts_secrets() {
        let settings = BinanceSettings {
            api_key: Some("vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zv".to_string()),
            api_secret: Some(SecretString::from("NhqPtmdSJYdKjVHjA7PZ")),
            ..Default::default()
        };

        let debug = format!("{:?}", settings);
        assert!(!debug.contains("vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zv"));
        assert!(!debug.contains("NhqPtmdSJYdKjVHjA7PZ"));
        assert!(debug.contains("***REDACTED***"));
    }
}
