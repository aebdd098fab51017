//! # Exgate Core
//!
//! 거래소 게이트웨이의 핵심 구성 요소를 제공합니다:
//! - API 시크릿 암호화 볼트 (AES-256-GCM)
//! - 환경 기반 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod crypto;
pub mod logging;

pub use config::{AppConfig, BinanceSettings, DatabaseConfig, ServerConfig, VaultConfig};
pub use crypto::{derive_master_key, generate_master_key, CredentialVault, CryptoError};
pub use logging::{init_logging, init_logging_from_env, LogConfig, LogFormat};
