//! Exgate API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 암호화 마스터 키(`APP_ENC_KEY`)가 없으면 서버는 기동하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use axum::http::StatusCode;
use axum::Router;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use exgate_api::repository::AccountRepository;
use exgate_api::routes::create_api_router;
use exgate_api::state::AppState;
use exgate_core::{init_logging_from_env, AppConfig, CredentialVault};
use exgate_exchange::{BinanceClient, Credentials};

/// AppState 초기화.
///
/// 볼트 초기화 실패는 치명적 오류로 서버가 기동하지 않습니다.
/// DB는 선택적이며, 없으면 계정 저장소 없이 기본 자격증명만 사용합니다.
async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    // 암호화 볼트 생성 (필수)
    let master_key = config
        .vault
        .master_key
        .as_ref()
        .ok_or_else(|| anyhow!("APP_ENC_KEY is required"))?;
    let vault = CredentialVault::new(master_key.expose_secret())
        .context("failed to initialize credential vault")?;
    info!("Credential vault initialized");

    // Binance 클라이언트 생성
    let binance = BinanceClient::new(config.binance.timeout_secs, config.binance.recv_window)
        .map_err(|e| anyhow!("failed to create Binance client: {}", e))?;

    let mut state = AppState::new(vault, binance);

    // DB 연결 설정 (DATABASE_URL 환경변수에서)
    if let Some(database_url) = &config.database.url {
        match PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                if sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok() {
                    AccountRepository::ensure_schema(&pool)
                        .await
                        .context("failed to bootstrap account schema")?;
                    info!("Connected to PostgreSQL successfully");
                    state = state.with_db_pool(pool);
                } else {
                    error!("Failed to verify database connection");
                }
            }
            Err(e) => {
                error!("Failed to connect to database: {}", e);
            }
        }
    } else {
        warn!("DATABASE_URL not set, account storage will be disabled");
    }

    // 환경변수 기본 자격증명 (선택적)
    if let (Some(api_key), Some(api_secret)) =
        (&config.binance.api_key, &config.binance.api_secret)
    {
        info!("Default Binance credentials configured from environment");
        state = state.with_default_credentials(Credentials::new(
            api_key.clone(),
            api_secret.expose_secret(),
        ));
    }

    Ok(state)
}

/// CORS 미들웨어 구성.
///
/// `CORS_ORIGINS` 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>) -> Router {
    create_api_router()
        .with_state(state)
        // OpenAPI 문서 및 Swagger UI
        .merge(exgate_api::openapi::swagger_ui_router())
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // tracing 초기화
    init_logging_from_env().map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting Exgate API server...");

    // 설정 로드
    let config = AppConfig::from_env();
    let addr = config.server.socket_addr().map_err(|e| {
        error!(
            host = %config.server.host,
            port = config.server.port,
            "소켓 주소 설정이 유효하지 않습니다. API_HOST, PORT 환경변수를 확인하세요."
        );
        anyhow!("invalid socket address: {}", e)
    })?;

    // AppState 생성 (볼트, DB, 클라이언트 초기화 포함)
    let state = Arc::new(create_app_state(&config).await?);

    info!(version = %state.version, "Application state initialized");
    info!(
        has_db = state.db_pool.is_some(),
        has_default_credentials = state.default_credentials.is_some(),
        "Service connections status"
    );

    // 라우터 생성
    let app = create_router(state);

    // 서버 시작
    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
