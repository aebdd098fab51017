//! # Exgate Exchange
//!
//! Binance 마켓별 서명 REST 프록시 구현:
//! - HMAC-SHA256 서명 쿼리 빌더
//! - 마켓(현물/선물/옵션/마진) 엔드포인트 카탈로그
//! - 계정별 자격증명으로 호출하는 무상태 HTTPS 클라이언트

pub mod client;
pub mod error;
pub mod market;
pub mod signer;

pub use client::{BinanceClient, Credentials, TradeQuery};
pub use error::{ExchangeError, ExchangeResult};
pub use market::Market;
pub use signer::{sign, ParamValue, QueryParams};
