//! Binance 마켓 카탈로그.
//!
//! 마켓별 base 호스트와 엔드포인트 경로 매핑을 제공합니다.
//! 서명/비서명 요청 모두 이 카탈로그를 통해 경로를 결정합니다.

use serde::Deserialize;
use std::fmt;

/// Binance 마켓 (거래 상품군).
///
/// 각 마켓은 고유한 base 호스트와 경로 템플릿을 가집니다.
/// 쿼리/경로 파라미터로는 소문자 표기를 사용하며, Binance 문서의
/// 대문자 표기(`USDM` 등)도 허용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Market {
    /// 현물 (api.binance.com)
    #[serde(rename = "spot", alias = "SPOT")]
    Spot,
    /// USDⓈ-M 선물 (fapi.binance.com)
    #[serde(rename = "usdm", alias = "USDM")]
    UsdMargined,
    /// COIN-M 선물 (dapi.binance.com)
    #[serde(rename = "coinm", alias = "COINM")]
    CoinMargined,
    /// 옵션 (eapi.binance.com)
    #[serde(rename = "options", alias = "OPTIONS")]
    Options,
    /// 교차 마진 (api.binance.com, /sapi)
    #[serde(rename = "cross", alias = "CROSS")]
    CrossMargin,
    /// 격리 마진 (api.binance.com, /sapi)
    #[serde(rename = "isolated", alias = "ISOLATED")]
    IsolatedMargin,
}

impl Market {
    /// 모든 마켓.
    pub const ALL: [Market; 6] = [
        Market::Spot,
        Market::UsdMargined,
        Market::CoinMargined,
        Market::Options,
        Market::CrossMargin,
        Market::IsolatedMargin,
    ];

    /// REST API base URL.
    pub fn base_url(&self) -> &'static str {
        match self {
            Market::Spot | Market::CrossMargin | Market::IsolatedMargin => {
                "https://api.binance.com"
            }
            Market::UsdMargined => "https://fapi.binance.com",
            Market::CoinMargined => "https://dapi.binance.com",
            Market::Options => "https://eapi.binance.com",
        }
    }

    /// 체결 내역 조회 경로 (서명 필요).
    pub fn user_trades_path(&self) -> &'static str {
        match self {
            Market::Spot => "/api/v3/myTrades",
            Market::UsdMargined => "/fapi/v1/userTrades",
            Market::CoinMargined => "/dapi/v1/userTrades",
            Market::Options => "/eapi/v1/userTrades",
            Market::CrossMargin => "/sapi/v1/margin/myTrades",
            Market::IsolatedMargin => "/sapi/v1/margin/isolated/myTrades",
        }
    }

    /// 계좌 정보 조회 경로 (서명 필요).
    pub fn account_path(&self) -> &'static str {
        match self {
            Market::Spot => "/api/v3/account",
            Market::UsdMargined => "/fapi/v2/account",
            Market::CoinMargined => "/dapi/v1/account",
            Market::Options => "/eapi/v1/account",
            Market::CrossMargin => "/sapi/v1/margin/account",
            Market::IsolatedMargin => "/sapi/v1/margin/isolated/account",
        }
    }

    /// 미체결 주문 조회 경로 (서명 필요).
    ///
    /// 격리 마진은 교차 마진과 같은 경로에 `isIsolated=TRUE` 파라미터를
    /// 추가합니다 (클라이언트에서 처리).
    pub fn open_orders_path(&self) -> &'static str {
        match self {
            Market::Spot => "/api/v3/openOrders",
            Market::UsdMargined => "/fapi/v1/openOrders",
            Market::CoinMargined => "/dapi/v1/openOrders",
            Market::Options => "/eapi/v1/openOrders",
            Market::CrossMargin | Market::IsolatedMargin => "/sapi/v1/margin/openOrders",
        }
    }

    /// 포지션 조회 경로 (선물 마켓만 지원).
    pub fn positions_path(&self) -> Option<&'static str> {
        match self {
            Market::UsdMargined => Some("/fapi/v2/positionRisk"),
            Market::CoinMargined => Some("/dapi/v1/positionRisk"),
            _ => None,
        }
    }

    /// 거래 가능 심볼 조회 경로 (공개 API).
    pub fn exchange_info_path(&self) -> &'static str {
        match self {
            Market::Spot | Market::CrossMargin | Market::IsolatedMargin => "/api/v3/exchangeInfo",
            Market::UsdMargined => "/fapi/v1/exchangeInfo",
            Market::CoinMargined => "/dapi/v1/exchangeInfo",
            Market::Options => "/eapi/v1/exchangeInfo",
        }
    }

    /// 선물 마켓 여부 (무기한 계약 필터링에 사용).
    pub fn is_futures(&self) -> bool {
        matches!(self, Market::UsdMargined | Market::CoinMargined)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Market::Spot => "spot",
            Market::UsdMargined => "usdm",
            Market::CoinMargined => "coinm",
            Market::Options => "options",
            Market::CrossMargin => "cross",
            Market::IsolatedMargin => "isolated",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spot" => Ok(Market::Spot),
            "usdm" => Ok(Market::UsdMargined),
            "coinm" => Ok(Market::CoinMargined),
            "options" => Ok(Market::Options),
            "cross" => Ok(Market::CrossMargin),
            "isolated" => Ok(Market::IsolatedMargin),
            _ => Err(format!(
                "Unknown market: {} (use spot|usdm|coinm|options|cross|isolated)",
                s
            )),
        }
    }
}
