use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::model::{
    ChartPeriod, CoinDetailResponse, CoinId, CoinListResponse, FilterKey, RawCoin,
};

pub const API_BASE_URL: &str = "https://api.coinranking.com/v2/";
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid url: {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request failed with status code {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("no internet connection")]
    NoInternetConnection,

    #[error("unknown error")]
    Unknown,
}

impl FetchError {
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self {
            FetchError::NoInternetConnection => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            FetchError::RequestFailed { status: 429, .. } => {
                "Too many requests. Please wait a moment and try again.".into()
            }
            FetchError::RequestFailed { status, .. } if (500..=599).contains(status) => {
                "The server is having trouble right now. Please try again later.".into()
            }
            FetchError::RequestFailed { message, .. } if !message.is_empty() => message.clone(),
            FetchError::Decoding(_) => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            _ => "An unexpected error occurred. Please try again.".into(),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::NoInternetConnection | FetchError::Unknown => true,
            FetchError::RequestFailed { status, .. } => {
                *status == 408 || *status == 429 || (500..=599).contains(status)
            }
            FetchError::InvalidUrl { .. }
            | FetchError::InvalidRequest(_)
            | FetchError::Decoding(_) => false,
        }
    }

    /// Build from a non-2xx response, taking the API's `message` when the body
    /// carries one.
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let message = body
            .and_then(|b| serde_json::from_slice::<ApiErrorResponse>(b).ok())
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        FetchError::RequestFailed { status, message }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
}

/// The network layer the core pulls pages from. Implemented by the platform
/// shell; the core never performs I/O itself.
#[async_trait::async_trait]
pub trait CoinFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        filter: FilterKey,
        page_offset: usize,
        page_size: usize,
    ) -> Result<Vec<RawCoin>, FetchError>;

    async fn fetch_detail(&self, id: &CoinId, period: ChartPeriod) -> Result<RawCoin, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinListRequest {
    pub filter: FilterKey,
    pub limit: usize,
    pub offset: usize,
}

impl CoinListRequest {
    /// Request for page `page_offset` of `page_size` items.
    pub fn for_page(
        filter: FilterKey,
        page_offset: usize,
        page_size: usize,
    ) -> Result<Self, FetchError> {
        if filter.is_derived() {
            return Err(FetchError::InvalidRequest(format!(
                "filter '{filter}' is derived and cannot be fetched"
            )));
        }
        if page_size == 0 || page_size > MAX_PAGE_LIMIT {
            return Err(FetchError::InvalidRequest(format!(
                "page size {page_size} outside 1..={MAX_PAGE_LIMIT}"
            )));
        }
        let offset = page_offset.checked_mul(page_size).ok_or_else(|| {
            FetchError::InvalidRequest(format!("page {page_offset} overflows item offset"))
        })?;

        Ok(Self {
            filter,
            limit: page_size,
            offset,
        })
    }

    pub fn to_url(&self, base: &str) -> Result<Url, FetchError> {
        let order_by = self.filter.order_by().ok_or_else(|| {
            FetchError::InvalidRequest(format!("filter '{}' has no ordering", self.filter))
        })?;

        let mut url = parse_base(base)?
            .join("coins")
            .map_err(|e| invalid_url(base, &e))?;
        url.query_pairs_mut()
            .append_pair("limit", &self.limit.to_string())
            .append_pair("offset", &self.offset.to_string())
            .append_pair("orderBy", order_by);
        Ok(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinDetailRequest {
    pub id: CoinId,
    pub period: ChartPeriod,
}

impl CoinDetailRequest {
    pub fn to_url(&self, base: &str) -> Result<Url, FetchError> {
        if self.id.as_str().is_empty() {
            return Err(FetchError::InvalidRequest("coin id cannot be empty".into()));
        }

        let mut url = parse_base(base)?;
        url.path_segments_mut()
            .map_err(|()| FetchError::InvalidUrl {
                url: base.to_string(),
                reason: "base url cannot have path segments".into(),
            })?
            .pop_if_empty()
            .push("coin")
            .push(self.id.as_str());
        url.query_pairs_mut()
            .append_pair("timePeriod", self.period.api_value());
        Ok(url)
    }
}

fn parse_base(base: &str) -> Result<Url, FetchError> {
    let url = Url::parse(base).map_err(|e| invalid_url(base, &e))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(FetchError::InvalidUrl {
            url: base.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn invalid_url(url: &str, e: &url::ParseError) -> FetchError {
    FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

pub fn decode_coin_list(body: &[u8]) -> Result<Vec<RawCoin>, FetchError> {
    serde_json::from_slice::<CoinListResponse>(body)
        .map(|r| r.data.coins)
        .map_err(|e| FetchError::Decoding(e.to_string()))
}

pub fn decode_coin_detail(body: &[u8]) -> Result<RawCoin, FetchError> {
    serde_json::from_slice::<CoinDetailResponse>(body)
        .map(|r| r.data.coin)
        .map_err(|e| FetchError::Decoding(e.to_string()))
}
