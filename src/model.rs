use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(CoinId);

/// Unix timestamp in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    pub fn now() -> Self {
        Self(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }

    #[must_use]
    pub fn minus_minutes(self, minutes: u64) -> Self {
        Self(self.0.saturating_sub(minutes.saturating_mul(60_000)))
    }
}

// --- Filters ---

/// Named partition of the coin universe.
///
/// Declaration order is significant: the derived favorites view visits the
/// fetched filters in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    All,
    HighestPrice,
    Performance24h,
    Favorite,
}

impl FilterKey {
    pub const ALL: [FilterKey; 4] = [
        FilterKey::All,
        FilterKey::HighestPrice,
        FilterKey::Performance24h,
        FilterKey::Favorite,
    ];

    /// Filters populated by direct fetch, in declaration order.
    pub const FETCHED: [FilterKey; 3] = [
        FilterKey::All,
        FilterKey::HighestPrice,
        FilterKey::Performance24h,
    ];

    /// `Favorite` is never fetched; it is projected from the other filters.
    #[must_use]
    pub const fn is_derived(self) -> bool {
        matches!(self, FilterKey::Favorite)
    }

    /// `orderBy` value understood by the CoinRanking list endpoint.
    #[must_use]
    pub const fn order_by(self) -> Option<&'static str> {
        match self {
            FilterKey::All => Some("marketCap"),
            FilterKey::HighestPrice => Some("price"),
            FilterKey::Performance24h => Some("24hVolume"),
            FilterKey::Favorite => None,
        }
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterKey::All => "all",
            FilterKey::HighestPrice => "highest_price",
            FilterKey::Performance24h => "performance_24h",
            FilterKey::Favorite => "favorite",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartPeriod {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl ChartPeriod {
    #[must_use]
    pub const fn api_value(self) -> &'static str {
        match self {
            ChartPeriod::Day => "24h",
            ChartPeriod::Week => "7d",
            ChartPeriod::Month => "30d",
            ChartPeriod::Year => "1y",
        }
    }
}

// --- Transport records ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllTimeHigh {
    pub price: Option<String>,
}

/// One coin as the CoinRanking API returns it. Numeric fields arrive as strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCoin {
    pub uuid: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub change: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sparkline: Vec<Option<String>>,
    #[serde(default)]
    pub all_time_high: Option<AllTimeHigh>,
    #[serde(default)]
    pub market_cap: Option<String>,
    #[serde(default)]
    pub price_at: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CoinListResponse {
    pub data: CoinListData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CoinListData {
    pub coins: Vec<RawCoin>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CoinDetailResponse {
    pub data: CoinDetailData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CoinDetailData {
    pub coin: RawCoin,
}

// --- Display entities ---

/// Display-ready list item.
///
/// Every filter owns its own copy of a coin. The favorite flag is kept in
/// sync across those copies by the store, never through shared references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoinEntity {
    pub id: CoinId,
    pub name: String,
    pub symbol: String,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub icon_reference: Option<Url>,
    pub is_favorite: bool,
    pub color: Option<String>,
    pub raw_market_cap: Option<String>,
    pub raw_price_at_timestamp: Option<i64>,
    pub all_time_high_price: Option<String>,
    pub sparkline_series: Vec<Option<String>>,
}

impl CoinEntity {
    /// `$` followed by two decimals, or empty when the price was unparsable.
    #[must_use]
    pub fn price_text(&self) -> String {
        self.price
            .map(|p| format!("${p:.2}"))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn change_text(&self) -> String {
        self.change_percent
            .map(|c| format!("{c:.2}%"))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_change_positive(&self) -> bool {
        !matches!(self.change_percent, Some(c) if c < 0.0)
    }

    pub fn set_favorite(&mut self, value: bool) {
        self.is_favorite = value;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: UnixTimeMs,
    pub price: f64,
}

/// Detail projection of a coin. Built either from a fetched detail record or
/// by cloning a list entity when no detail fetch has happened yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoinDetail {
    pub entity: CoinEntity,
    pub period: ChartPeriod,
    pub chart: Vec<PricePoint>,
    pub chart_color: Option<String>,
    pub market_cap_text: Option<String>,
    pub all_time_high_text: Option<String>,
    pub price_at: Option<UnixTimeMs>,
}

impl CoinDetail {
    pub fn id(&self) -> &CoinId {
        &self.entity.id
    }
}
