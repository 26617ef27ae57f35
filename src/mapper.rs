//! Raw transport records to display entities.
//!
//! Nothing in here fails: malformed numbers degrade to `None`, which the
//! entity renders as an empty string.

use url::Url;

use crate::model::{ChartPeriod, CoinDetail, CoinEntity, CoinId, PricePoint, RawCoin, UnixTimeMs};

const THOUSAND: f64 = 1_000.0;
const MILLION: f64 = 1_000_000.0;
const BILLION: f64 = 1_000_000_000.0;
const TRILLION: f64 = 1_000_000_000_000.0;

/// Map one fetched coin. The server has no notion of favorites, so the flag
/// always starts `false`; the store reconciles it on merge.
#[must_use]
pub fn map_coin(raw: RawCoin) -> CoinEntity {
    let price = raw.price.as_deref().and_then(parse_decimal);
    let change_percent = raw.change.as_deref().and_then(parse_decimal);
    let icon_reference = raw.icon_url.as_deref().and_then(|u| Url::parse(u).ok());

    CoinEntity {
        id: CoinId::new(raw.uuid),
        name: raw.name,
        symbol: raw.symbol,
        price,
        change_percent,
        icon_reference,
        is_favorite: false,
        color: raw.color,
        raw_market_cap: raw.market_cap,
        raw_price_at_timestamp: raw.price_at,
        all_time_high_price: raw.all_time_high.and_then(|ath| ath.price),
        sparkline_series: raw.sparkline,
    }
}

pub fn map_coins(raw: Vec<RawCoin>) -> Vec<CoinEntity> {
    raw.into_iter().map(map_coin).collect()
}

/// Project a list entity into a detail without re-fetching.
#[must_use]
pub fn clone_as_detail(entity: &CoinEntity, now: UnixTimeMs) -> CoinDetail {
    build_detail(entity.clone(), ChartPeriod::default(), now)
}

/// Map a freshly fetched detail record. `is_favorite` is carried over from
/// whatever the caller already knows about the coin.
#[must_use]
pub fn map_detail(raw: RawCoin, period: ChartPeriod, is_favorite: bool, now: UnixTimeMs) -> CoinDetail {
    let mut entity = map_coin(raw);
    entity.is_favorite = is_favorite;
    build_detail(entity, period, now)
}

fn build_detail(entity: CoinEntity, period: ChartPeriod, now: UnixTimeMs) -> CoinDetail {
    let chart = map_sparkline(&entity.sparkline_series, period, now);
    let market_cap_text = entity.raw_market_cap.as_deref().map(format_large_number);
    let all_time_high_text = entity
        .all_time_high_price
        .as_deref()
        .map(|p| format!("${}", format_large_number(p)));
    let price_at = entity
        .raw_price_at_timestamp
        .and_then(|secs| u64::try_from(secs).ok())
        .map(|secs| UnixTimeMs(secs.saturating_mul(1_000)));

    CoinDetail {
        chart_color: entity.color.clone(),
        entity,
        period,
        chart,
        market_cap_text,
        all_time_high_text,
        price_at,
    }
}

/// Spread sparkline samples backwards from `now`, oldest first.
/// Null and unparsable samples are dropped.
pub fn map_sparkline(series: &[Option<String>], period: ChartPeriod, now: UnixTimeMs) -> Vec<PricePoint> {
    let samples: Vec<f64> = series
        .iter()
        .flatten()
        .filter_map(|s| parse_decimal(s))
        .collect();

    let n = samples.len() as u64;
    if n == 0 {
        return Vec::new();
    }

    let interval = sample_interval_minutes(period, n);
    samples
        .into_iter()
        .enumerate()
        .map(|(i, price)| {
            let steps_back = n - 1 - i as u64;
            PricePoint {
                timestamp: now.minus_minutes(steps_back * interval),
                price,
            }
        })
        .collect()
}

fn sample_interval_minutes(period: ChartPeriod, samples: u64) -> u64 {
    let (span_minutes, buckets) = match period {
        ChartPeriod::Day => (60, 24),
        ChartPeriod::Week => (24 * 60, 7),
        ChartPeriod::Month => (24 * 60, 30),
        ChartPeriod::Year => (24 * 60 * 30, 12),
    };
    span_minutes / (samples / buckets).max(1)
}

/// `1234567` -> `"1.23M"`. Unparsable input is returned as-is.
#[must_use]
pub fn format_large_number(value: &str) -> String {
    let Some(number) = parse_decimal(value) else {
        return value.to_string();
    };

    if number >= TRILLION {
        format!("{:.2}T", number / TRILLION)
    } else if number >= BILLION {
        format!("{:.2}B", number / BILLION)
    } else if number >= MILLION {
        format!("{:.2}M", number / MILLION)
    } else if number >= THOUSAND {
        format!("{:.2}K", number / THOUSAND)
    } else {
        format!("{number:.2}")
    }
}

fn parse_decimal(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
