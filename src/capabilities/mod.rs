//! Seam to the platform's network layer.
//!
//! The shell owns transport. The core hands it request descriptions
//! ([`CoinListRequest`], [`CoinDetailRequest`]), and the shell hands back raw
//! records through a [`CoinFetcher`] implementation, decoding response bodies
//! with [`decode_coin_list`] / [`decode_coin_detail`].

mod http;

pub use self::http::{
    decode_coin_detail, decode_coin_list, CoinDetailRequest, CoinFetcher, CoinListRequest,
    FetchError, ACCESS_TOKEN_HEADER, API_BASE_URL, MAX_PAGE_LIMIT,
};
