#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod event;
pub mod mapper;
pub mod model;
pub mod pagination;
pub mod store;
pub mod sync;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use capabilities::{CoinFetcher, FetchError};
pub use event::{EventScope, SyncEvent, ViewState};
pub use model::{ChartPeriod, CoinDetail, CoinEntity, CoinId, FilterKey, RawCoin, UnixTimeMs};
pub use pagination::{LoadKind, PaginationState};
pub use store::FilterDataStore;
pub use sync::{CoinSync, SyncConfig};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_MAX_ITEMS: usize = 100;
pub const DEFAULT_DETAIL_CACHE_SIZE: usize = 64;
pub const DEFAULT_EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A coin id that was never surfaced by any list. Caller bug.
    #[error("unknown coin id: {0}")]
    UnknownCoin(CoinId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::Fetch(e) if e.is_retryable() => ErrorSeverity::Transient,
            SyncError::Fetch(_) | SyncError::InvalidConfig(_) => ErrorSeverity::Permanent,
            SyncError::UnknownCoin(_) => ErrorSeverity::Fatal,
        }
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self {
            SyncError::Fetch(e) => e.user_facing_message(),
            SyncError::UnknownCoin(_) | SyncError::InvalidConfig(_) => {
                "An unexpected error occurred. Please restart the app.".into()
            }
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
