use serde::{Deserialize, Serialize};

use crate::model::{CoinId, FilterKey};

/// What a notification is about: one list filter, or one coin's detail.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum EventScope {
    List(FilterKey),
    Detail(CoinId),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Idle,
    Loading,
    RefreshLoading,
    PaginationLoading,
    ContentUpdated,
    ContentEmpty { is_first_page: bool },
    Error { message: String },
}

impl ViewState {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            ViewState::Loading | ViewState::RefreshLoading | ViewState::PaginationLoading
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SyncEvent {
    pub scope: EventScope,
    pub state: ViewState,
}

impl SyncEvent {
    pub fn list(filter: FilterKey, state: ViewState) -> Self {
        Self {
            scope: EventScope::List(filter),
            state,
        }
    }

    pub fn detail(id: CoinId, state: ViewState) -> Self {
        Self {
            scope: EventScope::Detail(id),
            state,
        }
    }

    pub fn filter(&self) -> Option<FilterKey> {
        match &self.scope {
            EventScope::List(filter) => Some(*filter),
            EventScope::Detail(_) => None,
        }
    }
}
