use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::model::FilterKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadKind {
    Initial,
    Refresh,
    Pagination,
}

/// Per-filter pagination bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    /// Page requested by the current (or most recent successful) load.
    pub page_offset: usize,
    pub is_last_page: bool,
    pub is_fetch_in_flight: bool,
    pub has_completed_initial_fetch: bool,
    // Bumped by every started load; only the newest load may settle the state.
    #[serde(skip)]
    generation: u64,
}

impl PaginationState {
    /// Inverse of the in-flight guard.
    #[must_use]
    pub fn can_paginate(&self) -> bool {
        !self.is_fetch_in_flight && !self.is_last_page
    }
}

/// Outcome of [`PaginationTracker::begin_load`]. When `should_proceed` is
/// set, exactly one of `complete_load` or `fail_load` must follow with this
/// ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub should_proceed: bool,
    pub kind: LoadKind,
    pub page_offset: usize,
    generation: u64,
}

impl LoadTicket {
    #[must_use]
    pub fn is_first_page(&self) -> bool {
        self.page_offset == 0
    }

    fn rejected(kind: LoadKind, page_offset: usize) -> Self {
        Self {
            should_proceed: false,
            kind,
            page_offset,
            generation: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct PaginationTracker {
    states: HashMap<FilterKey, PaginationState>,
    // Never reset, so tickets from before a `clear` cannot match a new load.
    last_generation: u64,
}

impl PaginationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for `filter`. Filters that were never touched report the
    /// default (unfetched) state.
    #[must_use]
    pub fn state(&self, filter: FilterKey) -> PaginationState {
        self.states.get(&filter).copied().unwrap_or_default()
    }

    pub fn begin_load(&mut self, filter: FilterKey, kind: LoadKind) -> LoadTicket {
        if filter.is_derived() {
            warn!(%filter, ?kind, "derived filter has no pagination state");
            return LoadTicket::rejected(kind, 0);
        }

        let generation = self.last_generation + 1;
        let state = self.states.entry(filter).or_default();
        match kind {
            LoadKind::Initial | LoadKind::Refresh => {
                state.page_offset = 0;
                state.is_last_page = false;
            }
            LoadKind::Pagination => {
                if !state.can_paginate() {
                    debug!(
                        %filter,
                        in_flight = state.is_fetch_in_flight,
                        last_page = state.is_last_page,
                        "pagination request ignored"
                    );
                    return LoadTicket::rejected(kind, state.page_offset);
                }
                state.page_offset += 1;
            }
        }

        state.is_fetch_in_flight = true;
        state.generation = generation;
        self.last_generation = generation;

        LoadTicket {
            should_proceed: true,
            kind,
            page_offset: state.page_offset,
            generation: state.generation,
        }
    }

    fn current_mut(
        &mut self,
        filter: FilterKey,
        ticket: &LoadTicket,
    ) -> Option<&mut PaginationState> {
        let Some(state) = self.states.get_mut(&filter) else {
            debug!(%filter, "load settled after its state was cleared");
            return None;
        };
        if !ticket.should_proceed || state.generation != ticket.generation {
            debug!(
                %filter,
                kind = ?ticket.kind,
                page = ticket.page_offset,
                "superseded load settled, state left to the newer load"
            );
            return None;
        }
        Some(state)
    }

    /// Settle a successful load. Returns `false` when a newer load has
    /// started since `ticket` was issued; the state is then left alone.
    pub fn complete_load(
        &mut self,
        filter: FilterKey,
        ticket: &LoadTicket,
        result_size: usize,
        page_size: usize,
    ) -> bool {
        let Some(state) = self.current_mut(filter, ticket) else {
            return false;
        };

        state.is_fetch_in_flight = false;
        state.is_last_page = result_size < page_size;
        if state.page_offset == 0 {
            state.has_completed_initial_fetch = true;
        }
        true
    }

    /// Second end-of-pagination trigger, used when the stored collection
    /// reaches the configured item cap.
    pub fn force_last_page(&mut self, filter: FilterKey) {
        if let Some(state) = self.states.get_mut(&filter) {
            state.is_last_page = true;
        }
    }

    /// Clears the in-flight guard. A failed pagination gives its page back so
    /// the next pagination request asks for the same page again. Superseded
    /// loads change nothing.
    pub fn fail_load(&mut self, filter: FilterKey, ticket: &LoadTicket) -> bool {
        let Some(state) = self.current_mut(filter, ticket) else {
            return false;
        };

        if ticket.kind == LoadKind::Pagination {
            state.page_offset = state.page_offset.saturating_sub(1);
        }
        state.is_fetch_in_flight = false;
        true
    }

    #[must_use]
    pub fn has_completed_initial_fetch(&self, filter: FilterKey) -> bool {
        self.state(filter).has_completed_initial_fetch
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}
