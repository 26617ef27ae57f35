use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::capabilities::{CoinFetcher, FetchError};
use crate::event::{SyncEvent, ViewState};
use crate::mapper;
use crate::model::{ChartPeriod, CoinDetail, CoinEntity, CoinId, FilterKey, UnixTimeMs};
use crate::pagination::{LoadKind, PaginationState, PaginationTracker};
use crate::store::FilterDataStore;
use crate::{
    SyncError, SyncResult, DEFAULT_DETAIL_CACHE_SIZE, DEFAULT_EVENT_BUFFER, DEFAULT_MAX_ITEMS,
    DEFAULT_PAGE_SIZE,
};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub page_size: usize,
    /// Stored-item cap per filter. Reaching it ends pagination.
    pub max_items: usize,
    pub detail_cache_size: usize,
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_items: DEFAULT_MAX_ITEMS,
            detail_cache_size: DEFAULT_DETAIL_CACHE_SIZE,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> SyncResult<()> {
        if self.page_size == 0 {
            return Err(SyncError::InvalidConfig("page_size must be > 0".into()));
        }
        if self.max_items == 0 {
            return Err(SyncError::InvalidConfig("max_items must be > 0".into()));
        }
        if self.max_items < self.page_size {
            return Err(SyncError::InvalidConfig(
                "max_items must be at least page_size".into(),
            ));
        }
        if self.detail_cache_size == 0 {
            return Err(SyncError::InvalidConfig(
                "detail_cache_size must be > 0".into(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(SyncError::InvalidConfig("event_buffer must be > 0".into()));
        }
        Ok(())
    }

    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Orchestrator State
// ============================================================================

struct SyncState {
    store: FilterDataStore,
    pagination: PaginationTracker,
    details: lru::LruCache<CoinId, CoinDetail>,
}

impl SyncState {
    fn new(max_items: usize, detail_cache_size: NonZeroUsize) -> Self {
        Self {
            store: FilterDataStore::new(max_items),
            pagination: PaginationTracker::new(),
            details: lru::LruCache::new(detail_cache_size),
        }
    }

    fn favorite_flag(&self, id: &CoinId) -> Option<bool> {
        self.store
            .find(id)
            .map(|c| c.is_favorite)
            .or_else(|| self.details.peek(id).map(|d| d.entity.is_favorite))
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Owns the per-filter collections and pagination state for one session and
/// drives fetches through a [`CoinFetcher`].
///
/// State changes are announced on a broadcast channel; see [`subscribe`].
/// The state lock is never held across a fetch, so loads for different
/// filters run in parallel while each mutation stays atomic.
///
/// [`subscribe`]: Self::subscribe
pub struct CoinSync<F: CoinFetcher> {
    fetcher: Arc<F>,
    config: SyncConfig,
    state: RwLock<SyncState>,
    events: broadcast::Sender<SyncEvent>,
}

impl<F: CoinFetcher> CoinSync<F> {
    #[instrument(skip(fetcher))]
    pub fn new(fetcher: Arc<F>, config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;

        let cache_size = NonZeroUsize::new(config.detail_cache_size).ok_or_else(|| {
            SyncError::InvalidConfig("detail_cache_size must be > 0".into())
        })?;
        let (events, _) = broadcast::channel(config.event_buffer);

        info!(
            page_size = config.page_size,
            max_items = config.max_items,
            "coin sync initialized"
        );

        Ok(Self {
            fetcher,
            state: RwLock::new(SyncState::new(config.max_items, cache_size)),
            config,
            events,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        // Err only means nobody is listening.
        let _ = self.events.send(event);
    }

    fn emit_list(&self, filter: FilterKey, state: ViewState) {
        self.emit(SyncEvent::list(filter, state));
    }

    fn emit_favorites(&self, is_empty: bool) {
        let state = if is_empty {
            ViewState::ContentEmpty {
                is_first_page: true,
            }
        } else {
            ViewState::ContentUpdated
        };
        self.emit_list(FilterKey::Favorite, state);
    }

    // --- Loading ---

    /// Load a page for `filter`.
    ///
    /// Never fails: the outcome is reported through events. Rejected
    /// pagination requests return without emitting anything.
    #[instrument(skip(self))]
    pub async fn load_list(&self, filter: FilterKey, kind: LoadKind) {
        if filter.is_derived() {
            debug!("favorites are derived, serving current projection");
            self.emit_list(filter, ViewState::Idle);
            self.emit_list(filter, ViewState::ContentUpdated);
            return;
        }

        let ticket = {
            let mut state = self.state.write().await;
            if kind == LoadKind::Initial && state.pagination.has_completed_initial_fetch(filter) {
                drop(state);
                debug!("initial fetch already done, serving cached content");
                self.emit_list(filter, ViewState::Idle);
                self.emit_list(filter, ViewState::ContentUpdated);
                return;
            }
            state.pagination.begin_load(filter, kind)
        };

        if !ticket.should_proceed {
            debug!("load not started");
            return;
        }

        self.emit_list(filter, loading_state(ticket.kind));

        let page_size = self.config.page_size;
        let result = self
            .fetcher
            .fetch_page(filter, ticket.page_offset, page_size)
            .await;

        match result {
            Ok(raw) => {
                let received = raw.len();
                let entities = mapper::map_coins(raw);

                // A superseded page is still merged, the newest resolution wins
                // the contents. Pagination state belongs to the newer load.
                let (stored, is_last_page, current) = {
                    let mut state = self.state.write().await;
                    let stored = state
                        .store
                        .merge(filter, entities, ticket.is_first_page())
                        .len();
                    let current = state
                        .pagination
                        .complete_load(filter, &ticket, received, page_size);
                    if current && stored >= state.store.max_items() {
                        state.pagination.force_last_page(filter);
                    }
                    (stored, state.pagination.state(filter).is_last_page, current)
                };

                info!(
                    page = ticket.page_offset,
                    received, stored, is_last_page, current, "page loaded"
                );

                self.emit_list(filter, ViewState::Idle);
                if received == 0 {
                    self.emit_list(
                        filter,
                        ViewState::ContentEmpty {
                            is_first_page: ticket.is_first_page(),
                        },
                    );
                } else {
                    self.emit_list(filter, ViewState::ContentUpdated);
                }
            }
            Err(err) => {
                self.state
                    .write()
                    .await
                    .pagination
                    .fail_load(filter, &ticket);
                warn!(page = ticket.page_offset, error = %err, "page fetch failed");

                self.emit_list(filter, ViewState::Idle);
                self.emit_list(
                    filter,
                    ViewState::Error {
                        message: err.user_facing_message(),
                    },
                );
            }
        }
    }

    /// Fetch the full detail record for `id` and cache it.
    #[instrument(skip(self))]
    pub async fn load_detail(&self, id: &CoinId, period: ChartPeriod) -> Option<CoinDetail> {
        self.emit(SyncEvent::detail(id.clone(), ViewState::Loading));

        let fetched = self
            .fetcher
            .fetch_detail(id, period)
            .await
            .and_then(|raw| {
                if raw.uuid == id.as_str() {
                    Ok(raw)
                } else {
                    Err(FetchError::Decoding(format!(
                        "detail for '{id}' carried id '{}'",
                        raw.uuid
                    )))
                }
            });

        match fetched {
            Ok(raw) => {
                let detail = {
                    let mut state = self.state.write().await;
                    let is_favorite = state.favorite_flag(id).unwrap_or(false);
                    let detail = mapper::map_detail(raw, period, is_favorite, UnixTimeMs::now());
                    state.details.put(detail.id().clone(), detail.clone());
                    detail
                };

                info!(points = detail.chart.len(), "detail loaded");
                self.emit(SyncEvent::detail(id.clone(), ViewState::Idle));
                self.emit(SyncEvent::detail(id.clone(), ViewState::ContentUpdated));
                Some(detail)
            }
            Err(err) => {
                warn!(error = %err, "detail fetch failed");
                self.emit(SyncEvent::detail(id.clone(), ViewState::Idle));
                self.emit(SyncEvent::detail(
                    id.clone(),
                    ViewState::Error {
                        message: err.user_facing_message(),
                    },
                ));
                None
            }
        }
    }

    // --- Queries ---

    pub async fn items_for(&self, filter: FilterKey) -> Vec<CoinEntity> {
        self.state.read().await.store.items_for(filter).to_vec()
    }

    pub async fn number_of_items(&self, filter: FilterKey) -> usize {
        self.state.read().await.store.len(filter)
    }

    pub async fn item_at(&self, filter: FilterKey, index: usize) -> Option<CoinEntity> {
        self.state.read().await.store.item_at(filter, index).cloned()
    }

    pub async fn pagination_state(&self, filter: FilterKey) -> PaginationState {
        self.state.read().await.pagination.state(filter)
    }

    pub async fn is_last_page(&self, filter: FilterKey) -> bool {
        self.pagination_state(filter).await.is_last_page
    }

    pub async fn has_completed_initial_fetch(&self, filter: FilterKey) -> bool {
        self.state
            .read()
            .await
            .pagination
            .has_completed_initial_fetch(filter)
    }

    /// Cached detail if one exists, else a projection of the list entity.
    ///
    /// An id that no list ever surfaced is a caller bug and reported as
    /// [`SyncError::UnknownCoin`].
    pub async fn get_detail(&self, id: &CoinId) -> SyncResult<CoinDetail> {
        let mut state = self.state.write().await;
        if let Some(detail) = state.details.get(id) {
            return Ok(detail.clone());
        }

        let Some(entity) = state.store.find(id) else {
            error!(%id, "detail requested for a coin no list has surfaced");
            return Err(SyncError::UnknownCoin(id.clone()));
        };
        let detail = mapper::clone_as_detail(entity, UnixTimeMs::now());
        state.details.put(id.clone(), detail.clone());
        Ok(detail)
    }

    // --- Favorites ---

    /// Flip the favorite flag of `id` everywhere it is listed. Returns the
    /// new value, or `None` when no list holds the coin.
    pub async fn toggle_favorite(&self, id: &CoinId) -> Option<bool> {
        let (value, favorites_empty) = {
            let mut state = self.state.write().await;
            let Some(current) = state.store.find(id).map(|c| c.is_favorite) else {
                warn!(%id, "toggle on a coin no list holds");
                return None;
            };
            let value = !current;
            apply_favorite(&mut state, id, value);
            (value, state.store.is_empty(FilterKey::Favorite))
        };

        debug!(%id, value, "favorite toggled");
        self.emit_favorites(favorites_empty);
        Some(value)
    }

    pub async fn add_favorite(&self, id: &CoinId) -> bool {
        self.set_favorite(id, true).await
    }

    pub async fn remove_favorite(&self, id: &CoinId) -> bool {
        self.set_favorite(id, false).await
    }

    /// Returns whether any listed copy of `id` was updated.
    pub async fn set_favorite(&self, id: &CoinId, value: bool) -> bool {
        let (updated, favorites_empty) = {
            let mut state = self.state.write().await;
            let updated = apply_favorite(&mut state, id, value);
            (updated, state.store.is_empty(FilterKey::Favorite))
        };

        if updated == 0 {
            warn!(%id, value, "favorite change on a coin no list holds");
            return false;
        }
        debug!(%id, value, copies = updated, "favorite set");
        self.emit_favorites(favorites_empty);
        true
    }

    /// Drop every collection, all pagination progress and the detail cache.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.store.clear();
        state.pagination.clear();
        state.details.clear();
        info!("session reset");
    }
}

fn apply_favorite(state: &mut SyncState, id: &CoinId, value: bool) -> usize {
    let updated = state.store.set_favorite(id, value);
    if let Some(detail) = state.details.peek_mut(id) {
        detail.entity.set_favorite(value);
    }
    updated
}

fn loading_state(kind: LoadKind) -> ViewState {
    match kind {
        LoadKind::Initial => ViewState::Loading,
        LoadKind::Refresh => ViewState::RefreshLoading,
        LoadKind::Pagination => ViewState::PaginationLoading,
    }
}
