use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::model::{CoinEntity, CoinId, FilterKey};

/// Authoritative per-filter collections.
///
/// Each fetched filter owns its own copies of the coins it lists, in server
/// rank order. The same coin may sit in several filters at once; its favorite
/// flag is reconciled across those copies on every merge and on every
/// [`set_favorite`](Self::set_favorite). The `Favorite` collection is never
/// written directly and is recomputed from the others.
#[derive(Debug)]
pub struct FilterDataStore {
    collections: HashMap<FilterKey, Vec<CoinEntity>>,
    // Favorited ids, kept so a coin that dropped out of every collection is
    // still favorite when a later page brings it back.
    favorite_ids: HashSet<CoinId>,
    max_items: usize,
}

impl FilterDataStore {
    pub fn new(max_items: usize) -> Self {
        Self {
            collections: HashMap::new(),
            favorite_ids: HashSet::new(),
            max_items,
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Store one fetched page and return the filter's full collection.
    ///
    /// A first page replaces the collection. Later pages are appended, and an
    /// item whose id is already present is dropped (first occurrence wins).
    /// Appends stop at `max_items`.
    pub fn merge(
        &mut self,
        filter: FilterKey,
        mut new_items: Vec<CoinEntity>,
        is_first_page: bool,
    ) -> &[CoinEntity] {
        if filter.is_derived() {
            warn!(%filter, "refusing to merge into derived filter");
            return self.items_for(filter);
        }

        self.reconcile_favorites(&mut new_items);

        let received = new_items.len();
        let existing = if is_first_page {
            Vec::new()
        } else {
            self.collections.remove(&filter).unwrap_or_default()
        };

        let mut seen: HashSet<CoinId> = existing.iter().map(|c| c.id.clone()).collect();
        let mut collection = existing;
        collection.reserve(received.min(self.max_items.saturating_sub(collection.len())));

        for item in new_items {
            if collection.len() >= self.max_items {
                break;
            }
            if seen.insert(item.id.clone()) {
                collection.push(item);
            }
        }

        debug!(
            %filter,
            received,
            stored = collection.len(),
            is_first_page,
            "merged page"
        );

        self.collections.insert(filter, collection);
        self.recompute_favorites();
        self.items_for(filter)
    }

    /// Copy the known favorite flag onto freshly mapped items.
    fn reconcile_favorites(&self, new_items: &mut [CoinEntity]) {
        for item in new_items.iter_mut() {
            item.is_favorite = match self.find(&item.id) {
                Some(existing) => existing.is_favorite,
                None => self.favorite_ids.contains(&item.id),
            };
        }
    }

    /// Set the flag on every copy of `id` and refresh the derived view.
    /// Returns how many copies were updated.
    pub fn set_favorite(&mut self, id: &CoinId, value: bool) -> usize {
        let mut updated = 0;
        for filter in FilterKey::FETCHED {
            if let Some(items) = self.collections.get_mut(&filter) {
                for item in items.iter_mut().filter(|c| &c.id == id) {
                    item.set_favorite(value);
                    updated += 1;
                }
            }
        }

        if !value {
            self.favorite_ids.remove(id);
        } else if updated > 0 {
            self.favorite_ids.insert(id.clone());
        }

        self.recompute_favorites();
        updated
    }

    /// Favorite = fetched filters in declaration order, each in its own
    /// order, keeping flagged items and the first copy of each id.
    pub fn recompute_favorites(&mut self) {
        let mut seen = HashSet::new();
        let favorites: Vec<CoinEntity> = FilterKey::FETCHED
            .iter()
            .filter_map(|f| self.collections.get(f))
            .flatten()
            .filter(|c| c.is_favorite && seen.insert(c.id.clone()))
            .cloned()
            .collect();

        self.collections.insert(FilterKey::Favorite, favorites);
    }

    /// Current collection, empty if the filter was never populated.
    pub fn items_for(&self, filter: FilterKey) -> &[CoinEntity] {
        self.collections.get(&filter).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self, filter: FilterKey) -> usize {
        self.items_for(filter).len()
    }

    pub fn is_empty(&self, filter: FilterKey) -> bool {
        self.items_for(filter).is_empty()
    }

    pub fn item_at(&self, filter: FilterKey, index: usize) -> Option<&CoinEntity> {
        self.items_for(filter).get(index)
    }

    /// First copy of `id` across the fetched filters.
    pub fn find(&self, id: &CoinId) -> Option<&CoinEntity> {
        FilterKey::FETCHED
            .iter()
            .filter_map(|f| self.collections.get(f))
            .flatten()
            .find(|c| &c.id == id)
    }

    pub fn clear(&mut self) {
        self.collections.clear();
        self.favorite_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CAP: usize = 100;

    fn coin(id: &str) -> CoinEntity {
        CoinEntity {
            id: CoinId::new(id),
            name: id.to_uppercase(),
            symbol: id.to_uppercase(),
            price: Some(1.0),
            change_percent: Some(0.5),
            icon_reference: None,
            is_favorite: false,
            color: None,
            raw_market_cap: None,
            raw_price_at_timestamp: None,
            all_time_high_price: None,
            sparkline_series: Vec::new(),
        }
    }

    fn coins(ids: &[&str]) -> Vec<CoinEntity> {
        ids.iter().map(|id| coin(id)).collect()
    }

    fn ids(items: &[CoinEntity]) -> Vec<&str> {
        items.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn first_page_replaces_collection() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["a", "b"]), true);
        let stored = store.merge(FilterKey::All, coins(&["c"]), true);
        assert_eq!(ids(stored), vec!["c"]);
    }

    #[test]
    fn later_pages_append_in_order() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["a", "b"]), true);
        let stored = store.merge(FilterKey::All, coins(&["c", "d"]), false);
        assert_eq!(ids(stored), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let mut store = FilterDataStore::new(CAP);
        let mut first = coin("a");
        first.name = "first".into();
        store.merge(FilterKey::All, vec![first, coin("b")], true);

        let mut dup = coin("a");
        dup.name = "second".into();
        let stored = store.merge(FilterKey::All, vec![dup, coin("c")], false);
        assert_eq!(ids(stored), vec!["a", "b", "c"]);
        assert_eq!(stored[0].name, "first");
    }

    #[test]
    fn duplicates_within_one_page_are_dropped() {
        let mut store = FilterDataStore::new(CAP);
        let stored = store.merge(FilterKey::All, coins(&["a", "a", "b"]), true);
        assert_eq!(ids(stored), vec!["a", "b"]);
    }

    #[test]
    fn empty_first_page_clears_collection() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["a"]), true);
        assert!(store.merge(FilterKey::All, Vec::new(), true).is_empty());
        assert!(store.is_empty(FilterKey::All));
    }

    #[test]
    fn favorite_flag_survives_refetch_under_other_filter() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["btc", "eth"]), true);
        store.set_favorite(&CoinId::new("btc"), true);

        let stored = store.merge(FilterKey::HighestPrice, coins(&["btc", "sol"]), true);
        assert!(stored[0].is_favorite);
        assert!(!stored[1].is_favorite);
    }

    #[test]
    fn favorite_flag_survives_refresh_of_same_filter() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["btc"]), true);
        store.set_favorite(&CoinId::new("btc"), true);
        let stored = store.merge(FilterKey::All, coins(&["btc"]), true);
        assert!(stored[0].is_favorite);
    }

    #[test]
    fn set_favorite_updates_every_copy() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["btc", "eth"]), true);
        store.merge(FilterKey::HighestPrice, coins(&["btc"]), true);

        let updated = store.set_favorite(&CoinId::new("btc"), true);
        assert_eq!(updated, 2);
        assert!(store.items_for(FilterKey::All)[0].is_favorite);
        assert!(store.items_for(FilterKey::HighestPrice)[0].is_favorite);
        assert_eq!(ids(store.items_for(FilterKey::Favorite)), vec!["btc"]);

        store.set_favorite(&CoinId::new("btc"), false);
        assert!(store.is_empty(FilterKey::Favorite));
    }

    #[test]
    fn favorite_flag_survives_dropping_out_of_every_filter() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["btc"]), true);
        store.set_favorite(&CoinId::new("btc"), true);
        store.merge(FilterKey::All, coins(&["eth"]), true);
        assert!(store.is_empty(FilterKey::Favorite));

        let stored = store.merge(FilterKey::All, coins(&["eth", "btc"]), false);
        assert!(stored[1].is_favorite);
        assert_eq!(ids(store.items_for(FilterKey::Favorite)), vec!["btc"]);
    }

    #[test]
    fn set_favorite_on_unknown_id_is_noop() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["btc"]), true);
        assert_eq!(store.set_favorite(&CoinId::new("doge"), true), 0);
        assert!(store.is_empty(FilterKey::Favorite));
    }

    #[test]
    fn favorites_follow_filter_declaration_order() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::Performance24h, coins(&["z", "a"]), true);
        store.merge(FilterKey::All, coins(&["a", "m"]), true);
        for id in ["z", "a", "m"] {
            store.set_favorite(&CoinId::new(id), true);
        }
        assert_eq!(ids(store.items_for(FilterKey::Favorite)), vec!["a", "m", "z"]);
    }

    #[test]
    fn merge_into_favorite_is_ignored() {
        let mut store = FilterDataStore::new(CAP);
        assert!(store.merge(FilterKey::Favorite, coins(&["a"]), true).is_empty());
    }

    #[test]
    fn appends_stop_at_cap() {
        let mut store = FilterDataStore::new(3);
        store.merge(FilterKey::All, coins(&["a", "b"]), true);
        let stored = store.merge(FilterKey::All, coins(&["c", "d"]), false);
        assert_eq!(ids(stored), vec!["a", "b", "c"]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut store = FilterDataStore::new(CAP);
        store.merge(FilterKey::All, coins(&["a"]), true);
        store.set_favorite(&CoinId::new("a"), true);
        store.clear();
        for filter in FilterKey::ALL {
            assert!(store.is_empty(filter));
        }
        assert!(store.find(&CoinId::new("a")).is_none());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Merge { filter: usize, ids: Vec<u8>, first: bool },
        SetFavorite { id: u8, value: bool },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, prop::collection::vec(0u8..12, 0..8), any::<bool>())
                .prop_map(|(filter, ids, first)| Op::Merge { filter, ids, first }),
            (0u8..12, any::<bool>()).prop_map(|(id, value)| Op::SetFavorite { id, value }),
        ]
    }

    fn expected_favorites(store: &FilterDataStore) -> Vec<CoinId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for filter in FilterKey::FETCHED {
            for c in store.items_for(filter) {
                if c.is_favorite && seen.insert(c.id.clone()) {
                    out.push(c.id.clone());
                }
            }
        }
        out
    }

    proptest! {
        #[test]
        fn store_invariants_hold(ops in prop::collection::vec(op(), 0..40)) {
            let mut store = FilterDataStore::new(CAP);
            let mut favorites: HashSet<CoinId> = HashSet::new();

            for op in ops {
                match op {
                    Op::Merge { filter, ids, first } => {
                        let filter = FilterKey::FETCHED[filter];
                        let items = ids.iter().map(|i| coin(&i.to_string())).collect();
                        store.merge(filter, items, first);
                    }
                    Op::SetFavorite { id, value } => {
                        let id = CoinId::new(id.to_string());
                        if !value {
                            favorites.remove(&id);
                        } else if store.find(&id).is_some() {
                            favorites.insert(id.clone());
                        }
                        store.set_favorite(&id, value);
                    }
                }

                // no duplicate ids within one filter
                for filter in FilterKey::ALL {
                    let mut seen = HashSet::new();
                    for c in store.items_for(filter) {
                        prop_assert!(seen.insert(c.id.clone()));
                    }
                }

                // a favorited coin stays favorite wherever it reappears
                for filter in FilterKey::FETCHED {
                    for c in store.items_for(filter) {
                        prop_assert_eq!(c.is_favorite, favorites.contains(&c.id));
                    }
                }

                let derived: Vec<CoinId> = store
                    .items_for(FilterKey::Favorite)
                    .iter()
                    .map(|c| c.id.clone())
                    .collect();
                prop_assert_eq!(derived, expected_favorites(&store));
            }
        }
    }
}
