#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use coinrank_core::capabilities::{decode_coin_list, CoinFetcher, FetchError};
use coinrank_core::{ChartPeriod, CoinId, FilterKey, RawCoin, SyncEvent, ViewState};
use tokio::sync::{broadcast, Notify};

pub fn raw(id: &str) -> RawCoin {
    RawCoin {
        uuid: id.into(),
        name: format!("Coin {id}"),
        symbol: id.to_uppercase(),
        price: Some("100.00".into()),
        change: Some("-0.75".into()),
        icon_url: Some(format!("https://cdn.example.com/{id}.svg")),
        color: Some("#123456".into()),
        sparkline: vec![Some("99".into()), Some("100".into())],
        all_time_high: None,
        market_cap: Some("1500000000".into()),
        price_at: Some(1_700_000_000),
    }
}

/// `count` coins named `{prefix}{start}..`.
pub fn page(prefix: &str, start: usize, count: usize) -> Vec<RawCoin> {
    (start..start + count)
        .map(|i| raw(&format!("{prefix}{i}")))
        .collect()
}

type PageKey = (FilterKey, usize);

/// Fetcher that replays scripted pages. Unscripted pages come back empty.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: Mutex<HashMap<PageKey, Result<Vec<RawCoin>, FetchError>>>,
    details: Mutex<HashMap<CoinId, Result<RawCoin, FetchError>>>,
    requests: Mutex<Vec<(FilterKey, usize, usize)>>,
    gate: Mutex<Option<Arc<Notify>>>,
    held: Mutex<HashMap<PageKey, Arc<Notify>>>,
    pub page_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, filter: FilterKey, page_offset: usize, result: Result<Vec<RawCoin>, FetchError>) {
        self.pages
            .lock()
            .unwrap()
            .insert((filter, page_offset), result);
    }

    /// Script a page from a raw API response body.
    pub fn script_body(&self, filter: FilterKey, page_offset: usize, body: &str) {
        self.script(filter, page_offset, decode_coin_list(body.as_bytes()));
    }

    pub fn script_detail(&self, id: &str, result: Result<RawCoin, FetchError>) {
        self.details
            .lock()
            .unwrap()
            .insert(CoinId::new(id), result);
    }

    /// Every later page fetch waits on `gate` before answering.
    pub fn hold_pages(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    /// The next fetch of this one page waits on `gate`. Takes precedence over
    /// [`hold_pages`](Self::hold_pages).
    pub fn hold_page(&self, filter: FilterKey, page_offset: usize, gate: Arc<Notify>) {
        self.held
            .lock()
            .unwrap()
            .insert((filter, page_offset), gate);
    }

    pub fn requests(&self) -> Vec<(FilterKey, usize, usize)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CoinFetcher for ScriptedFetcher {
    async fn fetch_page(
        &self,
        filter: FilterKey,
        page_offset: usize,
        page_size: usize,
    ) -> Result<Vec<RawCoin>, FetchError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((filter, page_offset, page_size));

        let held = self.held.lock().unwrap().remove(&(filter, page_offset));
        let gate = held.or_else(|| self.gate.lock().unwrap().clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.pages
            .lock()
            .unwrap()
            .get(&(filter, page_offset))
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_detail(&self, id: &CoinId, _period: ChartPeriod) -> Result<RawCoin, FetchError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(Err(FetchError::RequestFailed {
                status: 404,
                message: "Coin not found".into(),
            }))
    }
}

pub fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn states_for(events: &[SyncEvent], filter: FilterKey) -> Vec<ViewState> {
    events
        .iter()
        .filter(|e| e.filter() == Some(filter))
        .map(|e| e.state.clone())
        .collect()
}
