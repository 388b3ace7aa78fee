//! Patient list orchestration.
//!
//! Composes the debouncer and the query cache: the raw search term is
//! debounced, the settled term becomes a [`QueryKey`], and each observation
//! reads (and if needed fetches) that key through the cache.

use crate::api::{FetchError, PatientApi};
use crate::models::{PatientListResponse, PatientRecord};
use crate::query::cache::{fetcher, Fetcher, QueryCache, QueryState};
use crate::query::debounce::Debouncer;
use crate::query::key::QueryKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Whether a background refresh shows as loading when a value is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingPolicy {
    /// Any in-flight request for the active key reports loading.
    #[default]
    LoadingWins,
    /// Only a request with nothing to show reports loading.
    StaleWhileRevalidate,
}

/// Reconciled view of the active search, ready for rendering.
#[derive(Debug, Clone, Default)]
pub struct PatientListState {
    pub data: Option<Arc<PatientListResponse>>,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_error: bool,
    pub error: Option<FetchError>,
}

impl PatientListState {
    fn reconcile(state: QueryState<PatientListResponse>, policy: LoadingPolicy) -> Self {
        let is_loading = match policy {
            LoadingPolicy::LoadingWins => state.is_fetching,
            LoadingPolicy::StaleWhileRevalidate => state.is_fetching && state.data.is_none(),
        };
        Self {
            is_loading,
            is_fetching: state.is_fetching,
            is_error: state.is_error(),
            error: state.error,
            data: state.data,
        }
    }

    /// The fetched patients, empty while nothing is held.
    pub fn patients(&self) -> &[PatientRecord] {
        self.data
            .as_ref()
            .map(|list| list.patients.as_slice())
            .unwrap_or_default()
    }
}

/// Drives patient queries for one search input.
pub struct PatientQueries {
    api: Arc<dyn PatientApi>,
    lists: QueryCache<PatientListResponse>,
    details: QueryCache<PatientRecord>,
    debouncer: Debouncer<String>,
    policy: LoadingPolicy,
}

impl PatientQueries {
    pub fn new(
        api: Arc<dyn PatientApi>,
        lists: QueryCache<PatientListResponse>,
        details: QueryCache<PatientRecord>,
        debounce: Duration,
        policy: LoadingPolicy,
    ) -> Self {
        Self {
            api,
            lists,
            details,
            debouncer: Debouncer::new(String::new(), debounce),
            policy,
        }
    }

    /// Feeds the raw, un-debounced input value.
    pub fn set_term(&mut self, term: &str) {
        self.debouncer.push(term.to_string(), Instant::now());
    }

    /// The term currently driving requests.
    pub fn active_term(&self) -> &str {
        self.debouncer.active()
    }

    pub fn active_key(&self) -> QueryKey {
        QueryKey::patient_list(self.debouncer.active())
    }

    /// When a pending term will settle, for event loops that sleep between frames.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Promotes a settled term. Returns `true` when the active key changed.
    pub fn tick(&mut self) -> bool {
        match self.debouncer.poll(Instant::now()) {
            Some(term) => {
                debug!(term_len = term.len(), "Search term settled");
                true
            }
            None => false,
        }
    }

    /// Reads the active key, starting a request if it is new or stale.
    pub fn observe(&mut self) -> PatientListState {
        self.tick();
        let key = self.active_key();
        let state = self.lists.get_or_fetch(&key, self.list_fetcher());
        PatientListState::reconcile(state, self.policy)
    }

    /// Re-issues the request for the active key, aborting any in flight.
    pub fn retry(&self) -> PatientListState {
        let key = self.active_key();
        debug!(key = key.kind(), "Retry requested");
        let state = self.lists.refetch(&key, self.list_fetcher());
        PatientListState::reconcile(state, self.policy)
    }

    /// Notifications for the active key. Re-subscribe after the key changes.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<PatientListResponse>> {
        self.lists.subscribe(&self.active_key())
    }

    /// Reads a single patient through the detail cache.
    pub fn fetch_details(&self, id: &str) -> QueryState<PatientRecord> {
        let api = Arc::clone(&self.api);
        let id_owned = id.to_string();
        let fetch = fetcher(move || {
            let api = Arc::clone(&api);
            let id = id_owned.clone();
            async move { api.fetch_patient_details(&id).await }
        });
        self.details.get_or_fetch(&QueryKey::patient_detail(id), fetch)
    }

    fn list_fetcher(&self) -> Fetcher<PatientListResponse> {
        let api = Arc::clone(&self.api);
        let term = self.debouncer.active().clone();
        fetcher(move || {
            let api = Arc::clone(&api);
            let term = term.clone();
            async move { api.fetch_patient_list(Some(term.as_str())).await }
        })
    }
}
