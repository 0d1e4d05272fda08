//! Cache-first, network-first and stale-while-revalidate request handling
//!
//! The engine never fails a request: every path ends in a network response, a
//! stored response, or the synthetic offline response. Reads search the active
//! dynamic generation, then the active static one; writes go to the dynamic
//! generation, and only while it is still the active one. Only 2xx responses
//! are stored, and a failed store write never affects what the caller receives.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::classify::{Classifier, Strategy};
use super::fetch::{FetchError, Fetcher};
use super::lifecycle::GenerationNames;
use super::request::{InterceptedRequest, RequestIdentity, StoredResponse};
use super::store::{ResponseStore, StoreError};

/// Serves intercepted requests against a fetcher and a response store
#[derive(Clone)]
pub struct StrategyEngine {
    classifier: Classifier,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ResponseStore>,
    generations: watch::Receiver<GenerationNames>,
    revalidations: TaskTracker,
}

impl StrategyEngine {
    /// Creates an engine that follows the generation pair published on `generations`
    pub fn new(
        classifier: Classifier,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn ResponseStore>,
        generations: watch::Receiver<GenerationNames>,
    ) -> Self {
        Self {
            classifier,
            fetcher,
            store,
            generations,
            revalidations: TaskTracker::new(),
        }
    }

    /// The generation pair requests are currently served from
    pub fn current_generations(&self) -> GenerationNames {
        self.generations.borrow().clone()
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Strategy {
        self.classifier.classify(request)
    }

    /// Classifies the request and runs the matching strategy
    ///
    /// # Arguments
    /// * `request` - The intercepted request; its method, destination and
    ///   navigation flag decide the strategy
    ///
    /// # Returns
    /// The response to hand back to the caller. This is never an error: when
    /// neither the network nor the store can answer, it is the synthetic
    /// `503 offline` response.
    pub async fn handle(&self, request: &InterceptedRequest) -> StoredResponse {
        let strategy = self.classify(request);
        debug!(url = %request.url, %strategy, "intercepted");
        match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::Passthrough => self.passthrough(request).await,
        }
    }

    /// Serves the stored record without touching the network; fetches on a miss
    pub async fn cache_first(&self, request: &InterceptedRequest) -> StoredResponse {
        let generations = self.current_generations();
        let identity = request.identity();

        if let Some(cached) = self.lookup(&generations, &identity).await {
            debug!(%identity, "cache-first hit");
            return cached;
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                store_if_current(
                    &*self.store,
                    &self.generations,
                    &generations.dynamic,
                    &identity,
                    &response,
                )
                .await;
                response
            }
            Err(e) => {
                debug!(%identity, error = %e, "cache-first miss while offline");
                StoredResponse::offline(&request.url)
            }
        }
    }

    /// Always tries the network; falls back to the store, then the root document
    /// for navigations, then the offline response
    pub async fn network_first(&self, request: &InterceptedRequest) -> StoredResponse {
        let generations = self.current_generations();
        let identity = request.identity();

        let error = match self.fetcher.fetch(request).await {
            Ok(response) => {
                store_if_current(
                    &*self.store,
                    &self.generations,
                    &generations.dynamic,
                    &identity,
                    &response,
                )
                .await;
                return response;
            }
            Err(e) => e,
        };
        debug!(%identity, error = %error, "network-first falling back to store");

        if let Some(cached) = self.lookup(&generations, &identity).await {
            return cached;
        }
        if request.navigation {
            if let Some(root) = root_identity(request) {
                if let Some(cached) = self.lookup(&generations, &root).await {
                    debug!(%identity, "serving root document for offline navigation");
                    return cached;
                }
            }
        }
        StoredResponse::offline(&request.url)
    }

    /// Returns the stored record immediately and refreshes it in the background
    ///
    /// With nothing stored, waits for the network instead. The background
    /// fetch is never cancelled by the caller; it keeps warming the store after
    /// the caller has moved on. Call [`StrategyEngine::drain`] before shutting
    /// the runtime down so pending refreshes are not lost.
    pub async fn stale_while_revalidate(&self, request: &InterceptedRequest) -> StoredResponse {
        let generations = self.current_generations();
        let identity = request.identity();
        let cached = self.lookup(&generations, &identity).await;

        let revalidation = self.revalidations.spawn(revalidate(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
            self.generations.clone(),
            generations.dynamic,
            request.clone(),
        ));

        if let Some(cached) = cached {
            debug!(%identity, "serving stale copy while revalidating");
            return cached;
        }

        match revalidation.await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!(%identity, error = %e, "revalidation failed with nothing stored");
                StoredResponse::offline(&request.url)
            }
            Err(e) => {
                warn!(%identity, error = %e, "revalidation task aborted");
                StoredResponse::offline(&request.url)
            }
        }
    }

    /// Forwards uncacheable requests; a network failure still yields a response
    pub async fn passthrough(&self, request: &InterceptedRequest) -> StoredResponse {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %request.url, error = %e, "passthrough failed");
                StoredResponse::offline(&request.url)
            }
        }
    }

    /// Waits for every background revalidation started so far
    ///
    /// The engine stays usable afterwards; revalidations started while
    /// draining are waited for too.
    pub async fn drain(&self) {
        self.revalidations.close();
        self.revalidations.wait().await;
        self.revalidations.reopen();
    }

    /// Dynamic generation first, then static. Read errors count as misses.
    async fn lookup(
        &self,
        generations: &GenerationNames,
        identity: &RequestIdentity,
    ) -> Option<StoredResponse> {
        for generation in [&generations.dynamic, &generations.static_assets] {
            match self.store.get(generation, identity).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(e) => warn!(%identity, generation = %generation, error = %e, "store read failed"),
            }
        }
        None
    }
}

/// Background half of stale-while-revalidate
async fn revalidate(
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ResponseStore>,
    current: watch::Receiver<GenerationNames>,
    generation: String,
    request: InterceptedRequest,
) -> Result<StoredResponse, FetchError> {
    let response = fetcher.fetch(&request).await?;
    store_if_current(&*store, &current, &generation, &request.identity(), &response).await;
    Ok(response)
}

/// Writes a copy of a 2xx response into `generation` if it is still active
///
/// A fetch that outlives an activation must not write into (and recreate) a
/// generation that activation deleted. Failures are logged and swallowed.
async fn store_if_current(
    store: &dyn ResponseStore,
    current: &watch::Receiver<GenerationNames>,
    generation: &str,
    identity: &RequestIdentity,
    response: &StoredResponse,
) {
    if !response.is_success() {
        return;
    }
    let active = current.borrow().dynamic == generation;
    if !active {
        debug!(%identity, generation = %generation, "generation retired, dropping write");
        return;
    }
    match store.put(generation, identity, response).await {
        Ok(()) => {}
        Err(StoreError::MissingGeneration(_)) => {
            debug!(%identity, generation = %generation, "generation not open, dropping write")
        }
        Err(e) => warn!(%identity, generation = %generation, error = %e, "failed to store response"),
    }
}

/// Identity of the site root for the request's origin
fn root_identity(request: &InterceptedRequest) -> Option<RequestIdentity> {
    let root = request.parsed_url()?.join("/").ok()?;
    Some(RequestIdentity::new("GET", root.as_str()))
}
