//! Versioned generations: precache on install, garbage-collect on activate
//!
//! A deployed version owns exactly two generations, `{prefix}-static-{version}`
//! (precached shell assets) and `{prefix}-dynamic-{version}` (everything the
//! strategies store at runtime). Activation deletes every other generation and
//! then publishes the new pair so running engines switch over immediately.

use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use url::Url;

use super::fetch::Fetcher;
use super::request::InterceptedRequest;
use super::store::{ResponseStore, StoreError};

/// Assets fetched into the static generation at install time
pub const DEFAULT_PRECACHE: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
];

/// The pair of generation names belonging to one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationNames {
    pub static_assets: String,
    pub dynamic: String,
}

impl GenerationNames {
    pub fn for_version(prefix: &str, version: &str) -> Self {
        Self {
            static_assets: format!("{}-static-{}", prefix, version),
            dynamic: format!("{}-dynamic-{}", prefix, version),
        }
    }

    /// Whether `generation` is one of this version's names
    pub fn contains(&self, generation: &str) -> bool {
        generation == self.static_assets || generation == self.dynamic
    }
}

/// Where a version is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing has run yet
    Pending,
    /// Precache in progress
    Installing,
    /// Precache done, waiting for activation
    Installed,
    /// This version's generations are the ones in effect
    Active,
    /// A newer version has been published since this one activated
    Superseded,
}

/// Outcome of populating the static generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// URLs stored successfully
    pub stored: Vec<String>,
    /// URLs that could not be stored, with the reason
    pub failed: Vec<(String, String)>,
}

/// Errors that abort a lifecycle step
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Activation was requested before the static generation existed
    #[error("Version is not installed: generation '{0}' does not exist")]
    NotInstalled(String),

    /// The store could not be opened or enumerated
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Drives install and activation for one version
pub struct LifecycleManager {
    names: GenerationNames,
    origin: Url,
    precache: Vec<String>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ResponseStore>,
    publisher: watch::Sender<GenerationNames>,
    state: LifecycleState,
}

impl LifecycleManager {
    /// Creates a manager for `names`, precaching [`DEFAULT_PRECACHE`] under `origin`
    pub fn new(
        names: GenerationNames,
        origin: Url,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn ResponseStore>,
    ) -> Self {
        let (publisher, _) = watch::channel(names.clone());
        Self {
            names,
            origin,
            precache: DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect(),
            fetcher,
            store,
            publisher,
            state: LifecycleState::Pending,
        }
    }

    /// Publishes activation on an existing channel instead of a private one
    ///
    /// Engines already subscribed to `publisher` switch to this version's
    /// generations as soon as [`LifecycleManager::activate`] completes.
    pub fn with_publisher(mut self, publisher: watch::Sender<GenerationNames>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Replaces the precache manifest (paths or absolute URLs)
    pub fn with_precache<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = assets.into_iter().map(Into::into).collect();
        self
    }

    pub fn names(&self) -> &GenerationNames {
        &self.names
    }

    /// Receiver for the generation pair in effect
    pub fn subscribe(&self) -> watch::Receiver<GenerationNames> {
        self.publisher.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        if self.state == LifecycleState::Active && *self.publisher.borrow() != self.names {
            return LifecycleState::Superseded;
        }
        self.state
    }

    /// Creates the static generation and fills it with the precache manifest
    ///
    /// Assets are fetched concurrently. A failed asset is logged and reported
    /// but does not stop the others.
    ///
    /// # Returns
    /// * `Ok(InstallReport)` listing stored and failed assets
    /// * `Err(LifecycleError::Store)` if the static generation cannot be opened
    pub async fn install(&mut self) -> Result<InstallReport, LifecycleError> {
        self.state = LifecycleState::Installing;
        if let Err(e) = self.store.open(&self.names.static_assets).await {
            self.state = LifecycleState::Pending;
            return Err(e.into());
        }

        let outcomes = join_all(self.precache.iter().map(|asset| self.precache_one(asset))).await;

        let mut report = InstallReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(url) => report.stored.push(url),
                Err((url, reason)) => {
                    warn!(url = %url, reason = %reason, "precache failed");
                    report.failed.push((url, reason));
                }
            }
        }

        info!(
            generation = %self.names.static_assets,
            stored = report.stored.len(),
            failed = report.failed.len(),
            "install complete"
        );
        self.state = LifecycleState::Installed;
        Ok(report)
    }

    async fn precache_one(&self, asset: &str) -> Result<String, (String, String)> {
        let url = self
            .origin
            .join(asset)
            .map_err(|e| (asset.to_string(), e.to_string()))?
            .to_string();
        let request = InterceptedRequest::get(url.clone());

        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| (url.clone(), e.to_string()))?;
        if !response.is_success() {
            return Err((url, format!("status {}", response.status)));
        }

        self.store
            .put(&self.names.static_assets, &request.identity(), &response)
            .await
            .map_err(|e| (url.clone(), e.to_string()))?;
        Ok(url)
    }

    /// Deletes superseded generations and takes over running consumers
    ///
    /// The version must have been installed, in this process or an earlier one.
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` with the names of the deleted generations
    /// * `Err(LifecycleError::NotInstalled)` if the static generation is missing
    pub async fn activate(&mut self) -> Result<Vec<String>, LifecycleError> {
        let existing = self.store.generations().await?;
        let installed = matches!(
            self.state,
            LifecycleState::Installed | LifecycleState::Active
        ) || existing.contains(&self.names.static_assets);
        if !installed {
            return Err(LifecycleError::NotInstalled(
                self.names.static_assets.clone(),
            ));
        }

        let mut deleted = Vec::new();
        for generation in existing.iter().filter(|g| !self.names.contains(g)) {
            match self.store.delete_generation(generation).await {
                Ok(_) => {
                    info!(generation = %generation, "deleted superseded generation");
                    deleted.push(generation.clone());
                }
                Err(e) => warn!(generation = %generation, error = %e, "failed to delete generation"),
            }
        }

        if let Err(e) = self.store.open(&self.names.dynamic).await {
            warn!(generation = %self.names.dynamic, error = %e, "failed to open dynamic generation");
        }

        self.publisher.send_replace(self.names.clone());
        self.state = LifecycleState::Active;
        info!(
            static_generation = %self.names.static_assets,
            dynamic_generation = %self.names.dynamic,
            "activated"
        );
        Ok(deleted)
    }
}
