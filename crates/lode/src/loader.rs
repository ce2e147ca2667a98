//! Resource loading through the injected fetch capability.
//!
//! The crate never fetches anything itself: callers inject a load function
//! through the configuration. This module rewrites a resource batch into
//! final paths, hands the whole batch to that function together with a
//! one-shot completion handle, and bridges the handle's success/failure
//! continuations into one awaitable outcome.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

use crate::config::Config;
use crate::path::PathResolver;

/// Errors that can occur while loading resources
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// A resource needs fetching but no load function was configured
    #[error("no load function configured; resources to load: {}", .resources.join(", "))]
    NotConfigured {
        /// The rewritten paths that could not be fetched.
        resources: Vec<String>,
    },

    /// The injected loader invoked its failure continuation
    #[error("resource load rejected: {reason}")]
    Rejected {
        /// Whatever reason the loader reported; may be empty.
        reason: String,
    },

    /// The injected loader dropped its completion handle without calling
    /// either continuation
    #[error("load function dropped its completion handle without signaling")]
    Abandoned,
}

/// Completion handle passed to the injected load function.
///
/// Exactly one of [`succeed`](LoadCompletion::succeed) or
/// [`fail`](LoadCompletion::fail) must eventually be called. Dropping the
/// handle without calling either surfaces as [`LoadError::Abandoned`] to
/// the awaiting resolution.
pub struct LoadCompletion {
    tx: oneshot::Sender<Result<(), String>>,
}

impl LoadCompletion {
    /// Report that every requested resource was fetched.
    pub fn succeed(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Report that the fetch failed.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(reason.into()));
    }
}

/// The injected asynchronous fetch capability: receives the resolved path
/// list for one batch and a completion handle.
pub type LoadFn = Arc<dyn Fn(Vec<String>, LoadCompletion) + Send + Sync>;

/// Dispatches resource batches to the configured load function.
#[derive(Clone)]
pub struct ResourceLoader {
    config: Arc<Mutex<Config>>,
}

impl ResourceLoader {
    /// Create a loader over the shared configuration.
    pub fn new(config: Arc<Mutex<Config>>) -> Self {
        Self { config }
    }

    /// Load a batch of resource tokens.
    ///
    /// Every token is rewritten through the path resolver and the whole
    /// batch goes out as a single fetch request. An empty batch completes
    /// immediately without touching the load function.
    pub async fn load(&self, tokens: &[String]) -> Result<(), LoadError> {
        if tokens.is_empty() {
            return Ok(());
        }

        let (paths, load) = {
            let config = self.config.lock();
            let resolver = PathResolver::new(&config.base_path, &config.aliases);
            let paths: Vec<String> = tokens.iter().map(|token| resolver.resolve(token)).collect();
            (paths, config.load.clone())
        };

        let load = load.ok_or_else(|| LoadError::NotConfigured {
            resources: paths.clone(),
        })?;

        debug!(?paths, "dispatching resource load");
        let (tx, rx) = oneshot::channel();
        load(paths, LoadCompletion { tx });

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(LoadError::Rejected { reason }),
            Err(_) => Err(LoadError::Abandoned),
        }
    }

    /// Normalize a single token into a one-element batch and load it.
    pub async fn load_one(&self, token: &str) -> Result<(), LoadError> {
        self.load(&[token.to_string()]).await
    }
}
