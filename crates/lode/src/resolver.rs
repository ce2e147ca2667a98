//! Dependency resolution
//!
//! The algorithmic core: classifies dependency tokens as module references
//! or resource references, recursively resolves module references through
//! the registry (instantiating each declaration at most once), batches the
//! resource references of one call into a single fetch, joins all pending
//! work, and delivers instances in the original token order.

use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::loader::{LoadError, ResourceLoader};
use crate::path;
use crate::registry::{
    Factory, FactoryError, Instance, InstanceResult, InstanceState, ModuleDeclaration,
    ModuleRegistry,
};

/// Errors that can occur during dependency resolution
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// A module-reference token has no matching declaration
    #[error("required module is not registered: {0}")]
    UnregisteredDependency(String),

    /// Resource loading failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A module factory failed while computing its instance
    #[error("factory for module '{module}' failed: {source}")]
    Factory {
        /// The module whose factory failed.
        module: String,
        source: FactoryError,
    },

    /// An in-flight instantiation terminated without reporting a result
    #[error("instantiation of module '{0}' was interrupted")]
    Interrupted(String),
}

/// Resolves dependency token lists against a registry and a loader.
///
/// Cheap to clone; clones share the same registry and configuration.
/// Resolution must run inside a Tokio runtime: in-flight instantiations
/// are detached tasks, so a resolution chain that has been kicked off
/// always runs to completion even if its requester goes away.
#[derive(Clone)]
pub struct DependencyResolver {
    registry: Arc<ModuleRegistry>,
    loader: ResourceLoader,
}

impl DependencyResolver {
    /// Create a resolver over the given registry and loader.
    pub fn new(registry: Arc<ModuleRegistry>, loader: ResourceLoader) -> Self {
        Self { registry, loader }
    }

    /// Resolve `tokens` and deliver instances in the original token order.
    ///
    /// Tokens are lowercased, then classified: a token matching a
    /// recognized resource suffix is a resource reference, anything else
    /// is a module reference. Module references resolve (and instantiate
    /// on demand) through the registry; all resource references of this
    /// call go out as one batched fetch. The join is an all-must-succeed
    /// barrier — the first failure fails the whole call.
    ///
    /// Tokens that produce no instance (resource references, placeholders
    /// that were never re-registered) are omitted from the result rather
    /// than delivered as placeholders.
    pub async fn resolve<S: AsRef<str>>(
        &self,
        tokens: &[S],
    ) -> Result<Vec<Instance>, ResolveError> {
        let tokens: Vec<String> = tokens
            .iter()
            .map(|token| token.as_ref().to_lowercase())
            .collect();

        // classification and recursive kickoff happen before any suspension
        let mut resources = Vec::new();
        let mut module_slots = Vec::new();
        for (position, token) in tokens.iter().enumerate() {
            if path::is_resource(token) {
                resources.push(token.clone());
            } else {
                module_slots.push((position, token.as_str()));
            }
        }
        trace!(
            modules = module_slots.len(),
            resources = resources.len(),
            "resolving dependency list"
        );

        let module_futures: Vec<_> = module_slots
            .iter()
            .map(|(_, name)| self.resolve_module(name))
            .collect();
        let load = async {
            self.loader
                .load(&resources)
                .await
                .map_err(ResolveError::from)
        };

        let (resolved, ()) = future::try_join(future::try_join_all(module_futures), load).await?;

        let mut by_position: Vec<Option<Instance>> = vec![None; tokens.len()];
        for ((position, _), instance) in module_slots.iter().zip(resolved) {
            by_position[*position] = instance;
        }
        Ok(by_position.into_iter().flatten().collect())
    }

    /// Resolve `tokens`, then produce a value from `factory`: a callable
    /// receives the ordered instances, a plain value passes through as-is.
    pub async fn resolve_and_run<S: AsRef<str>>(
        &self,
        tokens: &[S],
        factory: &Factory,
    ) -> Result<Instance, ResolveError> {
        let instances = self.resolve(tokens).await?;
        apply_factory(factory, instances, "<anonymous>")
    }

    /// Resolve one module reference, instantiating on demand.
    ///
    /// The first requester to reach a not-yet-instantiated declaration
    /// kicks off the instantiation as a detached task — once kicked off
    /// there is no abort — and every requester, first included, parks on
    /// the declaration's waiter list and observes the same outcome.
    fn resolve_module<'a>(&'a self, name: &'a str) -> BoxFuture<'a, InstanceResult> {
        async move {
            let declaration = self
                .registry
                .lookup(name)
                .ok_or_else(|| ResolveError::UnregisteredDependency(name.to_string()))?;

            let (waiter, first) = {
                let mut state = declaration.state().lock();
                match &mut *state {
                    InstanceState::Ready(instance) => return Ok(instance.clone()),
                    InstanceState::Pending(waiters) => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(tx);
                        (rx, false)
                    }
                    InstanceState::NotStarted => {
                        let (tx, rx) = oneshot::channel();
                        *state = InstanceState::Pending(vec![tx]);
                        (rx, true)
                    }
                }
            };

            if first {
                let resolver = self.clone();
                let declaration = declaration.clone();
                let name = name.to_string();
                tokio::spawn(async move {
                    let result = resolver.instantiate(&declaration, &name).await;
                    finish(&declaration, result);
                });
            } else {
                trace!(module = %name, "awaiting in-flight instantiation");
            }

            match waiter.await {
                Ok(result) => result,
                Err(_) => Err(ResolveError::Interrupted(name.to_string())),
            }
        }
        .boxed()
    }

    /// Run a declaration's factory after resolving its own dependency
    /// list.
    ///
    /// A factory-less declaration whose dependencies include resource
    /// tokens is an async placeholder: the fetch is expected to
    /// re-register the real module under the same name, so the name is
    /// looked up once more after the load and the fresh declaration's
    /// instance becomes this one's result. If nothing was re-registered
    /// the declaration resolves to no instance; it is never fetched a
    /// second time.
    async fn instantiate(
        &self,
        declaration: &Arc<ModuleDeclaration>,
        name: &str,
    ) -> InstanceResult {
        debug!(module = %name, "instantiating module");
        let instances = self.resolve(declaration.dependencies()).await?;

        match declaration.factory() {
            Some(factory) => apply_factory(factory, instances, name).map(Some),
            None => {
                let fetched = declaration
                    .dependencies()
                    .iter()
                    .any(|token| path::is_resource(token));
                if fetched {
                    if let Some(current) = self.registry.lookup(name) {
                        if !Arc::ptr_eq(&current, declaration) {
                            trace!(module = %name, "re-resolving module registered during fetch");
                            return self.resolve_module(name).await;
                        }
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Produce a value from a factory: a callable gets the ordered instances,
/// a plain value passes through.
fn apply_factory(
    factory: &Factory,
    instances: Vec<Instance>,
    module: &str,
) -> Result<Instance, ResolveError> {
    match factory {
        Factory::Value(value) => Ok(value.clone()),
        Factory::Function(function) => {
            function(instances).map_err(|source| ResolveError::Factory {
                module: module.to_string(),
                source,
            })
        }
    }
}

/// Publish an instantiation outcome: store the state, drain the waiter
/// list, and hand every waiter the same result. A failure resets the cell
/// to `NotStarted`; already-stored sibling instances stay as they are.
fn finish(declaration: &ModuleDeclaration, result: InstanceResult) {
    let waiters = {
        let mut state = declaration.state().lock();
        let waiters = match &mut *state {
            InstanceState::Pending(waiters) => std::mem::take(waiters),
            _ => Vec::new(),
        };
        *state = match &result {
            Ok(instance) => InstanceState::Ready(instance.clone()),
            Err(_) => InstanceState::NotStarted,
        };
        waiters
    };

    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
}
