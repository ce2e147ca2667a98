//! The public definition API.
//!
//! A [`Context`] owns a module registry and its configuration. Callers
//! hand it [`Definition`]s — the classified call shapes of the definition
//! surface — and it forwards them to the registry and the resolver.
//! Contexts are explicitly constructed and passable; hosts that want one
//! shared binding can install a context into the process-global slot and
//! later restore whatever it displaced.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{Config, ConfigOptions};
use crate::loader::ResourceLoader;
use crate::registry::{Factory, Instance, ModuleDeclaration, ModuleRegistry, RegistryError};
use crate::resolver::{DependencyResolver, ResolveError};

/// Process-global current-context slot.
static CURRENT: Lazy<Mutex<Option<Arc<Context>>>> = Lazy::new(|| Mutex::new(None));

/// Errors surfaced by [`Context::define`]
#[derive(Debug, Error)]
pub enum DefineError {
    /// Registration failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// A definition in classified form.
///
/// Each variant corresponds to one shape of the definition surface;
/// classification happens in the caller, not through run-time argument
/// inspection.
pub enum Definition {
    /// A named, dependency-free module.
    Named {
        name: String,
        factory: Factory,
    },

    /// A named module with a dependency list.
    NamedWithDeps {
        name: String,
        dependencies: Vec<String>,
        factory: Factory,
    },

    /// An async placeholder: paths to load for a module expected to
    /// register itself during the fetch.
    Placeholder {
        name: String,
        dependencies: Vec<String>,
    },

    /// An anonymous module: resolve the dependencies and run the factory
    /// immediately, registering nothing.
    Anonymous {
        dependencies: Vec<String>,
        factory: Factory,
    },

    /// Delete the declaration under `name`.
    Remove { name: String },

    /// Bulk declarations with an optional configuration block.
    Bulk(BulkDefinition),
}

/// A bulk declaration block: an optional configuration patch applied
/// first, then named module entries registered in order.
#[derive(Default)]
pub struct BulkDefinition {
    /// Configuration applied before any entry is registered.
    pub config: Option<ConfigOptions>,

    /// Named module entries.
    pub modules: Vec<(String, BulkModule)>,
}

impl BulkDefinition {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a configuration patch.
    pub fn config(mut self, options: ConfigOptions) -> Self {
        self.config = Some(options);
        self
    }

    /// Add a dependency-free module entry.
    pub fn module(mut self, name: impl Into<String>, factory: Factory) -> Self {
        self.modules.push((name.into(), BulkModule::Module(factory)));
        self
    }

    /// Add a module entry with a dependency list.
    pub fn module_with_deps(
        mut self,
        name: impl Into<String>,
        dependencies: Vec<String>,
        factory: Factory,
    ) -> Self {
        self.modules.push((
            name.into(),
            BulkModule::WithDeps {
                dependencies,
                factory,
            },
        ));
        self
    }

    /// Add an async-placeholder entry.
    pub fn placeholder(mut self, name: impl Into<String>, dependencies: Vec<String>) -> Self {
        self.modules
            .push((name.into(), BulkModule::Placeholder(dependencies)));
        self
    }
}

/// One entry of a bulk block.
pub enum BulkModule {
    /// A dependency-free module (value or callable).
    Module(Factory),

    /// A module with a dependency list and a factory.
    WithDeps {
        dependencies: Vec<String>,
        factory: Factory,
    },

    /// An async placeholder (a bare dependency list).
    Placeholder(Vec<String>),
}

/// An isolated module registry plus its configuration.
pub struct Context {
    registry: Arc<ModuleRegistry>,
    config: Arc<Mutex<Config>>,
    previous: Mutex<Option<Arc<Context>>>,
}

impl Context {
    /// Create a context with an empty registry and default configuration.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(ModuleRegistry::new()),
            config: Arc::new(Mutex::new(Config::new())),
            previous: Mutex::new(None),
        })
    }

    /// The registry owned by this context.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    fn resolver(&self) -> DependencyResolver {
        DependencyResolver::new(
            self.registry.clone(),
            ResourceLoader::new(self.config.clone()),
        )
    }

    /// Apply a classified definition.
    ///
    /// Named forms and `Remove` forward to the registry and return `None`
    /// without suspending. `Anonymous` resolves its dependency list and
    /// runs its factory immediately, returning the produced instance.
    /// `Bulk` applies its configuration block first, then registers every
    /// entry in order.
    pub async fn define(&self, definition: Definition) -> Result<Option<Instance>, DefineError> {
        match definition {
            Definition::Named { name, factory } => {
                self.registry.register(&name, Vec::new(), Some(factory))?;
                Ok(None)
            }
            Definition::NamedWithDeps {
                name,
                dependencies,
                factory,
            } => {
                self.registry.register(&name, dependencies, Some(factory))?;
                Ok(None)
            }
            Definition::Placeholder { name, dependencies } => {
                self.registry.register(&name, dependencies, None)?;
                Ok(None)
            }
            Definition::Remove { name } => {
                self.registry.remove(&name);
                Ok(None)
            }
            Definition::Anonymous {
                dependencies,
                factory,
            } => {
                let instance = self.resolver().resolve_and_run(&dependencies, &factory).await?;
                Ok(Some(instance))
            }
            Definition::Bulk(bulk) => {
                self.define_bulk(bulk)?;
                Ok(None)
            }
        }
    }

    fn define_bulk(&self, bulk: BulkDefinition) -> Result<(), DefineError> {
        if let Some(options) = bulk.config {
            self.configure(options);
        }
        for (name, module) in bulk.modules {
            match module {
                BulkModule::Module(factory) => {
                    self.registry.register(&name, Vec::new(), Some(factory))?
                }
                BulkModule::WithDeps {
                    dependencies,
                    factory,
                } => self.registry.register(&name, dependencies, Some(factory))?,
                BulkModule::Placeholder(dependencies) => {
                    self.registry.register(&name, dependencies, None)?
                }
            };
        }
        Ok(())
    }

    /// Define a named, dependency-free module.
    pub fn define_named(
        &self,
        name: &str,
        factory: Factory,
    ) -> Result<Arc<ModuleDeclaration>, RegistryError> {
        self.registry.register(name, Vec::new(), Some(factory))
    }

    /// Define a named module with a dependency list.
    pub fn define_with_deps(
        &self,
        name: &str,
        dependencies: Vec<String>,
        factory: Factory,
    ) -> Result<Arc<ModuleDeclaration>, RegistryError> {
        self.registry.register(name, dependencies, Some(factory))
    }

    /// Define an async placeholder: paths to load for a module expected
    /// to register itself during the fetch.
    pub fn define_placeholder(
        &self,
        name: &str,
        dependencies: Vec<String>,
    ) -> Result<Arc<ModuleDeclaration>, RegistryError> {
        self.registry.register(name, dependencies, None)
    }

    /// Delete the declaration under `name`, permitting redeclaration.
    pub fn remove(&self, name: &str) -> bool {
        self.registry.remove(name)
    }

    /// Resolve dependency tokens and return their instances in token
    /// order.
    pub async fn require<S: AsRef<str>>(
        &self,
        tokens: &[S],
    ) -> Result<Vec<Instance>, ResolveError> {
        self.resolver().resolve(tokens).await
    }

    /// The anonymous form: resolve `tokens`, then run `factory` with the
    /// resolved instances. Registers nothing.
    pub async fn require_with<S: AsRef<str>>(
        &self,
        tokens: &[S],
        factory: &Factory,
    ) -> Result<Instance, ResolveError> {
        self.resolver().resolve_and_run(tokens, factory).await
    }

    /// Shallow-merge configuration options into this context.
    pub fn configure(&self, options: ConfigOptions) {
        self.config.lock().merge(options);
    }

    /// Install this context as the process-global binding, remembering
    /// whatever it displaced. Returns the displaced binding, if any.
    pub fn install(self: &Arc<Self>) -> Option<Arc<Context>> {
        let mut current = CURRENT.lock();
        let previous = current.replace(self.clone());
        *self.previous.lock() = previous.clone();
        previous
    }

    /// Reinstall the binding this context displaced when it was
    /// installed, and hand this context back for continued scoped use.
    pub fn restore_previous(self: &Arc<Self>) -> Arc<Context> {
        let previous = self.previous.lock().take();
        *CURRENT.lock() = previous;
        self.clone()
    }

    /// The process-global binding, if one is installed.
    pub fn current() -> Option<Arc<Context>> {
        CURRENT.lock().clone()
    }
}
