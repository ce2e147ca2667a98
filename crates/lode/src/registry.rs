//! Module declarations and the name -> declaration store.
//!
//! The registry owns every declaration. Names are lowercased on the way
//! in, so registration and lookup are case-insensitive. Each declaration
//! carries a singleton instance cell: once a value has been computed it is
//! never recomputed, and concurrent resolutions of an in-flight
//! declaration park on its waiter list instead of re-running the factory.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

use crate::resolver::ResolveError;

/// A module's runtime value. Factories may produce any type.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A callable factory: receives the resolved dependency instances in
/// declaration order and produces the module's value.
pub type FactoryFn = Arc<dyn Fn(Vec<Instance>) -> Result<Instance, FactoryError> + Send + Sync>;

/// Failure raised by a module factory while computing an instance.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FactoryError(String);

impl FactoryError {
    /// Create a factory failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The value-or-callable a module is declared with.
#[derive(Clone)]
pub enum Factory {
    /// A ready value, used as-is.
    Value(Instance),

    /// A callable invoked with the resolved dependency instances.
    Function(FactoryFn),
}

impl Factory {
    /// Wrap a plain value.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Factory::Value(Arc::new(value))
    }

    /// Wrap a factory function.
    pub fn function<F>(factory: F) -> Self
    where
        F: Fn(Vec<Instance>) -> Result<Instance, FactoryError> + Send + Sync + 'static,
    {
        Factory::Function(Arc::new(factory))
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factory::Value(_) => f.write_str("Factory::Value(..)"),
            Factory::Function(_) => f.write_str("Factory::Function(..)"),
        }
    }
}

/// Outcome delivered to waiters parked on an in-flight instantiation.
/// `Ok(None)` means the declaration computed no instance (a placeholder
/// that was never re-registered).
pub(crate) type InstanceResult = Result<Option<Instance>, ResolveError>;

/// Instantiation state of a declaration.
///
/// `Ready` is terminal; a failed instantiation resets `Pending` back to
/// `NotStarted` after its waiters have been notified.
pub(crate) enum InstanceState {
    /// No resolution has reached this declaration yet.
    NotStarted,

    /// An instantiation is in flight; later requesters park here.
    Pending(Vec<oneshot::Sender<InstanceResult>>),

    /// The computed value.
    Ready(Option<Instance>),
}

/// A registered module: its lowercased name, ordered dependency tokens,
/// optional factory, and the singleton instance cell.
///
/// A declaration without a factory is an async placeholder: its
/// dependencies name resources whose fetch is expected to re-register the
/// real module under the same name.
pub struct ModuleDeclaration {
    name: String,
    dependencies: Vec<String>,
    factory: Option<Factory>,
    state: Mutex<InstanceState>,
}

impl ModuleDeclaration {
    /// The lowercased module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dependency tokens in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// The declared factory, absent for async placeholders.
    pub fn factory(&self) -> Option<&Factory> {
        self.factory.as_ref()
    }

    /// The computed instance, if instantiation has completed with a value.
    pub fn instance(&self) -> Option<Instance> {
        match &*self.state.lock() {
            InstanceState::Ready(instance) => instance.clone(),
            _ => None,
        }
    }

    /// Whether instantiation has completed.
    pub fn is_instantiated(&self) -> bool {
        matches!(&*self.state.lock(), InstanceState::Ready(_))
    }

    pub(crate) fn state(&self) -> &Mutex<InstanceState> {
        &self.state
    }
}

impl fmt::Debug for ModuleDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDeclaration")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("factory", &self.factory)
            .field("instantiated", &self.is_instantiated())
            .finish()
    }
}

/// Errors that can occur during module registration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name already holds a declaration with a factory
    #[error("duplicate module definition: {0}")]
    DuplicateDefinition(String),
}

/// The name -> declaration store.
pub struct ModuleRegistry {
    modules: Mutex<HashMap<String, Arc<ModuleDeclaration>>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// Register a declaration under `name` (lowercased).
    ///
    /// `factory: None` declares an async placeholder. Placeholders may be
    /// overwritten — that is how a fetched resource re-registers the real
    /// module — but re-registering a name that already holds a factory is
    /// a duplicate definition, whatever the casing.
    pub fn register(
        &self,
        name: &str,
        dependencies: Vec<String>,
        factory: Option<Factory>,
    ) -> Result<Arc<ModuleDeclaration>, RegistryError> {
        let name = name.to_lowercase();
        let mut modules = self.modules.lock();

        if let Some(existing) = modules.get(&name) {
            if existing.factory.is_some() {
                return Err(RegistryError::DuplicateDefinition(name));
            }
        }

        debug!(module = %name, dependencies = dependencies.len(), "registering module");
        let declaration = Arc::new(ModuleDeclaration {
            name: name.clone(),
            dependencies,
            factory,
            state: Mutex::new(InstanceState::NotStarted),
        });
        modules.insert(name, declaration.clone());
        Ok(declaration)
    }

    /// Delete the declaration under `name`, permitting redeclaration.
    /// Returns whether an entry existed.
    pub fn remove(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let removed = self.modules.lock().remove(&name).is_some();
        if removed {
            debug!(module = %name, "removed module");
        }
        removed
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<Arc<ModuleDeclaration>> {
        self.modules.lock().get(&name.to_lowercase()).cloned()
    }

    /// Whether a declaration exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.lock().contains_key(&name.to_lowercase())
    }

    /// Number of registered declarations.
    pub fn len(&self) -> usize {
        self.modules.lock().len()
    }

    /// Whether the registry holds no declarations.
    pub fn is_empty(&self) -> bool {
        self.modules.lock().is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup_case_insensitive() {
        let registry = ModuleRegistry::new();
        registry
            .register("MyModule", Vec::new(), Some(Factory::value(1u32)))
            .unwrap();

        let declaration = registry.lookup("mymodule").unwrap();
        assert_eq!(declaration.name(), "mymodule");
        assert!(registry.contains("MYMODULE"));
    }

    #[test]
    fn test_duplicate_definition_rejected_regardless_of_case() {
        let registry = ModuleRegistry::new();
        registry
            .register("testmodule", Vec::new(), Some(Factory::value(1u32)))
            .unwrap();

        let err = registry
            .register("testModule", Vec::new(), Some(Factory::value(2u32)))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateDefinition("testmodule".to_string())
        );

        let err = registry
            .register("testmodule", Vec::new(), Some(Factory::value(2u32)))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateDefinition("testmodule".to_string())
        );
    }

    #[test]
    fn test_placeholder_can_be_redefined() {
        let registry = ModuleRegistry::new();
        registry
            .register("async", vec!["/async.js".to_string()], None)
            .unwrap();

        // the fetch re-registers the real module under the same name
        let declaration = registry
            .register("async", Vec::new(), Some(Factory::value(5u32)))
            .unwrap();
        assert!(declaration.factory().is_some());
    }

    #[test]
    fn test_remove_permits_redefinition() {
        let registry = ModuleRegistry::new();
        registry
            .register("m", Vec::new(), Some(Factory::value(1u32)))
            .unwrap();

        assert!(registry.remove("M"));
        assert!(!registry.contains("m"));
        assert!(!registry.remove("m"));

        registry
            .register("m", Vec::new(), Some(Factory::value(2u32)))
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_instance_starts_uncomputed() {
        let registry = ModuleRegistry::new();
        let declaration = registry
            .register("m", Vec::new(), Some(Factory::value(1u32)))
            .unwrap();

        assert!(!declaration.is_instantiated());
        assert!(declaration.instance().is_none());
    }
}
