//! Lode — module registry and asynchronous dependency resolver
//!
//! This crate provides client-side module management:
//! - Named module declarations with ordered dependency lists
//! - Classification of dependency tokens as module names or loadable resources
//! - Recursive resolution with at-most-once factory instantiation
//! - Alias and base-path rewriting of resource paths
//! - A pluggable asynchronous resource loader
//! - Scoped contexts with an installable process-global binding
//!
//! A dependency token either names another declared module or, when it
//! ends in a recognized resource suffix, names an asset to fetch through
//! the injected load function. Resolution walks the transitive graph,
//! batches each call's resource tokens into one fetch, instantiates every
//! reached module exactly once, and hands the instances to the requesting
//! factory in declaration order.

pub mod config;
pub mod define;
pub mod loader;
pub mod path;
pub mod registry;
pub mod resolver;

pub use config::{Config, ConfigOptions};
pub use define::{BulkDefinition, BulkModule, Context, DefineError, Definition};
pub use loader::{LoadCompletion, LoadError, LoadFn, ResourceLoader};
pub use path::PathResolver;
pub use registry::{
    Factory, FactoryError, FactoryFn, Instance, ModuleDeclaration, ModuleRegistry, RegistryError,
};
pub use resolver::{DependencyResolver, ResolveError};

/// Crate version tag.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
