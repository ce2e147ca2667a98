//! Resolver configuration.
//!
//! Holds the base path, the alias table, and the injected load function.
//! Configuration lives for the life of its context and may be updated at
//! any time; updates are visible to subsequent resolutions immediately and
//! have no retroactive effect on already-resolved paths.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::loader::{LoadCompletion, LoadFn};

/// Configuration read on every resource-token rewrite.
#[derive(Default, Clone)]
pub struct Config {
    /// Prefix applied to non-absolute, non-aliased resource paths. No
    /// separator is inserted at the boundary, so a typical value ends in
    /// the separator (e.g. `"/path/to/base/"`).
    pub base_path: String,

    /// Leading path-segment rewrite table, applied repeatedly before
    /// base-path prefixing.
    pub aliases: HashMap<String, String>,

    /// Injected fetch capability. Absence only becomes an error once a
    /// resource actually needs loading.
    pub load: Option<LoadFn>,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-merge `options` into this configuration.
    ///
    /// A present field replaces the previous value wholesale; in
    /// particular a new alias table is not merged key-by-key with the old
    /// one.
    pub fn merge(&mut self, options: ConfigOptions) {
        if let Some(base_path) = options.base_path {
            self.base_path = base_path;
        }
        if let Some(aliases) = options.aliases {
            self.aliases = aliases;
        }
        if let Some(load) = options.load {
            self.load = Some(load);
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_path", &self.base_path)
            .field("aliases", &self.aliases)
            .field("load", &self.load.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// A configuration patch. Fields left `None` keep their current value.
#[derive(Default, Clone)]
pub struct ConfigOptions {
    /// Replacement base path.
    pub base_path: Option<String>,

    /// Replacement alias table.
    pub aliases: Option<HashMap<String, String>>,

    /// Replacement load function.
    pub load: Option<LoadFn>,
}

impl ConfigOptions {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base path.
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Set the whole alias table.
    pub fn aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Add a single alias to the table carried by this patch.
    pub fn alias(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.aliases
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the load function.
    pub fn load<F>(mut self, load: F) -> Self
    where
        F: Fn(Vec<String>, LoadCompletion) + Send + Sync + 'static,
    {
        self.load = Some(Arc::new(load));
        self
    }
}

impl fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("base_path", &self.base_path)
            .field("aliases", &self.aliases)
            .field("load", &self.load.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
