//! Resource path rewriting
//!
//! Rewrites raw resource tokens into final fetchable paths by applying
//! alias substitution and base-path prefixing, and classifies dependency
//! tokens as module names or loadable resources.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Recognized loadable-resource suffixes. A token that does not match is
/// treated as a module name.
static RESOURCE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(js|css|htm|html)$").expect("resource suffix pattern"));

/// Returns true if `token` names a loadable resource rather than a module.
pub fn is_resource(token: &str) -> bool {
    RESOURCE_SUFFIX.is_match(token)
}

/// Returns true if `path` is already absolute: it starts with a path-root
/// marker or a network scheme (`http` also covers `https`).
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with("http")
}

/// Rewrites resource tokens against an alias table and a base path.
///
/// Borrows both tables from the configuration snapshot taken by the
/// caller, so a resolver is cheap to construct per batch.
pub struct PathResolver<'a> {
    /// Prefix for non-absolute, non-aliased tokens.
    base_path: &'a str,

    /// Leading path-segment rewrite table.
    aliases: &'a HashMap<String, String>,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver over the given base path and alias table.
    pub fn new(base_path: &'a str, aliases: &'a HashMap<String, String>) -> Self {
        Self { base_path, aliases }
    }

    /// Rewrite `token` into its final fetchable path.
    ///
    /// Absolute tokens pass through unchanged. Otherwise the leading path
    /// segment is looked up in the alias table and substituted, repeatedly,
    /// until no alias matches or the result becomes absolute (an alias
    /// value may itself start with another alias's key). A token with no
    /// alias match gets the base path prepended, with no separator
    /// insertion at the boundary.
    pub fn resolve(&self, token: &str) -> String {
        if is_absolute(token) {
            return token.to_string();
        }

        let mut parts: Vec<&str> = token.split('/').collect();
        if let Some(alias) = self.aliases.get(parts[0]) {
            parts[0] = alias.as_str();
            // the splice can double the separator at the segment boundary
            let rewritten = parts.join("/").replacen("//", "/", 1);
            return self.resolve(&rewritten);
        }

        format!("{}{}", self.base_path, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_absolute_path_passthrough() {
        let table = aliases(&[("app", "/path/to/app/")]);
        let resolver = PathResolver::new("/path/to/base/", &table);

        assert_eq!(resolver.resolve("/abs/file.js"), "/abs/file.js");
        assert_eq!(
            resolver.resolve("http://host/file.js"),
            "http://host/file.js"
        );
        assert_eq!(
            resolver.resolve("https://host/file.js"),
            "https://host/file.js"
        );
    }

    #[test]
    fn test_base_path_prepended() {
        let table = aliases(&[]);
        let resolver = PathResolver::new("/path/to/base/", &table);

        assert_eq!(
            resolver.resolve("another/file.js"),
            "/path/to/base/another/file.js"
        );
    }

    #[test]
    fn test_no_separator_insertion() {
        let table = aliases(&[]);
        let resolver = PathResolver::new("/base", &table);

        // callers supply the boundary character in the base path
        assert_eq!(resolver.resolve("file.js"), "/basefile.js");
    }

    #[test]
    fn test_alias_with_absolute_target_skips_base_path() {
        let table = aliases(&[("app", "/path/to/app/")]);
        let resolver = PathResolver::new("/path/to/base/", &table);

        assert_eq!(resolver.resolve("app/x.js"), "/path/to/app/x.js");
    }

    #[test]
    fn test_alias_with_relative_target_gets_base_path() {
        let table = aliases(&[("scripts", "path/to/scripts/")]);
        let resolver = PathResolver::new("/path/to/base/", &table);

        assert_eq!(
            resolver.resolve("scripts/y.js"),
            "/path/to/base/path/to/scripts/y.js"
        );
    }

    #[test]
    fn test_chained_aliases() {
        let table = aliases(&[("app", "vendor/app/"), ("vendor", "/third-party/")]);
        let resolver = PathResolver::new("/path/to/base/", &table);

        // app -> vendor/app/ -> /third-party/app/
        assert_eq!(resolver.resolve("app/x.js"), "/third-party/app/x.js");
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("/x"));
        assert!(is_absolute("http://host/x"));
        assert!(is_absolute("https://host/x"));
        assert!(!is_absolute("x/y.js"));
    }

    #[test]
    fn test_is_resource_classification() {
        assert!(is_resource("file.js"));
        assert!(is_resource("file.CSS"));
        assert!(is_resource("page.htm"));
        assert!(is_resource("page.HTML"));

        assert!(!is_resource("mymodule"));
        assert!(!is_resource("jquery"));
        assert!(!is_resource("data.json"));
        assert!(!is_resource("jsfile"));
    }
}
