//! Key namespacing.

use crate::error::{CacheError, CacheResult};

/// Separator between namespace and caller key.
pub const SEPARATOR: char = ':';

/// Per-instance key scope.
///
/// Backends that are shared between applications (memcache, Redis, the
/// database table, the process-wide shared store) see `"<namespace>:<key>"`;
/// callers only ever see `<key>`. An empty namespace leaves keys untouched.
///
/// Names must not contain the separator: namespace `"a"` would otherwise
/// see the keys of namespace `"a:b"` when listing or clearing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Create a namespace, usually the host name (`"localhost"`).
    ///
    /// The name is taken as is; use [`Namespace::try_new`] for names from
    /// configuration.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let prefix = if name.is_empty() {
            String::new()
        } else {
            format!("{}{}", name, SEPARATOR)
        };
        Self { prefix }
    }

    /// Create a namespace, rejecting names that contain the separator.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] when `name` contains `':'`.
    pub fn try_new(name: impl Into<String>) -> CacheResult<Self> {
        let name = name.into();
        if name.contains(SEPARATOR) {
            return Err(CacheError::Config(format!(
                "Invalid namespace '{}': must not contain '{}'",
                name, SEPARATOR
            )));
        }
        Ok(Self::new(name))
    }

    /// The namespace name, without the separator.
    pub fn name(&self) -> &str {
        self.prefix.strip_suffix(SEPARATOR).unwrap_or(&self.prefix)
    }

    /// The full key prefix including the separator, e.g. `"localhost:"`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the backend key for a caller key.
    pub fn key(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.prefix.len() + key.len());
        full.push_str(&self.prefix);
        full.push_str(key);
        full
    }

    /// Recover the caller key from a backend key, or `None` when the key
    /// belongs to a different namespace.
    pub fn strip<'a>(&self, full: &'a str) -> Option<&'a str> {
        full.strip_prefix(self.prefix.as_str())
    }

    /// Keep the backend keys that belong to this namespace and start with
    /// `prefix` once stripped. Returns caller keys, sorted.
    pub fn filter_keys<I>(&self, keys: I, prefix: Option<&str>) -> Vec<String>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let prefix = prefix.unwrap_or("");
        let mut out: Vec<String> = keys
            .into_iter()
            .filter_map(|full| {
                self.strip(full.as_ref())
                    .filter(|key| key.starts_with(prefix))
                    .map(str::to_string)
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new("localhost")
    }
}

/// Filter caller keys by prefix, sorted. Used by drivers that store
/// caller keys directly.
pub fn filter_by_prefix<I>(keys: I, prefix: Option<&str>) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    Namespace::new("").filter_keys(keys, prefix)
}
