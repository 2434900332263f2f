//! Run-scoped key/value context read by stages.
//!
//! The caller sets properties before a run; any stage may read them
//! during that run. Values are typed: a lookup for the wrong type behaves
//! like a missing key.
//!
//! # Lifetime of values
//!
//! A value set with [`PropertyBag::set`] is visible to the next run only.
//! When a later run starts, values that were already visible to a previous
//! run are dropped. Values set with [`PropertyBag::set_persistent`] stay
//! until removed.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::PipelineError;

/// Key for the active [`Camera`](crate::context::Camera).
pub const CAMERA: &str = "camera";
/// Key for the active [`Part`](crate::context::Part).
pub const PART: &str = "part";
/// Key for the active [`Feeder`](crate::context::Feeder).
pub const FEEDER: &str = "feeder";
/// Key for the active [`Nozzle`](crate::context::Nozzle).
pub const NOZZLE: &str = "nozzle";
/// Key for the configuration directory (`PathBuf`) used to resolve
/// default template locations.
pub const CONFIGURATION_DIRECTORY: &str = "configuration_directory";

struct Entry {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
    persistent: bool,
    /// Set until the entry has been visible to one run.
    fresh: bool,
}

/// Typed property storage for one pipeline.
#[derive(Default)]
pub struct PropertyBag {
    entries: HashMap<String, Entry>,
}

impl PropertyBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value for the next run. Replaces any previous value.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.insert(key.into(), value, false);
    }

    /// Set a value that survives across runs until removed.
    pub fn set_persistent<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.insert(key.into(), value, true);
    }

    fn insert<T: Any + Send + Sync>(&mut self, key: String, value: T, persistent: bool) {
        self.entries.insert(
            key,
            Entry {
                value: Box::new(value),
                type_name: std::any::type_name::<T>(),
                persistent,
                fresh: true,
            },
        );
    }

    /// Borrow the value under `key` if present and of type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.value.downcast_ref::<T>()
    }

    /// Like [`get`](Self::get), for stages that declare `key` mandatory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ResourceUnavailable`] if the key is
    /// missing or holds a different type.
    pub fn require<T: Any>(&self, key: &str) -> Result<&T, PipelineError> {
        self.get::<T>(key).ok_or_else(|| {
            PipelineError::ResourceUnavailable(format!(
                "property '{key}' of type {} is not set",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Whether any value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a value. Returns `true` if one was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Drop every value, persistent or not.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Called by the pipeline at the start of every run.
    pub(crate) fn begin_run(&mut self) {
        self.entries.retain(|_, e| e.persistent || e.fresh);
        for entry in self.entries.values_mut() {
            entry.fresh = false;
        }
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, entry) in &self.entries {
            map.entry(key, &entry.type_name);
        }
        map.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::Nozzle;

    #[test]
    fn typed_lookup() {
        let mut bag = PropertyBag::new();
        bag.set("threshold", 42_u32);
        assert_eq!(bag.get::<u32>("threshold"), Some(&42));
        assert!(bag.get::<i64>("threshold").is_none());
        assert!(bag.get::<u32>("missing").is_none());
    }

    #[test]
    fn last_write_wins() {
        let mut bag = PropertyBag::new();
        bag.set("k", 1_i32);
        bag.set("k", "two".to_string());
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.get::<String>("k").map(String::as_str), Some("two"));
    }

    #[test]
    fn require_reports_unavailable() {
        let bag = PropertyBag::new();
        let err = bag.require::<Nozzle>(NOZZLE).unwrap_err();
        assert!(err.is_soft());
    }

    #[test]
    fn values_live_for_one_run() {
        let mut bag = PropertyBag::new();
        bag.set("once", 1_u8);
        bag.set_persistent("always", 2_u8);

        bag.begin_run();
        assert!(bag.contains("once"));
        assert!(bag.contains("always"));

        bag.begin_run();
        assert!(!bag.contains("once"));
        assert!(bag.contains("always"));
    }

    #[test]
    fn resetting_a_value_renews_it() {
        let mut bag = PropertyBag::new();
        bag.set("k", 1_u8);
        bag.begin_run();
        bag.set("k", 2_u8);
        bag.begin_run();
        assert_eq!(bag.get::<u8>("k"), Some(&2));
    }

    #[test]
    fn debug_lists_type_names() {
        let mut bag = PropertyBag::new();
        bag.set("n", 1_u8);
        assert_eq!(format!("{bag:?}"), r#"{"n": "u8"}"#);
    }
}
