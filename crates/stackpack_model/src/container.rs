//! Ordered, mutable, dict-like container abstraction.

use serde_yaml::Value;

/// Common surface of every dict-like node in the project model.
///
/// Implementors keep insertion order, wrap plain values on [`set`] according
/// to their own rules, and can always be unwrapped back to a plain nested
/// value with [`to_value`].
///
/// [`set`]: OrderedContainer::set
/// [`to_value`]: OrderedContainer::to_value
pub trait OrderedContainer {
    /// What a key maps to: a plain value, a section item or a section.
    type Entry;

    fn get(&self, key: &str) -> Option<&Self::Entry>;

    fn get_mut(&mut self, key: &str) -> Option<&mut Self::Entry>;

    /// Assign a plain value, wrapping it into the container's entry type.
    fn set(&mut self, key: impl Into<String>, value: Value);

    /// Remove an entry, keeping the order of the remaining ones.
    fn remove(&mut self, key: &str) -> Option<Self::Entry>;

    fn keys(&self) -> impl Iterator<Item = &str>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Unwrap into a plain nested mapping, preserving order.
    fn to_value(&self) -> Value;
}
