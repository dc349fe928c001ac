//! Core CRDT traits for distributed state synchronization.
//!
//! These traits define the interface that all CRDT types must implement
//! to participate in server-to-server state synchronization.

use super::clock::HybridTimestamp;

/// A Conflict-free Replicated Data Type.
///
/// CRDTs support commutative, associative, and idempotent merge operations,
/// ensuring eventual consistency without coordination.
pub trait Crdt: Sized {
    /// Merge another instance into this one.
    ///
    /// This operation must be:
    /// - **Commutative**: `a.merge(b)` == `b.merge(a)`
    /// - **Associative**: `a.merge(b.merge(c))` == `a.merge(b).merge(c)`
    /// - **Idempotent**: `a.merge(a)` == `a`
    fn merge(&mut self, other: &Self);

    /// Check if this instance is causally greater than or equal to another.
    ///
    /// Returns `true` if merging `other` into `self` would not change `self`.
    fn dominates(&self, other: &Self) -> bool;
}

/// A type that can produce and apply incremental deltas.
///
/// Deltas are more efficient for network transfer than full state.
pub trait StateDelta: Crdt {
    /// The delta type for incremental updates.
    type Delta: Clone + serde::Serialize + for<'de> serde::Deserialize<'de>;

    /// Generate a delta representing changes since a given timestamp.
    fn delta_since(&self, since: HybridTimestamp) -> Option<Self::Delta>;

    /// Apply a delta to this instance.
    fn apply_delta(&mut self, delta: &Self::Delta);
}

/// A value with an associated timestamp for Last-Writer-Wins semantics.
///
/// When merging, the value with the higher timestamp wins. Ties are broken
/// by lexicographic comparison of server IDs to ensure determinism.
pub trait Mergeable: Clone {
    /// Get the timestamp of this value.
    fn timestamp(&self) -> HybridTimestamp;

    /// Merge with another value, returning the winner.
    #[must_use]
    fn merge_with(&self, other: &Self) -> Self {
        if other.timestamp() > self.timestamp() {
            other.clone()
        } else {
            self.clone()
        }
    }
}

/// A Last-Writer-Wins register.
///
/// Wraps any value with a timestamp for LWW semantics.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LwwRegister<T> {
    value: T,
    timestamp: HybridTimestamp,
}

impl<T: Clone> LwwRegister<T> {
    /// Create a new LWW register with the given value and timestamp.
    pub fn new(value: T, timestamp: HybridTimestamp) -> Self {
        Self { value, timestamp }
    }

    /// Get the current value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Get the timestamp.
    pub fn timestamp(&self) -> HybridTimestamp {
        self.timestamp
    }

    /// Update the value if the new timestamp is greater.
    pub fn update(&mut self, value: T, timestamp: HybridTimestamp) {
        if timestamp > self.timestamp {
            self.value = value;
            self.timestamp = timestamp;
        }
    }
}

impl<T: Clone> Mergeable for LwwRegister<T> {
    fn timestamp(&self) -> HybridTimestamp {
        self.timestamp
    }
}

impl<T: Clone> Crdt for LwwRegister<T> {
    fn merge(&mut self, other: &Self) {
        if other.timestamp > self.timestamp {
            self.value = other.value.clone();
            self.timestamp = other.timestamp;
        }
    }

    fn dominates(&self, other: &Self) -> bool {
        self.timestamp >= other.timestamp
    }
}

/// An Add-Wins Set (`AWSet`) for sets where adds take precedence.
///
/// When an add and remove happen concurrently, the add wins.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AwSet<T>
where
    T: Clone + Eq + std::hash::Hash,
{
    /// Elements with their add timestamps.
    elements: std::collections::HashMap<T, HybridTimestamp>,
    /// Tombstones for removed elements (removed at timestamp).
    tombstones: std::collections::HashMap<T, HybridTimestamp>,
}

impl<T> Default for AwSet<T>
where
    T: Clone + Eq + std::hash::Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AwSet<T>
where
    T: Clone + Eq + std::hash::Hash,
{
    /// Create an empty `AWSet`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: std::collections::HashMap::new(),
            tombstones: std::collections::HashMap::new(),
        }
    }

    /// Add an element with the given timestamp.
    pub fn add(&mut self, element: T, timestamp: HybridTimestamp) {
        // Add wins: if add timestamp >= tombstone timestamp, element is present
        let tombstone_ts = self.tombstones.get(&element).copied();
        if tombstone_ts.map_or(true, |ts| timestamp >= ts) {
            self.elements.insert(element, timestamp);
        }
    }

    /// Remove an element with the given timestamp.
    pub fn remove(&mut self, element: &T, timestamp: HybridTimestamp) {
        // Only remove if tombstone timestamp > add timestamp
        if let Some(&add_ts) = self.elements.get(element) {
            if timestamp > add_ts {
                self.elements.remove(element);
                self.tombstones.insert(element.clone(), timestamp);
            }
        }
    }

    /// Check if an element is present.
    pub fn contains(&self, element: &T) -> bool {
        self.elements.contains_key(element)
    }

    /// Iterate over present elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.keys()
    }

    /// Get the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T> Crdt for AwSet<T>
where
    T: Clone + Eq + std::hash::Hash,
{
    fn merge(&mut self, other: &Self) {
        // Merge elements: take the later timestamp for each
        for (elem, &other_ts) in &other.elements {
            match self.elements.get(elem) {
                Some(&self_ts) if self_ts >= other_ts => {}
                _ => {
                    // Check against our tombstones
                    let our_tomb = self.tombstones.get(elem).copied();
                    if our_tomb.map_or(true, |ts| other_ts >= ts) {
                        self.elements.insert(elem.clone(), other_ts);
                    }
                }
            }
        }

        // Merge tombstones: take the later timestamp
        for (elem, &other_ts) in &other.tombstones {
            match self.tombstones.get(elem) {
                Some(&self_ts) if self_ts >= other_ts => {}
                _ => {
                    self.tombstones.insert(elem.clone(), other_ts);
                    // Apply tombstone: remove if add timestamp < tombstone
                    if let Some(&add_ts) = self.elements.get(elem) {
                        if other_ts > add_ts {
                            self.elements.remove(elem);
                        }
                    }
                }
            }
        }
    }

    fn dominates(&self, other: &Self) -> bool {
        // We dominate if all of other's elements and tombstones are
        // present with equal or greater timestamps
        for (elem, &other_ts) in &other.elements {
            match self.elements.get(elem) {
                Some(&self_ts) if self_ts >= other_ts => {}
                _ => return false,
            }
        }
        for (elem, &other_ts) in &other.tombstones {
            match self.tombstones.get(elem) {
                Some(&self_ts) if self_ts >= other_ts => {}
                _ => return false,
            }
        }
        true
    }
}
