//! Graph/state model: region ids, undirected weighted edges, and the
//! mutable clustering state the merge engine walks.
//!
//! The edge collection serves two orderings with one structure: a
//! weight-ordered view for "globally cheapest merge" queries and an
//! adjacency view for initialization and I/O boundaries. At most one entry
//! exists per unordered id pair and self-loops are rejected at key
//! construction, so the invariants hold by type.
//!
//! Ties between equal weights resolve by `EdgeKey` order (lexicographic on
//! the id pair) — an arbitrary but deterministic rule.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ordered_float::OrderedFloat;

use crate::region::Region;

/// Weight assigned to edges built from a raw adjacency, before calibration
/// computes real fused weights.
pub const PLACEHOLDER_WEIGHT: f32 = -1.0;

/// An undirected pair of region ids, stored smaller-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    a: u32,
    b: u32,
}

impl EdgeKey {
    /// Normalize an id pair into a key. `None` for a self-loop.
    pub fn new(i: u32, j: u32) -> Option<Self> {
        match i.cmp(&j) {
            std::cmp::Ordering::Less => Some(Self { a: i, b: j }),
            std::cmp::Ordering::Greater => Some(Self { a: j, b: i }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Smaller id of the pair.
    pub fn first(&self) -> u32 {
        self.a
    }

    /// Larger id of the pair.
    pub fn second(&self) -> u32 {
        self.b
    }

    /// The id on the other side of `id`, if `id` is an endpoint.
    pub fn other(&self, id: u32) -> Option<u32> {
        if id == self.a {
            Some(self.b)
        } else if id == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

/// The weighted edge multimap: weight-ordered min access plus per-node
/// adjacency, kept consistent under upsert/remove.
#[derive(Debug, Clone, Default)]
pub struct WeightMap {
    weights: HashMap<EdgeKey, f32>,
    ordered: BTreeSet<(OrderedFloat<f32>, EdgeKey)>,
    adjacency: HashMap<u32, BTreeSet<u32>>,
}

impl WeightMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw adjacency pairs with placeholder weights. Self-loops
    /// and duplicate pairs collapse silently.
    pub fn from_adjacency<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut map = Self::new();
        for (i, j) in pairs {
            if let Some(key) = EdgeKey::new(i, j) {
                map.upsert(key, PLACEHOLDER_WEIGHT);
            }
        }
        map
    }

    /// Insert an edge or update its weight.
    pub fn upsert(&mut self, key: EdgeKey, weight: f32) {
        if let Some(old) = self.weights.insert(key, weight) {
            self.ordered.remove(&(OrderedFloat(old), key));
        }
        self.ordered.insert((OrderedFloat(weight), key));
        self.adjacency.entry(key.a).or_default().insert(key.b);
        self.adjacency.entry(key.b).or_default().insert(key.a);
    }

    /// Remove an edge, returning its weight if it existed.
    pub fn remove(&mut self, key: &EdgeKey) -> Option<f32> {
        let weight = self.weights.remove(key)?;
        self.ordered.remove(&(OrderedFloat(weight), *key));
        for (node, other) in [(key.a, key.b), (key.b, key.a)] {
            if let Some(set) = self.adjacency.get_mut(&node) {
                set.remove(&other);
                if set.is_empty() {
                    self.adjacency.remove(&node);
                }
            }
        }
        Some(weight)
    }

    /// Current weight of an edge.
    pub fn weight(&self, key: &EdgeKey) -> Option<f32> {
        self.weights.get(key).copied()
    }

    /// Whether the edge exists.
    pub fn contains(&self, key: &EdgeKey) -> bool {
        self.weights.contains_key(key)
    }

    /// The minimum-weight edge, without removing it. `None` when no edges
    /// remain.
    pub fn peek_min(&self) -> Option<(f32, EdgeKey)> {
        self.ordered.iter().next().map(|&(w, key)| (w.0, key))
    }

    /// Remove and return the minimum-weight edge.
    pub fn pop_min(&mut self) -> Option<(f32, EdgeKey)> {
        let (weight, key) = self.peek_min()?;
        self.remove(&key);
        Some((weight, key))
    }

    /// Ids adjacent to `id`, in ascending order.
    pub fn neighbors(&self, id: u32) -> Vec<u32> {
        self.adjacency
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the map holds no edges.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// All edges with their weights, in weight order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, f32)> + '_ {
        self.ordered.iter().map(|&(w, key)| (key, w.0))
    }

    /// The adjacency view: id pairs with weights discarded.
    pub fn adjacency_pairs(&self) -> Vec<(u32, u32)> {
        let mut pairs: Vec<_> = self.weights.keys().map(|k| (k.a, k.b)).collect();
        pairs.sort_unstable();
        pairs
    }
}

/// One point in the merge history: the live regions plus the weighted edge
/// set between them.
#[derive(Debug, Clone, Default)]
pub struct ClusteringState {
    /// Live regions, keyed by id.
    pub segments: BTreeMap<u32, Region>,
    /// Weighted edges between live regions.
    pub weights: WeightMap,
}

impl ClusteringState {
    /// Assemble a state.
    pub fn new(segments: BTreeMap<u32, Region>, weights: WeightMap) -> Self {
        Self { segments, weights }
    }

    /// Number of live regions.
    pub fn region_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    /// The cheapest edge, if any edge remains.
    pub fn minimum_weight_edge(&self) -> Option<(f32, EdgeKey)> {
        self.weights.peek_min()
    }

    /// Remove a region by id.
    pub fn remove_region(&mut self, id: u32) -> Option<Region> {
        self.segments.remove(&id)
    }

    /// Insert a region under an id.
    pub fn insert_region(&mut self, id: u32, region: Region) {
        self.segments.insert(id, region);
    }
}
