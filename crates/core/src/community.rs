//! Louvain community detection
//!
//! Greedy modularity optimisation in two alternating phases: local moving of
//! single vertices between neighbouring communities, then aggregation of each
//! community into one vertex. Levels repeat until local moving changes nothing.
//!
//! The run is deterministic. Vertices are visited in ascending index order,
//! candidate communities are tried in ascending index order, and a vertex only
//! leaves its community for a strictly better one.

use crate::projection::EntityGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Gains closer than this are treated as equal
const GAIN_EPSILON: f64 = 1e-12;

/// A set of vertices grouped by the detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    /// Dense index in `0..k`, numbered by first appearance in vertex order
    pub index: usize,
    /// Member ids in ascending order
    pub members: Vec<String>,
}

/// Result of a detection run. Every vertex belongs to exactly one community.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub communities: Vec<Community>,
    pub modularity: f64,
    /// Aggregation levels performed
    pub levels: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }

    /// Community index of every member id
    pub fn assignment(&self) -> HashMap<&str, usize> {
        self.communities
            .iter()
            .flat_map(|c| c.members.iter().map(move |m| (m.as_str(), c.index)))
            .collect()
    }

    pub fn community_of(&self, id: &str) -> Option<usize> {
        self.communities
            .iter()
            .find(|c| c.members.iter().any(|m| m == id))
            .map(|c| c.index)
    }
}

#[derive(Debug, Clone)]
pub struct CommunityDetector {
    resolution: f64,
}

impl Default for CommunityDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityDetector {
    pub fn new() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
        }
    }

    /// Builder: modularity resolution. Higher values favour smaller communities.
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn detect(&self, graph: &EntityGraph) -> Partition {
        let n = graph.vertex_count();
        if n == 0 {
            return Partition::default();
        }

        let mut level = WeightedGraph::from_entity_graph(graph);
        // vertex of the original graph -> vertex of the current level
        let mut membership: Vec<usize> = (0..n).collect();
        let mut levels = 0;

        loop {
            let (assignment, moved) = level.local_moving(self.resolution);
            if !moved {
                break;
            }
            let (assignment, count) = renumber(&assignment);
            for m in membership.iter_mut() {
                *m = assignment[*m];
            }
            level = level.aggregate(&assignment, count);
            levels += 1;
            debug!(level = levels, communities = count, "Louvain level aggregated");
        }

        let (membership, count) = renumber(&membership);
        let mut communities: Vec<Community> = (0..count)
            .map(|index| Community {
                index,
                members: Vec::new(),
            })
            .collect();
        for (vertex, &c) in membership.iter().enumerate() {
            communities[c].members.push(graph.id(vertex).to_string());
        }

        Partition {
            modularity: modularity(graph, &membership, self.resolution),
            communities,
            levels,
        }
    }
}

/// Newman modularity of `assignment` (community index per vertex) on `graph`
pub fn modularity(graph: &EntityGraph, assignment: &[usize], resolution: f64) -> f64 {
    let m = graph.edge_count() as f64;
    if m == 0.0 {
        return 0.0;
    }

    let count = assignment.iter().max().map_or(0, |c| c + 1);
    let mut internal = vec![0.0; count];
    let mut degree = vec![0.0; count];

    for (a, b, _) in graph.edges() {
        let (ca, cb) = (assignment[a], assignment[b]);
        degree[ca] += 1.0;
        degree[cb] += 1.0;
        if ca == cb {
            internal[ca] += 1.0;
        }
    }

    internal
        .iter()
        .zip(&degree)
        .map(|(l, d)| l / m - resolution * (d / (2.0 * m)).powi(2))
        .sum()
}

/// Weighted graph for one Louvain level. Self-loop weight is kept apart
/// from the adjacency and counts twice towards a vertex's degree.
struct WeightedGraph {
    adjacency: Vec<BTreeMap<usize, f64>>,
    loops: Vec<f64>,
}

impl WeightedGraph {
    fn from_entity_graph(graph: &EntityGraph) -> Self {
        let n = graph.vertex_count();
        let mut adjacency = vec![BTreeMap::new(); n];
        for (a, b, _) in graph.edges() {
            *adjacency[a].entry(b).or_insert(0.0) += 1.0;
            *adjacency[b].entry(a).or_insert(0.0) += 1.0;
        }
        Self {
            adjacency,
            loops: vec![0.0; n],
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    fn degree(&self, i: usize) -> f64 {
        self.adjacency[i].values().sum::<f64>() + 2.0 * self.loops[i]
    }

    /// One local-moving phase. Returns the community of each vertex and
    /// whether any vertex moved.
    fn local_moving(&self, resolution: f64) -> (Vec<usize>, bool) {
        let n = self.len();
        let degrees: Vec<f64> = (0..n).map(|i| self.degree(i)).collect();
        let two_m: f64 = degrees.iter().sum();

        let mut community: Vec<usize> = (0..n).collect();
        if two_m == 0.0 {
            return (community, false);
        }

        let mut totals = degrees.clone();
        let mut moved_any = false;

        loop {
            let mut moved = false;
            for i in 0..n {
                let own = community[i];
                let k = degrees[i];

                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for (&j, &w) in &self.adjacency[i] {
                    *links.entry(community[j]).or_insert(0.0) += w;
                }

                totals[own] -= k;
                let gain = |c: usize| {
                    links.get(&c).copied().unwrap_or(0.0) - resolution * totals[c] * k / two_m
                };

                let mut best = own;
                let mut best_gain = gain(own);
                for &c in links.keys() {
                    if c == own {
                        continue;
                    }
                    let g = gain(c);
                    if g > best_gain + GAIN_EPSILON {
                        best = c;
                        best_gain = g;
                    }
                }

                totals[best] += k;
                if best != own {
                    community[i] = best;
                    moved = true;
                    moved_any = true;
                }
            }
            if !moved {
                break;
            }
        }

        (community, moved_any)
    }

    /// Collapse each community into one vertex
    fn aggregate(&self, assignment: &[usize], count: usize) -> Self {
        let mut adjacency = vec![BTreeMap::new(); count];
        let mut loops = vec![0.0; count];

        for i in 0..self.len() {
            let ci = assignment[i];
            loops[ci] += self.loops[i];
            for (&j, &w) in self.adjacency[i].range(i + 1..) {
                let cj = assignment[j];
                if ci == cj {
                    loops[ci] += w;
                } else {
                    *adjacency[ci].entry(cj).or_insert(0.0) += w;
                    *adjacency[cj].entry(ci).or_insert(0.0) += w;
                }
            }
        }

        Self { adjacency, loops }
    }
}

/// Renumber labels densely by first appearance
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    let renumbered = labels
        .iter()
        .map(|label| {
            let next = mapping.len();
            *mapping.entry(*label).or_insert(next)
        })
        .collect();
    (renumbered, mapping.len())
}
