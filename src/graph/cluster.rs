// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Hierarchical Leiden community detection.
//!
//! Level 0 partitions the whole graph (or its largest connected component).
//! Each further level re-partitions the communities of the previous level
//! that are larger than `max_cluster_size`; communities already small enough
//! carry over unchanged under a new id. Levels stop when nothing is
//! oversized, when no oversized community can be split, or at `max_levels`.

use crate::config::ClusterGraphConfig;
use crate::graph::model::ExtractedGraph;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

const RESOLUTION: f64 = 1.0;
const MAX_MOVING_PASSES: usize = 64;
const GAIN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub level: usize,
    /// Unique across all levels.
    pub id: usize,
    /// The community of the previous level this one refines.
    pub parent: Option<usize>,
    /// Member node ids, sorted.
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clustering {
    communities: Vec<Community>,
}

impl Clustering {
    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    pub fn levels(&self) -> Vec<usize> {
        let mut levels: Vec<usize> = self.communities.iter().map(|c| c.level).collect();
        levels.dedup();
        levels
    }

    pub fn at_level(&self, level: usize) -> impl Iterator<Item = &Community> {
        self.communities.iter().filter(move |c| c.level == level)
    }

    /// `{level: {community: [node ids]}}`.
    pub fn by_level(&self) -> BTreeMap<usize, BTreeMap<usize, Vec<String>>> {
        let mut out: BTreeMap<usize, BTreeMap<usize, Vec<String>>> = BTreeMap::new();
        for community in &self.communities {
            out.entry(community.level)
                .or_default()
                .insert(community.id, community.nodes.clone());
        }
        out
    }

    /// Node id to community id at `level`.
    pub fn membership(&self, level: usize) -> HashMap<&str, usize> {
        self.at_level(level)
            .flat_map(|c| c.nodes.iter().map(move |n| (n.as_str(), c.id)))
            .collect()
    }
}

/// Partitions `graph` hierarchically; deterministic for a given seed.
pub fn cluster_graph(graph: &ExtractedGraph, config: &ClusterGraphConfig) -> Clustering {
    let mut g: UnGraph<String, f64> = UnGraph::default();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for (id, _) in graph.nodes() {
        index.insert(id.as_str(), g.add_node(id.clone()));
    }
    for (source, target, edge) in graph.edges() {
        if let (Some(&a), Some(&b)) = (index.get(source.as_str()), index.get(target.as_str())) {
            g.add_edge(a, b, edge.weight());
        }
    }
    if g.node_count() == 0 {
        return Clustering::default();
    }

    let members: Vec<NodeIndex> = if config.use_lcc {
        largest_component(&g)
    } else {
        g.node_indices().collect()
    };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut communities = Vec::new();
    let mut next_id = 0;
    let mut frontier: Vec<(Option<usize>, Vec<NodeIndex>)> = partition(&g, &members, &mut rng)
        .into_iter()
        .map(|part| (None, part))
        .collect();

    for level in 0..config.max_levels.max(1) {
        let mut current = Vec::with_capacity(frontier.len());
        for (parent, nodes) in frontier {
            let mut names: Vec<String> = nodes.iter().map(|n| g[*n].clone()).collect();
            names.sort();
            communities.push(Community {
                level,
                id: next_id,
                parent,
                nodes: names,
            });
            current.push((next_id, nodes));
            next_id += 1;
        }

        let mut next = Vec::new();
        let mut split = false;
        for (id, nodes) in current {
            if nodes.len() > config.max_cluster_size {
                let parts = partition(&g, &nodes, &mut rng);
                split |= parts.len() > 1;
                next.extend(parts.into_iter().map(|part| (Some(id), part)));
            } else {
                next.push((Some(id), nodes));
            }
        }
        if !split {
            break;
        }
        frontier = next;
    }

    Clustering { communities }
}

/// One copy of `graph` per clustering level, with nodes carrying `community`
/// (null outside the clustered component), `level`, `degree`, `id` and
/// `human_readable_id`, and edges carrying `id`, `human_readable_id` and
/// `combined_degree`. Ids are seeded UUIDs, stable across levels.
pub fn annotate_levels(
    graph: &ExtractedGraph,
    clustering: &Clustering,
    seed: u64,
) -> Vec<(usize, ExtractedGraph)> {
    let degrees = graph.degrees();
    let mut rng = StdRng::seed_from_u64(seed);
    let node_ids: BTreeMap<String, Uuid> = graph
        .nodes()
        .map(|(id, _)| (id.clone(), seeded_uuid(&mut rng)))
        .collect();
    let edge_ids: Vec<((String, String), Uuid)> = graph
        .edges()
        .into_iter()
        .map(|(s, t, _)| ((s.clone(), t.clone()), seeded_uuid(&mut rng)))
        .collect();

    let mut levels = clustering.levels();
    if levels.is_empty() {
        levels.push(0);
    }

    levels
        .into_iter()
        .map(|level| {
            let membership = clustering.membership(level);
            let mut annotated = graph.clone();
            for (position, (id, uuid)) in node_ids.iter().enumerate() {
                if let Some(node) = annotated.node_mut(id) {
                    let community = membership
                        .get(id.as_str())
                        .map_or(Value::Null, |c| json!(c));
                    node.attributes.insert("community".into(), community);
                    node.attributes.insert("level".into(), json!(level));
                    node.attributes
                        .insert("degree".into(), json!(degrees.get(id).copied().unwrap_or(0)));
                    node.attributes.insert("id".into(), json!(uuid.to_string()));
                    node.attributes.insert("human_readable_id".into(), json!(position));
                }
            }
            for (position, ((s, t), uuid)) in edge_ids.iter().enumerate() {
                let combined = degrees.get(s).copied().unwrap_or(0) + degrees.get(t).copied().unwrap_or(0);
                if let Some(edge) = annotated.edge_mut(s, t) {
                    edge.attributes.insert("id".into(), json!(uuid.to_string()));
                    edge.attributes.insert("human_readable_id".into(), json!(position));
                    edge.attributes.insert("combined_degree".into(), json!(combined));
                    edge.attributes.insert("level".into(), json!(level));
                }
            }
            (level, annotated)
        })
        .collect()
}

fn seeded_uuid(rng: &mut StdRng) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Nodes of the largest connected component; ties go to the component
/// holding the lowest node index.
fn largest_component(g: &UnGraph<String, f64>) -> Vec<NodeIndex> {
    let mut sets = UnionFind::<usize>::new(g.node_count());
    for edge in g.raw_edges() {
        sets.union(edge.source().index(), edge.target().index());
    }
    let mut components: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
    for node in g.node_indices() {
        components
            .entry(sets.find(node.index()))
            .or_default()
            .push(node);
    }
    components
        .into_values()
        .max_by(|a, b| a.len().cmp(&b.len()).then(b[0].cmp(&a[0])))
        .unwrap_or_default()
}

/// Weighted adjacency over local indices; each undirected edge is listed
/// from both ends. `self_loops` holds the internal weight of aggregated nodes.
#[derive(Debug, Clone)]
struct Adjacency {
    neighbors: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
}

impl Adjacency {
    fn induced(g: &UnGraph<String, f64>, nodes: &[NodeIndex]) -> Self {
        let local: HashMap<NodeIndex, usize> =
            nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let neighbors = nodes
            .iter()
            .map(|node| {
                g.edges(*node)
                    .filter_map(|edge| {
                        let other = if edge.source() == *node {
                            edge.target()
                        } else {
                            edge.source()
                        };
                        local.get(&other).map(|j| (*j, *edge.weight()))
                    })
                    .collect()
            })
            .collect();
        Self {
            neighbors,
            self_loops: vec![0.0; nodes.len()],
        }
    }

    fn len(&self) -> usize {
        self.neighbors.len()
    }

    fn degree(&self, i: usize) -> f64 {
        self.neighbors[i].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self.self_loops[i]
    }

    /// Collapses each group of `groups` into one node.
    fn aggregate(&self, groups: &[usize], count: usize) -> Self {
        let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut self_loops = vec![0.0; count];
        for (i, edges) in self.neighbors.iter().enumerate() {
            let gi = groups[i];
            self_loops[gi] += self.self_loops[i];
            for (j, w) in edges {
                let gj = groups[*j];
                if gi == gj {
                    self_loops[gi] += w / 2.0;
                } else {
                    *merged[gi].entry(gj).or_default() += w;
                }
            }
        }
        Self {
            neighbors: merged.into_iter().map(|m| m.into_iter().collect()).collect(),
            self_loops,
        }
    }
}

/// Splits `nodes` into well-connected communities, in order of their lowest node.
fn partition(
    g: &UnGraph<String, f64>,
    nodes: &[NodeIndex],
    rng: &mut StdRng,
) -> Vec<Vec<NodeIndex>> {
    let adjacency = Adjacency::induced(g, nodes);
    let assignment = leiden(&adjacency, rng);
    let count = assignment.iter().max().map_or(0, |m| m + 1);
    let mut parts: Vec<Vec<NodeIndex>> = vec![Vec::new(); count];
    for (i, community) in assignment.into_iter().enumerate() {
        parts[community].push(nodes[i]);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn leiden(adjacency: &Adjacency, rng: &mut StdRng) -> Vec<usize> {
    let n = adjacency.len();
    let mut to_aggregate: Vec<usize> = (0..n).collect();
    let mut current = adjacency.clone();
    let mut membership: Vec<usize> = (0..n).collect();

    loop {
        move_nodes(&current, &mut membership, rng);
        let (refined, count) = refine(&current, &membership);
        if count == current.len() {
            break;
        }
        let mut aggregate_membership = vec![0; count];
        for (i, group) in refined.iter().enumerate() {
            aggregate_membership[*group] = membership[i];
        }
        current = current.aggregate(&refined, count);
        membership = compact(&aggregate_membership);
        for node in to_aggregate.iter_mut() {
            *node = refined[*node];
        }
    }

    let flat: Vec<usize> = to_aggregate.iter().map(|a| membership[*a]).collect();
    refine(adjacency, &flat).0
}

/// Greedy local moving: each node joins the neighboring community with the
/// largest modularity gain until a full pass moves nothing.
fn move_nodes(adjacency: &Adjacency, membership: &mut [usize], rng: &mut StdRng) {
    let n = adjacency.len();
    let degrees: Vec<f64> = (0..n).map(|i| adjacency.degree(i)).collect();
    let two_m: f64 = degrees.iter().sum();
    if two_m <= 0.0 {
        return;
    }
    let mut totals = vec![0.0; n];
    for (i, community) in membership.iter().enumerate() {
        totals[*community] += degrees[i];
    }

    let mut order: Vec<usize> = (0..n).collect();
    for _ in 0..MAX_MOVING_PASSES {
        order.shuffle(rng);
        let mut moved = false;
        for &i in &order {
            let current = membership[i];
            let k_i = degrees[i];
            totals[current] -= k_i;

            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for (j, w) in &adjacency.neighbors[i] {
                if *j != i {
                    *links.entry(membership[*j]).or_default() += w;
                }
            }
            let gain = |community: usize, weight: f64| {
                weight - RESOLUTION * k_i * totals[community] / two_m
            };

            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&community, &weight) in &links {
                let candidate = gain(community, weight);
                if candidate > best_gain + GAIN_EPSILON {
                    best = community;
                    best_gain = candidate;
                }
            }

            totals[best] += k_i;
            if best != current {
                membership[i] = best;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }
}

/// Splits every community into its connected components. Returns the
/// component of each node, numbered by lowest node, and the component count.
fn refine(adjacency: &Adjacency, membership: &[usize]) -> (Vec<usize>, usize) {
    let n = adjacency.len();
    let mut component = vec![usize::MAX; n];
    let mut count = 0;
    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        component[start] = count;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for (neighbor, _) in &adjacency.neighbors[node] {
                if component[*neighbor] == usize::MAX && membership[*neighbor] == membership[node] {
                    component[*neighbor] = count;
                    stack.push(*neighbor);
                }
            }
        }
        count += 1;
    }
    (component, count)
}

fn compact(values: &[usize]) -> Vec<usize> {
    let mut ids: HashMap<usize, usize> = HashMap::new();
    values
        .iter()
        .map(|v| {
            let next = ids.len();
            *ids.entry(*v).or_insert(next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_cluster_size: usize, max_levels: usize, use_lcc: bool) -> ClusterGraphConfig {
        ClusterGraphConfig {
            max_cluster_size,
            max_levels,
            use_lcc,
            seed: 0xDEAD_BEEF,
        }
    }

    fn two_triangles() -> ExtractedGraph {
        let mut graph = ExtractedGraph::new();
        for (a, b) in [("A", "B"), ("B", "C"), ("A", "C"), ("D", "E"), ("E", "F"), ("D", "F"), ("C", "D")] {
            graph.add_edge(a, b, "linked", 1.0, "c1");
        }
        graph.add_edge("X", "Y", "isolated pair", 1.0, "c1");
        graph
    }

    fn ring_of_cliques(cliques: usize, size: usize) -> ExtractedGraph {
        let mut graph = ExtractedGraph::new();
        let name = |c: usize, i: usize| format!("N{}_{}", c, i);
        for c in 0..cliques {
            for i in 0..size {
                for j in (i + 1)..size {
                    graph.add_edge(&name(c, i), &name(c, j), "in", 1.0, "c1");
                }
            }
            graph.add_edge(&name(c, 0), &name((c + 1) % cliques, 1), "ring", 1.0, "c1");
        }
        graph
    }

    #[test]
    fn test_two_triangles_split_and_lcc_excludes_isolated_pair() {
        let clustering = cluster_graph(&two_triangles(), &config(10, 4, true));

        let level0 = clustering.by_level()[&0].clone();
        let mut groups: Vec<Vec<String>> = level0.into_values().collect();
        groups.sort();
        assert_eq!(
            groups,
            vec![
                vec!["A".to_string(), "B".into(), "C".into()],
                vec!["D".to_string(), "E".into(), "F".into()],
            ]
        );
        assert_eq!(clustering.levels(), vec![0]);
        assert!(clustering.membership(0).get("X").is_none());
    }

    #[test]
    fn test_without_lcc_every_node_is_clustered() {
        let clustering = cluster_graph(&two_triangles(), &config(10, 4, false));
        let membership = clustering.membership(0);
        assert_eq!(membership.len(), 8);
        assert_eq!(membership["X"], membership["Y"]);
        assert_ne!(membership["X"], membership["A"]);
    }

    #[test]
    fn test_hierarchy_refines_previous_level() {
        let graph = ring_of_cliques(6, 5);
        let clustering = cluster_graph(&graph, &config(3, 4, true));

        let mut seen_ids = std::collections::HashSet::new();
        let mut previous: Option<HashMap<&str, usize>> = None;
        for level in clustering.levels() {
            let membership = clustering.membership(level);
            assert_eq!(membership.len(), graph.node_count(), "level {}", level);
            for community in clustering.at_level(level) {
                assert!(seen_ids.insert(community.id));
                match (&previous, community.parent) {
                    (None, None) => {}
                    (Some(prev), Some(parent)) => {
                        assert!(community.nodes.iter().all(|n| prev[n.as_str()] == parent));
                    }
                    other => panic!("unexpected parent linkage {:?}", other),
                }
            }
            previous = Some(membership);
        }
    }

    #[test]
    fn test_single_level_when_max_levels_is_one() {
        let clustering = cluster_graph(&ring_of_cliques(4, 5), &config(2, 1, true));
        assert_eq!(clustering.levels(), vec![0]);
    }

    #[test]
    fn test_clustering_is_deterministic_for_a_seed() {
        let graph = ring_of_cliques(5, 4);
        let first = cluster_graph(&graph, &config(3, 3, true));
        let second = cluster_graph(&graph, &config(3, 3, true));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_and_edgeless_graphs() {
        assert!(cluster_graph(&ExtractedGraph::new(), &config(10, 4, true))
            .communities()
            .is_empty());

        let mut graph = ExtractedGraph::new();
        graph.add_node("A", "person", "a", "c1");
        graph.add_node("B", "person", "b", "c1");
        let clustering = cluster_graph(&graph, &config(10, 4, false));
        assert_eq!(clustering.at_level(0).count(), 2);
    }

    #[test]
    fn test_annotation_marks_unclustered_nodes_null() {
        let graph = two_triangles();
        let clustering = cluster_graph(&graph, &config(10, 4, true));
        let levels = annotate_levels(&graph, &clustering, 7);

        assert_eq!(levels.len(), 1);
        let (level, annotated) = &levels[0];
        assert_eq!(*level, 0);
        let a = &annotated.node("A").unwrap().attributes;
        assert!(a["community"].is_u64());
        assert_eq!(a["degree"], json!(2));
        assert_eq!(a["human_readable_id"], json!(0));
        assert_eq!(annotated.node("X").unwrap().attributes["community"], Value::Null);
        assert_eq!(
            annotated.edge("C", "D").unwrap().attributes["combined_degree"],
            json!(6)
        );

        let again = annotate_levels(&graph, &clustering, 7);
        assert_eq!(again[0].1, *annotated);
    }
}
