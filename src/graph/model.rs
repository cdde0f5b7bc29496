// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How node and edge descriptions combine on merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionMerge {
    /// Keep every distinct description, in first-seen order.
    #[default]
    Concatenate,
    /// Keep only the longest description.
    Longest,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NodeData {
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl NodeData {
    pub fn description(&self) -> String {
        self.descriptions.join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EdgeData {
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(default)]
    pub source_ids: Vec<String>,
    /// Weight contributed by each source; a source contributes once.
    #[serde(default)]
    pub contributions: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl EdgeData {
    pub fn weight(&self) -> f64 {
        self.contributions.values().sum()
    }

    pub fn description(&self) -> String {
        self.descriptions.join("\n")
    }
}

/// Entities and relationships extracted from text.
///
/// Node ids are normalized entity names; edges are undirected and keyed by
/// their endpoints in sorted order. Merging is idempotent: merging a graph
/// into itself, or merging the same extraction twice, changes nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedGraph {
    nodes: BTreeMap<String, NodeData>,
    edges: BTreeMap<(String, String), EdgeData>,
}

#[derive(Deserialize, Serialize)]
struct NodeRecord {
    id: String,
    #[serde(flatten)]
    data: NodeData,
}

#[derive(Deserialize, Serialize)]
struct EdgeRecord {
    source: String,
    target: String,
    weight: f64,
    #[serde(flatten)]
    data: EdgeData,
}

#[derive(Default, Deserialize, Serialize)]
struct GraphDocument {
    #[serde(default)]
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
}

/// Upper-cases and HTML-unescapes an entity name.
pub fn normalize_id(name: &str) -> String {
    clean_text(name).to_uppercase()
}

/// HTML-unescapes, strips surrounding quotes and trims.
pub fn clean_text(text: &str) -> String {
    unescape_html(text.trim())
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

fn unescape_html(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let decoded = candidate.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &candidate[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn push_unique(target: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !target.iter().any(|v| v == value) {
        target.push(value.to_string());
    }
}

fn merge_descriptions(target: &mut Vec<String>, incoming: &[String], strategy: DescriptionMerge) {
    for description in incoming {
        push_unique(target, description);
    }
    if strategy == DescriptionMerge::Longest && target.len() > 1 {
        let longest = target
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
            .map(|(_, d)| d.clone());
        *target = longest.into_iter().collect();
    }
}

fn edge_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl ExtractedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or merges an entity; `name` is normalized.
    pub fn add_node(&mut self, name: &str, entity_type: &str, description: &str, source_id: &str) {
        let id = normalize_id(name);
        if id.is_empty() {
            return;
        }
        let node = self.nodes.entry(id).or_default();
        if node.entity_type.is_empty() {
            node.entity_type = clean_text(entity_type).to_uppercase();
        }
        push_unique(&mut node.descriptions, &clean_text(description));
        push_unique(&mut node.source_ids, source_id);
    }

    /// Adds or merges an undirected relationship; missing endpoints become untyped nodes.
    ///
    /// A source contributes its weight once; repeated records from the same
    /// source keep the larger weight.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        description: &str,
        weight: f64,
        source_id: &str,
    ) {
        let (a, b) = (normalize_id(source), normalize_id(target));
        if a.is_empty() || b.is_empty() || a == b {
            return;
        }
        for endpoint in [&a, &b] {
            let node = self.nodes.entry(endpoint.clone()).or_default();
            push_unique(&mut node.source_ids, source_id);
        }
        let edge = self.edges.entry(edge_key(&a, &b)).or_default();
        push_unique(&mut edge.descriptions, &clean_text(description));
        push_unique(&mut edge.source_ids, source_id);
        let contribution = edge.contributions.entry(source_id.to_string()).or_insert(0.0);
        *contribution = contribution.max(weight);
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: &ExtractedGraph, strategy: DescriptionMerge) {
        for (id, incoming) in &other.nodes {
            let node = self.nodes.entry(id.clone()).or_default();
            if node.entity_type.is_empty() {
                node.entity_type = incoming.entity_type.clone();
            }
            merge_descriptions(&mut node.descriptions, &incoming.descriptions, strategy);
            for source in &incoming.source_ids {
                push_unique(&mut node.source_ids, source);
            }
            for (key, value) in &incoming.attributes {
                node.attributes.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        for (key, incoming) in &other.edges {
            let edge = self.edges.entry(key.clone()).or_default();
            merge_descriptions(&mut edge.descriptions, &incoming.descriptions, strategy);
            for source in &incoming.source_ids {
                push_unique(&mut edge.source_ids, source);
            }
            for (source, weight) in &incoming.contributions {
                let contribution = edge.contributions.entry(source.clone()).or_insert(0.0);
                *contribution = contribution.max(*weight);
            }
            for (name, value) in &incoming.attributes {
                edge.attributes.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    /// Merges `graphs` in order into a fresh graph.
    pub fn merge_all<'a, I>(graphs: I, strategy: DescriptionMerge) -> ExtractedGraph
    where
        I: IntoIterator<Item = &'a ExtractedGraph>,
    {
        let mut merged = ExtractedGraph::new();
        for graph in graphs {
            merged.merge(graph, strategy);
        }
        merged
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes sorted by id.
    pub fn nodes(&self) -> impl Iterator<Item = (&String, &NodeData)> {
        self.nodes.iter()
    }

    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// Edges sorted by `"source -> target"`.
    pub fn edges(&self) -> Vec<(&String, &String, &EdgeData)> {
        let mut edges: Vec<_> = self.edges.iter().map(|((s, t), e)| (s, t, e)).collect();
        edges.sort_by_cached_key(|(s, t, _)| format!("{} -> {}", s, t));
        edges
    }

    pub fn edge(&self, a: &str, b: &str) -> Option<&EdgeData> {
        self.edges.get(&edge_key(a, b))
    }

    pub fn edge_mut(&mut self, a: &str, b: &str) -> Option<&mut EdgeData> {
        self.edges.get_mut(&edge_key(a, b))
    }

    /// Number of distinct neighbors of `id`.
    pub fn degree(&self, id: &str) -> usize {
        self.edges
            .keys()
            .filter(|(s, t)| s == id || t == id)
            .count()
    }

    /// Degrees of every node, computed in one pass.
    pub fn degrees(&self) -> BTreeMap<String, usize> {
        let mut degrees: BTreeMap<String, usize> =
            self.nodes.keys().map(|id| (id.clone(), 0)).collect();
        for (s, t) in self.edges.keys() {
            *degrees.entry(s.clone()).or_default() += 1;
            *degrees.entry(t.clone()).or_default() += 1;
        }
        degrees
    }

    /// The subgraph induced by `ids`.
    pub fn subgraph(&self, ids: &[String]) -> ExtractedGraph {
        let keep: std::collections::BTreeSet<&str> = ids.iter().map(String::as_str).collect();
        ExtractedGraph {
            nodes: self
                .nodes
                .iter()
                .filter(|(id, _)| keep.contains(id.as_str()))
                .map(|(id, n)| (id.clone(), n.clone()))
                .collect(),
            edges: self
                .edges
                .iter()
                .filter(|((s, t), _)| keep.contains(s.as_str()) && keep.contains(t.as_str()))
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
        }
    }

    /// Re-applies id normalization, merging nodes whose ids collide.
    pub fn normalize(&self) -> ExtractedGraph {
        let mut normalized = ExtractedGraph::new();
        for (id, node) in &self.nodes {
            let mut single = ExtractedGraph::new();
            single.nodes.insert(normalize_id(id), node.clone());
            normalized.merge(&single, DescriptionMerge::Concatenate);
        }
        for ((s, t), edge) in &self.edges {
            let (a, b) = (normalize_id(s), normalize_id(t));
            if a == b {
                continue;
            }
            let mut single = ExtractedGraph::new();
            single.edges.insert(edge_key(&a, &b), edge.clone());
            normalized.merge(&single, DescriptionMerge::Concatenate);
        }
        normalized
    }

    /// Byte-stable JSON document: nodes sorted by id, edges by `"source -> target"`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let document = GraphDocument {
            nodes: self
                .nodes
                .iter()
                .map(|(id, data)| NodeRecord {
                    id: id.clone(),
                    data: data.clone(),
                })
                .collect(),
            edges: self
                .edges()
                .into_iter()
                .map(|(s, t, data)| EdgeRecord {
                    source: s.clone(),
                    target: t.clone(),
                    weight: data.weight(),
                    data: data.clone(),
                })
                .collect(),
        };
        serde_json::to_string(&document)
    }

    pub fn from_json(text: &str) -> Result<ExtractedGraph, serde_json::Error> {
        let document: GraphDocument = serde_json::from_str(text)?;
        let mut graph = ExtractedGraph::new();
        for record in document.nodes {
            graph.nodes.insert(record.id, record.data);
        }
        for record in document.edges {
            let mut data = record.data;
            if data.contributions.is_empty() {
                let source = data.source_ids.first().cloned().unwrap_or_default();
                data.contributions.insert(source, record.weight);
            }
            graph
                .edges
                .insert(edge_key(&record.source, &record.target), data);
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunk_graph(chunk: &str, person: &str) -> ExtractedGraph {
        let mut graph = ExtractedGraph::new();
        graph.add_node(person, "person", &format!("{} works at Acme", person), chunk);
        graph.add_node("Acme", "organization", "A company", chunk);
        graph.add_edge(person, "acme", &format!("{} is employed by Acme", person), 1.0, chunk);
        graph
    }

    #[test]
    fn test_merge_unions_descriptions_and_sources() {
        let mut merged = chunk_graph("c1", "Alice");
        let mut other = ExtractedGraph::new();
        other.add_node("ALICE", "person", "Alice leads research", "c2");
        other.add_node("alice", "", "Alice works at Acme", "c1");
        merged.merge(&other, DescriptionMerge::Concatenate);

        let alice = merged.node("ALICE").unwrap();
        assert_eq!(alice.entity_type, "PERSON");
        assert_eq!(
            alice.description(),
            "Alice works at Acme\nAlice leads research"
        );
        assert_eq!(alice.source_ids, vec!["c1", "c2"]);
    }

    #[test]
    fn test_alice_bob_acme_graph() {
        let graphs = [chunk_graph("c1", "Alice"), chunk_graph("c2", "Bob")];
        let merged = ExtractedGraph::merge_all(&graphs, DescriptionMerge::Concatenate);

        assert_eq!(merged.node_count(), 3);
        assert_eq!(merged.edge_count(), 2);
        for (_, _, edge) in merged.edges() {
            assert_eq!(edge.weight(), 1.0);
        }
        assert_eq!(merged.node("ACME").unwrap().source_ids, vec!["c1", "c2"]);
    }

    #[test]
    fn test_weights_sum_over_distinct_sources() {
        let mut graph = ExtractedGraph::new();
        graph.add_edge("a", "b", "x", 2.0, "c1");
        graph.add_edge("B", "A", "x", 2.0, "c1");
        graph.add_edge("a", "b", "y", 3.0, "c2");
        let edge = graph.edge("A", "B").unwrap();
        assert_eq!(edge.weight(), 5.0);
        assert_eq!(edge.descriptions, vec!["x", "y"]);
    }

    #[test]
    fn test_longest_description_wins() {
        let mut graph = ExtractedGraph::new();
        graph.add_node("a", "t", "short", "c1");
        let mut other = ExtractedGraph::new();
        other.add_node("a", "t", "a much longer description", "c2");
        graph.merge(&other, DescriptionMerge::Longest);
        assert_eq!(graph.node("A").unwrap().descriptions, vec!["a much longer description"]);
    }

    #[test]
    fn test_normalize_ids() {
        let cases = vec![
            ("acme", "ACME"),
            ("  \"Acme &amp; Co\" ", "ACME & CO"),
            ("caf&#233;", "CAFÉ"),
            ("AT&T", "AT&T"),
            ("&#x41;BC", "ABC"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_id(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_json_is_stable_and_reversible() {
        let mut graph = chunk_graph("c1", "Zed");
        graph.merge(&chunk_graph("c2", "Alice"), DescriptionMerge::Concatenate);

        let json = graph.to_json().unwrap();
        let back = ExtractedGraph::from_json(&json).unwrap();
        assert_eq!(back, graph);
        assert_eq!(back.to_json().unwrap(), json);

        let edges = graph.edges();
        assert_eq!((edges[0].0.as_str(), edges[0].1.as_str()), ("ACME", "ALICE"));
        assert_eq!((edges[1].0.as_str(), edges[1].1.as_str()), ("ACME", "ZED"));
    }

    #[test]
    fn test_normalize_merges_colliding_ids() {
        let mut raw = ExtractedGraph::new();
        raw.nodes.insert("acme".into(), NodeData {
            entity_type: "ORG".into(),
            descriptions: vec!["one".into()],
            source_ids: vec!["c1".into()],
            attributes: Map::new(),
        });
        raw.nodes.insert("ACME".into(), NodeData {
            entity_type: "ORG".into(),
            descriptions: vec!["two".into()],
            source_ids: vec!["c2".into()],
            attributes: Map::new(),
        });
        let normalized = raw.normalize();
        assert_eq!(normalized.node_count(), 1);
        assert_eq!(normalized.node("ACME").unwrap().descriptions.len(), 2);
    }

    fn arb_graph() -> impl Strategy<Value = ExtractedGraph> {
        let names = prop::sample::select(vec!["alice", "bob", "acme", "zed"]);
        let sources = prop::sample::select(vec!["c1", "c2", "c3"]);
        prop::collection::vec((names.clone(), names, sources, 1u8..5), 0..8).prop_map(|records| {
            let mut graph = ExtractedGraph::new();
            for (a, b, source, w) in records {
                graph.add_node(a, "person", &format!("{} in {}", a, source), source);
                graph.add_edge(a, b, &format!("{}-{}", a, b), f64::from(w), source);
            }
            graph
        })
    }

    proptest! {
        #[test]
        fn merging_twice_changes_nothing(a in arb_graph(), b in arb_graph()) {
            let once = ExtractedGraph::merge_all([&a, &b], DescriptionMerge::Concatenate);
            let twice = ExtractedGraph::merge_all([&a, &b, &b, &a], DescriptionMerge::Concatenate);
            prop_assert_eq!(once, twice);
        }
    }
}
