// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Parsing of the delimited record format the extraction prompts ask for:
//!
//! ```text
//! ("entity"<|>ALICE<|>PERSON<|>Alice works at Acme)##
//! ("relationship"<|>ALICE<|>ACME<|>Alice is employed by Acme<|>1)<|COMPLETE|>
//! ```

use crate::graph::model::{clean_text, ExtractedGraph};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecordDelimiters {
    pub tuple: String,
    pub record: String,
    pub completion: String,
}

impl Default for RecordDelimiters {
    fn default() -> Self {
        Self {
            tuple: "<|>".to_string(),
            record: "##".to_string(),
            completion: "<|COMPLETE|>".to_string(),
        }
    }
}

impl RecordDelimiters {
    /// Splits model output into records, each already split into fields.
    pub fn split<'a>(&self, output: &'a str) -> Vec<Vec<&'a str>> {
        let output = output.split(self.completion.as_str()).next().unwrap_or("");
        output
            .split(self.record.as_str())
            .map(|record| {
                let record = record.trim();
                let record = record.strip_prefix('(').unwrap_or(record);
                let record = record.strip_suffix(')').unwrap_or(record);
                record.split(self.tuple.as_str()).map(str::trim).collect::<Vec<_>>()
            })
            .filter(|fields| fields.iter().any(|f| !f.is_empty()))
            .collect()
    }
}

/// Builds the sub-graph for one chunk from its extraction output.
///
/// Records that are neither entities with a name, type and description nor
/// relationships with two endpoints are ignored. A missing or non-numeric
/// relationship strength counts as 1.
pub fn parse_graph(output: &str, source_id: &str, delimiters: &RecordDelimiters) -> ExtractedGraph {
    let mut graph = ExtractedGraph::new();
    for fields in delimiters.split(output) {
        match clean_text(fields[0]).to_lowercase().as_str() {
            "entity" if fields.len() >= 4 => {
                graph.add_node(fields[1], fields[2], fields[3], source_id);
            }
            "relationship" if fields.len() >= 4 => {
                let weight = fields
                    .get(4)
                    .and_then(|w| clean_text(w).parse::<f64>().ok())
                    .filter(|w| w.is_finite())
                    .unwrap_or(1.0);
                graph.add_edge(fields[1], fields[2], fields[3], weight, source_id);
            }
            _ => {}
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_entities_and_relationships() {
        let output = concat!(
            "(\"entity\"<|>Alice<|>person<|>Alice works at Acme)\n##\n",
            "(\"entity\"<|>ACME<|>ORGANIZATION<|>A company)##",
            "(\"relationship\"<|>alice<|>acme<|>Alice is employed by Acme<|>7)",
            "<|COMPLETE|>(\"entity\"<|>IGNORED<|>X<|>after completion)"
        );
        let graph = parse_graph(output, "c1", &RecordDelimiters::default());

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node("ALICE").unwrap().entity_type, "PERSON");
        assert_eq!(graph.edge("ACME", "ALICE").unwrap().weight(), 7.0);
        assert!(graph.node("IGNORED").is_none());
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let cases = vec![
            ("(\"entity\"<|>ONLY_NAME)", 0, 0),
            ("(\"relationship\"<|>A<|>B<|>linked<|>not-a-number)", 2, 1),
            ("(\"mystery\"<|>A<|>B<|>C)", 0, 0),
            ("", 0, 0),
        ];
        for (output, nodes, edges) in cases {
            let graph = parse_graph(output, "c1", &RecordDelimiters::default());
            assert_eq!(graph.node_count(), nodes, "{}", output);
            assert_eq!(graph.edge_count(), edges, "{}", output);
        }
        let graph = parse_graph(
            "(\"relationship\"<|>A<|>B<|>linked<|>not-a-number)",
            "c1",
            &RecordDelimiters::default(),
        );
        assert_eq!(graph.edge("A", "B").unwrap().weight(), 1.0);
    }
}
