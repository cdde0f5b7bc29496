// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ExecutionError;
use crate::graph::{
    annotate_levels, cluster_graph, DescriptionSummarizer, ExtractedGraph, GraphExtractor,
};
use crate::observability::messages::pipeline::RowFailed;
use crate::observability::messages::StructuredLog;
use crate::table::{Row, Table};
use crate::workflow::verbs::{graph_at, snippet, VerbContext};
use crate::workflow::{
    ClusterGraphArgs, ExtractGraphArgs, GraphPart, MergeGraphsArgs, SnapshotGraphArgs,
    SummarizeDescriptionsArgs, UnpackGraphArgs,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const LEVEL_COLUMN: &str = "level";

/// One graph per chunk, in a new `to` column; failed chunks are dropped.
pub(super) async fn extract_graph(
    ctx: &VerbContext<'_>,
    input: &Table,
    args: &ExtractGraphArgs,
) -> Result<Table, ExecutionError> {
    let settings = &ctx.config.entity_extraction;
    let mut extractor = GraphExtractor::new(
        ctx.llm()?,
        args.entity_types
            .clone()
            .unwrap_or_else(|| settings.entity_types.clone()),
        args.max_gleanings.unwrap_or(settings.max_gleanings),
    );
    if let Some(prompt) = args.prompt.as_ref().or(settings.prompt.as_ref()) {
        extractor = extractor.with_prompt(prompt.clone());
    }

    let mut items = Vec::with_capacity(input.len());
    for index in 0..input.len() {
        let text = input.str_at(index, &args.text_column)?;
        let id = input.str_at(index, &args.id_column)?;
        items.push((snippet(text), (index, id.to_string(), text.to_string())));
    }

    let extractor = &extractor;
    let graphs = ctx
        .fan_out("extract_graph", items, |(index, id, text)| async move {
            let graph = extractor.extract(&id, &text).await?;
            Ok::<_, ExecutionError>((index, graph.to_json()?))
        })
        .await?;

    let mut out = Table::with_columns(input.columns().iter().cloned());
    for (index, graph) in graphs {
        let mut row = input.rows()[index].clone();
        row.insert(args.to.clone(), Value::String(graph));
        out.push(row);
    }
    Ok(out)
}

/// The group a row belongs to: the first value of `column`, or the value itself.
fn group_key(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::Array(values)) => values.first().map(cell_text).unwrap_or_default(),
        Some(value) => cell_text(value),
        None => String::new(),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Folds the graph of every row into a single-row table.
pub(super) fn merge_graphs(input: &Table, args: &MergeGraphsArgs) -> Result<Table, ExecutionError> {
    let mut groups: Vec<(String, ExtractedGraph)> = Vec::new();
    for (index, row) in input.rows().iter().enumerate() {
        let graph = graph_at(input, index, &args.column)?;
        let key = args
            .group_by
            .as_deref()
            .map(|column| group_key(row, column))
            .unwrap_or_default();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, merged)) => merged.merge(&graph, args.strategy),
            None => groups.push((key, graph)),
        }
    }
    let merged = ExtractedGraph::merge_all(groups.iter().map(|(_, g)| g), args.strategy);

    let mut out = Table::with_columns([args.to.clone()]);
    let mut row = Row::new();
    row.insert(args.to.clone(), Value::String(merged.to_json()?));
    out.push(row);
    Ok(out)
}

/// Replaces multi-source or overlong descriptions with model summaries.
///
/// A node or edge whose summary fails keeps its descriptions and is reported.
pub(super) async fn summarize_descriptions(
    ctx: &VerbContext<'_>,
    input: &Table,
    args: &SummarizeDescriptionsArgs,
) -> Result<Table, ExecutionError> {
    let settings = &ctx.config.summarize_descriptions;
    let mut summarizer = DescriptionSummarizer::new(
        ctx.llm()?,
        args.max_length.unwrap_or(settings.max_length),
        args.max_input_tokens
            .unwrap_or(settings.max_input_tokens as u64),
    );
    if let Some(prompt) = args.prompt.as_ref().or(settings.prompt.as_ref()) {
        summarizer = summarizer.with_prompt(prompt.clone());
    }

    let mut out = Table::with_columns(input.columns().iter().cloned());
    for (index, row) in input.rows().iter().enumerate() {
        let graph = graph_at(input, index, &args.column)?;
        let (summarized, failures) = tokio::select! {
            result = summarizer.summarize_graph(&graph, ctx.concurrency()) => result,
            _ = ctx.cancel.cancelled() => return Err(ExecutionError::Cancelled),
        };
        for failure in failures {
            let message = failure.error.to_string();
            RowFailed {
                verb: "summarize_descriptions",
                row: index,
                snippet: &failure.id,
                error: &message,
            }
            .log();
            ctx.callbacks.error(ctx.workflow, Some(index), &failure.error);
        }
        let mut row = row.clone();
        row.insert(args.to.clone(), Value::String(summarized.to_json()?));
        out.push(row);
    }
    Ok(out)
}

/// One row per clustering level with the graph annotated for that level.
pub(super) fn cluster(
    ctx: &VerbContext<'_>,
    input: &Table,
    args: &ClusterGraphArgs,
) -> Result<Table, ExecutionError> {
    let mut settings = ctx.config.cluster_graph.clone();
    if let Some(size) = args.max_cluster_size {
        settings.max_cluster_size = size;
    }
    if let Some(levels) = args.max_levels {
        settings.max_levels = levels;
    }
    if let Some(use_lcc) = args.use_lcc {
        settings.use_lcc = use_lcc;
    }
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }

    let mut graph = ExtractedGraph::new();
    for index in 0..input.len() {
        graph.merge(&graph_at(input, index, &args.column)?, Default::default());
    }
    let clustering = cluster_graph(&graph, &settings);

    let mut out = Table::with_columns([args.level_to.clone(), args.to.clone()]);
    for (level, annotated) in annotate_levels(&graph, &clustering, settings.seed) {
        let mut row = Row::new();
        row.insert(args.level_to.clone(), json!(level));
        row.insert(args.to.clone(), Value::String(annotated.to_json()?));
        out.push(row);
    }
    Ok(out)
}

/// Writes the first row's graph to `<name>.json`; the table passes through.
pub(super) async fn snapshot(
    ctx: &VerbContext<'_>,
    input: Table,
    args: &SnapshotGraphArgs,
) -> Result<Table, ExecutionError> {
    if !input.is_empty() {
        let graph = graph_at(&input, 0, &args.column)?;
        ctx.storage
            .set(&format!("{}.json", args.name), graph.to_json()?.as_bytes())
            .await?;
    }
    Ok(input)
}

fn row_level(row: &Row) -> Option<usize> {
    row.get(LEVEL_COLUMN)
        .and_then(Value::as_u64)
        .map(|level| level as usize)
}

fn attribute(attributes: &serde_json::Map<String, Value>, name: &str) -> Value {
    attributes.get(name).cloned().unwrap_or(Value::Null)
}

/// Flattens clustered graphs into node, edge or community rows.
pub(super) fn unpack(input: &Table, args: &UnpackGraphArgs) -> Result<Table, ExecutionError> {
    let mut levels: Vec<(usize, ExtractedGraph)> = Vec::new();
    for (index, row) in input.rows().iter().enumerate() {
        let level = row_level(row).unwrap_or(0);
        if args.level.is_some_and(|wanted| wanted != level) {
            continue;
        }
        levels.push((level, graph_at(input, index, &args.column)?));
    }
    levels.sort_by_key(|(level, _)| *level);

    let table = match args.kind {
        GraphPart::Nodes => unpack_nodes(&levels),
        GraphPart::Edges => unpack_edges(&levels),
        GraphPart::Communities => unpack_communities(&levels),
    };
    Ok(table)
}

fn unpack_nodes(levels: &[(usize, ExtractedGraph)]) -> Table {
    let mut out = Table::with_columns([
        "id",
        "human_readable_id",
        "title",
        "type",
        "description",
        "text_unit_ids",
        "degree",
        "community",
        "level",
    ]);
    for (level, graph) in levels {
        for (id, node) in graph.nodes() {
            let mut row = Row::new();
            row.insert("id".into(), attribute(&node.attributes, "id"));
            row.insert(
                "human_readable_id".into(),
                attribute(&node.attributes, "human_readable_id"),
            );
            row.insert("title".into(), json!(id));
            row.insert("type".into(), json!(node.entity_type));
            row.insert("description".into(), json!(node.description()));
            row.insert("text_unit_ids".into(), json!(node.source_ids));
            row.insert("degree".into(), json!(graph.degree(id)));
            row.insert("community".into(), attribute(&node.attributes, "community"));
            row.insert("level".into(), json!(level));
            out.push(row);
        }
    }
    out
}

fn unpack_edges(levels: &[(usize, ExtractedGraph)]) -> Table {
    let mut out = Table::with_columns([
        "id",
        "human_readable_id",
        "source",
        "target",
        "description",
        "weight",
        "text_unit_ids",
        "combined_degree",
        "level",
    ]);
    for (level, graph) in levels {
        for (source, target, edge) in graph.edges() {
            let mut row = Row::new();
            row.insert("id".into(), attribute(&edge.attributes, "id"));
            row.insert(
                "human_readable_id".into(),
                attribute(&edge.attributes, "human_readable_id"),
            );
            row.insert("source".into(), json!(source));
            row.insert("target".into(), json!(target));
            row.insert("description".into(), json!(edge.description()));
            row.insert("weight".into(), json!(edge.weight()));
            row.insert("text_unit_ids".into(), json!(edge.source_ids));
            row.insert(
                "combined_degree".into(),
                attribute(&edge.attributes, "combined_degree"),
            );
            row.insert("level".into(), json!(level));
            out.push(row);
        }
    }
    out
}

/// Node id to community id, for nodes that were clustered.
fn membership(graph: &ExtractedGraph) -> HashMap<String, u64> {
    graph
        .nodes()
        .filter_map(|(id, node)| {
            node.attributes
                .get("community")
                .and_then(Value::as_u64)
                .map(|community| (id.clone(), community))
        })
        .collect()
}

fn unpack_communities(levels: &[(usize, ExtractedGraph)]) -> Table {
    let mut out = Table::with_columns([
        "id",
        "title",
        "level",
        "parent",
        "entity_ids",
        "relationship_ids",
        "text_unit_ids",
        "size",
    ]);
    let mut previous: Option<HashMap<String, u64>> = None;
    for (level, graph) in levels {
        let current = membership(graph);
        let mut members: BTreeMap<u64, Vec<&String>> = BTreeMap::new();
        for (id, _) in graph.nodes() {
            if let Some(community) = current.get(id.as_str()) {
                members.entry(*community).or_default().push(id);
            }
        }

        for (community, nodes) in members {
            let parent = previous
                .as_ref()
                .and_then(|p| nodes.first().and_then(|n| p.get(n.as_str())))
                .map_or(Value::Null, |parent| json!(parent));
            let entity_ids: Vec<Value> = nodes
                .iter()
                .filter_map(|n| graph.node(n))
                .map(|node| attribute(&node.attributes, "id"))
                .collect();

            let mut relationship_ids = Vec::new();
            let mut text_unit_ids = BTreeSet::new();
            for (source, target, edge) in graph.edges() {
                let inside = current.get(source.as_str()) == Some(&community)
                    && current.get(target.as_str()) == Some(&community);
                if inside {
                    relationship_ids.push(attribute(&edge.attributes, "id"));
                    text_unit_ids.extend(edge.source_ids.iter().cloned());
                }
            }

            let mut row = Row::new();
            row.insert("id".into(), json!(community));
            row.insert("title".into(), json!(format!("Community {}", community)));
            row.insert("level".into(), json!(level));
            row.insert("parent".into(), parent);
            row.insert("entity_ids".into(), json!(entity_ids));
            row.insert("relationship_ids".into(), json!(relationship_ids));
            row.insert("text_unit_ids".into(), json!(text_unit_ids));
            row.insert("size".into(), json!(nodes.len()));
            out.push(row);
        }
        previous = Some(current);
    }
    out
}
