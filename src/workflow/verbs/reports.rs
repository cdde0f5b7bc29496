// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ExecutionError;
use crate::graph::{Community, CommunityReporter, ExtractedGraph};
use crate::table::Table;
use crate::workflow::verbs::{graph_at, VerbContext};
use crate::workflow::SummarizeCommunitiesArgs;
use serde_json::Value;
use std::collections::BTreeMap;

const REPORT_COLUMNS: [&str; 8] = [
    "community",
    "level",
    "title",
    "summary",
    "rating",
    "rating_explanation",
    "findings",
    "full_content",
];

/// Communities of an annotated level graph, rebuilt from node attributes.
fn communities_of(level: usize, graph: &ExtractedGraph) -> Vec<Community> {
    let mut members: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (id, node) in graph.nodes() {
        if let Some(community) = node.attributes.get("community").and_then(Value::as_u64) {
            members.entry(community as usize).or_default().push(id.clone());
        }
    }
    members
        .into_iter()
        .map(|(id, nodes)| Community {
            level,
            id,
            parent: None,
            nodes,
        })
        .collect()
}

/// One report row per community at every level; failed communities are skipped.
pub(super) async fn summarize_communities(
    ctx: &VerbContext<'_>,
    input: &Table,
    args: &SummarizeCommunitiesArgs,
) -> Result<Table, ExecutionError> {
    let settings = &ctx.config.community_reports;
    let mut reporter = CommunityReporter::new(
        ctx.llm()?,
        args.max_input_tokens.unwrap_or(settings.max_input_tokens),
    );
    if let Some(prompt) = args.prompt.as_ref().or(settings.prompt.as_ref()) {
        reporter = reporter.with_prompt(prompt.clone());
    }

    let mut graphs = Vec::with_capacity(input.len());
    let mut items = Vec::new();
    for (index, row) in input.rows().iter().enumerate() {
        let level = row
            .get("level")
            .and_then(Value::as_u64)
            .map_or(0, |level| level as usize);
        let graph = graph_at(input, index, &args.column)?;
        for community in communities_of(level, &graph) {
            items.push((format!("Community {}", community.id), (index, community)));
        }
        graphs.push(graph);
    }

    let (graphs, reporter) = (&graphs, &reporter);
    let reports = ctx
        .fan_out("summarize_communities", items, |(index, community)| async move {
            let report = reporter.report(&graphs[index], &community).await?;
            Ok::<_, ExecutionError>(report)
        })
        .await?;

    let mut out = Table::with_columns(REPORT_COLUMNS);
    for report in reports {
        if let Value::Object(row) = serde_json::to_value(&report)? {
            out.push(row);
        }
    }
    Ok(out)
}
